use crate::config::SimulatorConfig;
use crate::Result;
use colored::Colorize;

/// Start the HTTP server; flags override the `[server]` table
pub async fn run(config: SimulatorConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    // Missing data files only fail /init; warn at startup
    if let Err(missing) = config.resolve_files() {
        println!("{}", format!("⚠ {}", missing).yellow());
    }

    crate::server::serve(config, &host, port).await
}
