use super::spinner;
use crate::config::SimulatorConfig;
use crate::Result;
use colored::Colorize;

/// Validate the knowledge base once, without applying any sensor data
pub fn run(config: &SimulatorConfig, procedure: Option<&str>, json: bool) -> Result<()> {
    let procedure = procedure.unwrap_or(&config.initial_procedure);

    let pb = spinner("Validating knowledge base...");
    let result = config
        .open_session(procedure)
        .and_then(|mut session| Ok(session.validate_now()?));
    pb.finish_and_clear();
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.conforms {
        println!("{}", "✅ Knowledge base conforms".green());
    } else {
        println!(
            "{}",
            format!("❌ {} violation(s)", report.violations.len()).red().bold()
        );
        println!("{}", report.format_violations());
        if config.show_validation_report {
            println!("\n{}", report.report_text.dimmed());
        }
    }

    if !report.conforms {
        anyhow::bail!("Knowledge base does not conform");
    }
    Ok(())
}
