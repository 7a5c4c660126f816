use crate::config::SimulatorConfig;
use crate::Result;
use colored::Colorize;

/// List catalog procedures with their step sequences and phase tables
pub fn run(config: &SimulatorConfig, verbose: bool) -> Result<()> {
    let catalog = config.catalog()?;
    let default_id = catalog.default_procedure().id.clone();

    println!("{}", "📋 Procedures:".cyan());
    for def in catalog.procedures() {
        let marker = if def.id == default_id { " (default)" } else { "" };
        println!(
            "   • {}{} - {} step groups, {} phases",
            def.id.bold(),
            marker.dimmed(),
            def.sequence.len(),
            def.phases.len()
        );

        if !verbose {
            continue;
        }
        for (i, group) in def.sequence.iter().enumerate() {
            println!("       {:>2}: {}", i, group.join(", "));
        }
        for rule in &def.phases {
            match &rule.next {
                Some(next) => println!("       {} → {} at step {}", rule.phase, next, rule.threshold),
                None => println!("       {} (terminal)", rule.phase),
            }
        }
    }
    Ok(())
}
