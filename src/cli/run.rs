//! Interactive simulation loop
//!
//! Enter runs one cycle, `p` switches procedure, `r` rolls the store back to
//! the last checkpoint, `q` quits.

use super::spinner;
use crate::config::SimulatorConfig;
use crate::models::{CycleOutcome, ValidationReport};
use crate::session::SessionController;
use crate::Result;
use colored::Colorize;
use dialoguer::{Confirm, Input, Select};

pub fn run(config: &SimulatorConfig, procedure: Option<&str>) -> Result<()> {
    let procedure = procedure.unwrap_or(&config.initial_procedure);

    let pb = spinner("Loading knowledge base...");
    let opened = config.open_session(procedure);
    pb.finish_and_clear();
    let mut session = opened?;

    print_banner(&session);

    println!("Performing initial validation...");
    let report = validate_with_spinner(&mut session)?;
    if report.conforms {
        println!("{}", "✅ Initial validation passed\n".green());
    } else {
        println!("{}", "❌ Initial state validation failed!".red());
        print_violations(&report, config.show_validation_report);
    }

    loop {
        if !session.session().is_ongoing() {
            println!("\n{}", "🎉 Procedure completed!".green().bold());
            break;
        }
        print_position(&session);

        let command: String = Input::new()
            .with_prompt("[Enter] advance, [p] switch procedure, [r] rollback, [q] quit")
            .allow_empty(true)
            .interact_text()?;

        match command.trim() {
            "q" => break,
            "p" => switch(&mut session)?,
            "r" => {
                if session.rollback() {
                    println!("{}", "↩️  Store restored to the last checkpoint".yellow());
                } else {
                    println!("{}", "No checkpoint to roll back to".yellow());
                }
            }
            "" => {
                println!("\n{}", "🔄 Applying sensor updates...".cyan());
                let pb = spinner("Validating...");
                let outcome = session.run_cycle();
                pb.finish_and_clear();
                let outcome = outcome?;

                if !report_cycle(&outcome, config.show_validation_report) {
                    let keep_going = Confirm::new()
                        .with_prompt("Continue simulation?")
                        .default(true)
                        .interact()?;
                    if !keep_going {
                        break;
                    }
                }
            }
            other => println!("{}", format!("Unknown command: {}", other).yellow()),
        }
    }

    println!("\n{}", "✅ Simulation ended!".green());
    Ok(())
}

fn print_banner(session: &SessionController) {
    let line = "=".repeat(60);
    println!("\n{}", line);
    println!("{}", "OR DIGITAL TWIN SIMULATION".bold());
    println!("{}", line);
    println!("Current Procedure: {}", session.session().procedure_id().cyan());
    println!("{}\n", line);
}

fn print_position(session: &SessionController) {
    let state = session.session();
    println!("\n Procedure: {}", state.procedure_id().cyan());
    println!(" Phase: {}", state.machine().phase());
    println!(" Steps: {}", state.active_steps().join(", "));
}

fn validate_with_spinner(session: &mut SessionController) -> Result<ValidationReport> {
    let pb = spinner("Validating...");
    let report = session.validate_now();
    pb.finish_and_clear();
    Ok(report?)
}

fn switch(session: &mut SessionController) -> Result<()> {
    let ids: Vec<String> = session.catalog().ids().map(String::from).collect();
    let Some(choice) = Select::new()
        .with_prompt("Available procedures")
        .items(&ids)
        .default(0)
        .interact_opt()?
    else {
        return Ok(());
    };

    if session.switch_procedure(&ids[choice])? {
        println!("{}", format!("✅ Switched to {}", ids[choice]).green());
        let report = validate_with_spinner(session)?;
        if !report.conforms {
            println!("{}", "⚠ New procedure starts from a non-conforming state".yellow());
        }
    } else {
        println!("{}", "Invalid selection".red());
    }
    Ok(())
}

/// Print a cycle's result; returns `false` when validation failed
fn report_cycle(outcome: &CycleOutcome, show_report: bool) -> bool {
    let state = &outcome.snapshot;
    if state.violation_occurred {
        println!("\n{}", "❌ VALIDATION FAILED!".red().bold());
        if let Some(report) = &state.last_validation_report {
            print_violations(report, show_report);
        }
        for msg in &outcome.step_messages {
            println!("\n{}", format!("⚠️  {}: {}", msg.step_id, msg.message).yellow());
        }
        return false;
    }

    println!("{}", "✅ Validation passed!".green());
    if !outcome.completed {
        println!(
            "{}",
            format!("➡️  Advanced to: {}", state.active_step_group.join(", ")).cyan()
        );
    }
    true
}

fn print_violations(report: &ValidationReport, show_report: bool) {
    let line = "=".repeat(60);
    println!("\n{}", line);
    println!("{}", "🚨 VALIDATION ERRORS DETECTED 🚨".red().bold());
    println!("{}", line);
    if report.has_violations() {
        println!("{}", report.format_violations());
    }
    println!("{}\n", line);

    if show_report && !report.report_text.is_empty() {
        println!("{}", report.report_text.dimmed());
    }
}
