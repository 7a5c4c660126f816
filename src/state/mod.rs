//! Procedure Progression Module
//!
//! Tracks where a session stands inside its procedure:
//! - Step counter over the procedure's step-group sequence
//! - Phase transitions driven by counter thresholds
//! - Termination once the terminal phase is processed

mod machine;

pub use machine::{PhaseAdvance, ProcedureStateMachine};
