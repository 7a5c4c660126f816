use super::{StepGroup, ValidationReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Read-only view of a session handed to front ends
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub procedure_id: String,
    /// False when the procedure id fell back to the catalog default
    pub procedure_known: bool,
    pub phase_id: String,
    pub active_step_group: StepGroup,
    pub step_counter: usize,
    pub ongoing: bool,
    pub violation_occurred: bool,
    pub last_validation_report: Option<ValidationReport>,
    pub available_procedures: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Sensor diagnostic for one step of the active group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMessage {
    pub step_id: String,
    pub message: String,
}

/// Result of one mutate → validate → advance cycle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleOutcome {
    pub snapshot: SessionSnapshot,
    /// Whether this cycle ended the procedure
    pub completed: bool,
    /// Step group the sensor events were applied for
    pub applied_steps: StepGroup,
    /// Sensor messages of the applied steps, filled only when validation failed
    pub step_messages: Vec<StepMessage>,
}
