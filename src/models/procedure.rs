use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ordered set of step identifiers executed together
pub type StepGroup = Vec<String>;

/// One row of a procedure's phase table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRule {
    /// Phase this rule applies to (e.g., "Phase1")
    pub phase: String,

    /// Phase entered once the threshold is reached; `None` marks the terminal phase
    #[serde(default)]
    pub next: Option<String>,

    /// Step counter value at which the transition becomes due
    #[serde(default)]
    pub threshold: usize,
}

impl PhaseRule {
    pub fn new(phase: &str, next: Option<&str>, threshold: usize) -> Self {
        Self {
            phase: phase.to_string(),
            next: next.map(str::to_string),
            threshold,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next.is_none()
    }
}

/// Immutable configuration of one procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureDefinition {
    /// Procedure identifier (e.g., "LegoAssembly")
    pub id: String,

    /// Step group active before the first cycle
    pub initial_steps: StepGroup,

    /// Step groups in execution order, indexed by the step counter
    pub sequence: Vec<StepGroup>,

    /// Phase table; the first row is the initial phase
    pub phases: Vec<PhaseRule>,
}

impl ProcedureDefinition {
    /// Build a definition from compact literals (used by the built-in catalog)
    pub fn from_parts(
        id: &str,
        initial: &[&str],
        sequence: &[&[&str]],
        phases: &[(&str, Option<&str>, usize)],
    ) -> Self {
        let group = |steps: &[&str]| steps.iter().map(|s| s.to_string()).collect::<StepGroup>();
        Self {
            id: id.to_string(),
            initial_steps: group(initial),
            sequence: sequence.iter().map(|g| group(g)).collect(),
            phases: phases
                .iter()
                .map(|(phase, next, threshold)| PhaseRule::new(phase, *next, *threshold))
                .collect(),
        }
    }

    pub fn initial_phase(&self) -> &str {
        self.phases.first().map(|r| r.phase.as_str()).unwrap_or_default()
    }

    pub fn phase_rule(&self, phase: &str) -> Option<&PhaseRule> {
        self.phases.iter().find(|r| r.phase == phase)
    }

    /// Check structural consistency: a non-empty sequence, and a phase table that
    /// walks from the first phase to a terminal row without revisiting a phase.
    pub fn check(&self) -> Result<(), String> {
        if self.sequence.is_empty() {
            return Err(format!("procedure '{}' has an empty step sequence", self.id));
        }
        if self.initial_steps.is_empty() {
            return Err(format!("procedure '{}' has no initial steps", self.id));
        }
        let Some(first) = self.phases.first() else {
            return Err(format!("procedure '{}' has no phases", self.id));
        };

        let mut seen = HashSet::new();
        let mut current = first;
        loop {
            if !seen.insert(current.phase.as_str()) {
                return Err(format!(
                    "procedure '{}' revisits phase '{}'",
                    self.id, current.phase
                ));
            }
            let Some(next) = &current.next else {
                break;
            };
            current = self.phase_rule(next).ok_or_else(|| {
                format!(
                    "procedure '{}': phase '{}' leads to undeclared phase '{}'",
                    self.id, current.phase, next
                )
            })?;
        }

        Ok(())
    }
}
