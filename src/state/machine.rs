//! ProcedureStateMachine - phase/step/counter transitions

use crate::models::{ProcedureDefinition, StepGroup};

/// Outcome of [`ProcedureStateMachine::advance_phase`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseAdvance {
    /// Threshold reached; the machine moved into the named phase
    Transitioned(String),
    /// The current phase needs more steps before its transition is due
    NotYetDue,
    /// The current phase is terminal; the procedure is no longer ongoing
    Completed,
}

impl PhaseAdvance {
    /// Boolean form: `true` for both "transitioned" and "not yet due",
    /// `false` only when the procedure has terminated
    pub fn is_ongoing(&self) -> bool {
        !matches!(self, PhaseAdvance::Completed)
    }
}

/// Progression state for one procedure run
#[derive(Debug, Clone)]
pub struct ProcedureStateMachine {
    procedure: ProcedureDefinition,
    phase: String,
    counter: usize,
    ongoing: bool,
}

impl ProcedureStateMachine {
    /// Start at the procedure's first phase with the counter at zero
    pub fn new(procedure: ProcedureDefinition) -> Self {
        let phase = procedure.initial_phase().to_string();
        Self {
            procedure,
            phase,
            counter: 0,
            ongoing: true,
        }
    }

    pub fn procedure(&self) -> &ProcedureDefinition {
        &self.procedure
    }

    pub fn phase(&self) -> &str {
        &self.phase
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn is_ongoing(&self) -> bool {
        self.ongoing
    }

    /// Step group the next `advance_step` would return, without moving the counter
    pub fn peek_step(&self) -> Option<&StepGroup> {
        self.procedure.sequence.get(self.counter + 1)
    }

    /// Increment the counter, then return `sequence[counter]` or an empty group
    /// past the end.
    ///
    /// The increment is unconditional: calling this twice without adopting the
    /// first result skips a step group. Use [`peek_step`](Self::peek_step) to
    /// look ahead.
    pub fn advance_step(&mut self) -> StepGroup {
        self.counter += 1;
        match self.procedure.sequence.get(self.counter) {
            Some(group) => group.clone(),
            None => {
                tracing::debug!(
                    procedure = %self.procedure.id,
                    counter = self.counter,
                    "step sequence exhausted"
                );
                StepGroup::new()
            }
        }
    }

    /// Check the current phase's table entry against the counter.
    ///
    /// A phase with no table entry is treated as terminal.
    pub fn advance_phase(&mut self) -> PhaseAdvance {
        let rule = self.procedure.phase_rule(&self.phase);
        let (next, threshold) = match rule {
            Some(rule) => (rule.next.clone(), rule.threshold),
            None => (None, 0),
        };

        match next {
            Some(next) if self.counter >= threshold => {
                tracing::info!(
                    procedure = %self.procedure.id,
                    from = %self.phase,
                    to = %next,
                    counter = self.counter,
                    "phase transition"
                );
                self.phase = next.clone();
                PhaseAdvance::Transitioned(next)
            }
            Some(_) => PhaseAdvance::NotYetDue,
            None => {
                tracing::info!(
                    procedure = %self.procedure.id,
                    phase = %self.phase,
                    "procedure completed"
                );
                self.ongoing = false;
                PhaseAdvance::Completed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProcedureCatalog;

    fn lego() -> ProcedureStateMachine {
        let catalog = ProcedureCatalog::builtin();
        ProcedureStateMachine::new(catalog.lookup("LegoAssembly").procedure().clone())
    }

    #[test]
    fn test_starts_at_first_phase() {
        let machine = lego();
        assert_eq!(machine.phase(), "Phase1");
        assert_eq!(machine.counter(), 0);
        assert!(machine.is_ongoing());
    }

    #[test]
    fn test_advance_step_exhausts_after_len_minus_one() {
        let mut machine = lego();
        let len = machine.procedure().sequence.len();
        for _ in 0..len - 1 {
            assert!(!machine.advance_step().is_empty());
        }
        assert!(machine.advance_step().is_empty());
    }

    #[test]
    fn test_double_advance_skips_a_group() {
        let mut machine = lego();
        let _unused = machine.advance_step();
        let second = machine.advance_step();
        assert_eq!(second, vec!["Step_A2_1".to_string()]);
        assert_eq!(machine.counter(), 2);
    }

    #[test]
    fn test_peek_does_not_move_counter() {
        let mut machine = lego();
        assert_eq!(machine.peek_step(), Some(&vec!["Step_A1_2".to_string()]));
        assert_eq!(machine.counter(), 0);
        assert_eq!(machine.advance_step(), vec!["Step_A1_2".to_string()]);
    }

    #[test]
    fn test_not_yet_due_still_reports_ongoing() {
        // "true" covers both a transition and a transition that is not due yet
        let mut machine = lego();
        machine.advance_step();
        let outcome = machine.advance_phase();
        assert_eq!(outcome, PhaseAdvance::NotYetDue);
        assert!(outcome.is_ongoing());
        assert_eq!(machine.phase(), "Phase1");
    }

    #[test]
    fn test_transition_at_threshold() {
        let mut machine = lego();
        for _ in 0..3 {
            machine.advance_step();
            assert_eq!(machine.advance_phase(), PhaseAdvance::NotYetDue);
        }
        machine.advance_step();
        let outcome = machine.advance_phase();
        assert_eq!(outcome, PhaseAdvance::Transitioned("Phase2".to_string()));
        assert!(outcome.is_ongoing());
        assert_eq!(machine.counter(), 4);
    }

    #[test]
    fn test_phases_never_regress() {
        let mut machine = lego();
        let order = ["Phase1", "Phase2", "Phase3", "Phase4", "Phase5"];
        let mut last = 0;
        while machine.is_ongoing() {
            machine.advance_step();
            machine.advance_phase();
            let idx = order.iter().position(|p| *p == machine.phase()).unwrap();
            assert!(idx >= last);
            last = idx;
        }
        assert_eq!(machine.phase(), "Phase5");
    }

    #[test]
    fn test_terminal_phase_completes() {
        let catalog = ProcedureCatalog::builtin();
        let mut machine =
            ProcedureStateMachine::new(catalog.lookup("MicrosurgicalProcedure").procedure().clone());
        for _ in 0..4 {
            machine.advance_step();
            machine.advance_phase();
        }
        assert_eq!(machine.phase(), "Phase3");
        let outcome = machine.advance_phase();
        assert_eq!(outcome, PhaseAdvance::Completed);
        assert!(!outcome.is_ongoing());
        assert!(!machine.is_ongoing());
    }
}
