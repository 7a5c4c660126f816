//! SessionController - the mutate → validate → advance cycle

use super::{procedure_triples, BASELINE_ACTORS};
use crate::applier::{Checkpoint, SensorEventApplier};
use crate::catalog::ProcedureCatalog;
use crate::error::SimResult;
use crate::graph::vocab::rdf;
use crate::graph::{twin, KnowledgeStore, MemoryStore};
use crate::models::{
    CycleOutcome, ProcedureEvents, SensorDataSet, SessionSnapshot, StepGroup, StepMessage,
    ValidationReport,
};
use crate::query;
use crate::state::ProcedureStateMachine;
use crate::validator::ValidationOrchestrator;
use chrono::Utc;
use uuid::Uuid;

/// Per-procedure state, replaced as a whole on init and switch
#[derive(Debug, Clone)]
pub struct SimulationSession {
    procedure_id: String,
    procedure_known: bool,
    machine: ProcedureStateMachine,
    active_steps: StepGroup,
    violation_occurred: bool,
    events: ProcedureEvents,
}

impl SimulationSession {
    /// Seed from the catalog; unknown ids keep their name but run the default procedure
    fn seed(catalog: &ProcedureCatalog, sensor_data: &SensorDataSet, procedure_id: &str) -> Self {
        let entry = catalog.lookup(procedure_id);
        let definition = entry.procedure();
        Self {
            procedure_id: procedure_id.to_string(),
            procedure_known: entry.is_found(),
            active_steps: definition.initial_steps.clone(),
            machine: ProcedureStateMachine::new(definition.clone()),
            violation_occurred: false,
            events: sensor_data.events_for(procedure_id),
        }
    }

    pub fn procedure_id(&self) -> &str {
        &self.procedure_id
    }

    pub fn is_procedure_known(&self) -> bool {
        self.procedure_known
    }

    pub fn machine(&self) -> &ProcedureStateMachine {
        &self.machine
    }

    pub fn active_steps(&self) -> &StepGroup {
        &self.active_steps
    }

    pub fn violation_occurred(&self) -> bool {
        self.violation_occurred
    }

    pub fn is_ongoing(&self) -> bool {
        self.machine.is_ongoing()
    }

    pub fn events(&self) -> &ProcedureEvents {
        &self.events
    }
}

/// Owns the store and one simulation session.
///
/// All operations are synchronous; share it behind a single mutex.
pub struct SessionController<S: KnowledgeStore = MemoryStore> {
    session_id: Uuid,
    store: S,
    catalog: ProcedureCatalog,
    sensor_data: SensorDataSet,
    orchestrator: ValidationOrchestrator,
    applier: SensorEventApplier<S>,
    session: SimulationSession,
    last_report: Option<ValidationReport>,
}

impl<S: KnowledgeStore> SessionController<S> {
    /// Build a controller and initialize it for `procedure_id`
    pub fn new(
        store: S,
        catalog: ProcedureCatalog,
        sensor_data: SensorDataSet,
        orchestrator: ValidationOrchestrator,
        procedure_id: &str,
    ) -> SimResult<Self> {
        let session = SimulationSession::seed(&catalog, &sensor_data, procedure_id);
        let mut controller = Self {
            session_id: Uuid::new_v4(),
            store,
            catalog,
            sensor_data,
            orchestrator,
            applier: SensorEventApplier::new(),
            session,
            last_report: None,
        };
        controller.init(procedure_id)?;
        Ok(controller)
    }

    /// Reset the session for `procedure_id` and make sure the baseline actors exist.
    ///
    /// Counter back to zero, ongoing, no violation. Actors that already have an
    /// `rdf:type` are left alone, so repeating `init` does not change the store.
    pub fn init(&mut self, procedure_id: &str) -> SimResult<()> {
        self.ensure_baseline_actors()?;
        self.session = SimulationSession::seed(&self.catalog, &self.sensor_data, procedure_id);
        self.declare_procedure()?;
        self.applier.clear();
        self.last_report = None;

        if !self.session.procedure_known {
            tracing::warn!(
                procedure = %procedure_id,
                fallback = %self.catalog.default_procedure().id,
                "unknown procedure, using default configuration"
            );
        }
        tracing::info!(
            session = %self.session_id,
            procedure = %procedure_id,
            steps = ?self.session.active_steps,
            "session initialized"
        );
        Ok(())
    }

    /// Switch to another catalog procedure.
    ///
    /// Returns `false` and changes nothing for an unknown id. Otherwise every
    /// session field is replaced at once and the procedure's sensor events are
    /// bound; baseline actors are not re-checked.
    pub fn switch_procedure(&mut self, procedure_id: &str) -> SimResult<bool> {
        if !self.catalog.contains(procedure_id) {
            tracing::warn!(procedure = %procedure_id, "switch to unknown procedure ignored");
            return Ok(false);
        }

        let session = SimulationSession::seed(&self.catalog, &self.sensor_data, procedure_id);
        let previous = std::mem::replace(&mut self.session, session);
        self.declare_procedure()?;
        self.applier.clear();
        self.last_report = None;

        tracing::info!(
            from = %previous.procedure_id,
            to = %procedure_id,
            "procedure switched"
        );
        Ok(true)
    }

    /// Run one cycle: apply the active group's sensor events, validate, and
    /// advance only if the store conforms.
    ///
    /// A violation leaves counter, phase and steps untouched; the checkpoint is
    /// kept but not restored. A finished procedure makes this a no-op.
    pub fn run_cycle(&mut self) -> SimResult<CycleOutcome> {
        if !self.session.is_ongoing() {
            tracing::debug!(procedure = %self.session.procedure_id, "cycle on finished procedure");
            return Ok(CycleOutcome {
                snapshot: self.get_state(),
                completed: false,
                applied_steps: StepGroup::new(),
                step_messages: Vec::new(),
            });
        }

        let applied_steps = self.session.active_steps.clone();
        self.applier
            .apply(&mut self.store, &applied_steps, &self.session.events)?;

        let report = self.run_validation()?;
        self.session.violation_occurred = !report.conforms;

        let mut completed = false;
        let mut step_messages = Vec::new();
        if report.conforms {
            let next = self.session.machine.advance_step();
            if !next.is_empty() {
                self.session.active_steps = next;
            }
            completed = !self.session.machine.advance_phase().is_ongoing();
        } else {
            step_messages = self.step_messages(&applied_steps);
            tracing::warn!(
                procedure = %self.session.procedure_id,
                steps = ?applied_steps,
                violations = report.violations.len(),
                "validation failed, progression halted"
            );
        }

        self.last_report = Some(report);
        Ok(CycleOutcome {
            snapshot: self.get_state(),
            completed,
            applied_steps,
            step_messages,
        })
    }

    /// Validate the store as it is, without mutating it or the session
    pub fn validate_now(&mut self) -> SimResult<ValidationReport> {
        let report = self.run_validation()?;
        self.last_report = Some(report.clone());
        Ok(report)
    }

    pub fn get_state(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            procedure_id: self.session.procedure_id.clone(),
            procedure_known: self.session.procedure_known,
            phase_id: self.session.machine.phase().to_string(),
            active_step_group: self.session.active_steps.clone(),
            step_counter: self.session.machine.counter(),
            ongoing: self.session.is_ongoing(),
            violation_occurred: self.session.violation_occurred,
            last_validation_report: self.last_report.clone(),
            available_procedures: self.catalog.ids().map(String::from).collect(),
            timestamp: Utc::now(),
        }
    }

    /// Restore the store to the checkpoint taken before the last application.
    ///
    /// Session progression is not touched. Returns `false` when no checkpoint
    /// is held.
    pub fn rollback(&mut self) -> bool {
        self.applier.rollback(&mut self.store)
    }

    pub fn checkpoint(&self) -> Option<&Checkpoint<S>> {
        self.applier.checkpoint()
    }

    /// Answer a question about the active step group
    pub fn answer_question(&self, question: &str) -> String {
        query::answer_question(&self.store, &self.session.active_steps, question)
    }

    pub fn session(&self) -> &SimulationSession {
        &self.session
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &ProcedureCatalog {
        &self.catalog
    }

    pub fn last_report(&self) -> Option<&ValidationReport> {
        self.last_report.as_ref()
    }

    fn run_validation(&self) -> SimResult<ValidationReport> {
        let mut report = self.orchestrator.validate(&self.store)?;
        for violation in &mut report.violations {
            violation.sensor_message = self
                .session
                .events
                .get(violation.focus_node())
                .and_then(|event| event.message.clone());
        }
        Ok(report)
    }

    fn step_messages(&self, steps: &[String]) -> Vec<StepMessage> {
        steps
            .iter()
            .filter_map(|step| {
                let message = self.session.events.get(step)?.message.clone()?;
                Some(StepMessage {
                    step_id: step.clone(),
                    message,
                })
            })
            .collect()
    }

    fn ensure_baseline_actors(&mut self) -> SimResult<()> {
        let mut added = 0;
        for actor in BASELINE_ACTORS {
            let subject = twin(actor.name);
            let typed = !self.store.objects(subject.as_ref().into(), rdf::TYPE).is_empty();
            if typed {
                continue;
            }
            for triple in actor.triples() {
                self.store.add(triple)?;
            }
            added += 1;
        }
        if added > 0 {
            tracing::debug!(added, "baseline actors inserted");
        }
        Ok(())
    }

    fn declare_procedure(&mut self) -> SimResult<()> {
        for triple in procedure_triples(&self.session.procedure_id) {
            self.store.add(triple)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Triple;
    use crate::validator::ShapeSet;

    const SENSOR_DATA: &str = r#"{
        "procedures": {
            "LegoAssembly": {
                "Step_A1_1": {
                    "triples": [{"subject": "Step_A1_1", "predicate": "hasInstrument", "object": "Gripper"}],
                    "action": "add"
                },
                "Step_A1_2": {
                    "triples": [{"subject": "Step_A1_2", "predicate": "forceValue", "object": "high"}],
                    "action": "add",
                    "message": "Force sensor reading is not numeric"
                }
            },
            "RoboticProcedure": {}
        }
    }"#;

    const FORCE_SHAPE: &str = r#"
        [[shapes]]
        name = "ForceShape"
        target_class = "twin:Step"
        path = "twin:forceValue"
        datatype = "xsd:float"
        message = "Force must be a float"
    "#;

    fn ontology() -> MemoryStore {
        let mut store = MemoryStore::new();
        for step in ["Step_A1_1", "Step_A1_2"] {
            store.add(Triple::new(twin(step), rdf::TYPE, twin("Step"))).unwrap();
        }
        store
            .add(Triple::new(twin("Step_A1_2"), twin("hasInstrument"), twin("Forceps")))
            .unwrap();
        store
    }

    fn controller(shapes: ShapeSet, procedure: &str) -> SessionController {
        SessionController::new(
            ontology(),
            ProcedureCatalog::builtin(),
            SensorDataSet::from_json(SENSOR_DATA).unwrap(),
            ValidationOrchestrator::with_shapes(shapes),
            procedure,
        )
        .unwrap()
    }

    #[test]
    fn test_init_seeds_session() {
        let ctl = controller(ShapeSet::default(), "LegoAssembly");
        let state = ctl.get_state();
        assert_eq!(state.procedure_id, "LegoAssembly");
        assert_eq!(state.phase_id, "Phase1");
        assert_eq!(state.active_step_group, vec!["Step_A1_1".to_string()]);
        assert_eq!(state.step_counter, 0);
        assert!(state.ongoing);
        assert!(!state.violation_occurred);
        assert!(state.last_validation_report.is_none());
        assert_eq!(state.available_procedures.len(), 4);
    }

    #[test]
    fn test_init_inserts_actors_and_procedure() {
        let ctl = controller(ShapeSet::default(), "LegoAssembly");
        let store = ctl.store();
        assert!(store.contains(&Triple::new(twin("Robotic_Arm"), rdf::TYPE, twin("Actor"))));
        assert!(store.contains(&Triple::new(
            twin("LegoAssembly"),
            rdf::TYPE,
            twin("SurgicalProcedure")
        )));
    }

    #[test]
    fn test_existing_actor_is_not_touched() {
        let mut store = ontology();
        store
            .add(Triple::new(twin("Nurse"), rdf::TYPE, twin("Scrub")))
            .unwrap();
        let ctl = SessionController::new(
            store,
            ProcedureCatalog::builtin(),
            SensorDataSet::default(),
            ValidationOrchestrator::with_shapes(ShapeSet::default()),
            "LegoAssembly",
        )
        .unwrap();
        let nurse = twin("Nurse");
        assert!(ctl
            .store()
            .objects(nurse.as_ref().into(), twin("hasCapability").as_ref())
            .is_empty());
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut ctl = controller(ShapeSet::default(), "LegoAssembly");
        let before = ctl.store().clone();
        ctl.init("LegoAssembly").unwrap();
        assert_eq!(ctl.store(), &before);
    }

    #[test]
    fn test_conforming_cycle_advances() {
        let mut ctl = controller(ShapeSet::default(), "LegoAssembly");
        let outcome = ctl.run_cycle().unwrap();
        assert_eq!(outcome.applied_steps, vec!["Step_A1_1".to_string()]);
        assert_eq!(outcome.snapshot.step_counter, 1);
        assert_eq!(outcome.snapshot.active_step_group, vec!["Step_A1_2".to_string()]);
        assert_eq!(outcome.snapshot.phase_id, "Phase1");
        assert!(!outcome.completed);
        assert!(ctl.store().contains(&Triple::new(
            twin("Step_A1_1"),
            twin("hasInstrument"),
            twin("Gripper")
        )));
    }

    #[test]
    fn test_violation_halts_progression() {
        let mut ctl = controller(ShapeSet::from_toml(FORCE_SHAPE).unwrap(), "LegoAssembly");
        ctl.run_cycle().unwrap();

        let outcome = ctl.run_cycle().unwrap();
        let state = &outcome.snapshot;
        assert!(state.violation_occurred);
        assert_eq!(state.step_counter, 1);
        assert_eq!(state.active_step_group, vec!["Step_A1_2".to_string()]);
        assert_eq!(
            outcome.step_messages,
            vec![StepMessage {
                step_id: "Step_A1_2".into(),
                message: "Force sensor reading is not numeric".into(),
            }]
        );

        let report = state.last_validation_report.as_ref().unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].focus_node(), "Step_A1_2");
        assert_eq!(
            report.violations[0].sensor_message.as_deref(),
            Some("Force sensor reading is not numeric")
        );

        // The bad reading stays in the store until rolled back
        let bad = Triple::new(twin("Step_A1_2"), twin("forceValue"), twin("high"));
        assert!(ctl.store().contains(&bad));
        assert!(ctl.rollback());
        assert!(!ctl.store().contains(&bad));
        assert!(!ctl.rollback());
    }

    #[test]
    fn test_init_every_catalog_procedure() {
        let mut ctl = controller(ShapeSet::from_toml(FORCE_SHAPE).unwrap(), "LegoAssembly");
        ctl.run_cycle().unwrap();
        ctl.run_cycle().unwrap();
        assert!(ctl.get_state().violation_occurred);

        let catalog = ProcedureCatalog::builtin();
        for id in catalog.ids() {
            ctl.init(id).unwrap();
            let state = ctl.get_state();
            let procedure = catalog.lookup(id).procedure();
            assert_eq!(state.procedure_id, id);
            assert!(state.procedure_known, "{}", id);
            assert_eq!(state.step_counter, 0, "{}", id);
            assert_eq!(state.phase_id, procedure.initial_phase(), "{}", id);
            assert_eq!(&state.active_step_group, catalog.initial_steps(id), "{}", id);
            assert!(state.ongoing, "{}", id);
            assert!(!state.violation_occurred, "{}", id);
            assert!(ctl.checkpoint().is_none(), "{}", id);
        }
    }

    #[test]
    fn test_switch_unknown_preserves_halted_session() {
        let feed = r#"{
            "procedures": {
                "LegoAssembly": {
                    "Step_A2_3": {
                        "triples": [{"subject": "Step_A2_3", "predicate": "forceValue", "object": "high"}],
                        "action": "add",
                        "message": "Force gauge offline"
                    }
                }
            }
        }"#;
        let mut store = ontology();
        store.add(Triple::new(twin("Step_A2_3"), rdf::TYPE, twin("Step"))).unwrap();
        let mut ctl = SessionController::new(
            store,
            ProcedureCatalog::builtin(),
            SensorDataSet::from_json(feed).unwrap(),
            ValidationOrchestrator::with_shapes(ShapeSet::from_toml(FORCE_SHAPE).unwrap()),
            "LegoAssembly",
        )
        .unwrap();

        // Four clean cycles cross into Phase2, the fifth trips the force shape
        for _ in 0..5 {
            ctl.run_cycle().unwrap();
        }
        let before = ctl.get_state();
        assert!(before.violation_occurred);
        assert_eq!(before.phase_id, "Phase2");
        assert_eq!(before.step_counter, 4);
        assert_eq!(before.active_step_group, vec!["Step_A2_3".to_string()]);
        let events_before = ctl.session().events().clone();
        assert!(events_before.contains_key("Step_A2_3"));
        let store_before = ctl.store().clone();

        assert!(!ctl.switch_procedure("HeartTransplant").unwrap());

        let after = ctl.get_state();
        assert_eq!(after.session_id, before.session_id);
        assert_eq!(after.procedure_id, before.procedure_id);
        assert_eq!(after.procedure_known, before.procedure_known);
        assert_eq!(after.phase_id, before.phase_id);
        assert_eq!(after.active_step_group, before.active_step_group);
        assert_eq!(after.step_counter, before.step_counter);
        assert_eq!(after.ongoing, before.ongoing);
        assert_eq!(after.violation_occurred, before.violation_occurred);
        assert_eq!(after.last_validation_report, before.last_validation_report);
        assert_eq!(after.available_procedures, before.available_procedures);
        assert_eq!(ctl.session().events(), &events_before);
        assert_eq!(ctl.store(), &store_before);
        assert!(ctl.checkpoint().is_some());
    }

    #[test]
    fn test_switch_reseeds_session() {
        let mut ctl = controller(ShapeSet::default(), "LegoAssembly");
        ctl.run_cycle().unwrap();
        assert!(ctl.switch_procedure("RoboticProcedure").unwrap());
        let state = ctl.get_state();
        assert_eq!(state.procedure_id, "RoboticProcedure");
        assert_eq!(state.phase_id, "Phase1");
        assert_eq!(state.step_counter, 0);
        assert_eq!(state.active_step_group, vec!["Step_R1_1".to_string()]);
        assert!(ctl.checkpoint().is_none());
        assert!(ctl.store().contains(&Triple::new(
            twin("RoboticProcedure"),
            rdf::TYPE,
            twin("SurgicalProcedure")
        )));
    }

    #[test]
    fn test_unknown_initial_procedure_uses_default() {
        let ctl = controller(ShapeSet::default(), "Appendectomy");
        let state = ctl.get_state();
        assert_eq!(state.procedure_id, "Appendectomy");
        assert!(!state.procedure_known);
        assert_eq!(state.active_step_group, vec!["Step_A1_1".to_string()]);
    }

    #[test]
    fn test_microsurgical_runs_to_completion() {
        let mut ctl = controller(ShapeSet::default(), "MicrosurgicalProcedure");
        let mut cycles = 0;
        let mut completed = false;
        while ctl.session().is_ongoing() {
            completed = ctl.run_cycle().unwrap().completed;
            cycles += 1;
            assert!(cycles < 20);
        }
        assert!(completed);
        assert_eq!(ctl.get_state().phase_id, "Phase3");

        // Finished sessions ignore further cycles
        let outcome = ctl.run_cycle().unwrap();
        assert!(outcome.applied_steps.is_empty());
        assert_eq!(outcome.snapshot.step_counter, ctl.get_state().step_counter);
    }

    #[test]
    fn test_validate_now_keeps_violation_flag() {
        let mut ctl = controller(ShapeSet::from_toml(FORCE_SHAPE).unwrap(), "LegoAssembly");
        ctl.store
            .add(Triple::new(twin("Step_A1_1"), twin("forceValue"), twin("bad")))
            .unwrap();
        let report = ctl.validate_now().unwrap();
        assert!(!report.conforms);
        assert!(!ctl.get_state().violation_occurred);
        assert!(ctl.last_report().is_some());
    }

    #[test]
    fn test_answer_question_uses_active_steps() {
        let mut ctl = controller(ShapeSet::default(), "LegoAssembly");
        assert_eq!(
            ctl.answer_question("which instrument?"),
            "No specific instruments required for current steps"
        );
        ctl.run_cycle().unwrap();
        // Active group moved on to Step_A1_2; the Gripper belongs to Step_A1_1
        assert_eq!(ctl.answer_question("which instrument?"), "Instruments needed: Forceps");
    }
}
