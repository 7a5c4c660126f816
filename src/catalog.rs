//! Procedure catalog: step sequences and phase tables per procedure.
//!
//! Loaded once at startup and never mutated. Unknown procedure ids resolve to
//! the default procedure, but [`ProcedureCatalog::lookup`] tags that fallback
//! so callers can tell it apart from a real match.

use crate::error::{SimError, SimResult};
use crate::models::{PhaseRule, ProcedureDefinition, StepGroup};

/// Procedure used when a lookup misses
pub const DEFAULT_PROCEDURE: &str = "LegoAssembly";

/// Result of a catalog lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEntry<'a> {
    /// The requested procedure's own configuration
    Found(&'a ProcedureDefinition),
    /// The requested id is not in the catalog; this is the default's configuration
    Unknown(&'a ProcedureDefinition),
}

impl<'a> CatalogEntry<'a> {
    pub fn procedure(&self) -> &'a ProcedureDefinition {
        match self {
            CatalogEntry::Found(def) | CatalogEntry::Unknown(def) => def,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, CatalogEntry::Found(_))
    }
}

#[derive(Debug, Clone)]
pub struct ProcedureCatalog {
    /// Declaration order is preserved for listings
    procedures: Vec<ProcedureDefinition>,
    default_index: usize,
}

impl ProcedureCatalog {
    /// Build a catalog; every definition must be consistent and the default must exist
    pub fn new(procedures: Vec<ProcedureDefinition>, default_id: &str) -> SimResult<Self> {
        for def in &procedures {
            def.check().map_err(SimError::Config)?;
        }
        let default_index = procedures
            .iter()
            .position(|p| p.id == default_id)
            .ok_or_else(|| {
                SimError::Config(format!("default procedure '{}' is not defined", default_id))
            })?;

        Ok(Self {
            procedures,
            default_index,
        })
    }

    /// The four procedures shipped with the simulator
    pub fn builtin() -> Self {
        Self {
            procedures: builtin_procedures(),
            default_index: 0,
        }
    }

    /// Built-in catalog with `overrides` replacing same-id entries and appending new ones
    pub fn with_overrides(overrides: Vec<ProcedureDefinition>, default_id: &str) -> SimResult<Self> {
        let mut procedures = builtin_procedures();
        for def in overrides {
            match procedures.iter_mut().find(|p| p.id == def.id) {
                Some(existing) => *existing = def,
                None => procedures.push(def),
            }
        }
        Self::new(procedures, default_id)
    }

    pub fn lookup(&self, procedure_id: &str) -> CatalogEntry<'_> {
        match self.procedures.iter().find(|p| p.id == procedure_id) {
            Some(def) => CatalogEntry::Found(def),
            None => CatalogEntry::Unknown(self.default_procedure()),
        }
    }

    pub fn contains(&self, procedure_id: &str) -> bool {
        self.lookup(procedure_id).is_found()
    }

    pub fn default_procedure(&self) -> &ProcedureDefinition {
        &self.procedures[self.default_index]
    }

    pub fn initial_steps(&self, procedure_id: &str) -> &StepGroup {
        &self.lookup(procedure_id).procedure().initial_steps
    }

    pub fn sequence(&self, procedure_id: &str) -> &[StepGroup] {
        &self.lookup(procedure_id).procedure().sequence
    }

    pub fn phase_table(&self, procedure_id: &str) -> &[PhaseRule] {
        &self.lookup(procedure_id).procedure().phases
    }

    /// Procedure ids in declaration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.procedures.iter().map(|p| p.id.as_str())
    }

    pub fn procedures(&self) -> &[ProcedureDefinition] {
        &self.procedures
    }
}

impl Default for ProcedureCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_procedures() -> Vec<ProcedureDefinition> {
    vec![
        ProcedureDefinition::from_parts(
            DEFAULT_PROCEDURE,
            &["Step_A1_1"],
            &[
                &["Step_A1_1"],
                &["Step_A1_2"],
                &["Step_A2_1"],
                &["Step_A2_2"],
                &["Step_A2_3"],
                &["Step_A3_1"],
                &["Step_A3_2"],
                &["Step_A4_1"],
                &["Step_A4_2"],
                &["Step_A4_3"],
                &["Step_A4_4"],
                &["Step_A5_1"],
                &["Step_A5_2"],
            ],
            &[
                ("Phase1", Some("Phase2"), 4),
                ("Phase2", Some("Phase3"), 7),
                ("Phase3", Some("Phase4"), 10),
                ("Phase4", Some("Phase5"), 13),
                ("Phase5", None, 0),
            ],
        ),
        ProcedureDefinition::from_parts(
            "LaparoscopicProcedure",
            &["Step_L1_1"],
            &[
                &["Step_L1_1"],
                &["Step_L1_2"],
                &["Step_L2_1"],
                &["Step_L2_2"],
                &["Step_L3_1"],
                &["Step_L3_2"],
                &["Step_L3_3"],
            ],
            &[
                ("Phase1", Some("Phase2"), 2),
                ("Phase2", Some("Phase3"), 5),
                ("Phase3", None, 0),
            ],
        ),
        ProcedureDefinition::from_parts(
            "MicrosurgicalProcedure",
            &["Step_M1_1"],
            &[
                &["Step_M1_1"],
                &["Step_M1_2"],
                &["Step_M2_1"],
                &["Step_M2_2"],
                &["Step_M3_1"],
                &["Step_M3_2"],
            ],
            &[
                ("Phase1", Some("Phase2"), 2),
                ("Phase2", Some("Phase3"), 4),
                ("Phase3", None, 0),
            ],
        ),
        ProcedureDefinition::from_parts(
            "RoboticProcedure",
            &["Step_R1_1"],
            &[
                &["Step_R1_1"],
                &["Step_R1_2"],
                &["Step_R2_1"],
                &["Step_R2_2"],
                &["Step_R2_3"],
                &["Step_R3_1"],
            ],
            &[
                ("Phase1", Some("Phase2"), 2),
                ("Phase2", Some("Phase3"), 5),
                ("Phase3", None, 0),
            ],
        ),
    ]
}
