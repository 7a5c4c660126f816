//! Simulation sessions: one owned controller per running procedure

mod controller;

pub use controller::{SessionController, SimulationSession};

use crate::graph::vocab::{rdf, rdfs};
use crate::graph::{iri, twin, Literal, Triple, OWL};

/// An actor guaranteed to exist once a session is initialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaselineActor {
    pub name: &'static str,
    pub actor_type: &'static str,
    pub capability: &'static str,
}

pub const BASELINE_ACTORS: &[BaselineActor] = &[
    BaselineActor { name: "Surgeon", actor_type: "Surgeon", capability: "Standard_Vision" },
    BaselineActor { name: "Nurse", actor_type: "Nurse", capability: "Standard_Vision" },
    BaselineActor { name: "Robotic_Arm", actor_type: "Actor", capability: "Micro_Vision" },
    BaselineActor {
        name: "ChiefSurgeon",
        actor_type: "Surgeon",
        capability: "MicroManipulationSkill",
    },
    BaselineActor {
        name: "SurgicalRobot",
        actor_type: "Robot",
        capability: "MicroManipulationSkill",
    },
];

impl BaselineActor {
    pub fn triples(&self) -> [Triple; 3] {
        let actor = twin(self.name);
        [
            Triple::new(actor.clone(), rdf::TYPE, twin(self.actor_type)),
            Triple::new(actor.clone(), rdf::TYPE, iri(OWL, "NamedIndividual")),
            Triple::new(actor, twin("hasCapability"), twin(self.capability)),
        ]
    }
}

/// Triples declaring a procedure individual
pub fn procedure_triples(procedure_id: &str) -> [Triple; 2] {
    let procedure = twin(procedure_id);
    [
        Triple::new(
            procedure.clone(),
            rdf::TYPE,
            twin("SurgicalProcedure"),
        ),
        Triple::new(procedure, rdfs::LABEL, Literal::new_simple_literal(procedure_id)),
    ]
}
