// Ortwin - Operating-room digital twin
// Drives a procedure step by step from sensor events and checks every
// mutation of the knowledge base against a declarative shape set

pub mod applier;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod models;
pub mod query;
pub mod server;
pub mod session;
pub mod state;
pub mod validator;

pub use anyhow::{Context, Result};
pub use colored::Colorize;

// Re-export commonly used types
pub use applier::{Checkpoint, SensorEventApplier};
pub use catalog::{CatalogEntry, ProcedureCatalog};
pub use error::{SimError, SimResult};
pub use graph::{KnowledgeStore, MemoryStore, Term, Triple};
pub use models::{CycleOutcome, ProcedureDefinition, SensorDataSet, SessionSnapshot, ValidationReport, Violation};
pub use session::SessionController;
pub use state::{PhaseAdvance, ProcedureStateMachine};
pub use validator::{ConstraintEngine, ShapeEngine, ShapeSet, ValidationOrchestrator};
