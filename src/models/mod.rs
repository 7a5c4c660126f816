pub mod procedure;
pub mod sensor;
pub mod session;
pub mod validation;

pub use procedure::{PhaseRule, ProcedureDefinition, StepGroup};
pub use sensor::{ProcedureEvents, SensorAction, SensorDataSet, SensorEvent, SensorObject, SensorTriple};
pub use session::{CycleOutcome, SessionSnapshot, StepMessage};
pub use validation::{ValidationReport, Violation};
