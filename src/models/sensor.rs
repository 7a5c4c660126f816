use crate::error::{SimError, SimResult};
use crate::graph::{typed, NamedNode, Term, Triple, PROV, TWIN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// What a sensor event does with its triples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorAction {
    #[default]
    Add,
    Remove,
}

/// Object position of a sensor triple as it appears in the JSON feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorObject {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SensorObject {
    /// Convert to a store term.
    ///
    /// Booleans and numbers become typed literals. A string that is all digits
    /// once `.` and `-` are stripped is read as a number (float when it has a
    /// `.`); anything else, including unparsable numerics, is a twin IRI.
    pub fn to_term(&self) -> SimResult<Term> {
        let term = match self {
            SensorObject::Bool(b) => typed(b.to_string(), "boolean"),
            SensorObject::Integer(i) => typed(i.to_string(), "integer"),
            SensorObject::Float(f) => typed(format_float(*f), "float"),
            SensorObject::Text(s) => {
                let stripped: String = s.chars().filter(|c| *c != '.' && *c != '-').collect();
                if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) {
                    if s.contains('.') {
                        if let Ok(f) = s.parse::<f64>() {
                            return Ok(typed(format_float(f), "float").into());
                        }
                    } else if let Ok(i) = s.parse::<i64>() {
                        return Ok(typed(i.to_string(), "integer").into());
                    }
                }
                return resource(TWIN, s).map(Term::from);
            }
        };
        Ok(term.into())
    }
}

/// Feed names become IRIs only when they form a valid one
fn resource(namespace: &str, name: &str) -> SimResult<NamedNode> {
    NamedNode::new(format!("{}{}", namespace, name))
        .map_err(|e| SimError::InvalidTriple(format!("'{}' is not a valid resource name: {}", name, e)))
}

/// Floats keep a fractional part in their lexical form ("2.0", not "2")
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

/// One triple of a sensor event, in feed notation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorTriple {
    pub subject: String,
    pub predicate: String,
    pub object: SensorObject,
}

impl SensorTriple {
    /// Resolve into a store triple.
    ///
    /// Subjects are twin IRIs. Predicates with a `prov:` or `twin:` prefix map to
    /// that namespace; any other prefixed name is taken whole into the twin namespace.
    pub fn to_triple(&self) -> SimResult<Triple> {
        if self.subject.trim().is_empty() || self.predicate.trim().is_empty() {
            return Err(SimError::InvalidTriple(format!(
                "empty subject or predicate in sensor triple {:?}",
                self
            )));
        }

        let predicate = match self.predicate.split_once(':') {
            Some(("prov", local)) => resource(PROV, local)?,
            Some(("twin", local)) => resource(TWIN, local)?,
            _ => resource(TWIN, &self.predicate)?,
        };

        Ok(Triple::new(
            resource(TWIN, &self.subject)?,
            predicate,
            self.object.to_term()?,
        ))
    }
}

/// Sensor readings recorded for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    #[serde(default)]
    pub triples: Vec<SensorTriple>,

    #[serde(default)]
    pub action: SensorAction,

    /// Diagnostic shown when the step fails validation
    #[serde(default)]
    pub message: Option<String>,
}

/// Sensor events of one procedure, keyed by step id
pub type ProcedureEvents = BTreeMap<String, SensorEvent>;

/// The whole sensor feed: `{ "procedures": { id: { step: event } } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorDataSet {
    #[serde(default)]
    pub procedures: BTreeMap<String, ProcedureEvents>,
}

impl SensorDataSet {
    pub fn from_json(content: &str) -> SimResult<Self> {
        let data: SensorDataSet =
            serde_json::from_str(content).map_err(|e| SimError::SensorData(e.to_string()))?;
        data.check()?;
        Ok(data)
    }

    pub fn load(path: &Path) -> SimResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        let data = Self::from_json(&content)?;
        tracing::info!(
            path = %path.display(),
            procedures = data.procedures.len(),
            "sensor data loaded"
        );
        Ok(data)
    }

    /// Events bound to a procedure; empty when the feed has none for it
    pub fn events_for(&self, procedure_id: &str) -> ProcedureEvents {
        self.procedures.get(procedure_id).cloned().unwrap_or_default()
    }

    /// Reject triples that could never be applied, so bad data fails at load time
    fn check(&self) -> SimResult<()> {
        for (procedure, steps) in &self.procedures {
            for (step, event) in steps {
                for triple in &event.triples {
                    triple.to_triple().map_err(|e| {
                        SimError::SensorData(format!("{}/{}: {}", procedure, step, e))
                    })?;
                }
            }
        }
        Ok(())
    }
}
