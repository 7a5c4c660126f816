use crate::graph::MemoryStore;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Placeholder shown for an absent focus node
pub const UNKNOWN_FOCUS: &str = "Unknown";
/// Placeholder shown for an absent path or value
pub const NOT_AVAILABLE: &str = "N/A";
/// Placeholder shown for an absent message
pub const NO_MESSAGE: &str = "No message";
/// Severity assumed when the engine reports none
pub const DEFAULT_SEVERITY: &str = "Violation";

/// One structured non-conformance finding.
///
/// Every field may be missing upstream; accessors substitute the display
/// placeholders so callers never see an empty slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violation {
    pub focus_node: Option<String>,
    pub path: Option<String>,
    pub message: Option<String>,
    pub value: Option<String>,
    pub severity: Option<String>,
    /// Sensor diagnostic attached when the focus node is a step with sensor data
    pub sensor_message: Option<String>,
}

impl Violation {
    pub fn focus_node(&self) -> &str {
        self.focus_node.as_deref().unwrap_or(UNKNOWN_FOCUS)
    }

    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or(NOT_AVAILABLE)
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or(NO_MESSAGE)
    }

    pub fn value(&self) -> &str {
        self.value.as_deref().unwrap_or(NOT_AVAILABLE)
    }

    pub fn severity(&self) -> &str {
        self.severity.as_deref().unwrap_or(DEFAULT_SEVERITY)
    }

    /// Format for terminal display
    pub fn format(&self, index: usize) -> String {
        let mut out = format!(
            "{}. Node: {}\n   Path: {}\n   Message: {}",
            index,
            self.focus_node(),
            self.path(),
            self.message()
        );
        if self.value.is_some() {
            out.push_str(&format!("\n   Value: {}", self.value()));
        }
        out
    }
}

impl Serialize for Violation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Violation", 6)?;
        state.serialize_field("focusNode", self.focus_node())?;
        state.serialize_field("path", self.path())?;
        state.serialize_field("message", self.message())?;
        state.serialize_field("value", self.value())?;
        state.serialize_field("severity", self.severity())?;
        if let Some(msg) = &self.sensor_message {
            state.serialize_field("sensorMessage", msg)?;
        } else {
            state.skip_field("sensorMessage")?;
        }
        state.end()
    }
}

/// Outcome of one validation pass. Rebuilt from scratch on every call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub conforms: bool,
    pub violations: Vec<Violation>,
    /// Engine's human-readable report
    pub report_text: String,
    /// Engine's raw result graph, kept for diagnostics
    pub results_graph: MemoryStore,
}

impl ValidationReport {
    /// A conforming report with nothing attached
    pub fn conforming() -> Self {
        Self {
            conforms: true,
            ..Self::default()
        }
    }

    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Format all violations for display
    pub fn format_violations(&self) -> String {
        self.violations
            .iter()
            .enumerate()
            .map(|(i, v)| v.format(i + 1))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Serialize for ValidationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationReport", 3)?;
        state.serialize_field("conforms", &self.conforms)?;
        state.serialize_field("violations", &self.violations)?;
        state.serialize_field("report", &self.report_text)?;
        state.end()
    }
}
