//! Validation against the declarative shape set.
//!
//! The [`ConstraintEngine`] trait is the seam to whatever evaluates the
//! constraints; [`ValidationOrchestrator`] drives it with fixed options and
//! turns its result graph into a [`ValidationReport`].

pub mod inference;
pub mod shapes;

pub use shapes::{Shape, ShapeEngine, ShapeSet, ShapeSeverity};

use crate::error::{SimError, SimResult};
use crate::graph::{term_value, KnowledgeStore, MemoryStore, Term};
use crate::models::{ValidationReport, Violation};
use oxigraph::model::GraphNameRef;
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use std::collections::BTreeMap;
use std::time::Instant;

/// Inference run over a copy of the data before checking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inference {
    None,
    Rdfs,
}

/// Options passed to the constraint engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    pub inference: Inference,
    /// Stop at the first result
    pub abort_on_first: bool,
    /// Info-level results do not break conformance
    pub allow_infos: bool,
    /// Warning-level results do not break conformance
    pub allow_warnings: bool,
}

impl CheckOptions {
    /// Options used for every session validation: RDFS inference, collect all
    /// results, only violations count against conformance
    pub fn session() -> Self {
        Self {
            inference: Inference::Rdfs,
            abort_on_first: false,
            allow_infos: true,
            allow_warnings: true,
        }
    }
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self::session()
    }
}

/// Raw engine result
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub conforms: bool,
    /// Results in the `sh:` vocabulary
    pub results: MemoryStore,
    pub report_text: String,
}

/// A constraint checker
pub trait ConstraintEngine: Send + Sync {
    fn check(
        &self,
        data: &dyn KnowledgeStore,
        shapes: &ShapeSet,
        options: &CheckOptions,
    ) -> SimResult<EngineOutput>;
}

pub struct ValidationOrchestrator {
    engine: Box<dyn ConstraintEngine>,
    shapes: ShapeSet,
    options: CheckOptions,
}

impl ValidationOrchestrator {
    pub fn new(engine: Box<dyn ConstraintEngine>, shapes: ShapeSet) -> Self {
        Self {
            engine,
            shapes,
            options: CheckOptions::session(),
        }
    }

    /// Orchestrator over the built-in [`ShapeEngine`]
    pub fn with_shapes(shapes: ShapeSet) -> Self {
        Self::new(Box::new(ShapeEngine), shapes)
    }

    pub fn shapes(&self) -> &ShapeSet {
        &self.shapes
    }

    /// Validate against the orchestrator's own shape set
    pub fn validate(&self, store: &dyn KnowledgeStore) -> SimResult<ValidationReport> {
        self.validate_against(store, &self.shapes)
    }

    /// Run the engine and build a fresh report.
    ///
    /// Synchronous and potentially slow: inference is recomputed on every call.
    /// Engine failures propagate unchanged.
    pub fn validate_against(
        &self,
        store: &dyn KnowledgeStore,
        shapes: &ShapeSet,
    ) -> SimResult<ValidationReport> {
        let started = Instant::now();
        let output = self.engine.check(store, shapes, &self.options).map_err(|e| {
            tracing::error!(error = %e, "constraint engine failed");
            e
        })?;

        let violations = if output.conforms {
            Vec::new()
        } else {
            extract_violations(&output.results)?
        };

        tracing::info!(
            conforms = output.conforms,
            violations = violations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "validation finished"
        );

        Ok(ValidationReport {
            conforms: output.conforms,
            violations,
            report_text: output.report_text,
            results_graph: output.results,
        })
    }
}

/// Result rows: one per `sh:ValidationResult` with a focus node and a message
const VIOLATIONS_QUERY: &str = r#"
PREFIX sh: <http://www.w3.org/ns/shacl#>
SELECT ?result ?focusNode ?path ?message ?value ?severity
WHERE {
    ?result a sh:ValidationResult ;
        sh:focusNode ?focusNode ;
        sh:resultMessage ?message .
    OPTIONAL { ?result sh:resultPath ?path }
    OPTIONAL { ?result sh:value ?value }
    OPTIONAL { ?result sh:resultSeverity ?severity }
}
"#;

/// Pull violations out of a result graph.
///
/// Results missing a focus node or a message are dropped. Path, value and
/// severity are optional. Focus node and path are cut after the last `/`,
/// severity after the last `#`; the value keeps its full string form. When a
/// property has several values the first row per result wins. Violations come
/// back ordered by result node.
pub fn extract_violations(results: &dyn KnowledgeStore) -> SimResult<Vec<Violation>> {
    let store = Store::new().map_err(engine_error)?;
    store
        .extend(results.iter().map(|t| t.in_graph(GraphNameRef::DefaultGraph)))
        .map_err(engine_error)?;

    let QueryResults::Solutions(solutions) = store.query(VIOLATIONS_QUERY).map_err(engine_error)?
    else {
        return Err(SimError::Engine("violation query returned no solutions".into()));
    };

    let mut by_result = BTreeMap::new();
    for solution in solutions {
        let solution = solution.map_err(engine_error)?;
        let (Some(result), Some(focus), Some(message)) = (
            solution.get("result"),
            solution.get("focusNode"),
            solution.get("message"),
        ) else {
            continue;
        };

        by_result
            .entry(term_value(result.as_ref()).to_string())
            .or_insert_with(|| Violation {
                focus_node: Some(segment(focus, '/')),
                path: solution.get("path").map(|p| segment(p, '/')),
                message: Some(term_value(message.as_ref()).to_string()),
                value: solution.get("value").map(|v| term_value(v.as_ref()).to_string()),
                severity: solution.get("severity").map(|s| segment(s, '#')),
                sensor_message: None,
            });
    }
    Ok(by_result.into_values().collect())
}

fn engine_error(err: impl std::fmt::Display) -> SimError {
    SimError::Engine(err.to_string())
}

/// Trailing segment of an identifier; literals keep their lexical form
fn segment(term: &Term, separator: char) -> String {
    let value = term_value(term.as_ref());
    match term {
        Term::NamedNode(_) => value.rsplit(separator).next().unwrap_or(value).to_string(),
        _ => value.to_string(),
    }
}
