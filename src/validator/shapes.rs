//! Shape definitions and the built-in shape engine.
//!
//! Shapes are declared in TOML:
//!
//! ```toml
//! [[shapes]]
//! name = "StepInstrumentShape"
//! target_class = "twin:Step"
//! path = "twin:hasInstrument"
//! min_count = 1
//! class = "twin:Instrument"
//! message = "Step requires an instrument"
//! ```
//!
//! Names are prefixed names, bare twin names, or full IRIs.

use super::inference::rdfs_closure;
use super::{CheckOptions, ConstraintEngine, EngineOutput, Inference};
use crate::error::{SimError, SimResult};
use crate::graph::vocab::rdf;
use crate::graph::{
    as_subject, compact_iri, expand_curie, iri, typed, BlankNode, KnowledgeStore, Literal, MemoryStore,
    NamedNode, Subject, Term, TermRef, Triple, TripleRef, SH,
};
use crate::models::SensorObject;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result severity declared on a shape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeSeverity {
    #[default]
    Violation,
    Warning,
    Info,
}

impl ShapeSeverity {
    pub fn name(&self) -> &'static str {
        match self {
            ShapeSeverity::Violation => "Violation",
            ShapeSeverity::Warning => "Warning",
            ShapeSeverity::Info => "Info",
        }
    }

    fn term(&self) -> NamedNode {
        iri(SH, self.name())
    }
}

/// A property constraint on every instance of a class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub name: String,
    pub target_class: String,
    pub path: String,
    #[serde(default)]
    pub min_count: Option<usize>,
    #[serde(default)]
    pub max_count: Option<usize>,
    /// Every value must be a literal of this datatype
    #[serde(default)]
    pub datatype: Option<String>,
    /// Every value must be an instance of this class
    #[serde(default)]
    pub class: Option<String>,
    /// At least one value must equal this
    #[serde(default)]
    pub has_value: Option<SensorObject>,
    #[serde(default)]
    pub severity: ShapeSeverity,
    /// Overrides the generated result message
    #[serde(default)]
    pub message: Option<String>,
}

/// The declarative constraint set checked after every mutation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeSet {
    #[serde(default)]
    pub shapes: Vec<Shape>,
}

impl ShapeSet {
    pub fn from_toml(content: &str) -> SimResult<Self> {
        let set: ShapeSet =
            toml::from_str(content).map_err(|e| SimError::Config(format!("shapes: {}", e)))?;
        for shape in &set.shapes {
            CompiledShape::compile(shape).map_err(SimError::Config)?;
        }
        Ok(set)
    }

    pub fn load(path: &Path) -> SimResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        let set = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), shapes = set.shapes.len(), "shape set loaded");
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

/// Shape with every name resolved to a term
struct CompiledShape<'a> {
    shape: &'a Shape,
    source: NamedNode,
    target_class: NamedNode,
    path: NamedNode,
    datatype: Option<NamedNode>,
    class: Option<NamedNode>,
    has_value: Option<Term>,
}

impl<'a> CompiledShape<'a> {
    fn compile(shape: &'a Shape) -> Result<Self, String> {
        let iri = |name: &str| {
            let full = expand_curie(name)
                .ok_or_else(|| format!("shape '{}': unknown prefix in '{}'", shape.name, name))?;
            NamedNode::new(full).map_err(|e| format!("shape '{}': invalid IRI '{}': {}", shape.name, name, e))
        };

        let has_value = match &shape.has_value {
            // Text that is not numeric names a resource, prefixed names included
            Some(text @ SensorObject::Text(s)) => match text.to_term() {
                Ok(Term::Literal(literal)) => Some(literal.into()),
                _ => Some(iri(s.as_str())?.into()),
            },
            Some(other) => Some(other.to_term().map_err(|e| format!("shape '{}': {}", shape.name, e))?),
            None => None,
        };

        Ok(Self {
            shape,
            source: iri(shape.name.as_str())?,
            target_class: iri(shape.target_class.as_str())?,
            path: iri(shape.path.as_str())?,
            datatype: shape.datatype.as_deref().map(iri).transpose()?,
            class: shape.class.as_deref().map(iri).transpose()?,
            has_value,
        })
    }
}

/// One constraint failure before it is written into the result graph
struct Finding {
    focus: Subject,
    path: NamedNode,
    value: Option<Term>,
    severity: ShapeSeverity,
    component: &'static str,
    source: NamedNode,
    message: String,
}

/// Built-in constraint engine over [`ShapeSet`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeEngine;

impl ConstraintEngine for ShapeEngine {
    fn check(
        &self,
        data: &dyn KnowledgeStore,
        shapes: &ShapeSet,
        options: &CheckOptions,
    ) -> SimResult<EngineOutput> {
        let graph = match options.inference {
            Inference::Rdfs => rdfs_closure(data)?,
            Inference::None => data.iter().map(TripleRef::into_owned).collect(),
        };

        let mut findings = Vec::new();
        'shapes: for shape in &shapes.shapes {
            let compiled = CompiledShape::compile(shape).map_err(SimError::Engine)?;
            for focus in graph.subjects(rdf::TYPE, compiled.target_class.as_ref().into()) {
                check_focus(&compiled, &focus, &graph, &mut findings);
                if options.abort_on_first && !findings.is_empty() {
                    break 'shapes;
                }
            }
        }

        let conforms = findings.iter().all(|f| match f.severity {
            ShapeSeverity::Violation => false,
            ShapeSeverity::Warning => options.allow_warnings,
            ShapeSeverity::Info => options.allow_infos,
        });

        Ok(EngineOutput {
            conforms,
            results: results_graph(conforms, &findings),
            report_text: report_text(conforms, &findings),
        })
    }
}

fn check_focus(shape: &CompiledShape<'_>, focus: &Subject, graph: &MemoryStore, findings: &mut Vec<Finding>) {
    let values = graph.objects(focus.as_ref(), shape.path.as_ref());
    let mut fail = |value: Option<&Term>, component: &'static str, default_message: String| {
        findings.push(Finding {
            focus: focus.clone(),
            path: shape.path.clone(),
            value: value.cloned(),
            severity: shape.shape.severity,
            component,
            source: shape.source.clone(),
            message: shape.shape.message.clone().unwrap_or(default_message),
        });
    };
    let focus_label = display(focus.as_ref().into());
    let path_label = compact_iri(shape.path.as_str());

    if let Some(min) = shape.shape.min_count {
        if values.len() < min {
            fail(
                None,
                "MinCountConstraintComponent",
                format!("Less than {} values on {}->{}", min, focus_label, path_label),
            );
        }
    }

    if let Some(max) = shape.shape.max_count {
        if values.len() > max {
            fail(
                None,
                "MaxCountConstraintComponent",
                format!("More than {} values on {}->{}", max, focus_label, path_label),
            );
        }
    }

    if let Some(datatype) = &shape.datatype {
        for value in &values {
            if !has_datatype(value, datatype) {
                fail(
                    Some(value),
                    "DatatypeConstraintComponent",
                    format!("Value is not Literal with datatype {}", compact_iri(datatype.as_str())),
                );
            }
        }
    }

    if let Some(class) = &shape.class {
        for value in &values {
            let has_class = as_subject(value.as_ref())
                .map(|node| graph.contains(&Triple::new(node.into_owned(), rdf::TYPE, class.clone())))
                .unwrap_or(false);
            if !has_class {
                fail(
                    Some(value),
                    "ClassConstraintComponent",
                    format!("Value does not have class {}", compact_iri(class.as_str())),
                );
            }
        }
    }

    if let Some(expected) = &shape.has_value {
        if !values.contains(expected) {
            fail(
                None,
                "HasValueConstraintComponent",
                format!(
                    "Node {}->{} does not contain a value in the set of [{}]",
                    focus_label,
                    path_label,
                    display(expected.as_ref())
                ),
            );
        }
    }
}

/// Plain literals carry `xsd:string`, language-tagged ones `rdf:langString`
fn has_datatype(value: &Term, datatype: &NamedNode) -> bool {
    match value {
        Term::Literal(literal) => literal.datatype() == datatype.as_ref(),
        _ => false,
    }
}

fn display(term: TermRef<'_>) -> String {
    match term {
        TermRef::NamedNode(node) => compact_iri(node.as_str()),
        other => other.to_string(),
    }
}

fn results_graph(conforms: bool, findings: &[Finding]) -> MemoryStore {
    let sh = |local: &str| iri(SH, local);
    let report = BlankNode::new_unchecked("report");

    let mut triples = vec![
        Triple::new(report.clone(), rdf::TYPE, sh("ValidationReport")),
        Triple::new(report.clone(), sh("conforms"), typed(conforms.to_string(), "boolean")),
    ];

    for (i, f) in findings.iter().enumerate() {
        let node = BlankNode::new_unchecked(format!("result{:04}", i + 1));
        triples.push(Triple::new(report.clone(), sh("result"), node.clone()));
        triples.push(Triple::new(node.clone(), rdf::TYPE, sh("ValidationResult")));
        triples.push(Triple::new(node.clone(), sh("focusNode"), f.focus.clone()));
        triples.push(Triple::new(node.clone(), sh("resultPath"), f.path.clone()));
        triples.push(Triple::new(node.clone(), sh("resultSeverity"), f.severity.term()));
        triples.push(Triple::new(node.clone(), sh("resultMessage"), Literal::new_simple_literal(f.message.clone())));
        triples.push(Triple::new(node.clone(), sh("sourceConstraintComponent"), sh(f.component)));
        triples.push(Triple::new(node.clone(), sh("sourceShape"), f.source.clone()));
        if let Some(value) = &f.value {
            triples.push(Triple::new(node, sh("value"), value.clone()));
        }
    }

    triples.into_iter().collect()
}

fn report_text(conforms: bool, findings: &[Finding]) -> String {
    let mut out = format!(
        "Validation Report\nConforms: {}\n",
        if conforms { "True" } else { "False" }
    );
    if findings.is_empty() {
        return out;
    }

    out.push_str(&format!("Results ({}):\n", findings.len()));
    for f in findings {
        out.push_str(&format!(
            "Constraint Violation in {} ({}{}):\n",
            f.component, SH, f.component
        ));
        out.push_str(&format!("\tSeverity: sh:{}\n", f.severity.name()));
        out.push_str(&format!("\tSource Shape: {}\n", compact_iri(f.source.as_str())));
        out.push_str(&format!("\tFocus Node: {}\n", display(f.focus.as_ref().into())));
        if let Some(value) = &f.value {
            out.push_str(&format!("\tValue Node: {}\n", display(value.as_ref())));
        }
        out.push_str(&format!("\tResult Path: {}\n", compact_iri(f.path.as_str())));
        out.push_str(&format!("\tMessage: {}\n", f.message));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::vocab::rdfs;
    use crate::graph::{twin, TWIN};
    use crate::validator::extract_violations;

    const SHAPES: &str = r#"
        [[shapes]]
        name = "StepInstrumentShape"
        target_class = "twin:Step"
        path = "twin:hasInstrument"
        min_count = 1
        class = "twin:Instrument"
        message = "Step requires an instrument"

        [[shapes]]
        name = "StepForceShape"
        target_class = "Step"
        path = "forceValue"
        datatype = "xsd:float"
        max_count = 1
        severity = "Warning"
    "#;

    fn ty(s: &str, class: &str) -> Triple {
        Triple::new(twin(s), rdf::TYPE, twin(class))
    }

    fn base_data() -> MemoryStore {
        let mut data = MemoryStore::new();
        data.add(ty("Step_A1_1", "AssemblyStep")).unwrap();
        data.add(Triple::new(twin("AssemblyStep"), rdfs::SUB_CLASS_OF, twin("Step")))
            .unwrap();
        data.add(ty("Gripper", "Instrument")).unwrap();
        data
    }

    #[test]
    fn test_parse_shapes() {
        let set = ShapeSet::from_toml(SHAPES).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.shapes[1].severity, ShapeSeverity::Warning);
        assert_eq!(set.shapes[0].min_count, Some(1));
    }

    #[test]
    fn test_unknown_prefix_is_config_error() {
        let bad = r#"
            [[shapes]]
            name = "Bad"
            target_class = "foo:Step"
            path = "twin:x"
        "#;
        assert!(matches!(ShapeSet::from_toml(bad), Err(SimError::Config(_))));
    }

    #[test]
    fn test_min_count_found_through_inference() {
        let set = ShapeSet::from_toml(SHAPES).unwrap();
        let output = ShapeEngine.check(&base_data(), &set, &CheckOptions::session()).unwrap();
        assert!(!output.conforms);

        let violations = extract_violations(&output.results).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].focus_node(), "Step_A1_1");
        assert_eq!(violations[0].path(), "hasInstrument");
        assert_eq!(violations[0].message(), "Step requires an instrument");
        assert!(output.report_text.contains("MinCountConstraintComponent"));
    }

    #[test]
    fn test_no_inference_means_no_targets() {
        let set = ShapeSet::from_toml(SHAPES).unwrap();
        let options = CheckOptions {
            inference: Inference::None,
            ..CheckOptions::session()
        };
        let output = ShapeEngine.check(&base_data(), &set, &options).unwrap();
        assert!(output.conforms);
    }

    #[test]
    fn test_satisfied_shape_conforms() {
        let set = ShapeSet::from_toml(SHAPES).unwrap();
        let mut data = base_data();
        data.add(Triple::new(twin("Step_A1_1"), twin("hasInstrument"), twin("Gripper")))
            .unwrap();
        let output = ShapeEngine.check(&data, &set, &CheckOptions::session()).unwrap();
        assert!(output.conforms);
        assert!(output.report_text.contains("Conforms: True"));
    }

    #[test]
    fn test_warnings_do_not_break_conformance() {
        let set = ShapeSet::from_toml(SHAPES).unwrap();
        let mut data = base_data();
        data.add(Triple::new(twin("Step_A1_1"), twin("hasInstrument"), twin("Gripper")))
            .unwrap();
        data.add(Triple::new(twin("Step_A1_1"), twin("forceValue"), typed("3", "integer")))
            .unwrap();

        let output = ShapeEngine.check(&data, &set, &CheckOptions::session()).unwrap();
        assert!(output.conforms);
        assert_eq!(extract_violations(&output.results).unwrap().len(), 1);

        let strict = CheckOptions {
            allow_warnings: false,
            ..CheckOptions::session()
        };
        let output = ShapeEngine.check(&data, &set, &strict).unwrap();
        assert!(!output.conforms);
        let violations = extract_violations(&output.results).unwrap();
        assert_eq!(violations[0].severity(), "Warning");
        assert_eq!(violations[0].value(), "3");
    }

    #[test]
    fn test_class_constraint_reports_value() {
        let set = ShapeSet::from_toml(SHAPES).unwrap();
        let mut data = base_data();
        data.add(Triple::new(twin("Step_A1_1"), twin("hasInstrument"), twin("Banana")))
            .unwrap();
        let output = ShapeEngine.check(&data, &set, &CheckOptions::session()).unwrap();
        let violations = extract_violations(&output.results).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].value(), format!("{}Banana", TWIN));
    }

    #[test]
    fn test_has_value() {
        let set = ShapeSet::from_toml(
            r#"
            [[shapes]]
            name = "CompletedShape"
            target_class = "twin:Step"
            path = "twin:completed"
            has_value = true
            "#,
        )
        .unwrap();
        let mut data = MemoryStore::new();
        data.add(ty("Step_A1_1", "Step")).unwrap();
        assert!(!ShapeEngine.check(&data, &set, &CheckOptions::session()).unwrap().conforms);

        data.add(Triple::new(twin("Step_A1_1"), twin("completed"), typed("true", "boolean")))
            .unwrap();
        assert!(ShapeEngine.check(&data, &set, &CheckOptions::session()).unwrap().conforms);
    }

    #[test]
    fn test_abort_on_first() {
        let set = ShapeSet::from_toml(SHAPES).unwrap();
        let mut data = base_data();
        data.add(ty("Step_A1_2", "Step")).unwrap();
        let options = CheckOptions {
            abort_on_first: true,
            ..CheckOptions::session()
        };
        let output = ShapeEngine.check(&data, &set, &options).unwrap();
        assert_eq!(extract_violations(&output.results).unwrap().len(), 1);

        let output = ShapeEngine.check(&data, &set, &CheckOptions::session()).unwrap();
        assert_eq!(extract_violations(&output.results).unwrap().len(), 2);
    }
}
