//! Knowledge Store Module
//!
//! Holds the simulation state as an RDF graph:
//! - Terms and triples from `oxigraph::model`
//! - Namespace helpers for the twin ontology and its alignments
//! - The `KnowledgeStore` trait the engine mutates and validates
//! - An in-memory store loaded through oxigraph's N-Triples parser

mod store;

pub use oxigraph::model::vocab;
pub use oxigraph::model::{
    BlankNode, Graph, Literal, NamedNode, NamedNodeRef, Subject, SubjectRef, Term, TermRef, Triple,
    TripleRef,
};
pub use store::{KnowledgeStore, MemoryStore};

/// Twin-OR ontology namespace
pub const TWIN: &str = "http://www.semanticweb.org/Twin_OR/";
pub const PROV: &str = "http://www.w3.org/ns/prov#";
pub const HI: &str = "http://www.semanticweb.org/vbr240/ontologies/2022/4/untitled-ontology-51/";
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const SH: &str = "http://www.w3.org/ns/shacl#";

/// Prefixes understood by [`expand_curie`]
const PREFIXES: &[(&str, &str)] = &[
    ("twin", TWIN),
    ("prov", PROV),
    ("hi", HI),
    ("rdf", RDF),
    ("rdfs", RDFS),
    ("owl", OWL),
    ("xsd", XSD),
    ("sh", SH),
];

/// IRI built from a namespace and a local name.
///
/// Not validated; use for names this crate controls. Feed and config input goes
/// through [`NamedNode::new`].
pub fn iri(namespace: &str, local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{}{}", namespace, local))
}

/// IRI in the twin namespace
pub fn twin(local: &str) -> NamedNode {
    iri(TWIN, local)
}

/// Literal typed with an XSD datatype local name (`integer`, `boolean`, ...)
pub fn typed(lexical: impl Into<String>, xsd_type: &str) -> Literal {
    Literal::new_typed_literal(lexical, iri(XSD, xsd_type))
}

/// Expand a prefixed name (`rdf:type`) into a full IRI.
///
/// Full IRIs (`http://...` or `<...>`) pass through. Bare names resolve in the
/// twin namespace. Returns `None` for an unknown prefix.
pub fn expand_curie(name: &str) -> Option<String> {
    let name = name.trim();
    if let Some(inner) = name.strip_prefix('<').and_then(|n| n.strip_suffix('>')) {
        return Some(inner.to_string());
    }
    if name.contains("://") {
        return Some(name.to_string());
    }
    match name.split_once(':') {
        Some((prefix, local)) => PREFIXES
            .iter()
            .find(|(p, _)| *p == prefix)
            .map(|(_, ns)| format!("{}{}", ns, local)),
        None => Some(format!("{}{}", TWIN, name)),
    }
}

/// Shorten a full IRI to `prefix:local` when a known namespace matches
pub fn compact_iri(iri: &str) -> String {
    for (prefix, ns) in PREFIXES {
        if let Some(local) = iri.strip_prefix(ns) {
            return format!("{}:{}", prefix, local);
        }
    }
    iri.to_string()
}

/// Trailing local-name fragment of an identifier (after the last `/`, then `#`)
pub fn local_name(iri: &str) -> &str {
    let tail = iri.rsplit('/').next().unwrap_or(iri);
    tail.rsplit('#').next().unwrap_or(tail)
}

/// Raw string form: the IRI, the blank node id, or the literal's lexical value
pub fn term_value(term: TermRef<'_>) -> &str {
    match term {
        TermRef::NamedNode(node) => node.as_str(),
        TermRef::BlankNode(node) => node.as_str(),
        TermRef::Literal(literal) => literal.value(),
        // RDF-star quoted triples (always enabled by oxigraph 0.4) have no single raw string
        TermRef::Triple(_) => "",
    }
}

/// The term in subject position; literals have none
pub fn as_subject(term: TermRef<'_>) -> Option<SubjectRef<'_>> {
    match term {
        TermRef::NamedNode(node) => Some(node.into()),
        TermRef::BlankNode(node) => Some(node.into()),
        TermRef::Literal(_) => None,
        TermRef::Triple(triple) => Some(SubjectRef::Triple(triple)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_curie() {
        assert_eq!(
            expand_curie("rdf:type").unwrap(),
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#type"
        );
        assert_eq!(
            expand_curie("Step").unwrap(),
            "http://www.semanticweb.org/Twin_OR/Step"
        );
        assert_eq!(expand_curie("<urn:x>").unwrap(), "urn:x");
        assert!(expand_curie("nope:thing").is_none());
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("http://www.semanticweb.org/Twin_OR/Scalpel"), "Scalpel");
        assert_eq!(local_name("http://www.w3.org/ns/shacl#Violation"), "Violation");
        assert_eq!(local_name("Plain"), "Plain");
    }

    #[test]
    fn test_compact_iri() {
        assert_eq!(compact_iri(&format!("{}Nurse", TWIN)), "twin:Nurse");
        assert_eq!(compact_iri("urn:other"), "urn:other");
    }

    #[test]
    fn test_typed_literal_display() {
        assert_eq!(
            typed("4", "integer").to_string(),
            "\"4\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
        assert_eq!(typed("4", "integer").datatype(), vocab::xsd::INTEGER);
    }

    #[test]
    fn test_term_value_and_subject() {
        let node: Term = twin("Gripper").into();
        assert_eq!(term_value(node.as_ref()), format!("{}Gripper", TWIN));
        assert!(as_subject(node.as_ref()).is_some());

        let lit: Term = Literal::new_simple_literal("CO2").into();
        assert_eq!(term_value(lit.as_ref()), "CO2");
        assert!(as_subject(lit.as_ref()).is_none());
    }
}
