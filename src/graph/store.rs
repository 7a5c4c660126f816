//! Knowledge store trait and the in-memory implementation

use super::{Graph, NamedNodeRef, Subject, SubjectRef, Term, TermRef, Triple, TripleRef};
use crate::error::{SimError, SimResult};
use oxigraph::io::{RdfFormat, RdfParser};
use std::path::Path;

/// Mutable triple store the simulation runs against.
///
/// Read methods are object-safe so a constraint engine can take
/// `&dyn KnowledgeStore`; `snapshot` requires a sized store.
pub trait KnowledgeStore {
    /// Insert a triple. Returns `false` when it was already present.
    fn add(&mut self, triple: Triple) -> SimResult<bool>;

    /// Delete a triple. Returns `false` when it was absent.
    fn remove(&mut self, triple: &Triple) -> bool;

    fn contains(&self, triple: &Triple) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> Box<dyn Iterator<Item = TripleRef<'_>> + '_>;

    /// Full deep copy of the store
    fn snapshot(&self) -> Self
    where
        Self: Sized;

    /// Objects of every `(subject, predicate, ?)` triple
    fn objects(&self, subject: SubjectRef<'_>, predicate: NamedNodeRef<'_>) -> Vec<Term> {
        self.iter()
            .filter(|t| t.subject == subject && t.predicate == predicate)
            .map(|t| t.object.into_owned())
            .collect()
    }

    /// Subjects of every `(?, predicate, object)` triple
    fn subjects(&self, predicate: NamedNodeRef<'_>, object: TermRef<'_>) -> Vec<Subject> {
        self.iter()
            .filter(|t| t.predicate == predicate && t.object == object)
            .map(|t| t.subject.into_owned())
            .collect()
    }
}

/// In-memory triple set over an indexed [`Graph`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    graph: Graph,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an N-Triples document
    pub fn parse(source: &str) -> SimResult<Self> {
        let mut graph = Graph::new();
        for quad in RdfParser::from_format(RdfFormat::NTriples).for_reader(source.as_bytes()) {
            let quad = quad.map_err(|e| SimError::StoreParse(e.to_string()))?;
            graph.insert(&Triple::from(quad));
        }
        Ok(Self { graph })
    }

    /// Load an N-Triples file from disk
    pub fn load(path: &Path) -> SimResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        let store = Self::parse(&content)?;
        tracing::info!(path = %path.display(), triples = store.len(), "knowledge store loaded");
        Ok(store)
    }

    /// Serialize as N-Triples, one triple per line
    pub fn to_ntriples(&self) -> String {
        self.graph.iter().map(|t| format!("{} .\n", t)).collect()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

impl KnowledgeStore for MemoryStore {
    fn add(&mut self, triple: Triple) -> SimResult<bool> {
        Ok(self.graph.insert(&triple))
    }

    fn remove(&mut self, triple: &Triple) -> bool {
        self.graph.remove(triple)
    }

    fn contains(&self, triple: &Triple) -> bool {
        self.graph.contains(triple)
    }

    fn len(&self) -> usize {
        self.graph.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = TripleRef<'_>> + '_> {
        Box::new(self.graph.iter())
    }

    fn snapshot(&self) -> Self {
        self.clone()
    }

    fn objects(&self, subject: SubjectRef<'_>, predicate: NamedNodeRef<'_>) -> Vec<Term> {
        self.graph
            .objects_for_subject_predicate(subject, predicate)
            .map(TermRef::into_owned)
            .collect()
    }

    fn subjects(&self, predicate: NamedNodeRef<'_>, object: TermRef<'_>) -> Vec<Subject> {
        self.graph
            .subjects_for_predicate_object(predicate, object)
            .map(SubjectRef::into_owned)
            .collect()
    }
}

impl FromIterator<Triple> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut graph = Graph::new();
        for triple in iter {
            graph.insert(&triple);
        }
        Self { graph }
    }
}
