//! RDFS entailment over a copy of the data graph

use crate::error::SimResult;
use crate::graph::vocab::{rdf, rdfs};
use crate::graph::{as_subject, KnowledgeStore, MemoryStore, Term, Triple, TripleRef};

/// Compute the RDFS closure of `data` into a new store.
///
/// Covers subclass and subproperty transitivity, type propagation through
/// `rdfs:subClassOf`, statement propagation through `rdfs:subPropertyOf`, and
/// typing from `rdfs:domain` / `rdfs:range`. The input is never modified.
pub fn rdfs_closure(data: &dyn KnowledgeStore) -> SimResult<MemoryStore> {
    let mut store: MemoryStore = data.iter().map(TripleRef::into_owned).collect();

    let mut rounds = 0;
    loop {
        rounds += 1;
        let inferred = entailments(&store);

        let before = store.len();
        for triple in inferred {
            store.add(triple)?;
        }
        if store.len() == before {
            break;
        }
    }

    tracing::debug!(
        asserted = data.len(),
        entailed = store.len(),
        rounds,
        "rdfs closure computed"
    );
    Ok(store)
}

/// One round of rule application over the current graph
fn entailments(store: &MemoryStore) -> Vec<Triple> {
    let mut inferred = Vec::new();
    for t in store.iter() {
        if t.predicate == rdfs::SUB_CLASS_OF || t.predicate == rdf::TYPE {
            if let Some(class) = as_subject(t.object) {
                for parent in store.objects(class, rdfs::SUB_CLASS_OF) {
                    inferred.push(Triple::new(t.subject.into_owned(), t.predicate.into_owned(), parent));
                }
            }
        }
        if t.predicate == rdfs::SUB_PROPERTY_OF {
            if let Some(property) = as_subject(t.object) {
                for parent in store.objects(property, rdfs::SUB_PROPERTY_OF) {
                    inferred.push(Triple::new(t.subject.into_owned(), rdfs::SUB_PROPERTY_OF, parent));
                }
            }
        }
        for parent in store.objects(t.predicate.into(), rdfs::SUB_PROPERTY_OF) {
            // Only IRIs can stand as predicates
            if let Term::NamedNode(parent) = parent {
                inferred.push(Triple::new(t.subject.into_owned(), parent, t.object.into_owned()));
            }
        }
        for class in store.objects(t.predicate.into(), rdfs::DOMAIN) {
            inferred.push(Triple::new(t.subject.into_owned(), rdf::TYPE, class));
        }
        // Literals are never typed by a range
        if let Some(object) = as_subject(t.object) {
            for class in store.objects(t.predicate.into(), rdfs::RANGE) {
                inferred.push(Triple::new(object.into_owned(), rdf::TYPE, class));
            }
        }
    }
    inferred
}
