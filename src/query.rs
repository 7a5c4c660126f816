//! Step-scoped lookups over the knowledge store and the question helper

use crate::graph::{iri, term_value, twin, KnowledgeStore, NamedNode, Term, PROV, TWIN};

/// Maximum number of distinct labels a lookup returns
pub const RESULT_LIMIT: usize = 100;

pub const DEFAULT_ANSWER: &str =
    "I can help with questions about instruments, actors, tissues, and capabilities.";

/// What to look up for the active steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepQuery {
    Instruments,
    Tissues,
    Actors,
    Capabilities,
    Materials,
}

impl StepQuery {
    fn predicates(&self) -> Vec<NamedNode> {
        match self {
            StepQuery::Instruments => vec![twin("hasInstrument"), twin("toolUsed")],
            StepQuery::Tissues => vec![twin("targetTissue")],
            StepQuery::Actors => vec![
                iri(PROV, "wasAssociatedWith"),
                twin("performedBy"),
                twin("performer"),
                twin("actor"),
            ],
            StepQuery::Capabilities => vec![twin("requiresCapability")],
            StepQuery::Materials => vec![twin("materialUsed")],
        }
    }

    /// Distinct labels of every value linked to one of `steps`, in first-seen order
    pub fn run(&self, store: &dyn KnowledgeStore, steps: &[String]) -> Vec<String> {
        let predicates = self.predicates();
        let mut labels: Vec<String> = Vec::new();

        for step in steps {
            let subject = step_term(step);
            for predicate in &predicates {
                for value in store.objects(subject.as_ref().into(), predicate.as_ref()) {
                    let label = label(&value);
                    if !labels.contains(&label) {
                        labels.push(label);
                    }
                    if labels.len() == RESULT_LIMIT {
                        return labels;
                    }
                }
            }
        }
        labels
    }
}

/// Twin IRI of a step id; spaces become underscores
pub fn step_term(step: &str) -> NamedNode {
    iri(TWIN, &step.replace(' ', "_"))
}

fn label(term: &Term) -> String {
    let value = term_value(term.as_ref());
    match term {
        Term::NamedNode(_) => value.rsplit('/').next().unwrap_or(value).to_string(),
        _ => value.to_string(),
    }
}

/// Answer a free-text question about the active steps.
///
/// The first keyword found decides the lookup, checked in the order
/// instrument, actor, tissue, capability. Matching ignores case.
pub fn answer_question(store: &dyn KnowledgeStore, steps: &[String], question: &str) -> String {
    let question = question.to_lowercase();
    let (query, found, none) = if question.contains("instrument") {
        (
            StepQuery::Instruments,
            "Instruments needed",
            "No specific instruments required for current steps",
        )
    } else if question.contains("actor") {
        (StepQuery::Actors, "Actors required", "No specific actors identified")
    } else if question.contains("tissue") {
        (StepQuery::Tissues, "Target tissues", "No target tissues specified")
    } else if question.contains("capability") {
        (
            StepQuery::Capabilities,
            "Required capabilities",
            "Standard capabilities sufficient",
        )
    } else {
        return DEFAULT_ANSWER.to_string();
    };

    let labels = query.run(store, steps);
    if labels.is_empty() {
        none.to_string()
    } else {
        format!("{}: {}", found, labels.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Literal, MemoryStore, Triple};

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        let add = |s: &mut MemoryStore, subj: &str, pred: NamedNode, obj: Term| {
            s.add(Triple::new(twin(subj), pred, obj)).unwrap();
        };
        add(&mut store, "Step_L1_1", twin("hasInstrument"), twin("Trocar").into());
        add(&mut store, "Step_L1_1", twin("toolUsed"), twin("Trocar").into());
        add(&mut store, "Step_L1_1", twin("toolUsed"), twin("Insufflator").into());
        add(&mut store, "Step_L1_1", iri(PROV, "wasAssociatedWith"), twin("Surgeon").into());
        add(&mut store, "Step_L1_2", twin("performedBy"), twin("Nurse").into());
        add(&mut store, "Step_L1_1", twin("materialUsed"), Literal::new_simple_literal("CO2").into());
        store
    }

    fn steps(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_instruments_are_distinct() {
        let labels = StepQuery::Instruments.run(&store(), &steps(&["Step_L1_1"]));
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&"Trocar".to_string()));
        assert!(labels.contains(&"Insufflator".to_string()));
    }

    #[test]
    fn test_actors_across_steps_and_predicates() {
        let labels = StepQuery::Actors.run(&store(), &steps(&["Step_L1_1", "Step_L1_2"]));
        assert_eq!(labels, vec!["Surgeon".to_string(), "Nurse".to_string()]);
    }

    #[test]
    fn test_literal_values_keep_lexical_form() {
        let labels = StepQuery::Materials.run(&store(), &steps(&["Step_L1_1"]));
        assert_eq!(labels, vec!["CO2".to_string()]);
    }

    #[test]
    fn test_step_with_space() {
        assert_eq!(step_term("Step L1 1"), twin("Step_L1_1"));
    }

    #[test]
    fn test_answers() {
        let store = store();
        let active = steps(&["Step_L1_2"]);
        assert_eq!(
            answer_question(&store, &active, "Which instruments?"),
            "No specific instruments required for current steps"
        );
        assert_eq!(answer_question(&store, &active, "who is the actor"), "Actors required: Nurse");
        assert_eq!(answer_question(&store, &active, "tissue?"), "No target tissues specified");
        assert_eq!(
            answer_question(&store, &active, "capability"),
            "Standard capabilities sufficient"
        );
        assert_eq!(answer_question(&store, &active, "hello"), DEFAULT_ANSWER);
    }

    #[test]
    fn test_instrument_keyword_wins() {
        let answer = answer_question(&store(), &steps(&["Step_L1_1"]), "instrument and actor");
        assert!(answer.starts_with("Instruments needed: "));
    }
}
