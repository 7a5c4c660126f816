//! Sensor event application with a single pre-mutation checkpoint.
//!
//! Every `apply` copies the whole store before touching it. Only the latest
//! copy is kept, and nothing restores it automatically: a caller that wants
//! the pre-application state back calls [`SensorEventApplier::rollback`].

use crate::error::SimResult;
use crate::graph::KnowledgeStore;
use crate::models::{ProcedureEvents, SensorAction};
use chrono::{DateTime, Utc};

/// Full copy of the store taken right before a sensor application
#[derive(Debug, Clone)]
pub struct Checkpoint<S> {
    store: S,
    taken_at: DateTime<Utc>,
    steps: Vec<String>,
}

impl<S> Checkpoint<S> {
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Step group whose events were applied after this copy was taken
    pub fn steps(&self) -> &[String] {
        &self.steps
    }
}

/// Counts from one application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Triples that were not present before
    pub added: usize,
    /// Triples that were present and got deleted
    pub removed: usize,
    /// Steps without sensor data
    pub skipped_steps: usize,
}

#[derive(Debug)]
pub struct SensorEventApplier<S> {
    checkpoint: Option<Checkpoint<S>>,
}

impl<S> Default for SensorEventApplier<S> {
    fn default() -> Self {
        Self { checkpoint: None }
    }
}

impl<S: KnowledgeStore> SensorEventApplier<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot `store`, then apply the events of every step in `steps`.
    ///
    /// Steps without an event are skipped. Adding a present triple and removing
    /// an absent one are no-ops. Store failures propagate and leave the
    /// checkpoint in place.
    pub fn apply(
        &mut self,
        store: &mut S,
        steps: &[String],
        events: &ProcedureEvents,
    ) -> SimResult<ApplySummary> {
        self.checkpoint = Some(Checkpoint {
            store: store.snapshot(),
            taken_at: Utc::now(),
            steps: steps.to_vec(),
        });
        tracing::debug!(triples = store.len(), "checkpoint captured");

        let mut summary = ApplySummary::default();
        for step_id in steps {
            let Some(event) = events.get(step_id) else {
                tracing::debug!(step = %step_id, "no sensor data for step");
                summary.skipped_steps += 1;
                continue;
            };

            for sensor_triple in &event.triples {
                let triple = sensor_triple.to_triple()?;
                match event.action {
                    SensorAction::Add => {
                        if store.add(triple)? {
                            summary.added += 1;
                        }
                    }
                    SensorAction::Remove => {
                        if store.remove(&triple) {
                            summary.removed += 1;
                        }
                    }
                }
            }
        }

        tracing::info!(
            steps = ?steps,
            added = summary.added,
            removed = summary.removed,
            skipped = summary.skipped_steps,
            "sensor events applied"
        );
        Ok(summary)
    }

    pub fn checkpoint(&self) -> Option<&Checkpoint<S>> {
        self.checkpoint.as_ref()
    }

    /// Replace `store` with the retained checkpoint.
    ///
    /// The checkpoint is consumed; returns `false` when there was none.
    pub fn rollback(&mut self, store: &mut S) -> bool {
        match self.checkpoint.take() {
            Some(checkpoint) => {
                tracing::info!(
                    steps = ?checkpoint.steps,
                    taken_at = %checkpoint.taken_at,
                    "store rolled back to checkpoint"
                );
                *store = checkpoint.store;
                true
            }
            None => false,
        }
    }

    /// Drop any retained checkpoint
    pub fn clear(&mut self) {
        self.checkpoint = None;
    }
}
