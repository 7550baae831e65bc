use std::sync::mpsc::{self, Receiver, Sender};

use referral_core::{derive_graph, Graph, GraphConfig, PatientRecord};

use crate::{RecordStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created(String),
    Updated(String),
    Deleted(String),
}

/// Published after every successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    pub change: ChangeKind,
    pub records: Vec<PatientRecord>,
}

/// Wraps a store and notifies subscribers when its records change.
pub struct Watched<S> {
    inner: S,
    subscribers: Vec<Sender<StoreEvent>>,
}

impl<S: RecordStore> Watched<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn publish(&mut self, change: ChangeKind, records: &[PatientRecord]) {
        let event = StoreEvent {
            change,
            records: records.to_vec(),
        };
        // Dropped receivers are forgotten.
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        tracing::debug!(
            subscribers = self.subscribers.len(),
            change = ?event.change,
            "published store change"
        );
    }
}

impl<S: RecordStore> RecordStore for Watched<S> {
    fn list(&self) -> Result<Vec<PatientRecord>, StoreError> {
        self.inner.list()
    }

    fn insert(&mut self, record: PatientRecord) -> Result<Vec<PatientRecord>, StoreError> {
        let id = record.id.clone();
        let records = self.inner.insert(record)?;
        self.publish(ChangeKind::Created(id), &records);
        Ok(records)
    }

    fn update(&mut self, record: PatientRecord) -> Result<Vec<PatientRecord>, StoreError> {
        let id = record.id.clone();
        let records = self.inner.update(record)?;
        self.publish(ChangeKind::Updated(id), &records);
        Ok(records)
    }

    fn delete(&mut self, id: &str) -> Result<Vec<PatientRecord>, StoreError> {
        let records = self.inner.delete(id)?;
        self.publish(ChangeKind::Deleted(id.to_string()), &records);
        Ok(records)
    }
}

/// Re-derives the referral graph for each store change it receives.
pub struct GraphFeed {
    events: Receiver<StoreEvent>,
    config: GraphConfig,
}

impl GraphFeed {
    pub fn new(events: Receiver<StoreEvent>, config: GraphConfig) -> Self {
        Self { events, config }
    }

    /// Block until the next change. `None` once the store is gone.
    pub fn next_graph(&self) -> Option<Graph> {
        let event = self.events.recv().ok()?;
        Some(derive_graph(&event.records, &self.config))
    }

    /// Graph for the most recent pending change, skipping older ones.
    pub fn latest(&self) -> Option<Graph> {
        let last = self.events.try_iter().last()?;
        Some(derive_graph(&last.records, &self.config))
    }
}
