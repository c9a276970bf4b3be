//! The rendered annotation list and its row activation.
//!
//! Rows are replaced wholesale whenever the store hands back a refreshed
//! list. Activating a row publishes [`SyncSignal::ActivateAnnotation`] on
//! the bus the list was constructed with; nothing listens at a wider scope.

use std::sync::Arc;

use rgbd_core::types::DbId;
use rgbd_core::{Annotation, CoreError};
use rgbd_events::{ActivateAnnotation, SignalBus, SyncSignal};

use crate::error::StoreError;
use crate::store::AnnotationStore;

pub struct AnnotationList {
    bus: Arc<SignalBus>,
    rows: Vec<Annotation>,
    selected: Option<DbId>,
}

impl AnnotationList {
    pub fn new(bus: Arc<SignalBus>) -> Self {
        Self {
            bus,
            rows: Vec::new(),
            selected: None,
        }
    }

    /// Replace the rows with a list returned by the store.
    ///
    /// A selection whose record disappeared is dropped.
    pub fn replace(&mut self, rows: Vec<Annotation>) {
        self.rows = rows;
        if let Some(id) = self.selected {
            if !self.rows.iter().any(|a| a.id == id) {
                self.selected = None;
            }
        }
    }

    /// Reload the rows for `scenario_id` from `store`.
    pub async fn refresh(
        &mut self,
        store: &dyn AnnotationStore,
        scenario_id: DbId,
    ) -> Result<(), StoreError> {
        let rows = store.list(scenario_id).await?;
        tracing::debug!(scenario_id, count = rows.len(), "Annotation list refreshed");
        self.replace(rows);
        Ok(())
    }

    pub fn rows(&self) -> &[Annotation] {
        &self.rows
    }

    pub fn selected(&self) -> Option<DbId> {
        self.selected
    }

    /// Select the row with `id` and ask the engine to show it.
    pub fn activate(&mut self, id: DbId) -> Result<(), CoreError> {
        let annotation = self
            .rows
            .iter()
            .find(|a| a.id == id)
            .ok_or(CoreError::NotFound {
                entity: "annotation",
                id,
            })?;

        self.bus.publish(SyncSignal::ActivateAnnotation(
            ActivateAnnotation::from_annotation(annotation),
        ));
        self.selected = Some(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rgbd_core::{NewAnnotation, Stream};

    use crate::memory::InMemoryAnnotationStore;

    async fn seeded_store() -> InMemoryAnnotationStore {
        let store = InMemoryAnnotationStore::new();
        for (frame, label) in [(60, "car"), (12, "person")] {
            store
                .create(
                    1,
                    &NewAnnotation {
                        frame_index: frame,
                        time_sec: frame as f64 / 30.0,
                        stream: Stream::Rgb,
                        label: label.into(),
                        x: 5,
                        y: 6,
                        width: 7,
                        height: 8,
                    },
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn activate_publishes_signal_for_row() {
        let bus = Arc::new(SignalBus::default());
        let mut rx = bus.subscribe();
        let store = seeded_store().await;
        let mut list = AnnotationList::new(Arc::clone(&bus));
        list.refresh(&store, 1).await.unwrap();

        assert_eq!(list.rows()[0].label, "person");
        let id = list.rows()[1].id;
        list.activate(id).unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_matches!(
            envelope.signal,
            SyncSignal::ActivateAnnotation(a) if a.id == Some(id) && a.frame_index == Some(60)
        );
        assert_eq!(list.selected(), Some(id));
    }

    #[tokio::test]
    async fn activate_unknown_row_is_not_found() {
        let bus = Arc::new(SignalBus::default());
        let mut list = AnnotationList::new(bus);
        assert_matches!(list.activate(99), Err(CoreError::NotFound { id: 99, .. }));
        assert_eq!(list.selected(), None);
    }

    #[tokio::test]
    async fn replace_drops_stale_selection() {
        let bus = Arc::new(SignalBus::default());
        let store = seeded_store().await;
        let mut list = AnnotationList::new(bus);
        list.refresh(&store, 1).await.unwrap();
        let id = list.rows()[0].id;
        list.activate(id).unwrap();

        list.replace(Vec::new());
        assert_eq!(list.selected(), None);
    }
}
