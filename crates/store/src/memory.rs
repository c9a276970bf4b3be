//! Process-local annotation store.
//!
//! Applies the same validation and ordering rules as the remote store so
//! the capture flow behaves identically against either backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rgbd_core::annotation::sort_by_frame;
use rgbd_core::types::DbId;
use rgbd_core::{Annotation, NewAnnotation};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{validate_request, AnnotationStore, Created};

#[derive(Default)]
struct Inner {
    next_id: DbId,
    by_scenario: HashMap<DbId, Vec<Annotation>>,
}

/// Annotation store kept in memory, keyed by scenario.
#[derive(Default)]
pub struct InMemoryAnnotationStore {
    inner: RwLock<Inner>,
}

impl InMemoryAnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all scenarios.
    pub async fn len(&self) -> usize {
        self.inner
            .read()
            .await
            .by_scenario
            .values()
            .map(Vec::len)
            .sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AnnotationStore for InMemoryAnnotationStore {
    async fn create(
        &self,
        scenario_id: DbId,
        request: &NewAnnotation,
    ) -> Result<Created, StoreError> {
        validate_request(request)?;

        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id;

        let annotation = Annotation {
            id,
            scenario_id,
            frame_index: request.frame_index,
            time_sec: request.time_sec,
            stream: request.stream,
            label: request.label.clone(),
            x: request.x,
            y: request.y,
            width: request.width,
            height: request.height,
            created_at: Utc::now(),
        };

        let list = inner.by_scenario.entry(scenario_id).or_default();
        list.push(annotation.clone());
        sort_by_frame(list);

        tracing::debug!(scenario_id, id, frame_index = request.frame_index, "Annotation stored");
        Ok(Created {
            annotation: Some(annotation),
            rows: Some(list.clone()),
        })
    }

    async fn list(&self, scenario_id: DbId) -> Result<Vec<Annotation>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .by_scenario
            .get(&scenario_id)
            .cloned()
            .unwrap_or_default())
    }
}
