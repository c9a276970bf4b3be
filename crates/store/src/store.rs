use async_trait::async_trait;
use rgbd_core::types::DbId;
use rgbd_core::{Annotation, CoreError, NewAnnotation};

use crate::error::StoreError;

/// What a successful `create` hands back.
///
/// The record is committed as soon as the store accepted it. Reading the
/// list back is a separate step that may fail on its own, so a missing
/// `rows` never means the create failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    /// The stored record, when the store echoed it back.
    pub annotation: Option<Annotation>,
    /// The refreshed list for the scenario, ordered by `frame_index`
    /// ascending. `None` when the follow-up read failed.
    pub rows: Option<Vec<Annotation>>,
}

/// Create/list access to the annotations of a scenario.
///
/// Implementations must not partially write: a failed `create` leaves the
/// stored list unchanged, and an `Ok` from `create` means exactly one
/// record was stored.
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Store a new annotation, then try to read the refreshed list.
    async fn create(
        &self,
        scenario_id: DbId,
        request: &NewAnnotation,
    ) -> Result<Created, StoreError>;

    /// Annotations of a scenario, ordered by `frame_index` ascending.
    async fn list(&self, scenario_id: DbId) -> Result<Vec<Annotation>, StoreError>;
}

/// Run the store's model validation locally.
///
/// Failures surface as [`StoreError::Rejected`], the same error the remote
/// store answers with, so callers see one error either way.
pub(crate) fn validate_request(request: &NewAnnotation) -> Result<(), StoreError> {
    request.validate().map_err(|e| match e {
        CoreError::Validation(msg) => StoreError::Rejected(msg),
        other => StoreError::Rejected(other.to_string()),
    })
}
