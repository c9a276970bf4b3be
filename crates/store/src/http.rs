//! JSON-over-HTTP client for the annotation store.
//!
//! Talks to the scenario annotation endpoints:
//!
//! - `POST {base}/scenarios/{id}/annotations.json` with `{"annotation": {...}}`
//! - `GET  {base}/scenarios/{id}/annotations.json`

use async_trait::async_trait;
use reqwest::StatusCode;
use rgbd_core::annotation::sort_by_frame;
use rgbd_core::types::DbId;
use rgbd_core::{Annotation, NewAnnotation};
use serde::Serialize;

use crate::error::StoreError;
use crate::store::{validate_request, AnnotationStore, Created};

/// Request body wrapper expected by the create endpoint.
#[derive(Serialize)]
struct CreateBody<'a> {
    annotation: &'a NewAnnotation,
}

/// HTTP client for a single annotation store.
pub struct HttpAnnotationStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnnotationStore {
    /// Create a client for the store at `base_url`, e.g. `http://host:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn annotations_url(&self, scenario_id: DbId) -> String {
        format!("{}/scenarios/{scenario_id}/annotations.json", self.base_url)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code.
    ///
    /// `422 Unprocessable Entity` is the store's validation failure and maps
    /// to [`StoreError::Rejected`]; any other failure keeps the status and
    /// body for debugging.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(StoreError::Rejected(if body.is_empty() {
                "validation failed".to_string()
            } else {
                body
            }));
        }
        Err(StoreError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AnnotationStore for HttpAnnotationStore {
    async fn create(
        &self,
        scenario_id: DbId,
        request: &NewAnnotation,
    ) -> Result<Created, StoreError> {
        validate_request(request)?;

        let response = self
            .client
            .post(self.annotations_url(scenario_id))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&CreateBody {
                annotation: request,
            })
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        // The record is committed from here on; nothing below may turn this
        // into an error, or a retry would store it twice.
        let annotation = match response.text().await {
            Ok(body) => serde_json::from_str::<Annotation>(&body).ok(),
            Err(_) => None,
        };

        tracing::info!(
            scenario_id,
            id = ?annotation.as_ref().map(|a| a.id),
            frame_index = request.frame_index,
            label = %request.label,
            "Annotation created"
        );

        let rows = match self.list(scenario_id).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                tracing::warn!(
                    scenario_id,
                    error = %e,
                    "Could not refresh annotations after create"
                );
                None
            }
        };

        Ok(Created { annotation, rows })
    }

    async fn list(&self, scenario_id: DbId) -> Result<Vec<Annotation>, StoreError> {
        let response = self
            .client
            .get(self.annotations_url(scenario_id))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let mut annotations: Vec<Annotation> = response.json().await?;
        sort_by_frame(&mut annotations);
        Ok(annotations)
    }
}
