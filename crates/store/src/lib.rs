//! Client side of the remote annotation store.
//!
//! The store owns annotation records; this crate only knows how to create
//! one and how to read the ordered list back:
//!
//! - [`AnnotationStore`]: the create/list seam the capture flow talks to.
//! - [`HttpAnnotationStore`]: JSON-over-HTTP implementation using [`reqwest`].
//! - [`InMemoryAnnotationStore`]: process-local implementation with the
//!   same validation and ordering rules.
//! - [`AnnotationList`]: the rendered list; picking a row publishes an
//!   activate signal on the bus it was handed.

pub mod error;
pub mod http;
pub mod list;
pub mod memory;
pub mod store;

pub use error::StoreError;
pub use http::HttpAnnotationStore;
pub use list::AnnotationList;
pub use memory::InMemoryAnnotationStore;
pub use store::{AnnotationStore, Created};
