//! GPU resources built on top of the RHI: models and their vertex data.

mod error;

pub mod model;

pub use error::{ResourceError, ResourceResult};
pub use model::{Model, triangle, validate_vertex_count};
