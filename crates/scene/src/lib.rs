//! Scene representation.
//!
//! - [`Transform2d`] and [`TransformComponent`] for placing objects
//! - [`Camera`] for the view and projection matrices
//! - [`GameObject`]s owned by a [`GameObjectRegistry`], which also owns the
//!   [`IdAllocator`] for their ids

pub mod camera;
pub mod object;
pub mod transform;

pub use camera::{Camera, DEFAULT_UP};
pub use object::{GameObject, GameObjectRegistry, IdAllocator, ObjectId};
pub use transform::{Transform2d, TransformComponent};
