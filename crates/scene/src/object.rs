//! Game objects and the registry that hands out their ids.

use std::sync::Arc;

use glam::Vec3;

use crate::transform::{Transform2d, TransformComponent};

/// Identifier unique within one [`GameObjectRegistry`].
pub type ObjectId = u32;

/// Monotonic id source.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: ObjectId,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> ObjectId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// A drawable thing in the scene. `M` is the model type, shared between
/// objects that use the same geometry.
#[derive(Debug)]
pub struct GameObject<M> {
    id: ObjectId,
    pub model: Option<Arc<M>>,
    pub color: Vec3,
    pub transform2d: Transform2d,
    pub transform: TransformComponent,
}

impl<M> GameObject<M> {
    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

/// Owns every game object together with the allocator for their ids.
#[derive(Debug)]
pub struct GameObjectRegistry<M> {
    ids: IdAllocator,
    objects: Vec<GameObject<M>>,
}

impl<M> Default for GameObjectRegistry<M> {
    fn default() -> Self {
        Self {
            ids: IdAllocator::new(),
            objects: Vec::new(),
        }
    }
}

impl<M> GameObjectRegistry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an object with a fresh id, no model, black color and identity
    /// transforms, and returns it for setup.
    pub fn spawn(&mut self) -> &mut GameObject<M> {
        let id = self.ids.allocate();
        let index = self.objects.len();
        self.objects.push(GameObject {
            id,
            model: None,
            color: Vec3::ZERO,
            transform2d: Transform2d::default(),
            transform: TransformComponent::default(),
        });
        &mut self.objects[index]
    }

    pub fn objects(&self) -> &[GameObject<M>] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [GameObject<M>] {
        &mut self.objects
    }

    pub fn get(&self, id: ObjectId) -> Option<&GameObject<M>> {
        self.objects.iter().find(|object| object.id == id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
