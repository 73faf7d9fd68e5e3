// Copyright 2024-2026 fenced-pool Contributors
// Licensed under the Apache License, Version 2.0

//! Resource creation/destruction capability consumed by [`FencedPool`].
//!
//! [`FencedPool`]: super::FencedPool

use crate::device::DeviceError;

/// Creates and destroys one kind of pooled resource.
///
/// Implementations hold whatever context they need (a device reference, an
/// allocator handle) but no pooling logic.
pub trait ResourceFactory {
    /// Handle type. Clones must refer to the same underlying resource.
    type Resource: Clone;

    /// Create one resource.
    fn create(&mut self) -> Result<Self::Resource, DeviceError>;

    /// Create `count` resources, all or nothing.
    ///
    /// Backends with a bulk allocation call should override this.
    fn create_many(&mut self, count: usize) -> Result<Vec<Self::Resource>, DeviceError> {
        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            match self.create() {
                Ok(resource) => created.push(resource),
                Err(e) => {
                    for resource in created.drain(..) {
                        self.destroy(resource);
                    }
                    return Err(e);
                }
            }
        }
        Ok(created)
    }

    /// Destroy one resource. Must not affect any other resource.
    fn destroy(&mut self, resource: Self::Resource);
}

/// [`ResourceFactory`] built from a create/destroy closure pair.
pub struct FnFactory<C, D> {
    create: C,
    destroy: D,
}

impl<R, C, D> FnFactory<C, D>
where
    C: FnMut() -> Result<R, DeviceError>,
    D: FnMut(R),
{
    pub fn new(create: C, destroy: D) -> Self {
        Self { create, destroy }
    }
}

impl<R, C, D> ResourceFactory for FnFactory<C, D>
where
    R: Clone,
    C: FnMut() -> Result<R, DeviceError>,
    D: FnMut(R),
{
    type Resource = R;

    fn create(&mut self) -> Result<R, DeviceError> {
        (self.create)()
    }

    fn destroy(&mut self, resource: R) {
        (self.destroy)(resource)
    }
}
