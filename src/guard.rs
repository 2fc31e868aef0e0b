use crate::error::{Error, Result};
use crate::pool::PoolInner;
use crate::resource::Factory;
use std::ops::{Deref, DerefMut};
use std::sync::Weak;

/// Scoped handle over one checked-out resource.
///
/// A guard returns its resource to the pool when dropped, or destroys it
/// when explicitly [`discard`](Guard::discard)ed, exactly once either way.
/// It holds the pool weakly: if the pool is torn down first, the guard
/// keeps working on its resource and simply drops it at the end.
///
/// A guard is only ever empty after a [`recover`](Guard::recover) that
/// could not produce a replacement.
pub struct Guard<F: Factory> {
    resource: Option<F::Resource>,
    pool: Weak<PoolInner<F>>,
}

impl<F: Factory> Guard<F> {
    pub(crate) fn new(resource: F::Resource, pool: Weak<PoolInner<F>>) -> Self {
        Self {
            resource: Some(resource),
            pool,
        }
    }

    /// Whether a resource is currently held.
    pub fn is_ready(&self) -> bool {
        self.resource.is_some()
    }

    /// The held resource, or [`Error::NotReady`] for an empty guard.
    pub fn resource(&self) -> Result<&F::Resource> {
        self.resource.as_ref().ok_or(Error::NotReady)
    }

    pub fn resource_mut(&mut self) -> Result<&mut F::Resource> {
        self.resource.as_mut().ok_or(Error::NotReady)
    }

    /// Runs the factory's validity predicate on the held resource.
    ///
    /// False when the guard is empty or the pool is gone. Never touches
    /// pool accounting.
    pub async fn is_valid(&self) -> bool {
        match (self.pool.upgrade(), self.resource.as_ref()) {
            (Some(pool), Some(resource)) => pool.validate(resource).await,
            _ => false,
        }
    }

    /// Abandons the held resource and installs a freshly created one.
    ///
    /// The old resource is destroyed and its busy slot carries over to the
    /// replacement, so the pool's accounting is unaffected. If creation
    /// fails, or the pool is gone, the guard is left empty.
    pub async fn recover(&mut self) -> Result<()> {
        let Some(pool) = self.pool.upgrade() else {
            self.resource = None;
            return Ok(());
        };
        match self.resource.take() {
            Some(old) => {
                self.resource = Some(pool.replace(old).await?);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Discarding release: the resource is removed from the pool and
    /// destroyed instead of being re-idled.
    pub fn discard(mut self) {
        let Some(resource) = self.resource.take() else {
            return;
        };
        match self.pool.upgrade() {
            Some(pool) => pool.release(resource, true),
            None => drop(resource),
        }
    }
}

impl<F: Factory> Deref for Guard<F> {
    type Target = F::Resource;

    /// Panics on an empty guard; use [`Guard::resource`] for the checked
    /// form.
    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().unwrap()
    }
}

impl<F: Factory> DerefMut for Guard<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().unwrap()
    }
}

impl<F: Factory> Drop for Guard<F> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            if let Some(pool) = self.pool.upgrade() {
                pool.release(resource, false);
            }
            // pool gone: the factory went with it, the resource just drops
        }
    }
}
