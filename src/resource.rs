use async_trait::async_trait;
use std::error::Error;

/// Creates, validates and destroys the resources managed by a
/// [`Pool`](crate::Pool).
///
/// The pool never constructs or drops a resource by any other means: every
/// resource it hands out came from [`create`](Factory::create) and every
/// resource it retires goes through [`destroy`](Factory::destroy) exactly
/// once.
#[async_trait]
pub trait Factory: Send + Sync + 'static {
    type Resource: Send;
    type Error: Error + Send + Sync + 'static;

    /// Allocates a new, ready-to-use resource. A failure here propagates to
    /// the pool operation that requested the resource.
    async fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Pure validity predicate; must not mutate anything observable by the
    /// pool.
    async fn validate(&self, _resource: &Self::Resource) -> bool {
        true
    }

    /// Releases everything held by the resource. Called at most once per
    /// resource, possibly while the pool lock is held, so it must be quick
    /// and must not fail.
    fn destroy(&self, resource: Self::Resource) {
        drop(resource);
    }
}
