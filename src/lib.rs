//! Bounded async pool for resources that are expensive to create and safe
//! to reuse, such as network connections.
//!
//! The pool pre-fills to its capacity ceiling, hands resources out through
//! RAII [`Guard`]s, suspends acquirers (with a timeout) when exhausted, and
//! runs a background reaper that evicts idle resources past a maximum age.
//!
//! ```
//! use repool::resource::Factory;
//! use repool::{async_trait, Pool};
//! use std::convert::Infallible;
//!
//! struct IntFactory;
//!
//! #[async_trait]
//! impl Factory for IntFactory {
//!     type Resource = i32;
//!     type Error = Infallible;
//!
//!     async fn create(&self) -> Result<i32, Infallible> {
//!         Ok(0)
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> repool::Result<()> {
//! let pool = Pool::with_capacity(IntFactory, 4).await?;
//! let mut value = pool.acquire().await?;
//! *value += 1;
//! drop(value); // back to the pool
//! # Ok(())
//! # }
//! ```
mod error;
mod guard;
mod pool;
pub mod resource;

pub use async_trait::async_trait;
pub use error::{BoxDynError, Error, Result};
pub use guard::Guard;
pub use pool::{Pool, PoolConfig, PoolStatus, REAP_INTERVAL};
