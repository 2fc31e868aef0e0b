use std::error::Error as StdError;
use std::result::Result as StdResult;

pub type BoxDynError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to create a pool resource")]
    CreationFailed(#[source] BoxDynError),

    #[error("timed out waiting for a pool resource")]
    AcquireTimeout,

    #[error("guard does not hold a resource")]
    NotReady,
}

pub type Result<T> = StdResult<T, Error>;
