mod batch_function;
mod error;
mod loader;
mod loader_worker;
mod memo;
mod request;
mod scope;
#[cfg(feature = "stats")]
mod worker_stats;

pub use batch_function::{resolve_found, BatchFunction};
pub use error::{BoxError, LoadError, LoadResult};
pub use loader::Loader;
pub use scope::RequestScope;
