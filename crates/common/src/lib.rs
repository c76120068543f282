pub mod cancel;
pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use cancel::{CancelHandle, CancelToken};
pub use config::{Config, SourceMode};
pub use error::{Error, FetchError, Result};
pub use source::SnapshotSource;
pub use types::*;
