use async_trait::async_trait;

use crate::{CancelToken, FetchError, FetchRequest, Snapshot};

/// Abstraction over the signal service.
///
/// `HttpSnapshotClient` implements this against the real service.
/// `DemoSource` implements this for running without one.
///
/// Only the refresh scheduler calls `fetch`; everything downstream works on
/// the snapshots it accepts.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch one snapshot for `request`.
    ///
    /// Implementations must return [`FetchError::Cancelled`] promptly once
    /// `cancel` trips, and must never panic on bad upstream data.
    async fn fetch(&self, request: FetchRequest, cancel: CancelToken)
        -> Result<Snapshot, FetchError>;
}
