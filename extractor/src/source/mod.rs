//! Block message sources

use async_trait::async_trait;

use crate::error::Result;
use crate::models::BlockMessage;

pub mod snapshot;
pub mod stream;

pub use snapshot::SnapshotDir;
pub use stream::JsonLinesSource;

/// Where decoded block messages come from.
///
/// A message is acknowledged only once it has been fully decomposed; a
/// message that was handed out but never acknowledged must be redelivered by
/// whatever feeds the source.
#[async_trait]
pub trait MessageSource: Send {
    fn describe(&self) -> String;

    /// Next message, or `None` once the source is exhausted or closed.
    async fn next_message(&mut self) -> Result<Option<BlockMessage>>;

    async fn acknowledge(&mut self, message: &BlockMessage) -> Result<()>;

    /// Stop consuming. Called before aborting on a ledger fault.
    async fn close(&mut self) -> Result<()>;
}
