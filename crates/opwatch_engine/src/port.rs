use serde_json::Value;

use crate::{LogReply, PortError, ProgressReply, StartReply};

/// Bridge to the backend process that performs the actual work.
///
/// `Err` means the call itself failed (the channel is gone, the reply could not
/// be decoded). Errors the backend reports about its own work come back as
/// `Ok` replies with an error status.
#[async_trait::async_trait]
pub trait OperationPort: Send + Sync {
    async fn start(&self, params: &Value) -> Result<StartReply, PortError>;

    async fn query_progress(&self) -> Result<ProgressReply, PortError>;

    async fn tail_log(&self, _max_lines: usize) -> Result<LogReply, PortError> {
        Err(PortError::Unsupported("log tail"))
    }

    /// Best-effort; callers treat failure as non-fatal.
    async fn cancel(&self) -> Result<(), PortError>;
}
