use super::types::*;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Transport that carries one artifact to the processing service.
///
/// Implementations resolve exactly once. Progress values are bytes sent over
/// bytes total and are never synthesized. When `cancel` fires, the transfer
/// is abandoned and `FailureReason::Cancelled` is returned.
#[async_trait]
pub trait TransferClient: Send + Sync {
    async fn submit(
        &self,
        request: SubmissionRequest,
        progress: ProgressCallback,
        cancel: CancellationToken,
    ) -> Result<ProcessingResult, TransferFailure>;
}

#[cfg(test)]
pub use mock::{MockTransferClient, PendingSubmission};
