/// Cooperative stop signal shared by the lister, the copy workers, and the
/// CLI ctrl-c handler. Cancellation never interrupts a copy request that is
/// already in flight.
pub type PipelineCancellationToken = tokio_util::sync::CancellationToken;

pub fn create_pipeline_cancellation_token() -> PipelineCancellationToken {
    tokio_util::sync::CancellationToken::new()
}
