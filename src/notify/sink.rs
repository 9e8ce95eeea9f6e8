use crate::alert::Alert;
use crate::errors::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A named notification endpoint.
///
/// A sink accepts one alert per `send` call and reports success or a
/// terminal error for that attempt; the dispatcher does not retry. Sinks
/// may block on I/O and must honor the cancellation token they are given.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Unique sink name, referenced by rules' `notify` lists.
    fn name(&self) -> &str;

    /// Attempt to deliver one alert.
    async fn send(&self, cancel: &CancellationToken, alert: &Alert) -> Result<()>;

    /// Release any resources held by the sink. Called once on dispatcher
    /// shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
