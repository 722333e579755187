use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelErr {
    Cancelled,
}

/// Why a bounded future did not produce its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    TimedOut(Duration),
}

impl std::fmt::Display for Interrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interrupted::Cancelled => write!(f, "cancelled"),
            Interrupted::TimedOut(after) => write!(f, "timed out after {}ms", after.as_millis()),
        }
    }
}

impl From<CancelErr> for Interrupted {
    fn from(_: CancelErr) -> Self {
        Interrupted::Cancelled
    }
}

#[async_trait]
pub trait OrCancelExt: Sized {
    type Output;

    /// Resolve to the future's output, or `CancelErr` as soon as `token` fires.
    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr>;

    /// Like [`OrCancelExt::or_cancel`] but also gives up after `timeout`.
    async fn or_deadline(
        self,
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<Self::Output, Interrupted>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr> {
        tokio::select! {
            _ = token.cancelled() => Err(CancelErr::Cancelled),
            res = self => Ok(res),
        }
    }

    async fn or_deadline(
        self,
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<Self::Output, Interrupted> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Interrupted::Cancelled),
            res = tokio::time::timeout(timeout, self) => {
                res.map_err(|_| Interrupted::TimedOut(timeout))
            }
        }
    }
}
