//! Replay-after-refresh policy for authorization failures.

use std::future::Future;

/// Replays a call after refreshing credentials when the first attempt is rejected.
///
/// The attempt count lives here, per logical call, rather than on the request itself. With the
/// default bound of one retry a call is executed at most twice; whatever the final attempt
/// returns (including another authorization failure) is handed back to the caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthRetry {
    max_retries: usize,
}

impl Default for AuthRetry {
    fn default() -> Self {
        Self { max_retries: 1 }
    }
}

impl AuthRetry {
    pub fn new(max_retries: usize) -> Self {
        Self { max_retries }
    }

    /// Runs `execute`, calling `refresh` and re-running it while `is_auth_failure` holds and the
    /// retry budget lasts.
    ///
    /// Errors from `execute` or `refresh` are returned immediately and never retried.
    pub async fn run<R, Exec, ExecFut, Refresh, RefreshFut>(
        &self,
        mut execute: Exec,
        is_auth_failure: impl Fn(&R) -> bool,
        mut refresh: Refresh,
    ) -> eyre::Result<R>
    where
        Exec: FnMut() -> ExecFut,
        ExecFut: Future<Output = eyre::Result<R>>,
        Refresh: FnMut() -> RefreshFut,
        RefreshFut: Future<Output = eyre::Result<()>>,
    {
        let mut retries = 0;
        loop {
            let outcome = execute().await?;
            if !is_auth_failure(&outcome) {
                return Ok(outcome);
            }
            if retries >= self.max_retries {
                tracing::debug!(retries, "authorization still rejected, giving up");
                return Ok(outcome);
            }
            retries += 1;
            tracing::debug!(retries, "authorization rejected, refreshing credentials");
            refresh().await?;
        }
    }
}
