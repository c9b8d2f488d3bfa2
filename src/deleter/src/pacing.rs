//! Request pacing and cancellation.
//!
//! Pacing goes through an injectable [`Pacer`] so that tests can run the
//! enumerators without real elapsed time, and so production pacing can be
//! swapped for something that reacts to observed rate limits.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{DeleterError, Result};

#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait out `delay` before the next request
    async fn pause(&self, delay: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepPacer;

#[async_trait]
impl Pacer for SleepPacer {
    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Never waits
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

#[async_trait]
impl Pacer for NoPacing {
    async fn pause(&self, _delay: Duration) {}
}

pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(DeleterError::Cancelled)
    } else {
        Ok(())
    }
}

/// Pause, returning early with [`DeleterError::Cancelled`] if the token trips.
pub(crate) async fn pause(
    pacer: &dyn Pacer,
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    ensure_active(cancel)?;
    tokio::select! {
        _ = pacer.pause(delay) => Ok(()),
        _ = cancel.cancelled() => Err(DeleterError::Cancelled),
    }
}
