//! Per-call access context. Carries the caller's deadline down to every
//! blocking socket operation so a caller-side timeout unblocks it.
use std::{future::Future, io, time::Duration};

use tokio::time::{Instant, timeout_at};

use super::error::{DeviceError, DeviceResult};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AccessContext {
    deadline: Option<Instant>,
}

impl AccessContext {
    /// No deadline; adapters fall back to their own default.
    pub const BACKGROUND: AccessContext = AccessContext { deadline: None };

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Applies `default` when the caller supplied no deadline. A caller
    /// deadline is never extended.
    pub fn or_timeout(self, default: Duration) -> Self {
        match self.deadline {
            Some(_) => self,
            None => Self::with_timeout(default),
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| deadline <= Instant::now())
    }

    /// Fails before any I/O when the deadline already passed.
    pub fn check(&self) -> DeviceResult<()> {
        if self.is_expired() {
            Err(DeviceError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Waits for `acquire`, typically a connection lock, within the deadline.
    /// Nothing has been sent yet, so expiry is [`DeviceError::DeadlineExceeded`]
    /// and the deadline is checked again once the wait completes.
    pub async fn wait<T, F>(&self, acquire: F) -> DeviceResult<T>
    where
        F: Future<Output = T>,
    {
        let value = match self.deadline {
            Some(deadline) => timeout_at(deadline, acquire)
                .await
                .map_err(|_| DeviceError::DeadlineExceeded)?,
            None => acquire.await,
        };
        self.check()?;
        Ok(value)
    }

    /// Drives `operation` until completion or the deadline. Expiry while the
    /// operation is in flight is reported as [`DeviceError::Timeout`].
    pub async fn run<T, F>(&self, operation: F) -> DeviceResult<T>
    where
        F: Future<Output = io::Result<T>>,
    {
        match self.deadline {
            Some(deadline) => match timeout_at(deadline, operation).await {
                Ok(result) => result.map_err(DeviceError::from),
                Err(_) => Err(DeviceError::Timeout),
            },
            None => operation.await.map_err(DeviceError::from),
        }
    }
}
