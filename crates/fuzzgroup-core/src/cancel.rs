//! Cooperative cancellation for grouping runs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{GroupError, GroupResult};

/// Shared flag checked by the engine between phases.
///
/// Clones observe the same flag, so the request side can keep one while the
/// blocking worker holds another.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns `GroupError::Cancelled` once the flag is set.
    pub fn check(&self) -> GroupResult<()> {
        if self.is_cancelled() {
            Err(GroupError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Guard that cancels the flag when dropped, unless disarmed first.
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            flag: Some(self.clone()),
        }
    }
}

/// Cancels its flag on drop. Held by request futures so a dropped request
/// (client disconnect) stops the run it started.
#[derive(Debug)]
pub struct CancelOnDrop {
    flag: Option<CancelFlag>,
}

impl CancelOnDrop {
    /// Keep the flag untouched when the guard goes away.
    pub fn disarm(mut self) {
        self.flag = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(flag) = self.flag.take() {
            flag.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(flag.check().is_ok());
        other.cancel();
        assert!(matches!(flag.check(), Err(GroupError::Cancelled)));
    }

    #[test]
    fn test_drop_guard() {
        let flag = CancelFlag::new();
        {
            let _guard = flag.drop_guard();
        }
        assert!(flag.is_cancelled());

        let flag = CancelFlag::new();
        flag.drop_guard().disarm();
        assert!(!flag.is_cancelled());
    }
}
