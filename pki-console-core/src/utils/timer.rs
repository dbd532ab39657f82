//! Cancelable scheduled-task handle
//!
//! Polling and refresh loops are modeled as spawned tasks with an explicit
//! handle. Replacing or dropping the handle aborts the task, which is the
//! cancellation contract for the session's ping and refresh timers.

use tokio::task::JoinHandle;

/// Handle of a scheduled task. Aborts the task when canceled or dropped.
#[derive(Debug)]
pub struct TimerHandle {
    handle: JoinHandle<()>,
}

impl TimerHandle {
    /// Wraps a spawned task.
    #[must_use]
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    /// Cancels the task. Idempotent.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the task has run to completion or was canceled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let timer = TimerHandle::new(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            flag.store(true, Ordering::SeqCst);
        }));

        timer.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_aborts() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        drop(TimerHandle::new(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            flag.store(true, Ordering::SeqCst);
        })));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
