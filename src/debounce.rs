//! Trailing-edge debouncer on tokio timers.
//!
//! Every call cancels the pending invocation and schedules a new one `delay`
//! after the call, so a burst collapses into a single invocation carrying the
//! arguments of the last call. Nothing is queued.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default quiescence window. Long enough to absorb the event burst of an
/// editor's atomic save.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

/// A debounced action. Owns at most one pending timer.
///
/// Dropping the trigger aborts the pending timer, so nothing fires after the
/// owner is gone. Must be used from within a tokio runtime.
pub struct Debounced<T> {
    action: Arc<dyn Fn(T) + Send + Sync>,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debounced<T> {
    pub fn new<F>(delay: Duration, action: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            action: Arc::new(action),
            delay,
            pending: None,
        }
    }

    /// Replace any pending invocation with one for `args`.
    pub fn call(&mut self, args: T) {
        self.cancel();
        let action = Arc::clone(&self.action);
        let deadline = Instant::now() + self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            action(args);
        }));
    }

    /// Drop the pending invocation, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Returns true while an invocation is scheduled but has not yet run.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl<T> Drop for Debounced<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) + Send + Sync + 'static) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        (calls, move |v| sink.lock().unwrap().push(v))
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_last_call() {
        let (calls, action) = recorder();
        let mut trigger = Debounced::new(Duration::from_millis(300), action);

        for i in 0..5 {
            trigger.call(i);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(calls.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(*calls.lock().unwrap(), vec![4]);
        assert!(!trigger.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_calls_each_fire() {
        let (calls, action) = recorder();
        let mut trigger = Debounced::new(Duration::from_millis(300), action);

        for i in 0..3 {
            trigger.call(i);
            tokio::time::sleep(Duration::from_millis(400)).await;
        }
        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_only_after_full_delay() {
        let (calls, action) = recorder();
        let mut trigger = Debounced::new(DEFAULT_DELAY, action);

        trigger.call(7);
        assert!(trigger.is_pending());
        tokio::time::sleep(Duration::from_millis(299)).await;
        assert!(calls.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*calls.lock().unwrap(), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_pending_call() {
        let (calls, action) = recorder();
        let mut trigger = Debounced::new(Duration::from_millis(300), action);

        trigger.call(1);
        trigger.cancel();
        assert!(!trigger.is_pending());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_pending_timer() {
        let (calls, action) = recorder();
        let mut trigger = Debounced::new(Duration::from_millis(300), action);

        trigger.call(1);
        drop(trigger);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_triggers_do_not_share_state() {
        let (calls_a, action_a) = recorder();
        let (calls_b, action_b) = recorder();
        let mut a = Debounced::new(Duration::from_millis(300), action_a);
        let mut b = Debounced::new(Duration::from_millis(300), action_b);

        a.call(1);
        b.call(2);
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(*calls_a.lock().unwrap(), vec![1]);
        assert_eq!(*calls_b.lock().unwrap(), vec![2]);
    }
}
