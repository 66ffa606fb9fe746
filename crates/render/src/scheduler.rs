use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Delay between a change and the repaint it triggers.
pub const PAINT_DEBOUNCE: Duration = Duration::from_millis(10);

/// Shared "needs repaint" flag. Cheap to clone and safe to set from any
/// thread, e.g. when an asset finishes loading.
#[derive(Debug, Clone, Default)]
pub struct DirtyFlag(Arc<AtomicBool>);

impl DirtyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Read and clear the flag.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Coalesces paint requests: at most one paint is pending, due `delay` after
/// the first request that scheduled it.
#[derive(Debug, Clone)]
pub struct PaintScheduler {
    delay: Duration,
    due: Option<Instant>,
}

impl PaintScheduler {
    pub fn new(delay: Duration) -> Self {
        Self { delay, due: None }
    }

    /// Schedule a paint unless one is already pending. Returns whether this
    /// call scheduled it.
    pub fn request(&mut self, now: Instant) -> bool {
        if self.due.is_some() {
            return false;
        }
        self.due = Some(now + self.delay);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    /// When the pending paint is due.
    pub fn due(&self) -> Option<Instant> {
        self.due
    }

    /// Clear and report the pending paint if it is due at `now`.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if due <= now => {
                self.due = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }
}

impl Default for PaintScheduler {
    fn default() -> Self {
        Self::new(PAINT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_coalesce() {
        let mut s = PaintScheduler::default();
        let t0 = Instant::now();
        assert!(s.request(t0));
        assert!(!s.request(t0 + Duration::from_millis(5)));
        assert!(!s.take_due(t0 + Duration::from_millis(9)));
        assert!(s.take_due(t0 + PAINT_DEBOUNCE));
        assert!(!s.take_due(t0 + Duration::from_millis(50)));
    }

    #[test]
    fn cancel_drops_pending() {
        let mut s = PaintScheduler::default();
        let t0 = Instant::now();
        s.request(t0);
        s.cancel();
        assert!(!s.is_pending());
        assert!(!s.take_due(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn dirty_flag_is_shared() {
        let flag = DirtyFlag::new();
        let other = flag.clone();
        std::thread::spawn(move || other.mark()).join().unwrap();
        assert!(flag.is_set());
        assert!(flag.take());
        assert!(!flag.take());
    }
}
