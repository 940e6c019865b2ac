//! Re-association of results with pictures that arrive without one.

use crate::buffer::MediaBuffer;

/// Default reuse window in milliseconds.
pub const DEFAULT_REUSE_WINDOW_MS: u64 = 500;

/// Keeps the last received result and hands it out again for pictures that
/// carry none, as long as the picture is not older than the result and at
/// most one window later.
#[derive(Debug, Clone)]
pub struct ReuseWindow {
    window_us: u64,
    last: Option<MediaBuffer>,
}

impl Default for ReuseWindow {
    fn default() -> Self {
        Self::new(DEFAULT_REUSE_WINDOW_MS)
    }
}

impl ReuseWindow {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_us: window_ms.saturating_mul(1000),
            last: None,
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_us / 1000
    }

    /// Result to draw on a picture taken at `picture_ts_us`.
    ///
    /// A `fresh` result replaces the cached one and is returned as is.
    pub fn select(&mut self, picture_ts_us: u64, fresh: Option<MediaBuffer>) -> Option<MediaBuffer> {
        if let Some(fresh) = fresh {
            self.last = Some(fresh.clone());
            return Some(fresh);
        }
        let last = self.last.as_ref()?;
        let age = picture_ts_us.checked_sub(last.timestamp_us())?;
        if age < self.window_us {
            tracing::trace!("Reusing result from {}us ago", age);
            Some(last.clone())
        } else {
            None
        }
    }

    pub fn last(&self) -> Option<&MediaBuffer> {
        self.last.as_ref()
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferKind;

    fn result_at(ts_ms: u64) -> MediaBuffer {
        MediaBuffer::new(vec![1], BufferKind::Inference).with_timestamp(ts_ms * 1000)
    }

    #[test]
    fn test_fresh_result_wins() {
        let mut window = ReuseWindow::default();
        let fresh = result_at(10);
        let chosen = window.select(10_000, Some(fresh.clone())).unwrap();
        assert!(chosen.same_data(&fresh));
        assert!(window.last().is_some());
    }

    #[test]
    fn test_reuse_inside_window() {
        let mut window = ReuseWindow::default();
        window.select(1_000_000, Some(result_at(1_000)));
        assert!(window.select(1_100_000, None).is_some());
        assert!(window.select(1_499_999, None).is_some());
        assert!(window.select(1_500_000, None).is_none());
        assert!(window.select(1_600_000, None).is_none());
    }

    #[test]
    fn test_no_reuse_for_older_picture() {
        let mut window = ReuseWindow::default();
        window.select(0, Some(result_at(1_000)));
        assert!(window.select(999_000, None).is_none());
        assert!(window.select(1_000_000, None).is_some());
    }

    #[test]
    fn test_empty_and_cleared() {
        let mut window = ReuseWindow::new(100);
        assert_eq!(window.window_ms(), 100);
        assert!(window.select(5, None).is_none());
        window.select(0, Some(result_at(0)));
        window.clear();
        assert!(window.select(1, None).is_none());
    }
}
