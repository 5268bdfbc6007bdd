//! Cooperative cancellation for one relocation.
//! A token is a shared one-way "stop" flag: loops poll it at iteration
//! boundaries and wind down on their own; nothing is preempted.
//!
//! Notes:
//! - Relaxed atomics are sufficient for a one-way flag.
//! - `cancel()` is safe to call from a ctrl-c handler thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns true only for the request that actually
    /// flipped the flag; later calls are no-ops.
    #[inline]
    pub fn cancel(&self) -> bool {
        !self.flag.swap(true, Ordering::Relaxed)
    }

    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_cancel_wins_rest_are_noops() {
        let t = CancelToken::new();
        assert!(!t.is_canceled());
        assert!(t.cancel());
        assert!(!t.cancel());
        assert!(t.is_canceled());
    }

    #[test]
    fn clones_share_the_flag() {
        let t = CancelToken::new();
        let other = t.clone();
        std::thread::spawn(move || other.cancel()).join().unwrap();
        assert!(t.is_canceled());
    }
}
