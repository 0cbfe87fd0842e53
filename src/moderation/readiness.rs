// Process-wide model readiness.
//
// One handle is created at startup and cloned into the warm-up task and the
// request path. Requests never wait on it: they read the state and fail
// closed if models are not ready yet.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle of model warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupState {
    Initializing,
    Warming,
    Ready,
    /// Warm-up finished without loading any model.
    Failed,
}

impl WarmupState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => WarmupState::Warming,
            2 => WarmupState::Ready,
            3 => WarmupState::Failed,
            _ => WarmupState::Initializing,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WarmupState::Initializing => 0,
            WarmupState::Warming => 1,
            WarmupState::Ready => 2,
            WarmupState::Failed => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Readiness {
    state: Arc<AtomicU8>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(WarmupState::Initializing.as_u8())),
        }
    }

    pub fn state(&self) -> WarmupState {
        WarmupState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn ready(&self) -> bool {
        self.state() == WarmupState::Ready
    }

    pub fn is_warming(&self) -> bool {
        self.state() == WarmupState::Warming
    }

    /// Mark warm-up as started. Returns false if a warm-up is already running
    /// or has finished, so callers never start a second one.
    pub fn begin_warmup(&self) -> bool {
        self.state
            .compare_exchange(
                WarmupState::Initializing.as_u8(),
                WarmupState::Warming.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn set(&self, state: WarmupState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_not_ready() {
        let r = Readiness::new();
        assert!(!r.ready());
        assert_eq!(r.state(), WarmupState::Initializing);
    }

    #[test]
    fn test_begin_warmup_only_once() {
        let r = Readiness::new();
        assert!(r.begin_warmup());
        assert!(r.is_warming());
        assert!(!r.begin_warmup());
    }

    #[test]
    fn test_clones_share_state() {
        let r = Readiness::new();
        let other = r.clone();
        r.set(WarmupState::Ready);
        assert!(other.ready());
    }
}
