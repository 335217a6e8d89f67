//! Cross-thread signals shared by the coordinator and the capture loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set while screen capture should continue.
///
/// The session is the only writer; the screen loop polls it at the top of
/// every iteration.
#[derive(Debug, Clone, Default)]
pub struct RecordingFlag(Arc<AtomicBool>);

impl RecordingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One-shot stop notification for the audio loop. Once raised it stays
/// raised.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_is_shared_between_clones() {
        let flag = RecordingFlag::new();
        let reader = flag.clone();
        assert!(!reader.is_set());
        flag.set();
        assert!(reader.is_set());
        flag.clear();
        assert!(!reader.is_set());
    }

    #[test]
    fn test_stop_signal_stays_raised() {
        let signal = StopSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_raised());
        signal.raise();
        signal.raise();
        assert!(observer.is_raised());
    }
}
