use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Write-once cancellation flag shared between a coordinator and the
/// executor it observes. Once set it never clears.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent. Has no visible effect once the outcome has been emitted.
    pub fn request_cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            tracing::info!("Cancellation requested");
        }
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear() {
        assert!(!CancellationToken::new().is_set());
    }

    #[test]
    fn request_is_idempotent_and_shared() {
        let token = CancellationToken::new();
        let observer = token.clone();
        token.request_cancel();
        token.request_cancel();
        assert!(observer.is_set());
    }

    #[test]
    fn set_from_another_thread() {
        let token = CancellationToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.request_cancel())
            .join()
            .unwrap();
        assert!(token.is_set());
    }
}
