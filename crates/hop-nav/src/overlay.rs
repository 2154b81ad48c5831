//! Loader and error banner
//!
//! Shared UI state with no locking: whichever request writes last wins.

/// How long the error banner stays up
pub const ERROR_DISMISS_MS: u64 = 5000;

/// A transient error notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub message: String,
    pub shown_at: u64,
}

impl ErrorNotice {
    pub fn is_visible(&self, now_ms: u64) -> bool {
        now_ms < self.shown_at.saturating_add(ERROR_DISMISS_MS)
    }
}

#[derive(Debug, Default)]
pub struct Overlay {
    loader_enabled: bool,
    min_duration_ms: u64,
    loader_visible: bool,
    loader_shown_at: Option<u64>,
    loader_hidden_at: Option<u64>,
    loader_shows: usize,
    error: Option<ErrorNotice>,
    errors_shown: usize,
}

impl Overlay {
    pub fn new(loader_enabled: bool, min_duration_ms: u64) -> Self {
        Self {
            loader_enabled,
            min_duration_ms,
            ..Self::default()
        }
    }

    /// Show the loader; returns false when the loader is disabled
    pub fn show_loader(&mut self, now_ms: u64) -> bool {
        if !self.loader_enabled {
            return false;
        }
        self.loader_visible = true;
        self.loader_shown_at = Some(now_ms);
        self.loader_shows += 1;
        tracing::debug!("Loader shown at {}", now_ms);
        true
    }

    /// Time left before the loader may hide, for a request started at
    /// `started_at`
    pub fn remaining_ms(&self, started_at: u64, now_ms: u64) -> u64 {
        if !self.loader_enabled {
            return 0;
        }
        self.min_duration_ms
            .saturating_sub(now_ms.saturating_sub(started_at))
    }

    pub fn hide_loader(&mut self, now_ms: u64) {
        if !self.loader_enabled {
            return;
        }
        self.loader_visible = false;
        self.loader_hidden_at = Some(now_ms);
        tracing::debug!("Loader hidden at {}", now_ms);
    }

    pub fn loader_visible(&self) -> bool {
        self.loader_visible
    }

    pub fn loader_shown_at(&self) -> Option<u64> {
        self.loader_shown_at
    }

    pub fn loader_hidden_at(&self) -> Option<u64> {
        self.loader_hidden_at
    }

    /// How many times the loader has been shown
    pub fn loader_shows(&self) -> usize {
        self.loader_shows
    }

    pub fn show_error(&mut self, message: &str, now_ms: u64) {
        tracing::debug!("Error displayed: {}", message);
        self.error = Some(ErrorNotice {
            message: message.to_string(),
            shown_at: now_ms,
        });
        self.errors_shown += 1;
    }

    /// Banner text while the banner is up
    pub fn error_text(&self, now_ms: u64) -> Option<&str> {
        self.error
            .as_ref()
            .filter(|notice| notice.is_visible(now_ms))
            .map(|notice| notice.message.as_str())
    }

    pub fn errors_shown(&self) -> usize {
        self.errors_shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_floor() {
        let overlay = Overlay::new(true, 200);
        assert_eq!(overlay.remaining_ms(1_000, 1_050), 150);
        assert_eq!(overlay.remaining_ms(1_000, 1_300), 0);
    }

    #[test]
    fn test_disabled_loader_never_shows() {
        let mut overlay = Overlay::new(false, 200);
        assert!(!overlay.show_loader(0));
        assert!(!overlay.loader_visible());
        assert_eq!(overlay.remaining_ms(0, 0), 0);
        assert_eq!(overlay.loader_shows(), 0);
    }

    #[test]
    fn test_show_then_hide() {
        let mut overlay = Overlay::new(true, 0);
        overlay.show_loader(10);
        assert!(overlay.loader_visible());
        overlay.hide_loader(20);
        assert!(!overlay.loader_visible());
        assert_eq!(overlay.loader_hidden_at(), Some(20));
    }

    #[test]
    fn test_error_auto_dismiss() {
        let mut overlay = Overlay::new(true, 0);
        overlay.show_error("boom", 1_000);
        assert_eq!(overlay.error_text(1_000), Some("boom"));
        assert_eq!(overlay.error_text(5_999), Some("boom"));
        assert_eq!(overlay.error_text(6_000), None);
        assert_eq!(overlay.errors_shown(), 1);
    }
}
