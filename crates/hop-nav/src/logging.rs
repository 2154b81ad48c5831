//! Logging setup
//!
//! Engine logging is gated by debug mode; errors always surface.
//! `RUST_LOG` overrides both.

use tracing_subscriber::EnvFilter;

const CRATES: &[&str] = &["hop_nav", "hop_net", "hop_html", "hop_dom"];

/// Filter directives for the given mode
pub fn default_directives(debug_mode: bool) -> String {
    if debug_mode {
        let mut directives = vec!["warn".to_string()];
        directives.extend(CRATES.iter().map(|krate| format!("{krate}=debug")));
        directives.join(",")
    } else {
        "error".to_string()
    }
}

/// Install the global fmt subscriber; returns false when one was already
/// installed
pub fn init(debug_mode: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug_mode)));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Logging initialized: debug={}", debug_mode);
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives() {
        assert_eq!(default_directives(false), "error");
        let debug = default_directives(true);
        assert!(debug.starts_with("warn,"));
        assert!(debug.contains("hop_nav=debug"));
    }

    #[test]
    fn test_init_is_idempotent() {
        init(true);
        assert!(!init(false));
    }
}
