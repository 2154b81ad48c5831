//! hop - partial-page navigation
//!
//! Intercepts in-site navigation (link clicks, form submissions,
//! back/forward) and replaces full page loads with partial DOM updates
//! fetched through a server endpoint, keeping history consistent.
//!
//! # Example
//!
//! ```no_run
//! use hop_nav::{NavConfig, RawConfig, Session, input_channel};
//! use hop_net::HttpTransport;
//!
//! # fn main() -> anyhow::Result<()> {
//! let raw = RawConfig::from_json(r#"{"ajaxUrl":"https://example.com/ajax","enableCache":"1"}"#)?;
//! let config = NavConfig::resolve(&raw);
//! hop_nav::logging::init(config.debug_mode);
//!
//! let page = hop_html::HtmlParser::new()
//!     .parse_with_url("<main id=\"main\"></main>", "https://example.com/")?;
//! let session = Session::new(config, page, HttpTransport::new()?)?;
//!
//! let (bus, events) = input_channel();
//! bus.close();
//! smol::block_on(session.run(events));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
mod error;
pub mod forms;
pub mod history;
pub mod hooks;
pub mod intercept;
pub mod logging;
mod navigator;
pub mod overlay;
pub mod request;
pub mod scripts;
mod session;
pub mod stylesheet;

pub use cache::{CacheEntry, ContentCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, NavConfig, RawConfig, TokenCell};
pub use error::{NavError, Phase, TOKEN_REFRESH_MESSAGE};
pub use history::{HistoryEntry, HistoryManager, HistoryState};
pub use hooks::{Hook, HookContext, HookError, HookPoint, Hooks};
pub use intercept::{IgnoreReason, InputEvent, Intent};
pub use navigator::NavOutcome;
pub use request::{NavigationRequest, Origin};
pub use scripts::{ScriptDescriptor, ScriptError, ScriptHost, TracingScriptHost};
pub use session::{InputBus, Session, input_channel};
pub use stylesheet::StylesheetRef;
