//! Navigation hooks
//!
//! Admin-supplied code runs before and after every navigation. It is
//! trusted; only its failures are contained. A hook is either a callable
//! registered by the embedder or a code string handed to the
//! [`ScriptHost`] as an inline script.

use std::fmt;
use std::rc::Rc;

use crate::config::NavConfig;
use crate::request::Origin;
use crate::scripts::{ScriptDescriptor, ScriptHost};

/// Extension point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    BeforeNavigate,
    AfterNavigate,
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookPoint::BeforeNavigate => "before-navigate",
            HookPoint::AfterNavigate => "after-navigate",
        })
    }
}

/// What a hook is told about the navigation
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub point: HookPoint,
    pub url: &'a str,
    pub origin: Origin,
}

pub type HookFn = Rc<dyn Fn(&HookContext<'_>) -> anyhow::Result<()>>;

#[derive(Clone, Default)]
pub enum Hook {
    #[default]
    None,
    Code(String),
    Callable(HookFn),
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::None => f.write_str("None"),
            Hook::Code(code) => f.debug_tuple("Code").field(code).finish(),
            Hook::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

impl Hook {
    /// Hook from configured code; blank code is no hook
    pub fn from_code(code: &str) -> Self {
        if code.trim().is_empty() {
            Hook::None
        } else {
            Hook::Code(code.to_string())
        }
    }

    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&HookContext<'_>) -> anyhow::Result<()> + 'static,
    {
        Hook::Callable(Rc::new(f))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Hook::None)
    }
}

/// Hook failure; never aborts a navigation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{point} hook failed: {message}")]
pub struct HookError {
    pub point: HookPoint,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Hooks {
    pub before: Hook,
    pub after: Hook,
}

impl Hooks {
    pub fn from_config(config: &NavConfig) -> Self {
        Self {
            before: Hook::from_code(&config.before_navigate),
            after: Hook::from_code(&config.after_navigate),
        }
    }

    pub fn get(&self, point: HookPoint) -> &Hook {
        match point {
            HookPoint::BeforeNavigate => &self.before,
            HookPoint::AfterNavigate => &self.after,
        }
    }

    /// Run the hook at `ctx.point`
    pub fn run(&self, ctx: &HookContext<'_>, host: &dyn ScriptHost) -> Result<(), HookError> {
        let fail = |message: String| HookError {
            point: ctx.point,
            message,
        };
        match self.get(ctx.point) {
            Hook::None => {
                tracing::trace!("No {} hook to execute", ctx.point);
                Ok(())
            }
            Hook::Code(code) => host
                .execute(&ScriptDescriptor::Inline { text: code.clone() })
                .map_err(|err| fail(err.0)),
            Hook::Callable(f) => f(ctx).map_err(|err| fail(format!("{err:#}"))),
        }
    }

    /// Run the hook, logging and swallowing any failure
    pub fn run_contained(&self, ctx: &HookContext<'_>, host: &dyn ScriptHost) {
        match self.run(ctx, host) {
            Ok(()) => tracing::debug!("{} hook executed for {}", ctx.point, ctx.url),
            Err(err) => tracing::warn!(url = %ctx.url, "{}", err),
        }
    }
}
