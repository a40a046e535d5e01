//! Named scan actions and their registry
//!
//! The registry is built once at startup and handed to the engine, so
//! the set of accepted action names is an explicit dependency instead
//! of process-wide state.

use hort_common::{Error, Result};
use std::collections::HashMap;

/// What a device asks for when it submits a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedAction {
    /// Default: the engine classifies the scan on its own
    CheckIn,
    /// Explicit checkout: never opens a new visit, and confirms a
    /// pending daily checkout instead of asking again
    CheckOut,
}

/// Registry of accepted action names
pub struct ActionRegistry {
    handlers: HashMap<String, RequestedAction>,
}

impl ActionRegistry {
    /// Empty registry; callers register actions explicitly
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, action: RequestedAction) {
        self.handlers.insert(name.to_string(), action);
    }

    /// Registry with the standard scan actions
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("checkin", RequestedAction::CheckIn);
        registry.register("checkout", RequestedAction::CheckOut);
        registry
    }

    /// Resolve an optional action name; absent means the default
    /// check-in flow, unknown names are a client error.
    pub fn resolve(&self, name: Option<&str>) -> Result<RequestedAction> {
        match name {
            None => Ok(RequestedAction::CheckIn),
            Some(n) => self
                .handlers
                .get(n)
                .copied()
                .ok_or_else(|| Error::InvalidRequest(format!("unknown action '{}'", n))),
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
