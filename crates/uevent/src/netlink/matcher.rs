//! Event filtering for the monitor loop.
//!
//! A [`Matcher`] is compiled once before monitoring starts and then asked
//! about every parsed event. Rule languages live outside this crate; they
//! plug in by implementing the trait.
//!
//! # Example
//!
//! ```ignore
//! use uevent::netlink::{Action, PropertyMatcher};
//!
//! let matcher = PropertyMatcher::new()
//!     .action(Action::Add)
//!     .subsystem("block")
//!     .property("DEVTYPE", "disk");
//! ```

use std::collections::HashMap;

use super::error::{Error, Result};
use super::uevent::{Action, Uevent};

/// Decides which events the monitor delivers.
pub trait Matcher: Send + Sync {
    /// Prepare match state. Called once, before the first event.
    fn compile(&mut self) -> Result<()> {
        Ok(())
    }

    /// Return `true` to deliver `event`.
    fn evaluate(&self, event: &Uevent) -> bool;
}

impl<M: Matcher + ?Sized> Matcher for Box<M> {
    fn compile(&mut self) -> Result<()> {
        (**self).compile()
    }

    fn evaluate(&self, event: &Uevent) -> bool {
        (**self).evaluate(event)
    }
}

/// Accepts events whose action is in a set and whose properties include
/// every required `KEY=VALUE` pair.
///
/// An empty action set accepts any action.
#[derive(Debug, Clone, Default)]
pub struct PropertyMatcher {
    actions: Vec<Action>,
    required: Vec<(String, String)>,
    compiled: HashMap<String, String>,
}

impl PropertyMatcher {
    /// Create a matcher that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept this action (may be called repeatedly).
    pub fn action(mut self, action: Action) -> Self {
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
        self
    }

    /// Require `SUBSYSTEM=name`.
    pub fn subsystem(self, name: impl Into<String>) -> Self {
        self.property("SUBSYSTEM", name)
    }

    /// Require `key=value`.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.required.push((key.into(), value.into()));
        self
    }

    /// Check if no filter has been configured.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.required.is_empty()
    }
}

impl Matcher for PropertyMatcher {
    fn compile(&mut self) -> Result<()> {
        let mut compiled = HashMap::with_capacity(self.required.len());
        for (key, value) in &self.required {
            if key.is_empty() {
                return Err(Error::matcher_compile("property key must not be empty"));
            }
            if let Some(previous) = compiled.insert(key.clone(), value.clone())
                && previous != *value
            {
                return Err(Error::matcher_compile(format!(
                    "conflicting values for {key}: {previous:?} and {value:?}"
                )));
            }
        }
        self.compiled = compiled;
        Ok(())
    }

    fn evaluate(&self, event: &Uevent) -> bool {
        if !self.actions.is_empty() && !self.actions.contains(&event.action) {
            return false;
        }
        self.compiled
            .iter()
            .all(|(key, value)| event.get(key) == Some(value.as_str()))
    }
}

/// Adapts a closure into a [`Matcher`] with a no-op compile step.
#[derive(Debug, Clone, Copy)]
pub struct FnMatcher<F>(F);

/// Build a [`Matcher`] from a closure.
pub fn match_fn<F>(f: F) -> FnMatcher<F>
where
    F: Fn(&Uevent) -> bool + Send + Sync,
{
    FnMatcher(f)
}

impl<F> Matcher for FnMatcher<F>
where
    F: Fn(&Uevent) -> bool + Send + Sync,
{
    fn evaluate(&self, event: &Uevent) -> bool {
        (self.0)(event)
    }
}
