//! User-facing notifications.
//!
//! The registry reports problems the user should see (a port that refused to
//! open, for instance) through a [`Notifier`]. Notifications are fire-and-forget;
//! nothing the notifier does feeds back into device state.

use crate::direction::Direction;
use std::fmt;
use std::sync::{Arc, Mutex};

/// What to tell the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// A port did not end up in the requested open/closed state.
    PortOpenError { device: String, direction: Direction },
}

impl Prompt {
    /// Stable tag for the prompt kind, e.g. for looking up localized text.
    pub fn kind(&self) -> &'static str {
        match self {
            Prompt::PortOpenError { .. } => "PortOpenError",
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prompt::PortOpenError { device, direction } => {
                write!(f, "{}: could not change the {direction} port of {device}", self.kind())
            }
        }
    }
}

/// Receives user prompts.
pub trait Notifier: Send {
    fn prompt(&mut self, prompt: &Prompt);
}

/// Drops every prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn prompt(&mut self, _prompt: &Prompt) {}
}

/// Routes prompts to the `tracing` subscriber at `warn` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        TracingNotifier
    }
}

impl Notifier for TracingNotifier {
    fn prompt(&mut self, prompt: &Prompt) {
        tracing::warn!(kind = prompt.kind(), "{prompt}");
    }
}

/// Keeps every prompt in a shared list; clones observe the same list.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    prompts: Arc<Mutex<Vec<Prompt>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn prompt(&mut self, prompt: &Prompt) {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.clone());
    }
}
