//! Issue action dispatch.
//!
//! The built-in actions are a closed enum; anything else must come through
//! the [`ActionRegistry`], the explicit extension point for plugin-provided
//! actions. An action name that is neither built-in nor registered is a
//! client error, never forwarded blindly.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::Issue;
use crate::store::{IssueStore, OperationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueAction {
    Comment,
    Assign,
    Transition,
    Severity,
    Plan,
    Unplan,
}

impl IssueAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Assign => "assign",
            Self::Transition => "transition",
            Self::Severity => "severity",
            Self::Plan => "plan",
            Self::Unplan => "unplan",
        }
    }
}

impl std::fmt::Display for IssueAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "comment" => Ok(Self::Comment),
            "assign" => Ok(Self::Assign),
            "transition" => Ok(Self::Transition),
            "severity" => Ok(Self::Severity),
            "plan" => Ok(Self::Plan),
            "unplan" => Ok(Self::Unplan),
            _ => Err(format!("Unknown issue action: {}", s)),
        }
    }
}

/// Raw request parameters handed to a plugin action handler.
pub type ActionParams = HashMap<String, String>;

pub type PluginHandler =
    Arc<dyn Fn(&dyn IssueStore, &str, &ActionParams) -> OperationResult<Issue> + Send + Sync>;

/// How an action name resolved: one of the built-ins, or a registered
/// plugin handler.
pub enum ResolvedAction {
    Builtin(IssueAction),
    Plugin(PluginHandler),
}

#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, PluginHandler>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&dyn IssueStore, &str, &ActionParams) -> OperationResult<Issue>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn resolve(&self, name: &str) -> Option<ResolvedAction> {
        if let Ok(builtin) = name.parse::<IssueAction>() {
            return Some(ResolvedAction::Builtin(builtin));
        }
        self.handlers
            .get(name)
            .cloned()
            .map(ResolvedAction::Plugin)
    }
}
