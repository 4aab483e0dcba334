//! Backing-service seams for the issue panel.
//!
//! The panel never owns domain data. Each collaborator is a narrow trait so
//! the assembler and handlers can be tested against doubles, with the
//! in-memory implementations in [`memory`] as the bundled stores. All
//! methods are synchronous: the panel performs its lookups sequentially
//! within a single request.

use std::sync::Arc;

use crate::models::{
    ActionPlan, ChangelogEntry, Characteristic, Comment, Component, Issue, Rule, Severity,
    Snapshot, User,
};

pub mod memory;

pub use memory::MemoryBackend;

/// Outcome of a backing mutation, mirroring the service contract of
/// `ok`/`errors`/`httpStatus`: either the affected entity, or the error
/// list and HTTP status the service reported.
#[derive(Debug, Clone)]
pub enum OperationResult<T> {
    Ok(T),
    Rejected { status: u16, errors: Vec<String> },
}

impl<T> OperationResult<T> {
    pub fn rejected(status: u16, error: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            errors: vec![error.into()],
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Fields accepted when creating a manual issue.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub component_key: String,
    pub rule_key: String,
    pub severity: Severity,
    pub message: String,
    pub line: Option<u32>,
    pub reporter: Option<String>,
}

pub trait IssueStore: Send + Sync {
    fn get_by_key(&self, key: &str) -> Option<Issue>;
    /// Comments for the issue, in chronological (append) order.
    fn find_comments(&self, issue_key: &str) -> Vec<Comment>;
    fn find_comment(&self, key: &str) -> Option<Comment>;
    fn changelog(&self, issue_key: &str) -> Vec<ChangelogEntry>;

    fn add_comment(
        &self,
        issue_key: &str,
        text: &str,
        author: Option<&str>,
    ) -> OperationResult<Comment>;
    fn edit_comment(&self, key: &str, text: &str) -> OperationResult<Comment>;
    fn delete_comment(&self, key: &str) -> OperationResult<Comment>;
    fn assign(&self, issue_key: &str, assignee: Option<&str>) -> OperationResult<Issue>;
    fn transition(&self, issue_key: &str, transition: &str) -> OperationResult<Issue>;
    fn set_severity(&self, issue_key: &str, severity: Severity) -> OperationResult<Issue>;
    /// Attach the issue to an action plan, or detach it when `plan_key`
    /// is `None`.
    fn plan(&self, issue_key: &str, plan_key: Option<&str>) -> OperationResult<Issue>;
    fn create(&self, new_issue: NewIssue) -> OperationResult<Issue>;
}

pub trait ComponentResolver: Send + Sync {
    fn find_by_key(&self, key: &str) -> Option<Component>;
    fn last_snapshot(&self, component_key: &str) -> Option<Snapshot>;
    fn snapshot_by_id(&self, id: i64) -> Option<Snapshot>;
}

pub trait RuleRepository: Send + Sync {
    fn find_by_key(&self, key: &str) -> Option<Rule>;
}

pub trait DebtModel: Send + Sync {
    fn characteristic_by_key(&self, key: &str) -> Option<Characteristic>;
}

pub trait ActionPlanStore: Send + Sync {
    fn find_by_key(&self, key: &str) -> Option<ActionPlan>;
}

pub trait UserDirectory: Send + Sync {
    fn find_by_login(&self, login: &str) -> Option<User>;
}

/// Bundle of backing services, injected into the assembler and carried in
/// the HTTP state. Built field-by-field in tests, or from
/// [`MemoryBackend::services`] for the bundled in-memory stores.
#[derive(Clone)]
pub struct Services {
    pub issues: Arc<dyn IssueStore>,
    pub components: Arc<dyn ComponentResolver>,
    pub rules: Arc<dyn RuleRepository>,
    pub debt: Arc<dyn DebtModel>,
    pub action_plans: Arc<dyn ActionPlanStore>,
    pub users: Arc<dyn UserDirectory>,
}
