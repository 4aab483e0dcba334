//! In-memory implementations of the backing-service traits.
//!
//! These are the bundled stores: good enough to run the panel standalone
//! and to exercise every route in tests. State lives behind `RwLock`;
//! mutations append changelog entries with field diffs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use uuid::Uuid;

use super::{
    ActionPlanStore, ComponentResolver, DebtModel, IssueStore, NewIssue, OperationResult,
    RuleRepository, Services, UserDirectory,
};
use crate::models::{
    ActionPlan, ChangelogEntry, Characteristic, Comment, Component, FieldDiff, Issue, IssueStatus,
    Rule, Severity, Snapshot, User,
};

#[derive(Default)]
struct IssueState {
    issues: HashMap<String, Issue>,
    // Append-order vec, not a map: find_comments must preserve chronology.
    comments: Vec<Comment>,
    changelog: Vec<ChangelogEntry>,
}

#[derive(Default)]
pub struct MemoryIssueStore {
    state: RwLock<IssueState>,
}

impl MemoryIssueStore {
    pub fn insert(&self, issue: Issue) {
        let mut state = self.state.write().expect("issue store lock poisoned");
        state.issues.insert(issue.key.clone(), issue);
    }

    pub fn insert_comment(&self, comment: Comment) {
        let mut state = self.state.write().expect("issue store lock poisoned");
        state.comments.push(comment);
    }

    fn record_change(
        state: &mut IssueState,
        issue_key: &str,
        author: Option<String>,
        diffs: Vec<FieldDiff>,
    ) {
        state.changelog.push(ChangelogEntry {
            issue_key: issue_key.to_string(),
            author_login: author,
            changed_at: Utc::now(),
            diffs,
        });
    }
}

impl IssueStore for MemoryIssueStore {
    fn get_by_key(&self, key: &str) -> Option<Issue> {
        let state = self.state.read().expect("issue store lock poisoned");
        state.issues.get(key).cloned()
    }

    fn find_comments(&self, issue_key: &str) -> Vec<Comment> {
        let state = self.state.read().expect("issue store lock poisoned");
        state
            .comments
            .iter()
            .filter(|c| c.issue_key == issue_key)
            .cloned()
            .collect()
    }

    fn find_comment(&self, key: &str) -> Option<Comment> {
        let state = self.state.read().expect("issue store lock poisoned");
        state.comments.iter().find(|c| c.key == key).cloned()
    }

    fn changelog(&self, issue_key: &str) -> Vec<ChangelogEntry> {
        let state = self.state.read().expect("issue store lock poisoned");
        state
            .changelog
            .iter()
            .filter(|e| e.issue_key == issue_key)
            .cloned()
            .collect()
    }

    fn add_comment(
        &self,
        issue_key: &str,
        text: &str,
        author: Option<&str>,
    ) -> OperationResult<Comment> {
        if text.trim().is_empty() {
            return OperationResult::rejected(400, "Comment text cannot be empty");
        }
        let mut state = self.state.write().expect("issue store lock poisoned");
        if !state.issues.contains_key(issue_key) {
            return OperationResult::rejected(404, format!("Issue {} not found", issue_key));
        }
        let comment = Comment {
            key: Uuid::new_v4().to_string(),
            issue_key: issue_key.to_string(),
            author_login: author.map(str::to_string),
            markdown_text: text.to_string(),
            created_at: Utc::now(),
        };
        state.comments.push(comment.clone());
        OperationResult::Ok(comment)
    }

    fn edit_comment(&self, key: &str, text: &str) -> OperationResult<Comment> {
        if text.trim().is_empty() {
            return OperationResult::rejected(400, "Comment text cannot be empty");
        }
        let mut state = self.state.write().expect("issue store lock poisoned");
        match state.comments.iter_mut().find(|c| c.key == key) {
            Some(comment) => {
                comment.markdown_text = text.to_string();
                OperationResult::Ok(comment.clone())
            }
            None => OperationResult::rejected(404, format!("Comment {} not found", key)),
        }
    }

    fn delete_comment(&self, key: &str) -> OperationResult<Comment> {
        let mut state = self.state.write().expect("issue store lock poisoned");
        match state.comments.iter().position(|c| c.key == key) {
            Some(idx) => OperationResult::Ok(state.comments.remove(idx)),
            None => OperationResult::rejected(404, format!("Comment {} not found", key)),
        }
    }

    fn assign(&self, issue_key: &str, assignee: Option<&str>) -> OperationResult<Issue> {
        let mut state = self.state.write().expect("issue store lock poisoned");
        let Some(mut issue) = state.issues.get(issue_key).cloned() else {
            return OperationResult::rejected(404, format!("Issue {} not found", issue_key));
        };
        let old = issue.assignee.clone();
        issue.assignee = assignee.map(str::to_string);
        issue.updated_at = Utc::now();
        state.issues.insert(issue.key.clone(), issue.clone());
        Self::record_change(
            &mut state,
            issue_key,
            None,
            vec![FieldDiff {
                field: "assignee".to_string(),
                old_value: old,
                new_value: issue.assignee.clone(),
            }],
        );
        OperationResult::Ok(issue)
    }

    fn transition(&self, issue_key: &str, transition: &str) -> OperationResult<Issue> {
        let new_status = match transition {
            "confirm" => IssueStatus::Confirmed,
            "resolve" => IssueStatus::Resolved,
            "reopen" => IssueStatus::Reopened,
            "close" => IssueStatus::Closed,
            other => {
                return OperationResult::rejected(400, format!("Unknown transition '{}'", other));
            }
        };
        let mut state = self.state.write().expect("issue store lock poisoned");
        let Some(mut issue) = state.issues.get(issue_key).cloned() else {
            return OperationResult::rejected(404, format!("Issue {} not found", issue_key));
        };
        let old = issue.status;
        issue.status = new_status;
        issue.updated_at = Utc::now();
        state.issues.insert(issue.key.clone(), issue.clone());
        Self::record_change(
            &mut state,
            issue_key,
            None,
            vec![FieldDiff {
                field: "status".to_string(),
                old_value: Some(old.as_str().to_string()),
                new_value: Some(new_status.as_str().to_string()),
            }],
        );
        OperationResult::Ok(issue)
    }

    fn set_severity(&self, issue_key: &str, severity: Severity) -> OperationResult<Issue> {
        let mut state = self.state.write().expect("issue store lock poisoned");
        let Some(mut issue) = state.issues.get(issue_key).cloned() else {
            return OperationResult::rejected(404, format!("Issue {} not found", issue_key));
        };
        let old = issue.severity;
        issue.severity = severity;
        issue.updated_at = Utc::now();
        state.issues.insert(issue.key.clone(), issue.clone());
        Self::record_change(
            &mut state,
            issue_key,
            None,
            vec![FieldDiff {
                field: "severity".to_string(),
                old_value: Some(old.as_str().to_string()),
                new_value: Some(severity.as_str().to_string()),
            }],
        );
        OperationResult::Ok(issue)
    }

    fn plan(&self, issue_key: &str, plan_key: Option<&str>) -> OperationResult<Issue> {
        let mut state = self.state.write().expect("issue store lock poisoned");
        let Some(mut issue) = state.issues.get(issue_key).cloned() else {
            return OperationResult::rejected(404, format!("Issue {} not found", issue_key));
        };
        let old = issue.action_plan_key.clone();
        issue.action_plan_key = plan_key.map(str::to_string);
        issue.updated_at = Utc::now();
        state.issues.insert(issue.key.clone(), issue.clone());
        Self::record_change(
            &mut state,
            issue_key,
            None,
            vec![FieldDiff {
                field: "action_plan".to_string(),
                old_value: old,
                new_value: issue.action_plan_key.clone(),
            }],
        );
        OperationResult::Ok(issue)
    }

    fn create(&self, new_issue: NewIssue) -> OperationResult<Issue> {
        if new_issue.message.trim().is_empty() {
            return OperationResult::rejected(400, "Issue message cannot be empty");
        }
        let now = Utc::now();
        let issue = Issue {
            key: Uuid::new_v4().to_string(),
            project_key: new_issue.component_key.clone(),
            component_key: new_issue.component_key,
            rule_key: new_issue.rule_key,
            severity: new_issue.severity,
            status: IssueStatus::Open,
            message: new_issue.message,
            line: new_issue.line,
            assignee: None,
            reporter: new_issue.reporter,
            action_plan_key: None,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.write().expect("issue store lock poisoned");
        state.issues.insert(issue.key.clone(), issue.clone());
        OperationResult::Ok(issue)
    }
}

#[derive(Default)]
pub struct MemoryComponents {
    components: RwLock<HashMap<String, Component>>,
    snapshots: RwLock<Vec<Snapshot>>,
}

impl MemoryComponents {
    pub fn insert(&self, component: Component) {
        let mut components = self.components.write().expect("component lock poisoned");
        components.insert(component.key.clone(), component);
    }

    pub fn insert_snapshot(&self, snapshot: Snapshot) {
        let mut snapshots = self.snapshots.write().expect("snapshot lock poisoned");
        snapshots.push(snapshot);
    }
}

impl ComponentResolver for MemoryComponents {
    fn find_by_key(&self, key: &str) -> Option<Component> {
        let components = self.components.read().expect("component lock poisoned");
        components.get(key).cloned()
    }

    fn last_snapshot(&self, component_key: &str) -> Option<Snapshot> {
        let snapshots = self.snapshots.read().expect("snapshot lock poisoned");
        snapshots
            .iter()
            .filter(|s| s.component_key == component_key)
            .max_by_key(|s| s.analyzed_at)
            .cloned()
    }

    fn snapshot_by_id(&self, id: i64) -> Option<Snapshot> {
        let snapshots = self.snapshots.read().expect("snapshot lock poisoned");
        snapshots.iter().find(|s| s.id == id).cloned()
    }
}

#[derive(Default)]
pub struct MemoryRules {
    rules: RwLock<HashMap<String, Rule>>,
    characteristics: RwLock<HashMap<String, Characteristic>>,
}

impl MemoryRules {
    pub fn insert(&self, rule: Rule) {
        let mut rules = self.rules.write().expect("rule lock poisoned");
        rules.insert(rule.key.clone(), rule);
    }

    pub fn insert_characteristic(&self, characteristic: Characteristic) {
        let mut chars = self
            .characteristics
            .write()
            .expect("characteristic lock poisoned");
        chars.insert(characteristic.key.clone(), characteristic);
    }
}

impl RuleRepository for MemoryRules {
    fn find_by_key(&self, key: &str) -> Option<Rule> {
        let rules = self.rules.read().expect("rule lock poisoned");
        rules.get(key).cloned()
    }
}

impl DebtModel for MemoryRules {
    fn characteristic_by_key(&self, key: &str) -> Option<Characteristic> {
        let chars = self
            .characteristics
            .read()
            .expect("characteristic lock poisoned");
        chars.get(key).cloned()
    }
}

#[derive(Default)]
pub struct MemoryActionPlans {
    plans: RwLock<HashMap<String, ActionPlan>>,
}

impl MemoryActionPlans {
    pub fn insert(&self, plan: ActionPlan) {
        let mut plans = self.plans.write().expect("plan lock poisoned");
        plans.insert(plan.key.clone(), plan);
    }
}

impl ActionPlanStore for MemoryActionPlans {
    fn find_by_key(&self, key: &str) -> Option<ActionPlan> {
        let plans = self.plans.read().expect("plan lock poisoned");
        plans.get(key).cloned()
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUsers {
    pub fn insert(&self, user: User) {
        let mut users = self.users.write().expect("user lock poisoned");
        users.insert(user.login.clone(), user);
    }
}

impl UserDirectory for MemoryUsers {
    fn find_by_login(&self, login: &str) -> Option<User> {
        let users = self.users.read().expect("user lock poisoned");
        users.get(login).cloned()
    }
}

/// Concrete handles to the bundled in-memory stores. Fixtures are inserted
/// through these; the router only ever sees the trait objects from
/// [`MemoryBackend::services`].
#[derive(Clone, Default)]
pub struct MemoryBackend {
    pub issues: Arc<MemoryIssueStore>,
    pub components: Arc<MemoryComponents>,
    pub rules: Arc<MemoryRules>,
    pub action_plans: Arc<MemoryActionPlans>,
    pub users: Arc<MemoryUsers>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn services(&self) -> Services {
        Services {
            issues: self.issues.clone(),
            components: self.components.clone(),
            rules: self.rules.clone(),
            debt: self.rules.clone(),
            action_plans: self.action_plans.clone(),
            users: self.users.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(key: &str) -> Issue {
        let now = Utc::now();
        Issue {
            key: key.to_string(),
            project_key: "proj".to_string(),
            component_key: "proj:src/main.rs".to_string(),
            rule_key: "squid:S100".to_string(),
            severity: Severity::Major,
            status: IssueStatus::Open,
            message: "Rename this method".to_string(),
            line: Some(12),
            assignee: None,
            reporter: None,
            action_plan_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_get_by_key_roundtrip() {
        let store = MemoryIssueStore::default();
        store.insert(issue("ABCD-1"));
        assert!(store.get_by_key("ABCD-1").is_some());
        assert!(store.get_by_key("ABCD-2").is_none());
    }

    #[test]
    fn test_comments_preserve_append_order() {
        let store = MemoryIssueStore::default();
        store.insert(issue("ABCD-1"));
        store.add_comment("ABCD-1", "first", Some("alice"));
        store.add_comment("ABCD-1", "second", Some("bob"));
        store.add_comment("ABCD-1", "third", None);

        let comments = store.find_comments("ABCD-1");
        let texts: Vec<_> = comments.iter().map(|c| c.markdown_text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_add_comment_rejects_empty_text() {
        let store = MemoryIssueStore::default();
        store.insert(issue("ABCD-1"));
        match store.add_comment("ABCD-1", "   ", Some("alice")) {
            OperationResult::Rejected { status, errors } => {
                assert_eq!(status, 400);
                assert!(errors[0].contains("empty"));
            }
            OperationResult::Ok(_) => panic!("Expected rejection"),
        }
    }

    #[test]
    fn test_add_comment_unknown_issue_is_404() {
        let store = MemoryIssueStore::default();
        match store.add_comment("MISSING", "text", None) {
            OperationResult::Rejected { status, .. } => assert_eq!(status, 404),
            OperationResult::Ok(_) => panic!("Expected rejection"),
        }
    }

    #[test]
    fn test_edit_and_delete_comment() {
        let store = MemoryIssueStore::default();
        store.insert(issue("ABCD-1"));
        let OperationResult::Ok(comment) = store.add_comment("ABCD-1", "typo", Some("alice"))
        else {
            panic!("add_comment failed");
        };

        let OperationResult::Ok(edited) = store.edit_comment(&comment.key, "fixed") else {
            panic!("edit_comment failed");
        };
        assert_eq!(edited.markdown_text, "fixed");

        let OperationResult::Ok(deleted) = store.delete_comment(&comment.key) else {
            panic!("delete_comment failed");
        };
        assert_eq!(deleted.key, comment.key);
        assert!(store.find_comment(&comment.key).is_none());
    }

    #[test]
    fn test_transition_updates_status_and_changelog() {
        let store = MemoryIssueStore::default();
        store.insert(issue("ABCD-1"));

        let OperationResult::Ok(updated) = store.transition("ABCD-1", "confirm") else {
            panic!("transition failed");
        };
        assert_eq!(updated.status, IssueStatus::Confirmed);

        let log = store.changelog("ABCD-1");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].diffs[0].field, "status");
        assert_eq!(log[0].diffs[0].old_value.as_deref(), Some("open"));
        assert_eq!(log[0].diffs[0].new_value.as_deref(), Some("confirmed"));
    }

    #[test]
    fn test_unknown_transition_is_rejected() {
        let store = MemoryIssueStore::default();
        store.insert(issue("ABCD-1"));
        match store.transition("ABCD-1", "escalate") {
            OperationResult::Rejected { status, .. } => assert_eq!(status, 400),
            OperationResult::Ok(_) => panic!("Expected rejection"),
        }
    }

    #[test]
    fn test_plan_and_unplan() {
        let store = MemoryIssueStore::default();
        store.insert(issue("ABCD-1"));

        let OperationResult::Ok(planned) = store.plan("ABCD-1", Some("plan-1")) else {
            panic!("plan failed");
        };
        assert_eq!(planned.action_plan_key.as_deref(), Some("plan-1"));

        let OperationResult::Ok(unplanned) = store.plan("ABCD-1", None) else {
            panic!("unplan failed");
        };
        assert!(unplanned.action_plan_key.is_none());
    }

    #[test]
    fn test_last_snapshot_picks_most_recent() {
        let components = MemoryComponents::default();
        components.insert_snapshot(Snapshot {
            id: 1,
            component_key: "proj".to_string(),
            analyzed_at: Utc::now() - chrono::Duration::days(2),
        });
        components.insert_snapshot(Snapshot {
            id: 2,
            component_key: "proj".to_string(),
            analyzed_at: Utc::now(),
        });
        components.insert_snapshot(Snapshot {
            id: 3,
            component_key: "other".to_string(),
            analyzed_at: Utc::now(),
        });

        assert_eq!(components.last_snapshot("proj").unwrap().id, 2);
        assert!(components.last_snapshot("missing").is_none());
        assert_eq!(components.snapshot_by_id(3).unwrap().component_key, "other");
    }

    #[test]
    fn test_create_issue_generates_key() {
        let store = MemoryIssueStore::default();
        let OperationResult::Ok(created) = store.create(NewIssue {
            component_key: "proj:src/lib.rs".to_string(),
            rule_key: "manual:review".to_string(),
            severity: Severity::Minor,
            message: "Check this".to_string(),
            line: None,
            reporter: Some("bob".to_string()),
        }) else {
            panic!("create failed");
        };
        assert!(!created.key.is_empty());
        assert_eq!(created.status, IssueStatus::Open);
        assert!(store.get_by_key(&created.key).is_some());
    }
}
