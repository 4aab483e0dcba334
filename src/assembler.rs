//! Issue view-model assembly.
//!
//! `ViewAssembler` composes the read model for the issue panel from the
//! backing services: issue store, component resolver, rule repository,
//! action-plan store, and user directory. The primary issue lookup is the
//! only fatal step; every secondary lookup is best-effort and degrades to
//! an absent field. Lookups run sequentially, and the login→user map is
//! memoized so each distinct login costs at most one directory call.

use std::collections::{HashMap, HashSet};

use crate::errors::PanelError;
use crate::models::{IssueView, User};
use crate::store::{
    ActionPlanStore, ComponentResolver, IssueStore, RuleRepository, Services, UserDirectory,
};

pub struct ViewAssembler<'a> {
    services: &'a Services,
}

impl<'a> ViewAssembler<'a> {
    pub fn new(services: &'a Services) -> Self {
        Self { services }
    }

    /// Build the view-model for `issue_key`.
    ///
    /// # Errors
    ///
    /// Returns `PanelError::IssueNotFound` when the issue itself does not
    /// exist. No secondary lookup happens in that case.
    pub fn assemble(&self, issue_key: &str) -> Result<IssueView, PanelError> {
        let issue =
            self.services
                .issues
                .get_by_key(issue_key)
                .ok_or_else(|| PanelError::IssueNotFound {
                    key: issue_key.to_string(),
                })?;

        // Project and component resolve independently; either may be absent.
        let project = self.services.components.find_by_key(&issue.project_key);
        let component = self.services.components.find_by_key(&issue.component_key);
        let rule = self.services.rules.find_by_key(&issue.rule_key);

        // No action-plan key means the field stays unset, not an error.
        let action_plan = issue
            .action_plan_key
            .as_deref()
            .and_then(|key| self.services.action_plans.find_by_key(key));

        let comments = self.services.issues.find_comments(issue_key);

        let mut users = HashMap::new();
        let mut resolved = HashSet::new();
        self.add_user(issue.assignee.as_deref(), &mut users, &mut resolved);
        self.add_user(issue.reporter.as_deref(), &mut users, &mut resolved);
        for comment in &comments {
            self.add_user(comment.author_login.as_deref(), &mut users, &mut resolved);
        }

        let snapshot = self.services.components.last_snapshot(&issue.component_key);

        Ok(IssueView {
            issue,
            project,
            component,
            rule,
            action_plan,
            comments,
            users,
            snapshot,
        })
    }

    /// Resolve a login into `users` unless it was already attempted in this
    /// assembly. Misses are remembered too, so an unresolvable login still
    /// costs only one directory call.
    fn add_user(
        &self,
        login: Option<&str>,
        users: &mut HashMap<String, User>,
        resolved: &mut HashSet<String>,
    ) {
        let Some(login) = login else {
            return;
        };
        if !resolved.insert(login.to_string()) {
            return;
        }
        if let Some(user) = self.services.users.find_by_login(login) {
            users.insert(login.to_string(), user);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Utc;

    use super::*;
    use crate::models::{
        ActionPlan, ChangelogEntry, Comment, Component, Issue, IssueStatus, Rule, Severity,
        Snapshot,
    };
    use crate::store::{
        ActionPlanStore, ComponentResolver, DebtModel, IssueStore, NewIssue, OperationResult,
        RuleRepository, UserDirectory,
    };

    /// Shared log of backing-service calls, so tests can assert exactly
    /// which lookups an assembly performed.
    #[derive(Clone, Default)]
    struct CallLog(Arc<Mutex<Vec<String>>>);

    impl CallLog {
        fn record(&self, call: impl Into<String>) {
            self.0.lock().unwrap().push(call.into());
        }

        fn count(&self, prefix: &str) -> usize {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.starts_with(prefix))
                .count()
        }

        fn total(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    struct LoggingIssues {
        log: CallLog,
        issues: Vec<Issue>,
        comments: Vec<Comment>,
    }

    impl IssueStore for LoggingIssues {
        fn get_by_key(&self, key: &str) -> Option<Issue> {
            self.issues.iter().find(|i| i.key == key).cloned()
        }

        fn find_comments(&self, issue_key: &str) -> Vec<Comment> {
            self.log.record(format!("comments:{}", issue_key));
            self.comments
                .iter()
                .filter(|c| c.issue_key == issue_key)
                .cloned()
                .collect()
        }

        fn find_comment(&self, _key: &str) -> Option<Comment> {
            None
        }

        fn changelog(&self, _issue_key: &str) -> Vec<ChangelogEntry> {
            Vec::new()
        }

        fn add_comment(
            &self,
            _issue_key: &str,
            _text: &str,
            _author: Option<&str>,
        ) -> OperationResult<Comment> {
            OperationResult::rejected(500, "not supported by this double")
        }

        fn edit_comment(&self, _key: &str, _text: &str) -> OperationResult<Comment> {
            OperationResult::rejected(500, "not supported by this double")
        }

        fn delete_comment(&self, _key: &str) -> OperationResult<Comment> {
            OperationResult::rejected(500, "not supported by this double")
        }

        fn assign(&self, _issue_key: &str, _assignee: Option<&str>) -> OperationResult<Issue> {
            OperationResult::rejected(500, "not supported by this double")
        }

        fn transition(&self, _issue_key: &str, _transition: &str) -> OperationResult<Issue> {
            OperationResult::rejected(500, "not supported by this double")
        }

        fn set_severity(&self, _issue_key: &str, _severity: Severity) -> OperationResult<Issue> {
            OperationResult::rejected(500, "not supported by this double")
        }

        fn plan(&self, _issue_key: &str, _plan_key: Option<&str>) -> OperationResult<Issue> {
            OperationResult::rejected(500, "not supported by this double")
        }

        fn create(&self, _new_issue: NewIssue) -> OperationResult<Issue> {
            OperationResult::rejected(500, "not supported by this double")
        }
    }

    struct LoggingComponents {
        log: CallLog,
        components: Vec<Component>,
        snapshots: Vec<Snapshot>,
    }

    impl ComponentResolver for LoggingComponents {
        fn find_by_key(&self, key: &str) -> Option<Component> {
            self.log.record(format!("component:{}", key));
            self.components.iter().find(|c| c.key == key).cloned()
        }

        fn last_snapshot(&self, component_key: &str) -> Option<Snapshot> {
            self.log.record(format!("snapshot:{}", component_key));
            self.snapshots
                .iter()
                .find(|s| s.component_key == component_key)
                .cloned()
        }

        fn snapshot_by_id(&self, _id: i64) -> Option<Snapshot> {
            None
        }
    }

    struct LoggingRules {
        log: CallLog,
        rules: Vec<Rule>,
    }

    impl RuleRepository for LoggingRules {
        fn find_by_key(&self, key: &str) -> Option<Rule> {
            self.log.record(format!("rule:{}", key));
            self.rules.iter().find(|r| r.key == key).cloned()
        }
    }

    impl DebtModel for LoggingRules {
        fn characteristic_by_key(&self, _key: &str) -> Option<crate::models::Characteristic> {
            None
        }
    }

    struct LoggingPlans {
        log: CallLog,
        plans: Vec<ActionPlan>,
    }

    impl ActionPlanStore for LoggingPlans {
        fn find_by_key(&self, key: &str) -> Option<ActionPlan> {
            self.log.record(format!("plan:{}", key));
            self.plans.iter().find(|p| p.key == key).cloned()
        }
    }

    struct LoggingDirectory {
        log: CallLog,
        logins: Vec<String>,
    }

    impl UserDirectory for LoggingDirectory {
        fn find_by_login(&self, login: &str) -> Option<User> {
            self.log.record(format!("user:{}", login));
            self.logins.iter().find(|l| *l == login).map(|l| User {
                login: l.clone(),
                name: l.to_uppercase(),
                email: None,
                active: true,
            })
        }
    }

    struct Fixture {
        log: CallLog,
        issues: Vec<Issue>,
        comments: Vec<Comment>,
        components: Vec<Component>,
        snapshots: Vec<Snapshot>,
        rules: Vec<Rule>,
        plans: Vec<ActionPlan>,
        logins: Vec<String>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                log: CallLog::default(),
                issues: Vec::new(),
                comments: Vec::new(),
                components: Vec::new(),
                snapshots: Vec::new(),
                rules: Vec::new(),
                plans: Vec::new(),
                logins: Vec::new(),
            }
        }

        fn services(self) -> (Services, CallLog) {
            let log = self.log.clone();
            let rules = Arc::new(LoggingRules {
                log: self.log.clone(),
                rules: self.rules,
            });
            let services = Services {
                issues: Arc::new(LoggingIssues {
                    log: self.log.clone(),
                    issues: self.issues,
                    comments: self.comments,
                }),
                components: Arc::new(LoggingComponents {
                    log: self.log.clone(),
                    components: self.components,
                    snapshots: self.snapshots,
                }),
                rules: rules.clone(),
                debt: rules,
                action_plans: Arc::new(LoggingPlans {
                    log: self.log.clone(),
                    plans: self.plans,
                }),
                users: Arc::new(LoggingDirectory {
                    log: self.log,
                    logins: self.logins,
                }),
            };
            (services, log)
        }
    }

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
            line: Some(3),
            assignee: None,
            reporter: None,
            action_plan_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn comment(issue_key: &str, author: Option<&str>, text: &str) -> Comment {
        Comment {
            key: format!("c-{}", text),
            issue_key: issue_key.to_string(),
            author_login: author.map(str::to_string),
            markdown_text: text.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_comment_authors_resolve_once_each() {
        let mut fixture = Fixture::new();
        fixture.issues.push(issue("ABCD-1"));
        fixture.comments.push(comment("ABCD-1", Some("alice"), "a"));
        fixture.comments.push(comment("ABCD-1", Some("bob"), "b"));
        fixture.comments.push(comment("ABCD-1", Some("alice"), "c"));
        fixture.logins = vec!["alice".to_string(), "bob".to_string()];
        let (services, log) = fixture.services();

        let view = ViewAssembler::new(&services).assemble("ABCD-1").unwrap();

        let mut logins: Vec<_> = view.users.keys().cloned().collect();
        logins.sort();
        assert_eq!(logins, vec!["alice", "bob"]);
        assert_eq!(log.count("user:"), 2);
    }

    #[test]
    fn unresolvable_login_costs_one_directory_call() {
        let mut fixture = Fixture::new();
        fixture.issues.push(issue("ABCD-1"));
        fixture.comments.push(comment("ABCD-1", Some("ghost"), "a"));
        fixture.comments.push(comment("ABCD-1", Some("ghost"), "b"));
        let (services, log) = fixture.services();

        let view = ViewAssembler::new(&services).assemble("ABCD-1").unwrap();

        assert!(view.users.is_empty());
        assert_eq!(log.count("user:ghost"), 1);
    }

    #[test]
    fn missing_plan_key_skips_plan_store() {
        let mut fixture = Fixture::new();
        fixture.issues.push(issue("ABCD-1"));
        fixture.plans.push(ActionPlan {
            key: "plan-1".to_string(),
            name: "Hardening".to_string(),
            project_key: "proj".to_string(),
            deadline: None,
        });
        let (services, log) = fixture.services();

        let view = ViewAssembler::new(&services).assemble("ABCD-1").unwrap();

        assert!(view.action_plan.is_none());
        assert_eq!(log.count("plan:"), 0);
    }

    #[test]
    fn plan_key_resolves_through_plan_store() {
        let mut fixture = Fixture::new();
        let mut planned = issue("ABCD-1");
        planned.action_plan_key = Some("plan-1".to_string());
        fixture.issues.push(planned);
        fixture.plans.push(ActionPlan {
            key: "plan-1".to_string(),
            name: "Hardening".to_string(),
            project_key: "proj".to_string(),
            deadline: None,
        });
        let (services, log) = fixture.services();

        let view = ViewAssembler::new(&services).assemble("ABCD-1").unwrap();

        assert_eq!(view.action_plan.unwrap().name, "Hardening");
        assert_eq!(log.count("plan:"), 1);
    }

    #[test]
    fn unresolvable_project_still_yields_a_view() {
        let mut fixture = Fixture::new();
        fixture.issues.push(issue("ABCD-1"));
        // Only the leaf component exists, not the project.
        fixture.components.push(Component {
            key: "proj:src/main.rs".to_string(),
            name: "main.rs".to_string(),
            qualifier: "FIL".to_string(),
            project_key: Some("proj".to_string()),
        });
        let (services, _log) = fixture.services();

        let view = ViewAssembler::new(&services).assemble("ABCD-1").unwrap();

        assert!(view.project.is_none());
        assert!(view.component.is_some());
    }

    #[test]
    fn unknown_issue_fails_without_secondary_lookups() {
        let (services, log) = Fixture::new().services();

        let err = ViewAssembler::new(&services).assemble("MISSING").unwrap_err();

        assert!(matches!(err, PanelError::IssueNotFound { .. }));
        assert_eq!(log.total(), 0);
    }

    #[test]
    fn snapshot_attaches_from_component_key() {
        let mut fixture = Fixture::new();
        fixture.issues.push(issue("ABCD-1"));
        fixture.snapshots.push(Snapshot {
            id: 7,
            component_key: "proj:src/main.rs".to_string(),
            analyzed_at: Utc::now(),
        });
        let (services, log) = fixture.services();

        let view = ViewAssembler::new(&services).assemble("ABCD-1").unwrap();

        assert_eq!(view.snapshot.unwrap().id, 7);
        assert_eq!(log.count("snapshot:proj:src/main.rs"), 1);
    }

    #[test]
    fn assignee_reporter_and_authors_all_collected() {
        let mut fixture = Fixture::new();
        let mut assigned = issue("ABCD-123");
        assigned.assignee = Some("alice".to_string());
        assigned.reporter = Some("bob".to_string());
        fixture.issues.push(assigned);
        fixture
            .comments
            .push(comment("ABCD-123", Some("alice"), "looking"));
        fixture
            .comments
            .push(comment("ABCD-123", Some("carol"), "done"));
        fixture.logins = vec![
            "alice".to_string(),
            "bob".to_string(),
            "carol".to_string(),
        ];
        let (services, log) = fixture.services();

        let view = ViewAssembler::new(&services).assemble("ABCD-123").unwrap();

        let mut logins: Vec<_> = view.users.keys().cloned().collect();
        logins.sort();
        assert_eq!(logins, vec!["alice", "bob", "carol"]);
        assert_eq!(log.count("user:"), 3);
    }

    #[test]
    fn anonymous_comment_author_is_skipped() {
        let mut fixture = Fixture::new();
        fixture.issues.push(issue("ABCD-1"));
        fixture.comments.push(comment("ABCD-1", None, "drive-by"));
        let (services, log) = fixture.services();

        let view = ViewAssembler::new(&services).assemble("ABCD-1").unwrap();

        assert!(view.users.is_empty());
        assert_eq!(log.count("user:"), 0);
        assert_eq!(view.comments.len(), 1);
    }
}
