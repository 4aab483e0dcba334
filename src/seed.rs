//! Demo fixture for running the panel standalone.

use chrono::{Duration, Utc};

use crate::models::{
    ActionPlan, Characteristic, Comment, Component, Issue, IssueStatus, Rule, Severity, Snapshot,
    User,
};
use crate::store::MemoryBackend;

/// Load a small project with a handful of issues into the in-memory
/// stores. Returns the issue keys, oldest first.
pub fn load_demo(backend: &MemoryBackend) -> Vec<String> {
    let now = Utc::now();

    backend.components.insert(Component {
        key: "demo".to_string(),
        name: "Demo Project".to_string(),
        qualifier: "TRK".to_string(),
        project_key: None,
    });
    backend.components.insert(Component {
        key: "demo:src/server.rs".to_string(),
        name: "server.rs".to_string(),
        qualifier: "FIL".to_string(),
        project_key: Some("demo".to_string()),
    });
    backend.components.insert_snapshot(Snapshot {
        id: 1,
        component_key: "demo:src/server.rs".to_string(),
        analyzed_at: now - Duration::hours(2),
    });

    backend.rules.insert(Rule {
        key: "squid:S1172".to_string(),
        name: "Unused parameters should be removed".to_string(),
        description: "Unused parameters are misleading.".to_string(),
        debt_characteristic_key: Some("MAINTAINABILITY".to_string()),
        debt_sub_characteristic_key: Some("UNDERSTANDABILITY".to_string()),
    });
    backend.rules.insert_characteristic(Characteristic {
        key: "MAINTAINABILITY".to_string(),
        name: "Maintainability".to_string(),
    });
    backend.rules.insert_characteristic(Characteristic {
        key: "UNDERSTANDABILITY".to_string(),
        name: "Understandability".to_string(),
    });

    backend.action_plans.insert(ActionPlan {
        key: "demo-plan".to_string(),
        name: "Cleanup sprint".to_string(),
        project_key: "demo".to_string(),
        deadline: Some(now + Duration::days(14)),
    });

    for (login, name) in [("alice", "Alice"), ("bob", "Bob"), ("carol", "Carol")] {
        backend.users.insert(User {
            login: login.to_string(),
            name: name.to_string(),
            email: Some(format!("{}@example.com", login)),
            active: true,
        });
    }

    let issues = vec![
        Issue {
            key: "DEMO-1".to_string(),
            project_key: "demo".to_string(),
            component_key: "demo:src/server.rs".to_string(),
            rule_key: "squid:S1172".to_string(),
            severity: Severity::Major,
            status: IssueStatus::Open,
            message: "Remove the unused parameter 'ctx'".to_string(),
            line: Some(48),
            assignee: Some("alice".to_string()),
            reporter: Some("bob".to_string()),
            action_plan_key: Some("demo-plan".to_string()),
            created_at: now - Duration::days(3),
            updated_at: now - Duration::days(3),
        },
        Issue {
            key: "DEMO-2".to_string(),
            project_key: "demo".to_string(),
            component_key: "demo:src/server.rs".to_string(),
            rule_key: "squid:S1172".to_string(),
            severity: Severity::Minor,
            status: IssueStatus::Confirmed,
            message: "Remove the unused parameter 'opts'".to_string(),
            line: Some(112),
            assignee: None,
            reporter: None,
            action_plan_key: None,
            created_at: now - Duration::days(1),
            updated_at: now - Duration::hours(4),
        },
    ];

    let keys: Vec<String> = issues.iter().map(|i| i.key.clone()).collect();
    for issue in issues {
        backend.issues.insert(issue);
    }

    backend.issues.insert_comment(Comment {
        key: "demo-comment-1".to_string(),
        issue_key: "DEMO-1".to_string(),
        author_login: Some("carol".to_string()),
        markdown_text: "Seen in the last analysis as well.".to_string(),
        created_at: now - Duration::days(2),
    });

    keys
}
