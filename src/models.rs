use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
    Blocker,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
            Self::Blocker => "blocker",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            "critical" => Ok(Self::Critical),
            "blocker" => Ok(Self::Blocker),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    Confirmed,
    Reopened,
    Resolved,
    Closed,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Confirmed => "confirmed",
            Self::Reopened => "reopened",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "confirmed" => Ok(Self::Confirmed),
            "reopened" => Ok(Self::Reopened),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            _ => Err(format!("Invalid issue status: {}", s)),
        }
    }
}

/// A reported code-quality finding, tracked by key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    pub project_key: String,
    pub component_key: String,
    pub rule_key: String,
    pub severity: Severity,
    pub status: IssueStatus,
    pub message: String,
    pub line: Option<u32>,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub action_plan_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub key: String,
    pub issue_key: String,
    pub author_login: Option<String>,
    pub markdown_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    pub name: String,
    pub email: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub key: String,
    pub name: String,
    pub description: String,
    pub debt_characteristic_key: Option<String>,
    pub debt_sub_characteristic_key: Option<String>,
}

/// A classification dimension for technical-debt rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Characteristic {
    pub key: String,
    pub name: String,
}

/// A named remediation grouping an issue may belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlan {
    pub key: String,
    pub name: String,
    pub project_key: String,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub key: String,
    pub name: String,
    pub qualifier: String,
    pub project_key: Option<String>,
}

/// A point-in-time analysis result for a project or component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,
    pub component_key: String,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub issue_key: String,
    pub author_login: Option<String>,
    pub changed_at: DateTime<Utc>,
    pub diffs: Vec<FieldDiff>,
}

// API view types

/// Composite read model for the issue panel, built fresh per request by the
/// assembler and discarded after rendering. Secondary fields stay `None`
/// when their backing lookup found nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueView {
    pub issue: Issue,
    pub project: Option<Component>,
    pub component: Option<Component>,
    pub rule: Option<Rule>,
    pub action_plan: Option<ActionPlan>,
    pub comments: Vec<Comment>,
    /// One entry per distinct login referenced by the assignee, reporter,
    /// or any comment author.
    pub users: HashMap<String, User>,
    pub snapshot: Option<Snapshot>,
}
