//! HTTP surface of the issue panel.
//!
//! Routes mirror the product's issue panel: detail display with three
//! render modes, action forms and dispatch, comment editing, manual issue
//! creation, rule and changelog panels, and the dashboard widget. There is
//! no template engine here; each response is a JSON fragment naming the
//! partial a front-end would render plus the serialized payload. Failures
//! render an error fragment carrying the backing service's reported status
//! and error list.

use std::sync::{Arc, LazyLock};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::actions::{ActionParams, ActionRegistry, IssueAction, ResolvedAction};
use crate::assembler::ViewAssembler;
use crate::errors::PanelError;
use crate::store::{
    ComponentResolver, DebtModel, IssueStore, NewIssue, OperationResult, RuleRepository, Services,
};

// Compiled once; component keys allow word characters plus `.:-/`.
static COMPONENT_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.:\-/]+$").unwrap());

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub services: Services,
    pub actions: ActionRegistry,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ShowQuery {
    #[serde(default)]
    pub modal: bool,
    #[serde(default)]
    pub only_detail: bool,
}

#[derive(Deserialize)]
pub struct IssueQuery {
    pub issue: Option<String>,
}

#[derive(Deserialize)]
pub struct EditCommentRequest {
    pub key: String,
    pub text: String,
}

#[derive(Deserialize)]
pub struct CreateIssueRequest {
    pub component: String,
    pub rule: String,
    pub message: String,
    pub severity: Option<String>,
    pub line: Option<u32>,
}

#[derive(Deserialize)]
pub struct WidgetQuery {
    pub snapshot_id: Option<i64>,
    pub period: Option<u32>,
}

// ── Error handling ────────────────────────────────────────────────────

/// Every failure renders the `issue/error` fragment; the status code is
/// either ours (missing parameter, forbidden, unknown entity) or the one
/// the backing service reported for a rejected mutation.
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
    Internal(String),
    Service { status: u16, errors: Vec<String> },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, errors) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, vec![msg]),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, vec![msg]),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, vec![msg]),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, vec![msg]),
            ApiError::Service { status, errors } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                errors,
            ),
        };
        (
            status,
            Json(json!({"partial": "issue/error", "errors": errors})),
        )
            .into_response()
    }
}

impl From<PanelError> for ApiError {
    fn from(err: PanelError) -> Self {
        match err {
            not_found @ (PanelError::IssueNotFound { .. }
            | PanelError::CommentNotFound { .. }) => ApiError::NotFound(not_found.to_string()),
            missing @ PanelError::MissingParameter { .. } => {
                ApiError::BadRequest(missing.to_string())
            }
            PanelError::Validation { status, errors } => ApiError::Service { status, errors },
            PanelError::Forbidden(msg) => ApiError::Forbidden(msg),
            PanelError::Other(e) => ApiError::Internal(e.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn panel_router() -> Router<SharedState> {
    Router::new()
        .route("/issue/show/{key}", get(show))
        .route("/issue/action_form/{action}", get(action_form))
        .route("/issue/do_action/{action}", post(do_action))
        .route("/issue/edit_comment_form/{key}", get(edit_comment_form))
        .route("/issue/edit_comment", post(edit_comment))
        .route("/issue/delete_comment/{key}", post(delete_comment))
        .route("/issue/create_form", get(create_form))
        .route("/issue/create", post(create))
        .route("/issue/rule/{key}", get(rule))
        .route("/issue/changelog/{key}", get(changelog))
        .route("/issue/widget_issues_list", get(widget_issues_list))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

fn is_xhr(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
}

/// AJAX verification happens before any service call.
fn verify_ajax(headers: &HeaderMap) -> Result<(), PanelError> {
    if is_xhr(headers) {
        Ok(())
    } else {
        Err(PanelError::Forbidden("AJAX request required".to_string()))
    }
}

/// The authenticated login, provided by the session layer in front of this
/// service.
fn current_login(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-user-login")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn require<'a>(params: &'a ActionParams, name: &str) -> Result<&'a str, PanelError> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PanelError::MissingParameter {
            name: name.to_string(),
        })
}

/// Collapse a mutation outcome: rejections become the error fragment with
/// the service-reported status.
fn check<T>(result: OperationResult<T>) -> Result<T, PanelError> {
    match result {
        OperationResult::Ok(value) => Ok(value),
        OperationResult::Rejected { status, errors } => {
            Err(PanelError::Validation { status, errors })
        }
    }
}

/// Assemble the refreshed view and render the single-issue fragment, the
/// shared success path of every mutation.
fn render_issue_fragment(
    state: &AppState,
    issue_key: &str,
) -> Result<Json<serde_json::Value>, ApiError> {
    let view = ViewAssembler::new(&state.services).assemble(issue_key)?;
    Ok(Json(json!({"partial": "issue/issue", "view": view})))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

/// Issue detail, three render modes: modal, AJAX fragment (full or
/// detail-only), or full page.
async fn show(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Query(query): Query<ShowQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let view = ViewAssembler::new(&state.services).assemble(&key)?;

    let partial = if query.modal {
        "issue/show_modal"
    } else if is_xhr(&headers) {
        if query.only_detail {
            // Used when canceling the edition of a comment.
            "issue/issue"
        } else {
            "issue/show"
        }
    } else {
        "issue/show_page"
    };

    Ok(Json(json!({"partial": partial, "view": view})))
}

/// Form used for assign, comment, transition, severity, and plan.
async fn action_form(
    State(state): State<SharedState>,
    Path(action): Path<String>,
    Query(query): Query<IssueQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    verify_ajax(&headers)?;
    let issue_key = query
        .issue
        .filter(|k| !k.is_empty())
        .ok_or_else(|| PanelError::MissingParameter {
            name: "issue".to_string(),
        })?;
    if state.actions.resolve(&action).is_none() {
        return Err(ApiError::BadRequest(format!("Unknown action '{}'", action)));
    }

    let issue = state
        .services
        .issues
        .get_by_key(&issue_key)
        .ok_or_else(|| PanelError::IssueNotFound {
            key: issue_key.clone(),
        })?;

    Ok(Json(json!({
        "partial": format!("issue/{}_form", action),
        "issue": issue,
    })))
}

async fn do_action(
    State(state): State<SharedState>,
    Path(action): Path<String>,
    Query(query): Query<IssueQuery>,
    headers: HeaderMap,
    Json(params): Json<ActionParams>,
) -> Result<impl IntoResponse, ApiError> {
    verify_ajax(&headers)?;
    let issue_key = query
        .issue
        .filter(|k| !k.is_empty())
        .ok_or_else(|| PanelError::MissingParameter {
            name: "issue".to_string(),
        })?;

    let resolved = state
        .actions
        .resolve(&action)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown action '{}'", action)))?;

    let issues = &state.services.issues;
    match resolved {
        ResolvedAction::Builtin(IssueAction::Comment) => {
            let text = require(&params, "text")?;
            let author = current_login(&headers);
            check(issues.add_comment(&issue_key, text, author.as_deref()))?;
        }
        ResolvedAction::Builtin(IssueAction::Assign) => {
            let assignee = if params.get("me").map(String::as_str) == Some("true") {
                Some(current_login(&headers).ok_or_else(|| {
                    ApiError::BadRequest("Cannot assign to me without a login".to_string())
                })?)
            } else {
                // No assignee means unassign.
                params.get("assignee").cloned().filter(|a| !a.is_empty())
            };
            check(issues.assign(&issue_key, assignee.as_deref()))?;
        }
        ResolvedAction::Builtin(IssueAction::Transition) => {
            let transition = require(&params, "transition")?;
            check(issues.transition(&issue_key, transition))?;
        }
        ResolvedAction::Builtin(IssueAction::Severity) => {
            let severity = require(&params, "severity")?
                .parse()
                .map_err(ApiError::BadRequest)?;
            check(issues.set_severity(&issue_key, severity))?;
        }
        ResolvedAction::Builtin(IssueAction::Plan) => {
            let plan = require(&params, "plan")?;
            check(issues.plan(&issue_key, Some(plan)))?;
        }
        ResolvedAction::Builtin(IssueAction::Unplan) => {
            check(issues.plan(&issue_key, None))?;
        }
        ResolvedAction::Plugin(handler) => {
            check(handler(issues.as_ref(), &issue_key, &params))?;
        }
    }

    render_issue_fragment(&state, &issue_key)
}

async fn edit_comment_form(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    verify_ajax(&headers)?;
    let comment = state
        .services
        .issues
        .find_comment(&key)
        .ok_or_else(|| PanelError::CommentNotFound { key: key.clone() })?;
    Ok(Json(json!({
        "partial": "issue/edit_comment_form",
        "comment": comment,
    })))
}

async fn edit_comment(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<EditCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    verify_ajax(&headers)?;
    let comment = check(state.services.issues.edit_comment(&req.key, &req.text))?;
    render_issue_fragment(&state, &comment.issue_key)
}

async fn delete_comment(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    verify_ajax(&headers)?;
    let comment = check(state.services.issues.delete_comment(&key))?;
    render_issue_fragment(&state, &comment.issue_key)
}

/// Form used to create a manual issue.
async fn create_form(
    State(state): State<SharedState>,
    Query(query): Query<std::collections::HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    verify_ajax(&headers)?;
    let component_key = query
        .get("component")
        .filter(|k| !k.is_empty())
        .ok_or_else(|| PanelError::MissingParameter {
            name: "component".to_string(),
        })?;
    let component = state.services.components.find_by_key(component_key);
    Ok(Json(json!({
        "partial": "issue/create_form",
        "component": component,
    })))
}

async fn create(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<CreateIssueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    verify_ajax(&headers)?;

    if !COMPONENT_KEY_REGEX.is_match(&req.component) {
        return Err(ApiError::BadRequest(format!(
            "Invalid component key '{}'",
            req.component
        )));
    }

    let component = state
        .services
        .components
        .find_by_key(&req.component)
        .ok_or_else(|| PanelError::Validation {
            status: 400,
            errors: vec![format!("Component {} not found", req.component)],
        })?;

    let severity = match req.severity.as_deref() {
        Some(s) => s.parse().map_err(ApiError::BadRequest)?,
        None => crate::models::Severity::Major,
    };

    let created = check(state.services.issues.create(NewIssue {
        component_key: component.key,
        rule_key: req.rule,
        severity,
        message: req.message,
        line: req.line,
        reporter: current_login(&headers),
    }))?;

    let view = ViewAssembler::new(&state.services).assemble(&created.key)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"partial": "issue/manual_issue_created", "view": view})),
    ))
}

/// Rule description panel, with the debt characteristics when the rule
/// declares them.
async fn rule(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    verify_ajax(&headers)?;
    let rule = state
        .services
        .rules
        .find_by_key(&key)
        .ok_or_else(|| ApiError::NotFound(format!("Rule {} not found", key)))?;

    let characteristic = rule
        .debt_characteristic_key
        .as_deref()
        .and_then(|k| state.services.debt.characteristic_by_key(k));
    let sub_characteristic = rule
        .debt_sub_characteristic_key
        .as_deref()
        .and_then(|k| state.services.debt.characteristic_by_key(k));

    Ok(Json(json!({
        "partial": "issue/rule",
        "rule": rule,
        "characteristic": characteristic,
        "sub_characteristic": sub_characteristic,
    })))
}

async fn changelog(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    verify_ajax(&headers)?;
    let issue = state
        .services
        .issues
        .get_by_key(&key)
        .ok_or_else(|| PanelError::IssueNotFound { key: key.clone() })?;
    let changelog = state.services.issues.changelog(&key);
    Ok(Json(json!({
        "partial": "issue/changelog",
        "issue": issue,
        "changelog": changelog,
    })))
}

/// Issues widget on the project dashboard.
async fn widget_issues_list(
    State(state): State<SharedState>,
    Query(query): Query<WidgetQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = query
        .snapshot_id
        .and_then(|id| state.services.components.snapshot_by_id(id));
    Ok(Json(json!({
        "partial": "project/widgets/issues/issues_list",
        "snapshot": snapshot,
        "period": query.period,
    })))
}

// ── Tests ─────────────────────────────────────────────────────────────
