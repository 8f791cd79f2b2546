//! HTTP API: rule management, packet testing and test history.
//!
//! Every mutation endpoint follows the same shape: validate input, take the
//! store write lock, load the current rules, check preconditions, mutate,
//! persist, respond. Validation failures short-circuit before anything is
//! written.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use fw_filter::{decide, service::service_name, Action, Packet, Rule, RuleStats};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::history::{TestHistory, TestRecord};
use crate::probe::probe;
use crate::store::RuleStore;

/// Shared handles passed to every request handler. One instance per process;
/// no hidden singletons.
pub struct AppState {
    pub store: RuleStore,
    pub history: TestHistory,
    pub probe_timeout: Duration,
}

// =============================================================================
// Error Shaping
// =============================================================================

/// API-visible failure: a status code plus a one-line reason. Internal
/// errors are logged in full but surface only as the generic message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// =============================================================================
// Input Validation
// =============================================================================

fn validate_ip(raw: &str) -> Result<String, ApiError> {
    let ip = raw.trim();
    if ip.is_empty() {
        return Err(ApiError::bad_request("ip is required"));
    }
    // Any non-empty string is accepted; there is no address-format check.
    Ok(ip.to_string())
}

/// Accept a JSON integer or numeric string, bounded to [1, 65535].
fn validate_port(raw: &Value) -> Result<u16, ApiError> {
    let port = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match port {
        Some(p) if (1..=65535).contains(&p) => Ok(p as u16),
        Some(_) => Err(ApiError::bad_request("port out of range (1-65535)")),
        None => Err(ApiError::bad_request("port must be a number")),
    }
}

fn validate_action(raw: &str) -> Result<Action, ApiError> {
    Action::parse(raw)
        .ok_or_else(|| ApiError::bad_request("invalid action: expected PERMIT or BLOCK"))
}

/// Resolve a path segment to a rule index. Non-numeric and out-of-bounds
/// values both read as "no such rule".
fn validate_index(raw: &str, len: usize) -> Result<usize, ApiError> {
    raw.parse::<usize>()
        .ok()
        .filter(|&index| index < len)
        .ok_or_else(|| ApiError::not_found("rule not found"))
}

fn normalize_description(raw: Option<String>) -> Option<String> {
    raw.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())
}

// =============================================================================
// Rule Mutations
// =============================================================================

/// Append a new rule, enforcing (ip, port) uniqueness within the active set.
fn insert_rule(
    rules: &mut Vec<Rule>,
    ip: String,
    port: u16,
    action: Action,
    description: Option<String>,
) -> Result<Rule, ApiError> {
    if rules.iter().any(|r| r.matches(&ip, port)) {
        return Err(ApiError::bad_request(
            "a rule for this ip and port already exists",
        ));
    }
    let rule = Rule {
        ip,
        port,
        action,
        description,
    };
    rules.push(rule.clone());
    Ok(rule)
}

/// Apply action and/or description changes to the rule at `index`.
///
/// A present-but-blank description removes the existing one; an absent field
/// leaves the rule untouched.
fn patch_rule(
    rules: &mut [Rule],
    index: usize,
    action: Option<Action>,
    description: Option<String>,
) -> Rule {
    let rule = &mut rules[index];
    if let Some(action) = action {
        rule.action = action;
    }
    if let Some(description) = description {
        let trimmed = description.trim();
        rule.description = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }
    rule.clone()
}

fn persist(store: &RuleStore, rules: &[Rule]) -> Result<(), ApiError> {
    store.save(rules).map_err(|e| {
        error!("Failed to persist rules: {:#}", e);
        ApiError::internal("failed to save rules")
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Serve the dashboard HTML
async fn dashboard() -> impl IntoResponse {
    Html(include_str!("../static/dashboard.html"))
}

async fn list_rules(State(state): State<Arc<AppState>>) -> Json<Vec<Rule>> {
    Json(state.store.load())
}

#[derive(Deserialize)]
struct CreateRuleBody {
    ip: String,
    port: Value,
    action: String,
    #[serde(default)]
    description: Option<String>,
}

async fn create_rule(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRuleBody>,
) -> Result<(StatusCode, Json<Rule>), ApiError> {
    let ip = validate_ip(&body.ip)?;
    let port = validate_port(&body.port)?;
    let action = validate_action(&body.action)?;
    let description = normalize_description(body.description);

    let _guard = state.store.write_lock().await;
    let mut rules = state.store.load();
    let rule = insert_rule(&mut rules, ip, port, action, description)?;
    persist(&state.store, &rules)?;
    info!("Rule added: {} {}:{}", rule.action, rule.ip, rule.port);
    Ok((StatusCode::CREATED, Json(rule)))
}

#[derive(Deserialize)]
struct UpdateRuleBody {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

async fn update_rule(
    Path(index): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdateRuleBody>,
) -> Result<Json<Rule>, ApiError> {
    let _guard = state.store.write_lock().await;
    let mut rules = state.store.load();
    let index = validate_index(&index, rules.len())?;
    let action = match body.action.as_deref() {
        Some(raw) => Some(validate_action(raw)?),
        None => None,
    };

    let rule = patch_rule(&mut rules, index, action, body.description);
    persist(&state.store, &rules)?;
    info!("Rule {} updated: {} {}:{}", index, rule.action, rule.ip, rule.port);
    Ok(Json(rule))
}

async fn delete_rule(
    Path(index): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let _guard = state.store.write_lock().await;
    let mut rules = state.store.load();
    let index = validate_index(&index, rules.len())?;
    let deleted = rules.remove(index);
    persist(&state.store, &rules)?;
    info!("Rule {} deleted: {} {}:{}", index, deleted.action, deleted.ip, deleted.port);
    Ok(Json(json!({
        "message": "rule deleted",
        "deleted_rule": deleted,
    })))
}

#[derive(Deserialize)]
struct TestPacketBody {
    ip: String,
    port: Value,
}

async fn test_packet(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TestPacketBody>,
) -> Result<Json<TestRecord>, ApiError> {
    let ip = validate_ip(&body.ip)?;
    let port = validate_port(&body.port)?;
    Ok(Json(execute_test(&state, &ip, port).await))
}

/// Run one packet test through the shared core: probe reachability, apply
/// the current rule set, annotate with the service name and append to the
/// history. Used by both the HTTP API and the console front-end. The probe
/// result never influences the decision.
pub async fn execute_test(state: &AppState, ip: &str, port: u16) -> TestRecord {
    let reachability = probe(ip, port, state.probe_timeout).await;
    let rules = state.store.load();
    let packet = Packet {
        ip: ip.to_string(),
        port,
    };
    let decision = decide(&packet, &rules);

    let record = TestRecord {
        ip: ip.to_string(),
        port,
        service: service_name(port).to_string(),
        reachability,
        decision,
        timestamp: Utc::now(),
    };
    state.history.record(record.clone()).await;
    info!("Test {}:{} -> {} (reachability: {})", ip, port, decision, reachability);
    record
}

async fn list_tests(State(state): State<Arc<AppState>>) -> Json<Vec<TestRecord>> {
    Json(state.history.list().await)
}

async fn clear_tests(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.history.clear().await;
    info!("Test history cleared");
    Json(json!({ "message": "history cleared" }))
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<RuleStats> {
    Json(RuleStats::of(&state.store.load()))
}

// =============================================================================
// Router / Server
// =============================================================================

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/rules", get(list_rules).post(create_rule))
        .route("/rules/{index}", put(update_rule).delete(delete_rule))
        .route("/test-packet", post(test_packet))
        .route("/tests", get(list_tests).delete(clear_tests))
        .route("/stats", get(stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server.
pub async fn run_server(state: Arc<AppState>, bind: &str) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Firewall simulator ready at http://{}", bind);
    axum::serve(listener, app).await.context("API server error")?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(ip: &str, port: u16, action: Action) -> Rule {
        Rule {
            ip: ip.to_string(),
            port,
            action,
            description: None,
        }
    }

    #[test]
    fn test_validate_port_accepts_integer_and_string() {
        assert_eq!(validate_port(&json!(443)).unwrap(), 443);
        assert_eq!(validate_port(&json!("443")).unwrap(), 443);
        assert_eq!(validate_port(&json!(" 22 ")).unwrap(), 22);
    }

    #[test]
    fn test_validate_port_rejects_out_of_range() {
        let err = validate_port(&json!(70000)).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("out of range"));
        assert!(validate_port(&json!(0)).is_err());
        assert!(validate_port(&json!(-1)).is_err());
    }

    #[test]
    fn test_validate_port_rejects_non_numbers() {
        assert!(validate_port(&json!("http")).is_err());
        assert!(validate_port(&json!(null)).is_err());
        assert!(validate_port(&json!([80])).is_err());
    }

    #[test]
    fn test_validate_action_normalizes_case() {
        assert_eq!(validate_action("permit").unwrap(), Action::Permit);
        assert_eq!(validate_action("Block").unwrap(), Action::Block);
        let err = validate_action("maybe").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("invalid action"));
    }

    #[test]
    fn test_validate_ip_rejects_blank() {
        assert!(validate_ip("   ").is_err());
        assert_eq!(validate_ip(" 10.0.0.1 ").unwrap(), "10.0.0.1");
    }

    #[test]
    fn test_validate_index_bounds() {
        assert_eq!(validate_index("1", 2).unwrap(), 1);
        let err = validate_index("5", 2).unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert!(validate_index("2", 2).is_err());
        assert!(validate_index("-1", 2).is_err());
        assert!(validate_index("abc", 2).is_err());
    }

    #[test]
    fn test_insert_rule_appends_in_order() {
        let mut rules = vec![rule("8.8.8.8", 53, Action::Permit)];
        let created =
            insert_rule(&mut rules, "1.1.1.1".to_string(), 443, Action::Block, None).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1], created);
    }

    #[test]
    fn test_insert_rule_rejects_duplicate() {
        let mut rules = vec![rule("8.8.8.8", 53, Action::Permit)];
        let err = insert_rule(&mut rules, "8.8.8.8".to_string(), 53, Action::Block, None)
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(rules.len(), 1, "rejected create must not grow the set");
    }

    #[test]
    fn test_insert_rule_same_ip_other_port_is_fine() {
        let mut rules = vec![rule("8.8.8.8", 53, Action::Permit)];
        assert!(insert_rule(&mut rules, "8.8.8.8".to_string(), 443, Action::Permit, None).is_ok());
    }

    #[test]
    fn test_patch_rule_updates_action_only() {
        let mut rules = vec![Rule {
            description: Some("keep me".to_string()),
            ..rule("8.8.8.8", 53, Action::Permit)
        }];
        let updated = patch_rule(&mut rules, 0, Some(Action::Block), None);
        assert_eq!(updated.action, Action::Block);
        assert_eq!(updated.description.as_deref(), Some("keep me"));
    }

    #[test]
    fn test_patch_rule_blank_description_removes_it() {
        let mut rules = vec![Rule {
            description: Some("old".to_string()),
            ..rule("8.8.8.8", 53, Action::Permit)
        }];
        let updated = patch_rule(&mut rules, 0, None, Some("  ".to_string()));
        assert_eq!(updated.description, None);
        assert_eq!(updated.action, Action::Permit);
    }

    #[test]
    fn test_patch_rule_sets_trimmed_description() {
        let mut rules = vec![rule("8.8.8.8", 53, Action::Permit)];
        let updated = patch_rule(&mut rules, 0, None, Some("  DNS server  ".to_string()));
        assert_eq!(updated.description.as_deref(), Some("DNS server"));
    }

    #[test]
    fn test_normalize_description_drops_blank() {
        assert_eq!(normalize_description(Some("  ".to_string())), None);
        assert_eq!(normalize_description(None), None);
        assert_eq!(
            normalize_description(Some(" lab ".to_string())).as_deref(),
            Some("lab")
        );
    }
}
