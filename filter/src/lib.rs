//! Fw Filter - rule model and packet decision engine
//!
//! Shared policy types for the firewall simulator:
//! - Ordered rule sets with first-match-wins semantics
//! - The PERMIT/BLOCK decision function (default deny)
//! - Well-known service names and derived rule statistics

use serde::{Deserialize, Serialize};

pub mod service;

// =============================================================================
// Rule Types
// =============================================================================

/// Verdict attached to a rule; doubles as the outcome of matching a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Permit,
    Block,
}

impl Action {
    /// Parse user input case-insensitively. Anything other than PERMIT or
    /// BLOCK yields None.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_uppercase().as_str() {
            "PERMIT" => Some(Self::Permit),
            "BLOCK" => Some(Self::Block),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permit => "PERMIT",
            Self::Block => "BLOCK",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One policy entry: exact (ip, port) match with a verdict.
///
/// Rule sets are ordered; position in the list is the rule's identity for
/// update and delete operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub ip: String,
    pub port: u16,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Rule {
    pub fn matches(&self, ip: &str, port: u16) -> bool {
        self.ip == ip && self.port == port
    }
}

/// A packet descriptor under test. Request-scoped, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub ip: String,
    pub port: u16,
}

// =============================================================================
// Decision Engine
// =============================================================================

/// Match a packet against the rule set.
///
/// Rules are scanned in stored order and the first exact (ip, port) match
/// wins, so conflicting duplicates resolve deterministically by list
/// position. A packet with no matching rule is blocked (fail-safe deny),
/// including against an empty rule set. Matching is exact string/integer
/// equality only; no wildcards, CIDR or port ranges.
pub fn decide(packet: &Packet, rules: &[Rule]) -> Action {
    rules
        .iter()
        .find(|rule| rule.matches(&packet.ip, packet.port))
        .map(|rule| rule.action)
        .unwrap_or(Action::Block)
}

// =============================================================================
// Statistics
// =============================================================================

/// Per-action rule counts, derived on demand. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleStats {
    pub permitted: usize,
    pub blocked: usize,
    pub total: usize,
}

impl RuleStats {
    pub fn of(rules: &[Rule]) -> Self {
        let permitted = rules.iter().filter(|r| r.action == Action::Permit).count();
        let blocked = rules.iter().filter(|r| r.action == Action::Block).count();
        Self {
            permitted,
            blocked,
            total: rules.len(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
