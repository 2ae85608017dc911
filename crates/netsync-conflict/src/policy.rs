//! Conflict policy for per-entry transfer decisions
//!
//! Conflict rules map relative paths to an action using glob patterns in
//! first-match-wins order. [`is_transfer_allowed`] then combines the action
//! with the transfer direction and the configured default resolution.

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use netsync_core::config::ConflictRuleConfig;
use netsync_core::domain::{
    CompareStrategy, ConflictAction, ConflictResolution, TransferDirection,
};

use crate::error::ConflictError;

/// `*` and `**` both cross `/`, so `*.log` matches at any depth
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A single conflict rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRule {
    /// Glob pattern matched against the relative path (e.g. `"**/*.txt"`)
    pub pattern: String,
    /// Action for matching paths
    pub action: ConflictAction,
}

impl ConflictRule {
    pub fn new(pattern: impl Into<String>, action: ConflictAction) -> Self {
        Self {
            pattern: pattern.into(),
            action,
        }
    }

    /// Validates the rule's glob pattern
    pub fn validate(&self) -> Result<(), ConflictError> {
        self.compile().map(|_| ())
    }

    fn compile(&self) -> Result<Pattern, ConflictError> {
        Pattern::new(&self.pattern).map_err(|e| ConflictError::InvalidPattern {
            pattern: self.pattern.clone(),
            reason: e.to_string(),
        })
    }
}

impl From<&ConflictRuleConfig> for ConflictRule {
    fn from(cfg: &ConflictRuleConfig) -> Self {
        Self::new(cfg.pattern.clone(), cfg.action)
    }
}

/// Compiled, ordered conflict rules
#[derive(Debug, Clone)]
pub struct ConflictRules {
    rules: Vec<(Pattern, ConflictAction)>,
}

impl ConflictRules {
    /// Compiles `rules`, keeping their order.
    ///
    /// # Errors
    /// [`ConflictError::InvalidPattern`] for the first pattern that fails to parse.
    pub fn new(rules: &[ConflictRule]) -> Result<Self, ConflictError> {
        let rules = rules
            .iter()
            .map(|rule| Ok((rule.compile()?, rule.action)))
            .collect::<Result<Vec<_>, ConflictError>>()?;

        debug!(rules_count = rules.len(), "Conflict rules compiled");
        Ok(Self { rules })
    }

    /// Compiles the rules of a configuration file
    pub fn from_config(rules: &[ConflictRuleConfig]) -> Result<Self, ConflictError> {
        let rules: Vec<ConflictRule> = rules.iter().map(ConflictRule::from).collect();
        Self::new(&rules)
    }

    /// Action of the first rule matching `relative_path`, `Skip` when none matches
    pub fn resolve(&self, relative_path: &str) -> ConflictAction {
        for (pattern, action) in &self.rules {
            if pattern.matches_with(relative_path, MATCH_OPTIONS) {
                trace!(
                    path = %relative_path,
                    pattern = %pattern,
                    action = %action,
                    "Conflict rule matched"
                );
                return *action;
            }
        }

        trace!(path = %relative_path, "No conflict rule matched, skipping");
        ConflictAction::Skip
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Resolves the conflict action for `relative_path`.
///
/// `None` when no rules are configured. Otherwise the first matching rule's
/// action, or `Skip` when rules exist but none match.
pub fn resolve_action(relative_path: &str, rules: Option<&ConflictRules>) -> Option<ConflictAction> {
    rules.map(|rules| rules.resolve(relative_path))
}

/// Whether a transfer in `direction` may proceed.
///
/// Always true for the `Exists` strategy. Otherwise the rule's action must
/// match the direction, or, without an action, the default resolution must
/// align with it (`PreferLocal` with uploads, `PreferRemote` with downloads).
/// `Manual` therefore blocks every transfer no rule asks for.
pub fn is_transfer_allowed(
    strategy: CompareStrategy,
    direction: TransferDirection,
    action: Option<ConflictAction>,
    resolution: ConflictResolution,
) -> bool {
    if strategy == CompareStrategy::Exists {
        return true;
    }

    match action {
        Some(action) => action.matches(direction),
        None => resolution.aligns_with(direction),
    }
}
