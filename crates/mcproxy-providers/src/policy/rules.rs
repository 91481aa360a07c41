//! Ordered allow/deny rule evaluation (§4.7).

use async_trait::async_trait;
use glob::Pattern;
use mcproxy_domain::ports::{PolicyDecision, PolicyEngine, PolicyRequest, PolicyVerdict};
use mcproxy_domain::value_objects::OperationType;

/// The action a matching [`PolicyRule`] takes.
#[derive(Debug, Clone)]
pub enum PolicyAction {
    /// Allow unconditionally.
    Allow,
    /// Allow, surfacing `warning` to the caller.
    AllowWithWarning(String),
    /// Deny with `reason`.
    Deny(String),
    /// Require confirmation, described by `prompt`.
    Ask(String),
}

/// One ordered policy rule: a server-name glob, an optional tool-name
/// glob, an optional intent filter, and the action to take when all
/// three match (§4.7 "Rules evaluated in declared order").
#[derive(Debug, Clone)]
pub struct PolicyRule {
    /// Glob matched against the server name (`*` matches any).
    pub server_glob: String,
    /// Glob matched against the tool name, `None` matches any tool.
    pub tool_glob: Option<String>,
    /// If set, only calls declaring this intent match.
    pub intent: Option<OperationType>,
    /// What to do when this rule matches.
    pub action: PolicyAction,
    /// If set, the arguments are replaced with this value on match.
    pub rewrite: Option<serde_json::Value>,
}

impl PolicyRule {
    /// An allow-all rule for `Read` intent, a sensible permissive
    /// default for a fresh rule set.
    #[must_use]
    pub fn allow_reads() -> Self {
        Self {
            server_glob: "*".to_owned(),
            tool_glob: None,
            intent: Some(OperationType::Read),
            action: PolicyAction::Allow,
            rewrite: None,
        }
    }
}

/// Why a rule did or didn't match, surfaced for diagnosability in
/// tests and admin tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    /// Index of the matching rule within the configured rule set.
    pub rule_index: usize,
}

fn matches_glob(pattern: &str, value: &str) -> bool {
    Pattern::new(pattern).map(|p| p.matches(value)).unwrap_or(false)
}

/// [`PolicyEngine`] backed by an ordered [`Vec<PolicyRule>`] (§4.7).
///
/// Quarantine and `disabled` are short-circuit denies evaluated before
/// any user rule. If no rule matches, `Read` defaults to allow and
/// `Write`/`Destructive` default to requiring confirmation — the
/// Policy Engine "may require" intent for non-read operations (§3);
/// this implementation exercises that option rather than defaulting
/// open, since an unconfigured policy should fail toward asking, not
/// toward silently allowing destructive calls.
pub struct RulePolicyEngine {
    rules: Vec<PolicyRule>,
}

impl RulePolicyEngine {
    /// Builds an engine over an explicit, already-ordered rule set.
    #[must_use]
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    /// The rule set currently in effect, reloaded wholesale on config
    /// change by replacing the engine (§3 ownership summary: "stateless
    /// over an immutable rule set reloaded on config change").
    #[must_use]
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    fn find_match(&self, request: &PolicyRequest<'_>) -> Option<(usize, &PolicyRule)> {
        self.rules.iter().enumerate().find(|(_, rule)| {
            let server_ok = matches_glob(&rule.server_glob, &request.server_config.name);
            let tool_ok = rule
                .tool_glob
                .as_ref()
                .is_none_or(|glob| matches_glob(glob, &request.tool.tool_name));
            let intent_ok = match &rule.intent {
                Some(required) => request.intent.is_some_and(|i| i.operation_type == *required),
                None => true,
            };
            server_ok && tool_ok && intent_ok
        })
    }
}

#[async_trait]
impl PolicyEngine for RulePolicyEngine {
    async fn evaluate(&self, request: PolicyRequest<'_>) -> PolicyDecision {
        if request.server_config.quarantined {
            return PolicyDecision {
                verdict: PolicyVerdict::Deny {
                    reason: format!("server '{}' is quarantined", request.server_config.name),
                },
                rewritten_arguments: None,
            };
        }
        if !request.server_config.enabled {
            return PolicyDecision {
                verdict: PolicyVerdict::Deny {
                    reason: format!("server '{}' is disabled", request.server_config.name),
                },
                rewritten_arguments: None,
            };
        }

        if let Some((_, rule)) = self.find_match(&request) {
            let verdict = match &rule.action {
                PolicyAction::Allow => PolicyVerdict::Allow,
                PolicyAction::AllowWithWarning(w) => PolicyVerdict::AllowWithWarning { warning: w.clone() },
                PolicyAction::Deny(reason) => PolicyVerdict::Deny { reason: reason.clone() },
                PolicyAction::Ask(prompt) => PolicyVerdict::Ask { prompt: prompt.clone() },
            };
            return PolicyDecision {
                verdict,
                rewritten_arguments: rule.rewrite.clone(),
            };
        }

        let verdict = match request.intent.map(|i| i.operation_type) {
            None | Some(OperationType::Read) => PolicyVerdict::Allow,
            Some(OperationType::Write) => PolicyVerdict::AllowWithWarning {
                warning: "write operation has no matching policy rule".to_owned(),
            },
            Some(OperationType::Destructive) => PolicyVerdict::Ask {
                prompt: format!(
                    "confirm destructive call to '{}:{}'",
                    request.server_config.name, request.tool.tool_name
                ),
            },
        };
        PolicyDecision {
            verdict,
            rewritten_arguments: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcproxy_domain::entities::{Protocol, ServerConfig, ToolDescriptor};
    use mcproxy_domain::value_objects::{Intent, ServerIdentity};

    fn server(name: &str, quarantined: bool, enabled: bool) -> ServerConfig {
        let mut c = ServerConfig::new_default_quarantined(name.to_owned());
        c.protocol = Protocol::Stdio;
        c.command = Some("x".to_owned());
        c.quarantined = quarantined;
        c.enabled = enabled;
        c
    }

    fn tool(server_name: &str, tool_name: &str) -> ToolDescriptor {
        ToolDescriptor {
            server_id: ServerIdentity::derive(server_name, "/tmp/config.json"),
            server_name: server_name.to_owned(),
            tool_name: tool_name.to_owned(),
            params_schema: serde_json::json!({}),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn quarantine_short_circuits_before_rules() {
        let engine = RulePolicyEngine::new(vec![PolicyRule::allow_reads()]);
        let server = server("gh", true, true);
        let tool = tool("gh", "list_repos");
        let decision = engine
            .evaluate(PolicyRequest {
                server_config: &server,
                tool: &tool,
                intent: None,
                arguments: &serde_json::json!({}),
                source: "mcp",
            })
            .await;
        assert!(matches!(decision.verdict, PolicyVerdict::Deny { .. }));
    }

    #[tokio::test]
    async fn disabled_server_denies() {
        let engine = RulePolicyEngine::new(vec![]);
        let server = server("gh", false, false);
        let tool = tool("gh", "list_repos");
        let decision = engine
            .evaluate(PolicyRequest {
                server_config: &server,
                tool: &tool,
                intent: None,
                arguments: &serde_json::json!({}),
                source: "mcp",
            })
            .await;
        assert!(matches!(decision.verdict, PolicyVerdict::Deny { .. }));
    }

    #[tokio::test]
    async fn destructive_without_matching_rule_asks() {
        let engine = RulePolicyEngine::new(vec![]);
        let server = server("gh", false, true);
        let tool = tool("gh", "delete_repo");
        let intent = Intent::of(OperationType::Destructive);
        let decision = engine
            .evaluate(PolicyRequest {
                server_config: &server,
                tool: &tool,
                intent: Some(&intent),
                arguments: &serde_json::json!({}),
                source: "mcp",
            })
            .await;
        assert!(matches!(decision.verdict, PolicyVerdict::Ask { .. }));
    }

    #[tokio::test]
    async fn explicit_deny_rule_wins_over_default() {
        let rule = PolicyRule {
            server_glob: "gh".to_owned(),
            tool_glob: Some("delete_*".to_owned()),
            intent: None,
            action: PolicyAction::Deny("destructive repo ops are never allowed".to_owned()),
            rewrite: None,
        };
        let engine = RulePolicyEngine::new(vec![rule]);
        let server = server("gh", false, true);
        let tool = tool("gh", "delete_repo");
        let decision = engine
            .evaluate(PolicyRequest {
                server_config: &server,
                tool: &tool,
                intent: None,
                arguments: &serde_json::json!({}),
                source: "mcp",
            })
            .await;
        assert!(matches!(decision.verdict, PolicyVerdict::Deny { .. }));
    }

    #[tokio::test]
    async fn rewrite_is_carried_on_match() {
        let rule = PolicyRule {
            server_glob: "gh".to_owned(),
            tool_glob: None,
            intent: None,
            action: PolicyAction::Allow,
            rewrite: Some(serde_json::json!({"dry_run": true})),
        };
        let engine = RulePolicyEngine::new(vec![rule]);
        let server = server("gh", false, true);
        let tool = tool("gh", "list_repos");
        let decision = engine
            .evaluate(PolicyRequest {
                server_config: &server,
                tool: &tool,
                intent: None,
                arguments: &serde_json::json!({}),
                source: "mcp",
            })
            .await;
        assert_eq!(decision.rewritten_arguments, Some(serde_json::json!({"dry_run": true})));
    }
}
