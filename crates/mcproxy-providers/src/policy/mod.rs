//! Policy Engine implementation (§4.7).

mod rules;

pub use rules::{PolicyAction, PolicyRule, RuleMatch, RulePolicyEngine};
