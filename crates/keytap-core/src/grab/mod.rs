// Keytap Grab Layer
// Ordered grab rules and first-match arbitration

mod rule;

pub use rule::{GrabDecision, GrabRule, GrabRuleError, GrabRules};
