// Keytap Grab Layer - Rules
// Compiled name patterns and the first-match-wins arbitration over them

use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Errors raised while compiling a grab rule
#[derive(Debug, thiserror::Error)]
pub enum GrabRuleError {
    #[error("Invalid device name pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// What a matching rule does with the device.
#[derive(Debug)]
enum RuleAction<M> {
    /// Leave the device alone, even if a later rule would grab it
    Ignore,
    /// Grab the device and bind a resolver to this root key-action map
    Grab(Arc<M>),
}

impl<M> Clone for RuleAction<M> {
    fn clone(&self) -> Self {
        match self {
            RuleAction::Ignore => RuleAction::Ignore,
            RuleAction::Grab(root) => RuleAction::Grab(Arc::clone(root)),
        }
    }
}

/// A single grab rule: a device name pattern plus what to do on a match.
///
/// Patterns are searched, not anchored: `keyboard` matches
/// `"AT Translated Set 2 keyboard"`.
#[derive(Debug)]
pub struct GrabRule<M> {
    pattern: Regex,
    action: RuleAction<M>,
}

impl<M> Clone for GrabRule<M> {
    fn clone(&self) -> Self {
        Self {
            pattern: self.pattern.clone(),
            action: self.action.clone(),
        }
    }
}

impl<M> GrabRule<M> {
    /// Rule that grabs matching devices with the given root map.
    pub fn grab(pattern: &str, root: Arc<M>) -> Result<Self, GrabRuleError> {
        Ok(Self {
            pattern: compile(pattern)?,
            action: RuleAction::Grab(root),
        })
    }

    /// Rule that keeps matching devices away from every later rule.
    pub fn ignore(pattern: &str) -> Result<Self, GrabRuleError> {
        Ok(Self {
            pattern: compile(pattern)?,
            action: RuleAction::Ignore,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn is_ignore(&self) -> bool {
        matches!(self.action, RuleAction::Ignore)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

fn compile(pattern: &str) -> Result<Regex, GrabRuleError> {
    Regex::new(pattern).map_err(|source| GrabRuleError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Outcome of arbitrating one device name against the rule list
pub enum GrabDecision<M> {
    /// Rule `rule` matched and grabs the device with `root`
    Grab { rule: usize, root: Arc<M> },
    /// Rule `rule` matched and is an ignore rule
    Ignore { rule: usize },
    /// No rule matched; the device is not grabbed
    NoMatch,
}

impl<M> GrabDecision<M> {
    pub fn is_grab(&self) -> bool {
        matches!(self, GrabDecision::Grab { .. })
    }

    /// Index of the rule that decided, if any matched
    pub fn rule(&self) -> Option<usize> {
        match self {
            GrabDecision::Grab { rule, .. } | GrabDecision::Ignore { rule } => Some(*rule),
            GrabDecision::NoMatch => None,
        }
    }
}

impl<M> fmt::Debug for GrabDecision<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrabDecision::Grab { rule, .. } => write!(f, "Grab(rule {})", rule),
            GrabDecision::Ignore { rule } => write!(f, "Ignore(rule {})", rule),
            GrabDecision::NoMatch => write!(f, "NoMatch"),
        }
    }
}

/// Immutable, ordered grab rule list. Declaration order is evaluation order.
#[derive(Debug)]
pub struct GrabRules<M> {
    rules: Vec<GrabRule<M>>,
}

impl<M> Clone for GrabRules<M> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
        }
    }
}

impl<M> Default for GrabRules<M> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<M> GrabRules<M> {
    pub fn new(rules: Vec<GrabRule<M>>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GrabRule<M>> {
        self.rules.iter()
    }

    /// Decide what to do with a device called `name`.
    ///
    /// The first matching rule decides; an ignore rule shadows every later
    /// rule, and a name no rule matches is never grabbed.
    pub fn decide(&self, name: &str) -> GrabDecision<M> {
        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.matches(name) {
                continue;
            }
            return match &rule.action {
                RuleAction::Ignore => GrabDecision::Ignore { rule: index },
                RuleAction::Grab(root) => GrabDecision::Grab {
                    rule: index,
                    root: Arc::clone(root),
                },
            };
        }
        GrabDecision::NoMatch
    }
}

impl<M> FromIterator<GrabRule<M>> for GrabRules<M> {
    fn from_iter<I: IntoIterator<Item = GrabRule<M>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_rules() -> (GrabRules<&'static str>, Arc<&'static str>) {
        let map_a = Arc::new("mapA");
        let rules = GrabRules::new(vec![
            GrabRule::ignore("keyboard").unwrap(),
            GrabRule::grab("kbd.*", Arc::clone(&map_a)).unwrap(),
        ]);
        (rules, map_a)
    }

    #[test]
    fn test_ignore_rule_wins_when_first() {
        let (rules, _) = sample_rules();
        assert!(matches!(
            rules.decide("keyboard2"),
            GrabDecision::Ignore { rule: 0 }
        ));
    }

    #[test]
    fn test_grab_rule_carries_root_map() {
        let (rules, map_a) = sample_rules();
        match rules.decide("kbd3") {
            GrabDecision::Grab { rule, root } => {
                assert_eq!(rule, 1);
                assert!(Arc::ptr_eq(&root, &map_a));
            }
            other => panic!("expected grab, got {:?}", other),
        }
    }

    #[test]
    fn test_no_rule_matches() {
        let (rules, _) = sample_rules();
        assert!(matches!(rules.decide("Logitech Mouse"), GrabDecision::NoMatch));
    }

    #[test]
    fn test_empty_rules_never_grab() {
        let rules: GrabRules<()> = GrabRules::default();
        assert!(matches!(rules.decide("keyboard"), GrabDecision::NoMatch));
    }

    #[test]
    fn test_earlier_grab_shadows_later_ignore() {
        let root = Arc::new(1u8);
        let rules = GrabRules::new(vec![
            GrabRule::grab("Ergodox", Arc::clone(&root)).unwrap(),
            GrabRule::ignore("Ergodox EZ").unwrap(),
        ]);
        assert!(rules.decide("Ergodox EZ").is_grab());
    }

    #[test]
    fn test_pattern_is_unanchored_search() {
        let rules = GrabRules::new(vec![GrabRule::grab("keyboard", Arc::new(())).unwrap()]);
        assert!(rules.decide("AT Translated Set 2 keyboard").is_grab());
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = GrabRule::<()>::ignore("kbd(").unwrap_err();
        assert!(err.to_string().contains("kbd("));
    }

    #[test]
    fn test_decision_accessors() {
        let (rules, map_a) = sample_rules();
        assert_eq!(rules.decide("keyboard").rule(), Some(0));
        assert_eq!(rules.decide("mouse").rule(), None);
        assert!(matches!(
            rules.decide("kbd"),
            GrabDecision::Grab { ref root, .. } if Arc::ptr_eq(root, &map_a)
        ));
    }

    // (literal, ignore) pairs; literals come from a tiny alphabet so overlaps are common
    fn rule_specs() -> impl Strategy<Value = Vec<(String, bool)>> {
        proptest::collection::vec(("[ab]{1,3}", any::<bool>()), 0..8)
    }

    proptest! {
        #[test]
        fn decision_follows_first_matching_rule(specs in rule_specs(), name in "[abc]{0,6}") {
            let rules: GrabRules<usize> = specs
                .iter()
                .enumerate()
                .map(|(i, (literal, ignore))| {
                    if *ignore {
                        GrabRule::ignore(literal).unwrap()
                    } else {
                        GrabRule::grab(literal, Arc::new(i)).unwrap()
                    }
                })
                .collect();

            let expected = specs.iter().position(|(literal, _)| name.contains(literal.as_str()));
            let decision = rules.decide(&name);
            prop_assert_eq!(decision.rule(), expected);

            match (expected, decision) {
                (None, GrabDecision::NoMatch) => {}
                (Some(i), GrabDecision::Ignore { .. }) => prop_assert!(specs[i].1),
                (Some(i), GrabDecision::Grab { root, .. }) => {
                    prop_assert!(!specs[i].1);
                    prop_assert_eq!(*root, i);
                }
                (expected, decision) => {
                    prop_assert!(false, "expected {:?}, got {:?}", expected, decision);
                }
            }
        }
    }
}
