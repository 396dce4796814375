//! Label constraints
//!
//! Parses `key=value,key=value` selectors into a conjunctive filter over pod labels.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("Invalid label selector: {0}")]
    InvalidSelector(String),
}

/// A single `key=value` equality constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelConstraint {
    pub key: String,
    pub value: String,
}

impl LabelConstraint {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Whether the label set carries this key with exactly this value
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        labels.get(&self.key) == Some(&self.value)
    }
}

impl FromStr for LabelConstraint {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('=').collect();
        match parts.as_slice() {
            [key, value] => Ok(Self::new(*key, *value)),
            _ => Err(LabelError::InvalidSelector(s.to_string())),
        }
    }
}

impl fmt::Display for LabelConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Conjunction of label constraints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    constraints: Vec<LabelConstraint>,
}

impl LabelSelector {
    /// Parse a comma separated list of `key=value` pairs.
    ///
    /// Every entry must contain exactly one `=`; a malformed entry fails the
    /// whole selector rather than being skipped.
    pub fn parse(input: &str) -> Result<Self, LabelError> {
        let constraints = input
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<LabelConstraint>, _>>()?;
        Ok(Self { constraints })
    }

    pub fn constraints(&self) -> &[LabelConstraint] {
        &self.constraints
    }

    /// True when every constraint is satisfied by `labels`
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.constraints.iter().all(|c| c.matches(labels))
    }
}

impl FromStr for LabelSelector {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.constraints.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", joined.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_single_pair() {
        let selector = LabelSelector::parse("app=web").unwrap();
        assert_eq!(selector.constraints(), &[LabelConstraint::new("app", "web")]);
    }

    #[test]
    fn test_parse_multiple_pairs() {
        let selector = LabelSelector::parse("app=web,tier=frontend").unwrap();
        assert_eq!(selector.constraints().len(), 2);
        assert_eq!(selector.constraints()[1], LabelConstraint::new("tier", "frontend"));
        assert_eq!(selector.to_string(), "app=web,tier=frontend");
    }

    #[test]
    fn test_parse_rejects_missing_equals() {
        assert_eq!(
            LabelSelector::parse("app"),
            Err(LabelError::InvalidSelector("app".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_extra_equals() {
        assert_eq!(
            LabelSelector::parse("app=web=extra"),
            Err(LabelError::InvalidSelector("app=web=extra".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_one_bad_entry_among_good() {
        let err = LabelSelector::parse("app=web,tier,env=prod").unwrap_err();
        assert_eq!(err.to_string(), "Invalid label selector: tier");
    }

    #[test]
    fn test_empty_value_is_allowed() {
        let selector = LabelSelector::parse("app=").unwrap();
        assert!(selector.matches(&labels(&[("app", "")])));
        assert!(!selector.matches(&labels(&[])));
    }

    #[test]
    fn test_matches_superset() {
        let selector = LabelSelector::parse("app=web").unwrap();
        assert!(selector.matches(&labels(&[("app", "web"), ("tier", "frontend")])));
        assert!(!selector.matches(&labels(&[("app", "worker")])));
        assert!(!selector.matches(&labels(&[("tier", "frontend")])));
    }

    #[test]
    fn test_matches_is_conjunctive() {
        let selector = LabelSelector::parse("app=web,tier=frontend").unwrap();
        assert!(selector.matches(&labels(&[("tier", "frontend"), ("app", "web")])));
        assert!(!selector.matches(&labels(&[("app", "web"), ("tier", "backend")])));
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector = LabelSelector::default();
        assert!(selector.constraints().is_empty());
        assert!(selector.matches(&labels(&[("app", "web")])));
    }
}
