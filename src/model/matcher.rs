//! Label matchers
//!
//! A [`Matcher`] is plain data so it can travel unchanged to every replica.
//! Compiling it (see [`Matcher::compile`]) is the normalisation step: it
//! rejects empty label names and regexes that do not parse.

use super::labels::{Labels, METRIC_NAME};
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    Equal,
    NotEqual,
    RegexMatch,
    RegexNoMatch,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Equal => "=",
            MatchType::NotEqual => "!=",
            MatchType::RegexMatch => "=~",
            MatchType::RegexNoMatch => "!~",
        }
    }
}

/// A label matcher: `name <op> value`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Matcher {
    pub match_type: MatchType,
    pub name: String,
    pub value: String,
}

impl Matcher {
    pub fn new(match_type: MatchType, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            match_type,
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(MatchType::Equal, name, value)
    }

    pub fn regex(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(MatchType::RegexMatch, name, value)
    }

    /// Validate and compile into an evaluable matcher.
    pub fn compile(&self) -> Result<CompiledMatcher> {
        if self.name.is_empty() {
            return Err(Error::InvalidRequest(format!(
                "matcher {} has an empty label name",
                self
            )));
        }

        let regex = match self.match_type {
            MatchType::Equal | MatchType::NotEqual => None,
            MatchType::RegexMatch | MatchType::RegexNoMatch => {
                let anchored = format!("^(?:{})$", self.value);
                let re = Regex::new(&anchored).map_err(|e| {
                    Error::InvalidRequest(format!("invalid regex in matcher {}: {}", self, e))
                })?;
                Some(re)
            }
        };

        Ok(CompiledMatcher {
            matcher: self.clone(),
            regex,
        })
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.match_type.as_str(), self.value)
    }
}

impl FromStr for Matcher {
    type Err = Error;

    /// Parses `name=value`, `name!=value`, `name=~re` and `name!~re`.
    /// The value may be wrapped in double quotes.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (pos, match_type, op_len) = ["!=", "=~", "!~", "="]
            .iter()
            .filter_map(|op| s.find(op).map(|pos| (pos, *op)))
            .min_by_key(|(pos, op)| (*pos, std::cmp::Reverse(op.len())))
            .map(|(pos, op)| {
                let match_type = match op {
                    "!=" => MatchType::NotEqual,
                    "=~" => MatchType::RegexMatch,
                    "!~" => MatchType::RegexNoMatch,
                    _ => MatchType::Equal,
                };
                (pos, match_type, op.len())
            })
            .ok_or_else(|| Error::InvalidRequest(format!("no operator in matcher '{}'", s)))?;

        let name = s[..pos].trim();
        let raw_value = s[pos + op_len..].trim();
        let value = raw_value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(raw_value);

        let matcher = Matcher::new(match_type, name, value);
        matcher.compile()?;
        Ok(matcher)
    }
}

/// A validated matcher ready for evaluation
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    matcher: Matcher,
    regex: Option<Regex>,
}

impl CompiledMatcher {
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Evaluate against a label value. A missing label matches as "".
    pub fn matches(&self, value: &str) -> bool {
        match (&self.matcher.match_type, &self.regex) {
            (MatchType::Equal, _) => value == self.matcher.value,
            (MatchType::NotEqual, _) => value != self.matcher.value,
            (MatchType::RegexMatch, Some(re)) => re.is_match(value),
            (MatchType::RegexNoMatch, Some(re)) => !re.is_match(value),
            _ => false,
        }
    }

    pub fn matches_labels(&self, labels: &Labels) -> bool {
        self.matches(labels.get(&self.matcher.name).unwrap_or(""))
    }
}

/// Find the matcher on the metric name label, if any.
pub fn metric_name_matcher(matchers: &[Matcher]) -> Option<&Matcher> {
    matchers.iter().find(|m| m.name == METRIC_NAME)
}
