//! Rule compilation and rule selection

use regex::Regex;

use crate::config::Rule;
use crate::error::{Error, Result};

/// A rule with its patterns compiled once, at load time
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Position in the rule set, zero-based
    index: usize,
    /// Source patterns, kept for diagnostics
    source: Rule,
    uri: Regex,
    /// Anchored so the whole method must match
    method: Regex,
    body: Regex,
    header_key: Regex,
    header_value: Regex,
}

impl CompiledRule {
    /// Compile a rule from configuration
    pub fn compile(index: usize, rule: &Rule) -> Result<Self> {
        let compile = |field: &str, pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                Error::pattern(format!(
                    "Rule #{}: invalid {} pattern {:?}: {}",
                    index + 1,
                    field,
                    pattern,
                    e
                ))
            })
        };

        // Validate the pattern on its own before wrapping it, so a stray `)`
        // cannot close the anchoring group.
        compile("method", rule.method.as_str())?;
        let method = compile("method", format!("^(?:{})$", rule.method).as_str())?;

        Ok(Self {
            index,
            source: rule.clone(),
            uri: compile("uri", rule.uri.as_str())?,
            method,
            body: compile("body", rule.body.as_str())?,
            header_key: compile("header key", rule.headers.key.as_str())?,
            header_value: compile("header value", rule.headers.value.as_str())?,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The rule as configured
    pub fn source(&self) -> &Rule {
        &self.source
    }

    /// Whether this rule governs the given path and query
    pub fn matches_uri(&self, uri: &str) -> bool {
        self.uri.is_match(uri)
    }

    pub fn matches_method(&self, method: &str) -> bool {
        self.method.is_match(method)
    }

    pub fn matches_body(&self, body: &str) -> bool {
        self.body.is_match(body)
    }

    pub fn matches_header_key(&self, name: &str) -> bool {
        self.header_key.is_match(name)
    }

    pub fn matches_header_value(&self, value: &str) -> bool {
        self.header_value.is_match(value)
    }
}

/// Ordered, immutable collection of compiled rules
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile every rule, failing on the first invalid pattern
    pub fn new(rules: &[Rule]) -> Result<Self> {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(i, rule)| CompiledRule::compile(i, rule))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// A rule set with no rules (blocks everything)
    pub fn empty() -> Self {
        Self::default()
    }

    /// First rule whose uri pattern matches, in configuration order
    pub fn select(&self, uri: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|rule| rule.matches_uri(uri))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
