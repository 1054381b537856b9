//! Configuration parsing and management
//!
//! The configuration document is TOML by default. Files with a `.yaml` or
//! `.yml` extension are read as YAML with the same schema.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Proxy settings
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Allow rules, in evaluation order
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Proxy-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Address to bind the proxy server
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Upstream URL that allowed requests are forwarded to
    #[serde(default = "default_target_url")]
    pub target_url: String,

    /// Reject request bodies larger than this many bytes.
    /// Unset means bodies are buffered in full.
    #[serde(default)]
    pub max_body_bytes: Option<usize>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            target_url: default_target_url(),
            max_body_bytes: None,
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_target_url() -> String {
    "https://httpbin.org/".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,

    /// Whether to log allowed requests
    pub log_allowed_requests: bool,

    /// Whether to log blocked requests
    pub log_blocked_requests: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_allowed_requests: true,
            log_blocked_requests: true,
        }
    }
}

/// `log_requests` accepts either a bool or `{ allowed, blocked }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum LogRequestsValue {
    Bool(bool),
    Table {
        #[serde(default = "default_true")]
        allowed: bool,
        #[serde(default = "default_true")]
        blocked: bool,
    },
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize)]
struct LoggingConfigRaw {
    #[serde(default = "default_log_level")]
    level: String,
    #[serde(default)]
    log_requests: Option<LogRequestsValue>,
}

impl<'de> Deserialize<'de> for LoggingConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = LoggingConfigRaw::deserialize(deserializer)?;
        let (log_allowed_requests, log_blocked_requests) = match raw.log_requests {
            None => (true, true),
            Some(LogRequestsValue::Bool(b)) => (b, b),
            Some(LogRequestsValue::Table { allowed, blocked }) => (allowed, blocked),
        };
        Ok(LoggingConfig {
            level: raw.level,
            log_allowed_requests,
            log_blocked_requests,
        })
    }
}

/// A single allow rule. Every field is a regular expression.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rule {
    /// Searched for in the request's path and query; selects the rule
    pub uri: String,

    /// Must match the whole request method
    #[serde(default = "match_anything")]
    pub method: String,

    /// Searched for in the request body, read as text
    #[serde(default = "match_anything")]
    pub body: String,

    /// Constraint applied to every request header
    #[serde(default)]
    pub headers: HeaderRule,
}

/// Name and value patterns that every request header must satisfy
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeaderRule {
    #[serde(default = "match_anything")]
    pub key: String,

    #[serde(default = "match_anything")]
    pub value: String,
}

impl Default for HeaderRule {
    fn default() -> Self {
        Self {
            key: match_anything(),
            value: match_anything(),
        }
    }
}

fn match_anything() -> String {
    ".*".to_string()
}

impl Rule {
    /// A rule for `uri` with every other pattern left open
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            method: match_anything(),
            body: match_anything(),
            headers: HeaderRule::default(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_headers(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers = HeaderRule {
            key: key.into(),
            value: value.into(),
        };
        self
    }
}

impl Config {
    /// Load configuration from a TOML or YAML file, chosen by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::parse_yaml(&content),
            _ => Self::parse(&content),
        }
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::config(format!("Invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validate_target_url(&self.proxy.target_url)?;

        if self.proxy.max_body_bytes == Some(0) {
            return Err(Error::config("`max_body_bytes` must be greater than zero"));
        }

        for (i, rule) in self.rules.iter().enumerate() {
            if rule.uri.is_empty() {
                return Err(Error::config(format!(
                    "Rule #{}: `uri` must not be empty",
                    i + 1
                )));
            }
        }

        Ok(())
    }

    /// Create a minimal configuration with just the essentials
    pub fn minimal(bind_address: String, target_url: String) -> Self {
        Self {
            proxy: ProxyConfig {
                bind_address,
                target_url,
                max_body_bytes: None,
            },
            logging: LoggingConfig::default(),
            rules: Vec::new(),
        }
    }
}

fn validate_target_url(target: &str) -> Result<()> {
    let uri: hyper::Uri = target
        .parse()
        .map_err(|e| Error::config(format!("Invalid target_url '{}': {}", target, e)))?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        _ => {
            return Err(Error::config(format!(
                "Invalid target_url '{}': scheme must be http or https",
                target
            )))
        }
    }

    if uri.host().is_none() {
        return Err(Error::config(format!(
            "Invalid target_url '{}': missing host",
            target
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_report;

    #[test]
    fn test_default_values() {
        let t = test_report!("Default config values");
        let config = Config::parse("").unwrap();

        t.assert_eq(
            "bind_address",
            &config.proxy.bind_address.as_str(),
            &"127.0.0.1:8080",
        );
        t.assert_eq(
            "target_url",
            &config.proxy.target_url.as_str(),
            &"https://httpbin.org/",
        );
        t.assert_eq("max_body_bytes", &config.proxy.max_body_bytes, &None);
        t.assert_eq("log level", &config.logging.level.as_str(), &"info");
        t.assert_true("log allowed default", config.logging.log_allowed_requests);
        t.assert_true("log blocked default", config.logging.log_blocked_requests);
        t.assert_true("no rules", config.rules.is_empty());
    }

    #[test]
    fn test_parse_toml_rules() {
        let t = test_report!("Parse TOML config with rules");
        let toml = r#"
[proxy]
bind_address = "0.0.0.0:9000"
target_url = "http://backend.internal:8081/v1"
max_body_bytes = 4096

[[rules]]
uri = "^/api/.*"
method = "^GET$"
body = "^$"
headers = { key = ".*", value = ".*" }

[[rules]]
uri = "^/upload"
method = "POST|PUT"
"#;

        let config = Config::parse(toml).unwrap();
        t.assert_eq(
            "target_url",
            &config.proxy.target_url.as_str(),
            &"http://backend.internal:8081/v1",
        );
        t.assert_eq("max_body_bytes", &config.proxy.max_body_bytes, &Some(4096));
        t.assert_eq("rule count", &config.rules.len(), &2usize);
        t.assert_eq(
            "rule[0]",
            &config.rules[0],
            &Rule::new("^/api/.*")
                .with_method("^GET$")
                .with_body("^$")
                .with_headers(".*", ".*"),
        );
        t.assert_eq(
            "rule[1] omitted fields default to .*",
            &config.rules[1],
            &Rule::new("^/upload").with_method("POST|PUT"),
        );
    }

    #[test]
    fn test_parse_yaml_rules() {
        let t = test_report!("Parse YAML config with rules");
        let yaml = r#"
proxy:
  target_url: "https://httpbin.org/"
logging:
  level: debug
  log_requests:
    allowed: false
rules:
  - uri: "^/anything"
    method: "^(GET|POST)$"
    body: ".*"
    headers:
      key: "^[a-z-]+$"
      value: ".*"
"#;

        let config = Config::parse_yaml(yaml).unwrap();
        t.assert_eq("level", &config.logging.level.as_str(), &"debug");
        t.assert_true("allowed disabled", !config.logging.log_allowed_requests);
        t.assert_true("blocked default", config.logging.log_blocked_requests);
        t.assert_eq("rule count", &config.rules.len(), &1usize);
        t.assert_eq(
            "header key",
            &config.rules[0].headers.key.as_str(),
            &"^[a-z-]+$",
        );
    }

    #[test]
    fn test_from_file_picks_format_by_extension() {
        let t = test_report!("from_file parses .yaml as YAML and others as TOML");
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("rules.yaml");
        std::fs::write(&yaml_path, "rules:\n  - uri: \"^/a\"\n").unwrap();
        let yaml = Config::from_file(&yaml_path).unwrap();
        t.assert_eq("yaml rule uri", &yaml.rules[0].uri.as_str(), &"^/a");

        let toml_path = dir.path().join("rulegate.toml");
        std::fs::write(&toml_path, "[[rules]]\nuri = \"^/b\"\n").unwrap();
        let toml = Config::from_file(&toml_path).unwrap();
        t.assert_eq("toml rule uri", &toml.rules[0].uri.as_str(), &"^/b");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let t = test_report!("Missing config file reported");
        let err = Config::from_file("/nonexistent/rulegate.toml")
            .unwrap_err()
            .to_string();
        t.assert_contains("mentions read failure", &err, "Failed to read config file");
    }

    #[test]
    fn test_logging_config_bool_false() {
        let t = test_report!("log_requests = false disables both");
        let toml = r#"
[logging]
log_requests = false
"#;
        let config = Config::parse(toml).unwrap();
        t.assert_true("allowed disabled", !config.logging.log_allowed_requests);
        t.assert_true("blocked disabled", !config.logging.log_blocked_requests);
    }

    #[test]
    fn test_logging_config_table_partial_defaults() {
        let t = test_report!("log_requests table with partial keys defaults missing");
        let toml = r#"
[logging]
log_requests = { blocked = false }
"#;
        let config = Config::parse(toml).unwrap();
        t.assert_true("allowed defaults to true", config.logging.log_allowed_requests);
        t.assert_true("blocked set to false", !config.logging.log_blocked_requests);
    }

    #[test]
    fn test_rule_requires_uri() {
        let t = test_report!("Rule without uri rejected");
        let toml = r#"
[[rules]]
method = "GET"
"#;
        t.assert_true("parse error", Config::parse(toml).is_err());
    }

    #[test]
    fn test_empty_uri_rejected() {
        let t = test_report!("Rule with empty uri rejected");
        let toml = r#"
[[rules]]
uri = "^/ok"

[[rules]]
uri = ""
"#;
        let err = Config::parse(toml).unwrap_err().to_string();
        t.assert_contains("names the rule", &err, "Rule #2");
    }

    #[test]
    fn test_invalid_target_url() {
        let t = test_report!("Non-http target_url rejected");
        for target in ["ftp://files.example.com/", "/relative/path", "not a url"] {
            let toml = format!("[proxy]\ntarget_url = \"{}\"\n", target);
            t.assert_true(&format!("{} rejected", target), Config::parse(&toml).is_err());
        }
    }

    #[test]
    fn test_zero_body_limit_rejected() {
        let t = test_report!("max_body_bytes = 0 rejected");
        let err = Config::parse("[proxy]\nmax_body_bytes = 0\n")
            .unwrap_err()
            .to_string();
        t.assert_contains("mentions field", &err, "max_body_bytes");
    }

    #[test]
    fn test_invalid_toml() {
        let t = test_report!("Invalid TOML rejected");
        t.assert_true(
            "parse error",
            Config::parse("this is not valid toml [[[").is_err(),
        );
    }
}
