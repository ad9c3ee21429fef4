mod enrichment;
mod gate;
mod llm;
mod observability;
mod search;
mod server;

pub use enrichment::*;
pub use gate::*;
pub use llm::*;
pub use observability::*;
pub use search::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Environment variable holding the admin bearer token.
    /// If the env var is unset, `/admin/*` is open.
    #[serde(default = "d_admin_token_env")]
    pub token_env: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            token_env: d_admin_token_env(),
        }
    }
}

fn d_admin_token_env() -> String {
    "PS_ADMIN_TOKEN".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Environment overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Config {
    /// Apply the process environment on top of the file values.
    pub fn apply_env_overrides(&mut self) -> Vec<ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.  Unparseable values are
    /// skipped and reported as warnings.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Vec<ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut issues = Vec::new();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut number = |key: &str, slot: &mut u64| {
            if let Some(raw) = get(key) {
                match raw.trim().parse::<u64>() {
                    Ok(v) => *slot = v,
                    Err(_) => issues.push(ConfigError::warning(key, format!("not a number: {raw:?}"))),
                }
            }
        };
        number("SEARCH_TTL_MS", &mut self.search.ttl_ms);
        number("ENRICHMENT_TIMEOUT_MS", &mut self.search.enrichment_timeout_ms);
        number("DECISION_TIMEOUT_MS", &mut self.gate.decision_timeout_ms);
        number("ENRICHMENT_MOCK_DELAY_MS", &mut self.enrichment.mock_delay_ms);

        if let Some(raw) = get("LLM_USE_MOCK") {
            self.llm.use_mock = parse_flag(&raw);
        }
        if let Some(raw) = get("ENRICHMENT_USE_MOCK") {
            self.enrichment.use_mock = parse_flag(&raw);
        }
        if let Some(raw) = get("ENRICHMENT_BASE_URL") {
            self.enrichment.base_url = Some(raw);
        }
        if let Some(raw) = get("TOOL_GATE_MODE") {
            match GateMode::parse(&raw) {
                Some(mode) => self.gate.mode = mode,
                None => issues.push(ConfigError::warning("TOOL_GATE_MODE", format!("unknown mode {raw:?}"))),
            }
        }
        if let Some(raw) = get("LLM_PROVIDER") {
            match LlmProviderKind::parse(&raw) {
                Some(kind) => self.llm.provider = kind,
                None => issues.push(ConfigError::warning("LLM_PROVIDER", format!("unknown provider {raw:?}"))),
            }
        }
        if let Some(raw) = get("LLM_MODEL") {
            self.llm.model = Some(raw);
        }
        if let Some(raw) = get("LLM_API_BASE") {
            self.llm.base_url = raw;
        }
        if let Some(raw) = get("CODEX_BIN") {
            self.llm.codex_bin = raw;
        }
        if let Some(raw) = get("PORT") {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => issues.push(ConfigError::warning("PORT", format!("not a port: {raw:?}"))),
            }
        }

        issues
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.max_concurrent_requests == 0 {
            errors.push(ConfigError::error(
                "server.max_concurrent_requests",
                "must be greater than 0",
            ));
        }

        for (field, value) in [
            ("search.ttl_ms", self.search.ttl_ms),
            ("search.enrichment_timeout_ms", self.search.enrichment_timeout_ms),
            ("search.sweep_interval_ms", self.search.sweep_interval_ms),
            ("gate.decision_timeout_ms", self.gate.decision_timeout_ms),
            ("llm.timeout_ms", self.llm.timeout_ms),
        ] {
            if value == 0 {
                errors.push(ConfigError::error(field, "must be greater than 0"));
            }
        }

        if self.search.enrichment_timeout_ms >= self.search.ttl_ms {
            errors.push(ConfigError::warning(
                "search.enrichment_timeout_ms",
                "timeout is not shorter than the record TTL; slow lookups will surface as expired",
            ));
        }

        if self.llm.chunk_size == 0 {
            errors.push(ConfigError::error("llm.chunk_size", "must be greater than 0"));
        }

        if self.llm.effective_provider() == LlmProviderKind::OpenaiCompat
            && self.llm.base_url.is_empty()
        {
            errors.push(ConfigError::error("llm.base_url", "base_url must not be empty"));
        }

        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn overrides_apply_on_top_of_file_values() {
        let mut config = Config::default();
        let issues = config.apply_overrides(lookup(&[
            ("SEARCH_TTL_MS", "1500"),
            ("ENRICHMENT_TIMEOUT_MS", "50"),
            ("LLM_USE_MOCK", "1"),
            ("ENRICHMENT_USE_MOCK", "true"),
            ("TOOL_GATE_MODE", "simple"),
            ("PORT", "4100"),
        ]));
        assert!(issues.is_empty());
        assert_eq!(config.search.ttl_ms, 1500);
        assert_eq!(config.search.enrichment_timeout_ms, 50);
        assert!(config.llm.use_mock);
        assert_eq!(config.enrichment.effective_source(), EnrichmentSource::Mock);
        assert_eq!(config.gate.mode, GateMode::Heuristic);
        assert_eq!(config.server.port, 4100);
    }

    #[test]
    fn bad_override_values_are_reported_and_ignored() {
        let mut config = Config::default();
        let issues = config.apply_overrides(lookup(&[
            ("SEARCH_TTL_MS", "soon"),
            ("LLM_PROVIDER", "abacus"),
        ]));
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.severity == ConfigSeverity::Warning));
        assert_eq!(config.search.ttl_ms, SearchConfig::default().ttl_ms);
        assert_eq!(config.llm.provider, LlmProviderKind::Codex);
    }

    #[test]
    fn blank_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[("LLM_MODEL", "  ")]));
        assert!(config.llm.model.is_none());
    }

    #[test]
    fn zero_ttl_is_an_error() {
        let mut config = Config::default();
        config.search.ttl_ms = 0;
        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "search.ttl_ms" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn default_config_validates_clean() {
        assert!(Config::default().validate().is_empty());
    }
}
