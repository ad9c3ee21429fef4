pub mod config;

use clap::{Parser, Subcommand};

use ps_domain::config::{Config, ConfigError};

/// parallel-search: primary answers with parallel knowledge enrichment.
#[derive(Debug, Parser)]
#[command(name = "parallel-search", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults and env overrides) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `PS_CONFIG` (or
/// `config.toml` by default), then apply environment overrides.  Returns
/// the resolved [`Config`], the path that was used, and any override
/// warnings.
pub fn load_config() -> anyhow::Result<(Config, String, Vec<ConfigError>)> {
    let config_path = std::env::var("PS_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let mut config: Config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    let overrides = config.apply_env_overrides();
    Ok((config, config_path, overrides))
}
