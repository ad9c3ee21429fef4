use ps_domain::config::{Config, ConfigError, ConfigSeverity};

/// Validate the resolved config, printing any issues (including skipped
/// environment overrides).
///
/// Returns `false` when at least one error was found.
pub fn validate(config: &Config, config_path: &str, overrides: &[ConfigError]) -> bool {
    let mut issues: Vec<&ConfigError> = overrides.iter().collect();
    let validation = config.validate();
    issues.extend(validation.iter());

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("serializing config: {e}"))?;
    print!("{output}");
    Ok(())
}
