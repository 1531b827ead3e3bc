//! `toolloop config`: show configuration.

use toolloop_config::AppConfig;

pub fn show(default: bool) -> Result<(), Box<dyn std::error::Error>> {
    if default {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    println!("{}", render(&config)?);
    Ok(())
}

/// The effective configuration as TOML, secrets masked.
fn render(config: &AppConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&config.redacted())
}
