//! `ragstream config`: print configuration.

use std::path::Path;

use ragstream_config::AppConfig;

pub fn run(config_path: Option<&Path>, default: bool) -> Result<(), Box<dyn std::error::Error>> {
    if default {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let mut config =
        AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    if config.backend.api_key != "EMPTY" {
        config.backend.api_key = "[REDACTED]".into();
    }
    print!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}
