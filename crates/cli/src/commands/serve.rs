//! `ragstream serve`: start the HTTP gateway.

use std::path::Path;

use ragstream_config::{AppConfig, ConfigError};

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
    host_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let config = with_overrides(config, port_override, host_override)
        .map_err(|e| format!("Invalid command-line override: {e}"))?;

    println!("ragstream gateway");
    println!("   Listening: {}", config.bind_addr());
    println!("   Backend:   {}", config.backend.endpoint);
    println!("   Model:     {}", config.backend.model);

    ragstream_gateway::start(config).await?;

    Ok(())
}

/// Apply `--port`/`--host` and validate the result again.
fn with_overrides(
    mut config: AppConfig,
    port: Option<u16>,
    host: Option<String>,
) -> Result<AppConfig, ConfigError> {
    if let Some(port) = port {
        config.gateway.port = port;
    }
    if let Some(host) = host {
        config.gateway.host = host;
    }
    config.validate()?;
    Ok(config)
}
