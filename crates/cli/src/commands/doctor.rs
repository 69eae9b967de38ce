//! `ragstream doctor`: diagnose configuration and backend health.

use std::path::Path;

use ragstream_config::AppConfig;
use ragstream_core::backend::Backend;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("ragstream doctor");
    println!("================\n");

    let mut issues = 0;

    match config_path {
        Some(path) if path.exists() => println!("  [ok]   Config file: {}", path.display()),
        Some(path) => println!("  [warn] No config file at {}, using defaults", path.display()),
        None => println!("  [ok]   No config file given, using defaults"),
    }

    let config = match AppConfig::load(config_path) {
        Ok(config) => {
            println!("  [ok]   Config valid");
            config
        }
        Err(e) => {
            println!("  [fail] Config invalid: {e}");
            println!("\n  1 issue found.");
            return Ok(());
        }
    };

    println!("         Backend: {}", config.backend.endpoint);
    println!("         Model:   {}", config.backend.model);

    match ragstream_providers::build_from_config(&config) {
        Ok(backend) => match backend.health_check().await {
            Ok(true) => println!("  [ok]   Backend reachable"),
            Ok(false) => {
                println!("  [fail] Backend answered but reported unhealthy");
                issues += 1;
            }
            Err(e) => {
                println!("  [fail] Backend unreachable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  [fail] Backend client could not be built: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
