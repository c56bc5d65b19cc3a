use anyhow::Result;

use crate::server::settings::Settings;

/// Start the HTTP server
pub async fn serve() -> Result<()> {
    let settings = Settings::new()?;
    crate::server::run_server(settings).await
}

/// Load the layered configuration and report the first problem, if any
pub fn check_config() -> Result<()> {
    println!("Checking configuration...");
    match Settings::new() {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!(
                "  server:   {}:{}",
                settings.server.host, settings.server.port
            );
            println!("  registry: {}", settings.registry.host_template);
            if let Some(region) = &settings.registry.default_region {
                println!("  region:   {}", region);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}
