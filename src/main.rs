use std::sync::Arc;

use rgenstudio::{
    logger::{self, LoggerConfig},
    server, AppConfig, GeminiClient,
};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    let config = AppConfig::from_env();

    logger::init_with_config(LoggerConfig::from_app_config(&config))?;

    if dotenv_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    logger::log_startup_info(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        &config.server.host,
        config.server.port,
    );
    logger::log_config_info(&config);

    if let Err(e) = config.validate() {
        log::error!("❌ {}", e);
        return Err(e.into());
    }

    log::info!("🔄 Creating Gemini client...");
    let client = match GeminiClient::new(config.gemini.clone()) {
        Ok(client) => {
            log::info!("✅ Gemini client ready for model {}", client.model());
            client
        }
        Err(e) => {
            log::error!("❌ Failed to initialize Gemini client: {}", e);
            return Err(e.into());
        }
    };

    server::run(config, Arc::new(client)).await?;
    log::info!("👋 Server stopped");
    Ok(())
}
