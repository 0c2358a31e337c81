// Main

use std::sync::Arc;

use simple_rtmp::{
    log::{LogConfig, Logger},
    server::{
        run_server, DefaultServerHandler, RtmpServerConfiguration, RtmpServerContext,
        SnowflakeGenerator, SERVER_LOG_PREFIX,
    },
};

/// Main function
#[tokio::main]
async fn main() {
    // Load .env
    let _ = dotenvy::dotenv();

    // Initialize logger

    let log_config = match LogConfig::load_from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid log configuration: {}", e);
            std::process::exit(1);
        }
    };

    let logger = Logger::new(log_config);

    // Print version

    const VERSION: &str = env!("CARGO_PKG_VERSION");

    logger.log_info(&format!("RTMP Server (Rust Implementation) ({VERSION})"));

    // Load configuration

    let server_config = match RtmpServerConfiguration::load_from_env(&logger) {
        Ok(c) => Arc::new(c),
        Err(_) => {
            std::process::exit(1);
        }
    };

    let id_source = match SnowflakeGenerator::new(server_config.server_id) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            logger.log_error(&format!("Could not create the ID generator: {}", e));
            std::process::exit(1);
        }
    };

    let server_context =
        RtmpServerContext::new(server_config, id_source, Arc::new(DefaultServerHandler));

    // Run server

    if let Err(e) = run_server(
        Arc::new(logger.make_child_logger(SERVER_LOG_PREFIX)),
        server_context,
    )
    .await
    {
        logger.log_error(&format!("Server stopped: {}", e));
        std::process::exit(1);
    }
}
