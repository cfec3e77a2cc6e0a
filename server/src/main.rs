use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::constants::TICK_RATE;
use server::network::{Server, ServerMessage};

/// Main-method of the application.
/// Parses command-line arguments, starts the server and wires Ctrl+C to a clean shutdown.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::parse();
    info!(
        "Starting galaxy server on {} at {}Hz (max {} captains)",
        config.bind_address(),
        TICK_RATE,
        config.max_clients
    );

    let mut server = Server::new(config).await?;

    // Ctrl+C saves the world before exiting
    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            if handle.send(ServerMessage::Shutdown).await.is_err() {
                error!("Server loop already stopped");
            }
        }
    });

    server.run().await?;
    Ok(())
}
