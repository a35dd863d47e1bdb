use clap::Parser;
use log::{error, info};
use server::config::{Args, ServerConfig};
use server::network::Server;
use server::persistence::WorldSnapshot;
use server::world::GameWorld;
use shared::content::Catalog;
use std::sync::Arc;
use tokio::runtime::Handle;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ServerConfig::from(Args::parse());
    let world = Arc::new(GameWorld::new(
        Catalog::demo(),
        config.balance.clone(),
        Handle::current(),
    ));

    let restored = match &config.state_file {
        Some(path) => WorldSnapshot::load(path)?,
        None => None,
    };
    match restored {
        Some(snapshot) => {
            let revived = world.restore(snapshot);
            info!("World restored, {} entities revived on load", revived);
        }
        None => {
            world.spawn_monsters();
        }
    }

    let state_file = config.state_file.clone();
    let mut server = Server::new(config, Arc::clone(&world)).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    if let Some(path) = state_file {
        world.snapshot().save(&path)?;
    }

    Ok(())
}
