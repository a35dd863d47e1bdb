use clap::Parser;
use client::game::ClientGameState;
use client::input::{Command, InputManager};
use client::network::spawn_background;
use client::rendering::Renderer;
use log::{error, info};
use macroquad::prelude::{next_frame, Conf};
use shared::content::Catalog;
use shared::{now_millis, Balance, Packet, Vec2, PROTOCOL_VERSION};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Character to play, as issued by the account service
    #[arg(short = 'c', long, default_value = "1")]
    character_id: u32,

    /// Display name used when the character is first created
    #[arg(short = 'n', long, default_value = "Adventurer")]
    name: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Map Sync".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!("Controls: click to move or attack, 1 Power Strike, 2 Mend, M change map");

    let network = match spawn_background(&args.server, args.fake_ping) {
        Ok(network) => network,
        Err(e) => {
            error!("Failed to start networking: {}", e);
            return;
        }
    };
    network.send(Packet::Connect {
        client_version: PROTOCOL_VERSION,
        character_id: args.character_id,
        name: args.name.clone(),
    });

    let mut game = ClientGameState::new(Catalog::demo(), Balance::default());
    let mut input = InputManager::new();
    let renderer = Renderer::new(args.width, args.height);

    'frames: loop {
        let now = now_millis();
        for packet in network.poll() {
            game.handle_packet(packet, now);
        }

        let camera = match game.map() {
            Some(map) => renderer.camera(game.own_position(), map.width, map.height),
            None => Vec2::ZERO,
        };

        for command in input.update(camera) {
            let intent = match command {
                Command::Click(point) => game.click(point),
                Command::Strike => game.strike(),
                Command::Mend => game.mend(),
                Command::NextMap => game.next_map(),
                Command::Quit => break 'frames,
            };
            if let Some(packet) = intent {
                network.send(packet);
            }
        }

        renderer.render(&game, camera, now);
        next_frame().await;
    }

    network.send(Packet::Disconnect);
    // Give the network thread a moment to flush the disconnect.
    std::thread::sleep(std::time::Duration::from_millis(50));
}
