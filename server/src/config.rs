//! Command line configuration.

use clap::Parser;
use shared::Balance;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Intent processing rate (ticks per second)
    #[arg(short, long, default_value = "30")]
    pub tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "64")]
    pub max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    pub client_timeout: u64,

    /// Maximum attack distance between attacker and target centers
    #[arg(long, default_value_t = shared::ATTACK_RADIUS)]
    pub attack_radius: f32,

    /// Fractional damage variance, 0.1 means +/-10%
    #[arg(long, default_value_t = shared::DAMAGE_VARIANCE)]
    pub damage_variance: f32,

    /// Farthest distance a single move request may travel
    #[arg(long, default_value_t = shared::MAX_MOVE_DISTANCE)]
    pub max_move_distance: f32,

    /// Experience required per level
    #[arg(long, default_value_t = shared::EXPERIENCE_PER_LEVEL)]
    pub experience_per_level: u32,

    /// Milliseconds a dead character waits before respawning
    #[arg(long, default_value_t = shared::CHARACTER_RESPAWN_MS)]
    pub character_respawn_ms: u64,

    /// World snapshot file, loaded at startup and written on shutdown
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Seconds between automatic snapshots, 0 disables them
    #[arg(long, default_value = "60")]
    pub autosave_interval: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick_duration: Duration,
    pub max_clients: usize,
    pub client_timeout: Duration,
    pub state_file: Option<PathBuf>,
    pub autosave_interval: Option<Duration>,
    pub balance: Balance,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tick_duration: Duration::from_millis(33),
            max_clients: 64,
            client_timeout: Duration::from_secs(5),
            state_file: None,
            autosave_interval: None,
            balance: Balance::default(),
        }
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        let defaults = Balance::default();

        Self {
            bind_addr: format!("{}:{}", args.host, args.port),
            tick_duration: Duration::from_secs_f32(1.0 / args.tick_rate.max(1) as f32),
            max_clients: args.max_clients,
            client_timeout: Duration::from_secs(args.client_timeout.max(1)),
            state_file: args.state_file,
            autosave_interval: (args.autosave_interval > 0)
                .then(|| Duration::from_secs(args.autosave_interval)),
            balance: Balance {
                attack_radius: args.attack_radius,
                damage_variance: args.damage_variance.clamp(0.0, 1.0),
                experience_per_level: args.experience_per_level,
                max_move_distance: args.max_move_distance,
                character_respawn_ms: args.character_respawn_ms,
                ..defaults
            },
        }
    }
}
