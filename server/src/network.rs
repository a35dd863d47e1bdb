//! Server network layer: UDP transport, sessions and the tick loop.
//!
//! One task receives datagrams, one checks timeouts, and every connection
//! gets a writer task draining its outbox, so all packets bound for a client
//! leave in the order they were queued. Each tick the newest buffered
//! intents of every client are applied to the world concurrently.

use crate::broadcast::Outbox;
use crate::client_manager::{ClientManager, Intent, TickBatch};
use crate::config::ServerConfig;
use crate::world::GameWorld;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{CharacterId, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};

/// Large enough for a full map snapshot.
pub const MAX_DATAGRAM: usize = 8192;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { character_id: CharacterId },
}

pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    world: Arc<GameWorld>,
    config: ServerConfig,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(
        config: ServerConfig,
        world: Arc<GameWorld>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.client_timeout,
            ))),
            world,
            config,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = clients.write().await.check_timeouts();
                for session in timed_out {
                    let message = ServerMessage::ClientTimeout {
                        character_id: session.character_id,
                    };
                    if let Err(e) = server_tx.send(message) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    /// Spawns the writer that owns all sends to one address.
    fn spawn_connection_writer(&self, addr: SocketAddr) -> Outbox {
        let socket = Arc::clone(&self.socket);
        let (outbox, mut queue) = mpsc::unbounded_channel::<Packet>();

        tokio::spawn(async move {
            while let Some(packet) = queue.recv().await {
                if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
            debug!("Writer for {} closed", addr);
        });

        outbox
    }

    async fn send_direct(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = send_packet_impl(&self.socket, packet, addr).await {
            error!("Failed to send packet to {}: {}", addr, e);
        }
    }

    async fn reply(&self, character_id: CharacterId, packet: Packet) {
        let outbox = self.clients.read().await.outbox(character_id);
        match outbox {
            Some(outbox) => {
                if outbox.send(packet).is_err() {
                    warn!("Outbox for character {} is closed", character_id);
                }
            }
            None => debug!("No session for character {}", character_id),
        }
    }

    async fn handle_connect(
        &self,
        addr: SocketAddr,
        client_version: u32,
        character_id: CharacterId,
        name: String,
    ) {
        info!(
            "Character {} connecting from {} (version: {})",
            character_id, addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            let reason = format!(
                "Protocol version mismatch: server {}, client {}",
                PROTOCOL_VERSION, client_version
            );
            self.send_direct(&Packet::Disconnected { reason }, addr).await;
            return;
        }

        // A new connect from a known address ends whatever it controlled.
        let previous = self.clients.read().await.find_by_addr(addr);
        if let Some(previous) = previous.filter(|id| *id != character_id) {
            self.drop_session(previous, None).await;
        }

        let outbox = self.spawn_connection_writer(addr);
        let added = self
            .clients
            .write()
            .await
            .add_session(character_id, addr, outbox.clone());

        let replaced = match added {
            Some(replaced) => replaced,
            None => {
                let reason = "Server full".to_string();
                self.send_direct(&Packet::Disconnected { reason }, addr).await;
                return;
            }
        };

        if let Some(old) = replaced.filter(|old| old.addr != addr) {
            info!(
                "Character {} reconnected, closing session at {}",
                character_id, old.addr
            );
            let reason = "Connected from another location".to_string();
            let _ = old.outbox.send(Packet::Disconnected { reason });
        }

        match self.world.connect_character(character_id, &name, outbox.clone()) {
            Ok((character, snapshot)) => {
                let _ = outbox.send(Packet::Connected { character });
                let _ = outbox.send(Packet::MapJoined { snapshot });
            }
            Err(error) => {
                warn!("Connect of character {} failed: {}", character_id, error);
                self.clients.write().await.remove_session(character_id);
                let _ = outbox.send(Packet::CommandFailed {
                    sequence: None,
                    error,
                });
            }
        }
    }

    async fn drop_session(&self, character_id: CharacterId, reason: Option<String>) {
        let session = self.clients.write().await.remove_session(character_id);
        if let (Some(session), Some(reason)) = (session, reason) {
            let _ = session.outbox.send(Packet::Disconnected { reason });
        }
        if let Err(e) = self.world.disconnect_character(character_id) {
            debug!("Disconnect of character {}: {}", character_id, e);
        }
    }

    /// Processes incoming packets
    async fn handle_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect {
            client_version,
            character_id,
            name,
        } = packet
        {
            self.handle_connect(addr, client_version, character_id, name)
                .await;
            return;
        }

        let Some(character_id) = self.clients.read().await.find_by_addr(addr) else {
            debug!("Ignoring packet from unknown address {}", addr);
            return;
        };

        if let Some(intent) = Intent::from_packet(&packet) {
            self.clients
                .write()
                .await
                .offer_intent(character_id, intent);
            return;
        }

        self.clients.write().await.touch(character_id);

        match packet {
            Packet::ChangeMap { target_map } => {
                let Some(outbox) = self.clients.read().await.outbox(character_id) else {
                    return;
                };
                let reply = match self.world.change_map(character_id, target_map, outbox) {
                    Ok((position, snapshot)) => Packet::MapChanged { position, snapshot },
                    Err(error) => Packet::CommandFailed {
                        sequence: None,
                        error,
                    },
                };
                self.reply(character_id, reply).await;
            }

            Packet::JoinMap { map_id } => {
                let Some(outbox) = self.clients.read().await.outbox(character_id) else {
                    return;
                };
                let reply = match self.world.join_map(character_id, map_id, outbox) {
                    Ok(snapshot) => Packet::MapJoined { snapshot },
                    Err(error) => Packet::CommandFailed {
                        sequence: None,
                        error,
                    },
                };
                self.reply(character_id, reply).await;
            }

            Packet::LeaveMap { map_id } => {
                if let Err(error) = self.world.leave_map(character_id, map_id) {
                    let reply = Packet::CommandFailed {
                        sequence: None,
                        error,
                    };
                    self.reply(character_id, reply).await;
                }
            }

            Packet::Heartbeat => {}

            Packet::Disconnect => {
                self.drop_session(character_id, None).await;
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Applies one tick worth of intents. Clients run concurrently; each
    /// client's own intents run in sequence order.
    async fn process_tick(&self) {
        let batches = self.clients.write().await.take_tick_batches();
        if batches.is_empty() {
            return;
        }

        let mut tasks = JoinSet::new();
        for TickBatch {
            character_id,
            outbox,
            intents,
        } in batches
        {
            let world = Arc::clone(&self.world);
            tasks.spawn(async move {
                for intent in intents {
                    let reply = apply_intent(&world, character_id, intent);
                    if outbox.send(reply).is_err() {
                        break;
                    }
                }
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Intent task failed: {}", e);
            }
        }
    }

    fn save_snapshot(&self) {
        if let Some(path) = &self.config.state_file {
            if let Err(e) = self.world.snapshot().save(path) {
                error!("Failed to save world snapshot: {}", e);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let autosave_every = self
            .config
            .autosave_interval
            .filter(|_| self.config.state_file.is_some());
        let mut autosave = interval(autosave_every.unwrap_or(Duration::from_secs(3600)));
        autosave.tick().await;

        let mut tick: u64 = 0;
        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        }
                        Some(ServerMessage::ClientTimeout { character_id }) => {
                            info!("Character {} timed out", character_id);
                            if let Err(e) = self.world.disconnect_character(character_id) {
                                debug!("Timeout cleanup of character {}: {}", character_id, e);
                            }
                        }
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                }

                _ = tick_interval.tick() => {
                    self.process_tick().await;
                    tick += 1;

                    if tick % 300 == 0 {
                        let sessions = self.clients.read().await.len();
                        if sessions > 0 {
                            debug!("Tick {}: {} sessions", tick, sessions);
                        }
                    }
                }

                _ = autosave.tick(), if autosave_every.is_some() => {
                    self.save_snapshot();
                }
            }
        }

        Ok(())
    }
}

async fn send_packet_impl(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

/// Runs one intent against the world and builds the reply for its sender.
pub fn apply_intent(world: &GameWorld, character_id: CharacterId, intent: Intent) -> Packet {
    let sequence = intent.sequence();
    let result = match intent {
        Intent::Move { x, y, .. } => world
            .move_character(character_id, x, y)
            .map(|position| Packet::MoveConfirmed { sequence, position }),
        Intent::Attack {
            monster_id,
            skill_id,
            ..
        } => world
            .attack(character_id, monster_id, skill_id)
            .map(|outcome| Packet::AttackResolved { sequence, outcome }),
        Intent::Heal { skill_id, .. } => world
            .heal(character_id, skill_id)
            .map(|character| Packet::Healed {
                sequence,
                character,
            }),
    };

    result.unwrap_or_else(|error| {
        debug!(
            "Intent {} of character {} failed: {}",
            sequence, character_id, error
        );
        Packet::CommandFailed {
            sequence: Some(sequence),
            error,
        }
    })
}
