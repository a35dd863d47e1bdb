//! UDP transport to the server.
//!
//! `NetworkClient` is the async socket wrapper. The windowed client runs it
//! on a background thread with its own tokio runtime (`spawn_background`) and
//! talks to it through channels, since the render loop owns the main thread.

use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::Packet;
use std::net::SocketAddr;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, timeout};

const MAX_DATAGRAM: usize = 8192;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

pub struct NetworkClient {
    socket: UdpSocket,
    server_addr: SocketAddr,
    fake_ping_ms: u64,
    buffer: Vec<u8>,
}

impl NetworkClient {
    pub async fn bind(
        server_addr: &str,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(NetworkClient {
            socket,
            server_addr,
            fake_ping_ms,
            buffer: vec![0u8; MAX_DATAGRAM],
        })
    }

    pub async fn send(
        &self,
        packet: &Packet,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Waits for the next packet from the server. Datagrams from other
    /// addresses and undecodable ones are skipped.
    pub async fn recv(&mut self) -> Result<Packet, Box<dyn std::error::Error + Send + Sync>> {
        loop {
            let (len, addr) = self.socket.recv_from(&mut self.buffer).await?;
            if addr != self.server_addr {
                continue;
            }

            if self.fake_ping_ms > 0 {
                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
            }

            match deserialize::<Packet>(&self.buffer[..len]) {
                Ok(packet) => return Ok(packet),
                Err(e) => warn!("Dropped malformed packet: {}", e),
            }
        }
    }

    /// Like `recv`, but gives up after `wait`.
    pub async fn recv_timeout(&mut self, wait: Duration) -> Option<Packet> {
        match timeout(wait, self.recv()).await {
            Ok(Ok(packet)) => Some(packet),
            Ok(Err(e)) => {
                error!("Error receiving packet: {}", e);
                None
            }
            Err(_) => None,
        }
    }
}

/// Channel ends held by the render loop.
pub struct NetworkHandle {
    outgoing: mpsc::UnboundedSender<Packet>,
    incoming: std_mpsc::Receiver<Packet>,
}

impl NetworkHandle {
    pub fn send(&self, packet: Packet) -> bool {
        self.outgoing.send(packet).is_ok()
    }

    /// Everything that arrived since the last call, without blocking.
    pub fn poll(&self) -> Vec<Packet> {
        self.incoming.try_iter().collect()
    }
}

/// Starts the network thread. Packets sent through the handle go out in
/// order; a heartbeat keeps the session alive while the player is idle.
pub fn spawn_background(
    server_addr: &str,
    fake_ping_ms: u64,
) -> Result<NetworkHandle, Box<dyn std::error::Error>> {
    let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
    let (incoming_tx, incoming) = std_mpsc::channel();
    let server_addr = server_addr.to_string();

    std::thread::Builder::new()
        .name("network".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to start network runtime: {}", e);
                    return;
                }
            };

            if let Err(e) =
                runtime.block_on(run(&server_addr, fake_ping_ms, outgoing_rx, incoming_tx))
            {
                error!("Network thread stopped: {}", e);
            }
        })?;

    Ok(NetworkHandle { outgoing, incoming })
}

async fn run(
    server_addr: &str,
    fake_ping_ms: u64,
    mut outgoing: mpsc::UnboundedReceiver<Packet>,
    incoming: std_mpsc::Sender<Packet>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut client = NetworkClient::bind(server_addr, fake_ping_ms).await?;
    info!("Network thread talking to {}", client.server_addr);

    let mut heartbeat = interval(HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            result = client.recv() => {
                match result {
                    Ok(packet) => {
                        if incoming.send(packet).is_err() {
                            break;
                        }
                    }
                    Err(e) => error!("Error receiving packet: {}", e),
                }
            }

            packet = outgoing.recv() => {
                let Some(packet) = packet else {
                    break;
                };
                let disconnecting = matches!(packet, Packet::Disconnect);
                if let Err(e) = client.send(&packet).await {
                    error!("Error sending packet: {}", e);
                }
                if disconnecting {
                    break;
                }
            }

            _ = heartbeat.tick() => {
                if let Err(e) = client.send(&Packet::Heartbeat).await {
                    error!("Error sending heartbeat: {}", e);
                }
            }
        }
    }

    Ok(())
}
