//! Server network layer handling TCP connections and game loop coordination

use crate::client_manager::{ConnectionId, Outgoing};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::game::GameState;
use log::{debug, error, info, warn};
use shared::{read_packet, write_packet, Packet, ProtocolError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};

/// Capacity of the queue from connection tasks into the tick owner.
const INBOUND_QUEUE: usize = 1024;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Connected {
        conn: ConnectionId,
        addr: SocketAddr,
        sender: mpsc::Sender<GameMessage>,
        close: oneshot::Sender<()>,
    },
    PacketReceived {
        conn: ConnectionId,
        packet: Packet,
    },
    Disconnected {
        conn: ConnectionId,
    },
    Shutdown,
}

/// Messages sent from game loop to a connection's writer task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket(Packet),
    Close,
}

/// The tick owner's handle on one live connection.
struct Connection {
    addr: SocketAddr,
    sender: mpsc::Sender<GameMessage>,
    close: Option<oneshot::Sender<()>>,
    /// Set while the writer is behind and updates are being dropped.
    congested: bool,
}

/// Main server coordinating networking and game simulation
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    game_state: GameState,
    config: ServerConfig,
    connections: HashMap<ConnectionId, Connection>,

    // Communication channels
    server_tx: mpsc::Sender<ServerMessage>,
    server_rx: mpsc::Receiver<ServerMessage>,
}

impl Server {
    /// Binds the listener and loads or generates the world.
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;

        let bind = config.bind_address();
        let listener = TcpListener::bind(&bind)
            .await
            .map_err(|e| ServerError::Network(format!("failed to bind {}: {}", bind, e)))?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let game_state = GameState::load_or_generate(&config)?;
        let (server_tx, server_rx) = mpsc::channel(INBOUND_QUEUE);

        Ok(Server {
            listener: Some(listener),
            local_addr,
            game_state,
            config,
            connections: HashMap::new(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A sender that outside code can use to stop the server.
    pub fn handle(&self) -> mpsc::Sender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    /// Spawns task that accepts connections and starts their reader and writer
    fn spawn_acceptor(&mut self) -> ServerResult<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| ServerError::Network("listener already started".to_string()))?;
        let server_tx = self.server_tx.clone();
        let outbound = self.config.outbound_queue;

        tokio::spawn(async move {
            let mut next_conn: ConnectionId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let conn = next_conn;
                        next_conn += 1;
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
                        }

                        let (read_half, write_half) = stream.into_split();
                        let (game_tx, game_rx) = mpsc::channel(outbound);
                        let (close_tx, close_rx) = oneshot::channel();

                        spawn_writer(conn, write_half, game_rx);
                        let connected = ServerMessage::Connected {
                            conn,
                            addr,
                            sender: game_tx,
                            close: close_tx,
                        };
                        if server_tx.send(connected).await.is_err() {
                            break;
                        }
                        spawn_reader(conn, read_half, close_rx, server_tx.clone());
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
        Ok(())
    }

    /// Hands queued packets to writer tasks without ever waiting on them.
    fn flush_outbox(&mut self) {
        for item in self.game_state.drain_outbox() {
            match item {
                Outgoing::Packet { conn, packet } => {
                    let Some(connection) = self.connections.get_mut(&conn) else {
                        continue;
                    };
                    match connection.sender.try_send(GameMessage::SendPacket(packet)) {
                        Ok(()) => connection.congested = false,
                        Err(TrySendError::Full(_)) => {
                            if !connection.congested {
                                warn!(
                                    "Connection {} ({}) is not keeping up; dropping packets",
                                    conn, connection.addr
                                );
                            }
                            connection.congested = true;
                        }
                        Err(TrySendError::Closed(_)) => {}
                    }
                }
                Outgoing::Close { conn } => self.close_connection(conn),
            }
        }
    }

    /// Stops both tasks of a connection. Packets already queued still go out.
    fn close_connection(&mut self, conn: ConnectionId) {
        let Some(mut connection) = self.connections.remove(&conn) else {
            return;
        };
        let _ = connection.sender.try_send(GameMessage::Close);
        if let Some(close) = connection.close.take() {
            let _ = close.send(());
        }
        debug!("Closed connection {} ({})", conn, connection.addr);
    }

    fn save(&self) {
        if let Err(e) = self.game_state.save_to(&self.config.save_file) {
            error!("Failed to save world: {}", e);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> ServerResult<()> {
        self.spawn_acceptor()?;

        let mut tick_interval = interval(self.config.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Connected { conn, addr, sender, close }) => {
                            info!("Connection {} accepted from {}", conn, addr);
                            self.connections.insert(conn, Connection {
                                addr,
                                sender,
                                close: Some(close),
                                congested: false,
                            });
                        }
                        Some(ServerMessage::PacketReceived { conn, packet }) => {
                            self.game_state.handle_packet(conn, packet);
                            self.flush_outbox();
                        }
                        Some(ServerMessage::Disconnected { conn }) => {
                            info!("Connection {} closed", conn);
                            self.game_state.disconnect(conn);
                            self.close_connection(conn);
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    self.game_state.tick();
                    self.flush_outbox();

                    let tick = self.game_state.tick;
                    if self.config.save_interval > 0 && tick % self.config.save_interval == 0 {
                        self.save();
                    }

                    // Periodic performance monitoring
                    if tick % 300 == 0 && !self.connections.is_empty() {
                        debug!("Tick {}: {} connections, {:.1}Hz",
                               tick, self.connections.len(), 1.0 / dt.max(f32::EPSILON));
                    }
                },
            }
        }

        self.save();
        let open: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for conn in open {
            self.close_connection(conn);
        }
        Ok(())
    }
}

/// Spawns task that decodes frames from one connection
fn spawn_reader(
    conn: ConnectionId,
    mut reader: OwnedReadHalf,
    mut close: oneshot::Receiver<()>,
    server_tx: mpsc::Sender<ServerMessage>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut close => break,
                result = read_packet(&mut reader) => match result {
                    Ok(Some(packet)) => {
                        if server_tx.send(ServerMessage::PacketReceived { conn, packet }).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(ProtocolError::Serialization(e)) => {
                        warn!("Malformed frame from connection {}: {}", conn, e);
                    }
                    Err(e) => {
                        warn!("Dropping connection {}: {}", conn, e);
                        break;
                    }
                },
            }
        }
        let _ = server_tx.send(ServerMessage::Disconnected { conn }).await;
    });
}

/// Spawns task that writes queued packets to one connection
fn spawn_writer(
    conn: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut game_rx: mpsc::Receiver<GameMessage>,
) {
    tokio::spawn(async move {
        while let Some(message) = game_rx.recv().await {
            match message {
                GameMessage::SendPacket(packet) => {
                    if let Err(e) = write_packet(&mut writer, &packet).await {
                        debug!("Write to connection {} failed: {}", conn, e);
                        break;
                    }
                }
                GameMessage::Close => break,
            }
        }
        let _ = writer.shutdown().await;
    });
}
