//! Minimal line-mode client: logs in, forwards stdin lines as bridge
//! commands and prints whatever the server sends back.

use clap::Parser;
use log::{info, warn};
use shared::{read_packet, write_packet, MessageScope, Packet, DEFAULT_PORT};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about = "Line-mode test client for the galaxy server")]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Captain name
    #[arg(short, long, default_value = "Tester")]
    name: String,

    /// Faction code 0-4
    #[arg(short, long, default_value_t = 0)]
    faction: u8,

    /// Ship class code 0-13
    #[arg(short, long, default_value_t = 0)]
    class: u8,

    /// Print a summary every N update frames (0 disables)
    #[arg(long, default_value_t = 150)]
    update_every: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);
    let stream = TcpStream::connect(&address).await?;
    info!("Connected to {}", address);

    let (mut reader, mut writer) = stream.into_split();
    write_packet(
        &mut writer,
        &Packet::Login {
            name: args.name.clone(),
            faction: args.faction,
            ship_class: args.class,
        },
    )
    .await?;

    let update_every = args.update_every;
    let printer = tokio::spawn(async move {
        loop {
            match read_packet(&mut reader).await {
                Ok(Some(Packet::Message {
                    from, scope, text, ..
                })) => match scope {
                    MessageScope::Private => println!("[{}] {}", from, text),
                    other => println!("<{:?}> {}: {}", other, from, text),
                },
                Ok(Some(Packet::Galaxy(snapshot))) => println!(
                    "Galaxy record received: {} hostiles, {} starbases",
                    snapshot.hostiles, snapshot.bases
                ),
                Ok(Some(Packet::Update(frame))) => {
                    if update_every > 0 && frame.frame % update_every == 0 {
                        println!(
                            "Frame {}: Q{:?} S[{:.1},{:.1},{:.1}] E:{} T:{} objects:{}",
                            frame.frame,
                            frame.quadrant,
                            frame.sector[0],
                            frame.sector[1],
                            frame.sector[2],
                            frame.energy,
                            frame.torpedoes,
                            frame.objects.len()
                        );
                    }
                }
                Ok(Some(Packet::Disconnected { reason })) => {
                    println!("Disconnected: {}", reason);
                }
                Ok(Some(other)) => warn!("Unexpected packet: {:?}", other),
                Ok(None) => {
                    println!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    warn!("Receive failed: {}", e);
                    break;
                }
            }
        }
    });

    // Lines starting with '/' are global chat, everything else is a command
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let packet = if line == "quit" {
            Packet::Logout
        } else if let Some(text) = line.strip_prefix('/') {
            Packet::Message {
                from: args.name.clone(),
                faction: args.faction,
                scope: MessageScope::Global,
                target_id: 0,
                text: text.to_string(),
            }
        } else {
            Packet::Command {
                cmd: line.to_string(),
            }
        };
        let done = packet == Packet::Logout;
        write_packet(&mut writer, &packet).await?;
        if done {
            break;
        }
    }

    let _ = printer.await;
    info!("Test client finished");
    Ok(())
}
