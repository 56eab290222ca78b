//! msgnet Server Binary
//!
//! Starts an echo server: every message is sent back to its sender, or to
//! every connected client with `--broadcast`.

use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam::channel::unbounded;
use msgnet::{ClientId, Config, Message, Server};
use tracing_subscriber::{fmt, EnvFilter};

/// msgnet echo server
#[derive(Parser, Debug)]
#[command(name = "msgnet-server")]
#[command(about = "Echo server for the msgnet framed transport")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "4242")]
    port: u16,

    /// Host to bind
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Maximum concurrent clients
    #[arg(short, long, default_value = "1024")]
    max_clients: usize,

    /// Message types to echo
    #[arg(short = 't', long = "msg-type", default_values_t = [1])]
    msg_types: Vec<i32>,

    /// Send every message to all clients instead of back to its sender
    #[arg(long)]
    broadcast: bool,

    /// Stop after this many seconds (runs forever if omitted)
    #[arg(long)]
    run_for: Option<u64>,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,msgnet=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("msgnet Server v{}", msgnet::VERSION);

    let config = Config::builder()
        .bind_host(&args.bind)
        .max_clients(args.max_clients)
        .build();

    let mut server = Server::with_config(config);

    // Actions cannot borrow the server, so replies go through a channel
    let (reply_tx, reply_rx) = unbounded::<(ClientId, Message)>();
    for &msg_type in &args.msg_types {
        let reply_tx = reply_tx.clone();
        server.define_action(msg_type, move |client_id, message| {
            tracing::info!(
                "Client {} sent type {} ({} bytes)",
                client_id,
                message.msg_type(),
                message.len()
            );
            let _ = reply_tx.send((client_id, message));
        });
    }

    if let Err(e) = server.start(args.port) {
        tracing::error!("Failed to start server: {}", e);
        std::process::exit(1);
    }

    let deadline = args.run_for.map(|secs| Instant::now() + Duration::from_secs(secs));

    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        if let Err(e) = server.update() {
            tracing::error!("Update failed: {}", e);
            break;
        }

        for (client_id, message) in reply_rx.try_iter() {
            let result = if args.broadcast {
                server.send_to_all(&message)
            } else {
                server.send_to(message, client_id)
            };
            if let Err(e) = result {
                tracing::warn!("Reply to client {} failed: {}", client_id, e);
            }
        }

        thread::sleep(Duration::from_millis(10));
    }

    server.stop();
    tracing::info!("Server stopped");
}
