//! msgnet CLI Client
//!
//! Sends text messages to a msgnet server and prints the replies.

use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use msgnet::{Client, Message};
use tracing_subscriber::{fmt, EnvFilter};

/// msgnet CLI
#[derive(Parser, Debug)]
#[command(name = "msgnet-cli")]
#[command(about = "CLI for the msgnet framed transport")]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "4242")]
    port: u16,

    /// Message type to send and listen for
    #[arg(short = 't', long = "msg-type", default_value = "1")]
    msg_type: i32,

    /// How long to wait for replies (milliseconds)
    #[arg(short, long, default_value = "500")]
    wait_ms: u64,

    /// Text payloads, one message each
    texts: Vec<String>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let mut client = Client::new();
    client.define_action(args.msg_type, |mut message| match message.pop::<String>() {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Unreadable reply of type {}: {}", message.msg_type(), e),
    });

    if let Err(e) = client.connect(&args.host, args.port) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    for text in &args.texts {
        let mut message = Message::new(args.msg_type);
        message.push(text.as_str());
        if let Err(e) = client.send(message) {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }

    let deadline = Instant::now() + Duration::from_millis(args.wait_ms);
    while Instant::now() < deadline {
        if let Err(e) = client.update() {
            eprintln!("{}", e);
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }

    client.disconnect();
}
