//! Channel peer binary.
//!
//! # Usage
//!
//! ```bash
//! # Accept connections on the default port
//! channel-peer server --bind 127.0.0.1:6000
//!
//! # Send one encrypted message and print the reply
//! channel-peer client --connect 127.0.0.1:6000 --message "hello"
//!
//! # Both peers must agree on the key encoding
//! channel-peer --encoding pem server
//! ```

mod cli;
mod peer;

use clap::Parser;
use net_transport::TcpAcceptor;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Args, Command};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = args.channel_config()?;
    debug!("Channel config: {}", serde_json::to_string(&config)?);

    match &args.command {
        Command::Server { bind } => {
            info!("Starting channel server");
            let acceptor = TcpAcceptor::bind(bind.as_str())?;
            peer::serve(acceptor, config, None)?;
        }
        Command::Client { connect, message } => {
            let reply = peer::run_client(connect, message, config)?;
            info!("Server replied: {}", reply);
        }
    }

    Ok(())
}
