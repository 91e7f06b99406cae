//! Command line arguments and config resolution

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use secure_channel::{ChannelConfig, KeyEncoding};

/// Message the client sends when none is given
pub const DEFAULT_CLIENT_MESSAGE: &str = "Hello ! I am the Client ! This message is encrypted.";

/// Acknowledgement the server sends back on every connection
pub const SERVER_REPLY: &str = "Hello this is the Server ! Your message was received securely.";

/// Encrypted point-to-point channel peer
#[derive(Parser, Debug)]
#[command(name = "channel-peer")]
#[command(about = "ECDH key exchange and AES-CBC messaging over TCP")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// JSON channel config; flags below override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Public key wire encoding (sec1, pem)
    #[arg(long, global = true)]
    pub encoding: Option<KeyEncoding>,

    /// Receive timeout in milliseconds
    #[arg(long, global = true)]
    pub read_timeout_ms: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "channel_peer=info,secure_channel=info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept connections and answer one message on each
    Server {
        /// Address to bind to
        #[arg(short, long, default_value = "127.0.0.1:6000")]
        bind: String,
    },
    /// Connect, send one message and print the reply
    Client {
        /// Server address
        #[arg(short, long, default_value = "127.0.0.1:6000")]
        connect: String,

        /// Text to send
        #[arg(short, long, default_value = DEFAULT_CLIENT_MESSAGE)]
        message: String,
    },
}

impl Args {
    /// Load the config file if one was given, then apply flag overrides
    pub fn channel_config(&self) -> anyhow::Result<ChannelConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let data = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                ChannelConfig::from_json(&data)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => ChannelConfig::default(),
        };

        if let Some(encoding) = self.encoding {
            config.key_encoding = encoding;
        }
        if let Some(ms) = self.read_timeout_ms {
            config.read_timeout_ms = Some(ms);
        }

        config.validate()?;
        Ok(config)
    }
}
