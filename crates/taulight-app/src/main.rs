//! Taulight bridge binary.
//!
//! Speaks the JSON-lines command protocol on stdin/stdout. Logs go to
//! stderr so they never interleave with replies.
//!
//! # Usage
//!
//! ```bash
//! echo '{"id":1,"method":"connect","args":{"uuid":"00000000-0000-0000-0000-000000000001","link":"tau://localhost?key=00"}}' \
//!     | taulight-bridge --log-level debug
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use taulight_app::{Bridge, Runtime};
use taulight_client::{ChannelNotifier, SessionConfig, SessionManager};
use taulight_core::{ConnectionConfig, DispatcherConfig};
use tokio::io::{BufReader, stdin, stdout};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Taulight client bridge
#[derive(Parser, Debug)]
#[command(name = "taulight-bridge")]
#[command(about = "JSON-lines bridge to Taulight hubs")]
#[command(version)]
struct Args {
    /// Seconds to wait for a TCP connection
    #[arg(long, default_value = "10")]
    connect_timeout_secs: u64,

    /// Seconds to wait for the hub to accept the handshake
    #[arg(long, default_value = "30")]
    handshake_timeout_secs: u64,

    /// Seconds to wait for a reply on a chain (0 waits forever)
    #[arg(long, default_value = "30")]
    request_timeout_secs: u64,

    /// Device name sent with login and registration
    #[arg(long)]
    device: Option<String>,

    /// Lifetime of invite codes, in seconds
    #[arg(long, default_value = "86400")]
    invite_ttl_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        let defaults = SessionConfig::default();
        SessionConfig {
            connection: ConnectionConfig {
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
                ..ConnectionConfig::default()
            },
            dispatcher: DispatcherConfig {
                request_timeout: (self.request_timeout_secs > 0)
                    .then(|| Duration::from_secs(self.request_timeout_secs)),
            },
            device: self.device.clone().unwrap_or(defaults.device),
            invite_ttl: Duration::from_secs(self.invite_ttl_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = args.session_config();
    tracing::info!(
        device = %config.device,
        request_timeout = ?config.dispatcher.request_timeout,
        "Taulight bridge starting"
    );

    let (notifier, events) = ChannelNotifier::new();
    let manager = Arc::new(SessionManager::new(config, notifier));
    let runtime = Runtime::new(Bridge::new(manager), events);

    runtime.run(BufReader::new(stdin()), stdout()).await?;

    tracing::info!("Taulight bridge stopped");
    Ok(())
}
