// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host shim for the DMX executor.
//!
//! Reads newline-delimited JSON commands from stdin, writes every signal as
//! one JSON line to stdout and logs to stderr. `SIGHUP` reloads the device
//! configuration; Ctrl-C or the end of stdin shuts down.
//!
//! ```text
//! {"code":"SetScene","device_alias":"stage","scene_alias":"day"}
//! {"code":"SetChannel","device_alias":"stage","channel":1,"value":200}
//! ```

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

use dmx_executor::cache::{Cache, FileCache, MemoryCache};
use dmx_executor::config::ARTNET_PORT;
use dmx_executor::transport::{HardwareTransports, TransportFactory};
use dmx_executor::{Command, DeviceManager, Signal, UserConfig};

const DEFAULT_ARTNET_BIND: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, ARTNET_PORT));

#[derive(Debug, Parser)]
#[command(name = "dmx-executor", version)]
#[command(about = "Executes lighting commands on DMX and Art-Net devices")]
struct Args {
    /// Device configuration file (.json, .yaml or .yml)
    #[arg(long, env = "DMX_CONFIG")]
    config: PathBuf,

    /// JSON file persisting universes and scenes; in-memory when omitted
    #[arg(long, env = "DMX_CACHE")]
    cache: Option<PathBuf>,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, env = "DMX_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Local address of the Art-Net socket; nodes reply to port 6454
    #[arg(long, env = "DMX_ARTNET_BIND", default_value_t = DEFAULT_ARTNET_BIND)]
    artnet_bind: SocketAddr,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = UserConfig::from_path(&args.config)?;

    let cache: Arc<dyn Cache> = match &args.cache {
        Some(path) => Arc::new(FileCache::open(path)?),
        None => Arc::new(MemoryCache::new()),
    };
    let factory = HardwareTransports::bind(args.artnet_bind).await?;
    let manager = DeviceManager::new(factory, cache);

    let summary = manager.update_devices(&config).await;
    tracing::info!(devices = summary.added.len(), "Devices configured");

    let printer = tokio::spawn(print_signals(manager.signals()));
    let mut reload = ReloadSignal::new()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted");
                break;
            }
            () = reload.recv() => reload_config(&manager, &args.config).await,
            line = lines.next_line() => match line {
                Ok(Some(line)) => handle_line(&manager, &line).await,
                Ok(None) => {
                    tracing::info!("Input closed");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read input");
                    break;
                }
            },
        }
    }

    manager.shutdown().await;
    printer.abort();
    Ok(())
}

async fn handle_line<F: TransportFactory>(manager: &DeviceManager<F>, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let command: Command = match serde_json::from_str(line) {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid command");
            return;
        }
    };

    match manager.process(&command).await {
        Ok(()) => tracing::debug!(command = command.code(), "Command executed"),
        Err(e) => tracing::warn!(command = command.code(), error = %e, "Command failed"),
    }
}

async fn reload_config<F: TransportFactory>(manager: &DeviceManager<F>, path: &Path) {
    match UserConfig::from_path(path) {
        Ok(config) => {
            let summary = manager.update_devices(&config).await;
            tracing::info!(
                added = summary.added.len(),
                replaced = summary.replaced.len(),
                removed = summary.removed.len(),
                unchanged = summary.unchanged.len(),
                "Configuration reloaded"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to reload configuration, keeping current devices");
        }
    }
}

async fn print_signals(mut rx: broadcast::Receiver<Signal>) {
    let mut stdout = tokio::io::stdout();

    loop {
        match rx.recv().await {
            Ok(signal) => {
                let mut line = match serde_json::to_string(&signal) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to serialize signal");
                        continue;
                    }
                };
                line.push('\n');
                if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Signal output lagged, oldest signals dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// `SIGHUP` on unix; never fires elsewhere.
struct ReloadSignal {
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl ReloadSignal {
    #[cfg(unix)]
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
        })
    }

    #[cfg(not(unix))]
    #[allow(clippy::unnecessary_wraps)]
    fn new() -> std::io::Result<Self> {
        Ok(Self {})
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        if self.hangup.recv().await.is_some() {
            return;
        }
        std::future::pending::<()>().await;
    }
}
