mod config;
mod constants;
mod core_cli;
mod core_control;
mod core_data;
mod core_ftpops;
mod core_list;
mod errors;
mod host;
mod local_io;
mod mime;
mod session;

use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::{debug, info, warn};
use std::io::Write;

use crate::config::Config;
use crate::core_cli::Cli;
use crate::host::IpcChannel;
use crate::session::Session;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments; the host launches us with a fixed argv shape.
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Usage: rouilleftps protocol pool-socket app-socket");
            std::process::exit(-1);
        }
    };

    // Initialize the logger with a custom format
    let default_level = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    info!(
        "Starting {} worker ({})",
        args.scheme,
        std::process::id()
    );
    debug!("pool socket: {}", args.pool_socket);

    // Load configuration from the TOML file; a missing default file just
    // means defaults.
    let default_config_path = "/etc/rouilleftps.conf";
    let config = if args.config.is_empty() {
        if std::path::Path::new(default_config_path).exists() {
            config::load_config(default_config_path)?
        } else {
            Config::default()
        }
    } else {
        config::load_config(&args.config)?
    };

    // Hook up to the host process and serve requests until it hangs up.
    let ipc = IpcChannel::connect(&args.app_socket).await?;
    let mut session = Session::new(ipc, config.worker);

    loop {
        let request = match session.host_channel.read_request().await {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(e) => {
                warn!("dropping malformed request: {}", e);
                continue;
            }
        };
        core_ftpops::dispatch(&mut session, request).await;
    }

    session.close_connection().await;
    debug!("Done");
    Ok(())
}
