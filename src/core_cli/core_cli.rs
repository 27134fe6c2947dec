use clap::Parser;

/// Command-line arguments
///
/// The host process launches the worker as
/// `rouilleftps <scheme> <pool-socket> <app-socket>`.
#[derive(Parser, Debug)]
#[command(name = "rouilleftps", about = "A FTPS client worker written in Rust.")]
pub struct Cli {
    /// URL scheme this worker serves (normally "ftps")
    pub scheme: String,

    /// Path of the connection-pool socket
    pub pool_socket: String,

    /// Path of the application socket carrying requests and upcalls
    pub app_socket: String,

    /// Path to the configuration file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,
}
