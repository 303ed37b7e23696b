//! Relay Board - HTTP relay controller binary
//!
//! Serves the relay endpoints for a 16-channel relay board wired to the GPIO
//! header of a Raspberry Pi.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use relay_board::{
    open_backend, start_web_server, BoardConfig, Polarity, RelayController, WebConfig,
    DEFAULT_HARDWARE_TIMEOUT_MS, DEFAULT_LINES, DEFAULT_WEB_PORT,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "relay_board")]
#[command(about = "Relay Board - HTTP control for a Raspberry Pi relay board")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Austin Couch")]
#[command(long_about = "Switches the relays of a 16-channel relay board through a small HTTP API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// GPIO line for each relay, relay 1 first
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_LINES.to_vec())]
    lines: Vec<u8>,

    /// The board switches a relay on with a high level
    #[arg(long)]
    active_high: bool,

    /// Simulate the GPIO lines instead of driving hardware
    #[arg(long)]
    simulate: bool,

    /// Upper bound on driving one relay line, in milliseconds
    #[arg(long, default_value_t = DEFAULT_HARDWARE_TIMEOUT_MS)]
    hardware_timeout_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server (default)
    Serve(ServeArgs),

    /// Show the board configuration and exit
    Info,
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,
}

impl Cli {
    fn board_config(&self) -> BoardConfig {
        let polarity = if self.active_high {
            Polarity::ActiveHigh
        } else {
            Polarity::ActiveLow
        };

        BoardConfig::new(self.lines.clone())
            .with_polarity(polarity)
            .with_hardware_timeout(Some(Duration::from_millis(self.hardware_timeout_ms)))
    }

    /// Log filter used when `RUST_LOG` is not set.
    fn log_directive(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    match &cli.command {
        Some(Commands::Serve(args)) => serve_command(&cli, args).await?,
        Some(Commands::Info) => info_command(&cli)?,
        None => serve_command(&cli, &ServeArgs::default()).await?,
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_directive()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn open_controller(cli: &Cli) -> anyhow::Result<Arc<RelayController>> {
    let config = cli.board_config();
    let backend = open_backend(cli.simulate, &config.lines)?;
    let controller =
        RelayController::initialize(config, backend).context("Failed to initialize relay board")?;
    Ok(Arc::new(controller))
}

async fn serve_command(cli: &Cli, args: &ServeArgs) -> anyhow::Result<()> {
    info!("Starting relay board controller...");

    let controller = open_controller(cli)?;
    info!(
        "Relay board initialized with {} relays on the {} backend",
        controller.count(),
        controller.backend_name()
    );

    let web_config = WebConfig::new(&cli.host, cli.port).with_cors(!args.no_cors);

    info!("Web server configuration:");
    info!("  - Bind address: {}", web_config.bind_address());
    info!("  - CORS enabled: {}", web_config.enable_cors);
    info!("  - Hardware timeout: {}ms", cli.hardware_timeout_ms);

    start_web_server(web_config, controller).await?;

    Ok(())
}

fn info_command(cli: &Cli) -> anyhow::Result<()> {
    let controller = open_controller(cli)?;
    let config = controller.config();

    println!("Relay Board Configuration");
    println!("=========================");
    println!();
    println!("  Backend: {}", controller.backend_name());
    println!("  Polarity: {}", config.polarity);
    println!("  Consumer: {}", config.consumer);
    match config.hardware_timeout_ms {
        Some(ms) => println!("  Hardware timeout: {}ms", ms),
        None => println!("  Hardware timeout: none"),
    }
    println!();

    println!("Relays:");
    for status in controller.snapshot() {
        println!("  Relay {:>2} -> line {}", status.relay, status.line);
    }

    println!();
    println!("Features compiled:");
    #[cfg(feature = "gpio")]
    println!("  - GPIO support: ✓");
    #[cfg(not(feature = "gpio"))]
    println!("  - GPIO support: ✗");

    Ok(())
}
