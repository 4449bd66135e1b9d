//! CLI for stripdeck: live control and monitoring of LED effect controllers.

mod commands;
mod tui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use stripdeck_core::Command;

#[derive(Parser)]
#[command(name = "stripdeck")]
#[command(about = "stripdeck: live control and monitoring of LED effect controllers")]
#[command(version = stripdeck_core::VERSION)]
struct Cli {
    /// Device address, e.g. http://192.168.1.40 (overrides the config file)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Path prefix in front of every device endpoint
    #[arg(long, global = true)]
    base_path: Option<String>,

    /// JSON engine config (timeouts, countdown, charts)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effect list, the running effect and time to the next change
    Status {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,

        /// Also fetch and print device statistics
        #[arg(long)]
        stats: bool,
    },

    /// Switch to the effect at INDEX
    Select { index: usize },

    /// Enable the effect at INDEX
    Enable { index: usize },

    /// Disable the effect at INDEX
    Disable { index: usize },

    /// Advance to the next enabled effect
    Next,

    /// Go back to the previous enabled effect
    Previous,

    /// Set how long each effect runs, in milliseconds (0 = never advance)
    Interval { ms: u64 },

    /// Follow the device and print every change until Ctrl-C
    Watch,

    /// Live interactive dashboard (TUI)
    Monitor,

    /// Run a simulated controller speaking the device's HTTP API
    Simulate {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value = "8043")]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    // The dashboard owns the terminal; stray log lines would tear it.
    let default_filter = match cli.command {
        Commands::Monitor => "off",
        _ => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = commands::load_config(
        cli.config.as_deref(),
        cli.url.as_deref(),
        cli.base_path.as_deref(),
    );

    match cli.command {
        Commands::Status { json, stats } => commands::status::run(&config, json, stats),
        Commands::Select { index } => commands::control::run(&config, Command::NavigateTo(index)),
        Commands::Enable { index } => commands::control::run(
            &config,
            Command::SetEnabled {
                index,
                enable: true,
            },
        ),
        Commands::Disable { index } => commands::control::run(
            &config,
            Command::SetEnabled {
                index,
                enable: false,
            },
        ),
        Commands::Next => commands::control::run(&config, Command::Step { forward: true }),
        Commands::Previous => commands::control::run(&config, Command::Step { forward: false }),
        Commands::Interval { ms } => commands::control::run(&config, Command::UpdateInterval(ms)),
        Commands::Watch => commands::watch::run(config),
        Commands::Monitor => commands::monitor::run(config),
        Commands::Simulate { host, port } => commands::simulate::run(&host, port, &config),
    }
}
