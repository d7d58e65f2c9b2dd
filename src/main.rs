//! midi-osc-gw
//!
//! Bridges MIDI controller CC input to OSC messages on the network.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midi_osc_gw::config::{Config, Encoding};
use midi_osc_gw::engine::{Transform, TransformEngine};
use midi_osc_gw::input::InputHub;
use midi_osc_gw::limiter::RateLimiter;
use midi_osc_gw::midi::discovery;
use midi_osc_gw::osc::{ConsoleSender, OscSender, UdpOscSender};
use midi_osc_gw::SourceListener;

/// MIDI to OSC gateway - maps controller CCs to OSC messages
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the mapping file (JSON, or YAML with a .yaml/.yml extension)
    #[arg(short, long, default_value = "oooooo-nanokontrol.json")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Only open input ports whose name contains this (repeatable)
    #[arg(short, long = "port")]
    ports: Vec<String>,

    /// List available MIDI input ports
    #[arg(long)]
    list_ports: bool,

    /// Print the expanded mapping table and exit
    #[arg(long)]
    show_mappings: bool,

    /// Log OSC messages instead of sending them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    if args.list_ports {
        discovery::print_ports();
        return Ok(());
    }

    info!("Starting midi-osc-gw...");
    info!("Configuration file: {}", args.config);

    let config = match Config::load(&args.config).await {
        Ok(config) => config.expand(),
        Err(e) => {
            error!("❌ Failed to load configuration: {}", e);
            return Err(e).with_context(|| format!("Cannot start without {}", args.config));
        }
    };
    info!(
        "Configuration loaded: {} controls -> {}:{}",
        config.events.len(),
        config.server,
        config.port
    );

    if args.show_mappings {
        print_mappings(&config);
        return Ok(());
    }

    run(config, args.ports, args.dry_run).await?;

    info!("midi-osc-gw shutdown complete");
    Ok(())
}

async fn run(config: Config, extra_ports: Vec<String>, dry_run: bool) -> Result<()> {
    let sender: Arc<dyn OscSender> = if dry_run {
        info!("Dry run: OSC messages are logged, not sent");
        Arc::new(ConsoleSender::new(format!("{}:{}", config.server, config.port)))
    } else {
        Arc::new(UdpOscSender::connect(&config.server, config.port)?)
    };

    let limiter = Arc::new(RateLimiter::from_config(&config.limiter));
    info!(
        "Rate limiter: min interval {:?}, cooldown {:?}",
        limiter.min_interval(),
        limiter.cooldown()
    );

    let mut patterns = config.inputs;
    patterns.extend(extra_ports);

    let engine = Arc::new(TransformEngine::new(config.events));

    let hub = InputHub::open(&patterns, |port_name| {
        SourceListener::new(port_name, engine.clone(), limiter.clone(), sender.clone())
    })
    .context("Failed to enumerate MIDI inputs")?;

    info!(
        "Ready: listening on {} port(s): {}",
        hub.len(),
        hub.port_names().collect::<Vec<_>>().join(", ")
    );

    shutdown_signal().await;

    info!("Shutting down...");
    hub.close();
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}

fn print_mappings(config: &Config) {
    use colored::*;

    println!("\n{}", "=== Control Mappings ===".bold().cyan());
    println!(
        "  Destination: {}",
        format!("{}:{}", config.server, config.port).green()
    );
    println!(
        "  Total controls: {}",
        config.events.len().to_string().green()
    );

    for control in &config.events {
        let kind = if control.is_momentary { " [button]" } else { "" };
        println!(
            "\n  {} {}{}",
            format!("CC {:>3}", control.control_number).yellow(),
            control.label.bright_white(),
            kind.dimmed()
        );
        for output in &control.outputs {
            let transform = match Transform::for_binding(output) {
                Transform::Range { low, high } => format!("range [{}, {}]", low, high),
                Transform::Toggle([a, b]) => format!("toggle [{}, {}]", a, b),
                Transform::Constant(value) => format!("constant {}", value),
                Transform::PassThrough => "pass-through".to_string(),
            };
            let encoding = match output.encoding() {
                Encoding::Int32 => "i",
                Encoding::Float32 => "f",
            };
            println!(
                "    {} {} {}",
                output.address.green(),
                encoding.cyan(),
                transform
            );
        }
    }

    println!();
}
