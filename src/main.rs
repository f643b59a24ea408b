use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::Ordering;
use std::time::Duration;

use adalight_rgbw::config::{Config, OutputConfig};
use adalight_rgbw::output::{LogOutput, PresentationSink, SerialOutput};
use adalight_rgbw::transport::{self, SerialTransport, SystemClock};
use adalight_rgbw::LightNode;

#[derive(Parser)]
#[command(name = "adalight_rgbw")]
#[command(about = "Adalight receiver for RGBW strips\n\nDecodes Adalight frames from a serial host, converts them to RGBW and dims to off when the host goes quiet.", long_about = None)]
struct Cli {
    /// Path to configuration file (JSON)
    #[arg(required_unless_present = "list_ports")]
    config: Option<String>,

    /// Enable debug output (every render is logged)
    #[arg(long)]
    debug: bool,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if cli.list_ports {
        for port in transport::list_ports()? {
            println!("{}", port);
        }
        return Ok(());
    }

    let path = cli.config.context("No configuration file given")?;
    let config = Config::load(&path).context(format!("Failed to load {}", path))?;

    let input = SerialTransport::open(&config.input)
        .context(format!("Failed to open input {}", config.input.port))?;

    let sink: Box<dyn PresentationSink> = match config.output.clone() {
        OutputConfig::Serial(output) => {
            let port = output.port.clone();
            Box::new(SerialOutput::new(output).context(format!("Failed to open output {}", port))?)
        }
        OutputConfig::Log => Box::new(LogOutput::new()),
    };

    let mut node: LightNode<_, _, _> = LightNode::new(input, sink, SystemClock::new())
        .with_stats_interval(Duration::from_secs(config.stats_interval_secs));

    // Set up Ctrl-C handler with graceful shutdown
    let running = node.get_running_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::Relaxed);
    }) {
        log::warn!("Could not set Ctrl-C handler: {}", e);
    }

    let result = node.run();
    if let Err(e) = &result {
        log::error!("Input {} failed: {}", node.transport().name(), e);
    }

    // Leave the strip dark whichever way we stopped
    node.shutdown().context("Failed to blank output")?;
    result.context("Receiver stopped")?;

    Ok(())
}
