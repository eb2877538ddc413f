//! Record a few seconds from the system capture ports and play them back

use std::path::PathBuf;

use clap::Parser;
use jacked::config::config_path;
use jacked::{ClientConfig, JackAudio};

#[derive(Parser, Debug)]
#[command(version, about = "Capture audio through JACK and play it straight back")]
struct Args {
    /// JACK client name
    #[arg(long)]
    name: Option<String>,

    /// Number of capture ports to connect
    #[arg(long)]
    channels_in: Option<usize>,

    /// Number of playback ports to connect
    #[arg(long)]
    channels_out: Option<usize>,

    /// Seconds to record
    #[arg(long, default_value_t = 3.0)]
    seconds: f64,

    /// Drop surplus channels instead of mixing them into the last output
    #[arg(long)]
    truncate: bool,

    /// JSON config file (defaults to the user config directory, then to a
    /// 2-in 1-out "captest" client)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> jacked::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load_from_or(
            &config_path(),
            ClientConfig {
                name: "captest".to_string(),
                channels_in: 2,
                channels_out: 1,
                ..Default::default()
            },
        ),
    };
    if let Some(name) = args.name {
        config.name = name;
    }
    if let Some(channels) = args.channels_in {
        config.channels_in = channels;
    }
    if let Some(channels) = args.channels_out {
        config.channels_out = channels;
    }

    log::info!(
        "Starting {} ({} in, {} out)",
        config.name,
        config.channels_in,
        config.channels_out
    );

    let client = JackAudio::from_config(&config)?;
    client.run_scoped(|client| {
        let captured = client.capture(args.seconds)?;
        log::info!(
            "Captured {} channel(s) x {} samples",
            captured.nrows(),
            captured.ncols()
        );
        client.play(captured.view(), args.truncate)
    })
}
