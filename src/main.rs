use clap::Parser;
use form_detection::cli::commands::{cmd_detect, cmd_schema};
use form_detection::cli::config::{Cli, Commands, load_config};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Detect {
            snapshot,
            network,
            format,
            immediate,
        } => {
            cmd_detect(&config, &snapshot, network.as_deref(), &format, immediate).await?;
        }
        Commands::Schema { payload, url } => {
            cmd_schema(&payload, &url)?;
        }
    }

    Ok(())
}
