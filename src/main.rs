mod logging;
mod mail_reader;

use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

/// Fetches a mailbox over IMAP and writes a text digest plus attachments.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// YAML settings file
    #[arg(short, long, default_value = "src/resources/settings.yaml")]
    config: PathBuf,
    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.log_level)?;

    let settings = mail_reader::settings::load_settings(&args.config)?;
    mail_reader::main(settings).await
}
