use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod console;
mod error;
mod export;
mod llm;
mod models;
mod report;
mod session;
mod store;
#[cfg(test)]
mod testing;

use config::AppConfig;
use console::Console;
use export::DocumentExporter;
use llm::OpenAiClient;
use report::ReportRequester;
use session::Session;

#[derive(Parser)]
#[command(name = "activity-report-writer")]
#[command(about = "Drafts student activity reports with a language model and exports them", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// CSV roster (id,name,class) loaded before the session starts
    #[arg(long)]
    roster: Option<PathBuf>,
    /// Directory for PDF and spreadsheet downloads
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("REPORT_WRITER_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.export.output_dir = dir;
    }

    let api_key = config.api_key()?;
    let generator = OpenAiClient::new(&config.generation, api_key)?;
    let exporter = DocumentExporter::new(&config.export);
    info!(
        model = %config.generation.model,
        font = %exporter.font_path().display(),
        "configuration loaded"
    );

    let mut session = Session::new(
        ReportRequester::new(generator, config.generation.model.clone()),
        exporter,
        config.export.report_label.clone(),
    );

    if let Some(roster) = cli.roster.as_deref() {
        let applied = console::import_roster_file(&mut session, roster)?;
        println!("Loaded {applied} students from {}.", roster.display());
    }

    let stdin = std::io::stdin();
    Console::new(stdin.lock(), std::io::stdout(), &config.export.output_dir)
        .run(&mut session)
        .await
}
