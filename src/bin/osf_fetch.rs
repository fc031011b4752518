use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use osf_fetch::app::{App, ProgressSink};
use osf_fetch::config::ConfigLoader;
use osf_fetch::domain::ExtractTarget;
use osf_fetch::logging;
use osf_fetch::osf::OsfHttpClient;
use osf_fetch::output::{OutputMode, ProgressBars, Silent, print_fetch_summary};

#[derive(Parser)]
#[command(name = "osf-fetch")]
#[command(about = "Download and unpack the cost-estimator datasets and runs from OSF")]
#[command(version, author)]
struct Cli {
    /// OSF project to download [default: ga2xj]
    #[arg(long = "osf-id", alias = "osf_id")]
    osf_id: Option<String>,

    /// Remove the staging directory instead of downloading
    #[arg(long = "clean-up", alias = "clean_up")]
    clean_up: bool,

    /// JSON config file [default: ./osf-fetch.json when present]
    #[arg(long)]
    config: Option<String>,

    /// Base directory for the downloads, data and runs directories
    #[arg(long)]
    root: Option<String>,

    /// Where archive contents land below the data/runs roots
    #[arg(long, value_enum)]
    extract_target: Option<ExtractTarget>,

    /// Disable progress bars
    #[arg(long, short)]
    quiet: bool,

    /// Log at debug level
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.root = Some(root);
    }
    if let Some(id) = cli.osf_id {
        config.project_id = Some(id);
    }
    if let Some(target) = cli.extract_target {
        config.extract_target = Some(target);
    }
    let mut resolved = ConfigLoader::resolve_config(config)?;

    if cli.verbose {
        resolved.log.level = "debug".to_string();
    }

    let output_mode = if cli.quiet || cli.clean_up {
        OutputMode::Quiet
    } else {
        OutputMode::Interactive
    };
    // Bars exist before the logger so console lines can clear them.
    let bars = match output_mode {
        OutputMode::Interactive => Some(ProgressBars::new()),
        OutputMode::Quiet => None,
    };
    resolved.log.progress = bars.as_ref().map(|bars| bars.multi().clone());
    logging::init(&resolved.log)?;

    resolved.store.ensure_roots()?;

    let client = OsfHttpClient::with_base_url(&resolved.api_url)?;
    let app = App::new(resolved.store, client).with_extract_target(resolved.extract_target);

    if cli.clean_up {
        app.clean_up()?;
        info!("Staging directory removed");
        return Ok(());
    }

    let sink: &dyn ProgressSink = match &bars {
        Some(bars) => bars,
        None => &Silent,
    };

    let outcome = app.download_project(&resolved.project_id, sink)?;
    if matches!(output_mode, OutputMode::Interactive) {
        print_fetch_summary(&outcome);
    }
    Ok(())
}
