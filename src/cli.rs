use crate::config::AppConfig;
use crate::domain::criteria::RefinementCriteria;
use crate::errors::{AppError, PipelineError};
use crate::jobs::orchestrator::{JobObserver, JobOutcome, JobRequest, JobState, Pipeline};
use crate::jobs::registry::{CancellationRegistry, JobId};
use crate::scraping::browser::ChromeLauncher;
use crate::scraping::detail_fetcher::parse_detail_page;
use crate::scraping::page_fetcher::{parse_results_page, SearchLabels};
use crate::spreadsheets::{export_listings_json, listings_to_json, write_listings_xlsx};
use crate::telemetry;
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "imob_scraper",
    about = "Collect and enrich Viva Real listings from a search URL",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one collection job. Type `x` and Enter to cancel it.
    Run(RunArgs),
    /// Parse a saved HTML page with the same parsers the fetchers use
    Parse(ParseArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Search results URL (page 1)
    #[arg(long)]
    url: String,
    /// Number of result pages to visit (1-20)
    #[arg(long, default_value_t = 1)]
    pages: u32,
    #[arg(long, default_value = "Apartamento")]
    property_type: String,
    #[arg(long, default_value = "Venda")]
    transaction: String,
    #[arg(long)]
    min_price: Option<f64>,
    #[arg(long)]
    max_price: Option<f64>,
    #[arg(long)]
    min_area: Option<f64>,
    #[arg(long)]
    max_area: Option<f64>,
    #[arg(long)]
    min_bedrooms: Option<u32>,
    #[arg(long)]
    min_bathrooms: Option<u32>,
    #[arg(long)]
    min_parking: Option<u32>,
    /// Land searches only: drop lots without a condo fee
    #[arg(long)]
    requires_condo_fee: bool,
    #[arg(long, default_value_t = 4)]
    detail_workers: usize,
    /// Identifier used for cancellation; generated when omitted
    #[arg(long)]
    job_id: Option<String>,
    /// Output file; defaults to a timestamped name in the current directory
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Xlsx)]
    format: OutputFormat,
}

impl RunArgs {
    fn criteria(&self) -> RefinementCriteria {
        RefinementCriteria {
            min_price: self.min_price,
            max_price: self.max_price,
            min_area: self.min_area,
            max_area: self.max_area,
            min_bedrooms: self.min_bedrooms,
            min_bathrooms: self.min_bathrooms,
            min_parking: self.min_parking,
            requires_condo_fee: self.requires_condo_fee,
        }
    }
}

#[derive(Args, Debug)]
struct ParseArgs {
    #[arg(long, value_enum)]
    kind: PageKind,
    file: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Xlsx,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum PageKind {
    Results,
    Detail,
}

pub fn run() -> Result<ExitCode, AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match cli.command {
        Command::Run(args) => run_job(args, config),
        Command::Parse(args) => parse_file(args),
    }
}

fn run_job(args: RunArgs, config: AppConfig) -> Result<ExitCode, AppError> {
    let job_id = JobId::new(
        args.job_id
            .clone()
            .unwrap_or_else(|| format!("cli-{}", Local::now().format("%Y%m%d%H%M%S"))),
    );
    let labels = SearchLabels {
        property_type: args.property_type.clone(),
        transaction: args.transaction.clone(),
    };
    let request = JobRequest::new(job_id.clone(), &args.url, args.pages, args.criteria(), labels)?
        .with_detail_workers(args.detail_workers);

    println!("Filters: {}", request.criteria.summary());
    println!("Type x and Enter to cancel.");

    let registry = Arc::new(CancellationRegistry::new());
    let launcher = Arc::new(ChromeLauncher::new(config.harvest.browser.clone()));
    let pipeline = Pipeline::new(registry, launcher, config.harvest)
        .with_observer(Arc::new(ProgressPrinter));

    spawn_cancel_listener(Arc::clone(pipeline.registry()), job_id.clone());

    let outcome = pipeline.run(request);
    println!("{}", outcome.user_message());

    match outcome {
        JobOutcome::Completed(listings) => {
            let path = args
                .output
                .unwrap_or_else(|| default_output(&job_id, args.format));
            match args.format {
                OutputFormat::Xlsx => write_listings_xlsx(&listings, &path)?,
                OutputFormat::Json => fs::write(&path, export_listings_json(&listings)?)?,
            }
            info!(job = %job_id, path = %path.display(), "Wrote listings");
            println!("Saved {} listings to {}", listings.len(), path.display());
            Ok(ExitCode::SUCCESS)
        }
        JobOutcome::NoMatches | JobOutcome::Cancelled => Ok(ExitCode::SUCCESS),
        JobOutcome::Failed(_) => Ok(ExitCode::FAILURE),
    }
}

fn default_output(job: &JobId, format: OutputFormat) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("listings_{job}_{stamp}.{}", format.extension()))
}

/// Reads stdin until EOF; an `x` line cancels the job.
fn spawn_cancel_listener(registry: Arc<CancellationRegistry>, job: JobId) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if !line.trim().eq_ignore_ascii_case("x") {
                continue;
            }
            if registry.cancel(&job) {
                println!("Cancelling, waiting for running pages to stop...");
            } else {
                warn!(%job, "Cancel requested but no job is running");
                println!("No operation in progress to cancel.");
            }
        }
    });
}

struct ProgressPrinter;

impl JobObserver for ProgressPrinter {
    fn phase_changed(&self, _job: &JobId, state: JobState, listings: usize) {
        match state {
            JobState::Collecting => println!("Collecting listings..."),
            JobState::Collected => println!(
                "Found {listings} listings. Applying your filters and collecting details..."
            ),
            JobState::Filtered => println!("{listings} listings left after filters."),
            _ => {}
        }
    }
}

fn parse_file(args: ParseArgs) -> Result<ExitCode, AppError> {
    let html = fs::read_to_string(&args.file)?;
    let source = args.file.display().to_string();

    let value = match args.kind {
        PageKind::Results => {
            let listings = parse_results_page(&html, &SearchLabels::default(), None)
                .map_err(PipelineError::from)?;
            listings_to_json(&listings)
        }
        PageKind::Detail => serde_json::to_value(parse_detail_page(&html, &source))
            .map_err(|e| AppError::Export(format!("{source}: {e}")))?,
    };

    let text = serde_json::to_string_pretty(&value)
        .map_err(|e| AppError::Export(format!("{source}: {e}")))?;
    println!("{text}");
    Ok(ExitCode::SUCCESS)
}
