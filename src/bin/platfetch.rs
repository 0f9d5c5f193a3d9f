use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use platfetch::config::{Config, ConfigLoader};
use platfetch::domain::{ArchiveFormat, Classifier};
use platfetch::error::FetchError;
use platfetch::fs_util;
use platfetch::loader::SearchPathLoader;
use platfetch::orchestrator::{BatchStatus, Orchestrator};
use platfetch::output::{JsonOutput, LogProgress, ResolveResult, ResolvedArtifact};
use platfetch::pool::WorkerPool;
use platfetch::request::FetchRequest;
use platfetch::transfer::{DEFAULT_TIMEOUT, RepositoryTransport};

#[derive(Parser)]
#[command(name = "platfetch")]
#[command(about = "Fetch platform-specific library artifacts into a local cache")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download missing artifacts and print a JSON report")]
    Fetch(FetchArgs),
    #[command(about = "Print resolved locations without downloading")]
    Resolve(RequestArgs),
}

#[derive(Args, Clone)]
struct RequestArgs {
    /// Library version, e.g. 17.0.2
    version: Option<String>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    repository: Option<String>,

    #[arg(long)]
    group: Option<String>,

    #[arg(long)]
    project: Option<String>,

    #[arg(short, long = "module")]
    modules: Vec<String>,

    #[arg(short, long = "classifier")]
    classifiers: Vec<Classifier>,

    #[arg(long)]
    all_platforms: bool,

    #[arg(long)]
    no_detect: bool,

    #[arg(long)]
    format: Option<ArchiveFormat>,

    #[arg(short, long)]
    output: Option<Utf8PathBuf>,
}

#[derive(Args, Clone)]
struct FetchArgs {
    #[command(flatten)]
    request: RequestArgs,

    #[arg(long)]
    threads: Option<usize>,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Print the search path of ready artifacts after the report
    #[arg(long)]
    print_path: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(status) => map_status(status),
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<FetchError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &FetchError) -> u8 {
    if error.is_fatal() {
        return 2;
    }
    match error {
        FetchError::Callback(_) => 5,
        _ => 1,
    }
}

fn map_status(status: BatchStatus) -> ExitCode {
    match status {
        BatchStatus::Completed => ExitCode::SUCCESS,
        BatchStatus::Failed => ExitCode::from(3),
        BatchStatus::CompletedWithFailures => ExitCode::from(4),
    }
}

fn run() -> miette::Result<BatchStatus> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Fetch(args) => run_fetch(args),
        Commands::Resolve(args) => run_resolve(args).map(|()| BatchStatus::Completed),
    }
}

fn build_request(args: RequestArgs) -> Result<FetchRequest, FetchError> {
    let file = ConfigLoader::resolve(args.config.as_deref())?;
    let mut classifiers = args.classifiers;
    if args.all_platforms {
        classifiers.extend(Classifier::all());
    }
    let flags = Config {
        repository: args.repository,
        group: args.group,
        project: args.project,
        version: args.version,
        modules: args.modules,
        classifiers,
        detect: args.no_detect.then_some(false),
        format: args.format,
        output: args.output,
    };
    file.merge(flags).into_builder()?.build()
}

fn run_fetch(args: FetchArgs) -> miette::Result<BatchStatus> {
    let FetchArgs {
        request,
        threads,
        timeout_secs,
        print_path,
    } = args;
    let request = build_request(request)?;
    if request.modules().next().is_none() {
        tracing::warn!("no modules requested, nothing to fetch");
    }

    let pool = match threads {
        Some(threads) => WorkerPool::new(threads)?,
        None => WorkerPool::with_available_parallelism()?,
    };
    let transport = RepositoryTransport::with_timeout(Duration::from_secs(timeout_secs))?;
    let orchestrator = Orchestrator::new(&pool, transport, SearchPathLoader::new());

    let report = orchestrator.call_with_progress(request, Arc::new(LogProgress))?;
    JsonOutput::print_fetch(&report).into_diagnostic()?;
    if print_path {
        let path = orchestrator.loader().search_path()?;
        println!("{}", path.to_string_lossy());
    }
    Ok(report.status)
}

fn run_resolve(args: RequestArgs) -> miette::Result<()> {
    let request = build_request(args)?;
    let mut artifacts = Vec::new();
    for (module, classifier) in request.pairs() {
        let location = request.locate(module, classifier)?;
        let path = location.cache_path(request.output())?;
        artifacts.push(ResolvedArtifact {
            module: module.to_string(),
            classifier: classifier.to_string(),
            cached: fs_util::is_reusable(path.as_std_path(), request.format()),
            path: path.to_string(),
            location,
        });
    }
    JsonOutput::print_resolve(&ResolveResult { artifacts }).into_diagnostic()?;
    Ok(())
}
