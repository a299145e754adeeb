use std::path::{Path, PathBuf};
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_phytobind::app::{App, ProgressSink, RunResult, Session, StageResult};
use kira_phytobind::config::{ConfigLoader, ResolvedConfig, StageRequest};
use kira_phytobind::domain::StageKind;
use kira_phytobind::error::KiraError;
use kira_phytobind::output::{ConsoleOutput, JsonOutput, OutputMode};
use kira_phytobind::stages::BINDING_FIELDS;
use kira_phytobind::store::Store;

#[derive(Parser)]
#[command(name = "kira-pb")]
#[command(about = "Plant metabolite to protein target enrichment pipeline")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the stages listed in kira-pb.json")]
    Run(RunArgs),
    #[command(about = "Run a single stage on one table")]
    Stage(StageArgs),
    #[command(about = "Expand joined columns into one row per value")]
    Explode(ExplodeArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    config: Option<String>,

    /// Run only this stage from the configured list.
    #[arg(long)]
    only: Option<StageKind>,
}

#[derive(Args)]
struct StageArgs {
    stage: StageKind,

    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    output: PathBuf,

    /// Defaults to `<output>-errors.csv`.
    #[arg(long)]
    errors: Option<PathBuf>,

    #[arg(long)]
    no_match_label: Option<String>,

    #[arg(long)]
    similarity: Option<f64>,

    #[arg(long)]
    store_dir: Option<String>,

    #[arg(long)]
    no_cache: bool,
}

#[derive(Args)]
struct ExplodeArgs {
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    output: PathBuf,

    #[arg(long)]
    errors: Option<PathBuf>,

    /// Comma separated; defaults to the BindingDB hit columns.
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,

    #[arg(long)]
    no_match_label: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    if error.is_configuration() {
        2
    } else if error.is_remote() {
        3
    } else {
        1
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Run(args) => run_pipeline(args, output_mode),
        Commands::Stage(args) => run_stage(args, output_mode),
        Commands::Explode(args) => run_explode(args, output_mode),
    }
}

fn run_pipeline(args: RunArgs, output_mode: OutputMode) -> miette::Result<()> {
    let mut config = ConfigLoader::resolve(args.config.as_deref())?;
    if let Some(only) = args.only {
        config.stages.retain(|request| request.kind == only);
        if config.stages.is_empty() {
            return Err(KiraError::InvalidStage(format!("{only} is not configured")).into());
        }
    }

    let app = connect(&config)?;
    let result = match output_mode {
        OutputMode::NonInteractive => app.run(&config.stages, &JsonOutput)?,
        OutputMode::Interactive => app.run(&config.stages, &ConsoleOutput)?,
    };
    print_run(&result, output_mode)
}

fn run_stage(args: StageArgs, output_mode: OutputMode) -> miette::Result<()> {
    let mut config = ResolvedConfig {
        store_dir: args.store_dir.map(PathBuf::from),
        use_cache: !args.no_cache,
        ..ResolvedConfig::default()
    };
    if let Some(label) = args.no_match_label {
        config.no_match_label = label;
    }
    if let Some(similarity) = args.similarity {
        config.similarity = similarity;
    }
    let request = StageRequest {
        kind: args.stage,
        errors: args.errors.unwrap_or_else(|| errors_beside(&args.output)),
        input: args.input,
        output: args.output,
    };

    let app = connect(&config)?;
    let result = app.run_stage(&request, sink(output_mode))?;
    print_stage(&result, output_mode)
}

fn run_explode(args: ExplodeArgs, output_mode: OutputMode) -> miette::Result<()> {
    let fields: Vec<&str> = if args.fields.is_empty() {
        BINDING_FIELDS.to_vec()
    } else {
        args.fields.iter().map(|field| field.trim()).collect()
    };
    let request = StageRequest {
        kind: StageKind::Explode,
        errors: args.errors.unwrap_or_else(|| errors_beside(&args.output)),
        input: args.input,
        output: args.output,
    };
    let label = args
        .no_match_label
        .unwrap_or_else(|| ResolvedConfig::default().no_match_label);

    // Expansion never calls out, so no clients are built.
    let app = App::new(Session::new(), label);
    let result = app.explode(&request, &fields, sink(output_mode))?;
    print_stage(&result, output_mode)
}

fn connect(config: &ResolvedConfig) -> miette::Result<App> {
    let store = match &config.store_dir {
        Some(dir) => {
            let root = Utf8PathBuf::from_path_buf(dir.clone())
                .map_err(|_| KiraError::Filesystem("non-utf8 store path".to_string()))?;
            Store::with_project_root(root)?
        }
        None => Store::new()?,
    };
    let session = Session::connect(config, store)?;
    Ok(App::new(session, config.no_match_label.clone()))
}

fn sink(output_mode: OutputMode) -> &'static dyn ProgressSink {
    match output_mode {
        OutputMode::NonInteractive => &JsonOutput,
        OutputMode::Interactive => &ConsoleOutput,
    }
}

fn errors_beside(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{stem}-errors.csv"))
}

fn print_run(result: &RunResult, output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_run(result).into_diagnostic(),
        OutputMode::Interactive => {
            ConsoleOutput::print_run(result);
            Ok(())
        }
    }
}

fn print_stage(result: &StageResult, output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_stage(result).into_diagnostic(),
        OutputMode::Interactive => {
            ConsoleOutput::print_stage(result);
            Ok(())
        }
    }
}
