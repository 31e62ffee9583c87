//! Denoise Regress CLI - regression testing for the denoiser filters
//!
//! Resolves directories and suites from the command line and environment,
//! then hands a complete configuration to the core orchestrator.

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use denoise_regress_core::config::{default_emulator, default_suite_path, load_suites};
use denoise_regress_core::{
    Arch, DiskFs, Filter, HarnessConfig, Mode, Orchestrator, RegressError, BASELINE_VERSION,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(
    name = "denoise-regress",
    version,
    about = "Runs all denoiser tests, comparing produced images against generated baselines",
    after_help = "EXAMPLES:\n  \
                  # Generate baseline images (once per baseline version)\n  \
                  denoise-regress baseline\n\n  \
                  # Run smoke checks and the regression matrix\n  \
                  denoise-regress run --log test.log\n\n  \
                  # Full matrix for the lightmap filter under AVX-512 emulation\n  \
                  denoise-regress run --full -f RTLightmap -a skx\n\n  \
                  # List the cases a run would execute\n  \
                  denoise-regress run --dry-run"
)]
struct Cli {
    /// Generate baselines or run the tests
    #[arg(value_enum, default_value_t = HarnessCommand::Run)]
    command: HarnessCommand,

    /// Device to test
    #[arg(short, long, default_value = "default")]
    device: String,

    /// Filters to test (all when omitted)
    #[arg(short, long, num_args = 1..)]
    filter: Vec<Filter>,

    /// Build directory
    #[arg(short = 'B', long)]
    build_dir: Option<PathBuf>,

    /// Install directory
    #[arg(short = 'I', long)]
    install_dir: Option<PathBuf>,

    /// Directory of datasets (e.g. training, validation, test)
    #[arg(short = 'D', long)]
    data_dir: Option<PathBuf>,

    /// Directory of training results
    #[arg(short = 'R', long)]
    results_dir: Option<PathBuf>,

    /// Directory of generated baseline images
    #[arg(short = 'G', long)]
    baseline_dir: Option<PathBuf>,

    /// CPU architecture to test (non-native requires the instruction-set emulator)
    #[arg(short, long, default_value = "native")]
    arch: Arch,

    /// Run minimal tests
    #[arg(long)]
    minimal: bool,

    /// Run full tests
    #[arg(long)]
    full: bool,

    /// Output log file
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Source tree root (defaults to the current directory)
    #[arg(long)]
    root_dir: Option<PathBuf>,

    /// Directory holding the conversion and inference scripts
    #[arg(long)]
    tools_dir: Option<PathBuf>,

    /// Interpreter used to run the tool scripts
    #[arg(long)]
    python: Option<PathBuf>,

    /// TOML file declaring the regression suites
    #[arg(long)]
    suites: Option<PathBuf>,

    /// Print the test cases (or baseline steps) without executing them
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum HarnessCommand {
    Baseline,
    Run,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // -v forces debug output, otherwise RUST_LOG applies with warn as the fallback
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::WARN.as_str()))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: failed to set tracing subscriber");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            println!("Error: {err:#}");
            let code = err
                .downcast_ref::<RegressError>()
                .map_or(1, RegressError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let dry_run = cli.dry_run;
    let config = build_config(cli)?;
    config.validate()?;
    debug!("Configuration: {:?}", config);

    let orchestrator = Orchestrator::new(&config, &DiskFs);
    if dry_run {
        let names = orchestrator.plan()?;
        for name in &names {
            println!("{name}");
        }
        match config.mode {
            Mode::Baseline => println!("{} baseline steps", names.len()),
            Mode::Run => println!("{} test cases", names.len()),
        }
        return Ok(());
    }

    let summary = orchestrator.run()?;
    debug!(
        "Executed {} commands, skipped {} cases",
        summary.executed, summary.skipped
    );
    if config.mode == Mode::Run {
        println!("Success: all tests passed");
    }
    Ok(())
}

fn build_config(cli: Cli) -> Result<HarnessConfig> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let root = absolute(&cwd, cli.root_dir.unwrap_or_else(|| cwd.clone()));
    let mode = match cli.command {
        HarnessCommand::Baseline => Mode::Baseline,
        HarnessCommand::Run => Mode::Run,
    };

    let mut config = HarnessConfig::new(mode, &root);
    let training_dir = env_dir("OIDN_TRAINING_DIR").unwrap_or_else(|| root.join("training"));
    config.data_dir = cli.data_dir.unwrap_or_else(|| training_dir.join("data"));
    config.results_dir = cli.results_dir.unwrap_or_else(|| training_dir.join("results"));
    config.baseline_dir = cli
        .baseline_dir
        .unwrap_or_else(|| training_dir.join(format!("baseline_{BASELINE_VERSION}")));
    config.tools_dir = cli.tools_dir.unwrap_or_else(|| root.join("training"));

    let build_dir = absolute(&cwd, cli.build_dir.unwrap_or_else(|| root.join("build")));
    let install_dir = absolute(&cwd, cli.install_dir.unwrap_or_else(|| root.join("install")));
    let install_bin = install_dir.join("bin");
    config.bin_dir = if install_bin.is_dir() {
        install_bin
    } else {
        build_dir
    };
    config.emulator = match env_dir("OIDN_SDE_DIR") {
        Some(dir) => dir.join(default_emulator()),
        None => PathBuf::from(default_emulator()),
    };

    config.device = (cli.device != "default").then_some(cli.device);
    config.arch = cli.arch;
    config.minimal = cli.minimal;
    config.full = cli.full;
    config.log = cli.log;
    config.interpreter = cli.python;
    config.filters = cli.filter;

    let explicit_suites = cli.suites.is_some();
    if let Some(path) = cli.suites.or_else(default_suite_path) {
        if explicit_suites && !path.is_file() {
            anyhow::bail!("Suite file does not exist: {}", path.display());
        }
        config.suites = load_suites(&path)
            .with_context(|| format!("Failed to load suites from {}", path.display()))?;
    }
    Ok(config)
}

/// Platform-suffixed directory override, e.g. `OIDN_TRAINING_DIR_LINUX`.
fn env_dir(prefix: &str) -> Option<PathBuf> {
    let name = format!("{prefix}_{}", std::env::consts::OS.to_uppercase());
    std::env::var_os(name).map(PathBuf::from)
}

fn absolute(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}
