//! Surveylab: survey harmonization and statistical testing CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use surveylab::analysis::AnalysisEngine;
use surveylab::cache::BootstrapCache;
use surveylab::config::{default_config_json, load_config, CliOverrides, Config, CONFIG_FILENAME};
use surveylab::ingest::{load_dataset, write_harmonized};
use surveylab::reporter::{ConsoleReporter, CsvExporter, JsonReporter, MarkdownReporter, SvgReporter};
use surveylab::watcher::ExportWatcher;
use surveylab::{data_dir, StudyReport};
use tracing_subscriber::EnvFilter;

/// Surveylab: harmonize questionnaire exports and run the analysis battery
#[derive(Parser, Debug)]
#[command(name = "surveylab")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// CSV export or directory of exports (omit when using a subcommand)
    path: Option<PathBuf>,

    /// Output the report as JSON on stdout
    #[arg(long, short)]
    json: bool,

    /// Write a Markdown report to FILE
    #[arg(long, value_name = "FILE")]
    markdown: Option<PathBuf>,

    /// Write SVG figures and CSV matrices to DIR
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Path to config file (default: search .surveylabrc.json in the data directory and parents)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Significance level
    #[arg(long)]
    alpha: Option<f64>,

    /// Bootstrap iterations per variant pair
    #[arg(long, value_name = "N")]
    iterations: Option<usize>,

    /// Bootstrap RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the bootstrap validator
    #[arg(long)]
    no_bootstrap: bool,

    /// Minimum number of valid respondents (exit 1 if below)
    #[arg(long, value_name = "N")]
    min_valid: Option<usize>,

    /// Quiet mode (one line per test)
    #[arg(long, short)]
    quiet: bool,

    /// Verbose output and debug logging
    #[arg(long, short)]
    verbose: bool,

    /// Disable the bootstrap cache
    #[arg(long)]
    no_cache: bool,

    /// Clear the bootstrap cache before running
    #[arg(long)]
    clear_cache: bool,

    /// Number of parallel threads (default: number of CPU cores)
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,

    /// Watch for export changes and re-run
    #[arg(long)]
    watch: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create .surveylabrc.json with the default settings
    Init {
        /// Directory in which to create config (default: current)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Write the harmonized dataset as one CSV file
    Harmonize {
        /// CSV export or directory of exports
        path: PathBuf,

        /// Output CSV file
        #[arg(long, short)]
        output: PathBuf,

        /// Path to config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Some(cmd) = &args.command {
        return match cmd {
            Commands::Init { dir } => run_init(dir.as_deref()),
            Commands::Harmonize {
                path,
                output,
                config,
            } => run_harmonize(path, output, config.as_deref(), args.quiet),
        };
    }

    let path = args
        .path
        .clone()
        .context("a data path is required when not using a subcommand")?;

    if let Some(alpha) = args.alpha {
        if !(alpha > 0.0 && alpha < 1.0) {
            anyhow::bail!("--alpha must be between 0 and 1, got {}", alpha);
        }
    }

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok();
    }

    if args.watch {
        return run_watch(&args, &path);
    }

    analyze_once(&args, &path)
}

fn load(args: &Args, path: &Path) -> Result<Config> {
    let config = load_config(&data_dir(path), args.config.as_deref())?;
    Ok(config.merge_with_cli(CliOverrides {
        alpha: args.alpha,
        min_valid: args.min_valid,
        iterations: args.iterations,
        seed: args.seed,
        no_bootstrap: args.no_bootstrap,
    }))
}

fn analyze_once(args: &Args, path: &Path) -> Result<ExitCode> {
    let config = load(args, path)?;
    let settings = config.settings();
    let dataset = load_dataset(path, &config)?;

    // Set up cache
    let mut cache = if args.no_cache {
        BootstrapCache::disabled()
    } else {
        BootstrapCache::new(&data_dir(path))
    };
    if args.clear_cache {
        cache.clear();
        if !args.quiet {
            eprintln!("{}: Cache cleared", "Info".blue());
        }
    }

    if args.verbose {
        let stats = cache.stats();
        eprintln!(
            "{}: Cache {} ({} entries)",
            "Info".blue(),
            if stats.enabled { "enabled" } else { "disabled" },
            stats.entries
        );
    }

    let cache_key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let fingerprint = BootstrapCache::fingerprint(&dataset, &settings);
    let mut engine = AnalysisEngine::new(settings.clone());
    if let Some(cached) = cache.get(&cache_key, &fingerprint) {
        engine = engine.with_cached_bootstrap(cached);
    }

    let report = engine.run(&dataset)?;

    if let Some(bootstrap) = &report.bootstrap {
        cache.set(&cache_key, &fingerprint, bootstrap.clone());
    }
    if let Err(e) = cache.save() {
        if !args.quiet {
            eprintln!("{}: Failed to save cache: {}", "Warning".yellow(), e);
        }
    }

    write_outputs(args, &report)?;

    if report.sample.valid < settings.min_valid {
        eprintln!(
            "{}: {} valid respondents, below the minimum of {}",
            "Warning".yellow(),
            report.sample.valid,
            settings.min_valid
        );
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

fn write_outputs(args: &Args, report: &StudyReport) -> Result<()> {
    if args.json {
        println!("{}", JsonReporter::new().pretty().report(report));
    } else if args.quiet {
        ConsoleReporter::new().report_quiet(report);
    } else {
        let mut reporter = ConsoleReporter::new();
        if args.verbose {
            reporter = reporter.verbose();
        }
        reporter.report(report);
    }

    if let Some(markdown) = &args.markdown {
        fs::write(markdown, MarkdownReporter::new().report(report))
            .with_context(|| format!("Failed to write Markdown report: {}", markdown.display()))?;
        if !args.quiet {
            eprintln!("{}: Wrote {}", "Info".blue(), markdown.display());
        }
    }

    if let Some(out_dir) = &args.out_dir {
        let mut written = SvgReporter::new(out_dir).report(report)?;
        if let Some(psychometrics) = &report.psychometrics {
            written.extend(CsvExporter::new(out_dir).report(psychometrics)?);
        }
        if !args.quiet {
            eprintln!(
                "{}: Wrote {} files to {}",
                "Info".blue(),
                written.len(),
                out_dir.display()
            );
        }
    }
    Ok(())
}

fn run_init(dir: Option<&Path>) -> Result<ExitCode> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let dir = dir.unwrap_or(&cwd);
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() {
        eprintln!(
            "{}: {} already exists; use --dir to write elsewhere or remove it first",
            "Warning".yellow(),
            config_path.display()
        );
        return Ok(ExitCode::SUCCESS);
    }

    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    fs::write(&config_path, default_config_json())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("{} {}", "Created".green(), config_path.display());
    Ok(ExitCode::SUCCESS)
}

fn run_harmonize(path: &Path, output: &Path, config: Option<&Path>, quiet: bool) -> Result<ExitCode> {
    let config = load_config(&data_dir(path), config)?;
    let dataset = load_dataset(path, &config)?;
    write_harmonized(&dataset, output)?;
    if !quiet {
        eprintln!(
            "{}: {} respondents ({} valid) from {} export(s) written to {}",
            "Info".blue(),
            dataset.len(),
            dataset.valid_count(),
            dataset.sources.len(),
            output.display()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_watch(args: &Args, path: &Path) -> Result<ExitCode> {
    let mut watcher = ExportWatcher::watch(path).context("Failed to create file watcher")?;
    if let Some(out_dir) = &args.out_dir {
        // Exported matrices are CSV files; they must not trigger another run
        fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create {}", out_dir.display()))?;
        watcher = watcher.ignoring(out_dir);
    }

    if let Err(e) = analyze_once(args, path) {
        eprintln!("{}: {:#}", "Error".red(), e);
    }
    eprintln!("{}: Watching for changes... (Ctrl+C to stop)", "Info".blue());

    loop {
        let changes = watcher.next_changes();
        if changes.is_empty() {
            continue;
        }
        for change in &changes {
            eprintln!("{}: {} changed", "Info".blue(), change.display());
        }
        if let Err(e) = analyze_once(args, path) {
            eprintln!("{}: {:#}", "Error".red(), e);
        }
    }
}
