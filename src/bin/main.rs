//! dtspec CLI - generate test data and assert transformation results
//!
//! Usage:
//!   dtspec generate --spec <spec.json> [--out <sources.json>]
//!   dtspec assert --spec <spec.json> --actuals <actuals.json>
//!   dtspec docs --spec <spec.json>
//!   dtspec validate --spec <spec.json>
//!
//! Examples:
//!   dtspec generate --spec spec.json --seed 42 --out sources.json
//!   dtspec assert --spec spec.json --seed 42 --actuals actuals.json --scenarios Enrollment

use clap::{Parser, Subcommand};
use dtspec::config::Settings;
use dtspec::spec::{actuals_from_file, SpecDocument};
use dtspec::{Api, ApiOptions};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{warn, Level};

#[derive(Parser)]
#[command(name = "dtspec")]
#[command(about = "dtspec - Spec-driven test data for data transformations")]
#[command(version)]
struct Cli {
    /// Path to a dtspec.toml settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<Level>,

    /// Only run scenarios whose name matches this regex
    #[arg(long, global = true)]
    scenarios: Option<String>,

    /// Only run cases whose name matches this regex
    #[arg(long, global = true)]
    cases: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate source data and write it as JSON
    Generate {
        /// Path to the spec file (.json or .toml)
        #[arg(short, long)]
        spec: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Seed for generated values
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Regenerate source data, load actual results and assert expectations
    Assert {
        /// Path to the spec file (.json or .toml)
        #[arg(short, long)]
        spec: Option<PathBuf>,

        /// Path to the actuals JSON file
        #[arg(short, long)]
        actuals: Option<PathBuf>,

        /// Seed used when the source data was generated
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print markdown documentation for a spec
    Docs {
        /// Path to the spec file (.json or .toml)
        #[arg(short, long)]
        spec: Option<PathBuf>,
    },

    /// Validate a spec without generating data
    Validate {
        /// Path to the spec file (.json or .toml)
        #[arg(short, long)]
        spec: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(cli.log_level, &settings);

    let ctx = Context {
        scenarios: cli.scenarios.or_else(|| settings.selection.scenarios.clone()),
        cases: cli.cases.or_else(|| settings.selection.cases.clone()),
        settings,
    };

    match cli.command {
        Commands::Generate { spec, out, seed } => cmd_generate(&ctx, spec, out, seed),
        Commands::Assert {
            spec,
            actuals,
            seed,
        } => cmd_assert(&ctx, spec, actuals, seed),
        Commands::Docs { spec } => cmd_docs(&ctx, spec),
        Commands::Validate { spec } => cmd_validate(&ctx, spec),
    }
}

struct Context {
    settings: Settings,
    scenarios: Option<String>,
    cases: Option<String>,
}

impl Context {
    fn spec_path(&self, spec: Option<PathBuf>) -> Result<PathBuf, String> {
        if let Some(path) = spec {
            return Ok(path);
        }
        self.settings
            .paths
            .spec()
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "no spec file given (use --spec or [paths] spec)".to_string())
    }

    fn load_spec(&self, spec: Option<PathBuf>) -> Result<SpecDocument, String> {
        let path = self.spec_path(spec)?;
        let document = SpecDocument::from_file(&path)
            .map_err(|e| format!("Error loading spec '{}': {}", path.display(), e))?;
        document
            .select(self.scenarios.as_deref(), self.cases.as_deref())
            .map_err(|e| e.to_string())
    }

    /// The seed a run uses: the `--seed` flag, then `[generation] seed`.
    fn seed(&self, flag: Option<u64>) -> Option<u64> {
        flag.or(self.settings.generation.seed)
    }

    fn api(&self, spec: Option<PathBuf>, seed: Option<u64>) -> Result<Api, String> {
        let document = self.load_spec(spec)?;
        let mut options = ApiOptions::from(&self.settings.generation);
        if seed.is_some() {
            options.seed = seed;
        }
        Api::new(document, options).map_err(|e| format!("Invalid spec: {}", e))
    }
}

/// Level from `--log-level`, then `DTSPEC_LOG_LEVEL`, then the settings file.
fn init_logging(flag: Option<Level>, settings: &Settings) {
    let level = flag
        .or_else(|| env::var("DTSPEC_LOG_LEVEL").ok()?.parse().ok())
        .or_else(|| settings.logging.level.as_deref()?.parse().ok())
        .unwrap_or(Level::WARN);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_generate(ctx: &Context, spec: Option<PathBuf>, out: Option<PathBuf>, seed: Option<u64>) -> ExitCode {
    let mut api = match ctx.api(spec, seed) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if ctx.seed(seed).is_none() {
        warn!("generating without a seed; this data cannot be asserted later (use --seed or [generation] seed)");
    }

    if let Err(e) = api.generate_sources() {
        eprintln!("Generation error: {}", e);
        return ExitCode::FAILURE;
    }

    let json = match serde_json::to_string_pretty(&api.source_data()) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing source data: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let out = out.or_else(|| ctx.settings.paths.sources_out().ok().flatten());
    match out {
        Some(path) => {
            if let Err(e) = fs::write(&path, json) {
                eprintln!("Error writing '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
            eprintln!("Wrote source data to {}", path.display());
        }
        None => println!("{}", json),
    }
    ExitCode::SUCCESS
}

fn cmd_assert(ctx: &Context, spec: Option<PathBuf>, actuals: Option<PathBuf>, seed: Option<u64>) -> ExitCode {
    let mut api = match ctx.api(spec, seed) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Identifiers must be regenerated exactly as they were for the actuals.
    if ctx.seed(seed).is_none() {
        eprintln!("A seed is required to assert (use --seed or [generation] seed)");
        return ExitCode::FAILURE;
    }

    let actuals_path = match actuals.or_else(|| ctx.settings.paths.actuals().ok().flatten()) {
        Some(path) => path,
        None => {
            eprintln!("No actuals file given (use --actuals or [paths] actuals)");
            return ExitCode::FAILURE;
        }
    };

    let actuals = match actuals_from_file(&actuals_path) {
        Ok(actuals) => actuals,
        Err(e) => {
            eprintln!("Error loading actuals '{}': {}", actuals_path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = api.generate_sources() {
        eprintln!("Generation error: {}", e);
        return ExitCode::FAILURE;
    }
    if let Err(e) = api.load_actuals(&actuals) {
        eprintln!("Error loading actuals: {}", e);
        return ExitCode::FAILURE;
    }

    let report = api.assert_expectations();
    println!("{}", report);
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        eprintln!("There were dtspec assertion errors");
        ExitCode::FAILURE
    }
}

fn cmd_docs(ctx: &Context, spec: Option<PathBuf>) -> ExitCode {
    match ctx.api(spec, None) {
        Ok(api) => {
            println!("{}", api.to_markdown());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_validate(ctx: &Context, spec: Option<PathBuf>) -> ExitCode {
    match ctx.api(spec, None) {
        Ok(api) => {
            let cases: usize = api.scenarios().iter().map(|s| s.cases().len()).sum();
            println!(
                "✓ Valid spec: {} scenarios, {} cases",
                api.scenarios().len(),
                cases
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
