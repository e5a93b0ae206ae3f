//! json-schema-engine CLI
//!
//! Command-line interface for checking schemas and validating instances.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use json_schema_engine::{
    load_schema, load_schema_auto, source_uri, BuildError, Dialect, Library, LogLevel,
    SchemaValidator, ValidationReport, ValidatorBuilder, ValidatorOptions, DEFAULT_MAX_DEPTH,
};

#[derive(Parser)]
#[command(name = "json-schema-engine")]
#[command(about = "Check JSON Schemas and validate JSON instances (draft-04, draft-07)")]
#[command(version)]
struct Cli {
    /// Enable verbose logging on stderr. Repeat for more (-v, -vv).
    /// RUST_LOG takes precedence when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate instance documents against a schema
    Validate {
        /// Instance files to validate
        #[arg(required = true)]
        instances: Vec<PathBuf>,

        /// Schema source: file path or URL (http:// or https://)
        #[arg(long, short)]
        schema: String,

        /// Dialect to use instead of the one named by `$schema` (4 or 7)
        #[arg(long, value_parser = parse_draft)]
        draft: Option<Dialect>,

        /// Output reports as JSON (for automation)
        #[arg(long)]
        json: bool,

        /// Minimum level of messages to report
        #[arg(long, default_value = "info", value_parser = parse_level)]
        level: LogLevel,

        /// Maximum instance nesting depth
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },

    /// Check a schema's syntax and references without validating anything
    Check {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Dialect to use instead of the one named by `$schema` (4 or 7)
        #[arg(long, value_parser = parse_draft)]
        draft: Option<Dialect>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_draft(s: &str) -> Result<Dialect, String> {
    match s {
        "4" | "draft4" | "draft-04" => Ok(Dialect::Draft4),
        "7" | "draft7" | "draft-07" => Ok(Dialect::Draft7),
        _ => Err(format!("unsupported draft \"{}\" (expected 4 or 7)", s)),
    }
}

fn parse_level(s: &str) -> Result<LogLevel, String> {
    LogLevel::parse(s).ok_or_else(|| {
        format!(
            "unknown level \"{}\" (expected debug, info, warning, error or fatal)",
            s
        )
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match cli.verbose {
            0 => "warn",
            1 => "json_schema_engine=debug",
            _ => "json_schema_engine=trace",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Validate {
            instances,
            schema,
            draft,
            json,
            level,
            max_depth,
        } => {
            let options = ValidatorOptions::new().log_level(level).max_depth(max_depth);
            run_validate(&schema, &instances, draft, options, json)
        }
        Commands::Check {
            schema,
            draft,
            json,
        } => run_check(&schema, draft, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Load and build the schema. Syntax reports are printed here.
fn build(
    source: &str,
    draft: Option<Dialect>,
    options: ValidatorOptions,
    json_output: bool,
) -> Result<SchemaValidator, u8> {
    let schema = load_schema_auto(source).map_err(|e| {
        report_error(json_output, &format!("loading schema: {}", e));
        e.exit_code() as u8
    })?;

    let library = match draft {
        Some(dialect) => Library::for_dialect(dialect),
        None => Library::for_schema(&schema),
    };
    let mut builder = ValidatorBuilder::new().library(library).options(options);
    if let Some(base) = source_uri(source) {
        builder = builder.base_uri(base);
    }

    builder.build(&schema).map_err(|e| {
        match &e {
            BuildError::Syntax { report } => {
                print_report(json_output, source, report);
                if !json_output {
                    eprintln!("Error: {}", e);
                }
            }
            BuildError::Engine(inner) => report_error(json_output, &inner.to_string()),
        }
        e.exit_code() as u8
    })
}

fn run_check(source: &str, draft: Option<Dialect>, json_output: bool) -> Result<(), u8> {
    let options = ValidatorOptions::new().log_level(LogLevel::Info);
    let validator = build(source, draft, options, json_output)?;
    let report = validator.syntax_report();
    print_report(json_output, source, report);
    Ok(())
}

fn run_validate(
    source: &str,
    instances: &[PathBuf],
    draft: Option<Dialect>,
    options: ValidatorOptions,
    json_output: bool,
) -> Result<(), u8> {
    let validator = build(source, draft, options, json_output)?;

    let mut worst = 0u8;
    for path in instances {
        let code = match validate_one(&validator, path, json_output) {
            Ok(report) if report.is_success() => 0,
            Ok(_) => 1,
            Err(code) => code,
        };
        worst = worst.max(code);
    }

    if worst == 0 {
        Ok(())
    } else {
        Err(worst)
    }
}

fn validate_one(
    validator: &SchemaValidator,
    path: &Path,
    json_output: bool,
) -> Result<ValidationReport, u8> {
    let label = path.display().to_string();
    let instance = load_schema(path).map_err(|e| {
        report_error(json_output, &format!("loading instance {}: {}", label, e));
        e.exit_code() as u8
    })?;

    let report = validator.validate(&instance).map_err(|e| {
        report_error(json_output, &format!("validating {}: {}", label, e));
        e.exit_code() as u8
    })?;

    print_report(json_output, &label, &report);
    Ok(report)
}

fn print_report(json_output: bool, label: &str, report: &ValidationReport) {
    if json_output {
        let mut output = serde_json::to_value(report).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut output {
            map.insert("source".into(), json!(label));
        }
        println!("{}", output);
        return;
    }

    let verdict = if report.is_success() { "valid" } else { "invalid" };
    println!("{}: {}", label, verdict);
    for message in report {
        println!("  {}", message);
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", json!({"success": false, "error": msg}));
    } else {
        eprintln!("Error: {}", msg);
    }
}
