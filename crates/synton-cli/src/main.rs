#![doc = include_str!("../README.md")]

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic};
use tracing::info;
use tracing_subscriber::EnvFilter;

use synton_ast::Program;
use synton_engine::pipeline::{PassReport, Pipeline, PipelineOptions, ReportStatus};
use synton_engine::session::{backend_err, SessionOptions};
use synton_smt::backends::process_backend::ProcessSolver;

#[derive(Parser)]
#[command(name = "synton")]
#[command(about = "Contract verification and structured diagnostics for Synton programs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify every annotated function and call site in a program dump.
    Verify {
        /// JSON AST dump produced by the frontend.
        program: PathBuf,

        /// Output format: a human-readable summary or the full pass report
        /// with its Debug State Objects.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Per-unit verification deadline in milliseconds.
        #[arg(long, default_value_t = 500)]
        timeout_ms: u64,

        /// Solver binary to drive over SMT-LIB2 pipes.
        #[arg(long, value_enum, default_value_t = SolverChoice::Z3)]
        solver: SolverChoice,

        /// Worker threads; 0 sizes the pool to the available cores.
        #[arg(long, default_value_t = 0)]
        jobs: usize,

        /// Unroll quantifiers over literal ranges up to this width.
        #[arg(long, default_value_t = 0)]
        max_unroll: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SolverChoice {
    Z3,
    Cvc5,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => ExitCode::from(code),
        Err(report) => {
            eprintln!("{report:?}");
            ExitCode::from(2)
        }
    }
}

fn run() -> miette::Result<u8> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Verify {
            program,
            format,
            timeout_ms,
            solver,
            jobs,
            max_unroll,
        } => {
            let source = fs::read_to_string(&program)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to read {}", program.display()))?;
            let program: Program = serde_json::from_str(&source)
                .into_diagnostic()
                .wrap_err("failed to parse the program dump")?;

            let options = PipelineOptions {
                session: SessionOptions {
                    timeout: Duration::from_millis(timeout_ms),
                    max_unroll,
                    ..SessionOptions::default()
                },
                jobs,
            };
            let factory = move || {
                match solver {
                    SolverChoice::Z3 => ProcessSolver::z3(Some(timeout_ms)),
                    SolverChoice::Cvc5 => ProcessSolver::cvc5(Some(timeout_ms)),
                }
                .map_err(backend_err)
            };

            info!(functions = program.functions.len(), call_sites = program.call_sites.len(), "verifying program");
            let pipeline = Pipeline::new(factory, options);
            let report = pipeline.verify_program(&program);

            match format {
                OutputFormat::Text => print!("{}", render_text(&report)),
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&report).into_diagnostic()?;
                    println!("{json}");
                }
            }
            Ok(report.exit_code())
        }
    }
}

fn status_label(status: ReportStatus) -> &'static str {
    match status {
        ReportStatus::Verified => "verified",
        ReportStatus::Violated => "VIOLATED",
        ReportStatus::Inconsistent => "INCONSISTENT",
        ReportStatus::Unknown => "unknown",
        ReportStatus::TimedOut => "timed out",
        ReportStatus::IllFormed => "ILL-FORMED",
        ReportStatus::Unsupported => "UNSUPPORTED",
        ReportStatus::InternalError => "INTERNAL ERROR",
        ReportStatus::Cancelled => "cancelled",
    }
}

fn render_text(report: &PassReport) -> String {
    let mut out = String::new();
    for unit in &report.units {
        out.push_str(&format!("{:<15} {}\n", status_label(unit.status), unit.unit));
        for dso in &unit.diagnostics {
            out.push_str(&format!(
                "    [{}] expected {}, got {}\n",
                dso.error_code, dso.error_details.expected, dso.error_details.actual
            ));
            if let Some(best) = dso.suggestions.first() {
                out.push_str(&format!("    suggestion: {}\n", best.description));
            }
        }
    }

    let verified = report.count(ReportStatus::Verified);
    let violated = report.count(ReportStatus::Violated);
    let inconsistent = report.count(ReportStatus::Inconsistent);
    let warnings =
        report.count(ReportStatus::Unknown) + report.count(ReportStatus::TimedOut);
    out.push_str(&format!(
        "{} unit(s): {verified} verified, {violated} violated, {inconsistent} inconsistent, {warnings} undecided\n",
        report.units.len()
    ));
    out
}
