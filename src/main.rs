//! `flowtest` CLI: a thin shell around `flowtest_engine`. Discovers suites
//! under a directory, wires the default collaborators (a real `reqwest`
//! HTTP client, `dialoguer` interactive prompts, a no-op certificate
//! service, the default faker catalogue), runs the scheduler, and prints
//! the aggregated `ExecutionReport` as JSON.

use clap::{Parser, Subcommand};
use flowtest_engine::collaborators::{
    DialoguerInputPrompter, FileSuiteSource, NoopCertificateService, ReqwestHttpClient, SuiteSource,
};
use flowtest_engine::executor::{Services, StepFilter, SuiteExecutor};
use flowtest_engine::faker::DefaultFakerProvider;
use flowtest_engine::limits::ExecutionLimits;
use flowtest_engine::model::Priority;
use flowtest_engine::observer::TracingObserver;
use flowtest_engine::scheduler::Scheduler;
use flowtest_engine::telemetry::{self, TelemetryConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Level;

#[derive(Parser)]
#[command(name = "flowtest")]
#[command(about = "Declarative YAML-driven HTTP flow test execution kernel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discovers suites under a directory and runs them to completion.
    Run {
        /// Directory to walk for `*.yaml`/`*.yml` suite files.
        #[arg(short, long)]
        dir: PathBuf,

        /// Path to write the JSON execution report. Printed to stdout if omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Runs independent suites concurrently (bounded by `max_parallel_suites`).
        /// Forced off whenever any discovered suite has an interactive input step.
        #[arg(long, default_value = "false")]
        parallel: bool,

        /// Restricts execution to these step ids (`stepId` or `suite::stepId`).
        #[arg(long = "step-id")]
        step_ids: Vec<String>,

        /// Restricts execution to suites at these priority levels.
        #[arg(long = "priority")]
        priorities: Vec<String>,

        /// Non-interactive mode: every input step resolves to `ci_default` or
        /// its plain default, without reading stdin.
        #[arg(long, default_value = "false")]
        ci: bool,

        /// Per-request HTTP timeout in milliseconds, absent a suite/step override.
        #[arg(long, default_value = "60000")]
        timeout_ms: u64,

        /// Enables exporting traces to an OTLP collector.
        #[arg(long, default_value = "false")]
        otel: bool,

        /// OTLP collector endpoint; falls back to `OTEL_EXPORTER_OTLP_ENDPOINT`.
        #[arg(long)]
        otel_endpoint: Option<String>,

        /// Suppresses info-level logs; only warnings/errors reach stderr.
        #[arg(long, short = 's', default_value = "false")]
        silent: bool,

        /// Emits debug-level logs (interpolation, capture, hook detail).
        #[arg(long, short = 'v', default_value = "false")]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            dir,
            output,
            parallel,
            step_ids,
            priorities,
            ci,
            timeout_ms,
            otel,
            otel_endpoint,
            silent,
            verbose,
        } => {
            let mut telemetry_config = TelemetryConfig::from_env();
            telemetry_config.log_level = if silent {
                Level::ERROR
            } else if verbose {
                Level::DEBUG
            } else {
                Level::INFO
            };
            if otel {
                telemetry_config.otlp_endpoint = otel_endpoint.or(telemetry_config.otlp_endpoint);
            }

            let _tracer = match telemetry::init_telemetry(telemetry_config) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("failed to initialize telemetry: {}", e);
                    None
                }
            };

            let code = run(RunArgs {
                dir,
                output,
                parallel,
                step_ids,
                priorities,
                ci,
                timeout_ms,
            })
            .await;

            telemetry::shutdown_telemetry();
            code
        }
    }
}

struct RunArgs {
    dir: PathBuf,
    output: Option<PathBuf>,
    parallel: bool,
    step_ids: Vec<String>,
    priorities: Vec<String>,
    ci: bool,
    timeout_ms: u64,
}

async fn run(args: RunArgs) -> ExitCode {
    let priority_filter: Vec<Priority> = args
        .priorities
        .iter()
        .filter_map(|p| Priority::from_str(p).ok())
        .collect();

    let source: Arc<dyn flowtest_engine::collaborators::SuiteSource> =
        Arc::new(FileSuiteSource::new(&args.dir));
    let discovered = match source.discover() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("suite discovery failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let discovered: Vec<_> = if priority_filter.is_empty() {
        discovered
    } else {
        discovered
            .into_iter()
            .filter(|s| priority_filter.contains(&s.priority))
            .collect()
    };

    let mut limits = ExecutionLimits::from_env();
    limits.max_step_timeout = Duration::from_millis(args.timeout_ms);

    let observer = Arc::new(TracingObserver);
    let http = Arc::new(ReqwestHttpClient::new(Duration::from_millis(args.timeout_ms)));
    let prompter = Arc::new(DialoguerInputPrompter);
    let certificate_service = Arc::new(NoopCertificateService);
    let faker = Arc::new(DefaultFakerProvider);
    let step_filter = StepFilter::from_entries(&args.step_ids);

    let services = Services::from_env(
        source.clone(),
        http,
        prompter,
        certificate_service,
        faker,
        observer.clone(),
        limits.clone(),
        args.ci,
        step_filter,
    );
    let executor = Arc::new(SuiteExecutor::new(services));
    let registry = Arc::new(Mutex::new(flowtest_engine::context::GlobalRegistry::new()));

    let scheduler = Scheduler::new(limits, observer).with_parallel(args.parallel);
    let cancel = CancellationToken::new();

    let report = scheduler
        .execute(discovered, source, executor, registry, cancel)
        .await;

    let rendered = match serde_json::to_string_pretty(&report) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to serialize execution report: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match &args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &rendered) {
                eprintln!("failed to write report to {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
        None => println!("{}", rendered),
    }

    if report.summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
