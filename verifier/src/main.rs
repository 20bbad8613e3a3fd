//! `shipcheck` CLI entrypoint.
//!
//! This binary verifies built desktop installers against the packaging
//! config: it discovers or accepts the artefacts, inspects each in turn and
//! reports every finding. Mounts and scratch directories are released on
//! every exit path, including interrupt and termination signals.

use camino::Utf8Path;
use clap::Parser;
use log::{info, warn};
use shipcheck_verifier::artefact::{Artefact, Platform};
use shipcheck_verifier::cli::{Cli, Command, VerifyArgs};
use shipcheck_verifier::command::SystemCommandExecutor;
use shipcheck_verifier::config::{PackagingConfig, resolve_config_path};
use shipcheck_verifier::error::{Result, VerifyError};
use shipcheck_verifier::lifecycle::discovery::{discover, explicit};
use shipcheck_verifier::lifecycle::extraction::GzipTarExtractor;
use shipcheck_verifier::lifecycle::interrupt::InterruptCleanup;
use shipcheck_verifier::lifecycle::resource::CleanupRegistry;
use shipcheck_verifier::output::{write_line, write_report};
use shipcheck_verifier::pipeline::Verifier;
use shipcheck_verifier::requirement::RequirementModel;
use shipcheck_verifier::signing::SigningEnvironment;
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let Command::Verify(args) = Cli::parse().command;
    init_logging(&args);

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let exit_code = match run(&args, &mut stdout, &mut stderr) {
        Ok(code) => code,
        Err(err) => {
            write_line(&mut stderr, format!("error: {err}"));
            1
        }
    };
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Installs the fmt subscriber. `RUST_LOG` wins over the verbosity flags;
/// `log` records from the library are bridged into it.
fn init_logging(args: &VerifyArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
    if let Err(err) = installed {
        write_line(
            &mut std::io::stderr(),
            format!("warning: logging is not initialised: {err}"),
        );
    }
}

fn run(args: &VerifyArgs, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<i32> {
    let config_path = resolve_config_path(args.config.clone(), |name| std::env::var(name).ok());
    let config = PackagingConfig::load(&config_path)?;
    let requirement = RequirementModel::from_config(&config, config_dir(&config_path))?;

    let artefacts = resolve_artefacts(args)?;
    info!("verifying {} artefact(s)", artefacts.len());

    let executor = SystemCommandExecutor::with_timeout(args.timeout());
    let registry = Arc::new(CleanupRegistry::new());
    if let Err(err) = InterruptCleanup::new(Arc::clone(&registry), executor).install() {
        warn!("could not install the interrupt handler: {err}");
    }

    let signing = SigningEnvironment::from_env();
    let verifier = Verifier {
        requirement: &requirement,
        executor: &executor,
        registry: registry.as_ref(),
        extractor: &GzipTarExtractor,
        signing: &signing,
    };
    let report = verifier.run(&artefacts, stdout, args.quiet);
    registry.release_all(&executor);

    write_report(&report, stdout, stderr, args.quiet);
    Ok(report.exit_code())
}

/// Directory that relative paths in the config resolve against.
fn config_dir(config_path: &Utf8Path) -> &Utf8Path {
    config_path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."))
}

/// The explicit `--artefact`, or every installer discovered for the
/// selected platform.
fn resolve_artefacts(args: &VerifyArgs) -> Result<Vec<Artefact>> {
    if let Some(path) = &args.artefact {
        return Ok(vec![explicit(path.clone())?]);
    }
    let platform = args
        .platform
        .map(Platform::from)
        .or_else(Platform::host)
        .ok_or(VerifyError::UnsupportedHost)?;
    discover(&args.target_dir, platform)
}
