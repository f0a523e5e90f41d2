//! `sdk-setup` entrypoint.
//!
//! Verifies prerequisites, or installs or updates the OLP SDK for Python
//! conda environment and writes the credential files it needs.

use clap::Parser;
use sdk_provisioner::archive::ZipExtractor;
use sdk_provisioner::cli::SetupCli;
use sdk_provisioner::commands::{load_config, resolve_paths, run_provision, run_verify};
use sdk_provisioner::context::{Operation, RunContext};
use sdk_provisioner::dirs::SystemBaseDirs;
use sdk_provisioner::environment;
use sdk_provisioner::error::Result;
use sdk_provisioner::executor::SystemCommandExecutor;
use sdk_provisioner::logging::init_logging;
use sdk_provisioner::output::{Progress, exit_code_for_run_result};
use sdk_provisioner::provisioner::ProvisionDeps;
use sdk_provisioner::repository::HttpRepositoryClient;
use sdk_provisioner::workspace::{CleanupRegistry, install_interrupt_handler};
use std::io::Write;

fn main() {
    let cli = SetupCli::parse();
    init_logging(cli.verbosity, cli.quiet);
    let mut stderr = std::io::stderr();
    let registry = CleanupRegistry::new();
    let run_result =
        install_interrupt_handler(registry.clone()).and_then(|()| run(&cli, &registry, &mut stderr));
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &SetupCli, registry: &CleanupRegistry, stderr: &mut dyn Write) -> Result<()> {
    let paths = resolve_paths(&SystemBaseDirs)?;
    let config = load_config(cli.config.as_deref(), &paths)?;
    let context = RunContext::new(cli.operation(), cli.release(), cli.name.as_deref(), config)?
        .with_quiet(cli.quiet);

    let executor = SystemCommandExecutor;
    let manager = environment::for_platform(context.platform, &executor);
    let mut progress = Progress::new(stderr, context.quiet);

    match context.operation {
        Operation::Verify => {
            run_verify(manager.as_ref(), &paths, &context.config, &mut progress)?;
        }
        Operation::Install | Operation::Update => {
            let repository = HttpRepositoryClient::new();
            let deps = ProvisionDeps {
                manager: manager.as_ref(),
                repository: &repository,
                extractor: &ZipExtractor,
                registry,
            };
            run_provision(&context, &paths, deps, &mut progress)?;
        }
    }
    Ok(())
}
