//! `sdk-config-updater` entrypoint.
//!
//! Resolves the library versions of an SDK release and writes them into the
//! Spark dependency list of `config.json` or `spark-conf-files.zip`.

use clap::Parser;
use sdk_provisioner::cli::UpdaterCli;
use sdk_provisioner::commands::{ConfigUpdateDeps, resolve_paths, run_config_update_with};
use sdk_provisioner::dirs::SystemBaseDirs;
use sdk_provisioner::error::Result;
use sdk_provisioner::logging::init_logging;
use sdk_provisioner::output::{Progress, exit_code_for_run_result};
use sdk_provisioner::repository::{HttpRepositoryClient, ResolutionTables};
use sdk_provisioner::workspace::{CleanupRegistry, install_interrupt_handler};
use std::io::Write;

fn main() {
    let cli = UpdaterCli::parse();
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

fn run(cli: &UpdaterCli, registry: &CleanupRegistry, stderr: &mut dyn Write) -> Result<()> {
    let paths = resolve_paths(&SystemBaseDirs)?;
    let repository = HttpRepositoryClient::new();
    let tables = ResolutionTables::olp_sdk();
    let deps = ConfigUpdateDeps {
        repository: &repository,
        tables: &tables,
        registry,
    };
    let mut progress = Progress::new(stderr, cli.quiet);
    run_config_update_with(&cli.release, &cli.dir, &paths, deps, &mut progress)?;
    Ok(())
}
