//! `berth install` command

use std::time::Duration;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::InstallArgs;
use crate::commands::{diagnose, load_index};
use berth::builder::{FsStager, SystemProcessRunner, SystemToolchainQuery};
use berth::ops::{InstallOutcome, InstallRequest, Orchestrator, OrchestratorConfig};
use berth::resolver::install_order;
use berth::util::diagnostic;
use berth::util::hash::short;
use berth::GlobalContext;

pub fn execute(ctx: &GlobalContext, args: InstallArgs) -> Result<()> {
    let mut config = ctx.load_config();

    // CLI flags override config
    if let Some(prefix) = args.prefix {
        config.install.prefix = Some(ctx.resolve(&prefix));
    }
    if args.jobs.is_some() {
        config.build.jobs = args.jobs;
    }
    if args.timeout.is_some() {
        config.build.timeout_secs = args.timeout;
    }

    let mut index = load_index(ctx, args.features.deps.as_deref())?;

    let requests = args
        .packages
        .iter()
        .map(|path| {
            InstallRequest::load(
                &ctx.resolve(path),
                &args.features.with,
                &args.features.without,
                args.force,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let specs: Vec<_> = requests.iter().map(|r| r.spec.clone()).collect();
    let order = install_order(&specs)?;

    let orch_config = OrchestratorConfig::from_config(&config, ctx.cwd());
    let toolchain = SystemToolchainQuery::new(config.toolchain.clone())
        .with_denylist(orch_config.denylist.clone());
    let runner = SystemProcessRunner;
    let stager = FsStager;
    let orch = Orchestrator::new(&orch_config, &toolchain, &runner, &stager);

    for i in order {
        let request = &requests[i];
        let name = request.spec.name();

        let spinner = spinner(ctx, name);
        let result = orch.install(&index, request);
        spinner.finish_and_clear();

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                match diagnose(&e, Some(name)) {
                    Some(diag) => diagnostic::emit(&diag, ctx.color()),
                    None => eprintln!("error: {:#}", e),
                }
                bail!("could not install `{}`", name);
            }
        };

        match outcome {
            InstallOutcome::Installed { ref record, .. } => eprintln!(
                "   Installed `{}` {} ({}) -> {}",
                name,
                record.version,
                short(&record.fingerprint),
                orch_config.layout.prefix().display()
            ),
            InstallOutcome::UpToDate { ref record, .. } => eprintln!(
                "  Up to date `{}` {} ({})",
                name,
                record.version,
                short(&record.fingerprint)
            ),
        }

        // Later packages in this run may depend on this one.
        index.insert(outcome.handle());
    }

    Ok(())
}

fn spinner(ctx: &GlobalContext, name: &str) -> ProgressBar {
    if ctx.is_verbose() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("building `{}`", name));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
