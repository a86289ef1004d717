//! `berth config` command

use anyhow::Result;

use crate::cli::ConfigArgs;
use crate::commands::load_index;
use berth::builder::{FsStager, SystemProcessRunner, SystemToolchainQuery};
use berth::ops::{InstallRequest, Orchestrator, OrchestratorConfig};
use berth::GlobalContext;

pub fn execute(ctx: &GlobalContext, args: ConfigArgs) -> Result<()> {
    let config = ctx.load_config();
    let index = load_index(ctx, args.features.deps.as_deref())?;
    let request = InstallRequest::load(
        &ctx.resolve(&args.package),
        &args.features.with,
        &args.features.without,
        false,
    )?;

    let orch_config = OrchestratorConfig::from_config(&config, ctx.cwd());
    let toolchain = SystemToolchainQuery::new(config.toolchain.clone())
        .with_denylist(orch_config.denylist.clone());
    let orch = Orchestrator::new(&orch_config, &toolchain, &SystemProcessRunner, &FsStager);

    let build_config = orch.plan(&index, &request)?;
    if args.fingerprint {
        println!("{}", build_config.fingerprint());
    } else {
        print!("{}", build_config.render());
    }

    Ok(())
}
