//! `berth status` command

use anyhow::Result;

use crate::cli::StatusArgs;
use berth::builder::InstallRecorder;
use berth::core::PackageSpec;
use berth::ops::{format_status, status};
use berth::GlobalContext;

pub fn execute(ctx: &GlobalContext, args: StatusArgs) -> Result<()> {
    let mut config = ctx.load_config();
    if let Some(prefix) = args.prefix {
        config.install.prefix = Some(ctx.resolve(&prefix));
    }

    let recorder = InstallRecorder::new(config.layout(ctx.cwd()));
    println!("Prefix: {}", recorder.layout().prefix().display());

    for path in &args.packages {
        let spec = PackageSpec::load(&ctx.resolve(path))?;
        let st = status(&spec, &recorder)?;
        println!();
        print!("{}", format_status(&st));
    }

    Ok(())
}
