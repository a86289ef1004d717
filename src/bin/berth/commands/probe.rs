//! `berth probe` command

use anyhow::Result;

use crate::cli::ProbeArgs;
use berth::builder::{SystemToolchainQuery, ToolchainProbe};
use berth::GlobalContext;

pub fn execute(ctx: &GlobalContext, args: ProbeArgs) -> Result<()> {
    let config = ctx.load_config();
    let denylist = config.denylist();
    let query =
        SystemToolchainQuery::new(config.toolchain.clone()).with_denylist(denylist.clone());

    let profile = ToolchainProbe::new(&query, &denylist).probe()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    println!("Toolchain:");
    println!();
    println!("  CC:       {}", profile.cc);
    if let Some(ref id) = profile.cc_identity {
        println!("            {}", id);
    }
    println!("  CFLAGS:   {}", profile.cflags);
    println!("  FC:       {}", profile.fc);
    if let Some(ref id) = profile.fc_identity {
        println!("            {}", id);
    }
    println!("  FFLAGS:   {}", profile.fflags);
    println!("  Defines:  {}<NAME>", profile.fortran_define_option);
    println!(
        "  Mangling: {} ({})",
        profile.mangling,
        profile.mangling.define_token()
    );
    println!("  AR:       {} {}", profile.ar, profile.ar_flags);
    println!("  LIBEXT:   .{}", profile.ar_suffix);
    println!("  RANLIB:   {}", profile.ranlib);

    Ok(())
}
