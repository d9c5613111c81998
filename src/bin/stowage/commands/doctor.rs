//! `stowage doctor` command

use anyhow::Result;

use crate::cli::DoctorArgs;
use stowage::builder::BuildContext;
use stowage::ops::{doctor, format_report, DoctorOptions};
use stowage::util::process::SystemRunner;
use stowage::util::GlobalContext;

pub fn execute(args: DoctorArgs, verbose: bool) -> Result<()> {
    let gctx = GlobalContext::new()?;
    let settings = gctx.load_config();

    let options = DoctorOptions {
        backend: super::select_backend(args.backend, &settings),
    };

    let mut ctx = BuildContext::new(gctx.cwd());
    if let Some(python) = args.python.or_else(|| settings.build.python.clone()) {
        ctx = ctx.with_python(python);
    }

    let report = doctor(&options, &ctx, &SystemRunner);

    // Print the formatted report
    print!("{}", format_report(&report, verbose));

    // Exit with error code if required checks failed
    if !report.all_required_passed() {
        std::process::exit(1);
    }

    Ok(())
}
