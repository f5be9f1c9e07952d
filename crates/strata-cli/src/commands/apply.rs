use super::{Context, file_name};
use crate::TargetArgs;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use strata_application::{EvolutionService, RunReport};
use strata_infrastructure::{CommandScriptLoader, ShellSubject};

pub async fn run(
    ctx: &Context,
    target: &TargetArgs,
    version: Option<String>,
    workdir: PathBuf,
) -> Result<()> {
    let options = ctx.options(target, version);
    let service: EvolutionService<ShellSubject> =
        EvolutionService::new(Arc::new(CommandScriptLoader::new()));
    let subject = ShellSubject::new(workdir);

    let report = service.apply(&subject, options).await?;

    if target.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!(
        "{}: {} -> {} (target {})",
        report.path.display(),
        report.previous_version,
        report.current_version,
        report.target
    );

    for file in &report.rolled_back {
        println!("  - {}", file_name(file));
    }
    for file in &report.evolved {
        println!("  + {}", file_name(file));
    }
    for file in &report.failed {
        println!("  ! {} failed", file_name(file));
    }
    for file in &report.skipped {
        println!("  ? {} could not be loaded", file_name(file));
    }

    if report.warning_count > 0 {
        println!(
            "{} change-script(s) left in an error state, see the state file for details",
            report.warning_count
        );
    }
}
