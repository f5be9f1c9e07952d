use super::{Context, file_name};
use crate::TargetArgs;
use anyhow::Result;
use std::sync::Arc;
use strata_application::EvolutionService;
use strata_infrastructure::{CommandScriptLoader, ShellSubject};

pub async fn run(ctx: &Context, target: &TargetArgs) -> Result<()> {
    let options = ctx.options(target, None);
    let service: EvolutionService<ShellSubject> =
        EvolutionService::new(Arc::new(CommandScriptLoader::new()));

    let status = service.status(options).await?;

    if target.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", status.path.display());
    println!("  state file: {}", status.state_file.display());
    println!("  current version: {}", status.current_version);

    for record in &status.active {
        match &record.error {
            Some(error) if record.has_error() => {
                let method = record.method.map(|m| m.as_str()).unwrap_or("unknown");
                println!("  * {} ({} failed: {})", file_name(&record.file), method, error);
            }
            _ => println!("  * {}", file_name(&record.file)),
        }
    }
    for file in &status.pending {
        println!("    {} (pending)", file_name(file));
    }

    if status.warning_count > 0 {
        println!("  warnings: {}", status.warning_count);
    }

    Ok(())
}
