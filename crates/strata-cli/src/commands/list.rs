use super::{Context, file_name};
use crate::TargetArgs;
use anyhow::{Context as _, Result};
use strata_core::script::ScriptLoader;
use strata_infrastructure::paths::DEFAULT_SCRIPT_EXTENSION;
use strata_infrastructure::{CommandScriptLoader, ScriptCatalog};

pub async fn run(ctx: &Context, target: &TargetArgs) -> Result<()> {
    let options = ctx.options(target, None);
    let path = options.path.context("path undefined")?;
    let extension = options
        .extension
        .unwrap_or_else(|| DEFAULT_SCRIPT_EXTENSION.to_string());

    let catalog = ScriptCatalog::new(path).with_extension(extension);
    let entries = catalog.versions().await?;
    let loader = CommandScriptLoader::new();

    let mut rows = Vec::with_capacity(entries.len());
    for (version, file) in entries {
        let version = version.to_string();
        let (description, satisfies, error) = match loader.load(&file, catalog.extension()).await {
            Ok(script) => (
                script.description().to_string(),
                script.satisfies().map(|r| r.to_string()),
                None,
            ),
            Err(e) => (String::new(), None, Some(e.to_string())),
        };
        rows.push(serde_json::json!({
            "version": version,
            "file": file_name(&file),
            "description": description,
            "satisfies": satisfies,
            "error": error,
        }));

        if !target.json {
            match (&error, &satisfies) {
                (Some(e), _) => println!("{:<12} {}  (invalid: {})", version, file_name(&file), e),
                (None, Some(range)) => {
                    println!("{:<12} {}  [{}] {}", version, file_name(&file), range, description)
                }
                (None, None) => println!("{:<12} {}  {}", version, file_name(&file), description),
            }
        }
    }

    if target.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }

    Ok(())
}
