pub mod apply;
pub mod list;
pub mod status;

use crate::TargetArgs;
use anyhow::Result;
use std::path::Path;
use strata_application::ApplyOptions;
use strata_infrastructure::StrataConfig;

/// Settings shared by all subcommands: the config file, before flags.
pub struct Context {
    config: StrataConfig,
}

impl Context {
    pub fn load(config_file: Option<&Path>, cwd: &Path) -> Result<Self> {
        let config = StrataConfig::discover(config_file, cwd)?;
        Ok(Self { config })
    }

    /// Run options with command-line flags taking precedence over the config.
    pub fn options(&self, target: &TargetArgs, version: Option<String>) -> ApplyOptions {
        let flags = StrataConfig {
            path: target.path.clone(),
            version,
            state_file: target.state_file.clone(),
            extension: target.extension.clone(),
        };
        let merged = self.config.clone().merge(flags);

        ApplyOptions {
            path: merged.path,
            version: merged.version,
            state_file: merged.state_file,
            extension: merged.extension,
        }
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn target(path: Option<&str>) -> TargetArgs {
        TargetArgs {
            path: path.map(PathBuf::from),
            state_file: None,
            extension: None,
            json: false,
        }
    }

    #[test]
    fn test_flags_override_config() {
        let ctx = Context {
            config: StrataConfig {
                path: Some(PathBuf::from("/srv/evolutions")),
                version: Some("1.0.0".to_string()),
                state_file: None,
                extension: Some("sql".to_string()),
            },
        };

        let options = ctx.options(&target(None), Some("2.0.0".to_string()));
        assert_eq!(options.path, Some(PathBuf::from("/srv/evolutions")));
        assert_eq!(options.version.as_deref(), Some("2.0.0"));
        assert_eq!(options.extension.as_deref(), Some("sql"));

        let options = ctx.options(&target(Some("other")), None);
        assert_eq!(options.path, Some(PathBuf::from("other")));
        assert_eq!(options.version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_config_is_discovered_in_cwd() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("strata.toml"), "path = \"evo\"").unwrap();

        let ctx = Context::load(None, temp_dir.path()).unwrap();
        let options = ctx.options(&target(None), None);
        assert_eq!(options.path, Some(temp_dir.path().join("evo")));
    }
}
