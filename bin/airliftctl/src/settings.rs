//! ---
//! airlift_section: "05-external-interfaces"
//! airlift_subsection: "binary"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Configuration discovery and preview for the control CLI."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};

use airlift_common::{ConfigSource, LoadedStackConfig, LoggingConfig, StackConfig};
use anyhow::{Context, Result};

/// Files probed, relative to the project directory, when no path is given.
const CONFIG_CANDIDATES: [&str; 2] = ["airlift.toml", "configs/airlift.toml"];

pub fn load(explicit: Option<&Path>, project_dir: &Path) -> Result<LoadedStackConfig> {
    let candidates: Vec<PathBuf> = CONFIG_CANDIDATES
        .iter()
        .map(|candidate| project_dir.join(candidate))
        .collect();
    let loaded = StackConfig::load_with_source(explicit, &candidates)
        .context("unable to load airlift configuration")?;
    loaded
        .config
        .validate()
        .with_context(|| format!("invalid configuration from {}", loaded.source))?;
    Ok(loaded)
}

/// Logging settings with a relative log directory anchored at the project.
pub fn logging_for(logging: &LoggingConfig, project_dir: &Path) -> LoggingConfig {
    let mut resolved = logging.clone();
    resolved.directory = logging.directory.as_ref().map(|directory| {
        if directory.is_absolute() {
            directory.clone()
        } else {
            project_dir.join(directory)
        }
    });
    resolved
}

pub fn show(config: &StackConfig, source: &ConfigSource) -> Result<()> {
    let preview = render(config)?;
    println!("# source: {source}");
    print!("{preview}");
    Ok(())
}

fn render(config: &StackConfig) -> Result<String> {
    serde_yaml::to_string(&config.redacted()).context("unable to render configuration as YAML")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_hides_the_admin_password() {
        let mut config = StackConfig::default();
        config.admin.password = "hunter2".to_owned();
        let preview = render(&config).expect("renders");
        assert!(!preview.contains("hunter2"));
        assert!(preview.contains("webserver: airflow-webserver"));
    }

    #[test]
    fn log_directory_is_anchored_at_project() {
        let logging = LoggingConfig {
            directory: Some(PathBuf::from(".airlift/logs")),
            ..LoggingConfig::default()
        };
        let resolved = logging_for(&logging, Path::new("/srv/etl"));
        assert_eq!(
            resolved.directory,
            Some(PathBuf::from("/srv/etl/.airlift/logs"))
        );
    }
}
