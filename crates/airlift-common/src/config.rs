//! ---
//! airlift_section: "01-core-functionality"
//! airlift_subsection: "module"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Shared primitives for the lifecycle orchestrator."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use thiserror::Error;
use tracing::debug;

use crate::logging::LogFormat;

const REDACTED: &str = "********";

fn default_compose_program() -> String {
    "docker".to_owned()
}

fn default_compose_base_args() -> Vec<String> {
    vec!["compose".to_owned()]
}

fn default_webserver() -> String {
    "airflow-webserver".to_owned()
}

fn default_scheduler() -> String {
    "airflow-scheduler".to_owned()
}

fn default_database_service() -> String {
    "postgres".to_owned()
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_dags_dir() -> PathBuf {
    PathBuf::from("dags")
}

fn default_plugins_dir() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_directory_mode() -> u32 {
    0o777
}

fn default_admin_username() -> String {
    "admin".to_owned()
}

fn default_admin_password() -> String {
    "admin".to_owned()
}

fn default_admin_firstname() -> String {
    "Admin".to_owned()
}

fn default_admin_lastname() -> String {
    "User".to_owned()
}

fn default_admin_role() -> String {
    "Admin".to_owned()
}

fn default_admin_email() -> String {
    "admin@example.com".to_owned()
}

fn default_db_user() -> String {
    "airflow".to_owned()
}

fn default_db_name() -> String {
    "airflow".to_owned()
}

fn default_schema_file() -> PathBuf {
    PathBuf::from("sql/schema.sql")
}

fn default_true() -> bool {
    true
}

fn default_max_wait() -> Duration {
    Duration::from_secs(60)
}

fn default_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_init_command() -> Vec<String> {
    ["airflow", "db", "init"].map(str::to_owned).to_vec()
}

fn default_inspect_command() -> Vec<String> {
    ["python", "/opt/airflow/scripts/ver_db.py"]
        .map(str::to_owned)
        .to_vec()
}

/// Lexical form used to compare working directories: `./dags`, `dags/` and
/// `dags/./` all name the same directory.
fn normalize_directory(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

fn default_logging_directory() -> Option<PathBuf> {
    Some(PathBuf::from(".airlift/logs"))
}

/// Primary configuration object for the lifecycle orchestrator.
///
/// Every section is optional in the TOML source; missing values fall back to
/// the defaults documented on each field, which reproduce the stock
/// docker-compose Airflow deployment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StackConfig {
    #[serde(default)]
    pub compose: ComposeConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub directories: DirectoriesConfig,
    #[serde(default)]
    pub admin: AdminCredential,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    #[serde(default)]
    pub inspect: InspectConfig,
    #[serde(default)]
    pub start: StartConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where an effective [`StackConfig`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Path supplied through the `AIRLIFT_CONFIG` environment variable.
    Environment(PathBuf),
    /// Explicit or discovered configuration file.
    File(PathBuf),
    /// No file found; built-in defaults are in effect.
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Environment(path) => write!(f, "{} (via env)", path.display()),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

/// Metadata describing where a [`StackConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedStackConfig {
    pub config: StackConfig,
    pub source: ConfigSource,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration from {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration at {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to parse configuration")]
    ParseInline {
        #[source]
        source: toml::de::Error,
    },
    #[error("configuration validation failed:\n{details}")]
    Validation { details: String },
}

impl StackConfig {
    pub const ENV_CONFIG_PATH: &'static str = "AIRLIFT_CONFIG";

    /// Resolve the effective configuration.
    ///
    /// `AIRLIFT_CONFIG` wins over `explicit`, which wins over the first existing
    /// entry of `candidates`. When nothing matches the defaults are used. An
    /// explicitly named file that does not exist is an error rather than a
    /// silent fallback.
    pub fn load_with_source<P: AsRef<Path>>(
        explicit: Option<&Path>,
        candidates: &[P],
    ) -> Result<LoadedStackConfig, ConfigError> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedStackConfig {
                    config,
                    source: ConfigSource::Environment(path),
                });
            }
        }

        if let Some(path) = explicit {
            let config = Self::from_path(path)?;
            return Ok(LoadedStackConfig {
                config,
                source: ConfigSource::File(path.to_path_buf()),
            });
        }

        for candidate in candidates {
            let candidate = candidate.as_ref();
            if candidate.is_file() {
                let config = Self::from_path(candidate)?;
                return Ok(LoadedStackConfig {
                    config,
                    source: ConfigSource::File(candidate.to_path_buf()),
                });
            }
        }

        debug!("no configuration file found; using defaults");
        Ok(LoadedStackConfig {
            config: StackConfig::default(),
            source: ConfigSource::Defaults,
        })
    }

    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str::<StackConfig>(&contents).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Copy of the configuration that is safe to print.
    pub fn redacted(&self) -> StackConfig {
        let mut copy = self.clone();
        copy.admin.password = REDACTED.to_owned();
        copy
    }

    /// Validate structural invariants, reporting every violation at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.compose.program.trim().is_empty() {
            errors.push("compose.program may not be empty".to_owned());
        }

        for (field, name) in [
            ("services.webserver", &self.services.webserver),
            ("services.scheduler", &self.services.scheduler),
            ("services.database", &self.services.database),
        ] {
            if name.trim().is_empty() {
                errors.push(format!("{field} may not be empty"));
            }
        }

        let mut seen = HashSet::new();
        for (field, path) in [
            ("directories.logs", &self.directories.logs),
            ("directories.dags", &self.directories.dags),
            ("directories.plugins", &self.directories.plugins),
        ] {
            let normalized = normalize_directory(path);
            if path.as_os_str().is_empty() {
                errors.push(format!("{field} may not be empty"));
            } else if normalized.as_os_str().is_empty() {
                errors.push(format!("{field} may not be the project directory itself"));
            } else if !seen.insert(normalized) {
                errors.push(format!(
                    "{field} duplicates another working directory ({})",
                    path.display()
                ));
            }
        }
        if self.directories.mode > 0o7777 {
            errors.push(format!(
                "directories.mode {:o} is not a valid permission mode",
                self.directories.mode
            ));
        }

        if self.admin.username.trim().is_empty() {
            errors.push("admin.username may not be empty".to_owned());
        }
        if self.admin.password.is_empty() {
            errors.push("admin.password may not be empty".to_owned());
        }
        if self.admin.role.trim().is_empty() {
            errors.push("admin.role may not be empty".to_owned());
        }

        if self.database.user.trim().is_empty() || self.database.name.trim().is_empty() {
            errors.push("database.user and database.name are required".to_owned());
        }

        if self.readiness.base_delay.is_zero() {
            errors.push("readiness.base_delay_ms must be greater than zero".to_owned());
        }
        if self.readiness.max_delay < self.readiness.base_delay {
            errors.push("readiness.max_delay_ms must be >= readiness.base_delay_ms".to_owned());
        }

        if self.bootstrap.init_command.is_empty() {
            errors.push("bootstrap.init_command may not be empty".to_owned());
        }
        if self.inspect.command.is_empty() {
            errors.push("inspect.command may not be empty".to_owned());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation {
                details: errors.join("\n"),
            })
        }
    }
}

impl std::str::FromStr for StackConfig {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let config: StackConfig =
            toml::from_str(content).map_err(|source| ConfigError::ParseInline { source })?;
        config.validate()?;
        Ok(config)
    }
}

/// How the compose engine is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Executable, `docker` by default.
    #[serde(default = "default_compose_program")]
    pub program: String,
    /// Leading arguments, `["compose"]` by default. Empty for `docker-compose`.
    #[serde(default = "default_compose_base_args")]
    pub base_args: Vec<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub project_name: Option<String>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            program: default_compose_program(),
            base_args: default_compose_base_args(),
            file: None,
            project_name: None,
        }
    }
}

/// Compose service names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_webserver")]
    pub webserver: String,
    #[serde(default = "default_scheduler")]
    pub scheduler: String,
    #[serde(default = "default_database_service")]
    pub database: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            webserver: default_webserver(),
            scheduler: default_scheduler(),
            database: default_database_service(),
        }
    }
}

/// Working directories bind-mounted into the Airflow containers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoriesConfig {
    #[serde(default = "default_logs_dir")]
    pub logs: PathBuf,
    #[serde(default = "default_dags_dir")]
    pub dags: PathBuf,
    #[serde(default = "default_plugins_dir")]
    pub plugins: PathBuf,
    /// Permission bits applied after every reset (Unix only).
    #[serde(default = "default_directory_mode")]
    pub mode: u32,
    /// Optional ownership fix; failures only produce warnings.
    #[serde(default)]
    pub owner_uid: Option<u32>,
    #[serde(default)]
    pub owner_gid: Option<u32>,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            logs: default_logs_dir(),
            dags: default_dags_dir(),
            plugins: default_plugins_dir(),
            mode: default_directory_mode(),
            owner_uid: None,
            owner_gid: None,
        }
    }
}

/// Administrative identity provisioned on a fresh metadata database.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminCredential {
    #[serde(default = "default_admin_username")]
    pub username: String,
    #[serde(default = "default_admin_password")]
    pub password: String,
    #[serde(default = "default_admin_firstname")]
    pub firstname: String,
    #[serde(default = "default_admin_lastname")]
    pub lastname: String,
    #[serde(default = "default_admin_role")]
    pub role: String,
    #[serde(default = "default_admin_email")]
    pub email: String,
}

impl Default for AdminCredential {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password: default_admin_password(),
            firstname: default_admin_firstname(),
            lastname: default_admin_lastname(),
            role: default_admin_role(),
            email: default_admin_email(),
        }
    }
}

impl fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredential")
            .field("username", &self.username)
            .field("password", &REDACTED)
            .field("firstname", &self.firstname)
            .field("lastname", &self.lastname)
            .field("role", &self.role)
            .field("email", &self.email)
            .finish()
    }
}

/// Connection details used by `pg_isready` and `psql` inside the database service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default = "default_schema_file")]
    pub schema_file: PathBuf,
    /// Wrap the DDL batch in a single transaction so a failure leaves nothing applied.
    #[serde(default = "default_true")]
    pub transactional: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            user: default_db_user(),
            name: default_db_name(),
            schema_file: default_schema_file(),
            transactional: true,
        }
    }
}

/// Bounds for the database readiness poll.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    #[serde(default = "default_max_wait", rename = "max_wait_secs")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub max_wait: Duration,
    #[serde(default = "default_base_delay", rename = "base_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub base_delay: Duration,
    #[serde(default = "default_max_delay", rename = "max_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub max_delay: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_wait: default_max_wait(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_init_command")]
    pub init_command: Vec<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            init_command: default_init_command(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectConfig {
    #[serde(default = "default_inspect_command")]
    pub command: Vec<String>,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            command: default_inspect_command(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConfig {
    /// Include schema provisioning in `start`.
    #[serde(default = "default_true")]
    pub apply_schema: bool,
}

impl Default for StartConfig {
    fn default() -> Self {
        Self { apply_schema: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the rolling JSON log file; `None` disables file output.
    #[serde(default = "default_logging_directory")]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: LogFormat::default(),
            file_prefix: None,
        }
    }
}
