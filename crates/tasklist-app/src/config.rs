use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::{self, OwnedFormatItem};

const CONFIG_DIR: &str = ".tasklist";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_DATABASE: &str = "tasks.db";
const DATA_DIR_NAME: &str = "tasklist";

/// Environment variable overriding the database location.
pub const ENV_DATABASE: &str = "TASKLIST_DB";

/// Due date rendering used when the config does not set one.
pub const DEFAULT_DUE_FORMAT: &str =
    "[weekday repr:short], [month repr:short] [day], [hour repr:12]:[minute] [period]";

/// Top-level project configuration loaded from `.tasklist/config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    /// Database location and seeding.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Presentation settings for the CLI.
    #[serde(default)]
    pub display: DisplayConfig,
}

impl ProjectConfig {
    /// Load configuration for the project rooted at `workdir`.
    ///
    /// A missing config file yields defaults.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read, parsed or validated.
    pub fn from_workdir(workdir: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path(workdir.as_ref());
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", config_path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.storage.validate()?;
        self.display.formatter().map(drop)
    }
}

/// Path of the config file for `workdir`.
#[must_use]
pub fn config_path(workdir: &Path) -> PathBuf {
    workdir.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// `[storage]` block.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file; relative paths resolve against the project directory.
    pub database: Option<PathBuf>,
    /// Insert a welcome task into a freshly created database.
    pub seed_on_create: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: None,
            seed_on_create: true,
        }
    }
}

impl StorageConfig {
    /// Resolve the database path using the process environment.
    #[must_use]
    pub fn database_path(&self, workdir: &Path) -> PathBuf {
        let mut fetch = |key: &'static str| env::var(key).ok();
        self.database_path_with(workdir, dirs::data_dir(), &mut fetch)
    }

    /// Resolution order: `TASKLIST_DB`, `storage.database`, the user data
    /// directory, then `.tasklist/tasks.db` under the project.
    fn database_path_with(
        &self,
        workdir: &Path,
        data_dir: Option<PathBuf>,
        fetch: &mut impl FnMut(&'static str) -> Option<String>,
    ) -> PathBuf {
        if let Some(value) = fetch(ENV_DATABASE).filter(|value| !value.trim().is_empty()) {
            return PathBuf::from(value);
        }
        if let Some(database) = &self.database {
            return workdir.join(database);
        }
        data_dir.map_or_else(
            || workdir.join(CONFIG_DIR).join(DEFAULT_DATABASE),
            |dir| dir.join(DATA_DIR_NAME).join(DEFAULT_DATABASE),
        )
    }

    fn validate(&self) -> Result<()> {
        if self
            .database
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            bail!("storage.database must not be empty");
        }
        Ok(())
    }
}

/// `[display]` block.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// `time` format description for due dates.
    pub due_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            due_format: DEFAULT_DUE_FORMAT.to_owned(),
        }
    }
}

impl DisplayConfig {
    /// Parse the configured format description.
    ///
    /// # Errors
    /// Returns an error when `due_format` is not a valid format description.
    pub fn formatter(&self) -> Result<OwnedFormatItem> {
        format_description::parse_owned::<2>(&self.due_format)
            .with_context(|| format!("invalid display.due_format '{}'", self.due_format))
    }

    /// Render `due` with the configured format.
    ///
    /// # Errors
    /// Returns an error when the format is invalid or cannot represent the value.
    pub fn format_due(&self, due: OffsetDateTime) -> Result<String> {
        let format = self.formatter()?;
        due.format(&format).context("failed to format due date")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use time::macros::datetime;

    fn write_config(workdir: &Path, contents: &str) -> Result<()> {
        let dir = workdir.join(CONFIG_DIR);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(CONFIG_FILE), contents)?;
        Ok(())
    }

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = ProjectConfig::from_workdir(dir.path())?;
        assert!(config.storage.seed_on_create);
        assert!(config.storage.database.is_none());
        assert_eq!(config.display.due_format, DEFAULT_DUE_FORMAT);
        Ok(())
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> Result<()> {
        let dir = tempdir()?;
        write_config(dir.path(), "[storage]\ndatabase = \"data/todo.db\"\n")?;
        let config = ProjectConfig::from_workdir(dir.path())?;
        assert_eq!(config.storage.database, Some(PathBuf::from("data/todo.db")));
        assert!(config.storage.seed_on_create);
        assert_eq!(config.display.due_format, DEFAULT_DUE_FORMAT);
        Ok(())
    }

    #[test]
    fn invalid_due_format_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        write_config(dir.path(), "[display]\ndue_format = \"[bogus]\"\n")?;
        let err = ProjectConfig::from_workdir(dir.path()).err();
        assert!(err.is_some_and(|err| format!("{err:#}").contains("due_format")));
        Ok(())
    }

    #[test]
    fn malformed_toml_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        write_config(dir.path(), "[storage\n")?;
        assert!(ProjectConfig::from_workdir(dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn database_path_resolution_order() {
        let workdir = Path::new("/work");
        let data = Some(PathBuf::from("/data"));
        let configured = StorageConfig {
            database: Some(PathBuf::from("custom.db")),
            seed_on_create: true,
        };
        let default = StorageConfig::default();

        let mut from_env = |_: &'static str| Some("/env/tasks.db".to_owned());
        assert_eq!(
            configured.database_path_with(workdir, data.clone(), &mut from_env),
            PathBuf::from("/env/tasks.db")
        );

        let mut blank_env = |_: &'static str| Some("  ".to_owned());
        assert_eq!(
            configured.database_path_with(workdir, data.clone(), &mut blank_env),
            PathBuf::from("/work/custom.db")
        );

        let mut no_env = |_: &'static str| None;
        assert_eq!(
            default.database_path_with(workdir, data, &mut no_env),
            PathBuf::from("/data/tasklist/tasks.db")
        );
        assert_eq!(
            default.database_path_with(workdir, None, &mut no_env),
            PathBuf::from("/work/.tasklist/tasks.db")
        );
    }

    #[test]
    fn default_format_renders_like_a_reminder() -> Result<()> {
        let rendered = DisplayConfig::default().format_due(datetime!(2024-03-05 14:07 UTC))?;
        assert_eq!(rendered, "Tue, Mar 05, 02:07 PM");
        Ok(())
    }
}
