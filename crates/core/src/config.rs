//! TOML-based configuration system for worksync.
//!
//! Every section has defaults, so an empty file is a valid configuration.
//! Project paths are relative to the repository root and `/`-separated.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::models::{FormatVersion, ResultSide};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Project layout.
    #[serde(default)]
    pub project: ProjectConfig,

    /// Merge behaviour.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// Where the workspace definition and its satellite files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// The workspace-definition file.
    #[serde(default = "default_workspace_file")]
    pub workspace_file: String,

    /// Directory holding one definition file per mod element.
    #[serde(default = "default_elements_dir")]
    pub elements_dir: String,

    /// Suffix of mod element definition files.
    #[serde(default = "default_element_suffix")]
    pub element_suffix: String,

    /// Root of the generated language files (always regenerated).
    #[serde(default = "default_lang_root")]
    pub lang_root: String,

    /// Roots of generated code owned by mod elements.
    #[serde(default = "default_generated_roots")]
    pub generated_roots: Vec<String>,

    /// Mod base files, deleted and regenerated after every merge.
    #[serde(default)]
    pub base_templates: Vec<String>,

    /// Where regeneration requests are written for the generator.
    #[serde(default = "default_regeneration_queue")]
    pub regeneration_queue: String,
}

fn default_workspace_file() -> String {
    "workspace.json".into()
}
fn default_elements_dir() -> String {
    "elements".into()
}
fn default_element_suffix() -> String {
    ".mod.json".into()
}
fn default_lang_root() -> String {
    "src/main/resources/lang".into()
}
fn default_generated_roots() -> Vec<String> {
    vec!["src/main/java".into()]
}
fn default_regeneration_queue() -> String {
    ".worksync/regenerate.json".into()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            workspace_file: default_workspace_file(),
            elements_dir: default_elements_dir(),
            element_suffix: default_element_suffix(),
            lang_root: default_lang_root(),
            generated_roots: default_generated_roots(),
            base_templates: Vec::new(),
            regeneration_queue: default_regeneration_queue(),
        }
    }
}

impl ProjectConfig {
    /// `true` for files under the language root.
    pub fn is_language_file(&self, path: &str) -> bool {
        Path::new(path).starts_with(&self.lang_root)
    }

    /// Element name of a definition file (`<elements_dir>/<name><suffix>`).
    pub fn element_name_of<'p>(&self, path: &'p str) -> Option<&'p str> {
        let file = Path::new(path);
        if file.parent()? != Path::new(&self.elements_dir) {
            return None;
        }
        let name = file.file_name()?.to_str()?;
        name.strip_suffix(self.element_suffix.as_str())
            .filter(|stem| !stem.is_empty())
    }

    pub fn is_base_template(&self, path: &str) -> bool {
        self.base_templates.iter().any(|template| template == path)
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// How conflicts are resolved when no one is asked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PreferSide {
    /// Prompt for every conflict.
    #[default]
    Ask,
    Local,
    Remote,
}

impl PreferSide {
    /// The side to resolve toward, unless prompting.
    pub fn side(self) -> Option<ResultSide> {
        match self {
            Self::Ask => None,
            Self::Local => Some(ResultSide::Local),
            Self::Remote => Some(ResultSide::Remote),
        }
    }
}

impl std::fmt::Display for PreferSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ask => write!(f, "ask"),
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Merge behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Newest workspace format this installation understands.
    #[serde(default = "default_supported_format_version")]
    pub supported_format_version: FormatVersion,

    /// Accept newer workspaces written by development builds.
    #[serde(default = "default_true")]
    pub accept_development_builds: bool,

    /// Detect conflicts without touching anything.
    #[serde(default)]
    pub dry_run: bool,

    /// Default resolution strategy.
    #[serde(default)]
    pub prefer: PreferSide,
}

fn default_supported_format_version() -> FormatVersion {
    FormatVersion::CURRENT
}
fn default_true() -> bool {
    true
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            supported_format_version: default_supported_format_version(),
            accept_development_builds: true,
            dry_run: false,
            prefer: PreferSide::Ask,
        }
    }
}

impl MergeConfig {
    /// Whether a workspace declaring `version` can be merged.
    pub fn accepts(&self, version: FormatVersion) -> bool {
        version <= self.supported_format_version
            || (self.accept_development_builds && version.is_development_build())
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("project.workspace_file", &self.project.workspace_file),
            ("project.elements_dir", &self.project.elements_dir),
            ("project.element_suffix", &self.project.element_suffix),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    detail: "must not be empty".into(),
                });
            }
        }

        let relative = [
            ("project.workspace_file", &self.project.workspace_file),
            ("project.elements_dir", &self.project.elements_dir),
            ("project.lang_root", &self.project.lang_root),
            ("project.regeneration_queue", &self.project.regeneration_queue),
        ];
        let roots = self
            .project
            .generated_roots
            .iter()
            .map(|root| ("project.generated_roots", root));
        let templates = self
            .project
            .base_templates
            .iter()
            .map(|template| ("project.base_templates", template));
        for (field, value) in relative.into_iter().chain(roots).chain(templates) {
            if Path::new(value).is_absolute() {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    detail: format!("'{value}' must be relative to the project root"),
                });
            }
        }

        if self.merge.supported_format_version.0 == 0 {
            return Err(ConfigError::InvalidValue {
                field: "merge.supported_format_version".into(),
                detail: "supported format version must be > 0".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[project]
workspace_file = "gems.mcreator"
elements_dir = "elements"
element_suffix = ".mod.json"
lang_root = "src/main/resources/assets/gems/lang"
generated_roots = ["src/main/java", "src/main/resources/data"]
base_templates = ["src/main/java/gems/GemsMod.java"]

[merge]
supported_format_version = 202500100100
accept_development_builds = false
prefer = "remote"

[log]
level = "debug"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.project.workspace_file, "gems.mcreator");
        assert_eq!(config.project.generated_roots.len(), 2);
        assert_eq!(config.merge.supported_format_version, FormatVersion::CURRENT);
        assert!(!config.merge.accept_development_builds);
        assert_eq!(config.merge.prefer, PreferSide::Remote);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worksync.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_and_validate(&path).expect("load_and_validate failed");
        assert_eq!(config.project.element_suffix, ".mod.json");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/worksync.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_validate_rejects_empty_workspace_file() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.project.workspace_file = String::new();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "project.workspace_file"
        ));
    }

    #[test]
    fn test_validate_rejects_absolute_paths() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.project.generated_roots.push("/abs/java".into());
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "project.generated_roots"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_version() {
        let mut config = AppConfig::default();
        config.merge.supported_format_version = FormatVersion(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.project.workspace_file, "workspace.json");
        assert_eq!(config.project.lang_root, "src/main/resources/lang");
        assert_eq!(config.project.regeneration_queue, ".worksync/regenerate.json");
        assert!(config.merge.accept_development_builds);
        assert!(!config.merge.dry_run);
        assert_eq!(config.merge.prefer, PreferSide::Ask);
        assert_eq!(config.log.level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_project_path_helpers() {
        let project = ProjectConfig::default();
        assert_eq!(project.element_name_of("elements/Ruby.mod.json"), Some("Ruby"));
        assert_eq!(project.element_name_of("elements/nested/Ruby.mod.json"), None);
        assert_eq!(project.element_name_of("elements/notes.txt"), None);
        assert!(project.is_language_file("src/main/resources/lang/en_us.json"));
        assert!(!project.is_language_file("src/main/resources/language.json"));
    }

    #[test]
    fn test_version_acceptance() {
        let mut merge = MergeConfig::default();
        assert!(merge.accepts(FormatVersion::CURRENT));
        assert!(!merge.accepts(FormatVersion::new(2031, 1, 5)));
        assert!(merge.accepts(FormatVersion::new(2031, 1, 0)));
        merge.accept_development_builds = false;
        assert!(!merge.accepts(FormatVersion::new(2031, 1, 0)));
    }
}
