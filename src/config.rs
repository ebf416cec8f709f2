//! Configuration file support for slidetags
//!
//! Reads from .slidetags/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-project state directory
pub const STATE_DIR: &str = ".slidetags";

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Site generation settings
    #[serde(default)]
    pub site: SiteConfig,

    /// Gist sync settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Directory the config was loaded from (not serialized)
    #[serde(skip)]
    pub root: Option<PathBuf>,
}

/// Index page settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SiteConfig {
    /// Page title
    #[serde(default = "default_title")]
    pub title: String,

    /// Tagline under the title
    #[serde(default)]
    pub description: String,

    /// Slide catalog, relative to the project root
    #[serde(default = "default_slides_file")]
    pub slides_file: PathBuf,

    /// Output directory for index.html
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Optional repository link shown in the header
    #[serde(default)]
    pub repository_url: Option<String>,
}

fn default_title() -> String {
    "Slide Presentations".to_string()
}

fn default_slides_file() -> PathBuf {
    PathBuf::from("slides.toml")
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("dist")
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            description: String::new(),
            slides_file: default_slides_file(),
            out_dir: default_out_dir(),
            repository_url: None,
        }
    }
}

/// Remote store and autosave settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SyncConfig {
    /// Quiet period before pending edits are flushed
    /// Default: 1500
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Per-request timeout for GitHub calls
    /// Default: 10
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// GitHub API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// File name inside the gist
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Description given to newly created gists
    #[serde(default = "default_description")]
    pub description: String,

    /// Whether newly created gists are public
    #[serde(default)]
    pub public: bool,
}

fn default_debounce_ms() -> u64 {
    1500
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_api_base() -> String {
    crate::gist::DEFAULT_API_BASE.to_string()
}

fn default_filename() -> String {
    crate::gist::DEFAULT_FILENAME.to_string()
}

fn default_description() -> String {
    crate::gist::DEFAULT_DESCRIPTION.to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            timeout_secs: default_timeout_secs(),
            api_base: default_api_base(),
            filename: default_filename(),
            description: default_description(),
            public: false,
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Config {
    /// Load config from .slidetags/config.toml
    /// Returns default config if file doesn't exist
    pub fn load() -> Self {
        let state_dir = Self::find_state_dir();
        let path = state_dir.join("config.toml");
        let mut config = if path.exists() {
            Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                Self::default()
            })
        } else {
            Self::default()
        };
        config.root = Some(Self::project_root(&state_dir));
        config
    }

    /// The directory owning the state dir, or the working directory when the
    /// state dir was given explicitly or not found
    fn project_root(state_dir: &Path) -> PathBuf {
        if std::env::var_os("SLIDETAGS_HOME").is_none() {
            if let Some(parent) = state_dir.parent().filter(|p| !p.as_os_str().is_empty()) {
                return parent.to_path_buf();
            }
        }
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Parse a specific config file
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let mut config: Config = toml::from_str(&contents).map_err(|e| e.to_string())?;
        config.root = path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        Ok(config)
    }

    /// Locate the state directory
    ///
    /// `SLIDETAGS_HOME` wins; otherwise walk up the directory tree looking for
    /// `.slidetags` (like git finds `.git`); otherwise `./.slidetags`.
    pub fn find_state_dir() -> PathBuf {
        if let Ok(path) = std::env::var("SLIDETAGS_HOME") {
            return PathBuf::from(path);
        }

        if let Ok(current_dir) = std::env::current_dir() {
            let mut dir = current_dir.as_path();
            loop {
                let candidate = dir.join(STATE_DIR);
                if candidate.is_dir() {
                    return candidate;
                }
                match dir.parent() {
                    Some(parent) => dir = parent,
                    None => break,
                }
            }
        }

        PathBuf::from(STATE_DIR)
    }

    /// Project root: where slides.toml and dist/ are resolved from
    pub fn root_dir(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn state_dir(&self) -> PathBuf {
        if let Ok(path) = std::env::var("SLIDETAGS_HOME") {
            return PathBuf::from(path);
        }
        self.root_dir().join(STATE_DIR)
    }

    /// Directory backing the Local Cache
    pub fn local_dir(&self) -> PathBuf {
        self.state_dir().join("local")
    }

    pub fn slides_path(&self) -> PathBuf {
        self.root_dir().join(&self.site.slides_file)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root_dir().join(&self.site.out_dir)
    }
}
