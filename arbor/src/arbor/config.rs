use std::fmt;
use std::path::{Path, PathBuf};

use confik::{Configuration, EnvSource};
use serde::{Deserialize, Serialize};

use self::yaml::YamlSource;

/// Runtime mode, derived from `APP_ENV`. Anything outside the recognized
/// production values counts as development.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    pub fn from_env_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Configuration)]
pub struct SiteConfig {
    #[confik(default = "0.0.0.0")]
    pub host: String,
    #[confik(default = 8000u16)]
    pub port: u16,
    /// Raw `APP_ENV` value; interpreted by [`SiteConfig::mode`].
    #[confik(default = "development")]
    pub app_env: String,
    /// Directory that templates, styles and assets resolve against.
    /// Defaults to the crate manifest directory when unset.
    pub base_dir: Option<String>,
    #[confik(default = "Arbor")]
    pub page_title: String,
    pub tagline: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            app_env: "development".into(),
            base_dir: None,
            page_title: "Arbor".into(),
            tagline: None,
        }
    }
}

impl SiteConfig {
    /// Load configuration from `config.yml` (if present) and environment
    /// variables (`APP_ENV`, `PORT`, `HOST`, `BASE_DIR`, ...).
    /// Falls back to the compiled-in defaults when parsing fails.
    pub fn load() -> Self {
        let config_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.yml");
        let mut builder = SiteConfig::builder();

        if config_path.exists() {
            builder.override_with(YamlSource::new(config_path));
        }

        builder.override_with(EnvSource::new());

        match builder.try_build() {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("Failed to load config.yml or env overrides: {err}. Using defaults.");
                SiteConfig::default()
            }
        }
    }

    pub fn mode(&self) -> Mode {
        Mode::from_env_value(&self.app_env)
    }

    /// Base directory for templates, styles and assets. Resolved once at
    /// startup; relative overrides resolve against the current directory.
    pub fn base_dir(&self) -> PathBuf {
        match &self.base_dir {
            Some(dir) => {
                let candidate = PathBuf::from(dir);
                if candidate.is_absolute() {
                    candidate
                } else {
                    std::env::current_dir().unwrap_or_default().join(candidate)
                }
            }
            None => PathBuf::from(env!("CARGO_MANIFEST_DIR")),
        }
    }
}

mod yaml {
    use std::error::Error;
    use std::path::PathBuf;

    use confik::Source;
    use serde::de::DeserializeOwned;

    /// Feeds an optional YAML file into the configuration builder.
    #[derive(Debug)]
    pub struct YamlSource {
        path: PathBuf,
    }

    impl YamlSource {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }
    }

    impl<T> Source<T> for YamlSource
    where
        T: DeserializeOwned + confik::ConfigurationBuilder,
    {
        fn allows_secrets(&self) -> bool {
            false
        }

        fn provide(&self) -> Result<T, Box<dyn Error + Sync + Send>> {
            let contents = std::fs::read_to_string(&self.path)?;
            let parsed = serde_yaml::from_str(&contents)?;
            Ok(parsed)
        }
    }
}
