//! Configuration loading and validation.
//!
//! Sources are layered, later ones overriding earlier ones:
//! 1. Built-in defaults ([`Config::default()`]).
//! 2. An optional configuration file (TOML, YAML or JSON, chosen by extension).
//! 3. Environment variables prefixed with `QUIRE_`, using `__` to separate
//!    nested keys (`QUIRE_RENDER__THUMBNAIL_SCALE=0.25`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "QUIRE_";
/// Downscale factor applied when rendering thumbnails.
pub const DEFAULT_THUMBNAIL_SCALE: f32 = 0.2;
pub const DEFAULT_DENIED_EXTENSIONS: [&str; 5] = [".exe", ".cmd", ".com", ".vbs", ".dll"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub render: RenderConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding every cached artifact. Must be absolute.
    pub root: PathBuf,
    /// Scan the blob directories on start-up so artifacts cached by a previous
    /// process are served instead of regenerated.
    pub rebuild_index: bool,
}
impl Default for StorageConfig {
    fn default() -> Self {
        let root = ProjectDirs::from("", "", "quire")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("quire"));
        Self { root, rebuild_index: false }
    }
}
impl StorageConfig {
    pub fn pages_dir(&self) -> PathBuf {
        self.root.join("pages")
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.root.join("thumbnails")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub thumbnail_scale: f32,
    /// Explicit `pdftoppm` executable; discovered on `PATH` when unset.
    pub executable: Option<PathBuf>,
}
impl Default for RenderConfig {
    fn default() -> Self {
        Self { thumbnail_scale: DEFAULT_THUMBNAIL_SCALE, executable: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// File extensions (with leading dot) that are never accepted. Matched
    /// case-insensitively.
    pub denied_extensions: Vec<String>,
}
impl Default for UploadConfig {
    fn default() -> Self {
        Self { denied_extensions: DEFAULT_DENIED_EXTENSIONS.iter().map(|ext| ext.to_string()).collect() }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment,
    /// then [`validate`](Self::validate) it.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(file)?.extract().or_raise(|| ErrorKind::Invalid)?;
        config.validate()?;
        tracing::debug!(root = %config.storage.root.display(), "Configuration loaded");
        Ok(config)
    }

    /// The layered configuration sources, before extraction.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            if !path.is_file() {
                exn::bail!(ErrorKind::FileNotFound(path.to_path_buf()));
            }
            let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
            figment = match extension.as_deref() {
                Some("toml") => figment.merge(Toml::file_exact(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
                Some("json") => figment.merge(Json::file_exact(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.storage.root.is_absolute() {
            exn::bail!(ErrorKind::RelativeStorageRoot(self.storage.root.clone()));
        }
        let scale = self.render.thumbnail_scale;
        if !scale.is_finite() || scale <= 0.0 {
            exn::bail!(ErrorKind::InvalidScale(scale));
        }
        if self.upload.denied_extensions.iter().any(|ext| ext.trim_start_matches('.').is_empty()) {
            exn::bail!(ErrorKind::EmptyExtension);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.render.thumbnail_scale, 0.2);
        assert_eq!(config.upload.denied_extensions, [".exe", ".cmd", ".com", ".vbs", ".dll"]);
        assert!(!config.storage.rebuild_index);
        assert_eq!(config.storage.pages_dir(), config.storage.root.join("pages"));
    }

    #[rstest]
    #[case(0.0)]
    #[case(-0.2)]
    #[case(f32::NAN)]
    fn test_invalid_scale(#[case] scale: f32) {
        let mut config = Config::default();
        config.render.thumbnail_scale = scale;
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidScale(_)));
    }

    #[test]
    fn test_relative_root_rejected() {
        let mut config = Config::default();
        config.storage.root = PathBuf::from("relative/cache");
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::RelativeStorageRoot(_)));
    }

    #[test]
    fn test_empty_extension_rejected() {
        let mut config = Config::default();
        config.upload.denied_extensions.push(".".to_string());
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::EmptyExtension));
    }

    #[test]
    fn test_file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "quire.toml",
                r#"
                [storage]
                root = "/srv/quire"
                rebuild_index = true

                [render]
                thumbnail_scale = 0.5
                "#,
            )?;
            jail.set_env("QUIRE_RENDER__THUMBNAIL_SCALE", "0.25");
            let config = Config::load(Some(Path::new("quire.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.storage.root, PathBuf::from("/srv/quire"));
            assert!(config.storage.rebuild_index);
            assert_eq!(config.render.thumbnail_scale, 0.25);
            assert_eq!(config.upload, UploadConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_yaml_file() {
        Jail::expect_with(|jail| {
            jail.create_file("quire.yml", "upload:\n  denied_extensions: [\".bat\"]\nstorage:\n  root: /tmp/quire\n")?;
            let config = Config::load(Some(Path::new("quire.yml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.upload.denied_extensions, [".bat"]);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        let err = Config::figment(Some(Path::new("/nonexistent/quire.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_format() {
        Jail::expect_with(|jail| {
            jail.create_file("quire.ini", "[storage]")?;
            let err = Config::figment(Some(Path::new("quire.ini"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_env_value() {
        Jail::expect_with(|jail| {
            jail.set_env("QUIRE_RENDER__THUMBNAIL_SCALE", "huge");
            let err = Config::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid));
            Ok(())
        });
    }
}
