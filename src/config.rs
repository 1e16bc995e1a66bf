use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::deload::DeloadConfig;
use crate::logging::LogConfig;
use crate::pmc::{LoadConfig, RiskThresholds};
use crate::progression::ProgressionConfig;
use crate::readiness::ReadinessConfig;
use crate::recommendation::engine::RecommendationConfig;
use crate::tss::TssConfig;
use crate::zones::PolarizedConfig;

/// Every policy constant the engine uses, loadable from one TOML file.
///
/// Missing sections fall back to their defaults, so a config file only needs
/// the values it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Training-stress estimation defaults
    pub tss: TssConfig,

    /// Fitness/fatigue windows
    pub load: LoadConfig,

    /// Monotony, strain and ACWR risk bands
    pub risk: RiskThresholds,

    /// Intensity distribution targets
    pub zones: PolarizedConfig,

    pub readiness: ReadinessConfig,
    pub deload: DeloadConfig,
    pub progression: ProgressionConfig,
    pub recommendation: RecommendationConfig,
    pub logging: LogConfig,

    /// SQLite database used by the CLI
    pub database_path: Option<PathBuf>,
}

impl EngineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: EngineConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// `~/.adaptrs/config.toml`
    pub fn default_config_path() -> PathBuf {
        Self::base_dir().join("config.toml")
    }

    /// `~/.adaptrs/adaptrs.db` unless overridden
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| Self::base_dir().join("adaptrs.db"))
    }

    /// Load the default config file, falling back to defaults when it is
    /// missing or unreadable
    pub fn load_or_default() -> Self {
        let path = Self::default_config_path();
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: ignoring {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".adaptrs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: EngineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let toml_str = r#"
            [load]
            ctl_window_days = 28
            atl_window_days = 7
            window_cap_multiplier = 2
            normalize_partial_window = true
            monotony_window_days = 7
            max_monotony = "10"
            ramp_rate_days = 7
        "#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.load.ctl_window_days, 28);
        assert_eq!(config.readiness, ReadinessConfig::default());
        assert_eq!(config.recommendation.recovery_week_volume, dec!(0.55));
    }

    #[test]
    fn test_config_file_io() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = EngineConfig::default();
        config.deload.tsb_threshold = dec!(-15);
        config.database_path = Some(dir.path().join("plans.db"));
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.deload.tsb_threshold, dec!(-15));
        assert_eq!(loaded.database_path(), dir.path().join("plans.db"));
    }

    #[test]
    fn test_invalid_file_reports_context() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "load = 3").unwrap();

        let err = EngineConfig::load_from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse TOML"));
    }
}
