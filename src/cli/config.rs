//! TOML configuration file support.
//!
//! Instead of passing many CLI flags, users can keep the per-experiment
//! settings in a config file:
//!
//! ```toml
//! # dbre.toml
//! [analysis]
//! slope_threshold = 0.008
//! concavity_threshold = 0.001
//! min_plateau_length = 15.0
//! time_horizon = 600.0
//! smoothing = 0.001
//! polarity = "negative"
//!
//! [run]
//! file_prefix = "A_DBRE_#"
//! reset_time_s = 1.0
//! cycle_time_s = 0.0
//! start_time = "2020-10-27 15:00:00"
//! summary_name = "summary.csv"
//! ```
//!
//! CLI flags override config file values, which override the built-in
//! defaults.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::path::Path;

use dbre::detect::ThresholdSet;
use dbre::estimate::Polarity;
use dbre::trace::DEFAULT_SMOOTHING;

/// Root configuration structure for dbre.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Detection/estimation settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Run driver settings.
    #[serde(default)]
    pub run: RunConfig,
}

/// Configuration for the analysis core.
#[derive(Debug, Default, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum plateau slope in V/s.
    pub slope_threshold: Option<f64>,

    /// Symmetric concavity band in V/s^2.
    pub concavity_threshold: Option<f64>,

    /// Minimum in-plateau stretch in samples.
    pub min_plateau_length: Option<f64>,

    /// Evaluation horizon in seconds.
    pub time_horizon: Option<f64>,

    /// Spline curvature penalty.
    pub smoothing: Option<f64>,

    /// Reported sign convention.
    pub polarity: Option<Polarity>,
}

/// Configuration for the watch driver.
#[derive(Debug, Default, Deserialize)]
pub struct RunConfig {
    /// Measurement filename prefix before the 1-based index.
    pub file_prefix: Option<String>,

    /// Seconds to sleep between polls of a not-yet-ready file.
    pub reset_time_s: Option<f64>,

    /// Optional pacing delay between completed files, in seconds.
    pub cycle_time_s: Option<f64>,

    /// Experiment start time, `YYYY-MM-DD HH:MM:SS`.
    pub start_time: Option<String>,

    /// Summary table filename within the run folder.
    pub summary_name: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Load the file when given, otherwise an empty config.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// Fully resolved analysis settings.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisSettings {
    /// Detection thresholds.
    pub thresholds: ThresholdSet,
    /// Evaluation horizon in seconds.
    pub time_horizon: f64,
    /// Spline curvature penalty.
    pub smoothing: f64,
    /// Reported sign convention.
    pub polarity: Polarity,
}

/// Fully resolved run driver settings.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Measurement filename prefix.
    pub file_prefix: String,
    /// Poll interval in seconds.
    pub reset_time_s: f64,
    /// Pacing delay between files in seconds.
    pub cycle_time_s: f64,
    /// Experiment start time; defaults to the first file's stamp.
    pub start_time: Option<NaiveDateTime>,
    /// Summary table filename.
    pub summary_name: String,
}

/// Shared analysis flags, reused by `analyze` and `watch`.
#[derive(Debug, clap::Args)]
pub struct AnalysisArgs {
    /// Maximum plateau slope in V/s
    #[arg(long)]
    pub slope_threshold: Option<f64>,

    /// Symmetric concavity band in V/s^2
    #[arg(long)]
    pub concavity_threshold: Option<f64>,

    /// Minimum in-plateau stretch in samples
    #[arg(long)]
    pub min_plateau_length: Option<f64>,

    /// Evaluate samples up to this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub horizon: Option<f64>,

    /// Spline curvature penalty for the concavity signal
    #[arg(long)]
    pub smoothing: Option<f64>,

    /// Sign convention for the reported potential
    #[arg(long, value_enum)]
    pub polarity: Option<Polarity>,
}

impl AnalysisArgs {
    /// Merge flags over config values over defaults.
    pub fn resolve(&self, config: &AnalysisConfig) -> AnalysisSettings {
        AnalysisSettings {
            thresholds: ThresholdSet {
                slope_threshold: self
                    .slope_threshold
                    .or(config.slope_threshold)
                    .unwrap_or(0.008),
                concavity_threshold: self
                    .concavity_threshold
                    .or(config.concavity_threshold)
                    .unwrap_or(0.001),
                min_plateau_length: self
                    .min_plateau_length
                    .or(config.min_plateau_length)
                    .unwrap_or(15.0),
            },
            time_horizon: self.horizon.or(config.time_horizon).unwrap_or(600.0),
            smoothing: self.smoothing.or(config.smoothing).unwrap_or(DEFAULT_SMOOTHING),
            polarity: self.polarity.or(config.polarity).unwrap_or_default(),
        }
    }
}

/// Shared run driver flags for `watch`.
#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Measurement filename prefix before the 1-based index
    #[arg(long)]
    pub prefix: Option<String>,

    /// Seconds to sleep between polls of a missing file
    #[arg(long, value_name = "SECONDS")]
    pub reset_time: Option<f64>,

    /// Pacing delay between completed files, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub cycle_time: Option<f64>,

    /// Experiment start time, "YYYY-MM-DD HH:MM:SS" (defaults to the
    /// first measurement's own stamp)
    #[arg(long, value_name = "DATETIME")]
    pub start_time: Option<String>,

    /// Summary table filename within the run folder
    #[arg(long)]
    pub summary: Option<String>,
}

impl RunArgs {
    /// Merge flags over config values over defaults.
    pub fn resolve(&self, config: &RunConfig) -> Result<RunSettings> {
        let start_raw = self.start_time.as_ref().or(config.start_time.as_ref());
        let start_time = start_raw
            .map(|s| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .with_context(|| format!("Invalid start time {s:?}, expected YYYY-MM-DD HH:MM:SS"))
            })
            .transpose()?;

        Ok(RunSettings {
            file_prefix: self
                .prefix
                .clone()
                .or_else(|| config.file_prefix.clone())
                .unwrap_or_else(|| "A_DBRE_#".to_string()),
            reset_time_s: self.reset_time.or(config.reset_time_s).unwrap_or(1.0),
            cycle_time_s: self.cycle_time.or(config.cycle_time_s).unwrap_or(0.0),
            start_time,
            summary_name: self
                .summary
                .clone()
                .or_else(|| config.summary_name.clone())
                .unwrap_or_else(|| "summary.csv".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [analysis]
            slope_threshold = 0.005
            concavity_threshold = 0.002
            min_plateau_length = 20.0
            time_horizon = 150.0
            polarity = "positive"

            [run]
            file_prefix = "B_DBRE_#"
            reset_time_s = 600.0
            start_time = "2020-10-27 15:00:00"
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.analysis.slope_threshold, Some(0.005));
        assert_eq!(config.analysis.time_horizon, Some(150.0));
        assert_eq!(config.analysis.polarity, Some(Polarity::Positive));
        assert_eq!(config.run.file_prefix.as_deref(), Some("B_DBRE_#"));
        assert_eq!(config.run.reset_time_s, Some(600.0));
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [analysis]
            slope_threshold = 0.01
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.analysis.slope_threshold, Some(0.01));
        assert_eq!(config.analysis.concavity_threshold, None);
        assert_eq!(config.run.file_prefix, None);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.analysis.slope_threshold, None);
    }

    #[test]
    fn flags_override_config_which_overrides_defaults() {
        let config = Config::from_str(
            r#"
            [analysis]
            slope_threshold = 0.005
            time_horizon = 150.0
        "#,
        )
        .unwrap();

        let args = AnalysisArgs {
            slope_threshold: Some(0.002),
            concavity_threshold: None,
            min_plateau_length: None,
            horizon: None,
            smoothing: None,
            polarity: None,
        };

        let settings = args.resolve(&config.analysis);
        assert_eq!(settings.thresholds.slope_threshold, 0.002); // flag
        assert_eq!(settings.time_horizon, 150.0); // config
        assert_eq!(settings.thresholds.concavity_threshold, 0.001); // default
        assert_eq!(settings.polarity, Polarity::Negative); // default
    }

    #[test]
    fn run_args_parse_the_start_time() {
        let args = RunArgs {
            prefix: None,
            reset_time: None,
            cycle_time: None,
            start_time: Some("2020-10-27 15:00:00".to_string()),
            summary: None,
        };
        let settings = args.resolve(&RunConfig::default()).unwrap();
        assert!(settings.start_time.is_some());
        assert_eq!(settings.file_prefix, "A_DBRE_#");

        let bad = RunArgs {
            start_time: Some("not a time".to_string()),
            prefix: None,
            reset_time: None,
            cycle_time: None,
            summary: None,
        };
        assert!(bad.resolve(&RunConfig::default()).is_err());
    }
}
