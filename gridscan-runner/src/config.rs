//! Serializable scan profiles.
//!
//! A profile captures everything needed to reproduce a scan: asset class,
//! history length, gate thresholds, exclusion rules, limits and network
//! settings. Built-in defaults come from [`ScanProfile::etf`] and
//! [`ScanProfile::equity`]. A TOML file names its `asset_class` and overrides
//! fields of that class's defaults; anything it leaves out keeps the built-in
//! value. TOML has no null, so an optional gate is disabled by setting a
//! threshold that always passes (e.g. `min_choppiness = 0.0`).

use gridscan_core::data::{PriceAdjustment, SinaConfig};
use gridscan_core::domain::AssetClass;
use gridscan_core::metrics::{min_bars_for_years, GateConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Cheap pre-fetch exclusion rules.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionRules {
    /// Substrings that exclude an instrument by display name.
    pub name_keywords: Vec<String>,
    /// Code prefixes that exclude an instrument outright.
    pub code_prefixes: Vec<String>,
}

/// Complete configuration for one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanProfile {
    pub asset_class: AssetClass,
    /// Years of history requested; also sets the minimum sample length.
    pub min_years: u32,
    pub gates: GateConfig,
    #[serde(default)]
    pub exclusions: ExclusionRules,
    /// Stop after this many listing entries. `None` scans everything.
    #[serde(default)]
    pub max_instruments: Option<usize>,
    /// Report progress every N processed instruments.
    pub progress_interval: usize,
    /// Parallel fetch/evaluate workers. 1 = sequential.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Default CSV file name for the ranked table.
    pub output_file: String,
    #[serde(default)]
    pub network: SinaConfig,
}

fn default_workers() -> usize {
    1
}

/// Recursively replace entries of `base` with those of `overrides`; nested
/// tables merge key by key, every other value is replaced whole.
fn overlay(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        let value = match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(inner)), toml::Value::Table(sub)) => {
                overlay(inner, sub);
                continue;
            }
            (_, value) => value,
        };
        base.insert(key, value);
    }
}

impl ScanProfile {
    /// Fund profile: 3 years, money-market/bond/gold products excluded.
    pub fn etf() -> Self {
        Self {
            asset_class: AssetClass::Etf,
            min_years: 3,
            gates: GateConfig::etf(),
            exclusions: ExclusionRules {
                name_keywords: ["货币", "债", "理财", "黄金", "添益", "快线"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                code_prefixes: Vec::new(),
            },
            max_instruments: None,
            progress_interval: 50,
            workers: 1,
            output_file: "全市场网格ETF终极选品表.csv".into(),
            network: SinaConfig::default(),
        }
    }

    /// Equity profile: 3 years, ST/delisting names and the `8`/`4` board excluded.
    pub fn equity() -> Self {
        Self {
            asset_class: AssetClass::Equity,
            min_years: 3,
            gates: GateConfig::equity(),
            exclusions: ExclusionRules {
                name_keywords: vec!["ST".into(), "退".into()],
                code_prefixes: vec!["8".into(), "4".into()],
            },
            max_instruments: Some(5500),
            progress_interval: 100,
            workers: 1,
            output_file: "A股个股网格标的终极筛选表.csv".into(),
            network: SinaConfig {
                adjustment: PriceAdjustment::Forward,
                ..SinaConfig::default()
            },
        }
    }

    pub fn for_class(class: AssetClass) -> Self {
        match class {
            AssetClass::Etf => Self::etf(),
            AssetClass::Equity => Self::equity(),
        }
    }

    /// Minimum sanitized bars: `ceil(min_years × 240 × 0.9)`.
    pub fn min_bars(&self) -> usize {
        min_bars_for_years(self.min_years)
    }

    /// Load a profile from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a profile from a TOML string, layered over the
    /// defaults of the `asset_class` it names.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let overrides: toml::Table = toml::from_str(content)?;
        let class: AssetClass = overrides
            .get("asset_class")
            .cloned()
            .ok_or_else(|| ConfigError::Invalid("asset_class is required".into()))?
            .try_into()?;

        let toml::Value::Table(mut merged) = toml::Value::try_from(Self::for_class(class))
            .map_err(|e| ConfigError::Serialize(e.to_string()))?
        else {
            return Err(ConfigError::Serialize("profile did not serialize to a table".into()));
        };
        overlay(&mut merged, overrides);

        let profile: Self = toml::Value::Table(merged).try_into()?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.gates;
        if self.min_years == 0 {
            return Err(ConfigError::Invalid("min_years must be at least 1".into()));
        }
        if g.turnover_window == 0 {
            return Err(ConfigError::Invalid("gates.turnover_window must be positive".into()));
        }
        if g.ma_period == 0 {
            return Err(ConfigError::Invalid("gates.ma_period must be positive".into()));
        }
        if !g.min_avg_turnover.is_finite() || g.min_avg_turnover < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "gates.min_avg_turnover must be a non-negative number, got {}",
                g.min_avg_turnover
            )));
        }
        if !g.min_amplitude_pct.is_finite() || g.min_amplitude_pct < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "gates.min_amplitude_pct must be a non-negative number, got {}",
                g.min_amplitude_pct
            )));
        }
        if let Some(c) = g.min_choppiness {
            if !(0.0..=1.0).contains(&c) {
                return Err(ConfigError::Invalid(format!(
                    "gates.min_choppiness must lie in [0, 1], got {c}"
                )));
            }
        }
        if let Some(s) = g.max_trend_slope_pct {
            if !s.is_finite() || s < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "gates.max_trend_slope_pct must be non-negative, got {s}"
                )));
            }
        }
        if self.progress_interval == 0 {
            return Err(ConfigError::Invalid("progress_interval must be positive".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.network.requests_per_second <= 0.0 {
            return Err(ConfigError::Invalid(
                "network.requests_per_second must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Content hash of the profile, recorded in the scan manifest.
    pub fn config_hash(&self) -> String {
        // Every field is plain data, so JSON serialization cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_market_conventions() {
        let etf = ScanProfile::etf();
        assert_eq!(etf.gates.min_avg_turnover, 50_000_000.0);
        assert_eq!(etf.gates.min_amplitude_pct, 1.5);
        assert_eq!(etf.min_bars(), 648);
        assert_eq!(etf.progress_interval, 50);
        assert!(etf.exclusions.name_keywords.iter().any(|k| k == "货币"));

        let eq = ScanProfile::equity();
        assert_eq!(eq.gates.min_choppiness, Some(0.90));
        assert_eq!(eq.gates.max_trend_slope_pct, Some(0.05));
        assert_eq!(eq.max_instruments, Some(5500));
        assert_eq!(eq.exclusions.code_prefixes, vec!["8", "4"]);
    }

    #[test]
    fn toml_round_trip() {
        let profile = ScanProfile::equity();
        let text = profile.to_toml().unwrap();
        let parsed = ScanProfile::from_toml(&text).unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn partial_etf_toml_keeps_fund_defaults() {
        let text = r#"
            asset_class = "etf"
            min_years = 2

            [gates]
            min_amplitude_pct = 2.5
        "#;
        let profile = ScanProfile::from_toml(text).unwrap();
        assert_eq!(profile.min_years, 2);
        assert_eq!(profile.gates.min_amplitude_pct, 2.5);
        assert_eq!(profile.gates.min_avg_turnover, 50_000_000.0);
        assert_eq!(profile.gates.ma_period, 120);
        assert_eq!(profile.progress_interval, 50);
        assert_eq!(profile.workers, 1);
        assert!(profile.exclusions.name_keywords.iter().any(|k| k == "货币"));
        assert!(profile.exclusions.name_keywords.iter().any(|k| k == "黄金"));
        assert_eq!(profile.network, SinaConfig::default());
    }

    #[test]
    fn partial_equity_toml_keeps_equity_gates_and_exclusions() {
        let text = r#"
            asset_class = "equity"

            [gates]
            min_amplitude_pct = 4.0
        "#;
        let profile = ScanProfile::from_toml(text).unwrap();
        let defaults = ScanProfile::equity();
        assert_eq!(profile.gates.min_amplitude_pct, 4.0);
        assert_eq!(profile.gates.min_avg_turnover, 200_000_000.0);
        assert_eq!(profile.gates.min_choppiness, Some(0.90));
        assert_eq!(profile.gates.max_trend_slope_pct, Some(0.05));
        assert_eq!(profile.exclusions, defaults.exclusions);
        assert_eq!(profile.max_instruments, Some(5500));
        assert_eq!(profile.output_file, defaults.output_file);
        assert_eq!(profile.network.adjustment, PriceAdjustment::Forward);
    }

    #[test]
    fn nested_network_overrides_merge_field_by_field() {
        let text = r#"
            asset_class = "equity"
            exclusions = { name_keywords = ["ST"] }

            [network]
            timeout_secs = 30

            [network.retry]
            max_retries = 4
        "#;
        let profile = ScanProfile::from_toml(text).unwrap();
        assert_eq!(profile.network.timeout_secs, 30);
        assert_eq!(profile.network.retry.max_retries, 4);
        assert_eq!(profile.network.retry.base_delay_ms, 500);
        assert_eq!(profile.network.adjustment, PriceAdjustment::Forward);
        assert_eq!(profile.exclusions.name_keywords, vec!["ST"]);
        assert_eq!(profile.exclusions.code_prefixes, vec!["8", "4"]);
    }

    #[test]
    fn asset_class_is_required() {
        let err = ScanProfile::from_toml("min_years = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_choppiness() {
        let mut profile = ScanProfile::equity();
        profile.gates.min_choppiness = Some(1.5);
        assert!(matches!(profile.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_zero_workers() {
        let mut profile = ScanProfile::etf();
        profile.workers = 0;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn hash_is_stable_and_sensitive() {
        let a = ScanProfile::etf();
        let mut b = ScanProfile::etf();
        assert_eq!(a.config_hash(), b.config_hash());
        b.gates.min_amplitude_pct = 2.0;
        assert_ne!(a.config_hash(), b.config_hash());
    }
}
