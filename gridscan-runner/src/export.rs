//! Ranked-table export: CSV artifact, JSON manifest and console preview.
//!
//! The CSV is UTF-8 with a byte-order mark so spreadsheet tools pick the
//! right encoding for the Chinese headers and names. Column order and
//! rounding are fixed. The manifest records how the table was produced.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gridscan_core::domain::{AssetClass, GridRecord};

use crate::config::ScanProfile;
use crate::scanner::{OutcomeCounts, ScanReport, ScanWindow};

/// Current schema version for the manifest.
pub const SCHEMA_VERSION: u32 = 1;

/// Rows shown by the console preview.
pub const CONSOLE_TOP_N: usize = 15;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Fixed CSV header, in column order.
pub const CSV_HEADER: [&str; 8] = [
    "代码",
    "名称",
    "网格综合评分",
    "平均日振幅(%)",
    "震荡纯度(0-1)",
    "近20日均成交额",
    "MA120变异系数",
    "趋势斜率惩罚",
];

fn csv_row(r: &GridRecord) -> [String; 8] {
    [
        r.code.clone(),
        r.name.clone(),
        format!("{:.2}", r.score),
        format!("{:.2}", r.amplitude_pct),
        format!("{:.3}", r.choppiness),
        r.turnover_display(),
        format!("{:.4}", r.ma_cv),
        format!("{:.4}", r.trend_slope_pct),
    ]
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Render records as BOM-prefixed CSV bytes.
pub fn records_to_csv(records: &[GridRecord]) -> Result<Vec<u8>> {
    let mut buf = UTF8_BOM.to_vec();
    {
        let mut wtr = csv::Writer::from_writer(&mut buf);
        wtr.write_record(CSV_HEADER)?;
        for r in records {
            wtr.write_record(csv_row(r))?;
        }
        wtr.flush().context("failed to flush CSV writer")?;
    }
    Ok(buf)
}

/// Write the ranked table to `path`. Refuses an empty table.
pub fn write_csv(path: &Path, records: &[GridRecord]) -> Result<()> {
    if records.is_empty() {
        bail!("refusing to write an empty result table to {}", path.display());
    }
    let bytes = records_to_csv(records)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("failed to write CSV to {}", path.display()))
}

// ─── Manifest ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanManifest {
    pub schema_version: u32,
    pub asset_class: AssetClass,
    pub config_hash: String,
    pub window: ScanWindow,
    pub min_bars: usize,
    pub total: usize,
    pub counts: OutcomeCounts,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub csv_file: Option<String>,
}

impl ScanManifest {
    pub fn new(report: &ScanReport, profile: &ScanProfile, csv_path: Option<&Path>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            asset_class: report.asset_class,
            config_hash: profile.config_hash(),
            window: report.window,
            min_bars: profile.min_bars(),
            total: report.total,
            counts: report.counts.clone(),
            cancelled: report.cancelled,
            started_at: report.started_at,
            finished_at: report.finished_at,
            elapsed_secs: report.elapsed_secs,
            csv_file: csv_path
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned()),
        }
    }
}

/// `<dir>/<stem>.manifest.json` beside the CSV.
pub fn manifest_path_for(csv_path: &Path) -> PathBuf {
    csv_path.with_extension("manifest.json")
}

pub fn write_manifest(path: &Path, manifest: &ScanManifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest).context("failed to serialize scan manifest")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write manifest to {}", path.display()))
}

/// Load a manifest, rejecting unknown schema versions.
pub fn read_manifest(path: &Path) -> Result<ScanManifest> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let manifest: ScanManifest =
        serde_json::from_str(&json).context("failed to deserialize scan manifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

// ─── Console ────────────────────────────────────────────────────────

/// Plain-text table of the first `n` records.
pub fn render_table(records: &[GridRecord], n: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<4} {:<10} {:<16} {:>8} {:>8} {:>6} {:>12} {:>8} {:>8}\n",
        "#", "code", "name", "score", "amp%", "chop", "turnover", "ma_cv", "slope%"
    ));
    for (i, r) in records.iter().take(n).enumerate() {
        let row = csv_row(r);
        out.push_str(&format!(
            "{:<4} {:<10} {:<16} {:>8} {:>8} {:>6} {:>12} {:>8} {:>8}\n",
            i + 1,
            row[0],
            row[1],
            row[2],
            row[3],
            row[4],
            row[5],
            row[6],
            row[7]
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, score: f64) -> GridRecord {
        GridRecord {
            code: code.into(),
            name: "测试,ETF".into(),
            score,
            amplitude_pct: 2.346,
            choppiness: 0.9876,
            avg_turnover: 123_456_789.0,
            ma_cv: 0.012345,
            trend_slope_pct: 0.000049,
        }
    }

    #[test]
    fn csv_has_bom_header_and_rounding() {
        let bytes = records_to_csv(&[record("510300", 12.3456)]).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "510300,\"测试,ETF\",12.35,2.35,0.988,1.23 亿,0.0123,0.0000"
        );
    }

    #[test]
    fn table_is_limited_to_n_rows() {
        let records: Vec<_> = (0..20).map(|i| record(&format!("51{i:04}"), 20.0 - i as f64)).collect();
        let table = render_table(&records, CONSOLE_TOP_N);
        assert_eq!(table.lines().count(), CONSOLE_TOP_N + 1);
    }

    #[test]
    fn manifest_path_sits_beside_csv() {
        assert_eq!(
            manifest_path_for(Path::new("out/result.csv")),
            PathBuf::from("out/result.manifest.json")
        );
    }
}
