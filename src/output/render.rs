//! Renderers that turn a finished sample series into a file
//!
//! The SVG chart plots send offset in seconds (x) against round-trip time in
//! milliseconds (y). The JSON report carries the raw samples along with the
//! run's outcome counts and statistics.

use crate::{
    error::{AppError, Result},
    executor::{RunReport, StopReason},
    models::{OutcomeCounts, SampleSeries},
    stats::LatencyStatistics,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const X_AXIS_LABEL: &str = "Time (seconds)";
pub const Y_AXIS_LABEL: &str = "Round-trip time (ms)";

/// Where and under which title to render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub title: String,
    pub filename: PathBuf,
}

impl RenderOptions {
    pub fn new(title: impl Into<String>, filename: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            filename: filename.into(),
        }
    }
}

/// Read-only consumer of a sample series
pub trait SeriesRenderer {
    /// Write the artifact, creating parent directories; returns the path written
    fn render(&self, series: &SampleSeries, options: &RenderOptions) -> Result<PathBuf>;
}

fn write_file(path: &Path, contents: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::render(format!("cannot create directory {}: {}", parent.display(), e))
        })?;
    }
    std::fs::write(path, contents)
        .map_err(|e| AppError::render(format!("cannot write {}: {}", path.display(), e)))?;
    Ok(path.to_path_buf())
}

/// Line chart in SVG
#[derive(Debug, Clone, Copy)]
pub struct SvgRenderer {
    width: u32,
    height: u32,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        // 10 x 6 inches at 100 dpi
        Self { width: 1000, height: 600 }
    }
}

const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 60.0;
const TICKS: usize = 5;

impl SvgRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Build the SVG document
    pub fn to_svg(&self, series: &SampleSeries, title: &str) -> String {
        let width = f64::from(self.width);
        let height = f64::from(self.height);
        let plot_width = (width - MARGIN_LEFT - MARGIN_RIGHT).max(1.0);
        let plot_height = (height - MARGIN_TOP - MARGIN_BOTTOM).max(1.0);

        let xs = series.offsets_secs();
        let ys = series.rtts_ms();
        let x_max = nice_max(xs.iter().copied().fold(0.0, f64::max));
        let y_max = nice_max(ys.iter().copied().fold(0.0, f64::max) * 1.1);

        let to_x = |x: f64| MARGIN_LEFT + x / x_max * plot_width;
        let to_y = |y: f64| MARGIN_TOP + plot_height - y / y_max * plot_height;

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        );
        let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="30" text-anchor="middle" font-family="sans-serif" font-size="20">{}</text>"#,
            width / 2.0,
            escape(title)
        );

        // Grid and tick labels
        for i in 0..=TICKS {
            let fraction = i as f64 / TICKS as f64;
            let gx = MARGIN_LEFT + fraction * plot_width;
            let gy = MARGIN_TOP + plot_height - fraction * plot_height;
            let _ = writeln!(
                svg,
                r##"<line x1="{gx:.1}" y1="{top:.1}" x2="{gx:.1}" y2="{bottom:.1}" stroke="#dddddd"/>"##,
                top = MARGIN_TOP,
                bottom = MARGIN_TOP + plot_height
            );
            let _ = writeln!(
                svg,
                r##"<line x1="{left:.1}" y1="{gy:.1}" x2="{right:.1}" y2="{gy:.1}" stroke="#dddddd"/>"##,
                left = MARGIN_LEFT,
                right = MARGIN_LEFT + plot_width
            );
            let _ = writeln!(
                svg,
                r#"<text x="{gx:.1}" y="{:.1}" text-anchor="middle" font-family="sans-serif" font-size="12">{}</text>"#,
                MARGIN_TOP + plot_height + 18.0,
                tick_label(fraction * x_max)
            );
            let _ = writeln!(
                svg,
                r#"<text x="{:.1}" y="{:.1}" text-anchor="end" font-family="sans-serif" font-size="12">{}</text>"#,
                MARGIN_LEFT - 8.0,
                gy + 4.0,
                tick_label(fraction * y_max)
            );
        }

        let _ = writeln!(
            svg,
            r#"<rect x="{MARGIN_LEFT:.1}" y="{MARGIN_TOP:.1}" width="{plot_width:.1}" height="{plot_height:.1}" fill="none" stroke="black"/>"#
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-family="sans-serif" font-size="14">{}</text>"#,
            MARGIN_LEFT + plot_width / 2.0,
            height - 15.0,
            X_AXIS_LABEL
        );
        let _ = writeln!(
            svg,
            r#"<text x="20" y="{cy:.1}" text-anchor="middle" font-family="sans-serif" font-size="14" transform="rotate(-90 20 {cy:.1})">{label}</text>"#,
            cy = MARGIN_TOP + plot_height / 2.0,
            label = Y_AXIS_LABEL
        );

        if series.is_empty() {
            let _ = writeln!(
                svg,
                r##"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-family="sans-serif" font-size="16" fill="#888888">No round trips recorded</text>"##,
                MARGIN_LEFT + plot_width / 2.0,
                MARGIN_TOP + plot_height / 2.0
            );
        } else {
            let points: Vec<String> = xs
                .iter()
                .zip(&ys)
                .map(|(&x, &y)| format!("{:.2},{:.2}", to_x(x), to_y(y)))
                .collect();
            let _ = writeln!(
                svg,
                r#"<polyline fill="none" stroke="blue" stroke-width="1.5" points="{}"/>"#,
                points.join(" ")
            );
            for (&x, &y) in xs.iter().zip(&ys) {
                let _ = writeln!(
                    svg,
                    r#"<circle cx="{:.2}" cy="{:.2}" r="2.5" fill="blue"/>"#,
                    to_x(x),
                    to_y(y)
                );
            }
        }

        svg.push_str("</svg>\n");
        svg
    }
}

impl SeriesRenderer for SvgRenderer {
    fn render(&self, series: &SampleSeries, options: &RenderOptions) -> Result<PathBuf> {
        write_file(&options.filename, &self.to_svg(series, &options.title))
    }
}

/// Axis upper bound; never zero so an empty or flat series still scales
fn nice_max(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        1.0
    } else {
        value
    }
}

fn tick_label(value: f64) -> String {
    if value >= 100.0 {
        format!("{:.0}", value)
    } else if value >= 10.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.2}", value)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// One sample as written to the JSON report
#[derive(Debug, Serialize)]
struct JsonSample {
    offset_s: f64,
    rtt_ms: f64,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    title: &'a str,
    tool: &'static str,
    version: &'static str,
    generated_at: DateTime<Utc>,
    stop_reason: Option<StopReason>,
    elapsed_s: Option<f64>,
    outcomes: OutcomeCounts,
    statistics: LatencyStatistics,
    samples: Vec<JsonSample>,
}

/// Machine-readable report
#[derive(Debug, Clone, Default)]
pub struct JsonRenderer {
    outcomes: Option<OutcomeCounts>,
    stop_reason: Option<StopReason>,
    elapsed_s: Option<f64>,
}

impl JsonRenderer {
    /// Renderer for a bare series; every sample counts as matched
    pub fn new() -> Self {
        Self::default()
    }

    /// Include the run's outcome counts and stop reason
    pub fn for_report(report: &RunReport) -> Self {
        Self {
            outcomes: Some(report.outcomes),
            stop_reason: Some(report.stop_reason),
            elapsed_s: Some(report.elapsed.as_secs_f64()),
        }
    }

    pub fn to_json(&self, series: &SampleSeries, title: &str) -> Result<String> {
        let outcomes = self.outcomes.unwrap_or(OutcomeCounts {
            matched: u32::try_from(series.len()).unwrap_or(u32::MAX),
            ..OutcomeCounts::default()
        });
        let report = JsonReport {
            title,
            tool: crate::PKG_NAME,
            version: crate::VERSION,
            generated_at: Utc::now(),
            stop_reason: self.stop_reason,
            elapsed_s: self.elapsed_s,
            outcomes,
            statistics: LatencyStatistics::from_series(series, &outcomes),
            samples: series
                .iter()
                .map(|sample| JsonSample {
                    offset_s: sample.offset_secs(),
                    rtt_ms: sample.rtt_ms(),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }
}

impl SeriesRenderer for JsonRenderer {
    fn render(&self, series: &SampleSeries, options: &RenderOptions) -> Result<PathBuf> {
        write_file(&options.filename, &self.to_json(series, &options.title)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sample;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_series() -> SampleSeries {
        SampleSeries::from_samples([
            Sample::new(Duration::from_millis(0), Duration::from_millis(3)),
            Sample::new(Duration::from_millis(500), Duration::from_millis(5)),
            Sample::new(Duration::from_millis(1000), Duration::from_millis(4)),
        ])
        .unwrap()
    }

    #[test]
    fn test_svg_contains_axes_and_points() {
        let svg = SvgRenderer::default().to_svg(&sample_series(), "Latency <USB>");
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains(X_AXIS_LABEL));
        assert!(svg.contains(Y_AXIS_LABEL));
        assert!(svg.contains("Latency &lt;USB&gt;"));
        assert!(svg.contains("<polyline"));
        assert_eq!(svg.matches("<circle").count(), 3);
    }

    #[test]
    fn test_svg_empty_series() {
        let svg = SvgRenderer::default().to_svg(&SampleSeries::new(), "Empty");
        assert!(svg.contains("No round trips recorded"));
        assert!(!svg.contains("<polyline"));
        assert!(!svg.contains("NaN"));
    }

    #[test]
    fn test_render_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results").join("nested").join("output.svg");
        let options = RenderOptions::new("Test", &path);

        let written = SvgRenderer::default().render(&sample_series(), &options).unwrap();
        assert_eq!(written, path);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("<svg"));
    }

    #[test]
    fn test_json_report() {
        let json = JsonRenderer::new().to_json(&sample_series(), "Run").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["title"], "Run");
        assert_eq!(value["samples"].as_array().unwrap().len(), 3);
        assert_eq!(value["outcomes"]["matched"], 3);
        assert_eq!(value["statistics"]["sample_count"], 3);
        assert!(value["stop_reason"].is_null());
        let rtt = value["samples"][1]["rtt_ms"].as_f64().unwrap();
        assert!((rtt - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_render_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        JsonRenderer::new()
            .render(&sample_series(), &RenderOptions::new("Run", &path))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["tool"], crate::PKG_NAME);
    }

    #[test]
    fn test_render_into_a_file_path_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let options = RenderOptions::new("Test", blocker.join("output.svg"));
        let result = SvgRenderer::default().render(&sample_series(), &options);
        assert!(matches!(result, Err(AppError::Render(_))));
    }
}
