//! Terminal rendering of the labelled stream and CSV export of anomalies.

use crate::config::OutputConfig;
use crate::error::{DetectorError, Result};
use crate::models::base_model::Label;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::info;

const NORMAL_MARK: char = 'o';
const ANOMALY_MARK: char = 'X';
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// One row of `anomalies.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRecord {
    #[serde(rename = "Index")]
    pub index: usize,
    #[serde(rename = "Value")]
    pub value: f64,
}

fn check_lengths(data: &[f64], labels: &[Label]) -> Result<()> {
    if data.len() != labels.len() {
        return Err(DetectorError::LengthMismatch {
            data: data.len(),
            labels: labels.len(),
        });
    }
    Ok(())
}

/// Anomalous points in stream order.
pub fn collect_anomalies(data: &[f64], labels: &[Label]) -> Result<Vec<AnomalyRecord>> {
    check_lengths(data, labels)?;
    Ok(data
        .iter()
        .zip(labels)
        .enumerate()
        .filter(|(_, (_, label))| label.is_anomalous())
        .map(|(index, (&value, _))| AnomalyRecord { index, value })
        .collect())
}

/// Write `Index,Value` rows. The header is written even when there are no rows.
pub fn write_anomalies_csv(path: &Path, records: &[AnomalyRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(["Index", "Value"])?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Plain-text chart of the first `frame` points, showing at most the last
/// `width` of them on a `height`-row grid. The y range is fixed over the whole
/// series so successive frames line up.
pub fn render_frame(
    data: &[f64],
    labels: &[Label],
    frame: usize,
    width: usize,
    height: usize,
) -> String {
    let frame = frame.min(data.len()).min(labels.len());
    let width = width.max(1);
    let height = height.max(2);

    let (lo, hi) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let (y_lo, y_hi) = if lo.is_finite() { (lo - 1.0, hi + 1.0) } else { (-1.0, 1.0) };

    let start = frame.saturating_sub(width);
    let visible = frame - start;
    let mut grid = vec![vec![' '; visible]; height];
    for (col, i) in (start..frame).enumerate() {
        let ratio = (y_hi - data[i]) / (y_hi - y_lo);
        let row = ((ratio * (height - 1) as f64).round() as usize).min(height - 1);
        grid[row][col] = if labels[i].is_anomalous() {
            ANOMALY_MARK
        } else {
            NORMAL_MARK
        };
    }

    let anomalies = labels[..frame].iter().filter(|l| l.is_anomalous()).count();
    let mut out = format!(
        "Energy Data Stream with Anomalies (hour {frame}/{}, {anomalies} anomalies)\n",
        data.len()
    );
    for (r, row) in grid.iter().enumerate() {
        let axis = if r == 0 {
            format!("{y_hi:>8.2}")
        } else if r == height - 1 {
            format!("{y_lo:>8.2}")
        } else {
            " ".repeat(8)
        };
        let line: String = row.iter().collect();
        out.push_str(&format!("{axis} |{}\n", line.trim_end()));
    }
    out.push_str(&format!("{} +{}\n", " ".repeat(8), "-".repeat(visible)));
    out.push_str(&format!(
        "{} Time (Hours) {start}..{frame}   {NORMAL_MARK} Energy Usage (kWh)  {ANOMALY_MARK} Anomalies\n",
        " ".repeat(8)
    ));
    out
}

/// Colour the plotted marks; titles and axes stay plain.
fn paint(frame: &str) -> String {
    let mut out = String::with_capacity(frame.len());
    for line in frame.lines() {
        match line.split_once(" |") {
            Some((axis, plot)) => {
                out.push_str(axis);
                out.push_str(" |");
                for c in plot.chars() {
                    match c {
                        ANOMALY_MARK => out.push_str(&"X".red().bold().to_string()),
                        NORMAL_MARK => out.push_str(&"o".blue().to_string()),
                        other => out.push(other),
                    }
                }
            }
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}

/// Animate the labelled stream to `out`, then persist the anomalies to
/// `output.csv_path` once the presentation is over.
///
/// With `animate` off only the final frame is drawn.
pub fn plot_energy_stream<W: Write>(
    data: &[f64],
    labels: &[Label],
    output: &OutputConfig,
    out: &mut W,
) -> Result<Vec<AnomalyRecord>> {
    check_lengths(data, labels)?;

    let frames = if output.animate {
        1..=data.len()
    } else {
        data.len()..=data.len()
    };
    let interval = Duration::from_millis(output.frame_interval_ms);
    for frame in frames {
        let text = render_frame(data, labels, frame, output.width, output.height);
        if output.animate {
            write!(out, "{CLEAR_SCREEN}")?;
        }
        write!(out, "{}", paint(&text))?;
        out.flush()?;
        if output.animate && !interval.is_zero() {
            thread::sleep(interval);
        }
    }

    let records = collect_anomalies(data, labels)?;
    write_anomalies_csv(&output.csv_path, &records)?;
    info!(
        anomalies = records.len(),
        path = %output.csv_path.display(),
        "saved anomalies"
    );
    writeln!(
        out,
        "Anomalies have been saved to '{}'.",
        output.csv_path.display()
    )?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::base_model::Label::{Anomalous as A, Normal as N};

    fn plotted(text: &str, mark: char) -> usize {
        text.lines()
            .filter_map(|l| l.split_once(" |"))
            .map(|(_, plot)| plot.matches(mark).count())
            .sum()
    }

    #[test]
    fn mismatched_lengths_fail() {
        let err = collect_anomalies(&[1.0, 2.0], &[N]).unwrap_err();
        assert!(matches!(err, DetectorError::LengthMismatch { data: 2, labels: 1 }));
    }

    #[test]
    fn anomalies_keep_stream_index() {
        let records = collect_anomalies(&[0.1, 5.0, 0.2, 6.0], &[N, A, N, A]).unwrap();
        assert_eq!(
            records,
            vec![
                AnomalyRecord { index: 1, value: 5.0 },
                AnomalyRecord { index: 3, value: 6.0 },
            ]
        );
    }

    #[test]
    fn frame_marks_only_visible_points() {
        let data = [0.0, 1.0, 5.0, 1.0, 0.0];
        let labels = [N, N, A, N, N];
        let text = render_frame(&data, &labels, 3, 80, 6);
        assert_eq!(plotted(&text, ANOMALY_MARK), 1);
        assert_eq!(plotted(&text, NORMAL_MARK), 2);
        assert!(text.contains("hour 3/5, 1 anomalies"));

        let narrow = render_frame(&data, &labels, 5, 2, 6);
        assert_eq!(plotted(&narrow, ANOMALY_MARK), 0);
        assert_eq!(plotted(&narrow, NORMAL_MARK), 2);
        assert!(narrow.contains("3..5"));
    }

    #[test]
    fn highest_value_sits_on_top_rows() {
        let data = [0.0, 10.0];
        let text = render_frame(&data, &[N, A], 2, 10, 12);
        let lines: Vec<&str> = text.lines().collect();
        let top = lines.iter().position(|l| l.contains(" | X")).unwrap();
        let bottom = lines.iter().position(|l| l.contains(" |o")).unwrap();
        assert!(top < bottom);
    }

    #[test]
    fn csv_has_header_even_without_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anomalies.csv");
        write_anomalies_csv(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Index,Value\n");

        write_anomalies_csv(&path, &[AnomalyRecord { index: 30, value: 6.5 }]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Index,Value\n30,6.5\n"
        );
    }
}
