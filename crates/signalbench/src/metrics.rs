//! Per-step metric records and the per-episode CSV log.
//!
//! The persisted log is the sole durable artifact of an episode: one file per
//! episode, one row per decision step, each field rendered as its mapping
//! repr. The format is stable within a benchmark run only; nothing re-reads it
//! during the run.

use crate::Result;
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Metrics collected for one decision step, keyed per active intersection and
/// ordered by the active set.
#[derive(Clone, Debug)]
pub struct StepMetric {
    /// Simulated time at the end of the step
    pub step: f64,
    pub reward: Vec<(String, f32)>,
    pub max_queues: Vec<(String, u32)>,
    pub queue_lengths: Vec<(String, u32)>,
}

fn render_map<V: std::fmt::Display>(pairs: &[(String, V)]) -> String {
    let mut out = String::from("{");
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{key}: {value}");
    }
    out.push('}');
    out
}

impl StepMetric {
    /// One CSV row: `step, reward_repr, max_queues_repr, queue_lengths_repr`.
    pub fn to_row(&self) -> String {
        format!(
            "{}, {}, {}, {}",
            self.step,
            render_map(&self.reward),
            render_map(&self.max_queues),
            render_map(&self.queue_lengths),
        )
    }
}

/// Write one episode's ordered metric sequence to
/// `<dir>/metrics_<episode>.csv`, creating the directory if needed.
///
/// An I/O failure here is surfaced but never rolls back simulation state.
pub fn write_episode(dir: &Path, episode: u32, rows: &[StepMetric]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("metrics_{episode}.csv"));
    tracing::info!(path = %path.display(), rows = rows.len(), "saving episode metrics");

    let mut file = std::io::BufWriter::new(fs::File::create(&path)?);
    for row in rows {
        writeln!(file, "{}", row.to_row())?;
    }
    file.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(t: f64) -> StepMetric {
        StepMetric {
            step: t,
            reward: vec![("a".into(), -1.5), ("b".into(), 0.0)],
            max_queues: vec![("a".into(), 3), ("b".into(), 0)],
            queue_lengths: vec![("a".into(), 7), ("b".into(), 0)],
        }
    }

    #[test]
    fn test_row_format() {
        assert_eq!(
            metric(10.0).to_row(),
            "10, {a: -1.5, b: 0}, {a: 3, b: 0}, {a: 7, b: 0}"
        );
    }

    #[test]
    fn test_write_episode_one_row_per_step() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<StepMetric> = (1..=4).map(|i| metric(i as f64 * 10.0)).collect();
        let path = write_episode(dir.path(), 2, &rows).unwrap();
        assert!(path.ends_with("metrics_2.csv"));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("10, "));
        assert!(lines[3].starts_with("40, "));
    }
}
