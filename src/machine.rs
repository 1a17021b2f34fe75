//! Machine roast-log ingestion
//!
//! Walks a directory of roaster log exports (CSV curves from Artisan,
//! Cropster and similar), matches each file to a round by the `-R##`
//! suffix in its filename, and condenses the curve into a short summary
//! for the round's notes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use walkdir::WalkDir;

/// One sampled point from a roast curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogPoint {
    pub elapsed_s: i64,
    pub bean_temp_c: Option<f64>,
}

/// Condensed per-round log data
#[derive(Debug, Clone)]
pub struct RoundLogSummary {
    pub round_no: usize,
    pub points: usize,
    pub start_s: i64,
    pub end_s: i64,
    pub max_bean_temp_c: Option<f64>,
}

impl RoundLogSummary {
    /// Notes text stored on the round
    pub fn notes(&self) -> String {
        let duration = self.end_s - self.start_s;
        let mut text = format!(
            "Logs: {}, start: {}s, end: {}s, duration: {}s",
            self.points, self.start_s, self.end_s, duration
        );
        if let Some(bt) = self.max_bean_temp_c {
            text.push_str(&format!(", max BT: {:.1}C", bt));
        }
        text
    }
}

/// Find CSV log files under a directory
pub fn find_log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == "csv") {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Round number from a log filename, e.g. "RB-001-R2.csv" -> 2.
///
/// Only tags within 1..=max_round count; anything else is untagged.
pub fn round_tag(path: &Path, max_round: usize) -> Option<usize> {
    let stem = path.file_stem().and_then(|s| s.to_str())?;
    let re = Regex::new(r"-R(\d{1,2})$").ok()?;
    let cap = re.captures(stem)?;
    let round_no: usize = cap[1].parse().ok()?;
    (1..=max_round).contains(&round_no).then_some(round_no)
}

/// Parse a curve CSV: first column elapsed time ("mm:ss" or seconds),
/// second column bean temperature. Header rows and malformed lines are
/// skipped rather than failing the file.
pub fn parse_log_file(path: &Path) -> Result<Vec<LogPoint>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let mut points = Vec::new();
    for line in content.lines() {
        let mut fields = line.split(',');
        let Some(elapsed_s) = fields.next().and_then(parse_elapsed) else {
            continue;
        };
        let bean_temp_c = fields.next().and_then(|f| f.trim().parse::<f64>().ok());
        points.push(LogPoint {
            elapsed_s,
            bean_temp_c,
        });
    }

    points.sort_by_key(|p| p.elapsed_s);
    Ok(points)
}

/// "mm:ss" or plain seconds to whole seconds
fn parse_elapsed(field: &str) -> Option<i64> {
    let s = field.trim();
    if let Some((mm, ss)) = s.rsplit_once(':') {
        let mm = mm.rsplit(':').next()?.trim().parse::<i64>().ok()?;
        let ss = ss.trim().parse::<f64>().ok()?;
        return Some(mm * 60 + ss as i64);
    }
    s.parse::<f64>().ok().map(|v| v as i64)
}

/// Summarize every tagged log file under `dir` into per-round summaries
pub fn summarize_logs(dir: &Path, round_count: usize) -> Result<(Vec<RoundLogSummary>, ImportStats)> {
    let mut stats = ImportStats::default();
    let mut per_round: Vec<Vec<LogPoint>> = vec![Vec::new(); round_count];

    let files = find_log_files(dir)?;
    stats.files = files.len();

    for path in &files {
        let Some(round_no) = round_tag(path, round_count) else {
            stats.skipped += 1;
            continue;
        };
        match parse_log_file(path) {
            Ok(points) if points.is_empty() => {
                stats.skipped += 1;
            }
            Ok(points) => {
                stats.matched += 1;
                stats.points += points.len();
                per_round[round_no - 1].extend(points);
            }
            Err(e) => {
                eprintln!("  Error parsing {}: {}", path.display(), e);
                stats.errors += 1;
            }
        }
    }

    let mut summaries = Vec::new();
    for (idx, mut points) in per_round.into_iter().enumerate() {
        if points.is_empty() {
            continue;
        }
        points.sort_by_key(|p| p.elapsed_s);
        let max_bean_temp_c = points
            .iter()
            .filter_map(|p| p.bean_temp_c)
            .fold(None, |acc: Option<f64>, bt| {
                Some(acc.map_or(bt, |a| a.max(bt)))
            });
        summaries.push(RoundLogSummary {
            round_no: idx + 1,
            points: points.len(),
            start_s: points[0].elapsed_s,
            end_s: points[points.len() - 1].elapsed_s,
            max_bean_temp_c,
        });
    }
    stats.rounds = summaries.len();

    Ok((summaries, stats))
}

#[derive(Debug, Default)]
pub struct ImportStats {
    pub files: usize,
    pub matched: usize,
    pub rounds: usize,
    pub points: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Summarized {} log files ({} points) into {} rounds. Skipped: {}, Errors: {}",
            self.matched, self.points, self.rounds, self.skipped, self.errors
        )
    }
}
