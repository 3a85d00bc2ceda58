//! Output-derived progress heuristic
//!
//! Pure function mapping one line of subprocess output plus the current job
//! record to a new progress value. Best-effort by design: the pipeline does
//! not report progress, so we scan its log lines for known markers. Rules
//! are checked in a fixed order and the first match wins; a matched rule
//! that decides against an update still consumes the line.

use std::sync::LazyLock;

use regex::Regex;

use crate::job::Job;

/// Chapter counters like "Analyzing chapter 3/18" or "processing chapter 3 18".
static CHAPTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"chapter\s+(\d+)[/\s]+(\d+)").expect("chapter pattern"));

/// Fixed checkpoints for the eight pipeline stages. Stage 1 and 2 also
/// match on their stage keywords.
const STAGE_CHECKPOINTS: [(f64, &[&str]); 8] = [
    (15.0, &["stage 1", "extraction"]),
    (30.0, &["stage 2", "summary"]),
    (45.0, &["stage 3"]),
    (60.0, &["stage 4"]),
    (70.0, &["stage 5"]),
    (80.0, &["stage 6"]),
    (85.0, &["stage 7"]),
    (90.0, &["stage 8"]),
];

/// Progress ceiling for per-API-call bumps during the early phase.
const API_CALL_CEILING: f64 = 40.0;

/// Estimate a new progress value from one line of process output.
///
/// Returns `None` when the line carries no progress information or when the
/// matched rule decides the current value should stand.
pub fn estimate(job: &Job, line: &str) -> Option<f64> {
    let lower = line.to_lowercase();

    // Chapter analysis progress maps onto the 20-80% range. A chapter
    // keyword without parsable counters falls through to the generic rules.
    if lower.contains("analyzing chapter") || lower.contains("processing chapter") {
        if let Some(progress) = chapter_progress(&lower) {
            return Some(progress);
        }
    }

    for (checkpoint, markers) in STAGE_CHECKPOINTS {
        if markers.iter().any(|marker| lower.contains(marker)) {
            return Some(checkpoint);
        }
    }

    if lower.contains("api call") || lower.contains("calling api") {
        if job.progress < API_CALL_CEILING {
            return Some((job.progress + 5.0).min(API_CALL_CEILING));
        }
        return None;
    }

    if lower.contains("complete") && line.contains('✓') {
        return Some(95.0);
    }
    if lower.contains("synthesis complete") {
        return Some(95.0);
    }

    if lower.contains("processing") || lower.contains("analyzing") {
        if job.progress < 30.0 {
            return Some(30.0);
        }
        return None;
    }

    if lower.contains("starting") || lower.contains("running") {
        if job.progress < 10.0 {
            return Some(10.0);
        }
        return None;
    }

    None
}

fn chapter_progress(lower: &str) -> Option<f64> {
    let captures = CHAPTER_RE.captures(lower)?;
    let current: u32 = captures.get(1)?.as_str().parse().ok()?;
    let total: u32 = captures.get(2)?.as_str().parse().ok()?;
    if total == 0 {
        return None;
    }
    Some(20.0 + (f64::from(current) / f64::from(total)) * 60.0)
}
