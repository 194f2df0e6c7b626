//! Priority scoring and wait-time estimation.
//!
//! Formula: `score = urgency*0.6 + wait_minutes*0.3 + doctor_load*0.1`.
//! Higher score = served earlier. Scores are rounded to four decimal
//! places so equal inputs produce byte-identical ordering across runs.

use chrono::{DateTime, Utc};

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Weight of the 1–10 urgency estimate.
const URGENCY_WEIGHT: f64 = 0.6;

/// Weight of elapsed wait, in minutes.
const WAIT_WEIGHT: f64 = 0.3;

/// Weight of the doctor-load factor (0.0 = fully loaded, 1.0 = idle).
const LOAD_WEIGHT: f64 = 0.1;

// ═══════════════════════════════════════════════════════════
// Scoring
// ═══════════════════════════════════════════════════════════

/// Compute the priority score for a waiting patient.
///
/// `now` is passed in by the caller so one recalculation pass scores
/// every patient against a single clock reading. Negative waits (clock
/// skew) are clamped to zero.
pub fn compute_priority(
    urgency: i64,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    doctor_load: f64,
) -> f64 {
    let wait_minutes = (now - created_at).num_seconds().max(0) as f64 / 60.0;
    let score =
        urgency as f64 * URGENCY_WEIGHT + wait_minutes * WAIT_WEIGHT + doctor_load * LOAD_WEIGHT;
    round4(score)
}

/// Round to four decimal places for deterministic ordering.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Estimate wait in minutes from a 1-based queue position.
///
/// Position 1 is next in line (about to be called), so the estimate is
/// zero; deeper positions wait `(position - 1) * avg_consult_minutes`,
/// never reported as less than one minute.
pub fn estimate_wait_minutes(position: i64, avg_consult_minutes: i64) -> i64 {
    if position <= 1 {
        return 0;
    }
    ((position - 1) * avg_consult_minutes).max(1)
}
