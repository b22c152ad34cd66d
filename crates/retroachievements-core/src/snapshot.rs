//! Achievement snapshots and the diff that turns two of them into a report.
//!
//! A [`Snapshot`] is what the RetroAchievements API says about the user at one
//! point in time: the rich-presence line and the recently awarded achievements
//! for the last played game. Reports are built from the difference between
//! the previous snapshot and a fresh one.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single awarded achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementRecord {
    pub title: String,
    pub description: String,
    pub points: i64,
    pub awarded_at: DateTime<Utc>,
}

impl AchievementRecord {
    /// Markdown line used in reports, e.g. `**First Steps**: Start the game (5 points)`.
    pub fn render(&self) -> String {
        format!(
            "**{}**: {} ({} points)",
            self.title, self.description, self.points
        )
    }
}

/// Presence text plus achievements keyed by achievement id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub presence: String,
    #[serde(default)]
    pub achievements: BTreeMap<String, AchievementRecord>,
}

impl Snapshot {
    pub fn new(presence: impl Into<String>) -> Self {
        Self {
            presence: presence.into(),
            achievements: BTreeMap::new(),
        }
    }

    pub fn with_achievement(mut self, id: impl Into<String>, record: AchievementRecord) -> Self {
        self.achievements.insert(id.into(), record);
        self
    }
}

/// Achievements older than twice the polling interval are treated as already reported.
pub fn recency_window(interval_min: u32) -> Duration {
    Duration::seconds(2 * i64::from(interval_min) * 60)
}

/// Achievements in `current` but not in `previous`, awarded less than `window` before `now`.
///
/// Ordered by award time, ties broken by id.
pub fn new_achievements<'a>(
    previous: &Snapshot,
    current: &'a Snapshot,
    window: Duration,
    now: DateTime<Utc>,
) -> Vec<(&'a str, &'a AchievementRecord)> {
    let mut fresh: Vec<(&str, &AchievementRecord)> = current
        .achievements
        .iter()
        .filter(|(id, _)| !previous.achievements.contains_key(*id))
        .filter(|(_, record)| now - record.awarded_at < window)
        .map(|(id, record)| (id.as_str(), record))
        .collect();
    fresh.sort_by(|a, b| a.1.awarded_at.cmp(&b.1.awarded_at).then(a.0.cmp(b.0)));
    fresh
}

/// Build the report body for `current` given the previously seen snapshot.
///
/// Returns `None` when nothing changed or when there is nothing to say. With
/// no previous snapshot the fresh one is only a baseline: presence is
/// reported, achievements are not.
pub fn build_report(
    previous: Option<&Snapshot>,
    current: &Snapshot,
    window: Duration,
    now: DateTime<Utc>,
) -> Option<String> {
    if previous == Some(current) {
        return None;
    }

    let mut report = current.presence.clone();

    if let Some(previous) = previous {
        let fresh = new_achievements(previous, current, window, now);
        if !fresh.is_empty() {
            let lines: Vec<String> = fresh.iter().map(|(_, record)| record.render()).collect();
            report.push_str(&format!("\n\n{} new achievements:\n\n", lines.len()));
            report.push_str(&lines.join("\n\n"));
        }
    }

    if report.is_empty() {
        None
    } else {
        Some(report)
    }
}
