//! # Data Model
//!
//! Typed records exchanged between devices: vocabulary cards with their
//! spaced-repetition state, aggregate study analytics, gamification progress,
//! and the [`SyncSnapshot`] that bundles them.
//!
//! Every type serialises in camelCase; optional fields are omitted when
//! absent and missing collections deserialise to their empty value.

use crate::{Result, SyncError};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Lower bound of the SM-2 easiness factor.
pub const MIN_EASINESS_FACTOR: f64 = 1.3;

/// Easiness factor of a card that was never reviewed.
pub const DEFAULT_EASINESS_FACTOR: f64 = 2.5;

/// Highest review quality on the 0-5 scale.
pub const MAX_QUALITY: u8 = 5;

// ============================================================================
// Spaced repetition
// ============================================================================

/// Per-card scheduling state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsState {
    /// Successful reviews since the last lapse
    pub repetitions: u32,
    /// Days until the next review
    pub interval: u32,
    pub easiness_factor: f64,
    pub next_review: DateTime<Utc>,
}

impl SrsState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            repetitions: 0,
            interval: 1,
            easiness_factor: DEFAULT_EASINESS_FACTOR,
            next_review: now,
        }
    }

    /// `repetitions * interval`; the larger score wins when two versions of
    /// the same card are merged.
    pub fn progress_score(&self) -> u64 {
        u64::from(self.repetitions) * u64::from(self.interval)
    }

    /// Apply one review graded `quality` (0-5, higher values are clamped).
    pub fn apply_review(&mut self, quality: u8, now: DateTime<Utc>) {
        let q = quality.min(MAX_QUALITY);

        if q < 3 {
            self.repetitions = 0;
            self.interval = 1;
        } else {
            self.interval = match self.repetitions {
                0 => 1,
                1 => 6,
                _ => (f64::from(self.interval) * self.easiness_factor).round() as u32,
            };
            self.repetitions += 1;
        }

        let miss = f64::from(MAX_QUALITY - q);
        self.easiness_factor =
            (self.easiness_factor + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASINESS_FACTOR);
        self.next_review = now + Duration::days(i64::from(self.interval));
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review <= now
    }
}

// ============================================================================
// Vocabulary records
// ============================================================================

/// A learning item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyRecord {
    pub id: String,
    pub word: String,
    pub meaning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonetic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(rename = "srsState")]
    pub srs: SrsState,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl VocabularyRecord {
    pub fn new(
        id: impl Into<String>,
        word: impl Into<String>,
        meaning: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            word: word.into(),
            meaning: meaning.into(),
            example: None,
            phonetic: None,
            audio_url: None,
            srs: SrsState::new(now),
            created_at: now,
            last_modified: now,
        }
    }

    pub fn set_example(&mut self, example: Option<String>, now: DateTime<Utc>) {
        self.example = example;
        self.touch(now);
    }

    pub fn set_phonetic(&mut self, phonetic: Option<String>, now: DateTime<Utc>) {
        self.phonetic = phonetic;
        self.touch(now);
    }

    pub fn set_audio_url(&mut self, audio_url: Option<String>, now: DateTime<Utc>) {
        self.audio_url = audio_url;
        self.touch(now);
    }

    pub fn set_meaning(&mut self, meaning: impl Into<String>, now: DateTime<Utc>) {
        self.meaning = meaning.into();
        self.touch(now);
    }

    /// Grade a review and reschedule the card.
    pub fn record_review(&mut self, quality: u8, now: DateTime<Utc>) {
        self.srs.apply_review(quality, now);
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        // Never move backwards, even if the clock did
        self.last_modified = self.last_modified.max(now);
    }
}

// ============================================================================
// Analytics
// ============================================================================

/// Study metrics for one calendar day.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyStats {
    pub words_reviewed: u64,
    /// Seconds
    pub time_spent: u64,
    pub sessions: u64,
    /// Percentage of correct answers, 0-100
    pub accuracy: f64,
    pub correct_answers: u64,
}

/// Aggregate study metrics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsSnapshot {
    pub total_words_learned: u64,
    pub total_sessions: u64,
    /// Seconds
    pub total_time_spent: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub daily_stats: BTreeMap<NaiveDate, DailyStats>,
    /// Review counts per quality bucket (0-5)
    pub quality_distribution: BTreeMap<u8, u64>,
}

impl AnalyticsSnapshot {
    /// Account one graded review on `date`.
    pub fn record_review(&mut self, date: NaiveDate, quality: u8, correct: bool, seconds: u64) {
        let bucket = quality.min(MAX_QUALITY);
        *self.quality_distribution.entry(bucket).or_insert(0) += 1;

        let day = self.daily_stats.entry(date).or_default();
        day.words_reviewed += 1;
        day.time_spent += seconds;
        if correct {
            day.correct_answers += 1;
        }
        day.accuracy = day.correct_answers as f64 * 100.0 / day.words_reviewed as f64;

        self.total_time_spent += seconds;
    }

    /// Account a finished study session on `date`, extending the streak when
    /// the previous day was also studied.
    pub fn record_session(&mut self, date: NaiveDate) {
        let studied_yesterday = date
            .pred_opt()
            .map(|prev| self.daily_stats.get(&prev).is_some_and(|d| d.sessions > 0))
            .unwrap_or(false);
        let studied_today = self.daily_stats.get(&date).is_some_and(|d| d.sessions > 0);

        self.daily_stats.entry(date).or_default().sessions += 1;
        self.total_sessions += 1;

        if !studied_today {
            self.current_streak = if studied_yesterday {
                self.current_streak + 1
            } else {
                1
            };
        }
        self.longest_streak = self.longest_streak.max(self.current_streak);
    }

    pub fn total_reviews(&self) -> u64 {
        self.quality_distribution.values().sum()
    }
}

// ============================================================================
// Gamification
// ============================================================================

/// XP needed per level.
pub const XP_PER_LEVEL: u64 = 100;

/// A challenge completed on a given day; `(challenge_id, date)` is its key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedChallenge {
    pub challenge_id: String,
    pub date: NaiveDate,
}

/// Player progress derived from study activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GamificationState {
    pub level: u32,
    pub xp: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub unlocked_achievements: BTreeSet<String>,
    pub completed_challenges: Vec<CompletedChallenge>,
}

impl Default for GamificationState {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            current_streak: 0,
            longest_streak: 0,
            unlocked_achievements: BTreeSet::new(),
            completed_challenges: Vec::new(),
        }
    }
}

impl GamificationState {
    /// Add XP and recompute the level. Levels never go down.
    pub fn add_xp(&mut self, amount: u64) {
        self.xp = self.xp.saturating_add(amount);
        let level = 1 + self.xp / XP_PER_LEVEL;
        self.level = self.level.max(u32::try_from(level).unwrap_or(u32::MAX));
    }

    /// Returns `false` if the achievement was already unlocked.
    pub fn unlock_achievement(&mut self, achievement_id: impl Into<String>) -> bool {
        self.unlocked_achievements.insert(achievement_id.into())
    }

    /// Returns `false` if the challenge was already completed on that date.
    pub fn complete_challenge(&mut self, challenge_id: impl Into<String>, date: NaiveDate) -> bool {
        let entry = CompletedChallenge {
            challenge_id: challenge_id.into(),
            date,
        };
        if self.completed_challenges.contains(&entry) {
            return false;
        }
        self.completed_challenges.push(entry);
        true
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// The unit exchanged between devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub words: Vec<VocabularyRecord>,
    #[serde(default)]
    pub analytics: AnalyticsSnapshot,
    #[serde(default)]
    pub gamification: GamificationState,
    /// Set by the `ask` strategy when a user decision is outstanding.
    #[serde(skip)]
    pub pending_conflict: bool,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl SyncSnapshot {
    /// An empty dataset for a device.
    pub fn empty(device_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            device_id: device_id.into(),
            version: SNAPSHOT_VERSION,
            words: Vec::new(),
            analytics: AnalyticsSnapshot::default(),
            gamification: GamificationState::default(),
            pending_conflict: false,
        }
    }

    pub fn words_count(&self) -> usize {
        self.words.len()
    }

    pub fn find_word(&self, id: &str) -> Option<&VocabularyRecord> {
        self.words.iter().find(|w| w.id == id)
    }

    /// Parse a snapshot from untrusted JSON (remote payload, import file).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] if the value is not an object, has no
    /// `words` array, does not match the record schema, or repeats a word id.
    pub fn validate_json(value: Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(SyncError::Validation(
                "Snapshot must be a JSON object".to_string(),
            ));
        };

        match object.get("words") {
            Some(Value::Array(_)) => {}
            Some(_) => {
                return Err(SyncError::Validation(
                    "Snapshot field 'words' must be an array".to_string(),
                ))
            }
            None => {
                return Err(SyncError::Validation(
                    "Snapshot is missing the required 'words' array".to_string(),
                ))
            }
        }

        let snapshot: SyncSnapshot = serde_json::from_value(value)
            .map_err(|e| SyncError::Validation(format!("Snapshot does not match schema: {}", e)))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check invariants that the type system does not enforce.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.words.len());
        for word in &self.words {
            if word.id.trim().is_empty() {
                return Err(SyncError::Validation(format!(
                    "Word '{}' has an empty id",
                    word.word
                )));
            }
            if !seen.insert(word.id.as_str()) {
                return Err(SyncError::Validation(format!(
                    "Duplicate word id '{}'",
                    word.id
                )));
            }
        }
        Ok(())
    }
}
