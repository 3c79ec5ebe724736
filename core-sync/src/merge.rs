//! # Merge Engine
//!
//! Pure reconciliation of a local and a remote [`SyncSnapshot`].
//!
//! ## Laws
//!
//! - `merge(s, None, _) == s`
//! - `merge(local, Some(remote), _) == remote` when `local` has no words
//! - Under [`ConflictStrategy::Merge`] the word set is the union by id, so
//!   the result never holds fewer distinct words than either input.
//!
//! ## Field rules under `Merge`
//!
//! | Field                     | Rule                                               |
//! |---------------------------|----------------------------------------------------|
//! | word content              | newer `lastModified` wins, local on ties           |
//! | word `srsState`           | larger progress score wins, content winner on ties |
//! | `example`/`phonetic`/...  | back-filled from the other side when empty         |
//! | analytics counters        | `max`                                              |
//! | `dailyStats`              | per date, per field `max`                          |
//! | `qualityDistribution`     | [`QualityMergeLaw`] (sum by default)               |
//! | gamification counters     | `max`                                              |
//! | achievements / challenges | set union                                          |
//!
//! Nothing here performs I/O; the functions are safe to call from any thread.

use crate::model::{
    AnalyticsSnapshot, CompletedChallenge, DailyStats, GamificationState, SyncSnapshot,
    VocabularyRecord,
};
use core_runtime::config::{ConflictStrategy, QualityMergeLaw, SyncSettings};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Strategy plus tunable field laws for one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergePolicy {
    pub strategy: ConflictStrategy,
    pub quality_law: QualityMergeLaw,
}

impl MergePolicy {
    pub fn new(strategy: ConflictStrategy) -> Self {
        Self {
            strategy,
            quality_law: QualityMergeLaw::default(),
        }
    }

    pub fn with_quality_law(mut self, law: QualityMergeLaw) -> Self {
        self.quality_law = law;
        self
    }
}

impl From<&SyncSettings> for MergePolicy {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            strategy: settings.conflict_resolution_strategy,
            quality_law: settings.quality_distribution_merge,
        }
    }
}

/// Reconcile two snapshots of the same dataset.
///
/// Total for well-formed input: never fails and never panics.
pub fn merge(local: SyncSnapshot, remote: Option<SyncSnapshot>, policy: MergePolicy) -> SyncSnapshot {
    let Some(remote) = remote else {
        return local;
    };

    if local.words.is_empty() {
        return remote;
    }

    match policy.strategy {
        ConflictStrategy::Local => local,
        ConflictStrategy::Remote => remote,
        ConflictStrategy::Ask => SyncSnapshot {
            pending_conflict: true,
            ..local
        },
        ConflictStrategy::Merge => merge_snapshots(local, remote, policy.quality_law),
    }
}

fn merge_snapshots(local: SyncSnapshot, remote: SyncSnapshot, law: QualityMergeLaw) -> SyncSnapshot {
    SyncSnapshot {
        timestamp: local.timestamp.max(remote.timestamp),
        device_id: local.device_id,
        version: local.version.max(remote.version),
        words: merge_words(local.words, remote.words),
        analytics: merge_analytics(local.analytics, remote.analytics, law),
        gamification: merge_gamification(local.gamification, remote.gamification),
        pending_conflict: false,
    }
}

// ============================================================================
// Words
// ============================================================================

/// Union by id: local order first, then remote-only records in remote order.
pub fn merge_words(local: Vec<VocabularyRecord>, remote: Vec<VocabularyRecord>) -> Vec<VocabularyRecord> {
    let mut remote_slots: Vec<Option<VocabularyRecord>> = remote.into_iter().map(Some).collect();
    let remote_index: HashMap<String, usize> = remote_slots
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| slot.as_ref().map(|r| (r.id.clone(), i)))
        .collect();

    let mut merged = Vec::with_capacity(local.len() + remote_slots.len());
    for record in local {
        let counterpart = remote_index
            .get(&record.id)
            .and_then(|&i| remote_slots[i].take());

        merged.push(match counterpart {
            Some(other) => merge_record(record, other),
            None => record,
        });
    }

    merged.extend(remote_slots.into_iter().flatten());
    merged
}

/// Reconcile two versions of the same card.
pub fn merge_record(local: VocabularyRecord, remote: VocabularyRecord) -> VocabularyRecord {
    // Local wins ties
    let (mut winner, loser) = if remote.last_modified > local.last_modified {
        (remote, local)
    } else {
        (local, remote)
    };

    if loser.srs.progress_score() > winner.srs.progress_score() {
        winner.srs = loser.srs;
    }

    backfill(&mut winner.example, loser.example);
    backfill(&mut winner.phonetic, loser.phonetic);
    backfill(&mut winner.audio_url, loser.audio_url);

    winner.created_at = winner.created_at.min(loser.created_at);
    winner
}

fn backfill(target: &mut Option<String>, fallback: Option<String>) {
    let empty = target.as_deref().map_or(true, |v| v.trim().is_empty());
    if empty && fallback.as_deref().is_some_and(|v| !v.trim().is_empty()) {
        *target = fallback;
    }
}

// ============================================================================
// Analytics
// ============================================================================

pub fn merge_analytics(
    local: AnalyticsSnapshot,
    remote: AnalyticsSnapshot,
    law: QualityMergeLaw,
) -> AnalyticsSnapshot {
    let current_streak = local.current_streak.max(remote.current_streak);
    let longest_streak = local
        .longest_streak
        .max(remote.longest_streak)
        .max(current_streak);

    AnalyticsSnapshot {
        total_words_learned: local.total_words_learned.max(remote.total_words_learned),
        total_sessions: local.total_sessions.max(remote.total_sessions),
        total_time_spent: local.total_time_spent.max(remote.total_time_spent),
        current_streak,
        longest_streak,
        daily_stats: merge_daily_stats(local.daily_stats, remote.daily_stats),
        quality_distribution: match law {
            QualityMergeLaw::Additive => merge_quality_distribution_additive(
                &local.quality_distribution,
                &remote.quality_distribution,
            ),
            QualityMergeLaw::Maximum => merge_quality_distribution_max(
                &local.quality_distribution,
                &remote.quality_distribution,
            ),
        },
    }
}

pub fn merge_daily_stats<K: Ord>(
    local: BTreeMap<K, DailyStats>,
    remote: BTreeMap<K, DailyStats>,
) -> BTreeMap<K, DailyStats> {
    let mut merged = local;
    for (date, theirs) in remote {
        let combined = match merged.remove(&date) {
            Some(ours) => DailyStats {
                words_reviewed: ours.words_reviewed.max(theirs.words_reviewed),
                time_spent: ours.time_spent.max(theirs.time_spent),
                sessions: ours.sessions.max(theirs.sessions),
                accuracy: ours.accuracy.max(theirs.accuracy),
                correct_answers: ours.correct_answers.max(theirs.correct_answers),
            },
            None => theirs,
        };
        merged.insert(date, combined);
    }
    merged
}

/// Sum bucket counts across both sides.
///
/// Reviews already present on both sides (because an earlier sync copied
/// them) are counted twice.
pub fn merge_quality_distribution_additive(
    local: &BTreeMap<u8, u64>,
    remote: &BTreeMap<u8, u64>,
) -> BTreeMap<u8, u64> {
    let mut merged = local.clone();
    for (bucket, count) in remote {
        let entry = merged.entry(*bucket).or_insert(0);
        *entry = entry.saturating_add(*count);
    }
    merged
}

/// Keep the larger count per bucket.
pub fn merge_quality_distribution_max(
    local: &BTreeMap<u8, u64>,
    remote: &BTreeMap<u8, u64>,
) -> BTreeMap<u8, u64> {
    let mut merged = local.clone();
    for (bucket, count) in remote {
        let entry = merged.entry(*bucket).or_insert(0);
        *entry = (*entry).max(*count);
    }
    merged
}

// ============================================================================
// Gamification
// ============================================================================

pub fn merge_gamification(local: GamificationState, remote: GamificationState) -> GamificationState {
    let current_streak = local.current_streak.max(remote.current_streak);

    GamificationState {
        level: local.level.max(remote.level),
        xp: local.xp.max(remote.xp),
        current_streak,
        longest_streak: local
            .longest_streak
            .max(remote.longest_streak)
            .max(current_streak),
        unlocked_achievements: merge_achievements(
            &local.unlocked_achievements,
            &remote.unlocked_achievements,
        ),
        completed_challenges: merge_challenges(
            local.completed_challenges,
            remote.completed_challenges,
        ),
    }
}

pub fn merge_achievements(local: &BTreeSet<String>, remote: &BTreeSet<String>) -> BTreeSet<String> {
    local.union(remote).cloned().collect()
}

/// Union keyed by `(challenge_id, date)`, local order first.
pub fn merge_challenges(
    local: Vec<CompletedChallenge>,
    remote: Vec<CompletedChallenge>,
) -> Vec<CompletedChallenge> {
    let mut seen = HashSet::new();
    local
        .into_iter()
        .chain(remote)
        .filter(|c| seen.insert((c.challenge_id.clone(), c.date)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SrsState;
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn record(id: &str, modified: i64) -> VocabularyRecord {
        let mut r = VocabularyRecord::new(id, format!("word-{}", id), "meaning", t(0));
        r.last_modified = t(modified);
        r
    }

    fn with_srs(mut r: VocabularyRecord, repetitions: u32, interval: u32) -> VocabularyRecord {
        r.srs = SrsState {
            repetitions,
            interval,
            easiness_factor: 2.5,
            next_review: t(0),
        };
        r
    }

    fn snapshot(device: &str, words: Vec<VocabularyRecord>) -> SyncSnapshot {
        let mut s = SyncSnapshot::empty(device, t(0));
        s.words = words;
        s
    }

    fn merged(local: SyncSnapshot, remote: SyncSnapshot) -> SyncSnapshot {
        merge(local, Some(remote), MergePolicy::new(ConflictStrategy::Merge))
    }

    #[test]
    fn test_identity_without_remote() {
        let local = snapshot("a", vec![record("w1", 1)]);
        for strategy in [
            ConflictStrategy::Local,
            ConflictStrategy::Remote,
            ConflictStrategy::Merge,
            ConflictStrategy::Ask,
        ] {
            assert_eq!(merge(local.clone(), None, MergePolicy::new(strategy)), local);
        }
    }

    #[test]
    fn test_identity_with_empty_local() {
        let mut local = snapshot("a", vec![]);
        local.gamification.add_xp(1_000);
        let remote = snapshot("b", vec![record("w1", 1), record("w2", 2)]);

        assert_eq!(merged(local, remote.clone()), remote);
    }

    #[test]
    fn test_local_and_remote_strategies_are_verbatim() {
        let local = snapshot("a", vec![record("w1", 1)]);
        let remote = snapshot("b", vec![record("w2", 2)]);

        let kept = merge(
            local.clone(),
            Some(remote.clone()),
            MergePolicy::new(ConflictStrategy::Local),
        );
        assert_eq!(kept, local);

        let taken = merge(
            local,
            Some(remote.clone()),
            MergePolicy::new(ConflictStrategy::Remote),
        );
        assert_eq!(taken, remote);
    }

    #[test]
    fn test_ask_marks_pending_conflict() {
        let local = snapshot("a", vec![record("w1", 1)]);
        let remote = snapshot("b", vec![record("w2", 2)]);

        let result = merge(
            local.clone(),
            Some(remote),
            MergePolicy::new(ConflictStrategy::Ask),
        );
        assert!(result.pending_conflict);
        assert_eq!(result.words, local.words);
    }

    #[test]
    fn test_disjoint_words_are_unioned_in_order() {
        let local = snapshot("a", vec![record("l1", 1), record("l2", 1)]);
        let remote = snapshot("b", vec![record("r1", 1), record("r2", 1), record("r3", 1)]);

        let result = merged(local, remote);
        let ids: Vec<_> = result.words.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["l1", "l2", "r1", "r2", "r3"]);
    }

    #[test]
    fn test_shared_word_never_duplicated() {
        let local = snapshot("a", vec![record("w1", 1), record("w2", 1)]);
        let remote = snapshot("b", vec![record("w2", 5), record("w3", 1)]);

        let result = merged(local, remote);
        assert_eq!(result.words.len(), 3);
        assert_eq!(result.find_word("w2").unwrap().last_modified, t(5));
    }

    #[test]
    fn test_newer_content_keeps_higher_progress_srs() {
        let mut older = with_srs(record("w1", 1), 2, 4);
        older.meaning = "old meaning".to_string();
        let mut newer = with_srs(record("w1", 2), 1, 2);
        newer.meaning = "new meaning".to_string();

        let result = merge_record(older.clone(), newer);
        assert_eq!(result.meaning, "new meaning");
        assert_eq!(result.last_modified, t(2));
        assert_eq!(result.srs, older.srs);
    }

    #[test]
    fn test_progress_tie_keeps_content_winner_srs() {
        let older = with_srs(record("w1", 1), 2, 3);
        let mut newer = with_srs(record("w1", 2), 3, 2);
        newer.srs.easiness_factor = 1.9;

        let result = merge_record(older, newer.clone());
        assert_eq!(result.srs, newer.srs);
    }

    #[test]
    fn test_timestamp_tie_prefers_local() {
        let mut local = record("w1", 3);
        local.meaning = "local".to_string();
        let mut remote = record("w1", 3);
        remote.meaning = "remote".to_string();

        assert_eq!(merge_record(local, remote).meaning, "local");
    }

    #[test]
    fn test_optional_fields_backfilled_from_loser() {
        let mut older = record("w1", 1);
        older.example = Some("older example".to_string());
        older.phonetic = Some("/ˈoʊl/".to_string());
        older.audio_url = Some("https://cdn/old.mp3".to_string());

        let mut newer = record("w1", 2);
        newer.example = Some(String::new());
        newer.phonetic = Some("/njuː/".to_string());

        let result = merge_record(older, newer);
        assert_eq!(result.example.as_deref(), Some("older example"));
        assert_eq!(result.phonetic.as_deref(), Some("/njuː/"));
        assert_eq!(result.audio_url.as_deref(), Some("https://cdn/old.mp3"));
    }

    #[test]
    fn test_analytics_counters_take_max() {
        let mut local = snapshot("a", vec![record("w1", 1)]);
        local.analytics.total_sessions = 10;
        local.analytics.total_time_spent = 50;
        local.analytics.current_streak = 7;
        local.analytics.longest_streak = 4;

        let mut remote = snapshot("b", vec![]);
        remote.analytics.total_sessions = 3;
        remote.analytics.total_time_spent = 80;
        remote.analytics.total_words_learned = 12;

        let result = merged(local, remote).analytics;
        assert_eq!(result.total_sessions, 10);
        assert_eq!(result.total_time_spent, 80);
        assert_eq!(result.total_words_learned, 12);
        assert_eq!(result.current_streak, 7);
        assert_eq!(result.longest_streak, 7);
    }

    #[test]
    fn test_daily_stats_merge_per_field() {
        let mut local = BTreeMap::new();
        local.insert(
            day(1),
            DailyStats {
                words_reviewed: 10,
                time_spent: 100,
                sessions: 1,
                accuracy: 90.0,
                correct_answers: 9,
            },
        );
        local.insert(day(2), DailyStats::default());

        let mut remote = BTreeMap::new();
        remote.insert(
            day(1),
            DailyStats {
                words_reviewed: 4,
                time_spent: 300,
                sessions: 2,
                accuracy: 75.0,
                correct_answers: 3,
            },
        );
        remote.insert(
            day(3),
            DailyStats {
                sessions: 1,
                ..Default::default()
            },
        );

        let result = merge_daily_stats(local, remote);
        assert_eq!(result.len(), 3);
        let first = &result[&day(1)];
        assert_eq!(first.words_reviewed, 10);
        assert_eq!(first.time_spent, 300);
        assert_eq!(first.sessions, 2);
        assert_eq!(first.accuracy, 90.0);
        assert_eq!(result[&day(3)].sessions, 1);
    }

    #[test]
    fn test_quality_distribution_laws() {
        let local = BTreeMap::from([(3u8, 2u64), (5, 1)]);
        let remote = BTreeMap::from([(3u8, 5u64), (0, 4)]);

        assert_eq!(
            merge_quality_distribution_additive(&local, &remote),
            BTreeMap::from([(0u8, 4u64), (3, 7), (5, 1)])
        );
        assert_eq!(
            merge_quality_distribution_max(&local, &remote),
            BTreeMap::from([(0u8, 4u64), (3, 5), (5, 1)])
        );
    }

    #[test]
    fn test_policy_selects_quality_law() {
        let mut local = snapshot("a", vec![record("w1", 1)]);
        local.analytics.quality_distribution.insert(3, 2);
        let mut remote = snapshot("b", vec![]);
        remote.analytics.quality_distribution.insert(3, 5);

        let additive = merge(
            local.clone(),
            Some(remote.clone()),
            MergePolicy::new(ConflictStrategy::Merge),
        );
        assert_eq!(additive.analytics.quality_distribution[&3], 7);

        let maximum = merge(
            local,
            Some(remote),
            MergePolicy::new(ConflictStrategy::Merge).with_quality_law(QualityMergeLaw::Maximum),
        );
        assert_eq!(maximum.analytics.quality_distribution[&3], 5);
    }

    #[test]
    fn test_achievements_union() {
        let a = BTreeSet::from(["a".to_string(), "b".to_string()]);
        let b = BTreeSet::from(["b".to_string(), "c".to_string()]);
        assert_eq!(
            merge_achievements(&a, &b),
            BTreeSet::from(["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_challenges_dedup_by_id_and_date() {
        let c = |id: &str, d: u32| CompletedChallenge {
            challenge_id: id.to_string(),
            date: day(d),
        };

        let result = merge_challenges(
            vec![c("daily", 1), c("weekly", 1)],
            vec![c("daily", 1), c("daily", 2)],
        );
        assert_eq!(result, vec![c("daily", 1), c("weekly", 1), c("daily", 2)]);
    }

    #[test]
    fn test_gamification_max_and_streak_enforced() {
        let mut local = GamificationState::default();
        local.add_xp(150);
        local.current_streak = 9;
        local.longest_streak = 3;

        let mut remote = GamificationState::default();
        remote.add_xp(420);
        remote.unlock_achievement("streak_7");

        let result = merge_gamification(local, remote);
        assert_eq!(result.xp, 420);
        assert_eq!(result.level, 5);
        assert_eq!(result.longest_streak, 9);
        assert!(result.unlocked_achievements.contains("streak_7"));
    }

    #[test]
    fn test_merge_is_deterministic() {
        let local = snapshot("a", vec![with_srs(record("w1", 1), 2, 4), record("w2", 1)]);
        let remote = snapshot("b", vec![with_srs(record("w1", 2), 1, 2), record("w3", 1)]);

        let first = merged(local.clone(), remote.clone());
        let second = merged(local, remote);
        assert_eq!(first, second);
    }

    #[test]
    fn test_header_after_merge() {
        let mut local = snapshot("local-device", vec![record("w1", 1)]);
        local.timestamp = t(1);
        let mut remote = snapshot("remote-device", vec![]);
        remote.timestamp = t(9);
        remote.version = 2;

        let result = merged(local, remote);
        assert_eq!(result.device_id, "local-device");
        assert_eq!(result.timestamp, t(9));
        assert_eq!(result.version, 2);
        assert!(!result.pending_conflict);
    }
}
