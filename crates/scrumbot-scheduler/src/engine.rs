//! Scheduler engine: the minute tick that finds due channels and advances
//! each of them in its own task.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use scrumbot_core::error::Result;
use scrumbot_core::traits::Notifier;
use tokio::task::JoinSet;

use crate::lifecycle::{AdvanceOutcome, run_daily_scrum, truncate_to_minute};
use crate::matcher::due_schedules;
use crate::persistence::ScrumDb;

/// Shared handles the scheduler works with.
#[derive(Clone)]
pub struct ScrumContext {
    pub db: Arc<ScrumDb>,
    pub notifier: Arc<dyn Notifier>,
}

impl ScrumContext {
    pub fn new(db: Arc<ScrumDb>, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }
}

/// Run one tick at `now`. Schedules are reloaded from the database every
/// time; each due channel is advanced concurrently and independently.
/// Returns `(channel_id, outcome)` per due channel, `None` for a failed one.
pub async fn run_tick(
    ctx: &ScrumContext,
    now: DateTime<Utc>,
) -> Result<Vec<(String, Option<AdvanceOutcome>)>> {
    let schedules = ctx.db.select_all_scrums()?;
    let due: Vec<_> = due_schedules(&schedules, now)
        .into_iter()
        .cloned()
        .collect();
    if due.is_empty() {
        return Ok(Vec::new());
    }
    tracing::info!("🔔 {} channel(s) due at {now}", due.len());

    let mut set = JoinSet::new();
    for schedule in due {
        let ctx = ctx.clone();
        set.spawn(async move {
            let outcome =
                run_daily_scrum(&ctx.db, ctx.notifier.as_ref(), &schedule, now).await;
            (schedule.channel_id, outcome)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => tracing::error!(kind = "DAILY_MSG_ERR", "Channel task aborted: {e}"),
        }
    }
    Ok(results)
}

/// Longest stall the gate replays; older minutes are dropped with a warning.
const MAX_CATCH_UP_MINUTES: i64 = 10;

/// Minute-boundary gate: yields each minute start once, the first time a
/// poll lands in or after it. Minutes skipped by a stalled poll loop are
/// replayed in order, so a sub-minute interval never loses a due minute.
#[derive(Debug, Default)]
pub struct MinuteGate {
    last: Option<DateTime<Utc>>,
}

impl MinuteGate {
    pub fn observe(&mut self, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let minute = truncate_to_minute(now);
        let Some(last) = self.last else {
            self.last = Some(minute);
            // Joining mid-minute must not fire a minute that already started.
            return if minute == now { vec![minute] } else { Vec::new() };
        };
        self.last = Some(minute);
        if minute <= last {
            // Same minute, or the wall clock stepped back.
            return Vec::new();
        }

        let mut first = last + TimeDelta::minutes(1);
        let earliest = minute - TimeDelta::minutes(MAX_CATCH_UP_MINUTES - 1);
        if first < earliest {
            tracing::warn!("⚠️ Scheduler stalled; dropping minutes {first} .. {earliest}");
            first = earliest;
        }
        std::iter::successors(Some(first), |m| Some(*m + TimeDelta::minutes(1)))
            .take_while(|m| *m <= minute)
            .collect()
    }
}

/// Run the tick for `minute` on its own task, so a slow channel never holds
/// back the clock loop.
pub fn dispatch_tick(ctx: ScrumContext, minute: DateTime<Utc>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = run_tick(&ctx, minute).await {
            tracing::error!(kind = "DAILY_MSG_ERR", "Tick failed: {e}");
        }
    })
}

/// Spawn the scheduler loop as a background tokio task.
pub fn spawn_scheduler(ctx: ScrumContext, check_interval_ms: u64) -> tokio::task::JoinHandle<()> {
    tracing::info!("⏰ Scheduler started (poll every {check_interval_ms}ms)");

    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_millis(check_interval_ms.max(1)));
        let mut gate = MinuteGate::default();

        loop {
            interval.tick().await;
            for minute in gate.observe(Utc::now()) {
                dispatch_tick(ctx.clone(), minute);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::tests::{schedule, submission};
    use crate::testing::RecordingNotifier;
    use chrono::TimeZone;
    use std::time::Duration;
    use scrumbot_core::message::RETRY_TEXT;

    fn monday_nine() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn seed(db: &ScrumDb, channel: &str, with_status: bool) {
        db.upsert_scrum(&schedule(channel)).unwrap();
        let id = db.insert_next_meeting(channel).unwrap();
        if with_status {
            db.upsert_status(id, "alice", &submission("did", "todo", None)).unwrap();
        }
    }

    #[tokio::test]
    async fn test_end_to_end_monday_tick() {
        let db = Arc::new(ScrumDb::in_memory().unwrap());
        seed(&db, "c1", true);
        let first = db.open_meeting("c1").unwrap().unwrap().meeting_id;
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = ScrumContext::new(db.clone(), notifier.clone());

        let results = run_tick(&ctx, monday_nine()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].1, Some(AdvanceOutcome::Advanced { .. })));

        assert!(db.get_meeting(first).unwrap().unwrap().completed);
        let open = db.open_meeting("c1").unwrap().unwrap();
        assert!(open.meeting_id > first);
        assert_eq!(notifier.sent().len(), 1);

        // Next day: the closed meeting is purged.
        db.upsert_status(open.meeting_id, "alice", &submission("x", "y", None)).unwrap();
        run_tick(&ctx, monday_nine() + TimeDelta::days(1)).await.unwrap();
        assert!(db.get_meeting(first).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tick_off_schedule_does_nothing() {
        let db = Arc::new(ScrumDb::in_memory().unwrap());
        seed(&db, "c1", true);
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = ScrumContext::new(db.clone(), notifier.clone());

        // Saturday.
        let saturday = Utc.with_ymd_and_hms(2026, 3, 7, 9, 0, 0).unwrap();
        assert!(run_tick(&ctx, saturday).await.unwrap().is_empty());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_block_others() {
        let db = Arc::new(ScrumDb::in_memory().unwrap());
        seed(&db, "broken", true);
        seed(&db, "healthy", true);
        let notifier = Arc::new(RecordingNotifier::failing_for("/broken"));
        let ctx = ScrumContext::new(db.clone(), notifier.clone());

        let mut results = run_tick(&ctx, monday_nine()).await.unwrap();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(results[0].0, "broken");
        assert!(results[0].1.is_none());
        assert!(matches!(results[1].1, Some(AdvanceOutcome::Advanced { .. })));

        // Broken channel keeps its open meeting with the status.
        assert_eq!(db.count_pending_statuses("broken").unwrap(), 1);
        assert_eq!(db.count_pending_statuses("healthy").unwrap(), 0);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.ends_with("/healthy"));
        assert_ne!(sent[0].2.text, RETRY_TEXT);
    }

    #[tokio::test]
    async fn test_slow_channel_does_not_hold_back_next_minute() {
        let db = Arc::new(ScrumDb::in_memory().unwrap());
        seed(&db, "slow", true);
        let mut fast = schedule("fast");
        fast.minute = 1;
        db.upsert_scrum(&fast).unwrap();
        let id = db.insert_next_meeting("fast").unwrap();
        db.upsert_status(id, "alice", &submission("did", "todo", None)).unwrap();

        let notifier = Arc::new(RecordingNotifier::delayed_for("/slow", Duration::from_secs(30)));
        let ctx = ScrumContext::new(db.clone(), notifier.clone());

        let _slow = dispatch_tick(ctx.clone(), monday_nine());
        let next = dispatch_tick(ctx.clone(), monday_nine() + TimeDelta::minutes(1));
        tokio::time::timeout(Duration::from_secs(5), next)
            .await
            .expect("09:01 tick waited for the 09:00 channel")
            .unwrap();

        assert_eq!(db.count_pending_statuses("fast").unwrap(), 0);
        assert_eq!(db.count_pending_statuses("slow").unwrap(), 1);
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.ends_with("/fast"));
    }

    #[test]
    fn test_minute_gate() {
        let mut gate = MinuteGate::default();
        let mid = Utc.with_ymd_and_hms(2026, 3, 2, 8, 59, 30).unwrap();
        assert!(gate.observe(mid).is_empty());
        assert!(gate.observe(mid + TimeDelta::seconds(10)).is_empty());

        let late_poll = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 1).unwrap();
        assert_eq!(gate.observe(late_poll), vec![monday_nine()]);
        assert!(gate.observe(late_poll + TimeDelta::seconds(1)).is_empty());
    }

    #[test]
    fn test_minute_gate_starting_on_boundary() {
        let mut gate = MinuteGate::default();
        assert_eq!(gate.observe(monday_nine()), vec![monday_nine()]);
    }

    #[test]
    fn test_minute_gate_replays_stalled_minutes() {
        let mut gate = MinuteGate::default();
        assert_eq!(gate.observe(monday_nine()), vec![monday_nine()]);

        let stalled = Utc.with_ymd_and_hms(2026, 3, 2, 9, 2, 5).unwrap();
        assert_eq!(
            gate.observe(stalled),
            vec![
                monday_nine() + TimeDelta::minutes(1),
                monday_nine() + TimeDelta::minutes(2),
            ]
        );
        assert!(gate.observe(stalled).is_empty());
    }

    #[test]
    fn test_minute_gate_caps_long_stalls_and_ignores_clock_steps_back() {
        let mut gate = MinuteGate::default();
        gate.observe(monday_nine());

        let hour_later = monday_nine() + TimeDelta::hours(1);
        let replayed = gate.observe(hour_later);
        assert_eq!(replayed.len() as i64, MAX_CATCH_UP_MINUTES);
        assert_eq!(replayed.last(), Some(&hour_later));

        assert!(gate.observe(hour_later - TimeDelta::minutes(5)).is_empty());
    }
}
