//! SQLite-backed persistence for channel schedules, meeting instances and
//! member statuses.
//!
//! One connection behind a mutex; every public call is a short critical
//! section, so callers never hold the lock across an `.await`.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use scrumbot_core::error::{Result, ScrumError};
use scrumbot_core::types::{
    ChannelSchedule, DaySet, MeetingInstance, MeetingWithStatus, StatusEntry, StatusSubmission,
};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Persistence gateway for all scrum data.
pub struct ScrumDb {
    conn: Mutex<Connection>,
}

fn db_err(ctx: &str) -> impl Fn(rusqlite::Error) -> ScrumError + '_ {
    move |e| ScrumError::Database(format!("{ctx}: {e}"))
}

fn parse_time(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn schedule_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelSchedule> {
    let days: String = row.get(2)?;
    Ok(ChannelSchedule {
        channel_id: row.get(0)?,
        master_mention: row.get(1)?,
        // Unknown labels can only come from manual edits; treat as daily.
        days_of_week: days.parse().unwrap_or(DaySet::Everyday),
        hour: row.get(3)?,
        minute: row.get(4)?,
        timezone_name: row.get(5)?,
        webhook_url: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
    })
}

const SCHEDULE_COLUMNS: &str =
    "channel_id, master_mention, days_of_week, hour, minute, timezone_name, web_hook_url";

impl ScrumDb {
    /// Open or create the scrum database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err("DB open"))?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(db_err("Enable foreign keys"))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database (tests, dry runs).
    pub fn in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ScrumError::Database(format!("Lock: {e}")))
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS scrums (
                channel_id TEXT PRIMARY KEY,
                master_mention TEXT NOT NULL,
                days_of_week TEXT NOT NULL,     -- EVERYDAY, WEEKDAY, WEEKEND
                hour INTEGER NOT NULL,
                minute INTEGER NOT NULL,
                timezone_name TEXT NOT NULL,
                web_hook_url TEXT,
                created_at TEXT DEFAULT (datetime('now')),
                updated_at TEXT DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS meetings (
                meeting_id INTEGER PRIMARY KEY AUTOINCREMENT,
                scrum_channel_id TEXT NOT NULL
                    REFERENCES scrums(channel_id) ON DELETE CASCADE,
                meeting_at TEXT,                 -- NULL = next meeting
                completed_flag INTEGER NOT NULL DEFAULT 0,
                created_at TEXT DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_meetings_channel
                ON meetings(scrum_channel_id, completed_flag);

            CREATE TABLE IF NOT EXISTS statuses (
                meeting_id INTEGER NOT NULL
                    REFERENCES meetings(meeting_id) ON DELETE CASCADE,
                member_mention TEXT NOT NULL,
                yesterday_work TEXT NOT NULL DEFAULT '',
                today_work TEXT NOT NULL DEFAULT '',
                blocker TEXT,
                created_at TEXT DEFAULT (datetime('now')),
                updated_at TEXT DEFAULT (datetime('now')),
                PRIMARY KEY (meeting_id, member_mention)
            );
            ",
        )
        .map_err(db_err("Migration"))?;
        Ok(())
    }

    // ─── Schedules ──────────────────────────────────────

    /// Every configured channel schedule.
    pub fn select_all_scrums(&self) -> Result<Vec<ChannelSchedule>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {SCHEDULE_COLUMNS} FROM scrums ORDER BY channel_id"))
            .map_err(db_err("Select scrums"))?;
        let rows = stmt
            .query_map([], schedule_from_row)
            .map_err(db_err("Select scrums"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Read scrum row"))
    }

    pub fn get_scrum(&self, channel_id: &str) -> Result<Option<ChannelSchedule>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {SCHEDULE_COLUMNS} FROM scrums WHERE channel_id = ?1"),
            [channel_id],
            schedule_from_row,
        )
        .optional()
        .map_err(db_err("Select scrum"))
    }

    /// Insert or update a schedule. Updates happen in place so existing
    /// meetings (and their statuses) survive. Returns `true` when created.
    pub fn upsert_scrum(&self, scrum: &ChannelSchedule) -> Result<bool> {
        let conn = self.lock()?;
        let existed: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM scrums WHERE channel_id = ?1",
                [&scrum.channel_id],
                |r| r.get::<_, i64>(0),
            )
            .map_err(db_err("Check scrum"))?
            > 0;

        conn.execute(
            "INSERT INTO scrums (channel_id, master_mention, days_of_week, hour, minute, timezone_name, web_hook_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(channel_id) DO UPDATE SET
                master_mention = excluded.master_mention,
                days_of_week = excluded.days_of_week,
                hour = excluded.hour,
                minute = excluded.minute,
                timezone_name = excluded.timezone_name,
                web_hook_url = excluded.web_hook_url,
                updated_at = datetime('now')",
            params![
                scrum.channel_id,
                scrum.master_mention,
                scrum.days_of_week.as_str(),
                scrum.hour,
                scrum.minute,
                scrum.timezone_name,
                scrum.webhook_url,
            ],
        )
        .map_err(db_err("Upsert scrum"))?;
        Ok(!existed)
    }

    /// Delete a schedule; meetings and statuses cascade.
    pub fn delete_scrum(&self, channel_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let n = conn
            .execute("DELETE FROM scrums WHERE channel_id = ?1", [channel_id])
            .map_err(db_err("Delete scrum"))?;
        Ok(n > 0)
    }

    /// Refresh the channel's notification endpoint.
    pub fn update_webhook(&self, channel_id: &str, url: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE scrums SET web_hook_url = ?1, updated_at = datetime('now') WHERE channel_id = ?2",
            params![url, channel_id],
        )
        .map_err(db_err("Update webhook"))?;
        Ok(())
    }

    // ─── Meetings ──────────────────────────────────────

    /// Create the next (open, undated) meeting. Returns its id.
    pub fn insert_next_meeting(&self, channel_id: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO meetings (scrum_channel_id) VALUES (?1)",
            [channel_id],
        )
        .map_err(db_err("Insert meeting"))?;
        Ok(conn.last_insert_rowid())
    }

    /// Close the channel's open meeting.
    pub fn set_meeting_completed(&self, channel_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE meetings SET completed_flag = 1 WHERE scrum_channel_id = ?1 AND completed_flag = 0",
            [channel_id],
        )
        .map_err(db_err("Complete meeting"))
    }

    /// Close the open meeting and create its successor in one transaction,
    /// so the channel is never left without an open meeting. Returns the new id.
    pub fn close_and_open_next(&self, channel_id: &str) -> Result<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err("Begin advance"))?;
        tx.execute(
            "UPDATE meetings SET completed_flag = 1 WHERE scrum_channel_id = ?1 AND completed_flag = 0",
            [channel_id],
        )
        .map_err(db_err("Complete meeting"))?;
        tx.execute(
            "INSERT INTO meetings (scrum_channel_id) VALUES (?1)",
            [channel_id],
        )
        .map_err(db_err("Insert meeting"))?;
        let next = tx.last_insert_rowid();
        tx.commit().map_err(db_err("Commit advance"))?;
        Ok(next)
    }

    /// Purge the channel's completed meetings (and their statuses).
    pub fn delete_completed_meetings(&self, channel_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM meetings WHERE scrum_channel_id = ?1 AND completed_flag = 1",
            [channel_id],
        )
        .map_err(db_err("Delete completed meetings"))
    }

    /// Date the channel's open meeting.
    pub fn update_meeting_date(&self, channel_id: &str, at: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE meetings SET meeting_at = ?1 WHERE scrum_channel_id = ?2 AND completed_flag = 0",
            params![at.to_rfc3339(), channel_id],
        )
        .map_err(db_err("Update meeting date"))
    }

    /// The channel's open meeting, newest first if the invariant was ever broken.
    pub fn open_meeting(&self, channel_id: &str) -> Result<Option<MeetingInstance>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT meeting_id, scrum_channel_id, meeting_at, completed_flag FROM meetings
             WHERE scrum_channel_id = ?1 AND completed_flag = 0
             ORDER BY meeting_id DESC LIMIT 1",
            [channel_id],
            meeting_from_row,
        )
        .optional()
        .map_err(db_err("Select open meeting"))
    }

    pub fn get_meeting(&self, meeting_id: i64) -> Result<Option<MeetingInstance>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT meeting_id, scrum_channel_id, meeting_at, completed_flag FROM meetings WHERE meeting_id = ?1",
            [meeting_id],
            meeting_from_row,
        )
        .optional()
        .map_err(db_err("Select meeting"))
    }

    /// All meetings of a channel in creation order.
    pub fn list_meetings(&self, channel_id: &str) -> Result<Vec<MeetingInstance>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT meeting_id, scrum_channel_id, meeting_at, completed_flag FROM meetings
                 WHERE scrum_channel_id = ?1 ORDER BY meeting_id",
            )
            .map_err(db_err("List meetings"))?;
        let rows = stmt
            .query_map([channel_id], meeting_from_row)
            .map_err(db_err("List meetings"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Read meeting row"))
    }

    /// Every meeting of the channel (ascending id) joined with `member`'s own status.
    pub fn meetings_with_member_status(
        &self,
        channel_id: &str,
        member: &str,
    ) -> Result<Vec<MeetingWithStatus>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT m.meeting_id, m.meeting_at, s.member_mention, s.yesterday_work, s.today_work, s.blocker
                 FROM meetings m
                 LEFT JOIN statuses s ON s.meeting_id = m.meeting_id AND s.member_mention = ?2
                 WHERE m.scrum_channel_id = ?1
                 ORDER BY m.meeting_id ASC",
            )
            .map_err(db_err("Select meetings with statuses"))?;

        let rows = stmt
            .query_map(params![channel_id, member], |row| {
                let meeting_id: i64 = row.get(0)?;
                let meeting_at: Option<String> = row.get(1)?;
                let mention: Option<String> = row.get(2)?;
                let my_status = match mention {
                    Some(member_mention) => Some(StatusEntry {
                        meeting_id,
                        member_mention,
                        yesterday_work: row.get(3)?,
                        today_work: row.get(4)?,
                        blocker: row.get(5)?,
                    }),
                    None => None,
                };
                Ok(MeetingWithStatus {
                    meeting_id,
                    meeting_at: parse_time(meeting_at),
                    my_status,
                })
            })
            .map_err(db_err("Select meetings with statuses"))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Read meeting row"))
    }

    // ─── Statuses ──────────────────────────────────────

    /// Insert or overwrite a member's status. An overwrite keeps the row (and
    /// therefore its position in the report).
    pub fn upsert_status(
        &self,
        meeting_id: i64,
        member: &str,
        submission: &StatusSubmission,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO statuses (meeting_id, member_mention, yesterday_work, today_work, blocker)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(meeting_id, member_mention) DO UPDATE SET
                yesterday_work = excluded.yesterday_work,
                today_work = excluded.today_work,
                blocker = excluded.blocker,
                updated_at = datetime('now')",
            params![
                meeting_id,
                member,
                submission.yesterday_work,
                submission.today_work,
                submission.blocker,
            ],
        )
        .map_err(db_err("Upsert status"))?;
        Ok(())
    }

    /// A meeting's statuses in submission order.
    pub fn statuses_for_meeting(&self, meeting_id: i64) -> Result<Vec<StatusEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT meeting_id, member_mention, yesterday_work, today_work, blocker
                 FROM statuses WHERE meeting_id = ?1 ORDER BY rowid ASC",
            )
            .map_err(db_err("Select statuses"))?;
        let rows = stmt
            .query_map([meeting_id], |row| {
                Ok(StatusEntry {
                    meeting_id: row.get(0)?,
                    member_mention: row.get(1)?,
                    yesterday_work: row.get(2)?,
                    today_work: row.get(3)?,
                    blocker: row.get(4)?,
                })
            })
            .map_err(db_err("Select statuses"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Read status row"))
    }

    /// Number of statuses collected for the channel's open meeting.
    pub fn count_pending_statuses(&self, channel_id: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT COUNT(*) FROM statuses WHERE meeting_id IN
                (SELECT meeting_id FROM meetings WHERE scrum_channel_id = ?1 AND completed_flag = 0)",
            [channel_id],
            |r| r.get(0),
        )
        .map_err(db_err("Count pending statuses"))
    }
}

fn meeting_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MeetingInstance> {
    Ok(MeetingInstance {
        meeting_id: row.get(0)?,
        channel_id: row.get(1)?,
        meeting_at: parse_time(row.get(2)?),
        completed: row.get::<_, i64>(3)? != 0,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn schedule(channel_id: &str) -> ChannelSchedule {
        ChannelSchedule {
            channel_id: channel_id.into(),
            master_mention: "(dooray://1/members/10 \"member\")".into(),
            days_of_week: DaySet::Weekday,
            hour: 9,
            minute: 0,
            timezone_name: "UTC".into(),
            webhook_url: format!("https://hooks.example/{channel_id}"),
        }
    }

    pub(crate) fn submission(did: &str, todo: &str, blocker: Option<&str>) -> StatusSubmission {
        StatusSubmission {
            yesterday_work: did.into(),
            today_work: todo.into(),
            blocker: blocker.map(String::from),
        }
    }

    #[test]
    fn test_open_and_migrate() {
        let db = ScrumDb::in_memory().unwrap();
        assert!(db.select_all_scrums().unwrap().is_empty());
    }

    #[test]
    fn test_scrum_crud() {
        let db = ScrumDb::in_memory().unwrap();
        assert!(db.upsert_scrum(&schedule("c1")).unwrap());

        let mut updated = schedule("c1");
        updated.hour = 10;
        updated.days_of_week = DaySet::Everyday;
        assert!(!db.upsert_scrum(&updated).unwrap());

        let loaded = db.get_scrum("c1").unwrap().unwrap();
        assert_eq!(loaded.hour, 10);
        assert_eq!(loaded.days_of_week, DaySet::Everyday);
        assert_eq!(db.select_all_scrums().unwrap().len(), 1);

        db.update_webhook("c1", "https://hooks.example/new").unwrap();
        assert_eq!(
            db.get_scrum("c1").unwrap().unwrap().webhook_url,
            "https://hooks.example/new"
        );

        assert!(db.delete_scrum("c1").unwrap());
        assert!(db.get_scrum("c1").unwrap().is_none());
        assert!(!db.delete_scrum("c1").unwrap());
    }

    #[test]
    fn test_upsert_scrum_keeps_meetings() {
        let db = ScrumDb::in_memory().unwrap();
        db.upsert_scrum(&schedule("c1")).unwrap();
        let id = db.insert_next_meeting("c1").unwrap();
        db.upsert_status(id, "alice", &submission("a", "b", None)).unwrap();

        db.upsert_scrum(&schedule("c1")).unwrap();
        assert_eq!(db.list_meetings("c1").unwrap().len(), 1);
        assert_eq!(db.count_pending_statuses("c1").unwrap(), 1);
    }

    #[test]
    fn test_delete_scrum_cascades() {
        let db = ScrumDb::in_memory().unwrap();
        db.upsert_scrum(&schedule("c1")).unwrap();
        let id = db.insert_next_meeting("c1").unwrap();
        db.upsert_status(id, "alice", &submission("a", "b", None)).unwrap();

        db.delete_scrum("c1").unwrap();
        assert!(db.list_meetings("c1").unwrap().is_empty());
        assert!(db.statuses_for_meeting(id).unwrap().is_empty());
    }

    #[test]
    fn test_meeting_lifecycle_queries() {
        let db = ScrumDb::in_memory().unwrap();
        db.upsert_scrum(&schedule("c1")).unwrap();
        let first = db.insert_next_meeting("c1").unwrap();

        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        assert_eq!(db.update_meeting_date("c1", at).unwrap(), 1);
        assert_eq!(db.set_meeting_completed("c1").unwrap(), 1);
        let second = db.insert_next_meeting("c1").unwrap();
        assert!(second > first);

        let open = db.open_meeting("c1").unwrap().unwrap();
        assert_eq!(open.meeting_id, second);
        assert!(open.meeting_at.is_none());

        let closed = db.get_meeting(first).unwrap().unwrap();
        assert!(closed.completed);
        assert_eq!(closed.meeting_at, Some(at));

        assert_eq!(db.delete_completed_meetings("c1").unwrap(), 1);
        assert_eq!(db.list_meetings("c1").unwrap().len(), 1);
    }

    #[test]
    fn test_close_and_open_next() {
        let db = ScrumDb::in_memory().unwrap();
        db.upsert_scrum(&schedule("c1")).unwrap();
        let first = db.insert_next_meeting("c1").unwrap();

        let next = db.close_and_open_next("c1").unwrap();
        assert!(next > first);
        assert!(db.get_meeting(first).unwrap().unwrap().completed);
        assert_eq!(db.open_meeting("c1").unwrap().unwrap().meeting_id, next);
    }

    #[test]
    fn test_close_and_open_next_rolls_back_on_failure() {
        let db = ScrumDb::in_memory().unwrap();
        db.upsert_scrum(&schedule("c1")).unwrap();
        let first = db.insert_next_meeting("c1").unwrap();
        db.lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_meeting BEFORE INSERT ON meetings
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        assert!(db.close_and_open_next("c1").is_err());
        // The close was undone: the same meeting is still open.
        let open = db.open_meeting("c1").unwrap().unwrap();
        assert_eq!(open.meeting_id, first);
        assert!(!open.completed);
    }

    #[test]
    fn test_status_upsert_and_order() {
        let db = ScrumDb::in_memory().unwrap();
        db.upsert_scrum(&schedule("c1")).unwrap();
        let id = db.insert_next_meeting("c1").unwrap();

        db.upsert_status(id, "alice", &submission("a1", "a2", None)).unwrap();
        db.upsert_status(id, "bob", &submission("b1", "b2", Some("db down"))).unwrap();
        // Alice edits: stays first.
        db.upsert_status(id, "alice", &submission("a1*", "a2*", None)).unwrap();

        let statuses = db.statuses_for_meeting(id).unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].member_mention, "alice");
        assert_eq!(statuses[0].yesterday_work, "a1*");
        assert_eq!(statuses[1].blocker.as_deref(), Some("db down"));
        assert_eq!(db.count_pending_statuses("c1").unwrap(), 2);
    }

    #[test]
    fn test_meetings_with_member_status_left_join() {
        let db = ScrumDb::in_memory().unwrap();
        db.upsert_scrum(&schedule("c1")).unwrap();
        let m1 = db.insert_next_meeting("c1").unwrap();
        db.upsert_status(m1, "alice", &submission("x", "y", None)).unwrap();
        db.upsert_status(m1, "bob", &submission("p", "q", None)).unwrap();
        db.set_meeting_completed("c1").unwrap();
        let m2 = db.insert_next_meeting("c1").unwrap();

        let rows = db.meetings_with_member_status("c1", "alice").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].meeting_id, m1);
        assert_eq!(rows[0].my_status.as_ref().unwrap().today_work, "y");
        assert_eq!(rows[1].meeting_id, m2);
        assert!(rows[1].my_status.is_none());
    }

    #[test]
    fn test_count_pending_ignores_completed() {
        let db = ScrumDb::in_memory().unwrap();
        db.upsert_scrum(&schedule("c1")).unwrap();
        let m1 = db.insert_next_meeting("c1").unwrap();
        db.upsert_status(m1, "alice", &submission("x", "y", None)).unwrap();
        db.set_meeting_completed("c1").unwrap();
        db.insert_next_meeting("c1").unwrap();
        assert_eq!(db.count_pending_statuses("c1").unwrap(), 0);
    }
}
