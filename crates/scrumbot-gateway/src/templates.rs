//! Reply texts, messages and dialogs the bot sends back to the messenger.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use scrumbot_core::message::{
    Action, Attachment, BLOCKER_COLOR, Dialog, DialogElement, Field, Message, RETRY_TEXT,
    SelectOption,
};
use scrumbot_core::types::{ChannelSchedule, DaySet, StatusSubmission, date_label};
use scrumbot_scheduler::status::{DateChoice, StatusDraft};

use crate::request::CallbackId;

pub const NOT_SET_UP_TEXT: &str = "Daily scrum had not set up. `/scrum help`";
pub const EDIT_STATUS_TEXT: &str = "Status edit complete.";
pub const MASTER_ACTION: &str = "masterMention";
pub const MEETING_ACTION: &str = "meetingId";

/// Zones offered by the setup dialog, `(label, IANA name)`.
pub const TIMEZONES: [(&str, &str); 35] = [
    ("GMT-11:00 (MidwayIsland, Samoa)", "Pacific/Midway"),
    ("GMT-10:00 (Hawaii)", "Pacific/Honolulu"),
    ("GMT-09:30 (Marquesas)", "Pacific/Marquesas"),
    ("GMT-09:00 (Alaska)", "America/Anchorage"),
    ("GMT-08:00 (PacificTime)", "America/Los_Angeles"),
    ("GMT-07:00 (MountainTime_US/Canada)", "America/Denver"),
    ("GMT-06:00 (CentralTime_US/Canada)", "America/Chicago"),
    ("GMT-05:00 (EasternTime_US/Canada)", "America/New_York"),
    ("GMT-04:30 (Caracas)", "America/Caracas"),
    ("GMT-04:00 (Santiago)", "America/Santiago"),
    ("GMT-03:30 (Newfoundland)", "America/St_Johns"),
    ("GMT-03:00 (SaoPaulo)", "America/Sao_Paulo"),
    ("GMT-02:00 (Mid-Atlantic)", "America/Noronha"),
    ("GMT-01:00 (Azores)", "Atlantic/Azores"),
    ("GMT+00:00 (GreenwichMeanTime_London)", "Europe/London"),
    ("GMT+01:00 (Amsterdam, Berlin, Vienna)", "Europe/Berlin"),
    ("GMT+02:00 (Athens, Cairo)", "Europe/Athens"),
    ("GMT+03:00 (Moscow, Baghdad)", "Asia/Baghdad"),
    ("GMT+03:30 (Tehran)", "Asia/Tehran"),
    ("GMT+04:00 (Baku, Muscat)", "Asia/Baku"),
    ("GMT+04:30 (Kabul)", "Asia/Kabul"),
    ("GMT+05:00 (Karachi)", "Asia/Karachi"),
    ("GMT+05:30 (NewDelhi, Mumbai, Colombo)", "Asia/Colombo"),
    ("GMT+05:45 (Kathmandu)", "Asia/Kathmandu"),
    ("GMT+06:00 (Astana, Dhaka)", "Asia/Dhaka"),
    ("GMT+06:30 (Yangon)", "Asia/Yangon"),
    ("GMT+07:00 (Bangkok, Hanoi, Jakarta)", "Asia/Bangkok"),
    ("GMT+08:00 (Beijing, Dalian, Singapore, Taiwan)", "Asia/Shanghai"),
    ("GMT+09:00 (Seoul, Pyongyang, Tokyo, Fukuoka)", "Asia/Seoul"),
    ("GMT+09:30 (Darwin, Adelaide)", "Australia/Darwin"),
    ("GMT+10:00 (Guam, Canberra, Sydney)", "Australia/Sydney"),
    ("GMT+10:30 (LordHoweIsland)", "Australia/Lord_Howe"),
    ("GMT+11:00 (NewCaledonia)", "Pacific/Noumea"),
    ("GMT+11:30 (NorfolkIsland)", "Pacific/Norfolk"),
    ("GMT+12:00 (Auckland, Fiji)", "Pacific/Auckland"),
];

pub fn help() -> Message {
    let commands = [
        ("/scrum setup", "Setup the scrum meeting in this channel"),
        ("/scrum", "Write/Edit my status"),
        ("/scrum status", "Print scrum statuses"),
        ("/scrum info", "Show the scrum meeting setting in this channel"),
        ("/scrum delete", "Delete the scrum meeting in this channel"),
    ];
    Message::text("`/scrum` help").attachment(Attachment {
        fields: commands.iter().map(|(t, v)| Field::new(*t, *v)).collect(),
        ..Default::default()
    })
}

pub fn error() -> Message {
    Message::text(RETRY_TEXT)
}

pub fn not_set_up() -> Message {
    Message::text(NOT_SET_UP_TEXT)
}

pub fn cant_edit_delete(master_mention: &str) -> Message {
    Message::text(format!("Only {master_mention} can edit/delete."))
}

fn schedule_fields(schedule: &ChannelSchedule) -> Attachment {
    Attachment {
        title: Some("Daily scrum info".into()),
        fields: vec![
            Field::short("Time", schedule.time_label()),
            Field::short("Days", schedule.days_of_week.as_str()),
            Field::short("Master", schedule.master_mention.clone()),
        ],
        ..Default::default()
    }
}

pub fn info(schedule: &ChannelSchedule) -> Message {
    Message::text("Daily scrum info").attachment(schedule_fields(schedule))
}

/// Confirmation after a setup; `creator` is set only for a brand-new scrum.
pub fn setup_done(creator: Option<&str>, schedule: &ChannelSchedule) -> Message {
    let text = match creator {
        Some(user) => format!("{user} set up a daily scrum!"),
        None => "Daily scrum edited!".to_string(),
    };
    Message::text(text)
        .in_channel()
        .delete_original()
        .attachment(schedule_fields(schedule))
}

pub fn scrum_deleted(user_mention: &str) -> Message {
    Message::text(format!("{user_mention} deleted the daily scrum!")).in_channel()
}

/// Master picker posted after a valid setup dialog. The pending setup stays
/// server-side under `session_key`.
pub fn master_select(current_master: Option<&str>, session_key: &str) -> Message {
    let mut actions = Vec::new();
    if let Some(master) = current_master {
        actions.push(Action::button(MASTER_ACTION, "Not change", master));
    }
    actions.push(Action::user_select(MASTER_ACTION));

    let text = match current_master {
        Some(master) => format!("Currently, daily scrum master is {master}."),
        None => "Scrum setup".to_string(),
    };
    Message::text(text)
        .replace_original(false)
        .attachment(Attachment {
            title: Some("Please select new daily scrum master".into()),
            callback_id: Some(CallbackId::SetupSession(session_key.to_string()).to_string()),
            actions,
            ..Default::default()
        })
}

pub fn choose_date(choices: &[DateChoice]) -> Message {
    let newest = choices.last().map(|c| c.meeting_id).unwrap_or_default();
    Message::text("You didn't write status for last scrum.").attachment(Attachment {
        title: Some("Please choose scrum date to write status.".into()),
        callback_id: Some(CallbackId::ChooseDate(newest).to_string()),
        actions: choices
            .iter()
            .map(|c| Action::button(MEETING_ACTION, c.label.clone(), c.meeting_id.to_string()))
            .collect(),
        ..Default::default()
    })
}

pub fn delete_original() -> Message {
    Message::text("Message deleted").delete_original()
}

pub fn wrote_status(user_mention: &str) -> Message {
    Message::text(format!("{user_mention} wrote the status for next daily scrum."))
        .in_channel()
        .replace_original(false)
}

pub fn edited_status() -> Message {
    Message::text(EDIT_STATUS_TEXT).replace_original(false)
}

pub fn late_status(
    user_mention: &str,
    meeting_at: Option<DateTime<Utc>>,
    tz: Tz,
    submission: &StatusSubmission,
) -> Message {
    let mut fields = vec![
        Field::new("What did:", submission.yesterday_work.clone()),
        Field::new("What to do:", submission.today_work.clone()),
    ];
    let mut color = None;
    if let Some(blocker) = submission.blocker() {
        fields.push(Field::new("Blockers:", blocker));
        color = Some(BLOCKER_COLOR.to_string());
    }
    let date = date_label(meeting_at, tz);
    Message::text(format!("{user_mention} wrote the status for {date} daily scrum."))
        .in_channel()
        .replace_original(false)
        .attachment(Attachment {
            text: Some(user_mention.to_string()),
            fields,
            color,
            ..Default::default()
        })
}

pub fn setup_dialog(current: Option<&ChannelSchedule>) -> Dialog {
    let zones = TIMEZONES
        .iter()
        .map(|(label, value)| SelectOption::new(*label, *value))
        .collect();
    let days = [
        ("Weekday", DaySet::Weekday),
        ("Weekend", DaySet::Weekend),
        ("Everyday", DaySet::Everyday),
    ]
    .iter()
    .map(|(label, set)| SelectOption::new(*label, set.as_str()))
    .collect();

    let (tz, hour, minute, days_of_week) = match current {
        Some(s) => (
            s.timezone_name.clone(),
            s.hour.to_string(),
            s.minute.to_string(),
            s.days_of_week.as_str().to_string(),
        ),
        None => Default::default(),
    };

    Dialog {
        callback_id: CallbackId::Setup.to_string(),
        title: "Scrum Setup".into(),
        submit_label: "Next".into(),
        elements: vec![
            DialogElement::select("UTC timezone", "timezoneName", &tz, zones),
            DialogElement::number("Hour", "hour", &hour, "00 ~ 23"),
            DialogElement::number("Minute", "minute", &minute, "00 ~ 59"),
            DialogElement::select("Days", "daysOfWeek", &days_of_week, days),
        ],
    }
}

pub fn write_dialog(draft: &StatusDraft) -> Dialog {
    Dialog {
        callback_id: CallbackId::Status(draft.meeting_id).to_string(),
        title: "Scrum Status".into(),
        submit_label: "Submit".into(),
        elements: vec![
            DialogElement::textarea(
                "What did",
                "yesterdayWork",
                &draft.yesterday_work,
                "What did I complete yesterday that contributed to the team meeting our sprint goal?",
            ),
            DialogElement::textarea(
                "What to do",
                "todayWork",
                &draft.today_work,
                "What do I plan to complete today to contribute to the team meeting our sprint goal?",
            ),
            DialogElement::textarea(
                "Blockers",
                "blocker",
                &draft.blocker,
                "Do I see any impediment that could prevent me or the team from meeting our sprint goal?",
            )
            .optional(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule() -> ChannelSchedule {
        ChannelSchedule {
            channel_id: "c1".into(),
            master_mention: "(dooray://1/members/10 \"member\")".into(),
            days_of_week: DaySet::Weekday,
            hour: 9,
            minute: 5,
            timezone_name: "Asia/Seoul".into(),
            webhook_url: String::new(),
        }
    }

    #[test]
    fn test_every_zone_parses() {
        for (_, zone) in TIMEZONES {
            assert!(zone.parse::<Tz>().is_ok(), "{zone}");
        }
    }

    #[test]
    fn test_setup_done_texts() {
        let created = setup_done(Some("@alice"), &schedule());
        assert_eq!(created.text, "@alice set up a daily scrum!");
        assert_eq!(created.delete_original, Some(true));
        assert_eq!(created.attachments[0].fields[0].value, "09:05 (Asia/Seoul)");
        assert_eq!(created.attachments[0].fields[1].value, "WEEKDAY");

        assert_eq!(setup_done(None, &schedule()).text, "Daily scrum edited!");
    }

    #[test]
    fn test_master_select_buttons() {
        let fresh = master_select(None, "k1");
        assert_eq!(fresh.text, "Scrum setup");
        assert_eq!(fresh.attachments[0].actions.len(), 1);
        assert_eq!(
            fresh.attachments[0].callback_id.as_deref(),
            Some("setupSession-k1")
        );

        let edit = master_select(Some("@bob"), "k2");
        assert_eq!(edit.text, "Currently, daily scrum master is @bob.");
        let actions = &edit.attachments[0].actions;
        assert_eq!(actions[0].value, "@bob");
        assert_eq!(actions[0].text.as_deref(), Some("Not change"));
        assert_eq!(actions[1].data_source.as_deref(), Some("users"));
    }

    #[test]
    fn test_choose_date_buttons() {
        let choices = vec![
            DateChoice { meeting_id: 3, label: "03/02".into() },
            DateChoice { meeting_id: 4, label: "Next".into() },
        ];
        let msg = choose_date(&choices);
        let attachment = &msg.attachments[0];
        assert_eq!(attachment.callback_id.as_deref(), Some("chooseDate-4"));
        assert_eq!(attachment.actions[0].name, MEETING_ACTION);
        assert_eq!(attachment.actions[0].value, "3");
        assert_eq!(attachment.actions[1].text.as_deref(), Some("Next"));
    }

    #[test]
    fn test_late_status_blocker_color() {
        let at = Some(Utc.with_ymd_and_hms(2026, 3, 2, 23, 0, 0).unwrap());
        let mut submission = StatusSubmission {
            yesterday_work: "a".into(),
            today_work: "b".into(),
            blocker: None,
        };
        let plain = late_status("@alice", at, chrono_tz::Asia::Seoul, &submission);
        // 23:00 UTC on the 2nd is already the 3rd in Seoul.
        assert_eq!(plain.text, "@alice wrote the status for 03/03 daily scrum.");
        assert!(plain.attachments[0].color.is_none());

        submission.blocker = Some("review pending".into());
        let blocked = late_status("@alice", at, chrono_tz::Asia::Seoul, &submission);
        assert_eq!(blocked.attachments[0].color.as_deref(), Some(BLOCKER_COLOR));
        assert_eq!(blocked.attachments[0].fields.len(), 3);
    }

    #[test]
    fn test_dialogs() {
        let setup = setup_dialog(Some(&schedule()));
        assert_eq!(setup.callback_id, "setup");
        assert_eq!(setup.elements[0].options.len(), 35);
        assert_eq!(setup.elements[0].value, "Asia/Seoul");
        assert_eq!(setup.elements[1].value, "9");
        assert!(setup_dialog(None).elements.iter().all(|e| e.value.is_empty()));

        let draft = StatusDraft {
            meeting_id: 8,
            yesterday_work: "carried".into(),
            ..Default::default()
        };
        let write = write_dialog(&draft);
        assert_eq!(write.callback_id, "status-8");
        assert_eq!(write.elements[0].value, "carried");
        assert!(write.elements[2].optional);
    }
}
