//! # recado-scheduler
//!
//! Turns "avísame 1 hora antes" into a stored UTC reminder row, and delivers
//! due reminders on a poll loop. Delivery is decoupled from message
//! handling: the loop only needs a channel to send through.

pub mod offset;

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use recado_core::{
    error::RecadoError,
    message::OutgoingMessage,
    task::DueDate,
    traits::Channel,
};
use recado_memory::Store;
use thiserror::Error;
use tracing::{error, info};

/// Why a reminder could not be scheduled. These map to user-facing
/// validation messages; only `Store` is a real failure.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The offset text did not contain `<n> minutos/horas/dias`.
    #[error("unrecognized reminder offset: {0}")]
    BadOffset(String),

    /// The task has no due date to anchor the reminder to.
    #[error("task has no due date")]
    MissingDue,

    #[error(transparent)]
    Store(#[from] RecadoError),
}

/// Schedules reminders and delivers them when due.
#[derive(Clone)]
pub struct ReminderScheduler {
    memory: Store,
    tz: Tz,
}

impl ReminderScheduler {
    pub fn new(memory: Store, tz: Tz) -> Self {
        Self { memory, tz }
    }

    /// Schedule a reminder `offset_spec` before the task's due date and
    /// return the Spanish confirmation text.
    ///
    /// A date-only due is anchored at 23:59:59 local time. The computed
    /// remind time is stored in UTC; the confirmation shows local time.
    pub async fn schedule(
        &self,
        chat_id: &str,
        task_title: &str,
        due: Option<DueDate>,
        offset_spec: &str,
    ) -> Result<String, ScheduleError> {
        let offset = offset::parse_offset(offset_spec)
            .ok_or_else(|| ScheduleError::BadOffset(offset_spec.to_string()))?;
        let due = due.ok_or(ScheduleError::MissingDue)?;

        let remind_local = self
            .remind_time_local(due, offset)
            .ok_or(ScheduleError::MissingDue)?;
        let remind_utc = remind_local.with_timezone(&Utc);

        let id = self
            .memory
            .create_reminder(
                chat_id,
                task_title,
                &remind_utc.format("%Y-%m-%d %H:%M:%S").to_string(),
            )
            .await?;

        info!(
            "reminder {id} scheduled for '{task_title}' at {} ({})",
            remind_utc.format("%Y-%m-%d %H:%M:%S"),
            self.tz
        );

        Ok(format!(
            "OK. Te recordaré sobre '{task_title}' el {}.",
            remind_local.format("%Y-%m-%d a las %H:%M")
        ))
    }

    /// Due minus offset, in the configured local timezone.
    fn remind_time_local(&self, due: DueDate, offset: Duration) -> Option<DateTime<Tz>> {
        let naive = match due {
            DueDate::Date(d) => d.and_hms_opt(23, 59, 59)?,
            DueDate::DateTime(dt) => dt,
        };
        // On a DST gap the earlier interpretation is good enough.
        let local = self.tz.from_local_datetime(&naive).earliest()?;
        local.checked_sub_signed(offset)
    }

    /// Deliver every pending reminder whose time has come.
    ///
    /// Sends first, then marks sent, so a crash in between repeats the
    /// message rather than losing it. One failed send leaves its row
    /// pending and does not stop the rest of the batch.
    pub async fn tick(&self, channel: &dyn Channel) {
        let due = match self.memory.due_reminders().await {
            Ok(due) => due,
            Err(e) => {
                error!("scheduler: failed to query due reminders: {e}");
                return;
            }
        };

        for reminder in due {
            let msg = OutgoingMessage::to(
                reminder.chat_id.clone(),
                format!(
                    "🔔 *Recordatorio* 🔔\n\nNo te olvides de tu tarea: *{}*",
                    reminder.task_title
                ),
            );

            if let Err(e) = channel.send(msg).await {
                error!("failed to deliver reminder {}: {e}", reminder.id);
                continue;
            }

            if let Err(e) = self.memory.mark_sent(reminder.id).await {
                error!("failed to mark reminder {} as sent: {e}", reminder.id);
            } else {
                info!(
                    "delivered reminder {} for '{}'",
                    reminder.id, reminder.task_title
                );
            }
        }
    }

    /// Background loop: poll for due reminders every `poll_secs`.
    pub async fn run(self, channel: std::sync::Arc<dyn Channel>, poll_secs: u64) {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(poll_secs)).await;
            self.tick(channel.as_ref()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use recado_core::message::IncomingMessage;
    use std::sync::Mutex;

    struct RecordingChannel {
        sent: Mutex<Vec<OutgoingMessage>>,
        fail: bool,
    }

    impl RecordingChannel {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn start(
            &self,
        ) -> Result<tokio::sync::mpsc::Receiver<IncomingMessage>, RecadoError> {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(rx)
        }

        async fn send(&self, message: OutgoingMessage) -> Result<(), RecadoError> {
            if self.fail {
                return Err(RecadoError::Channel("send failed".into()));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn stop(&self) -> Result<(), RecadoError> {
            Ok(())
        }
    }

    async fn scheduler(tz: Tz) -> ReminderScheduler {
        ReminderScheduler::new(Store::open_in_memory().await.unwrap(), tz)
    }

    fn due_date(y: i32, m: u32, d: u32) -> Option<DueDate> {
        Some(DueDate::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap()))
    }

    #[tokio::test]
    async fn date_only_due_anchors_at_end_of_day_local() {
        let s = scheduler(chrono_tz::America::Santiago).await;
        let local = s
            .remind_time_local(
                DueDate::Date(NaiveDate::from_ymd_opt(2025, 6, 21).unwrap()),
                Duration::hours(1),
            )
            .unwrap();

        assert_eq!(
            local.naive_local().to_string(),
            "2025-06-21 22:59:59".to_string()
        );
        // Santiago is UTC-4 in June; storage is UTC.
        assert_eq!(
            local.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S").to_string(),
            "2025-06-22 02:59:59"
        );
    }

    #[tokio::test]
    async fn schedule_confirms_in_local_time() {
        let s = scheduler(chrono_tz::America::Santiago).await;
        let reply = s
            .schedule("chat1", "Entregar informe", due_date(2025, 6, 21), "1 hora antes")
            .await
            .unwrap();
        assert_eq!(
            reply,
            "OK. Te recordaré sobre 'Entregar informe' el 2025-06-21 a las 22:59."
        );
    }

    #[tokio::test]
    async fn bad_offset_is_rejected() {
        let s = scheduler(chrono_tz::America::Santiago).await;
        let err = s
            .schedule("chat1", "Informe", due_date(2025, 6, 21), "un rato antes")
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::BadOffset(_)));
    }

    #[tokio::test]
    async fn out_of_bounds_offset_is_rejected_not_fatal() {
        let s = scheduler(chrono_tz::America::Santiago).await;
        let err = s
            .schedule(
                "chat1",
                "Informe",
                due_date(2025, 6, 21),
                "999999999999999999 minutos antes",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::BadOffset(_)));
    }

    #[tokio::test]
    async fn missing_due_is_rejected() {
        let s = scheduler(chrono_tz::America::Santiago).await;
        let err = s
            .schedule("chat1", "Informe", None, "1 hora antes")
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::MissingDue));
    }

    #[tokio::test]
    async fn datetime_due_is_used_as_is() {
        let s = scheduler(chrono_tz::America::Santiago).await;
        let local = s
            .remind_time_local(
                DueDate::DateTime(
                    NaiveDate::from_ymd_opt(2025, 6, 21)
                        .unwrap()
                        .and_hms_opt(15, 0, 0)
                        .unwrap(),
                ),
                Duration::minutes(30),
            )
            .unwrap();
        assert_eq!(local.naive_local().to_string(), "2025-06-21 14:30:00");
    }

    #[tokio::test]
    async fn tick_sends_once_and_is_idempotent() {
        let s = scheduler(chrono_tz::UTC).await;
        let channel = RecordingChannel::new();

        // Due date far in the past makes the reminder immediately due.
        s.schedule("chat1", "Pagar cuentas", due_date(2020, 1, 1), "1 hora antes")
            .await
            .unwrap();

        s.tick(&channel).await;
        assert_eq!(channel.sent.lock().unwrap().len(), 1);
        {
            let sent = channel.sent.lock().unwrap();
            let msg = &sent[0];
            assert!(msg.text.contains("Pagar cuentas"));
            assert_eq!(msg.reply_target.as_deref(), Some("chat1"));
        }

        // Already sent: a second tick delivers nothing.
        s.tick(&channel).await;
        assert_eq!(channel.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tick_with_nothing_due_sends_nothing() {
        let s = scheduler(chrono_tz::UTC).await;
        let channel = RecordingChannel::new();

        s.schedule("chat1", "Tarea futura", due_date(2099, 1, 1), "1 dia antes")
            .await
            .unwrap();

        s.tick(&channel).await;
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_send_leaves_reminder_pending() {
        let s = scheduler(chrono_tz::UTC).await;
        let mut channel = RecordingChannel::new();
        channel.fail = true;

        s.schedule("chat1", "Pagar cuentas", due_date(2020, 1, 1), "1 hora antes")
            .await
            .unwrap();

        s.tick(&channel).await;

        // Channel recovers; the reminder is still there.
        channel.fail = false;
        s.tick(&channel).await;
        assert_eq!(channel.sent.lock().unwrap().len(), 1);
    }
}
