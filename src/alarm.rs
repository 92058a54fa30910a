//! Scheduling of timed alarms
//!
//! The round engine never sleeps itself. It asks a [`Scheduler`] to deliver
//! an [`AlarmMessage`] after a delay and keeps the returned handle so the
//! alarm can be cancelled. The scheduler must deliver alarms through the
//! same serialized path as chat events.

use std::time::Duration;

use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};
use tracing::trace;

use super::{AlarmMessage, runtime::Input};

/// A pending alarm that can be cancelled
pub trait AlarmHandle {
    /// Cancels the alarm
    ///
    /// Cancelling an alarm that already fired is a no-op. Taking `self` by
    /// value means a handle is cancelled at most once.
    fn cancel(self);
}

/// Something that delivers alarms back to the round engine after a delay
pub trait Scheduler {
    /// Handle returned for each scheduled alarm
    type Handle: AlarmHandle;

    /// Schedules `alarm` to be delivered after `delay`
    fn schedule(&mut self, alarm: AlarmMessage, delay: Duration) -> Self::Handle;
}

/// Scheduler that posts alarms into the runtime mailbox from a sleeping task
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    mailbox: UnboundedSender<Input>,
}

impl TokioScheduler {
    /// Creates a scheduler posting into `mailbox`
    pub fn new(mailbox: UnboundedSender<Input>) -> Self {
        Self { mailbox }
    }
}

/// Handle to an alarm task spawned by [`TokioScheduler`]
#[derive(Debug)]
pub struct TokioAlarm(JoinHandle<()>);

impl AlarmHandle for TokioAlarm {
    fn cancel(self) {
        self.0.abort();
    }
}

impl Scheduler for TokioScheduler {
    type Handle = TokioAlarm;

    fn schedule(&mut self, alarm: AlarmMessage, delay: Duration) -> TokioAlarm {
        let mailbox = self.mailbox.clone();
        TokioAlarm(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(?alarm, "Alarm fired");
            // The runtime may already be gone when shutting down
            let _ = mailbox.send(Input::Alarm(alarm));
        }))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Alarm recorded by [`MockScheduler`]
    #[derive(Debug, Clone)]
    pub(crate) struct Scheduled {
        pub(crate) alarm: AlarmMessage,
        pub(crate) delay: Duration,
        pub(crate) cancelled: Arc<Mutex<bool>>,
    }

    impl Scheduled {
        pub(crate) fn is_cancelled(&self) -> bool {
            *self.cancelled.lock().unwrap()
        }
    }

    /// Scheduler that only records what was scheduled
    #[derive(Debug, Clone, Default)]
    pub(crate) struct MockScheduler {
        pub(crate) scheduled: Arc<Mutex<Vec<Scheduled>>>,
    }

    impl MockScheduler {
        pub(crate) fn all(&self) -> Vec<Scheduled> {
            self.scheduled.lock().unwrap().clone()
        }

        pub(crate) fn last(&self) -> Option<Scheduled> {
            self.scheduled.lock().unwrap().last().cloned()
        }
    }

    /// Handle to a [`MockScheduler`] alarm
    #[derive(Debug)]
    pub(crate) struct MockAlarm {
        cancelled: Arc<Mutex<bool>>,
    }

    impl AlarmHandle for MockAlarm {
        fn cancel(self) {
            let mut cancelled = self.cancelled.lock().unwrap();
            assert!(!*cancelled, "alarm cancelled twice");
            *cancelled = true;
        }
    }

    impl Scheduler for MockScheduler {
        type Handle = MockAlarm;

        fn schedule(&mut self, alarm: AlarmMessage, delay: Duration) -> MockAlarm {
            let cancelled = Arc::new(Mutex::new(false));
            self.scheduled.lock().unwrap().push(Scheduled {
                alarm,
                delay,
                cancelled: cancelled.clone(),
            });
            MockAlarm { cancelled }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_delivers_after_delay() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(tx);

        let _alarm = scheduler.schedule(AlarmMessage::Deadline { round: 1 }, Duration::from_secs(20));

        tokio::time::sleep(Duration::from_secs(19)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            rx.try_recv().unwrap(),
            Input::Alarm(AlarmMessage::Deadline { round: 1 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_cancel() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(tx);

        let alarm = scheduler.schedule(AlarmMessage::Deadline { round: 1 }, Duration::from_secs(5));
        alarm.cancel();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_cancel_after_fire_is_noop() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(tx);

        let alarm = scheduler.schedule(AlarmMessage::NextRound { after: 1 }, Duration::from_secs(3));
        tokio::time::sleep(Duration::from_secs(4)).await;
        alarm.cancel();

        assert_eq!(
            rx.try_recv().unwrap(),
            Input::Alarm(AlarmMessage::NextRound { after: 1 })
        );
    }
}
