//! # LogWriter — simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [trigger-unclaimed] name="click"
//! [registry-aborted] pending=3
//! [tick-interrupted]
//! [first-value-timeout] limit_ms=500
//! [unmounted]
//! [abort-scheduled] delay_ms=0 via=next_tick
//! [abort-fired]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let name = e.name.as_deref().unwrap_or("unknown");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::TriggerUnclaimed => println!("[trigger-unclaimed] name={name:?}"),
            EventKind::RegistryAborted => println!("[registry-aborted] pending={reason}"),
            EventKind::TickInterrupted => println!("[tick-interrupted]"),
            EventKind::FirstValueTimeout => {
                println!("[first-value-timeout] limit_ms={:?}", e.delay_ms)
            }
            EventKind::SourceFailed => println!("[source-failed] err={reason:?}"),
            EventKind::SchedulerClosed => println!("[scheduler-closed]"),
            EventKind::Mounted => println!("[mounted]"),
            EventKind::Unmounted => println!("[unmounted]"),
            EventKind::AbortScheduled => {
                println!("[abort-scheduled] delay_ms={:?} via={reason}", e.delay_ms)
            }
            EventKind::AbortCancelled => println!("[abort-cancelled]"),
            EventKind::AbortFired => println!("[abort-fired]"),
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] subscriber={name} reason={reason}")
            }
            EventKind::SubscriberPanicked => {
                println!("[subscriber-panicked] subscriber={name} info={reason}")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
