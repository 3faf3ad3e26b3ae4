use crate::alarm::AlarmListener;
use crate::time::Clock;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Floor on the re-arm delay so a listener returning a past time cannot spin.
const MIN_REARM_DELAY: Duration = Duration::from_millis(10);

/// Tokio stand-in for an OS alarm service: re-arms the listener with the time
/// it returns and fires it once that time has passed.
#[derive(Clone)]
pub struct AlarmDriver {
    listener: Arc<dyn AlarmListener>,
    clock: Arc<dyn Clock>,
}

pub struct DriverHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

impl AlarmDriver {
    pub fn new(listener: Arc<dyn AlarmListener>, clock: Arc<dyn Clock>) -> Self {
        Self { listener, clock }
    }

    /// Fires the listener if its persisted time is due and returns the time
    /// to arm for. A never-scheduled listener reports `0` and so gets the
    /// bootstrap fire.
    pub async fn receive(&self) -> u64 {
        let scheduled = self.listener.next_scheduled_execution_time().await;
        if self.clock.now_ms() >= scheduled {
            return self.listener.on_alarm(scheduled).await;
        }
        scheduled
    }

    pub fn start(self) -> DriverHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            loop {
                let armed_for = self.receive().await;
                let wait = Duration::from_millis(armed_for.saturating_sub(self.clock.now_ms()))
                    .max(MIN_REARM_DELAY);
                debug!("alarm armed for {} ({:?})", armed_for, wait);
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = stopped(&mut shutdown_rx) => break,
                }
            }
        });
        DriverHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

async fn stopped(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
