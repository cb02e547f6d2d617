use dispatch_offer::{AlertSink, Notice};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Rings the terminal bell while offers are waiting and prints notices as toasts.
pub struct TerminalAlerts {
    ring_every: Duration,
    ringing: Arc<AtomicBool>,
    ring_task: Mutex<Option<JoinHandle<()>>>,
}

impl TerminalAlerts {
    pub fn new(ring_every: Duration) -> Self {
        Self {
            ring_every,
            ringing: Arc::new(AtomicBool::new(false)),
            ring_task: Mutex::new(None),
        }
    }

    pub fn is_ringing(&self) -> bool {
        self.ringing.load(Ordering::SeqCst)
    }
}

fn bell() {
    let mut out = std::io::stdout();
    let _ = out.write_all(b"\x07");
    let _ = out.flush();
}

impl AlertSink for TerminalAlerts {
    fn start_ring(&self) {
        if self.ringing.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("New job offer, ringing");

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            bell();
            return;
        };
        let ringing = self.ringing.clone();
        let every = self.ring_every;
        let task = runtime.spawn(async move {
            while ringing.load(Ordering::SeqCst) {
                bell();
                tokio::time::sleep(every).await;
            }
        });
        if let Ok(mut slot) = self.ring_task.lock() {
            if let Some(old) = slot.replace(task) {
                old.abort();
            }
        }
    }

    fn stop_ring(&self) {
        if !self.ringing.swap(false, Ordering::SeqCst) {
            return;
        }
        debug!("Ring stopped");
        if let Ok(mut slot) = self.ring_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }

    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::DecisionAcknowledged { ok: true, .. } => info!(%notice, "Decision acknowledged"),
            _ => warn!(%notice, "Decision not applied"),
        }
        println!("» {}", notice);
    }
}

impl Drop for TerminalAlerts {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.ring_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}
