use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Deadline-reset quiet timer.
///
/// `poke` arms (or re-arms) a deadline one quiet window from now; the fire
/// channel receives a message only when a deadline passes without being
/// moved. `cancel` disarms any pending fire. The watcher task is aborted on
/// drop so no stray fire can outlive the owner.
pub struct SilenceTimer {
    deadline: Arc<Mutex<Option<Instant>>>,
    notify: Arc<Notify>,
    window: Duration,
    task: JoinHandle<()>,
}

impl SilenceTimer {
    pub fn new(window: Duration) -> (Self, mpsc::Receiver<()>) {
        let deadline: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));
        let notify = Arc::new(Notify::new());
        let (tx, rx) = mpsc::channel(4);

        let task = tokio::spawn(Self::watch(
            Arc::clone(&deadline),
            Arc::clone(&notify),
            tx,
        ));

        (
            Self {
                deadline,
                notify,
                window,
                task,
            },
            rx,
        )
    }

    /// Activity tick: defer the fire by one full quiet window
    pub fn poke(&self) {
        *self.deadline.lock().unwrap() = Some(Instant::now() + self.window);
        self.notify.notify_one();
    }

    /// Disarm; no fire until the next `poke`
    pub fn cancel(&self) {
        *self.deadline.lock().unwrap() = None;
        self.notify.notify_one();
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.lock().unwrap().is_some()
    }

    async fn watch(
        deadline: Arc<Mutex<Option<Instant>>>,
        notify: Arc<Notify>,
        tx: mpsc::Sender<()>,
    ) {
        loop {
            let current = *deadline.lock().unwrap();

            match current {
                None => notify.notified().await,
                Some(at) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(at) => {
                            // Fire only if the deadline was not moved while
                            // we were sleeping
                            let should_fire = {
                                let mut slot = deadline.lock().unwrap();
                                if *slot == Some(at) {
                                    *slot = None;
                                    true
                                } else {
                                    false
                                }
                            };
                            if should_fire && tx.send(()).await.is_err() {
                                return;
                            }
                        }
                        _ = notify.notified() => {
                            // Deadline changed; re-read it
                        }
                    }
                }
            }
        }
    }
}

impl Drop for SilenceTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
