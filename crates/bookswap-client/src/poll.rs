use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use bookswap_types::models::{Message, Notification};

use crate::api::ApiClient;
use crate::error::ClientError;

pub const NOTIFICATION_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const CHAT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A background task that re-fetches `T` on a fixed period and publishes
/// each result as the latest snapshot. Dropping the poller stops it.
pub struct Poller<T> {
    snapshot: watch::Receiver<T>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<T> Poller<T> {
    /// A receiver that observes every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.snapshot.clone()
    }

    pub fn latest(&self) -> T
    where
        T: Clone,
    {
        self.snapshot.borrow().clone()
    }

    /// Wait for the next successful poll. `false` once the poller has stopped.
    pub async fn changed(&mut self) -> bool {
        self.snapshot.changed().await.is_ok()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Cancel and wait for the task to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Run `fetch` immediately and then every `period` until cancelled.
///
/// A failed fetch is logged and the previous snapshot stays in place.
pub fn spawn_poller<T, F, Fut>(
    name: &'static str,
    period: Duration,
    initial: T,
    mut fetch: F,
) -> Poller<T>
where
    T: Send + Sync + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ClientError>> + Send,
{
    let (tx, rx) = watch::channel(initial);
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = fetch() => result,
            };

            match result {
                Ok(value) => {
                    if tx.send(value).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("{} poll failed: {}", name, e),
            }
        }
        debug!("{} poller stopped", name);
    });

    Poller {
        snapshot: rx,
        cancel,
        task: Some(task),
    }
}

/// Keeps the caller's notifications fresh while a session is active.
pub fn notification_poller(client: ApiClient) -> Poller<Vec<Notification>> {
    spawn_poller(
        "notification",
        NOTIFICATION_POLL_INTERVAL,
        Vec::new(),
        move || {
            let client = client.clone();
            async move { client.notifications().await }
        },
    )
}

/// Keeps one chat thread fresh while its view is open.
pub fn chat_poller(client: ApiClient, product_id: Uuid) -> Poller<Vec<Message>> {
    spawn_poller("chat", CHAT_POLL_INTERVAL, Vec::new(), move || {
        let client = client.clone();
        async move { client.messages(product_id).await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FAST: Duration = Duration::from_millis(10);

    fn counting() -> (Arc<AtomicUsize>, impl FnMut() -> std::future::Ready<Result<usize, ClientError>>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let fetch = move || std::future::ready(Ok(counter.fetch_add(1, Ordering::SeqCst) + 1));
        (calls, fetch)
    }

    #[tokio::test]
    async fn publishes_each_fetch() {
        let (_, fetch) = counting();
        let mut poller = spawn_poller("test", FAST, 0usize, fetch);

        assert!(poller.changed().await);
        assert!(poller.changed().await);
        assert!(poller.latest() >= 2);
    }

    #[tokio::test]
    async fn failures_keep_the_last_snapshot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut poller = spawn_poller("test", FAST, String::new(), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok("first".to_string())
                } else {
                    Err(ClientError::Validation("offline".into()))
                }
            }
        });

        assert!(poller.changed().await);
        tokio::time::sleep(FAST * 5).await;
        assert!(calls.load(Ordering::SeqCst) > 1);
        assert_eq!(poller.latest(), "first");
    }

    #[tokio::test]
    async fn stop_ends_polling() {
        let (calls, fetch) = counting();
        let mut poller = spawn_poller("test", FAST, 0usize, fetch);
        assert!(poller.changed().await);

        let receiver = poller.subscribe();
        poller.stop().await;

        let after_stop = calls.load(Ordering::SeqCst);
        tokio::time::sleep(FAST * 5).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_stop);
        assert!(receiver.has_changed().is_err());
    }

    #[tokio::test]
    async fn dropping_cancels() {
        let (calls, fetch) = counting();
        let mut poller = spawn_poller("test", FAST, 0usize, fetch);
        assert!(poller.changed().await);
        let mut receiver = poller.subscribe();
        drop(poller);

        // The sender goes away with the task.
        while receiver.changed().await.is_ok() {}
        let settled = calls.load(Ordering::SeqCst);
        tokio::time::sleep(FAST * 5).await;
        assert_eq!(calls.load(Ordering::SeqCst), settled);
    }
}
