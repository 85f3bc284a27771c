//! Keep-alive task: periodically pings the service's own `/api/ping`.
//!
//! Hosting platforms that idle a service without traffic keep it warm this
//! way. Each ping carries `X-Keep-Alive: true` so the ping handler does not
//! log it as a manual hit. Failures are logged and the loop continues.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::endpoints::ping::KEEP_ALIVE_HEADER;
use crate::config::KeepAliveConfig;

/// Upper bound for a single ping request.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle for the running keep-alive task.
///
/// `stop()` cancels the loop and waits for it; dropping the handle only
/// signals cancellation.
pub struct KeepAliveHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl KeepAliveHandle {
    /// Request cancellation without waiting.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Cancel the loop and wait until it has exited.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("Keep-alive task failed: {e}");
            }
        }
    }
}

impl Drop for KeepAliveHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the keep-alive loop. The first ping is sent after one interval.
pub fn start_keep_alive(config: KeepAliveConfig, client: reqwest::Client) -> KeepAliveHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let url = config.ping_url();
    let period = config.interval;

    let task = tokio::spawn(async move {
        tracing::info!(url = %url, interval_secs = period.as_secs(), "Keep-alive started");

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => ping_once(&client, &url).await,
            }
        }

        tracing::info!("Keep-alive stopped");
    });

    KeepAliveHandle {
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    }
}

async fn ping_once(client: &reqwest::Client, url: &str) {
    let result = client
        .get(url)
        .header(KEEP_ALIVE_HEADER, "true")
        .timeout(PING_TIMEOUT)
        .send()
        .await;

    match result {
        Ok(resp) if resp.status().is_success() => {
            tracing::debug!(status = %resp.status(), "Keep-alive ping ok");
        }
        Ok(resp) => {
            tracing::warn!(status = %resp.status(), "Keep-alive ping rejected");
        }
        Err(e) => {
            tracing::warn!("Keep-alive ping failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::Router;

    /// Minimal server counting pings that carry the keep-alive header.
    async fn counting_server() -> (String, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let marked = Arc::new(AtomicUsize::new(0));
        let unmarked = Arc::new(AtomicUsize::new(0));
        let (m, u) = (marked.clone(), unmarked.clone());

        let app = Router::new().route(
            "/api/ping",
            get(move |headers: HeaderMap| {
                let (m, u) = (m.clone(), u.clone());
                async move {
                    if headers.get(KEEP_ALIVE_HEADER).is_some_and(|v| v == "true") {
                        m.fetch_add(1, Ordering::SeqCst);
                    } else {
                        u.fetch_add(1, Ordering::SeqCst);
                    }
                    "ok"
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), marked, unmarked)
    }

    fn config(base_url: String, millis: u64) -> KeepAliveConfig {
        KeepAliveConfig {
            base_url,
            interval: Duration::from_millis(millis),
        }
    }

    #[tokio::test]
    async fn pings_with_keep_alive_header() {
        let (base, marked, unmarked) = counting_server().await;
        let handle = start_keep_alive(config(base, 20), reqwest::Client::new());

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.stop().await;

        assert!(marked.load(Ordering::SeqCst) >= 2);
        assert_eq!(unmarked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stops_pinging_after_stop() {
        let (base, marked, _) = counting_server().await;
        let handle = start_keep_alive(config(base, 20), reqwest::Client::new());

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop().await;
        let after_stop = marked.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(marked.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn unreachable_target_does_not_end_loop() {
        // Port 9 (discard) is not expected to run an HTTP server.
        let handle = start_keep_alive(
            config("http://127.0.0.1:9".into(), 10),
            reqwest::Client::new(),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop().await;
    }
}
