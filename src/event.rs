use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::DiaryApi;

/// Connectivity events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
  /// Backend became reachable
  Online,
  /// Backend stopped answering
  Offline,
}

/// Event handler that turns periodic health probes into connectivity transitions
pub struct ConnectivityWatcher {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl ConnectivityWatcher {
  /// Probe `api` every `probe_interval`, starting from `online`.
  ///
  /// Only transitions are reported, never repeats of the current state.
  pub fn spawn<A: DiaryApi + 'static>(api: A, probe_interval: Duration, online: bool) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
      let mut online = online;
      let mut ticker = tokio::time::interval(probe_interval);
      loop {
        ticker.tick().await;

        let reachable = match api.health().await {
          Ok(status) => {
            debug!(status = %status, "Health probe answered");
            true
          }
          Err(e) => {
            debug!(error = %e, "Health probe failed");
            false
          }
        };

        if reachable == online {
          continue;
        }
        online = reachable;
        let event = if online { Event::Online } else { Event::Offline };
        info!(?event, "Connectivity changed");
        if tx.send(event).is_err() {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next transition
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::FakeApi;
  use std::sync::Arc;

  #[tokio::test]
  async fn test_reports_only_transitions() {
    let api = Arc::new(FakeApi::new(false));
    let mut watcher = ConnectivityWatcher::spawn(api.clone(), Duration::from_millis(5), false);

    // Let a few failing probes pass without events
    tokio::time::sleep(Duration::from_millis(30)).await;
    api.set_online(true);
    assert_eq!(watcher.next().await, Some(Event::Online));

    api.set_online(false);
    assert_eq!(watcher.next().await, Some(Event::Offline));
    assert!(api.health_checks.load(std::sync::atomic::Ordering::SeqCst) >= 3);
  }
}
