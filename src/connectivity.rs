//! Online/offline detection with verified transitions.
//!
//! System offline events are trusted outright; system online events are only
//! believed after a lightweight probe confirms the network actually carries
//! traffic (captive portals and VPNs report online without doing so).

use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;
use url::Url;

/// Hard cap on how long a probe may take before it counts as offline.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Reachability check behind the monitor.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
  /// Resolves `false` on any transport error or timeout; never errors.
  async fn check(&self) -> bool;
}

/// Probe that issues a cache-bypassing HEAD request against a lightweight
/// endpoint of the backend. Any HTTP response counts as reachable; only
/// transport failures and the timeout count as offline.
pub struct HttpProbe {
  http: reqwest::Client,
  url: Url,
  timeout: Duration,
}

impl HttpProbe {
  pub fn new(url: Url) -> Self {
    Self {
      http: reqwest::Client::new(),
      url,
      timeout: DEFAULT_PROBE_TIMEOUT,
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
  async fn check(&self) -> bool {
    let request = self
      .http
      .head(self.url.clone())
      .header(CACHE_CONTROL, "no-cache")
      .send();

    // Dropping the request on timeout aborts it
    matches!(tokio::time::timeout(self.timeout, request).await, Ok(Ok(_)))
  }
}

/// Tracks whether the remote is reachable.
///
/// Starts optimistic so a page load never flashes an offline banner before
/// the first verification. `was_offline` stays set once any offline period
/// was observed, until a caller consumes it with `take_was_offline`.
pub struct ConnectivityMonitor {
  online: watch::Sender<bool>,
  was_offline: AtomicBool,
  probe: Arc<dyn ConnectivityProbe>,
}

impl ConnectivityMonitor {
  pub fn new(probe: Arc<dyn ConnectivityProbe>) -> Self {
    let (online, _) = watch::channel(true);
    Self {
      online,
      was_offline: AtomicBool::new(false),
      probe,
    }
  }

  pub fn is_online(&self) -> bool {
    *self.online.borrow()
  }

  /// Watch channel observing every online/offline transition.
  pub fn subscribe(&self) -> watch::Receiver<bool> {
    self.online.subscribe()
  }

  /// True once any offline period has been observed.
  pub fn was_offline(&self) -> bool {
    self.was_offline.load(Ordering::SeqCst)
  }

  /// Read and reset the sticky offline flag.
  pub fn take_was_offline(&self) -> bool {
    self.was_offline.swap(false, Ordering::SeqCst)
  }

  /// The system reported the network interface down. Trusted outright; the
  /// OS does not raise this spuriously.
  pub fn system_offline(&self) {
    debug!("system reported offline");
    self.set_state(false);
  }

  /// The system reported the network back. Flip online immediately for
  /// responsiveness, then verify; revert if the probe fails or times out.
  pub async fn system_online(&self) {
    debug!("system reported online, verifying");
    self.set_state(true);

    if !self.probe.check().await {
      debug!("probe failed, reverting to offline");
      self.set_state(false);
    }
  }

  /// Establish the initial state. An offline report is trusted without a
  /// probe; an online report is verified once before callers may assume
  /// connectivity.
  pub async fn verify_initial(&self, system_reports_online: bool) {
    if !system_reports_online {
      self.set_state(false);
      return;
    }

    let reachable = self.probe.check().await;
    self.set_state(reachable);
  }

  fn set_state(&self, online: bool) {
    if !online {
      self.was_offline.store(true, Ordering::SeqCst);
    }

    // Only notify watchers on actual transitions
    self.online.send_if_modified(|current| {
      if *current != online {
        *current = online;
        true
      } else {
        false
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;
  use tokio::sync::Semaphore;

  struct FakeProbe {
    result: AtomicBool,
    calls: AtomicUsize,
  }

  impl FakeProbe {
    fn returning(result: bool) -> Arc<Self> {
      Arc::new(Self {
        result: AtomicBool::new(result),
        calls: AtomicUsize::new(0),
      })
    }
  }

  #[async_trait]
  impl ConnectivityProbe for FakeProbe {
    async fn check(&self) -> bool {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.result.load(Ordering::SeqCst)
    }
  }

  /// Probe that blocks until the test releases it, so transitions around an
  /// in-flight probe can be observed deterministically.
  struct GatedProbe {
    gate: Semaphore,
    result: bool,
  }

  #[async_trait]
  impl ConnectivityProbe for GatedProbe {
    async fn check(&self) -> bool {
      let _permit = self.gate.acquire().await.unwrap();
      self.result
    }
  }

  #[test]
  fn test_starts_optimistic() {
    let monitor = ConnectivityMonitor::new(FakeProbe::returning(true));
    assert!(monitor.is_online());
    assert!(!monitor.was_offline());
  }

  #[test]
  fn test_offline_event_trusted_without_probe() {
    let probe = FakeProbe::returning(true);
    let monitor = ConnectivityMonitor::new(probe.clone());

    monitor.system_offline();

    assert!(!monitor.is_online());
    assert!(monitor.was_offline());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_online_event_verified_by_probe() {
    let probe = FakeProbe::returning(true);
    let monitor = ConnectivityMonitor::new(probe.clone());

    monitor.system_offline();
    monitor.system_online().await;

    assert!(monitor.is_online());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_online_event_reverts_when_probe_fails() {
    let probe = FakeProbe::returning(false);
    let monitor = ConnectivityMonitor::new(probe.clone());

    monitor.system_offline();
    monitor.system_online().await;

    assert!(!monitor.is_online());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_online_flip_is_immediate_before_probe_resolves() {
    let probe = Arc::new(GatedProbe {
      gate: Semaphore::new(0),
      result: false,
    });
    let monitor = Arc::new(ConnectivityMonitor::new(
      probe.clone() as Arc<dyn ConnectivityProbe>
    ));

    monitor.system_offline();
    let mut rx = monitor.subscribe();
    rx.borrow_and_update();

    let pending = tokio::spawn({
      let monitor = monitor.clone();
      async move { monitor.system_online().await }
    });

    // The optimistic flip lands while the probe is still held
    rx.changed().await.unwrap();
    assert!(*rx.borrow_and_update());

    probe.gate.add_permits(1);
    pending.await.unwrap();

    assert!(!monitor.is_online());
  }

  #[tokio::test]
  async fn test_initial_offline_trusted_without_probe() {
    let probe = FakeProbe::returning(true);
    let monitor = ConnectivityMonitor::new(probe.clone());

    monitor.verify_initial(false).await;

    assert!(!monitor.is_online());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_initial_online_runs_one_probe() {
    let probe = FakeProbe::returning(true);
    let monitor = ConnectivityMonitor::new(probe.clone());

    monitor.verify_initial(true).await;

    assert!(monitor.is_online());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_initial_online_with_failing_probe_goes_offline() {
    let monitor = ConnectivityMonitor::new(FakeProbe::returning(false));

    monitor.verify_initial(true).await;

    assert!(!monitor.is_online());
    assert!(monitor.was_offline());
  }

  #[tokio::test]
  async fn test_take_was_offline_resets_flag() {
    let monitor = ConnectivityMonitor::new(FakeProbe::returning(true));

    monitor.system_offline();
    monitor.system_online().await;

    assert!(monitor.take_was_offline());
    assert!(!monitor.take_was_offline());
  }
}
