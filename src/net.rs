//! Network-availability signal, sampled at the start of each resolve call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A boolean online/offline source.
pub trait NetworkStatus: Send + Sync {
  fn is_online(&self) -> bool;
}

/// Fixed status, decided once (e.g. from a --offline flag).
pub struct StaticStatus {
  online: bool,
}

impl StaticStatus {
  pub fn online() -> Self {
    Self { online: true }
  }

  pub fn offline() -> Self {
    Self { online: false }
  }
}

impl NetworkStatus for StaticStatus {
  fn is_online(&self) -> bool {
    self.online
  }
}

/// Shared mutable status for long-running callers that track connectivity.
#[derive(Clone)]
pub struct SharedStatus {
  online: Arc<AtomicBool>,
}

impl SharedStatus {
  pub fn new(online: bool) -> Self {
    Self {
      online: Arc::new(AtomicBool::new(online)),
    }
  }

  pub fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::Relaxed);
  }
}

impl NetworkStatus for SharedStatus {
  fn is_online(&self) -> bool {
    self.online.load(Ordering::Relaxed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_shared_status_toggles() {
    let status = SharedStatus::new(true);
    let view = status.clone();

    assert!(view.is_online());
    status.set_online(false);
    assert!(!view.is_online());
  }
}
