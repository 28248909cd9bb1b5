//! Poll-based update stream for individual words.
//!
//! The cache layer never subscribes to anything; callers who want to see
//! out-of-band changes (another visitor liking a word) drain this stream and
//! reconcile their displayed state.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::client::WordsClient;

/// An out-of-band change to a watched word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordEvent {
  LikesChanged { id: String, likes: u32 },
}

/// Handle for a running watch. Dropping it (or calling `unsubscribe`)
/// cancels the polling task.
pub struct Subscription {
  rx: mpsc::UnboundedReceiver<WordEvent>,
  task: JoinHandle<()>,
}

impl Subscription {
  /// Wait for the next event. Returns `None` once the watch has stopped.
  pub async fn recv(&mut self) -> Option<WordEvent> {
    self.rx.recv().await
  }

  /// Stop the watch.
  pub fn unsubscribe(self) {
    self.task.abort();
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.task.abort();
  }
}

/// Watch a word's like count, emitting an event whenever it changes.
///
/// The first successful poll establishes the baseline; only subsequent
/// changes are emitted. Poll failures are logged and retried on the next
/// tick.
pub fn watch_likes(client: WordsClient, id: String, interval: Duration) -> Subscription {
  let (tx, rx) = mpsc::unbounded_channel();

  let task = tokio::spawn(async move {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_likes: Option<u32> = None;

    loop {
      ticker.tick().await;

      match client.get_word(&id).await {
        Ok(entry) => {
          if last_likes.is_some() && last_likes != Some(entry.likes) {
            let event = WordEvent::LikesChanged {
              id: id.clone(),
              likes: entry.likes,
            };
            if tx.send(event).is_err() {
              // Receiver dropped, stop polling
              break;
            }
          }
          last_likes = Some(entry.likes);
        }
        Err(err) => debug!(word = %id, error = %err, "watch poll failed"),
      }
    }
  });

  Subscription { rx, task }
}
