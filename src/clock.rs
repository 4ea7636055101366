//! Display clock: a background task publishing wall-clock time once per period.
//! It shares nothing with session state.

use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Spawn the ticker. The task stops once every receiver is dropped.
pub fn spawn_clock(period: Duration) -> watch::Receiver<DateTime<Local>> {
  let (tx, rx) = watch::channel(Local::now());
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
      ticker.tick().await;
      if tx.send(Local::now()).is_err() {
        debug!(target: "code_loom", "Clock has no readers; stopping");
        break;
      }
    }
  });
  rx
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn clock_publishes_advancing_time() {
    let mut rx = spawn_clock(Duration::from_millis(10));
    let first = *rx.borrow_and_update();
    tokio::time::timeout(Duration::from_secs(2), rx.changed())
      .await
      .expect("tick within timeout")
      .expect("sender alive");
    assert!(*rx.borrow() >= first);
  }
}
