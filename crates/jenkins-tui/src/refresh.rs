//! Auto-refresh scheduler.
//!
//! A background loop emits [`Action::AutoRefreshTick`] every `interval`,
//! but never while the previous refresh is still in flight: after each tick
//! it waits for the app to report that the dispatched fetches settled. The
//! next tick therefore lands at `max(tick + interval, settle)`.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::action::Action;

/// Signals the running loop that the fetches for its last tick finished.
#[derive(Debug)]
pub struct SettleHandle(mpsc::UnboundedSender<()>);

impl SettleHandle {
    pub fn settled(self) {
        let _ = self.0.send(());
    }
}

#[derive(Debug)]
struct Running {
    generation: u64,
    cancel: CancellationToken,
    settle_tx: mpsc::UnboundedSender<()>,
}

#[derive(Debug)]
pub struct RefreshScheduler {
    interval: Duration,
    enabled: bool,
    generation: u64,
    running: Option<Running>,
}

impl RefreshScheduler {
    pub fn new(interval: Duration, enabled: bool) -> Self {
        Self {
            interval,
            enabled,
            generation: 0,
            running: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start (or restart) the loop if auto-refresh is enabled.
    pub fn start(&mut self, tx: mpsc::UnboundedSender<Action>) {
        self.stop();
        if !self.enabled {
            return;
        }
        self.generation += 1;
        let cancel = CancellationToken::new();
        let (settle_tx, settle_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(
            self.interval,
            self.generation,
            tx,
            settle_rx,
            cancel.clone(),
        ));
        debug!(generation = self.generation, interval_secs = self.interval.as_secs(), "auto-refresh started");
        self.running = Some(Running {
            generation: self.generation,
            cancel,
            settle_tx,
        });
    }

    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            debug!(generation = running.generation, "auto-refresh stopped");
        }
    }

    /// Flip auto-refresh on or off. Returns the new state.
    pub fn toggle(&mut self, tx: mpsc::UnboundedSender<Action>) -> bool {
        self.enabled = !self.enabled;
        if self.enabled {
            self.start(tx);
        } else {
            self.stop();
        }
        self.enabled
    }

    /// Settle handle for a tick of `generation`, or `None` when that tick
    /// came from a loop that has since been stopped.
    pub fn settle_handle(&self, generation: u64) -> Option<SettleHandle> {
        self.running
            .as_ref()
            .filter(|r| r.generation == generation)
            .map(|r| SettleHandle(r.settle_tx.clone()))
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    interval: Duration,
    generation: u64,
    tx: mpsc::UnboundedSender<Action>,
    mut settled: mpsc::UnboundedReceiver<()>,
    cancel: CancellationToken,
) {
    let mut next = Instant::now() + interval;
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep_until(next) => {}
        }

        let fired = Instant::now();
        if tx.send(Action::AutoRefreshTick(generation)).is_err() {
            break;
        }

        tokio::select! {
            () = cancel.cancelled() => break,
            signal = settled.recv() => {
                if signal.is_none() {
                    break;
                }
            }
        }
        next = fired + interval;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn next_tick(rx: &mut mpsc::UnboundedReceiver<Action>) -> u64 {
        match rx.recv().await {
            Some(Action::AutoRefreshTick(generation)) => generation,
            other => panic!("expected a refresh tick, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_refresh_delays_next_tick() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = Instant::now();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(10), true);
        scheduler.start(tx);

        let generation = next_tick(&mut rx).await;
        assert_eq!(start.elapsed(), Duration::from_secs(10));

        // The refresh takes 15s.
        let handle = scheduler.settle_handle(generation).unwrap();
        tokio::time::sleep(Duration::from_secs(15)).await;
        handle.settled();

        next_tick(&mut rx).await;
        assert_eq!(start.elapsed(), Duration::from_secs(25));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_refresh_keeps_interval() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = Instant::now();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(10), true);
        scheduler.start(tx);

        let generation = next_tick(&mut rx).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        scheduler.settle_handle(generation).unwrap().settled();

        next_tick(&mut rx).await;
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn no_tick_until_settled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(10), true);
        scheduler.start(tx);

        next_tick(&mut rx).await;
        let waited = tokio::time::timeout(Duration::from_secs(120), rx.recv()).await;
        assert!(waited.is_err(), "ticked without a settle signal");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_loop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(10), true);
        scheduler.start(tx);
        scheduler.stop();
        assert!(!scheduler.is_running());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_restarts_with_new_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(10), true);
        scheduler.start(tx.clone());
        let first = next_tick(&mut rx).await;

        assert!(!scheduler.toggle(tx.clone()));
        assert!(scheduler.settle_handle(first).is_none());
        assert!(scheduler.toggle(tx));

        let second = next_tick(&mut rx).await;
        assert!(second > first);
        assert!(scheduler.settle_handle(second).is_some());
        assert!(scheduler.settle_handle(first).is_none());
    }

    #[tokio::test]
    async fn disabled_scheduler_does_not_spawn() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(10), false);
        scheduler.start(tx);
        assert!(!scheduler.is_running());
        assert!(!scheduler.is_enabled());
    }
}
