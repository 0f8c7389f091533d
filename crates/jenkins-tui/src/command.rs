//! Deferred work returned by components.
//!
//! A [`Command`] is a bundle of futures that each resolve to an [`Action`].
//! Components never spawn tasks themselves: they hand commands back to the
//! app loop, which spawns them and feeds the resulting actions back in.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tokio::sync::mpsc::UnboundedSender;

use jenkins_api::Error;

use crate::action::{Action, ApiResult};

/// Upper bound on any single background fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

type SettledHook = Box<dyn FnOnce() + Send>;

#[must_use]
#[derive(Default)]
pub struct Command {
    tasks: Vec<BoxFuture<'static, Action>>,
    on_settled: Option<SettledHook>,
}

impl Command {
    pub fn none() -> Self {
        Self::default()
    }

    /// Run `fut` in the background and dispatch its action.
    pub fn perform<F>(fut: F) -> Self
    where
        F: Future<Output = Action> + Send + 'static,
    {
        Self {
            tasks: vec![fut.boxed()],
            on_settled: None,
        }
    }

    /// Dispatch `action` on the next loop iteration.
    pub fn message(action: Action) -> Self {
        Self::perform(async move { action })
    }

    /// Merge several commands into one; all their tasks run concurrently.
    pub fn batch(commands: impl IntoIterator<Item = Command>) -> Self {
        let mut tasks = Vec::new();
        let mut hooks: Vec<SettledHook> = Vec::new();
        for cmd in commands {
            tasks.extend(cmd.tasks);
            hooks.extend(cmd.on_settled);
        }
        let on_settled: Option<SettledHook> = if hooks.is_empty() {
            None
        } else {
            Some(Box::new(move || hooks.into_iter().for_each(|hook| hook())))
        };
        Self { tasks, on_settled }
    }

    /// Call `hook` once every task has finished and its action was sent.
    /// An empty command settles immediately when spawned.
    pub fn on_settled(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_settled = Some(Box::new(hook));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Spawn the tasks onto the runtime; each sends its action on `tx`.
    pub fn spawn(self, tx: &UnboundedSender<Action>) {
        let Self { tasks, on_settled } = self;
        match on_settled {
            None => {
                for task in tasks {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let _ = tx.send(task.await);
                    });
                }
            }
            Some(hook) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    join_all(tasks.into_iter().map(|task| {
                        let tx = tx.clone();
                        async move {
                            let _ = tx.send(task.await);
                        }
                    }))
                    .await;
                    hook();
                });
            }
        }
    }

    /// Await every task in place and return the actions in completion
    /// order. Test-only: production code goes through [`Command::spawn`].
    #[cfg(test)]
    pub async fn resolve(self) -> Vec<Action> {
        let actions = join_all(self.tasks).await;
        if let Some(hook) = self.on_settled {
            hook();
        }
        actions
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("tasks", &self.tasks.len())
            .field("on_settled", &self.on_settled.is_some())
            .finish()
    }
}

/// Await an API call under [`FETCH_TIMEOUT`], sharing the error.
pub async fn fetch<T>(fut: impl Future<Output = Result<T, Error>>) -> ApiResult<T> {
    match tokio::time::timeout(FETCH_TIMEOUT, fut).await {
        Ok(result) => result.map_err(Arc::new),
        Err(_) => Err(Arc::new(Error::Timeout {
            timeout_secs: FETCH_TIMEOUT.as_secs(),
        })),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn batch_keeps_every_task() {
        let cmd = Command::batch([
            Command::message(Action::Tick),
            Command::none(),
            Command::message(Action::Render),
        ]);
        assert_eq!(cmd.len(), 2);
        let actions = cmd.resolve().await;
        assert!(matches!(actions[0], Action::Tick));
        assert!(matches!(actions[1], Action::Render));
    }

    #[tokio::test]
    async fn settled_hook_runs_after_all_actions_are_sent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let cmd = Command::batch([
            Command::message(Action::Tick),
            Command::perform(async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Action::Render
            }),
        ])
        .on_settled(move || {
            let _ = done_tx.send(());
        });
        cmd.spawn(&tx);

        assert!(done_rx.await.is_ok());
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 2);
    }

    #[tokio::test]
    async fn empty_command_settles_immediately() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let calls = Arc::new(AtomicUsize::new(0));
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let counter = Arc::clone(&calls);
        Command::none()
            .on_settled(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            })
            .spawn(&tx);
        assert!(done_rx.await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_times_out() {
        let result: ApiResult<()> = fetch(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        let err = result.unwrap_err();
        assert!(matches!(*err, Error::Timeout { timeout_secs: 30 }));
    }
}
