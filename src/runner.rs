//! Long-polling loop.
//!
//! Updates are fetched in batches and each one is handled on its own
//! task. Updates from the same user are chained so they are handled one
//! at a time and in arrival order; different users proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, error, info, warn};

use crate::commands::BotHandler;
use crate::telegram::{MembershipCheck, Messenger, TelegramError, Update, UpdateSource};

/// Messages that can be sent to the runner.
#[derive(Debug, Clone)]
pub enum RunnerMessage {
    /// Stop polling and wait for in-flight updates.
    Shutdown,
}

/// Polls for updates and feeds them to a [`BotHandler`].
pub struct BotRunner<S, M, C> {
    source: S,
    handler: Arc<BotHandler<M, C>>,

    /// How often expired sessions are dropped.
    sweep_interval: Duration,

    /// Pause after a failed poll.
    retry_delay: Duration,
}

impl<S, M, C> BotRunner<S, M, C>
where
    S: UpdateSource,
    M: Messenger,
    C: MembershipCheck,
{
    #[must_use]
    pub const fn new(source: S, handler: Arc<BotHandler<M, C>>) -> Self {
        Self {
            source,
            handler,
            sweep_interval: Duration::from_secs(600),
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Sets how often expired sessions are swept.
    #[must_use]
    pub const fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the pause after a failed poll.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Runs until [`RunnerMessage::Shutdown`] arrives or the sender is dropped.
    pub async fn run(&self, mut rx: mpsc::Receiver<RunnerMessage>) {
        info!("Bot runner started");

        let mut offset = 0;
        let mut lanes: HashMap<i64, JoinHandle<()>> = HashMap::new();
        let mut sweep_timer = interval(self.sweep_interval);
        sweep_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Kept across iterations so a sweep never cuts a long poll short.
        let poll = self.source.next_batch(offset);
        tokio::pin!(poll);

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(RunnerMessage::Shutdown) | None => {
                            info!("Runner shutting down");
                            break;
                        }
                    }
                }
                _ = sweep_timer.tick() => {
                    self.handler.sessions().sweep_expired().await;
                    lanes.retain(|_, handle| !handle.is_finished());
                }
                batch = &mut poll => {
                    match batch {
                        Ok(updates) => {
                            if !updates.is_empty() {
                                debug!("Received {} updates", updates.len());
                            }
                            for update in updates {
                                offset = offset.max(update.update_id + 1);
                                self.dispatch(update, &mut lanes);
                            }
                        }
                        Err(TelegramError::FloodWait(seconds)) => {
                            warn!("Flood wait while polling: {} seconds", seconds);
                            sleep(Duration::from_secs(u64::from(seconds))).await;
                        }
                        Err(e) => {
                            error!("Failed to fetch updates: {}", e);
                            sleep(self.retry_delay).await;
                        }
                    }
                    poll.set(self.source.next_batch(offset));
                }
            }
        }

        let pending = lanes.len();
        for (_, handle) in lanes.drain() {
            if let Err(e) = handle.await {
                error!("Update task failed: {}", e);
            }
        }
        debug!("Drained {} update lanes", pending);
    }

    /// Spawns handling of `update` behind the previous update of the same user.
    fn dispatch(&self, update: Update, lanes: &mut HashMap<i64, JoinHandle<()>>) {
        let lane = update.sender_id().unwrap_or_default();
        let previous = lanes.remove(&lane);
        let handler = Arc::clone(&self.handler);

        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    error!("Previous update of {} failed: {}", lane, e);
                }
            }
            handler.handle_update(update).await;
        });
        lanes.insert(lane, handle);
    }
}

impl<S, M, C> std::fmt::Debug for BotRunner<S, M, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotRunner")
            .field("sweep_interval", &self.sweep_interval)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::config::{BotConfig, BotSettings};
    use crate::store::SqliteStore;
    use crate::telegram::types::{Chat, Message, User};
    use crate::testing::{RecordingMessenger, ScriptedChecker};

    /// Hands out scripted batches, then polls forever.
    #[derive(Default)]
    struct ScriptedSource {
        batches: Mutex<VecDeque<Result<Vec<Update>, TelegramError>>>,
        offsets: Mutex<Vec<i64>>,
    }

    impl ScriptedSource {
        fn push(&self, batch: Result<Vec<Update>, TelegramError>) {
            self.batches.lock().unwrap().push_back(batch);
        }

        fn offsets(&self) -> Vec<i64> {
            self.offsets.lock().unwrap().clone()
        }
    }

    impl UpdateSource for Arc<ScriptedSource> {
        async fn next_batch(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
            self.offsets.lock().unwrap().push(offset);
            let next = self.batches.lock().unwrap().pop_front();
            match next {
                Some(batch) => batch,
                None => std::future::pending().await,
            }
        }
    }

    fn text_update(update_id: i64, user: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(Message {
                message_id: update_id,
                chat: Chat { id: user },
                from: Some(User {
                    id: user,
                    ..User::default()
                }),
                text: Some(text.to_owned()),
                ..Message::default()
            }),
            callback_query: None,
        }
    }

    async fn runner(
        source: &Arc<ScriptedSource>,
    ) -> (
        BotRunner<Arc<ScriptedSource>, RecordingMessenger, ScriptedChecker>,
        Arc<RecordingMessenger>,
    ) {
        let store = SqliteStore::in_memory().await.unwrap();
        let messenger = Arc::new(RecordingMessenger::new());
        let handler = BotHandler::new(
            store,
            Arc::new(BotConfig::example()),
            Arc::clone(&messenger),
            Arc::new(ScriptedChecker::new()),
            &BotSettings::default(),
        );
        let runner = BotRunner::new(Arc::clone(source), Arc::new(handler))
            .with_retry_delay(Duration::from_millis(1));
        (runner, messenger)
    }

    async fn wait_for_polls(source: &ScriptedSource, count: usize) {
        while source.offsets().len() < count {
            sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_updates_handled_in_order_and_offset_advances() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(vec![
            text_update(5, 42, "/start"),
            text_update(6, 42, crate::commands::MY_TASKS_LABEL),
        ]));
        let (runner, messenger) = runner(&source).await;

        let (tx, rx) = mpsc::channel(4);
        let run = tokio::spawn(async move { runner.run(rx).await });

        wait_for_polls(&source, 2).await;
        tx.send(RunnerMessage::Shutdown).await.unwrap();
        run.await.unwrap();

        assert_eq!(source.offsets(), vec![0, 7]);
        let texts = messenger.texts_to(42);
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], BotConfig::example().welcome_message);
        assert!(texts[1].starts_with("There are no tasks available"));
    }

    #[tokio::test]
    async fn test_sweeps_do_not_restart_the_poll() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(vec![text_update(3, 9, "/start")]));
        let (runner, messenger) = runner(&source).await;
        let runner = runner.with_sweep_interval(Duration::from_millis(1));

        let (tx, rx) = mpsc::channel(4);
        let run = tokio::spawn(async move { runner.run(rx).await });

        wait_for_polls(&source, 2).await;
        sleep(Duration::from_millis(30)).await;
        tx.send(RunnerMessage::Shutdown).await.unwrap();
        run.await.unwrap();

        assert_eq!(source.offsets(), vec![0, 4]);
        assert_eq!(messenger.texts_to(9).len(), 1);
    }

    #[tokio::test]
    async fn test_poll_errors_are_retried() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Err(TelegramError::EmptyResult));
        source.push(Ok(vec![text_update(1, 7, "/start")]));
        let (runner, messenger) = runner(&source).await;

        let (tx, rx) = mpsc::channel(4);
        let run = tokio::spawn(async move { runner.run(rx).await });

        wait_for_polls(&source, 3).await;
        drop(tx);
        run.await.unwrap();

        assert_eq!(source.offsets(), vec![0, 0, 2]);
        assert_eq!(messenger.texts_to(7).len(), 1);
    }
}
