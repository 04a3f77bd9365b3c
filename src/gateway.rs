use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use chrono::Local;

use crate::db::{ScoreDb, SessionRow};
use crate::notice::Notice;

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Durable score store behind the recorder. The sqlite-backed impl is
/// production; tests swap in fakes to observe or fail saves.
pub trait ScoreStore: Send + 'static {
    fn resolve_game_id(&self, title: &str) -> Result<Option<String>, StoreError>;
    fn insert_session(&self, row: &SessionRow) -> Result<(), StoreError>;
}

impl ScoreStore for ScoreDb {
    fn resolve_game_id(&self, title: &str) -> Result<Option<String>, StoreError> {
        Ok(ScoreDb::resolve_game_id(self, title)?)
    }

    fn insert_session(&self, row: &SessionRow) -> Result<(), StoreError> {
        Ok(ScoreDb::insert_session(self, row)?)
    }
}

#[derive(Debug)]
struct SaveRequest {
    title: String,
    user_id: String,
    score: i64,
    duration: i64,
}

/// Fire-and-forget score recorder. Gameplay submits and moves on; a worker
/// thread resolves the game id (cached per title), writes the row, and routes
/// every outcome to the notices channel instead of the caller's stack.
#[derive(Debug)]
pub struct Recorder {
    tx: Option<Sender<SaveRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl Recorder {
    pub fn spawn(store: impl ScoreStore, notices: Sender<Notice>) -> Self {
        let (tx, rx) = mpsc::channel::<SaveRequest>();

        let worker = thread::spawn(move || {
            let mut resolved: HashMap<String, String> = HashMap::new();
            // Unresolvable titles notify once per session, not per round
            let mut unresolvable: HashSet<String> = HashSet::new();

            while let Ok(req) = rx.recv() {
                if unresolvable.contains(&req.title) {
                    continue;
                }

                let game_id = match resolved.get(&req.title) {
                    Some(id) => id.clone(),
                    None => match store.resolve_game_id(&req.title) {
                        Ok(Some(id)) => {
                            resolved.insert(req.title.clone(), id.clone());
                            id
                        }
                        Ok(None) => {
                            unresolvable.insert(req.title.clone());
                            let _ = notices
                                .send(Notice::error(format!("Game not found: {}", req.title)));
                            continue;
                        }
                        Err(e) => {
                            let _ = notices
                                .send(Notice::error(format!("Failed to save score: {}", e)));
                            continue;
                        }
                    },
                };

                let row = SessionRow {
                    user_id: req.user_id,
                    game_id,
                    score: req.score,
                    duration: req.duration,
                    timestamp: Local::now(),
                };

                match store.insert_session(&row) {
                    Ok(()) => {
                        let _ = notices.send(Notice::info("Score saved"));
                    }
                    Err(e) => {
                        let _ =
                            notices.send(Notice::error(format!("Failed to save score: {}", e)));
                    }
                }
            }
        });

        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Queue one save. Guest mode (no user) skips the save entirely; the
    /// call never blocks and never reports back to the gameplay path.
    pub fn submit(&self, title: &str, user_id: Option<&str>, score: i64, duration: i64) {
        let Some(user_id) = user_id else { return };
        if let Some(tx) = &self.tx {
            let _ = tx.send(SaveRequest {
                title: title.to_string(),
                user_id: user_id.to_string(),
                score,
                duration,
            });
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        // Close the channel so the worker drains pending saves and exits
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
