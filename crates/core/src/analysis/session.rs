//! Per-run state for the presentation layer: watchlist, run state, last results.
//!
//! A run moves `Idle -> Running -> Complete | Failed`; either terminal state may start the next
//! run. On failure the previous successful results stay visible and the error is kept alongside.

use crate::analysis::{AnalysisResult, Analyzer, BatchAnalysisError};
use crate::domain::snapshot::normalize_ticker;
use crate::domain::watchlist::{Watchlist, WatchlistError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RunState {
    #[default]
    Idle,
    Running {
        run_id: Uuid,
        started_at: DateTime<Utc>,
        tickers: usize,
    },
    Complete {
        run_id: Uuid,
        finished_at: DateTime<Utc>,
    },
    Failed {
        run_id: Uuid,
        finished_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFailure {
    pub run_id: Uuid,
    pub ticker: Option<String>,
    pub message: String,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct RunTicket {
    pub run_id: Uuid,
    pub tickers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("an analysis run is already in progress ({0})")]
    AlreadyRunning(Uuid),

    #[error("watchlist is empty")]
    EmptyWatchlist,

    #[error("run {0} is not the active run")]
    UnknownRun(Uuid),
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Batch(#[from] BatchAnalysisError),

    #[error("analysis run {run_id} stopped before finishing: {detail}")]
    Aborted { run_id: Uuid, detail: String },
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisSession {
    watchlist: Watchlist,
    state: RunState,
    results: Vec<AnalysisResult>,
    last_error: Option<RunFailure>,
}

impl AnalysisSession {
    pub fn new(watchlist: Watchlist) -> Self {
        Self {
            watchlist,
            ..Self::default()
        }
    }

    pub fn watchlist(&self) -> &Watchlist {
        &self.watchlist
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn results(&self) -> &[AnalysisResult] {
        &self.results
    }

    pub fn last_error(&self) -> Option<&RunFailure> {
        self.last_error.as_ref()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running { .. })
    }

    pub fn add_ticker(&mut self, raw: &str) -> Result<String, WatchlistError> {
        self.watchlist.add(raw)
    }

    /// Removes the ticker and discards its result card, if any.
    pub fn remove_ticker(&mut self, raw: &str) -> bool {
        let removed = self.watchlist.remove(raw);
        if removed {
            let ticker = normalize_ticker(raw);
            self.results.retain(|r| r.snapshot.ticker() != ticker);
        }
        removed
    }

    pub fn begin_run(&mut self) -> Result<RunTicket, SessionError> {
        if let RunState::Running { run_id, .. } = self.state {
            return Err(SessionError::AlreadyRunning(run_id));
        }
        if self.watchlist.is_empty() {
            return Err(SessionError::EmptyWatchlist);
        }

        let ticket = RunTicket {
            run_id: Uuid::new_v4(),
            tickers: self.watchlist.tickers().to_vec(),
        };
        self.state = RunState::Running {
            run_id: ticket.run_id,
            started_at: Utc::now(),
            tickers: ticket.tickers.len(),
        };
        tracing::info!(run_id = %ticket.run_id, tickers = ticket.tickers.len(), "analysis run started");
        Ok(ticket)
    }

    pub fn finish_run(
        &mut self,
        run_id: Uuid,
        outcome: &Result<Vec<AnalysisResult>, BatchAnalysisError>,
    ) -> Result<(), SessionError> {
        match self.state {
            RunState::Running { run_id: active, .. } if active == run_id => {}
            _ => return Err(SessionError::UnknownRun(run_id)),
        }

        let finished_at = Utc::now();
        match outcome {
            Ok(results) => {
                // Tickers removed while the run was in flight do not get a card.
                self.results = results
                    .iter()
                    .filter(|r| self.watchlist.contains(r.snapshot.ticker()))
                    .cloned()
                    .collect();
                self.last_error = None;
                self.state = RunState::Complete {
                    run_id,
                    finished_at,
                };
            }
            Err(err) => {
                self.last_error = Some(RunFailure {
                    run_id,
                    ticker: err.ticker().map(str::to_string),
                    message: err.user_message(),
                    detail: err.to_string(),
                });
                self.state = RunState::Failed {
                    run_id,
                    finished_at,
                };
            }
        }
        Ok(())
    }

    /// Marks the active run as failed when it ended without an outcome.
    pub fn abort_run(&mut self, run_id: Uuid, detail: &str) -> Result<(), SessionError> {
        match self.state {
            RunState::Running { run_id: active, .. } if active == run_id => {}
            _ => return Err(SessionError::UnknownRun(run_id)),
        }
        tracing::error!(%run_id, %detail, "analysis run aborted");
        self.last_error = Some(RunFailure {
            run_id,
            ticker: None,
            message: "The analysis run stopped unexpectedly.".to_string(),
            detail: detail.to_string(),
        });
        self.state = RunState::Failed {
            run_id,
            finished_at: Utc::now(),
        };
        Ok(())
    }
}

/// Runs one analysis over the session's watchlist without holding the lock across network calls.
///
/// The batch runs on its own task and records its outcome there, so the session leaves
/// `Running` even if the caller stops waiting.
pub async fn run_analysis(
    session: &Arc<Mutex<AnalysisSession>>,
    analyzer: &Analyzer,
) -> Result<Vec<AnalysisResult>, RunError> {
    let ticket = session.lock().await.begin_run()?;
    let run_id = ticket.run_id;

    let task_session = Arc::clone(session);
    let analyzer = analyzer.clone();
    let handle = tokio::spawn(async move {
        let outcome = analyzer.analyze(&ticket.tickers).await;
        task_session.lock().await.finish_run(ticket.run_id, &outcome)?;
        Ok::<_, RunError>(outcome?)
    });

    match handle.await {
        Ok(result) => result,
        Err(join_err) => {
            let detail = join_err.to_string();
            session.lock().await.abort_run(run_id, &detail)?;
            Err(RunError::Aborted { run_id, detail })
        }
    }
}
