// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Resolution of the series a recording belongs to
//!
//! Before a form is submitted, the series name entered by the user has to refer to an
//! existing series. [`SeriesResolver::ensure`] looks the series up by title and creates it
//! if it does not exist yet.

use crate::client::{ClientError, SeriesDirectory};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesResolution {
    Unresolved,
    Pending,
    Resolved(String),
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    #[error("series lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("series lookup was cancelled")]
    Cancelled,

    #[error("series title is empty")]
    EmptyTitle,

    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Debug)]
struct State {
    resolution: SeriesResolution,
    title: Option<String>,
    generation: u64,
}

pub struct SeriesResolver {
    directory: Arc<dyn SeriesDirectory>,
    timeout: Duration,
    state: Mutex<State>,
    cancelled: Notify,
}

impl std::fmt::Debug for SeriesResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesResolver")
            .field("timeout", &self.timeout)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl SeriesResolver {
    pub fn new(directory: Arc<dyn SeriesDirectory>, timeout: Duration) -> Self {
        Self {
            directory,
            timeout,
            state: Mutex::new(State {
                resolution: SeriesResolution::Unresolved,
                title: None,
                generation: 0,
            }),
            cancelled: Notify::new(),
        }
    }

    pub fn resolution(&self) -> SeriesResolution {
        self.state.lock().resolution.clone()
    }

    /// Returns the id of the series titled `title`, creating the series if necessary
    ///
    /// A series resolved earlier for the same title is reused without another request.
    pub async fn ensure(&self, title: &str) -> Result<String, SeriesError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SeriesError::EmptyTitle);
        }

        let cancelled = self.cancelled.notified();
        let generation = {
            let mut state = self.state.lock();
            if let (SeriesResolution::Resolved(id), Some(resolved)) =
                (&state.resolution, &state.title)
            {
                if resolved == title {
                    return Ok(id.clone());
                }
            }

            state.generation += 1;
            state.resolution = SeriesResolution::Pending;
            state.title = Some(title.to_owned());
            state.generation
        };

        let outcome = tokio::select! {
            result = tokio::time::timeout(self.timeout, self.lookup(title)) => match result {
                Ok(Ok(id)) => Ok(id),
                Ok(Err(err)) => Err(SeriesError::Client(err)),
                Err(_) => Err(SeriesError::Timeout(self.timeout)),
            },
            _ = cancelled => Err(SeriesError::Cancelled),
        };

        let mut state = self.state.lock();
        if state.generation != generation {
            return Err(SeriesError::Cancelled);
        }

        state.resolution = match &outcome {
            Ok(id) => SeriesResolution::Resolved(id.clone()),
            Err(SeriesError::Cancelled) => SeriesResolution::Unresolved,
            Err(err) => {
                log::warn!("failed to resolve series `{title}`: {err}");
                SeriesResolution::Failed(err.to_string())
            }
        };

        outcome
    }

    /// Aborts a pending lookup, the resolution returns to unresolved
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if state.resolution == SeriesResolution::Pending {
            state.resolution = SeriesResolution::Unresolved;
            state.title = None;
            state.generation += 1;
            self.cancelled.notify_waiters();
        }
    }

    /// Forgets the current resolution, e.g. after the series name was edited
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.resolution = SeriesResolution::Unresolved;
        state.title = None;
        state.generation += 1;
    }

    async fn lookup(&self, title: &str) -> Result<String, ClientError> {
        let existing = self.directory.search(title).await?;

        if let Some(series) = existing.into_iter().find(|series| series.title == title) {
            log::debug!("found series `{title}` with id {}", series.id);
            return Ok(series.id);
        }

        Ok(self.directory.create(title).await?.id)
    }
}
