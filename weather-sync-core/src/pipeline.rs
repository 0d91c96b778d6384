//! Sequential per-city driver: fetch, persist, report.
//!
//! Every city is attempted exactly once per run, in configured order. Errors
//! from the client or the writer are turned into a [`CityStatus`] for that
//! city; nothing raised for one city stops the next.

use std::{fmt, path::PathBuf};

use crate::{
    error::{FetchError, LocalWriteError, RemoteWriteError},
    provider::WeatherProvider,
    storage::{PersistResult, RecordWriter, RemoteOutcome},
};

/// Terminal state of one city in a run.
#[derive(Debug)]
pub enum CityStatus {
    /// Written locally, and remotely when a bucket is configured.
    Succeeded {
        summary: String,
        local_path: PathBuf,
        remote_key: Option<String>,
    },
    /// Written locally; the remote upload failed.
    Degraded {
        summary: String,
        local_path: PathBuf,
        error: RemoteWriteError,
    },
    /// Nothing usable was written.
    Failed(CityFailure),
}

#[derive(Debug, thiserror::Error)]
pub enum CityFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{local}")]
    LocalWrite {
        #[source]
        local: LocalWriteError,
        /// Remote result is still reported even though the city failed.
        remote: RemoteOutcome,
    },
}

#[derive(Debug)]
pub struct CityOutcome {
    pub city: String,
    pub status: CityStatus,
}

impl CityOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, CityStatus::Failed(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, CityStatus::Degraded { .. })
    }

    fn from_persist(city: String, summary: String, result: PersistResult) -> Self {
        let status = match (result.local, result.remote) {
            (Err(local), remote) => CityStatus::Failed(CityFailure::LocalWrite { local, remote }),
            (Ok(local_path), RemoteOutcome::Failed(error)) => {
                CityStatus::Degraded { summary, local_path, error }
            }
            (Ok(local_path), RemoteOutcome::Uploaded { key }) => {
                CityStatus::Succeeded { summary, local_path, remote_key: Some(key) }
            }
            (Ok(local_path), RemoteOutcome::Disabled) => {
                CityStatus::Succeeded { summary, local_path, remote_key: None }
            }
        };
        Self { city, status }
    }
}

impl fmt::Display for CityOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            CityStatus::Succeeded { summary, .. } => write!(f, "[ok] {summary}"),
            CityStatus::Degraded { summary, error, .. } => {
                write!(f, "[degraded] {summary} (saved locally; {error})")
            }
            CityStatus::Failed(failure) => write!(f, "[failed] {}: {failure}", self.city),
        }
    }
}

/// Counters and per-city outcomes for a finished run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: usize,
    pub degraded: usize,
    pub failed: usize,
    pub outcomes: Vec<CityOutcome>,
}

impl RunSummary {
    fn record(&mut self, outcome: CityOutcome) {
        match outcome.status {
            CityStatus::Succeeded { .. } => self.succeeded += 1,
            CityStatus::Degraded { .. } => self.degraded += 1,
            CityStatus::Failed(_) => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.degraded + self.failed
    }

    /// `0` when no city failed, `1` when at least one did.
    ///
    /// With `fail_on_degraded`, a run whose only problems are degraded
    /// uploads exits with `2`.
    pub fn exit_code(&self, fail_on_degraded: bool) -> u8 {
        if self.failed > 0 {
            1
        } else if fail_on_degraded && self.degraded > 0 {
            2
        } else {
            0
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cities: {} succeeded, {} degraded, {} failed",
            self.total(),
            self.succeeded,
            self.degraded,
            self.failed
        )
    }
}

/// Drives one run over the configured cities.
#[derive(Debug)]
pub struct Pipeline {
    provider: Box<dyn WeatherProvider>,
    writer: RecordWriter,
}

impl Pipeline {
    pub fn new(provider: Box<dyn WeatherProvider>, writer: RecordWriter) -> Self {
        Self { provider, writer }
    }

    /// Process `cities` in order. `on_outcome` sees each city as soon as it finishes.
    pub async fn run<F>(&self, cities: &[String], mut on_outcome: F) -> RunSummary
    where
        F: FnMut(&CityOutcome),
    {
        let mut summary = RunSummary::default();

        for city in cities {
            let outcome = self.process_city(city).await;
            on_outcome(&outcome);
            summary.record(outcome);
        }

        tracing::info!(
            succeeded = summary.succeeded,
            degraded = summary.degraded,
            failed = summary.failed,
            "run finished"
        );
        summary
    }

    async fn process_city(&self, city: &str) -> CityOutcome {
        tracing::info!(%city, "fetching weather");

        let record = match self.provider.fetch(city).await {
            Ok(record) => record,
            Err(err) => {
                tracing::error!(%city, error = %err, "fetch failed, skipping city");
                return CityOutcome {
                    city: city.to_string(),
                    status: CityStatus::Failed(err.into()),
                };
            }
        };

        let summary = record.summary();
        tracing::info!(%city, "{summary}");

        let result = self.writer.persist(&record).await;
        let outcome = CityOutcome::from_persist(city.to_string(), summary, result);

        match &outcome.status {
            CityStatus::Succeeded { .. } => {}
            CityStatus::Degraded { error, .. } => {
                tracing::warn!(%city, error = %error, "remote upload failed, local copy kept");
            }
            CityStatus::Failed(failure) => {
                tracing::error!(%city, error = %failure, "local write failed");
            }
        }

        outcome
    }
}
