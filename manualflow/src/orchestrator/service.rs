//! The job service API.

use super::runner::{JobHandles, JobRuntime, PipelineOrchestrator};
use crate::config::PipelineConfig;
use crate::core::{JobInput, JobRequest, JobResult, JobStatus, Phase, ProgressSnapshot};
use crate::errors::{PipelineError, SignalError};
use crate::events::EventSink;
use crate::gateway::ServiceFactory;
use crate::store::{JobRecord, JobStore};
use crate::utils::{derive_job_id, with_unique_suffix};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// A job running in this process.
struct LiveJob {
    handles: JobHandles,
    result: watch::Receiver<Option<JobResult>>,
}

/// Summary of a job known to the service or its store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Job id.
    pub job_id: String,
    /// Manual name.
    pub manual_name: String,
    /// Last persisted status.
    pub status: JobStatus,
    /// Last persisted phase.
    pub phase: Phase,
}

/// Starts, observes, signals and cancels translation jobs.
///
/// Jobs run on the tokio runtime; each owns its collaborator handles and
/// shares the service's store and event sink. A job leaves the live set when
/// it reaches a terminal state; later queries are answered from the store.
pub struct JobService {
    runtime: JobRuntime,
    jobs: Arc<DashMap<String, LiveJob>>,
}

impl JobService {
    /// Creates a service after validating the configuration.
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn JobStore>,
        factory: Arc<dyn ServiceFactory>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            runtime: JobRuntime {
                config: Arc::new(config),
                store,
                factory,
                events,
            },
            jobs: Arc::new(DashMap::new()),
        })
    }

    /// The configuration jobs run with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.runtime.config
    }

    /// Number of jobs currently running in this process.
    #[must_use]
    pub fn live_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Starts a job and returns its id.
    ///
    /// The id is derived from the manual name and start time; a collision
    /// with a live or stored job gets a random suffix.
    pub async fn start_job(&self, request: JobRequest) -> Result<String, PipelineError> {
        request.validate()?;
        let base = derive_job_id(&request.manual_name, &Utc::now());

        let mut candidate = base.clone();
        let (record, handles, tx) = loop {
            if self.runtime.store.load(&candidate).await?.is_some() {
                candidate = with_unique_suffix(&base);
                continue;
            }
            let input = JobInput::resolve(candidate.clone(), request.clone(), &self.runtime.config);
            let record = JobRecord::new(input);
            if let Some((handles, tx)) = self.reserve(&record) {
                break (record, handles, tx);
            }
            candidate = with_unique_suffix(&base);
        };

        if let Err(e) = self.runtime.store.save(&record).await {
            self.jobs.remove(&candidate);
            return Err(e.into());
        }
        info!(job_id = %candidate, manual_name = %record.input.manual_name, "Job accepted");
        self.launch(record, handles, tx);
        Ok(candidate)
    }

    /// Returns the latest progress of a job.
    ///
    /// Reads never wait on the pipeline; jobs no longer live are answered
    /// from the store.
    pub async fn get_progress(&self, job_id: &str) -> Result<ProgressSnapshot, PipelineError> {
        let live = self.jobs.get(job_id).map(|job| job.handles.progress.snapshot());
        if let Some(snapshot) = live {
            return Ok(snapshot);
        }
        match self.runtime.store.load(job_id).await? {
            Some(record) => Ok(record.progress),
            None => Err(PipelineError::UnknownJob(job_id.to_string())),
        }
    }

    /// Delivers the operator's product URL to a job.
    ///
    /// An empty URL means "continue without one". Accepted while the job
    /// has not yet passed its suspension point; rejected afterwards.
    pub async fn provide_url(&self, job_id: &str, url: &str) -> Result<(), PipelineError> {
        let signal = self.jobs.get(job_id).map(|job| job.handles.signal.clone());
        match signal {
            Some(signal) => {
                signal.deliver(url.trim())?;
                info!(job_id, "Product URL delivered");
                Ok(())
            }
            None if self.runtime.store.load(job_id).await?.is_some() => {
                Err(SignalError::JobNotRunning(job_id.to_string()).into())
            }
            None => Err(PipelineError::UnknownJob(job_id.to_string())),
        }
    }

    /// Waits for a job's terminal result.
    pub async fn await_result(&self, job_id: &str) -> Result<JobResult, PipelineError> {
        let receiver = self.jobs.get(job_id).map(|job| job.result.clone());
        if let Some(mut receiver) = receiver {
            let result = receiver
                .wait_for(Option::is_some)
                .await
                .map_err(|_| {
                    PipelineError::Internal(format!("job '{job_id}' ended without a result"))
                })?
                .clone();
            return result.ok_or_else(|| PipelineError::Internal("missing job result".to_string()));
        }

        let record = self
            .runtime
            .store
            .load(job_id)
            .await?
            .ok_or_else(|| PipelineError::UnknownJob(job_id.to_string()))?;
        record
            .result
            .ok_or_else(|| SignalError::JobNotRunning(job_id.to_string()).into())
    }

    /// Requests cancellation of a live job.
    ///
    /// Returns false when the job was already cancelled or has finished.
    pub async fn cancel(&self, job_id: &str, reason: &str) -> Result<bool, PipelineError> {
        let cancel = self.jobs.get(job_id).map(|job| job.handles.cancel.clone());
        let Some(cancel) = cancel else {
            return match self.runtime.store.load(job_id).await? {
                Some(_) => Ok(false),
                None => Err(PipelineError::UnknownJob(job_id.to_string())),
            };
        };
        let fresh = cancel.cancel(reason);
        if fresh {
            warn!(job_id, reason, "Job cancellation requested");
        }
        Ok(fresh)
    }

    /// Restarts every unfinished job in the store from its checkpoint.
    ///
    /// Returns the ids of the jobs restarted.
    pub async fn resume_unfinished(&self) -> Result<Vec<String>, PipelineError> {
        let mut resumed = Vec::new();
        for record in self.runtime.store.list_unfinished().await? {
            let job_id = record.job_id().to_string();
            let Some((handles, tx)) = self.reserve(&record) else {
                continue;
            };
            info!(job_id = %job_id, phase = %record.phase, "Resuming unfinished job");
            self.launch(record, handles, tx);
            resumed.push(job_id);
        }
        Ok(resumed)
    }

    /// Lists every job in the store.
    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>, PipelineError> {
        let mut summaries: Vec<JobSummary> = self
            .runtime
            .store
            .list()
            .await?
            .into_iter()
            .map(|record| JobSummary {
                job_id: record.input.job_id,
                manual_name: record.input.manual_name,
                status: record.status,
                phase: record.phase,
            })
            .collect();
        summaries.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        Ok(summaries)
    }

    /// Claims the job id for a record; `None` if it is already live.
    fn reserve(
        &self,
        record: &JobRecord,
    ) -> Option<(JobHandles, watch::Sender<Option<JobResult>>)> {
        match self.jobs.entry(record.job_id().to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let handles = JobHandles::for_record(record);
                let (tx, rx) = watch::channel(None);
                slot.insert(LiveJob {
                    handles: handles.clone(),
                    result: rx,
                });
                Some((handles, tx))
            }
        }
    }

    fn launch(
        &self,
        record: JobRecord,
        handles: JobHandles,
        tx: watch::Sender<Option<JobResult>>,
    ) {
        let job_id = record.job_id().to_string();
        let orchestrator = PipelineOrchestrator::new(record, self.runtime.clone(), handles);
        let jobs = Arc::clone(&self.jobs);
        tokio::spawn(async move {
            let result = orchestrator.run().await;
            // The terminal record is already stored, so callers that miss the
            // live entry find the result there.
            jobs.remove(&job_id);
            tx.send_replace(Some(result));
        });
    }
}

impl std::fmt::Debug for JobService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobService")
            .field("live_jobs", &self.live_jobs())
            .finish_non_exhaustive()
    }
}
