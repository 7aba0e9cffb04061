use crate::config::HarvestSettings;
use crate::domain::criteria::RefinementCriteria;
use crate::domain::filter::apply_refinements;
use crate::domain::listing::ListingRecord;
use crate::errors::PipelineError;
use crate::jobs::registry::{CancelToken, CancellationRegistry, JobId, JobRegistration};
use crate::scraping::browser::BrowserLauncher;
use crate::scraping::collector::collect_listings;
use crate::scraping::enricher::enrich_listings;
use crate::scraping::page_fetcher::SearchLabels;
use crate::scraping::pool::panic_message;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, info};

pub const MAX_PAGES: u32 = 20;
pub const DEFAULT_DETAIL_WORKERS: usize = 4;

/// Everything one job needs, checked before the job is registered.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_id: JobId,
    pub search_url: String,
    pub pages: u32,
    pub criteria: RefinementCriteria,
    pub labels: SearchLabels,
    pub detail_workers: usize,
}

impl JobRequest {
    pub fn new(
        job_id: JobId,
        search_url: impl Into<String>,
        pages: u32,
        criteria: RefinementCriteria,
        labels: SearchLabels,
    ) -> Result<Self, PipelineError> {
        let search_url = search_url.into().trim().to_string();
        if search_url.is_empty() {
            return Err(PipelineError::InvalidRequest("search URL is empty".into()));
        }
        if !(1..=MAX_PAGES).contains(&pages) {
            return Err(PipelineError::InvalidRequest(format!(
                "page count must be between 1 and {MAX_PAGES}, got {pages}"
            )));
        }

        Ok(Self {
            job_id,
            search_url,
            pages,
            criteria,
            labels,
            detail_workers: DEFAULT_DETAIL_WORKERS,
        })
    }

    pub fn with_detail_workers(mut self, workers: usize) -> Self {
        self.detail_workers = workers.max(1);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Registered,
    Collecting,
    Collected,
    Filtering,
    Filtered,
    Enriching,
    Cancelled,
    Completed,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Registered => "registered",
            JobState::Collecting => "collecting",
            JobState::Collected => "collected",
            JobState::Filtering => "filtering",
            JobState::Filtered => "filtered",
            JobState::Enriching => "enriching",
            JobState::Cancelled => "cancelled",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a job ended. The two empty endings are deliberately separate
/// variants so callers can word them differently.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(Vec<ListingRecord>),
    NoMatches,
    Cancelled,
    Failed(String),
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Completed(_) | JobOutcome::NoMatches => JobState::Completed,
            JobOutcome::Cancelled => JobState::Cancelled,
            JobOutcome::Failed(_) => JobState::Failed,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            JobOutcome::Completed(listings) => {
                format!("Done! {} listings collected.", listings.len())
            }
            JobOutcome::NoMatches => "No listings match your search. \
                 Try adjusting your filters or start a new search."
                .to_string(),
            JobOutcome::Cancelled => "Operation cancelled by the user.".to_string(),
            JobOutcome::Failed(cause) => format!("An error occurred during collection: {cause}"),
        }
    }
}

/// Receives every state change of a job together with the number of
/// listings held at that point.
pub trait JobObserver: Send + Sync {
    fn phase_changed(&self, job: &JobId, state: JobState, listings: usize);
}

impl<F> JobObserver for F
where
    F: Fn(&JobId, JobState, usize) + Send + Sync,
{
    fn phase_changed(&self, job: &JobId, state: JobState, listings: usize) {
        self(job, state, listings)
    }
}

/// Runs collect, filter and enrich for one job at a time per call. The
/// registry is shared with whoever needs to cancel jobs.
pub struct Pipeline {
    registry: Arc<CancellationRegistry>,
    launcher: Arc<dyn BrowserLauncher>,
    settings: HarvestSettings,
    observer: Option<Arc<dyn JobObserver>>,
}

impl Pipeline {
    pub fn new(
        registry: Arc<CancellationRegistry>,
        launcher: Arc<dyn BrowserLauncher>,
        settings: HarvestSettings,
    ) -> Self {
        Self {
            registry,
            launcher,
            settings,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn registry(&self) -> &Arc<CancellationRegistry> {
        &self.registry
    }

    /// Always returns an outcome and always unregisters the job, whatever
    /// phase failed or panicked. A panicking observer fails the job.
    pub fn run(&self, request: JobRequest) -> JobOutcome {
        let job = request.job_id.clone();
        let registration = JobRegistration::register(&self.registry, job.clone());
        let token = registration.token();

        let outcome = self.guarded(&job, || {
            self.notify(&job, JobState::Registered, 0);
            self.execute(&request, &token)
        });

        // The cancel flag is read and the entry removed under one lock, so a
        // cancel that arrived before this point is never lost.
        let outcome = match (registration.release(), outcome) {
            (true, JobOutcome::Completed(_) | JobOutcome::NoMatches) => {
                info!(%job, "Cancelled during enrichment");
                JobOutcome::Cancelled
            }
            (_, outcome) => outcome,
        };

        let held = match &outcome {
            JobOutcome::Completed(listings) => listings.len(),
            _ => 0,
        };
        let state = outcome.state();
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.notify(&job, state, held))) {
            Ok(()) => outcome,
            Err(payload) => panicked(&job, payload.as_ref()),
        };
        info!(%job, state = %outcome.state(), "Job finished");
        outcome
    }

    /// Runs `step`, turning an error or a panic into `JobOutcome::Failed`.
    fn guarded(
        &self,
        job: &JobId,
        step: impl FnOnce() -> Result<JobOutcome, PipelineError>,
    ) -> JobOutcome {
        match panic::catch_unwind(AssertUnwindSafe(step)) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(%job, "Job failed: {e}");
                JobOutcome::Failed(e.to_string())
            }
            Err(payload) => panicked(job, payload.as_ref()),
        }
    }

    fn execute(
        &self,
        request: &JobRequest,
        token: &CancelToken,
    ) -> Result<JobOutcome, PipelineError> {
        let job = token.job();
        if token.is_cancelled() {
            info!(%job, "Cancelled before collection");
            return Ok(JobOutcome::Cancelled);
        }

        info!(
            %job,
            url = %request.search_url,
            pages = request.pages,
            criteria = %request.criteria.summary(),
            "Starting job"
        );

        self.notify(job, JobState::Collecting, 0);
        let collected = collect_listings(
            Arc::clone(&self.launcher),
            &request.search_url,
            request.pages,
            request.labels.clone(),
            token,
            &self.settings,
        )?;
        if token.is_cancelled() {
            info!(%job, "Cancelled during collection");
            return Ok(JobOutcome::Cancelled);
        }

        self.notify(job, JobState::Collected, collected.len());
        if token.is_cancelled() {
            info!(%job, collected = collected.len(), "Cancelled after collection");
            return Ok(JobOutcome::Cancelled);
        }

        self.notify(job, JobState::Filtering, collected.len());
        let filtered = apply_refinements(collected, &request.criteria);
        self.notify(job, JobState::Filtered, filtered.len());

        self.notify(job, JobState::Enriching, filtered.len());
        let enriched = enrich_listings(
            filtered,
            request.detail_workers,
            Arc::clone(&self.launcher),
            token,
            &self.settings,
        )?;

        if enriched.is_empty() {
            info!(%job, "No listings left after refinement");
            return Ok(JobOutcome::NoMatches);
        }

        Ok(JobOutcome::Completed(enriched))
    }

    fn notify(&self, job: &JobId, state: JobState, listings: usize) {
        if let Some(observer) = &self.observer {
            observer.phase_changed(job, state, listings);
        }
    }
}

fn panicked(job: &JobId, payload: &(dyn Any + Send)) -> JobOutcome {
    let err = PipelineError::Panicked(panic_message(payload));
    error!(%job, "Job panicked: {err}");
    JobOutcome::Failed(err.to_string())
}
