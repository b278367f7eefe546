//! Lazy client view over a submitted job.

use std::rc::Rc;

use tracing::debug;

use crate::core::{self, JobId, JobStatus};
use crate::error::SpiderError;
use crate::storage::Storage;
use crate::types::TaskReturn;

/// A submitted job.
///
/// Status and results are read lazily from storage and cached; once the
/// job leaves `Running`, the cached state never changes again.
pub struct Job {
    inner: core::Job,
    storage: Rc<dyn Storage>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("inner", &self.inner).finish()
    }
}

impl Job {
    pub(crate) fn new(inner: core::Job, storage: Rc<dyn Storage>) -> Self {
        Job { inner, storage }
    }

    pub fn job_id(&self) -> JobId {
        self.inner.job_id
    }

    /// The job's status: cached when terminal, refreshed from storage
    /// while still `Running`.
    pub fn get_status(&mut self) -> Result<JobStatus, SpiderError> {
        if self.inner.status != JobStatus::Running {
            return Ok(self.inner.status);
        }
        let status = self.storage.get_job_status(self.inner.job_id)?;
        if status != JobStatus::Running {
            debug!(job_id = %self.inner.job_id, status = status.as_state_str(), "job finished");
        }
        self.inner.status = status;
        Ok(status)
    }

    /// The job's outputs decoded as `R`, or `None` until the job has
    /// succeeded.
    ///
    /// `R` is a single [`TaskIo`](crate::types::TaskIo) type for
    /// single-output jobs or a tuple with one element per output. Inline
    /// outputs decode against both the stored TDL type and `R`; data
    /// outputs materialise as [`Data`](super::Data) handles.
    pub fn get_results<R: TaskReturn>(&mut self) -> Result<Option<R>, SpiderError> {
        if self.get_status()? != JobStatus::Succeeded {
            return Ok(None);
        }
        if self.inner.results.is_none() {
            match self.storage.get_job_results(self.inner.job_id)? {
                Some(rows) => self.inner.results = Some(rows),
                None => return Ok(None),
            }
        }
        match &self.inner.results {
            Some(rows) => R::from_results(rows).map(Some),
            None => Ok(None),
        }
    }
}
