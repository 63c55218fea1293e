use super::{DBClient, InternshipExt, UserExt};
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

impl DBClient {
    /// Nightly maintenance: repair drifted application counters and drop
    /// expired reset tokens.
    pub async fn start_maintenance_task(&self) -> Result<JobScheduler, JobSchedulerError> {
        let sched = JobScheduler::new().await?;
        let db = self.clone();

        let job = Job::new_async("0 0 3 * * *", move |uuid, _l| {
            let db = db.clone();
            Box::pin(async move {
                tracing::info!(job_id = %uuid, "Running maintenance job");

                match db.reconcile_application_counts().await {
                    Ok(repaired) if repaired > 0 => {
                        tracing::warn!(job_id = %uuid, repaired, "Application counters had drifted")
                    }
                    Ok(_) => tracing::info!(job_id = %uuid, "Application counters consistent"),
                    Err(e) => {
                        tracing::error!(job_id = %uuid, error = %e, "Counter reconciliation failed")
                    }
                }

                match db.clear_expired_reset_tokens(Utc::now()).await {
                    Ok(cleared) => {
                        tracing::info!(job_id = %uuid, cleared, "Expired reset tokens cleared")
                    }
                    Err(e) => {
                        tracing::error!(job_id = %uuid, error = %e, "Reset token cleanup failed")
                    }
                }
            })
        })?;

        sched.add(job).await?;
        //It doesn't block.
        sched.start().await?;

        Ok(sched)
    }
}
