use serde::Serialize;

use super::ServiceError;
use crate::access::Actor;
use crate::db::{ApplicationExt, StatsScope};
use crate::models::{ApplicationStatus, UserRole};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusCount {
    pub status: ApplicationStatus,
    pub count: i64,
}

/// Application counts per status, every status present (zero-filled) and in
/// lifecycle order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStats {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
}

/// Students see their own applications, companies those sent to their
/// postings, admins everything.
pub async fn application_stats<D: ApplicationExt>(
    db: &D,
    actor: &Actor,
) -> Result<ApplicationStats, ServiceError> {
    let scope = match actor.role {
        UserRole::Student => StatsScope::Student(actor.id),
        UserRole::Company => StatsScope::Company(actor.id),
        UserRole::Admin => StatsScope::Global,
    };

    let counts = db.count_applications_by_status(scope).await?;

    let by_status: Vec<StatusCount> = ApplicationStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: counts
                .iter()
                .find(|(s, _)| s == status)
                .map(|(_, n)| *n)
                .unwrap_or(0),
        })
        .collect();

    Ok(ApplicationStats {
        total: by_status.iter().map(|s| s.count).sum(),
        by_status,
    })
}
