use chrono::{DateTime, Utc};

use aquadash_core::{DashboardSummary, Project, ProjectStatus};

use crate::risk::is_stagnant;

/// Aggregate the cockpit headline numbers over all projects.
///
/// The conversion rate is the mean over projects that have one; missing
/// amounts count as zero.
pub fn summarize<'a, I>(projects: I, now: DateTime<Utc>) -> DashboardSummary
where
    I: IntoIterator<Item = &'a Project>,
{
    let mut summary = DashboardSummary::default();
    let mut rate_sum = 0.0;
    let mut rate_count = 0usize;

    for project in projects {
        summary.total_projects += 1;
        summary.total_amount += project.amount.unwrap_or(0.0);
        if let Some(rate) = project.conversion_rate {
            rate_sum += rate;
            rate_count += 1;
        }
        if project.risk_level.is_some_and(|l| l.is_risky()) {
            summary.risk_projects += 1;
        }
        if is_stagnant(project, now) {
            summary.stagnant_projects += 1;
        }
        match project.status {
            ProjectStatus::InProgress => summary.in_progress_projects += 1,
            ProjectStatus::Completed => summary.completed_projects += 1,
            _ => {}
        }
    }

    if rate_count > 0 {
        summary.conversion_rate = rate_sum / rate_count as f64;
    }
    summary
}
