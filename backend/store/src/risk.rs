//! Risk identification rules over the project pipeline.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use aquadash_core::{Project, ProjectStatus};

/// Maximum rows returned for one risk kind.
pub const RISK_LIMIT: usize = 100;

/// Projects untouched for longer than this are stagnant.
pub const STAGNATION_DAYS: i64 = 30;

/// Category of a risk list on the cockpit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskKind {
    /// Forecast below 80% of target.
    #[default]
    Prediction,
    /// Order overdue against the expected order date.
    Urge,
    /// Not enough opportunities reported.
    Report,
    /// Conversion rate at or below 20%.
    Conversion,
    /// Single projects of one million yuan or more.
    Dependency,
    /// No update for more than 30 days.
    Stagnation,
}

impl RiskKind {
    pub const ALL: [RiskKind; 6] = [
        RiskKind::Prediction,
        RiskKind::Urge,
        RiskKind::Report,
        RiskKind::Conversion,
        RiskKind::Dependency,
        RiskKind::Stagnation,
    ];

    pub fn as_key(self) -> &'static str {
        match self {
            RiskKind::Prediction => "prediction",
            RiskKind::Urge => "urge",
            RiskKind::Report => "report",
            RiskKind::Conversion => "conversion",
            RiskKind::Dependency => "dependency",
            RiskKind::Stagnation => "stagnation",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_key() == key)
    }

    /// Whether `project` belongs on this list at `now`.
    pub fn matches(self, project: &Project, now: DateTime<Utc>) -> bool {
        let in_progress = project.status == ProjectStatus::InProgress;
        match self {
            RiskKind::Prediction => {
                in_progress
                    && matches!(
                        (project.current_forecast, project.target_forecast),
                        (Some(current), Some(target)) if current < target * 0.8
                    )
            }
            RiskKind::Urge => in_progress && project.delay_days.is_some_and(|d| d >= 0),
            RiskKind::Report => project.status == ProjectStatus::InsufficientReport,
            RiskKind::Conversion => project.conversion_rate.is_some_and(|r| r <= 0.2),
            RiskKind::Dependency => project.amount.is_some_and(|a| a >= 1_000_000.0),
            RiskKind::Stagnation => in_progress && is_stagnant(project, now),
        }
    }

    fn compare(self, a: &Project, b: &Project) -> Ordering {
        match self {
            RiskKind::Prediction => desc_nulls_last(a.gap_amount, b.gap_amount),
            RiskKind::Urge => desc_nulls_last(
                a.delay_days.map(|d| d as f64),
                b.delay_days.map(|d| d as f64),
            ),
            RiskKind::Report => b.updated_at.cmp(&a.updated_at),
            RiskKind::Conversion => cmp_f64(a.conversion_rate, b.conversion_rate),
            RiskKind::Dependency => desc_nulls_last(a.amount, b.amount),
            RiskKind::Stagnation => a.updated_at.cmp(&b.updated_at),
        }
    }

    /// Filter, order and cap the candidates for this kind.
    pub fn select<'a, I>(self, projects: I, now: DateTime<Utc>) -> Vec<Project>
    where
        I: IntoIterator<Item = &'a Project>,
    {
        let mut rows: Vec<Project> = projects
            .into_iter()
            .filter(|p| self.matches(p, now))
            .cloned()
            .collect();
        rows.sort_by(|a, b| self.compare(a, b));
        rows.truncate(RISK_LIMIT);
        rows
    }
}

impl fmt::Display for RiskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

pub fn is_stagnant(project: &Project, now: DateTime<Utc>) -> bool {
    project.updated_at < now - Duration::days(STAGNATION_DAYS)
}

fn cmp_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn desc_nulls_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        _ => cmp_f64(a, b),
    }
}
