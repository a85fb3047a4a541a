//! Emergency requests raised by affected users.

use super::Category;
use chrono::{DateTime, Utc};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

text_enum! {
    /// Urgency of an emergency request.
    pub enum Priority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

impl Priority {
    /// Sort rank, most urgent first.
    pub fn rank(&self) -> i64 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

text_enum! {
    /// Emergency request lifecycle state.
    pub enum RequestStatus {
        Open => "open",
        Assigned => "assigned",
        Fulfilled => "fulfilled",
        Closed => "closed",
    }
}

/// Emergency request joined with requester contact details.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EmergencyRequest {
    pub id: i64,
    pub requester: i64,
    pub requester_name: String,
    pub requester_email: String,
    pub requester_phone: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    pub status: RequestStatus,
    pub quantity_needed: i64,
    pub unit: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub people_affected: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_rank_orders_critical_first() {
        let mut priorities = Priority::ALL.to_vec();
        priorities.sort_by_key(Priority::rank);
        assert_eq!(
            priorities,
            vec![
                Priority::Critical,
                Priority::High,
                Priority::Medium,
                Priority::Low
            ]
        );
    }
}
