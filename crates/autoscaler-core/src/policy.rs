//! Scaling policy documents.
//!
//! A policy bounds an application's instance count, lists metric-driven
//! scaling rules, and optionally carries time-based schedules that the
//! scheduler service mirrors.

use serde::{Deserialize, Serialize};

/// An application's scaling configuration, as accepted by `PUT /policies/{app_id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingPolicy {
    pub instance_min_count: u32,
    pub instance_max_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scaling_rules: Vec<ScalingRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedules: Option<ScalingSchedules>,
}

impl ScalingPolicy {
    /// Whether the scheduler has anything to mirror for this policy.
    pub fn has_schedules(&self) -> bool {
        self.schedules
            .as_ref()
            .is_some_and(|s| !s.recurring_schedule.is_empty() || !s.specific_date.is_empty())
    }
}

/// A metric threshold that triggers an instance adjustment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingRule {
    pub metric_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breach_duration_secs: Option<u32>,
    pub threshold: i64,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cool_down_secs: Option<u32>,
    /// "+1", "-2", "+50%" ...
    pub adjustment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingSchedules {
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recurring_schedule: Vec<RecurringSchedule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specific_date: Vec<SpecificDate>,
}

/// A weekly or monthly window with its own instance bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringSchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_month: Option<Vec<u8>>,
    pub instance_min_count: u32,
    pub instance_max_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_min_instance_count: Option<u32>,
}

/// A one-off window between two local date-times.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecificDate {
    pub start_date_time: String,
    pub end_date_time: String,
    pub instance_min_count: u32,
    pub instance_max_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_min_instance_count: Option<u32>,
}
