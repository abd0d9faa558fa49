//! Policy document validation.
//!
//! Validation collects every violated rule instead of stopping at the first
//! one, so callers get a complete list back in a single round trip.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::policy::*;

static METRIC_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("metric type pattern"));
static ADJUSTMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+][1-9][0-9]*%?$").expect("adjustment pattern"));
static TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("time pattern"));
static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-(0[1-9]|1[0-2])-(0[1-9]|[12][0-9]|3[01])$").expect("date pattern")
});
static DATE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-(0[1-9]|1[0-2])-(0[1-9]|[12][0-9]|3[01])T([01][0-9]|2[0-3]):[0-5][0-9]$")
        .expect("date-time pattern")
});

const OPERATORS: &[&str] = &["<", ">", "<=", ">="];
const PERCENT_METRICS: &[&str] = &["cpuutil", "memoryutil", "diskutil"];
const DURATION_BOUNDS: (u32, u32) = (60, 3600);

/// One violated rule, addressed by a JSON path rooted at `(root)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyValidationError {
    pub context: String,
    pub description: String,
}

impl PolicyValidationError {
    fn new(context: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            description: description.into(),
        }
    }
}

/// Validates raw policy bodies into [`ScalingPolicy`] values.
#[derive(Debug, Clone)]
pub struct PolicyValidator {
    cpu_lower: i64,
    cpu_upper: i64,
}

impl PolicyValidator {
    /// `cpu_lower..=cpu_upper` bounds the threshold of `cpu` rules.
    pub fn new(cpu_lower: i64, cpu_upper: i64) -> Self {
        Self {
            cpu_lower,
            cpu_upper,
        }
    }

    pub fn validate(&self, body: &[u8]) -> Result<ScalingPolicy, Vec<PolicyValidationError>> {
        let policy: ScalingPolicy = serde_json::from_slice(body)
            .map_err(|e| vec![PolicyValidationError::new("(root)", e.to_string())])?;

        let mut errors = Vec::new();
        self.check_policy(&policy, &mut errors);
        if errors.is_empty() {
            Ok(policy)
        } else {
            Err(errors)
        }
    }

    /// Decode a policy that was validated before it was stored (e.g. a
    /// service instance's default policy). Only the JSON shape is checked.
    pub fn parse_unchecked(document: &str) -> Result<ScalingPolicy, serde_json::Error> {
        serde_json::from_str(document)
    }

    fn check_policy(&self, policy: &ScalingPolicy, errors: &mut Vec<PolicyValidationError>) {
        check_bounds(
            "(root)",
            policy.instance_min_count,
            policy.instance_max_count,
            errors,
        );
        if policy.instance_min_count < 1 {
            errors.push(PolicyValidationError::new(
                "(root).instance_min_count",
                "instance_min_count must be greater than or equal to 1",
            ));
        }

        if policy.scaling_rules.is_empty() && policy.schedules.is_none() {
            errors.push(PolicyValidationError::new(
                "(root)",
                "Must validate at least one schema (anyOf): scaling_rules or schedules is required",
            ));
        }

        for (i, rule) in policy.scaling_rules.iter().enumerate() {
            self.check_rule(&format!("(root).scaling_rules.{i}"), rule, errors);
        }

        if let Some(schedules) = &policy.schedules {
            check_schedules("(root).schedules", schedules, errors);
        }
    }

    fn check_rule(&self, ctx: &str, rule: &ScalingRule, errors: &mut Vec<PolicyValidationError>) {
        if !METRIC_TYPE.is_match(&rule.metric_type) {
            errors.push(PolicyValidationError::new(
                format!("{ctx}.metric_type"),
                "metric_type must only contain letters, digits and underscores",
            ));
        }
        if !OPERATORS.contains(&rule.operator.as_str()) {
            errors.push(PolicyValidationError::new(
                format!("{ctx}.operator"),
                format!("operator must be one of {}", OPERATORS.join(", ")),
            ));
        }
        if !ADJUSTMENT.is_match(&rule.adjustment) {
            errors.push(PolicyValidationError::new(
                format!("{ctx}.adjustment"),
                "adjustment must look like +1, -2 or +10%",
            ));
        }
        for (field, value) in [
            ("breach_duration_secs", rule.breach_duration_secs),
            ("cool_down_secs", rule.cool_down_secs),
        ] {
            if let Some(v) = value
                && !(DURATION_BOUNDS.0..=DURATION_BOUNDS.1).contains(&v)
            {
                errors.push(PolicyValidationError::new(
                    format!("{ctx}.{field}"),
                    format!(
                        "{field} must be between {} and {}",
                        DURATION_BOUNDS.0, DURATION_BOUNDS.1
                    ),
                ));
            }
        }

        let threshold_ctx = format!("{ctx}.threshold");
        let metric = rule.metric_type.as_str();
        if metric == "cpu" {
            if rule.threshold < self.cpu_lower || rule.threshold > self.cpu_upper {
                errors.push(PolicyValidationError::new(
                    threshold_ctx,
                    format!(
                        "scaling_rules[{}].threshold for metric_type cpu should be in range {}-{}",
                        ctx.rsplit('.').next().unwrap_or_default(),
                        self.cpu_lower,
                        self.cpu_upper
                    ),
                ));
            }
        } else if PERCENT_METRICS.contains(&metric) {
            if !(1..=100).contains(&rule.threshold) {
                errors.push(PolicyValidationError::new(
                    threshold_ctx,
                    format!("threshold for metric_type {metric} should be in range 1-100"),
                ));
            }
        } else if rule.threshold <= 0 {
            errors.push(PolicyValidationError::new(
                threshold_ctx,
                format!("threshold for metric_type {metric} should be greater than 0"),
            ));
        }
    }
}

fn check_bounds(ctx: &str, min: u32, max: u32, errors: &mut Vec<PolicyValidationError>) {
    if min > max {
        errors.push(PolicyValidationError::new(
            format!("{ctx}.instance_min_count"),
            format!("instance_min_count {min} is higher than instance_max_count {max}"),
        ));
    }
}

fn check_initial_min(
    ctx: &str,
    min: u32,
    max: u32,
    initial: Option<u32>,
    errors: &mut Vec<PolicyValidationError>,
) {
    if let Some(initial) = initial
        && (initial < min || initial > max)
    {
        errors.push(PolicyValidationError::new(
            format!("{ctx}.initial_min_instance_count"),
            format!(
                "initial_min_instance_count {initial} is not between instance_min_count {min} and instance_max_count {max}"
            ),
        ));
    }
}

fn check_schedules(ctx: &str, schedules: &ScalingSchedules, errors: &mut Vec<PolicyValidationError>) {
    if schedules.timezone.trim().is_empty() {
        errors.push(PolicyValidationError::new(
            format!("{ctx}.timezone"),
            "timezone is required",
        ));
    }
    if schedules.recurring_schedule.is_empty() && schedules.specific_date.is_empty() {
        errors.push(PolicyValidationError::new(
            ctx,
            "at least one of recurring_schedule or specific_date is required",
        ));
    }

    for (i, s) in schedules.recurring_schedule.iter().enumerate() {
        check_recurring(&format!("{ctx}.recurring_schedule.{i}"), s, errors);
    }
    for (i, s) in schedules.specific_date.iter().enumerate() {
        check_specific(&format!("{ctx}.specific_date.{i}"), s, errors);
    }
}

fn check_recurring(ctx: &str, s: &RecurringSchedule, errors: &mut Vec<PolicyValidationError>) {
    let times_ok = check_format(ctx, "start_time", &s.start_time, &TIME, "HH:MM", errors)
        & check_format(ctx, "end_time", &s.end_time, &TIME, "HH:MM", errors);
    if times_ok && s.start_time >= s.end_time {
        errors.push(PolicyValidationError::new(
            format!("{ctx}.start_time"),
            format!("start_time {} is not before end_time {}", s.start_time, s.end_time),
        ));
    }

    let mut dates_ok = true;
    if let Some(start) = &s.start_date {
        dates_ok &= check_format(ctx, "start_date", start, &DATE, "YYYY-MM-DD", errors);
    }
    if let Some(end) = &s.end_date {
        dates_ok &= check_format(ctx, "end_date", end, &DATE, "YYYY-MM-DD", errors);
    }
    if dates_ok
        && let (Some(start), Some(end)) = (&s.start_date, &s.end_date)
        && start > end
    {
        errors.push(PolicyValidationError::new(
            format!("{ctx}.start_date"),
            format!("start_date {start} is after end_date {end}"),
        ));
    }

    match (&s.days_of_week, &s.days_of_month) {
        (Some(days), None) => check_days(ctx, "days_of_week", days, 7, errors),
        (None, Some(days)) => check_days(ctx, "days_of_month", days, 31, errors),
        _ => errors.push(PolicyValidationError::new(
            ctx,
            "exactly one of days_of_week or days_of_month is required",
        )),
    }

    check_bounds(ctx, s.instance_min_count, s.instance_max_count, errors);
    check_initial_min(
        ctx,
        s.instance_min_count,
        s.instance_max_count,
        s.initial_min_instance_count,
        errors,
    );
}

fn check_specific(ctx: &str, s: &SpecificDate, errors: &mut Vec<PolicyValidationError>) {
    let ok = check_format(
        ctx,
        "start_date_time",
        &s.start_date_time,
        &DATE_TIME,
        "YYYY-MM-DDTHH:MM",
        errors,
    ) & check_format(
        ctx,
        "end_date_time",
        &s.end_date_time,
        &DATE_TIME,
        "YYYY-MM-DDTHH:MM",
        errors,
    );
    // Fixed-width formats order lexicographically.
    if ok && s.start_date_time >= s.end_date_time {
        errors.push(PolicyValidationError::new(
            format!("{ctx}.start_date_time"),
            format!(
                "start_date_time {} is not before end_date_time {}",
                s.start_date_time, s.end_date_time
            ),
        ));
    }

    check_bounds(ctx, s.instance_min_count, s.instance_max_count, errors);
    check_initial_min(
        ctx,
        s.instance_min_count,
        s.instance_max_count,
        s.initial_min_instance_count,
        errors,
    );
}

fn check_format(
    ctx: &str,
    field: &str,
    value: &str,
    pattern: &Regex,
    shape: &str,
    errors: &mut Vec<PolicyValidationError>,
) -> bool {
    if pattern.is_match(value) {
        return true;
    }
    errors.push(PolicyValidationError::new(
        format!("{ctx}.{field}"),
        format!("{field} {value:?} does not match the format {shape}"),
    ));
    false
}

fn check_days(ctx: &str, field: &str, days: &[u8], max: u8, errors: &mut Vec<PolicyValidationError>) {
    let ctx = format!("{ctx}.{field}");
    if days.is_empty() {
        errors.push(PolicyValidationError::new(ctx, format!("{field} must not be empty")));
        return;
    }
    if let Some(bad) = days.iter().find(|d| !(1..=max).contains(*d)) {
        errors.push(PolicyValidationError::new(
            ctx.clone(),
            format!("{field} entry {bad} must be between 1 and {max}"),
        ));
    }
    let mut seen = HashSet::new();
    if !days.iter().all(|d| seen.insert(*d)) {
        errors.push(PolicyValidationError::new(
            ctx,
            format!("{field} entries must be unique"),
        ));
    }
}
