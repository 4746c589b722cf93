// Fire time calculation for interval and calendar triggers
//
// Cron expressions use second precision and are evaluated in the trigger's time zone
// (or the engine default). Interval triggers fire at `start + n * interval`.

use crate::errors::ValidationError;
use crate::trigger::{interval_duration, TriggerSchedule, REPEAT_INDEFINITELY};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// Upper bound on fire times produced for a single trigger in one window
pub const MAX_FIRE_TIMES_PER_TRIGGER: usize = 10_000;

/// Parse and validate a cron expression
pub fn parse_cron_expression(expression: &str) -> Result<CronSchedule, ValidationError> {
    CronSchedule::from_str(expression).map_err(|e| ValidationError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Fire time computation against a trigger's anchor (its start time) and optional end
pub trait FireTimeCalculator {
    /// First fire time at or after `from`
    fn fire_time_at_or_after(
        &self,
        start_time: DateTime<Utc>,
        from: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        default_tz: Tz,
    ) -> Result<Option<DateTime<Utc>>, ValidationError>;

    /// Fire time strictly after `previous`
    fn fire_time_after(
        &self,
        start_time: DateTime<Utc>,
        previous: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        default_tz: Tz,
    ) -> Result<Option<DateTime<Utc>>, ValidationError>;

    /// All fire times inside `[window_start, window_end]`
    ///
    /// Fails with `TooManyFireTimes` instead of truncating when the window holds more
    /// than `MAX_FIRE_TIMES_PER_TRIGGER` fires.
    fn fire_times_between(
        &self,
        start_time: DateTime<Utc>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        default_tz: Tz,
    ) -> Result<Vec<DateTime<Utc>>, ValidationError> {
        let mut fire_times = Vec::new();
        let mut next =
            self.fire_time_at_or_after(start_time, window_start, end_time, default_tz)?;

        while let Some(fire_time) = next {
            if fire_time > window_end {
                break;
            }
            if fire_times.len() >= MAX_FIRE_TIMES_PER_TRIGGER {
                return Err(ValidationError::TooManyFireTimes {
                    limit: MAX_FIRE_TIMES_PER_TRIGGER,
                });
            }
            fire_times.push(fire_time);
            next = self.fire_time_after(start_time, fire_time, end_time, default_tz)?;
        }

        Ok(fire_times)
    }
}

impl FireTimeCalculator for TriggerSchedule {
    fn fire_time_at_or_after(
        &self,
        start_time: DateTime<Utc>,
        from: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        default_tz: Tz,
    ) -> Result<Option<DateTime<Utc>>, ValidationError> {
        let from = from.max(start_time);
        let next = match self {
            TriggerSchedule::Interval {
                repeat_count,
                repeat_interval_ms,
            } => interval_fire_time(start_time, *repeat_count, *repeat_interval_ms, from, true),
            TriggerSchedule::Calendar {
                expression,
                time_zone,
            } => calendar_fire_time_at_or_after(
                expression,
                time_zone.unwrap_or(default_tz),
                from,
            )?,
        };
        Ok(within_end(next, end_time))
    }

    fn fire_time_after(
        &self,
        start_time: DateTime<Utc>,
        previous: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        default_tz: Tz,
    ) -> Result<Option<DateTime<Utc>>, ValidationError> {
        let next = match self {
            TriggerSchedule::Interval {
                repeat_count,
                repeat_interval_ms,
            } => interval_fire_time(
                start_time,
                *repeat_count,
                *repeat_interval_ms,
                previous,
                false,
            ),
            TriggerSchedule::Calendar {
                expression,
                time_zone,
            } => {
                let time_zone = time_zone.unwrap_or(default_tz);
                if previous < start_time {
                    calendar_fire_time_at_or_after(expression, time_zone, start_time)?
                } else {
                    // whole seconds only, so anything cron returns is past `previous`
                    calendar_fire_time(expression, time_zone, previous.trunc_subsecs(0))?
                }
            }
        };
        Ok(within_end(next, end_time))
    }
}

fn within_end(
    next: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (next, end_time) {
        (Some(next), Some(end)) if next > end => None,
        (next, _) => next,
    }
}

/// Fire number `n` of an interval trigger is `start + n * interval`, `n <= repeat_count`
fn interval_fire_time(
    start_time: DateTime<Utc>,
    repeat_count: i32,
    repeat_interval_ms: u64,
    reference: DateTime<Utc>,
    inclusive: bool,
) -> Option<DateTime<Utc>> {
    if reference < start_time || (inclusive && reference == start_time) {
        return Some(start_time);
    }
    if repeat_count == 0 {
        return None;
    }

    let interval = interval_duration(repeat_interval_ms)?;
    let interval_ms = interval.num_milliseconds();
    if interval_ms <= 0 {
        return None;
    }

    let elapsed_ms = (reference - start_time).num_milliseconds();
    let mut n = elapsed_ms / interval_ms;
    let exact = elapsed_ms % interval_ms == 0;
    if !(inclusive && exact) {
        n += 1;
    }

    if repeat_count != REPEAT_INDEFINITELY && n > i64::from(repeat_count) {
        return None;
    }

    let offset = n.checked_mul(interval_ms).and_then(Duration::try_milliseconds)?;
    start_time.checked_add_signed(offset)
}

/// cron yields whole-second times strictly after its argument. A sub-second `from`
/// is floored so the first candidate is the next whole second; an exact one steps
/// back a second so `from` itself can match.
fn calendar_fire_time_at_or_after(
    expression: &str,
    time_zone: Tz,
    from: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let floored = from.trunc_subsecs(0);
    let after = if floored == from {
        from - Duration::seconds(1)
    } else {
        floored
    };
    calendar_fire_time(expression, time_zone, after)
}

fn calendar_fire_time(
    expression: &str,
    time_zone: Tz,
    after: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let schedule = parse_cron_expression(expression)?;
    let after_in_tz = after.with_timezone(&time_zone);
    let next = schedule
        .after(&after_in_tz)
        .next()
        .map(|next| next.with_timezone(&Utc));
    Ok(next)
}

/// Default time zone for calendar triggers that carry none
pub fn default_timezone() -> Tz {
    chrono_tz::UTC
}
