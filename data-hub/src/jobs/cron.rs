//! Cron-like scheduling for recurring jobs

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Cron-like schedule specification
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Schedule name
    pub name: String,
    /// Schedule expression
    pub expression: ScheduleExpression,
    /// Whether the schedule is enabled
    pub enabled: bool,
    /// Last run time
    pub last_run: Option<DateTime<Utc>>,
    /// Next run time
    pub next_run: Option<DateTime<Utc>>,
}

impl Schedule {
    /// Create a new schedule
    pub fn new(name: String, expression: ScheduleExpression) -> Self {
        let next_run = expression.next_occurrence(Utc::now());
        Self {
            name,
            expression,
            enabled: true,
            last_run: None,
            next_run,
        }
    }

    /// Enable the schedule
    pub fn enable(&mut self) {
        self.enabled = true;
        self.next_run = self.expression.next_occurrence(Utc::now());
    }

    /// Disable the schedule
    pub fn disable(&mut self) {
        self.enabled = false;
        self.next_run = None;
    }

    /// Mark as run and calculate next occurrence
    pub fn mark_run(&mut self) {
        self.last_run = Some(Utc::now());
        self.next_run = self.expression.next_occurrence(Utc::now());
    }

    /// Check if schedule should run now
    pub fn should_run(&self) -> bool {
        if !self.enabled {
            return false;
        }
        match self.next_run {
            Some(next) => Utc::now() >= next,
            None => false,
        }
    }
}

/// Schedule expression (simplified cron-like)
#[derive(Debug, Clone)]
pub enum ScheduleExpression {
    /// Run every N minutes
    EveryMinutes(u32),
    /// Run every N hours
    EveryHours(u32),
    /// Run daily at specific time (hour, minute), UTC
    DailyAt(u32, u32),
}

impl ScheduleExpression {
    /// Calculate next occurrence from a given time
    pub fn next_occurrence(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScheduleExpression::EveryMinutes(m) => Some(from + Duration::minutes(*m as i64)),
            ScheduleExpression::EveryHours(h) => Some(from + Duration::hours(*h as i64)),
            ScheduleExpression::DailyAt(hour, minute) => {
                let today = from.date_naive();
                let time = chrono::NaiveTime::from_hms_opt(*hour, *minute, 0)?;
                let datetime = today.and_time(time);
                let datetime_utc = DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc);

                if datetime_utc > from {
                    Some(datetime_utc)
                } else {
                    Some(datetime_utc + Duration::days(1))
                }
            }
        }
    }
}

/// Simple scheduler for recurring jobs
pub struct Scheduler {
    /// Schedules by name
    schedules: Arc<RwLock<HashMap<String, Schedule>>>,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new() -> Self {
        Self {
            schedules: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a schedule
    pub fn add_schedule(&self, schedule: Schedule) {
        let name = schedule.name.clone();
        self.schedules.write().insert(name.clone(), schedule);
        debug!("Added schedule: {}", name);
    }

    /// Enable a schedule
    pub fn enable(&self, name: &str) -> bool {
        if let Some(schedule) = self.schedules.write().get_mut(name) {
            schedule.enable();
            true
        } else {
            false
        }
    }

    /// Disable a schedule
    pub fn disable(&self, name: &str) -> bool {
        if let Some(schedule) = self.schedules.write().get_mut(name) {
            schedule.disable();
            true
        } else {
            false
        }
    }

    /// Get schedules that should run now
    pub fn due_schedules(&self) -> Vec<String> {
        self.schedules
            .read()
            .iter()
            .filter(|(_, s)| s.should_run())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Mark a schedule as run
    pub fn mark_run(&self, name: &str) {
        if let Some(schedule) = self.schedules.write().get_mut(name) {
            schedule.mark_run();
        }
    }

    /// List all schedules
    pub fn list_schedules(&self) -> Vec<Schedule> {
        self.schedules.read().values().cloned().collect()
    }

    /// Get a specific schedule
    pub fn get_schedule(&self, name: &str) -> Option<Schedule> {
        self.schedules.read().get(name).cloned()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_schedule_every_minutes() {
        let expr = ScheduleExpression::EveryMinutes(5);
        let now = Utc::now();
        let next = expr.next_occurrence(now).unwrap();
        assert_eq!((next - now).num_minutes(), 5);
    }

    #[test]
    fn test_schedule_daily() {
        let expr = ScheduleExpression::DailyAt(22, 0);
        let now = Utc::now();
        let next = expr.next_occurrence(now).unwrap();
        assert!(next > now);
        assert_eq!(next.hour(), 22);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn test_daily_rolls_over_to_tomorrow() {
        let expr = ScheduleExpression::DailyAt(6, 30);
        let from = DateTime::parse_from_rfc3339("2024-03-04T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let next = expr.next_occurrence(from).unwrap();
        assert_eq!(next.date_naive().to_string(), "2024-03-05");
        assert_eq!(next.hour(), 6);
    }

    #[test]
    fn test_schedule_management() {
        let scheduler = Scheduler::new();

        let schedule = Schedule::new(
            "ingestion".to_string(),
            ScheduleExpression::EveryMinutes(5),
        );
        scheduler.add_schedule(schedule);

        assert!(scheduler.get_schedule("ingestion").is_some());
        assert!(scheduler.disable("ingestion"));

        let schedule = scheduler.get_schedule("ingestion").unwrap();
        assert!(!schedule.enabled);
        assert!(!schedule.should_run());

        assert!(scheduler.enable("ingestion"));
        assert!(scheduler.get_schedule("ingestion").unwrap().enabled);
    }
}
