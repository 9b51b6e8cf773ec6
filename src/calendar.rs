//! Service calendar built from the optional `calendar.txt` and
//! `calendar_dates.txt` tables.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::error::GtfsError;
use crate::loader::records::{CalendarDateRecord, CalendarRecord, GtfsRecord};
use crate::model::ServiceId;

#[derive(Clone, Debug, Default, Serialize)]
pub struct Calendar {
    pub services: BTreeMap<ServiceId, Service>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Service {
    pub service_id: ServiceId,
    pub days_of_week: DaysOfWeek,
    /// Absent for services defined only through calendar_dates.txt.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub extra_days: BTreeSet<NaiveDate>,
    pub removed_days: BTreeSet<NaiveDate>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DaysOfWeek {
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
    pub sunday: bool,
}

impl DaysOfWeek {
    pub fn includes(&self, day: &NaiveDate) -> bool {
        match day.weekday() {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }
}

impl Service {
    fn new(service_id: ServiceId) -> Self {
        Self {
            service_id,
            days_of_week: DaysOfWeek::default(),
            date_range: None,
            extra_days: BTreeSet::new(),
            removed_days: BTreeSet::new(),
        }
    }

    pub fn runs_on(&self, day: &NaiveDate) -> bool {
        if self.extra_days.contains(day) {
            return true;
        }
        if self.removed_days.contains(day) {
            return false;
        }
        match self.date_range {
            Some((start, end)) if start <= *day && *day <= end => self.days_of_week.includes(day),
            _ => false,
        }
    }
}

impl Calendar {
    /// Builds the calendar. Malformed rows are skipped and their count returned.
    pub fn build(calendar: Vec<CalendarRecord>, dates: Vec<CalendarDateRecord>) -> (Self, u64) {
        let mut services = BTreeMap::new();
        let mut skipped = 0;

        for rec in calendar {
            match parse_service(&rec) {
                Ok(service) => {
                    services.insert(service.service_id.clone(), service);
                }
                Err(reason) => {
                    let err = GtfsError::row_parse(CalendarRecord::FILE, rec.line, reason);
                    warn!(error = %err, "Skipping calendar row");
                    skipped += 1;
                }
            }
        }

        for rec in dates {
            let parsed = parse_date(&rec.date).and_then(|date| match rec.exception_type.as_str() {
                "1" => Ok((date, true)),
                "2" => Ok((date, false)),
                other => Err(format!("unknown exception_type '{other}'")),
            });
            match parsed {
                Ok((date, added)) => {
                    let service_id = ServiceId::new(rec.service_id);
                    let service = services
                        .entry(service_id.clone())
                        .or_insert_with(|| Service::new(service_id));
                    if added {
                        service.extra_days.insert(date);
                    } else {
                        service.removed_days.insert(date);
                    }
                }
                Err(reason) => {
                    let err = GtfsError::row_parse(CalendarDateRecord::FILE, rec.line, reason);
                    warn!(error = %err, "Skipping calendar_dates row");
                    skipped += 1;
                }
            }
        }

        (Self { services }, skipped)
    }

    pub fn active_services(&self, day: NaiveDate) -> BTreeSet<&ServiceId> {
        self.services
            .values()
            .filter(|s| s.runs_on(&day))
            .map(|s| &s.service_id)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

fn parse_service(rec: &CalendarRecord) -> Result<Service, String> {
    let flag = |name: &str, value: &str| match value {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(format!("{name} must be 0 or 1, got '{other}'")),
    };
    let start = parse_date(&rec.start_date)?;
    let end = parse_date(&rec.end_date)?;
    Ok(Service {
        service_id: ServiceId::new(rec.service_id.clone()),
        days_of_week: DaysOfWeek {
            monday: flag("monday", &rec.monday)?,
            tuesday: flag("tuesday", &rec.tuesday)?,
            wednesday: flag("wednesday", &rec.wednesday)?,
            thursday: flag("thursday", &rec.thursday)?,
            friday: flag("friday", &rec.friday)?,
            saturday: flag("saturday", &rec.saturday)?,
            sunday: flag("sunday", &rec.sunday)?,
        },
        date_range: Some((start, end)),
        extra_days: BTreeSet::new(),
        removed_days: BTreeSet::new(),
    })
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|e| format!("bad date '{value}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekday_service(id: &str) -> CalendarRecord {
        CalendarRecord {
            line: 2,
            service_id: id.to_string(),
            monday: "1".into(),
            tuesday: "1".into(),
            wednesday: "1".into(),
            thursday: "1".into(),
            friday: "1".into(),
            saturday: "0".into(),
            sunday: "0".into(),
            start_date: "20250101".into(),
            end_date: "20251231".into(),
        }
    }

    fn exception(id: &str, date: &str, kind: &str) -> CalendarDateRecord {
        CalendarDateRecord {
            line: 2,
            service_id: id.to_string(),
            date: date.to_string(),
            exception_type: kind.to_string(),
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_weekday_service_runs_on_weekdays_only() {
        let (calendar, skipped) = Calendar::build(vec![weekday_service("WD")], vec![]);
        assert_eq!(skipped, 0);
        // 2025-03-03 is a Monday, 2025-03-08 a Saturday
        assert_eq!(calendar.active_services(day("2025-03-03")).len(), 1);
        assert!(calendar.active_services(day("2025-03-08")).is_empty());
        assert!(calendar.active_services(day("2026-03-02")).is_empty());
    }

    #[test]
    fn test_exceptions_override_weekday_mask() {
        let (calendar, _) = Calendar::build(
            vec![weekday_service("WD")],
            vec![
                exception("WD", "20250303", "2"),
                exception("WD", "20250308", "1"),
                exception("HOLIDAY", "20251225", "1"),
            ],
        );
        assert!(calendar.active_services(day("2025-03-03")).is_empty());
        assert_eq!(calendar.active_services(day("2025-03-08")).len(), 1);

        let christmas = calendar.active_services(day("2025-12-25"));
        assert!(christmas.contains(&ServiceId::new("HOLIDAY")));
        assert!(christmas.contains(&ServiceId::new("WD")));
    }

    #[test]
    fn test_malformed_rows_are_counted() {
        let mut bad = weekday_service("BAD");
        bad.start_date = "2025-01-01".into();
        let (calendar, skipped) = Calendar::build(
            vec![bad, weekday_service("WD")],
            vec![exception("WD", "20250303", "7")],
        );
        assert_eq!(skipped, 2);
        assert_eq!(calendar.services.len(), 1);
    }
}
