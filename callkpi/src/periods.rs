//! Reporting periods.
//!
//! A [`PeriodConfig`] is resolved against the run's reference time into a concrete
//! [`ReportPeriod`]: an inclusive `[start, end]` window, a human label for the report heading
//! and a slug used in file names.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;

use crate::config::PeriodConfig;

/// A period resolved to concrete bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPeriod {
    /// File name suffix (`Semaine`, `Janvier`, ...)
    pub slug: String,
    /// Heading shown in reports
    pub label: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// 23:59:59 on `date`; the stored timestamps have second precision.
fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    start_of_day(date) + TimeDelta::days(1) - TimeDelta::seconds(1)
}

impl ReportPeriod {
    /// Resolve a configured period. Rolling periods run from midnight `days` days before `now`
    /// to the end of `now`'s day.
    pub fn resolve(config: &PeriodConfig, now: NaiveDateTime) -> Self {
        match config {
            PeriodConfig::Rolling { name, slug, days } => {
                let today = now.date();
                let first = today.checked_sub_days(Days::new(u64::from(*days))).unwrap_or(NaiveDate::MIN);
                Self {
                    slug: slug.clone(),
                    label: format!("{name} ({} - {})", first.format("%d/%m"), today.format("%d/%m/%Y")),
                    start: start_of_day(first),
                    end: end_of_day(today),
                }
            }
            PeriodConfig::Fixed { name, slug, start, end } => Self {
                slug: slug.clone(),
                label: name.clone(),
                start: *start,
                end: *end,
            },
        }
    }
}

/// Resolve every configured period, preserving order
pub fn resolve_all(configs: &[PeriodConfig], now: NaiveDateTime) -> Vec<ReportPeriod> {
    configs.iter().map(|config| ReportPeriod::resolve(config, now)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ts;

    fn rolling(days: u32) -> PeriodConfig {
        PeriodConfig::Rolling {
            name: "Dernière semaine".to_string(),
            slug: "Semaine".to_string(),
            days,
        }
    }

    #[test]
    fn test_rolling_week() {
        let period = ReportPeriod::resolve(&rolling(7), ts("2026-01-15 09:30:12"));

        assert_eq!(period.start, ts("2026-01-08 00:00:00"));
        assert_eq!(period.end, ts("2026-01-15 23:59:59"));
        assert_eq!(period.label, "Dernière semaine (08/01 - 15/01/2026)");
        assert_eq!(period.slug, "Semaine");
    }

    #[test]
    fn test_rolling_across_year_boundary() {
        let period = ReportPeriod::resolve(&rolling(7), ts("2026-01-03 00:00:00"));

        assert_eq!(period.start, ts("2025-12-27 00:00:00"));
        assert_eq!(period.end, ts("2026-01-03 23:59:59"));
        assert_eq!(period.label, "Dernière semaine (27/12 - 03/01/2026)");
    }

    #[test]
    fn test_fixed_period_is_verbatim() {
        let config = PeriodConfig::Fixed {
            name: "Janvier 2026".to_string(),
            slug: "Janvier".to_string(),
            start: ts("2026-01-01 00:00:00"),
            end: ts("2026-01-31 23:59:59"),
        };

        let period = ReportPeriod::resolve(&config, ts("2026-03-01 12:00:00"));
        assert_eq!(
            period,
            ReportPeriod {
                slug: "Janvier".to_string(),
                label: "Janvier 2026".to_string(),
                start: ts("2026-01-01 00:00:00"),
                end: ts("2026-01-31 23:59:59"),
            }
        );
    }

    #[test]
    fn test_resolve_all_keeps_order() {
        let now = ts("2026-01-15 09:30:00");
        let periods = resolve_all(&[rolling(1), crate::config::Config::default().periods[1].clone()], now);
        let slugs: Vec<_> = periods.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["Semaine", "Janvier"]);
        assert_eq!(periods[0].start, ts("2026-01-14 00:00:00"));
    }
}
