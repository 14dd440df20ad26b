//! Tests for effective periods, lifecycle state, and calendar windows

use chrono::NaiveDate;
use core_kernel::{age_on, is_in_force, EffectivePeriod, Lifecycle, PeriodType, TemporalError, Timezone};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

mod effective_period {
    use super::*;

    #[test]
    fn test_rejects_inverted_range() {
        let result = EffectivePeriod::new(date(2024, 6, 1), Some(date(2024, 1, 1)));
        assert!(matches!(result, Err(TemporalError::InvalidPeriod { .. })));
    }

    #[test]
    fn test_single_day_period() {
        let period = EffectivePeriod::new(date(2024, 6, 1), Some(date(2024, 6, 1))).unwrap();
        assert!(period.contains(date(2024, 6, 1)));
        assert!(!period.contains(date(2024, 6, 2)));
    }

    #[test]
    fn test_open_ended_contains_future() {
        let period = EffectivePeriod::starting(date(2020, 1, 1));
        assert!(period.contains(date(2099, 12, 31)));
        assert!(!period.contains(date(2019, 12, 31)));
    }

    #[test]
    fn test_overlaps() {
        let a = EffectivePeriod::new(date(2024, 1, 1), Some(date(2024, 6, 30))).unwrap();
        let b = EffectivePeriod::starting(date(2024, 6, 30));
        let c = EffectivePeriod::starting(date(2024, 7, 1));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}

mod lifecycle {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for state in [Lifecycle::Draft, Lifecycle::Active, Lifecycle::Retired] {
            assert_eq!(state.as_str().parse::<Lifecycle>().unwrap(), state);
        }
    }

    #[test]
    fn test_retired_never_in_force() {
        let period = EffectivePeriod::starting(date(2000, 1, 1));
        assert!(!is_in_force(Lifecycle::Retired, &period, date(2024, 1, 1)));
    }
}

mod windows {
    use super::*;

    #[test]
    fn test_daily_window_is_single_day() {
        let w = PeriodType::Daily.window(date(2024, 5, 5));
        assert_eq!(w.start, w.end);
    }

    #[test]
    fn test_yearly_window() {
        let w = PeriodType::Yearly.window(date(2024, 5, 5));
        assert_eq!(w.start, date(2024, 1, 1));
        assert_eq!(w.end, date(2024, 12, 31));
    }

    #[test]
    fn test_monthly_window_december() {
        let w = PeriodType::Monthly.window(date(2024, 12, 15));
        assert_eq!(w.start, date(2024, 12, 1));
        assert_eq!(w.end, date(2024, 12, 31));
    }

    #[test]
    fn test_period_type_parse() {
        assert_eq!("weekly".parse::<PeriodType>().unwrap(), PeriodType::Weekly);
        assert!("fortnightly".parse::<PeriodType>().is_err());
    }
}

mod ages {
    use super::*;

    #[test]
    fn test_age_before_birthday() {
        assert_eq!(age_on(date(1954, 6, 10), date(2024, 6, 9)), Some(69));
    }

    #[test]
    fn test_age_on_birthday() {
        assert_eq!(age_on(date(1954, 6, 10), date(2024, 6, 10)), Some(70));
    }

    #[test]
    fn test_age_before_birth_is_none() {
        assert_eq!(age_on(date(2024, 6, 10), date(2024, 1, 1)), None);
    }
}

mod timezone {
    use super::*;

    #[test]
    fn test_parse_known_zone() {
        let tz = Timezone::parse("Asia/Tehran").unwrap();
        assert_eq!(tz.0, chrono_tz::Asia::Tehran);
    }

    #[test]
    fn test_parse_unknown_zone() {
        assert!(matches!(Timezone::parse("Mars/Olympus"), Err(TemporalError::InvalidTimezone(_))));
    }
}
