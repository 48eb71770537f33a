//! Budget period boundary math
//!
//! Computes the [start, end] window a budget's cap applies to. Boundaries
//! are recomputed on every evaluation so non-custom periods always track
//! the wall clock.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use super::BudgetPeriod;

/// Compute the current period bounds for a budget
///
/// Calendar periods are derived from `now`; custom periods pass the
/// budget's own dates through unchanged. Ends are inclusive at
/// 23:59:59.999 of the last calendar day.
pub fn period_bounds(
    period: BudgetPeriod,
    now: DateTime<Utc>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    match period {
        BudgetPeriod::Monthly => {
            let start = month_start(now.year(), now.month());
            let next = next_month(now.year(), now.month());
            (start, next - Duration::milliseconds(1))
        }
        BudgetPeriod::Quarterly => {
            let quarter = (now.month0()) / 3;
            let start_month = quarter * 3 + 1;
            let start = month_start(now.year(), start_month);
            let next = if start_month + 3 > 12 {
                month_start(now.year() + 1, 1)
            } else {
                month_start(now.year(), start_month + 3)
            };
            (start, next - Duration::milliseconds(1))
        }
        BudgetPeriod::Yearly => {
            let start = month_start(now.year(), 1);
            let next = month_start(now.year() + 1, 1);
            (start, next - Duration::milliseconds(1))
        }
        BudgetPeriod::Custom => (start_date, end_date),
    }
}

fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .expect("first of month is a valid UTC date")
}

fn next_month(year: i32, month: u32) -> DateTime<Utc> {
    if month == 12 {
        month_start(year + 1, 1)
    } else {
        month_start(year, month + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_monthly_bounds_leap_february() {
        let now = utc(2024, 2, 15, 12, 0, 0);
        let (start, end) = period_bounds(BudgetPeriod::Monthly, now, now, now);

        assert_eq!(start, utc(2024, 2, 1, 0, 0, 0));
        assert_eq!(
            end,
            utc(2024, 2, 29, 23, 59, 59) + Duration::milliseconds(999)
        );
    }

    #[test]
    fn test_monthly_bounds_december() {
        let now = utc(2023, 12, 5, 0, 0, 0);
        let (start, end) = period_bounds(BudgetPeriod::Monthly, now, now, now);

        assert_eq!(start, utc(2023, 12, 1, 0, 0, 0));
        assert_eq!(
            end,
            utc(2023, 12, 31, 23, 59, 59) + Duration::milliseconds(999)
        );
    }

    #[test]
    fn test_quarterly_bounds_q2() {
        let now = utc(2024, 5, 10, 8, 30, 0);
        let (start, end) = period_bounds(BudgetPeriod::Quarterly, now, now, now);

        assert_eq!(start, utc(2024, 4, 1, 0, 0, 0));
        assert_eq!(
            end,
            utc(2024, 6, 30, 23, 59, 59) + Duration::milliseconds(999)
        );
    }

    #[test]
    fn test_quarterly_bounds_q4_crosses_year() {
        let now = utc(2024, 11, 1, 0, 0, 0);
        let (start, end) = period_bounds(BudgetPeriod::Quarterly, now, now, now);

        assert_eq!(start, utc(2024, 10, 1, 0, 0, 0));
        assert_eq!(
            end,
            utc(2024, 12, 31, 23, 59, 59) + Duration::milliseconds(999)
        );
    }

    #[test]
    fn test_yearly_bounds() {
        let now = utc(2024, 7, 4, 0, 0, 0);
        let (start, end) = period_bounds(BudgetPeriod::Yearly, now, now, now);

        assert_eq!(start, utc(2024, 1, 1, 0, 0, 0));
        assert_eq!(
            end,
            utc(2024, 12, 31, 23, 59, 59) + Duration::milliseconds(999)
        );
    }

    #[test]
    fn test_custom_passes_budget_dates_through() {
        let now = utc(2024, 7, 4, 0, 0, 0);
        let start_date = utc(2024, 3, 1, 0, 0, 0);
        let end_date = utc(2024, 9, 1, 0, 0, 0);

        let (start, end) = period_bounds(BudgetPeriod::Custom, now, start_date, end_date);
        assert_eq!(start, start_date);
        assert_eq!(end, end_date);
    }
}
