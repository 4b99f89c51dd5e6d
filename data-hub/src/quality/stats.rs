//! Population statistics for anomaly detection
//!
//! All statistics are over the full queried window, not rolling. Series
//! with fewer than two points or zero variance produce no outliers; a
//! degenerate input is not an error.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;

use market_common::DailyBar;

/// A dated observation in a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub session: NaiveDate,
    pub value: f64,
}

/// An observation flagged as a statistical outlier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outlier {
    pub session: NaiveDate,
    pub value: f64,
    pub z_score: f64,
}

/// Population mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0.0 for fewer than two values.
pub fn population_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mu = mean(values);
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Daily returns `close_t / close_{t-1} - 1` over bars sorted ascending.
///
/// Sessions following a zero close are skipped.
pub fn daily_returns(bars: &[DailyBar]) -> Vec<SeriesPoint> {
    bars.windows(2)
        .filter_map(|pair| {
            let prev = pair[0].close.to_f64().unwrap_or(0.0);
            let curr = pair[1].close.to_f64().unwrap_or(0.0);
            if prev == 0.0 {
                return None;
            }
            Some(SeriesPoint {
                session: pair[1].session,
                value: curr / prev - 1.0,
            })
        })
        .collect()
}

/// Volume series for bars sorted ascending.
pub fn volume_series(bars: &[DailyBar]) -> Vec<SeriesPoint> {
    bars.iter()
        .map(|bar| SeriesPoint {
            session: bar.session,
            value: bar.volume as f64,
        })
        .collect()
}

/// Points whose absolute z-score exceeds `sigma`.
pub fn detect_outliers(points: &[SeriesPoint], sigma: f64) -> Vec<Outlier> {
    if points.len() < 2 {
        return Vec::new();
    }

    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let mu = mean(&values);
    let sd = population_stddev(&values);
    if sd <= 0.0 {
        return Vec::new();
    }

    points
        .iter()
        .filter_map(|p| {
            let z = (p.value - mu) / sd;
            if z.abs() > sigma {
                Some(Outlier {
                    session: p.session,
                    value: p.value,
                    z_score: z,
                })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn point(d: u32, value: f64) -> SeriesPoint {
        SeriesPoint {
            session: date(d),
            value,
        }
    }

    fn bar_with_close(d: u32, close: i64) -> DailyBar {
        DailyBar::new(
            "TEST",
            date(d),
            Decimal::from(close),
            Decimal::from(close + 1),
            Decimal::from(close - 1),
            Decimal::from(close),
            1_000,
        )
    }

    #[test]
    fn test_mean_and_stddev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-12);
        assert!((population_stddev(&values) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_daily_returns() {
        let bars = vec![bar_with_close(4, 100), bar_with_close(5, 110), bar_with_close(6, 99)];
        let returns = daily_returns(&bars);
        assert_eq!(returns.len(), 2);
        assert!((returns[0].value - 0.10).abs() < 1e-12);
        assert!((returns[1].value + 0.10).abs() < 1e-12);
        assert_eq!(returns[0].session, date(5));
    }

    #[test]
    fn test_single_extreme_point_is_flagged() {
        // Ten quiet points and one wildly out-of-band value
        let mut points: Vec<SeriesPoint> = (1..=10)
            .map(|d| point(d, if d % 2 == 0 { 0.01 } else { -0.01 }))
            .collect();
        points.push(point(11, 2.0));

        let outliers = detect_outliers(&points, 3.0);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].session, date(11));
        assert!(outliers[0].z_score > 3.0);
    }

    #[test]
    fn test_zero_variance_produces_no_outliers() {
        let points: Vec<SeriesPoint> = (1..=10).map(|d| point(d, 0.5)).collect();
        assert!(detect_outliers(&points, 3.0).is_empty());
    }

    #[test]
    fn test_fewer_than_two_points_produces_no_outliers() {
        assert!(detect_outliers(&[point(1, 100.0)], 3.0).is_empty());
        assert!(detect_outliers(&[], 3.0).is_empty());
    }
}
