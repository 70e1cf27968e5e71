//! Daily return series construction.
//!
//! A [`PriceFrame`] is the column-oriented input handed over by whatever
//! collaborator reads files; [`ReturnSeries`] is the validated, date-ordered
//! series of percentage returns every analysis in this crate consumes.

use crate::errors::{validate_same_length, PowerLawError, PowerLawResult};
use chrono::NaiveDate;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Column-oriented OHLCV input. Only `date` and `close` are required.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PriceFrame {
    /// Observation dates
    pub date: Option<Vec<NaiveDate>>,
    /// Opening prices
    pub open: Option<Vec<f64>>,
    /// Session highs
    pub high: Option<Vec<f64>>,
    /// Session lows
    pub low: Option<Vec<f64>>,
    /// Closing prices
    pub close: Option<Vec<f64>>,
    /// Traded volume
    pub volume: Option<Vec<f64>>,
}

impl PriceFrame {
    /// Build a frame from a close-only source such as a volatility index.
    ///
    /// Open, high and low are set to the close and volume to zero.
    pub fn from_close_only(dates: Vec<NaiveDate>, closes: Vec<f64>) -> Self {
        Self {
            open: Some(closes.clone()),
            high: Some(closes.clone()),
            low: Some(closes.clone()),
            volume: Some(vec![0.0; closes.len()]),
            date: Some(dates),
            close: Some(closes),
        }
    }

    /// Number of rows, taken from the date column.
    pub fn len(&self) -> usize {
        self.date.as_ref().map_or(0, Vec::len)
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a series starts.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StartDate {
    /// Use the conventional start date for a named asset
    Auto(String),
    /// Drop every row before this date
    Fixed(NaiveDate),
    /// Keep the full history
    Unfiltered,
}

impl StartDate {
    /// Resolve the cut-off date, if any.
    ///
    /// Asset names are matched case-insensitively after stripping the
    /// `_d.csv`, `_us` and `_v` decorations used by the usual data dumps.
    /// The S&P 500 dump is named `_spx_d.csv`, and only that spelling gets the
    /// 1920 cut-off.
    pub fn resolve(&self) -> Option<NaiveDate> {
        match self {
            StartDate::Fixed(date) => Some(*date),
            StartDate::Unfiltered => None,
            StartDate::Auto(name) => {
                let key = name
                    .replace("_d.csv", "")
                    .replace("_us", "")
                    .replace("_v", "")
                    .to_uppercase();
                match key.as_str() {
                    "_SPX" => NaiveDate::from_ymd_opt(1920, 1, 1),
                    "ETH" => NaiveDate::from_ymd_opt(2016, 1, 1),
                    "XAUUSD" | "XAGUSD" => NaiveDate::from_ymd_opt(1975, 1, 1),
                    _ => None,
                }
            }
        }
    }
}

/// Loader configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoaderConfig {
    /// Start-date policy
    pub start_date: StartDate,
    /// Rows whose absolute return reaches this bound (percent) are dropped
    pub max_abs_return: f64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            start_date: StartDate::Unfiltered,
            max_abs_return: 100.0,
        }
    }
}

impl LoaderConfig {
    /// Loader using the conventional start date for `asset`.
    pub fn for_asset(asset: &str) -> Self {
        Self {
            start_date: StartDate::Auto(asset.to_string()),
            ..Self::default()
        }
    }
}

/// Date-ordered daily percentage returns with their closing prices.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReturnSeries {
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
    returns: Vec<f64>,
}

impl ReturnSeries {
    /// Build from a price frame.
    ///
    /// Sorts by date, rejects duplicate dates, derives
    /// `return[t] = (close[t] / close[t-1] - 1) * 100`, drops the first row,
    /// removes outliers and applies the start date.
    pub fn from_frame(frame: &PriceFrame, config: &LoaderConfig) -> PowerLawResult<Self> {
        let dates = frame.date.as_ref().ok_or_else(|| PowerLawError::MissingInput {
            field: "date".to_string(),
        })?;
        let closes = frame.close.as_ref().ok_or_else(|| PowerLawError::MissingInput {
            field: "close".to_string(),
        })?;
        validate_same_length(dates.len(), closes.len(), "close")?;

        let mut rows: Vec<(NaiveDate, f64)> =
            dates.iter().copied().zip(closes.iter().copied()).collect();
        rows.sort_by_key(|(date, _)| *date);
        if let Some(index) = rows.windows(2).position(|w| w[0].0 == w[1].0) {
            return Err(PowerLawError::UnorderedSeries { index: index + 1 });
        }

        let cutoff = config.start_date.resolve();
        let mut out_dates = Vec::with_capacity(rows.len());
        let mut out_closes = Vec::with_capacity(rows.len());
        let mut out_returns = Vec::with_capacity(rows.len());
        let mut dropped = 0usize;

        for pair in rows.windows(2) {
            let (_, prev_close) = pair[0];
            let (date, close) = pair[1];
            let ret = (close / prev_close - 1.0) * 100.0;
            if !ret.is_finite() || ret.abs() >= config.max_abs_return {
                dropped += 1;
                continue;
            }
            if cutoff.is_some_and(|c| date < c) {
                continue;
            }
            out_dates.push(date);
            out_closes.push(close);
            out_returns.push(ret);
        }

        if dropped > 0 {
            log::warn!("Dropped {} rows with non-finite or extreme returns", dropped);
        }
        if let (Some(first), Some(last)) = (out_dates.first(), out_dates.last()) {
            log::info!("Loaded {} days from {} to {}", out_dates.len(), first, last);
        }

        Ok(Self {
            dates: out_dates,
            closes: out_closes,
            returns: out_returns,
        })
    }

    /// Build directly from aligned, already-ordered columns.
    pub fn from_parts(
        dates: Vec<NaiveDate>,
        closes: Vec<f64>,
        returns: Vec<f64>,
    ) -> PowerLawResult<Self> {
        validate_same_length(dates.len(), closes.len(), "closes")?;
        validate_same_length(dates.len(), returns.len(), "returns")?;
        if let Some(index) = dates.windows(2).position(|w| w[0] >= w[1]) {
            return Err(PowerLawError::UnorderedSeries { index: index + 1 });
        }
        Ok(Self {
            dates,
            closes,
            returns,
        })
    }

    /// Observation dates.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Closing prices aligned with [`returns`](Self::returns).
    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    /// Daily percentage returns.
    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    /// Number of days.
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    /// True when the series has no days.
    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// The `len` returns strictly before day `end`, if that much history exists.
    pub fn window(&self, end: usize, len: usize) -> Option<&[f64]> {
        if end < len || end > self.returns.len() {
            None
        } else {
            Some(&self.returns[end - len..end])
        }
    }

    /// Owned copy of days `start..`.
    pub fn tail_from(&self, start: usize) -> Self {
        let start = start.min(self.len());
        Self {
            dates: self.dates[start..].to_vec(),
            closes: self.closes[start..].to_vec(),
            returns: self.returns[start..].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_returns_are_percent_changes() {
        let frame = PriceFrame::from_close_only(
            vec![day(2020, 1, 3), day(2020, 1, 1), day(2020, 1, 2)],
            vec![99.0, 100.0, 110.0],
        );
        let series = ReturnSeries::from_frame(&frame, &LoaderConfig::default()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.dates()[0], day(2020, 1, 2));
        assert_approx_eq!(series.returns()[0], 10.0);
        assert_approx_eq!(series.returns()[1], -10.0);
        assert_approx_eq!(series.closes()[1], 99.0);
    }

    #[test]
    fn test_missing_columns_are_fatal() {
        let frame = PriceFrame {
            date: Some(vec![day(2020, 1, 1)]),
            ..Default::default()
        };
        match ReturnSeries::from_frame(&frame, &LoaderConfig::default()) {
            Err(PowerLawError::MissingInput { field }) => assert_eq!(field, "close"),
            other => panic!("Expected MissingInput, got {:?}", other),
        }

        let frame = PriceFrame {
            close: Some(vec![1.0]),
            ..Default::default()
        };
        assert!(matches!(
            ReturnSeries::from_frame(&frame, &LoaderConfig::default()),
            Err(PowerLawError::MissingInput { .. })
        ));
    }

    #[test]
    fn test_duplicate_dates_rejected() {
        let frame = PriceFrame::from_close_only(
            vec![day(2020, 1, 1), day(2020, 1, 2), day(2020, 1, 2)],
            vec![1.0, 2.0, 3.0],
        );
        assert!(matches!(
            ReturnSeries::from_frame(&frame, &LoaderConfig::default()),
            Err(PowerLawError::UnorderedSeries { index: 2 })
        ));
    }

    #[test]
    fn test_outliers_and_start_date_filtered() {
        let frame = PriceFrame::from_close_only(
            vec![day(2015, 12, 30), day(2015, 12, 31), day(2016, 1, 4), day(2016, 1, 5)],
            vec![10.0, 11.0, 25.0, 24.0],
        );
        let series = ReturnSeries::from_frame(&frame, &LoaderConfig::for_asset("eth_v_d.csv")).unwrap();
        // 11 -> 25 is +127% and dropped, 2015 row is before the ETH start
        assert_eq!(series.len(), 1);
        assert_eq!(series.dates()[0], day(2016, 1, 5));
        assert!(series.returns().iter().all(|r| r.abs() < 100.0));
    }

    #[test]
    fn test_auto_start_dates() {
        assert_eq!(StartDate::Auto("_spx_d.csv".into()).resolve(), Some(day(1920, 1, 1)));
        assert_eq!(StartDate::Auto("_SPX_d.csv".into()).resolve(), Some(day(1920, 1, 1)));
        assert_eq!(StartDate::Auto("spx_d.csv".into()).resolve(), None);
        assert_eq!(StartDate::Auto("xauusd_d.csv".into()).resolve(), Some(day(1975, 1, 1)));
        assert_eq!(StartDate::Auto("ndx_d.csv".into()).resolve(), None);
    }

    #[test]
    fn test_window_is_strictly_before_end() {
        let series = ReturnSeries::from_parts(
            vec![day(2020, 1, 1), day(2020, 1, 2), day(2020, 1, 3)],
            vec![1.0, 1.0, 1.0],
            vec![0.1, 0.2, 0.3],
        )
        .unwrap();
        assert_eq!(series.window(2, 2), Some(&[0.1, 0.2][..]));
        assert_eq!(series.window(1, 2), None);
        assert_eq!(series.tail_from(1).returns(), &[0.2, 0.3]);
    }
}
