use crate::domain::errors::ForecastError;
use crate::domain::market::time_series::{Bar, TimeSeries};
use ndarray::Array2;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A numeric field extracted from each bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
}

impl PriceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
        }
    }

    fn extract(&self, bar: &Bar) -> Option<f64> {
        let value = match self {
            PriceField::Open => bar.open,
            PriceField::High => bar.high,
            PriceField::Low => bar.low,
            PriceField::Close => bar.close,
        };
        value.to_f64()
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PriceField {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(PriceField::Open),
            "high" => Ok(PriceField::High),
            "low" => Ok(PriceField::Low),
            "close" => Ok(PriceField::Close),
            other => Err(ForecastError::MalformedFeatureSet {
                reason: format!("unknown feature '{}'", other),
            }),
        }
    }
}

/// Ordered list of model input features.
///
/// This order MUST match the order the model was trained with.
/// Scaling parameters and predictor outputs are positional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet(Vec<PriceField>);

impl FeatureSet {
    pub fn new(fields: Vec<PriceField>) -> Result<Self, ForecastError> {
        if fields.is_empty() {
            return Err(ForecastError::MalformedFeatureSet {
                reason: "feature set is empty".to_string(),
            });
        }
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].contains(field) {
                return Err(ForecastError::MalformedFeatureSet {
                    reason: format!("duplicate feature '{}'", field),
                });
            }
        }
        if !fields.contains(&PriceField::Close) {
            return Err(ForecastError::MalformedFeatureSet {
                reason: "feature set must include 'close'".to_string(),
            });
        }
        Ok(Self(fields))
    }

    /// Close price only.
    pub fn close_only() -> Self {
        Self(vec![PriceField::Close])
    }

    /// Parses a comma separated list such as `"open,high,low,close"`.
    pub fn parse(list: &str) -> Result<Self, ForecastError> {
        let fields = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(PriceField::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(fields)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|f| f.as_str().to_string()).collect()
    }

    /// Column holding the close price.
    pub fn close_index(&self) -> usize {
        self.0
            .iter()
            .position(|f| *f == PriceField::Close)
            .unwrap_or(0)
    }

    /// Builds the `[bars, features]` matrix in feature order.
    pub fn extract(&self, series: &TimeSeries) -> Result<Array2<f64>, ForecastError> {
        if series.is_empty() {
            return Err(ForecastError::EmptySeries);
        }

        let mut values = Vec::with_capacity(series.len() * self.0.len());
        for bar in series.bars() {
            for field in &self.0 {
                let value = field.extract(bar).ok_or_else(|| ForecastError::InvalidSeries {
                    reason: format!("{} at {} is not representable", field, bar.timestamp),
                })?;
                values.push(value);
            }
        }

        Array2::from_shape_vec((series.len(), self.0.len()), values).map_err(|e| {
            ForecastError::InvalidSeries {
                reason: e.to_string(),
            }
        })
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_keeps_order() {
        let features = FeatureSet::parse("open, high,low,CLOSE").unwrap();
        assert_eq!(features.len(), 4);
        assert_eq!(features.close_index(), 3);
        assert_eq!(features.to_string(), "open,high,low,close");
    }

    #[test]
    fn test_rejects_malformed_sets() {
        assert!(FeatureSet::parse("").is_err());
        assert!(FeatureSet::parse("open,high").is_err());
        assert!(FeatureSet::parse("close,close").is_err());
        assert!(FeatureSet::parse("close,volume").is_err());
    }

    #[test]
    fn test_extract_matrix_in_feature_order() {
        let bar = Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            open: dec!(1.5),
            high: dec!(3),
            low: dec!(1),
            close: dec!(2),
        };
        let series = TimeSeries::new("AAPL", vec![bar]).unwrap();
        let features = FeatureSet::new(vec![PriceField::Close, PriceField::Open]).unwrap();

        let matrix = features.extract(&series).unwrap();
        assert_eq!(matrix.shape(), &[1, 2]);
        assert_eq!(matrix[[0, 0]], 2.0);
        assert_eq!(matrix[[0, 1]], 1.5);
    }
}
