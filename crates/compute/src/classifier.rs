//! Class breaks for numeric attributes.
//!
//! Breaks come either from precomputed [`Stats`] or from a live pull of the
//! features currently on screen. Live origins always take the viewport path.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use layers::ViewportFeatures;
use scene::components::numeric_property;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::analysis::Statistics;
use crate::error::ClassifierError;
use crate::stats::{CategoryStat, NumericFieldStats, Stats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMethod {
    Quantiles,
    Equal,
    Stdev,
}

impl FromStr for ClassificationMethod {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quantiles" => Ok(Self::Quantiles),
            "equal" => Ok(Self::Equal),
            "stdev" => Ok(Self::Stdev),
            other => Err(ClassifierError::UnsupportedMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassifierOptions {
    /// Width of one stdev class, in standard deviations.
    pub stdev_class_size: f64,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            stdev_class_size: 1.0,
        }
    }
}

pub enum DataOrigin {
    Stats(Stats),
    Live(Arc<dyn ViewportFeatures>),
}

impl fmt::Debug for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataOrigin::Stats(s) => f.debug_tuple("Stats").field(s).finish(),
            DataOrigin::Live(_) => f.write_str("Live(..)"),
        }
    }
}

#[derive(Debug)]
pub struct Classifier {
    origin: DataOrigin,
    attribute: String,
    options: ClassifierOptions,
}

impl Classifier {
    pub fn from_stats(stats: impl Into<Stats>) -> Self {
        let stats = stats.into();
        Self {
            attribute: stats.name().to_string(),
            origin: DataOrigin::Stats(stats),
            options: ClassifierOptions::default(),
        }
    }

    pub fn from_source(source: Arc<dyn ViewportFeatures>, attribute: impl Into<String>) -> Self {
        Self {
            origin: DataOrigin::Live(source),
            attribute: attribute.into(),
            options: ClassifierOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ClassifierOptions) -> Self {
        self.options = options;
        self
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn is_live(&self) -> bool {
        matches!(self.origin, DataOrigin::Live(_))
    }

    /// `n_breaks` ascending break values for the attribute.
    ///
    /// `viewport` is only meaningful for live origins, which are always
    /// viewport-scoped; asking it of stats is a configuration error.
    pub async fn breaks(
        &self,
        n_breaks: usize,
        method: ClassificationMethod,
        viewport: bool,
    ) -> Result<Vec<f64>, ClassifierError> {
        if n_breaks == 0 {
            return Ok(Vec::new());
        }
        match &self.origin {
            DataOrigin::Live(source) => self.viewport_breaks(source.as_ref(), n_breaks, method).await,
            DataOrigin::Stats(_) if viewport => Err(ClassifierError::ViewportRequiresSource),
            DataOrigin::Stats(Stats::Numeric(stats)) => self.stats_breaks(stats, n_breaks, method),
            DataOrigin::Stats(Stats::Category(_)) => {
                Err(ClassifierError::NotNumeric(self.attribute.clone()))
            }
        }
    }

    fn stats_breaks(
        &self,
        stats: &NumericFieldStats,
        n_breaks: usize,
        method: ClassificationMethod,
    ) -> Result<Vec<f64>, ClassifierError> {
        let missing_sample = || ClassifierError::MissingSample {
            attribute: self.attribute.clone(),
            method,
        };
        match method {
            ClassificationMethod::Quantiles => {
                let sample = stats.sample.as_deref().ok_or_else(missing_sample)?;
                Ok(quantile_breaks(sample, n_breaks))
            }
            ClassificationMethod::Equal => match (stats.min, stats.max) {
                (Some(min), Some(max)) => Ok(equal_interval_breaks(min, max, n_breaks)),
                _ => Err(ClassifierError::MissingRange {
                    attribute: self.attribute.clone(),
                }),
            },
            ClassificationMethod::Stdev => {
                let sample = stats.sample.as_deref().ok_or_else(missing_sample)?;
                let Some(avg) = stats.avg.or_else(|| Statistics::mean(sample)) else {
                    return Ok(Vec::new());
                };
                Ok(stdev_breaks(sample, avg, n_breaks, self.options.stdev_class_size))
            }
        }
    }

    async fn viewport_breaks(
        &self,
        source: &dyn ViewportFeatures,
        n_breaks: usize,
        method: ClassificationMethod,
    ) -> Result<Vec<f64>, ClassifierError> {
        let values = match self.viewport_values(source).await {
            Ok(values) => values,
            Err(err) if method == ClassificationMethod::Quantiles => return Err(err),
            Err(err) => {
                warn!("viewport data for `{}` unavailable: {err}", self.attribute);
                Vec::new()
            }
        };
        if values.is_empty() {
            debug!("no viewport values for `{}`", self.attribute);
            return Ok(Vec::new());
        }

        Ok(match method {
            ClassificationMethod::Quantiles => quantile_breaks(&values, n_breaks),
            ClassificationMethod::Equal => match Statistics::min_max(&values) {
                Some((min, max)) => equal_interval_breaks(min, max, n_breaks),
                None => Vec::new(),
            },
            ClassificationMethod::Stdev => match Statistics::mean(&values) {
                Some(avg) => stdev_breaks(&values, avg, n_breaks, self.options.stdev_class_size),
                None => Vec::new(),
            },
        })
    }

    async fn viewport_values(&self, source: &dyn ViewportFeatures) -> Result<Vec<f64>, ClassifierError> {
        let rows = source
            .viewport_features(std::slice::from_ref(&self.attribute))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|p| numeric_property(p, &self.attribute))
            .filter(|v| !v.is_nan())
            .collect())
    }

    /// The `top` most frequent categories of the attribute.
    pub async fn categories(&self, top: usize) -> Result<Vec<CategoryStat>, ClassifierError> {
        match &self.origin {
            DataOrigin::Stats(Stats::Category(stats)) => Ok(stats.top(top).to_vec()),
            DataOrigin::Stats(Stats::Numeric(_)) => {
                Err(ClassifierError::NotCategorical(self.attribute.clone()))
            }
            DataOrigin::Live(source) => {
                let rows = source
                    .viewport_features(std::slice::from_ref(&self.attribute))
                    .await?;
                let mut counts: HashMap<String, u64> = HashMap::new();
                for value in rows.iter().filter_map(|p| p.get(&self.attribute)) {
                    let key = match value {
                        Value::Null => continue,
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    *counts.entry(key).or_default() += 1;
                }
                let mut categories: Vec<CategoryStat> = counts
                    .into_iter()
                    .map(|(category, frequency)| CategoryStat { category, frequency })
                    .collect();
                categories.sort_by(|a, b| {
                    b.frequency
                        .cmp(&a.frequency)
                        .then_with(|| a.category.cmp(&b.category))
                });
                categories.truncate(top);
                Ok(categories)
            }
        }
    }
}

/// For `i = 1..=n`, the value at `floor(i / (n + 1) * len) - 1` (clamped to 0)
/// of the ascending sample.
pub fn quantile_breaks(sample: &[f64], n_breaks: usize) -> Vec<f64> {
    let sorted = Statistics::sorted(sample);
    if sorted.is_empty() {
        return Vec::new();
    }
    let len = sorted.len() as f64;
    (1..=n_breaks)
        .map(|i| {
            let p = i as f64 / (n_breaks + 1) as f64;
            let index = ((p * len).floor() as usize).saturating_sub(1);
            sorted[index.min(sorted.len() - 1)]
        })
        .collect()
}

/// `n` breaks splitting `[min, max]` into `n + 1` classes of equal width.
pub fn equal_interval_breaks(min: f64, max: f64, n_breaks: usize) -> Vec<f64> {
    let width = (max - min) / (n_breaks + 1) as f64;
    (1..=n_breaks).map(|i| min + width * i as f64).collect()
}

/// Breaks stepping outward from `avg` by `class_size` standard deviations.
///
/// An odd class count centres one class on the mean; an even count starts
/// from the mean itself. Zero variance yields the mean alone.
pub fn stdev_breaks(sample: &[f64], avg: f64, n_breaks: usize, class_size: f64) -> Vec<f64> {
    let Some(stdev) = Statistics::population_std_dev(sample, avg) else {
        return Vec::new();
    };
    let unit = stdev * class_size;
    let mut factor = if (n_breaks + 1) % 2 == 0 { 0.0 } else { 1.0 };
    let mut steps = Vec::new();
    let mut breaks = Vec::new();

    while breaks.len() < n_breaks {
        steps.push(avg + factor * unit);
        steps.push(avg - factor * unit);
        breaks = steps.clone();
        breaks.sort_by(f64::total_cmp);
        breaks.dedup();
        // A zero or non-finite step would never produce new breaks.
        if unit == 0.0 || !unit.is_finite() {
            break;
        }
        factor += 1.0;
    }
    breaks
}
