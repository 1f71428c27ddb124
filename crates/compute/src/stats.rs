//! Field summaries consumed by the classifier.
//!
//! They normally come from the metadata service as JSON; the `from_values`
//! constructors build the same shapes from an in-memory dataset.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analysis::Statistics;

/// Upper bound on the pre-drawn sample carried by numeric stats.
pub const MAX_SAMPLE_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct NumericFieldStats {
    pub name: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub avg: Option<f64>,
    #[serde(default)]
    pub sum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<Vec<f64>>,
}

impl NumericFieldStats {
    /// Summarises `values`, keeping an evenly strided sample of at most
    /// [`MAX_SAMPLE_SIZE`] values. NaNs are ignored.
    pub fn from_values(name: impl Into<String>, values: &[f64]) -> Self {
        let values: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        let (min, max) = Statistics::min_max(&values).unzip();
        Self {
            name: name.into(),
            min,
            max,
            avg: Statistics::mean(&values),
            sum: (!values.is_empty()).then(|| Statistics::sum(&values)),
            sample: Some(strided_sample(&values, MAX_SAMPLE_SIZE)),
        }
    }
}

fn strided_sample(values: &[f64], limit: usize) -> Vec<f64> {
    if values.len() <= limit {
        return values.to_vec();
    }
    let step = values.len() as f64 / limit as f64;
    (0..limit)
        .map(|i| values[(i as f64 * step).floor() as usize])
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CategoryStat {
    pub category: String,
    pub frequency: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct CategoryFieldStats {
    pub name: String,
    pub categories: Vec<CategoryStat>,
}

impl CategoryFieldStats {
    /// Counts `values`, most frequent first; ties are ordered by name.
    pub fn from_values<'a>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for v in values {
            *counts.entry(v).or_default() += 1;
        }
        let mut categories: Vec<CategoryStat> = counts
            .into_iter()
            .map(|(category, frequency)| CategoryStat {
                category: category.to_string(),
                frequency,
            })
            .collect();
        categories.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.category.cmp(&b.category))
        });
        Self {
            name: name.into(),
            categories,
        }
    }

    pub fn top(&self, n: usize) -> &[CategoryStat] {
        &self.categories[..n.min(self.categories.len())]
    }
}

/// Either summary kind. Category stats are recognised by their `categories` list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Stats {
    Category(CategoryFieldStats),
    Numeric(NumericFieldStats),
}

impl Stats {
    pub fn name(&self) -> &str {
        match self {
            Stats::Category(s) => &s.name,
            Stats::Numeric(s) => &s.name,
        }
    }
}

impl From<NumericFieldStats> for Stats {
    fn from(s: NumericFieldStats) -> Self {
        Stats::Numeric(s)
    }
}

impl From<CategoryFieldStats> for Stats {
    fn from(s: CategoryFieldStats) -> Self {
        Stats::Category(s)
    }
}
