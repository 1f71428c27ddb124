//! Server-side aggregation and the reshaping of its responses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DataViewError;

use super::formula::{FormulaOptions, FormulaResult, Operation};
use super::histogram::{Bin, HistogramOptions, HistogramResult, bin_edges, normalize};

/// Aggregation service computing data views over a whole dataset.
#[async_trait]
pub trait AggregationService: Send + Sync {
    async fn histogram(&self, dataset: &str, options: &HistogramOptions) -> Result<RemoteHistogram, DataViewError>;

    async fn formula(&self, dataset: &str, options: &FormulaOptions) -> Result<RemoteFormula, DataViewError>;
}

/// A non-empty bin as reported by the service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteBin {
    pub bin: usize,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub avg: Option<f64>,
    pub freq: f64,
}

/// Histogram response. Empty bins are omitted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteHistogram {
    #[serde(default)]
    pub bins: Vec<RemoteBin>,
    #[serde(default)]
    pub nulls: u64,
    #[serde(rename = "totalAmount", default)]
    pub total_amount: u64,
    #[serde(default)]
    pub bins_start: f64,
    #[serde(default)]
    pub bin_width: f64,
    #[serde(default)]
    pub bins_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteFormula {
    pub operation: Operation,
    pub result: Option<f64>,
    #[serde(default)]
    pub nulls: u64,
}

/// Expands a sparse service histogram into the full bin list of the local path.
pub fn reshape_histogram(remote: RemoteHistogram, options: &HistogramOptions) -> HistogramResult {
    let count = remote.bins_count.unwrap_or(options.bins);
    let end = remote.bins_start + count as f64 * remote.bin_width;
    let mut bins: Vec<Bin> = bin_edges(remote.bins_start, remote.bin_width, count, end)
        .windows(2)
        .enumerate()
        .map(|(k, e)| Bin::empty(k, e[0], e[1]))
        .collect();

    for reported in remote.bins {
        let Some(bin) = bins.get_mut(reported.bin) else {
            continue;
        };
        bin.value = reported.freq;
        bin.min = reported.min;
        bin.max = reported.max;
        bin.avg = reported.avg;
        bin.normalized = normalize(reported.freq, remote.total_amount);
    }

    HistogramResult {
        bins,
        nulls: remote.nulls,
        total_amount: remote.total_amount,
    }
}

pub fn reshape_formula(remote: RemoteFormula) -> FormulaResult {
    FormulaResult {
        result: remote.result,
        operation: remote.operation,
        null_count: remote.nulls,
    }
}
