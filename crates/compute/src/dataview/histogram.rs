use scene::components::Properties;
use serde::{Deserialize, Serialize};

use crate::analysis::Statistics;
use crate::error::DataViewError;

use super::{DEFAULT_CLUSTER_COUNT_PROPERTY, read_numeric};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HistogramOptions {
    pub column: String,
    pub bins: usize,
    /// Domain start; derived from the data when absent.
    pub start: Option<f64>,
    pub end: Option<f64>,
    /// Column holding the value on pre-aggregated (clustered) features.
    pub aggregated_column: Option<String>,
    /// Per-feature weight on clustered features.
    pub cluster_count_property: String,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            column: String::new(),
            bins: 10,
            start: None,
            end: None,
            aggregated_column: None,
            cluster_count_property: DEFAULT_CLUSTER_COUNT_PROPERTY.to_string(),
        }
    }
}

impl HistogramOptions {
    pub fn new(column: impl Into<String>, bins: usize) -> Self {
        Self {
            column: column.into(),
            bins,
            ..Default::default()
        }
    }

    pub fn with_range(mut self, start: f64, end: f64) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Properties a local histogram reads from each feature.
    pub fn required_properties(&self) -> Vec<String> {
        let mut props = vec![self.column.clone()];
        props.extend(self.aggregated_column.iter().cloned());
        props.push(self.cluster_count_property.clone());
        props
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub bin: usize,
    pub start: f64,
    pub end: f64,
    /// Weighted count of values in `[start, end)`.
    pub value: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    /// `value` over the total feature count.
    pub normalized: f64,
}

impl Bin {
    pub(crate) fn empty(bin: usize, start: f64, end: f64) -> Self {
        Self {
            bin,
            start,
            end,
            value: 0.0,
            min: None,
            max: None,
            avg: None,
            normalized: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramResult {
    pub bins: Vec<Bin>,
    pub nulls: u64,
    pub total_amount: u64,
}

/// `count + 1` shared bin edges from `start` in steps of `width`, the last
/// pinned to `end`. Adjacent bins always meet at the same edge.
pub(crate) fn bin_edges(start: f64, width: f64, count: usize, end: f64) -> Vec<f64> {
    (0..=count)
        .map(|k| if k == count { end } else { start + k as f64 * width })
        .collect()
}

pub(crate) fn normalize(value: f64, total_amount: u64) -> f64 {
    if total_amount == 0 {
        0.0
    } else {
        value / total_amount as f64
    }
}

/// Buckets `features` into `options.bins` equal-width bins.
///
/// Bins are half-open except the last, which also takes the domain end.
/// Non-null values outside the domain are dropped: they count neither as a
/// bin value nor as null, only toward `total_amount`.
pub fn histogram(features: &[Properties], options: &HistogramOptions) -> Result<HistogramResult, DataViewError> {
    if options.bins == 0 {
        return Err(DataViewError::InvalidBins);
    }

    let mut nulls = 0;
    let mut samples = Vec::with_capacity(features.len());
    for props in features {
        let column = options
            .aggregated_column
            .as_deref()
            .filter(|c| props.contains_key(*c))
            .unwrap_or(&options.column);
        match read_numeric(props, column)? {
            Some(v) => {
                let weight = read_numeric(props, &options.cluster_count_property)?.unwrap_or(1.0);
                samples.push((v, weight));
            }
            None => nulls += 1,
        }
    }
    let total_amount = features.len() as u64;

    let values: Vec<f64> = samples.iter().map(|(v, _)| *v).collect();
    let (start, end) = match (options.start, options.end, Statistics::min_max(&values)) {
        (Some(s), Some(e), _) => (s, e),
        (s, e, Some((min, max))) => (s.unwrap_or(min), e.unwrap_or(max)),
        (_, _, None) => {
            return Ok(HistogramResult {
                bins: Vec::new(),
                nulls,
                total_amount,
            });
        }
    };

    let width = (end - start) / options.bins as f64;
    let edges = bin_edges(start, width, options.bins, end);
    let mut bins: Vec<Bin> = edges
        .windows(2)
        .enumerate()
        .map(|(k, e)| Bin::empty(k, e[0], e[1]))
        .collect();
    let mut members: Vec<Vec<f64>> = vec![Vec::new(); options.bins];

    // Interior edges at or below `v` give its bin; `end` lands in the last one.
    let interior = &edges[1..options.bins];
    for (v, weight) in samples {
        if v < start || v > end {
            continue;
        }
        let k = interior.partition_point(|e| *e <= v);
        bins[k].value += weight;
        members[k].push(v);
    }

    for (bin, values) in bins.iter_mut().zip(&members) {
        if let Some((min, max)) = Statistics::min_max(values) {
            bin.min = Some(min);
            bin.max = Some(max);
        }
        bin.avg = Statistics::mean(values);
        bin.normalized = normalize(bin.value, total_amount);
    }

    Ok(HistogramResult {
        bins,
        nulls,
        total_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::{HistogramOptions, histogram};
    use crate::error::DataViewError;
    use pretty_assertions::assert_eq;
    use scene::components::Properties;
    use serde_json::{Value, json};

    fn features(values: &[Value]) -> Vec<Properties> {
        values
            .iter()
            .map(|v| json!({ "pop": v }).as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn buckets_and_counts_nulls() {
        let data = features(&[json!(10), json!(20), Value::Null, json!(40), json!(50)]);
        let result = histogram(&data, &HistogramOptions::new("pop", 2).with_range(0.0, 50.0)).unwrap();

        assert_eq!(result.nulls, 1);
        assert_eq!(result.total_amount, 5);
        assert_eq!(result.bins.len(), 2);

        let first = &result.bins[0];
        assert_eq!((first.start, first.end, first.value), (0.0, 25.0, 2.0));
        assert_eq!(first.avg, Some(15.0));
        assert_eq!((first.min, first.max), (Some(10.0), Some(20.0)));
        assert!((first.normalized - 0.4).abs() < 1e-12);

        let second = &result.bins[1];
        assert_eq!((second.start, second.end, second.value), (25.0, 50.0, 2.0));
        assert_eq!(second.avg, Some(45.0));

        let counted: f64 = result.bins.iter().map(|b| b.value).sum();
        assert_eq!(counted as u64 + result.nulls, result.total_amount);
    }

    #[test]
    fn domain_defaults_to_data_range() {
        let data = features(&[json!(1), json!(3), json!(5), json!(9)]);
        let result = histogram(&data, &HistogramOptions::new("pop", 4)).unwrap();
        let starts: Vec<f64> = result.bins.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![1.0, 3.0, 5.0, 7.0]);
        let counts: Vec<f64> = result.bins.iter().map(|b| b.value).collect();
        assert_eq!(counts, vec![1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn out_of_range_values_are_dropped() {
        let data = features(&[json!(-5), json!(5), json!(500)]);
        let result = histogram(&data, &HistogramOptions::new("pop", 1).with_range(0.0, 10.0)).unwrap();
        assert_eq!(result.bins[0].value, 1.0);
        assert_eq!(result.nulls, 0);
        assert_eq!(result.total_amount, 3);
    }

    #[test]
    fn clustered_features_are_weighted() {
        let data = vec![
            json!({ "pop_avg": 4, "pop": 1, "_cdb_feature_count": 3 }).as_object().cloned().unwrap(),
            json!({ "pop": 6 }).as_object().cloned().unwrap(),
        ];
        let mut options = HistogramOptions::new("pop", 1).with_range(0.0, 10.0);
        options.aggregated_column = Some("pop_avg".into());
        let result = histogram(&data, &options).unwrap();
        assert_eq!(result.bins[0].value, 4.0);
        assert_eq!(result.bins[0].avg, Some(5.0));
        assert_eq!(result.bins[0].normalized, 2.0);
    }

    #[test]
    fn non_numeric_cluster_count_is_rejected() {
        let data = vec![json!({ "pop": 4, "_cdb_feature_count": "three" }).as_object().cloned().unwrap()];
        assert_eq!(
            histogram(&data, &HistogramOptions::new("pop", 1)).unwrap_err(),
            DataViewError::NonNumeric {
                column: "_cdb_feature_count".into(),
                found: "\"three\"".into()
            }
        );
    }

    #[test]
    fn values_on_inexact_edges_are_binned() {
        let result = histogram(&features(&[json!(0.6)]), &HistogramOptions::new("pop", 10).with_range(0.0, 1.0)).unwrap();
        let hit: Vec<_> = result.bins.iter().filter(|b| b.value > 0.0).collect();
        assert_eq!(hit.len(), 1);
        assert!(hit[0].start <= 0.6 && 0.6 < hit[0].end);

        let values: Vec<Value> = (0..=100).map(|i| json!(f64::from(i) / 100.0)).collect();
        let result = histogram(&features(&values), &HistogramOptions::new("pop", 10).with_range(0.0, 1.0)).unwrap();
        let counted: f64 = result.bins.iter().map(|b| b.value).sum();
        assert_eq!(counted, 101.0);
        for pair in result.bins.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(result.bins[9].end, 1.0);
    }

    #[test]
    fn constant_column_fills_last_bin() {
        let data = features(&[json!(7), json!(7)]);
        let result = histogram(&data, &HistogramOptions::new("pop", 3)).unwrap();
        assert_eq!(result.bins[2].value, 2.0);
        assert_eq!(result.bins[0].value, 0.0);
    }

    #[test]
    fn empty_input_has_no_bins() {
        let result = histogram(&features(&[Value::Null]), &HistogramOptions::new("pop", 3)).unwrap();
        assert!(result.bins.is_empty());
        assert_eq!(result.nulls, 1);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            histogram(&[], &HistogramOptions::new("pop", 0)).unwrap_err(),
            DataViewError::InvalidBins
        );
        assert!(matches!(
            histogram(&features(&[json!("ten")]), &HistogramOptions::new("pop", 2)),
            Err(DataViewError::NonNumeric { .. })
        ));
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = histogram(&features(&[json!(1)]), &HistogramOptions::new("pop", 1)).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["totalAmount"], json!(1));
        assert_eq!(json["bins"][0]["value"], json!(1.0));
    }
}
