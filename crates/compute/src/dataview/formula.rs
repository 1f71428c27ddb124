use std::fmt;
use std::str::FromStr;

use scene::components::Properties;
use serde::{Deserialize, Serialize};

use crate::analysis::Statistics;
use crate::error::DataViewError;

use super::{DEFAULT_CLUSTER_COUNT_PROPERTY, read_numeric};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl FromStr for Operation {
    type Err = DataViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(Self::Count),
            "sum" => Ok(Self::Sum),
            "avg" => Ok(Self::Avg),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            other => Err(DataViewError::UnsupportedOperation(other.to_string())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Count => "count",
            Operation::Sum => "sum",
            Operation::Avg => "avg",
            Operation::Min => "min",
            Operation::Max => "max",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FormulaOptions {
    pub column: String,
    pub operation: Operation,
    pub cluster_count_property: String,
}

impl Default for FormulaOptions {
    fn default() -> Self {
        Self {
            column: String::new(),
            operation: Operation::Count,
            cluster_count_property: DEFAULT_CLUSTER_COUNT_PROPERTY.to_string(),
        }
    }
}

impl FormulaOptions {
    pub fn new(column: impl Into<String>, operation: Operation) -> Self {
        Self {
            column: column.into(),
            operation,
            ..Default::default()
        }
    }

    pub fn required_properties(&self) -> Vec<String> {
        vec![self.column.clone(), self.cluster_count_property.clone()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaResult {
    /// `None` when there was nothing to aggregate.
    pub result: Option<f64>,
    pub operation: Operation,
    pub null_count: u64,
}

/// Reduces the column of `features` to one value.
///
/// `Count` counts features, weighting clustered ones by their feature count;
/// the other operations ignore nulls.
pub fn formula(features: &[Properties], options: &FormulaOptions) -> Result<FormulaResult, DataViewError> {
    let mut values = Vec::with_capacity(features.len());
    let mut null_count = 0;
    let mut count = 0.0;
    for props in features {
        count += read_numeric(props, &options.cluster_count_property)?.unwrap_or(1.0);
        match read_numeric(props, &options.column)? {
            Some(v) => values.push(v),
            None => null_count += 1,
        }
    }

    let result = match options.operation {
        Operation::Count => Some(count),
        Operation::Sum => (!values.is_empty()).then(|| Statistics::sum(&values)),
        Operation::Avg => Statistics::mean(&values),
        Operation::Min => Statistics::min_max(&values).map(|(min, _)| min),
        Operation::Max => Statistics::min_max(&values).map(|(_, max)| max),
    };

    Ok(FormulaResult {
        result,
        operation: options.operation,
        null_count,
    })
}
