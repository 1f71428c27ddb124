use layers::LayerError;

use crate::classifier::ClassificationMethod;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifierError {
    #[error("unsupported classification method `{0}`")]
    UnsupportedMethod(String),

    #[error("{method:?} breaks for `{attribute}` need a value sample")]
    MissingSample {
        attribute: String,
        method: ClassificationMethod,
    },

    #[error("equal-interval breaks for `{attribute}` need both min and max")]
    MissingRange { attribute: String },

    #[error("`{0}` has category stats, expected numeric")]
    NotNumeric(String),

    #[error("`{0}` has numeric stats, expected categories")]
    NotCategorical(String),

    /// Viewport classification asked of precomputed stats.
    #[error("viewport classification needs a live feature source")]
    ViewportRequiresSource,

    #[error("style uses classified breaks but no classifier was given")]
    MissingClassifier,

    #[error(transparent)]
    Layer(#[from] LayerError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataViewError {
    #[error("histogram needs at least one bin")]
    InvalidBins,

    #[error("unsupported aggregation operation `{0}`")]
    UnsupportedOperation(String),

    #[error("data view in {actual} mode cannot serve {requested} data")]
    ModeMismatch {
        requested: &'static str,
        actual: &'static str,
    },

    #[error("`{column}` must be numeric or null, found {found}")]
    NonNumeric { column: String, found: String },

    #[error("aggregation service failed: {0}")]
    Remote(String),

    #[error(transparent)]
    Layer(#[from] LayerError),
}
