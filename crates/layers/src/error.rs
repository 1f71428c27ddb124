use crate::tile::TileIndex;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayerError {
    /// Renderer or render layer not bound yet.
    #[error("layer not added to a map yet")]
    NotAddedToMap,

    #[error("feature identity from `{property}` must be a string or a number, found {found}")]
    InvalidFeatureId { property: String, found: String },

    #[error("tile {0:?} was dropped before its content loaded")]
    TileLoadAborted(TileIndex),

    #[error("{breaks} breaks need {expected} palette colors, got {actual}")]
    PaletteMismatch {
        breaks: usize,
        expected: usize,
        actual: usize,
    },

    #[error("breaks must be sorted ascending: {0:?}")]
    UnsortedBreaks(Vec<f64>),
}
