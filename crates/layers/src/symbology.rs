use scene::components::{Properties, numeric_property};

use crate::error::LayerError;

pub type Color = [u8; 4];

pub const DEFAULT_NULL_COLOR: Color = [204, 204, 204, 255];

/// Threshold color scale over a numeric attribute.
///
/// `n` breaks split the domain into `n + 1` classes, one palette color each:
/// values below `breaks[0]` take `palette[0]`, values in
/// `[breaks[i - 1], breaks[i])` take `palette[i]`, and values at or above the
/// last break take the last color.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorBins {
    attribute: String,
    breaks: Vec<f64>,
    palette: Vec<Color>,
    null_color: Color,
}

/// One legend row: the color and the half-open range it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub color: Color,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ColorBins {
    pub fn new(
        attribute: impl Into<String>,
        breaks: Vec<f64>,
        palette: Vec<Color>,
    ) -> Result<Self, LayerError> {
        if palette.len() != breaks.len() + 1 {
            return Err(LayerError::PaletteMismatch {
                breaks: breaks.len(),
                expected: breaks.len() + 1,
                actual: palette.len(),
            });
        }
        if breaks.windows(2).any(|w| w[0] > w[1]) {
            return Err(LayerError::UnsortedBreaks(breaks));
        }
        Ok(Self {
            attribute: attribute.into(),
            breaks,
            palette,
            null_color: DEFAULT_NULL_COLOR,
        })
    }

    pub fn with_null_color(mut self, color: Color) -> Self {
        self.null_color = color;
        self
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn breaks(&self) -> &[f64] {
        &self.breaks
    }

    pub fn palette_index(&self, value: f64) -> usize {
        self.breaks.partition_point(|b| *b <= value)
    }

    pub fn color_for(&self, value: f64) -> Color {
        self.palette[self.palette_index(value)]
    }

    /// Color for a feature; missing or non-numeric values get the null color.
    pub fn evaluate(&self, props: &Properties) -> Color {
        match numeric_property(props, &self.attribute) {
            Some(v) if !v.is_nan() => self.color_for(v),
            _ => self.null_color,
        }
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        self.palette
            .iter()
            .enumerate()
            .map(|(i, color)| LegendEntry {
                color: *color,
                min: i.checked_sub(1).map(|j| self.breaks[j]),
                max: self.breaks.get(i).copied(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{ColorBins, DEFAULT_NULL_COLOR, LegendEntry};
    use crate::error::LayerError;
    use serde_json::json;

    const PALETTE: [[u8; 4]; 6] = [
        [0, 0, 0, 255],
        [1, 1, 1, 255],
        [2, 2, 2, 255],
        [3, 3, 3, 255],
        [4, 4, 4, 255],
        [5, 5, 5, 255],
    ];

    fn bins() -> ColorBins {
        ColorBins::new("pop", vec![20.0, 50.0, 100.0, 200.0, 400.0], PALETTE.to_vec()).unwrap()
    }

    #[test]
    fn threshold_indexing() {
        let b = bins();
        assert_eq!(b.palette_index(10.0), 0);
        assert_eq!(b.palette_index(20.0), 1);
        assert_eq!(b.palette_index(30.0), 1);
        assert_eq!(b.palette_index(399.0), 4);
        assert_eq!(b.palette_index(1e9), 5);
    }

    #[test]
    fn evaluates_properties() {
        let b = bins();
        let p = json!({ "pop": 30 }).as_object().cloned().unwrap();
        assert_eq!(b.evaluate(&p), PALETTE[1]);
        let missing = json!({ "pop": null }).as_object().cloned().unwrap();
        assert_eq!(b.evaluate(&missing), DEFAULT_NULL_COLOR);
    }

    #[test]
    fn palette_must_fit_breaks() {
        let err = ColorBins::new("pop", vec![1.0, 2.0], PALETTE.to_vec()).unwrap_err();
        assert_eq!(
            err,
            LayerError::PaletteMismatch {
                breaks: 2,
                expected: 3,
                actual: 6
            }
        );
        assert!(ColorBins::new("pop", vec![2.0, 1.0], PALETTE[..3].to_vec()).is_err());
    }

    #[test]
    fn legend_ranges() {
        let b = ColorBins::new("pop", vec![10.0], PALETTE[..2].to_vec()).unwrap();
        assert_eq!(
            b.legend(),
            vec![
                LegendEntry {
                    color: PALETTE[0],
                    min: None,
                    max: Some(10.0)
                },
                LegendEntry {
                    color: PALETTE[1],
                    min: Some(10.0),
                    max: None
                },
            ]
        );
    }
}
