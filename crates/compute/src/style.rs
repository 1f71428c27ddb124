//! Color-bins styling: a palette plus breaks over a numeric attribute.

use layers::symbology::{Color, ColorBins, DEFAULT_NULL_COLOR};
use serde::Deserialize;
use tracing::warn;

use crate::classifier::{ClassificationMethod, Classifier};
use crate::error::ClassifierError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreaksSource {
    /// Caller-supplied breaks, used as is.
    Explicit(Vec<f64>),
    /// Breaks computed by a classifier, one fewer than the palette size.
    Classified {
        method: ClassificationMethod,
        #[serde(default)]
        viewport: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColorBinsStyle {
    pub attribute: String,
    pub palette: Vec<Color>,
    pub breaks: BreaksSource,
    #[serde(default = "default_null_color")]
    pub null_color: Color,
}

fn default_null_color() -> Color {
    DEFAULT_NULL_COLOR
}

impl ColorBinsStyle {
    pub fn explicit(attribute: impl Into<String>, breaks: Vec<f64>, palette: Vec<Color>) -> Self {
        Self {
            attribute: attribute.into(),
            palette,
            breaks: BreaksSource::Explicit(breaks),
            null_color: DEFAULT_NULL_COLOR,
        }
    }

    pub fn classified(
        attribute: impl Into<String>,
        method: ClassificationMethod,
        palette: Vec<Color>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            palette,
            breaks: BreaksSource::Classified {
                method,
                viewport: false,
            },
            null_color: DEFAULT_NULL_COLOR,
        }
    }

    pub fn viewport(mut self, enabled: bool) -> Self {
        if let BreaksSource::Classified { viewport, .. } = &mut self.breaks {
            *viewport = enabled;
        }
        self
    }

    /// Builds the color scale, asking `classifier` for breaks when they are
    /// not explicit.
    ///
    /// A classifier that comes back with fewer breaks than the palette needs
    /// (empty viewport, zero variance) yields a scale with fewer classes: the
    /// leading palette colors, or the null color alone when there are no breaks.
    pub async fn resolve(&self, classifier: Option<&Classifier>) -> Result<ColorBins, ClassifierError> {
        let (breaks, palette) = match &self.breaks {
            BreaksSource::Explicit(breaks) => (breaks.clone(), self.palette.clone()),
            BreaksSource::Classified { method, viewport } => {
                let classifier = classifier.ok_or(ClassifierError::MissingClassifier)?;
                let n_breaks = self.palette.len().saturating_sub(1);
                let breaks = classifier.breaks(n_breaks, *method, *viewport).await?;
                let palette = if breaks.len() >= n_breaks {
                    self.palette.clone()
                } else if breaks.is_empty() {
                    warn!("no breaks for `{}`, styling everything with the null color", self.attribute);
                    vec![self.null_color]
                } else {
                    warn!(
                        "`{}` classified into {} of {n_breaks} breaks",
                        self.attribute,
                        breaks.len()
                    );
                    self.palette[..breaks.len() + 1].to_vec()
                };
                (breaks, palette)
            }
        };
        let bins = ColorBins::new(self.attribute.clone(), breaks, palette)?;
        Ok(bins.with_null_color(self.null_color))
    }
}
