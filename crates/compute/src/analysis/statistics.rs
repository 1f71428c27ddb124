pub struct Statistics;

impl Statistics {
    pub fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(Self::sum(values) / values.len() as f64)
    }

    pub fn sum(values: &[f64]) -> f64 {
        values.iter().sum()
    }

    pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
        let first = *values.first()?;
        let mut min = first;
        let mut max = first;
        for &v in values.iter().skip(1) {
            min = min.min(v);
            max = max.max(v);
        }
        Some((min, max))
    }

    /// Population standard deviation around a known `mean`.
    pub fn population_std_dev(values: &[f64], mean: f64) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        Some(variance.sqrt())
    }

    /// Ascending copy with NaNs removed.
    pub fn sorted(values: &[f64]) -> Vec<f64> {
        let mut out: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        out.sort_by(f64::total_cmp);
        out
    }
}
