/// One exponentially weighted moving average over weighted samples.
///
/// `alpha` is derived from a half-life in seconds: a sample of weight equal to
/// the half-life contributes half as much as the newest sample. The raw
/// weighted mean is biased toward zero while total weight is small, so
/// [`Ewma::estimate`] divides by `1 - alpha^total_weight`.
#[derive(Clone, Debug)]
pub struct Ewma {
    alpha: f64,
    weighted_sum: f64,
    total_weight: f64,
}

impl Ewma {
    pub fn from_half_life(half_life_secs: f64) -> Self {
        Self {
            alpha: f64::exp(0.5_f64.ln() / half_life_secs.max(0.001)),
            weighted_sum: 0.0,
            total_weight: 0.0,
        }
    }

    /// Fold in one sample. `weight` is non-negative (seconds of transfer),
    /// `value` is the observed bandwidth in bits per second.
    pub fn add_sample(&mut self, weight: f64, value: f64) {
        let weight = weight.max(0.0);
        let adj_alpha = self.alpha.powf(weight);
        self.weighted_sum = adj_alpha * self.weighted_sum + (1.0 - adj_alpha) * value;
        self.total_weight += weight;
    }

    /// Debiased estimate, `None` before the first weighted sample.
    pub fn estimate(&self) -> Option<f64> {
        if self.total_weight <= 0.0 {
            return None;
        }
        let zero_factor = 1.0 - self.alpha.powf(self.total_weight);
        Some(self.weighted_sum / zero_factor.max(1e-6))
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn no_estimate_before_first_sample() {
        let ewma = Ewma::from_half_life(2.0);
        assert_eq!(ewma.estimate(), None);
    }

    #[test]
    fn single_sample_is_unbiased() {
        let mut ewma = Ewma::from_half_life(2.0);
        ewma.add_sample(1.0, 1_000_000.0);
        let est = ewma.estimate().unwrap();
        assert!((est - 1_000_000.0).abs() < 1.0);
    }

    #[test]
    fn converges_toward_recent_values() {
        let mut ewma = Ewma::from_half_life(2.0);
        for _ in 0..10 {
            ewma.add_sample(1.0, 1_000_000.0);
        }
        for _ in 0..30 {
            ewma.add_sample(1.0, 200_000.0);
        }
        let est = ewma.estimate().unwrap();
        assert!(est < 250_000.0, "estimate {est} should approach 200k");
    }

    #[rstest]
    #[case(vec![(1.0, 500_000.0), (1.0, 900_000.0), (2.0, 700_000.0)])]
    #[case(vec![(0.5, 100_000.0), (3.0, 100_000.0)])]
    #[case(vec![(1.0, 4_000_000.0)])]
    fn estimate_bounded_by_sample_range(#[case] samples: Vec<(f64, f64)>) {
        let mut ewma = Ewma::from_half_life(2.0);
        let min = samples.iter().map(|(_, v)| *v).fold(f64::MAX, f64::min);
        let max = samples.iter().map(|(_, v)| *v).fold(f64::MIN, f64::max);
        for (w, v) in samples {
            ewma.add_sample(w, v);
        }
        let est = ewma.estimate().unwrap();
        assert!(
            est >= min - 1.0 && est <= max + 1.0,
            "estimate {est} outside [{min}, {max}]"
        );
    }

    #[test]
    fn zero_weight_sample_is_inert() {
        let mut ewma = Ewma::from_half_life(2.0);
        ewma.add_sample(0.0, 9_999_999.0);
        assert_eq!(ewma.estimate(), None);
        assert_eq!(ewma.total_weight(), 0.0);
    }
}
