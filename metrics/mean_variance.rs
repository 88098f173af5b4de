//! https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Parallel_algorithm

use super::{Metric, StreamingMetric};
use num_traits::ToPrimitive;

/// combine two separate means and variances into a single mean and variance
pub fn merge_mean_m2(
	n_a: u64,
	mean_a: f64,
	m2_a: f64,
	n_b: u64,
	mean_b: f64,
	m2_b: f64,
) -> (f64, f64) {
	let n_a = n_a.to_f64().unwrap();
	let n_b = n_b.to_f64().unwrap();
	(
		(((n_a * mean_a) + (n_b * mean_b)) / (n_a + n_b)),
		m2_a + m2_b + (mean_b - mean_a) * (mean_b - mean_a) * (n_a * n_b / (n_a + n_b)),
	)
}

pub fn m2_to_variance(m2: f64, n: u64) -> f32 {
	(m2 / n.to_f64().unwrap()) as f32
}

/// `MeanVariance` computes the count, mean, population variance, min, and max of the finite values it is given. Non-finite values are skipped.
#[derive(Debug, Clone, Default)]
pub struct MeanVariance {
	n: u64,
	mean: f64,
	m2: f64,
	min: f32,
	max: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeanVarianceOutput {
	pub n: u64,
	pub mean: f32,
	pub variance: f32,
	pub min: f32,
	pub max: f32,
}

impl<'a> Metric<'a> for MeanVariance {
	type Input = &'a [f32];
	type Output = Option<MeanVarianceOutput>;
	fn compute(input: Self::Input) -> Self::Output {
		let mut metric = MeanVariance::default();
		for value in input {
			metric.update(*value);
		}
		metric.finalize()
	}
}

impl StreamingMetric<'_> for MeanVariance {
	type Input = f32;
	type Output = Option<MeanVarianceOutput>;

	fn update(&mut self, value: f32) {
		if !value.is_finite() {
			return;
		}
		if self.n == 0 {
			self.min = value;
			self.max = value;
		} else {
			self.min = self.min.min(value);
			self.max = self.max.max(value);
		}
		let (mean, m2) = merge_mean_m2(self.n, self.mean, self.m2, 1, value.to_f64().unwrap(), 0.0);
		self.n += 1;
		self.mean = mean;
		self.m2 = m2;
	}

	fn merge(&mut self, other: Self) {
		if other.n == 0 {
			return;
		}
		if self.n == 0 {
			*self = other;
			return;
		}
		let (mean, m2) = merge_mean_m2(self.n, self.mean, self.m2, other.n, other.mean, other.m2);
		self.n += other.n;
		self.mean = mean;
		self.m2 = m2;
		self.min = self.min.min(other.min);
		self.max = self.max.max(other.max);
	}

	fn finalize(self) -> Self::Output {
		if self.n == 0 {
			return None;
		}
		Some(MeanVarianceOutput {
			n: self.n,
			mean: self.mean.to_f32().unwrap(),
			variance: m2_to_variance(self.m2, self.n),
			min: self.min,
			max: self.max,
		})
	}
}

#[test]
fn test_mean_variance() {
	let output = MeanVariance::compute(&[1.0, 2.0, std::f32::NAN, 3.0, 4.0]).unwrap();
	assert_eq!(output.n, 4);
	assert!((output.mean - 2.5).abs() < 1e-6);
	assert!((output.variance - 1.25).abs() < 1e-6);
	assert_eq!(output.min, 1.0);
	assert_eq!(output.max, 4.0);
	assert_eq!(MeanVariance::compute(&[]), None);
}

#[test]
fn test_merge_matches_single_pass() {
	let mut a = MeanVariance::default();
	let mut b = MeanVariance::default();
	for value in &[1.0, 5.0] {
		a.update(*value);
	}
	for value in &[2.0, 8.0, 9.0] {
		b.update(*value);
	}
	a.merge(b);
	let merged = a.finalize().unwrap();
	let single = MeanVariance::compute(&[1.0, 5.0, 2.0, 8.0, 9.0]).unwrap();
	assert!((merged.mean - single.mean).abs() < 1e-5);
	assert!((merged.variance - single.variance).abs() < 1e-4);
	assert_eq!(merged.min, 1.0);
	assert_eq!(merged.max, 9.0);
}
