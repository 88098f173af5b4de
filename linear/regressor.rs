use super::{
	early_stopping::{train_early_stopping_split, EarlyStoppingMonitor},
	TrainOptions, TrainProgress,
};
use itertools::izip;
use ndarray::prelude::*;
use scorecard_metrics::{MeanSquaredError, StreamingMetric};
use scorecard_util::progress_counter::ProgressCounter;
use serde::{Deserialize, Serialize};

/// This struct describes a linear regressor model. You can train one by calling `Regressor::train`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Regressor {
	pub bias: f32,
	pub weights: Array1<f32>,
	/// These are the early stopping loss values for each epoch.
	pub losses: Vec<f32>,
}

impl Regressor {
	/// Train a linear regressor.
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<f32>,
		options: &TrainOptions,
		update_progress: &mut dyn FnMut(TrainProgress),
	) -> Self {
		let n_features = features.ncols();
		let (features_train, labels_train, features_early_stopping, labels_early_stopping) =
			train_early_stopping_split(
				features,
				labels,
				options
					.early_stopping_options
					.as_ref()
					.map(|o| o.early_stopping_fraction)
					.unwrap_or(0.0),
			);
		// Start from the mean label so that large targets do not need many epochs to reach.
		let bias = labels_train.mean().unwrap_or(0.0);
		let mut model = Self {
			bias,
			weights: Array1::<f32>::zeros(n_features),
			losses: vec![],
		};
		let mut early_stopping_monitor =
			options
				.early_stopping_options
				.as_ref()
				.map(|early_stopping_options| {
					EarlyStoppingMonitor::new(
						early_stopping_options.min_decrease_in_loss_for_significant_change,
						early_stopping_options.n_epochs_without_improvement_to_stop,
					)
				});
		let epoch_counter = ProgressCounter::new(options.max_epochs as u64);
		update_progress(TrainProgress(epoch_counter.clone()));
		let n_examples_per_batch = options.n_examples_per_batch.max(1);
		for _ in 0..options.max_epochs {
			epoch_counter.inc(1);
			for (features, labels) in izip!(
				features_train.axis_chunks_iter(Axis(0), n_examples_per_batch),
				labels_train.axis_chunks_iter(Axis(0), n_examples_per_batch),
			) {
				model.train_batch(features, labels, options);
			}
			if let Some(early_stopping_monitor) = early_stopping_monitor.as_mut() {
				let early_stopping_metric_value = match model.compute_early_stopping_metric_value(
					features_early_stopping,
					labels_early_stopping,
				) {
					Some(value) => value,
					None => continue,
				};
				model.losses.push(early_stopping_metric_value);
				if early_stopping_monitor.update(early_stopping_metric_value) {
					log::debug!(
						"linear regressor stopped early after {} epochs",
						epoch_counter.get()
					);
					break;
				}
			}
		}
		model
	}

	fn train_batch(
		&mut self,
		features: ArrayView2<f32>,
		labels: ArrayView1<f32>,
		options: &TrainOptions,
	) {
		let learning_rate = options.learning_rate;
		let predictions = features.dot(&self.weights) + self.bias;
		let py = (predictions - labels).insert_axis(Axis(1));
		let weight_gradients = match (&features * &py).mean_axis(Axis(0)) {
			Some(weight_gradients) => weight_gradients,
			None => return,
		};
		let bias_gradient = py.mean().unwrap_or(0.0);
		for (weight, weight_gradient) in izip!(self.weights.iter_mut(), weight_gradients.iter()) {
			*weight -= learning_rate * (weight_gradient + options.l2_regularization * *weight);
		}
		self.bias -= learning_rate * bias_gradient;
	}

	fn compute_early_stopping_metric_value(
		&self,
		features: ArrayView2<f32>,
		labels: ArrayView1<f32>,
	) -> Option<f32> {
		let mut predictions = Array1::<f32>::zeros(features.nrows());
		self.predict(features, predictions.view_mut());
		let mut metric = MeanSquaredError::default();
		for (prediction, label) in izip!(predictions.iter(), labels.iter()) {
			metric.update((*prediction, *label));
		}
		metric.finalize()
	}

	/// Write predictions into `predictions` for the input `features`.
	pub fn predict(&self, features: ArrayView2<f32>, mut predictions: ArrayViewMut1<f32>) {
		predictions.fill(self.bias);
		ndarray::linalg::general_mat_vec_mul(1.0, &features, &self.weights, 1.0, &mut predictions);
	}
}

#[test]
fn test_regressor_fits_a_line() {
	let n = 200;
	let features = Array2::from_shape_fn((n, 1), |(i, _)| (i as f32 / n as f32) * 2.0 - 1.0);
	let labels = features.column(0).mapv(|x| 3.0 * x + 1.0);
	let options = TrainOptions {
		early_stopping_options: None,
		max_epochs: 500,
		n_examples_per_batch: 16,
		..Default::default()
	};
	let mut n_progress_updates = 0;
	let model = Regressor::train(features.view(), labels.view(), &options, &mut |_| {
		n_progress_updates += 1
	});
	assert_eq!(n_progress_updates, 1);
	assert!((model.weights[0] - 3.0).abs() < 0.05);
	assert!((model.bias - 1.0).abs() < 0.05);
	let mut predictions = Array1::<f32>::zeros(n);
	model.predict(features.view(), predictions.view_mut());
	assert!((predictions[0] - (-2.0)).abs() < 0.1);
}
