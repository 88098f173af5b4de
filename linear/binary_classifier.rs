use super::{
	early_stopping::{train_early_stopping_split, EarlyStoppingMonitor},
	TrainOptions, TrainProgress,
};
use itertools::izip;
use ndarray::prelude::*;
use scorecard_metrics::{BinaryCrossEntropy, BinaryCrossEntropyInput, StreamingMetric};
use scorecard_util::progress_counter::ProgressCounter;
use serde::{Deserialize, Serialize};
use std::ops::Neg;

/**
This struct describes a linear binary classifier model, also known as logistic regression. Labels are the 1-based class indexes `1` for the negative class and `2` for the positive class.
*/
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BinaryClassifier {
	pub weights: Array1<f32>,
	pub bias: f32,
	/// the early stopping loss value for each epoch
	pub losses: Vec<f32>,
}

impl BinaryClassifier {
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
		options: &TrainOptions,
		update_progress: &mut dyn FnMut(TrainProgress),
	) -> BinaryClassifier {
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
		let mut model = BinaryClassifier {
			bias: 0.0,
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
		let progress_counter = ProgressCounter::new(options.max_epochs as u64);
		update_progress(TrainProgress(progress_counter.clone()));
		let n_examples_per_batch = options.n_examples_per_batch.max(1);
		for _ in 0..options.max_epochs {
			progress_counter.inc(1);
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
						"binary classifier stopped early after {} epochs",
						progress_counter.get()
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
		labels: ArrayView1<usize>,
		options: &TrainOptions,
	) {
		let learning_rate = options.learning_rate;
		let logits = features.dot(&self.weights) + self.bias;
		let mut predictions = logits.mapv_into(|logit| 1.0 / (logit.neg().exp() + 1.0));
		izip!(predictions.view_mut(), labels).for_each(|(prediction, label)| {
			let label = if *label == 2 { 1.0 } else { 0.0 };
			*prediction -= label
		});
		let py = predictions.insert_axis(Axis(1));
		let weight_gradients = match (&features * &py).mean_axis(Axis(0)) {
			Some(weight_gradients) => weight_gradients,
			None => return,
		};
		let bias_gradient = py.mean().unwrap_or(0.0);
		izip!(self.weights.view_mut(), weight_gradients.view()).for_each(
			|(weight, weight_gradient)| {
				*weight -= learning_rate * (weight_gradient + options.l2_regularization * *weight);
			},
		);
		self.bias -= learning_rate * bias_gradient;
	}

	fn compute_early_stopping_metric_value(
		&self,
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
	) -> Option<f32> {
		let mut probabilities = Array2::<f32>::zeros((features.nrows(), 2));
		self.predict(features, probabilities.view_mut());
		let mut metric = BinaryCrossEntropy::default();
		for (probability, label) in izip!(probabilities.column(1).iter(), labels.iter()) {
			metric.update(BinaryCrossEntropyInput {
				probability: *probability,
				label: *label,
			});
		}
		metric.finalize()
	}

	/// Write predicted probabilities into `probabilities` for the input `features`. Column 0 receives the probability of the negative class and column 1 the probability of the positive class.
	pub fn predict(&self, features: ArrayView2<f32>, mut probabilities: ArrayViewMut2<f32>) {
		let mut probabilities_pos = probabilities.column_mut(1);
		probabilities_pos.fill(self.bias);
		ndarray::linalg::general_mat_vec_mul(
			1.0,
			&features,
			&self.weights,
			1.0,
			&mut probabilities_pos,
		);
		let (mut probabilities_neg, mut probabilities_pos) =
			probabilities.view_mut().split_at(Axis(1), 1);
		for probability_pos in probabilities_pos.iter_mut() {
			*probability_pos = 1.0 / (probability_pos.neg().exp() + 1.0);
		}
		for (neg, pos) in izip!(probabilities_neg.iter_mut(), probabilities_pos.iter()) {
			*neg = 1.0 - *pos;
		}
	}
}

#[test]
fn test_binary_classifier_separates_classes() {
	let n = 400;
	let features = Array2::from_shape_fn((n, 1), |(i, _)| (i as f32 / n as f32) * 4.0 - 2.0);
	let labels = features
		.column(0)
		.mapv(|x| if x > 0.0 { 2usize } else { 1usize });
	let options = TrainOptions {
		early_stopping_options: None,
		max_epochs: 50,
		n_examples_per_batch: 32,
		..Default::default()
	};
	let model = BinaryClassifier::train(features.view(), labels.view(), &options, &mut |_| {});
	assert!(model.weights[0] > 0.0);
	let mut probabilities = Array2::<f32>::zeros((n, 2));
	model.predict(features.view(), probabilities.view_mut());
	for row in probabilities.axis_iter(Axis(0)) {
		assert!((row[0] + row[1] - 1.0).abs() < 1e-5);
	}
	assert!(probabilities[[0, 1]] < 0.5);
	assert!(probabilities[[n - 1, 1]] > 0.5);
}

#[test]
fn test_early_stopping_records_losses() {
	let n = 200;
	let features = Array2::from_shape_fn((n, 1), |(i, _)| ((i * 7) % n) as f32 / n as f32);
	let labels = features
		.column(0)
		.mapv(|x| if x > 0.5 { 2usize } else { 1usize });
	let options = TrainOptions::default();
	let model = BinaryClassifier::train(features.view(), labels.view(), &options, &mut |_| {});
	assert!(!model.losses.is_empty());
	assert!(model.losses.len() <= options.max_epochs);
}
