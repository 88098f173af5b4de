use super::{
	feature_importances::compute_feature_importances,
	single::{train_tree, SingleTreeOptions},
	FeatureColumnView, LabelsView, Node, Task, TrainProgress, Tree,
};
use itertools::izip;
use ndarray::prelude::*;
use num_traits::clamp;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use scorecard_metrics::{
	BinaryCrossEntropy, BinaryCrossEntropyInput, MeanSquaredError, StreamingMetric,
};
use scorecard_util::progress_counter::ProgressCounter;
use serde::{Deserialize, Serialize};
use std::ops::Neg;

/// These are the options passed to `GradientBoostedTrees::train`.
#[derive(Clone, Debug)]
pub struct GradientBoostedTreesTrainOptions {
	/// This is the number of rounds of boosting. Each round adds one tree.
	pub max_rounds: usize,
	/// The learning rate scales the leaf values to control the effect each tree has on the output.
	pub learning_rate: f32,
	/// The depth of a single tree will never exceed this value.
	pub max_depth: usize,
	/// Every leaf will hold at least this many training examples.
	pub min_examples_per_leaf: usize,
	/// This option sets the L2 regularization value, which helps avoid overfitting.
	pub l2_regularization: f32,
	/// A node will only be split if the best split achieves more than this gain.
	pub min_gain_to_split: f32,
}

impl Default for GradientBoostedTreesTrainOptions {
	fn default() -> Self {
		Self {
			max_rounds: 100,
			learning_rate: 0.1,
			max_depth: 5,
			min_examples_per_leaf: 10,
			l2_regularization: 0.0,
			min_gain_to_split: 0.0,
		}
	}
}

/**
A gradient boosted trees model. The model's logits are `biases` plus the sum of the outputs of every tree. Regression outputs the single logit directly. Binary classification has one logit that is passed through the sigmoid function, and multiclass classification has one logit per class that is passed through the softmax function.
*/
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
	pub task: Task,
	/// The initial logits of the model given no trained trees.
	pub biases: Vec<f32>,
	/// The trees for this model. The leaf values are already scaled by the learning rate.
	pub trees: Vec<Tree>,
	/// The importance of each feature as measured by the number of times the feature was used in a branch node.
	pub feature_importances: Vec<f32>,
	/// The training loss after each round.
	pub losses: Vec<f32>,
}

/// The number of logits per example. Binary classification needs only the logit of the positive class.
fn n_logits(task: Task) -> usize {
	match task {
		Task::Regression => 1,
		Task::Classification { n_classes: 2 } => 1,
		Task::Classification { n_classes } => n_classes,
	}
}

impl GradientBoostedTrees {
	/// Train a gradient boosted trees model.
	pub fn train(
		features: &[FeatureColumnView],
		labels: LabelsView,
		options: &GradientBoostedTreesTrainOptions,
		update_progress: &mut dyn FnMut(TrainProgress),
	) -> Self {
		let task = labels.task();
		let n_examples = labels.len();
		let n_logits = n_logits(task);
		let biases = compute_biases(labels, n_logits);
		let mut logits = Array2::from_shape_fn((n_examples, n_logits), |(_, i)| biases[i]);
		let mut gradients = Array2::<f32>::zeros((n_examples, n_logits));
		let mut hessians = Array2::<f32>::ones((n_examples, n_logits));
		let single_tree_options = SingleTreeOptions {
			max_depth: options.max_depth,
			min_examples_per_leaf: options.min_examples_per_leaf,
			min_gain_to_split: options.min_gain_to_split,
			l2_regularization: options.l2_regularization,
			max_features: None,
		};
		// Every feature is considered at every node, so the generator is never drawn from.
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		let progress_counter = ProgressCounter::new(options.max_rounds as u64);
		update_progress(TrainProgress(progress_counter.clone()));
		let mut trees = Vec::with_capacity(options.max_rounds);
		let mut losses = Vec::with_capacity(options.max_rounds);
		for _ in 0..options.max_rounds {
			// The tree learner fits the negative gradients.
			compute_gradients_and_hessians(
				labels,
				logits.view(),
				gradients.view_mut(),
				hessians.view_mut(),
			);
			gradients.mapv_inplace(|gradient| gradient.neg());
			let mut tree = train_tree(
				features,
				gradients.view(),
				hessians.view(),
				(0..n_examples).collect(),
				&single_tree_options,
				&mut rng,
			);
			for node in tree.nodes.iter_mut() {
				if let Node::Leaf(leaf) = node {
					for value in leaf.values.iter_mut() {
						*value *= options.learning_rate;
					}
				}
			}
			for (example_index, mut logits) in logits.axis_iter_mut(Axis(0)).enumerate() {
				for (logit, value) in logits.iter_mut().zip(tree.predict(features, example_index)) {
					*logit += *value;
				}
			}
			if let Some(loss) = compute_loss(labels, logits.view()) {
				losses.push(loss);
			}
			trees.push(tree);
			progress_counter.inc(1);
		}
		if let Some(loss) = losses.last() {
			log::debug!(
				"gradient boosting trained {} rounds, final training loss {}",
				trees.len(),
				loss
			);
		}
		let feature_importances = compute_feature_importances(&trees, features.len());
		Self {
			task,
			biases,
			trees,
			feature_importances,
			losses,
		}
	}

	/// Write predictions into `predictions`, which has one row per example and `task.n_outputs()` columns. Classification predictions are probabilities.
	pub fn predict(&self, features: &[FeatureColumnView], mut predictions: ArrayViewMut2<f32>) {
		let n_logits = self.biases.len();
		let mut logits = vec![0.0f32; n_logits];
		for (example_index, mut row) in predictions.axis_iter_mut(Axis(0)).enumerate() {
			logits.copy_from_slice(&self.biases);
			for tree in self.trees.iter() {
				for (logit, value) in logits.iter_mut().zip(tree.predict(features, example_index)) {
					*logit += *value;
				}
			}
			match self.task {
				Task::Regression => row[0] = logits[0],
				Task::Classification { n_classes: 2 } => {
					let probability = sigmoid(logits[0]);
					row[0] = 1.0 - probability;
					row[1] = probability;
				}
				Task::Classification { .. } => {
					softmax(&mut logits);
					for (prediction, probability) in row.iter_mut().zip(logits.iter()) {
						*prediction = *probability;
					}
				}
			}
		}
	}
}

fn sigmoid(logit: f32) -> f32 {
	1.0 / (logit.neg().exp() + 1.0)
}

fn softmax(logits: &mut [f32]) {
	let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
	let mut sum = 0.0;
	for logit in logits.iter_mut() {
		*logit = (*logit - max).exp();
		sum += *logit;
	}
	for logit in logits.iter_mut() {
		*logit /= sum;
	}
}

/// For regression, the bias is the mean of the labels. For binary classification, the bias is the log of the ratio of positive examples to negative examples. For multiclass classification the biases are the logs of each class's proportion.
fn compute_biases(labels: LabelsView, n_logits: usize) -> Vec<f32> {
	match labels {
		LabelsView::Number(data) => {
			let mean = if data.is_empty() {
				0.0
			} else {
				data.iter().map(|label| f64::from(*label)).sum::<f64>() / data.len() as f64
			};
			vec![mean as f32]
		}
		LabelsView::Enum { n_classes, data } => {
			let mut counts = vec![0usize; n_classes];
			for label in data.iter() {
				if let Some(count) = counts.get_mut(label.wrapping_sub(1)) {
					*count += 1;
				}
			}
			let total = data.len().max(1) as f32;
			let proportions: Vec<f32> = counts
				.iter()
				.map(|count| {
					clamp(
						*count as f32 / total,
						std::f32::EPSILON,
						1.0 - std::f32::EPSILON,
					)
				})
				.collect();
			if n_logits == 1 && n_classes == 2 {
				vec![(proportions[1] / proportions[0]).ln()]
			} else {
				proportions.iter().map(|proportion| proportion.ln()).collect()
			}
		}
	}
}

fn compute_gradients_and_hessians(
	labels: LabelsView,
	logits: ArrayView2<f32>,
	mut gradients: ArrayViewMut2<f32>,
	mut hessians: ArrayViewMut2<f32>,
) {
	match labels {
		// The squared error loss has a constant second derivative, so the hessians stay at one.
		LabelsView::Number(data) => {
			for (gradient, logit, label) in izip!(gradients.column_mut(0), logits.column(0), data) {
				*gradient = logit - label;
			}
		}
		LabelsView::Enum { n_classes: 2, data } => {
			for (gradient, hessian, logit, label) in izip!(
				gradients.column_mut(0),
				hessians.column_mut(0),
				logits.column(0),
				data
			) {
				let probability = sigmoid(*logit);
				let label = if *label == 2 { 1.0 } else { 0.0 };
				*gradient = probability - label;
				*hessian = probability * (1.0 - probability);
			}
		}
		LabelsView::Enum { data, .. } => {
			let mut probabilities = vec![0.0f32; logits.ncols()];
			for (mut gradients, mut hessians, logits, label) in izip!(
				gradients.axis_iter_mut(Axis(0)),
				hessians.axis_iter_mut(Axis(0)),
				logits.axis_iter(Axis(0)),
				data
			) {
				for (probability, logit) in probabilities.iter_mut().zip(logits.iter()) {
					*probability = *logit;
				}
				softmax(&mut probabilities);
				for (class_index, (gradient, hessian, probability)) in
					izip!(gradients.iter_mut(), hessians.iter_mut(), probabilities.iter())
						.enumerate()
				{
					let label = if class_index + 1 == *label { 1.0 } else { 0.0 };
					*gradient = probability - label;
					*hessian = probability * (1.0 - probability);
				}
			}
		}
	}
}

/// Compute the training loss: mean squared error for regression and cross entropy for classification.
fn compute_loss(labels: LabelsView, logits: ArrayView2<f32>) -> Option<f32> {
	match labels {
		LabelsView::Number(data) => {
			let mut metric = MeanSquaredError::default();
			for (logit, label) in izip!(logits.column(0), data) {
				metric.update((*logit, *label));
			}
			metric.finalize()
		}
		LabelsView::Enum { n_classes: 2, data } => {
			let mut metric = BinaryCrossEntropy::default();
			for (logit, label) in izip!(logits.column(0), data) {
				metric.update(BinaryCrossEntropyInput {
					probability: sigmoid(*logit),
					label: *label,
				});
			}
			metric.finalize()
		}
		LabelsView::Enum { data, .. } => {
			if data.is_empty() {
				return None;
			}
			let mut probabilities = vec![0.0f32; logits.ncols()];
			let mut total = 0.0f64;
			for (logits, label) in izip!(logits.axis_iter(Axis(0)), data) {
				for (probability, logit) in probabilities.iter_mut().zip(logits.iter()) {
					*probability = *logit;
				}
				softmax(&mut probabilities);
				let probability = probabilities
					.get(label.wrapping_sub(1))
					.copied()
					.unwrap_or(0.0);
				total -= f64::from(probability.max(std::f32::EPSILON).ln());
			}
			Some((total / data.len() as f64) as f32)
		}
	}
}

#[test]
fn test_gradient_boosted_regression_reduces_loss() {
	let x: Vec<f32> = (0..100).map(|i| i as f32 / 10.0).collect();
	let y: Vec<f32> = x.iter().map(|x| if *x < 5.0 { 0.0 } else { 10.0 }).collect();
	let features = [FeatureColumnView::Number(&x)];
	let options = GradientBoostedTreesTrainOptions {
		max_rounds: 50,
		..Default::default()
	};
	let model =
		GradientBoostedTrees::train(&features, LabelsView::Number(&y), &options, &mut |_| {});
	assert_eq!(model.trees.len(), 50);
	assert!((model.biases[0] - 5.0).abs() < 1e-4);
	assert!(model.losses.last().unwrap() < model.losses.first().unwrap());
	let mut predictions = Array2::zeros((100, 1));
	model.predict(&features, predictions.view_mut());
	assert!(predictions[[0, 0]] < 1.0);
	assert!(predictions[[99, 0]] > 9.0);
}

#[test]
fn test_gradient_boosted_binary_probabilities() {
	let x: Vec<f32> = (0..100).map(|i| i as f32).collect();
	let y: Vec<usize> = (0..100).map(|i| if i % 10 < 3 { 2 } else { 1 }).collect();
	let features = [FeatureColumnView::Number(&x)];
	let labels = LabelsView::Enum {
		n_classes: 2,
		data: &y,
	};
	let model = GradientBoostedTrees::train(
		&features,
		labels,
		&GradientBoostedTreesTrainOptions::default(),
		&mut |_| {},
	);
	assert_eq!(model.biases.len(), 1);
	assert!((model.biases[0] - (0.3f32 / 0.7).ln()).abs() < 1e-5);
	let mut probabilities = Array2::zeros((100, 2));
	model.predict(&features, probabilities.view_mut());
	for row in probabilities.axis_iter(Axis(0)) {
		assert!(row.iter().all(|probability| (0.0..=1.0).contains(probability)));
		assert!((row[0] + row[1] - 1.0).abs() < 1e-6);
	}
}

#[test]
fn test_gradient_boosted_multiclass_softmax() {
	let x: Vec<f32> = (0..90).map(|i| i as f32).collect();
	let y: Vec<usize> = (0..90).map(|i| i / 30 + 1).collect();
	let features = [FeatureColumnView::Number(&x)];
	let labels = LabelsView::Enum {
		n_classes: 3,
		data: &y,
	};
	let model = GradientBoostedTrees::train(
		&features,
		labels,
		&GradientBoostedTreesTrainOptions::default(),
		&mut |_| {},
	);
	let mut probabilities = Array2::zeros((90, 3));
	model.predict(&features, probabilities.view_mut());
	for (row, label) in probabilities.axis_iter(Axis(0)).zip(y.iter()) {
		assert!((row.sum() - 1.0).abs() < 1e-5);
		let predicted = row
			.iter()
			.enumerate()
			.max_by(|a, b| a.1.total_cmp(b.1))
			.map(|(index, _)| index + 1)
			.unwrap();
		assert_eq!(predicted, *label);
	}
}
