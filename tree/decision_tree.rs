use super::{
	compute_targets,
	feature_importances::compute_feature_importances,
	single::{train_tree, SingleTreeOptions},
	FeatureColumnView, LabelsView, Task, Tree,
};
use ndarray::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

/// These are the options passed to `DecisionTree::train`.
#[derive(Clone, Debug)]
pub struct DecisionTreeTrainOptions {
	/// The depth of the tree will never exceed this value.
	pub max_depth: usize,
	/// Every leaf will hold at least this many training examples.
	pub min_examples_per_leaf: usize,
	/// A node will only be split if the best split achieves more than this gain.
	pub min_gain_to_split: f32,
}

impl Default for DecisionTreeTrainOptions {
	fn default() -> Self {
		Self {
			max_depth: 10,
			min_examples_per_leaf: 1,
			min_gain_to_split: 0.0,
		}
	}
}

/// A single regression or classification tree. Regression leaves hold the mean label of their examples and classification leaves hold the fraction of their examples in each class.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionTree {
	pub task: Task,
	pub tree: Tree,
	/// The importance of each feature as measured by the number of times the feature was used in a branch node.
	pub feature_importances: Vec<f32>,
}

impl DecisionTree {
	/// Train a decision tree.
	pub fn train(
		features: &[FeatureColumnView],
		labels: LabelsView,
		options: &DecisionTreeTrainOptions,
	) -> Self {
		let task = labels.task();
		let targets = compute_targets(labels);
		let hessians = Array2::ones(targets.raw_dim());
		let single_tree_options = SingleTreeOptions {
			max_depth: options.max_depth,
			min_examples_per_leaf: options.min_examples_per_leaf,
			min_gain_to_split: options.min_gain_to_split,
			l2_regularization: 0.0,
			max_features: None,
		};
		// Every feature is considered at every node, so the generator is never drawn from.
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		let tree = train_tree(
			features,
			targets.view(),
			hessians.view(),
			(0..labels.len()).collect(),
			&single_tree_options,
			&mut rng,
		);
		log::debug!("decision tree has {} nodes", tree.nodes.len());
		let feature_importances =
			compute_feature_importances(std::slice::from_ref(&tree), features.len());
		Self {
			task,
			tree,
			feature_importances,
		}
	}

	/// Write predictions into `predictions`, which has one row per example and `task.n_outputs()` columns.
	pub fn predict(&self, features: &[FeatureColumnView], mut predictions: ArrayViewMut2<f32>) {
		for (example_index, mut row) in predictions.axis_iter_mut(Axis(0)).enumerate() {
			let values = self.tree.predict(features, example_index);
			for (prediction, value) in row.iter_mut().zip(values) {
				*prediction = *value;
			}
		}
	}
}

#[test]
fn test_decision_tree_regression() {
	let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
	let y = [1.0, 1.0, 1.0, 9.0, 9.0, 9.0];
	let features = [FeatureColumnView::Number(&x)];
	let model = DecisionTree::train(
		&features,
		LabelsView::Number(&y),
		&DecisionTreeTrainOptions::default(),
	);
	assert_eq!(model.task, Task::Regression);
	assert_eq!(model.feature_importances, vec![1.0]);
	let mut predictions = Array2::zeros((6, 1));
	model.predict(&features, predictions.view_mut());
	assert_eq!(predictions.column(0).to_vec(), y.to_vec());
}

#[test]
fn test_decision_tree_class_probabilities_sum_to_one() {
	let x = [1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 3.0];
	let y = [1, 2, 1, 1, 2, 2, 1];
	let features = [FeatureColumnView::Number(&x)];
	let model = DecisionTree::train(
		&features,
		LabelsView::Enum {
			n_classes: 2,
			data: &y,
		},
		&DecisionTreeTrainOptions::default(),
	);
	let mut probabilities = Array2::zeros((7, 2));
	model.predict(&features, probabilities.view_mut());
	for row in probabilities.axis_iter(Axis(0)) {
		assert!((row.sum() - 1.0).abs() < 1e-6);
	}
	assert!((probabilities[[4, 1]] - 2.0 / 3.0).abs() < 1e-6);
}
