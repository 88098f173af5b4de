use super::{
	compute_targets,
	feature_importances::compute_feature_importances,
	single::{train_tree, SingleTreeOptions},
	FeatureColumnView, LabelsView, Task, TrainProgress, Tree,
};
use ndarray::prelude::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use scorecard_util::progress_counter::ProgressCounter;
use serde::{Deserialize, Serialize};

/// These are the options passed to `RandomForest::train`.
#[derive(Clone, Debug)]
pub struct RandomForestTrainOptions {
	/// This is the number of trees in the forest.
	pub n_trees: usize,
	/// The depth of a single tree will never exceed this value.
	pub max_depth: usize,
	/// Every leaf will hold at least this many training examples.
	pub min_examples_per_leaf: usize,
	/// This is the fraction of features considered at each node. If it is `None`, the square root of the number of features is used.
	pub max_features: Option<f32>,
	/// Each tree is trained on a bootstrap sample with this many examples, as a fraction of the training set.
	pub sample_fraction: f32,
	/// This seeds the bootstrap samples and feature subsets, so training the same data with the same seed produces the same forest.
	pub seed: u64,
}

impl Default for RandomForestTrainOptions {
	fn default() -> Self {
		Self {
			n_trees: 50,
			max_depth: 10,
			min_examples_per_leaf: 1,
			max_features: None,
			sample_fraction: 1.0,
			seed: 42,
		}
	}
}

/// A forest of trees trained on bootstrap samples. The prediction is the mean of the trees' outputs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RandomForest {
	pub task: Task,
	pub trees: Vec<Tree>,
	/// The importance of each feature as measured by the number of times the feature was used in a branch node.
	pub feature_importances: Vec<f32>,
}

impl RandomForest {
	/// Train a random forest.
	pub fn train(
		features: &[FeatureColumnView],
		labels: LabelsView,
		options: &RandomForestTrainOptions,
		update_progress: &mut dyn FnMut(TrainProgress),
	) -> Self {
		let task = labels.task();
		let n_examples = labels.len();
		let n_features = features.len();
		let targets = compute_targets(labels);
		let hessians = Array2::ones(targets.raw_dim());
		let max_features = match options.max_features {
			Some(fraction) => (fraction * n_features as f32).round() as usize,
			None => (n_features as f32).sqrt().round() as usize,
		}
		.max(1)
		.min(n_features.max(1));
		let single_tree_options = SingleTreeOptions {
			max_depth: options.max_depth,
			min_examples_per_leaf: options.min_examples_per_leaf,
			min_gain_to_split: 0.0,
			l2_regularization: 0.0,
			max_features: Some(max_features),
		};
		let n_samples_per_tree =
			((options.sample_fraction * n_examples as f32).round() as usize).max(1);
		let mut rng = Xoshiro256Plus::seed_from_u64(options.seed);
		let progress_counter = ProgressCounter::new(options.n_trees as u64);
		update_progress(TrainProgress(progress_counter.clone()));
		let mut trees = Vec::with_capacity(options.n_trees);
		for _ in 0..options.n_trees {
			let examples_index = if n_examples == 0 {
				Vec::new()
			} else {
				(0..n_samples_per_tree)
					.map(|_| rng.gen_range(0..n_examples))
					.collect()
			};
			let tree = train_tree(
				features,
				targets.view(),
				hessians.view(),
				examples_index,
				&single_tree_options,
				&mut rng,
			);
			trees.push(tree);
			progress_counter.inc(1);
		}
		log::debug!(
			"random forest trained {} trees considering {} of {} features per node",
			trees.len(),
			max_features,
			n_features,
		);
		let feature_importances = compute_feature_importances(&trees, n_features);
		Self {
			task,
			trees,
			feature_importances,
		}
	}

	/// Write predictions into `predictions`, which has one row per example and `task.n_outputs()` columns.
	pub fn predict(&self, features: &[FeatureColumnView], mut predictions: ArrayViewMut2<f32>) {
		predictions.fill(0.0);
		if self.trees.is_empty() {
			return;
		}
		let n_trees = self.trees.len() as f32;
		for (example_index, mut row) in predictions.axis_iter_mut(Axis(0)).enumerate() {
			for tree in self.trees.iter() {
				let values = tree.predict(features, example_index);
				for (prediction, value) in row.iter_mut().zip(values) {
					*prediction += *value;
				}
			}
			row.mapv_inplace(|prediction| prediction / n_trees);
		}
	}
}

#[test]
fn test_random_forest_is_deterministic_for_a_seed() {
	let x: Vec<f32> = (0..60).map(|i| i as f32).collect();
	let z: Vec<f32> = (0..60).map(|i| ((i * 17) % 13) as f32).collect();
	let y: Vec<usize> = (0..60).map(|i| if i < 30 { 1 } else { 2 }).collect();
	let features = [FeatureColumnView::Number(&x), FeatureColumnView::Number(&z)];
	let labels = LabelsView::Enum {
		n_classes: 2,
		data: &y,
	};
	let options = RandomForestTrainOptions {
		n_trees: 10,
		..Default::default()
	};
	let mut n_progress_updates = 0;
	let a = RandomForest::train(&features, labels, &options, &mut |_| n_progress_updates += 1);
	let b = RandomForest::train(&features, labels, &options, &mut |_| {});
	assert_eq!(n_progress_updates, 1);
	assert_eq!(a.trees.len(), 10);
	let mut predictions_a = Array2::zeros((60, 2));
	let mut predictions_b = Array2::zeros((60, 2));
	a.predict(&features, predictions_a.view_mut());
	b.predict(&features, predictions_b.view_mut());
	assert_eq!(predictions_a, predictions_b);
	for row in predictions_a.axis_iter(Axis(0)) {
		assert!((row.sum() - 1.0).abs() < 1e-5);
	}
	assert!(predictions_a[[0, 0]] > 0.5);
	assert!(predictions_a[[59, 1]] > 0.5);
}
