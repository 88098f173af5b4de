/*!
This crate implements machine learning models for regression and classification built from decision trees: a single [`DecisionTree`](struct.DecisionTree.html), a bagged [`RandomForest`](struct.RandomForest.html), and [`GradientBoostedTrees`](struct.GradientBoostedTrees.html).

All three share one tree learner. Each training example carries a vector of targets and a vector of hessians, a leaf outputs `sum(targets) / (sum(hessians) + l2_regularization)` for each output, and a split is scored by how much it increases `sum(targets)^2 / (sum(hessians) + l2_regularization)` summed over its children. With unit hessians and the raw labels as targets this is the classic variance reduction criterion for regression, and with one-hot class indicators it is the Gini criterion for classification. Gradient boosting passes negative gradients and hessians of its loss instead.

Features are passed column by column as [`FeatureColumnView`](enum.FeatureColumnView.html)s. Number features are split with a threshold, and NaN values are routed to whichever side was better during training. Enum features are split by sending a subset of their options left.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod decision_tree;
mod feature_importances;
mod gradient_boosted_trees;
mod random_forest;
mod single;
mod types;

pub use self::decision_tree::{DecisionTree, DecisionTreeTrainOptions};
pub use self::gradient_boosted_trees::{GradientBoostedTrees, GradientBoostedTreesTrainOptions};
pub use self::random_forest::{RandomForest, RandomForestTrainOptions};
pub use self::types::*;
use ndarray::prelude::*;
use scorecard_util::progress_counter::ProgressCounter;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// A view of one feature column. Enum values are 1-based indexes into the feature's options, and `None` marks an invalid value.
#[derive(Clone, Copy, Debug)]
pub enum FeatureColumnView<'a> {
	Number(&'a [f32]),
	Enum {
		n_options: usize,
		data: &'a [Option<NonZeroUsize>],
	},
}

impl<'a> FeatureColumnView<'a> {
	pub fn len(&self) -> usize {
		match self {
			FeatureColumnView::Number(data) => data.len(),
			FeatureColumnView::Enum { data, .. } => data.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// The labels passed to `train`. Class labels are 1-based indexes into the response's options.
#[derive(Clone, Copy, Debug)]
pub enum LabelsView<'a> {
	Number(&'a [f32]),
	Enum { n_classes: usize, data: &'a [usize] },
}

impl<'a> LabelsView<'a> {
	pub fn len(&self) -> usize {
		match self {
			LabelsView::Number(data) => data.len(),
			LabelsView::Enum { data, .. } => data.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn task(&self) -> Task {
		match self {
			LabelsView::Number(_) => Task::Regression,
			LabelsView::Enum { n_classes, .. } => Task::Classification {
				n_classes: *n_classes,
			},
		}
	}
}

/// Regression models output a single value per example. Classification models output one probability per class.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Task {
	Regression,
	Classification { n_classes: usize },
}

impl Task {
	/// The number of prediction columns a model for this task writes.
	pub fn n_outputs(&self) -> usize {
		match self {
			Task::Regression => 1,
			Task::Classification { n_classes } => *n_classes,
		}
	}
}

/// This struct reports the training progress, which tracks the number of trees or rounds trained.
#[derive(Debug)]
pub struct TrainProgress(pub ProgressCounter);

/// Build the targets the tree learner averages in its leaves: the labels themselves for regression and one-hot class indicators for classification.
fn compute_targets(labels: LabelsView) -> Array2<f32> {
	match labels {
		LabelsView::Number(data) => Array2::from_shape_fn((data.len(), 1), |(i, _)| data[i]),
		LabelsView::Enum { n_classes, data } => {
			let mut targets = Array2::zeros((data.len(), n_classes));
			for (mut row, label) in targets.axis_iter_mut(Axis(0)).zip(data.iter()) {
				if let Some(target) = row.get_mut(label.wrapping_sub(1)) {
					*target = 1.0;
				}
			}
			targets
		}
	}
}

#[test]
fn test_compute_targets_one_hot() {
	let labels = [2, 1, 3];
	let targets = compute_targets(LabelsView::Enum {
		n_classes: 3,
		data: &labels,
	});
	assert_eq!(
		targets,
		arr2(&[[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]])
	);
}
