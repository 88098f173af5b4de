/*!
This module trains a single tree. The tree is grown depth first: at each node, every candidate feature is searched for the split with the largest gain, and the node becomes a leaf when no split satisfies the options.
*/

use super::{
	BranchNode, BranchSplit, BranchSplitContinuous, BranchSplitDiscrete, FeatureColumnView,
	LeafNode, Node, SplitDirection, Tree,
};
use ndarray::prelude::*;
use rand::{seq::SliceRandom, Rng};

/// The sum of hessians in each child of a split must be at least this value.
const MIN_SUM_HESSIANS_PER_CHILD: f64 = 1e-3;

/// When choosing which direction each enum option should be sent in a discrete split, the options are sorted by their smoothed leaf value. This smoothing factor is added to the denominator of that score.
const SMOOTHING_FACTOR_FOR_DISCRETE_BIN_SORTING: f64 = 10.0;

#[derive(Clone, Debug)]
pub struct SingleTreeOptions {
	/// The depth of the tree will never exceed this value. A tree with `max_depth` 0 is a single leaf.
	pub max_depth: usize,
	/// A split will only be considered valid if the number of training examples sent to each of the resulting children is at least this value.
	pub min_examples_per_leaf: usize,
	/// A node will only be split if the best split achieves more than this gain.
	pub min_gain_to_split: f32,
	pub l2_regularization: f32,
	/// If this is `Some(n)`, only `n` randomly chosen features are considered at each node, unless none of them can be split.
	pub max_features: Option<usize>,
}

/// Train a tree on the rows of `targets` and `hessians` listed in `examples_index`. A row may appear more than once, which is how bootstrap samples are expressed.
pub fn train_tree<'a, R: Rng>(
	features: &'a [FeatureColumnView<'a>],
	targets: ArrayView2<'a, f32>,
	hessians: ArrayView2<'a, f32>,
	examples_index: Vec<usize>,
	options: &'a SingleTreeOptions,
	rng: &mut R,
) -> Tree {
	let n_outputs = targets.ncols();
	let n_examples_root = examples_index.len().max(1) as f32;
	let root_stats = NodeStats::from_examples(n_outputs, &examples_index, targets, hessians);
	let mut state = TreeTrainer {
		features,
		targets,
		hessians,
		options,
		n_examples_root,
		nodes: Vec::new(),
	};
	state.grow(examples_index, root_stats, 0, rng);
	Tree { nodes: state.nodes }
}

struct TreeTrainer<'a> {
	features: &'a [FeatureColumnView<'a>],
	targets: ArrayView2<'a, f32>,
	hessians: ArrayView2<'a, f32>,
	options: &'a SingleTreeOptions,
	n_examples_root: f32,
	nodes: Vec<Node>,
}

impl<'a> TreeTrainer<'a> {
	/// Grow the subtree for `examples_index` and return the index of its root node.
	fn grow<R: Rng>(
		&mut self,
		examples_index: Vec<usize>,
		stats: NodeStats,
		depth: usize,
		rng: &mut R,
	) -> usize {
		let node_index = self.nodes.len();
		let examples_fraction = examples_index.len() as f32 / self.n_examples_root;
		let l2_regularization = f64::from(self.options.l2_regularization);
		self.nodes.push(Node::Leaf(LeafNode {
			values: stats.leaf_values(l2_regularization),
			examples_fraction,
		}));
		let can_split = depth < self.options.max_depth
			&& examples_index.len() >= 2 * self.options.min_examples_per_leaf.max(1);
		if !can_split {
			return node_index;
		}
		let split = match self.choose_best_split(&examples_index, &stats, rng) {
			Some(split) if split.gain > self.options.min_gain_to_split => split,
			_ => return node_index,
		};
		let (left_examples_index, right_examples_index): (Vec<usize>, Vec<usize>) =
			examples_index.iter().partition(|example_index| {
				split.split.direction(self.features, **example_index) == SplitDirection::Left
			});
		let n_outputs = stats.n_outputs();
		let left_stats = NodeStats::from_examples(
			n_outputs,
			&left_examples_index,
			self.targets,
			self.hessians,
		);
		let right_stats = NodeStats::from_examples(
			n_outputs,
			&right_examples_index,
			self.targets,
			self.hessians,
		);
		let left_child_index = self.grow(left_examples_index, left_stats, depth + 1, rng);
		let right_child_index = self.grow(right_examples_index, right_stats, depth + 1, rng);
		self.nodes[node_index] = Node::Branch(BranchNode {
			left_child_index,
			right_child_index,
			split: split.split,
			examples_fraction,
		});
		node_index
	}

	fn choose_best_split<R: Rng>(
		&self,
		examples_index: &[usize],
		stats: &NodeStats,
		rng: &mut R,
	) -> Option<ChosenSplit> {
		let n_features = self.features.len();
		// With feature subsampling, features are visited in a random order and the search stops once `max_features` have been examined and a valid split was found.
		let (feature_indexes, max_features) = match self.options.max_features {
			Some(max_features) if max_features < n_features => {
				let mut feature_indexes: Vec<usize> = (0..n_features).collect();
				feature_indexes.shuffle(rng);
				(feature_indexes, max_features.max(1))
			}
			_ => ((0..n_features).collect(), n_features),
		};
		let mut best: Option<ChosenSplit> = None;
		for (n_examined, feature_index) in feature_indexes.into_iter().enumerate() {
			if n_examined >= max_features && best.is_some() {
				break;
			}
			let candidate = match self.features[feature_index] {
				FeatureColumnView::Number(data) => {
					self.choose_best_continuous_split(feature_index, data, examples_index, stats)
				}
				FeatureColumnView::Enum { n_options, data } => self.choose_best_discrete_split(
					feature_index,
					n_options,
					data,
					examples_index,
					stats,
				),
			};
			if let Some(candidate) = candidate {
				if best
					.as_ref()
					.map(|best| candidate.gain > best.gain)
					.unwrap_or(true)
				{
					best = Some(candidate);
				}
			}
		}
		best
	}

	fn choose_best_continuous_split(
		&self,
		feature_index: usize,
		data: &[f32],
		examples_index: &[usize],
		stats: &NodeStats,
	) -> Option<ChosenSplit> {
		let n_outputs = stats.n_outputs();
		let l2_regularization = f64::from(self.options.l2_regularization);
		let min_examples_per_leaf = self.options.min_examples_per_leaf;
		let mut valid: Vec<(f32, usize)> = Vec::with_capacity(examples_index.len());
		let mut invalid_stats = NodeStats::new(n_outputs);
		for example_index in examples_index.iter().copied() {
			let value = data[example_index];
			if value.is_nan() {
				invalid_stats.add_example(
					self.targets.row(example_index),
					self.hessians.row(example_index),
				);
			} else {
				valid.push((value, example_index));
			}
		}
		if valid.len() < 2 {
			return None;
		}
		valid.sort_by(|a, b| a.0.total_cmp(&b.0));
		let parent_score = stats.score(l2_regularization);
		let mut valid_total = stats.clone();
		valid_total.subtract(&invalid_stats);
		let has_invalid_values = invalid_stats.n_examples > 0;
		let mut left = NodeStats::new(n_outputs);
		let mut right = NodeStats::new(n_outputs);
		let mut best: Option<(f32, f32, SplitDirection)> = None;
		for position in 0..valid.len() - 1 {
			let (value, example_index) = valid[position];
			left.add_example(self.targets.row(example_index), self.hessians.row(example_index));
			if value == valid[position + 1].0 {
				continue;
			}
			right.set_difference(&valid_total, &left);
			let directions: &[SplitDirection] = if has_invalid_values {
				&[SplitDirection::Left, SplitDirection::Right]
			} else {
				&[SplitDirection::Right]
			};
			for invalid_values_direction in directions.iter().copied() {
				if invalid_values_direction == SplitDirection::Left {
					left.add(&invalid_stats);
				} else {
					right.add(&invalid_stats);
				}
				let valid_split = left.n_examples >= min_examples_per_leaf
					&& right.n_examples >= min_examples_per_leaf
					&& left.min_sum_hessians() >= MIN_SUM_HESSIANS_PER_CHILD
					&& right.min_sum_hessians() >= MIN_SUM_HESSIANS_PER_CHILD;
				if valid_split {
					let gain = (left.score(l2_regularization) + right.score(l2_regularization)
						- parent_score) as f32;
					if best.map(|(best_gain, _, _)| gain > best_gain).unwrap_or(true) {
						best = Some((gain, value, invalid_values_direction));
					}
				}
				if invalid_values_direction == SplitDirection::Left {
					left.subtract(&invalid_stats);
				} else {
					right.subtract(&invalid_stats);
				}
			}
		}
		best.map(|(gain, split_value, invalid_values_direction)| ChosenSplit {
			gain,
			split: BranchSplit::Continuous(BranchSplitContinuous {
				feature_index,
				split_value,
				invalid_values_direction,
			}),
		})
	}

	fn choose_best_discrete_split(
		&self,
		feature_index: usize,
		n_options: usize,
		data: &[Option<std::num::NonZeroUsize>],
		examples_index: &[usize],
		stats: &NodeStats,
	) -> Option<ChosenSplit> {
		let n_outputs = stats.n_outputs();
		let l2_regularization = f64::from(self.options.l2_regularization);
		let min_examples_per_leaf = self.options.min_examples_per_leaf;
		// Bin 0 holds invalid values and bin i holds option i.
		let mut bins = vec![NodeStats::new(n_outputs); n_options + 1];
		for example_index in examples_index.iter().copied() {
			let bin_index = data[example_index]
				.map(|value| value.get())
				.filter(|bin_index| *bin_index <= n_options)
				.unwrap_or(0);
			bins[bin_index].add_example(
				self.targets.row(example_index),
				self.hessians.row(example_index),
			);
		}
		let mut sorted_bin_indexes: Vec<usize> = (0..bins.len())
			.filter(|bin_index| bins[*bin_index].n_examples > 0)
			.collect();
		if sorted_bin_indexes.len() < 2 {
			return None;
		}
		// Sorting by the last output is exact for a single output and for two classes.
		sorted_bin_indexes.sort_by(|a, b| {
			let a = bins[*a].sort_score();
			let b = bins[*b].sort_score();
			a.total_cmp(&b)
		});
		let parent_score = stats.score(l2_regularization);
		let mut left = NodeStats::new(n_outputs);
		let mut right = NodeStats::new(n_outputs);
		let mut best: Option<(f32, usize)> = None;
		for (position, bin_index) in sorted_bin_indexes[..sorted_bin_indexes.len() - 1]
			.iter()
			.enumerate()
		{
			left.add(&bins[*bin_index]);
			right.set_difference(stats, &left);
			let valid_split = left.n_examples >= min_examples_per_leaf
				&& right.n_examples >= min_examples_per_leaf
				&& left.min_sum_hessians() >= MIN_SUM_HESSIANS_PER_CHILD
				&& right.min_sum_hessians() >= MIN_SUM_HESSIANS_PER_CHILD;
			if !valid_split {
				continue;
			}
			let gain =
				(left.score(l2_regularization) + right.score(l2_regularization) - parent_score)
					as f32;
			if best.map(|(best_gain, _)| gain > best_gain).unwrap_or(true) {
				best = Some((gain, position));
			}
		}
		best.map(|(gain, position)| {
			let mut directions = vec![SplitDirection::Right; n_options + 1];
			for bin_index in &sorted_bin_indexes[..=position] {
				directions[*bin_index] = SplitDirection::Left;
			}
			ChosenSplit {
				gain,
				split: BranchSplit::Discrete(BranchSplitDiscrete {
					feature_index,
					directions,
				}),
			}
		})
	}
}

struct ChosenSplit {
	gain: f32,
	split: BranchSplit,
}

/// The sums of targets and hessians, per output, over the examples in a node.
#[derive(Clone, Debug)]
struct NodeStats {
	n_examples: usize,
	sum_targets: Vec<f64>,
	sum_hessians: Vec<f64>,
}

impl NodeStats {
	fn new(n_outputs: usize) -> Self {
		Self {
			n_examples: 0,
			sum_targets: vec![0.0; n_outputs],
			sum_hessians: vec![0.0; n_outputs],
		}
	}

	fn from_examples(
		n_outputs: usize,
		examples_index: &[usize],
		targets: ArrayView2<f32>,
		hessians: ArrayView2<f32>,
	) -> Self {
		let mut stats = Self::new(n_outputs);
		for example_index in examples_index.iter().copied() {
			stats.add_example(targets.row(example_index), hessians.row(example_index));
		}
		stats
	}

	fn n_outputs(&self) -> usize {
		self.sum_targets.len()
	}

	fn add_example(&mut self, targets: ArrayView1<f32>, hessians: ArrayView1<f32>) {
		self.n_examples += 1;
		for (sum, target) in self.sum_targets.iter_mut().zip(targets.iter()) {
			*sum += f64::from(*target);
		}
		for (sum, hessian) in self.sum_hessians.iter_mut().zip(hessians.iter()) {
			*sum += f64::from(*hessian);
		}
	}

	fn add(&mut self, other: &NodeStats) {
		self.n_examples += other.n_examples;
		for (sum, other) in self.sum_targets.iter_mut().zip(other.sum_targets.iter()) {
			*sum += other;
		}
		for (sum, other) in self.sum_hessians.iter_mut().zip(other.sum_hessians.iter()) {
			*sum += other;
		}
	}

	fn subtract(&mut self, other: &NodeStats) {
		self.n_examples -= other.n_examples;
		for (sum, other) in self.sum_targets.iter_mut().zip(other.sum_targets.iter()) {
			*sum -= other;
		}
		for (sum, other) in self.sum_hessians.iter_mut().zip(other.sum_hessians.iter()) {
			*sum -= other;
		}
	}

	fn set_difference(&mut self, total: &NodeStats, part: &NodeStats) {
		self.n_examples = total.n_examples - part.n_examples;
		for (sum, (total, part)) in self
			.sum_targets
			.iter_mut()
			.zip(total.sum_targets.iter().zip(part.sum_targets.iter()))
		{
			*sum = total - part;
		}
		for (sum, (total, part)) in self
			.sum_hessians
			.iter_mut()
			.zip(total.sum_hessians.iter().zip(part.sum_hessians.iter()))
		{
			*sum = total - part;
		}
	}

	fn min_sum_hessians(&self) -> f64 {
		self.sum_hessians
			.iter()
			.copied()
			.fold(f64::INFINITY, f64::min)
	}

	fn score(&self, l2_regularization: f64) -> f64 {
		self.sum_targets
			.iter()
			.zip(self.sum_hessians.iter())
			.map(|(sum_targets, sum_hessians)| {
				let denominator = sum_hessians + l2_regularization;
				if denominator > 0.0 {
					sum_targets * sum_targets / denominator
				} else {
					0.0
				}
			})
			.sum()
	}

	fn leaf_values(&self, l2_regularization: f64) -> Vec<f32> {
		self.sum_targets
			.iter()
			.zip(self.sum_hessians.iter())
			.map(|(sum_targets, sum_hessians)| {
				let denominator = sum_hessians + l2_regularization;
				if denominator > 0.0 {
					(sum_targets / denominator) as f32
				} else {
					0.0
				}
			})
			.collect()
	}

	fn sort_score(&self) -> f64 {
		let last = self.n_outputs() - 1;
		self.sum_targets[last]
			/ (self.sum_hessians[last] + SMOOTHING_FACTOR_FOR_DISCRETE_BIN_SORTING)
	}
}

#[cfg(test)]
fn unit_hessians(n_examples: usize, n_outputs: usize) -> Array2<f32> {
	Array2::ones((n_examples, n_outputs))
}

#[test]
fn test_continuous_split_with_invalid_values() {
	use rand::SeedableRng;
	let values = [1.0, 2.0, f32::NAN, 10.0, 11.0, f32::NAN];
	let features = [FeatureColumnView::Number(&values)];
	let targets = arr2(&[[0.0], [0.0], [5.0], [5.0], [5.0], [5.0]]);
	let hessians = unit_hessians(6, 1);
	let options = SingleTreeOptions {
		max_depth: 1,
		min_examples_per_leaf: 1,
		min_gain_to_split: 0.0,
		l2_regularization: 0.0,
		max_features: None,
	};
	let mut rng = rand_xoshiro::Xoshiro256Plus::seed_from_u64(0);
	let tree = train_tree(
		&features,
		targets.view(),
		hessians.view(),
		(0..6).collect(),
		&options,
		&mut rng,
	);
	match &tree.nodes[0] {
		Node::Branch(BranchNode {
			split: BranchSplit::Continuous(split),
			..
		}) => {
			assert_eq!(split.split_value, 2.0);
			assert_eq!(split.invalid_values_direction, SplitDirection::Right);
		}
		node => panic!("expected a continuous branch, got {:?}", node),
	}
	assert_eq!(tree.predict(&features, 0), &[0.0]);
	assert_eq!(tree.predict(&features, 2), &[5.0]);
	assert_eq!(tree.predict(&features, 4), &[5.0]);
}

#[test]
fn test_discrete_split_groups_options() {
	use rand::SeedableRng;
	use std::num::NonZeroUsize;
	let n = |i: usize| NonZeroUsize::new(i);
	let values = [n(1), n(3), n(2), n(2), n(1), n(3)];
	let features = [FeatureColumnView::Enum {
		n_options: 3,
		data: &values,
	}];
	// Options 1 and 3 are class 1, option 2 is class 2.
	let targets = arr2(&[
		[1.0, 0.0],
		[1.0, 0.0],
		[0.0, 1.0],
		[0.0, 1.0],
		[1.0, 0.0],
		[1.0, 0.0],
	]);
	let hessians = unit_hessians(6, 2);
	let options = SingleTreeOptions {
		max_depth: 3,
		min_examples_per_leaf: 1,
		min_gain_to_split: 0.0,
		l2_regularization: 0.0,
		max_features: None,
	};
	let mut rng = rand_xoshiro::Xoshiro256Plus::seed_from_u64(0);
	let tree = train_tree(
		&features,
		targets.view(),
		hessians.view(),
		(0..6).collect(),
		&options,
		&mut rng,
	);
	assert_eq!(tree.nodes.len(), 3);
	assert_eq!(tree.predict(&features, 0), &[1.0, 0.0]);
	assert_eq!(tree.predict(&features, 1), &[1.0, 0.0]);
	assert_eq!(tree.predict(&features, 2), &[0.0, 1.0]);
	let unseen = [None];
	let unseen_features = [FeatureColumnView::Enum {
		n_options: 3,
		data: &unseen,
	}];
	assert_eq!(tree.predict(&unseen_features, 0).len(), 2);
}

#[test]
fn test_max_depth_zero_is_a_leaf() {
	use rand::SeedableRng;
	let values = [1.0, 2.0, 3.0, 4.0];
	let features = [FeatureColumnView::Number(&values)];
	let targets = arr2(&[[1.0], [2.0], [3.0], [6.0]]);
	let hessians = unit_hessians(4, 1);
	let options = SingleTreeOptions {
		max_depth: 0,
		min_examples_per_leaf: 1,
		min_gain_to_split: 0.0,
		l2_regularization: 0.0,
		max_features: None,
	};
	let mut rng = rand_xoshiro::Xoshiro256Plus::seed_from_u64(0);
	let tree = train_tree(
		&features,
		targets.view(),
		hessians.view(),
		(0..4).collect(),
		&options,
		&mut rng,
	);
	assert_eq!(tree.nodes.len(), 1);
	assert_eq!(tree.predict(&features, 3), &[3.0]);
}
