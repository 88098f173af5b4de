use super::FeatureColumnView;
use serde::{Deserialize, Serialize};

/// Trees are stored as a `Vec` of `Node`s. Each branch in the tree has two indexes into the `Vec`, one for each of its children. The root is the node at index 0.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tree {
	pub nodes: Vec<Node>,
}

impl Tree {
	/// Return the leaf values for the example at `example_index`.
	pub fn predict(&self, features: &[FeatureColumnView], example_index: usize) -> &[f32] {
		// Start at the root node.
		let mut node_index = 0;
		// Traverse the tree until we get to a leaf.
		loop {
			match &self.nodes[node_index] {
				Node::Branch(BranchNode {
					left_child_index,
					right_child_index,
					split,
					..
				}) => {
					node_index = match split.direction(features, example_index) {
						SplitDirection::Left => *left_child_index,
						SplitDirection::Right => *right_child_index,
					};
				}
				// We made it to a leaf! The prediction is the leaf's values.
				Node::Leaf(LeafNode { values, .. }) => return values,
			}
		}
	}
}

/// A node is either a branch or a leaf.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Node {
	Branch(BranchNode),
	Leaf(LeafNode),
}

impl Node {
	pub fn examples_fraction(&self) -> f32 {
		match self {
			Self::Leaf(LeafNode {
				examples_fraction, ..
			}) => *examples_fraction,
			Self::Branch(BranchNode {
				examples_fraction, ..
			}) => *examples_fraction,
		}
	}
}

/// A `BranchNode` is a branch in a tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BranchNode {
	/// This is the index in the tree's node vector for this node's left child.
	pub left_child_index: usize,
	/// This is the index in the tree's node vector for this node's right child.
	pub right_child_index: usize,
	/// When making predictions, an example will be sent either to the right or left child. The `split` contains the information necessary to determine which way it will go.
	pub split: BranchSplit,
	/// Branch nodes store the fraction of training examples that passed through them during training.
	pub examples_fraction: f32,
}

/// A `BranchSplit` describes how examples are sent to the left or right child given their feature values. A `Continous` split is used for number features, and `Discrete` is used for enum features.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BranchSplit {
	Continuous(BranchSplitContinuous),
	Discrete(BranchSplitDiscrete),
}

impl BranchSplit {
	pub fn feature_index(&self) -> usize {
		match self {
			Self::Continuous(b) => b.feature_index,
			Self::Discrete(b) => b.feature_index,
		}
	}

	/// Determine which child the example at `example_index` is sent to.
	pub fn direction(
		&self,
		features: &[FeatureColumnView],
		example_index: usize,
	) -> SplitDirection {
		match (self, &features[self.feature_index()]) {
			(
				BranchSplit::Continuous(BranchSplitContinuous {
					split_value,
					invalid_values_direction,
					..
				}),
				FeatureColumnView::Number(data),
			) => {
				let value = data[example_index];
				if value.is_nan() {
					*invalid_values_direction
				} else if value <= *split_value {
					SplitDirection::Left
				} else {
					SplitDirection::Right
				}
			}
			(
				BranchSplit::Discrete(BranchSplitDiscrete { directions, .. }),
				FeatureColumnView::Enum { data, .. },
			) => {
				let bin_index = data[example_index].map(|value| value.get()).unwrap_or(0);
				directions
					.get(bin_index)
					.copied()
					.unwrap_or(SplitDirection::Right)
			}
			// A feature whose kind does not match the split is treated as invalid.
			(
				BranchSplit::Continuous(BranchSplitContinuous {
					invalid_values_direction,
					..
				}),
				_,
			) => *invalid_values_direction,
			(BranchSplit::Discrete(BranchSplitDiscrete { directions, .. }), _) => directions
				.get(0)
				.copied()
				.unwrap_or(SplitDirection::Right),
		}
	}
}

/// A continuous branch split takes the value of a single number feature, compares it with a `split_value`, and if the value is <= `split_value`, the example is sent left, and if it is > `split_value`, it is sent right.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BranchSplitContinuous {
	/// This is the index of the feature to get the value for.
	pub feature_index: usize,
	/// This is the threshold value of the split.
	pub split_value: f32,
	/// This is the direction invalid values should be sent.
	pub invalid_values_direction: SplitDirection,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SplitDirection {
	Left,
	Right,
}

/// A discrete branch split takes the value of a single enum feature and looks up which way the example should be sent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BranchSplitDiscrete {
	/// This is the index of the feature to get the value for.
	pub feature_index: usize,
	/// This specifies which direction an example should be sent, indexed by the feature's enum value. Index 0 holds the direction for invalid values. Options unseen during training go right.
	pub directions: Vec<SplitDirection>,
}

/// The leaves in a tree hold the values to output for examples that get sent to them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeafNode {
	/// These are the values to output, one per model output.
	pub values: Vec<f32>,
	/// Leaf nodes store the fraction of training examples that were sent to them during training.
	pub examples_fraction: f32,
}
