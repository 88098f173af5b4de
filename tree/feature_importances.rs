use super::{BranchNode, Node, Tree};

/// This function computes feature importances using the "split" method, where a feature's importance is proportional to the number of nodes that use it to split.
pub fn compute_feature_importances(trees: &[Tree], n_features: usize) -> Vec<f32> {
	let mut feature_importances = vec![0.0; n_features];
	for tree in trees.iter() {
		for node in tree.nodes.iter() {
			if let Node::Branch(BranchNode { split, .. }) = node {
				if let Some(feature_importance) =
					feature_importances.get_mut(split.feature_index())
				{
					*feature_importance += 1.0;
				}
			}
		}
	}
	// Normalize the feature_importances.
	let total: f32 = feature_importances.iter().sum();
	if total > 0.0 {
		for feature_importance in feature_importances.iter_mut() {
			*feature_importance /= total;
		}
	}
	feature_importances
}
