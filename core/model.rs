/*!
A [`Model`](struct.Model.html) is the artifact produced by [`train`](../train/fn.train.html). It holds everything needed to score a dataset: the formula, the types the feature columns had in the training data, the feature groups, and the learned parameters.

Models are saved as the four magic bytes `SCMD`, a format version byte, and the model encoded as MessagePack.
*/

use crate::{
	features::{compute_features_array, ColumnMapping, FeatureColumn, FeatureGroup},
	formula::Formula,
	id::Id,
	train::{Algorithm, Task, TrainOptions},
};
use ndarray::prelude::*;
use scorecard_dataframe::{DataFrame, Schema};
use scorecard_util::{data_err, error::IoResultExt, Error, Result};
use serde::{Deserialize, Serialize};
use std::{
	io::Write,
	path::{Path, PathBuf},
};

const MAGIC: &[u8; 4] = b"SCMD";
const VERSION: u8 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Model {
	pub id: Id,
	pub algorithm: Algorithm,
	pub formula: Formula,
	/// The schema of the training dataset.
	pub schema: Schema,
	pub task: Task,
	/// One feature group per feature in `formula`, in the same order.
	pub feature_groups: Vec<FeatureGroup>,
	pub learned: Learned,
	pub options: TrainOptions,
	pub n_training_rows: u64,
}

/// The learned parameters of each algorithm.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Learned {
	LinearRegression(scorecard_linear::Regressor),
	LogisticRegression(scorecard_linear::BinaryClassifier),
	DecisionTree(scorecard_tree::DecisionTree),
	RandomForest(scorecard_tree::RandomForest),
	GradientBoostedTrees(scorecard_tree::GradientBoostedTrees),
}

impl Learned {
	/// Write predictions for `n_rows` rows into `predictions`, which has one column per output of the model's task.
	pub fn predict(
		&self,
		feature_groups: &[FeatureGroup],
		columns: &[FeatureColumn],
		n_rows: usize,
		mut predictions: ArrayViewMut2<f32>,
	) {
		match self {
			Learned::LinearRegression(model) => {
				let features = compute_features_array(feature_groups, columns, n_rows);
				model.predict(features.view(), predictions.column_mut(0));
			}
			Learned::LogisticRegression(model) => {
				let features = compute_features_array(feature_groups, columns, n_rows);
				model.predict(features.view(), predictions);
			}
			Learned::DecisionTree(model) => {
				let views: Vec<_> = columns.iter().map(|column| column.view()).collect();
				model.predict(&views, predictions);
			}
			Learned::RandomForest(model) => {
				let views: Vec<_> = columns.iter().map(|column| column.view()).collect();
				model.predict(&views, predictions);
			}
			Learned::GradientBoostedTrees(model) => {
				let views: Vec<_> = columns.iter().map(|column| column.view()).collect();
				model.predict(&views, predictions);
			}
		}
	}

	/// The importance of each feature, for the tree models.
	pub fn feature_importances(&self) -> Option<&[f32]> {
		match self {
			Learned::LinearRegression(_) | Learned::LogisticRegression(_) => None,
			Learned::DecisionTree(model) => Some(&model.feature_importances),
			Learned::RandomForest(model) => Some(&model.feature_importances),
			Learned::GradientBoostedTrees(model) => Some(&model.feature_importances),
		}
	}
}

impl Model {
	/// The prediction column names used when none are given: `{response}_pred` for regression and `{class}_prob` for each class.
	pub fn default_prediction_names(&self) -> Vec<String> {
		match &self.task {
			Task::Regression => vec![format!("{}_pred", self.formula.response)],
			Task::Classification { classes } => {
				classes.iter().map(|class| format!("{}_prob", class)).collect()
			}
		}
	}

	/// Determine how to convert each feature column of a dataset with `schema` to the type it had in training. This fails with a data error naming the first feature that is missing or incompatible.
	pub fn column_mappings(&self, schema: &Schema) -> Result<Vec<ColumnMapping>> {
		self.formula
			.features
			.iter()
			.map(|name| {
				let training_column = self
					.schema
					.get(name)
					.ok_or_else(|| {
						data_err!("column {:?} is not in the model's training schema", name)
					})?;
				let column = schema
					.get(name)
					.ok_or_else(|| data_err!("column {:?} is not in the dataset", name))?;
				ColumnMapping::new(name, &training_column.column_type, &column.column_type)
			})
			.collect()
	}

	/// Predict every row of `dataframe`. The result has one row per row of `dataframe` and `task.n_outputs()` columns.
	pub fn predict(
		&self,
		dataframe: &DataFrame,
		mappings: &[ColumnMapping],
	) -> Result<Array2<f32>> {
		let n_rows = dataframe.nrows();
		let columns = self
			.formula
			.features
			.iter()
			.zip(mappings.iter())
			.map(|(name, mapping)| {
				let column = dataframe
					.column(name)
					.ok_or_else(|| data_err!("column {:?} is not in the dataset", name))?;
				mapping.apply(column)
			})
			.collect::<Result<Vec<_>>>()?;
		let mut predictions = Array2::zeros((n_rows, self.task.n_outputs()));
		self.learned
			.predict(&self.feature_groups, &columns, n_rows, predictions.view_mut());
		Ok(predictions)
	}

	/// Save the model, replacing the file at `path` only once the whole model has been written.
	pub fn to_path(&self, path: &Path) -> Result<()> {
		let dir = match path.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent.to_owned(),
			_ => PathBuf::from("."),
		};
		let mut temp_file = tempfile::NamedTempFile::new_in(&dir).at_path(&dir)?;
		let bytes = rmp_serde::to_vec_named(self)
			.map_err(|error| data_err!("failed to encode model: {}", error))?;
		temp_file.write_all(MAGIC).at_path(path)?;
		temp_file.write_all(&[VERSION]).at_path(path)?;
		temp_file.write_all(&bytes).at_path(path)?;
		temp_file.as_file().sync_all().at_path(path)?;
		temp_file
			.persist(path)
			.map_err(|error| Error::io(path, error.error))?;
		log::info!("saved model {} to {}", self.id, path.display());
		Ok(())
	}

	pub fn from_path(path: &Path) -> Result<Model> {
		let bytes = std::fs::read(path).at_path(path)?;
		if bytes.len() < MAGIC.len() + 1 || &bytes[..MAGIC.len()] != MAGIC {
			return Err(data_err!("{} is not a scorecard model", path.display()));
		}
		let version = bytes[MAGIC.len()];
		if version != VERSION {
			return Err(data_err!(
				"{} has model format version {}, but only version {} is supported",
				path.display(),
				version,
				VERSION
			));
		}
		rmp_serde::from_slice(&bytes[MAGIC.len() + 1..])
			.map_err(|error| data_err!("failed to decode model {}: {}", path.display(), error))
	}
}

#[test]
fn test_from_path_rejects_other_files() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("model.scm");
	std::fs::write(&path, b"not a model").unwrap();
	assert!(Model::from_path(&path).unwrap_err().is_data());
	std::fs::write(&path, b"SCMD\x09").unwrap();
	let error = Model::from_path(&path).unwrap_err();
	assert!(error.is_data());
	assert!(error.to_string().contains("version 9"));
	std::fs::write(&path, b"SCMD\x01garbage").unwrap();
	assert!(Model::from_path(&path).unwrap_err().is_data());
	assert!(Model::from_path(&dir.path().join("missing.scm"))
		.unwrap_err()
		.is_io());
}
