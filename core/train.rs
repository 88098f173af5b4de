/*!
This module implements the Trainer. [`train`](fn.train.html) fits a [`Model`](../model/struct.Model.html) for a formula on a dataset with one of the algorithms in [`Algorithm`](enum.Algorithm.html).

Each algorithm parses its own options from the loosely typed [`TrainOptions`](type.TrainOptions.html) map into an options struct implementing [`Trainable`](trait.Trainable.html). An option the algorithm does not understand, or a value of the wrong type, fails with a configuration error before any data is read.
*/

use crate::{
	features::{
		compute_features_array, compute_linear_feature_groups, compute_tree_feature_groups,
		describe, training_feature_columns, FeatureColumn, FeatureGroup,
	},
	formula::Formula,
	id::Id,
	model::{Learned, Model},
};
use ndarray::prelude::*;
use scorecard_dataframe::{Column, ColumnType, DataFrame, Dataset};
use scorecard_util::{config_err, data_err, progress_counter::ProgressCounter, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;

/// The options passed to an algorithm, as read from a config file or `--option key=value` flags.
pub type TrainOptions = BTreeMap<String, serde_json::Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
	LinearRegression,
	LogisticRegression,
	DecisionTree,
	RandomForest,
	GradientBoostedTrees,
}

impl Algorithm {
	pub const ALL: [Algorithm; 5] = [
		Algorithm::LinearRegression,
		Algorithm::LogisticRegression,
		Algorithm::DecisionTree,
		Algorithm::RandomForest,
		Algorithm::GradientBoostedTrees,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Algorithm::LinearRegression => "linear-regression",
			Algorithm::LogisticRegression => "logistic-regression",
			Algorithm::DecisionTree => "decision-tree",
			Algorithm::RandomForest => "random-forest",
			Algorithm::GradientBoostedTrees => "gradient-boosted-trees",
		}
	}

	/// Parse `options` into this algorithm's options struct.
	pub fn trainable(&self, options: &TrainOptions) -> Result<Box<dyn Trainable>> {
		Ok(match self {
			Algorithm::LinearRegression => {
				Box::new(parse_options::<LinearRegressionOptions>(*self, options)?)
			}
			Algorithm::LogisticRegression => {
				Box::new(parse_options::<LogisticRegressionOptions>(*self, options)?)
			}
			Algorithm::DecisionTree => {
				Box::new(parse_options::<DecisionTreeOptions>(*self, options)?)
			}
			Algorithm::RandomForest => {
				Box::new(parse_options::<RandomForestOptions>(*self, options)?)
			}
			Algorithm::GradientBoostedTrees => {
				Box::new(parse_options::<GradientBoostedTreesOptions>(*self, options)?)
			}
		})
	}
}

impl std::fmt::Display for Algorithm {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for Algorithm {
	type Err = scorecard_util::Error;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Algorithm::ALL
			.iter()
			.find(|algorithm| algorithm.as_str() == s)
			.copied()
			.ok_or_else(|| {
				config_err!(
					"unknown algorithm {:?}, expected one of {}",
					s,
					itertools::join(Algorithm::ALL.iter().map(|algorithm| algorithm.as_str()), ", ")
				)
			})
	}
}

/// The task a model performs, determined by the type of its response column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Task {
	Regression,
	/// Classification over the options of an enum response, in option order.
	Classification { classes: Vec<String> },
}

impl Task {
	pub fn from_column_type(response: &str, column_type: &ColumnType) -> Result<Task> {
		match column_type {
			ColumnType::Number => Ok(Task::Regression),
			ColumnType::Enum { options } if options.len() >= 2 => Ok(Task::Classification {
				classes: options.clone(),
			}),
			ColumnType::Enum { .. } => Err(data_err!(
				"response column {:?} has fewer than two classes",
				response
			)),
			column_type => Err(data_err!(
				"response column {:?} is {}, which cannot be predicted",
				response,
				describe(column_type)
			)),
		}
	}

	/// The number of prediction columns a model for this task writes.
	pub fn n_outputs(&self) -> usize {
		match self {
			Task::Regression => 1,
			Task::Classification { classes } => classes.len(),
		}
	}
}

/// The rows of the training dataset whose response is valid.
pub struct TrainingData {
	pub dataframe: DataFrame,
	pub feature_names: Vec<String>,
	pub labels: Labels,
}

/// Regression labels, or 1-based class indexes for classification.
pub enum Labels {
	Number(Vec<f32>),
	Enum { n_classes: usize, data: Vec<usize> },
}

impl TrainingData {
	pub fn n_rows(&self) -> usize {
		match &self.labels {
			Labels::Number(data) => data.len(),
			Labels::Enum { data, .. } => data.len(),
		}
	}

	fn feature_columns(&self) -> Result<Vec<FeatureColumn>> {
		training_feature_columns(&self.dataframe, &self.feature_names)
	}

	fn labels_view(&self) -> scorecard_tree::LabelsView {
		match &self.labels {
			Labels::Number(data) => scorecard_tree::LabelsView::Number(data),
			Labels::Enum { n_classes, data } => scorecard_tree::LabelsView::Enum {
				n_classes: *n_classes,
				data,
			},
		}
	}
}

/// An algorithm with its options parsed, ready to fit a model.
pub trait Trainable {
	fn algorithm(&self) -> Algorithm;
	/// Return a data error if this algorithm cannot perform `task`.
	fn check_task(&self, response: &str, task: &Task) -> Result<()>;
	fn train(&self, data: &TrainingData) -> Result<(Vec<FeatureGroup>, Learned)>;
}

fn parse_options<T: DeserializeOwned + Validate>(
	algorithm: Algorithm,
	options: &TrainOptions,
) -> Result<T> {
	let value = serde_json::Value::Object(options.clone().into_iter().collect());
	let options: T = serde_json::from_value(value)
		.map_err(|error| config_err!("invalid options for {}: {}", algorithm, error))?;
	options
		.validate()
		.map_err(|message| config_err!("invalid options for {}: {}", algorithm, message))?;
	Ok(options)
}

trait Validate {
	fn validate(&self) -> Result<(), String>;
}

fn ensure(condition: bool, message: &str) -> Result<(), String> {
	if condition {
		Ok(())
	} else {
		Err(message.to_owned())
	}
}

/// Options shared by linear regression and logistic regression.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LinearOptions {
	pub l2_regularization: f32,
	pub learning_rate: f32,
	pub max_epochs: usize,
	pub n_examples_per_batch: usize,
	/// The fraction of the training rows held out to decide when to stop. Zero disables early stopping.
	pub early_stopping_fraction: f32,
	pub early_stopping_rounds: usize,
	pub early_stopping_threshold: f32,
}

impl Default for LinearOptions {
	fn default() -> Self {
		Self {
			l2_regularization: 0.0,
			learning_rate: 0.1,
			max_epochs: 100,
			n_examples_per_batch: 128,
			early_stopping_fraction: 0.1,
			early_stopping_rounds: 3,
			early_stopping_threshold: 1e-3,
		}
	}
}

impl Validate for LinearOptions {
	fn validate(&self) -> Result<(), String> {
		ensure(self.l2_regularization >= 0.0, "l2_regularization must be at least 0")?;
		ensure(self.learning_rate > 0.0, "learning_rate must be greater than 0")?;
		ensure(self.max_epochs >= 1, "max_epochs must be at least 1")?;
		ensure(self.n_examples_per_batch >= 1, "n_examples_per_batch must be at least 1")?;
		ensure(
			(0.0..1.0).contains(&self.early_stopping_fraction),
			"early_stopping_fraction must be at least 0 and less than 1",
		)?;
		ensure(self.early_stopping_rounds >= 1, "early_stopping_rounds must be at least 1")?;
		ensure(self.early_stopping_threshold >= 0.0, "early_stopping_threshold must be at least 0")
	}
}

impl From<&LinearOptions> for scorecard_linear::TrainOptions {
	fn from(options: &LinearOptions) -> Self {
		let early_stopping_options = if options.early_stopping_fraction > 0.0 {
			Some(scorecard_linear::EarlyStoppingOptions {
				early_stopping_fraction: options.early_stopping_fraction,
				n_epochs_without_improvement_to_stop: options.early_stopping_rounds,
				min_decrease_in_loss_for_significant_change: options.early_stopping_threshold,
			})
		} else {
			None
		};
		scorecard_linear::TrainOptions {
			early_stopping_options,
			l2_regularization: options.l2_regularization,
			learning_rate: options.learning_rate,
			max_epochs: options.max_epochs,
			n_examples_per_batch: options.n_examples_per_batch,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinearRegressionOptions(pub LinearOptions);

#[derive(Clone, Debug, PartialEq)]
pub struct LogisticRegressionOptions(pub LinearOptions);

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DecisionTreeOptions {
	pub max_depth: usize,
	pub min_examples_per_leaf: usize,
	pub min_gain_to_split: f32,
}

impl Default for DecisionTreeOptions {
	fn default() -> Self {
		let defaults = scorecard_tree::DecisionTreeTrainOptions::default();
		Self {
			max_depth: defaults.max_depth,
			min_examples_per_leaf: defaults.min_examples_per_leaf,
			min_gain_to_split: defaults.min_gain_to_split,
		}
	}
}

impl Validate for DecisionTreeOptions {
	fn validate(&self) -> Result<(), String> {
		ensure(self.max_depth >= 1, "max_depth must be at least 1")?;
		ensure(self.min_examples_per_leaf >= 1, "min_examples_per_leaf must be at least 1")?;
		ensure(self.min_gain_to_split >= 0.0, "min_gain_to_split must be at least 0")
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RandomForestOptions {
	pub n_trees: usize,
	pub max_depth: usize,
	pub min_examples_per_leaf: usize,
	/// The fraction of features considered at each node. When absent the square root of the number of features is used.
	pub max_features: Option<f32>,
	pub sample_fraction: f32,
	pub seed: u64,
}

impl Default for RandomForestOptions {
	fn default() -> Self {
		let defaults = scorecard_tree::RandomForestTrainOptions::default();
		Self {
			n_trees: defaults.n_trees,
			max_depth: defaults.max_depth,
			min_examples_per_leaf: defaults.min_examples_per_leaf,
			max_features: defaults.max_features,
			sample_fraction: defaults.sample_fraction,
			seed: defaults.seed,
		}
	}
}

impl Validate for RandomForestOptions {
	fn validate(&self) -> Result<(), String> {
		ensure(self.n_trees >= 1, "n_trees must be at least 1")?;
		ensure(self.max_depth >= 1, "max_depth must be at least 1")?;
		ensure(self.min_examples_per_leaf >= 1, "min_examples_per_leaf must be at least 1")?;
		if let Some(max_features) = self.max_features {
			ensure(
				max_features > 0.0 && max_features <= 1.0,
				"max_features must be greater than 0 and at most 1",
			)?;
		}
		ensure(
			self.sample_fraction > 0.0 && self.sample_fraction <= 1.0,
			"sample_fraction must be greater than 0 and at most 1",
		)
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GradientBoostedTreesOptions {
	pub max_rounds: usize,
	pub learning_rate: f32,
	pub max_depth: usize,
	pub min_examples_per_leaf: usize,
	pub l2_regularization: f32,
	pub min_gain_to_split: f32,
}

impl Default for GradientBoostedTreesOptions {
	fn default() -> Self {
		let defaults = scorecard_tree::GradientBoostedTreesTrainOptions::default();
		Self {
			max_rounds: defaults.max_rounds,
			learning_rate: defaults.learning_rate,
			max_depth: defaults.max_depth,
			min_examples_per_leaf: defaults.min_examples_per_leaf,
			l2_regularization: defaults.l2_regularization,
			min_gain_to_split: defaults.min_gain_to_split,
		}
	}
}

impl Validate for GradientBoostedTreesOptions {
	fn validate(&self) -> Result<(), String> {
		ensure(self.max_rounds >= 1, "max_rounds must be at least 1")?;
		ensure(self.learning_rate > 0.0, "learning_rate must be greater than 0")?;
		ensure(self.max_depth >= 1, "max_depth must be at least 1")?;
		ensure(self.min_examples_per_leaf >= 1, "min_examples_per_leaf must be at least 1")?;
		ensure(self.l2_regularization >= 0.0, "l2_regularization must be at least 0")?;
		ensure(self.min_gain_to_split >= 0.0, "min_gain_to_split must be at least 0")
	}
}

macro_rules! newtype_validate {
	($ty:ty) => {
		impl Validate for $ty {
			fn validate(&self) -> Result<(), String> {
				self.0.validate()
			}
		}
		impl<'de> Deserialize<'de> for $ty {
			fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
				LinearOptions::deserialize(deserializer).map(Self)
			}
		}
	};
}

newtype_validate!(LinearRegressionOptions);
newtype_validate!(LogisticRegressionOptions);

fn log_progress(algorithm: Algorithm, unit: &str, progress: Option<ProgressCounter>) {
	if let Some(progress) = progress {
		log::info!(
			"{} trained {} of at most {} {}",
			algorithm,
			progress.get(),
			progress.total(),
			unit
		);
	}
}

fn linear_features(data: &TrainingData) -> Result<(Vec<FeatureGroup>, Array2<f32>)> {
	let feature_groups = compute_linear_feature_groups(&data.dataframe, &data.feature_names)?;
	let columns = data.feature_columns()?;
	let features = compute_features_array(&feature_groups, &columns, data.n_rows());
	Ok((feature_groups, features))
}

impl Trainable for LinearRegressionOptions {
	fn algorithm(&self) -> Algorithm {
		Algorithm::LinearRegression
	}

	fn check_task(&self, response: &str, task: &Task) -> Result<()> {
		match task {
			Task::Regression => Ok(()),
			Task::Classification { .. } => Err(data_err!(
				"{} requires a number response, but column {:?} is an enum column",
				self.algorithm(),
				response
			)),
		}
	}

	fn train(&self, data: &TrainingData) -> Result<(Vec<FeatureGroup>, Learned)> {
		let labels = match &data.labels {
			Labels::Number(labels) => labels,
			Labels::Enum { .. } => {
				return Err(data_err!("{} requires number labels", self.algorithm()))
			}
		};
		let (feature_groups, features) = linear_features(data)?;
		let train_options = scorecard_linear::TrainOptions::from(&self.0);
		let mut progress = None;
		let model = scorecard_linear::Regressor::train(
			features.view(),
			ArrayView1::from(labels.as_slice()),
			&train_options,
			&mut |update| progress = Some(update.0),
		);
		log_progress(self.algorithm(), "epochs", progress);
		Ok((feature_groups, Learned::LinearRegression(model)))
	}
}

impl Trainable for LogisticRegressionOptions {
	fn algorithm(&self) -> Algorithm {
		Algorithm::LogisticRegression
	}

	fn check_task(&self, response: &str, task: &Task) -> Result<()> {
		match task {
			Task::Classification { classes } if classes.len() == 2 => Ok(()),
			Task::Classification { classes } => Err(data_err!(
				"{} requires a response with exactly two classes, but column {:?} has {}",
				self.algorithm(),
				response,
				classes.len()
			)),
			Task::Regression => Err(data_err!(
				"{} requires an enum response, but column {:?} is a number column",
				self.algorithm(),
				response
			)),
		}
	}

	fn train(&self, data: &TrainingData) -> Result<(Vec<FeatureGroup>, Learned)> {
		let labels = match &data.labels {
			Labels::Enum { n_classes: 2, data } => data,
			_ => return Err(data_err!("{} requires two class labels", self.algorithm())),
		};
		let (feature_groups, features) = linear_features(data)?;
		let train_options = scorecard_linear::TrainOptions::from(&self.0);
		let mut progress = None;
		let model = scorecard_linear::BinaryClassifier::train(
			features.view(),
			ArrayView1::from(labels.as_slice()),
			&train_options,
			&mut |update| progress = Some(update.0),
		);
		log_progress(self.algorithm(), "epochs", progress);
		Ok((feature_groups, Learned::LogisticRegression(model)))
	}
}

impl Trainable for DecisionTreeOptions {
	fn algorithm(&self) -> Algorithm {
		Algorithm::DecisionTree
	}

	fn check_task(&self, _response: &str, _task: &Task) -> Result<()> {
		Ok(())
	}

	fn train(&self, data: &TrainingData) -> Result<(Vec<FeatureGroup>, Learned)> {
		let columns = data.feature_columns()?;
		let views: Vec<_> = columns.iter().map(|column| column.view()).collect();
		let options = scorecard_tree::DecisionTreeTrainOptions {
			max_depth: self.max_depth,
			min_examples_per_leaf: self.min_examples_per_leaf,
			min_gain_to_split: self.min_gain_to_split,
		};
		let model = scorecard_tree::DecisionTree::train(&views, data.labels_view(), &options);
		log::info!("{} trained a tree with {} nodes", self.algorithm(), model.tree.nodes.len());
		Ok((
			compute_tree_feature_groups(&data.feature_names),
			Learned::DecisionTree(model),
		))
	}
}

impl Trainable for RandomForestOptions {
	fn algorithm(&self) -> Algorithm {
		Algorithm::RandomForest
	}

	fn check_task(&self, _response: &str, _task: &Task) -> Result<()> {
		Ok(())
	}

	fn train(&self, data: &TrainingData) -> Result<(Vec<FeatureGroup>, Learned)> {
		let columns = data.feature_columns()?;
		let views: Vec<_> = columns.iter().map(|column| column.view()).collect();
		let options = scorecard_tree::RandomForestTrainOptions {
			n_trees: self.n_trees,
			max_depth: self.max_depth,
			min_examples_per_leaf: self.min_examples_per_leaf,
			max_features: self.max_features,
			sample_fraction: self.sample_fraction,
			seed: self.seed,
		};
		let mut progress = None;
		let model = scorecard_tree::RandomForest::train(
			&views,
			data.labels_view(),
			&options,
			&mut |update| progress = Some(update.0),
		);
		log_progress(self.algorithm(), "trees", progress);
		Ok((
			compute_tree_feature_groups(&data.feature_names),
			Learned::RandomForest(model),
		))
	}
}

impl Trainable for GradientBoostedTreesOptions {
	fn algorithm(&self) -> Algorithm {
		Algorithm::GradientBoostedTrees
	}

	fn check_task(&self, _response: &str, _task: &Task) -> Result<()> {
		Ok(())
	}

	fn train(&self, data: &TrainingData) -> Result<(Vec<FeatureGroup>, Learned)> {
		let columns = data.feature_columns()?;
		let views: Vec<_> = columns.iter().map(|column| column.view()).collect();
		let options = scorecard_tree::GradientBoostedTreesTrainOptions {
			max_rounds: self.max_rounds,
			learning_rate: self.learning_rate,
			max_depth: self.max_depth,
			min_examples_per_leaf: self.min_examples_per_leaf,
			l2_regularization: self.l2_regularization,
			min_gain_to_split: self.min_gain_to_split,
		};
		let mut progress = None;
		let model = scorecard_tree::GradientBoostedTrees::train(
			&views,
			data.labels_view(),
			&options,
			&mut |update| progress = Some(update.0),
		);
		log_progress(self.algorithm(), "rounds", progress);
		Ok((
			compute_tree_feature_groups(&data.feature_names),
			Learned::GradientBoostedTrees(model),
		))
	}
}

/**
Fit a model predicting `formula.response` from `formula.features` on every row of `dataset` whose response is valid.

The options are parsed first, so an unknown or ill-typed option is a configuration error, as is a formula that uses its response as a feature or repeats a feature. A missing column, a feature or response column of a type the algorithm cannot use, or a dataset with no valid responses is a data error. The dataset is read but never modified.
*/
pub fn train(
	formula: &Formula,
	dataset: &Dataset,
	algorithm: Algorithm,
	options: &TrainOptions,
) -> Result<Model> {
	let trainable = algorithm.trainable(options)?;
	let schema = dataset.schema();
	formula.validate(schema)?;
	let response_type = schema
		.get(&formula.response)
		.map(|column| &column.column_type)
		.ok_or_else(|| data_err!("column {:?} is not in the dataset", formula.response))?;
	let task = Task::from_column_type(&formula.response, response_type)?;
	trainable.check_task(&formula.response, &task)?;
	for feature in formula.features.iter() {
		if let Some(column) = schema.get(feature) {
			if !matches!(column.column_type, ColumnType::Number | ColumnType::Enum { .. }) {
				return Err(data_err!(
					"column {:?} is {}, which cannot be used as a feature",
					feature,
					describe(&column.column_type)
				));
			}
		}
	}

	log::info!("training {} model {}", algorithm, formula);
	let dataframe = dataset.read_all()?;
	let n_rows = dataframe.nrows();
	let response = dataframe
		.column(&formula.response)
		.ok_or_else(|| data_err!("column {:?} is not in the dataset", formula.response))?;
	let (keep, labels) = match response {
		Column::Number(column) => {
			let keep: Vec<usize> = (0..n_rows)
				.filter(|index| column.data[*index].is_finite())
				.collect();
			let labels = keep.iter().map(|index| column.data[*index]).collect();
			(keep, Labels::Number(labels))
		}
		Column::Enum(column) => {
			let keep: Vec<usize> = (0..n_rows)
				.filter(|index| column.data[*index].is_some())
				.collect();
			let labels = keep
				.iter()
				.filter_map(|index| column.data[*index].map(|value| value.get()))
				.collect();
			(
				keep,
				Labels::Enum {
					n_classes: column.options.len(),
					data: labels,
				},
			)
		}
		column => {
			return Err(data_err!(
				"response column {:?} is {}, which cannot be predicted",
				formula.response,
				describe(&column.column_type())
			))
		}
	};
	if keep.is_empty() {
		return Err(data_err!(
			"no rows of the dataset have a valid value for the response column {:?}",
			formula.response
		));
	}
	let n_dropped = n_rows - keep.len();
	let dataframe = if n_dropped > 0 {
		log::warn!(
			"dropped {} rows with an invalid value for the response column {:?}",
			n_dropped,
			formula.response
		);
		dataframe.take_rows(&keep)
	} else {
		dataframe
	};

	let data = TrainingData {
		dataframe,
		feature_names: formula.features.clone(),
		labels,
	};
	let n_training_rows = data.n_rows();
	let (feature_groups, learned) = trainable.train(&data)?;
	Ok(Model {
		id: Id::new(),
		algorithm,
		formula: formula.clone(),
		schema: schema.clone(),
		task,
		feature_groups,
		learned,
		options: options.clone(),
		n_training_rows: n_training_rows as u64,
	})
}

#[test]
fn test_algorithm_tags() {
	for algorithm in Algorithm::ALL.iter() {
		assert_eq!(algorithm.to_string().parse::<Algorithm>().unwrap(), *algorithm);
	}
	assert_eq!(
		serde_json::to_string(&Algorithm::GradientBoostedTrees).unwrap(),
		"\"gradient-boosted-trees\""
	);
	let error = "svm".parse::<Algorithm>().unwrap_err();
	assert!(error.is_configuration());
}

#[test]
fn test_parse_options() {
	let options: TrainOptions = vec![("n_trees".to_owned(), serde_json::json!(7))]
		.into_iter()
		.collect();
	let parsed: RandomForestOptions = parse_options(Algorithm::RandomForest, &options).unwrap();
	assert_eq!(parsed.n_trees, 7);
	assert_eq!(parsed.max_depth, 10);
	assert_eq!(parsed.seed, 42);
	// An option another algorithm understands is still unknown to this one.
	assert!(Algorithm::DecisionTree
		.trainable(&options)
		.err()
		.unwrap()
		.is_configuration());
	let ill_typed: TrainOptions = vec![("max_depth".to_owned(), serde_json::json!("deep"))]
		.into_iter()
		.collect();
	assert!(Algorithm::DecisionTree
		.trainable(&ill_typed)
		.err()
		.unwrap()
		.is_configuration());
	let out_of_range: TrainOptions = vec![("learning_rate".to_owned(), serde_json::json!(0.0))]
		.into_iter()
		.collect();
	assert!(Algorithm::LogisticRegression
		.trainable(&out_of_range)
		.err()
		.unwrap()
		.is_configuration());
	let linear: LinearRegressionOptions =
		parse_options(Algorithm::LinearRegression, &TrainOptions::new()).unwrap();
	assert_eq!(linear.0, LinearOptions::default());
}

#[test]
fn test_check_task() {
	let binary = Task::Classification {
		classes: vec!["0".to_owned(), "1".to_owned()],
	};
	let multiclass = Task::Classification {
		classes: vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
	};
	let linear = Algorithm::LinearRegression.trainable(&TrainOptions::new()).unwrap();
	assert!(linear.check_task("y", &Task::Regression).is_ok());
	assert!(linear.check_task("y", &binary).unwrap_err().is_data());
	let logistic = Algorithm::LogisticRegression.trainable(&TrainOptions::new()).unwrap();
	assert!(logistic.check_task("y", &binary).is_ok());
	assert!(logistic.check_task("y", &multiclass).unwrap_err().is_data());
	assert!(logistic.check_task("y", &Task::Regression).unwrap_err().is_data());
	let forest = Algorithm::RandomForest.trainable(&TrainOptions::new()).unwrap();
	assert!(forest.check_task("y", &multiclass).is_ok());
	assert!(Task::from_column_type("y", &ColumnType::Text).unwrap_err().is_data());
	assert!(Task::from_column_type(
		"y",
		&ColumnType::Enum {
			options: vec!["only".to_owned()]
		}
	)
	.unwrap_err()
	.is_data());
}
