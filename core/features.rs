/*!
This module implements the feature engineering that prepares a block of rows for a model.

Before features are computed, each feature column of a block is converted to the type the column had in the training data, producing a [`FeatureColumn`](enum.FeatureColumn.html). This is what lets a model trained on one file score another whose columns were typed differently, as long as the values are compatible. Then each [`FeatureGroup`](enum.FeatureGroup.html) turns one feature column into one or more number features for linear models, or passes it through untouched for tree models.
*/

use fnv::FnvHashMap;
use ndarray::prelude::*;
use scorecard_dataframe::{Column, ColumnType, DataFrame};
use scorecard_metrics::{MeanVariance, Metric};
use scorecard_tree::FeatureColumnView;
use scorecard_util::{data_err, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// This enum describes how to transform one column from the input dataframe to one or more columns in the output features.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FeatureGroup {
	Identity(IdentityFeatureGroup),
	Normalized(NormalizedFeatureGroup),
	OneHotEncoded(OneHotEncodedFeatureGroup),
}

/**
An `IdentityFeatureGroup` passes a single column from the input dataframe to the output features untouched. Tree models use it for both number and enum columns.

| dataframe value | feature value |
|-----------------|---------------|
| 0.2             | 0.2           |
| "red"           | Some(1)       |
| "INVALID!"      | None          |
*/
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentityFeatureGroup {
	pub source_column_name: String,
}

/**
A `NormalizedFeatureGroup` transforms a number column to zero mean and unit variance. [Learn more](https://en.wikipedia.org/wiki/Feature_scaling#Standardization_(Z-score_Normalization)). Invalid values become 0, the normalized mean.

| dataframe value | feature value                         |
|-----------------|---------------------------------------|
| 0.0             | (0.0 - 2.16667) / 2.70617  = -0.80064 |
| 5.2             | (5.2 - 2.16667) / 2.70617  = 1.12089  |
| NaN             | 0.0                                   |
*/
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFeatureGroup {
	pub source_column_name: String,
	pub mean: f32,
	pub variance: f32,
}

/**
A `OneHotEncodedFeatureGroup` creates one number feature for invalid values plus one for each option in an enum column. For each example, all of the features will have the value 0.0, except the feature corresponding to the column's value, which will have the value 1.0.

| dataframe value | feature values |
|-----------------|----------------|
| "INVALID!"      | [1, 0, 0, 0]   |
| "red"           | [0, 1, 0, 0]   |
| "green"         | [0, 0, 1, 0]   |
| "blue"          | [0, 0, 0, 1]   |
*/
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncodedFeatureGroup {
	pub source_column_name: String,
	pub options: Vec<String>,
}

impl FeatureGroup {
	pub fn source_column_name(&self) -> &str {
		match self {
			FeatureGroup::Identity(f) => &f.source_column_name,
			FeatureGroup::Normalized(f) => &f.source_column_name,
			FeatureGroup::OneHotEncoded(f) => &f.source_column_name,
		}
	}

	/// The number of number features this group produces for a linear model.
	pub fn n_features(&self) -> usize {
		match self {
			FeatureGroup::Identity(_) => 1,
			FeatureGroup::Normalized(_) => 1,
			FeatureGroup::OneHotEncoded(f) => f.options.len() + 1,
		}
	}
}

/// A feature column converted to the type its column had in the training data.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureColumn {
	Number(Vec<f32>),
	Enum {
		n_options: usize,
		data: Vec<Option<NonZeroUsize>>,
	},
}

impl FeatureColumn {
	pub fn len(&self) -> usize {
		match self {
			FeatureColumn::Number(data) => data.len(),
			FeatureColumn::Enum { data, .. } => data.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn view(&self) -> FeatureColumnView {
		match self {
			FeatureColumn::Number(data) => FeatureColumnView::Number(data),
			FeatureColumn::Enum { n_options, data } => FeatureColumnView::Enum {
				n_options: *n_options,
				data,
			},
		}
	}

	pub fn take_rows(&self, indexes: &[usize]) -> FeatureColumn {
		match self {
			FeatureColumn::Number(data) => {
				FeatureColumn::Number(indexes.iter().map(|index| data[*index]).collect())
			}
			FeatureColumn::Enum { n_options, data } => FeatureColumn::Enum {
				n_options: *n_options,
				data: indexes.iter().map(|index| data[*index]).collect(),
			},
		}
	}
}

/**
A `ColumnMapping` converts a column of a dataset being scored to the type the column had in the training data.

* A number feature accepts a number column, or an enum column whose options all parse as numbers.
* An enum feature accepts an enum column, whose options are matched to the training options by name, or a text column. Values that were not options in the training data become invalid.
* An enum feature whose options include numbers also accepts a number column. This happens when a `0`/`1` flag is inferred as an enum in training but a dataset being scored has only one of the values, or a value that was never seen.
*/
#[derive(Clone, Debug)]
pub enum ColumnMapping {
	Number,
	NumberFromEnum {
		values: Vec<f32>,
	},
	Enum {
		n_options: usize,
	},
	EnumFromEnum {
		n_options: usize,
		remap: Vec<Option<NonZeroUsize>>,
	},
	EnumFromText {
		n_options: usize,
		lookup: FnvHashMap<String, NonZeroUsize>,
	},
	EnumFromNumber {
		n_options: usize,
		values: Vec<(f32, NonZeroUsize)>,
	},
}

impl ColumnMapping {
	/// Determine how to convert a column of type `column_type` to `training_column_type`. Returns a data error naming the column if they are incompatible.
	pub fn new(
		column_name: &str,
		training_column_type: &ColumnType,
		column_type: &ColumnType,
	) -> Result<ColumnMapping> {
		match (training_column_type, column_type) {
			(ColumnType::Number, ColumnType::Number) => Ok(ColumnMapping::Number),
			(ColumnType::Number, ColumnType::Enum { options }) => {
				let values = options
					.iter()
					.map(|option| {
						option
							.trim()
							.parse::<f32>()
							.ok()
							.filter(|value| value.is_finite())
					})
					.collect::<Option<Vec<f32>>>()
					.ok_or_else(|| {
						data_err!(
							"column {:?} was a number column in training, but it is an enum column whose options are not all numbers",
							column_name
						)
					})?;
				Ok(ColumnMapping::NumberFromEnum { values })
			}
			(
				ColumnType::Enum {
					options: training_options,
				},
				ColumnType::Enum { options },
			) => {
				if options == training_options {
					Ok(ColumnMapping::Enum {
						n_options: training_options.len(),
					})
				} else {
					let remap = options
						.iter()
						.map(|option| {
							training_options
								.iter()
								.position(|training_option| training_option == option)
								.and_then(|position| NonZeroUsize::new(position + 1))
						})
						.collect();
					Ok(ColumnMapping::EnumFromEnum {
						n_options: training_options.len(),
						remap,
					})
				}
			}
			(
				ColumnType::Enum {
					options: training_options,
				},
				ColumnType::Text,
			) => {
				let lookup = training_options
					.iter()
					.enumerate()
					.filter_map(|(position, option)| {
						NonZeroUsize::new(position + 1).map(|value| (option.clone(), value))
					})
					.collect();
				Ok(ColumnMapping::EnumFromText {
					n_options: training_options.len(),
					lookup,
				})
			}
			(
				ColumnType::Enum {
					options: training_options,
				},
				ColumnType::Number,
			) => {
				let values: Vec<(f32, NonZeroUsize)> = training_options
					.iter()
					.enumerate()
					.filter_map(|(position, option)| {
						let value = option
							.trim()
							.parse::<f32>()
							.ok()
							.filter(|value| value.is_finite())?;
						Some((value, NonZeroUsize::new(position + 1)?))
					})
					.collect();
				if values.is_empty() {
					return Err(data_err!(
						"column {:?} was an enum column in training whose options are not numbers, but it is a number column",
						column_name
					));
				}
				Ok(ColumnMapping::EnumFromNumber {
					n_options: training_options.len(),
					values,
				})
			}
			(training_column_type, column_type) => Err(data_err!(
				"column {:?} was {} in training, but it is {}",
				column_name,
				describe(training_column_type),
				describe(column_type)
			)),
		}
	}

	/// Convert `column`, which must have the type this mapping was created for.
	pub fn apply(&self, column: &Column) -> Result<FeatureColumn> {
		let mismatch = || data_err!("column {:?} changed type between blocks", column.name());
		match self {
			ColumnMapping::Number => {
				let column = column.as_number().ok_or_else(mismatch)?;
				Ok(FeatureColumn::Number(column.data.clone()))
			}
			ColumnMapping::NumberFromEnum { values } => {
				let column = column.as_enum().ok_or_else(mismatch)?;
				Ok(FeatureColumn::Number(
					column
						.data
						.iter()
						.map(|value| {
							value
								.and_then(|value| values.get(value.get() - 1).copied())
								.unwrap_or(f32::NAN)
						})
						.collect(),
				))
			}
			ColumnMapping::Enum { n_options } => {
				let column = column.as_enum().ok_or_else(mismatch)?;
				Ok(FeatureColumn::Enum {
					n_options: *n_options,
					data: column.data.clone(),
				})
			}
			ColumnMapping::EnumFromEnum { n_options, remap } => {
				let column = column.as_enum().ok_or_else(mismatch)?;
				Ok(FeatureColumn::Enum {
					n_options: *n_options,
					data: column
						.data
						.iter()
						.map(|value| {
							value.and_then(|value| remap.get(value.get() - 1).copied().flatten())
						})
						.collect(),
				})
			}
			ColumnMapping::EnumFromText { n_options, lookup } => {
				let column = column.as_text().ok_or_else(mismatch)?;
				Ok(FeatureColumn::Enum {
					n_options: *n_options,
					data: column
						.data
						.iter()
						.map(|value| lookup.get(value.as_str()).copied())
						.collect(),
				})
			}
			ColumnMapping::EnumFromNumber { n_options, values } => {
				let column = column.as_number().ok_or_else(mismatch)?;
				Ok(FeatureColumn::Enum {
					n_options: *n_options,
					data: column
						.data
						.iter()
						.map(|value| {
							values
								.iter()
								.find(|(option_value, _)| option_value == value)
								.map(|(_, option)| *option)
						})
						.collect(),
				})
			}
		}
	}
}

pub(crate) fn describe(column_type: &ColumnType) -> &'static str {
	match column_type {
		ColumnType::Unknown => "an unknown column",
		ColumnType::Number => "a number column",
		ColumnType::Enum { .. } => "an enum column",
		ColumnType::Text => "a text column",
	}
}

/// Convert the feature columns of a training dataframe, which already have the training types.
pub fn training_feature_columns(
	dataframe: &DataFrame,
	feature_names: &[String],
) -> Result<Vec<FeatureColumn>> {
	feature_names
		.iter()
		.map(|name| {
			let column = dataframe
				.column(name)
				.ok_or_else(|| data_err!("column {:?} is not in the dataset", name))?;
			match column {
				Column::Number(column) => Ok(FeatureColumn::Number(column.data.clone())),
				Column::Enum(column) => Ok(FeatureColumn::Enum {
					n_options: column.options.len(),
					data: column.data.clone(),
				}),
				column => Err(data_err!(
					"column {:?} is {}, which cannot be used as a feature",
					name,
					describe(&column.column_type())
				)),
			}
		})
		.collect()
}

/// Compute the feature groups for a linear model: number columns are normalized and enum columns are one hot encoded.
pub fn compute_linear_feature_groups(
	dataframe: &DataFrame,
	feature_names: &[String],
) -> Result<Vec<FeatureGroup>> {
	feature_names
		.iter()
		.map(|name| match dataframe.column(name) {
			Some(Column::Number(column)) => {
				let (mean, variance) = MeanVariance::compute(&column.data)
					.map(|output| (output.mean, output.variance))
					.unwrap_or((0.0, 0.0));
				Ok(FeatureGroup::Normalized(NormalizedFeatureGroup {
					source_column_name: name.clone(),
					mean,
					variance,
				}))
			}
			Some(Column::Enum(column)) => Ok(FeatureGroup::OneHotEncoded(OneHotEncodedFeatureGroup {
				source_column_name: name.clone(),
				options: column.options.clone(),
			})),
			Some(column) => Err(data_err!(
				"column {:?} is {}, which cannot be used as a feature",
				name,
				describe(&column.column_type())
			)),
			None => Err(data_err!("column {:?} is not in the dataset", name)),
		})
		.collect()
}

/// Compute the feature groups for a tree model, which use every column as is.
pub fn compute_tree_feature_groups(feature_names: &[String]) -> Vec<FeatureGroup> {
	feature_names
		.iter()
		.map(|name| {
			FeatureGroup::Identity(IdentityFeatureGroup {
				source_column_name: name.clone(),
			})
		})
		.collect()
}

/// Compute the number features for a linear model. `columns` holds one feature column of `n_rows` values per feature group, in the same order.
pub fn compute_features_array(
	feature_groups: &[FeatureGroup],
	columns: &[FeatureColumn],
	n_rows: usize,
) -> Array2<f32> {
	let n_features = feature_groups.iter().map(|group| group.n_features()).sum();
	let mut features = Array2::zeros((n_rows, n_features));
	let mut feature_index = 0;
	for (feature_group, column) in feature_groups.iter().zip(columns.iter()) {
		let n_features = feature_group.n_features();
		let mut features = features.slice_mut(s![.., feature_index..feature_index + n_features]);
		match (feature_group, column) {
			(FeatureGroup::Normalized(group), FeatureColumn::Number(data)) => {
				let std = group.variance.sqrt();
				for (feature, value) in features.column_mut(0).iter_mut().zip(data.iter()) {
					*feature = if value.is_nan() || std == 0.0 || !std.is_finite() {
						0.0
					} else {
						(*value - group.mean) / std
					};
				}
			}
			(FeatureGroup::Identity(_), FeatureColumn::Number(data)) => {
				for (feature, value) in features.column_mut(0).iter_mut().zip(data.iter()) {
					*feature = if value.is_nan() { 0.0 } else { *value };
				}
			}
			(FeatureGroup::OneHotEncoded(_), FeatureColumn::Enum { data, .. }) => {
				for (mut row, value) in features.axis_iter_mut(Axis(0)).zip(data.iter()) {
					let index = value.map(|value| value.get()).unwrap_or(0);
					if let Some(feature) = row.get_mut(index) {
						*feature = 1.0;
					} else {
						row[0] = 1.0;
					}
				}
			}
			(FeatureGroup::Identity(_), FeatureColumn::Enum { data, .. }) => {
				for (feature, value) in features.column_mut(0).iter_mut().zip(data.iter()) {
					*feature = value.map(|value| value.get() as f32).unwrap_or(0.0);
				}
			}
			// Mismatched pairs cannot be produced by the column mappings, so their features stay zero.
			_ => {}
		}
		feature_index += n_features;
	}
	features
}

#[test]
fn test_compute_features_array() {
	let feature_groups = vec![
		FeatureGroup::Normalized(NormalizedFeatureGroup {
			source_column_name: "balance".to_owned(),
			mean: 2.0,
			variance: 4.0,
		}),
		FeatureGroup::OneHotEncoded(OneHotEncodedFeatureGroup {
			source_column_name: "state".to_owned(),
			options: vec!["CA".to_owned(), "NY".to_owned()],
		}),
	];
	let columns = vec![
		FeatureColumn::Number(vec![4.0, f32::NAN, 0.0]),
		FeatureColumn::Enum {
			n_options: 2,
			data: vec![NonZeroUsize::new(2), None, NonZeroUsize::new(1)],
		},
	];
	let features = compute_features_array(&feature_groups, &columns, 3);
	assert_eq!(
		features,
		arr2(&[
			[1.0, 0.0, 0.0, 1.0],
			[0.0, 1.0, 0.0, 0.0],
			[-1.0, 0.0, 1.0, 0.0]
		])
	);
}

#[test]
fn test_column_mapping_compatibility() {
	use scorecard_dataframe::{EnumColumn, TextColumn};
	let enum_type = |options: &[&str]| ColumnType::Enum {
		options: options.iter().map(|option| (*option).to_owned()).collect(),
	};
	// Enum options are matched by name, and unseen options become invalid.
	let mapping =
		ColumnMapping::new(
			"state",
			&enum_type(&["CA", "NY"]),
			&enum_type(&["NY", "TX", "CA"]),
		)
		.unwrap();
	let column = Column::Enum(EnumColumn {
		name: "state".to_owned(),
		options: vec!["NY".to_owned(), "TX".to_owned(), "CA".to_owned()],
		data: vec![NonZeroUsize::new(1), NonZeroUsize::new(2), NonZeroUsize::new(3), None],
	});
	assert_eq!(
		mapping.apply(&column).unwrap(),
		FeatureColumn::Enum {
			n_options: 2,
			data: vec![NonZeroUsize::new(2), None, NonZeroUsize::new(1), None],
		}
	);
	// Text columns are looked up by value.
	let mapping =
		ColumnMapping::new("state", &enum_type(&["CA", "NY"]), &ColumnType::Text).unwrap();
	let column = Column::Text(TextColumn {
		name: "state".to_owned(),
		data: vec!["CA".to_owned(), "WA".to_owned()],
	});
	assert_eq!(
		mapping.apply(&column).unwrap(),
		FeatureColumn::Enum {
			n_options: 2,
			data: vec![NonZeroUsize::new(1), None],
		}
	);
	// A number feature accepts an enum whose options are numbers.
	let mapping = ColumnMapping::new("flag", &ColumnType::Number, &enum_type(&["0", "1"])).unwrap();
	let column = Column::Enum(EnumColumn {
		name: "flag".to_owned(),
		options: vec!["0".to_owned(), "1".to_owned()],
		data: vec![NonZeroUsize::new(2), None],
	});
	match mapping.apply(&column).unwrap() {
		FeatureColumn::Number(data) => {
			assert_eq!(data[0], 1.0);
			assert!(data[1].is_nan());
		}
		column => panic!("expected a number column, got {:?}", column),
	}
	assert!(ColumnMapping::new("flag", &ColumnType::Number, &enum_type(&["yes", "no"]))
		.unwrap_err()
		.is_data());
	assert!(ColumnMapping::new("flag", &ColumnType::Number, &ColumnType::Text)
		.unwrap_err()
		.is_data());
	assert!(ColumnMapping::new("state", &enum_type(&["CA"]), &ColumnType::Number)
		.unwrap_err()
		.is_data());
}

#[test]
fn test_enum_feature_from_number_column() {
	use scorecard_dataframe::NumberColumn;
	let training_type = ColumnType::Enum {
		options: vec!["0".to_owned(), "1".to_owned()],
	};
	let mapping = ColumnMapping::new("flag", &training_type, &ColumnType::Number).unwrap();
	let column = Column::Number(NumberColumn {
		name: "flag".to_owned(),
		data: vec![0.0, 1.0, 2.0, f32::NAN, 1.0],
	});
	assert_eq!(
		mapping.apply(&column).unwrap(),
		FeatureColumn::Enum {
			n_options: 2,
			data: vec![
				NonZeroUsize::new(1),
				NonZeroUsize::new(2),
				None,
				None,
				NonZeroUsize::new(2)
			],
		}
	);
}
