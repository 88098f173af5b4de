/*!
This module implements the Scorer. [`score`](fn.score.html) applies a [`Model`](../model/struct.Model.html) to every row of a dataset and writes the predictions, optionally next to columns copied from the input, to a new dataset.
*/

use crate::{model::Model, train::Task};
use scorecard_dataframe::{
	Column, ColumnSchema, ColumnType, DataFrame, Dataset, DatasetWriter, Format, NumberColumn,
	Schema, DEFAULT_BLOCK_SIZE,
};
use scorecard_util::{config_err, data_err, Result};
use std::{collections::BTreeSet, path::Path};

#[derive(Clone, Debug)]
pub struct ScoreOptions {
	/// Copy every input column to the output.
	pub write_input_columns: bool,
	/// Copy these input columns to the output, such as the actual value of the response for evaluation.
	pub extra_columns_to_copy: Vec<String>,
	/// The names of the prediction columns. If this is `None`, the model's default names are used.
	pub prediction_column_names: Option<Vec<String>>,
	/// The output format. If this is `None`, it is chosen from the output's extension.
	pub format: Option<Format>,
	pub block_size: usize,
}

impl Default for ScoreOptions {
	fn default() -> Self {
		Self {
			write_input_columns: false,
			extra_columns_to_copy: Vec::new(),
			prediction_column_names: None,
			format: None,
			block_size: DEFAULT_BLOCK_SIZE,
		}
	}
}

/// A prediction column to write: its name and the index of the model output it holds.
#[derive(Clone, Debug, PartialEq)]
struct PredictionColumn {
	name: String,
	output_index: usize,
}

/**
Match the requested prediction column names to the model's outputs. There must be one name per output, except that a binary classifier accepts a single name, which receives the probability of the positive class, its second class.
*/
fn resolve_prediction_columns(
	task: &Task,
	default_names: Vec<String>,
	names: Option<&[String]>,
) -> Result<Vec<PredictionColumn>> {
	let n_outputs = task.n_outputs();
	let names = match names {
		None => default_names,
		Some(names) => names.to_vec(),
	};
	for (index, name) in names.iter().enumerate() {
		if name.is_empty() {
			return Err(config_err!("prediction column names must not be empty"));
		}
		if names[..index].contains(name) {
			return Err(config_err!("the prediction column name {:?} is repeated", name));
		}
	}
	match task {
		Task::Classification { .. } if n_outputs == 2 && names.len() == 1 => {
			Ok(vec![PredictionColumn {
				name: names[0].clone(),
				output_index: 1,
			}])
		}
		_ if names.len() == n_outputs => Ok(names
			.into_iter()
			.enumerate()
			.map(|(output_index, name)| PredictionColumn { name, output_index })
			.collect()),
		Task::Regression => Err(config_err!(
			"a regression model writes 1 prediction column, but {} names were given",
			names.len()
		)),
		Task::Classification { classes } => Err(config_err!(
			"a classification model with {} classes writes {} prediction columns, but {} names were given",
			classes.len(),
			n_outputs,
			names.len()
		)),
	}
}

/// Choose the input columns to copy, in the input's column order.
fn columns_to_copy(
	schema: &Schema,
	options: &ScoreOptions,
	prediction_columns: &[PredictionColumn],
) -> Result<Vec<ColumnSchema>> {
	for name in options.extra_columns_to_copy.iter() {
		if !schema.contains(name) {
			return Err(data_err!("column {:?} to copy is not in the dataset", name));
		}
	}
	let extra: BTreeSet<&str> = options
		.extra_columns_to_copy
		.iter()
		.map(|name| name.as_str())
		.collect();
	let mut columns = Vec::new();
	for column in schema.columns.iter() {
		if !options.write_input_columns && !extra.contains(column.name.as_str()) {
			continue;
		}
		if prediction_columns.iter().any(|prediction| prediction.name == column.name) {
			log::warn!(
				"input column {:?} is not copied because a prediction column has the same name",
				column.name
			);
			continue;
		}
		columns.push(column.clone());
	}
	Ok(columns)
}

/**
Score every row of `dataset` with `model` and write the result to `output`.

Every problem that can be found from the schemas is reported before any row is scored: prediction column names that do not fit the model are a configuration error, and a feature column that is missing or incompatible with the column the model was trained on is a data error. The output replaces `output` only once every block has been written, so `output` may be the dataset being scored.
*/
pub fn score(
	model: &Model,
	dataset: &Dataset,
	output: &Path,
	options: &ScoreOptions,
) -> Result<Dataset> {
	let prediction_columns = resolve_prediction_columns(
		&model.task,
		model.default_prediction_names(),
		options.prediction_column_names.as_deref(),
	)?;
	let mappings = model.column_mappings(dataset.schema())?;
	let copied_columns = columns_to_copy(dataset.schema(), options, &prediction_columns)?;
	let format = match options.format {
		Some(format) => format,
		None => Format::from_path(output)?,
	};
	let mut output_columns = copied_columns.clone();
	output_columns.extend(prediction_columns.iter().map(|prediction| ColumnSchema {
		name: prediction.name.clone(),
		column_type: ColumnType::Number,
	}));
	let schema = Schema::new(output_columns)?;

	log::info!(
		"scoring {} with {} model {}",
		dataset.path().display(),
		model.algorithm,
		model.id
	);
	let mut writer = DatasetWriter::create(output, format, schema)?;
	for block in dataset.blocks(options.block_size)? {
		let block = block?;
		let predictions = model.predict(&block, &mappings)?;
		let mut columns = Vec::with_capacity(copied_columns.len() + prediction_columns.len());
		for column in copied_columns.iter() {
			let column = block
				.column(&column.name)
				.ok_or_else(|| data_err!("column {:?} is not in the dataset", column.name))?;
			columns.push(column.clone());
		}
		for prediction in prediction_columns.iter() {
			columns.push(Column::Number(NumberColumn {
				name: prediction.name.clone(),
				data: predictions.column(prediction.output_index).to_vec(),
			}));
		}
		writer.write(&DataFrame { columns })?;
	}
	let scored = writer.finish()?;
	log::info!("wrote predictions to {}", scored.path().display());
	Ok(scored)
}

#[test]
fn test_resolve_prediction_columns() {
	let binary = Task::Classification {
		classes: vec!["current".to_owned(), "default".to_owned()],
	};
	let defaults = vec!["current_prob".to_owned(), "default_prob".to_owned()];
	let columns = resolve_prediction_columns(&binary, defaults.clone(), None).unwrap();
	assert_eq!(columns.len(), 2);
	assert_eq!(columns[1].name, "default_prob");
	assert_eq!(columns[1].output_index, 1);
	let single = vec!["pred_default".to_owned()];
	let columns = resolve_prediction_columns(&binary, defaults.clone(), Some(&single)).unwrap();
	assert_eq!(
		columns,
		vec![PredictionColumn {
			name: "pred_default".to_owned(),
			output_index: 1,
		}]
	);
	let three = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
	assert!(resolve_prediction_columns(&binary, defaults.clone(), Some(&three))
		.unwrap_err()
		.is_configuration());
	let repeated = vec!["a".to_owned(), "a".to_owned()];
	assert!(resolve_prediction_columns(&binary, defaults, Some(&repeated))
		.unwrap_err()
		.is_configuration());
	let two = vec!["a".to_owned(), "b".to_owned()];
	assert!(
		resolve_prediction_columns(&Task::Regression, vec!["y_pred".to_owned()], Some(&two))
			.unwrap_err()
			.is_configuration()
	);
	let multiclass = Task::Classification {
		classes: vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
	};
	assert!(resolve_prediction_columns(&multiclass, three.clone(), Some(&single))
		.unwrap_err()
		.is_configuration());
}

#[test]
fn test_columns_to_copy() {
	let schema = Schema::new(
		["id", "balance", "default"]
			.iter()
			.map(|name| ColumnSchema {
				name: (*name).to_owned(),
				column_type: ColumnType::Number,
			})
			.collect(),
	)
	.unwrap();
	let predictions = vec![PredictionColumn {
		name: "balance".to_owned(),
		output_index: 0,
	}];
	let options = ScoreOptions {
		write_input_columns: true,
		..Default::default()
	};
	let names: Vec<String> = columns_to_copy(&schema, &options, &predictions)
		.unwrap()
		.into_iter()
		.map(|column| column.name)
		.collect();
	assert_eq!(names, vec!["id", "default"]);
	let options = ScoreOptions {
		extra_columns_to_copy: vec!["default".to_owned()],
		..Default::default()
	};
	let names: Vec<String> = columns_to_copy(&schema, &options, &predictions)
		.unwrap()
		.into_iter()
		.map(|column| column.name)
		.collect();
	assert_eq!(names, vec!["default"]);
	let options = ScoreOptions {
		extra_columns_to_copy: vec!["missing".to_owned()],
		..Default::default()
	};
	assert!(columns_to_copy(&schema, &options, &predictions)
		.unwrap_err()
		.is_data());
}
