/*!
This module computes receiver operating characteristic curves for scored datasets. [`compute_roc_curves`](fn.compute_roc_curves.html) compares several prediction columns against the same actual column in one pass, and its output serializes to JSON for plotting.
*/

use crate::features::{ColumnMapping, FeatureColumn};
use scorecard_dataframe::{Column, ColumnType, Dataset, Schema};
use scorecard_metrics::RocCurve;
use scorecard_util::{config_err, data_err, Result};
use serde::Serialize;
use std::num::NonZeroUsize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RocCurves {
	pub actual: String,
	/// The value of the actual column counted as positive.
	pub positive_class: String,
	pub curves: Vec<PredictedRocCurve>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictedRocCurve {
	pub predicted: String,
	/// The number of rows with a valid actual value and prediction.
	pub n_rows: usize,
	#[serde(flatten)]
	pub roc_curve: RocCurve,
}

/// How to tell whether a value of the actual column is positive.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Actual {
	Enum { positive: NonZeroUsize },
	Number,
}

fn resolve_actual(
	schema: &Schema,
	actual: &str,
	positive_class: Option<&str>,
) -> Result<(Actual, String)> {
	let column = schema
		.get(actual)
		.ok_or_else(|| data_err!("column {:?} is not in the dataset", actual))?;
	match (&column.column_type, positive_class) {
		(ColumnType::Enum { options }, Some(positive_class)) => {
			let position = options
				.iter()
				.position(|option| option == positive_class)
				.ok_or_else(|| {
					data_err!(
						"{:?} is not one of the values of column {:?}",
						positive_class,
						actual
					)
				})?;
			let positive = NonZeroUsize::new(position + 1)
				.ok_or_else(|| data_err!("invalid option index for {:?}", positive_class))?;
			Ok((Actual::Enum { positive }, positive_class.to_owned()))
		}
		(ColumnType::Enum { options }, None) if options.len() == 2 => {
			let positive = NonZeroUsize::new(2)
				.ok_or_else(|| data_err!("invalid option index for column {:?}", actual))?;
			Ok((Actual::Enum { positive }, options[1].clone()))
		}
		(ColumnType::Enum { options }, None) => Err(data_err!(
			"column {:?} has {} values, so the positive class must be given",
			actual,
			options.len()
		)),
		(ColumnType::Number, None) => Ok((Actual::Number, "nonzero".to_owned())),
		(ColumnType::Number, Some(_)) => Err(config_err!(
			"a positive class can only be given for an enum column, but {:?} is a number column",
			actual
		)),
		_ => Err(data_err!(
			"column {:?} must be a number or enum column to be used as the actual value",
			actual
		)),
	}
}

fn actual_labels(actual: Actual, column: &Column) -> Result<Vec<Option<bool>>> {
	match (actual, column) {
		(Actual::Enum { positive }, Column::Enum(column)) => Ok(column
			.data
			.iter()
			.map(|value| value.map(|value| value == positive))
			.collect()),
		(Actual::Number, Column::Number(column)) => Ok(column
			.data
			.iter()
			.map(|value| if value.is_nan() { None } else { Some(*value != 0.0) })
			.collect()),
		_ => Err(data_err!("column {:?} changed type between blocks", column.name())),
	}
}

/**
Compute the ROC curve of each column in `predicted` against the column `actual` in a single pass over `dataset`.

The actual column is either an enum column, whose positive class is `positive_class` or otherwise the second of exactly two options, or a number column, where any nonzero value is positive. Each predicted column is a number column or an enum column whose options are numbers. Rows with an invalid actual value or prediction are skipped for that curve. If a curve has no positive or no negative rows this fails with a data error.
*/
pub fn compute_roc_curves(
	dataset: &Dataset,
	actual: &str,
	predicted: &[String],
	positive_class: Option<&str>,
	block_size: usize,
) -> Result<RocCurves> {
	if predicted.is_empty() {
		return Err(config_err!("at least one predicted column is required"));
	}
	let schema = dataset.schema();
	let (actual_kind, positive_class) = resolve_actual(schema, actual, positive_class)?;
	let mappings = predicted
		.iter()
		.map(|name| {
			let column = schema
				.get(name)
				.ok_or_else(|| data_err!("column {:?} is not in the dataset", name))?;
			ColumnMapping::new(name, &ColumnType::Number, &column.column_type).map_err(|_| {
				data_err!(
					"predicted column {:?} must be a number column or an enum column whose values are numbers",
					name
				)
			})
		})
		.collect::<Result<Vec<_>>>()?;
	let mut scores: Vec<Vec<f32>> = vec![Vec::new(); predicted.len()];
	let mut labels: Vec<Vec<bool>> = vec![Vec::new(); predicted.len()];
	for block in dataset.blocks(block_size)? {
		let block = block?;
		let actual_column = block
			.column(actual)
			.ok_or_else(|| data_err!("column {:?} is not in the dataset", actual))?;
		let actual_labels = actual_labels(actual_kind, actual_column)?;
		for (((name, mapping), scores), labels) in predicted
			.iter()
			.zip(mappings.iter())
			.zip(scores.iter_mut())
			.zip(labels.iter_mut())
		{
			let column = block
				.column(name)
				.ok_or_else(|| data_err!("column {:?} is not in the dataset", name))?;
			let values = match mapping.apply(column)? {
				FeatureColumn::Number(values) => values,
				FeatureColumn::Enum { .. } => {
					return Err(data_err!("predicted column {:?} is not a number column", name))
				}
			};
			for (value, label) in values.iter().zip(actual_labels.iter()) {
				if let (false, Some(label)) = (value.is_nan(), label) {
					scores.push(*value);
					labels.push(*label);
				}
			}
		}
		log::debug!("evaluated a block of {} rows", block.nrows());
	}
	let curves = predicted
		.iter()
		.zip(scores.iter())
		.zip(labels.iter())
		.map(|((name, scores), labels)| {
			let roc_curve = RocCurve::compute(scores, labels).ok_or_else(|| {
				data_err!(
					"the ROC curve of {:?} is undefined because column {:?} has no positive or no negative rows",
					name,
					actual
				)
			})?;
			log::info!("{:?} has an AUC of {:.4} on {} rows", name, roc_curve.auc, scores.len());
			Ok(PredictedRocCurve {
				predicted: name.clone(),
				n_rows: scores.len(),
				roc_curve,
			})
		})
		.collect::<Result<Vec<_>>>()?;
	Ok(RocCurves {
		actual: actual.to_owned(),
		positive_class,
		curves,
	})
}

/// Compute the ROC curve of the single column `predicted` against `actual`. See [`compute_roc_curves`](fn.compute_roc_curves.html).
pub fn compute_roc(
	dataset: &Dataset,
	actual: &str,
	predicted: &str,
	positive_class: Option<&str>,
	block_size: usize,
) -> Result<RocCurve> {
	let mut curves = compute_roc_curves(
		dataset,
		actual,
		&[predicted.to_owned()],
		positive_class,
		block_size,
	)?;
	curves
		.curves
		.pop()
		.map(|curve| curve.roc_curve)
		.ok_or_else(|| data_err!("no ROC curve was computed for {:?}", predicted))
}

#[cfg(test)]
fn write_csv(dir: &std::path::Path, text: &str) -> Dataset {
	let path = dir.join("scored.csv");
	std::fs::write(&path, text).unwrap();
	Dataset::open(&path, &scorecard_dataframe::OpenOptions::default()).unwrap()
}

#[test]
fn test_compute_roc() {
	let dir = tempfile::tempdir().unwrap();
	let dataset = write_csv(
		dir.path(),
		"default,good,bad\n1,0.9,0.2\n0,0.1,0.8\n1,0.8,\n0,0.3,0.6\n,0.5,0.5\n",
	);
	let curves = compute_roc_curves(
		&dataset,
		"default",
		&["good".to_owned(), "bad".to_owned()],
		None,
		2,
	)
	.unwrap();
	assert_eq!(curves.positive_class, "1");
	assert_eq!(curves.curves[0].n_rows, 4);
	assert_eq!(curves.curves[0].roc_curve.auc, 1.0);
	assert_eq!(curves.curves[1].n_rows, 3);
	assert_eq!(curves.curves[1].roc_curve.auc, 0.0);
	let points = &curves.curves[0].roc_curve.points;
	assert_eq!(points.first().unwrap().false_positive_rate, 0.0);
	assert_eq!(points.last().unwrap().true_positive_rate, 1.0);
	for window in points.windows(2) {
		assert!(window[0].true_positive_rate <= window[1].true_positive_rate);
		assert!(window[0].false_positive_rate <= window[1].false_positive_rate);
	}
	// The other class can be chosen as positive, which mirrors the curve.
	let roc = compute_roc(&dataset, "default", "good", Some("0"), 100).unwrap();
	assert_eq!(roc.auc, 0.0);
	assert!(compute_roc(&dataset, "default", "missing", None, 100)
		.unwrap_err()
		.is_data());
}

#[test]
fn test_compute_roc_without_both_classes() {
	let dir = tempfile::tempdir().unwrap();
	let dataset = write_csv(dir.path(), "default,p\n1,0.2\n1,0.9\n1,0.4\n");
	// With a single value, the column is inferred as a number column.
	let error = compute_roc(&dataset, "default", "p", None, 100).unwrap_err();
	assert!(error.is_data());
}
