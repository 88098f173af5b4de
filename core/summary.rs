/*!
This module summarizes a dataset column by column in one streaming pass.
*/

use scorecard_dataframe::{Column, ColumnType, Dataset};
use scorecard_metrics::{MeanVariance, StreamingMetric};
use scorecard_util::{data_err, Result};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatasetSummary {
	pub n_rows: u64,
	pub columns: Vec<ColumnSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnSummary {
	pub name: String,
	pub n_valid: u64,
	pub n_invalid: u64,
	pub stats: ColumnStats,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnStats {
	Unknown,
	/// The statistics are `None` when the column has no valid values.
	Number {
		min: Option<f32>,
		max: Option<f32>,
		mean: Option<f32>,
		variance: Option<f32>,
	},
	/// The number of rows with each option, in option order.
	Enum { level_counts: Vec<(String, u64)> },
	Text,
}

enum Accumulator {
	Unknown,
	Number(MeanVariance),
	Enum(Vec<u64>),
	Text,
}

/// Count the valid and invalid values of every column of `dataset`, and compute statistics for number and enum columns.
pub fn summarize(dataset: &Dataset, block_size: usize) -> Result<DatasetSummary> {
	let schema = dataset.schema();
	let mut accumulators: Vec<Accumulator> = schema
		.columns
		.iter()
		.map(|column| match &column.column_type {
			ColumnType::Unknown => Accumulator::Unknown,
			ColumnType::Number => Accumulator::Number(MeanVariance::default()),
			ColumnType::Enum { options } => Accumulator::Enum(vec![0; options.len()]),
			ColumnType::Text => Accumulator::Text,
		})
		.collect();
	let mut n_invalid = vec![0u64; schema.len()];
	let mut n_rows = 0u64;
	for block in dataset.blocks(block_size)? {
		let block = block?;
		n_rows += block.nrows() as u64;
		for ((column, accumulator), n_invalid) in block
			.columns
			.iter()
			.zip(accumulators.iter_mut())
			.zip(n_invalid.iter_mut())
		{
			match (column, accumulator) {
				(Column::Unknown(column), Accumulator::Unknown) => *n_invalid += column.len as u64,
				(Column::Number(column), Accumulator::Number(mean_variance)) => {
					for value in column.data.iter() {
						if value.is_finite() {
							mean_variance.update(*value);
						} else {
							*n_invalid += 1;
						}
					}
				}
				(Column::Enum(column), Accumulator::Enum(counts)) => {
					for value in column.data.iter() {
						match value.and_then(|value| counts.get_mut(value.get() - 1)) {
							Some(count) => *count += 1,
							None => *n_invalid += 1,
						}
					}
				}
				(Column::Text(_), Accumulator::Text) => {}
				(column, _) => {
					return Err(data_err!("column {:?} changed type between blocks", column.name()))
				}
			}
		}
	}
	let columns = schema
		.columns
		.iter()
		.zip(accumulators.into_iter())
		.zip(n_invalid.into_iter())
		.map(|((column, accumulator), n_invalid)| {
			let stats = match accumulator {
				Accumulator::Unknown => ColumnStats::Unknown,
				Accumulator::Number(mean_variance) => {
					let output = mean_variance.finalize();
					ColumnStats::Number {
						min: output.as_ref().map(|output| output.min),
						max: output.as_ref().map(|output| output.max),
						mean: output.as_ref().map(|output| output.mean),
						variance: output.as_ref().map(|output| output.variance),
					}
				}
				Accumulator::Enum(counts) => ColumnStats::Enum {
					level_counts: column
						.column_type
						.options()
						.unwrap_or_default()
						.iter()
						.cloned()
						.zip(counts.into_iter())
						.collect(),
				},
				Accumulator::Text => ColumnStats::Text,
			};
			ColumnSummary {
				name: column.name.clone(),
				n_valid: n_rows - n_invalid,
				n_invalid,
				stats,
			}
		})
		.collect();
	Ok(DatasetSummary { n_rows, columns })
}

#[test]
fn test_summarize() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("loans.csv");
	std::fs::write(
		&path,
		"balance,state,note,empty\n1,CA,a,\n3,NY,b,\nn/a,CA,c,\n2,,d,\n",
	)
	.unwrap();
	let dataset = Dataset::open(&path, &scorecard_dataframe::OpenOptions::default()).unwrap();
	let summary = summarize(&dataset, 3).unwrap();
	assert_eq!(summary.n_rows, 4);
	let balance = &summary.columns[0];
	assert_eq!((balance.n_valid, balance.n_invalid), (3, 1));
	assert_eq!(
		balance.stats,
		ColumnStats::Number {
			min: Some(1.0),
			max: Some(3.0),
			mean: Some(2.0),
			variance: Some(2.0 / 3.0),
		}
	);
	let state = &summary.columns[1];
	assert_eq!((state.n_valid, state.n_invalid), (3, 1));
	assert_eq!(
		state.stats,
		ColumnStats::Enum {
			level_counts: vec![("CA".to_owned(), 2), ("NY".to_owned(), 1)]
		}
	);
	let empty = &summary.columns[3];
	assert_eq!(empty.stats, ColumnStats::Unknown);
	assert_eq!(empty.n_invalid, 4);
}
