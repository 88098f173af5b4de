/*!
This module splits a dataset into labeled partitions. Each row is assigned one label by an independent random draw, and every row is written to the dataset for its label in a single pass over the source.
*/

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use scorecard_dataframe::{
	Column, ColumnSchema, ColumnType, DataFrame, Dataset, DatasetWriter, EnumColumn, Format,
	Schema,
};
use scorecard_util::{config_err, data_err, Result};
use serde::{Deserialize, Serialize};
use std::{
	num::NonZeroUsize,
	path::{Path, PathBuf},
};

/// Probabilities for more than two labels must sum to one within this tolerance.
const PROBABILITY_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionLabel {
	pub name: String,
	pub probability: f64,
}

impl PartitionLabel {
	pub fn new(name: impl Into<String>, probability: f64) -> Self {
		Self {
			name: name.into(),
			probability,
		}
	}
}

/// Parse a label written `name=probability`, such as `train=0.75`.
impl std::str::FromStr for PartitionLabel {
	type Err = scorecard_util::Error;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (name, probability) = match s.rfind('=') {
			Some(index) => (&s[..index], &s[index + 1..]),
			None => return Err(config_err!("expected a label like \"train=0.75\", got {:?}", s)),
		};
		let probability = probability
			.trim()
			.parse()
			.map_err(|_| config_err!("the probability in {:?} is not a number", s))?;
		Ok(PartitionLabel::new(name.trim(), probability))
	}
}

#[derive(Clone, Debug)]
pub struct PartitionOptions {
	pub labels: Vec<PartitionLabel>,
	/// If this is `None`, a seed is drawn at random and logged.
	pub seed: Option<u64>,
	/// Partitions are written here, or next to the source if this is `None`.
	pub output_dir: Option<PathBuf>,
	/// Partitions are written in this format, or in the source's format if this is `None`.
	pub format: Option<Format>,
	pub block_size: usize,
}

impl PartitionOptions {
	pub fn new(labels: Vec<PartitionLabel>) -> Self {
		Self {
			labels,
			seed: None,
			output_dir: None,
			format: None,
			block_size: scorecard_dataframe::DEFAULT_BLOCK_SIZE,
		}
	}
}

/// One partition written by [`partition`](fn.partition.html).
#[derive(Clone, Debug)]
pub struct Partition {
	pub label: String,
	pub dataset: Dataset,
	pub n_rows: u64,
}

/// The partitions written by [`partition`](fn.partition.html), in the order their labels were given.
#[derive(Clone, Debug)]
pub struct Partitions {
	pub partitions: Vec<Partition>,
	/// The seed the labels were drawn with.
	pub seed: u64,
}

impl Partitions {
	pub fn get(&self, label: &str) -> Option<&Dataset> {
		self.partitions
			.iter()
			.find(|partition| partition.label == label)
			.map(|partition| &partition.dataset)
	}

	pub fn n_rows(&self, label: &str) -> Option<u64> {
		self.partitions
			.iter()
			.find(|partition| partition.label == label)
			.map(|partition| partition.n_rows)
	}
}

/**
A `LabelSampler` draws a label index for each row. A draw `u` uniform in `[0, 1)` selects the first label whose cumulative probability exceeds `u`, and the last label absorbs any remaining mass.
*/
pub struct LabelSampler {
	cumulative_probabilities: Vec<f64>,
	rng: Xoshiro256Plus,
}

impl LabelSampler {
	/// Validate `labels` and create a sampler seeded with `seed`.
	pub fn new(labels: &[PartitionLabel], seed: u64) -> Result<Self> {
		let cumulative_probabilities = validate_labels(labels)?;
		Ok(Self {
			cumulative_probabilities,
			rng: Xoshiro256Plus::seed_from_u64(seed),
		})
	}

	pub fn sample(&mut self) -> usize {
		let u: f64 = self.rng.gen();
		let last = self.cumulative_probabilities.len() - 1;
		self.cumulative_probabilities
			.iter()
			.position(|cumulative_probability| u < *cumulative_probability)
			.unwrap_or(last)
	}
}

/// Check the labels and compute their cumulative probabilities. With exactly two labels only the first probability is consulted, and the second label receives the rest.
fn validate_labels(labels: &[PartitionLabel]) -> Result<Vec<f64>> {
	if labels.is_empty() {
		return Err(config_err!("at least one partition label is required"));
	}
	for (index, label) in labels.iter().enumerate() {
		if label.name.is_empty() {
			return Err(config_err!("partition label names must not be empty"));
		}
		if label.name.chars().any(std::path::is_separator) {
			return Err(config_err!(
				"partition label {:?} contains a path separator",
				label.name
			));
		}
		if labels[..index].iter().any(|other| other.name == label.name) {
			return Err(config_err!("duplicate partition label {:?}", label.name));
		}
		if !(0.0..=1.0).contains(&label.probability) {
			return Err(config_err!(
				"the probability of partition label {:?} is {}, which is not between 0 and 1",
				label.name,
				label.probability
			));
		}
	}
	if labels.len() == 2 {
		return Ok(vec![labels[0].probability, 1.0]);
	}
	let sum: f64 = labels.iter().map(|label| label.probability).sum();
	if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
		return Err(config_err!(
			"the probabilities of {} partition labels must sum to 1, but they sum to {}",
			labels.len(),
			sum
		));
	}
	let mut cumulative_probability = 0.0;
	let mut cumulative_probabilities: Vec<f64> = labels
		.iter()
		.map(|label| {
			cumulative_probability += label.probability;
			cumulative_probability
		})
		.collect();
	if let Some(last) = cumulative_probabilities.last_mut() {
		*last = 1.0;
	}
	Ok(cumulative_probabilities)
}

/// Use the given seed, or draw one and log it so the run can be repeated.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
	match seed {
		Some(seed) => seed,
		None => {
			let seed = rand::random();
			log::info!("no seed was given, drawing labels with seed {}", seed);
			seed
		}
	}
}

/// The path the partition for `label` is written to: `stem_label.ext` in `output_dir`, or next to the source.
pub fn partition_path(
	source: &Path,
	label: &str,
	output_dir: Option<&Path>,
	format: Format,
) -> PathBuf {
	let dir = output_dir
		.map(|dir| dir.to_owned())
		.or_else(|| source.parent().map(|parent| parent.to_owned()))
		.unwrap_or_default();
	let stem = source
		.file_stem()
		.map(|stem| stem.to_string_lossy().into_owned())
		.unwrap_or_else(|| "dataset".to_owned());
	dir.join(format!("{}_{}.{}", stem, label, format.extension()))
}

/**
Split `dataset` into one dataset per label. Each row is written to exactly one partition. Existing files at the destinations are replaced. Every partition keeps the source's schema, so an enum level absent from a partition is still one of its column's options.
*/
pub fn partition(dataset: &Dataset, options: &PartitionOptions) -> Result<Partitions> {
	let seed = resolve_seed(options.seed);
	let mut sampler = LabelSampler::new(&options.labels, seed)?;
	let format = options.format.unwrap_or_else(|| dataset.format());
	let mut writers = options
		.labels
		.iter()
		.map(|label| {
			let path = partition_path(
				dataset.path(),
				&label.name,
				options.output_dir.as_deref(),
				format,
			);
			DatasetWriter::create(&path, format, dataset.schema().clone())
		})
		.collect::<Result<Vec<_>>>()?;
	let mut n_rows = vec![0u64; options.labels.len()];
	let mut rows_for_label: Vec<Vec<usize>> = vec![Vec::new(); options.labels.len()];
	for block in dataset.blocks(options.block_size)? {
		let block = block?;
		for rows in rows_for_label.iter_mut() {
			rows.clear();
		}
		for row in 0..block.nrows() {
			rows_for_label[sampler.sample()].push(row);
		}
		for ((writer, rows), n_rows) in writers
			.iter_mut()
			.zip(rows_for_label.iter())
			.zip(n_rows.iter_mut())
		{
			if !rows.is_empty() {
				writer.write(&block.take_rows(rows))?;
				*n_rows += rows.len() as u64;
			}
		}
	}
	let mut partitions = Vec::with_capacity(writers.len());
	for ((writer, label), n_rows) in writers
		.into_iter()
		.zip(options.labels.iter())
		.zip(n_rows.into_iter())
	{
		let dataset = writer.finish()?;
		log::info!(
			"wrote {} rows to partition {:?} at {}",
			n_rows,
			label.name,
			dataset.path().display()
		);
		partitions.push(Partition {
			label: label.name.clone(),
			dataset,
			n_rows,
		});
	}
	Ok(Partitions { partitions, seed })
}

/**
Append an enum column named `column_name` holding a randomly drawn label to every row of `dataset`, replacing the file in place. The rewritten file is staged and only replaces the original once every row has been written. Returns the rewritten dataset and the number of rows drawn for each label.
*/
pub fn tag(
	dataset: &Dataset,
	labels: &[PartitionLabel],
	seed: Option<u64>,
	column_name: &str,
	block_size: usize,
) -> Result<(Dataset, Vec<u64>)> {
	if dataset.schema().contains(column_name) {
		return Err(data_err!(
			"{} already has a column named {:?}",
			dataset.path().display(),
			column_name
		));
	}
	let seed = resolve_seed(seed);
	let mut sampler = LabelSampler::new(labels, seed)?;
	let options: Vec<String> = labels.iter().map(|label| label.name.clone()).collect();
	let mut columns = dataset.schema().columns.clone();
	columns.push(ColumnSchema {
		name: column_name.to_owned(),
		column_type: ColumnType::Enum {
			options: options.clone(),
		},
	});
	let schema = Schema::new(columns)?;
	let mut writer = DatasetWriter::create(dataset.path(), dataset.format(), schema)?;
	let mut n_rows = vec![0u64; labels.len()];
	for block in dataset.blocks(block_size)? {
		let mut block: DataFrame = block?;
		let data = (0..block.nrows())
			.map(|_| {
				let label_index = sampler.sample();
				n_rows[label_index] += 1;
				NonZeroUsize::new(label_index + 1)
			})
			.collect();
		block.columns.push(Column::Enum(EnumColumn {
			name: column_name.to_owned(),
			options: options.clone(),
			data,
		}));
		writer.write(&block)?;
	}
	let dataset = writer.finish()?;
	for (label, n_rows) in labels.iter().zip(n_rows.iter()) {
		log::info!("tagged {} rows with {:?}", n_rows, label.name);
	}
	Ok((dataset, n_rows))
}

#[test]
fn test_validate_labels() {
	let labels = |labels: &[(&str, f64)]| -> Vec<PartitionLabel> {
		labels
			.iter()
			.map(|(name, probability)| PartitionLabel::new(*name, *probability))
			.collect()
	};
	assert_eq!(
		validate_labels(&labels(&[("train", 0.75), ("validate", 0.9)])).unwrap(),
		vec![0.75, 1.0]
	);
	let cumulative =
		validate_labels(&labels(&[("a", 0.2), ("b", 0.3), ("c", 0.5)])).unwrap();
	assert!((cumulative[0] - 0.2).abs() < 1e-12);
	assert!((cumulative[1] - 0.5).abs() < 1e-12);
	assert_eq!(cumulative[2], 1.0);
	assert_eq!(validate_labels(&labels(&[("all", 1.0)])).unwrap(), vec![1.0]);
	for bad in [
		labels(&[]),
		labels(&[("train", 0.5), ("train", 0.5)]),
		labels(&[("a", 0.2), ("b", 0.3), ("c", 0.4)]),
		labels(&[("a", 1.5), ("b", 0.5)]),
		labels(&[("a", -0.1), ("b", 0.5)]),
		labels(&[("a", f64::NAN), ("b", 0.5)]),
		labels(&[("", 0.5), ("b", 0.5)]),
		labels(&[("a/b", 0.5), ("b", 0.5)]),
		labels(&[("only", 0.5)]),
	]
	.iter()
	{
		assert!(validate_labels(bad).unwrap_err().is_configuration());
	}
}

#[test]
fn test_parse_label() {
	let label: PartitionLabel = "train=0.75".parse().unwrap();
	assert_eq!(label, PartitionLabel::new("train", 0.75));
	assert!("train".parse::<PartitionLabel>().is_err());
	assert!("train=most".parse::<PartitionLabel>().is_err());
}

#[test]
fn test_sampler_is_deterministic() {
	let labels = vec![
		PartitionLabel::new("train", 0.75),
		PartitionLabel::new("validate", 0.25),
	];
	let mut a = LabelSampler::new(&labels, 42).unwrap();
	let mut b = LabelSampler::new(&labels, 42).unwrap();
	let a: Vec<usize> = (0..1000).map(|_| a.sample()).collect();
	let b: Vec<usize> = (0..1000).map(|_| b.sample()).collect();
	assert_eq!(a, b);
	let n_train = a.iter().filter(|label| **label == 0).count();
	assert!((650..850).contains(&n_train));
}

#[test]
fn test_partition_path() {
	assert_eq!(
		partition_path(
			Path::new("data/loans.csv"),
			"train",
			None,
			Format::Csv { delimiter: b',' }
		),
		PathBuf::from("data/loans_train.csv")
	);
	assert_eq!(
		partition_path(
			Path::new("data/loans.csv"),
			"validate",
			Some(Path::new("out")),
			Format::Columnar
		),
		PathBuf::from("out/loans_validate.scf")
	);
}
