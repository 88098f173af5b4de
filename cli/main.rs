//! This module contains the main entrypoint to the scorecard cli.

use clap::Parser;
use colored::Colorize;
use scorecard_core::{
	config::Config,
	evaluate::compute_roc_curves,
	formula::{build_formula, Formula},
	model::Model,
	partition::{PartitionLabel, PartitionOptions},
	score::ScoreOptions,
	summary::{summarize, ColumnStats},
	train::{Algorithm, TrainOptions},
};
use scorecard_dataframe::{Dataset, Format};
use scorecard_util::{config_err, error::IoResultExt, Result};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
	name = "scorecard",
	about = "Partition a dataset, train a model, score new data, and evaluate the scores.",
	disable_help_subcommand = true
)]
enum Options {
	#[command(name = "info")]
	Info(InfoOptions),
	#[command(name = "convert")]
	Convert(ConvertOptions),
	#[command(name = "partition")]
	Partition(PartitionCommandOptions),
	#[command(name = "tag")]
	Tag(TagOptions),
	#[command(name = "train")]
	Train(Box<TrainCommandOptions>),
	#[command(name = "score")]
	Score(ScoreCommandOptions),
	#[command(name = "roc")]
	Roc(RocOptions),
}

#[derive(Parser, Debug)]
#[command(about = "print the schema of a dataset and a summary of each column")]
struct InfoOptions {
	#[arg(short, long, help = "the path to a .csv, .tsv, or .scf file")]
	file: PathBuf,
	#[arg(short, long, help = "the path to a .yaml or .json config file")]
	config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "copy a dataset into another format")]
struct ConvertOptions {
	#[arg(short, long, help = "the path to a .csv, .tsv, or .scf file")]
	file: PathBuf,
	#[arg(short, long, help = "the path to write, whose extension selects the format")]
	output: PathBuf,
	#[arg(short, long, help = "the path to a .yaml or .json config file")]
	config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "split a dataset into randomly assigned partitions")]
#[command(
	long_about = "split a dataset into randomly assigned partitions, writing the partition for label L of dir/loans.csv to dir/loans_L.csv"
)]
struct PartitionCommandOptions {
	#[arg(short, long, help = "the path to a .csv, .tsv, or .scf file")]
	file: PathBuf,
	#[arg(short, long = "label", help = "a label and its probability, like train=0.75")]
	labels: Vec<PartitionLabel>,
	#[arg(long, help = "the seed for the random draws")]
	seed: Option<u64>,
	#[arg(long, help = "the directory to write partitions to, instead of the dataset's directory")]
	output_dir: Option<PathBuf>,
	#[arg(long, help = "write the partitions as .scf files")]
	columnar: bool,
	#[arg(short, long, help = "the path to a .yaml or .json config file")]
	config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "add a column holding a randomly drawn partition label to a dataset")]
struct TagOptions {
	#[arg(short, long, help = "the path to a .csv, .tsv, or .scf file, which is rewritten")]
	file: PathBuf,
	#[arg(short, long = "label", help = "a label and its probability, like train=0.75")]
	labels: Vec<PartitionLabel>,
	#[arg(long, help = "the seed for the random draws")]
	seed: Option<u64>,
	#[arg(long, default_value = "partition", help = "the name of the column to add")]
	column: String,
	#[arg(short, long, help = "the path to a .yaml or .json config file")]
	config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "train a model")]
#[command(long_about = "train a model predicting one column of a dataset from the others")]
struct TrainCommandOptions {
	#[arg(short, long, help = "the path to a .csv, .tsv, or .scf file")]
	file: PathBuf,
	#[arg(
		short,
		long,
		required_unless_present = "formula",
		help = "the name of the column to predict"
	)]
	target: Option<String>,
	#[arg(
		long,
		conflicts_with_all = ["target", "exclude"],
		help = "a formula like \"default ~ balance + income\""
	)]
	formula: Option<Formula>,
	#[arg(short, long, help = "a column not to use as a feature")]
	exclude: Vec<String>,
	#[arg(
		short,
		long,
		help = "one of linear-regression, logistic-regression, decision-tree, random-forest, gradient-boosted-trees"
	)]
	algorithm: Option<Algorithm>,
	#[arg(
		long = "option",
		value_parser = parse_train_option,
		help = "an algorithm option, like max_depth=4"
	)]
	options: Vec<(String, serde_json::Value)>,
	#[arg(short, long, help = "the path to write the .scm model file to")]
	output: Option<PathBuf>,
	#[arg(short, long, help = "the path to a .yaml or .json config file")]
	config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "score a dataset with a model")]
struct ScoreCommandOptions {
	#[arg(short, long, help = "the path to a .scm model file")]
	model: PathBuf,
	#[arg(short, long, help = "the path to a .csv, .tsv, or .scf file")]
	file: PathBuf,
	#[arg(short, long, help = "the path to write, whose extension selects the format")]
	output: PathBuf,
	#[arg(long, help = "copy every input column to the output")]
	write_input_columns: bool,
	#[arg(long = "copy", help = "an input column to copy to the output")]
	copy: Vec<String>,
	#[arg(
		long = "prediction-name",
		help = "the name of a prediction column, one per class or one for regression"
	)]
	prediction_names: Vec<String>,
	#[arg(short, long, help = "the path to a .yaml or .json config file")]
	config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "compute ROC curves for scored data")]
struct RocOptions {
	#[arg(short, long, help = "the path to a scored .csv, .tsv, or .scf file")]
	file: PathBuf,
	#[arg(long, help = "the column holding the actual class")]
	actual: String,
	#[arg(long, required = true, help = "a column holding predicted scores")]
	predicted: Vec<String>,
	#[arg(long, help = "the value of the actual column that is positive")]
	positive_class: Option<String>,
	#[arg(short, long, help = "the path to write the curves to as JSON, instead of stdout")]
	output: Option<PathBuf>,
	#[arg(short, long, help = "the path to a .yaml or .json config file")]
	config: Option<PathBuf>,
}

fn main() {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let options = Options::parse();
	let result = match options {
		Options::Info(options) => cli_info(options),
		Options::Convert(options) => cli_convert(options),
		Options::Partition(options) => cli_partition(options),
		Options::Tag(options) => cli_tag(options),
		Options::Train(options) => cli_train(*options),
		Options::Score(options) => cli_score(options),
		Options::Roc(options) => cli_roc(options),
	};
	if let Err(error) = result {
		eprintln!("{}: {}", "error".red().bold(), error);
		std::process::exit(1);
	}
}

/// Parse `key=value`. The value is read as JSON if it parses and as a string otherwise, so `max_depth=4` gives a number and `name=abc` a string.
fn parse_train_option(s: &str) -> Result<(String, serde_json::Value), String> {
	let index = s
		.find('=')
		.ok_or_else(|| format!("expected an option like max_depth=4, got {:?}", s))?;
	let (key, value) = (s[..index].trim(), s[index + 1..].trim());
	if key.is_empty() {
		return Err(format!("the option {:?} has no name", s));
	}
	let value = serde_json::from_str(value)
		.unwrap_or_else(|_| serde_json::Value::String(value.to_owned()));
	Ok((key.to_owned(), value))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
	match path {
		Some(path) => Config::from_path(path),
		None => Ok(Config::default()),
	}
}

fn open_dataset(path: &Path, config: &Config) -> Result<Dataset> {
	Dataset::open(path, &config.open_options(path)?)
}

fn partition_labels(labels: Vec<PartitionLabel>, config: &Config) -> Result<Vec<PartitionLabel>> {
	if !labels.is_empty() {
		return Ok(labels);
	}
	config
		.partition
		.as_ref()
		.map(|partition| partition.labels.clone())
		.filter(|labels| !labels.is_empty())
		.ok_or_else(|| {
			config_err!(
				"no partition labels were given, pass --label train=0.75 or set partition.labels in a config file"
			)
		})
}

fn cli_info(options: InfoOptions) -> Result<()> {
	let config = load_config(options.config.as_deref())?;
	let dataset = open_dataset(&options.file, &config)?;
	let summary = summarize(&dataset, config.block_size())?;
	println!(
		"{}: {} rows, {} columns",
		dataset.path().display(),
		summary.n_rows,
		summary.columns.len()
	);
	let name_width = summary
		.columns
		.iter()
		.map(|column| column.name.len())
		.max()
		.unwrap_or(0)
		.max(6);
	println!(
		"{:<name_width$}  {:<7}  {:>8}  {:>8}  stats",
		"column",
		"type",
		"valid",
		"invalid",
		name_width = name_width
	);
	for column in summary.columns.iter() {
		let (column_type, stats) = match &column.stats {
			ColumnStats::Unknown => ("unknown", String::new()),
			ColumnStats::Number {
				min,
				max,
				mean,
				variance,
			} => {
				let stats = match (min, max, mean, variance) {
					(Some(min), Some(max), Some(mean), Some(variance)) => format!(
						"min {} max {} mean {:.4} std {:.4}",
						min,
						max,
						mean,
						variance.sqrt()
					),
					_ => String::new(),
				};
				("number", stats)
			}
			ColumnStats::Enum { level_counts } => {
				let stats = level_counts
					.iter()
					.map(|(level, count)| format!("{} ({})", level, count))
					.collect::<Vec<_>>()
					.join(", ");
				("enum", stats)
			}
			ColumnStats::Text => ("text", String::new()),
		};
		println!(
			"{:<name_width$}  {:<7}  {:>8}  {:>8}  {}",
			column.name,
			column_type,
			column.n_valid,
			column.n_invalid,
			stats,
			name_width = name_width
		);
	}
	Ok(())
}

fn cli_convert(options: ConvertOptions) -> Result<()> {
	let config = load_config(options.config.as_deref())?;
	let dataset = open_dataset(&options.file, &config)?;
	let format = Format::from_path(&options.output)?;
	let converted = dataset.convert(&options.output, format, config.block_size())?;
	eprintln!(
		"Converted {} to {}.",
		dataset.path().display(),
		converted.path().display()
	);
	Ok(())
}

fn cli_partition(options: PartitionCommandOptions) -> Result<()> {
	let config = load_config(options.config.as_deref())?;
	let dataset = open_dataset(&options.file, &config)?;
	let mut partition_options = PartitionOptions::new(partition_labels(options.labels, &config)?);
	partition_options.seed = options
		.seed
		.or_else(|| config.partition.as_ref().and_then(|partition| partition.seed));
	partition_options.output_dir = options.output_dir;
	partition_options.block_size = config.block_size();
	if options.columnar {
		partition_options.format = Some(Format::Columnar);
	}
	let partitions = scorecard_core::partition(&dataset, &partition_options)?;
	for partition in partitions.partitions.iter() {
		eprintln!(
			"{}: {} rows written to {}",
			partition.label,
			partition.n_rows,
			partition.dataset.path().display()
		);
	}
	eprintln!("Partitioned with seed {}.", partitions.seed);
	Ok(())
}

fn cli_tag(options: TagOptions) -> Result<()> {
	let config = load_config(options.config.as_deref())?;
	let dataset = open_dataset(&options.file, &config)?;
	let labels = partition_labels(options.labels, &config)?;
	let seed = options
		.seed
		.or_else(|| config.partition.as_ref().and_then(|partition| partition.seed));
	let (dataset, counts) = scorecard_core::tag(
		&dataset,
		&labels,
		seed,
		&options.column,
		config.block_size(),
	)?;
	for (label, count) in labels.iter().zip(counts.iter()) {
		eprintln!("{}: {} rows", label.name, count);
	}
	eprintln!(
		"Added column {:?} to {}.",
		options.column,
		dataset.path().display()
	);
	Ok(())
}

fn cli_train(options: TrainCommandOptions) -> Result<()> {
	let config = load_config(options.config.as_deref())?;
	let dataset = open_dataset(&options.file, &config)?;
	let formula = match (options.formula, options.target) {
		(Some(formula), _) => formula,
		(None, Some(target)) => {
			let mut exclude = config.exclude.clone().unwrap_or_default();
			exclude.extend(options.exclude);
			build_formula(dataset.schema(), &target, &exclude)?
		}
		(None, None) => return Err(config_err!("pass either --target or --formula")),
	};
	let train_config = config.train.as_ref();
	let algorithm = options
		.algorithm
		.or_else(|| train_config.and_then(|train| train.algorithm))
		.unwrap_or(Algorithm::GradientBoostedTrees);
	let mut train_options: TrainOptions = train_config
		.map(|train| train.options.clone())
		.unwrap_or_default();
	train_options.extend(options.options);

	let model = scorecard_core::train(&formula, &dataset, algorithm, &train_options)?;

	// Retrieve the output path from the command line arguments or generate a default.
	let output_path = match options.output {
		Some(output) => output,
		None => {
			let dir = std::env::current_dir()?;
			let name = options
				.file
				.file_stem()
				.and_then(|stem| stem.to_str())
				.unwrap_or("model");
			available_path(&dir, name, "scm")?
		}
	};
	model.to_path(&output_path)?;

	eprintln!(
		"Trained {} model {} on {} rows: {}",
		model.algorithm, model.id, model.n_training_rows, model.formula
	);
	if let Some(importances) = model.learned.feature_importances() {
		let mut importances: Vec<(&String, f32)> = model
			.formula
			.features
			.iter()
			.zip(importances.iter().copied())
			.collect();
		importances.sort_by(|a, b| b.1.total_cmp(&a.1));
		for (feature, importance) in importances.iter().take(10) {
			eprintln!("  {:>6.3}  {}", importance, feature);
		}
	}
	eprintln!("Your model was written to {}.", output_path.display());
	Ok(())
}

fn cli_score(options: ScoreCommandOptions) -> Result<()> {
	let config = load_config(options.config.as_deref())?;
	let model = Model::from_path(&options.model)?;
	let dataset = open_dataset(&options.file, &config)?;
	let score_options = ScoreOptions {
		write_input_columns: options.write_input_columns,
		extra_columns_to_copy: options.copy,
		prediction_column_names: if options.prediction_names.is_empty() {
			None
		} else {
			Some(options.prediction_names)
		},
		format: None,
		block_size: config.block_size(),
	};
	let scored = scorecard_core::score(&model, &dataset, &options.output, &score_options)?;
	eprintln!("Your predictions were written to {}.", scored.path().display());
	Ok(())
}

fn cli_roc(options: RocOptions) -> Result<()> {
	let config = load_config(options.config.as_deref())?;
	let dataset = open_dataset(&options.file, &config)?;
	let curves = compute_roc_curves(
		&dataset,
		&options.actual,
		&options.predicted,
		options.positive_class.as_deref(),
		config.block_size(),
	)?;
	for curve in curves.curves.iter() {
		eprintln!(
			"{}: AUC {:.4} over {} rows",
			curve.predicted, curve.roc_curve.auc, curve.n_rows
		);
	}
	let json = serde_json::to_string_pretty(&curves)
		.map_err(|error| config_err!("failed to serialize the ROC curves: {}", error))?;
	match options.output {
		Some(output) => std::fs::write(&output, json).at_path(&output)?,
		None => println!("{}", json),
	}
	Ok(())
}

/// This function checks if a file with the given name and extension already exists in `dir`, and if it does, it appends " 1", " 2", etc. to it until it finds a name that will not overwrite an existing file.
fn available_path(dir: &Path, name: &str, extension: &str) -> Result<PathBuf> {
	let mut i = 0;
	loop {
		let mut filename = String::new();
		filename.push_str(name);
		if i > 0 {
			filename.push(' ');
			filename.push_str(&i.to_string());
		}
		filename.push('.');
		filename.push_str(extension);
		let path = dir.join(filename);
		match std::fs::metadata(&path) {
			// If a file at the path does not exist, return the path.
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(path),
			Err(error) => return Err(scorecard_util::Error::io(&path, error)),
			// If a file at the path exists, try the next number.
			Ok(_) => i += 1,
		}
	}
}

#[test]
fn test_parse_train_option() {
	assert_eq!(
		parse_train_option("max_depth=4").unwrap(),
		("max_depth".to_owned(), serde_json::json!(4))
	);
	assert_eq!(
		parse_train_option("seed = 7").unwrap(),
		("seed".to_owned(), serde_json::json!(7))
	);
	assert_eq!(
		parse_train_option("name=abc").unwrap(),
		("name".to_owned(), serde_json::json!("abc"))
	);
	assert!(parse_train_option("max_depth").is_err());
	assert!(parse_train_option("=4").is_err());
}

#[test]
fn test_cli_parses() {
	use clap::CommandFactory;
	Options::command().debug_assert();
	let options = Options::try_parse_from([
		"scorecard",
		"partition",
		"--file",
		"loans.csv",
		"--label",
		"train=0.75",
		"--label",
		"validate=0.25",
		"--seed",
		"42",
	])
	.unwrap();
	match options {
		Options::Partition(options) => {
			assert_eq!(options.labels.len(), 2);
			assert_eq!(options.labels[0], PartitionLabel::new("train", 0.75));
			assert_eq!(options.seed, Some(42));
		}
		_ => panic!("expected the partition subcommand"),
	}
	let options = Options::try_parse_from([
		"scorecard",
		"train",
		"--file",
		"loans.csv",
		"--target",
		"default",
		"--algorithm",
		"random-forest",
		"--option",
		"n_trees=10",
	])
	.unwrap();
	match options {
		Options::Train(options) => {
			assert_eq!(options.algorithm, Some(Algorithm::RandomForest));
			assert_eq!(options.options, vec![("n_trees".to_owned(), serde_json::json!(10))]);
		}
		_ => panic!("expected the train subcommand"),
	}
	assert!(Options::try_parse_from(["scorecard", "train", "--file", "loans.csv"]).is_err());
	assert!(Options::try_parse_from([
		"scorecard",
		"train",
		"--file",
		"loans.csv",
		"--algorithm",
		"svm",
		"--target",
		"y"
	])
	.is_err());
}
