/*!
This module defines the `Config` struct, which is read from a YAML or JSON file and supplies defaults for every `scorecard` command. Command line flags take precedence over the values in the file.

```yaml
column_types:
  default:
    type: enum
    options: ["0", "1"]
delimiter: ","
partition:
  labels:
    - name: train
      probability: 0.75
    - name: validate
      probability: 0.25
  seed: 42
train:
  algorithm: gradient-boosted-trees
  options:
    max_rounds: 200
exclude:
  - loan_id
```
*/

use crate::{partition::PartitionLabel, train::Algorithm};
use scorecard_dataframe::{
	ColumnType, Format, FromCsvOptions, InferOptions, OpenOptions, DEFAULT_BLOCK_SIZE,
};
use scorecard_util::{config_err, error::IoResultExt, Result};
use std::{collections::BTreeMap, path::Path};

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
	/// Column types that replace the inferred types when reading delimited text.
	pub column_types: Option<BTreeMap<String, ColumnType>>,
	pub delimiter: Option<char>,
	pub enum_max_unique_values: Option<usize>,
	pub block_size: Option<usize>,
	pub partition: Option<PartitionConfig>,
	pub train: Option<TrainConfig>,
	/// Columns the formula builder leaves out of the features.
	pub exclude: Option<Vec<String>>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartitionConfig {
	pub labels: Vec<PartitionLabel>,
	pub seed: Option<u64>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainConfig {
	pub algorithm: Option<Algorithm>,
	#[serde(default)]
	pub options: BTreeMap<String, serde_json::Value>,
}

impl Config {
	/// Read a config file. Files ending in `.yaml` or `.yml` are parsed as YAML and files ending in `.json` as JSON.
	pub fn from_path(path: &Path) -> Result<Config> {
		let extension = path
			.extension()
			.and_then(|extension| extension.to_str())
			.map(|extension| extension.to_ascii_lowercase());
		let text = std::fs::read_to_string(path).at_path(path)?;
		match extension.as_deref() {
			Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
			Some("json") => Self::from_json_str(&text),
			_ => Err(config_err!(
				"cannot tell the format of config file {}, use a .yaml, .yml, or .json extension",
				path.display()
			)),
		}
		.map_err(|error| match error {
			scorecard_util::Error::Configuration(message) => {
				config_err!("{}: {}", path.display(), message)
			}
			error => error,
		})
	}

	pub fn from_yaml_str(text: &str) -> Result<Config> {
		serde_yaml::from_str(text).map_err(|error| config_err!("{}", error))
	}

	pub fn from_json_str(text: &str) -> Result<Config> {
		serde_json::from_str(text).map_err(|error| config_err!("{}", error))
	}

	/// The options used to open datasets, with `delimiter` overriding the delimiter implied by the file extension.
	pub fn open_options(&self, path: &Path) -> Result<OpenOptions> {
		let format = match self.delimiter {
			Some(delimiter) => {
				if !delimiter.is_ascii() {
					return Err(config_err!(
						"the delimiter {:?} is not a single byte character",
						delimiter
					));
				}
				match Format::from_path(path) {
					Ok(Format::Columnar) => Some(Format::Columnar),
					_ => Some(Format::Csv {
						delimiter: delimiter as u8,
					}),
				}
			}
			None => None,
		};
		let mut infer_options = InferOptions::default();
		if let Some(enum_max_unique_values) = self.enum_max_unique_values {
			infer_options.enum_max_unique_values = enum_max_unique_values;
		}
		Ok(OpenOptions {
			format,
			csv: FromCsvOptions {
				column_types: self.column_types.clone(),
				infer_options,
			},
		})
	}

	pub fn block_size(&self) -> usize {
		self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE).max(1)
	}
}

#[test]
fn test_yaml_config() {
	let config = Config::from_yaml_str(
		r#"
column_types:
  default:
    type: enum
    options: ["0", "1"]
  balance:
    type: number
delimiter: ";"
partition:
  labels:
    - name: train
      probability: 0.75
    - name: validate
      probability: 0.25
  seed: 7
train:
  algorithm: random-forest
  options:
    n_trees: 10
exclude: [loan_id]
"#,
	)
	.unwrap();
	let column_types = config.column_types.as_ref().unwrap();
	assert_eq!(
		column_types["default"],
		ColumnType::Enum {
			options: vec!["0".to_owned(), "1".to_owned()]
		}
	);
	assert_eq!(column_types["balance"], ColumnType::Number);
	let partition = config.partition.as_ref().unwrap();
	assert_eq!(partition.labels.len(), 2);
	assert_eq!(partition.labels[1].name, "validate");
	assert_eq!(partition.seed, Some(7));
	let train = config.train.as_ref().unwrap();
	assert_eq!(train.algorithm, Some(Algorithm::RandomForest));
	assert_eq!(train.options["n_trees"], serde_json::json!(10));
	assert_eq!(config.exclude, Some(vec!["loan_id".to_owned()]));
	let open_options = config.open_options(Path::new("loans.csv")).unwrap();
	assert_eq!(
		open_options.format,
		Some(Format::Csv { delimiter: b';' })
	);
}

#[test]
fn test_json_config_rejects_unknown_fields() {
	let config = Config::from_json_str(r#"{"block_size": 100}"#).unwrap();
	assert_eq!(config.block_size(), 100);
	let error = Config::from_json_str(r#"{"blocksize": 100}"#).unwrap_err();
	assert!(error.is_configuration());
	assert_eq!(Config::default().block_size(), DEFAULT_BLOCK_SIZE);
}
