use super::*;
use fnv::FnvHashMap;
use scorecard_util::{error::Error, Result};
use std::{
	collections::{BTreeMap, BTreeSet},
	fs::File,
	path::Path,
};

#[derive(Clone, Debug, Default)]
pub struct FromCsvOptions {
	/// Columns listed here are read with the given type instead of having their type inferred.
	pub column_types: Option<BTreeMap<String, ColumnType>>,
	pub infer_options: InferOptions,
}

#[derive(Clone, Debug)]
pub struct InferOptions {
	/// A column whose values are not all numbers is an enum column if it has at most this many unique values, and a text column otherwise.
	pub enum_max_unique_values: usize,
}

impl Default for InferOptions {
	fn default() -> Self {
		Self {
			enum_max_unique_values: 100,
		}
	}
}

/// These values are the default values that are considered invalid.
pub const DEFAULT_INVALID_VALUES: &[&str] = &[
	"", "null", "NULL", "n/a", "N/A", "nan", "-nan", "NaN", "-NaN", "?",
];

pub(crate) fn csv_error(path: &Path, error: csv::Error) -> Error {
	let position = error
		.position()
		.map(|position| format!(" at line {}", position.line()))
		.unwrap_or_default();
	if error.is_io_error() {
		match error.into_kind() {
			csv::ErrorKind::Io(error) => Error::io(path, error),
			_ => unreachable!(),
		}
	} else {
		Error::Data(format!(
			"failed to read {}{}: {}",
			path.display(),
			position,
			error
		))
	}
}

pub(crate) fn csv_reader(path: &Path, delimiter: u8) -> Result<csv::Reader<File>> {
	csv::ReaderBuilder::new()
		.delimiter(delimiter)
		.from_path(path)
		.map_err(|error| csv_error(path, error))
}

/// Read the header of the delimited text file at `path` and determine the type of each column. Columns with a type in `options.column_types` are taken as given. If any column needs its type inferred, this makes one streaming pass over the file.
pub fn infer_csv_schema(path: &Path, delimiter: u8, options: &FromCsvOptions) -> Result<Schema> {
	let mut reader = csv_reader(path, delimiter)?;
	let column_names: Vec<String> = reader
		.headers()
		.map_err(|error| csv_error(path, error))?
		.into_iter()
		.map(|column_name| column_name.to_owned())
		.collect();
	let infer_options = &options.infer_options;

	#[derive(Clone, Debug)]
	enum ColumnTypeOrInferStats<'a> {
		ColumnType(ColumnType),
		InferStats(InferStats<'a>),
	}

	// Retrieve any column types present in the options.
	let mut column_types: Vec<ColumnTypeOrInferStats> = column_names
		.iter()
		.map(|column_name| {
			options
				.column_types
				.as_ref()
				.and_then(|column_types| column_types.get(column_name))
				.map(|column_type| ColumnTypeOrInferStats::ColumnType(column_type.clone()))
				.unwrap_or_else(|| {
					ColumnTypeOrInferStats::InferStats(InferStats::new(infer_options))
				})
		})
		.collect();

	// Passing over the file is only necessary if one or more columns did not have its type specified.
	let mut infer_stats: Vec<(usize, &mut InferStats)> = column_types
		.iter_mut()
		.enumerate()
		.filter_map(
			|(index, column_type_or_infer_stats)| match column_type_or_infer_stats {
				ColumnTypeOrInferStats::ColumnType(_) => None,
				ColumnTypeOrInferStats::InferStats(infer_stats) => Some((index, infer_stats)),
			},
		)
		.collect();
	if !infer_stats.is_empty() {
		let mut record = csv::StringRecord::new();
		let mut n_rows = 0;
		while reader
			.read_record(&mut record)
			.map_err(|error| csv_error(path, error))?
		{
			n_rows += 1;
			for (index, infer_stats) in infer_stats.iter_mut() {
				infer_stats.update(record.get(*index).unwrap_or(""));
			}
		}
		log::debug!("inferred column types of {} from {} rows", path.display(), n_rows);
	}

	let columns = column_names
		.into_iter()
		.zip(column_types.into_iter())
		.map(|(name, column_type_or_infer_stats)| {
			let column_type = match column_type_or_infer_stats {
				ColumnTypeOrInferStats::ColumnType(column_type) => column_type,
				ColumnTypeOrInferStats::InferStats(infer_stats) => infer_stats.finalize(),
			};
			ColumnSchema { name, column_type }
		})
		.collect();
	Schema::new(columns)
}

#[derive(Clone, Debug)]
pub struct InferStats<'a> {
	infer_options: &'a InferOptions,
	column_type: InferColumnType,
	unique_values: Option<BTreeSet<String>>,
}

#[derive(PartialEq, Clone, Copy, Debug)]
enum InferColumnType {
	Unknown,
	Number,
	Enum,
	Text,
}

impl<'a> InferStats<'a> {
	pub fn new(infer_options: &'a InferOptions) -> Self {
		Self {
			infer_options,
			column_type: InferColumnType::Unknown,
			unique_values: Some(BTreeSet::new()),
		}
	}

	pub fn update(&mut self, value: &str) {
		if DEFAULT_INVALID_VALUES.contains(&value) {
			return;
		}
		if let Some(unique_values) = self.unique_values.as_mut() {
			if !unique_values.contains(value) {
				unique_values.insert(value.to_owned());
			}
			if unique_values.len() > self.infer_options.enum_max_unique_values {
				self.unique_values = None;
			}
		}
		match self.column_type {
			InferColumnType::Unknown | InferColumnType::Number => {
				if lexical::parse::<f32, _>(value)
					.map(|v| v.is_finite())
					.unwrap_or(false)
				{
					self.column_type = InferColumnType::Number;
				} else if self.unique_values.is_some() {
					self.column_type = InferColumnType::Enum;
				} else {
					self.column_type = InferColumnType::Text;
				}
			}
			InferColumnType::Enum => {
				if self.unique_values.is_none() {
					self.column_type = InferColumnType::Text;
				}
			}
			InferColumnType::Text => {}
		}
	}

	pub fn finalize(self) -> ColumnType {
		match self.column_type {
			InferColumnType::Unknown => ColumnType::Unknown,
			InferColumnType::Number => {
				// If the only values in a number column are zero and one then make this an enum column instead.
				if let Some(unique_values) = self.unique_values {
					if unique_values.len() == 2
						&& unique_values.contains("0")
						&& unique_values.contains("1")
					{
						return ColumnType::Enum {
							options: unique_values.into_iter().collect(),
						};
					}
				}
				ColumnType::Number
			}
			InferColumnType::Enum => ColumnType::Enum {
				options: self.unique_values.unwrap_or_default().into_iter().collect(),
			},
			InferColumnType::Text => ColumnType::Text,
		}
	}
}

/// `CsvBlocks` reads a delimited text file with a known schema as a sequence of dataframes of at most `block_size` rows.
pub struct CsvBlocks {
	path: std::path::PathBuf,
	reader: csv::Reader<File>,
	schema: Schema,
	enum_lookups: Vec<Option<FnvHashMap<String, NonZeroUsize>>>,
	block_size: usize,
	record: csv::ByteRecord,
	done: bool,
}

impl CsvBlocks {
	pub fn new(path: &Path, delimiter: u8, schema: &Schema, block_size: usize) -> Result<Self> {
		let mut reader = csv_reader(path, delimiter)?;
		let headers = reader.headers().map_err(|error| csv_error(path, error))?;
		if headers.len() != schema.len()
			|| headers.iter().zip(schema.names()).any(|(a, b)| a != b)
		{
			return Err(Error::Data(format!(
				"the header of {} does not match the expected columns",
				path.display()
			)));
		}
		let enum_lookups = schema
			.columns
			.iter()
			.map(|column| {
				column.column_type.options().map(|options| {
					options
						.iter()
						.enumerate()
						.map(|(index, option)| {
							(option.clone(), NonZeroUsize::new(index + 1).unwrap())
						})
						.collect()
				})
			})
			.collect();
		Ok(Self {
			path: path.to_owned(),
			reader,
			schema: schema.clone(),
			enum_lookups,
			block_size: block_size.max(1),
			record: csv::ByteRecord::new(),
			done: false,
		})
	}

	fn read_block(&mut self) -> Result<Option<DataFrame>> {
		let mut dataframe = DataFrame::from_schema(&self.schema);
		let mut n_rows = 0;
		while n_rows < self.block_size {
			let has_record = self
				.reader
				.read_byte_record(&mut self.record)
				.map_err(|error| csv_error(&self.path, error))?;
			if !has_record {
				self.done = true;
				break;
			}
			n_rows += 1;
			for ((column, value), enum_lookup) in dataframe
				.columns
				.iter_mut()
				.zip(self.record.iter())
				.zip(self.enum_lookups.iter())
			{
				match column {
					Column::Unknown(column) => {
						column.len += 1;
					}
					Column::Number(column) => {
						let value = match lexical::parse::<f32, _>(value) {
							Ok(value) if value.is_finite() => value,
							_ => std::f32::NAN,
						};
						column.data.push(value);
					}
					Column::Enum(column) => {
						let value = std::str::from_utf8(value)
							.ok()
							.and_then(|value| enum_lookup.as_ref()?.get(value).copied());
						column.data.push(value);
					}
					Column::Text(column) => {
						let value = std::str::from_utf8(value).map_err(|_| {
							Error::Data(format!("{} contains invalid utf-8", self.path.display()))
						})?;
						column.data.push(value.to_owned())
					}
				}
			}
		}
		if n_rows == 0 {
			Ok(None)
		} else {
			Ok(Some(dataframe))
		}
	}
}

impl Iterator for CsvBlocks {
	type Item = Result<DataFrame>;
	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}
		match self.read_block() {
			Ok(block) => block.map(Ok),
			Err(error) => {
				self.done = true;
				Some(Err(error))
			}
		}
	}
}

pub(crate) fn write_csv_block<W: std::io::Write>(
	writer: &mut csv::Writer<W>,
	dataframe: &DataFrame,
) -> Result<(), csv::Error> {
	let mut record = csv::StringRecord::with_capacity(0, dataframe.ncols());
	for index in 0..dataframe.nrows() {
		record.clear();
		for column in dataframe.columns.iter() {
			record.push_field(&column.format_value(index));
		}
		writer.write_record(&record)?;
	}
	Ok(())
}

#[cfg(test)]
fn write_test_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
	let path = dir.join(name);
	std::fs::write(&path, contents).unwrap();
	path
}

#[test]
fn test_infer() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_test_file(
		dir.path(),
		"infer.csv",
		"number,enum,text,flag,empty\n1,test,hello,0,\n2,test,world,1,\n3,test,again,0,\n",
	);
	let schema = infer_csv_schema(
		&path,
		b',',
		&FromCsvOptions {
			column_types: None,
			infer_options: InferOptions {
				enum_max_unique_values: 2,
			},
		},
	)
	.unwrap();
	insta::assert_debug_snapshot!(schema.columns.iter().map(|column| &column.column_type).collect::<Vec<_>>(), @r###"
	[
	    Number,
	    Enum {
	        options: [
	            "test",
	        ],
	    },
	    Text,
	    Enum {
	        options: [
	            "0",
	            "1",
	        ],
	    },
	    Unknown,
	]
	"###);
}

#[test]
fn test_numbers_beyond_zero_and_one_stay_numbers() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_test_file(dir.path(), "numbers.csv", "count\n0\n1\n2\n");
	let schema = infer_csv_schema(&path, b',', &FromCsvOptions::default()).unwrap();
	assert_eq!(schema.columns[0].column_type, ColumnType::Number);
}

#[test]
fn test_column_types_and_blocks() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_test_file(
		dir.path(),
		"typed.csv",
		"number,text,enum\n1,test,hello\n2,test,world\nx,test,nope\n",
	);
	let mut column_types = BTreeMap::new();
	column_types.insert("text".to_owned(), ColumnType::Text);
	column_types.insert(
		"enum".to_owned(),
		ColumnType::Enum {
			options: vec!["hello".to_owned(), "world".to_owned()],
		},
	);
	let options = FromCsvOptions {
		column_types: Some(column_types),
		infer_options: InferOptions::default(),
	};
	let schema = infer_csv_schema(&path, b',', &options).unwrap();
	let blocks: Vec<DataFrame> = CsvBlocks::new(&path, b',', &schema, 2)
		.unwrap()
		.collect::<Result<_>>()
		.unwrap();
	assert_eq!(blocks.len(), 2);
	assert_eq!(blocks[0].nrows(), 2);
	assert_eq!(blocks[1].nrows(), 1);
	let enum_column = blocks[0].column("enum").unwrap().as_enum().unwrap();
	assert_eq!(enum_column.value(0), Some("hello"));
	assert_eq!(enum_column.value(1), Some("world"));
	let enum_column = blocks[1].column("enum").unwrap().as_enum().unwrap();
	assert_eq!(enum_column.value(0), None);
}

#[test]
fn test_header_mismatch_is_a_data_error() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_test_file(dir.path(), "a.csv", "a,b\n1,2\n");
	let schema = Schema::new(vec![ColumnSchema {
		name: "a".to_owned(),
		column_type: ColumnType::Number,
	}])
	.unwrap();
	assert!(CsvBlocks::new(&path, b',', &schema, 10).err().unwrap().is_data());
}
