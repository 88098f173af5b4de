use super::*;
use crate::columnar::{ColumnarBlocks, ColumnarWriter};
use scorecard_util::{
	config_err, data_err,
	error::{Error, IoResultExt},
	progress_counter::ProgressCounter,
	Result,
};
use serde::{Deserialize, Serialize};
use std::{
	fs::File,
	io::{BufReader, BufWriter},
	path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

pub const DEFAULT_BLOCK_SIZE: usize = 65_536;

/// The physical storage format of a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Format {
	/// Delimited text with a header row.
	Csv { delimiter: u8 },
	/// The binary format described in [`columnar`](columnar/index.html).
	Columnar,
}

impl Format {
	/// Choose a format from the extension of `path`.
	pub fn from_path(path: &Path) -> Result<Format> {
		let extension = path
			.extension()
			.and_then(|extension| extension.to_str())
			.map(|extension| extension.to_ascii_lowercase());
		match extension.as_deref() {
			Some("csv") | Some("txt") => Ok(Format::Csv { delimiter: b',' }),
			Some("tsv") => Ok(Format::Csv { delimiter: b'\t' }),
			Some("scf") => Ok(Format::Columnar),
			_ => Err(config_err!(
				"cannot determine the format of {} from its extension",
				path.display()
			)),
		}
	}

	pub fn extension(&self) -> &'static str {
		match self {
			Format::Csv { delimiter: b'\t' } => "tsv",
			Format::Csv { .. } => "csv",
			Format::Columnar => "scf",
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct OpenOptions {
	/// If `None`, the format is chosen from the file extension.
	pub format: Option<Format>,
	/// These options are used when reading delimited text and are ignored for columnar files, which store their schema.
	pub csv: FromCsvOptions,
}

/**
A `Dataset` is a handle to a file on disk together with its schema. Opening a dataset does not load its rows. Call [`blocks`](#method.blocks) to stream them.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
	path: PathBuf,
	format: Format,
	schema: Schema,
}

impl Dataset {
	/// Open the dataset at `path`. For delimited text this determines the schema, which may require a pass over the file. For columnar files the schema is read from the header.
	pub fn open(path: &Path, options: &OpenOptions) -> Result<Dataset> {
		let format = match options.format {
			Some(format) => format,
			None => Format::from_path(path)?,
		};
		let schema = match format {
			Format::Csv { delimiter } => infer_csv_schema(path, delimiter, &options.csv)?,
			Format::Columnar => {
				let file = File::open(path).at_path(path)?;
				columnar::read_schema(&mut BufReader::new(file)).map_err(|error| match error {
					Error::Data(message) => data_err!("{}: {}", path.display(), message),
					error => error,
				})?
			}
		};
		log::debug!("opened {} with {} columns", path.display(), schema.len());
		Ok(Dataset {
			path: path.to_owned(),
			format,
			schema,
		})
	}

	/// Create a handle for a file whose schema is already known, without reading it.
	pub fn open_with_schema(path: &Path, format: Format, schema: Schema) -> Dataset {
		Dataset {
			path: path.to_owned(),
			format,
			schema,
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn format(&self) -> Format {
		self.format
	}

	pub fn schema(&self) -> &Schema {
		&self.schema
	}

	/// Stream the rows of this dataset in blocks. Delimited text is read `block_size` rows at a time. Columnar files yield the blocks they were written with. Each call starts again from the first row.
	pub fn blocks(&self, block_size: usize) -> Result<Blocks> {
		let inner = match self.format {
			Format::Csv { delimiter } => BlocksInner::Csv(CsvBlocks::new(
				&self.path,
				delimiter,
				&self.schema,
				block_size,
			)?),
			Format::Columnar => {
				let file = File::open(&self.path).at_path(&self.path)?;
				let blocks = ColumnarBlocks::new(BufReader::new(file))?;
				if blocks.schema() != &self.schema {
					return Err(data_err!(
						"the schema of {} has changed since it was opened",
						self.path.display()
					));
				}
				BlocksInner::Columnar(blocks)
			}
		};
		Ok(Blocks {
			inner,
			progress_counter: ProgressCounter::new(0),
		})
	}

	/// Read every row into a single dataframe.
	pub fn read_all(&self) -> Result<DataFrame> {
		let mut dataframe = DataFrame::from_schema(&self.schema);
		for block in self.blocks(DEFAULT_BLOCK_SIZE)? {
			dataframe.append(block?);
		}
		Ok(dataframe)
	}

	/// Count the rows by streaming the dataset.
	pub fn n_rows(&self) -> Result<usize> {
		let mut n_rows = 0;
		for block in self.blocks(DEFAULT_BLOCK_SIZE)? {
			n_rows += block?.nrows();
		}
		Ok(n_rows)
	}

	/// Stream this dataset into a new file at `path` with the given format.
	pub fn convert(&self, path: &Path, format: Format, block_size: usize) -> Result<Dataset> {
		let mut writer = DatasetWriter::create(path, format, self.schema.clone())?;
		for block in self.blocks(block_size)? {
			writer.write(&block?)?;
		}
		writer.finish()
	}
}

/// `Blocks` is the lazy sequence of dataframes returned by [`Dataset::blocks`](struct.Dataset.html#method.blocks).
pub struct Blocks {
	inner: BlocksInner,
	progress_counter: ProgressCounter,
}

enum BlocksInner {
	Csv(CsvBlocks),
	Columnar(ColumnarBlocks<BufReader<File>>),
}

impl Blocks {
	/// Retrieve a counter of the rows read so far.
	pub fn progress_counter(&self) -> ProgressCounter {
		self.progress_counter.clone()
	}
}

impl Iterator for Blocks {
	type Item = Result<DataFrame>;
	fn next(&mut self) -> Option<Self::Item> {
		let block = match &mut self.inner {
			BlocksInner::Csv(blocks) => blocks.next(),
			BlocksInner::Columnar(blocks) => blocks.next(),
		};
		if let Some(Ok(block)) = &block {
			self.progress_counter.inc(block.nrows() as u64);
		}
		block
	}
}

/**
A `DatasetWriter` writes blocks to a temporary file next to its destination. Calling [`finish`](#method.finish) flushes the temporary file and renames it over the destination in one step. If the writer is dropped before `finish` or any write fails, the temporary file is deleted and whatever was at the destination before is left as it was. This makes it safe for an operation to read a dataset and write its result to the same path.
*/
pub struct DatasetWriter {
	path: PathBuf,
	format: Format,
	schema: Schema,
	inner: WriterInner,
	n_rows: u64,
}

enum WriterInner {
	Csv(csv::Writer<NamedTempFile>),
	Columnar(ColumnarWriter<BufWriter<NamedTempFile>>),
}

impl DatasetWriter {
	pub fn create(path: &Path, format: Format, schema: Schema) -> Result<DatasetWriter> {
		let dir = match path.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent.to_owned(),
			_ => PathBuf::from("."),
		};
		let temp_file = NamedTempFile::new_in(&dir).at_path(&dir)?;
		let inner = match format {
			Format::Csv { delimiter } => {
				let mut writer = csv::WriterBuilder::new()
					.delimiter(delimiter)
					.from_writer(temp_file);
				writer
					.write_record(schema.names())
					.map_err(|error| csv_error(path, error))?;
				WriterInner::Csv(writer)
			}
			Format::Columnar => {
				WriterInner::Columnar(ColumnarWriter::new(BufWriter::new(temp_file), &schema)?)
			}
		};
		Ok(DatasetWriter {
			path: path.to_owned(),
			format,
			schema,
			inner,
			n_rows: 0,
		})
	}

	pub fn schema(&self) -> &Schema {
		&self.schema
	}

	/// Append the rows of `dataframe`, whose columns must match the schema this writer was created with.
	pub fn write(&mut self, dataframe: &DataFrame) -> Result<()> {
		let matches_schema = dataframe.ncols() == self.schema.len()
			&& dataframe
				.columns
				.iter()
				.zip(self.schema.columns.iter())
				.all(|(column, schema)| {
					column.name() == schema.name && column.column_type() == schema.column_type
				});
		if !matches_schema {
			return Err(data_err!(
				"a block written to {} does not match its schema",
				self.path.display()
			));
		}
		match &mut self.inner {
			WriterInner::Csv(writer) => {
				write_csv_block(writer, dataframe).map_err(|error| csv_error(&self.path, error))?
			}
			WriterInner::Columnar(writer) => writer.write(dataframe)?,
		}
		self.n_rows += dataframe.nrows() as u64;
		Ok(())
	}

	/// Replace the destination with everything written so far and return a handle to it.
	pub fn finish(self) -> Result<Dataset> {
		let path = self.path;
		let temp_file = match self.inner {
			WriterInner::Csv(writer) => writer.into_inner().map_err(|error| {
				let error = error.error();
				Error::io(&path, std::io::Error::new(error.kind(), error.to_string()))
			})?,
			WriterInner::Columnar(writer) => writer
				.finish()?
				.into_inner()
				.map_err(|error| Error::io(&path, error.into_error()))?,
		};
		temp_file.as_file().sync_all().at_path(&path)?;
		temp_file
			.persist(&path)
			.map_err(|error| Error::io(&path, error.error))?;
		log::debug!("wrote {} rows to {}", self.n_rows, path.display());
		Ok(Dataset {
			path,
			format: self.format,
			schema: self.schema,
		})
	}
}

#[cfg(test)]
fn test_schema() -> Schema {
	Schema::new(vec![
		ColumnSchema {
			name: "balance".to_owned(),
			column_type: ColumnType::Number,
		},
		ColumnSchema {
			name: "default".to_owned(),
			column_type: ColumnType::Enum {
				options: vec!["0".to_owned(), "1".to_owned()],
			},
		},
	])
	.unwrap()
}

#[cfg(test)]
fn test_rows(n: usize) -> DataFrame {
	let mut dataframe = DataFrame::from_schema(&test_schema());
	for i in 0..n {
		if let Column::Number(column) = &mut dataframe.columns[0] {
			column.data.push(i as f32);
		}
		if let Column::Enum(column) = &mut dataframe.columns[1] {
			column.data.push(std::num::NonZeroUsize::new(i % 2 + 1));
		}
	}
	dataframe
}

#[test]
fn test_format_from_path() {
	assert_eq!(
		Format::from_path(Path::new("a/mortgage.csv")).unwrap(),
		Format::Csv { delimiter: b',' }
	);
	assert_eq!(
		Format::from_path(Path::new("mortgage.SCF")).unwrap(),
		Format::Columnar
	);
	assert!(Format::from_path(Path::new("mortgage.parquet"))
		.unwrap_err()
		.is_configuration());
}

#[test]
fn test_write_and_stream_both_formats() {
	let dir = tempfile::tempdir().unwrap();
	for format in &[Format::Csv { delimiter: b',' }, Format::Columnar] {
		let path = dir.path().join(format!("rows.{}", format.extension()));
		let mut writer = DatasetWriter::create(&path, *format, test_schema()).unwrap();
		writer.write(&test_rows(5)).unwrap();
		writer.write(&test_rows(3)).unwrap();
		let dataset = writer.finish().unwrap();
		assert_eq!(dataset.n_rows().unwrap(), 8);
		let reopened = Dataset::open(&path, &OpenOptions::default()).unwrap();
		assert_eq!(reopened.schema(), &test_schema());
		let all = reopened.read_all().unwrap();
		assert_eq!(all.nrows(), 8);
		assert_eq!(
			all.column("balance").unwrap().as_number().unwrap().data[6],
			1.0
		);
		// Restarting the stream yields the same rows.
		let mut blocks = reopened.blocks(3).unwrap();
		let first = blocks.next().unwrap().unwrap();
		assert!(first.nrows() > 0);
		assert_eq!(blocks.progress_counter().get(), first.nrows() as u64);
		assert_eq!(reopened.blocks(3).unwrap().next().unwrap().unwrap(), first);
	}
}

#[test]
fn test_dropped_writer_leaves_destination_untouched() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("rows.csv");
	let mut writer =
		DatasetWriter::create(&path, Format::Csv { delimiter: b',' }, test_schema()).unwrap();
	writer.write(&test_rows(4)).unwrap();
	writer.finish().unwrap();
	let before = std::fs::read(&path).unwrap();
	let mut writer =
		DatasetWriter::create(&path, Format::Csv { delimiter: b',' }, test_schema()).unwrap();
	writer.write(&test_rows(2)).unwrap();
	drop(writer);
	assert_eq!(std::fs::read(&path).unwrap(), before);
	assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_schema_mismatch_is_rejected() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("rows.scf");
	let mut writer = DatasetWriter::create(&path, Format::Columnar, test_schema()).unwrap();
	let wrong = test_rows(2).take_rows(&[0]);
	let wrong = DataFrame {
		columns: wrong.columns.into_iter().take(1).collect(),
	};
	assert!(writer.write(&wrong).unwrap_err().is_data());
}

#[test]
fn test_convert_and_rewrite_in_place() {
	let dir = tempfile::tempdir().unwrap();
	let csv_path = dir.path().join("rows.csv");
	let mut writer =
		DatasetWriter::create(&csv_path, Format::Csv { delimiter: b',' }, test_schema())
			.unwrap();
	writer.write(&test_rows(10)).unwrap();
	let dataset = writer.finish().unwrap();
	let columnar = dataset
		.convert(&dir.path().join("rows.scf"), Format::Columnar, 4)
		.unwrap();
	assert_eq!(columnar.read_all().unwrap(), dataset.read_all().unwrap());
	// Reading and writing the same path.
	let mut writer =
		DatasetWriter::create(dataset.path(), dataset.format(), test_schema()).unwrap();
	for block in dataset.blocks(3).unwrap() {
		let block = block.unwrap();
		let balance = &block.column("balance").unwrap().as_number().unwrap().data;
		let evens: Vec<usize> = (0..block.nrows())
			.filter(|i| balance[*i] as usize % 2 == 0)
			.collect();
		writer.write(&block.take_rows(&evens)).unwrap();
	}
	let rewritten = writer.finish().unwrap();
	assert_eq!(rewritten.n_rows().unwrap(), 5);
}
