/*!
This module implements the columnar binary format used for `.scf` files. A file starts with the four magic bytes `SCF1` and is followed by frames. Each frame is a little endian `u64` byte length followed by that many bytes of MessagePack. The first frame holds the [`Schema`](../struct.Schema.html), each following frame holds one block of rows stored column by column, and a frame of length zero marks the end of the file. Column names and enum options are stored once in the schema, so blocks only carry values.
*/

use super::*;
use scorecard_util::{data_err, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

pub const MAGIC: &[u8; 4] = b"SCF1";

#[derive(Serialize, Deserialize)]
enum ColumnData {
	Unknown(usize),
	Number(Vec<f32>),
	Enum(Vec<Option<NonZeroUsize>>),
	Text(Vec<String>),
}

pub struct ColumnarWriter<W: Write> {
	writer: W,
}

impl<W: Write> ColumnarWriter<W> {
	pub fn new(mut writer: W, schema: &Schema) -> Result<Self> {
		writer.write_all(MAGIC)?;
		let mut columnar_writer = Self { writer };
		let schema = rmp_serde::to_vec_named(schema)
			.map_err(|error| data_err!("failed to encode schema: {}", error))?;
		columnar_writer.write_frame(&schema)?;
		Ok(columnar_writer)
	}

	pub fn write(&mut self, dataframe: &DataFrame) -> Result<()> {
		if dataframe.nrows() == 0 {
			return Ok(());
		}
		let block: Vec<ColumnData> = dataframe
			.columns
			.iter()
			.map(|column| match column {
				Column::Unknown(column) => ColumnData::Unknown(column.len),
				Column::Number(column) => ColumnData::Number(column.data.clone()),
				Column::Enum(column) => ColumnData::Enum(column.data.clone()),
				Column::Text(column) => ColumnData::Text(column.data.clone()),
			})
			.collect();
		let block = rmp_serde::to_vec(&block)
			.map_err(|error| data_err!("failed to encode block: {}", error))?;
		self.write_frame(&block)
	}

	/// Write the end of file marker and return the inner writer.
	pub fn finish(mut self) -> Result<W> {
		self.writer.write_all(&0u64.to_le_bytes())?;
		self.writer.flush()?;
		Ok(self.writer)
	}

	fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
		self.writer.write_all(&(bytes.len() as u64).to_le_bytes())?;
		self.writer.write_all(bytes)?;
		Ok(())
	}
}

fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
	let mut len = [0u8; 8];
	reader.read_exact(&mut len).map_err(|error| {
		if error.kind() == std::io::ErrorKind::UnexpectedEof {
			data_err!("the file is truncated")
		} else {
			error.into()
		}
	})?;
	let len = u64::from_le_bytes(len);
	if len == 0 {
		return Ok(None);
	}
	// The length comes from the file, so the buffer grows with the bytes actually read.
	let mut bytes = Vec::new();
	reader.by_ref().take(len).read_to_end(&mut bytes)?;
	if (bytes.len() as u64) < len {
		return Err(data_err!("the file is truncated"));
	}
	Ok(Some(bytes))
}

/// Read the magic bytes and the schema frame, leaving `reader` positioned at the first block.
pub fn read_schema<R: Read>(reader: &mut R) -> Result<Schema> {
	let mut magic = [0u8; 4];
	reader
		.read_exact(&mut magic)
		.map_err(|_| data_err!("not a columnar dataset"))?;
	if &magic != MAGIC {
		return Err(data_err!("not a columnar dataset"));
	}
	let schema = read_frame(reader)?.ok_or_else(|| data_err!("the schema is missing"))?;
	rmp_serde::from_slice(&schema).map_err(|error| data_err!("failed to decode schema: {}", error))
}

/// `ColumnarBlocks` yields the blocks of a columnar file in the order they were written.
pub struct ColumnarBlocks<R: Read> {
	reader: R,
	schema: Schema,
	done: bool,
}

impl<R: Read> ColumnarBlocks<R> {
	pub fn new(mut reader: R) -> Result<Self> {
		let schema = read_schema(&mut reader)?;
		Ok(Self {
			reader,
			schema,
			done: false,
		})
	}

	pub fn schema(&self) -> &Schema {
		&self.schema
	}

	fn read_block(&mut self) -> Result<Option<DataFrame>> {
		let bytes = match read_frame(&mut self.reader)? {
			Some(bytes) => bytes,
			None => return Ok(None),
		};
		let block: Vec<ColumnData> = rmp_serde::from_slice(&bytes)
			.map_err(|error| data_err!("failed to decode block: {}", error))?;
		if block.len() != self.schema.len() {
			return Err(data_err!("a block does not match the schema"));
		}
		let columns = self
			.schema
			.columns
			.iter()
			.zip(block.into_iter())
			.map(|(column, data)| {
				let name = column.name.clone();
				let column = match (&column.column_type, data) {
					(ColumnType::Unknown, ColumnData::Unknown(len)) => {
						Column::Unknown(UnknownColumn { name, len })
					}
					(ColumnType::Number, ColumnData::Number(data)) => {
						Column::Number(NumberColumn { name, data })
					}
					(ColumnType::Enum { options }, ColumnData::Enum(data)) => {
						if data
							.iter()
							.flatten()
							.any(|value| value.get() > options.len())
						{
							return Err(data_err!("column {:?} has an out of range value", name));
						}
						Column::Enum(EnumColumn {
							name,
							options: options.clone(),
							data,
						})
					}
					(ColumnType::Text, ColumnData::Text(data)) => {
						Column::Text(TextColumn { name, data })
					}
					_ => return Err(data_err!("column {:?} does not match the schema", name)),
				};
				Ok(column)
			})
			.collect::<Result<Vec<_>>>()?;
		let dataframe = DataFrame { columns };
		if dataframe.columns.iter().any(|column| column.len() != dataframe.nrows()) {
			return Err(data_err!("a block has columns of different lengths"));
		}
		Ok(Some(dataframe))
	}
}

impl<R: Read> Iterator for ColumnarBlocks<R> {
	type Item = Result<DataFrame>;
	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}
		let result = self.read_block();
		match result {
			Ok(Some(block)) => Some(Ok(block)),
			Ok(None) => {
				self.done = true;
				None
			}
			Err(error) => {
				self.done = true;
				Some(Err(error))
			}
		}
	}
}

#[cfg(test)]
fn test_block() -> DataFrame {
	DataFrame {
		columns: vec![
			Column::Number(NumberColumn {
				name: "balance".to_owned(),
				data: vec![1.0, std::f32::NAN],
			}),
			Column::Enum(EnumColumn {
				name: "default".to_owned(),
				options: vec!["0".to_owned(), "1".to_owned()],
				data: vec![None, NonZeroUsize::new(2)],
			}),
		],
	}
}

#[test]
fn test_blocks_come_back_in_order() {
	let block = test_block();
	let mut writer = ColumnarWriter::new(Vec::new(), &block.schema()).unwrap();
	writer.write(&block).unwrap();
	writer.write(&block.take_rows(&[1])).unwrap();
	let bytes = writer.finish().unwrap();
	let blocks = ColumnarBlocks::new(std::io::Cursor::new(bytes)).unwrap();
	assert_eq!(blocks.schema(), &block.schema());
	let blocks: Vec<DataFrame> = blocks.collect::<Result<_>>().unwrap();
	assert_eq!(blocks.len(), 2);
	assert_eq!(blocks[1].nrows(), 1);
	let balance = blocks[0].column("balance").unwrap().as_number().unwrap();
	assert_eq!(balance.data[0], 1.0);
	assert!(balance.data[1].is_nan());
	assert_eq!(blocks[1].column("default").unwrap().as_enum().unwrap().value(0), Some("1"));
}

#[test]
fn test_truncated_file_is_a_data_error() {
	let block = test_block();
	let mut writer = ColumnarWriter::new(Vec::new(), &block.schema()).unwrap();
	writer.write(&block).unwrap();
	let mut bytes = writer.finish().unwrap();
	// Drop the end of file marker.
	bytes.truncate(bytes.len() - 8);
	let results: Vec<Result<DataFrame>> = ColumnarBlocks::new(std::io::Cursor::new(bytes))
		.unwrap()
		.collect();
	assert_eq!(results.len(), 2);
	assert!(results[0].is_ok());
	assert!(results[1].as_ref().err().unwrap().is_data());
}

#[test]
fn test_not_columnar() {
	let error = read_schema(&mut std::io::Cursor::new(b"a,b\n1,2\n".to_vec())).unwrap_err();
	assert!(error.is_data());
}

#[test]
fn test_oversized_frame_length_is_a_data_error() {
	let mut bytes = MAGIC.to_vec();
	bytes.extend_from_slice(&(u64::MAX / 2).to_le_bytes());
	bytes.extend_from_slice(&[0x90; 16]);
	let error = read_schema(&mut std::io::Cursor::new(bytes)).unwrap_err();
	assert!(error.is_data());
}
