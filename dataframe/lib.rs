/*!
This crate provides the data layer of `scorecard`. A [`DataFrame`](struct.DataFrame.html) is one in-memory block of rows stored column by column, where each column can have a different type, like a spreadsheet. A [`Dataset`](struct.Dataset.html) is a handle to a file on disk, either delimited text or the columnar binary format defined in [`columnar`](columnar/index.html), that is read as a lazy sequence of `DataFrame` blocks so datasets larger than memory can be processed. Datasets are written with a [`DatasetWriter`](struct.DatasetWriter.html), which stages its output and replaces the destination only when writing succeeds.
*/

#![allow(clippy::tabs_in_doc_comments)]

use std::num::NonZeroUsize;

pub mod columnar;
mod dataset;
mod load;
mod schema;

pub use self::dataset::*;
pub use self::load::*;
pub use self::schema::*;

#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
	pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
	Unknown(UnknownColumn),
	Number(NumberColumn),
	Enum(EnumColumn),
	Text(TextColumn),
}

/// An `UnknownColumn` holds no values. It is the type of a column in which every value was invalid.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownColumn {
	pub name: String,
	pub len: usize,
}

/// Invalid values in a `NumberColumn` are stored as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberColumn {
	pub name: String,
	pub data: Vec<f32>,
}

/// Each value in an `EnumColumn` is a 1-based index into `options`, or `None` if the value was invalid or not one of the options.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumColumn {
	pub name: String,
	pub options: Vec<String>,
	pub data: Vec<Option<NonZeroUsize>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextColumn {
	pub name: String,
	pub data: Vec<String>,
}

impl DataFrame {
	pub fn new(column_names: Vec<String>, column_types: Vec<ColumnType>) -> Self {
		let columns = column_names
			.into_iter()
			.zip(column_types.into_iter())
			.map(|(column_name, column_type)| Column::new(column_name, column_type))
			.collect();
		Self { columns }
	}

	/// Create an empty dataframe whose columns match `schema`.
	pub fn from_schema(schema: &Schema) -> Self {
		let columns = schema
			.columns
			.iter()
			.map(|column| Column::new(column.name.clone(), column.column_type.clone()))
			.collect();
		Self { columns }
	}

	pub fn schema(&self) -> Schema {
		Schema {
			columns: self
				.columns
				.iter()
				.map(|column| ColumnSchema {
					name: column.name().to_owned(),
					column_type: column.column_type(),
				})
				.collect(),
		}
	}

	pub fn ncols(&self) -> usize {
		self.columns.len()
	}

	pub fn nrows(&self) -> usize {
		self.columns.first().map(|column| column.len()).unwrap_or(0)
	}

	pub fn column(&self, name: &str) -> Option<&Column> {
		self.columns.iter().find(|column| column.name() == name)
	}

	/// Copy the rows at `indexes`, in the order given, into a new dataframe with the same columns.
	pub fn take_rows(&self, indexes: &[usize]) -> DataFrame {
		DataFrame {
			columns: self
				.columns
				.iter()
				.map(|column| column.take_rows(indexes))
				.collect(),
		}
	}

	/// Append the rows of `other`, which must have the same columns as `self`.
	pub fn append(&mut self, other: DataFrame) {
		for (column, other) in self.columns.iter_mut().zip(other.columns.into_iter()) {
			column.append(other);
		}
	}
}

impl Column {
	pub fn new(name: String, column_type: ColumnType) -> Self {
		match column_type {
			ColumnType::Unknown => Column::Unknown(UnknownColumn::new(name)),
			ColumnType::Number => Column::Number(NumberColumn::new(name)),
			ColumnType::Enum { options } => Column::Enum(EnumColumn::new(name, options)),
			ColumnType::Text => Column::Text(TextColumn::new(name)),
		}
	}

	pub fn len(&self) -> usize {
		match self {
			Self::Unknown(s) => s.len,
			Self::Number(s) => s.data.len(),
			Self::Enum(s) => s.data.len(),
			Self::Text(s) => s.data.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn name(&self) -> &str {
		match self {
			Self::Unknown(s) => s.name.as_str(),
			Self::Number(s) => s.name.as_str(),
			Self::Enum(s) => s.name.as_str(),
			Self::Text(s) => s.name.as_str(),
		}
	}

	pub fn column_type(&self) -> ColumnType {
		match self {
			Self::Unknown(_) => ColumnType::Unknown,
			Self::Number(_) => ColumnType::Number,
			Self::Enum(s) => ColumnType::Enum {
				options: s.options.clone(),
			},
			Self::Text(_) => ColumnType::Text,
		}
	}

	pub fn as_number(&self) -> Option<&NumberColumn> {
		match self {
			Self::Number(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_enum(&self) -> Option<&EnumColumn> {
		match self {
			Self::Enum(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_text(&self) -> Option<&TextColumn> {
		match self {
			Self::Text(s) => Some(s),
			_ => None,
		}
	}

	pub fn take_rows(&self, indexes: &[usize]) -> Column {
		match self {
			Self::Unknown(column) => Column::Unknown(UnknownColumn {
				name: column.name.clone(),
				len: indexes.len(),
			}),
			Self::Number(column) => Column::Number(NumberColumn {
				name: column.name.clone(),
				data: indexes.iter().map(|index| column.data[*index]).collect(),
			}),
			Self::Enum(column) => Column::Enum(EnumColumn {
				name: column.name.clone(),
				options: column.options.clone(),
				data: indexes.iter().map(|index| column.data[*index]).collect(),
			}),
			Self::Text(column) => Column::Text(TextColumn {
				name: column.name.clone(),
				data: indexes
					.iter()
					.map(|index| column.data[*index].clone())
					.collect(),
			}),
		}
	}

	fn append(&mut self, other: Column) {
		match (self, other) {
			(Self::Unknown(column), Self::Unknown(other)) => column.len += other.len,
			(Self::Number(column), Self::Number(other)) => column.data.extend(other.data),
			(Self::Enum(column), Self::Enum(other)) => column.data.extend(other.data),
			(Self::Text(column), Self::Text(other)) => column.data.extend(other.data),
			_ => unreachable!("appended columns must have the same type"),
		}
	}

	/// Render the value at `index` the way it is written to delimited text. Invalid values render as the empty string.
	pub fn format_value(&self, index: usize) -> String {
		match self {
			Self::Unknown(_) => String::new(),
			Self::Number(column) => {
				let value = column.data[index];
				if value.is_finite() {
					value.to_string()
				} else {
					String::new()
				}
			}
			Self::Enum(column) => column.data[index]
				.map(|value| column.options[value.get() - 1].clone())
				.unwrap_or_default(),
			Self::Text(column) => column.data[index].clone(),
		}
	}
}

impl UnknownColumn {
	pub fn new(name: String) -> Self {
		Self { name, len: 0 }
	}
}

impl NumberColumn {
	pub fn new(name: String) -> Self {
		Self {
			name,
			data: Vec::new(),
		}
	}
}

impl EnumColumn {
	pub fn new(name: String, options: Vec<String>) -> Self {
		Self {
			name,
			options,
			data: Vec::new(),
		}
	}

	/// Look up the 1-based index of `value` in this column's options.
	pub fn option_index(&self, value: &str) -> Option<NonZeroUsize> {
		self.options
			.iter()
			.position(|option| option == value)
			.map(|position| NonZeroUsize::new(position + 1).unwrap())
	}

	/// Retrieve the option string for the value at `index`, if it is valid.
	pub fn value(&self, index: usize) -> Option<&str> {
		self.data[index].map(|value| self.options[value.get() - 1].as_str())
	}
}

impl TextColumn {
	pub fn new(name: String) -> Self {
		Self {
			name,
			data: Vec::new(),
		}
	}
}

#[cfg(test)]
fn test_dataframe() -> DataFrame {
	DataFrame {
		columns: vec![
			Column::Number(NumberColumn {
				name: "balance".to_owned(),
				data: vec![1.5, std::f32::NAN, 3.0],
			}),
			Column::Enum(EnumColumn {
				name: "default".to_owned(),
				options: vec!["0".to_owned(), "1".to_owned()],
				data: vec![NonZeroUsize::new(1), None, NonZeroUsize::new(2)],
			}),
			Column::Text(TextColumn {
				name: "note".to_owned(),
				data: vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
			}),
		],
	}
}

#[test]
fn test_take_rows() {
	let dataframe = test_dataframe();
	let taken = dataframe.take_rows(&[2, 0]);
	assert_eq!(taken.nrows(), 2);
	assert_eq!(taken.column("balance").unwrap().as_number().unwrap().data, vec![3.0, 1.5]);
	assert_eq!(taken.column("default").unwrap().as_enum().unwrap().value(0), Some("1"));
	assert_eq!(taken.column("note").unwrap().as_text().unwrap().data, vec!["c", "a"]);
	assert_eq!(taken.schema(), dataframe.schema());
}

#[test]
fn test_append_and_format() {
	let mut dataframe = test_dataframe();
	dataframe.append(test_dataframe());
	assert_eq!(dataframe.nrows(), 6);
	let balance = dataframe.column("balance").unwrap();
	assert_eq!(balance.format_value(0), "1.5");
	assert_eq!(balance.format_value(1), "");
	assert_eq!(balance.format_value(2), "3");
	let default = dataframe.column("default").unwrap();
	assert_eq!(default.format_value(4), "");
	assert_eq!(default.format_value(5), "1");
}
