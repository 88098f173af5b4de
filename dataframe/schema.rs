use scorecard_util::{data_err, Result};
use serde::{Deserialize, Serialize};

/// A `Schema` is the ordered list of column names and types of a dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schema {
	pub columns: Vec<ColumnSchema>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
	pub name: String,
	pub column_type: ColumnType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ColumnType {
	#[serde(rename = "unknown")]
	Unknown,
	#[serde(rename = "number")]
	Number,
	#[serde(rename = "enum")]
	Enum { options: Vec<String> },
	#[serde(rename = "text")]
	Text,
}

impl Schema {
	/// Create a schema, checking that no two columns share a name.
	pub fn new(columns: Vec<ColumnSchema>) -> Result<Self> {
		for (index, column) in columns.iter().enumerate() {
			if columns[..index].iter().any(|other| other.name == column.name) {
				return Err(data_err!("duplicate column name {:?}", column.name));
			}
		}
		Ok(Self { columns })
	}

	pub fn len(&self) -> usize {
		self.columns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.columns.is_empty()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.columns.iter().map(|column| column.name.as_str())
	}

	pub fn get(&self, name: &str) -> Option<&ColumnSchema> {
		self.columns.iter().find(|column| column.name == name)
	}

	pub fn position(&self, name: &str) -> Option<usize> {
		self.columns.iter().position(|column| column.name == name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.get(name).is_some()
	}
}

impl ColumnType {
	pub fn is_number(&self) -> bool {
		matches!(self, ColumnType::Number)
	}

	pub fn options(&self) -> Option<&[String]> {
		match self {
			ColumnType::Enum { options } => Some(options),
			_ => None,
		}
	}
}

impl std::fmt::Display for ColumnType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ColumnType::Unknown => write!(f, "unknown"),
			ColumnType::Number => write!(f, "number"),
			ColumnType::Enum { options } => write!(f, "enum ({} options)", options.len()),
			ColumnType::Text => write!(f, "text"),
		}
	}
}

#[test]
fn test_duplicate_names() {
	let column = ColumnSchema {
		name: "a".to_owned(),
		column_type: ColumnType::Number,
	};
	let error = Schema::new(vec![column.clone(), column]).unwrap_err();
	assert!(error.is_data());
}

#[test]
fn test_column_type_config_syntax() {
	let column_type: ColumnType =
		serde_json::from_str(r#"{"type": "enum", "options": ["no", "yes"]}"#).unwrap();
	assert_eq!(
		column_type,
		ColumnType::Enum {
			options: vec!["no".to_owned(), "yes".to_owned()]
		}
	);
}
