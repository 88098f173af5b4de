/*!
A [`Formula`](struct.Formula.html) names the response column a model predicts and the feature columns it predicts from. It is written `response ~ feature_a + feature_b`.
*/

use scorecard_dataframe::Schema;
use scorecard_util::{config_err, data_err, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
	pub response: String,
	pub features: Vec<String>,
}

impl Formula {
	pub fn new(response: String, features: Vec<String>) -> Self {
		Self { response, features }
	}

	/// Check that the response is not also a feature, that no feature is repeated, and that the response and every feature are columns of `schema`. The error names the first missing column.
	pub fn validate(&self, schema: &Schema) -> Result<()> {
		self.check_terms()?;
		for name in std::iter::once(&self.response).chain(self.features.iter()) {
			if !schema.contains(name) {
				return Err(data_err!("column {:?} is not in the dataset", name));
			}
		}
		Ok(())
	}

	fn check_terms(&self) -> Result<()> {
		for (index, feature) in self.features.iter().enumerate() {
			if *feature == self.response {
				return Err(config_err!("formula \"{}\" uses its response as a feature", self));
			}
			if self.features[..index].contains(feature) {
				return Err(config_err!("formula \"{}\" repeats the feature {:?}", self, feature));
			}
		}
		Ok(())
	}

	/// The response followed by the features.
	pub fn column_names(&self) -> impl Iterator<Item = &str> {
		std::iter::once(self.response.as_str())
			.chain(self.features.iter().map(|name| name.as_str()))
	}
}

/**
Build a formula whose features are every column of `schema` other than `response` and the columns named in `exclude`, in schema order. Names in `exclude` are matched exactly, so excluding `year` does not exclude `years_employed`.
*/
pub fn build_formula(schema: &Schema, response: &str, exclude: &[String]) -> Result<Formula> {
	if !schema.contains(response) {
		return Err(data_err!("response column {:?} is not in the dataset", response));
	}
	let exclude: BTreeSet<&str> = exclude.iter().map(|name| name.as_str()).collect();
	for name in exclude.iter() {
		if !schema.contains(name) {
			log::warn!("excluded column {:?} is not in the dataset", name);
		}
	}
	let features = schema
		.names()
		.filter(|name| *name != response && !exclude.contains(name))
		.map(|name| name.to_owned())
		.collect();
	Ok(Formula {
		response: response.to_owned(),
		features,
	})
}

impl std::fmt::Display for Formula {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} ~", self.response)?;
		for (index, feature) in self.features.iter().enumerate() {
			if index == 0 {
				write!(f, " {}", feature)?;
			} else {
				write!(f, " + {}", feature)?;
			}
		}
		Ok(())
	}
}

impl std::str::FromStr for Formula {
	type Err = scorecard_util::Error;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut sides = s.splitn(2, '~');
		let response = sides.next().unwrap_or_default().trim();
		let features = sides
			.next()
			.ok_or_else(|| config_err!("formula {:?} is missing a \"~\"", s))?;
		if response.is_empty() {
			return Err(config_err!("formula {:?} has no response", s));
		}
		if features.contains('~') {
			return Err(config_err!("formula {:?} has more than one \"~\"", s));
		}
		let features = features.trim();
		let features: Vec<String> = if features.is_empty() {
			Vec::new()
		} else {
			features
				.split('+')
				.map(|feature| {
					let feature = feature.trim();
					if feature.is_empty() {
						Err(config_err!("formula {:?} has an empty term", s))
					} else {
						Ok(feature.to_owned())
					}
				})
				.collect::<Result<_>>()?
		};
		let formula = Formula {
			response: response.to_owned(),
			features,
		};
		formula.check_terms()?;
		Ok(formula)
	}
}

#[cfg(test)]
fn test_schema(names: &[&str]) -> Schema {
	use scorecard_dataframe::{ColumnSchema, ColumnType};
	Schema::new(
		names
			.iter()
			.map(|name| ColumnSchema {
				name: (*name).to_owned(),
				column_type: ColumnType::Number,
			})
			.collect(),
	)
	.unwrap()
}

#[test]
fn test_build_formula() {
	let schema = test_schema(&["a", "b", "c", "default"]);
	let formula = build_formula(&schema, "default", &[]).unwrap();
	assert_eq!(formula.features, vec!["a", "b", "c"]);
	let formula = build_formula(&schema, "default", &["a".to_owned()]).unwrap();
	assert_eq!(formula.features, vec!["b", "c"]);
	let error = build_formula(&schema, "x", &[]).unwrap_err();
	assert!(error.is_data());
}

#[test]
fn test_exclusion_is_exact() {
	let schema = test_schema(&["year", "years_employed", "default", "default_flag"]);
	let formula = build_formula(
		&schema,
		"default",
		&["year".to_owned(), "not_a_column".to_owned()],
	)
	.unwrap();
	assert_eq!(formula.features, vec!["years_employed", "default_flag"]);
}

#[test]
fn test_display_and_parse() {
	let formula = Formula::new(
		"default".to_owned(),
		vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
	);
	assert_eq!(formula.to_string(), "default ~ a + b + c");
	assert_eq!("default ~ a + b + c".parse::<Formula>().unwrap(), formula);
	assert_eq!("default~a+b+c".parse::<Formula>().unwrap(), formula);
	let empty: Formula = "default ~".parse().unwrap();
	assert!(empty.features.is_empty());
	assert_eq!(empty.to_string(), "default ~");
	assert!("default".parse::<Formula>().unwrap_err().is_configuration());
	assert!(" ~ a".parse::<Formula>().unwrap_err().is_configuration());
	assert!("default ~ a + + b".parse::<Formula>().is_err());
	assert!("default ~ a + a".parse::<Formula>().unwrap_err().is_configuration());
	assert!("default ~ default".parse::<Formula>().unwrap_err().is_configuration());
}

#[test]
fn test_validate_names_missing_column() {
	let schema = test_schema(&["a", "default"]);
	let formula: Formula = "default ~ a + b".parse().unwrap();
	let error = formula.validate(&schema).unwrap_err();
	assert!(error.is_data());
	assert!(error.to_string().contains("\"b\""));
}

#[test]
fn test_validate_rejects_response_as_feature_and_repeats() {
	let schema = test_schema(&["a", "b", "default"]);
	let formula = Formula::new("default".to_owned(), vec!["a".to_owned(), "default".to_owned()]);
	assert!(formula.validate(&schema).unwrap_err().is_configuration());
	let formula = Formula::new(
		"default".to_owned(),
		vec!["a".to_owned(), "b".to_owned(), "a".to_owned()],
	);
	assert!(formula.validate(&schema).unwrap_err().is_configuration());
	let formula = Formula::new("default".to_owned(), vec!["b".to_owned(), "a".to_owned()]);
	assert!(formula.validate(&schema).is_ok());
}
