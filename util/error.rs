/*!
Every operation in `scorecard` fails with one of three kinds of error. A `Configuration` error means the caller asked for something that does not make sense, such as partition probabilities that do not sum to one or an option an algorithm does not understand. A `Data` error means the data itself does not fit the request, such as a formula that names a column the dataset does not have. An `Io` error means a file could not be read or written.
*/

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("configuration error: {0}")]
	Configuration(String),
	#[error("data error: {0}")]
	Data(String),
	#[error("io error{}: {source}", .path.as_ref().map(|path| format!(" at {}", path.display())).unwrap_or_default())]
	Io {
		path: Option<PathBuf>,
		#[source]
		source: std::io::Error,
	},
}

impl Error {
	pub fn io(path: &Path, source: std::io::Error) -> Self {
		Error::Io {
			path: Some(path.to_owned()),
			source,
		}
	}

	pub fn is_configuration(&self) -> bool {
		matches!(self, Error::Configuration(_))
	}

	pub fn is_data(&self) -> bool {
		matches!(self, Error::Data(_))
	}

	pub fn is_io(&self) -> bool {
		matches!(self, Error::Io { .. })
	}
}

impl From<std::io::Error> for Error {
	fn from(source: std::io::Error) -> Self {
		Error::Io { path: None, source }
	}
}

/// Attach a path to an io error so the message says which file failed.
pub trait IoResultExt<T> {
	fn at_path(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
	fn at_path(self, path: &Path) -> Result<T> {
		self.map_err(|source| Error::io(path, source))
	}
}

/// Create an `Error::Configuration` with a formatted message.
#[macro_export]
macro_rules! config_err {
	($($arg:tt)*) => {
		$crate::error::Error::Configuration(format!($($arg)*))
	};
}

/// Create an `Error::Data` with a formatted message.
#[macro_export]
macro_rules! data_err {
	($($arg:tt)*) => {
		$crate::error::Error::Data(format!($($arg)*))
	};
}

#[test]
fn test_io_error_message_includes_path() {
	let error = Error::io(
		Path::new("/tmp/missing.csv"),
		std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
	);
	assert!(error.is_io());
	assert_eq!(error.to_string(), "io error at /tmp/missing.csv: not found");
}

#[test]
fn test_macros() {
	let error = config_err!("duplicate label {}", "train");
	assert!(error.is_configuration());
	assert_eq!(error.to_string(), "configuration error: duplicate label train");
	let error = data_err!("column {:?} not found", "x");
	assert!(error.is_data());
}
