/*!
This crate contains the pieces shared by every other `scorecard` crate: the error type that all fallible operations return, and a small counter used to report progress from long running loops.
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod error;
pub mod progress_counter;

pub use self::error::{Error, Result};
