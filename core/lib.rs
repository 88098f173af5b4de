/*!
This crate implements the modeling pipeline of `scorecard`. A dataset is split into labeled partitions with [`partition`](partition/fn.partition.html), a [`Formula`](formula/struct.Formula.html) naming the response and feature columns is built with [`build_formula`](formula/fn.build_formula.html), a [`Model`](model/struct.Model.html) is fit with [`train`](train/fn.train.html) using one of the algorithms in [`Algorithm`](train/enum.Algorithm.html), the model is applied to new data with [`score`](score/fn.score.html), and the scored data is evaluated with [`compute_roc`](evaluate/fn.compute_roc.html).

Every operation takes the datasets it reads explicitly and writes its outputs through [`DatasetWriter`](../scorecard_dataframe/struct.DatasetWriter.html), so a failed write never leaves a partially written file in place.
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod config;
pub mod evaluate;
pub mod features;
pub mod formula;
pub mod id;
pub mod model;
pub mod partition;
pub mod score;
pub mod summary;
pub mod train;

pub use self::evaluate::{compute_roc, compute_roc_curves};
pub use self::formula::{build_formula, Formula};
pub use self::model::Model;
pub use self::partition::{partition, tag};
pub use self::score::score;
pub use self::summary::summarize;
pub use self::train::train;
