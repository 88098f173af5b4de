/*!
This crate is an implementation of linear machine learning models for regression and binary classification. There are two model types, [`Regressor`](struct.Regressor.html) and [`BinaryClassifier`](struct.BinaryClassifier.html). `BinaryClassifier` uses the sigmoid activation function.

Both models are trained with mini-batch stochastic gradient descent. The change in loss on a held out early stopping split is monitored after each epoch, and training terminates when the loss has stabilized.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod binary_classifier;
mod early_stopping;
mod regressor;

pub use self::binary_classifier::BinaryClassifier;
pub use self::regressor::Regressor;
use scorecard_util::progress_counter::ProgressCounter;

/// These are the options passed to `Regressor::train` and `BinaryClassifier::train`.
#[derive(Clone, Debug)]
pub struct TrainOptions {
	/// Specify options for early stopping. If the value is `Some`, early stopping will be enabled. If it is `None`, early stopping will be disabled.
	pub early_stopping_options: Option<EarlyStoppingOptions>,
	/// This is the L2 regularization value to use when updating the model parameters.
	pub l2_regularization: f32,
	/// This is the learning rate to use when updating the model parameters.
	pub learning_rate: f32,
	/// This is the maximum number of epochs to train.
	pub max_epochs: usize,
	/// This is the number of examples to use for each batch of training.
	pub n_examples_per_batch: usize,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			l2_regularization: 0.0,
			learning_rate: 0.1,
			max_epochs: 100,
			n_examples_per_batch: 128,
			early_stopping_options: Some(EarlyStoppingOptions::default()),
		}
	}
}

/// The parameters in this struct control how to determine whether training should stop early after each epoch.
#[derive(Clone, Debug)]
pub struct EarlyStoppingOptions {
	/// This is the fraction of the dataset that is set aside to compute the early stopping metric.
	pub early_stopping_fraction: f32,
	/// If this many epochs pass by without a significant improvement in the early stopping metric over the previous epoch, training will be stopped early.
	pub n_epochs_without_improvement_to_stop: usize,
	/// This is the minimum descrease in the early stopping metric for an epoch to be considered a significant improvement over the previous epoch.
	pub min_decrease_in_loss_for_significant_change: f32,
}

impl Default for EarlyStoppingOptions {
	fn default() -> Self {
		Self {
			early_stopping_fraction: 0.1,
			n_epochs_without_improvement_to_stop: 3,
			min_decrease_in_loss_for_significant_change: 1e-3,
		}
	}
}

/// This is the training progress, which tracks the current epoch.
#[derive(Debug)]
pub struct TrainProgress(pub ProgressCounter);
