use scorecard_core::{
	build_formula, compute_roc,
	model::Model,
	partition::{PartitionLabel, PartitionOptions},
	score::ScoreOptions,
	train::{Algorithm, TrainOptions},
	Formula,
};
use scorecard_dataframe::{
	Column, ColumnType, DataFrame, Dataset, Format, FromCsvOptions, InferOptions, OpenOptions,
};
use std::path::Path;

/// Write 100 loans, 30 of which defaulted. Defaulted loans have larger balances.
fn write_loans(dir: &Path) -> Dataset {
	let mut text = String::from("loan_id,balance,income,state,default\n");
	for i in 0..100 {
		let default = i % 10 < 3;
		let balance = 1000 + (i * 37 % 50) * 10 + if default { 400 } else { 0 };
		let income = 50 + i * 13 % 40;
		let state = ["CA", "NY", "TX"][i % 3];
		text.push_str(&format!(
			"{},{},{},{},{}\n",
			i,
			balance,
			income,
			state,
			if default { 1 } else { 0 }
		));
	}
	let path = dir.join("loans.csv");
	std::fs::write(&path, text).unwrap();
	Dataset::open(&path, &OpenOptions::default()).unwrap()
}

fn loans_formula(dataset: &Dataset) -> Formula {
	build_formula(dataset.schema(), "default", &["loan_id".to_owned()]).unwrap()
}

fn train_labels() -> Vec<PartitionLabel> {
	vec![
		PartitionLabel::new("train", 0.75),
		PartitionLabel::new("validate", 0.25),
	]
}

fn number_column<'a>(dataframe: &'a DataFrame, name: &str) -> &'a [f32] {
	&dataframe.column(name).unwrap().as_number().unwrap().data
}

fn loan_ids(dataset: &Dataset) -> Vec<f32> {
	number_column(&dataset.read_all().unwrap(), "loan_id").to_vec()
}

#[test]
fn test_partition_train_score_roc() {
	let dir = tempfile::tempdir().unwrap();
	let loans = write_loans(dir.path());
	let mut options = PartitionOptions::new(train_labels());
	options.seed = Some(42);
	let partitions = scorecard_core::partition(&loans, &options).unwrap();
	let n_train = partitions.n_rows("train").unwrap();
	let n_validate = partitions.n_rows("validate").unwrap();
	assert_eq!(n_train + n_validate, 100);
	assert!((55..=95).contains(&n_train));
	assert_eq!(
		partitions.get("train").unwrap().path(),
		dir.path().join("loans_train.csv")
	);

	let formula = loans_formula(&loans);
	assert_eq!(formula.to_string(), "default ~ balance + income + state");
	let model = scorecard_core::train(
		&formula,
		partitions.get("train").unwrap(),
		Algorithm::LogisticRegression,
		&TrainOptions::new(),
	)
	.unwrap();
	assert_eq!(model.n_training_rows, n_train);

	let score_options = ScoreOptions {
		extra_columns_to_copy: vec!["default".to_owned()],
		prediction_column_names: Some(vec!["pred_default".to_owned()]),
		..Default::default()
	};
	let scored = scorecard_core::score(
		&model,
		partitions.get("validate").unwrap(),
		&dir.path().join("scored.csv"),
		&score_options,
	)
	.unwrap();
	let names: Vec<&str> = scored.schema().names().collect();
	assert_eq!(names, vec!["default", "pred_default"]);
	let dataframe = scored.read_all().unwrap();
	assert_eq!(dataframe.nrows() as u64, n_validate);
	for prediction in number_column(&dataframe, "pred_default") {
		assert!((0.0..=1.0).contains(prediction));
	}

	let roc = compute_roc(&scored, "default", "pred_default", None, 10).unwrap();
	let first = roc.points.first().unwrap();
	let last = roc.points.last().unwrap();
	assert_eq!((first.false_positive_rate, first.true_positive_rate), (0.0, 0.0));
	assert_eq!((last.false_positive_rate, last.true_positive_rate), (1.0, 1.0));
	for window in roc.points.windows(2) {
		assert!(window[0].false_positive_rate <= window[1].false_positive_rate);
		assert!(window[0].true_positive_rate <= window[1].true_positive_rate);
	}
	assert!(roc.auc > 0.5);
}

#[test]
fn test_partitions_are_disjoint_and_exhaustive() {
	let dir = tempfile::tempdir().unwrap();
	let loans = write_loans(dir.path());
	let mut options = PartitionOptions::new(vec![
		PartitionLabel::new("a", 0.5),
		PartitionLabel::new("b", 0.3),
		PartitionLabel::new("c", 0.2),
	]);
	options.seed = Some(7);
	options.block_size = 9;
	options.format = Some(Format::Columnar);
	let partitions = scorecard_core::partition(&loans, &options).unwrap();
	let mut ids: Vec<f32> = partitions
		.partitions
		.iter()
		.flat_map(|partition| {
			assert_eq!(partition.dataset.schema(), loans.schema());
			loan_ids(&partition.dataset)
		})
		.collect();
	ids.sort_by(|a, b| a.partial_cmp(b).unwrap());
	let expected: Vec<f32> = (0..100).map(|i| i as f32).collect();
	assert_eq!(ids, expected);
}

#[test]
fn test_partition_is_deterministic_given_a_seed() {
	let dir = tempfile::tempdir().unwrap();
	let loans = write_loans(dir.path());
	let mut assignments = Vec::new();
	for run in 0..2 {
		let output_dir = dir.path().join(format!("run_{}", run));
		std::fs::create_dir(&output_dir).unwrap();
		let mut options = PartitionOptions::new(train_labels());
		options.seed = Some(1234);
		options.output_dir = Some(output_dir);
		let partitions = scorecard_core::partition(&loans, &options).unwrap();
		assert_eq!(partitions.seed, 1234);
		assignments.push((
			loan_ids(partitions.get("train").unwrap()),
			loan_ids(partitions.get("validate").unwrap()),
		));
	}
	assert_eq!(assignments[0], assignments[1]);
}

#[test]
fn test_partition_fraction_converges() {
	let dir = tempfile::tempdir().unwrap();
	let loans = write_loans(dir.path());
	let mut n_train = 0;
	for seed in 0..20 {
		let mut options = PartitionOptions::new(train_labels());
		options.seed = Some(seed);
		n_train += scorecard_core::partition(&loans, &options)
			.unwrap()
			.n_rows("train")
			.unwrap();
	}
	let fraction = n_train as f64 / 2000.0;
	assert!((fraction - 0.75).abs() < 0.05, "train fraction {}", fraction);
}

#[test]
fn test_partition_rejects_bad_probabilities() {
	let dir = tempfile::tempdir().unwrap();
	let loans = write_loans(dir.path());
	let options = PartitionOptions::new(vec![
		PartitionLabel::new("a", 0.5),
		PartitionLabel::new("b", 0.3),
		PartitionLabel::new("c", 0.1),
	]);
	let error = scorecard_core::partition(&loans, &options).unwrap_err();
	assert!(error.is_configuration());
	assert!(!dir.path().join("loans_a.csv").exists());
}

#[test]
fn test_score_fails_before_predicting_when_a_feature_is_missing() {
	let dir = tempfile::tempdir().unwrap();
	let loans = write_loans(dir.path());
	let model = scorecard_core::train(
		&loans_formula(&loans),
		&loans,
		Algorithm::DecisionTree,
		&TrainOptions::new(),
	)
	.unwrap();
	let path = dir.path().join("without_income.csv");
	std::fs::write(&path, "loan_id,balance,state,default\n1,1200,CA,0\n").unwrap();
	let dataset = Dataset::open(&path, &OpenOptions::default()).unwrap();
	let output = dir.path().join("scored.csv");
	let error =
		scorecard_core::score(&model, &dataset, &output, &ScoreOptions::default()).unwrap_err();
	assert!(error.is_data());
	assert!(error.to_string().contains("\"income\""));
	assert!(!output.exists());
}

#[test]
fn test_class_probabilities_sum_to_one() {
	let dir = tempfile::tempdir().unwrap();
	let loans = write_loans(dir.path());
	let formula = loans_formula(&loans);
	for algorithm in [
		Algorithm::LogisticRegression,
		Algorithm::DecisionTree,
		Algorithm::RandomForest,
		Algorithm::GradientBoostedTrees,
	]
	.iter()
	{
		let model =
			scorecard_core::train(&formula, &loans, *algorithm, &TrainOptions::new()).unwrap();
		assert_eq!(model.default_prediction_names(), vec!["0_prob", "1_prob"]);
		let scored = scorecard_core::score(
			&model,
			&loans,
			&dir.path().join(format!("{}.scf", algorithm)),
			&ScoreOptions::default(),
		)
		.unwrap();
		assert_eq!(scored.format(), Format::Columnar);
		let dataframe = scored.read_all().unwrap();
		for (current, default) in number_column(&dataframe, "0_prob")
			.iter()
			.zip(number_column(&dataframe, "1_prob"))
		{
			assert!(
				(current + default - 1.0).abs() <= 1e-6,
				"{} probabilities sum to {}",
				algorithm,
				current + default
			);
		}
	}
}

#[test]
fn test_multiclass_trees() {
	let dir = tempfile::tempdir().unwrap();
	let loans = write_loans(dir.path());
	let formula: Formula = "state ~ balance + income + default".parse().unwrap();
	for algorithm in [
		Algorithm::DecisionTree,
		Algorithm::RandomForest,
		Algorithm::GradientBoostedTrees,
	]
	.iter()
	{
		let model =
			scorecard_core::train(&formula, &loans, *algorithm, &TrainOptions::new()).unwrap();
		let scored = scorecard_core::score(
			&model,
			&loans,
			&dir.path().join("states.csv"),
			&ScoreOptions::default(),
		)
		.unwrap();
		let dataframe = scored.read_all().unwrap();
		let ca = number_column(&dataframe, "CA_prob");
		let ny = number_column(&dataframe, "NY_prob");
		let tx = number_column(&dataframe, "TX_prob");
		for i in 0..dataframe.nrows() {
			assert!((ca[i] + ny[i] + tx[i] - 1.0).abs() <= 1e-5);
		}
	}
	let error = scorecard_core::train(
		&formula,
		&loans,
		Algorithm::LogisticRegression,
		&TrainOptions::new(),
	)
	.unwrap_err();
	assert!(error.is_data());
}

#[test]
fn test_regression_with_every_algorithm() {
	let dir = tempfile::tempdir().unwrap();
	let loans = write_loans(dir.path());
	let formula = build_formula(loans.schema(), "balance", &["loan_id".to_owned()]).unwrap();
	for algorithm in Algorithm::ALL.iter() {
		let result = scorecard_core::train(&formula, &loans, *algorithm, &TrainOptions::new());
		if *algorithm == Algorithm::LogisticRegression {
			assert!(result.unwrap_err().is_data());
			continue;
		}
		let model = result.unwrap();
		assert_eq!(model.default_prediction_names(), vec!["balance_pred"]);
		let scored = scorecard_core::score(
			&model,
			&loans,
			&dir.path().join("balance.csv"),
			&ScoreOptions {
				write_input_columns: true,
				..Default::default()
			},
		)
		.unwrap();
		assert_eq!(scored.schema().len(), loans.schema().len() + 1);
		let dataframe = scored.read_all().unwrap();
		assert_eq!(dataframe.nrows(), 100);
		assert!(number_column(&dataframe, "balance_pred")
			.iter()
			.all(|value| value.is_finite()));
	}
}

#[test]
fn test_train_rejects_bad_requests() {
	let dir = tempfile::tempdir().unwrap();
	let loans = write_loans(dir.path());
	let formula = loans_formula(&loans);
	let unknown_option: TrainOptions = vec![("n_trees".to_owned(), serde_json::json!(5))]
		.into_iter()
		.collect();
	let error = scorecard_core::train(
		&formula,
		&loans,
		Algorithm::GradientBoostedTrees,
		&unknown_option,
	)
	.unwrap_err();
	assert!(error.is_configuration());
	let missing: Formula = "default ~ balance + credit_score".parse().unwrap();
	let error =
		scorecard_core::train(&missing, &loans, Algorithm::DecisionTree, &TrainOptions::new())
			.unwrap_err();
	assert!(error.is_data());
	let error = scorecard_core::train(
		&formula,
		&loans,
		Algorithm::LinearRegression,
		&TrainOptions::new(),
	)
	.unwrap_err();
	assert!(error.is_data());
	let leaky = Formula::new(
		"default".to_owned(),
		vec!["balance".to_owned(), "default".to_owned()],
	);
	let error = scorecard_core::train(&leaky, &loans, Algorithm::DecisionTree, &TrainOptions::new())
		.unwrap_err();
	assert!(error.is_configuration());
}

#[test]
fn test_score_flag_inferred_as_number() {
	let dir = tempfile::tempdir().unwrap();
	let mut text = String::from("balance,flag,default\n");
	for i in 0..40 {
		text.push_str(&format!("{},{},{}\n", 1000 + i * 10, i % 2, if i % 4 == 0 { 1 } else { 0 }));
	}
	let train_path = dir.path().join("train.csv");
	std::fs::write(&train_path, text).unwrap();
	let train = Dataset::open(&train_path, &OpenOptions::default()).unwrap();
	assert!(matches!(
		train.schema().get("flag").unwrap().column_type,
		ColumnType::Enum { .. }
	));
	let model = scorecard_core::train(
		&"default ~ balance + flag".parse::<Formula>().unwrap(),
		&train,
		Algorithm::DecisionTree,
		&TrainOptions::new(),
	)
	.unwrap();
	// `flag` only takes one value here, or a value never seen in training, so it is inferred as a number column.
	let score_path = dir.path().join("score.csv");
	std::fs::write(&score_path, "balance,flag\n1010,0\n1200,0\n1300,2\n").unwrap();
	let to_score = Dataset::open(&score_path, &OpenOptions::default()).unwrap();
	assert_eq!(
		to_score.schema().get("flag").unwrap().column_type,
		ColumnType::Number
	);
	let scored = scorecard_core::score(
		&model,
		&to_score,
		&dir.path().join("scored.csv"),
		&ScoreOptions::default(),
	)
	.unwrap();
	let dataframe = scored.read_all().unwrap();
	let probabilities = number_column(&dataframe, "1_prob");
	assert_eq!(probabilities.len(), 3);
	assert!(probabilities.iter().all(|p| p.is_finite() && (0.0..=1.0).contains(p)));
}

#[test]
fn test_rows_with_invalid_response_are_dropped() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("partial.csv");
	std::fs::write(&path, "x,y\n1,2\n2,\n3,6\n4,8\n5,n/a\n").unwrap();
	let dataset = Dataset::open(&path, &OpenOptions::default()).unwrap();
	let formula: Formula = "y ~ x".parse().unwrap();
	let model =
		scorecard_core::train(&formula, &dataset, Algorithm::DecisionTree, &TrainOptions::new())
			.unwrap();
	assert_eq!(model.n_training_rows, 3);
	let path = dir.path().join("empty.csv");
	std::fs::write(&path, "x,y\n1,\n2,\n").unwrap();
	let options = OpenOptions {
		csv: FromCsvOptions {
			column_types: Some(
				vec![("y".to_owned(), ColumnType::Number)]
					.into_iter()
					.collect(),
			),
			..Default::default()
		},
		..Default::default()
	};
	let dataset = Dataset::open(&path, &options).unwrap();
	let error =
		scorecard_core::train(&formula, &dataset, Algorithm::DecisionTree, &TrainOptions::new())
			.unwrap_err();
	assert!(error.is_data());
}

#[test]
fn test_model_round_trip() {
	let dir = tempfile::tempdir().unwrap();
	let loans = write_loans(dir.path());
	let formula = loans_formula(&loans);
	let options: TrainOptions = vec![("max_rounds".to_owned(), serde_json::json!(20))]
		.into_iter()
		.collect();
	let model =
		scorecard_core::train(&formula, &loans, Algorithm::GradientBoostedTrees, &options).unwrap();
	let path = dir.path().join("model.scm");
	model.to_path(&path).unwrap();
	let loaded = Model::from_path(&path).unwrap();
	assert_eq!(loaded.id, model.id);
	assert_eq!(loaded.algorithm, Algorithm::GradientBoostedTrees);
	assert_eq!(loaded.formula, formula);
	assert_eq!(loaded.options, options);
	let dataframe = loans.read_all().unwrap();
	let mappings = model.column_mappings(loans.schema()).unwrap();
	assert_eq!(
		model.predict(&dataframe, &mappings).unwrap(),
		loaded.predict(&dataframe, &mappings).unwrap()
	);
}

#[test]
fn test_score_across_formats_and_column_types() {
	let dir = tempfile::tempdir().unwrap();
	let loans = write_loans(dir.path());
	let columnar = loans
		.convert(&dir.path().join("loans.scf"), Format::Columnar, 16)
		.unwrap();
	let model = scorecard_core::train(
		&loans_formula(&columnar),
		&columnar,
		Algorithm::RandomForest,
		&TrainOptions::new(),
	)
	.unwrap();
	// Reading the text file with a low enum threshold makes `state` a text column.
	let text_options = OpenOptions {
		csv: FromCsvOptions {
			infer_options: InferOptions {
				enum_max_unique_values: 2,
			},
			..Default::default()
		},
		..Default::default()
	};
	let text_loans = Dataset::open(loans.path(), &text_options).unwrap();
	assert_eq!(
		text_loans.schema().get("state").unwrap().column_type,
		ColumnType::Text
	);
	let mut predictions = Vec::new();
	for (dataset, output) in [
		(&columnar, "from_scf.csv"),
		(&loans, "from_csv.scf"),
		(&text_loans, "from_text.csv"),
	]
	.iter()
	{
		let scored = scorecard_core::score(
			&model,
			dataset,
			&dir.path().join(output),
			&ScoreOptions::default(),
		)
		.unwrap();
		let dataframe = scored.read_all().unwrap();
		predictions.push(number_column(&dataframe, "1_prob").to_vec());
	}
	assert_eq!(predictions[0], predictions[1]);
	assert_eq!(predictions[0], predictions[2]);
}

#[test]
fn test_score_in_place() {
	let dir = tempfile::tempdir().unwrap();
	let loans = write_loans(dir.path());
	let model = scorecard_core::train(
		&loans_formula(&loans),
		&loans,
		Algorithm::DecisionTree,
		&TrainOptions::new(),
	)
	.unwrap();
	let scored = scorecard_core::score(
		&model,
		&loans,
		loans.path(),
		&ScoreOptions {
			write_input_columns: true,
			block_size: 7,
			..Default::default()
		},
	)
	.unwrap();
	let reopened = Dataset::open(loans.path(), &OpenOptions::default()).unwrap();
	assert_eq!(reopened.n_rows().unwrap(), 100);
	assert!(reopened.schema().contains("1_prob"));
	assert_eq!(scored.schema().len(), 7);
}

#[test]
fn test_tag() {
	let dir = tempfile::tempdir().unwrap();
	let loans = write_loans(dir.path());
	let (tagged, counts) =
		scorecard_core::tag(&loans, &train_labels(), Some(3), "partition", 13).unwrap();
	assert_eq!(counts.iter().sum::<u64>(), 100);
	assert_eq!(tagged.path(), loans.path());
	let reopened = Dataset::open(loans.path(), &OpenOptions::default()).unwrap();
	assert_eq!(
		reopened.schema().get("partition").unwrap().column_type,
		ColumnType::Enum {
			options: vec!["train".to_owned(), "validate".to_owned()]
		}
	);
	let dataframe = reopened.read_all().unwrap();
	match dataframe.column("partition").unwrap() {
		Column::Enum(column) => assert!(column.data.iter().all(|value| value.is_some())),
		column => panic!("expected an enum column, got {:?}", column.column_type()),
	}
	let error =
		scorecard_core::tag(&tagged, &train_labels(), Some(3), "partition", 13).unwrap_err();
	assert!(error.is_data());
}
