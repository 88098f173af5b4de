use num_traits::ToPrimitive;
use serde::Serialize;

/// A point on the receiver operating characteristic curve.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RocCurvePoint {
	/// The classification threshold. Examples with a score >= threshold are predicted positive.
	pub threshold: f32,
	/// The true positive rate for all predictions with score >= threshold.
	pub true_positive_rate: f32,
	/// The false positive rate for all predictions with score >= threshold.
	pub false_positive_rate: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RocCurve {
	/// The points of the curve ordered by descending threshold, from (0, 0) to (1, 1).
	pub points: Vec<RocCurvePoint>,
	/// The area under the curve.
	pub auc: f32,
}

impl RocCurve {
	/// Compute the ROC curve and its area for `scores` and `labels`, where `true` marks a positive example. This returns `None` if there are no positive or no negative examples, because the curve is undefined.
	pub fn compute(scores: &[f32], labels: &[bool]) -> Option<RocCurve> {
		let points = compute_roc_curve(scores, labels)?;
		let auc = auc_roc_from_curve(&points);
		Some(RocCurve { points, auc })
	}
}

/// This function computes the area under the receiver operating characteristic curve using the trapezoid method.
pub fn auc_roc(scores: &[f32], labels: &[bool]) -> Option<f32> {
	compute_roc_curve(scores, labels).map(|roc_curve| auc_roc_from_curve(&roc_curve))
}

fn auc_roc_from_curve(roc_curve: &[RocCurvePoint]) -> f32 {
	roc_curve
		.windows(2)
		.map(|window| {
			let left = &window[0];
			let right = &window[1];
			let y_average = (left.true_positive_rate + right.true_positive_rate) / 2.0;
			let dx = right.false_positive_rate - left.false_positive_rate;
			y_average * dx
		})
		.sum()
}

/// This function computes the ROC curve. The ROC curve plots the false positive rate on the x axis and the true positive rate on the y axis for various classification thresholds.
pub fn compute_roc_curve(scores: &[f32], labels: &[bool]) -> Option<Vec<RocCurvePoint>> {
	let mut tps_fps = compute_tps_fps_by_threshold(scores, labels);
	for i in 1..tps_fps.len() {
		tps_fps[i].true_positives += tps_fps[i - 1].true_positives;
		tps_fps[i].false_positives += tps_fps[i - 1].false_positives;
	}
	let count_positives = labels.iter().filter(|label| **label).count();
	let count_negatives = labels.len() - count_positives;
	if count_positives == 0 || count_negatives == 0 {
		return None;
	}
	let count_positives = count_positives.to_f32().unwrap();
	let count_negatives = count_negatives.to_f32().unwrap();
	// Add a point at (0,0) on the roc curve with a threshold above every score.
	let mut roc_curve = vec![RocCurvePoint {
		threshold: std::f32::INFINITY,
		true_positive_rate: 0.0,
		false_positive_rate: 0.0,
	}];
	for tps_fps_point in tps_fps.iter() {
		roc_curve.push(RocCurvePoint {
			threshold: tps_fps_point.threshold,
			true_positive_rate: tps_fps_point.true_positives.to_f32().unwrap() / count_positives,
			false_positive_rate: tps_fps_point.false_positives.to_f32().unwrap() / count_negatives,
		})
	}
	Some(roc_curve)
}

#[derive(Debug)]
struct TpsFpsPoint {
	/// The classification threshold.
	threshold: f32,
	/// The true positives for this threshold.
	true_positives: usize,
	/// The false positives for this threshold.
	false_positives: usize,
}

/**
This function computes the counts of true positives and false positives at each classification threshold. Unlike the roc curve, each point contains just the count of true positives and false positives at this threshold instead of all values greater than or equal to this threshold.
*/
fn compute_tps_fps_by_threshold(scores: &[f32], labels: &[bool]) -> Vec<TpsFpsPoint> {
	let mut scores_labels: Vec<(f32, bool)> = scores
		.iter()
		.zip(labels.iter())
		.map(|(a, b)| (*a, *b))
		.collect();
	scores_labels.sort_by(|a, b| b.0.total_cmp(&a.0));
	let mut tps_fps: Vec<TpsFpsPoint> = Vec::new();
	for (score, label) in scores_labels.iter() {
		let tp = if *label { 1 } else { 0 };
		match tps_fps.last_mut() {
			// If the score is the same as the last one, add to the previous bucket.
			Some(last_point) if last_point.threshold == *score => {
				last_point.true_positives += tp;
				last_point.false_positives += 1 - tp;
			}
			_ => {
				tps_fps.push(TpsFpsPoint {
					threshold: *score,
					true_positives: tp,
					false_positives: 1 - tp,
				});
			}
		}
	}
	tps_fps
}

#[test]
fn test_roc_curve() {
	let labels = vec![true, true, false, false];
	let scores = vec![0.9, 0.4, 0.4, 0.2];
	let left = compute_roc_curve(scores.as_slice(), labels.as_slice()).unwrap();
	let right = vec![
		RocCurvePoint {
			threshold: std::f32::INFINITY,
			true_positive_rate: 0.0,
			false_positive_rate: 0.0,
		},
		RocCurvePoint {
			threshold: 0.9,
			true_positive_rate: 0.5,
			false_positive_rate: 0.0,
		},
		RocCurvePoint {
			threshold: 0.4,
			true_positive_rate: 1.0,
			false_positive_rate: 0.5,
		},
		RocCurvePoint {
			threshold: 0.2,
			true_positive_rate: 1.0,
			false_positive_rate: 1.0,
		},
	];
	assert_eq!(left, right);
	let auc = auc_roc(scores.as_slice(), labels.as_slice()).unwrap();
	assert!(f32::abs(auc - 0.875) < f32::EPSILON)
}

#[test]
fn test_roc_curve_undefined_for_one_class() {
	assert!(RocCurve::compute(&[0.1, 0.8], &[true, true]).is_none());
	assert!(RocCurve::compute(&[], &[]).is_none());
}

#[test]
fn test_perfect_and_inverted_scores() {
	let labels = [false, false, true, true];
	let perfect = RocCurve::compute(&[0.1, 0.2, 0.8, 0.9], &labels).unwrap();
	assert!((perfect.auc - 1.0).abs() < 1e-6);
	let inverted = RocCurve::compute(&[0.9, 0.8, 0.2, 0.1], &labels).unwrap();
	assert!(inverted.auc.abs() < 1e-6);
	for curve in &[perfect, inverted] {
		for window in curve.points.windows(2) {
			assert!(window[1].true_positive_rate >= window[0].true_positive_rate);
			assert!(window[1].false_positive_rate >= window[0].false_positive_rate);
		}
	}
}
