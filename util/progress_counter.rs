use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};

/**
A `ProgressCounter` tracks how far a long running loop has gotten, such as the number of rows streamed out of a dataset or the number of boosting rounds trained. Clones share the same underlying counter, so a caller can hold one clone and poll it while the loop holding the other clone advances it.
*/
#[derive(Clone, Debug)]
pub struct ProgressCounter {
	current: Arc<AtomicU64>,
	total: u64,
}

impl ProgressCounter {
	pub fn new(total: u64) -> Self {
		Self {
			current: Arc::new(AtomicU64::new(0)),
			total,
		}
	}
	pub fn total(&self) -> u64 {
		self.total
	}
	pub fn get(&self) -> u64 {
		self.current.load(Ordering::Relaxed)
	}
	pub fn set(&self, value: u64) {
		self.current.store(value, Ordering::Relaxed);
	}
	pub fn inc(&self, amount: u64) {
		self.current.fetch_add(amount, Ordering::Relaxed);
	}
}

#[test]
fn test_clones_share_progress() {
	let counter = ProgressCounter::new(10);
	let clone = counter.clone();
	clone.inc(3);
	counter.inc(2);
	assert_eq!(counter.get(), 5);
	assert_eq!(clone.total(), 10);
	clone.set(10);
	assert_eq!(counter.get(), 10);
}
