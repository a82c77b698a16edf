use std::time::{Duration, Instant};

/// A cancel-and-reschedule timer: fires once per quiet period, however often it was requested.
#[derive(Debug, Clone)]
pub struct Debouncer {
	delay: Duration,
	deadline: Option<Instant>,
}
impl Debouncer {
	#[must_use]
	pub fn new(delay: Duration) -> Self {
		Self { delay, deadline: None }
	}

	#[must_use]
	pub fn delay(&self) -> Duration {
		self.delay
	}

	/// Pushes the deadline back to `now + delay`.
	pub fn schedule(&mut self, now: Instant) {
		self.deadline = Some(now + self.delay);
	}

	pub fn cancel(&mut self) {
		self.deadline = None;
	}

	#[must_use]
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	#[must_use]
	pub fn is_pending(&self) -> bool {
		self.deadline.is_some()
	}

	/// `true` exactly once when the deadline has passed.
	pub fn fire(&mut self, now: Instant) -> bool {
		match self.deadline {
			Some(deadline) if now >= deadline => {
				self.deadline = None;
				true
			}
			_ => false,
		}
	}
}
