// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

use std::{
	fmt,
	sync::atomic::{AtomicU64, Ordering},
};

/// Unique identifier of an actor within one `ActorSystem`.
///
/// Ids are allocated from a monotonically increasing per-system counter and
/// are never reused, so a stale id can never alias a younger actor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub(crate) u64);

impl ActorId {
	pub fn as_u64(self) -> u64 {
		self.0
	}
}

impl fmt::Debug for ActorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ActorId({})", self.0)
	}
}

impl fmt::Display for ActorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Hands out actor ids for a single system.
pub(crate) struct ActorIdGenerator {
	next: AtomicU64,
}

impl Default for ActorIdGenerator {
	fn default() -> Self {
		ActorIdGenerator { next: AtomicU64::new(1) }
	}
}

impl ActorIdGenerator {
	pub(crate) fn next_id(&self) -> ActorId {
		ActorId(self.next.fetch_add(1, Ordering::Relaxed))
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{Arc, Mutex};

	use super::*;

	#[test]
	fn test_ids_are_unique_and_monotonic() {
		let generator = ActorIdGenerator::default();
		let ids: Vec<ActorId> = (0..100).map(|_| generator.next_id()).collect();
		for window in ids.windows(2) {
			assert!(window[0] < window[1]);
		}
	}

	#[test]
	fn test_ids_are_unique_under_concurrency() {
		let generator = Arc::new(ActorIdGenerator::default());
		let all_ids = Arc::new(Mutex::new(Vec::new()));
		let handles: Vec<_> = (0..8)
			.map(|_| {
				let generator = generator.clone();
				let all_ids = all_ids.clone();
				std::thread::spawn(move || {
					let local: Vec<u64> = (0..100).map(|_| generator.next_id().as_u64()).collect();
					all_ids.lock().unwrap().extend(local);
				})
			})
			.collect();
		for handle in handles {
			handle.join().unwrap();
		}
		let ids = all_ids.lock().unwrap();
		let mut seen = std::collections::HashSet::new();
		for &id in ids.iter() {
			assert!(seen.insert(id), "duplicate actor id: {id}");
		}
		assert_eq!(ids.len(), 800);
	}

	#[test]
	fn test_display() {
		assert_eq!(format!("{}", ActorId(42)), "#42");
	}
}
