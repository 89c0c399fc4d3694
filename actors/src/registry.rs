// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

use std::collections::{HashMap, HashSet};

use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};

use crate::{ActorId, ActorRef};

/// Tracks every live actor of a system.
///
/// Two mappings (by id and by name) sit behind reader-writer locks
/// optimized for the read-mostly lookup traffic. The set of *running*
/// actor ids is guarded by a mutex/condvar pair so external threads can
/// block on quiescence.
#[derive(Default)]
pub struct Registry {
	by_id: RwLock<HashMap<ActorId, ActorRef>>,
	by_name: RwLock<HashMap<String, ActorRef>>,
	running: Mutex<HashSet<ActorId>>,
	running_changed: Condvar,
}

impl Registry {
	/// Publishes the id mapping of a live actor.
	pub fn put(&self, handle: ActorRef) {
		self.by_id.write().insert(handle.id(), handle);
	}

	/// Publishes a name mapping.
	pub fn put_named(&self, name: impl ToString, handle: ActorRef) {
		self.by_name.write().insert(name.to_string(), handle);
	}

	/// Returns a strong handle, or `None` if no such actor exists.
	///
	/// `None` is not a failure: callers treat it as "no such actor".
	pub fn get(&self, actor_id: ActorId) -> Option<ActorRef> {
		self.by_id.read().get(&actor_id).cloned()
	}

	pub fn get_named(&self, name: &str) -> Option<ActorRef> {
		self.by_name.read().get(name).cloned()
	}

	/// Removes the id mapping and drops the id from the running set,
	/// waking quiescence waiters if the set shrank.
	pub fn erase(&self, actor_id: ActorId) {
		// Running set before the id map: every path taking both locks
		// takes them in this order.
		let mut running = self.running.lock();
		self.by_id.write().remove(&actor_id);
		if running.remove(&actor_id) {
			self.running_changed.notify_all();
		}
	}

	pub fn erase_named(&self, name: &str) {
		self.by_name.write().remove(name);
	}

	/// Removes every name pointing at `actor_id`.
	pub(crate) fn erase_names_of(&self, actor_id: ActorId) {
		self.by_name.write().retain(|_, handle| handle.id() != actor_id);
	}

	/// Marks an actor as running and returns the running count.
	///
	/// Must precede the actor's first observable activity.
	pub fn inc_running(&self, actor_id: ActorId) -> usize {
		let mut running = self.running.lock();
		running.insert(actor_id);
		running.len()
	}

	/// Unmarks a running actor, waking quiescence waiters. Returns the
	/// running count.
	pub fn dec_running(&self, actor_id: ActorId) -> usize {
		let mut running = self.running.lock();
		if running.remove(&actor_id) {
			self.running_changed.notify_all();
		}
		running.len()
	}

	pub fn running_count(&self) -> usize {
		self.running.lock().len()
	}

	/// Blocks the calling thread until exactly `expected` actors are
	/// running.
	///
	/// Meant for external threads; pool workers never call it.
	pub fn await_running_count_equal(&self, expected: usize) {
		self.await_running_count_equal_with(expected, |_| {});
	}

	/// Like [`Registry::await_running_count_equal`], additionally invoking
	/// `on_shrink` with the new count each time the running set shrinks.
	///
	/// Used to report progress while a system drains.
	pub fn await_running_count_equal_with(
		&self,
		expected: usize,
		mut on_shrink: impl FnMut(usize),
	) {
		let mut running = self.running.lock();
		let mut last_seen = running.len();
		while running.len() != expected {
			self.running_changed.wait(&mut running);
			let count = running.len();
			if count < last_seen {
				on_shrink(count);
			}
			last_seen = count;
		}
	}

	/// Locks the running set.
	///
	/// Spawn registration and the shutdown snapshot both run under this
	/// lock, so no spawn can complete registration after a shutdown has
	/// taken its liveness snapshot. Holders may take a map lock, never
	/// the other way around.
	pub(crate) fn lock_running(&self) -> MutexGuard<'_, HashSet<ActorId>> {
		self.running.lock()
	}

	/// A consistent point-in-time copy of the name map.
	pub fn named_actors(&self) -> HashMap<String, ActorRef> {
		self.by_name.read().clone()
	}

	/// Strong handles on every registered actor.
	pub(crate) fn live_actors(&self) -> Vec<ActorRef> {
		self.by_id.read().values().cloned().collect()
	}

	pub fn is_empty(&self) -> bool {
		self.by_id.read().is_empty()
	}
}

#[cfg(test)]
mod tests {
	use std::{
		sync::Arc,
		thread,
		time::Duration,
	};

	use super::*;
	use crate::testing::detached_actor;

	#[test]
	fn test_put_get_erase() {
		let registry = Registry::default();
		let actor = detached_actor();
		let actor_id = actor.id();
		registry.put(actor.clone());
		assert_eq!(registry.get(actor_id).unwrap().id(), actor_id);
		assert!(registry.get(crate::ActorId(u64::MAX)).is_none());
		registry.erase(actor_id);
		assert!(registry.get(actor_id).is_none());
		assert!(registry.is_empty());
	}

	#[test]
	fn test_named_lookup_and_snapshot_consistency() {
		let registry = Registry::default();
		let actor = detached_actor();
		registry.put_named("indexer", actor.clone());
		let snapshot = registry.named_actors();
		registry.put_named("janitor", detached_actor());
		assert_eq!(snapshot.len(), 1);
		assert!(snapshot.contains_key("indexer"));
		assert_eq!(registry.named_actors().len(), 2);
		registry.erase_names_of(actor.id());
		assert!(registry.get_named("indexer").is_none());
		assert!(registry.get_named("janitor").is_some());
	}

	#[test]
	fn test_running_counts() {
		let registry = Registry::default();
		let first = detached_actor();
		let second = detached_actor();
		assert_eq!(registry.inc_running(first.id()), 1);
		assert_eq!(registry.inc_running(second.id()), 2);
		assert_eq!(registry.dec_running(first.id()), 1);
		// Unknown ids are ignored.
		assert_eq!(registry.dec_running(first.id()), 1);
		assert_eq!(registry.running_count(), 1);
	}

	#[test]
	fn test_erase_also_shrinks_running_set() {
		let registry = Registry::default();
		let actor = detached_actor();
		registry.put(actor.clone());
		registry.inc_running(actor.id());
		registry.erase(actor.id());
		assert_eq!(registry.running_count(), 0);
	}

	#[test]
	fn test_await_running_count_reports_each_shrink() {
		let registry = Arc::new(Registry::default());
		let actors: Vec<_> = (0..3).map(|_| detached_actor()).collect();
		for actor in &actors {
			registry.inc_running(actor.id());
		}
		let decrementer = {
			let registry = registry.clone();
			let ids: Vec<_> = actors.iter().map(|actor| actor.id()).collect();
			thread::spawn(move || {
				for id in ids {
					thread::sleep(Duration::from_millis(20));
					registry.dec_running(id);
				}
			})
		};
		let mut shrinks = Vec::new();
		registry.await_running_count_equal_with(0, |count| shrinks.push(count));
		decrementer.join().unwrap();
		assert_eq!(registry.running_count(), 0);
		for window in shrinks.windows(2) {
			assert!(window[0] > window[1]);
		}
		assert_eq!(shrinks.last().copied(), Some(0));
	}
}
