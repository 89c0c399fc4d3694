// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

use std::{
	fmt,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use tracing::{debug, info};

use crate::{
	actor_id::ActorIdGenerator,
	behavior::{Behavior, UnhandledPolicy},
	command::{DownMessage, ExitMessage},
	mailbox::QueueCapacity,
	observer::{EventObserver, NoopObserver},
	registry::Registry,
	scheduler::SchedulerClient,
	spawn_builder::{SpawnBuilder, SpawnError},
	ActorId, ActorRef, ExitReason, Message, MessageId, DEFAULT_EXECUTION_QUANTUM,
	DEFAULT_WORKER_COUNT,
};

/// Tuning knobs of an [`ActorSystem`].
#[derive(Clone)]
pub struct SystemConfig {
	/// Number of pool workers. Defaults to `ACTORS_WORKER_THREADS` if set,
	/// otherwise the number of logical cpus.
	pub worker_count: usize,
	/// Envelopes handed to an actor per dispatch before it is requeued.
	pub execution_quantum: usize,
	/// System-wide default applied when a behavior reports a message as
	/// unhandled; overridable per actor at spawn.
	pub unhandled_message_policy: UnhandledPolicy,
	/// Optional cap on every actor's normal lane.
	pub max_mailbox_size: Option<usize>,
	/// Hook sink for runtime events.
	pub observer: Arc<dyn EventObserver>,
}

impl Default for SystemConfig {
	fn default() -> SystemConfig {
		SystemConfig {
			worker_count: *DEFAULT_WORKER_COUNT,
			execution_quantum: DEFAULT_EXECUTION_QUANTUM,
			unhandled_message_policy: UnhandledPolicy::default(),
			max_mailbox_size: None,
			observer: Arc::new(NoopObserver),
		}
	}
}

impl fmt::Debug for SystemConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SystemConfig")
			.field("worker_count", &self.worker_count)
			.field("execution_quantum", &self.execution_quantum)
			.field("unhandled_message_policy", &self.unhandled_message_policy)
			.field("max_mailbox_size", &self.max_mailbox_size)
			.finish_non_exhaustive()
	}
}

impl SystemConfig {
	pub fn with_worker_count(mut self, worker_count: usize) -> Self {
		self.worker_count = worker_count;
		self
	}

	pub fn with_execution_quantum(mut self, execution_quantum: usize) -> Self {
		self.execution_quantum = execution_quantum;
		self
	}

	pub fn with_unhandled_message_policy(mut self, policy: UnhandledPolicy) -> Self {
		self.unhandled_message_policy = policy;
		self
	}

	pub fn with_max_mailbox_size(mut self, max_mailbox_size: usize) -> Self {
		self.max_mailbox_size = Some(max_mailbox_size);
		self
	}

	pub fn with_observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
		self.observer = observer;
		self
	}
}

/// Top-level container: owns the scheduler, the registry and the spawn
/// entry point.
///
/// It is lightweight to clone and *not* a singleton: unit tests each
/// create their own system and run in parallel. Call
/// [`ActorSystem::shutdown`] when done; worker threads are joined there,
/// not on drop.
#[derive(Clone)]
pub struct ActorSystem {
	core: Arc<SystemCore>,
}

struct SystemCore {
	config: SystemConfig,
	scheduler: SchedulerClient,
	registry: Registry,
	id_generator: ActorIdGenerator,
	shutting_down: AtomicBool,
}

impl Default for ActorSystem {
	fn default() -> ActorSystem {
		ActorSystem::new()
	}
}

impl ActorSystem {
	pub fn new() -> ActorSystem {
		ActorSystem::with_config(SystemConfig::default())
	}

	pub fn with_config(config: SystemConfig) -> ActorSystem {
		let scheduler = SchedulerClient::new(
			config.worker_count.max(1),
			config.execution_quantum.max(1),
			config.observer.clone(),
		);
		let system = ActorSystem {
			core: Arc::new(SystemCore {
				config,
				scheduler,
				registry: Registry::default(),
				id_generator: ActorIdGenerator::default(),
				shutting_down: AtomicBool::new(false),
			}),
		};
		system.core.scheduler.start(system.clone());
		info!(worker_count = system.core.config.worker_count, "actor-system-started");
		system
	}

	pub fn config(&self) -> &SystemConfig {
		&self.core.config
	}

	pub fn registry(&self) -> &Registry {
		&self.core.registry
	}

	pub(crate) fn scheduler(&self) -> &SchedulerClient {
		&self.core.scheduler
	}

	pub(crate) fn next_actor_id(&self) -> ActorId {
		self.core.id_generator.next_id()
	}

	pub(crate) fn default_queue_capacity(&self) -> QueueCapacity {
		match self.core.config.max_mailbox_size {
			Some(max_mailbox_size) => QueueCapacity::Bounded(max_mailbox_size),
			None => QueueCapacity::Unbounded,
		}
	}

	pub fn is_shutting_down(&self) -> bool {
		self.core.shutting_down.load(Ordering::SeqCst)
	}

	pub fn spawn_builder(&self) -> SpawnBuilder {
		SpawnBuilder::new(self.clone())
	}

	/// Spawns `behavior` with default options.
	pub fn spawn(&self, behavior: impl Behavior) -> Result<ActorRef, SpawnError> {
		self.spawn_builder().spawn(behavior)
	}

	/// Links `a` and `b` symmetrically: a non-normal exit of either is
	/// propagated to the other.
	///
	/// Both link sets are updated under their locks, taken in id order, so
	/// the relation can never be observed half-established.
	pub fn link(&self, a: &ActorRef, b: &ActorRef) {
		if a.id() == b.id() {
			return;
		}
		let (first, second) = if a.id() < b.id() { (a, b) } else { (b, a) };
		let mut first_links = first.acb().links.lock();
		let mut second_links = second.acb().links.lock();
		first_links.insert(second.id());
		second_links.insert(first.id());
	}

	pub fn unlink(&self, a: &ActorRef, b: &ActorRef) {
		if a.id() == b.id() {
			return;
		}
		let (first, second) = if a.id() < b.id() { (a, b) } else { (b, a) };
		let mut first_links = first.acb().links.lock();
		let mut second_links = second.acb().links.lock();
		first_links.remove(&second.id());
		second_links.remove(&first.id());
	}

	/// Starts watching `watched` on behalf of `observer`: any termination
	/// of `watched`, normal included, delivers a [`DownMessage`] to
	/// `observer`.
	pub fn monitor(&self, watched: &ActorRef, observer: &ActorRef) {
		watched.acb().monitors.lock().insert(observer.id());
	}

	pub fn demonitor(&self, watched: &ActorRef, observer: &ActorRef) {
		watched.acb().monitors.lock().remove(&observer.id());
	}

	/// Blocks until every running actor has retired.
	pub fn await_quiescence(&self) {
		self.core.registry.await_running_count_equal(0);
	}

	/// Closes the system: refuses further spawns, asks every live actor to
	/// exit, waits for quiescence, then joins the workers.
	///
	/// Actors that ignore their exit envelope keep the call blocked;
	/// callers that need a bound must impose it externally.
	pub fn shutdown(&self) {
		// The flag flip and the liveness snapshot sit under the
		// running-set lock, the same lock spawn registration takes: once
		// the snapshot exists, no further spawn can register and miss the
		// exit broadcast.
		let live_actors = {
			let _running = self.core.registry.lock_running();
			if self.core.shutting_down.swap(true, Ordering::SeqCst) {
				None
			} else {
				Some(self.core.registry.live_actors())
			}
		};
		let Some(live_actors) = live_actors else {
			// A concurrent shutdown already broadcast the exits.
			self.await_quiescence();
			return;
		};
		info!("actor-system-shutting-down");
		for actor in live_actors {
			crate::anon_send_exit(&actor, ExitReason::NORMAL);
		}
		self.await_quiescence();
		self.core.scheduler.stop();
	}
}

/// Runs the on-exit sequence of `actor` with `reason`.
///
/// Called from the worker owning the actor's execution, exactly once per
/// actor: close and discard the mailbox, notify links and monitors, erase
/// the registry entries, retire.
pub(crate) fn terminate_actor(system: &ActorSystem, actor: &ActorRef, reason: ExitReason) {
	let acb = actor.acb();
	acb.lifecycle.begin_terminating();
	*acb.exit_reason.lock() = Some(reason);
	acb.mailbox.close();
	let discarded = acb.mailbox.drain_pending().len();
	if discarded > 0 {
		debug!(actor_id = %actor.id(), discarded, "discarding undelivered envelopes");
	}
	acb.behavior.lock().take();
	let links: Vec<ActorId> = {
		let mut links_guard = acb.links.lock();
		links_guard.drain().collect()
	};
	let monitors: Vec<ActorId> = {
		let mut monitors_guard = acb.monitors.lock();
		monitors_guard.drain().collect()
	};
	let registry = system.registry();
	for peer_id in links {
		let Some(peer) = registry.get(peer_id) else {
			continue;
		};
		peer.acb().links.lock().remove(&actor.id());
		if !reason.is_normal() {
			peer.enqueue(
				Some(actor.downgrade()),
				MessageId::default().with_high_priority(),
				Message::new(ExitMessage { source: Some(actor.id()), reason }),
			);
		}
	}
	for observer_id in monitors {
		let Some(observer) = registry.get(observer_id) else {
			continue;
		};
		observer.enqueue(
			Some(actor.downgrade()),
			MessageId::default().with_high_priority(),
			Message::new(DownMessage { source: actor.id(), reason }),
		);
	}
	registry.erase(actor.id());
	registry.erase_names_of(actor.id());
	acb.lifecycle.retire();
	info!(actor_id = %actor.id(), reason = %reason, "actor-exit");
	system.core.config.observer.actor_terminated(actor.id(), reason);
}
