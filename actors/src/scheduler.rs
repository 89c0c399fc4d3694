// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

//! Fixed-pool work-stealing scheduler.
//!
//! Each worker thread owns a local deque; a global injector feeds workers
//! that run dry, and idle workers steal from random peers before parking
//! on a condition variable. An actor is runnable iff its mailbox holds the
//! scheduling token (see `Mailbox`), which guarantees that at most one
//! worker executes a given actor at any moment.

use std::{
	cell::RefCell,
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc,
	},
	thread,
	time::Duration,
};

use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use parking_lot::{Condvar, Mutex};
use rand::Rng;
use tracing::debug;

use crate::{
	behavior::HandleOutcome,
	command::{ExitMessage, Start},
	control_block::Lifecycle,
	observer::EventObserver,
	system::{terminate_actor, ActorSystem},
	ActorContext, ActorRef, ExitReason, MailboxState, UnhandledPolicy,
};

/// How long a parked worker sleeps before rechecking for shutdown.
const PARK_TIMEOUT: Duration = Duration::from_millis(100);

thread_local! {
	/// The local run queue of the pool worker running on this thread,
	/// tagged with its scheduler's identity. Empty on non-pool threads.
	static LOCAL_QUEUE: RefCell<Option<(usize, Worker<ActorRef>)>> = RefCell::new(None);
}

/// Cheap-to-clone handle on the worker pool.
#[derive(Clone)]
pub(crate) struct SchedulerClient {
	core: Arc<SchedulerCore>,
}

struct SchedulerCore {
	injector: Injector<ActorRef>,
	stealers: Vec<Stealer<ActorRef>>,
	/// Local queues are created up front so their stealers can be shared;
	/// each is claimed by its thread on start.
	seed_queues: Mutex<Vec<Option<Worker<ActorRef>>>>,
	execution_quantum: usize,
	shutdown: AtomicBool,
	sleepers: AtomicUsize,
	park_lock: Mutex<()>,
	park_condvar: Condvar,
	observer: Arc<dyn EventObserver>,
	join_handles: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl SchedulerClient {
	pub(crate) fn new(
		worker_count: usize,
		execution_quantum: usize,
		observer: Arc<dyn EventObserver>,
	) -> SchedulerClient {
		let mut seed_queues = Vec::with_capacity(worker_count);
		let mut stealers = Vec::with_capacity(worker_count);
		for _ in 0..worker_count {
			let local_queue = Worker::new_lifo();
			stealers.push(local_queue.stealer());
			seed_queues.push(Some(local_queue));
		}
		SchedulerClient {
			core: Arc::new(SchedulerCore {
				injector: Injector::new(),
				stealers,
				seed_queues: Mutex::new(seed_queues),
				execution_quantum,
				shutdown: AtomicBool::new(false),
				sleepers: AtomicUsize::new(0),
				park_lock: Mutex::new(()),
				park_condvar: Condvar::new(),
				observer,
				join_handles: Mutex::new(Vec::new()),
			}),
		}
	}

	pub(crate) fn observer(&self) -> &dyn EventObserver {
		self.core.observer.as_ref()
	}

	/// Starts the pool. Called exactly once, by the owning system.
	pub(crate) fn start(&self, system: ActorSystem) {
		let worker_count = self.core.stealers.len();
		let mut join_handles = self.core.join_handles.lock();
		for worker_index in 0..worker_count {
			let seed_queue = self.core.seed_queues.lock()[worker_index]
				.take()
				.expect("a local queue may only be claimed once");
			let core = self.core.clone();
			let system = system.clone();
			let join_handle = thread::Builder::new()
				.name(format!("actor-worker-{worker_index}"))
				.spawn(move || worker_loop(worker_index, seed_queue, core, system))
				.expect("failed to spawn worker thread");
			join_handles.push(join_handle);
		}
	}

	/// Makes a ready actor runnable.
	///
	/// Pool threads push onto their own deque; any other thread goes
	/// through the global injector. Either way one parked worker is woken.
	pub(crate) fn schedule(&self, actor: ActorRef) {
		self.core.observer.actor_scheduled(actor.id());
		let scheduler_token = Arc::as_ptr(&self.core) as usize;
		let not_pushed_locally = LOCAL_QUEUE.with(|slot| match slot.borrow().as_ref() {
			Some((token, local_queue)) if *token == scheduler_token => {
				local_queue.push(actor);
				None
			},
			_ => Some(actor),
		});
		if let Some(actor) = not_pushed_locally {
			self.core.injector.push(actor);
		}
		self.unpark_one();
	}

	fn unpark_one(&self) {
		if self.core.sleepers.load(Ordering::SeqCst) > 0 {
			let _guard = self.core.park_lock.lock();
			self.core.park_condvar.notify_one();
		}
	}

	/// Stops the pool: workers drain their queues, then exit and are
	/// joined. Must not be called from a pool thread.
	pub(crate) fn stop(&self) {
		self.core.shutdown.store(true, Ordering::SeqCst);
		{
			let _guard = self.core.park_lock.lock();
			self.core.park_condvar.notify_all();
		}
		let join_handles: Vec<_> = self.core.join_handles.lock().drain(..).collect();
		for join_handle in join_handles {
			let _ = join_handle.join();
		}
	}
}

fn worker_loop(
	worker_index: usize,
	seed_queue: Worker<ActorRef>,
	core: Arc<SchedulerCore>,
	system: ActorSystem,
) {
	let scheduler_token = Arc::as_ptr(&core) as usize;
	LOCAL_QUEUE.with(|slot| *slot.borrow_mut() = Some((scheduler_token, seed_queue)));
	debug!(worker = worker_index, "worker thread started");
	loop {
		if let Some(actor) = find_task(&core) {
			run_actor(&system, &core, actor);
			continue;
		}
		if core.shutdown.load(Ordering::SeqCst) {
			break;
		}
		park(&core);
	}
	LOCAL_QUEUE.with(|slot| *slot.borrow_mut() = None);
	debug!(worker = worker_index, "worker thread stopped");
}

/// Task acquisition order: local deque, then the global injector, then up
/// to 2·N steal attempts against uniformly random peers.
fn find_task(core: &SchedulerCore) -> Option<ActorRef> {
	LOCAL_QUEUE.with(|slot| {
		let borrow = slot.borrow();
		let (_, local_queue) =
			borrow.as_ref().expect("worker threads always own a local queue");
		if let Some(actor) = local_queue.pop() {
			return Some(actor);
		}
		loop {
			match core.injector.steal_batch_and_pop(local_queue) {
				Steal::Success(actor) => return Some(actor),
				Steal::Empty => break,
				Steal::Retry => continue,
			}
		}
		let mut rng = rand::thread_rng();
		let num_peers = core.stealers.len();
		for _ in 0..num_peers * 2 {
			let victim = rng.gen_range(0..num_peers);
			match core.stealers[victim].steal() {
				Steal::Success(actor) => return Some(actor),
				Steal::Empty | Steal::Retry => {},
			}
		}
		None
	})
}

/// Parks until an enqueue produces an `Unblocked` or the pool stops.
fn park(core: &SchedulerCore) {
	let mut guard = core.park_lock.lock();
	core.sleepers.fetch_add(1, Ordering::SeqCst);
	// Recheck under the lock: a schedule() that ran before we registered
	// as a sleeper would otherwise be missed.
	if core.injector.is_empty() && !core.shutdown.load(Ordering::SeqCst) {
		let _ = core.park_condvar.wait_for(&mut guard, PARK_TIMEOUT);
	}
	core.sleepers.fetch_sub(1, Ordering::SeqCst);
}

/// Executes up to one quantum of envelopes for `actor`.
///
/// The behavior slot stays locked for the whole dispatch; a worker that
/// picks up a fresh scheduling token for the same actor blocks on that
/// lock until the previous dispatch has handed the behavior back.
fn run_actor(system: &ActorSystem, core: &SchedulerCore, actor: ActorRef) {
	let acb = actor.acb();
	if matches!(acb.lifecycle.get(), Lifecycle::Terminating | Lifecycle::Retired) {
		return;
	}
	let mut behavior_guard = acb.behavior.lock();
	if behavior_guard.is_none() {
		return;
	}
	acb.lifecycle.advance_to_running();
	let ctx = ActorContext::new(actor.clone(), system.clone());
	for _ in 0..core.execution_quantum {
		let Some(envelope) = acb.mailbox.pop() else {
			// Mailbox drained: pop handed the scheduling token back.
			return;
		};
		if let Some(exit) = envelope.message_typed::<ExitMessage>().copied() {
			*behavior_guard = None;
			drop(behavior_guard);
			terminate_actor(system, &actor, exit.reason);
			return;
		}
		let behavior = behavior_guard.as_mut().expect("the behavior slot is filled above");
		let outcome = if envelope.message_typed::<Start>().is_some() {
			behavior.on_start(&ctx)
		} else {
			behavior.handle(envelope, &ctx)
		};
		match outcome {
			HandleOutcome::Continue => {},
			HandleOutcome::ReplaceWith(next_behavior) => {
				*behavior_guard = Some(next_behavior);
			},
			HandleOutcome::Unhandled => match acb.unhandled_policy {
				UnhandledPolicy::DropSilently => {
					debug!(actor_id = %actor.id(), "dropping unhandled message");
				},
				UnhandledPolicy::ExitWithUnhandled => {
					*behavior_guard = None;
					drop(behavior_guard);
					terminate_actor(system, &actor, ExitReason::UNHANDLED_MESSAGE);
					return;
				},
			},
			HandleOutcome::Terminate(reason) => {
				*behavior_guard = None;
				drop(behavior_guard);
				terminate_actor(system, &actor, reason);
				return;
			},
		}
	}
	// Quantum exhausted with the mailbox still holding the token: requeue
	// so pool neighbours get a turn.
	drop(behavior_guard);
	if acb.mailbox.state() == MailboxState::Ready {
		system.scheduler().schedule(actor);
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{
		atomic::{AtomicUsize, Ordering},
		Arc, Mutex,
	};

	use crate::{
		behavior_fn,
		testing::{test_system_with_workers, ExitOnStart},
		ActorSystem, Behavior, HandleOutcome, SystemConfig,
	};

	/// Stable thread identifier using a hash of ThreadId.
	fn thread_id_hash() -> u64 {
		use std::hash::{Hash, Hasher};
		let mut hasher = std::collections::hash_map::DefaultHasher::new();
		std::thread::current().id().hash(&mut hasher);
		hasher.finish()
	}

	#[test]
	fn test_actors_complete_and_system_quiesces() {
		let system = test_system_with_workers(2);
		for _ in 0..10 {
			system.spawn(ExitOnStart).unwrap();
		}
		system.await_quiescence();
		assert_eq!(system.registry().running_count(), 0);
		system.shutdown();
	}

	#[test]
	fn test_work_distributes_across_workers() {
		let system = test_system_with_workers(4);
		let thread_ids = Arc::new(Mutex::new(Vec::new()));
		for _ in 0..100 {
			let thread_ids = thread_ids.clone();
			system
				.spawn(OnStartRecorder { on_start: Box::new(move || {
					thread_ids.lock().unwrap().push(thread_id_hash());
				}) })
				.unwrap();
		}
		system.await_quiescence();
		system.shutdown();
		let thread_ids = thread_ids.lock().unwrap();
		assert_eq!(thread_ids.len(), 100);
		let unique_threads: std::collections::HashSet<u64> =
			thread_ids.iter().copied().collect();
		// Work-stealing is best-effort: expect at least two workers to
		// have participated.
		assert!(
			unique_threads.len() >= 2,
			"expected work on at least 2 threads, got {}",
			unique_threads.len()
		);
	}

	struct OnStartRecorder {
		on_start: Box<dyn FnMut() + Send>,
	}

	impl Behavior for OnStartRecorder {
		fn on_start(
			&mut self,
			_ctx: &crate::ActorContext,
		) -> HandleOutcome {
			(self.on_start)();
			HandleOutcome::Terminate(crate::ExitReason::NORMAL)
		}

		fn handle(
			&mut self,
			_envelope: crate::Envelope,
			_ctx: &crate::ActorContext,
		) -> HandleOutcome {
			HandleOutcome::Continue
		}
	}

	#[test]
	fn test_chatty_actor_requeues_and_everyone_completes() {
		// A single worker forces the quantum requeue path: the chatty
		// actor must yield the worker between quanta.
		let system =
			ActorSystem::with_config(SystemConfig::default().with_worker_count(1));
		#[derive(Debug)]
		struct Tick;
		let ticks = Arc::new(AtomicUsize::new(0));
		let chatty = {
			let ticks = ticks.clone();
			let mut remaining = 300usize;
			behavior_fn(move |envelope, ctx| {
				if envelope.message_typed::<Tick>().is_none() {
					return HandleOutcome::Unhandled;
				}
				ticks.fetch_add(1, Ordering::SeqCst);
				remaining -= 1;
				if remaining == 0 {
					return HandleOutcome::Terminate(crate::ExitReason::NORMAL);
				}
				let self_ref = ctx.self_ref().clone();
				ctx.send(&self_ref, Tick);
				HandleOutcome::Continue
			})
		};
		let chatty_ref = system.spawn(chatty).unwrap();
		crate::anon_send(&chatty_ref, Tick);
		system.spawn(ExitOnStart).unwrap();
		system.await_quiescence();
		assert_eq!(ticks.load(Ordering::SeqCst), 300);
		system.shutdown();
	}
}
