// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

use std::{
	collections::HashSet,
	fmt,
	sync::{
		atomic::{fence, AtomicU32, AtomicUsize, Ordering},
		Arc,
	},
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
	behavior::{Behavior, UnhandledPolicy},
	command::SystemError,
	mailbox::{Mailbox, PushResult},
	scheduler::SchedulerClient,
	ActorId, Envelope, ExitReason, Message, MessageId,
};

/// Lifecycle phases of an actor. Transitions are one-way.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lifecycle {
	/// Allocated and registered, first dispatch still pending.
	Spawned = 0,
	/// Executing or waiting for messages.
	Running = 1,
	/// Exit in progress: mailbox closed, notifications being emitted.
	Terminating = 2,
	/// Fully retired from the registry.
	Retired = 3,
}

impl From<u32> for Lifecycle {
	fn from(lifecycle_u32: u32) -> Self {
		match lifecycle_u32 {
			0 => Lifecycle::Spawned,
			1 => Lifecycle::Running,
			2 => Lifecycle::Terminating,
			3 => Lifecycle::Retired,
			_ => {
				panic!(
					"Found forbidden u32 value for Lifecycle `{lifecycle_u32}`. This should \
					 never happen."
				);
			},
		}
	}
}

pub(crate) struct AtomicLifecycle(AtomicU32);

impl Default for AtomicLifecycle {
	fn default() -> Self {
		AtomicLifecycle(AtomicU32::new(Lifecycle::Spawned as u32))
	}
}

impl AtomicLifecycle {
	pub(crate) fn get(&self) -> Lifecycle {
		Lifecycle::from(self.0.load(Ordering::Acquire))
	}

	pub(crate) fn advance_to_running(&self) {
		let _ = self.0.compare_exchange(
			Lifecycle::Spawned as u32,
			Lifecycle::Running as u32,
			Ordering::SeqCst,
			Ordering::SeqCst,
		);
	}

	/// Enters `Terminating`, exactly once per actor.
	///
	/// A second attempt indicates a bug in the runtime itself and aborts.
	pub(crate) fn begin_terminating(&self) {
		let entered = self
			.0
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |lifecycle| {
				match Lifecycle::from(lifecycle) {
					Lifecycle::Spawned | Lifecycle::Running => Some(Lifecycle::Terminating as u32),
					Lifecycle::Terminating | Lifecycle::Retired => None,
				}
			})
			.is_ok();
		if !entered {
			panic!("An actor entered Terminating twice. This is a bug in the actor runtime.");
		}
	}

	pub(crate) fn retire(&self) {
		self.0.store(Lifecycle::Retired as u32, Ordering::Release);
	}
}

/// The stable identity of an actor.
///
/// Handles share the block through an `Arc`. The explicit strong count
/// gates the actor's liveness, while the `Arc` count keeps the block's
/// storage (and therefore id lookup) alive for weak handles that outlive
/// the actor.
pub(crate) struct ControlBlock {
	pub(crate) actor_id: ActorId,
	strong: AtomicUsize,
	pub(crate) lifecycle: AtomicLifecycle,
	pub(crate) mailbox: Mailbox,
	pub(crate) behavior: Mutex<Option<Box<dyn Behavior>>>,
	pub(crate) links: Mutex<HashSet<ActorId>>,
	pub(crate) monitors: Mutex<HashSet<ActorId>>,
	pub(crate) exit_reason: Mutex<Option<ExitReason>>,
	pub(crate) unhandled_policy: UnhandledPolicy,
	pub(crate) scheduler_client_opt: Option<SchedulerClient>,
}

impl ControlBlock {
	pub(crate) fn new(
		actor_id: ActorId,
		mailbox: Mailbox,
		behavior: Box<dyn Behavior>,
		unhandled_policy: UnhandledPolicy,
		scheduler_client_opt: Option<SchedulerClient>,
	) -> ControlBlock {
		ControlBlock {
			actor_id,
			strong: AtomicUsize::new(1),
			lifecycle: AtomicLifecycle::default(),
			mailbox,
			behavior: Mutex::new(Some(behavior)),
			links: Mutex::new(HashSet::new()),
			monitors: Mutex::new(HashSet::new()),
			exit_reason: Mutex::new(None),
			unhandled_policy,
			scheduler_client_opt,
		}
	}

	/// Runs once the last strong handle is gone: the actor can never be
	/// reached again, so its mailbox and behavior are released. The block
	/// itself lives on for weak handles.
	fn release(&self) {
		self.mailbox.close();
		drop(self.mailbox.drain_pending());
		self.behavior.lock().take();
	}
}

/// A strong handle on an actor.
///
/// It is lightweight to clone. The actor stays alive while at least one
/// strong handle exists; the registry holds one until termination.
pub struct ActorRef {
	acb: Arc<ControlBlock>,
}

impl ActorRef {
	pub(crate) fn new(control_block: ControlBlock) -> ActorRef {
		ActorRef { acb: Arc::new(control_block) }
	}

	pub(crate) fn acb(&self) -> &ControlBlock {
		&self.acb
	}

	pub fn id(&self) -> ActorId {
		self.acb.actor_id
	}

	pub fn lifecycle(&self) -> Lifecycle {
		self.acb.lifecycle.get()
	}

	pub fn is_alive(&self) -> bool {
		matches!(self.lifecycle(), Lifecycle::Spawned | Lifecycle::Running)
	}

	/// The reason the actor terminated with, once it has.
	pub fn exit_reason(&self) -> Option<ExitReason> {
		*self.acb.exit_reason.lock()
	}

	pub fn downgrade(&self) -> WeakActorRef {
		WeakActorRef { acb: self.acb.clone() }
	}

	/// Appends a message to the actor's mailbox.
	///
	/// This is the single delivery verb: send helpers, timers and inbound
	/// adapters all route through it. Delivery is asynchronous and
	/// best-effort; a push on a closed mailbox is silent for the sender,
	/// which learns about the target's death through links or monitors.
	pub fn enqueue(
		&self,
		sender: Option<WeakActorRef>,
		message_id: MessageId,
		message: Message,
	) -> PushResult {
		let sender_for_error = sender.clone();
		let envelope = Envelope::new(sender, message_id, message);
		match self.acb.mailbox.push(envelope) {
			PushResult::Unblocked => {
				if let Some(scheduler_client) = &self.acb.scheduler_client_opt {
					scheduler_client.observer().message_enqueued(self.id(), message_id);
					scheduler_client.schedule(self.clone());
				}
				PushResult::Unblocked
			},
			PushResult::Queued => {
				if let Some(scheduler_client) = &self.acb.scheduler_client_opt {
					scheduler_client.observer().message_enqueued(self.id(), message_id);
				}
				PushResult::Queued
			},
			PushResult::Closed => {
				debug!(actor_id = %self.id(), "dropping message to closed mailbox");
				PushResult::Closed
			},
			PushResult::Full => {
				warn!(actor_id = %self.id(), "mailbox full, rejecting message");
				if let Some(sender) = sender_for_error.and_then(|weak| weak.upgrade()) {
					let notice = Message::new(SystemError::MailboxFull { target: self.id() });
					let _ = sender.enqueue(
						Some(self.downgrade()),
						MessageId::default().with_high_priority(),
						notice,
					);
				}
				PushResult::Full
			},
		}
	}

	#[cfg(any(test, feature = "testsuite"))]
	pub fn strong_count(&self) -> usize {
		self.acb.strong.load(Ordering::SeqCst)
	}

	/// Destroys the pending mailbox content and returns it.
	///
	/// Only meaningful in tests that inspect what an actor would have
	/// received.
	#[cfg(any(test, feature = "testsuite"))]
	pub fn drain_mailbox_for_test(&self) -> Vec<Envelope> {
		self.acb.mailbox.drain_pending()
	}
}

impl Clone for ActorRef {
	fn clone(&self) -> Self {
		// Relaxed is enough for an increment made through an existing
		// handle: the handle itself proves the count is non-zero.
		self.acb.strong.fetch_add(1, Ordering::Relaxed);
		ActorRef { acb: self.acb.clone() }
	}
}

impl Drop for ActorRef {
	fn drop(&mut self) {
		if self.acb.strong.fetch_sub(1, Ordering::Release) == 1 {
			fence(Ordering::Acquire);
			self.acb.release();
		}
	}
}

impl fmt::Debug for ActorRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ActorRef").field(&self.id()).finish()
	}
}

/// A weak handle on an actor: keeps id lookup safe, never the actor alive.
pub struct WeakActorRef {
	acb: Arc<ControlBlock>,
}

impl WeakActorRef {
	/// The id outlives the actor: weak handles may read it after death.
	pub fn id(&self) -> ActorId {
		self.acb.actor_id
	}

	/// Upgrades to a strong handle if the actor is still alive.
	pub fn upgrade(&self) -> Option<ActorRef> {
		self.acb
			.strong
			.fetch_update(Ordering::Acquire, Ordering::Relaxed, |strong| {
				if strong == 0 {
					None
				} else {
					Some(strong + 1)
				}
			})
			.ok()?;
		Some(ActorRef { acb: self.acb.clone() })
	}
}

impl Clone for WeakActorRef {
	fn clone(&self) -> Self {
		WeakActorRef { acb: self.acb.clone() }
	}
}

impl fmt::Debug for WeakActorRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("WeakActorRef").field(&self.id()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{behavior::HandleOutcome, behavior_fn, mailbox::QueueCapacity, MailboxState};

	fn detached() -> ActorRef {
		ActorRef::new(ControlBlock::new(
			ActorId(1),
			Mailbox::new(QueueCapacity::Unbounded),
			Box::new(behavior_fn(|_, _| HandleOutcome::Continue)),
			UnhandledPolicy::default(),
			None,
		))
	}

	#[test]
	fn test_clone_and_drop_track_strong_count() {
		let actor = detached();
		assert_eq!(actor.strong_count(), 1);
		let clone = actor.clone();
		assert_eq!(actor.strong_count(), 2);
		drop(clone);
		assert_eq!(actor.strong_count(), 1);
	}

	#[test]
	fn test_weak_does_not_keep_actor_alive() {
		let actor = detached();
		let weak = actor.downgrade();
		assert_eq!(actor.strong_count(), 1);
		assert!(weak.upgrade().is_some());
		drop(actor);
		assert!(weak.upgrade().is_none());
		// Id lookup stays safe after death.
		assert_eq!(weak.id(), ActorId(1));
	}

	#[test]
	fn test_last_strong_drop_closes_the_mailbox() {
		let actor = detached();
		let weak = actor.downgrade();
		actor.enqueue(None, MessageId::default(), Message::new(1usize));
		drop(actor);
		assert_eq!(weak.acb.mailbox.state(), MailboxState::Closed);
		assert!(weak.acb.mailbox.is_empty());
		assert!(weak.acb.behavior.lock().is_none());
	}

	#[test]
	fn test_enqueue_to_closed_mailbox_is_silent() {
		let actor = detached();
		actor.acb().mailbox.close();
		let result = actor.enqueue(None, MessageId::default(), Message::new(1usize));
		assert_eq!(result, PushResult::Closed);
	}
}
