// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

use thiserror::Error;
use tracing::debug;

use crate::{
	behavior::{Behavior, UnhandledPolicy},
	command::Start,
	control_block::ControlBlock,
	mailbox::{Mailbox, QueueCapacity},
	ActorRef, ActorSystem, Message, MessageId,
};

/// Error returned when an actor cannot be spawned.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SpawnError {
	#[error("the system is shutting down and refuses new actors")]
	SystemShuttingDown,
}

/// `SpawnBuilder` makes it possible to configure misc parameters before
/// spawning an actor.
pub struct SpawnBuilder {
	system: ActorSystem,
	name: Option<String>,
	queue_capacity: Option<QueueCapacity>,
	unhandled_policy: Option<UnhandledPolicy>,
	links: Vec<ActorRef>,
}

impl SpawnBuilder {
	pub(crate) fn new(system: ActorSystem) -> SpawnBuilder {
		SpawnBuilder {
			system,
			name: None,
			queue_capacity: None,
			unhandled_policy: None,
			links: Vec::new(),
		}
	}

	/// Registers the actor under `name` in addition to its id.
	pub fn with_name(mut self, name: impl ToString) -> Self {
		self.name = Some(name.to_string());
		self
	}

	/// Overrides the normal-lane capacity for this actor.
	///
	/// By default the system-wide `max_mailbox_size` applies.
	pub fn with_queue_capacity(mut self, queue_capacity: QueueCapacity) -> Self {
		self.queue_capacity = Some(queue_capacity);
		self
	}

	pub fn with_unhandled_message_policy(mut self, unhandled_policy: UnhandledPolicy) -> Self {
		self.unhandled_policy = Some(unhandled_policy);
		self
	}

	/// Links the new actor to `peer` before it processes anything.
	pub fn linked_to(mut self, peer: &ActorRef) -> Self {
		self.links.push(peer.clone());
		self
	}

	/// Allocates the control block, registers the actor and nudges it
	/// through its first dispatch.
	pub fn spawn(self, behavior: impl Behavior) -> Result<ActorRef, SpawnError> {
		self.spawn_boxed(Box::new(behavior))
	}

	pub fn spawn_boxed(self, behavior: Box<dyn Behavior>) -> Result<ActorRef, SpawnError> {
		let system = self.system;
		let actor_id = system.next_actor_id();
		let queue_capacity =
			self.queue_capacity.unwrap_or_else(|| system.default_queue_capacity());
		let unhandled_policy =
			self.unhandled_policy.unwrap_or(system.config().unhandled_message_policy);
		let control_block = ControlBlock::new(
			actor_id,
			Mailbox::new(queue_capacity),
			behavior,
			unhandled_policy,
			Some(system.scheduler().clone()),
		);
		let actor = ActorRef::new(control_block);
		{
			// The shutdown check and the registration sit under the
			// running-set lock, the same lock shutdown holds while taking
			// its liveness snapshot: an accepted actor is always covered
			// by the exit broadcast.
			let mut running = system.registry().lock_running();
			if system.is_shutting_down() {
				return Err(SpawnError::SystemShuttingDown);
			}
			running.insert(actor_id);
			system.registry().put(actor.clone());
			if let Some(name) = &self.name {
				system.registry().put_named(name, actor.clone());
			}
		}
		for peer in &self.links {
			system.link(&actor, peer);
		}
		debug!(actor_id = %actor_id, "spawn-actor");
		actor.enqueue(None, MessageId::default().with_high_priority(), Message::new(Start));
		Ok(actor)
	}
}
