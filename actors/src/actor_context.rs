// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

use std::any::Any;

use tracing::debug;

use crate::{
	command::ExitMessage,
	mailbox::{Priority, PushResult},
	spawn_builder::SpawnBuilder,
	ActorId, ActorRef, ActorSystem, ExitReason, Message, MessageId,
};

/// Execution-side view handed to a behavior while it runs.
///
/// Carries the actor's own handle and the owning system, through which a
/// behavior sends, spawns, links and monitors. A context is only valid
/// for the duration of a dispatch and is rebuilt by the worker each time.
pub struct ActorContext {
	self_ref: ActorRef,
	system: ActorSystem,
}

impl ActorContext {
	pub(crate) fn new(self_ref: ActorRef, system: ActorSystem) -> ActorContext {
		ActorContext { self_ref, system }
	}

	pub fn id(&self) -> ActorId {
		self.self_ref.id()
	}

	pub fn self_ref(&self) -> &ActorRef {
		&self.self_ref
	}

	pub fn system(&self) -> &ActorSystem {
		&self.system
	}

	/// Sends `message` to `to` with this actor as the sender.
	///
	/// Messages from one behavior invocation reach each recipient in the
	/// order they were issued.
	pub fn send<M: Any + Send + Sync>(&self, to: &ActorRef, message: M) -> PushResult {
		self.send_with_priority(to, Priority::Normal, message)
	}

	pub fn send_with_priority<M: Any + Send + Sync>(
		&self,
		to: &ActorRef,
		priority: Priority,
		message: M,
	) -> PushResult {
		debug!(from = %self.id(), to = %to.id(), "send");
		crate::send_as(&self.self_ref, priority, to, message)
	}

	/// Sends an exit envelope: the receiver terminates with `reason` when
	/// the envelope is dispatched.
	pub fn send_exit(&self, to: &ActorRef, reason: ExitReason) -> PushResult {
		to.enqueue(
			Some(self.self_ref.downgrade()),
			MessageId::default().with_high_priority(),
			Message::new(ExitMessage { source: Some(self.id()), reason }),
		)
	}

	pub fn spawn_builder(&self) -> SpawnBuilder {
		self.system.spawn_builder()
	}

	/// Links this actor and `peer` symmetrically.
	pub fn link(&self, peer: &ActorRef) {
		self.system.link(&self.self_ref, peer);
	}

	pub fn unlink(&self, peer: &ActorRef) {
		self.system.unlink(&self.self_ref, peer);
	}

	/// Starts watching `peer`: its termination will deliver a
	/// `DownMessage` to this actor.
	pub fn monitor(&self, peer: &ActorRef) {
		self.system.monitor(peer, &self.self_ref);
	}

	pub fn demonitor(&self, peer: &ActorRef) {
		self.system.demonitor(peer, &self.self_ref);
	}
}
