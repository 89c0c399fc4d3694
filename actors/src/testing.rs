// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

//! Reusable behaviors and fixtures for the test suite and for downstream
//! crates enabling the `testsuite` feature.

use std::sync::{
	atomic::{AtomicU64, AtomicUsize, Ordering},
	Arc,
};

use crate::{
	behavior::{Behavior, HandleOutcome, UnhandledPolicy},
	control_block::ControlBlock,
	mailbox::{Mailbox, QueueCapacity},
	ActorContext, ActorId, ActorRef, ActorSystem, Envelope, ExitReason, SystemConfig,
};

/// Ping payload used across the test suite.
#[derive(Debug, Eq, PartialEq)]
pub struct Ping;

/// Behavior that counts received [`Ping`]s and reports everything else as
/// unhandled.
pub struct PingReceiver {
	pub pings: Arc<AtomicUsize>,
}

impl Behavior for PingReceiver {
	fn handle(&mut self, envelope: Envelope, _ctx: &ActorContext) -> HandleOutcome {
		if envelope.message_typed::<Ping>().is_none() {
			return HandleOutcome::Unhandled;
		}
		self.pings.fetch_add(1, Ordering::SeqCst);
		HandleOutcome::Continue
	}
}

/// Behavior that terminates normally as soon as it is first dispatched.
pub struct ExitOnStart;

impl Behavior for ExitOnStart {
	fn on_start(&mut self, _ctx: &ActorContext) -> HandleOutcome {
		HandleOutcome::Terminate(ExitReason::NORMAL)
	}

	fn handle(&mut self, _envelope: Envelope, _ctx: &ActorContext) -> HandleOutcome {
		HandleOutcome::Continue
	}
}

struct NoopBehavior;

impl Behavior for NoopBehavior {
	fn handle(&mut self, _envelope: Envelope, _ctx: &ActorContext) -> HandleOutcome {
		HandleOutcome::Continue
	}
}

/// A small two-worker system, cheap enough for parallel unit tests.
pub fn test_system() -> ActorSystem {
	test_system_with_workers(2)
}

pub fn test_system_with_workers(worker_count: usize) -> ActorSystem {
	ActorSystem::with_config(SystemConfig::default().with_worker_count(worker_count))
}

/// An actor without a scheduler: its mailbox is driven manually.
///
/// Useful to inspect what an actor would have received.
pub fn detached_actor() -> ActorRef {
	detached_actor_with_capacity(QueueCapacity::Unbounded)
}

pub fn detached_actor_with_capacity(capacity: QueueCapacity) -> ActorRef {
	// Ids far away from anything a test system hands out.
	static NEXT_DETACHED_ID: AtomicU64 = AtomicU64::new(1_000_000);
	ActorRef::new(ControlBlock::new(
		ActorId(NEXT_DETACHED_ID.fetch_add(1, Ordering::Relaxed)),
		Mailbox::new(capacity),
		Box::new(NoopBehavior),
		UnhandledPolicy::default(),
		None,
	))
}
