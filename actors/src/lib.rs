// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

#![deny(clippy::disallowed_methods)]

//! actors is a message-passing actor runtime built around a fixed pool of
//! worker threads.
//!
//! It solves the following problem:
//! - run a large, dynamic population of isolated actors on a small, fixed
//!   number of OS threads.
//! - deliver messages through two priority lanes, in per-sender FIFO order.
//! - supervise actors through links and monitors rather than return values.
//! - detect when the whole population has quiesced.
//!
//! An actor is a [`Behavior`] plus a [`Mailbox`], identified by a
//! reference-counted control block. Senders obtain an [`ActorRef`] and
//! enqueue; the first envelope landing in an idle mailbox makes the actor
//! runnable and a pool worker picks it up, feeding it at most an execution
//! quantum of envelopes before requeueing it.

use std::{any::Any, num::NonZeroUsize};

use once_cell::sync::Lazy;
use tracing::{info, warn};

mod actor_context;
mod actor_id;
mod behavior;
mod command;
mod control_block;
mod envelope;
mod exit;
mod mailbox;
mod message;
mod observer;
mod registry;
pub(crate) mod scheduler;
mod spawn_builder;
mod system;

#[cfg(any(test, feature = "testsuite"))]
pub mod testing;

pub use self::{
	actor_context::ActorContext,
	actor_id::ActorId,
	behavior::{behavior_fn, Behavior, HandleOutcome, UnhandledPolicy},
	command::{DownMessage, ExitMessage, Start, SystemError},
	control_block::{ActorRef, Lifecycle, WeakActorRef},
	envelope::Envelope,
	exit::ExitReason,
	mailbox::{Mailbox, MailboxState, Priority, PushResult, QueueCapacity},
	message::{Message, MessageCategory, MessageId},
	observer::{EventObserver, NoopObserver},
	registry::Registry,
	spawn_builder::{SpawnBuilder, SpawnError},
	system::{ActorSystem, SystemConfig},
};

/// Number of envelopes a worker hands to an actor before requeueing it.
///
/// Bounds the latency a chatty actor can impose on its pool neighbours.
pub const DEFAULT_EXECUTION_QUANTUM: usize = 64;

/// Worker-pool size used when `SystemConfig` does not specify one.
///
/// - Derived from `ACTORS_WORKER_THREADS` if set and valid.
/// - Defaults to the number of logical cpus.
pub static DEFAULT_WORKER_COUNT: Lazy<usize> = Lazy::new(worker_count_from_env_or_default);

fn worker_count_from_env_or_default() -> usize {
	match std::env::var("ACTORS_WORKER_THREADS") {
		Ok(worker_count_str) => {
			if let Ok(worker_count) = worker_count_str.parse::<NonZeroUsize>() {
				info!("set the worker pool size to {worker_count} threads");
				return worker_count.get();
			} else {
				warn!(
					"failed to parse `ACTORS_WORKER_THREADS={worker_count_str}` as an integer \
					 > 0, using one worker per logical cpu"
				);
			}
		},
		Err(std::env::VarError::NotUnicode(os_str)) => {
			warn!(
				"failed to parse `ACTORS_WORKER_THREADS={os_str:?}` as a valid unicode string, \
				 using one worker per logical cpu"
			);
		},
		Err(std::env::VarError::NotPresent) => {},
	}
	num_cpus::get()
}

/// Sends `message` to `to` on behalf of `from`.
///
/// Composes [`ActorRef::enqueue`] with the priority bit of the message id,
/// so identified and anonymous sends share one delivery path.
pub fn send_as<M: Any + Send + Sync>(
	from: &ActorRef,
	priority: Priority,
	to: &ActorRef,
	message: M,
) -> PushResult {
	let message_id = match priority {
		Priority::High => MessageId::default().with_high_priority(),
		Priority::Normal => MessageId::default(),
	};
	to.enqueue(Some(from.downgrade()), message_id, Message::new(message))
}

/// Sends `message` to `to` without a sender address.
pub fn anon_send<M: Any + Send + Sync>(to: &ActorRef, message: M) -> PushResult {
	to.enqueue(None, MessageId::default(), Message::new(message))
}

/// Enqueues a high-priority exit envelope.
///
/// The receiving actor terminates with `reason` when the envelope is
/// dispatched; its behavior never sees it.
pub fn anon_send_exit(to: &ActorRef, reason: ExitReason) -> PushResult {
	to.enqueue(
		None,
		MessageId::default().with_high_priority(),
		Message::new(ExitMessage { source: None, reason }),
	)
}
