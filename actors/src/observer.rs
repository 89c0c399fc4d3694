// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

use crate::{ActorId, ExitReason, MessageId};

/// Hook points for wiring the runtime to an external tracing backend.
///
/// Every method defaults to a no-op so implementers override only what
/// they record. Callbacks run on hot paths (enqueue, scheduling,
/// termination) and must be cheap and non-blocking.
pub trait EventObserver: Send + Sync + 'static {
	/// A message was appended to `target`'s mailbox.
	fn message_enqueued(&self, _target: ActorId, _message_id: MessageId) {}

	/// `actor` became runnable and was handed to the worker pool.
	fn actor_scheduled(&self, _actor: ActorId) {}

	/// `actor` finished terminating.
	fn actor_terminated(&self, _actor: ActorId, _reason: ExitReason) {}
}

/// Observer that discards every event with zero overhead.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl EventObserver for NoopObserver {}
