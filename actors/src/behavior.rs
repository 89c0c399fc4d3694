// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

use crate::{ActorContext, Envelope, ExitReason};

/// The message-handling function of an actor.
///
/// An actor owns exactly one behavior at a time; returning
/// [`HandleOutcome::ReplaceWith`] is the only way to change which messages
/// are handled. Each invocation consumes exactly one envelope and must not
/// block: a behavior that waits on a lock or a channel stalls a pool
/// worker.
pub trait Behavior: Send + 'static {
	/// Invoked once, before any envelope, when the actor is first
	/// dispatched.
	fn on_start(&mut self, _ctx: &ActorContext) -> HandleOutcome {
		HandleOutcome::Continue
	}

	/// Consumes one envelope.
	fn handle(&mut self, envelope: Envelope, ctx: &ActorContext) -> HandleOutcome;
}

/// Side effect of one behavior invocation, as seen by the dispatch loop.
pub enum HandleOutcome {
	/// Keep the current behavior and move on to the next envelope.
	Continue,
	/// Swap in a new behavior for subsequent envelopes.
	ReplaceWith(Box<dyn Behavior>),
	/// The behavior did not recognize the message; the actor's
	/// [`UnhandledPolicy`] decides what happens.
	Unhandled,
	/// Stop the actor with the given reason.
	Terminate(ExitReason),
}

/// What to do when a behavior reports an envelope as unhandled.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum UnhandledPolicy {
	/// Log at debug level and drop the envelope.
	#[default]
	DropSilently,
	/// Terminate the actor with `ExitReason::UNHANDLED_MESSAGE`.
	ExitWithUnhandled,
}

/// Wraps a closure as a [`Behavior`].
///
/// Handy for small reactive actors and tests; the closure receives each
/// envelope along with the actor's context.
pub fn behavior_fn<F>(f: F) -> impl Behavior
where F: FnMut(Envelope, &ActorContext) -> HandleOutcome + Send + 'static {
	FnBehavior(f)
}

struct FnBehavior<F>(F);

impl<F> Behavior for FnBehavior<F>
where F: FnMut(Envelope, &ActorContext) -> HandleOutcome + Send + 'static
{
	fn handle(&mut self, envelope: Envelope, ctx: &ActorContext) -> HandleOutcome {
		(self.0)(envelope, ctx)
	}
}
