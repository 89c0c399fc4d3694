// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

//! System-level message payloads.
//!
//! These ride the high-priority lane so they overtake pending application
//! messages, similarly to UNIX signals overtaking regular work.

use crate::{ActorId, ExitReason};

/// Nudges a freshly spawned actor through its first dispatch.
///
/// The dispatch loop routes it to `Behavior::on_start`; it is never handed
/// to `Behavior::handle`.
#[derive(Debug)]
pub struct Start;

/// Terminates the receiving actor with the carried reason.
///
/// Exit envelopes are intercepted by the dispatch loop before the behavior
/// runs. Linked peers emit them with the dying actor's id as `source`;
/// `anon_send_exit` leaves the source empty.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExitMessage {
	pub source: Option<ActorId>,
	pub reason: ExitReason,
}

/// Notifies a monitor that the watched actor terminated.
///
/// Unlike `ExitMessage`, down messages are delivered to the monitor's
/// behavior like any other envelope.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DownMessage {
	pub source: ActorId,
	pub reason: ExitReason,
}

/// Error notice the runtime sends back to a message's sender.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SystemError {
	/// The target's normal lane was at its configured capacity; the
	/// message was rejected.
	MailboxFull { target: ActorId },
}
