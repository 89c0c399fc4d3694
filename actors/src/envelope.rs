// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

use std::{any::Any, fmt};

use crate::{control_block::WeakActorRef, Message, MessageId};

/// One unit in a mailbox: who sent it, its routing token, and the payload.
///
/// The sender is a weak reference so that a pending envelope never keeps
/// its originating actor alive.
pub struct Envelope {
	sender: Option<WeakActorRef>,
	message_id: MessageId,
	message: Message,
}

impl Envelope {
	pub fn new(sender: Option<WeakActorRef>, message_id: MessageId, message: Message) -> Envelope {
		Envelope { sender, message_id, message }
	}

	pub fn sender(&self) -> Option<&WeakActorRef> {
		self.sender.as_ref()
	}

	pub fn message_id(&self) -> MessageId {
		self.message_id
	}

	pub fn message(&self) -> &Message {
		&self.message
	}

	/// Returns the payload if it has type `M`.
	///
	/// This method is mostly useful in unit tests.
	pub fn message_typed<M: Any>(&self) -> Option<&M> {
		self.message.downcast_ref::<M>()
	}
}

impl fmt::Debug for Envelope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Envelope").field(&self.message.type_name()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_envelope_round_trips_payload() {
		let envelope =
			Envelope::new(None, MessageId::default(), Message::new(vec![1u32, 2, 3]));
		assert!(envelope.sender().is_none());
		assert_eq!(envelope.message_typed::<Vec<u32>>().unwrap(), &vec![1, 2, 3]);
		assert!(envelope.message_typed::<String>().is_none());
	}
}
