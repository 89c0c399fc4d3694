// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

use std::{
	any::{type_name, Any},
	fmt,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
};

const HIGH_PRIORITY_BIT: u64 = 1 << 63;
const CATEGORY_SHIFT: u32 = 61;
const CATEGORY_MASK: u64 = 0b11 << CATEGORY_SHIFT;
const CORRELATION_MASK: u64 = (1 << CATEGORY_SHIFT) - 1;

/// Request/response pairing of a message id.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageCategory {
	/// Plain one-way message.
	Async,
	/// Expects a response bearing the same correlation number.
	Request,
	/// Response to an earlier request.
	Response,
}

/// Routing token attached to every envelope.
///
/// Layout: `[1-bit high-priority | 2-bit category | 61-bit correlation]`.
/// The priority bit selects the mailbox lane, so anonymous and identified
/// sends share a single delivery path. The category and correlation bits
/// pair requests with their responses.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MessageId(u64);

impl MessageId {
	/// Mints a request id carrying a fresh correlation number.
	pub fn request() -> MessageId {
		static CORRELATION_SEQ: AtomicU64 = AtomicU64::new(1);
		let correlation = CORRELATION_SEQ.fetch_add(1, Ordering::Relaxed) & CORRELATION_MASK;
		MessageId(1 << CATEGORY_SHIFT | correlation)
	}

	/// Derives the id a response to this request must carry.
	///
	/// The correlation number and the priority bit are preserved.
	pub fn response(self) -> MessageId {
		MessageId(
			2 << CATEGORY_SHIFT | (self.0 & CORRELATION_MASK) | (self.0 & HIGH_PRIORITY_BIT),
		)
	}

	pub fn with_high_priority(self) -> MessageId {
		MessageId(self.0 | HIGH_PRIORITY_BIT)
	}

	pub fn is_high_priority(self) -> bool {
		self.0 & HIGH_PRIORITY_BIT != 0
	}

	pub fn category(self) -> MessageCategory {
		match (self.0 & CATEGORY_MASK) >> CATEGORY_SHIFT {
			0 => MessageCategory::Async,
			1 => MessageCategory::Request,
			2 => MessageCategory::Response,
			forbidden => {
				panic!(
					"Found forbidden category bits `{forbidden}` in a message id. This should \
					 never happen."
				);
			},
		}
	}

	pub fn correlation(self) -> u64 {
		self.0 & CORRELATION_MASK
	}

	pub fn as_u64(self) -> u64 {
		self.0
	}
}

impl fmt::Debug for MessageId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MessageId")
			.field("category", &self.category())
			.field("correlation", &self.correlation())
			.field("high_priority", &self.is_high_priority())
			.finish()
	}
}

/// An immutable, type-erased message payload.
///
/// Cloning is cheap: the payload is reference counted and observable
/// contents never change after construction. The concrete type name is
/// captured for diagnostics on unhandled messages.
#[derive(Clone)]
pub struct Message {
	payload: Arc<dyn Any + Send + Sync>,
	type_name: &'static str,
}

impl Message {
	pub fn new<M: Any + Send + Sync>(value: M) -> Message {
		Message { payload: Arc::new(value), type_name: type_name::<M>() }
	}

	pub fn is<M: Any>(&self) -> bool {
		self.payload.is::<M>()
	}

	pub fn downcast_ref<M: Any>(&self) -> Option<&M> {
		self.payload.downcast_ref::<M>()
	}

	pub fn type_name(&self) -> &'static str {
		self.type_name
	}
}

impl fmt::Debug for Message {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Message({})", self.type_name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_message_id_is_async_normal_priority() {
		let message_id = MessageId::default();
		assert_eq!(message_id.category(), MessageCategory::Async);
		assert!(!message_id.is_high_priority());
		assert_eq!(message_id.correlation(), 0);
	}

	#[test]
	fn test_request_response_share_correlation() {
		let request = MessageId::request();
		let response = request.response();
		assert_eq!(request.category(), MessageCategory::Request);
		assert_eq!(response.category(), MessageCategory::Response);
		assert_eq!(request.correlation(), response.correlation());
		assert_ne!(MessageId::request().correlation(), request.correlation());
	}

	#[test]
	fn test_priority_bit_survives_response_derivation() {
		let request = MessageId::request().with_high_priority();
		assert!(request.is_high_priority());
		assert!(request.response().is_high_priority());
		assert_eq!(request.response().category(), MessageCategory::Response);
	}

	#[test]
	fn test_message_downcast() {
		let message = Message::new((7usize, "hello"));
		assert!(message.is::<(usize, &str)>());
		assert!(!message.is::<String>());
		let (num, text) = message.downcast_ref::<(usize, &str)>().unwrap();
		assert_eq!(*num, 7);
		assert_eq!(*text, "hello");
	}

	#[test]
	fn test_message_clone_shares_payload() {
		let message = Message::new("payload".to_string());
		let clone = message.clone();
		assert_eq!(
			message.downcast_ref::<String>().unwrap().as_ptr(),
			clone.downcast_ref::<String>().unwrap().as_ptr()
		);
	}
}
