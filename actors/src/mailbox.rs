// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

use std::sync::atomic::{AtomicU32, Ordering};

use crate::Envelope;

/// Delivery lane of a message within a mailbox.
///
/// Whenever a high-priority envelope is pending, it is dequeued before any
/// normal-priority envelope.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Priority {
	High,
	Normal,
}

/// Capacity of the normal-priority lane.
///
/// The high-priority lane is always unbounded: exit and control envelopes
/// must never be rejected.
#[derive(Clone, Copy, Debug)]
pub enum QueueCapacity {
	Bounded(usize),
	Unbounded,
}

/// Outcome of a mailbox push, as observed by the enqueueing thread.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PushResult {
	/// The push flipped the mailbox out of its blocked state: the caller
	/// must hand the owning actor to the scheduler.
	Unblocked,
	/// The message was appended behind already pending envelopes.
	Queued,
	/// The mailbox was closed; the message will never be delivered.
	Closed,
	/// The normal lane is at its capacity; the message was rejected.
	Full,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MailboxState {
	/// No envelope was ever enqueued and the actor has never been scheduled.
	Empty = 0,
	/// The actor is queued for execution or executing.
	Ready = 1,
	/// The actor drained its mailbox and waits for the next envelope.
	Blocked = 2,
	/// The actor terminated; pushes are rejected.
	Closed = 3,
}

impl From<u32> for MailboxState {
	fn from(state_u32: u32) -> Self {
		match state_u32 {
			0 => MailboxState::Empty,
			1 => MailboxState::Ready,
			2 => MailboxState::Blocked,
			3 => MailboxState::Closed,
			_ => {
				panic!(
					"Found forbidden u32 value for MailboxState `{state_u32}`. This should \
					 never happen."
				);
			},
		}
	}
}

pub(crate) struct AtomicState(AtomicU32);

impl Default for AtomicState {
	fn default() -> Self {
		AtomicState(AtomicU32::new(MailboxState::Empty as u32))
	}
}

impl AtomicState {
	pub(crate) fn get(&self) -> MailboxState {
		MailboxState::from(self.0.load(Ordering::Acquire))
	}

	pub(crate) fn transition(&self, from: MailboxState, to: MailboxState) -> bool {
		self.0
			.compare_exchange(from as u32, to as u32, Ordering::SeqCst, Ordering::SeqCst)
			.is_ok()
	}

	pub(crate) fn close(&self) {
		self.0.store(MailboxState::Closed as u32, Ordering::SeqCst);
	}
}

/// The per-actor two-lane FIFO queue.
///
/// Producers push concurrently from any number of threads; exactly one
/// worker pops at a time (actors execute serially). The state word doubles
/// as the scheduling token: the thread whose push flips it to `Ready` is
/// the one that must make the actor runnable, and a worker that drains the
/// mailbox hands the token back by flipping it to `Blocked`.
pub struct Mailbox {
	high_tx: flume::Sender<Envelope>,
	high_rx: flume::Receiver<Envelope>,
	normal_tx: flume::Sender<Envelope>,
	normal_rx: flume::Receiver<Envelope>,
	state: AtomicState,
}

impl Mailbox {
	pub fn new(capacity: QueueCapacity) -> Mailbox {
		let (high_tx, high_rx) = flume::unbounded();
		let (normal_tx, normal_rx) = match capacity {
			QueueCapacity::Bounded(capacity) => flume::bounded(capacity),
			QueueCapacity::Unbounded => flume::unbounded(),
		};
		Mailbox { high_tx, high_rx, normal_tx, normal_rx, state: AtomicState::default() }
	}

	pub fn state(&self) -> MailboxState {
		self.state.get()
	}

	pub fn is_empty(&self) -> bool {
		self.high_rx.is_empty() && self.normal_rx.is_empty()
	}

	pub fn len(&self) -> usize {
		self.high_rx.len() + self.normal_rx.len()
	}

	/// Appends an envelope, thread-safe from any number of producers.
	///
	/// Returns `Unblocked` iff this push acquired the scheduling token; the
	/// caller must then make the owning actor ready in the scheduler.
	pub fn push(&self, envelope: Envelope) -> PushResult {
		if self.state.get() == MailboxState::Closed {
			return PushResult::Closed;
		}
		if envelope.message_id().is_high_priority() {
			self.high_tx
				.send(envelope)
				.expect("the mailbox owns both halves of the high-priority lane");
		} else {
			match self.normal_tx.try_send(envelope) {
				Ok(()) => {},
				Err(flume::TrySendError::Full(_)) => return PushResult::Full,
				Err(flume::TrySendError::Disconnected(_)) => {
					unreachable!("the mailbox owns both halves of the normal-priority lane");
				},
			}
		}
		loop {
			match self.state.get() {
				current @ (MailboxState::Empty | MailboxState::Blocked) => {
					if self.state.transition(current, MailboxState::Ready) {
						return PushResult::Unblocked;
					}
				},
				MailboxState::Ready => return PushResult::Queued,
				// The actor terminated between the lane write and the state
				// check; the envelope will be discarded with the mailbox.
				MailboxState::Closed => return PushResult::Closed,
			}
		}
	}

	/// Dequeues the next envelope, draining the high lane before the
	/// normal lane.
	///
	/// Must only be called by the worker currently executing the owning
	/// actor. Returns `None` once both lanes are empty, transitioning the
	/// mailbox to `Blocked` (unless it is closed).
	pub fn pop(&self) -> Option<Envelope> {
		loop {
			if let Ok(envelope) = self.high_rx.try_recv() {
				return Some(envelope);
			}
			if let Ok(envelope) = self.normal_rx.try_recv() {
				return Some(envelope);
			}
			match self.state.get() {
				MailboxState::Closed => return None,
				MailboxState::Ready => {
					if !self.state.transition(MailboxState::Ready, MailboxState::Blocked) {
						// Closed under us.
						return None;
					}
					if self.is_empty() {
						return None;
					}
					// A producer slipped an envelope in between the lane
					// check and the blocking transition. Whoever wins this
					// race owns the scheduling token.
					if self.state.transition(MailboxState::Blocked, MailboxState::Ready) {
						continue;
					}
					return None;
				},
				// Pops on a mailbox that was never scheduled (drains, tests).
				MailboxState::Empty | MailboxState::Blocked => return None,
			}
		}
	}

	/// Closes the mailbox. Idempotent.
	///
	/// Subsequent pushes are rejected; already pending envelopes remain
	/// poppable until drained.
	pub fn close(&self) {
		self.state.close();
	}

	/// Removes and returns every pending envelope, high lane first.
	pub fn drain_pending(&self) -> Vec<Envelope> {
		let mut envelopes: Vec<Envelope> = self.high_rx.try_iter().collect();
		envelopes.extend(self.normal_rx.try_iter());
		envelopes
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Message, MessageId};

	fn normal_envelope(tag: usize) -> Envelope {
		Envelope::new(None, MessageId::default(), Message::new(tag))
	}

	fn high_envelope(tag: usize) -> Envelope {
		Envelope::new(None, MessageId::default().with_high_priority(), Message::new(tag))
	}

	#[test]
	fn test_first_push_unblocks_then_queues() {
		let mailbox = Mailbox::new(QueueCapacity::Unbounded);
		assert_eq!(mailbox.state(), MailboxState::Empty);
		assert_eq!(mailbox.push(normal_envelope(1)), PushResult::Unblocked);
		assert_eq!(mailbox.push(normal_envelope(2)), PushResult::Queued);
		assert_eq!(mailbox.state(), MailboxState::Ready);
	}

	#[test]
	fn test_pop_drains_then_blocks_and_push_unblocks_again() {
		let mailbox = Mailbox::new(QueueCapacity::Unbounded);
		mailbox.push(normal_envelope(1));
		assert!(mailbox.pop().is_some());
		assert!(mailbox.pop().is_none());
		assert_eq!(mailbox.state(), MailboxState::Blocked);
		assert_eq!(mailbox.push(normal_envelope(2)), PushResult::Unblocked);
	}

	#[test]
	fn test_high_priority_overtakes_earlier_normal_messages() {
		let mailbox = Mailbox::new(QueueCapacity::Unbounded);
		for tag in 0..100 {
			mailbox.push(normal_envelope(tag));
		}
		mailbox.push(high_envelope(999));
		let first = mailbox.pop().unwrap();
		assert_eq!(*first.message_typed::<usize>().unwrap(), 999);
		for tag in 0..100 {
			let envelope = mailbox.pop().unwrap();
			assert_eq!(*envelope.message_typed::<usize>().unwrap(), tag);
		}
		assert!(mailbox.pop().is_none());
	}

	#[test]
	fn test_per_lane_fifo() {
		let mailbox = Mailbox::new(QueueCapacity::Unbounded);
		for tag in 0..10 {
			mailbox.push(high_envelope(tag));
		}
		for tag in 0..10 {
			assert_eq!(*mailbox.pop().unwrap().message_typed::<usize>().unwrap(), tag);
		}
	}

	#[test]
	fn test_close_rejects_pushes_but_drains_pending() {
		let mailbox = Mailbox::new(QueueCapacity::Unbounded);
		mailbox.push(normal_envelope(1));
		mailbox.push(normal_envelope(2));
		mailbox.close();
		mailbox.close();
		assert_eq!(mailbox.push(normal_envelope(3)), PushResult::Closed);
		assert!(mailbox.pop().is_some());
		assert!(mailbox.pop().is_some());
		assert!(mailbox.pop().is_none());
		assert_eq!(mailbox.push(normal_envelope(4)), PushResult::Closed);
	}

	#[test]
	fn test_bounded_normal_lane_rejects_overflow() {
		let mailbox = Mailbox::new(QueueCapacity::Bounded(2));
		assert_eq!(mailbox.push(normal_envelope(1)), PushResult::Unblocked);
		assert_eq!(mailbox.push(normal_envelope(2)), PushResult::Queued);
		assert_eq!(mailbox.push(normal_envelope(3)), PushResult::Full);
		// The high lane is never bounded.
		assert_eq!(mailbox.push(high_envelope(4)), PushResult::Queued);
	}

	#[test]
	fn test_drain_pending_returns_high_lane_first() {
		let mailbox = Mailbox::new(QueueCapacity::Unbounded);
		mailbox.push(normal_envelope(1));
		mailbox.push(high_envelope(2));
		let drained = mailbox.drain_pending();
		assert_eq!(drained.len(), 2);
		assert_eq!(*drained[0].message_typed::<usize>().unwrap(), 2);
		assert_eq!(*drained[1].message_typed::<usize>().unwrap(), 1);
		assert!(mailbox.is_empty());
	}

	#[test]
	fn test_concurrent_producers_keep_per_producer_fifo() {
		use std::sync::Arc;

		let mailbox = Arc::new(Mailbox::new(QueueCapacity::Unbounded));
		let producers: Vec<_> = (0..4u64)
			.map(|producer| {
				let mailbox = mailbox.clone();
				std::thread::spawn(move || {
					for seq in 0..1000u64 {
						mailbox.push(Envelope::new(
							None,
							MessageId::default(),
							Message::new((producer, seq)),
						));
					}
				})
			})
			.collect();
		for producer in producers {
			producer.join().unwrap();
		}
		let mut last_seen = [None::<u64>; 4];
		let mut total = 0;
		while let Some(envelope) = mailbox.pop() {
			let (producer, seq) = *envelope.message_typed::<(u64, u64)>().unwrap();
			let expected = last_seen[producer as usize].map(|seq| seq + 1).unwrap_or(0);
			assert_eq!(seq, expected, "producer {producer} out of order");
			last_seen[producer as usize] = Some(seq);
			total += 1;
		}
		assert_eq!(total, 4000);
	}
}
