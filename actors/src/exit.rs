// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2024 The actors Authors

use std::fmt;

/// Why an actor terminated.
///
/// Any 32-bit value; zero means a normal exit. A handful of low values are
/// reserved by the runtime, everything else is application-defined. Normal
/// exits are not propagated through links (monitors are still notified).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct ExitReason(pub u32);

impl ExitReason {
	/// Normal completion.
	pub const NORMAL: ExitReason = ExitReason(0);
	/// The actor received a message its behavior did not recognize and its
	/// policy was `ExitWithUnhandled`.
	pub const UNHANDLED_MESSAGE: ExitReason = ExitReason(1);
	/// Application-requested stop. Reserved as a conventional reason for
	/// callers; the system's own shutdown broadcasts a normal exit.
	pub const USER_SHUTDOWN: ExitReason = ExitReason(2);
	/// Unconditional kill.
	pub const KILL: ExitReason = ExitReason(3);

	pub fn is_normal(self) -> bool {
		self == ExitReason::NORMAL
	}

	pub fn as_u32(self) -> u32 {
		self.0
	}
}

impl From<u32> for ExitReason {
	fn from(raw: u32) -> ExitReason {
		ExitReason(raw)
	}
}

impl fmt::Display for ExitReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.0 {
			0 => write!(f, "normal"),
			1 => write!(f, "unhandled-message"),
			2 => write!(f, "user-shutdown"),
			3 => write!(f, "kill"),
			other => write!(f, "exit({other})"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_only_zero_is_normal() {
		assert!(ExitReason::NORMAL.is_normal());
		assert!(!ExitReason::KILL.is_normal());
		assert!(!ExitReason::from(7).is_normal());
	}

	#[test]
	fn test_display() {
		assert_eq!(ExitReason::NORMAL.to_string(), "normal");
		assert_eq!(ExitReason::from(42).to_string(), "exit(42)");
	}
}
