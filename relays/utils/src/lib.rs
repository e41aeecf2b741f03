// Copyright 2019-2021 Parity Technologies (UK) Ltd.
// This file is part of Spin Bridge.

// Spin Bridge is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Spin Bridge is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Spin Bridge.  If not, see <http://www.gnu.org/licenses/>.

//! Utilities shared by all relay crates: logging setup, retry/backoff,
//! submission ordering primitives and the generic reconnecting relay loop.

pub mod initialize;
pub mod latest_runner;
pub mod relay_loop;
pub mod retry;
pub mod serial_queue;

pub use latest_runner::LatestTaskRunner;
pub use relay_loop::{relay_loop, FailedClient, RECONNECT_DELAY};
pub use retry::{retry_backoff, retry_with_backoff, RetryParams};
pub use serial_queue::{QueueClosed, SerialQueue};

/// Id of a block: its number plus its hash.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeaderId<Hash, Number>(pub Number, pub Hash);

/// Error type that can signal connection errors.
pub trait MaybeConnectionError {
	/// Returns true if error (maybe) represents connection error.
	fn is_connection_error(&self) -> bool;
}
