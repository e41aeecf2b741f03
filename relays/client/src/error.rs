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

//! Errors that can occur when interacting with a chain node.

use jsonrpsee::core::ClientError as RpcError;
use spin_relay_utils::MaybeConnectionError;
use std::time::Duration;
use thiserror::Error;

/// Error code the pool returns when a transaction with the same nonce and a
/// higher or equal priority is already in it.
const POOL_TOO_LOW_PRIORITY: i32 = 1014;

/// Result type used by the client.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a chain node or waiting for a
/// submitted transaction.
#[derive(Debug, Error)]
pub enum Error {
	/// An error that has occurred in the underlying RPC transport.
	#[error("RPC error: {0}")]
	RpcError(#[from] RpcError),
	/// The response could not be decoded.
	#[error("response decode error: {0}")]
	Decode(String),
	/// The transaction was rejected by the pool as invalid.
	#[error("{label} transaction is invalid")]
	TransactionInvalid {
		/// Label of the submission, for logs.
		label: String,
	},
	/// The transaction has been dropped from the pool.
	#[error("{label} transaction has been dropped from the pool")]
	TransactionDropped {
		/// Label of the submission, for logs.
		label: String,
	},
	/// Another transaction of the same signer and nonce has replaced ours.
	#[error("{label} transaction has been usurped")]
	TransactionUsurped {
		/// Label of the submission, for logs.
		label: String,
	},
	/// The transaction was included, but its dispatch has failed.
	#[error("{label} has failed to dispatch: {section}.{name}")]
	Dispatch {
		/// Label of the submission, for logs.
		label: String,
		/// Runtime module that rejected the call.
		section: String,
		/// Error name within that module.
		name: String,
	},
	/// The transaction was not finalized within the submission timeout.
	#[error("{label} has timed out after {timeout:?}")]
	Timeout {
		/// Label of the submission, for logs.
		label: String,
		/// The elapsed timeout.
		timeout: Duration,
	},
	/// The status subscription has ended before a terminal status arrived.
	#[error("status stream of {label} has ended unexpectedly")]
	StatusStreamEnded {
		/// Label of the submission, for logs.
		label: String,
	},
	/// The background RPC task has been terminated.
	#[error("background RPC task has been canceled")]
	Canceled,
	/// Custom error.
	#[error("{0}")]
	Custom(String),
}

impl Error {
	/// True for transient errors that a bounded resubmission retry may fix:
	/// pool priority races and submission timeouts.
	pub fn is_pool_error(&self) -> bool {
		match self {
			Error::RpcError(RpcError::Call(error)) =>
				error.code() == POOL_TOO_LOW_PRIORITY ||
					error.message().contains("Priority is too low"),
			Error::Timeout { .. } => true,
			_ => false,
		}
	}

	/// True if the dispatch error says the submitted proof was signed by an
	/// authority set other than the one the target chain currently holds.
	pub fn is_authority_set_mismatch(&self) -> bool {
		matches!(self, Error::Dispatch { name, .. } if name == "AuthoritySetMismatch")
	}
}

impl MaybeConnectionError for Error {
	fn is_connection_error(&self) -> bool {
		matches!(
			self,
			Error::RpcError(RpcError::Transport(_)) |
				Error::RpcError(RpcError::RestartNeeded(_)) |
				Error::Canceled
		)
	}
}
