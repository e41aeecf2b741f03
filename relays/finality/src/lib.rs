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

//! Fastchain -> parachain finality proof relay.
//!
//! The relay keeps the parachain's copy of the fastchain authority set
//! correct and forwards every fastchain finality proof to the parachain,
//! acknowledging each anchored block back on the fastchain. Proofs are never
//! persisted: the fastchain redelivers justifications for blocks it has not
//! seen acknowledged, so delivery is at-least-once across restarts.

pub mod authority_set;
pub mod authority_tracker;
pub mod forwarder;
pub mod session;
pub mod supervisor;

#[cfg(test)]
mod mock;

use async_trait::async_trait;
use futures::Stream;
use spin_relay_client::{BlockNumber, Bytes, Hash, Header, SetId};
use spin_relay_utils::{relay_loop::Client as RelayClient, FailedClient, MaybeConnectionError};
use std::{fmt::Debug, pin::Pin};

pub use authority_set::{AuthorityEntry, AuthorityId, AuthoritySetSnapshot};
pub use session::{RelaySession, SessionParams};

/// Finality proof for a single fastchain block, with its target decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalityProof {
	/// Number of the finalized block.
	pub target_number: BlockNumber,
	/// Hash of the finalized block.
	pub target_hash: Hash,
	/// The proof itself, opaque to the relay.
	pub raw: Bytes,
}

/// Stream of finality proofs.
pub type ProofsStream = Pin<Box<dyn Stream<Item = FinalityProof> + Send>>;

/// Stream of finalized headers.
pub type HeadersStream = Pin<Box<dyn Stream<Item = Header> + Send>>;

/// Stream of authority set ids.
pub type SetIdsStream = Pin<Box<dyn Stream<Item = SetId> + Send>>;

/// Classification the pipeline needs from client errors, on top of the
/// connection error detection every relay client has.
pub trait RelayError: MaybeConnectionError + Debug + Send + Sync + 'static {
	/// True for transient submission failures (pool priority races,
	/// submission timeouts) that a bounded retry may fix.
	fn is_pool_error(&self) -> bool;

	/// True if the target chain rejected a proof because it holds a
	/// different authority set.
	fn is_authority_set_mismatch(&self) -> bool;
}

/// Fastchain client, as the pipeline sees it.
#[async_trait]
pub trait SourceClient: RelayClient {
	/// Return the authority set id active at the given block (or at the best
	/// block).
	async fn authority_set_id(&self, at: Option<Hash>) -> Result<SetId, Self::Error>;

	/// Return the authority set active at the given block (or at the best
	/// block).
	async fn authorities(&self, at: Option<Hash>) -> Result<Vec<AuthorityEntry>, Self::Error>;

	/// Return the header of the given block.
	async fn header(&self, hash: Hash) -> Result<Header, Self::Error>;

	/// Return the hash of the block with the given number.
	async fn block_hash(&self, number: BlockNumber) -> Result<Hash, Self::Error>;

	/// Subscribe to finality proofs. This is the preferred delivery
	/// strategy; not every node supports it.
	async fn finality_proofs(&self) -> Result<ProofsStream, Self::Error>;

	/// Subscribe to finalized heads, for the pull-based fallback strategy.
	async fn finalized_heads(&self) -> Result<HeadersStream, Self::Error>;

	/// Subscribe to authority set id changes.
	async fn authority_set_ids(&self) -> Result<SetIdsStream, Self::Error>;

	/// Ask the node for a finality proof of the given block.
	async fn prove_finality(&self, number: BlockNumber)
		-> Result<Option<Bytes>, Self::Error>;

	/// Tell the fastchain that all its blocks up to the given number are
	/// anchored at the parachain. Resolves when the transaction is finalized.
	async fn note_anchored(&self, up_to: BlockNumber) -> Result<(), Self::Error>;
}

/// Parachain client, as the pipeline sees it.
#[async_trait]
pub trait TargetClient: RelayClient {
	/// Return the fastchain authority set the parachain currently holds,
	/// if any has been submitted yet.
	async fn current_authority_set(
		&self,
	) -> Result<Option<AuthoritySetSnapshot>, Self::Error>;

	/// Replace the parachain's copy of the fastchain authority set.
	/// Resolves when the transaction is finalized.
	async fn submit_authority_set(
		&self,
		set: AuthoritySetSnapshot,
	) -> Result<(), Self::Error>;

	/// Submit a finality proof, claiming it is signed by the given set.
	/// Resolves when the transaction is finalized.
	async fn submit_finality_proof(
		&self,
		set_id: SetId,
		proof: Bytes,
	) -> Result<(), Self::Error>;
}

/// Error of the relay pipeline, keeping both client error types apart.
#[derive(Debug)]
pub enum Error<SE, TE> {
	/// An error of the fastchain client.
	Source(SE),
	/// An error of the parachain client.
	Target(TE),
	/// A submission queue was shut down while the task was queued.
	ShuttingDown,
}

impl<SE: Debug, TE: Debug> std::fmt::Display for Error<SE, TE> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::Source(error) => write!(f, "fastchain client error: {error:?}"),
			Error::Target(error) => write!(f, "parachain client error: {error:?}"),
			Error::ShuttingDown => write!(f, "the relay is shutting down"),
		}
	}
}

impl<SE, TE> Error<SE, TE>
where
	SE: MaybeConnectionError,
	TE: MaybeConnectionError,
{
	/// Escalate connection errors to the supervisor; everything else is a
	/// task-level failure.
	pub fn fail_if_connection_error(&self) -> Result<(), FailedClient> {
		match self {
			Error::Source(error) if error.is_connection_error() => Err(FailedClient::Source),
			Error::Target(error) if error.is_connection_error() => Err(FailedClient::Target),
			_ => Ok(()),
		}
	}
}

impl RelayError for spin_relay_client::Error {
	fn is_pool_error(&self) -> bool {
		spin_relay_client::Error::is_pool_error(self)
	}

	fn is_authority_set_mismatch(&self) -> bool {
		spin_relay_client::Error::is_authority_set_mismatch(self)
	}
}
