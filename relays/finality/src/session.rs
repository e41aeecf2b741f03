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

//! One relay session over a connected pair of clients.
//!
//! The session owns all per-connection state: the authority set cache, the
//! submission queues and the coalescing proof runner. When the connection to
//! either node is lost, the whole session is discarded and the supervisor
//! builds a fresh one over reconnected clients.

use crate::{
	authority_set::AuthorityCache,
	authority_tracker::AuthorityTracker,
	forwarder::ProofForwarder,
	FinalityProof, HeadersStream, ProofsStream, RelayError, SetIdsStream, SourceClient,
	TargetClient,
};

use futures::{channel::mpsc, future::FutureExt, select, stream, StreamExt};
use spin_relay_client::Header;
use spin_relay_utils::{
	FailedClient, LatestTaskRunner, MaybeConnectionError, RetryParams, SerialQueue,
};

/// Parameters of a relay session.
#[derive(Debug, Clone, Default)]
pub struct SessionParams {
	/// Submission retry parameters, shared by both chains.
	pub retry: RetryParams,
}

/// A live relay session.
pub struct RelaySession<SC, TC> {
	source: SC,
	proof_runner: LatestTaskRunner,
	source_queue: SerialQueue,
	target_queue: SerialQueue,
	forwarder: ProofForwarder<SC, TC>,
	tracker: AuthorityTracker<SC, TC>,
	fatal_sender: mpsc::UnboundedSender<FailedClient>,
	fatal_receiver: mpsc::UnboundedReceiver<FailedClient>,
}

impl<SC, TC> RelaySession<SC, TC>
where
	SC: SourceClient,
	TC: TargetClient,
	SC::Error: RelayError,
	TC::Error: RelayError,
{
	/// Build a session with fresh state over the given clients.
	pub fn new(source: SC, target: TC, params: SessionParams) -> Self {
		let cache = AuthorityCache::new();
		let source_queue = SerialQueue::new("fastchain");
		let target_queue = SerialQueue::new("parachain");
		let forwarder = ProofForwarder::new(
			source.clone(),
			target.clone(),
			cache.clone(),
			source_queue.clone(),
			target_queue.clone(),
			params.retry.clone(),
		);
		let tracker = AuthorityTracker::new(
			source.clone(),
			target,
			cache,
			target_queue.clone(),
			params.retry,
		);
		let (fatal_sender, fatal_receiver) = mpsc::unbounded();

		RelaySession {
			source,
			proof_runner: LatestTaskRunner::new("proof-forwarding"),
			source_queue,
			target_queue,
			forwarder,
			tracker,
			fatal_sender,
			fatal_receiver,
		}
	}

	/// Run the session until the exit signal fires or a connection breaks.
	///
	/// In both cases in-flight submissions are drained before returning, so
	/// the owner may safely drop the clients afterwards.
	pub async fn run(
		mut self,
		exit_signal: impl futures::Future<Output = ()> + Send,
	) -> Result<(), FailedClient> {
		let result = self.run_until_connection_lost(exit_signal).await;

		log::debug!(target: "bridge", "Draining in-flight submissions");
		self.proof_runner.drain().await;
		self.target_queue.drain().await;
		self.source_queue.drain().await;

		result
	}

	async fn run_until_connection_lost(
		&mut self,
		exit_signal: impl futures::Future<Output = ()> + Send,
	) -> Result<(), FailedClient> {
		if let Err(error) = self.tracker.initial_sync().await {
			// the first forwarded proof reconciles the set anyway
			log::warn!(
				target: "bridge",
				"Failed to synchronize the initial authority set: {}",
				error,
			);
			error.fail_if_connection_error()?;
		}

		// push delivery of decoded proofs is preferred; fall back to pulling
		// a proof per finalized head when the node does not support it
		let (proofs, heads): (ProofsStream, HeadersStream) =
			match self.source.finality_proofs().await {
				Ok(proofs) => {
					log::info!(target: "bridge", "Subscribed to the finality proof stream");
					(proofs, Box::pin(stream::pending()))
				},
				Err(error) => {
					if error.is_connection_error() {
						return Err(FailedClient::Source)
					}
					log::warn!(
						target: "bridge",
						"Finality proof stream is not available ({:?}). \
						 Falling back to finalized heads",
						error,
					);
					let heads = self
						.source
						.finalized_heads()
						.await
						.map_err(|_| FailedClient::Source)?;
					(Box::pin(stream::pending()), heads)
				},
			};

		let set_ids: SetIdsStream = match self.source.authority_set_ids().await {
			Ok(set_ids) => set_ids,
			Err(error) => {
				if error.is_connection_error() {
					return Err(FailedClient::Source)
				}
				// per-proof set resolution covers for the missing stream
				log::info!(
					target: "bridge",
					"Authority set id stream is not available ({:?})",
					error,
				);
				Box::pin(stream::pending())
			},
		};

		let mut proofs = proofs.fuse();
		let mut heads = heads.fuse();
		let mut set_ids = set_ids.fuse();
		let exit_signal = exit_signal.fuse();
		futures::pin_mut!(exit_signal);

		loop {
			select! {
				proof = proofs.next() => match proof {
					Some(proof) => enqueue_forward(
						&self.proof_runner,
						&self.forwarder,
						&self.fatal_sender,
						proof,
					),
					None => {
						log::error!(target: "bridge", "Finality proof stream has ended");
						return Err(FailedClient::Source)
					},
				},
				head = heads.next() => match head {
					Some(head) => enqueue_pull_and_forward(
						&self.source,
						&self.proof_runner,
						&self.forwarder,
						&self.fatal_sender,
						head,
					),
					None => {
						log::error!(target: "bridge", "Finalized heads stream has ended");
						return Err(FailedClient::Source)
					},
				},
				set_id = set_ids.next() => match set_id {
					Some(set_id) => {
						if let Err(error) = self.tracker.on_set_id_change(set_id).await {
							log::error!(
								target: "bridge",
								"Failed to handle authority set change to {}: {}",
								set_id,
								error,
							);
							error.fail_if_connection_error()?;
						}
					},
					None => {
						log::error!(target: "bridge", "Authority set id stream has ended");
						return Err(FailedClient::Source)
					},
				},
				failure = self.fatal_receiver.next() => {
					return Err(failure.unwrap_or(FailedClient::Source))
				},
				() = exit_signal => {
					log::info!(target: "bridge", "Shutting down the relay session");
					return Ok(())
				},
			}
		}
	}
}

/// Hand a proof to the coalescing runner. If an older proof is still waiting
/// there, it is superseded: anchoring the newer block covers it.
fn enqueue_forward<SC, TC>(
	runner: &LatestTaskRunner,
	forwarder: &ProofForwarder<SC, TC>,
	fatal_sender: &mpsc::UnboundedSender<FailedClient>,
	proof: FinalityProof,
) where
	SC: SourceClient,
	TC: TargetClient,
	SC::Error: RelayError,
	TC::Error: RelayError,
{
	let forwarder = forwarder.clone();
	let fatal_sender = fatal_sender.clone();
	runner.enqueue(async move {
		let target_number = proof.target_number;
		if let Err(error) = forwarder.forward(proof).await {
			log::error!(
				target: "bridge",
				"Failed to forward finality proof for block {}: {}. \
				 The proof is dropped; a future proof will retry the anchoring",
				target_number,
				error,
			);
			if let Err(failed_client) = error.fail_if_connection_error() {
				let _ = fatal_sender.unbounded_send(failed_client);
			}
		}
	});
}

/// Pull-based fallback: ask the node for a proof of the finalized head, then
/// forward it like a pushed proof.
fn enqueue_pull_and_forward<SC, TC>(
	source: &SC,
	runner: &LatestTaskRunner,
	forwarder: &ProofForwarder<SC, TC>,
	fatal_sender: &mpsc::UnboundedSender<FailedClient>,
	head: Header,
) where
	SC: SourceClient,
	TC: TargetClient,
	SC::Error: RelayError,
	TC::Error: RelayError,
{
	let source = source.clone();
	let forwarder = forwarder.clone();
	let fatal_sender = fatal_sender.clone();
	runner.enqueue(async move {
		let pulled = async {
			let target_hash = source.block_hash(head.number).await?;
			let raw = source.prove_finality(head.number).await?;
			Ok(raw.map(|raw| FinalityProof { target_number: head.number, target_hash, raw }))
		}
		.await;

		let proof = match pulled {
			Ok(Some(proof)) => proof,
			Ok(None) => {
				log::debug!(
					target: "bridge",
					"No finality proof is available for block {}",
					head.number,
				);
				return
			},
			Err(error) => {
				let is_fatal = SC::Error::is_connection_error(&error);
				log::error!(
					target: "bridge",
					"Failed to pull finality proof for block {}: {:?}",
					head.number,
					error,
				);
				if is_fatal {
					let _ = fatal_sender.unbounded_send(FailedClient::Source);
				}
				return
			},
		};

		let target_number = proof.target_number;
		if let Err(error) = forwarder.forward(proof).await {
			log::error!(
				target: "bridge",
				"Failed to forward finality proof for block {}: {}",
				target_number,
				error,
			);
			if let Err(failed_client) = error.fail_if_connection_error() {
				let _ = fatal_sender.unbounded_send(failed_client);
			}
		}
	});
}
