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

//! Fastchain node as the source of finality proofs.

use crate::transactions::sign_and_submit;

use async_trait::async_trait;
use codec::{Decode, Encode};
use futures::{stream, StreamExt};
use spin_finality_relay::{
	AuthorityEntry, AuthorityId, HeadersStream, ProofsStream, SetIdsStream, SourceClient,
};
use spin_relay_client::{
	rpc::{Client, ConnectionParams},
	BlockNumber, Bytes, Error, Hash, Header, SetId, TransactionSigner,
};
use spin_relay_utils::relay_loop::Client as RelayClient;
use std::{sync::Arc, time::Duration};

/// Runtime API returning the current authority set of the finality gadget.
const GRANDPA_AUTHORITIES_METHOD: &str = "GrandpaApi_grandpa_authorities";
/// Runtime API returning the current authority set id.
const CURRENT_SET_ID_METHOD: &str = "GrandpaApi_current_set_id";
/// Module and call indices of `spin_anchoring::note_anchor_verified`.
const NOTE_ANCHOR_VERIFIED_CALL: (u8, u8) = (51, 0);

/// Prefix of an encoded justification, enough to learn its target block.
#[derive(Decode)]
struct JustificationPrefix {
	_round: u64,
	target_hash: [u8; 32],
	target_number: u64,
}

/// Prefix of the `grandpa_proveFinality` response: the proof envelope wraps
/// the justification together with the proven block hash and any unknown
/// headers. Only the justification is submittable; the trailing headers are
/// left undecoded.
#[derive(Decode)]
struct FinalityProofEnvelope {
	_block: [u8; 32],
	justification: Vec<u8>,
}

/// Fastchain client.
#[derive(Clone)]
pub struct FastchainClient {
	client: Client,
	signer: Arc<dyn TransactionSigner>,
	tx_timeout: Duration,
}

impl FastchainClient {
	/// Connect to the fastchain node.
	pub async fn new(
		params: ConnectionParams,
		signer: Arc<dyn TransactionSigner>,
		tx_timeout: Duration,
	) -> Result<Self, Error> {
		Ok(FastchainClient { client: Client::new(params).await?, signer, tx_timeout })
	}

	async fn current_set_id(&self, at: Option<Hash>) -> Result<SetId, Error> {
		let raw = self.client.state_call(CURRENT_SET_ID_METHOD, Bytes(Vec::new()), at).await?;
		SetId::decode(&mut &raw.0[..])
			.map_err(|e| Error::Decode(format!("malformed set id: {e}")))
	}
}

#[async_trait]
impl RelayClient for FastchainClient {
	type Error = Error;

	async fn reconnect(&mut self) -> Result<(), Error> {
		self.client.reconnect().await
	}
}

#[async_trait]
impl SourceClient for FastchainClient {
	async fn authority_set_id(&self, at: Option<Hash>) -> Result<SetId, Error> {
		self.current_set_id(at).await
	}

	async fn authorities(&self, at: Option<Hash>) -> Result<Vec<AuthorityEntry>, Error> {
		let raw = self
			.client
			.state_call(GRANDPA_AUTHORITIES_METHOD, Bytes(Vec::new()), at)
			.await?;
		let authorities = Vec::<([u8; 32], u64)>::decode(&mut &raw.0[..])
			.map_err(|e| Error::Decode(format!("malformed authority set: {e}")))?;
		Ok(authorities
			.into_iter()
			.map(|(id, weight)| AuthorityEntry { id: AuthorityId(id), weight })
			.collect())
	}

	async fn header(&self, hash: Hash) -> Result<Header, Error> {
		self.client.header(hash).await
	}

	async fn block_hash(&self, number: BlockNumber) -> Result<Hash, Error> {
		self.client.block_hash(number).await
	}

	async fn finality_proofs(&self) -> Result<ProofsStream, Error> {
		let justifications = self.client.subscribe_justifications().await?;
		Ok(justifications
			.filter_map(|raw| async move {
				match JustificationPrefix::decode(&mut &raw.0[..]) {
					Ok(prefix) => Some(spin_finality_relay::FinalityProof {
						target_number: prefix.target_number,
						target_hash: Hash(prefix.target_hash),
						raw,
					}),
					Err(error) => {
						log::error!(
							target: "bridge",
							"Failed to decode justification target: {:?}. Skipping",
							error,
						);
						None
					},
				}
			})
			.boxed())
	}

	async fn finalized_heads(&self) -> Result<HeadersStream, Error> {
		Ok(self.client.subscribe_finalized_heads().await?.boxed())
	}

	async fn authority_set_ids(&self) -> Result<SetIdsStream, Error> {
		// the node has no dedicated set id subscription, so derive one from
		// finalized heads and report only actual changes
		let heads = self.client.subscribe_finalized_heads().await?;
		let client = self.clone();
		Ok(stream::unfold(
			(client, heads, None),
			|(client, mut heads, mut last_set_id)| async move {
				loop {
					let head = heads.next().await?;
					let set_id = async {
						let hash = client.client.block_hash(head.number).await?;
						client.current_set_id(Some(hash)).await
					}
					.await;

					match set_id {
						Ok(set_id) if last_set_id != Some(set_id) => {
							last_set_id = Some(set_id);
							return Some((set_id, (client, heads, last_set_id)))
						},
						Ok(_) => continue,
						Err(error) => {
							log::warn!(
								target: "bridge",
								"Failed to read the set id at block {}: {:?}",
								head.number,
								error,
							);
							continue
						},
					}
				}
			},
		)
		.boxed())
	}

	async fn prove_finality(&self, number: BlockNumber) -> Result<Option<Bytes>, Error> {
		// the node wraps the justification in a proof envelope; the parachain
		// only accepts the justification itself
		let envelope = match self.client.prove_finality(number).await? {
			Some(envelope) => envelope,
			None => return Ok(None),
		};
		let envelope = FinalityProofEnvelope::decode(&mut &envelope.0[..])
			.map_err(|e| Error::Decode(format!("malformed finality proof envelope: {e}")))?;
		Ok(Some(Bytes(envelope.justification)))
	}

	async fn note_anchored(&self, up_to: BlockNumber) -> Result<(), Error> {
		let call =
			(NOTE_ANCHOR_VERIFIED_CALL.0, NOTE_ANCHOR_VERIFIED_CALL.1, up_to).encode();
		sign_and_submit(
			&self.client,
			&self.signer,
			&format!("anchoring acknowledgment for block {up_to}"),
			call,
			self.tx_timeout,
		)
		.await
	}
}
