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

//! Parachain node as the target of finality proofs.

use crate::transactions::sign_and_submit;

use async_trait::async_trait;
use codec::{Decode, Encode};
use spin_finality_relay::{AuthorityEntry, AuthorityId, AuthoritySetSnapshot, TargetClient};
use spin_relay_client::{
	rpc::{Client, ConnectionParams},
	Bytes, Error, SetId, TransactionSigner,
};
use spin_relay_utils::relay_loop::Client as RelayClient;
use std::{sync::Arc, time::Duration};

/// Runtime API returning the fastchain authority set the parachain holds.
const CURRENT_AUTHORITY_SET_METHOD: &str = "SpinFinalityApi_current_authority_set";
/// Module and call indices of `pallet_sudo::sudo`.
const SUDO_CALL: (u8, u8) = (7, 0);
/// Module and call indices of `spin_finality::set_authority_set`.
const SET_AUTHORITY_SET_CALL: (u8, u8) = (52, 0);
/// Module and call indices of `spin_finality::submit_finality_proof`.
const SUBMIT_FINALITY_PROOF_CALL: (u8, u8) = (52, 1);

/// Parachain client.
#[derive(Clone)]
pub struct ParachainClient {
	client: Client,
	signer: Arc<dyn TransactionSigner>,
	tx_timeout: Duration,
}

impl ParachainClient {
	/// Connect to the parachain node.
	pub async fn new(
		params: ConnectionParams,
		signer: Arc<dyn TransactionSigner>,
		tx_timeout: Duration,
	) -> Result<Self, Error> {
		Ok(ParachainClient { client: Client::new(params).await?, signer, tx_timeout })
	}
}

#[async_trait]
impl RelayClient for ParachainClient {
	type Error = Error;

	async fn reconnect(&mut self) -> Result<(), Error> {
		self.client.reconnect().await
	}
}

#[async_trait]
impl TargetClient for ParachainClient {
	async fn current_authority_set(&self) -> Result<Option<AuthoritySetSnapshot>, Error> {
		let raw = self
			.client
			.state_call(CURRENT_AUTHORITY_SET_METHOD, Bytes(Vec::new()), None)
			.await?;
		let set = Option::<(SetId, Vec<([u8; 32], u64)>)>::decode(&mut &raw.0[..])
			.map_err(|e| Error::Decode(format!("malformed stored authority set: {e}")))?;
		Ok(set.map(|(set_id, authorities)| {
			AuthoritySetSnapshot::new(
				set_id,
				authorities
					.into_iter()
					.map(|(id, weight)| AuthorityEntry { id: AuthorityId(id), weight })
					.collect(),
			)
		}))
	}

	async fn submit_authority_set(&self, set: AuthoritySetSnapshot) -> Result<(), Error> {
		let set_id = set.set_id();
		let inner = (
			SET_AUTHORITY_SET_CALL.0,
			SET_AUTHORITY_SET_CALL.1,
			set_id,
			set.to_parachain_format(),
		)
			.encode();
		// set_authority_set is a governance call; wrap it in sudo
		let mut call = (SUDO_CALL.0, SUDO_CALL.1).encode();
		call.extend_from_slice(&inner);
		sign_and_submit(
			&self.client,
			&self.signer,
			&format!("authority set {set_id}"),
			call,
			self.tx_timeout,
		)
		.await
	}

	async fn submit_finality_proof(&self, set_id: SetId, proof: Bytes) -> Result<(), Error> {
		let call =
			(SUBMIT_FINALITY_PROOF_CALL.0, SUBMIT_FINALITY_PROOF_CALL.1, set_id, proof.0)
				.encode();
		sign_and_submit(
			&self.client,
			&self.signer,
			&format!("finality proof of set {set_id}"),
			call,
			self.tx_timeout,
		)
		.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn stored_authority_set_decodes() {
		let encoded = Some((5u64, vec![([1u8; 32], 1u64), ([2u8; 32], 2u64)])).encode();
		let set = Option::<(SetId, Vec<([u8; 32], u64)>)>::decode(&mut &encoded[..]).unwrap();
		let (set_id, authorities) = set.unwrap();
		assert_eq!(set_id, 5);
		assert_eq!(authorities.len(), 2);

		let empty = Option::<(SetId, Vec<([u8; 32], u64)>)>::decode(
			&mut &None::<(SetId, Vec<([u8; 32], u64)>)>.encode()[..],
		)
		.unwrap();
		assert!(empty.is_none());
	}
}
