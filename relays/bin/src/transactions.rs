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

//! Transaction assembly and submission shared by the chain adapters.

use codec::Encode;
use spin_relay_client::{
	rpc::Client, wait_until_finalized, Bytes, Error, Nonce, TransactionSigner,
};
use std::{sync::Arc, time::Duration};

/// Assemble a signed transaction envelope around an encoded call.
///
/// Both chains accept the same dev envelope: length-prefixed public key and
/// signature, the nonce, then the raw call bytes. The signature commits to
/// the nonce and the call.
pub fn build_transaction(signer: &dyn TransactionSigner, nonce: Nonce, call: &[u8]) -> Bytes {
	let mut payload = Vec::with_capacity(call.len() + 4);
	nonce.encode_to(&mut payload);
	payload.extend_from_slice(call);
	let signature = signer.sign(&payload);

	let mut tx = Vec::new();
	signer.public().encode_to(&mut tx);
	signature.encode_to(&mut tx);
	nonce.encode_to(&mut tx);
	tx.extend_from_slice(call);
	Bytes(tx)
}

/// Sign an encoded call with a fresh nonce, submit it and wait until it is
/// finalized or fails.
///
/// The nonce is read from the node right before submission; callers must
/// serialize their submissions per signer (the relay routes everything
/// through per-chain queues).
pub async fn sign_and_submit(
	client: &Client,
	signer: &Arc<dyn TransactionSigner>,
	label: &str,
	call: Vec<u8>,
	timeout: Duration,
) -> Result<(), Error> {
	let nonce = client.next_account_nonce(&signer.address()).await?;
	log::debug!(target: "bridge", "Submitting {} with nonce {}", label, nonce);

	let tx = build_transaction(signer.as_ref(), nonce, &call);
	let statuses = client.submit_and_watch(tx).await?;
	wait_until_finalized(label, timeout, statuses).await.map(drop)
}

/// Development signer: an Ed25519 key derived deterministically from a
/// SURI-style string, matching the dev accounts the test chains are
/// started with.
pub struct DevSigner {
	key: ed25519_dalek::SigningKey,
}

impl DevSigner {
	/// Derive the signer from its SURI (e.g. `//Alice`).
	pub fn from_suri(suri: &str) -> Self {
		use blake2::{digest::consts::U32, Blake2b, Digest};

		let mut hasher = Blake2b::<U32>::new();
		hasher.update(suri.as_bytes());
		let seed: [u8; 32] = hasher.finalize().into();
		DevSigner { key: ed25519_dalek::SigningKey::from_bytes(&seed) }
	}
}

impl TransactionSigner for DevSigner {
	fn public(&self) -> Vec<u8> {
		self.key.verifying_key().to_bytes().to_vec()
	}

	fn sign(&self, payload: &[u8]) -> Vec<u8> {
		use ed25519_dalek::Signer;

		self.key.sign(payload).to_bytes().to_vec()
	}
}
