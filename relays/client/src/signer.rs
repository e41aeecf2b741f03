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

//! Signing identity used for chain transactions.

/// A deterministic signing identity for one chain.
///
/// The actual signature scheme is a property of the chain; the relay only
/// needs a stable address for nonce queries and a way to sign payloads.
pub trait TransactionSigner: Send + Sync {
	/// Raw public key bytes of the signer.
	fn public(&self) -> Vec<u8>;

	/// Address of the signer in the chain's textual encoding.
	fn address(&self) -> String {
		format!("0x{}", hex::encode(self.public()))
	}

	/// Sign an opaque payload.
	fn sign(&self, payload: &[u8]) -> Vec<u8>;
}
