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

//! Chain-agnostic types exchanged with the nodes.
//!
//! The nodes speak hex-encoded JSON; all shape probing of their responses
//! lives in the (de)serializers here, so that the rest of the relay works
//! with plain typed values.

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Block number of the bridged chains.
pub type BlockNumber = u64;

/// Authority set id.
pub type SetId = u64;

/// Transaction nonce.
pub type Nonce = u32;

/// Id of a block: its number plus its hash.
pub type HeaderId = spin_relay_utils::HeaderId<Hash, BlockNumber>;

/// 32-byte block hash, rendered as 0x-prefixed hex.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Hash(pub [u8; 32]);

impl fmt::Debug for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}

impl fmt::Display for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

impl Hash {
	/// Parse a 0x-prefixed hex string.
	pub fn from_hex(value: &str) -> Result<Self, String> {
		let value = value.strip_prefix("0x").unwrap_or(value);
		let bytes = hex::decode(value).map_err(|e| format!("invalid hash hex: {e}"))?;
		let bytes: [u8; 32] =
			bytes.try_into().map_err(|_| "hash is not 32 bytes".to_string())?;
		Ok(Hash(bytes))
	}
}

impl Serialize for Hash {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
	}
}

impl<'de> Deserialize<'de> for Hash {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let value = String::deserialize(deserializer)?;
		Hash::from_hex(&value).map_err(D::Error::custom)
	}
}

/// Opaque byte payload, hex-encoded on the wire.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);

impl fmt::Debug for Bytes {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Bytes({} bytes)", self.0.len())
	}
}

impl Serialize for Bytes {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&format!("0x{}", hex::encode(&self.0)))
	}
}

impl<'de> Deserialize<'de> for Bytes {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let value = String::deserialize(deserializer)?;
		let value = value.strip_prefix("0x").unwrap_or(&value);
		hex::decode(value).map(Bytes).map_err(D::Error::custom)
	}
}

/// Header view that the relay needs: number and parent linkage.
///
/// Nodes return numbers as hex strings in header notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
	/// Block number.
	pub number: BlockNumber,
	/// Hash of the parent block.
	pub parent_hash: Hash,
}

impl<'de> Deserialize<'de> for Header {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		#[derive(Deserialize)]
		#[serde(rename_all = "camelCase")]
		struct Raw {
			number: String,
			parent_hash: Hash,
		}

		let raw = Raw::deserialize(deserializer)?;
		let number = raw.number.strip_prefix("0x").unwrap_or(&raw.number);
		let number = BlockNumber::from_str_radix(number, 16)
			.map_err(|e| D::Error::custom(format!("invalid header number: {e}")))?;
		Ok(Header { number, parent_hash: raw.parent_hash })
	}
}

/// Status of a submitted transaction, as reported by the node's watch
/// subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
	/// Accepted into the pool.
	Ready,
	/// Broadcast to peers.
	Broadcast,
	/// Included in the given block.
	InBlock(Hash),
	/// The including block was retracted.
	Retracted(Hash),
	/// Included in a now-finalized block.
	Finalized(Hash),
	/// The including block did not finalize in time.
	FinalityTimeout(Hash),
	/// Rejected as invalid.
	Invalid,
	/// Dropped from the pool.
	Dropped,
	/// Replaced by another transaction of the same signer and nonce.
	Usurped(Hash),
	/// The transaction was included but its dispatch failed.
	DispatchError {
		/// Runtime module that rejected the call.
		section: String,
		/// Error name within that module.
		name: String,
	},
	/// A status this relay does not know about.
	Unknown(String),
}

impl<'de> Deserialize<'de> for SubmissionStatus {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		// nodes send either a bare string ("ready") or a single-key object
		// ({"inBlock": "0x..."}), so decode through a generic value
		let value = serde_json::Value::deserialize(deserializer)?;
		match value {
			serde_json::Value::String(status) => Ok(match status.as_str() {
				"ready" => SubmissionStatus::Ready,
				"broadcast" => SubmissionStatus::Broadcast,
				"invalid" => SubmissionStatus::Invalid,
				"dropped" => SubmissionStatus::Dropped,
				_ => SubmissionStatus::Unknown(status),
			}),
			serde_json::Value::Object(map) => {
				let (key, value) = map
					.into_iter()
					.next()
					.ok_or_else(|| D::Error::custom("empty status object"))?;
				let hash_of = |value: serde_json::Value| {
					serde_json::from_value::<Hash>(value)
						.map_err(|e| D::Error::custom(format!("bad status hash: {e}")))
				};
				match key.as_str() {
					"broadcast" => Ok(SubmissionStatus::Broadcast),
					"inBlock" => Ok(SubmissionStatus::InBlock(hash_of(value)?)),
					"retracted" => Ok(SubmissionStatus::Retracted(hash_of(value)?)),
					"finalized" => Ok(SubmissionStatus::Finalized(hash_of(value)?)),
					"finalityTimeout" => Ok(SubmissionStatus::FinalityTimeout(hash_of(value)?)),
					"usurped" => Ok(SubmissionStatus::Usurped(hash_of(value)?)),
					"dispatchError" => {
						#[derive(Deserialize)]
						struct DispatchError {
							section: String,
							name: String,
						}
						let error: DispatchError = serde_json::from_value(value)
							.map_err(|e| D::Error::custom(format!("bad dispatch error: {e}")))?;
						Ok(SubmissionStatus::DispatchError {
							section: error.section,
							name: error.name,
						})
					},
					_ => Ok(SubmissionStatus::Unknown(key)),
				}
			},
			other => Err(D::Error::custom(format!("unexpected status value: {other}"))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn decode_status(json: &str) -> SubmissionStatus {
		serde_json::from_str(json).unwrap()
	}

	#[test]
	fn decodes_string_statuses() {
		assert_eq!(decode_status("\"ready\""), SubmissionStatus::Ready);
		assert_eq!(decode_status("\"broadcast\""), SubmissionStatus::Broadcast);
		assert_eq!(decode_status("\"invalid\""), SubmissionStatus::Invalid);
		assert_eq!(decode_status("\"dropped\""), SubmissionStatus::Dropped);
	}

	#[test]
	fn decodes_object_statuses() {
		let hash = "0x0101010101010101010101010101010101010101010101010101010101010101";
		assert_eq!(
			decode_status(&format!("{{\"inBlock\": \"{hash}\"}}")),
			SubmissionStatus::InBlock(Hash([1; 32])),
		);
		assert_eq!(
			decode_status(&format!("{{\"finalized\": \"{hash}\"}}")),
			SubmissionStatus::Finalized(Hash([1; 32])),
		);
		assert_eq!(
			decode_status(&format!("{{\"usurped\": \"{hash}\"}}")),
			SubmissionStatus::Usurped(Hash([1; 32])),
		);
	}

	#[test]
	fn decodes_dispatch_error() {
		assert_eq!(
			decode_status("{\"dispatchError\": {\"section\": \"spinPolkadot\", \"name\": \"AuthoritySetMismatch\"}}"),
			SubmissionStatus::DispatchError {
				section: "spinPolkadot".into(),
				name: "AuthoritySetMismatch".into(),
			},
		);
	}

	#[test]
	fn unknown_statuses_do_not_fail_decoding() {
		assert_eq!(
			decode_status("\"futureStatus\""),
			SubmissionStatus::Unknown("futureStatus".into()),
		);
		assert_eq!(
			decode_status("{\"somethingNew\": 42}"),
			SubmissionStatus::Unknown("somethingNew".into()),
		);
	}

	#[test]
	fn decodes_header() {
		let header: Header = serde_json::from_str(
			"{\"number\": \"0x2a\", \"parentHash\": \
			 \"0x0202020202020202020202020202020202020202020202020202020202020202\", \
			 \"stateRoot\": \"0x00\"}",
		)
		.unwrap();
		assert_eq!(header, Header { number: 42, parent_hash: Hash([2; 32]) });
	}

	#[test]
	fn hash_hex_round_trip() {
		let hash = Hash([7; 32]);
		let encoded = serde_json::to_string(&hash).unwrap();
		assert_eq!(serde_json::from_str::<Hash>(&encoded).unwrap(), hash);
	}
}
