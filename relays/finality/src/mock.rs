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

//! Mock chain clients shared by the pipeline tests.

use crate::{
	AuthorityEntry, AuthoritySetSnapshot, FinalityProof, HeadersStream, ProofsStream,
	RelayError, SetIdsStream, SourceClient, TargetClient,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use spin_relay_client::{BlockNumber, Bytes, Hash, Header, SetId};
use spin_relay_utils::{relay_loop::Client as RelayClient, MaybeConnectionError};
use std::{
	collections::{HashMap, VecDeque},
	sync::Arc,
};

/// Error of the test clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestError {
	/// Lost connection.
	Connection,
	/// Transient pool failure.
	Pool,
	/// The target rejected the proof's authority set.
	Mismatch,
	/// Any other failure.
	Other,
}

impl MaybeConnectionError for TestError {
	fn is_connection_error(&self) -> bool {
		matches!(self, TestError::Connection)
	}
}

impl RelayError for TestError {
	fn is_pool_error(&self) -> bool {
		matches!(self, TestError::Pool)
	}

	fn is_authority_set_mismatch(&self) -> bool {
		matches!(self, TestError::Mismatch)
	}
}

/// Shared state of the test clients: the chain views plus a record of every
/// call the pipeline makes.
#[derive(Debug, Default)]
pub struct ClientsData {
	/// Set id at the source tip.
	pub source_set_id: SetId,
	/// Authorities at the source tip.
	pub source_authorities: Vec<AuthorityEntry>,
	/// Per-block set id overrides.
	pub source_set_id_at: HashMap<Hash, SetId>,
	/// Per-block authority overrides.
	pub source_authorities_at: HashMap<Hash, Vec<AuthorityEntry>>,
	/// Known headers.
	pub source_headers: HashMap<Hash, Header>,
	/// Known number -> hash mappings.
	pub source_block_hashes: HashMap<BlockNumber, Hash>,
	/// Proofs the node returns from on-demand proving.
	pub source_proofs: HashMap<BlockNumber, Bytes>,
	/// How many times the pipeline fetched authorities from the source.
	pub source_authorities_fetches: u32,
	/// Acknowledged block numbers, in call order.
	pub source_anchored: Vec<BlockNumber>,
	/// Error to fail the next proof subscriptions with.
	pub source_subscribe_error: Option<TestError>,
	/// Source reconnect calls.
	pub source_reconnects: u32,

	/// The authority set record of the target chain.
	pub target_authority_set: Option<AuthoritySetSnapshot>,
	/// How many times the record was read.
	pub target_set_reads: u32,
	/// Every submitted authority set, in call order.
	pub target_submitted_sets: Vec<AuthoritySetSnapshot>,
	/// Every accepted proof submission, in call order.
	pub target_submitted_proofs: Vec<(SetId, Bytes)>,
	/// Errors to fail the next proof submissions with, popped front first.
	pub target_proof_failures: VecDeque<TestError>,
	/// Errors to fail the next set submissions with, popped front first.
	pub target_set_failures: VecDeque<TestError>,
	/// Target reconnect calls.
	pub target_reconnects: u32,
}

/// Streams handed to the source client ahead of time and taken over by the
/// pipeline when it subscribes.
#[derive(Default)]
pub struct TestStreams {
	/// Stream returned by `finality_proofs`.
	pub proofs: Option<ProofsStream>,
	/// Stream returned by `finalized_heads`.
	pub heads: Option<HeadersStream>,
	/// Stream returned by `authority_set_ids`.
	pub set_ids: Option<SetIdsStream>,
}

/// Test source client.
#[derive(Clone)]
pub struct TestSourceClient {
	pub data: Arc<Mutex<ClientsData>>,
	pub streams: Arc<Mutex<TestStreams>>,
}

/// Test target client.
#[derive(Clone)]
pub struct TestTargetClient {
	pub data: Arc<Mutex<ClientsData>>,
}

/// Build a connected pair of test clients over the given data.
pub fn prepare_test_clients(data: ClientsData) -> (TestSourceClient, TestTargetClient) {
	let data = Arc::new(Mutex::new(data));
	(
		TestSourceClient { data: data.clone(), streams: Arc::new(Mutex::new(TestStreams::default())) },
		TestTargetClient { data },
	)
}

/// Make a proof for block `number`, with a recognizable payload.
pub fn proof(number: BlockNumber) -> FinalityProof {
	FinalityProof {
		target_number: number,
		target_hash: hash(number),
		raw: Bytes(vec![number as u8; 4]),
	}
}

/// Deterministic hash for block `number`.
pub fn hash(number: BlockNumber) -> Hash {
	let mut hash = [0u8; 32];
	hash[..8].copy_from_slice(&number.to_le_bytes());
	Hash(hash)
}

/// Authority entry with an id derived from `id_byte`.
pub fn entry(id_byte: u8, weight: u64) -> AuthorityEntry {
	AuthorityEntry { id: crate::AuthorityId([id_byte; 32]), weight }
}

#[async_trait]
impl RelayClient for TestSourceClient {
	type Error = TestError;

	async fn reconnect(&mut self) -> Result<(), TestError> {
		let mut data = self.data.lock();
		data.source_reconnects += 1;
		data.source_subscribe_error = None;
		Ok(())
	}
}

#[async_trait]
impl SourceClient for TestSourceClient {
	async fn authority_set_id(&self, at: Option<Hash>) -> Result<SetId, TestError> {
		let data = self.data.lock();
		Ok(at
			.and_then(|at| data.source_set_id_at.get(&at).copied())
			.unwrap_or(data.source_set_id))
	}

	async fn authorities(&self, at: Option<Hash>) -> Result<Vec<AuthorityEntry>, TestError> {
		let mut data = self.data.lock();
		data.source_authorities_fetches += 1;
		Ok(at
			.and_then(|at| data.source_authorities_at.get(&at).cloned())
			.unwrap_or_else(|| data.source_authorities.clone()))
	}

	async fn header(&self, hash: Hash) -> Result<Header, TestError> {
		self.data.lock().source_headers.get(&hash).copied().ok_or(TestError::Other)
	}

	async fn block_hash(&self, number: BlockNumber) -> Result<Hash, TestError> {
		self.data.lock().source_block_hashes.get(&number).copied().ok_or(TestError::Other)
	}

	async fn finality_proofs(&self) -> Result<ProofsStream, TestError> {
		if let Some(error) = self.data.lock().source_subscribe_error {
			return Err(error)
		}
		self.streams.lock().proofs.take().ok_or(TestError::Other)
	}

	async fn finalized_heads(&self) -> Result<HeadersStream, TestError> {
		self.streams.lock().heads.take().ok_or(TestError::Other)
	}

	async fn authority_set_ids(&self) -> Result<SetIdsStream, TestError> {
		self.streams.lock().set_ids.take().ok_or(TestError::Other)
	}

	async fn prove_finality(&self, number: BlockNumber) -> Result<Option<Bytes>, TestError> {
		Ok(self.data.lock().source_proofs.get(&number).cloned())
	}

	async fn note_anchored(&self, up_to: BlockNumber) -> Result<(), TestError> {
		self.data.lock().source_anchored.push(up_to);
		Ok(())
	}
}

#[async_trait]
impl RelayClient for TestTargetClient {
	type Error = TestError;

	async fn reconnect(&mut self) -> Result<(), TestError> {
		self.data.lock().target_reconnects += 1;
		Ok(())
	}
}

#[async_trait]
impl TargetClient for TestTargetClient {
	async fn current_authority_set(&self) -> Result<Option<AuthoritySetSnapshot>, TestError> {
		let mut data = self.data.lock();
		data.target_set_reads += 1;
		Ok(data.target_authority_set.clone())
	}

	async fn submit_authority_set(&self, set: AuthoritySetSnapshot) -> Result<(), TestError> {
		let mut data = self.data.lock();
		if let Some(error) = data.target_set_failures.pop_front() {
			return Err(error)
		}
		data.target_submitted_sets.push(set.clone());
		data.target_authority_set = Some(set);
		Ok(())
	}

	async fn submit_finality_proof(&self, set_id: SetId, proof: Bytes) -> Result<(), TestError> {
		let mut data = self.data.lock();
		if let Some(error) = data.target_proof_failures.pop_front() {
			return Err(error)
		}
		data.target_submitted_proofs.push((set_id, proof));
		Ok(())
	}
}
