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

//! Forwarding a single finality proof to the parachain.
//!
//! For every proof: resolve the authority set that signed it, reconcile that
//! set with the parachain, submit the proof, and only then acknowledge the
//! anchored block back on the fastchain. The whole parachain part runs as
//! one serialized task, so proof and authority set submissions of one signer
//! never interleave.

use crate::{
	authority_set::{AuthorityCache, AuthoritySetSnapshot},
	authority_tracker::ensure_authority_set,
	Error, FinalityProof, RelayError, SourceClient, TargetClient,
};

use spin_relay_client::{Hash, SetId};
use spin_relay_utils::{retry_with_backoff, RetryParams, SerialQueue};

/// Forwards finality proofs to the parachain and acknowledges them on the
/// fastchain.
#[derive(Clone)]
pub struct ProofForwarder<SC, TC> {
	source: SC,
	target: TC,
	cache: AuthorityCache,
	source_queue: SerialQueue,
	target_queue: SerialQueue,
	retry: RetryParams,
}

impl<SC, TC> ProofForwarder<SC, TC>
where
	SC: SourceClient,
	TC: TargetClient,
	SC::Error: RelayError,
	TC::Error: RelayError,
{
	/// Create a forwarder submitting through the given per-chain queues.
	pub fn new(
		source: SC,
		target: TC,
		cache: AuthorityCache,
		source_queue: SerialQueue,
		target_queue: SerialQueue,
		retry: RetryParams,
	) -> Self {
		ProofForwarder { source, target, cache, source_queue, target_queue, retry }
	}

	/// Forward one proof end to end.
	///
	/// On unrecovered errors the proof is dropped: the fastchain will keep
	/// redelivering justifications for unacknowledged blocks, so a later
	/// proof retries the anchoring.
	pub async fn forward(
		&self,
		proof: FinalityProof,
	) -> Result<(), Error<SC::Error, TC::Error>> {
		// the set that signed the proof is the one active at its target block
		let set_id = self
			.source
			.authority_set_id(Some(proof.target_hash))
			.await
			.map_err(Error::Source)?;
		let snapshot = self.snapshot_at(set_id, proof.target_hash, false).await?;

		log::info!(
			target: "bridge",
			"Forwarding finality proof for block {} ({}), authority set {}",
			proof.target_number,
			proof.target_hash,
			set_id,
		);

		let target_number = proof.target_number;
		let submission = {
			let forwarder = self.clone();
			self.target_queue
				.run(async move { forwarder.reconcile_and_submit(snapshot, proof).await })
		};
		submission.await.map_err(|_| Error::ShuttingDown)??;

		// the fastchain may prune unanchored state, so it learns about the
		// anchored block only after the parachain accepted the proof
		let source = self.source.clone();
		let retry = self.retry.clone();
		self.source_queue
			.run(async move {
				retry_with_backoff(
					&format!("anchoring acknowledgment for block {target_number}"),
					&retry,
					SC::Error::is_pool_error,
					|| {
						let source = source.clone();
						async move { source.note_anchored(target_number).await }
					},
				)
				.await
			})
			.await
			.map_err(|_| Error::ShuttingDown)?
			.map_err(Error::Source)?;

		Ok(())
	}

	/// Authority set with the given id, from the cache or the source chain.
	async fn snapshot_at(
		&self,
		set_id: SetId,
		at: Hash,
		bypass_cache: bool,
	) -> Result<AuthoritySetSnapshot, Error<SC::Error, TC::Error>> {
		let cached = if bypass_cache { None } else { self.cache.get(set_id) };
		let authorities = match cached {
			Some(authorities) => authorities,
			None => {
				let authorities =
					self.source.authorities(Some(at)).await.map_err(Error::Source)?;
				self.cache.insert(set_id, authorities.clone());
				authorities
			},
		};

		Ok(AuthoritySetSnapshot::new(set_id, authorities))
	}

	async fn reconcile_and_submit(
		&self,
		snapshot: AuthoritySetSnapshot,
		proof: FinalityProof,
	) -> Result<(), Error<SC::Error, TC::Error>> {
		match self.ensure_and_submit(&snapshot, &proof).await {
			Ok(()) => return Ok(()),
			Err(error) if error.is_authority_set_mismatch() => {
				log::warn!(
					target: "bridge",
					"Parachain has rejected authority set {} for block {}. \
					 Refreshing the set at the target block",
					snapshot.set_id(),
					proof.target_number,
				);
			},
			Err(error) => return Err(Error::Target(error)),
		}

		// the cached set was stale: refetch at the target block, bypassing
		// the cache
		let fresh_id = self
			.source
			.authority_set_id(Some(proof.target_hash))
			.await
			.map_err(Error::Source)?;
		let fresh = self.snapshot_at(fresh_id, proof.target_hash, true).await?;
		match self.ensure_and_submit(&fresh, &proof).await {
			Ok(()) => return Ok(()),
			Err(error) if error.is_authority_set_mismatch() => {
				log::warn!(
					target: "bridge",
					"Parachain has rejected refreshed authority set {} for block {}. \
					 Trying the set of the parent block",
					fresh.set_id(),
					proof.target_number,
				);
			},
			Err(error) => return Err(Error::Target(error)),
		}

		// the proof may predate a set change that took effect in its very
		// block; the parent block then carries the signing set
		let header = self.source.header(proof.target_hash).await.map_err(Error::Source)?;
		let parent_id = self
			.source
			.authority_set_id(Some(header.parent_hash))
			.await
			.map_err(Error::Source)?;
		let parent = self.snapshot_at(parent_id, header.parent_hash, true).await?;
		self.ensure_and_submit(&parent, &proof).await.map_err(Error::Target)
	}

	async fn ensure_and_submit(
		&self,
		snapshot: &AuthoritySetSnapshot,
		proof: &FinalityProof,
	) -> Result<(), TC::Error> {
		ensure_authority_set(&self.target, &self.retry, snapshot).await?;

		retry_with_backoff(
			&format!("finality proof for block {}", proof.target_number),
			&self.retry,
			TC::Error::is_pool_error,
			|| {
				let target = self.target.clone();
				let set_id = snapshot.set_id();
				let raw = proof.raw.clone();
				async move { target.submit_finality_proof(set_id, raw).await }
			},
		)
		.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::{
		entry, hash, prepare_test_clients, proof, ClientsData, TestError, TestSourceClient,
		TestTargetClient,
	};
	use spin_relay_client::Header;
	use std::time::Duration;

	fn fast_retry() -> RetryParams {
		RetryParams {
			max_attempts: 3,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(2),
		}
	}

	fn forwarder_with_data(
		data: ClientsData,
	) -> (ProofForwarder<TestSourceClient, TestTargetClient>, TestTargetClient) {
		let (source, target) = prepare_test_clients(data);
		let forwarder = ProofForwarder::new(
			source,
			target.clone(),
			AuthorityCache::new(),
			SerialQueue::new("test-source"),
			SerialQueue::new("test-target"),
			fast_retry(),
		);
		(forwarder, target)
	}

	fn base_data() -> ClientsData {
		ClientsData {
			source_set_id: 1,
			source_authorities: vec![entry(1, 1), entry(2, 1)],
			target_authority_set: Some(AuthoritySetSnapshot::new(
				1,
				vec![entry(1, 1), entry(2, 1)],
			)),
			..Default::default()
		}
	}

	#[test]
	fn happy_path_submits_proof_then_acknowledges() {
		async_std::task::block_on(async {
			let (forwarder, target) = forwarder_with_data(base_data());

			forwarder.forward(proof(10)).await.unwrap();

			let data = target.data.lock();
			assert_eq!(data.target_submitted_proofs, vec![(1, proof(10).raw)]);
			assert_eq!(data.source_anchored, vec![10]);
			// the set already matched, nothing was submitted for it
			assert_eq!(data.target_submitted_sets.len(), 0);
		});
	}

	#[test]
	fn authority_set_is_cached_between_proofs() {
		async_std::task::block_on(async {
			let (forwarder, target) = forwarder_with_data(base_data());

			forwarder.forward(proof(10)).await.unwrap();
			forwarder.forward(proof(11)).await.unwrap();

			// one fetch for both proofs of set 1
			assert_eq!(target.data.lock().source_authorities_fetches, 1);
		});
	}

	#[test]
	fn mismatch_recovers_with_fresh_set_at_target_block() {
		async_std::task::block_on(async {
			let mut data = base_data();
			// the target still holds set 1, while block 10 is signed by set 2
			data.source_set_id_at.insert(hash(10), 2);
			data.source_authorities_at.insert(hash(10), vec![entry(3, 1)]);
			data.target_proof_failures = vec![TestError::Mismatch].into();
			let (forwarder, target) = forwarder_with_data(data);

			// poison the cache so that the first attempt uses stale data
			forwarder.cache.insert(2, vec![entry(9, 9)]);

			forwarder.forward(proof(10)).await.unwrap();

			let data = target.data.lock();
			assert_eq!(
				data.target_authority_set,
				Some(AuthoritySetSnapshot::new(2, vec![entry(3, 1)])),
			);
			assert_eq!(data.target_submitted_proofs, vec![(2, proof(10).raw)]);
			assert_eq!(data.source_anchored, vec![10]);
		});
	}

	#[test]
	fn mismatch_with_unchanged_set_succeeds_on_resubmission() {
		async_std::task::block_on(async {
			let mut data = base_data();
			// a spurious rejection: the refetched set is identical, so the
			// second attempt resubmits with the very same parameters
			data.target_proof_failures = vec![TestError::Mismatch].into();
			let (forwarder, target) = forwarder_with_data(data);

			forwarder.forward(proof(10)).await.unwrap();

			let data = target.data.lock();
			assert_eq!(data.target_submitted_sets.len(), 0);
			assert_eq!(data.target_submitted_proofs, vec![(1, proof(10).raw)]);
			assert_eq!(data.source_anchored, vec![10]);
			// the initial fetch plus the cache-bypassing refetch
			assert_eq!(data.source_authorities_fetches, 2);
		});
	}

	#[test]
	fn mismatch_falls_back_to_parent_block_set() {
		async_std::task::block_on(async {
			let mut data = base_data();
			// block 10 announces set 3, but its proof is signed by the
			// parent's set 2
			data.source_set_id_at.insert(hash(10), 3);
			data.source_authorities_at.insert(hash(10), vec![entry(5, 1)]);
			data.source_headers
				.insert(hash(10), Header { number: 10, parent_hash: hash(9) });
			data.source_set_id_at.insert(hash(9), 2);
			data.source_authorities_at.insert(hash(9), vec![entry(4, 1)]);
			data.target_proof_failures =
				vec![TestError::Mismatch, TestError::Mismatch].into();
			let (forwarder, target) = forwarder_with_data(data);

			forwarder.forward(proof(10)).await.unwrap();

			let data = target.data.lock();
			assert_eq!(
				data.target_authority_set,
				Some(AuthoritySetSnapshot::new(2, vec![entry(4, 1)])),
			);
			assert_eq!(data.target_submitted_proofs, vec![(2, proof(10).raw)]);
			assert_eq!(data.source_anchored, vec![10]);
		});
	}

	#[test]
	fn persistent_mismatch_drops_proof_without_acknowledgment() {
		async_std::task::block_on(async {
			let mut data = base_data();
			data.source_headers
				.insert(hash(10), Header { number: 10, parent_hash: hash(9) });
			data.target_proof_failures =
				vec![TestError::Mismatch, TestError::Mismatch, TestError::Mismatch].into();
			let (forwarder, target) = forwarder_with_data(data);

			let result = forwarder.forward(proof(10)).await;
			assert!(matches!(result, Err(Error::Target(TestError::Mismatch))));

			let data = target.data.lock();
			assert_eq!(data.target_submitted_proofs.len(), 0);
			assert_eq!(data.source_anchored, Vec::<u64>::new());
		});
	}

	#[test]
	fn transient_pool_error_is_retried() {
		async_std::task::block_on(async {
			let mut data = base_data();
			data.target_proof_failures = vec![TestError::Pool, TestError::Pool].into();
			let (forwarder, target) = forwarder_with_data(data);

			forwarder.forward(proof(10)).await.unwrap();

			let data = target.data.lock();
			assert_eq!(data.target_submitted_proofs, vec![(1, proof(10).raw)]);
			assert_eq!(data.source_anchored, vec![10]);
		});
	}

	#[test]
	fn non_transient_error_fails_without_acknowledgment() {
		async_std::task::block_on(async {
			let mut data = base_data();
			data.target_proof_failures = vec![TestError::Other].into();
			let (forwarder, target) = forwarder_with_data(data);

			let result = forwarder.forward(proof(10)).await;
			assert!(matches!(result, Err(Error::Target(TestError::Other))));
			assert_eq!(target.data.lock().source_anchored, Vec::<u64>::new());
		});
	}
}
