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

//! Keeping the parachain's copy of the fastchain authority set up to date.

use crate::{
	authority_set::{AuthorityCache, AuthoritySetSnapshot},
	Error, RelayError, SourceClient, TargetClient,
};

use spin_relay_utils::{retry_with_backoff, RetryParams, SerialQueue};

/// Tracks the fastchain authority set and mirrors it to the parachain.
///
/// Synchronizes once at session start and then on every set id change
/// notification. The forwarder additionally reconciles the set before each
/// proof, so a missed notification delays proofs but never corrupts state.
pub struct AuthorityTracker<SC, TC> {
	source: SC,
	target: TC,
	cache: AuthorityCache,
	target_queue: SerialQueue,
	retry: RetryParams,
	known: Option<AuthoritySetSnapshot>,
}

impl<SC, TC> AuthorityTracker<SC, TC>
where
	SC: SourceClient,
	TC: TargetClient,
	SC::Error: RelayError,
	TC::Error: RelayError,
{
	/// Create a tracker that submits through the given target queue.
	pub fn new(
		source: SC,
		target: TC,
		cache: AuthorityCache,
		target_queue: SerialQueue,
		retry: RetryParams,
	) -> Self {
		AuthorityTracker { source, target, cache, target_queue, retry, known: None }
	}

	/// Fetch the authority set at the source tip and make sure the parachain
	/// holds it. Called once before any proof is forwarded.
	pub async fn initial_sync(&mut self) -> Result<(), Error<SC::Error, TC::Error>> {
		let set_id = self.source.authority_set_id(None).await.map_err(Error::Source)?;
		let authorities = self.source.authorities(None).await.map_err(Error::Source)?;
		let snapshot = AuthoritySetSnapshot::new(set_id, authorities);

		log::info!(
			target: "bridge",
			"Synchronizing initial authority set: id {}, {} authorities",
			snapshot.set_id(),
			snapshot.authorities().len(),
		);

		self.sync(snapshot).await
	}

	/// React to a set id change reported by the source chain.
	pub async fn on_set_id_change(
		&mut self,
		new_set_id: u64,
	) -> Result<(), Error<SC::Error, TC::Error>> {
		if self.known.as_ref().map(AuthoritySetSnapshot::set_id) == Some(new_set_id) {
			return Ok(())
		}

		log::info!(target: "bridge", "Authority set id has changed to {}", new_set_id);
		let authorities = self.source.authorities(None).await.map_err(Error::Source)?;
		self.sync(AuthoritySetSnapshot::new(new_set_id, authorities)).await
	}

	async fn sync(
		&mut self,
		snapshot: AuthoritySetSnapshot,
	) -> Result<(), Error<SC::Error, TC::Error>> {
		self.cache.insert(snapshot.set_id(), snapshot.authorities().to_vec());

		let target = self.target.clone();
		let retry = self.retry.clone();
		let to_sync = snapshot.clone();
		self.target_queue
			.run(async move { ensure_authority_set(&target, &retry, &to_sync).await })
			.await
			.map_err(|_| Error::ShuttingDown)?
			.map_err(Error::Target)?;

		self.known = Some(snapshot);
		Ok(())
	}
}

/// Make sure the target chain holds exactly the given authority set.
///
/// Reads the current record first and submits nothing when it already
/// matches, so the operation is idempotent and cheap to repeat. The
/// submission itself is retried on transient pool failures only.
pub async fn ensure_authority_set<TC>(
	target: &TC,
	retry: &RetryParams,
	desired: &AuthoritySetSnapshot,
) -> Result<(), TC::Error>
where
	TC: TargetClient,
	TC::Error: RelayError,
{
	let current = target.current_authority_set().await?;
	if current.as_ref() == Some(desired) {
		return Ok(())
	}

	log::info!(
		target: "bridge",
		"Updating the parachain authority set: id {}, {} authorities",
		desired.set_id(),
		desired.authorities().len(),
	);

	retry_with_backoff(
		&format!("authority set {} update", desired.set_id()),
		retry,
		TC::Error::is_pool_error,
		|| {
			let target = target.clone();
			let desired = desired.clone();
			async move { target.submit_authority_set(desired).await }
		},
	)
	.await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::{entry, prepare_test_clients, ClientsData, TestError};
	use std::time::Duration;

	fn fast_retry() -> RetryParams {
		RetryParams {
			max_attempts: 3,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(2),
		}
	}

	fn tracker_with_data(
		data: ClientsData,
	) -> (AuthorityTracker<crate::mock::TestSourceClient, crate::mock::TestTargetClient>, crate::mock::TestTargetClient)
	{
		let (source, target) = prepare_test_clients(data);
		let tracker = AuthorityTracker::new(
			source,
			target.clone(),
			AuthorityCache::new(),
			SerialQueue::new("test-target"),
			fast_retry(),
		);
		(tracker, target)
	}

	#[test]
	fn initial_sync_submits_missing_set() {
		async_std::task::block_on(async {
			let (mut tracker, target) = tracker_with_data(ClientsData {
				source_set_id: 3,
				source_authorities: vec![entry(1, 1), entry(2, 1)],
				..Default::default()
			});

			tracker.initial_sync().await.unwrap();

			let data = target.data.lock();
			assert_eq!(data.target_submitted_sets.len(), 1);
			assert_eq!(
				data.target_authority_set,
				Some(AuthoritySetSnapshot::new(3, vec![entry(1, 1), entry(2, 1)])),
			);
		});
	}

	#[test]
	fn matching_set_in_different_order_submits_nothing() {
		async_std::task::block_on(async {
			let (mut tracker, target) = tracker_with_data(ClientsData {
				source_set_id: 3,
				source_authorities: vec![entry(2, 1), entry(1, 1)],
				target_authority_set: Some(AuthoritySetSnapshot::new(
					3,
					vec![entry(1, 1), entry(2, 1)],
				)),
				..Default::default()
			});

			tracker.initial_sync().await.unwrap();

			let data = target.data.lock();
			assert_eq!(data.target_submitted_sets.len(), 0);
			assert_eq!(data.target_set_reads, 1);
		});
	}

	#[test]
	fn repeated_set_id_notification_is_a_no_op() {
		async_std::task::block_on(async {
			let (mut tracker, target) = tracker_with_data(ClientsData {
				source_set_id: 3,
				source_authorities: vec![entry(1, 1)],
				..Default::default()
			});

			tracker.initial_sync().await.unwrap();
			tracker.on_set_id_change(3).await.unwrap();
			tracker.on_set_id_change(3).await.unwrap();

			// only the initial sync touched the target
			assert_eq!(target.data.lock().target_set_reads, 1);
		});
	}

	#[test]
	fn set_id_change_resynchronizes() {
		async_std::task::block_on(async {
			let (mut tracker, target) = tracker_with_data(ClientsData {
				source_set_id: 3,
				source_authorities: vec![entry(1, 1)],
				..Default::default()
			});

			tracker.initial_sync().await.unwrap();
			target.data.lock().source_authorities = vec![entry(1, 1), entry(4, 1)];
			tracker.on_set_id_change(4).await.unwrap();

			let data = target.data.lock();
			assert_eq!(data.target_submitted_sets.len(), 2);
			assert_eq!(
				data.target_authority_set,
				Some(AuthoritySetSnapshot::new(4, vec![entry(1, 1), entry(4, 1)])),
			);
		});
	}

	#[test]
	fn pool_errors_are_retried() {
		async_std::task::block_on(async {
			let (mut tracker, target) = tracker_with_data(ClientsData {
				source_set_id: 1,
				source_authorities: vec![entry(1, 1)],
				target_set_failures: vec![TestError::Pool, TestError::Pool].into(),
				..Default::default()
			});

			tracker.initial_sync().await.unwrap();
			assert_eq!(target.data.lock().target_submitted_sets.len(), 1);
		});
	}

	#[test]
	fn non_pool_errors_are_not_retried() {
		async_std::task::block_on(async {
			let (mut tracker, target) = tracker_with_data(ClientsData {
				source_set_id: 1,
				source_authorities: vec![entry(1, 1)],
				target_set_failures: vec![TestError::Other].into(),
				..Default::default()
			});

			let result = tracker.initial_sync().await;
			assert!(matches!(result, Err(Error::Target(TestError::Other))));
			assert_eq!(target.data.lock().target_submitted_sets.len(), 0);
		});
	}
}
