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

//! Authority set snapshots and their canonical form.
//!
//! The two chains report the same authority set in different orders, so all
//! comparisons and submissions go through one canonical representation:
//! entries sorted by authority id bytes, ascending.

use parking_lot::Mutex;
use spin_relay_client::SetId;
use std::{collections::HashMap, fmt, sync::Arc};

/// Fixed-length authority identifier (a public key of the finality gadget).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AuthorityId(pub [u8; 32]);

impl fmt::Debug for AuthorityId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}

impl fmt::Display for AuthorityId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// Single weighted authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorityEntry {
	/// Authority identifier.
	pub id: AuthorityId,
	/// Voting weight of the authority.
	pub weight: u64,
}

/// Authority set snapshot: the set id plus all member entries, held in
/// canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoritySetSnapshot {
	set_id: SetId,
	authorities: Vec<AuthorityEntry>,
}

impl AuthoritySetSnapshot {
	/// Create a snapshot; the entries are normalized, so two snapshots built
	/// from permutations of the same set compare equal.
	pub fn new(set_id: SetId, authorities: Vec<AuthorityEntry>) -> Self {
		AuthoritySetSnapshot { set_id, authorities: normalize(authorities) }
	}

	/// The authority set id.
	pub fn set_id(&self) -> SetId {
		self.set_id
	}

	/// Member entries in canonical order.
	pub fn authorities(&self) -> &[AuthorityEntry] {
		&self.authorities
	}

	/// The representation the parachain pallet accepts: hex-encoded ids and
	/// decimal string weights, in canonical order.
	pub fn to_parachain_format(&self) -> Vec<(String, String)> {
		self.authorities
			.iter()
			.map(|entry| (entry.id.to_string(), entry.weight.to_string()))
			.collect()
	}
}

/// Sort authority entries into canonical order (ascending id bytes).
/// Idempotent; authority ids are unique on chain.
pub fn normalize(mut authorities: Vec<AuthorityEntry>) -> Vec<AuthorityEntry> {
	authorities.sort_by(|a, b| a.id.cmp(&b.id));
	authorities
}

/// Session-scoped cache of authority sets, keyed by set id.
///
/// Authority sets are immutable once announced, so entries are only ever
/// added (or overwritten with identical data during mismatch recovery). The
/// cache dies with the session: a reconnected relay starts from chain state.
#[derive(Clone, Default)]
pub struct AuthorityCache(Arc<Mutex<HashMap<SetId, Vec<AuthorityEntry>>>>);

impl AuthorityCache {
	/// Create an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Look an authority set up by its id.
	pub fn get(&self, set_id: SetId) -> Option<Vec<AuthorityEntry>> {
		self.0.lock().get(&set_id).cloned()
	}

	/// Remember an authority set.
	pub fn insert(&self, set_id: SetId, authorities: Vec<AuthorityEntry>) {
		self.0.lock().insert(set_id, authorities);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entry(id_byte: u8, weight: u64) -> AuthorityEntry {
		AuthorityEntry { id: AuthorityId([id_byte; 32]), weight }
	}

	#[test]
	fn permuted_snapshots_compare_equal() {
		let a = AuthoritySetSnapshot::new(7, vec![entry(1, 1), entry(2, 1), entry(3, 2)]);
		let b = AuthoritySetSnapshot::new(7, vec![entry(3, 2), entry(1, 1), entry(2, 1)]);
		assert_eq!(a, b);
	}

	#[test]
	fn snapshots_with_different_weights_differ() {
		let a = AuthoritySetSnapshot::new(7, vec![entry(1, 1), entry(2, 1)]);
		let b = AuthoritySetSnapshot::new(7, vec![entry(1, 1), entry(2, 2)]);
		assert_ne!(a, b);
	}

	#[test]
	fn snapshots_with_different_set_ids_differ() {
		let a = AuthoritySetSnapshot::new(7, vec![entry(1, 1)]);
		let b = AuthoritySetSnapshot::new(8, vec![entry(1, 1)]);
		assert_ne!(a, b);
	}

	#[test]
	fn normalize_is_idempotent() {
		let once = normalize(vec![entry(3, 1), entry(1, 1), entry(2, 1)]);
		let twice = normalize(once.clone());
		assert_eq!(once, twice);
		assert_eq!(once, vec![entry(1, 1), entry(2, 1), entry(3, 1)]);
	}

	#[test]
	fn parachain_format_is_deterministic_over_permutations() {
		let a = AuthoritySetSnapshot::new(1, vec![entry(2, 10), entry(1, 20)]);
		let b = AuthoritySetSnapshot::new(1, vec![entry(1, 20), entry(2, 10)]);
		let formatted = a.to_parachain_format();
		assert_eq!(formatted, b.to_parachain_format());
		assert_eq!(formatted[0], (AuthorityId([1; 32]).to_string(), "20".to_string()));
		assert_eq!(formatted[1], (AuthorityId([2; 32]).to_string(), "10".to_string()));
	}

	#[test]
	fn cache_returns_inserted_sets() {
		let cache = AuthorityCache::new();
		assert_eq!(cache.get(1), None);
		cache.insert(1, vec![entry(1, 1)]);
		assert_eq!(cache.get(1), Some(vec![entry(1, 1)]));
	}
}
