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

//! Command line interface of the relay.

use spin_relay_utils::RetryParams;
use std::time::Duration;
use structopt::StructOpt;

/// Relay fastchain finality proofs to the parachain.
#[derive(StructOpt, Debug)]
#[structopt(name = "spin-relay")]
pub struct Options {
	/// WebSocket endpoint of the fastchain node.
	#[structopt(long, env = "FASTCHAIN_WS", default_value = "ws://127.0.0.1:11144")]
	pub fastchain_uri: String,
	/// WebSocket endpoint of the parachain node.
	#[structopt(long, env = "PARACHAIN_WS", default_value = "ws://127.0.0.1:9988")]
	pub parachain_uri: String,
	/// SURI of the account signing fastchain transactions.
	#[structopt(long, env = "FASTCHAIN_SIGNER_URI", default_value = "//Alice")]
	pub fastchain_signer: String,
	/// SURI of the account signing parachain transactions.
	#[structopt(long, env = "PARACHAIN_SIGNER_URI", default_value = "//Bob")]
	pub parachain_signer: String,
	/// How long to wait for a submitted transaction to be finalized, in
	/// milliseconds.
	#[structopt(long, env = "TX_TIMEOUT_MS", default_value = "60000")]
	pub tx_timeout_ms: u64,
	/// How many times to retry a failed transient submission.
	#[structopt(long, env = "TX_RETRY_MAX_ATTEMPTS", default_value = "8")]
	pub tx_retry_max_attempts: u32,
	/// Base delay between submission retries, in milliseconds.
	#[structopt(long, env = "TX_RETRY_BASE_DELAY_MS", default_value = "1500")]
	pub tx_retry_base_delay_ms: u64,
	/// Upper bound on the delay between submission retries, in milliseconds.
	#[structopt(long, env = "TX_RETRY_MAX_DELAY_MS", default_value = "20000")]
	pub tx_retry_max_delay_ms: u64,
}

impl Options {
	/// Transaction finalization timeout.
	pub fn tx_timeout(&self) -> Duration {
		Duration::from_millis(self.tx_timeout_ms)
	}

	/// Retry parameters for transient submission failures.
	pub fn retry_params(&self) -> RetryParams {
		RetryParams {
			max_attempts: self.tx_retry_max_attempts,
			base_delay: Duration::from_millis(self.tx_retry_base_delay_ms),
			max_delay: Duration::from_millis(self.tx_retry_max_delay_ms),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_usable() {
		let options = Options::from_iter(Vec::<String>::new());
		assert_eq!(options.fastchain_uri, "ws://127.0.0.1:11144");
		assert_eq!(options.parachain_uri, "ws://127.0.0.1:9988");
		assert_eq!(options.tx_timeout(), Duration::from_secs(60));
		assert_eq!(options.retry_params().max_attempts, 8);
	}

	#[test]
	fn flags_override_defaults() {
		let options = Options::from_iter(vec![
			"spin-relay",
			"--fastchain-uri",
			"ws://fast:1234",
			"--tx-retry-max-attempts",
			"3",
		]);
		assert_eq!(options.fastchain_uri, "ws://fast:1234");
		assert_eq!(options.retry_params().max_attempts, 3);
	}
}
