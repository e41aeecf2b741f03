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

//! Generic relay loop that survives lost connections by reconnecting the
//! failed client and restarting the inner loop with fresh state.

use crate::MaybeConnectionError;

use async_trait::async_trait;
use std::{fmt::Debug, future::Future, time::Duration};

/// Default pause between reconnect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Client of the relay loop, which may be reconnected after a failure.
#[async_trait]
pub trait Client: 'static + Clone + Send + Sync {
	/// Type of error these clients returns.
	type Error: 'static + Debug + MaybeConnectionError + Send + Sync;

	/// Try to reconnect to source node.
	async fn reconnect(&mut self) -> Result<(), Self::Error>;
}

/// Flag which client of the inner loop has lost its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedClient {
	/// The source client has failed.
	Source,
	/// The target client has failed.
	Target,
	/// Both clients have failed.
	Both,
}

/// Returns generic relay loop over the given pair of clients.
pub fn relay_loop<SC, TC>(source_client: SC, target_client: TC) -> Loop<SC, TC> {
	Loop { reconnect_delay: RECONNECT_DELAY, source_client, target_client }
}

/// Generic relay loop.
pub struct Loop<SC, TC> {
	reconnect_delay: Duration,
	source_client: SC,
	target_client: TC,
}

impl<SC: Client, TC: Client> Loop<SC, TC> {
	/// Customize the delay between reconnect attempts.
	pub fn reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
		self.reconnect_delay = reconnect_delay;
		self
	}

	/// Run the loop, restarting it with reconnected clients whenever the
	/// inner loop reports a lost connection. Returns only when the inner
	/// loop finishes gracefully.
	pub async fn run<R, F>(mut self, loop_name: &str, run_loop: R) -> anyhow::Result<()>
	where
		R: Fn(SC, TC) -> F,
		F: Future<Output = Result<(), FailedClient>>,
	{
		loop {
			let result = run_loop(self.source_client.clone(), self.target_client.clone()).await;
			match result {
				Ok(()) => {
					log::info!(target: "bridge", "The {} loop has finished", loop_name);
					return Ok(())
				},
				Err(failed_client) => {
					log::warn!(
						target: "bridge",
						"The {} loop has lost connection to the {:?} client. Restarting",
						loop_name,
						failed_client,
					);
					reconnect_failed_client(
						failed_client,
						self.reconnect_delay,
						&mut self.source_client,
						&mut self.target_client,
					)
					.await
				},
			}
		}
	}
}

/// Reconnect failed client(s), retrying until the connection is back.
pub async fn reconnect_failed_client(
	failed_client: FailedClient,
	reconnect_delay: Duration,
	source_client: &mut impl Client,
	target_client: &mut impl Client,
) {
	loop {
		async_std::task::sleep(reconnect_delay).await;
		if matches!(failed_client, FailedClient::Both | FailedClient::Source) {
			if let Err(error) = source_client.reconnect().await {
				log::warn!(
					target: "bridge",
					"Failed to reconnect to source client. Going to retry in {}s: {:?}",
					reconnect_delay.as_secs(),
					error,
				);
				continue
			}
		}
		if matches!(failed_client, FailedClient::Both | FailedClient::Target) {
			if let Err(error) = target_client.reconnect().await {
				log::warn!(
					target: "bridge",
					"Failed to reconnect to target client. Going to retry in {}s: {:?}",
					reconnect_delay.as_secs(),
					error,
				);
				continue
			}
		}

		break
	}
}
