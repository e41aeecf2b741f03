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

//! Running relay sessions until the process is told to stop.

use crate::{RelayError, RelaySession, SessionParams, SourceClient, TargetClient};

use futures::FutureExt;
use spin_relay_utils::relay_loop;
use std::time::Duration;

/// Run relay sessions over the given clients, rebuilding the session with
/// reconnected clients and fresh state whenever a connection is lost.
///
/// Returns once a session reports a graceful stop (the exit signal fired).
pub async fn run<SC, TC>(
	source: SC,
	target: TC,
	params: SessionParams,
	reconnect_delay: Duration,
	exit_signal: impl futures::Future<Output = ()> + Clone + Send,
) -> anyhow::Result<()>
where
	SC: SourceClient,
	TC: TargetClient,
	SC::Error: RelayError,
	TC::Error: RelayError,
{
	log::info!(target: "bridge", "Starting fastchain -> parachain finality proof relay");

	relay_loop(source, target)
		.reconnect_delay(reconnect_delay)
		.run("finality", move |source, target| {
			let params = params.clone();
			let exit_signal = exit_signal.clone();
			async move { RelaySession::new(source, target, params).run(exit_signal).await }
		})
		.await
}

/// Same as [`run`], for exit signals that are not `Clone` (e.g. a process
/// signal stream).
pub async fn run_with_signal<SC, TC>(
	source: SC,
	target: TC,
	params: SessionParams,
	reconnect_delay: Duration,
	exit_signal: impl futures::Future<Output = ()> + Send,
) -> anyhow::Result<()>
where
	SC: SourceClient,
	TC: TargetClient,
	SC::Error: RelayError,
	TC::Error: RelayError,
{
	run(source, target, params, reconnect_delay, exit_signal.shared()).await
}
