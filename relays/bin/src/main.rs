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

//! Relay of fastchain finality proofs to the parachain.

mod cli;
mod fastchain;
mod parachain;
mod transactions;

use crate::{
	cli::Options, fastchain::FastchainClient, parachain::ParachainClient,
	transactions::DevSigner,
};

use futures::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_async_std::Signals;
use spin_finality_relay::{supervisor, SessionParams};
use spin_relay_client::{rpc::ConnectionParams, TransactionSigner};
use spin_relay_utils::{retry_with_backoff, MaybeConnectionError, RetryParams, RECONNECT_DELAY};
use std::sync::Arc;
use structopt::StructOpt;

fn main() {
	spin_relay_utils::initialize::initialize_relay();

	let options = Options::from_args();
	let result = async_std::task::block_on(run(options));
	if let Err(error) = result {
		log::error!(target: "bridge", "Relay has failed: {error:?}");
		std::process::exit(1);
	}
}

async fn run(options: Options) -> anyhow::Result<()> {
	let exit_signal = exit_signal()?;

	let retry = options.retry_params();
	let tx_timeout = options.tx_timeout();

	let fastchain_signer: Arc<dyn TransactionSigner> =
		Arc::new(DevSigner::from_suri(&options.fastchain_signer));
	let parachain_signer: Arc<dyn TransactionSigner> =
		Arc::new(DevSigner::from_suri(&options.parachain_signer));

	let source = connect("fastchain", &retry, || {
		FastchainClient::new(
			ConnectionParams { uri: options.fastchain_uri.clone() },
			fastchain_signer.clone(),
			tx_timeout,
		)
	})
	.await?;
	let target = connect("parachain", &retry, || {
		ParachainClient::new(
			ConnectionParams { uri: options.parachain_uri.clone() },
			parachain_signer.clone(),
			tx_timeout,
		)
	})
	.await?;

	supervisor::run_with_signal(
		source,
		target,
		SessionParams { retry },
		RECONNECT_DELAY,
		exit_signal,
	)
	.await
}

/// Resolves when the process receives SIGINT or SIGTERM.
fn exit_signal() -> anyhow::Result<impl futures::Future<Output = ()>> {
	let signals = Signals::new([SIGINT, SIGTERM])?;
	Ok(async move {
		let mut signals = signals.fuse();
		let signal = signals.next().await;
		log::info!(target: "bridge", "Received signal {signal:?}. Stopping the relay");
	})
}

/// Connect to a node, retrying while the node is still coming up.
async fn connect<C, F, FF>(label: &str, retry: &RetryParams, build: F) -> anyhow::Result<C>
where
	F: FnMut() -> FF,
	FF: futures::Future<Output = Result<C, spin_relay_client::Error>>,
{
	retry_with_backoff(
		&format!("connecting to {label}"),
		retry,
		spin_relay_client::Error::is_connection_error,
		build,
	)
	.await
	.map_err(|error| anyhow::anyhow!("failed to connect to {label}: {error:?}"))
}
