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

//! Thin JSON-RPC WebSocket client.
//!
//! The jsonrpsee client wants a tokio reactor, while the rest of the relay
//! runs on async-std. Every client owns a small tokio runtime and executes
//! all RPC futures there; subscriptions are forwarded into plain channel
//! backed streams, so callers never touch tokio directly.

use crate::{
	error::{Error, Result},
	types::{BlockNumber, Bytes, Hash, Header, Nonce, SubmissionStatus},
};

use futures::{channel::mpsc, Stream};
use jsonrpsee::{
	core::client::{ClientT, Subscription as RpcSubscription, SubscriptionClientT},
	rpc_params,
	ws_client::{WsClient, WsClientBuilder},
};
use serde::de::DeserializeOwned;
use std::{
	pin::Pin,
	sync::Arc,
	task::{Context, Poll},
};

const CHAIN_GET_BLOCK_HASH: &str = "chain_getBlockHash";
const CHAIN_GET_HEADER: &str = "chain_getHeader";
const STATE_CALL: &str = "state_call";
const STATE_GET_STORAGE: &str = "state_getStorage";
const SYSTEM_ACCOUNT_NEXT_INDEX: &str = "system_accountNextIndex";
const AUTHOR_SUBMIT_AND_WATCH: &str = "author_submitAndWatchExtrinsic";
const AUTHOR_UNWATCH: &str = "author_unwatchExtrinsic";
const CHAIN_SUBSCRIBE_FINALIZED_HEADS: &str = "chain_subscribeFinalizedHeads";
const CHAIN_UNSUBSCRIBE_FINALIZED_HEADS: &str = "chain_unsubscribeFinalizedHeads";
const GRANDPA_SUBSCRIBE_JUSTIFICATIONS: &str = "grandpa_subscribeJustifications";
const GRANDPA_UNSUBSCRIBE_JUSTIFICATIONS: &str = "grandpa_unsubscribeJustifications";
const GRANDPA_PROVE_FINALITY: &str = "grandpa_proveFinality";

/// Chain node connection parameters.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
	/// WebSocket endpoint of the node.
	pub uri: String,
}

/// Chain node RPC client.
#[derive(Clone)]
pub struct Client {
	params: ConnectionParams,
	tokio: Arc<tokio::runtime::Runtime>,
	client: Arc<WsClient>,
}

impl std::fmt::Debug for Client {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Client").field("uri", &self.params.uri).finish()
	}
}

impl Client {
	/// Connect to the node. Fails if the endpoint is unreachable; the caller
	/// decides whether and how to retry.
	pub async fn new(params: ConnectionParams) -> Result<Self> {
		let tokio = Arc::new(
			tokio::runtime::Builder::new_multi_thread()
				.worker_threads(1)
				.enable_all()
				.build()
				.map_err(|e| Error::Custom(format!("failed to build tokio runtime: {e}")))?,
		);
		let client = Self::build_client(&tokio, &params).await?;

		Ok(Client { params, tokio, client })
	}

	/// Re-establish the WebSocket connection. Streams and watches of the old
	/// connection are dead; the caller is expected to rebuild its state.
	pub async fn reconnect(&mut self) -> Result<()> {
		self.client = Self::build_client(&self.tokio, &self.params).await?;
		Ok(())
	}

	async fn build_client(
		tokio: &tokio::runtime::Runtime,
		params: &ConnectionParams,
	) -> Result<Arc<WsClient>> {
		let uri = params.uri.clone();
		let client = tokio
			.spawn(async move { WsClientBuilder::default().build(&uri).await })
			.await
			.map_err(|_| Error::Canceled)??;
		log::info!(target: "bridge", "Connected to the node at {}", params.uri);
		Ok(Arc::new(client))
	}

	/// Execute an RPC future on the client's tokio runtime.
	async fn jsonrpsee_execute<MF, F, T>(&self, make_jsonrpsee_future: MF) -> Result<T>
	where
		MF: FnOnce(Arc<WsClient>) -> F,
		F: std::future::Future<Output = Result<T>> + Send + 'static,
		T: Send + 'static,
	{
		let client = self.client.clone();
		self.tokio
			.spawn(make_jsonrpsee_future(client))
			.await
			.map_err(|_| Error::Canceled)?
	}

	/// Return the hash of the block with the given number.
	pub async fn block_hash(&self, number: BlockNumber) -> Result<Hash> {
		self.jsonrpsee_execute(move |client| async move {
			let hash: Option<Hash> =
				client.request(CHAIN_GET_BLOCK_HASH, rpc_params![number]).await?;
			hash.ok_or_else(|| Error::Decode(format!("chain has no block {number}")))
		})
		.await
	}

	/// Return the header of the block with the given hash.
	pub async fn header(&self, hash: Hash) -> Result<Header> {
		self.jsonrpsee_execute(move |client| async move {
			let header: Option<Header> =
				client.request(CHAIN_GET_HEADER, rpc_params![hash]).await?;
			header.ok_or_else(|| Error::Decode(format!("chain has no block {hash}")))
		})
		.await
	}

	/// Execute a runtime API call at the given block (or at the best block).
	pub async fn state_call(
		&self,
		method: &str,
		data: Bytes,
		at: Option<Hash>,
	) -> Result<Bytes> {
		let method = method.to_owned();
		self.jsonrpsee_execute(move |client| async move {
			Ok(client.request(STATE_CALL, rpc_params![method, data, at]).await?)
		})
		.await
	}

	/// Read a raw storage value at the given block (or at the best block).
	pub async fn storage_value(&self, key: Bytes, at: Option<Hash>) -> Result<Option<Bytes>> {
		self.jsonrpsee_execute(move |client| async move {
			Ok(client.request(STATE_GET_STORAGE, rpc_params![key, at]).await?)
		})
		.await
	}

	/// Return the next nonce of the given account, taking the pool into
	/// account.
	pub async fn next_account_nonce(&self, account: &str) -> Result<Nonce> {
		let account = account.to_owned();
		self.jsonrpsee_execute(move |client| async move {
			Ok(client.request(SYSTEM_ACCOUNT_NEXT_INDEX, rpc_params![account]).await?)
		})
		.await
	}

	/// Request a finality proof for the given block, if the node has one.
	pub async fn prove_finality(&self, number: BlockNumber) -> Result<Option<Bytes>> {
		self.jsonrpsee_execute(move |client| async move {
			Ok(client.request(GRANDPA_PROVE_FINALITY, rpc_params![number]).await?)
		})
		.await
	}

	/// Submit a signed transaction and watch its pool/inclusion statuses.
	pub async fn submit_and_watch(&self, tx: Bytes) -> Result<Subscription<SubmissionStatus>> {
		self.jsonrpsee_execute(move |client| async move {
			let subscription = client
				.subscribe(AUTHOR_SUBMIT_AND_WATCH, rpc_params![tx], AUTHOR_UNWATCH)
				.await?;
			Ok(Subscription::forward(subscription))
		})
		.await
	}

	/// Subscribe to finalized heads of the chain.
	pub async fn subscribe_finalized_heads(&self) -> Result<Subscription<Header>> {
		self.subscribe(CHAIN_SUBSCRIBE_FINALIZED_HEADS, CHAIN_UNSUBSCRIBE_FINALIZED_HEADS)
			.await
	}

	/// Subscribe to justifications of finalized blocks.
	pub async fn subscribe_justifications(&self) -> Result<Subscription<Bytes>> {
		self.subscribe(GRANDPA_SUBSCRIBE_JUSTIFICATIONS, GRANDPA_UNSUBSCRIBE_JUSTIFICATIONS)
			.await
	}

	async fn subscribe<T: DeserializeOwned + Send + 'static>(
		&self,
		subscribe_method: &'static str,
		unsubscribe_method: &'static str,
	) -> Result<Subscription<T>> {
		self.jsonrpsee_execute(move |client| async move {
			let subscription = client
				.subscribe(subscribe_method, rpc_params![], unsubscribe_method)
				.await?;
			Ok(Subscription::forward(subscription))
		})
		.await
	}
}

/// Chain event subscription, presented as a plain stream.
///
/// The stream ends when the underlying connection is lost. Dropping it stops
/// the forwarding task and unsubscribes from the node in the background.
pub struct Subscription<T>(mpsc::UnboundedReceiver<T>);

impl<T: DeserializeOwned + Send + 'static> Subscription<T> {
	// must be called from within the tokio runtime
	fn forward(mut subscription: RpcSubscription<T>) -> Self {
		let (sender, receiver) = mpsc::unbounded();
		tokio::spawn(async move {
			loop {
				match subscription.next().await {
					Some(Ok(item)) =>
						if sender.unbounded_send(item).is_err() {
							break
						},
					Some(Err(error)) => {
						// a single undecodable notification must not kill
						// the stream
						log::warn!(
							target: "bridge",
							"Failed to decode subscription notification: {:?}. Skipping",
							error,
						);
					},
					None => break,
				}
			}
		});

		Subscription(receiver)
	}
}

impl<T> Stream for Subscription<T> {
	type Item = T;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
		Pin::new(&mut self.0).poll_next(cx)
	}
}
