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

//! FIFO task queue used to serialize transaction submissions.
//!
//! Every chain+signer pair gets its own queue, so that nonces are always
//! claimed in submission order and two transactions of the same signer
//! never race each other in the node's pool.

use futures::{
	channel::{mpsc, oneshot},
	future::{BoxFuture, FutureExt},
	StreamExt,
};
use std::future::Future;

/// The queue worker has been shut down, so the task result will never arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("serial queue has been shut down")]
pub struct QueueClosed;

/// FIFO queue of asynchronous tasks, executed by a single worker.
///
/// Tasks run strictly in the order they were enqueued. A failed task (one
/// whose future resolves to an error, or whose caller dropped the result)
/// never blocks its successors.
#[derive(Clone)]
pub struct SerialQueue {
	name: &'static str,
	sender: mpsc::UnboundedSender<BoxFuture<'static, ()>>,
}

impl SerialQueue {
	/// Spawn the queue worker and return a handle to it.
	///
	/// The worker stops once all handles are dropped and the backlog is
	/// exhausted.
	pub fn new(name: &'static str) -> Self {
		let (sender, mut receiver) = mpsc::unbounded::<BoxFuture<'static, ()>>();
		async_std::task::spawn(async move {
			while let Some(task) = receiver.next().await {
				task.await;
			}
		});

		SerialQueue { name, sender }
	}

	/// Name of the queue, used in logs.
	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Append a task to the queue.
	///
	/// The returned future resolves with the task result once the task has
	/// actually run. Dropping the returned future does not cancel the task:
	/// it has been enqueued and will still execute in its turn.
	pub fn run<T, F>(&self, task: F) -> impl Future<Output = Result<T, QueueClosed>>
	where
		T: Send + 'static,
		F: Future<Output = T> + Send + 'static,
	{
		let (result_sender, result_receiver) = oneshot::channel();
		let enqueued = self
			.sender
			.unbounded_send(
				async move {
					// the caller may have gone away, so a failed send is fine
					let _ = result_sender.send(task.await);
				}
				.boxed(),
			)
			.is_ok();

		async move {
			if !enqueued {
				return Err(QueueClosed)
			}

			result_receiver.await.map_err(|_| QueueClosed)
		}
	}

	/// Wait until every task enqueued before this call has settled.
	pub async fn drain(&self) {
		let _ = self.run(async {}).await;
	}
}
