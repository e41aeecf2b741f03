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

//! Coalescing task runner.
//!
//! When finality proofs arrive faster than they can be anchored, only the
//! newest pending proof matters: anchoring it covers all of its ancestors.
//! The runner therefore keeps at most one pending task and replaces it
//! whenever a fresher one is enqueued. A task that has started executing is
//! never interrupted.

use futures::{
	channel::oneshot,
	future::{BoxFuture, FutureExt},
};
use parking_lot::Mutex;
use std::{future::Future, sync::Arc};

/// Runner that executes at most one task at a time and keeps only the most
/// recently enqueued pending task.
#[derive(Clone)]
pub struct LatestTaskRunner {
	name: &'static str,
	state: Arc<Mutex<State>>,
}

struct State {
	running: bool,
	pending: Option<BoxFuture<'static, ()>>,
	drain_waiters: Vec<oneshot::Sender<()>>,
}

impl LatestTaskRunner {
	/// Create an idle runner.
	pub fn new(name: &'static str) -> Self {
		LatestTaskRunner {
			name,
			state: Arc::new(Mutex::new(State {
				running: false,
				pending: None,
				drain_waiters: Vec::new(),
			})),
		}
	}

	/// Enqueue a task, superseding any pending task that has not started yet.
	///
	/// A superseded task is simply dropped: its future has never been polled.
	/// Tasks are expected to handle (log) their own errors.
	pub fn enqueue<F>(&self, task: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let mut state = self.state.lock();
		if state.pending.replace(task.boxed()).is_some() {
			log::debug!(
				target: "bridge",
				"{}: newer task has superseded the pending one",
				self.name,
			);
		}

		if !state.running {
			state.running = true;
			drop(state);
			self.spawn_worker();
		}
	}

	/// Wait until no task is running and none is pending.
	pub async fn drain(&self) {
		let receiver = {
			let mut state = self.state.lock();
			if !state.running && state.pending.is_none() {
				return
			}

			let (sender, receiver) = oneshot::channel();
			state.drain_waiters.push(sender);
			receiver
		};

		let _ = receiver.await;
	}

	fn spawn_worker(&self) {
		let state = self.state.clone();
		async_std::task::spawn(async move {
			loop {
				let task = {
					let mut state = state.lock();
					match state.pending.take() {
						Some(task) => task,
						None => {
							state.running = false;
							for waiter in state.drain_waiters.drain(..) {
								let _ = waiter.send(());
							}
							break
						},
					}
				};

				task.await;
			}
		});
	}
}
