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

//! Waiting for a submitted transaction to reach a terminal status.

use crate::{
	error::Error,
	types::{Hash, SubmissionStatus},
};

use futures::{future::Either, Stream, StreamExt};
use std::time::Duration;

/// Follow the status stream of a submitted transaction until it is finalized,
/// fails, or the wall-clock timeout elapses.
///
/// Failure statuses (`Invalid`, `Dropped`, `Usurped`, dispatch errors) fail
/// fast. On timeout the wait is abandoned: the transaction may still land
/// later, which is harmless since every submission of this relay is
/// idempotent on chain.
pub async fn wait_until_finalized<S>(
	label: &str,
	timeout: Duration,
	status_stream: S,
) -> Result<Hash, Error>
where
	S: Stream<Item = SubmissionStatus> + Unpin,
{
	let mut status_stream = status_stream;
	let wait = async {
		while let Some(status) = status_stream.next().await {
			match status {
				SubmissionStatus::Ready | SubmissionStatus::Broadcast => (),
				SubmissionStatus::InBlock(block) => {
					log::debug!(target: "bridge", "{} is included in block {}", label, block);
				},
				SubmissionStatus::Retracted(block) => {
					log::debug!(target: "bridge", "{} has been retracted with block {}", label, block);
				},
				SubmissionStatus::Finalized(block) => {
					log::info!(target: "bridge", "{} has been finalized in block {}", label, block);
					return Ok(block)
				},
				SubmissionStatus::FinalityTimeout(_) =>
					return Err(Error::Timeout { label: label.to_owned(), timeout }),
				SubmissionStatus::Invalid =>
					return Err(Error::TransactionInvalid { label: label.to_owned() }),
				SubmissionStatus::Dropped =>
					return Err(Error::TransactionDropped { label: label.to_owned() }),
				SubmissionStatus::Usurped(_) =>
					return Err(Error::TransactionUsurped { label: label.to_owned() }),
				SubmissionStatus::DispatchError { section, name } =>
					return Err(Error::Dispatch { label: label.to_owned(), section, name }),
				SubmissionStatus::Unknown(status) => {
					log::trace!(target: "bridge", "{}: ignoring unknown status {:?}", label, status);
				},
			}
		}

		Err(Error::StatusStreamEnded { label: label.to_owned() })
	};

	let sleep = async_std::task::sleep(timeout);
	futures::pin_mut!(wait, sleep);
	let result =
		match futures::future::select(wait, sleep).await {
			Either::Left((result, _)) => result,
			Either::Right(((), _)) => {
				log::warn!(
					target: "bridge",
					"{} was not finalized in {:?}. Abandoning the wait",
					label,
					timeout,
				);
				Err(Error::Timeout { label: label.to_owned(), timeout })
			},
		};
	result
}
