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

//! Bounded retry of transaction submissions with exponential, jittered backoff.

use backoff::{backoff::Backoff, ExponentialBackoff};
use std::{fmt::Debug, future::Future, time::Duration};

/// Parameters of bounded submission retry.
#[derive(Debug, Clone)]
pub struct RetryParams {
	/// Total number of attempts, including the first one.
	pub max_attempts: u32,
	/// Delay before the second attempt. Doubled after every failure.
	pub base_delay: Duration,
	/// Upper bound for the delay between attempts.
	pub max_delay: Duration,
}

impl Default for RetryParams {
	fn default() -> Self {
		RetryParams {
			max_attempts: 8,
			base_delay: Duration::from_millis(1_500),
			max_delay: Duration::from_secs(20),
		}
	}
}

/// Returns default backoff for the outer reconnect/restart loops.
pub fn retry_backoff() -> ExponentialBackoff {
	ExponentialBackoff {
		// we do not want relay to stop
		max_elapsed_time: None,
		..Default::default()
	}
}

/// Run `f` until it succeeds, an error is not retryable, or attempts are
/// exhausted. Delays between attempts double, are capped at
/// `params.max_delay` and carry randomized jitter so that restarted relays
/// do not hammer a recovering node in lockstep.
///
/// The final error is returned unchanged.
pub async fn retry_with_backoff<T, E, F, FF, R>(
	label: &str,
	params: &RetryParams,
	is_retryable: R,
	mut f: F,
) -> Result<T, E>
where
	E: Debug,
	F: FnMut() -> FF,
	FF: Future<Output = Result<T, E>>,
	R: Fn(&E) -> bool,
{
	let mut backoff = ExponentialBackoff {
		initial_interval: params.base_delay,
		max_interval: params.max_delay,
		multiplier: 2.0,
		max_elapsed_time: None,
		..Default::default()
	};

	let mut attempt = 1u32;
	loop {
		match f().await {
			Ok(result) => return Ok(result),
			Err(error) => {
				if !is_retryable(&error) || attempt >= params.max_attempts {
					return Err(error)
				}

				let delay = backoff.next_backoff().unwrap_or(params.max_delay);
				log::warn!(
					target: "bridge",
					"{} has failed with {:?}. Retrying in {:?} (attempt {}/{})",
					label,
					error,
					delay,
					attempt,
					params.max_attempts,
				);
				async_std::task::sleep(delay).await;
				attempt += 1;
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use parking_lot::Mutex;
	use std::sync::Arc;

	fn fast_params(max_attempts: u32) -> RetryParams {
		RetryParams {
			max_attempts,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(2),
		}
	}

	#[test]
	fn succeeds_without_retrying() {
		let calls = Arc::new(Mutex::new(0u32));
		let result: Result<u32, &str> = async_std::task::block_on(retry_with_backoff(
			"test",
			&fast_params(8),
			|_| true,
			|| {
				*calls.lock() += 1;
				async { Ok(42) }
			},
		));
		assert_eq!(result, Ok(42));
		assert_eq!(*calls.lock(), 1);
	}

	#[test]
	fn retries_retryable_error_until_success() {
		let calls = Arc::new(Mutex::new(0u32));
		let result: Result<u32, &str> = async_std::task::block_on(retry_with_backoff(
			"test",
			&fast_params(8),
			|_| true,
			|| {
				let calls = calls.clone();
				async move {
					let mut calls = calls.lock();
					*calls += 1;
					if *calls < 3 {
						Err("transient")
					} else {
						Ok(1)
					}
				}
			},
		));
		assert_eq!(result, Ok(1));
		assert_eq!(*calls.lock(), 3);
	}

	#[test]
	fn non_retryable_error_propagates_unchanged() {
		let calls = Arc::new(Mutex::new(0u32));
		let result: Result<(), &str> = async_std::task::block_on(retry_with_backoff(
			"test",
			&fast_params(8),
			|error: &&str| *error != "fatal",
			|| {
				*calls.lock() += 1;
				async { Err("fatal") }
			},
		));
		assert_eq!(result, Err("fatal"));
		assert_eq!(*calls.lock(), 1);
	}

	#[test]
	fn gives_up_after_max_attempts() {
		let calls = Arc::new(Mutex::new(0u32));
		let result: Result<(), &str> = async_std::task::block_on(retry_with_backoff(
			"test",
			&fast_params(3),
			|_| true,
			|| {
				*calls.lock() += 1;
				async { Err("transient") }
			},
		));
		assert_eq!(result, Err("transient"));
		assert_eq!(*calls.lock(), 3);
	}
}
