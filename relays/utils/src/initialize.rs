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

//! Relayer initialization functions.

use std::io::Write;

/// Initialize relay environment.
pub fn initialize_relay() {
	initialize_logger(true);
}

/// Initialize relay logger instance.
///
/// Reads `RUST_LOG` for overrides; without it, everything from the `bridge`
/// target at `info` and above is printed.
pub fn initialize_logger(with_timestamp: bool) {
	let mut builder = env_logger::Builder::new();
	builder.filter_level(log::LevelFilter::Warn);
	builder.filter_module("bridge", log::LevelFilter::Info);
	builder.parse_default_env();
	if with_timestamp {
		builder.format(move |buf, record| {
			writeln!(
				buf,
				"{} {} {} {}",
				buf.timestamp_seconds(),
				record.level(),
				record.target(),
				record.args(),
			)
		});
	} else {
		builder.format(move |buf, record| {
			writeln!(buf, "{} {} {}", record.level(), record.target(), record.args())
		});
	}

	builder.init();
}
