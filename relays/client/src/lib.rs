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

//! Generic WebSocket client for chain nodes.
//!
//! Everything chain-specific (call encodings, runtime API names) stays in the
//! chain adapters; this crate only knows how to speak JSON-RPC, decode
//! node notifications and track submitted transactions.

pub mod error;
pub mod rpc;
pub mod signer;
pub mod transaction_tracker;
pub mod types;

pub use error::{Error, Result};
pub use rpc::{Client, ConnectionParams, Subscription};
pub use signer::TransactionSigner;
pub use transaction_tracker::wait_until_finalized;
pub use types::{BlockNumber, Bytes, Hash, Header, HeaderId, Nonce, SetId, SubmissionStatus};
