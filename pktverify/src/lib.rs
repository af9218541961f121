// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Verification of Thread certification captures.
//!
//! A capture is loaded as a sequence of decoded [`Packet`]s, each made of
//! dissector layers and their fields. A [`PacketFilter`] walks the capture
//! with a cursor: chained `filter_*` calls narrow the set of packets of
//! interest and [`PacketFilter::must_next`] asserts that the next one exists,
//! moving the cursor (and the cursor of every filter it was derived from)
//! past it. [`PacketVerifier`] bundles a capture with the test information
//! the test runner wrote, and the node variables (`LEADER`, `ROUTER_RLOC16`,
//! ...) derived from it.
//!
//! ```ignore
//! let v = PacketVerifier::new(Path::new("test_info.json"), &[])?;
//! let pkts = v.pkts();
//! let leader = v.var("LEADER").and_then(FieldValue::as_ext_addr).unwrap();
//! pkts.filter_wpan_src64(leader)
//!     .filter_mle_cmd(consts::MLE_ADVERTISEMENT)
//!     .must_next()?;
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![allow(clippy::similar_names)]

pub mod addrs;
pub mod bytes;
pub mod capture;
pub mod consts;
pub mod errors;
pub mod expr;
pub mod filter;
pub mod layer_fields;
pub mod packet;
pub mod summary;
pub mod test_info;
pub mod value;
pub mod verifier;

// re-exports
pub use addrs::{AddrParseError, EthAddr, ExtAddr, Ipv6Addr, Ipv6Prefix};
pub use bytes::Bytes;
pub use capture::CaptureError;
pub use errors::VerifyError;
pub use expr::{Expr, ExprError};
pub use filter::{MplSeed, PacketFilter, PacketRef, PktIndex, Role, SavedIndex};
pub use layer_fields::FieldError;
pub use packet::{Layer, Packet, RawField};
pub use summary::Summary;
pub use test_info::{TestInfo, TestInfoError};
pub use value::{FieldValue, Vars};
pub use verifier::{ChildType, PacketVerifier, VerifierError, VerifyResult};
