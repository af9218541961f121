// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Verification errors.

use crate::expr::ExprError;
use crate::filter::PktIndex;

/// Outcome of a failed packet verification step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerifyError {
    #[error("packet not found in range {index}~{stop}")]
    PacketNotFound { index: PktIndex, stop: PktIndex },
    #[error("unexpected packet #{number} found searching from {index}")]
    UnexpectedPacketFound { index: PktIndex, number: usize },
    #[error("packet #{number} failed verification: {reason}")]
    VerificationFailed { number: usize, reason: String },
    #[error("index {index} out of range {start}~{stop}")]
    IndexOutOfRange {
        index: PktIndex,
        start: PktIndex,
        stop: PktIndex,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Expr(#[from] ExprError),
}
