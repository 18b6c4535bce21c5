// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The identifiable-abort round.
//!
//! When the `χ` shares of the final pre-signing round do not add up to the
//! public key, every participant reveals its nonce share and its decrypted
//! multiplicative-to-additive shares, each with a proof of correct
//! decryption. From those values every participant recomputes what each `S_j`
//! should have been and names the participants whose values do not match.
//! The verdict is a deterministic function of the public transcript, so
//! every honest participant reaches the same one.

pub(crate) mod message;
pub(crate) mod round;

use crate::protocol::ParticipantIdentifier;
use serde::{Deserialize, Serialize};

/// Why a participant was blamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// The revealed nonce share does not open the participant's ElGamal
    /// encryption of it.
    InconsistentNonceShare,
    /// The participant's `S_j` does not match the value recomputed from the
    /// revealed shares.
    InconsistentChiShare,
    /// The participant's abort message was malformed or its proofs failed.
    InvalidAbortMessage,
}

/// The outcome of the abort round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortVerdict {
    culprits: Vec<ParticipantIdentifier>,
    reason: AbortReason,
}

impl AbortVerdict {
    pub(crate) fn new(mut culprits: Vec<ParticipantIdentifier>, reason: AbortReason) -> Self {
        culprits.sort();
        culprits.dedup();
        Self { culprits, reason }
    }

    /// The blamed participants, in ascending order.
    pub fn culprits(&self) -> &[ParticipantIdentifier] {
        &self.culprits
    }

    /// Why they were blamed.
    pub fn reason(&self) -> AbortReason {
        self.reason
    }
}
