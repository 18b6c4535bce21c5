// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Fiat-Shamir transcripts bound to a session and a prover.
//!
//! Every proof in a run is produced over a [`Transcript`] obtained from
//! [`SessionTranscript::for_participant`], which is a pure function of the
//! session digest, the prover's identifier and the round the proof belongs
//! to. A proof produced by one participant therefore fails to verify when
//! replayed under another participant's name, in another round, or in
//! another session.

use crate::{
    protocol::{Identifier, ParticipantIdentifier},
    utils::CurvePoint,
};
use merlin::Transcript;
use sha2::{Digest, Sha256};

/// Transcript domain for the nonce encryption proofs inherited from the first
/// pre-signing round.
pub(crate) const NONCE_ENCRYPTION_DOMAIN: &[u8] = b"presign round one";
/// Transcript domain for the proofs sent in the final pre-signing round.
pub(crate) const CHI_SHARE_DOMAIN: &[u8] = b"presign round seven";
/// Transcript domain for the proofs sent in the abort round.
pub(crate) const ABORT_DOMAIN: &[u8] = b"presign abort";

/// A digest of the public data every participant agrees on for a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SessionTranscript {
    digest: [u8; 32],
}

impl SessionTranscript {
    pub(crate) fn new(
        identifier: Identifier,
        participants: &[ParticipantIdentifier],
        public_key: &CurvePoint,
        nonce_point: &CurvePoint,
    ) -> Self {
        let mut sorted = participants.to_vec();
        sorted.sort();

        let mut hasher = Sha256::new();
        hasher.update(b"tss-presign session");
        hasher.update(identifier.to_bytes());
        for id in sorted {
            hasher.update(id.to_bytes());
        }
        hasher.update(public_key.to_bytes());
        hasher.update(nonce_point.to_bytes());
        Self {
            digest: hasher.finalize().into(),
        }
    }

    /// A fresh transcript for proofs produced by `id` in `domain`.
    pub(crate) fn for_participant(
        &self,
        id: ParticipantIdentifier,
        domain: &'static [u8],
    ) -> Transcript {
        let mut transcript = Transcript::new(b"tss-presign");
        transcript.append_message(b"session", &self.digest);
        transcript.append_message(b"domain", domain);
        transcript.append_message(b"prover", &id.to_bytes());
        transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::get_test_rng;

    fn challenge(mut transcript: Transcript) -> [u8; 32] {
        let mut out = [0u8; 32];
        transcript.challenge_bytes(b"test", &mut out);
        out
    }

    #[test]
    fn transcripts_are_pure_and_bound_to_prover_and_domain() {
        let mut rng = get_test_rng();
        let a = ParticipantIdentifier::random(&mut rng);
        let b = ParticipantIdentifier::random(&mut rng);
        let session = SessionTranscript::new(
            Identifier::random(&mut rng),
            &[a, b],
            &CurvePoint::GENERATOR,
            &CurvePoint::GENERATOR,
        );

        let first = challenge(session.for_participant(a, CHI_SHARE_DOMAIN));
        assert_eq!(first, challenge(session.for_participant(a, CHI_SHARE_DOMAIN)));
        assert_ne!(first, challenge(session.for_participant(b, CHI_SHARE_DOMAIN)));
        assert_ne!(first, challenge(session.for_participant(a, ABORT_DOMAIN)));
    }

    #[test]
    fn participant_order_does_not_change_the_session() {
        let mut rng = get_test_rng();
        let identifier = Identifier::random(&mut rng);
        let a = ParticipantIdentifier::random(&mut rng);
        let b = ParticipantIdentifier::random(&mut rng);
        let g = CurvePoint::GENERATOR;

        let forward = SessionTranscript::new(identifier, &[a, b], &g, &g);
        let backward = SessionTranscript::new(identifier, &[b, a], &g, &g);
        assert_eq!(forward, backward);

        let other = SessionTranscript::new(Identifier::random(&mut rng), &[a, b], &g, &g);
        assert_ne!(forward, other);
    }
}
