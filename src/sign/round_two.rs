// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    engine::Output,
    errors::{InternalError, Result},
    messages::{Message, MessageType, SignMessageType},
    presign::record::{digest_to_scalar, PreSignature},
    protocol::{Identifier, ParticipantConfig, ParticipantIdentifier},
    round::Transition,
};
use k256::{
    ecdsa::{signature::DigestVerifier, Signature, VerifyingKey},
    Scalar,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use tracing::{error, info, instrument};

/// A participant's share `σ_i = k_i·m + r·χ_i` of the signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SignatureShare {
    sigma: Scalar,
}

impl SignatureShare {
    pub(crate) fn new(sigma: Scalar) -> Self {
        Self { sigma }
    }
}

/// The second signing round: check every `σ_j` against the public values of
/// the pre-signature and combine them into an ECDSA signature.
pub(crate) struct SignRoundTwo {
    identifier: Identifier,
    config: ParticipantConfig,
    presignature: PreSignature,
    digest: Sha256,
    /// `x(R) mod q`.
    r: Scalar,
    /// The digest as a scalar.
    m: Scalar,
    shares: HashMap<ParticipantIdentifier, Scalar>,
}

impl SignRoundTwo {
    pub(crate) fn new(
        identifier: Identifier,
        config: ParticipantConfig,
        presignature: PreSignature,
        digest: Sha256,
        own_share: SignatureShare,
    ) -> Result<Self> {
        let r = presignature.r()?;
        let m = digest_to_scalar(&digest);
        let mut shares = HashMap::new();
        let _ = shares.insert(config.id(), own_share.sigma);
        Ok(Self {
            identifier,
            config,
            presignature,
            digest,
            r,
            m,
            shares,
        })
    }

    pub(crate) fn message_type() -> MessageType {
        MessageType::Sign(SignMessageType::SignatureShare)
    }

    pub(crate) fn session(&self) -> (Identifier, &ParticipantConfig) {
        (self.identifier, &self.config)
    }

    /// Check `σ_j·R == m·RBar_j + r·S_j`.
    pub(crate) fn verify(&self, message: &Message) -> Result<SignatureShare> {
        let share: SignatureShare = deserialize!(message.unverified_bytes())?;
        let sender = message.from();
        let RBar = self.presignature.nonce_share_commitment(&sender)?;
        let S = self.presignature.chi_share_commitment(&sender)?;

        let lhs = self.presignature.nonce_point().multiply_by_scalar(&share.sigma);
        let rhs = RBar.multiply_by_scalar(&self.m) + S.multiply_by_scalar(&self.r);
        if lhs != rhs {
            error!("Signature share from {} is inconsistent with its pre-signature values", sender);
            return verify_err!("signature share check failed");
        }
        Ok(share)
    }

    pub(crate) fn store(&mut self, from: ParticipantIdentifier, share: SignatureShare) -> Result<()> {
        if self.shares.contains_key(&from) {
            error!("Received a second signature share from {}", from);
            return Err(InternalError::ProtocolError(Some(from)));
        }
        let _ = self.shares.insert(from, share.sigma);
        Ok(())
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.shares.len() == self.config.count()
    }

    #[instrument(skip_all, err(Debug))]
    pub(crate) fn finalize(self) -> Result<Transition> {
        let s: Scalar = self.shares.values().sum();
        let signature = Signature::from_scalars(self.r.to_bytes(), s.to_bytes()).map_err(|_| {
            error!("Failed to build a signature from (r, s)");
            InternalError::SignatureInstantiationError
        })?;
        let signature = signature.normalize_s().unwrap_or(signature);

        let verifying_key = VerifyingKey::from_affine(self.presignature.public_key().0.to_affine())
            .map_err(|_| {
                error!("The public key is not a valid verifying key");
                InternalError::InternalInvariantFailed
            })?;
        verifying_key
            .verify_digest(self.digest.clone(), &signature)
            .map_err(|_| {
                error!("Combined signature does not verify under the public key");
                InternalError::InternalInvariantFailed
            })?;

        info!("Produced a signature.");
        Ok(Transition::Output(Output::Signature(signature)))
    }
}
