// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    context::PresignContext,
    errors::{InternalError, Result},
    protocol::{ParticipantConfig, ParticipantIdentifier},
    utils::CurvePoint,
};
use k256::{
    elliptic_curve::{bigint::U256, ops::Reduce},
    Scalar,
};
use sha2::{Digest, Sha256};
use std::{collections::HashMap, fmt::Debug};
use tracing::error;
use zeroize::ZeroizeOnDrop;

/// The precomputation used to create a partial signature.
///
/// # 🔒 Storage requirements
/// This type must be stored securely by the calling application.
///
/// # 🔒 Lifetime requirements
/// This type must only be used _once_.
#[derive(ZeroizeOnDrop)]
pub struct PreSignature {
    #[zeroize(skip)]
    public_key: CurvePoint,
    #[zeroize(skip)]
    R: CurvePoint,
    /// `RBar_j = k_j·R` for every participant.
    #[zeroize(skip)]
    RBar: HashMap<ParticipantIdentifier, CurvePoint>,
    /// `S_j = χ_j·R` for every participant.
    #[zeroize(skip)]
    S: HashMap<ParticipantIdentifier, CurvePoint>,
    k: Scalar,
    chi: Scalar,
}

impl Debug for PreSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreSignature")
            .field("public_key", &self.public_key)
            .field("R", &"[redacted]")
            .field("RBar", &"[redacted]")
            .field("S", &"[redacted]")
            .field("k", &"[redacted]")
            .field("chi", &"[redacted]")
            .finish()
    }
}

impl PreSignature {
    pub(crate) fn new(
        context: &PresignContext,
        S: HashMap<ParticipantIdentifier, CurvePoint>,
    ) -> Result<Self> {
        let RBar = context
            .config()
            .all_participants()
            .into_iter()
            .map(|id| Ok((id, context.party(&id)?.nonce_share_commitment)))
            .collect::<Result<HashMap<_, _>>>()?;
        let private = context.private();
        Ok(Self {
            public_key: *context.public_key(),
            R: *context.nonce_point(),
            RBar,
            S,
            k: private.nonce_share,
            chi: private.chi_share,
        })
    }

    /// The public key the signature will verify under.
    pub fn public_key(&self) -> &CurvePoint {
        &self.public_key
    }

    /// The nonce point `R`.
    pub fn nonce_point(&self) -> &CurvePoint {
        &self.R
    }

    /// Check that this pre-signature was produced for the participants of
    /// `config`.
    pub(crate) fn check_participants(&self, config: &ParticipantConfig) -> Result<()> {
        let expected = config.all_participants();
        let covers = |map: &HashMap<ParticipantIdentifier, CurvePoint>| {
            map.len() == expected.len() && expected.iter().all(|id| map.contains_key(id))
        };
        if !covers(&self.RBar) || !covers(&self.S) {
            error!("Pre-signature does not match the configured participants");
            return arg_err!("pre-signature was produced for other participants");
        }
        Ok(())
    }

    /// `x(R) mod q`.
    pub(crate) fn r(&self) -> Result<Scalar> {
        self.R.x_projection()
    }

    pub(crate) fn nonce_share_commitment(&self, id: &ParticipantIdentifier) -> Result<&CurvePoint> {
        self.RBar.get(id).ok_or_else(|| {
            error!("No nonce share commitment for {}", id);
            InternalError::InternalInvariantFailed
        })
    }

    pub(crate) fn chi_share_commitment(&self, id: &ParticipantIdentifier) -> Result<&CurvePoint> {
        self.S.get(id).ok_or_else(|| {
            error!("No χ share commitment for {}", id);
            InternalError::InternalInvariantFailed
        })
    }

    /// Compute this participant's signature share `σ_i = k_i·m + r·χ_i`.
    pub(crate) fn signature_share(&self, digest: &Sha256) -> Result<Scalar> {
        let m = digest_to_scalar(digest);
        let r = self.r()?;
        Ok(self.k * m + r * self.chi)
    }
}

#[cfg(test)]
impl PreSignature {
    pub(crate) fn nonce_share(&self) -> &Scalar {
        &self.k
    }

    pub(crate) fn chi_share_commitments(&self) -> &HashMap<ParticipantIdentifier, CurvePoint> {
        &self.S
    }
}

/// The message digest reduced into the scalar field, as ECDSA does for
/// 256-bit digests.
pub(crate) fn digest_to_scalar(digest: &Sha256) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&digest.clone().finalize())
}
