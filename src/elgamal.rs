// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Exponential ElGamal over secp256k1.
//!
//! A scalar `m` is encrypted under the public key `Y = y·G` with nonce `a` as
//! `(L, M) = (a·G, m·G + a·Y)`. Nobody ever decrypts these ciphertexts: they
//! only serve to bind a party to the scalars it used during pre-signing, so
//! that the proofs in the final round and in the abort round can refer to
//! them.

use crate::{
    errors::Result,
    utils::{random_nonzero_scalar, CurvePoint},
};
use k256::Scalar;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An ElGamal ciphertext `(L, M)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElGamalCiphertext {
    /// The nonce commitment `a·G`.
    pub(crate) L: CurvePoint,
    /// The masked message `m·G + a·Y`.
    pub(crate) M: CurvePoint,
}

/// A secret scalar: either an ElGamal secret key or an encryption nonce.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ElGamalSecret(Scalar);

impl Debug for ElGamalSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ElGamalSecret([redacted])")
    }
}

impl ElGamalSecret {
    /// Wrap a secret key or nonce produced elsewhere.
    pub fn new(secret: Scalar) -> Self {
        Self(secret)
    }

    /// Sample a fresh non-zero secret.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        Ok(Self(random_nonzero_scalar(rng)?))
    }

    pub(crate) fn as_scalar(&self) -> &Scalar {
        &self.0
    }

    /// The public point `secret·G`.
    pub(crate) fn public_point(&self) -> CurvePoint {
        CurvePoint::GENERATOR.multiply_by_scalar(&self.0)
    }
}

impl ElGamalCiphertext {
    /// Wrap a ciphertext `(L, M)` produced elsewhere.
    pub fn new(L: CurvePoint, M: CurvePoint) -> Self {
        Self { L, M }
    }

    /// Encrypt `m` under `public_key` using a fresh nonce, which is returned.
    pub fn encrypt<R: RngCore + CryptoRng>(
        rng: &mut R,
        public_key: &CurvePoint,
        m: &Scalar,
    ) -> Result<(Self, ElGamalSecret)> {
        let nonce = ElGamalSecret::random(rng)?;
        Ok((Self::encrypt_with_nonce(public_key, m, &nonce), nonce))
    }

    pub(crate) fn encrypt_with_nonce(
        public_key: &CurvePoint,
        m: &Scalar,
        nonce: &ElGamalSecret,
    ) -> Self {
        let L = nonce.public_point();
        let M = CurvePoint::GENERATOR.multiply_by_scalar(m)
            + public_key.multiply_by_scalar(nonce.as_scalar());
        Self { L, M }
    }

    /// Neither component may be the identity.
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.L.is_identity() && !self.M.is_identity()
    }
}
