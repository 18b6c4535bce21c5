// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Paillier encryption, with the extra operations the pre-signing proofs need:
//! encryption under a caller-chosen nonce, homomorphic masking, and recovery
//! of the nonce of a ciphertext by the owner of the decryption key.

use crate::{
    errors::{InternalError, Result},
    utils::{modpow, random_bn_in_z_star},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::error;

/// A Paillier ciphertext, an element of `Z*_{N^2}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext(BigNumber);

impl Ciphertext {
    /// Wrap a ciphertext produced elsewhere.
    pub fn new(value: BigNumber) -> Self {
        Self(value)
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }
}

/// The randomness used to produce a [`Ciphertext`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Nonce(BigNumber);

impl Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Nonce([redacted])")
    }
}

impl Nonce {
    pub(crate) fn as_bn(&self) -> &BigNumber {
        &self.0
    }
}

/// A [`Nonce`] combined with a mask and a challenge, as sent in a proof
/// response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct MaskedNonce(BigNumber);

impl MaskedNonce {
    pub(crate) fn as_bn(&self) -> &BigNumber {
        &self.0
    }
}

impl From<&Nonce> for MaskedNonce {
    fn from(nonce: &Nonce) -> Self {
        MaskedNonce(nonce.0.clone())
    }
}

/// A Paillier encryption key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptionKey(libpaillier::EncryptionKey);

impl EncryptionKey {
    pub(crate) fn n(&self) -> &BigNumber {
        self.0.n()
    }

    pub(crate) fn nn(&self) -> &BigNumber {
        self.0.nn()
    }

    /// Sample a nonce from `Z*_N`.
    pub(crate) fn random_nonce<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Nonce> {
        Ok(Nonce(random_bn_in_z_star(rng, self.n())?))
    }

    /// Encrypt `x` under a freshly sampled nonce.
    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) fn encrypt<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        x: &BigNumber,
    ) -> Result<(Ciphertext, Nonce)> {
        let nonce = self.random_nonce(rng)?;
        let c = self.encrypt_with_nonce(x, &MaskedNonce::from(&nonce))?;
        Ok((c, nonce))
    }

    /// Compute `(1 + N)^x * nonce^N mod N^2`.
    ///
    /// `x` may be negative; the plaintext is then `x mod N`.
    pub(crate) fn encrypt_with_nonce(&self, x: &BigNumber, nonce: &MaskedNonce) -> Result<Ciphertext> {
        if nonce.0 <= BigNumber::zero() || &nonce.0 >= self.n() {
            error!("Encryption nonce is outside of [1, N)");
            return Err(InternalError::InternalInvariantFailed);
        }
        let one = BigNumber::one();
        let base = one + self.n();
        let a = modpow(&base, x, self.nn());
        let b = modpow(&nonce.0, self.n(), self.nn());
        Ok(Ciphertext(a.modmul(&b, self.nn())))
    }

    /// Compute `c1^e * c2 mod N^2`, which encrypts `e * m1 + m2`.
    pub(crate) fn multiply_and_add(
        &self,
        e: &BigNumber,
        c1: &Ciphertext,
        c2: &Ciphertext,
    ) -> Result<Ciphertext> {
        let c = modpow(&c1.0, e, self.nn()).modmul(&c2.0, self.nn());
        Ok(Ciphertext(c))
    }

    /// Compute `mask * nonce^e mod N`.
    pub(crate) fn mask(&self, nonce: &Nonce, mask: &Nonce, e: &BigNumber) -> MaskedNonce {
        MaskedNonce(mask.0.modmul(&modpow(&nonce.0, e, self.n()), self.n()))
    }

    /// Strip the plaintext `x` out of `c`, leaving `c * (1 + N)^{-x} mod N^2`.
    ///
    /// When `x` is the plaintext of `c`, the result is the `N`-th power of the
    /// encryption nonce. Uses `(1 + N)^{-x} = 1 - xN mod N^2`.
    pub(crate) fn strip_plaintext(&self, c: &Ciphertext, x: &BigNumber) -> BigNumber {
        let factor = BigNumber::one().modsub(&(x * self.n()), self.nn());
        c.0.modmul(&factor, self.nn())
    }

    /// Returns `true` if `c` is an element of `Z*_{N^2}`.
    pub(crate) fn is_valid_ciphertext(&self, c: &Ciphertext) -> bool {
        c.0 > BigNumber::zero() && &c.0 < self.nn() && c.0.gcd(self.n()) == BigNumber::one()
    }
}

/// A Paillier decryption key.
///
/// # 🔒 Storage requirements
/// This type must be stored securely by the calling application.
#[derive(Clone, Serialize, Deserialize)]
pub struct DecryptionKey(libpaillier::DecryptionKey);

impl Debug for DecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DecryptionKey([redacted])")
    }
}

impl DecryptionKey {
    /// Build a key from two distinct safe primes.
    pub fn from_primes(p: &BigNumber, q: &BigNumber) -> Result<Self> {
        libpaillier::DecryptionKey::with_primes_unchecked(p, q)
            .map(Self)
            .ok_or_else(|| {
                error!("Failed to construct a Paillier decryption key from the given primes");
                InternalError::InternalInvariantFailed
            })
    }

    /// The matching encryption key.
    pub fn encryption_key(&self) -> EncryptionKey {
        EncryptionKey(libpaillier::EncryptionKey::from(&self.0))
    }

    pub(crate) fn modulus(&self) -> &BigNumber {
        self.0.n()
    }

    /// Euler's totient `φ(N) = (p - 1)(q - 1)`.
    pub(crate) fn totient(&self) -> &BigNumber {
        self.0.totient()
    }

    /// Decrypt `c` into a plaintext in `[0, N)`.
    pub(crate) fn decrypt(&self, c: &Ciphertext) -> Result<BigNumber> {
        self.0
            .decrypt(&c.0)
            .map(BigNumber::from_slice)
            .ok_or_else(|| {
                error!("Paillier decryption failed");
                InternalError::PaillierDecryptionFailed
            })
    }

    /// Decrypt `c` and also recover the nonce it was encrypted under.
    ///
    /// With `x` the plaintext, `c * (1 + N)^{-x} = ρ^N mod N^2`, and `ρ` is
    /// recovered by raising to `N^{-1} mod φ(N)`.
    pub(crate) fn decrypt_with_nonce(&self, c: &Ciphertext) -> Result<(BigNumber, Nonce)> {
        let x = self.decrypt(c)?;
        let ek = self.encryption_key();
        let residue = ek.strip_plaintext(c, &x).nmod(ek.n());
        let n_inverse = ek.n().invert(self.totient()).ok_or_else(|| {
            error!("Paillier modulus is not invertible modulo its totient");
            InternalError::CouldNotInvertBigNumber
        })?;
        let nonce = modpow(&residue, &n_inverse, ek.n());
        Ok((x, Nonce(nonce)))
    }
}

#[cfg(test)]
impl DecryptionKey {
    /// Builds a key from two distinct precomputed safe primes.
    pub(crate) fn new<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        use rand::seq::SliceRandom;
        let primes = crate::safe_primes_1024::get_safe_primes();
        let chosen: Vec<&BigNumber> = primes.choose_multiple(rng, 2).collect();
        Self::from_primes(chosen[0], chosen[1])
    }
}
