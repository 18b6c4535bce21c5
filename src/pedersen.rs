// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A Pedersen commitment scheme over the hidden-order group `Z*_N`.
//!
//! This is the ring-Pedersen commitment of Definition 1.3 of
//! <https://eprint.iacr.org/2021/060.pdf>: a commitment to `x` with randomness
//! `y` is `s^x t^y mod N`. Binding relies on nobody knowing the factorization
//! of `N` nor the discrete logarithm of `s` with respect to `t`.

use crate::{
    errors::{InternalError, Result},
    paillier::DecryptionKey,
    utils::{modpow, random_bn_in_z_star, random_plusminus_scaled, random_positive_bn},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use tracing::error;

/// Public parameters `(N, s, t)` of a Pedersen commitment scheme.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PedersenParameters {
    /// The RSA modulus `N`.
    modulus: BigNumber,
    /// Generator `s`.
    s: BigNumber,
    /// Generator `t`.
    t: BigNumber,
}

/// A commitment produced by [`PedersenParameters::commit`], or received from
/// another party and therefore untrusted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment(BigNumber);

impl Commitment {
    /// Wrap an arbitrary value as a commitment.
    pub fn new(value: BigNumber) -> Self {
        Self(value)
    }

    /// The committed group element.
    pub fn as_bn(&self) -> &BigNumber {
        &self.0
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }
}

impl PedersenParameters {
    /// Build a scheme from its public parameters.
    ///
    /// Fails if either generator is not an element of `Z*_N` other than 1.
    pub fn new(modulus: BigNumber, s: BigNumber, t: BigNumber) -> Result<Self> {
        let params = Self { modulus, s, t };
        if !bool::from(params.is_valid_element(&params.s) & params.is_valid_element(&params.t)) {
            error!("Pedersen generators must be elements of Z*_N different from 0 and 1");
            return arg_err!("invalid Pedersen generators");
        }
        Ok(params)
    }

    /// Derive a scheme from a Paillier decryption key.
    ///
    /// `t = τ^2 mod N` for a random `τ ∈ Z*_N`, and `s = t^λ mod N` for a
    /// random `λ ∈ [0, φ(N))`. Also returns `λ`.
    pub fn extract<R: RngCore + CryptoRng>(
        sk: &DecryptionKey,
        rng: &mut R,
    ) -> Result<(Self, BigNumber)> {
        let modulus = sk.modulus();
        let totient = sk.totient();
        let tau = random_bn_in_z_star(rng, modulus)?;
        let lambda = random_positive_bn(rng, totient);
        let t = tau.modpow(&BigNumber::from(2u64), modulus);
        let s = t.modpow(&lambda, modulus);
        let params = Self::new(modulus.clone(), s, t)?;
        Ok((params, lambda))
    }

    /// Re-check the generators of parameters received from elsewhere.
    pub(crate) fn validate(&self) -> Result<()> {
        if !bool::from(self.is_valid_element(&self.s) & self.is_valid_element(&self.t)) {
            error!("Pedersen generators must be elements of Z*_N different from 0 and 1");
            return Err(InternalError::InternalInvariantFailed);
        }
        Ok(())
    }

    /// Returns the underlying modulus.
    pub fn modulus(&self) -> &BigNumber {
        &self.modulus
    }

    /// The generator `s`.
    pub fn s(&self) -> &BigNumber {
        &self.s
    }

    /// The generator `t`.
    pub fn t(&self) -> &BigNumber {
        &self.t
    }

    /// Sample commitment randomness from `± 2^range * N`.
    pub(crate) fn commitment_randomness<R: RngCore + CryptoRng>(
        &self,
        range: usize,
        rng: &mut R,
    ) -> BigNumber {
        random_plusminus_scaled(rng, range, &self.modulus)
    }

    /// Commit to `x` with randomness `y`, computing `s^x t^y mod N`.
    ///
    /// Both exponents may be negative.
    #[cfg_attr(feature = "flame_it", flame("PedersenParameters"))]
    pub fn commit(&self, x: &BigNumber, y: &BigNumber) -> Commitment {
        let a = modpow(&self.s, x, &self.modulus);
        let b = modpow(&self.t, y, &self.modulus);
        Commitment(a.modmul(&b, &self.modulus))
    }

    /// Check that `s^x t^y == S T^e mod N`.
    ///
    /// Returns `false` if the equation does not hold, or if `S` or `T` is not
    /// an element of `Z*_N` other than 1. Every check runs regardless of the
    /// outcome of the others and the final comparison is constant-time.
    #[cfg_attr(feature = "flame_it", flame("PedersenParameters"))]
    pub fn verify(
        &self,
        x: &BigNumber,
        y: &BigNumber,
        S: &Commitment,
        T: &Commitment,
        e: &BigNumber,
    ) -> bool {
        let S_is_valid = self.is_valid_element(&S.0);
        let T_is_valid = self.is_valid_element(&T.0);
        // A negative `e` inverts `T`, which fails outside `Z*_N`.
        let S = self.select_valid(&S.0, S_is_valid);
        let T = self.select_valid(&T.0, T_is_valid);

        let lhs = self.commit(x, y).0;
        let rhs = S.modmul(&modpow(&T, e, &self.modulus), &self.modulus);
        let equation_holds = self.ct_eq_mod_n(&lhs, &rhs);

        bool::from(S_is_valid & T_is_valid & equation_holds)
    }

    /// Returns `Choice(1)` iff `x ∈ [2, N)` and `gcd(x, N) = 1`.
    fn is_valid_element(&self, x: &BigNumber) -> Choice {
        let one = BigNumber::one();
        let above_one = Choice::from(u8::from(x > &one));
        let below_modulus = Choice::from(u8::from(x < &self.modulus));
        let coprime = Choice::from(u8::from(x.gcd(&self.modulus) == one));
        above_one & below_modulus & coprime
    }

    /// Returns `x` if `is_valid` is set and `t` otherwise, without branching
    /// on `is_valid`.
    fn select_valid(&self, x: &BigNumber, is_valid: Choice) -> BigNumber {
        let width = self.modulus.to_bytes().len();
        let candidate = Self::fixed_width_bytes(&x.nmod(&self.modulus), width);
        let fallback = Self::fixed_width_bytes(&self.t, width);
        let selected: Vec<u8> = fallback
            .iter()
            .zip(&candidate)
            .map(|(fallback, candidate)| u8::conditional_select(fallback, candidate, is_valid))
            .collect();
        BigNumber::from_slice(selected)
    }

    /// Compares two residues modulo `N` over their fixed-width encodings.
    fn ct_eq_mod_n(&self, a: &BigNumber, b: &BigNumber) -> Choice {
        let width = self.modulus.to_bytes().len();
        let a = Self::fixed_width_bytes(&a.nmod(&self.modulus), width);
        let b = Self::fixed_width_bytes(&b.nmod(&self.modulus), width);
        a.as_slice().ct_eq(b.as_slice())
    }

    fn fixed_width_bytes(x: &BigNumber, width: usize) -> Vec<u8> {
        let bytes = x.to_bytes();
        let mut padded = vec![0u8; width.saturating_sub(bytes.len())];
        padded.extend_from_slice(&bytes);
        padded
    }
}
