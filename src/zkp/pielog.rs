// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Implements a zero-knowledge proof that an ElGamal ciphertext and a curve
//! point hide the same scalar.
//!
//! Given an ElGamal ciphertext `(L, M)` under the key `X`, a base point `H` and
//! a point `Y`, the prover shows knowledge of `(y, λ)` such that
//!
//! ```text
//! L = λ·G,    M = y·G + λ·X,    Y = y·H.
//! ```
//!
//! This is Π^{elog} of CGGMP[^cite] (Figure 23), made non-interactive with a
//! Fiat-Shamir transformation.
//!
//! [^cite]: Ran Canetti, Rosario Gennaro, Steven Goldfeder, Nikolaos Makriyannis, and Udi Peled.
//! UC Non-Interactive, Proactive, Threshold ECDSA with Identifiable Aborts.
//! [EPrint archive, 2021](https://eprint.iacr.org/2021/060.pdf).

use super::Proof;
use crate::{
    elgamal::ElGamalCiphertext,
    errors::*,
    utils::{random_nonzero_scalar, scalar_challenge_from_transcript, CurvePoint},
};
use k256::Scalar;
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::error;
use zeroize::ZeroizeOnDrop;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PiElogProof {
    /// Commitment to the ElGamal nonce mask (`A` in the paper).
    nonce_commit: CurvePoint,
    /// Masked ElGamal encryption of the plaintext mask (`N` in the paper).
    masked_ciphertext_commit: CurvePoint,
    /// Commitment to the plaintext mask over the base (`B` in the paper).
    base_commit: CurvePoint,
    /// Fiat-Shamir challenge (`e` in the paper).
    challenge: Scalar,
    /// Response binding the ElGamal nonce (`z` in the paper).
    nonce_response: Scalar,
    /// Response binding the plaintext (`u` in the paper).
    plaintext_response: Scalar,
}

/// Common input known to both the prover and verifier.
#[derive(Serialize, Clone, Copy)]
pub(crate) struct PiElogInput {
    ciphertext: ElGamalCiphertext,
    elgamal_key: CurvePoint,
    base: CurvePoint,
    Y: CurvePoint,
}

impl PiElogInput {
    pub(crate) fn new(
        ciphertext: ElGamalCiphertext,
        elgamal_key: CurvePoint,
        base: CurvePoint,
        Y: CurvePoint,
    ) -> Self {
        Self {
            ciphertext,
            elgamal_key,
            base,
            Y,
        }
    }
}

/// The prover's plaintext `y` and ElGamal nonce `λ`.
#[derive(ZeroizeOnDrop)]
pub(crate) struct PiElogSecret {
    plaintext: Scalar,
    nonce: Scalar,
}

impl std::fmt::Debug for PiElogSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiElogSecret")
            .field("plaintext", &"[redacted]")
            .field("nonce", &"[redacted]")
            .finish()
    }
}

impl PiElogSecret {
    pub(crate) fn new(plaintext: &Scalar, nonce: &Scalar) -> Self {
        Self {
            plaintext: *plaintext,
            nonce: *nonce,
        }
    }
}

impl Proof for PiElogProof {
    type CommonInput = PiElogInput;
    type ProverSecret = PiElogSecret;

    #[cfg_attr(feature = "flame_it", flame("PiElogProof"))]
    fn prove<R: RngCore + CryptoRng>(
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
        transcript: &mut Transcript,
        rng: &mut R,
    ) -> Result<Self> {
        let nonce_mask = random_nonzero_scalar(rng)?;
        let plaintext_mask = random_nonzero_scalar(rng)?;

        let nonce_commit = CurvePoint::GENERATOR.multiply_by_scalar(&nonce_mask);
        let masked_ciphertext_commit = CurvePoint::GENERATOR.multiply_by_scalar(&plaintext_mask)
            + input.elgamal_key.multiply_by_scalar(&nonce_mask);
        let base_commit = input.base.multiply_by_scalar(&plaintext_mask);

        Self::fill_out_transcript(
            transcript,
            input,
            &nonce_commit,
            &masked_ciphertext_commit,
            &base_commit,
        )?;
        let challenge = scalar_challenge_from_transcript(transcript)?;

        let nonce_response = nonce_mask + challenge * secret.nonce;
        let plaintext_response = plaintext_mask + challenge * secret.plaintext;

        Ok(Self {
            nonce_commit,
            masked_ciphertext_commit,
            base_commit,
            challenge,
            nonce_response,
            plaintext_response,
        })
    }

    #[cfg_attr(feature = "flame_it", flame("PiElogProof"))]
    fn verify(&self, input: &Self::CommonInput, transcript: &mut Transcript) -> Result<()> {
        Self::fill_out_transcript(
            transcript,
            input,
            &self.nonce_commit,
            &self.masked_ciphertext_commit,
            &self.base_commit,
        )?;
        let challenge = scalar_challenge_from_transcript(transcript)?;
        if challenge != self.challenge {
            error!("Fiat-Shamir consistency check failed");
            return verify_err!("Fiat-Shamir challenge mismatch");
        }

        // z·G == A + e·L
        let nonce_check = CurvePoint::GENERATOR.multiply_by_scalar(&self.nonce_response)
            == self.nonce_commit + input.ciphertext.L.multiply_by_scalar(&challenge);
        if !nonce_check {
            error!("ElGamal nonce check (first equality) failed");
            return verify_err!("ElGamal nonce check failed");
        }

        // z·X + u·G == N + e·M
        let ciphertext_check = input.elgamal_key.multiply_by_scalar(&self.nonce_response)
            + CurvePoint::GENERATOR.multiply_by_scalar(&self.plaintext_response)
            == self.masked_ciphertext_commit + input.ciphertext.M.multiply_by_scalar(&challenge);
        if !ciphertext_check {
            error!("ElGamal ciphertext check (second equality) failed");
            return verify_err!("ElGamal ciphertext check failed");
        }

        // u·H == B + e·Y
        let base_check = input.base.multiply_by_scalar(&self.plaintext_response)
            == self.base_commit + input.Y.multiply_by_scalar(&challenge);
        if !base_check {
            error!("Discrete log check over the base (third equality) failed");
            return verify_err!("discrete log check failed");
        }

        Ok(())
    }
}

impl PiElogProof {
    fn fill_out_transcript(
        transcript: &mut Transcript,
        input: &PiElogInput,
        nonce_commit: &CurvePoint,
        masked_ciphertext_commit: &CurvePoint,
        base_commit: &CurvePoint,
    ) -> Result<()> {
        transcript.append_message(b"PiElog CommonInput", &serialize!(input)?);
        transcript.append_message(
            b"(A, N, B)",
            &[
                nonce_commit.to_bytes(),
                masked_ciphertext_commit.to_bytes(),
                base_commit.to_bytes(),
            ]
            .concat(),
        );
        Ok(())
    }
}
