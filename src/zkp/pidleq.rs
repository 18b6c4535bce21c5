// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Implements a zero-knowledge proof of equality of discrete logarithms
//! (Chaum-Pedersen).
//!
//! Given points `H`, `X` and `Y`, the prover shows knowledge of `a` such that
//! `H = a·G` and `Y = a·X`. In the abort round this ties the revealed value
//! `ŷ = a·Y_i` to the first component `a·G` of an ElGamal ciphertext.

use super::Proof;
use crate::{
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
pub(crate) struct PiDlEqProof {
    /// Commitment `α·G`.
    generator_commit: CurvePoint,
    /// Commitment `α·X`.
    base_commit: CurvePoint,
    challenge: Scalar,
    /// Response `α + e·a`.
    response: Scalar,
}

#[derive(Serialize, Clone, Copy)]
pub(crate) struct PiDlEqInput {
    /// `a·G`.
    H: CurvePoint,
    /// The second base.
    X: CurvePoint,
    /// `a·X`.
    Y: CurvePoint,
}

impl PiDlEqInput {
    pub(crate) fn new(H: CurvePoint, X: CurvePoint, Y: CurvePoint) -> Self {
        Self { H, X, Y }
    }
}

#[derive(ZeroizeOnDrop)]
pub(crate) struct PiDlEqSecret(Scalar);

impl std::fmt::Debug for PiDlEqSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PiDlEqSecret([redacted])")
    }
}

impl PiDlEqSecret {
    pub(crate) fn new(exponent: &Scalar) -> Self {
        Self(*exponent)
    }
}

impl Proof for PiDlEqProof {
    type CommonInput = PiDlEqInput;
    type ProverSecret = PiDlEqSecret;

    fn prove<R: RngCore + CryptoRng>(
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
        transcript: &mut Transcript,
        rng: &mut R,
    ) -> Result<Self> {
        let mask = random_nonzero_scalar(rng)?;
        let generator_commit = CurvePoint::GENERATOR.multiply_by_scalar(&mask);
        let base_commit = input.X.multiply_by_scalar(&mask);

        Self::fill_out_transcript(transcript, input, &generator_commit, &base_commit)?;
        let challenge = scalar_challenge_from_transcript(transcript)?;
        let response = mask + challenge * secret.0;

        Ok(Self {
            generator_commit,
            base_commit,
            challenge,
            response,
        })
    }

    fn verify(&self, input: &Self::CommonInput, transcript: &mut Transcript) -> Result<()> {
        Self::fill_out_transcript(transcript, input, &self.generator_commit, &self.base_commit)?;
        let challenge = scalar_challenge_from_transcript(transcript)?;
        if challenge != self.challenge {
            error!("Fiat-Shamir consistency check failed");
            return verify_err!("Fiat-Shamir challenge mismatch");
        }

        let generator_check = CurvePoint::GENERATOR.multiply_by_scalar(&self.response)
            == self.generator_commit + input.H.multiply_by_scalar(&challenge);
        let base_check = input.X.multiply_by_scalar(&self.response)
            == self.base_commit + input.Y.multiply_by_scalar(&challenge);
        if !(generator_check && base_check) {
            error!("Discrete logarithms are not equal");
            return verify_err!("discrete log equality check failed");
        }
        Ok(())
    }
}

impl PiDlEqProof {
    fn fill_out_transcript(
        transcript: &mut Transcript,
        input: &PiDlEqInput,
        generator_commit: &CurvePoint,
        base_commit: &CurvePoint,
    ) -> Result<()> {
        transcript.append_message(b"PiDlEq CommonInput", &serialize!(input)?);
        transcript.append_message(
            b"(A, B)",
            &[generator_commit.to_bytes(), base_commit.to_bytes()].concat(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::get_test_rng;

    fn transcript() -> Transcript {
        Transcript::new(b"PiDlEqProof Test")
    }

    #[test]
    fn equal_logs_verify_and_unequal_logs_fail() -> Result<()> {
        let mut rng = get_test_rng();
        let a = random_nonzero_scalar(&mut rng)?;
        let X = CurvePoint::GENERATOR.multiply_by_scalar(&random_nonzero_scalar(&mut rng)?);
        let H = CurvePoint::GENERATOR.multiply_by_scalar(&a);

        let input = PiDlEqInput::new(H, X, X.multiply_by_scalar(&a));
        let proof = PiDlEqProof::prove(&input, &PiDlEqSecret::new(&a), &mut transcript(), &mut rng)?;
        assert!(proof.verify(&input, &mut transcript()).is_ok());

        let wrong = PiDlEqInput::new(H, X, X.multiply_by_scalar(&(a + Scalar::ONE)));
        let proof = PiDlEqProof::prove(&wrong, &PiDlEqSecret::new(&a), &mut transcript(), &mut rng)?;
        assert!(proof.verify(&wrong, &mut transcript()).is_err());
        Ok(())
    }
}
