// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Implements a zero-knowledge proof of knowledge that the plaintext of a
//! Pailler ciphertext is in a given range.
//!
//! The proof is defined in Figure 14 of CGGMP[^cite]. The plaintext value must
//! be in the range `[-2^ℓ, 2^ℓ]`, where `ℓ` is
//! [`parameters::ELL`](crate::parameters::ELL). The range check is carried by
//! the verifier's [`PedersenParameters`].
//!
//! In pre-signing, each participant's Paillier encryption of its nonce share
//! comes with one such proof per verifier, and every participant re-checks the
//! proofs addressed to it before the final round.
//!
//! [^cite]: Ran Canetti, Rosario Gennaro, Steven Goldfeder, Nikolaos Makriyannis, and Udi Peled.
//! UC Non-Interactive, Proactive, Threshold ECDSA with Identifiable Aborts.
//! [EPrint archive, 2021](https://eprint.iacr.org/2021/060.pdf).

use super::Proof;
use crate::{
    errors::*,
    paillier::{Ciphertext, EncryptionKey, MaskedNonce, Nonce},
    parameters::{ELL, EPSILON},
    pedersen::{Commitment, PedersenParameters},
    utils::{plusminus_challenge_from_transcript, random_plusminus_by_size, within_bound_by_size},
};
use libpaillier::unknown_order::BigNumber;
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Proof of knowledge of the plaintext value of a ciphertext, where the value
/// is within a desired range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiEncProof {
    /// Commitment to the plaintext value of the ciphertext (`S` in the paper).
    plaintext_commit: Commitment,
    /// Masking ciphertext (`A` in the paper).
    /// This is the encryption of the plaintext mask.
    ciphertext_mask: Ciphertext,
    /// Commitment to the plaintext mask (`C` in the paper).
    plaintext_mask_commit: Commitment,
    /// Fiat-Shamir challenge (`e` in the paper).
    challenge: BigNumber,
    /// Response binding the plaintext value of the ciphertext and its mask
    /// (`z1` in the paper).
    plaintext_response: BigNumber,
    /// Response binding the nonce from the original ciphertext and its mask
    /// (`z2` in the paper).
    nonce_response: MaskedNonce,
    /// Response binding the commitment randomness used in the two commitments
    /// (`z3` in the paper).
    randomness_response: BigNumber,
}

/// Common input and setup parameters known to both the prover and verifier.
#[derive(Serialize, Clone)]
pub(crate) struct PiEncInput {
    /// The verifier's commitment parameters (`(N^hat, s, t)` in the paper).
    pedersen: PedersenParameters,
    /// The prover's encryption key (`N_0` in the paper).
    encryption_key: EncryptionKey,
    /// Ciphertext about which we are proving properties (`K` in the paper).
    ciphertext: Ciphertext,
}

impl PiEncInput {
    pub(crate) fn new(
        verifier_pedersen: PedersenParameters,
        prover_encryption_key: EncryptionKey,
        ciphertext: Ciphertext,
    ) -> Self {
        Self {
            pedersen: verifier_pedersen,
            encryption_key: prover_encryption_key,
            ciphertext,
        }
    }
}

/// The prover's secret knowledge: the in-range plaintext value of the
/// ciphertext and its corresponding nonce.
pub(crate) struct PiEncSecret {
    plaintext: BigNumber,
    nonce: Nonce,
}

impl std::fmt::Debug for PiEncSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiEncSecret")
            .field("plaintext", &"[redacted]")
            .field("nonce", &"[redacted]")
            .finish()
    }
}

impl PiEncSecret {
    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) fn new(plaintext: BigNumber, nonce: Nonce) -> Self {
        Self { plaintext, nonce }
    }
}

impl Proof for PiEncProof {
    type CommonInput = PiEncInput;
    type ProverSecret = PiEncSecret;

    #[cfg_attr(feature = "flame_it", flame("PiEncProof"))]
    fn prove<R: RngCore + CryptoRng>(
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
        transcript: &mut Transcript,
        rng: &mut R,
    ) -> Result<Self> {
        let PiEncInput {
            pedersen,
            encryption_key,
            ..
        } = input;

        // Sample a mask for the plaintext (aka `alpha`)
        let plaintext_mask = random_plusminus_by_size(rng, ELL + EPSILON);

        // Sample commitment randomness for plaintext and plaintext mask (aka `mu`,
        // `gamma`)
        let mu = pedersen.commitment_randomness(ELL, rng);
        let gamma = pedersen.commitment_randomness(ELL + EPSILON, rng);

        let plaintext_commit = pedersen.commit(&secret.plaintext, &mu);

        // Encrypt the mask for the plaintext (aka `A, r`)
        let nonce_mask = encryption_key.random_nonce(rng)?;
        let ciphertext_mask =
            encryption_key.encrypt_with_nonce(&plaintext_mask, &MaskedNonce::from(&nonce_mask))?;

        let plaintext_mask_commit = pedersen.commit(&plaintext_mask, &gamma);

        Self::fill_out_transcript(
            transcript,
            input,
            &plaintext_commit,
            &ciphertext_mask,
            &plaintext_mask_commit,
        )?;
        let challenge = plusminus_challenge_from_transcript(transcript)?;

        // Each response combines one secret value with its mask and the challenge
        let plaintext_response = &plaintext_mask + &challenge * &secret.plaintext;
        let nonce_response = encryption_key.mask(&secret.nonce, &nonce_mask, &challenge);
        let randomness_response = gamma + &challenge * mu;

        Ok(Self {
            plaintext_commit,
            ciphertext_mask,
            plaintext_mask_commit,
            challenge,
            plaintext_response,
            nonce_response,
            randomness_response,
        })
    }

    #[cfg_attr(feature = "flame_it", flame("PiEncProof"))]
    fn verify(&self, input: &Self::CommonInput, transcript: &mut Transcript) -> Result<()> {
        Self::fill_out_transcript(
            transcript,
            input,
            &self.plaintext_commit,
            &self.ciphertext_mask,
            &self.plaintext_mask_commit,
        )?;
        let e = plusminus_challenge_from_transcript(transcript)?;
        if e != self.challenge {
            error!("Fiat-Shamir consistency check failed");
            return verify_err!("Fiat-Shamir didn't verify");
        }

        // The prover did not falsify the ciphertext mask
        let ciphertext_mask_is_well_formed = {
            let lhs = input
                .encryption_key
                .encrypt_with_nonce(&self.plaintext_response, &self.nonce_response)?;
            let rhs =
                input
                    .encryption_key
                    .multiply_and_add(&e, &input.ciphertext, &self.ciphertext_mask)?;
            lhs == rhs
        };
        if !ciphertext_mask_is_well_formed {
            error!("Ciphertext mask check (first equality check) failed");
            return verify_err!("ciphertext mask check (first equality check) failed");
        }

        // The prover did not falsify its commitments to the plaintext or its mask
        if !input.pedersen.verify(
            &self.plaintext_response,
            &self.randomness_response,
            &self.plaintext_mask_commit,
            &self.plaintext_commit,
            &e,
        ) {
            error!("Response validation check (second equality check) failed");
            return verify_err!("response validation check (second equality check) failed");
        }

        if !within_bound_by_size(&self.plaintext_response, ELL + EPSILON) {
            error!("Bounds check on plaintext response failed");
            return verify_err!("bounds check on plaintext response failed");
        }

        Ok(())
    }
}

impl PiEncProof {
    /// Update the [`Transcript`] with all the commitment values used in the
    /// proof.
    fn fill_out_transcript(
        transcript: &mut Transcript,
        input: &PiEncInput,
        plaintext_commit: &Commitment,
        ciphertext_mask: &Ciphertext,
        plaintext_mask_commit: &Commitment,
    ) -> Result<()> {
        transcript.append_message(b"PiEnc CommonInput", &serialize!(input)?);
        transcript.append_message(
            b"(S, A, C)",
            &[
                plaintext_commit.to_bytes(),
                ciphertext_mask.to_bytes(),
                plaintext_mask_commit.to_bytes(),
            ]
            .concat(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{paillier::DecryptionKey, utils::get_test_rng};
    use crate::utils::random_plusminus_by_size_with_minimum;

    fn random_paillier_encryption_in_range_proof<R: RngCore + CryptoRng>(
        rng: &mut R,
        plaintext: BigNumber,
    ) -> Result<()> {
        let decryption_key = DecryptionKey::new(rng)?;
        let encryption_key = decryption_key.encryption_key();

        let (ciphertext, nonce) = encryption_key.encrypt(rng, &plaintext)?;
        let (pedersen, _) = PedersenParameters::extract(&DecryptionKey::new(rng)?, rng)?;

        let input = PiEncInput::new(pedersen, encryption_key, ciphertext);
        let mut transcript = Transcript::new(b"PiEncProof Test");
        let proof = PiEncProof::prove(
            &input,
            &PiEncSecret::new(plaintext, nonce),
            &mut transcript,
            rng,
        )?;

        let mut transcript = Transcript::new(b"PiEncProof Test");
        proof.verify(&input, &mut transcript)
    }

    #[test]
    fn test_paillier_encryption_in_range_proof() -> Result<()> {
        let mut rng = get_test_rng();

        let in_range = random_plusminus_by_size(&mut rng, ELL);
        let too_large =
            random_plusminus_by_size_with_minimum(&mut rng, ELL + EPSILON + 1, ELL + EPSILON)?;

        // A plaintext in the range 2^ELL should always succeed
        assert!(random_paillier_encryption_in_range_proof(&mut rng, in_range).is_ok());

        // A plaintext that's in range for encryption but larger than 2^ELL should fail
        assert!(random_paillier_encryption_in_range_proof(&mut rng, too_large).is_err());

        Ok(())
    }
}
