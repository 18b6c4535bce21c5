// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Implements a zero-knowledge proof that a value is an `N`-th residue modulo
//! `N^2`.
//!
//! The prover knows `ρ ∈ Z*_N` with `R = ρ^N mod N^2`. Applied to
//! `c·(1 + N)^{-x}` for a Paillier ciphertext `c`, this shows that `c`
//! decrypts to `x` without revealing the decryption key.

use super::Proof;
use crate::{
    errors::*,
    paillier::{EncryptionKey, MaskedNonce, Nonce},
    utils::{k256_order, modpow, positive_challenge_from_transcript},
};
use libpaillier::unknown_order::BigNumber;
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PiNthProof {
    /// Commitment `r^N mod N^2`.
    commitment: BigNumber,
    challenge: BigNumber,
    /// Response `r·ρ^e mod N`.
    response: MaskedNonce,
}

#[derive(Serialize, Clone)]
pub(crate) struct PiNthInput {
    encryption_key: EncryptionKey,
    residue: BigNumber,
}

impl PiNthInput {
    pub(crate) fn new(encryption_key: EncryptionKey, residue: BigNumber) -> Self {
        Self {
            encryption_key,
            residue,
        }
    }
}

pub(crate) struct PiNthSecret {
    nonce: Nonce,
}

impl PiNthSecret {
    pub(crate) fn new(nonce: Nonce) -> Self {
        Self { nonce }
    }
}

fn in_multiplicative_group(x: &BigNumber, bound: &BigNumber, n: &BigNumber) -> bool {
    x > &BigNumber::zero() && x < bound && x.gcd(n) == BigNumber::one()
}

impl Proof for PiNthProof {
    type CommonInput = PiNthInput;
    type ProverSecret = PiNthSecret;

    #[cfg_attr(feature = "flame_it", flame("PiNthProof"))]
    fn prove<R: RngCore + CryptoRng>(
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
        transcript: &mut Transcript,
        rng: &mut R,
    ) -> Result<Self> {
        let ek = &input.encryption_key;
        let mask = ek.random_nonce(rng)?;
        let commitment = modpow(mask.as_bn(), ek.n(), ek.nn());

        Self::fill_out_transcript(transcript, input, &commitment)?;
        let challenge = positive_challenge_from_transcript(transcript, &k256_order())?;

        let response = ek.mask(&secret.nonce, &mask, &challenge);

        Ok(Self {
            commitment,
            challenge,
            response,
        })
    }

    #[cfg_attr(feature = "flame_it", flame("PiNthProof"))]
    fn verify(&self, input: &Self::CommonInput, transcript: &mut Transcript) -> Result<()> {
        let ek = &input.encryption_key;
        if !in_multiplicative_group(&input.residue, ek.nn(), ek.n())
            || !in_multiplicative_group(&self.commitment, ek.nn(), ek.n())
            || !in_multiplicative_group(self.response.as_bn(), ek.n(), ek.n())
        {
            error!("N-th residue proof contains elements outside of the multiplicative group");
            return verify_err!("element outside of the multiplicative group");
        }

        Self::fill_out_transcript(transcript, input, &self.commitment)?;
        let challenge = positive_challenge_from_transcript(transcript, &k256_order())?;
        if challenge != self.challenge {
            error!("Fiat-Shamir consistency check failed");
            return verify_err!("Fiat-Shamir challenge mismatch");
        }

        // z^N == A·R^e mod N^2
        let lhs = modpow(self.response.as_bn(), ek.n(), ek.nn());
        let rhs = self
            .commitment
            .modmul(&modpow(&input.residue, &challenge, ek.nn()), ek.nn());
        if lhs != rhs {
            error!("N-th residue equation does not hold");
            return verify_err!("N-th residue check failed");
        }
        Ok(())
    }
}

impl PiNthProof {
    fn fill_out_transcript(
        transcript: &mut Transcript,
        input: &PiNthInput,
        commitment: &BigNumber,
    ) -> Result<()> {
        transcript.append_message(b"PiNth CommonInput", &serialize!(input)?);
        transcript.append_message(b"A", &commitment.to_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{paillier::DecryptionKey, utils::get_test_rng};

    fn transcript() -> Transcript {
        Transcript::new(b"PiNthProof Test")
    }

    #[test]
    fn nonce_of_ciphertext_proves_residuosity() -> Result<()> {
        let mut rng = get_test_rng();
        let dk = DecryptionKey::new(&mut rng)?;
        let ek = dk.encryption_key();
        let x = BigNumber::from(42u64);
        let (c, nonce) = ek.encrypt(&mut rng, &x)?;

        let input = PiNthInput::new(ek.clone(), ek.strip_plaintext(&c, &x));
        let proof = PiNthProof::prove(&input, &PiNthSecret::new(nonce), &mut transcript(), &mut rng)?;
        assert!(proof.verify(&input, &mut transcript()).is_ok());

        // Claiming the wrong plaintext leaves a residue the prover cannot open.
        let (_, recovered) = dk.decrypt_with_nonce(&c)?;
        let wrong = PiNthInput::new(ek.clone(), ek.strip_plaintext(&c, &(x + BigNumber::one())));
        let proof =
            PiNthProof::prove(&wrong, &PiNthSecret::new(recovered), &mut transcript(), &mut rng)?;
        assert!(proof.verify(&wrong, &mut transcript()).is_err());
        Ok(())
    }
}
