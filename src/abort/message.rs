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
    paillier::{Ciphertext, DecryptionKey, EncryptionKey},
    protocol::ParticipantIdentifier,
    transcript::ABORT_DOMAIN,
    utils::{bn_to_scalar, CurvePoint},
    zkp::{
        pidleq::{PiDlEqInput, PiDlEqProof, PiDlEqSecret},
        pinth::{PiNthInput, PiNthProof, PiNthSecret},
        Proof,
    },
};
use k256::Scalar;
use libpaillier::unknown_order::BigNumber;
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;

/// The plaintext of a Paillier ciphertext, with a proof that the ciphertext
/// decrypts to it.
///
/// The prover recovers the encryption nonce `ρ` with its decryption key and
/// shows that `c·(1 + N)^{-x}` is the `N`-th power `ρ^N`, which holds only for
/// the true plaintext `x`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DecryptionProof {
    plaintext: BigNumber,
    proof: PiNthProof,
}

impl DecryptionProof {
    pub(crate) fn prove<R: RngCore + CryptoRng>(
        decryption_key: &DecryptionKey,
        ciphertext: &Ciphertext,
        transcript: &mut Transcript,
        rng: &mut R,
    ) -> Result<Self> {
        let (plaintext, nonce) = decryption_key.decrypt_with_nonce(ciphertext)?;
        let encryption_key = decryption_key.encryption_key();
        let residue = encryption_key.strip_plaintext(ciphertext, &plaintext);
        let input = PiNthInput::new(encryption_key, residue);
        let proof = PiNthProof::prove(&input, &PiNthSecret::new(nonce), transcript, rng)?;
        Ok(Self { plaintext, proof })
    }

    pub(crate) fn verify(
        &self,
        encryption_key: &EncryptionKey,
        ciphertext: &Ciphertext,
        transcript: &mut Transcript,
    ) -> Result<()> {
        if self.plaintext < BigNumber::zero() || &self.plaintext >= encryption_key.n() {
            error!("Revealed plaintext is outside of [0, N)");
            return verify_err!("plaintext out of range");
        }
        if !encryption_key.is_valid_ciphertext(ciphertext) {
            error!("Ciphertext is not an element of Z*_{{N^2}}");
            return verify_err!("invalid ciphertext");
        }
        let residue = encryption_key.strip_plaintext(ciphertext, &self.plaintext);
        let input = PiNthInput::new(encryption_key.clone(), residue);
        self.proof.verify(&input, transcript)
    }

    /// The plaintext read as a signed value in `(-N/2, N/2]` and reduced into
    /// the scalar field.
    pub(crate) fn plaintext_scalar(&self, encryption_key: &EncryptionKey) -> Result<Scalar> {
        let n = encryption_key.n();
        let half = n / &BigNumber::from(2u64);
        if self.plaintext > half {
            bn_to_scalar(&(&self.plaintext - n))
        } else {
            bn_to_scalar(&self.plaintext)
        }
    }
}

/// What a participant reveals in the abort round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AbortMessage {
    /// `ŷ_i = a_i·Y_i`, where `a_i` is the nonce of the ElGamal encryption of
    /// `k_i`.
    masked_key: CurvePoint,
    masked_key_proof: PiDlEqProof,
    /// `k_i`, opened against `K_i`.
    nonce_share: DecryptionProof,
    /// For every counterparty `j`, the decryption of the MtA ciphertext `j`
    /// sent to this participant.
    mta_shares: BTreeMap<ParticipantIdentifier, DecryptionProof>,
}

impl AbortMessage {
    pub(crate) fn new<R: RngCore + CryptoRng>(context: &PresignContext, rng: &mut R) -> Result<Self> {
        let id = context.id();
        let own = context.own()?;
        let private = context.private();
        let mut transcript = context.transcript().for_participant(id, ABORT_DOMAIN);

        let a = private.elgamal_nonce_randomness.as_scalar();
        let masked_key = own.elgamal_public.multiply_by_scalar(a);
        let input = PiDlEqInput::new(own.elgamal_nonce.L, own.elgamal_public, masked_key);
        let masked_key_proof =
            PiDlEqProof::prove(&input, &PiDlEqSecret::new(a), &mut transcript, rng)?;

        let decryption_key = &private.decryption_key;
        let nonce_share =
            DecryptionProof::prove(decryption_key, &own.nonce_ciphertext, &mut transcript, rng)?;

        let mut mta_shares = BTreeMap::new();
        for other in context.config().other_ids() {
            let ciphertext = context.mta_ciphertext(*other, id)?;
            let proof = DecryptionProof::prove(decryption_key, ciphertext, &mut transcript, rng)?;
            let _ = mta_shares.insert(*other, proof);
        }

        Ok(Self {
            masked_key,
            masked_key_proof,
            nonce_share,
            mta_shares,
        })
    }

    /// Check every proof in a message produced by `sender`.
    pub(crate) fn verify(
        &self,
        context: &PresignContext,
        sender: &ParticipantIdentifier,
    ) -> Result<()> {
        let party = context.party(sender)?;
        if self.masked_key.is_identity() {
            error!("Masked ElGamal key from {} is the identity", sender);
            return verify_err!("masked key is the identity");
        }
        let mut transcript = context
            .transcript()
            .for_participant(*sender, ABORT_DOMAIN);

        let input = PiDlEqInput::new(party.elgamal_nonce.L, party.elgamal_public, self.masked_key);
        self.masked_key_proof.verify(&input, &mut transcript)?;

        self.nonce_share
            .verify(&party.encryption_key, &party.nonce_ciphertext, &mut transcript)?;

        let counterparties = context
            .config()
            .all_participants()
            .into_iter()
            .filter(|id| id != sender);
        if !self.mta_shares.keys().copied().eq(counterparties) {
            error!("Abort message from {} does not open exactly one MtA share per counterparty", sender);
            return verify_err!("wrong set of MtA decryption proofs");
        }
        for (other, proof) in &self.mta_shares {
            let ciphertext = context.mta_ciphertext(*other, *sender)?;
            proof.verify(&party.encryption_key, ciphertext, &mut transcript)?;
        }
        Ok(())
    }

    pub(crate) fn masked_key(&self) -> &CurvePoint {
        &self.masked_key
    }

    /// The revealed nonce share `k_i`.
    pub(crate) fn nonce_share(&self, encryption_key: &EncryptionKey) -> Result<Scalar> {
        self.nonce_share.plaintext_scalar(encryption_key)
    }

    /// The revealed share `α` of the MtA between `from` and the producer of
    /// this message.
    pub(crate) fn mta_share(
        &self,
        from: &ParticipantIdentifier,
        encryption_key: &EncryptionKey,
    ) -> Result<Scalar> {
        self.mta_shares
            .get(from)
            .ok_or_else(|| {
                error!("No revealed MtA share from {}", from);
                InternalError::InternalInvariantFailed
            })?
            .plaintext_scalar(encryption_key)
    }
}

#[cfg(test)]
impl AbortMessage {
    pub(crate) fn set_masked_key(&mut self, masked_key: CurvePoint) {
        self.masked_key = masked_key;
    }
}
