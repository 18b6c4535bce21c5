// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The state a participant carries into the final pre-signing round.
//!
//! The earlier pre-signing rounds leave every participant with the same
//! public view of the session ([`PresignPublic`]) and with its own secrets
//! ([`PresignPrivate`]). Both are read-only from here on, and are shared
//! between the rounds of a run through an `Arc`.

use crate::{
    elgamal::{ElGamalCiphertext, ElGamalSecret},
    errors::{InternalError, Result},
    paillier::{Ciphertext, DecryptionKey, EncryptionKey},
    pedersen::PedersenParameters,
    protocol::{Identifier, ParticipantConfig, ParticipantIdentifier},
    transcript::{SessionTranscript, NONCE_ENCRYPTION_DOMAIN},
    utils::{bn_to_scalar, CurvePoint},
    zkp::{
        pienc::{PiEncInput, PiEncProof},
        Proof,
    },
};
use k256::Scalar;
use std::{collections::HashMap, fmt::Debug};
use tracing::{error, instrument};
use zeroize::ZeroizeOnDrop;

/// The public data of a single participant.
#[derive(Clone, Debug)]
pub struct PartyPublic {
    /// The participant's share `X_j` of the public key, already adjusted by
    /// its Lagrange coefficient.
    pub(crate) public_share: CurvePoint,
    pub(crate) encryption_key: EncryptionKey,
    pub(crate) pedersen: PedersenParameters,
    /// ElGamal public key `Y_j`.
    pub(crate) elgamal_public: CurvePoint,
    /// Paillier encryption `K_j` of the nonce share `k_j`.
    pub(crate) nonce_ciphertext: Ciphertext,
    /// ElGamal encryption of `k_j` under `Y_j`.
    pub(crate) elgamal_nonce: ElGamalCiphertext,
    /// ElGamal encryption of `χ_j` under `Y_j`.
    pub(crate) elgamal_chi: ElGamalCiphertext,
    /// `RBar_j = k_j·R`.
    pub(crate) nonce_share_commitment: CurvePoint,
}

/// The public view of a session, identical at every participant.
#[derive(Clone, Debug)]
pub struct PresignPublic {
    /// The shared public key `X`.
    pub(crate) public_key: CurvePoint,
    /// The nonce point `R = k^{-1}·G`.
    pub(crate) nonce_point: CurvePoint,
    pub(crate) parties: HashMap<ParticipantIdentifier, PartyPublic>,
    /// Multiplicative-to-additive ciphertexts, keyed by `(sender, receiver)`
    /// and encrypted under the receiver's key.
    pub(crate) mta_ciphertexts: HashMap<(ParticipantIdentifier, ParticipantIdentifier), Ciphertext>,
}

/// The secrets of the local participant.
#[derive(ZeroizeOnDrop)]
pub struct PresignPrivate {
    /// `k_i`.
    pub(crate) nonce_share: Scalar,
    /// `χ_i`.
    pub(crate) chi_share: Scalar,
    pub(crate) elgamal_secret: ElGamalSecret,
    /// The nonce of the ElGamal encryption of `k_i`.
    pub(crate) elgamal_nonce_randomness: ElGamalSecret,
    /// The nonce of the ElGamal encryption of `χ_i`.
    pub(crate) elgamal_chi_randomness: ElGamalSecret,
    #[zeroize(skip)]
    pub(crate) decryption_key: DecryptionKey,
}

impl Debug for PresignPrivate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresignPrivate")
            .field("nonce_share", &"[redacted]")
            .field("chi_share", &"[redacted]")
            .field("elgamal_secret", &"[redacted]")
            .field("elgamal_nonce_randomness", &"[redacted]")
            .field("elgamal_chi_randomness", &"[redacted]")
            .field("decryption_key", &"[redacted]")
            .finish()
    }
}

impl PartyPublic {
    /// Collect the public data the earlier rounds produced for one
    /// participant. `public_share` must already be scaled by the
    /// participant's Lagrange coefficient.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        public_share: CurvePoint,
        encryption_key: EncryptionKey,
        pedersen: PedersenParameters,
        elgamal_public: CurvePoint,
        nonce_ciphertext: Ciphertext,
        elgamal_nonce: ElGamalCiphertext,
        elgamal_chi: ElGamalCiphertext,
        nonce_share_commitment: CurvePoint,
    ) -> Self {
        Self {
            public_share,
            encryption_key,
            pedersen,
            elgamal_public,
            nonce_ciphertext,
            elgamal_nonce,
            elgamal_chi,
            nonce_share_commitment,
        }
    }
}

impl PresignPublic {
    /// Collect the public view of a session. `mta_ciphertexts` is keyed by
    /// `(sender, receiver)`.
    pub fn new(
        public_key: CurvePoint,
        nonce_point: CurvePoint,
        parties: HashMap<ParticipantIdentifier, PartyPublic>,
        mta_ciphertexts: HashMap<(ParticipantIdentifier, ParticipantIdentifier), Ciphertext>,
    ) -> Self {
        Self {
            public_key,
            nonce_point,
            parties,
            mta_ciphertexts,
        }
    }
}

impl PresignPrivate {
    /// Collect the local participant's secrets.
    pub fn new(
        nonce_share: Scalar,
        chi_share: Scalar,
        elgamal_secret: ElGamalSecret,
        elgamal_nonce_randomness: ElGamalSecret,
        elgamal_chi_randomness: ElGamalSecret,
        decryption_key: DecryptionKey,
    ) -> Self {
        Self {
            nonce_share,
            chi_share,
            elgamal_secret,
            elgamal_nonce_randomness,
            elgamal_chi_randomness,
            decryption_key,
        }
    }
}

/// Everything a participant needs to run the final pre-signing round and,
/// if it fails, the abort round.
///
/// # 🔒 Storage requirements
/// This type holds secret shares and must be stored securely by the calling
/// application.
pub struct PresignContext {
    identifier: Identifier,
    config: ParticipantConfig,
    public: PresignPublic,
    /// Proofs that each counterparty's `K_j` encrypts an in-range value,
    /// produced against this participant's Pedersen parameters.
    nonce_proofs: HashMap<ParticipantIdentifier, PiEncProof>,
    private: PresignPrivate,
    transcript: SessionTranscript,
}

impl Debug for PresignContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresignContext")
            .field("identifier", &self.identifier)
            .field("config", &self.config)
            .field("public", &self.public)
            .field("private", &self.private)
            .finish_non_exhaustive()
    }
}

impl PresignContext {
    /// Assemble the context from the output of the earlier rounds.
    ///
    /// `nonce_proofs` holds, for every other participant, its proof that its
    /// nonce ciphertext encrypts an in-range value, produced against this
    /// participant's Pedersen parameters. Fails unless the parts are complete
    /// and consistent with each other; a failing proof is attributed to its
    /// producer.
    pub fn new(
        identifier: Identifier,
        config: ParticipantConfig,
        public: PresignPublic,
        nonce_proofs: HashMap<ParticipantIdentifier, PiEncProof>,
        private: PresignPrivate,
    ) -> Result<Self> {
        let transcript = SessionTranscript::new(
            identifier,
            &config.all_participants(),
            &public.public_key,
            &public.nonce_point,
        );
        let context = Self {
            identifier,
            config,
            public,
            nonce_proofs,
            private,
            transcript,
        };
        context.validate()?;
        Ok(context)
    }

    /// The session identifier.
    pub fn identifier(&self) -> Identifier {
        self.identifier
    }

    /// The participants of the session.
    pub fn config(&self) -> &ParticipantConfig {
        &self.config
    }

    /// The shared public key `X`.
    pub fn public_key(&self) -> &CurvePoint {
        &self.public.public_key
    }

    /// The nonce point `R`.
    pub fn nonce_point(&self) -> &CurvePoint {
        &self.public.nonce_point
    }

    pub(crate) fn id(&self) -> ParticipantIdentifier {
        self.config.id()
    }

    pub(crate) fn private(&self) -> &PresignPrivate {
        &self.private
    }

    pub(crate) fn transcript(&self) -> &SessionTranscript {
        &self.transcript
    }

    pub(crate) fn party(&self, id: &ParticipantIdentifier) -> Result<&PartyPublic> {
        self.public.parties.get(id).ok_or_else(|| {
            error!("No public data stored for participant {}", id);
            InternalError::InternalInvariantFailed
        })
    }

    pub(crate) fn own(&self) -> Result<&PartyPublic> {
        self.party(&self.id())
    }

    /// The ciphertext `sender` produced for `receiver` during the
    /// multiplicative-to-additive conversion.
    pub(crate) fn mta_ciphertext(
        &self,
        sender: ParticipantIdentifier,
        receiver: ParticipantIdentifier,
    ) -> Result<&Ciphertext> {
        self.public
            .mta_ciphertexts
            .get(&(sender, receiver))
            .ok_or_else(|| {
                error!(
                    "No multiplicative-to-additive ciphertext from {} to {}",
                    sender, receiver
                );
                InternalError::InternalInvariantFailed
            })
    }

    /// Check that the context is complete and self-consistent, including the
    /// counterparties' nonce encryption proofs.
    #[instrument(skip_all, err(Debug))]
    pub(crate) fn validate(&self) -> Result<()> {
        let participants = self.config.all_participants();
        let mut known: Vec<_> = self.public.parties.keys().copied().collect();
        known.sort();
        if known != participants {
            error!("Public data does not cover exactly the configured participants");
            return arg_err!("public data does not match the participant list");
        }

        let sum: CurvePoint = participants
            .iter()
            .map(|id| self.party(id).map(|party| party.public_share))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .sum();
        if sum != self.public.public_key {
            error!("Public key shares do not add up to the public key");
            return arg_err!("public key shares do not add up to the public key");
        }
        if self.public.nonce_point.is_identity() {
            error!("The nonce point is the identity");
            return arg_err!("nonce point is the identity");
        }

        for id in &participants {
            let party = self.party(id)?;
            party.pedersen.validate()?;
            if !party.elgamal_nonce.is_well_formed()
                || !party.elgamal_chi.is_well_formed()
                || party.nonce_share_commitment.is_identity()
                || !party
                    .encryption_key
                    .is_valid_ciphertext(&party.nonce_ciphertext)
            {
                error!("Malformed public data for participant {}", id);
                return arg_err!("malformed public data");
            }
            for receiver in participants.iter().filter(|other| *other != id) {
                let receiver_key = &self.party(receiver)?.encryption_key;
                if !receiver_key.is_valid_ciphertext(self.mta_ciphertext(*id, *receiver)?) {
                    error!("Malformed MtA ciphertext from {} to {}", id, receiver);
                    return arg_err!("malformed MtA ciphertext");
                }
            }
        }

        self.validate_private()?;

        let own_pedersen = &self.own()?.pedersen;
        for other in self.config.other_ids() {
            let party = self.party(other)?;
            let proof = self.nonce_proofs.get(other).ok_or_else(|| {
                error!("Missing nonce encryption proof from {}", other);
                InternalError::ProtocolError(Some(*other))
            })?;
            let input = PiEncInput::new(
                own_pedersen.clone(),
                party.encryption_key.clone(),
                party.nonce_ciphertext.clone(),
            );
            let mut transcript = self
                .transcript
                .for_participant(*other, NONCE_ENCRYPTION_DOMAIN);
            proof.verify(&input, &mut transcript).map_err(|e| {
                error!("Nonce encryption proof from {} failed: {}", other, e);
                InternalError::ProtocolError(Some(*other))
            })?;
        }
        Ok(())
    }

    fn validate_private(&self) -> Result<()> {
        let own = self.own()?;
        let private = &self.private;
        let decrypted_nonce = bn_to_scalar(
            &private
                .decryption_key
                .decrypt(&own.nonce_ciphertext)?,
        )?;
        let consistent = own.elgamal_public == private.elgamal_secret.public_point()
            && own.nonce_share_commitment
                == self
                    .public
                    .nonce_point
                    .multiply_by_scalar(&private.nonce_share)
            && own.encryption_key.n() == private.decryption_key.modulus()
            && decrypted_nonce == private.nonce_share;
        if !consistent {
            error!("Private state of {} does not match its public data", self.id());
            return arg_err!("private state does not match public data");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{trusted_dealer::TrustedDealer, utils::get_test_rng};

    /// Copies of the parts a context was built from.
    fn parts(
        context: &PresignContext,
    ) -> (
        PresignPublic,
        HashMap<ParticipantIdentifier, PiEncProof>,
        PresignPrivate,
    ) {
        let private = &context.private;
        let private = PresignPrivate::new(
            private.nonce_share,
            private.chi_share,
            private.elgamal_secret.clone(),
            private.elgamal_nonce_randomness.clone(),
            private.elgamal_chi_randomness.clone(),
            private.decryption_key.clone(),
        );
        (context.public.clone(), context.nonce_proofs.clone(), private)
    }

    #[test]
    fn context_is_rebuilt_from_its_parts() -> Result<()> {
        let mut rng = get_test_rng();
        let contexts = TrustedDealer::new(2, 3)?.deal(&mut rng)?;
        let context = &contexts[1];
        let (public, nonce_proofs, private) = parts(context);

        let rebuilt = PresignContext::new(
            context.identifier(),
            context.config().clone(),
            public,
            nonce_proofs,
            private,
        )?;
        assert_eq!(rebuilt.public_key(), context.public_key());
        assert_eq!(rebuilt.nonce_point(), context.nonce_point());
        Ok(())
    }

    #[test]
    fn inconsistent_parts_are_rejected() -> Result<()> {
        let mut rng = get_test_rng();
        let contexts = TrustedDealer::new(2, 3)?.deal(&mut rng)?;
        let context = &contexts[0];
        let other = contexts[1].id();
        let rebuild = |public, nonce_proofs, private| {
            PresignContext::new(
                context.identifier(),
                context.config().clone(),
                public,
                nonce_proofs,
                private,
            )
        };

        // A public key the shares do not add up to.
        let (mut public, nonce_proofs, private) = parts(context);
        public.public_key = public.public_key + CurvePoint::GENERATOR;
        assert!(rebuild(public, nonce_proofs, private).is_err());

        // Another participant's secrets.
        let (public, nonce_proofs, _) = parts(context);
        let (_, _, foreign) = parts(&contexts[1]);
        assert!(rebuild(public, nonce_proofs, foreign).is_err());

        // A missing nonce proof is blamed on the participant who owes it.
        let (public, mut nonce_proofs, private) = parts(context);
        let _ = nonce_proofs.remove(&other);
        assert_eq!(
            rebuild(public, nonce_proofs, private).unwrap_err(),
            InternalError::ProtocolError(Some(other))
        );

        // A proof produced by someone else.
        let (public, mut nonce_proofs, private) = parts(context);
        let third = contexts[2].id();
        let swapped = nonce_proofs[&third].clone();
        let _ = nonce_proofs.insert(other, swapped);
        assert_eq!(
            rebuild(public, nonce_proofs, private).unwrap_err(),
            InternalError::ProtocolError(Some(other))
        );
        Ok(())
    }
}
