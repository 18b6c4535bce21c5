// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    abort::{message::AbortMessage, round::AbortRound},
    context::PresignContext,
    engine::Output,
    errors::{InternalError, Result},
    messages::{Message, MessageType, PresignMessageType},
    presign::record::PreSignature,
    protocol::ParticipantIdentifier,
    round::{Outbox, Round, Transition},
    sign::round_one::SignRoundOne,
    transcript::CHI_SHARE_DOMAIN,
    utils::CurvePoint,
    zkp::{
        pielog::{PiElogInput, PiElogProof, PiElogSecret},
        Proof,
    },
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::{collections::HashMap, sync::Arc};
use tracing::{error, info, instrument, warn};

/// A participant's share `S_i = χ_i·R`, with a proof that it hides the same
/// `χ_i` as the participant's ElGamal encryption of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChiShare {
    S: CurvePoint,
    proof: PiElogProof,
}

impl ChiShare {
    fn input(
        context: &PresignContext,
        sender: &ParticipantIdentifier,
        S: CurvePoint,
    ) -> Result<PiElogInput> {
        let party = context.party(sender)?;
        Ok(PiElogInput::new(
            party.elgamal_chi,
            party.elgamal_public,
            *context.nonce_point(),
            S,
        ))
    }

    pub(crate) fn new<R: RngCore + CryptoRng>(context: &PresignContext, rng: &mut R) -> Result<Self> {
        let private = context.private();
        let S = context.nonce_point().multiply_by_scalar(&private.chi_share);
        let input = Self::input(context, &context.id(), S)?;
        let secret = PiElogSecret::new(
            &private.chi_share,
            private.elgamal_chi_randomness.as_scalar(),
        );
        let mut transcript = context
            .transcript()
            .for_participant(context.id(), CHI_SHARE_DOMAIN);
        let proof = PiElogProof::prove(&input, &secret, &mut transcript, rng)?;
        Ok(Self { S, proof })
    }

    pub(crate) fn verify(
        &self,
        context: &PresignContext,
        sender: &ParticipantIdentifier,
    ) -> Result<()> {
        if self.S.is_identity() {
            error!("χ share from {} is the identity", sender);
            return verify_err!("χ share is the identity");
        }
        let input = Self::input(context, sender, self.S)?;
        let mut transcript = context
            .transcript()
            .for_participant(*sender, CHI_SHARE_DOMAIN);
        self.proof.verify(&input, &mut transcript)
    }
}

/// The final pre-signing round.
///
/// Every participant broadcasts its [`ChiShare`]. If the shares add up to the
/// public key the run produces a [`PreSignature`], or moves on to signing
/// when a digest was bound at the start; otherwise it falls back to the
/// abort round.
pub(crate) struct RoundSeven {
    context: Arc<PresignContext>,
    digest: Option<Sha256>,
    shares: HashMap<ParticipantIdentifier, CurvePoint>,
}

impl RoundSeven {
    /// Start the round, queueing this participant's share on the outbox.
    #[instrument(skip_all, err(Debug))]
    pub(crate) fn new<R: RngCore + CryptoRng>(
        context: Arc<PresignContext>,
        digest: Option<Sha256>,
        rng: &mut R,
        outbox: &mut Outbox,
    ) -> Result<Self> {
        info!("Generating round seven presign message.");
        let share = ChiShare::new(&context, rng)?;
        outbox.broadcast(Self::message_type(), &share)?;

        let mut shares = HashMap::new();
        let _ = shares.insert(context.id(), share.S);
        Ok(Self {
            context,
            digest,
            shares,
        })
    }

    pub(crate) fn message_type() -> MessageType {
        MessageType::Presign(PresignMessageType::RoundSeven)
    }

    pub(crate) fn context(&self) -> &PresignContext {
        &self.context
    }

    pub(crate) fn verify(&self, message: &Message) -> Result<ChiShare> {
        let share: ChiShare = deserialize!(message.unverified_bytes())?;
        share.verify(&self.context, &message.from())?;
        Ok(share)
    }

    pub(crate) fn store(&mut self, from: ParticipantIdentifier, share: ChiShare) -> Result<()> {
        if self.shares.contains_key(&from) {
            error!("Received a second χ share from {}", from);
            return Err(InternalError::ProtocolError(Some(from)));
        }
        let _ = self.shares.insert(from, share.S);
        Ok(())
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.shares.len() == self.context.config().count()
    }

    #[instrument(skip_all, err(Debug))]
    pub(crate) fn finalize<R: RngCore + CryptoRng>(
        self,
        rng: &mut R,
        outbox: &mut Outbox,
    ) -> Result<Transition> {
        let sum: CurvePoint = self.shares.values().copied().sum();
        if &sum == self.context.public_key() {
            info!("χ shares are consistent with the public key.");
            let presignature = PreSignature::new(&self.context, self.shares)?;
            return Ok(match self.digest {
                Some(digest) => Transition::NextRound(Round::SignOne(SignRoundOne::new(
                    self.context.identifier(),
                    self.context.config().clone(),
                    presignature,
                    digest,
                ))),
                None => Transition::Output(Output::PreSignature(presignature)),
            });
        }

        warn!("χ shares do not add up to the public key. Starting the abort round.");
        let message = AbortMessage::new(&self.context, rng)?;
        outbox.broadcast(AbortRound::message_type(), &message)?;
        Ok(Transition::AbortRound(Round::Abort(AbortRound::new(
            self.context,
            self.shares,
            message,
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{trusted_dealer::TrustedDealer, utils::get_test_rng};

    #[test]
    fn honest_shares_verify_and_forged_ones_do_not() -> Result<()> {
        let mut rng = get_test_rng();
        let contexts = TrustedDealer::new(2, 3)?.deal(&mut rng)?;
        let prover = &contexts[0];
        let verifier = &contexts[1];
        let prover_id = prover.id();

        let share = ChiShare::new(prover, &mut rng)?;
        share.verify(verifier, &prover_id)?;
        // Verification is pure: running it again gives the same answer.
        share.verify(verifier, &prover_id)?;

        // Identity share.
        let mut identity = share.clone();
        identity.S = CurvePoint::IDENTITY;
        assert!(identity.verify(verifier, &prover_id).is_err());

        // The same proof claimed by another participant.
        assert!(share.verify(verifier, &contexts[2].id()).is_err());
        Ok(())
    }

    #[test]
    fn proof_only_verifies_under_the_senders_transcript() -> Result<()> {
        let mut rng = get_test_rng();
        let contexts = TrustedDealer::new(2, 3)?.deal(&mut rng)?;
        let prover = &contexts[0];
        let verifier = &contexts[1];
        let share = ChiShare::new(prover, &mut rng)?;

        // The sender's own ciphertext, key and share throughout.
        let input = ChiShare::input(verifier, &prover.id(), share.S)?;
        let mut transcript = verifier
            .transcript()
            .for_participant(prover.id(), CHI_SHARE_DOMAIN);
        share.proof.verify(&input, &mut transcript)?;

        let mut transcript = verifier
            .transcript()
            .for_participant(contexts[2].id(), CHI_SHARE_DOMAIN);
        assert!(share.proof.verify(&input, &mut transcript).is_err());
        Ok(())
    }

    #[test]
    fn shares_point_is_chi_times_r() -> Result<()> {
        let mut rng = get_test_rng();
        let contexts = TrustedDealer::new(2, 2)?.deal(&mut rng)?;
        let context = &contexts[1];
        let share = ChiShare::new(context, &mut rng)?;
        assert_eq!(
            share.S,
            context
                .nonce_point()
                .multiply_by_scalar(&context.private().chi_share)
        );
        Ok(())
    }
}
