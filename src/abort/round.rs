// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    abort::{message::AbortMessage, AbortReason, AbortVerdict},
    context::PresignContext,
    engine::Output,
    errors::{InternalError, Result},
    messages::{Message, MessageType, PresignMessageType},
    protocol::ParticipantIdentifier,
    round::Transition,
    utils::CurvePoint,
};
use k256::Scalar;
use std::{collections::HashMap, sync::Arc};
use tracing::{error, instrument, warn};

pub(crate) struct AbortRound {
    context: Arc<PresignContext>,
    /// The `S_j` every participant sent in the final pre-signing round.
    chi_shares: HashMap<ParticipantIdentifier, CurvePoint>,
    messages: HashMap<ParticipantIdentifier, AbortMessage>,
}

impl AbortRound {
    pub(crate) fn new(
        context: Arc<PresignContext>,
        chi_shares: HashMap<ParticipantIdentifier, CurvePoint>,
        own_message: AbortMessage,
    ) -> Self {
        let mut messages = HashMap::new();
        let _ = messages.insert(context.id(), own_message);
        Self {
            context,
            chi_shares,
            messages,
        }
    }

    pub(crate) fn message_type() -> MessageType {
        MessageType::Presign(PresignMessageType::Abort)
    }

    pub(crate) fn context(&self) -> &PresignContext {
        &self.context
    }

    pub(crate) fn verify(&self, message: &Message) -> Result<AbortMessage> {
        let abort: AbortMessage = deserialize!(message.unverified_bytes())?;
        abort.verify(&self.context, &message.from())?;
        Ok(abort)
    }

    pub(crate) fn store(&mut self, from: ParticipantIdentifier, message: AbortMessage) -> Result<()> {
        if self.messages.contains_key(&from) {
            error!("Received a second abort message from {}", from);
            return Err(InternalError::ProtocolError(Some(from)));
        }
        let _ = self.messages.insert(from, message);
        Ok(())
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.messages.len() == self.context.config().count()
    }

    #[instrument(skip_all, err(Debug))]
    pub(crate) fn finalize(self) -> Result<Transition> {
        let verdict = self.verdict()?;
        warn!(
            "Abort round blames {:?} ({:?})",
            verdict.culprits(),
            verdict.reason()
        );
        Ok(Transition::Output(Output::Aborted(verdict)))
    }

    fn message(&self, id: &ParticipantIdentifier) -> Result<&AbortMessage> {
        self.messages.get(id).ok_or_else(|| {
            error!("No abort message stored for {}", id);
            InternalError::InternalInvariantFailed
        })
    }

    /// Work out who cheated from the revealed values.
    ///
    /// First every revealed `k_j` must open the ElGamal encryption of it. If
    /// those all hold, `χ_j·G` is recomputed as
    /// `k_j·X_j + Σ_{l≠j} (α_{j,l}·G + k_l·X_j − α_{l,j}·G)` and compared
    /// against `k·S_j`, where `α_{j,l}` is `j`'s decryption of the ciphertext
    /// `l` sent it.
    fn verdict(&self) -> Result<AbortVerdict> {
        let participants = self.context.config().all_participants();

        let mut nonce_shares = HashMap::new();
        let mut culprits = Vec::new();
        for id in &participants {
            let party = self.context.party(id)?;
            let message = self.message(id)?;
            let k = message.nonce_share(&party.encryption_key)?;
            if CurvePoint::GENERATOR.multiply_by_scalar(&k)
                != party.elgamal_nonce.M - *message.masked_key()
            {
                culprits.push(*id);
            }
            let _ = nonce_shares.insert(*id, k);
        }
        if !culprits.is_empty() {
            return Ok(AbortVerdict::new(
                culprits,
                AbortReason::InconsistentNonceShare,
            ));
        }

        let nonce_share = |id: &ParticipantIdentifier| {
            nonce_shares.get(id).copied().ok_or_else(|| {
                error!("No revealed nonce share for {}", id);
                InternalError::InternalInvariantFailed
            })
        };
        let k: Scalar = nonce_shares.values().sum();
        let k_inverse = Option::<Scalar>::from(k.invert()).ok_or_else(|| {
            error!("The revealed nonce shares add up to zero");
            InternalError::CouldNotInvertScalar
        })?;

        for j in &participants {
            let party_j = self.context.party(j)?;
            let message_j = self.message(j)?;
            let X_j = party_j.public_share;

            let mut expected = X_j.multiply_by_scalar(&nonce_share(j)?);
            for l in participants.iter().filter(|l| *l != j) {
                let alpha_jl = message_j.mta_share(l, &party_j.encryption_key)?;
                let alpha_lj = self
                    .message(l)?
                    .mta_share(j, &self.context.party(l)?.encryption_key)?;
                expected = expected
                    + CurvePoint::GENERATOR.multiply_by_scalar(&(alpha_jl - alpha_lj))
                    + X_j.multiply_by_scalar(&nonce_share(l)?);
            }

            let S_j = self.chi_shares.get(j).ok_or_else(|| {
                error!("No χ share stored for {}", j);
                InternalError::InternalInvariantFailed
            })?;
            if *S_j != expected.multiply_by_scalar(&k_inverse) {
                culprits.push(*j);
            }
        }

        if culprits.is_empty() {
            error!("The χ shares failed to add up but every participant's values are consistent");
            return Err(InternalError::InternalInvariantFailed);
        }
        Ok(AbortVerdict::new(culprits, AbortReason::InconsistentChiShare))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{trusted_dealer::TrustedDealer, utils::get_test_rng};

    /// Runs the abort round locally for the first context, given every
    /// participant's `S_j`.
    fn abort_round_for(
        contexts: Vec<PresignContext>,
        chi_shares: HashMap<ParticipantIdentifier, CurvePoint>,
    ) -> Result<(AbortRound, Vec<AbortMessage>)> {
        let mut rng = get_test_rng();
        let messages = contexts
            .iter()
            .map(|context| AbortMessage::new(context, &mut rng))
            .collect::<Result<Vec<_>>>()?;
        let ids: Vec<_> = contexts.iter().map(|c| c.id()).collect();

        let mut contexts = contexts.into_iter();
        let local = Arc::new(contexts.next().unwrap());
        let mut round = AbortRound::new(local, chi_shares, messages[0].clone());
        for (id, message) in ids.iter().zip(&messages).skip(1) {
            round.store(*id, message.clone())?;
        }
        Ok((round, messages))
    }

    fn honest_chi_shares(contexts: &[PresignContext]) -> HashMap<ParticipantIdentifier, CurvePoint> {
        contexts
            .iter()
            .map(|c| {
                (
                    c.id(),
                    c.nonce_point().multiply_by_scalar(&c.private().chi_share),
                )
            })
            .collect()
    }

    #[test]
    fn honest_values_blame_the_substituted_share() -> Result<()> {
        let mut rng = get_test_rng();
        let contexts = TrustedDealer::new(2, 3)?.deal(&mut rng)?;
        let cheater = contexts[2].id();
        let mut chi_shares = honest_chi_shares(&contexts);
        let _ = chi_shares.insert(cheater, CurvePoint::GENERATOR);

        let (round, _) = abort_round_for(contexts, chi_shares)?;
        assert!(round.is_ready());
        let verdict = round.verdict()?;
        assert_eq!(verdict.culprits(), &[cheater]);
        assert_eq!(verdict.reason(), AbortReason::InconsistentChiShare);
        Ok(())
    }

    #[test]
    fn inconsistent_nonce_opening_is_blamed_first() -> Result<()> {
        let mut rng = get_test_rng();
        let contexts = TrustedDealer::new(2, 3)?.deal(&mut rng)?;
        let liar = contexts[1].id();
        let chi_shares = honest_chi_shares(&contexts);

        let (mut round, messages) = abort_round_for(contexts, chi_shares)?;
        // Swap in another participant's masked key, bypassing verification.
        let mut forged = messages[1].clone();
        forged.set_masked_key(*messages[2].masked_key());
        let _ = round.messages.insert(liar, forged);

        let verdict = round.verdict()?;
        assert_eq!(verdict.culprits(), &[liar]);
        assert_eq!(verdict.reason(), AbortReason::InconsistentNonceShare);
        Ok(())
    }

    #[test]
    fn consistent_values_are_an_internal_error() -> Result<()> {
        let mut rng = get_test_rng();
        let contexts = TrustedDealer::new(2, 2)?.deal(&mut rng)?;
        let chi_shares = honest_chi_shares(&contexts);
        let (round, _) = abort_round_for(contexts, chi_shares)?;
        assert_eq!(
            round.verdict().unwrap_err(),
            InternalError::InternalInvariantFailed
        );
        Ok(())
    }

    #[test]
    fn second_message_from_a_sender_is_rejected() -> Result<()> {
        let mut rng = get_test_rng();
        let contexts = TrustedDealer::new(2, 2)?.deal(&mut rng)?;
        let chi_shares = honest_chi_shares(&contexts);
        let other = contexts[1].id();
        let (mut round, messages) = abort_round_for(contexts, chi_shares)?;
        assert_eq!(
            round.store(other, messages[1].clone()),
            Err(InternalError::ProtocolError(Some(other)))
        );
        Ok(())
    }
}
