// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The rounds a [`ProtocolEngine`](crate::ProtocolEngine) steps through.
//!
//! Every round follows the same contract:
//! 1. [`Round::verify_message`] checks an inbound message without touching the
//!    round, and returns a [`VerifiedMessage`];
//! 2. [`Round::store_message`] records a [`VerifiedMessage`], which can only
//!    be obtained from a successful verification;
//! 3. once [`Round::is_ready`], [`Round::finalize`] consumes the round, queues
//!    outbound messages on the [`Outbox`] and returns a [`Transition`].

use crate::{
    abort::{message::AbortMessage, round::AbortRound},
    engine::Output,
    errors::{InternalError, Result},
    messages::{Message, MessageType, Recipient},
    presign::round_seven::{ChiShare, RoundSeven},
    protocol::{Identifier, ParticipantConfig, ParticipantIdentifier},
    sign::{
        round_one::SignRoundOne,
        round_two::{SignRoundTwo, SignatureShare},
    },
};
use rand::{CryptoRng, RngCore};
use serde::Serialize;
use tracing::error;

/// What a round turns into once it is finalized.
pub(crate) enum Transition {
    /// Continue along the main chain.
    NextRound(Round),
    /// Leave the main chain for the abort round.
    AbortRound(Round),
    /// The run is over.
    Output(Output),
}

/// The decoded and checked content of a [`Message`].
#[derive(Debug)]
pub(crate) enum MessageContent {
    ChiShare(ChiShare),
    SignatureShare(SignatureShare),
    Abort(Box<AbortMessage>),
}

/// A message that passed [`Round::verify_message`].
#[derive(Debug)]
pub(crate) struct VerifiedMessage {
    from: ParticipantIdentifier,
    content: MessageContent,
}

impl VerifiedMessage {
    pub(crate) fn from(&self) -> ParticipantIdentifier {
        self.from
    }
}

/// Messages queued by a finalizing round.
#[derive(Debug)]
pub(crate) struct Outbox {
    identifier: Identifier,
    from: ParticipantIdentifier,
    messages: Vec<Message>,
}

impl Outbox {
    pub(crate) fn new(identifier: Identifier, from: ParticipantIdentifier) -> Self {
        Self {
            identifier,
            from,
            messages: Vec::new(),
        }
    }

    /// Queue `content` for every other participant.
    pub(crate) fn broadcast<T: Serialize>(
        &mut self,
        message_type: MessageType,
        content: &T,
    ) -> Result<()> {
        let message = Message::new(
            message_type,
            self.identifier,
            self.from,
            Recipient::Broadcast,
            content,
        )?;
        self.messages.push(message);
        Ok(())
    }

    pub(crate) fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Hand over the queued messages, leaving the outbox empty.
    pub(crate) fn take_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }
}

pub(crate) enum Round {
    PresignSeven(RoundSeven),
    SignOne(SignRoundOne),
    SignTwo(SignRoundTwo),
    Abort(AbortRound),
}

impl Round {
    /// The position of the round along its chain.
    pub(crate) fn number(&self) -> usize {
        match self {
            Round::PresignSeven(_) => 7,
            Round::SignOne(_) => 8,
            Round::SignTwo(_) => 9,
            Round::Abort(_) => 8,
        }
    }

    /// The type of the messages this round consumes, if it consumes any.
    pub(crate) fn message_type(&self) -> Option<MessageType> {
        match self {
            Round::PresignSeven(_) => Some(RoundSeven::message_type()),
            Round::SignOne(_) => None,
            Round::SignTwo(_) => Some(SignRoundTwo::message_type()),
            Round::Abort(_) => Some(AbortRound::message_type()),
        }
    }

    pub(crate) fn is_abort(&self) -> bool {
        matches!(self, Round::Abort(_))
    }

    fn session(&self) -> (Identifier, &ParticipantConfig) {
        match self {
            Round::PresignSeven(round) => (round.context().identifier(), round.context().config()),
            Round::SignOne(round) => round.session(),
            Round::SignTwo(round) => round.session(),
            Round::Abort(round) => (round.context().identifier(), round.context().config()),
        }
    }

    /// Check an inbound message against the round.
    ///
    /// This does not modify the round, so it may run concurrently for
    /// messages from distinct senders. Any rejection is attributed to the
    /// sender of the message.
    pub(crate) fn verify_message(&self, message: &Message) -> Result<VerifiedMessage> {
        let from = message.from();
        let expected_type = self.message_type().ok_or_else(|| {
            error!("Round {} does not accept messages", self.number());
            InternalError::InternalInvariantFailed
        })?;

        let (identifier, config) = self.session();
        if message.id() != identifier {
            error!("Message from {} belongs to session {}", from, message.id());
            return Err(InternalError::ProtocolError(Some(from)));
        }
        if !config.is_counterparty(&from) {
            error!("Message from unexpected sender {}", from);
            return Err(InternalError::ProtocolError(Some(from)));
        }
        message
            .check_type(expected_type)
            .map_err(|_| InternalError::ProtocolError(Some(from)))?;

        let content = match self {
            Round::PresignSeven(round) => round.verify(message).map(MessageContent::ChiShare),
            Round::SignTwo(round) => round.verify(message).map(MessageContent::SignatureShare),
            Round::Abort(round) => round
                .verify(message)
                .map(|abort| MessageContent::Abort(Box::new(abort))),
            Round::SignOne(_) => Err(InternalError::InternalInvariantFailed),
        }
        .map_err(|e| {
            error!("Rejected {:?} message from {}: {}", expected_type, from, e);
            InternalError::ProtocolError(Some(from))
        })?;

        Ok(VerifiedMessage { from, content })
    }

    /// Record a verified message. A second message from the same sender is
    /// an error.
    pub(crate) fn store_message(&mut self, message: VerifiedMessage) -> Result<()> {
        let VerifiedMessage { from, content } = message;
        match (self, content) {
            (Round::PresignSeven(round), MessageContent::ChiShare(share)) => {
                round.store(from, share)
            }
            (Round::SignTwo(round), MessageContent::SignatureShare(share)) => {
                round.store(from, share)
            }
            (Round::Abort(round), MessageContent::Abort(abort)) => round.store(from, *abort),
            _ => {
                error!("Verified message from {} does not belong to this round", from);
                Err(InternalError::InternalInvariantFailed)
            }
        }
    }

    /// Whether every expected sender has been stored.
    pub(crate) fn is_ready(&self) -> bool {
        match self {
            Round::PresignSeven(round) => round.is_ready(),
            Round::SignOne(_) => true,
            Round::SignTwo(round) => round.is_ready(),
            Round::Abort(round) => round.is_ready(),
        }
    }

    pub(crate) fn finalize<R: RngCore + CryptoRng>(
        self,
        rng: &mut R,
        outbox: &mut Outbox,
    ) -> Result<Transition> {
        match self {
            Round::PresignSeven(round) => round.finalize(rng, outbox),
            Round::SignOne(round) => round.finalize(outbox),
            Round::SignTwo(round) => round.finalize(),
            Round::Abort(round) => round.finalize(),
        }
    }
}
