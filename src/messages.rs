// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Contains the functions and definitions for dealing with messages that are
//! passed between participants

use crate::{
    errors::{InternalError, Result},
    protocol::{Identifier, ParticipantIdentifier},
};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{error, instrument, trace};

/////////////////
// Message API //
/////////////////

/// An enum consisting of all message types
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// Presign messages
    Presign(PresignMessageType),
    /// Sign messages
    Sign(SignMessageType),
}

/// An enum consisting of all presign message types
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresignMessageType {
    /// Final round of presigning: a share of `χ·R` with its proof
    RoundSeven,
    /// Revealed values that identify a cheater after a failed final round
    Abort,
}

/// An enum consisting of all sign message types
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignMessageType {
    /// A share `σ_i` of the signature
    SignatureShare,
}

impl MessageType {
    /// The number of the round that consumes messages of this type.
    ///
    /// The abort round shares its number with the first signing round, since
    /// it replaces it.
    pub fn round_number(&self) -> usize {
        match self {
            MessageType::Presign(PresignMessageType::RoundSeven) => 7,
            MessageType::Presign(PresignMessageType::Abort) => 8,
            MessageType::Sign(SignMessageType::SignatureShare) => 9,
        }
    }
}

/// The intended recipient of a [`Message`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every other participant of the session.
    Broadcast,
    /// A single participant.
    Participant(ParticipantIdentifier),
}

/// A message that can be posted to (and read from) the communication channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The type of the message
    message_type: MessageType,
    /// The globally unique session identifier that this message belongs to.
    identifier: Identifier,
    /// Which participant this message is coming from.
    from: ParticipantIdentifier,
    /// Which participant(s) this message is addressed to.
    to: Recipient,
    /// The raw bytes for the message, which need to be verified.
    /// This should be a private member of the struct, so that
    /// we require consumers to call the verify() function in
    /// order to extract bytes
    unverified_bytes: Vec<u8>,
}

impl Message {
    /// Creates a new instance of [`Message`].
    #[instrument(skip_all)]
    pub(crate) fn new<T>(
        message_type: MessageType,
        identifier: Identifier,
        from: ParticipantIdentifier,
        to: Recipient,
        unverified_bytes: &T,
    ) -> Result<Self>
    where
        T: Serialize,
    {
        trace!("New message created.");
        Ok(Self {
            message_type,
            identifier,
            from,
            to,
            unverified_bytes: serialize!(unverified_bytes)?,
        })
    }

    /// The message type associated with the message.
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// The session identifier associated with the message.
    pub fn id(&self) -> Identifier {
        self.identifier
    }

    /// The participant that sent this message.
    pub fn from(&self) -> ParticipantIdentifier {
        self.from
    }

    /// The participant(s) that should receive this message.
    pub fn to(&self) -> Recipient {
        self.to
    }

    /// Whether `id` should receive this message.
    pub fn is_addressed_to(&self, id: ParticipantIdentifier) -> bool {
        match self.to {
            Recipient::Broadcast => self.from != id,
            Recipient::Participant(recipient) => recipient == id,
        }
    }

    pub(crate) fn unverified_bytes(&self) -> &[u8] {
        &self.unverified_bytes
    }

    /// Check if the message type is correct.
    pub(crate) fn check_type(&self, expected_type: MessageType) -> Result<()> {
        if self.message_type() != expected_type {
            error!(
                "A message was misrouted. Expected {:?}, Got {:?}",
                expected_type,
                self.message_type()
            );
            return Err(InternalError::InternalInvariantFailed);
        }
        Ok(())
    }
}

#[cfg(test)]
impl Message {
    /// Replace the payload, keeping the envelope.
    pub(crate) fn with_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.unverified_bytes = bytes;
        self
    }

    /// Replace the claimed sender, keeping the payload.
    pub(crate) fn with_sender(mut self, from: ParticipantIdentifier) -> Self {
        self.from = from;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::get_test_rng;

    #[test]
    fn broadcast_reaches_everyone_but_the_sender() -> Result<()> {
        let mut rng = get_test_rng();
        let sender = ParticipantIdentifier::random(&mut rng);
        let other = ParticipantIdentifier::random(&mut rng);
        let identifier = Identifier::random(&mut rng);

        let broadcast = Message::new(
            MessageType::Presign(PresignMessageType::RoundSeven),
            identifier,
            sender,
            Recipient::Broadcast,
            &42u64,
        )?;
        assert!(broadcast.is_addressed_to(other));
        assert!(!broadcast.is_addressed_to(sender));

        let direct = Message::new(
            MessageType::Sign(SignMessageType::SignatureShare),
            identifier,
            sender,
            Recipient::Participant(sender),
            &42u64,
        )?;
        assert!(!direct.is_addressed_to(other));

        let value: u64 = deserialize!(direct.unverified_bytes())?;
        assert_eq!(value, 42);
        assert!(direct
            .check_type(MessageType::Presign(PresignMessageType::Abort))
            .is_err());
        Ok(())
    }

    #[test]
    fn round_numbers_follow_the_protocol() {
        let seven = MessageType::Presign(PresignMessageType::RoundSeven);
        let abort = MessageType::Presign(PresignMessageType::Abort);
        let share = MessageType::Sign(SignMessageType::SignatureShare);
        assert!(seven.round_number() < abort.round_number());
        assert!(abort.round_number() < share.round_number());
    }
}
