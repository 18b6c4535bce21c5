// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The `MessageQueue` type for stashing messages that arrive before the round
//! that consumes them.
//!
//! [`MessageQueue`] stores messages keyed by their [`MessageType`]. When the
//! engine enters a new round it drains the messages of that round's type with
//! [`MessageQueue::retrieve_all_of_type`] and processes them in arrival order.

use crate::messages::{Message, MessageType};
use std::collections::HashMap;

/// A type for storing a queue of [`Message`]s by [`MessageType`].
///
/// At most one message of each type is held per sender.
#[derive(Clone, Debug, Default)]
pub(crate) struct MessageQueue(HashMap<MessageType, Vec<Message>>);

impl MessageQueue {
    /// Store a message by its [`MessageType`].
    ///
    /// Returns `false`, and drops the message, if one of the same type from
    /// the same sender is already stored.
    pub(crate) fn store(&mut self, message: Message) -> bool {
        let queue = self.0.entry(message.message_type()).or_default();
        if queue.iter().any(|stored| stored.from() == message.from()) {
            return false;
        }
        queue.push(message);
        true
    }

    /// Retrieve (and remove) all [`Message`]s of a given [`MessageType`].
    ///
    /// If the given [`MessageType`] is not found, an empty [`Vec`] is returned.
    pub(crate) fn retrieve_all_of_type(&mut self, message_type: MessageType) -> Vec<Message> {
        // delete retrieved messages from storage so that they aren't accidentally
        // processed again.
        self.0.remove(&message_type).unwrap_or_default()
    }

    /// Drop every stored message whose type `keep` returns `false` for.
    pub(crate) fn retain_types(&mut self, keep: impl Fn(MessageType) -> bool) {
        self.0.retain(|message_type, _| keep(*message_type));
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }

    /// The number of stashed messages.
    pub(crate) fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::Result,
        messages::{PresignMessageType, Recipient, SignMessageType},
        protocol::{Identifier, ParticipantIdentifier},
        utils::get_test_rng,
    };

    #[test]
    fn retrieval_drains_only_the_requested_type() -> Result<()> {
        let mut rng = get_test_rng();
        let identifier = Identifier::random(&mut rng);
        let from = ParticipantIdentifier::random(&mut rng);
        let abort = MessageType::Presign(PresignMessageType::Abort);
        let share = MessageType::Sign(SignMessageType::SignatureShare);

        let other = ParticipantIdentifier::random(&mut rng);

        let mut queue = MessageQueue::default();
        for (message_type, sender) in [(abort, from), (share, from), (abort, other)] {
            assert!(queue.store(Message::new(
                message_type,
                identifier,
                sender,
                Recipient::Broadcast,
                &(),
            )?));
        }
        assert_eq!(queue.len(), 3);

        let aborts = queue.retrieve_all_of_type(abort);
        assert_eq!(aborts.len(), 2);
        assert!(aborts.iter().all(|m| m.message_type() == abort));
        assert_eq!(queue.len(), 1);
        assert!(queue.retrieve_all_of_type(abort).is_empty());
        Ok(())
    }

    #[test]
    fn one_message_per_type_and_sender_is_kept() -> Result<()> {
        let mut rng = get_test_rng();
        let identifier = Identifier::random(&mut rng);
        let from = ParticipantIdentifier::random(&mut rng);
        let abort = MessageType::Presign(PresignMessageType::Abort);
        let share = MessageType::Sign(SignMessageType::SignatureShare);

        let mut queue = MessageQueue::default();
        assert!(queue.store(Message::new(abort, identifier, from, Recipient::Broadcast, &1u8)?));
        assert!(!queue.store(Message::new(abort, identifier, from, Recipient::Broadcast, &2u8)?));
        assert!(queue.store(Message::new(share, identifier, from, Recipient::Broadcast, &())?));
        assert_eq!(queue.len(), 2);

        queue.retain_types(|message_type| message_type != abort);
        assert_eq!(queue.len(), 1);
        assert!(queue.retrieve_all_of_type(abort).is_empty());

        queue.clear();
        assert_eq!(queue.len(), 0);
        Ok(())
    }
}
