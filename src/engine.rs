// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! This module contains [`ProtocolEngine`], which drives a participant through
//! the final pre-signing round, the signing rounds and the abort round.

use crate::{
    abort::{AbortReason, AbortVerdict},
    context::PresignContext,
    errors::{CallerError, InternalError, Result},
    message_queue::MessageQueue,
    messages::Message,
    presign::{record::PreSignature, round_seven::RoundSeven},
    protocol::{Identifier, ParticipantConfig, ParticipantIdentifier},
    round::{Outbox, Round, Transition, VerifiedMessage},
    sign::round_one::SignRoundOne,
};
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use sha2::Sha256;
use std::{fmt::Debug, sync::Arc};
use tracing::{error, info, instrument, warn};

/// Possible outcomes from processing one or more messages.
///
/// Processing an individual message causes various outcomes in a protocol
/// execution. Depending on what other state a [`ProtocolEngine`] has, a
/// message might be be stored for later processing or partially processed
/// without completing the protocol round. Alternately, it can trigger
/// completion of a protocol round, which may produce messages to be sent to
/// other participants, an output (if the round was the final round), or both.
pub enum ProcessOutcome<O> {
    /// The message was not fully processed; we need more inputs to continue.
    Incomplete,
    /// The message was processed successfully but the subprotocol isn't done.
    Processed(Vec<Message>),
    /// The subprotocol is done for this participant but there are still
    /// messages to send to others.
    TerminatedForThisParticipant(O, Vec<Message>),
    /// The entire subprotocol is done and there are no more messages to send.
    Terminated(O),
}

impl<O> Debug for ProcessOutcome<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let descriptor = match self {
            ProcessOutcome::Incomplete => "Incomplete",
            ProcessOutcome::Processed(_) => "Processed",
            ProcessOutcome::Terminated(_) => "Terminated",
            ProcessOutcome::TerminatedForThisParticipant(_, _) => "Terminated for this participant",
        };
        write!(f, "ProcessOutcome::{descriptor}")
    }
}

impl<O> ProcessOutcome<O>
where
    O: std::fmt::Debug,
{
    /// Create a [`ProcessOutcome`] from an optional output and a set of
    /// outgoing messages.
    pub(crate) fn from(output: Option<O>, messages: Vec<Message>) -> Self {
        match (output, messages.len()) {
            (None, 0) => Self::Incomplete,
            (None, _) => Self::Processed(messages),
            (Some(o), 0) => Self::Terminated(o),
            (Some(o), _) => Self::TerminatedForThisParticipant(o, messages),
        }
    }

    /// Convert the [`ProcessOutcome`] into its constituent parts.
    pub fn into_parts(self) -> (Option<O>, Vec<Message>) {
        match self {
            Self::Incomplete => (None, Vec::new()),
            Self::Processed(msgs) => (None, msgs),
            Self::TerminatedForThisParticipant(output, msgs) => (Some(output), msgs),
            Self::Terminated(output) => (Some(output), Vec::new()),
        }
    }

    /// Consolidate a set of `ProcessOutcome`s, including `self`, into a single
    /// outcome.
    ///
    /// This collects all of the messages into a single set, and makes sure that
    /// there's no more than one output specified among all the outcomes.
    pub(crate) fn consolidate(self, outcomes: Vec<Self>) -> Result<Self> {
        let (outputs, messages): (Vec<_>, Vec<_>) = std::iter::once(self)
            .chain(outcomes)
            .map(Self::into_parts)
            .unzip();

        // Get the first output, if it exists.
        let mut actual_outputs = outputs.into_iter().flatten();
        let output = actual_outputs.next();
        // Throw an error if there's more than one
        if let Some(extra) = actual_outputs.next() {
            error!(
                "Produced more than one output in a single session. {:?}",
                extra
            );
            return Err(InternalError::InternalInvariantFailed);
        }

        let messages = messages.into_iter().flatten().collect();

        Ok(ProcessOutcome::from(output, messages))
    }
}

/// What a run ends with.
#[derive(Debug)]
pub enum Output {
    /// The final pre-signing round succeeded and no digest was bound.
    PreSignature(PreSignature),
    /// The run signed the bound digest.
    Signature(k256::ecdsa::Signature),
    /// The final pre-signing round failed and the abort round named the
    /// culprits.
    Aborted(AbortVerdict),
}

/// The status of a [`ProtocolEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Waiting for messages of the current round.
    Running,
    /// Produced its [`Output`].
    Terminated,
    /// Stopped on an error. No further input is accepted.
    Failed,
}

/// Drives one participant through a single run.
///
/// A run starts either at the final pre-signing round ([`ProtocolEngine::new`])
/// or, from a stored [`PreSignature`], at the first signing round
/// ([`ProtocolEngine::sign`]). Inbound messages go through the current round's
/// verify, store and finalize steps; messages for a later round are held back
/// until that round starts.
pub struct ProtocolEngine {
    identifier: Identifier,
    config: ParticipantConfig,
    round: Option<Round>,
    stash: MessageQueue,
    status: Status,
}

impl Debug for ProtocolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("identifier", &self.identifier)
            .field("id", &self.config.id())
            .field("round", &self.round.as_ref().map(Round::number))
            .field("stashed", &self.stash.len())
            .field("status", &self.status)
            .finish()
    }
}

impl ProtocolEngine {
    /// Start the final pre-signing round.
    ///
    /// With a `digest`, a successful run goes on to sign it and outputs a
    /// signature; without one it outputs a [`PreSignature`]. Returns the
    /// messages to send to the other participants.
    #[cfg_attr(feature = "flame_it", flame("engine"))]
    #[instrument(skip_all, err(Debug))]
    pub fn new<R: RngCore + CryptoRng>(
        context: PresignContext,
        digest: Option<Sha256>,
        rng: &mut R,
    ) -> Result<(Self, Vec<Message>)> {
        let identifier = context.identifier();
        let config = context.config().clone();
        info!("Starting the final pre-signing round for {}.", config.id());

        let mut outbox = Outbox::new(identifier, config.id());
        let round = RoundSeven::new(Arc::new(context), digest, rng, &mut outbox)?;
        let engine = Self {
            identifier,
            config,
            round: Some(Round::PresignSeven(round)),
            stash: MessageQueue::default(),
            status: Status::Running,
        };
        Ok((engine, outbox.into_messages()))
    }

    /// Sign `digest` with a [`PreSignature`] produced by an earlier run.
    ///
    /// `config` must name the participants the pre-signature was produced
    /// with. Returns the messages to send to the other participants.
    #[cfg_attr(feature = "flame_it", flame("engine"))]
    #[instrument(skip_all, err(Debug))]
    pub fn sign<R: RngCore + CryptoRng>(
        config: ParticipantConfig,
        identifier: Identifier,
        presignature: PreSignature,
        digest: Sha256,
        rng: &mut R,
    ) -> Result<(Self, Vec<Message>)> {
        presignature.check_participants(&config)?;
        info!("Starting to sign for {}.", config.id());

        let mut engine = Self {
            identifier,
            config: config.clone(),
            round: None,
            stash: MessageQueue::default(),
            status: Status::Running,
        };
        let round = Round::SignOne(SignRoundOne::new(identifier, config, presignature, digest));
        let mut outbox = Outbox::new(identifier, engine.config.id());
        let (output, messages) = engine.advance(round, rng, &mut outbox)?.into_parts();
        if output.is_some() {
            error!("Signing produced an output before receiving any message");
            return Err(InternalError::InternalInvariantFailed);
        }
        Ok((engine, messages))
    }

    /// The session identifier.
    pub fn identifier(&self) -> Identifier {
        self.identifier
    }

    /// This participant's identifier.
    pub fn id(&self) -> ParticipantIdentifier {
        self.config.id()
    }

    /// The status of the run.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The number of the round the engine is waiting in, if it is running.
    pub fn current_round(&self) -> Option<usize> {
        self.round.as_ref().map(Round::number)
    }

    #[cfg(test)]
    pub(crate) fn stashed(&self) -> usize {
        self.stash.len()
    }

    /// Process an incoming message.
    ///
    /// A message for the current round is verified, stored and, once every
    /// participant's message is in, the round is finalized. A message for a
    /// later round is held back until that round starts.
    ///
    /// A message that fails verification stops the run: the engine fails with
    /// an error naming the sender, except in the abort round, where the run
    /// ends with an [`AbortVerdict`] naming the sender.
    #[cfg_attr(feature = "flame_it", flame("engine"))]
    #[instrument(skip_all, err(Debug))]
    pub fn process_message<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        message: &Message,
    ) -> Result<ProcessOutcome<Output>> {
        info!("Processing {:?} message from {}.", message.message_type(), message.from());
        self.check_message(message)?;
        if !self.is_for_current_round(message)? {
            return Ok(ProcessOutcome::Incomplete);
        }

        let round = self.take_round()?;
        let verified = match round.verify_message(message) {
            Ok(verified) => verified,
            Err(e) => return self.reject(&round, vec![(message.from(), e)], Vec::new()),
        };
        self.store_and_advance(round, rng, vec![verified])
    }

    /// Process a batch of incoming messages.
    ///
    /// The messages for the current round are verified in parallel and then
    /// stored one by one; the rest go through
    /// [`ProtocolEngine::process_message`] in order, where a stale or repeated
    /// message is logged and skipped. If several messages fail verification,
    /// all of their senders are logged, and the abort round's verdict names
    /// all of them.
    #[cfg_attr(feature = "flame_it", flame("engine"))]
    #[instrument(skip_all, err(Debug))]
    pub fn process_messages<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        messages: &[Message],
    ) -> Result<ProcessOutcome<Output>> {
        for message in messages {
            self.check_message(message)?;
        }
        let current_type = self.round.as_ref().and_then(Round::message_type);
        let (current, later): (Vec<&Message>, Vec<&Message>) = messages
            .iter()
            .partition(|message| Some(message.message_type()) == current_type);
        info!(
            "Processing a batch of {} messages for the current round.",
            current.len()
        );

        let outcome = if current.is_empty() {
            ProcessOutcome::Incomplete
        } else {
            let round = self.take_round()?;
            let results: Vec<(ParticipantIdentifier, Result<VerifiedMessage>)> = current
                .par_iter()
                .map(|message| (message.from(), round.verify_message(message)))
                .collect();

            let (verified, failures): (Vec<_>, Vec<_>) =
                results.into_iter().partition(|(_, result)| result.is_ok());
            if !failures.is_empty() {
                let failures = failures
                    .into_iter()
                    .filter_map(|(from, result)| result.err().map(|e| (from, e)))
                    .collect();
                return self.reject(&round, failures, Vec::new());
            }
            let verified = verified
                .into_iter()
                .filter_map(|(_, result)| result.ok())
                .collect();
            self.store_and_advance(round, rng, verified)?
        };

        // Rejections that leave the run going are skipped; the messages produced
        // above are always returned.
        let mut outcomes = Vec::new();
        for message in later {
            if self.status != Status::Running {
                break;
            }
            match self.process_message(rng, message) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) if self.status == Status::Running => warn!(
                    "Skipping {:?} message from {} in the batch: {}",
                    message.message_type(),
                    message.from(),
                    e
                ),
                Err(e) => return Err(e),
            }
        }
        outcome.consolidate(outcomes)
    }

    /// Checks that do not depend on the round: the engine is running and the
    /// message belongs to this session and participant.
    fn check_message(&self, message: &Message) -> Result<()> {
        match self.status {
            Status::Running => {}
            Status::Terminated | Status::Failed => {
                error!("Received a message after the run ended ({:?})", self.status);
                return Err(CallerError::ProtocolAlreadyTerminated.into());
            }
        }
        if message.id() != self.identifier {
            error!(
                "Message for session {} delivered to session {}",
                message.id(),
                self.identifier
            );
            return Err(CallerError::WrongSessionIdentifier.into());
        }
        if !message.is_addressed_to(self.id()) {
            error!("Message addressed to {:?} delivered to {}", message.to(), self.id());
            return Err(CallerError::WrongMessageRecipient.into());
        }
        Ok(())
    }

    /// Returns `true` if the current round consumes `message`. A message for a
    /// later round is stashed, once per sender; a message for an earlier or
    /// parallel round, or a repeated early message, is rejected without
    /// affecting the run.
    fn is_for_current_round(&mut self, message: &Message) -> Result<bool> {
        let round = self.round.as_ref().ok_or_else(|| {
            error!("Running engine has no current round");
            InternalError::InternalInvariantFailed
        })?;
        if round.message_type() == Some(message.message_type()) {
            return Ok(true);
        }
        // Nothing follows the abort round.
        if !round.is_abort() && message.message_type().round_number() > round.number() {
            if !self.stash.store(message.clone()) {
                error!(
                    "Received a second early {:?} message from {}",
                    message.message_type(),
                    message.from()
                );
                return Err(InternalError::ProtocolError(Some(message.from())));
            }
            info!(
                "Stashing {:?} message from {} until its round starts.",
                message.message_type(),
                message.from()
            );
            return Ok(false);
        }
        error!(
            "Received a stale {:?} message from {} in round {}",
            message.message_type(),
            message.from(),
            round.number()
        );
        Err(InternalError::ProtocolError(Some(message.from())))
    }

    fn take_round(&mut self) -> Result<Round> {
        self.round.take().ok_or_else(|| {
            error!("Running engine has no current round");
            InternalError::InternalInvariantFailed
        })
    }

    fn store_and_advance<R: RngCore + CryptoRng>(
        &mut self,
        mut round: Round,
        rng: &mut R,
        verified: Vec<VerifiedMessage>,
    ) -> Result<ProcessOutcome<Output>> {
        for message in verified {
            let from = message.from();
            if let Err(e) = round.store_message(message) {
                error!("Failed to store message from {}", from);
                self.stop(Status::Failed);
                return Err(e);
            }
        }
        let mut outbox = Outbox::new(self.identifier, self.id());
        self.advance(round, rng, &mut outbox)
    }

    /// Finalize rounds for as long as they are ready, replaying stashed
    /// messages each time a new round starts.
    fn advance<R: RngCore + CryptoRng>(
        &mut self,
        mut round: Round,
        rng: &mut R,
        outbox: &mut Outbox,
    ) -> Result<ProcessOutcome<Output>> {
        loop {
            if !round.is_ready() {
                self.round = Some(round);
                let messages = outbox.take_messages();
                return Ok(ProcessOutcome::from(None, messages));
            }

            let number = round.number();
            let transition = match round.finalize(rng, outbox) {
                Ok(transition) => transition,
                Err(e) => {
                    error!("Failed to finalize round {}", number);
                    self.stop(Status::Failed);
                    return Err(e);
                }
            };
            let aborting = matches!(transition, Transition::AbortRound(_));
            round = match transition {
                Transition::NextRound(next) => {
                    info!("Round {} complete, moving to round {}.", number, next.number());
                    next
                }
                Transition::AbortRound(next) => {
                    warn!("Round {} failed its consistency check, moving to the abort round.", number);
                    next
                }
                Transition::Output(output) => {
                    info!("Round {} complete, run terminated.", number);
                    self.stop(Status::Terminated);
                    let messages = outbox.take_messages();
                    return Ok(ProcessOutcome::from(Some(output), messages));
                }
            };

            let replay = match round.message_type() {
                Some(message_type) => self.stash.retrieve_all_of_type(message_type),
                None => Vec::new(),
            };
            // Whatever is left is for a round this run can no longer reach.
            if aborting {
                self.stash.clear();
            } else {
                let current = round.number();
                self.stash
                    .retain_types(|message_type| message_type.round_number() > current);
            }

            if !replay.is_empty() {
                let mut failures = Vec::new();
                for message in replay {
                    match round.verify_message(&message) {
                        Ok(verified) => {
                            if let Err(e) = round.store_message(verified) {
                                failures.push((message.from(), e));
                            }
                        }
                        Err(e) => failures.push((message.from(), e)),
                    }
                }
                if !failures.is_empty() {
                    let messages = outbox.take_messages();
                    return self.reject(&round, failures, messages);
                }
            }
        }
    }

    /// Stop the run after messages from the given senders were rejected.
    fn reject(
        &mut self,
        round: &Round,
        mut failures: Vec<(ParticipantIdentifier, InternalError)>,
        messages: Vec<Message>,
    ) -> Result<ProcessOutcome<Output>> {
        failures.sort_by_key(|(from, _)| *from);
        for (from, e) in &failures {
            error!("Message from {} was rejected: {}", from, e);
        }
        let culprits: Vec<_> = failures.iter().map(|(from, _)| *from).collect();

        if round.is_abort() {
            let verdict = AbortVerdict::new(culprits, AbortReason::InvalidAbortMessage);
            warn!("Invalid abort message from {:?}", verdict.culprits());
            self.stop(Status::Terminated);
            return Ok(ProcessOutcome::from(Some(Output::Aborted(verdict)), messages));
        }

        self.stop(Status::Failed);
        match failures.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Err(InternalError::InternalInvariantFailed),
        }
    }

    fn stop(&mut self, status: Status) {
        self.status = status;
        self.stash.clear();
    }
}
