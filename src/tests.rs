// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! End-to-end runs of several [`ProtocolEngine`]s exchanging messages.

use super::*;
use crate::{
    errors::{CallerError, InternalError, Result},
    utils::get_test_rng,
};
use k256::{
    ecdsa::{signature::DigestVerifier, Signature, VerifyingKey},
    Scalar,
};
use rand::{rngs::StdRng, Rng};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    // Several tests race to install the subscriber; only the first one wins.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn digest(message: &[u8]) -> Sha256 {
    Sha256::new().chain_update(message)
}

/// Start an engine for every dealt context and collect the first messages.
fn start(
    contexts: Vec<PresignContext>,
    digest: Option<Sha256>,
    rng: &mut StdRng,
) -> Result<(Vec<ProtocolEngine>, Vec<Message>)> {
    let mut engines = Vec::new();
    let mut inbox = Vec::new();
    for context in contexts {
        let (engine, messages) = ProtocolEngine::new(context, digest.clone(), rng)?;
        engines.push(engine);
        inbox.extend(messages);
    }
    Ok((engines, inbox))
}

/// Deliver messages in random order until none are left, returning every
/// participant's output.
fn deliver_all(
    engines: &mut [ProtocolEngine],
    mut inbox: Vec<Message>,
    rng: &mut StdRng,
) -> Result<HashMap<ParticipantIdentifier, Output>> {
    let mut outputs = HashMap::new();
    while !inbox.is_empty() {
        let message = inbox.swap_remove(rng.gen_range(0..inbox.len()));
        for engine in engines.iter_mut() {
            if !message.is_addressed_to(engine.id()) || engine.status() != Status::Running {
                continue;
            }
            let (output, messages) = engine.process_message(rng, &message)?.into_parts();
            inbox.extend(messages);
            if let Some(output) = output {
                assert!(outputs.insert(engine.id(), output).is_none());
            }
        }
    }
    assert!(engines.iter().all(|e| e.status() == Status::Terminated));
    Ok(outputs)
}

fn verify_signature(public_key: &CurvePoint, digest: &Sha256, signature: &Signature) {
    let verifying_key = VerifyingKey::from_affine(public_key.0.to_affine()).unwrap();
    assert!(verifying_key
        .verify_digest(digest.clone(), signature)
        .is_ok());
}

#[test]
fn honest_run_produces_consistent_presignatures() -> Result<()> {
    init_logging();
    let mut rng = get_test_rng();
    let contexts = TrustedDealer::new(2, 3)?.deal(&mut rng)?;
    let public_key = *contexts[0].public_key();
    let (mut engines, inbox) = start(contexts, None, &mut rng)?;

    let outputs = deliver_all(&mut engines, inbox, &mut rng)?;
    assert_eq!(outputs.len(), 3);
    let presignatures: Vec<_> = outputs
        .into_values()
        .map(|output| match output {
            Output::PreSignature(presignature) => presignature,
            other => panic!("expected a pre-signature, got {other:?}"),
        })
        .collect();

    let k: Scalar = presignatures.iter().map(|p| *p.nonce_share()).sum();
    let expected_R = CurvePoint::GENERATOR.multiply_by_scalar(&k.invert().unwrap());
    for presignature in &presignatures {
        assert_eq!(presignature.public_key(), &public_key);
        assert_eq!(presignature.nonce_point(), &expected_R);
        let S: CurvePoint = presignature.chi_share_commitments().values().copied().sum();
        assert_eq!(S, public_key);
    }
    Ok(())
}

#[test]
fn every_participant_names_the_cheater() -> Result<()> {
    init_logging();
    let mut rng = get_test_rng();
    let contexts = TrustedDealer::new(3, 4)?
        .with_chi_share_corrupted(1)
        .deal(&mut rng)?;
    let cheater = contexts[1].id();
    let (mut engines, inbox) = start(contexts, Some(digest(b"never signed")), &mut rng)?;

    let outputs = deliver_all(&mut engines, inbox, &mut rng)?;
    assert_eq!(outputs.len(), 4);
    for output in outputs.values() {
        match output {
            Output::Aborted(verdict) => {
                assert_eq!(verdict.culprits(), &[cheater]);
                assert_eq!(verdict.reason(), AbortReason::InconsistentChiShare);
            }
            other => panic!("expected an abort verdict, got {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn folded_run_signs_the_bound_digest() -> Result<()> {
    init_logging();
    let mut rng = get_test_rng();
    let contexts = TrustedDealer::new(2, 3)?.deal(&mut rng)?;
    let public_key = *contexts[0].public_key();
    let digest = digest(b"folded signing");
    let (mut engines, inbox) = start(contexts, Some(digest.clone()), &mut rng)?;

    let outputs = deliver_all(&mut engines, inbox, &mut rng)?;
    let signatures: Vec<_> = outputs
        .into_values()
        .map(|output| match output {
            Output::Signature(signature) => signature,
            other => panic!("expected a signature, got {other:?}"),
        })
        .collect();
    assert_eq!(signatures.len(), 3);
    for signature in &signatures {
        assert_eq!(signature, &signatures[0]);
        verify_signature(&public_key, &digest, signature);
    }
    Ok(())
}

#[test]
fn stored_presignatures_sign_in_one_round() -> Result<()> {
    init_logging();
    let mut rng = get_test_rng();
    let contexts = TrustedDealer::new(3, 3)?.deal(&mut rng)?;
    let identifier = contexts[0].identifier();
    let public_key = *contexts[0].public_key();
    let configs: HashMap<_, _> = contexts
        .iter()
        .map(|c| (c.config().id(), c.config().clone()))
        .collect();
    let (mut engines, inbox) = start(contexts, None, &mut rng)?;
    let outputs = deliver_all(&mut engines, inbox, &mut rng)?;

    let digest = digest(b"standalone signing");
    let mut engines = Vec::new();
    let mut inbox = Vec::new();
    for (id, output) in outputs {
        let presignature = match output {
            Output::PreSignature(presignature) => presignature,
            other => panic!("expected a pre-signature, got {other:?}"),
        };
        let (engine, messages) = ProtocolEngine::sign(
            configs[&id].clone(),
            identifier,
            presignature,
            digest.clone(),
            &mut rng,
        )?;
        assert_eq!(engine.current_round(), Some(9));
        assert_eq!(messages.len(), 1);
        engines.push(engine);
        inbox.extend(messages);
    }

    let outputs = deliver_all(&mut engines, inbox, &mut rng)?;
    for output in outputs.values() {
        match output {
            Output::Signature(signature) => verify_signature(&public_key, &digest, signature),
            other => panic!("expected a signature, got {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn signing_rejects_a_presignature_for_other_participants() -> Result<()> {
    let mut rng = get_test_rng();
    let contexts = TrustedDealer::new(2, 2)?.deal(&mut rng)?;
    let identifier = contexts[0].identifier();
    let (mut engines, inbox) = start(contexts, None, &mut rng)?;
    let mut outputs = deliver_all(&mut engines, inbox, &mut rng)?;

    let (_, output) = outputs.drain().next().unwrap();
    let presignature = match output {
        Output::PreSignature(presignature) => presignature,
        other => panic!("expected a pre-signature, got {other:?}"),
    };
    let stranger = ParticipantConfig::random_quorum(2, &mut rng)?.remove(0);
    let result = ProtocolEngine::sign(
        stranger,
        identifier,
        presignature,
        digest(b"anything"),
        &mut rng,
    );
    assert!(matches!(
        result,
        Err(InternalError::CallingApplicationMistake(
            CallerError::BadInput(_)
        ))
    ));
    Ok(())
}

#[test]
fn malformed_abort_message_names_its_sender() -> Result<()> {
    init_logging();
    let mut rng = get_test_rng();
    let contexts = TrustedDealer::new(2, 3)?
        .with_chi_share_corrupted(0)
        .deal(&mut rng)?;
    let ids: Vec<_> = contexts.iter().map(|c| c.config().id()).collect();
    let (mut engines, round_seven) = start(contexts, None, &mut rng)?;

    // Deliver the whole of round seven; everybody moves to the abort round.
    let mut aborts = Vec::new();
    for message in &round_seven {
        for engine in engines.iter_mut() {
            if message.is_addressed_to(engine.id()) {
                let (output, messages) = engine.process_message(&mut rng, message)?.into_parts();
                assert!(output.is_none());
                aborts.extend(messages);
            }
        }
    }
    assert_eq!(aborts.len(), 3);
    assert!(engines.iter().all(|e| e.current_round() == Some(8)));

    let garbled = aborts
        .iter()
        .find(|m| m.from() == ids[2])
        .unwrap()
        .clone()
        .with_bytes(vec![0u8; 16]);
    let outcome = engines[1].process_message(&mut rng, &garbled)?;
    match outcome {
        ProcessOutcome::Terminated(Output::Aborted(verdict)) => {
            assert_eq!(verdict.culprits(), &[ids[2]]);
            assert_eq!(verdict.reason(), AbortReason::InvalidAbortMessage);
        }
        other => panic!("expected a terminal abort verdict, got {other:?}"),
    }
    assert_eq!(engines[1].status(), Status::Terminated);

    // A valid abort message replayed under another participant's name fails
    // its proofs, and the claimed sender is named.
    let replayed = aborts
        .iter()
        .find(|m| m.from() == ids[0])
        .unwrap()
        .clone()
        .with_sender(ids[1]);
    let (output, _) = engines[2].process_message(&mut rng, &replayed)?.into_parts();
    match output {
        Some(Output::Aborted(verdict)) => {
            assert_eq!(verdict.culprits(), &[ids[1]]);
            assert_eq!(verdict.reason(), AbortReason::InvalidAbortMessage);
        }
        other => panic!("expected an abort verdict, got {other:?}"),
    }
    Ok(())
}

#[test]
fn early_messages_are_stashed_until_their_round() -> Result<()> {
    init_logging();
    let mut rng = get_test_rng();
    let contexts = TrustedDealer::new(2, 3)?.deal(&mut rng)?;
    let ids: Vec<_> = contexts.iter().map(|c| c.config().id()).collect();
    let public_key = *contexts[0].public_key();
    let digest = digest(b"out of order");
    let (mut engines, round_seven) = start(contexts, Some(digest.clone()), &mut rng)?;

    // Participants 0 and 1 finish round seven and send their signature shares.
    let mut shares = Vec::new();
    for message in &round_seven {
        for engine in engines[..2].iter_mut() {
            if message.is_addressed_to(engine.id()) {
                let (_, messages) = engine.process_message(&mut rng, message)?.into_parts();
                shares.extend(messages);
            }
        }
    }
    assert_eq!(shares.len(), 2);

    // Participant 2 sees those shares before any of round seven.
    for share in &shares {
        let outcome = engines[2].process_message(&mut rng, share)?;
        assert!(matches!(outcome, ProcessOutcome::Incomplete));
        assert_eq!(engines[2].current_round(), Some(7));
    }

    // Round seven completes, and the stashed shares finish signing at once.
    let mut output = None;
    for message in round_seven.iter().filter(|m| m.from() != ids[2]) {
        let (o, messages) = engines[2].process_message(&mut rng, message)?.into_parts();
        output = o;
        shares.extend(messages);
    }
    match output {
        Some(Output::Signature(signature)) => verify_signature(&public_key, &digest, &signature),
        other => panic!("expected a signature, got {other:?}"),
    }
    assert_eq!(shares.len(), 3);
    assert_eq!(engines[2].status(), Status::Terminated);

    // A round seven message that arrives after its round is rejected without
    // ending the run.
    let stale = round_seven.iter().find(|m| m.from() == ids[1]).unwrap();
    assert_eq!(
        engines[0].process_message(&mut rng, stale).unwrap_err(),
        InternalError::ProtocolError(Some(ids[1]))
    );
    assert_eq!(engines[0].status(), Status::Running);
    Ok(())
}

#[test]
fn early_messages_are_held_once_and_dropped_when_unreachable() -> Result<()> {
    init_logging();
    let mut rng = get_test_rng();
    let contexts = TrustedDealer::new(2, 3)?.deal(&mut rng)?;
    let ids: Vec<_> = contexts.iter().map(|c| c.config().id()).collect();
    let (mut engines, round_seven) = start(contexts, Some(digest(b"stash")), &mut rng)?;
    let early_abort = Message::new(
        MessageType::Presign(PresignMessageType::Abort),
        engines[2].identifier(),
        ids[0],
        Recipient::Broadcast,
        &0u8,
    )?;

    assert!(matches!(
        engines[2].process_message(&mut rng, &early_abort)?,
        ProcessOutcome::Incomplete
    ));
    assert_eq!(engines[2].stashed(), 1);

    // A second early message of the same type from the same sender.
    assert_eq!(
        engines[2]
            .process_message(&mut rng, &early_abort)
            .unwrap_err(),
        InternalError::ProtocolError(Some(ids[0]))
    );
    assert_eq!(engines[2].status(), Status::Running);
    assert_eq!(engines[2].stashed(), 1);

    // Round seven succeeds, so the abort message can never be used.
    for message in round_seven.iter().filter(|m| m.is_addressed_to(ids[2])) {
        let _ = engines[2].process_message(&mut rng, message)?;
    }
    assert_eq!(engines[2].current_round(), Some(9));
    assert_eq!(engines[2].stashed(), 0);
    Ok(())
}

#[test]
fn skipped_batch_message_keeps_the_outgoing_share() -> Result<()> {
    init_logging();
    let mut rng = get_test_rng();
    let contexts = TrustedDealer::new(2, 3)?.deal(&mut rng)?;
    let ids: Vec<_> = contexts.iter().map(|c| c.config().id()).collect();
    let public_key = *contexts[0].public_key();
    let digest = digest(b"batch");
    let (mut engines, round_seven) = start(contexts, Some(digest.clone()), &mut rng)?;

    // Participant 0 gets its round seven messages in one batch, together
    // with an abort message that is stale once round seven succeeds.
    let mut batch: Vec<_> = round_seven
        .iter()
        .filter(|m| m.is_addressed_to(ids[0]))
        .cloned()
        .collect();
    batch.push(Message::new(
        MessageType::Presign(PresignMessageType::Abort),
        engines[0].identifier(),
        ids[1],
        Recipient::Broadcast,
        &0u8,
    )?);
    let (output, mut shares) = engines[0].process_messages(&mut rng, &batch)?.into_parts();
    assert!(output.is_none());
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].from(), ids[0]);
    assert_eq!(engines[0].status(), Status::Running);
    assert_eq!(engines[0].current_round(), Some(9));

    for engine in engines[1..].iter_mut() {
        let engine_id = engine.id();
        for message in round_seven.iter().filter(|m| m.is_addressed_to(engine_id)) {
            let (_, messages) = engine.process_message(&mut rng, message)?.into_parts();
            shares.extend(messages);
        }
    }
    assert_eq!(shares.len(), 3);

    let outputs = deliver_all(&mut engines, shares, &mut rng)?;
    assert_eq!(outputs.len(), 3);
    for output in outputs.values() {
        match output {
            Output::Signature(signature) => verify_signature(&public_key, &digest, signature),
            other => panic!("expected a signature, got {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn batches_are_verified_together() -> Result<()> {
    init_logging();
    let mut rng = get_test_rng();
    let contexts = TrustedDealer::new(2, 4)?.deal(&mut rng)?;
    let ids: Vec<_> = contexts.iter().map(|c| c.config().id()).collect();
    let nonce_point = *contexts[0].nonce_point();
    let (mut engines, round_seven) = start(contexts, None, &mut rng)?;

    let for_first: Vec<_> = round_seven
        .iter()
        .filter(|m| m.is_addressed_to(ids[0]))
        .cloned()
        .collect();
    match engines[0].process_messages(&mut rng, &for_first)? {
        ProcessOutcome::Terminated(Output::PreSignature(presignature)) => {
            assert_eq!(presignature.nonce_point(), &nonce_point)
        }
        other => panic!("expected a pre-signature, got {other:?}"),
    }

    // Two garbled messages in one batch: the run fails on the lower sender.
    let garbled: Vec<_> = round_seven
        .iter()
        .filter(|m| m.is_addressed_to(ids[1]))
        .map(|m| {
            if m.from() == ids[2] || m.from() == ids[3] {
                m.clone().with_bytes(vec![1u8; 8])
            } else {
                m.clone()
            }
        })
        .collect();
    assert_eq!(
        engines[1].process_messages(&mut rng, &garbled).unwrap_err(),
        InternalError::ProtocolError(Some(ids[2]))
    );
    assert_eq!(engines[1].status(), Status::Failed);
    assert_eq!(
        engines[1]
            .process_message(&mut rng, &round_seven[0])
            .unwrap_err(),
        InternalError::CallingApplicationMistake(CallerError::ProtocolAlreadyTerminated)
    );
    Ok(())
}

#[test]
fn misdirected_messages_are_caller_errors() -> Result<()> {
    let mut rng = get_test_rng();
    let contexts = TrustedDealer::new(2, 2)?.deal(&mut rng)?;
    let (mut engines, messages) = start(contexts, None, &mut rng)?;
    let other_contexts = TrustedDealer::new(2, 2)?.deal(&mut rng)?;
    let (_, other_session) = start(other_contexts, None, &mut rng)?;

    assert_eq!(
        engines[0]
            .process_message(&mut rng, &other_session[0])
            .unwrap_err(),
        InternalError::CallingApplicationMistake(CallerError::WrongSessionIdentifier)
    );
    let own = messages
        .iter()
        .find(|m| m.from() == engines[0].id())
        .unwrap();
    assert_eq!(
        engines[0].process_message(&mut rng, own).unwrap_err(),
        InternalError::CallingApplicationMistake(CallerError::WrongMessageRecipient)
    );
    assert_eq!(engines[0].status(), Status::Running);

    // Neither mistake disturbed the run.
    let outputs = deliver_all(&mut engines, messages, &mut rng)?;
    assert_eq!(outputs.len(), 2);
    Ok(())
}
