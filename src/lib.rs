// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The final pre-signing round of CMP threshold ECDSA, with identifiable
//! abort and one-round signing.
//!
//! The earlier rounds of pre-signing leave every participant `i` with a share
//! `k_i` of a nonce `k`, the nonce point `R = k^{-1}·G`, and a share `χ_i` of
//! `k·x`, where `x` is the shared signing key. In the final round every
//! participant broadcasts `S_i = χ_i·R` together with a proof that it matches
//! the participant's ElGamal encryption of `χ_i`. If the `S_i` add up to the
//! public key `X`, the participant holds a [`PreSignature`] that can later
//! sign any digest in a single round. Otherwise the participants run an abort
//! round, in which each one reveals enough of its state for everybody to
//! recompute the correct `S_j` and name the participants that deviated.
//!
//! This follows the protocol of [CGGMP'21](https://eprint.iacr.org/2021/060),
//! on [secp256k1](https://en.bitcoin.it/wiki/Secp256k1).
//!
//! The library only provides the message processing of a single participant.
//! A [`ProtocolEngine`] consumes [`Message`]s from other participants and
//! produces [`Message`]s that the calling application must deliver, until it
//! terminates with an [`Output`]. Key generation and the earlier pre-signing
//! rounds are out of scope: their results are assembled into a
//! [`PresignContext`] with [`PresignContext::new`], which checks them.
//!
//! With the `test-utils` feature, `TrustedDealer` fabricates those results
//! for tests and simulations:
//!
//! ```no_run
//! # #[cfg(feature = "test-utils")]
//! # fn main() -> tss_presign::errors::Result<()> {
//! use rand::rngs::OsRng;
//! use sha2::{Digest, Sha256};
//! use tss_presign::{Output, ProtocolEngine, TrustedDealer};
//!
//! let mut rng = OsRng;
//! let contexts = TrustedDealer::new(2, 3)?.deal(&mut rng)?;
//! let digest = Sha256::new().chain_update(b"hello");
//!
//! let mut engines = Vec::new();
//! let mut inbox = Vec::new();
//! for context in contexts {
//!     let (engine, messages) = ProtocolEngine::new(context, Some(digest.clone()), &mut rng)?;
//!     engines.push(engine);
//!     inbox.extend(messages);
//! }
//!
//! while let Some(message) = inbox.pop() {
//!     for engine in engines.iter_mut() {
//!         if !message.is_addressed_to(engine.id()) {
//!             continue;
//!         }
//!         let (output, messages) = engine.process_message(&mut rng, &message)?.into_parts();
//!         inbox.extend(messages);
//!         if let Some(Output::Signature(signature)) = output {
//!             println!("{} signed: {:?}", engine.id(), signature);
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "test-utils"))]
//! # fn main() {}
//! ```

#![allow(non_snake_case)] // FIXME: To be removed in the future
#![warn(missing_docs)]
#![cfg_attr(feature = "flame_it", feature(proc_macro_hygiene))]
#[cfg(feature = "flame_it")]
extern crate flame;
#[cfg(feature = "flame_it")]
#[macro_use]
extern crate flamer;

#[macro_use]
pub mod errors;

mod abort;
mod context;
mod elgamal;
mod engine;
mod message_queue;
mod messages;
mod paillier;
mod parameters;
mod pedersen;
mod presign;
mod protocol;
mod round;
mod sign;
mod transcript;
#[cfg(any(test, feature = "test-utils"))]
mod trusted_dealer;
mod utils;
mod zkp;

#[cfg(test)]
mod safe_primes_1024;

pub use abort::{AbortReason, AbortVerdict};
pub use context::{PartyPublic, PresignContext, PresignPrivate, PresignPublic};
pub use elgamal::{ElGamalCiphertext, ElGamalSecret};
pub use engine::{Output, ProcessOutcome, ProtocolEngine, Status};
pub use messages::{Message, MessageType, PresignMessageType, Recipient, SignMessageType};
pub use paillier::{Ciphertext, DecryptionKey, EncryptionKey};
pub use pedersen::{Commitment, PedersenParameters};
pub use presign::record::PreSignature;
pub use protocol::{Identifier, ParticipantConfig, ParticipantIdentifier};
#[cfg(any(test, feature = "test-utils"))]
pub use trusted_dealer::TrustedDealer;
pub use utils::CurvePoint;
pub use zkp::pienc::PiEncProof;

#[cfg(test)]
mod tests;
