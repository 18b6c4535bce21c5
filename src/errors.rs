// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A list of error types which are produced during an execution of the protocol
use core::fmt::Debug;
use thiserror::Error;

use crate::protocol::ParticipantIdentifier;

/// The default Result type used in this crate
pub type Result<T> = std::result::Result<T, InternalError>;

/// Represents an error in the manipulation of internal cryptographic data
#[derive(Clone, Eq, PartialEq, Error, Debug)]
#[allow(missing_docs)]
pub enum InternalError {
    #[error("Serialization Error")]
    Serialization,
    #[error("Failed to verify proof: `{0}`")]
    FailedToVerifyProof(String),
    #[error("Protocol error, participant {0:?} misbehaved")]
    ProtocolError(Option<ParticipantIdentifier>),
    #[error("Represents some code assumption that was checked at runtime but failed to be true")]
    InternalInvariantFailed,
    #[error("Could not invert a BigNumber")]
    CouldNotInvertBigNumber,
    #[error("Failed to convert BigNumber to k256::Scalar, as BigNumber was not in [0,p)")]
    CouldNotConvertToScalar,
    #[error("Could not invert a Scalar")]
    CouldNotInvertScalar,
    #[error("Could not decrypt a Paillier ciphertext")]
    PaillierDecryptionFailed,
    #[error("Could not construct signature from provided scalars")]
    SignatureInstantiationError,
    #[error("The calling application made a mistake: {0}")]
    CallingApplicationMistake(#[from] CallerError),
}

/// Errors that are caused by incorrect behavior by the calling application.
#[derive(Clone, Eq, PartialEq, Error, Debug)]
#[allow(missing_docs)]
pub enum CallerError {
    #[error("This participant was given a message intended for somebody else")]
    WrongMessageRecipient,
    #[error("The message belongs to a different session")]
    WrongSessionIdentifier,
    #[error("The protocol instance already terminated and accepts no further input")]
    ProtocolAlreadyTerminated,
    #[error("Function call contained invalid arguments: `{0}`")]
    BadInput(String),
    #[error("Reached the maximum allowed number of retries")]
    RetryFailed,
}

macro_rules! serialize {
    ($x:expr) => {{
        bincode::serialize($x).or(Err(crate::errors::InternalError::Serialization))
    }};
}

macro_rules! deserialize {
    ($x:expr) => {{
        bincode::deserialize($x).or(Err(crate::errors::InternalError::Serialization))
    }};
}

macro_rules! verify_err {
    ($x:expr) => {{
        Err(crate::errors::InternalError::FailedToVerifyProof(
            String::from($x),
        ))
    }};
}

macro_rules! arg_err {
    ($x:expr) => {{
        Err(crate::errors::InternalError::CallingApplicationMistake(
            crate::errors::CallerError::BadInput(String::from($x)),
        ))
    }};
}
