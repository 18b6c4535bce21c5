// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Identifiers for participants and sessions, and the static configuration
//! telling a participant who else takes part in a run.

use crate::errors::{CallerError, InternalError, Result};
use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fmt::{Display, Formatter},
};
use tracing::error;

/// An identifier corresponding to a participant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantIdentifier(u128);

impl ParticipantIdentifier {
    /// Generates a random [`ParticipantIdentifier`].
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(rng.gen())
    }

    pub(crate) fn to_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }
}

impl Display for ParticipantIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ParticipantId({})", hex::encode(&self.0.to_be_bytes()[..4]))
    }
}

/// A session identifier, unique to a single run of the protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier(u128);

impl Identifier {
    /// Generates a random [`Identifier`].
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(rng.gen())
    }

    pub(crate) fn to_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Id({})", hex::encode(&self.0.to_be_bytes()[..4]))
    }
}

/// The set of participants in a run, seen from one of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantConfig {
    /// The identifier of this participant.
    id: ParticipantIdentifier,
    /// The identifiers of every other participant, in ascending order.
    other_ids: Vec<ParticipantIdentifier>,
}

impl ParticipantConfig {
    /// Creates a configuration for `id` among `other_ids`.
    ///
    /// Fails if `other_ids` is empty, contains duplicates, or contains `id`.
    pub fn new(id: ParticipantIdentifier, other_ids: &[ParticipantIdentifier]) -> Result<Self> {
        if other_ids.is_empty() {
            error!("A run needs at least two participants");
            return arg_err!("no other participants");
        }
        let unique: HashSet<_> = other_ids.iter().collect();
        if unique.len() != other_ids.len() {
            error!("Participant list contains duplicates");
            return arg_err!("duplicate participant identifiers");
        }
        if unique.contains(&id) {
            error!("Participant {} appears among its own counterparties", id);
            return arg_err!("own identifier listed among other participants");
        }

        let mut other_ids = other_ids.to_vec();
        other_ids.sort();
        Ok(Self { id, other_ids })
    }

    /// Generates a consistent set of configurations, one per participant.
    pub fn random_quorum<R: RngCore + CryptoRng>(size: usize, rng: &mut R) -> Result<Vec<Self>> {
        if size < 2 {
            error!("A quorum needs at least two participants, got {}", size);
            return Err(CallerError::BadInput(format!("quorum of size {size}")).into());
        }
        let mut ids: Vec<_> = std::iter::repeat_with(|| ParticipantIdentifier::random(&mut *rng))
            .take(size)
            .collect();
        ids.sort();
        ids.dedup();
        if ids.len() != size {
            error!("Sampled colliding participant identifiers");
            return Err(InternalError::InternalInvariantFailed);
        }

        ids.iter()
            .map(|id| {
                let others: Vec<_> = ids.iter().copied().filter(|other| other != id).collect();
                Self::new(*id, &others)
            })
            .collect()
    }

    /// The identifier of this participant.
    pub fn id(&self) -> ParticipantIdentifier {
        self.id
    }

    /// The identifiers of all other participants, in ascending order.
    pub fn other_ids(&self) -> &[ParticipantIdentifier] {
        &self.other_ids
    }

    /// Every participant including this one, in ascending order.
    pub fn all_participants(&self) -> Vec<ParticipantIdentifier> {
        let mut all = self.other_ids.clone();
        all.push(self.id);
        all.sort();
        all
    }

    /// The number of participants, including this one.
    pub fn count(&self) -> usize {
        self.other_ids.len() + 1
    }

    /// Whether `id` names one of the other participants.
    pub(crate) fn is_counterparty(&self, id: &ParticipantIdentifier) -> bool {
        self.other_ids.binary_search(id).is_ok()
    }
}
