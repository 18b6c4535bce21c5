// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    errors::Result,
    presign::record::PreSignature,
    protocol::{Identifier, ParticipantConfig},
    round::{Outbox, Round, Transition},
    sign::round_two::{SignRoundTwo, SignatureShare},
};
use sha2::Sha256;
use tracing::{info, instrument};

/// The first signing round: publish `σ_i`. It consumes no messages, so the
/// engine finalizes it as soon as it is entered.
pub(crate) struct SignRoundOne {
    identifier: Identifier,
    config: ParticipantConfig,
    presignature: PreSignature,
    digest: Sha256,
}

impl SignRoundOne {
    pub(crate) fn new(
        identifier: Identifier,
        config: ParticipantConfig,
        presignature: PreSignature,
        digest: Sha256,
    ) -> Self {
        Self {
            identifier,
            config,
            presignature,
            digest,
        }
    }

    pub(crate) fn session(&self) -> (Identifier, &ParticipantConfig) {
        (self.identifier, &self.config)
    }

    #[instrument(skip_all, err(Debug))]
    pub(crate) fn finalize(self, outbox: &mut Outbox) -> Result<Transition> {
        info!("Generating signature share.");
        let share = SignatureShare::new(self.presignature.signature_share(&self.digest)?);
        outbox.broadcast(SignRoundTwo::message_type(), &share)?;
        let round = SignRoundTwo::new(
            self.identifier,
            self.config,
            self.presignature,
            self.digest,
            share,
        )?;
        Ok(Transition::NextRound(Round::SignTwo(round)))
    }
}
