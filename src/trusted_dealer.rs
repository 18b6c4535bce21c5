// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A trusted dealer that fabricates the state the earlier pre-signing rounds
//! would leave behind, so that the final round can be run in isolation.
//!
//! The dealer Shamir-shares a fresh signing key, samples every participant's
//! Paillier, Pedersen and ElGamal keys and nonce share, and plays every
//! multiplicative-to-additive conversion itself. It knows every secret, so it
//! is only suitable for tests and simulations, and is only built for tests or
//! with the `test-utils` feature.

use crate::{
    context::{PartyPublic, PresignContext, PresignPrivate, PresignPublic},
    elgamal::{ElGamalCiphertext, ElGamalSecret},
    errors::{InternalError, Result},
    paillier::{Ciphertext, DecryptionKey, Nonce},
    parameters::ELL_PRIME,
    pedersen::PedersenParameters,
    protocol::{Identifier, ParticipantConfig},
    transcript::{SessionTranscript, NONCE_ENCRYPTION_DOMAIN},
    utils::{
        bn_to_scalar, random_nonzero_scalar, random_positive_bn, scalar_to_bn, CurvePoint,
    },
    zkp::{
        pienc::{PiEncInput, PiEncProof, PiEncSecret},
        Proof,
    },
};
use k256::{elliptic_curve::Field, Scalar};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use std::collections::HashMap;
use tracing::{error, info, instrument};

/// Produces a consistent [`PresignContext`] for every participant of a
/// session.
#[derive(Debug, Clone)]
pub struct TrustedDealer {
    threshold: usize,
    participant_count: usize,
    corrupted: Option<usize>,
    safe_primes: Option<Vec<BigNumber>>,
}

/// A participant's keys and nonce share, before the conversions run.
struct Dealt {
    config: ParticipantConfig,
    key_share: Scalar,
    decryption_key: DecryptionKey,
    pedersen: PedersenParameters,
    elgamal_secret: ElGamalSecret,
    nonce_share: Scalar,
    nonce_ciphertext: Ciphertext,
    nonce_randomness: Nonce,
    elgamal_nonce: ElGamalCiphertext,
    elgamal_nonce_randomness: ElGamalSecret,
}

impl TrustedDealer {
    /// A dealer for `participant_count` participants sharing a key that any
    /// `threshold` of them could reconstruct. Every participant takes part in
    /// the dealt session.
    pub fn new(threshold: usize, participant_count: usize) -> Result<Self> {
        if participant_count < 2 {
            error!("A session needs at least two participants, got {}", participant_count);
            return arg_err!("fewer than two participants");
        }
        if threshold == 0 || threshold > participant_count {
            error!(
                "Threshold {} is not between 1 and the participant count {}",
                threshold, participant_count
            );
            return arg_err!("threshold out of range");
        }
        Ok(Self {
            threshold,
            participant_count,
            corrupted: None,
            safe_primes: None,
        })
    }

    /// Hand the participant at `index` (in ascending identifier order) a
    /// random `χ` share instead of the correct one. Its ElGamal encryption of
    /// `χ` matches the random share, so its proofs still verify.
    pub fn with_chi_share_corrupted(mut self, index: usize) -> Self {
        self.corrupted = Some(index);
        self
    }

    /// Build the Paillier moduli from these safe primes, two per participant,
    /// instead of sampling fresh ones.
    pub fn with_safe_primes(mut self, primes: Vec<BigNumber>) -> Self {
        self.safe_primes = Some(primes);
        self
    }

    /// Produce one context per participant, in ascending identifier order.
    #[instrument(skip_all, err(Debug))]
    pub fn deal<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Vec<PresignContext>> {
        let n = self.participant_count;
        if matches!(self.corrupted, Some(index) if index >= n) {
            error!("Corrupted index is out of range for {} participants", n);
            return arg_err!("corrupted index out of range");
        }
        let primes = match &self.safe_primes {
            Some(primes) => primes.clone(),
            None => sample_safe_primes(2 * n, rng)?,
        };
        if primes.len() < 2 * n {
            error!("Need {} safe primes, got {}", 2 * n, primes.len());
            return arg_err!("not enough safe primes");
        }

        let mut configs = ParticipantConfig::random_quorum(n, rng)?;
        configs.sort_by_key(ParticipantConfig::id);
        let identifier = Identifier::random(rng);
        info!("Dealing a {}-of-{} session {}.", self.threshold, n, identifier);

        let key_shares = self.share_key(rng)?;
        let parties = configs
            .into_iter()
            .zip(key_shares)
            .zip(primes.chunks(2))
            .map(|((config, key_share), pq)| deal_party(config, key_share, &pq[0], &pq[1], rng))
            .collect::<Result<Vec<_>>>()?;
        let ids: Vec<_> = parties.iter().map(|party| party.config.id()).collect();

        let public_key: CurvePoint = parties
            .iter()
            .map(|party| CurvePoint::GENERATOR.multiply_by_scalar(&party.key_share))
            .sum();
        let nonce: Scalar = parties.iter().map(|party| party.nonce_share).sum();
        let nonce_inverse = Option::<Scalar>::from(nonce.invert()).ok_or_else(|| {
            error!("Dealt nonce shares add up to zero");
            InternalError::CouldNotInvertScalar
        })?;
        let nonce_point = CurvePoint::GENERATOR.multiply_by_scalar(&nonce_inverse);

        // `D[j→i]` encrypts `k_i·x_j + β` under `i`'s key. The receiver keeps
        // the decryption `α_{i,j}`, the sender keeps `-β`.
        let mut mta_ciphertexts = HashMap::new();
        let mut chi_shares: Vec<Scalar> = parties
            .iter()
            .map(|party| party.nonce_share * party.key_share)
            .collect();
        for (i, receiver) in parties.iter().enumerate() {
            let encryption_key = receiver.decryption_key.encryption_key();
            for (j, sender) in parties.iter().enumerate().filter(|(j, _)| *j != i) {
                let beta = random_positive_bn(rng, &(BigNumber::one() << ELL_PRIME));
                let (masked_beta, _) = encryption_key.encrypt(rng, &beta)?;
                let ciphertext = encryption_key.multiply_and_add(
                    &scalar_to_bn(&sender.key_share),
                    &receiver.nonce_ciphertext,
                    &masked_beta,
                )?;
                let alpha = bn_to_scalar(&receiver.decryption_key.decrypt(&ciphertext)?)?;
                chi_shares[i] += alpha;
                chi_shares[j] -= bn_to_scalar(&beta)?;
                let _ = mta_ciphertexts.insert((ids[j], ids[i]), ciphertext);
            }
        }
        if let Some(index) = self.corrupted {
            info!("Corrupting the χ share of {}.", ids[index]);
            chi_shares[index] = Scalar::random(&mut *rng);
        }

        let transcript = SessionTranscript::new(identifier, &ids, &public_key, &nonce_point);
        let mut public_parties = HashMap::new();
        let mut privates = Vec::with_capacity(n);
        for (party, chi_share) in parties.iter().zip(&chi_shares) {
            let elgamal_public = party.elgamal_secret.public_point();
            let (elgamal_chi, elgamal_chi_randomness) =
                ElGamalCiphertext::encrypt(rng, &elgamal_public, chi_share)?;
            let public = PartyPublic::new(
                CurvePoint::GENERATOR.multiply_by_scalar(&party.key_share),
                party.decryption_key.encryption_key(),
                party.pedersen.clone(),
                elgamal_public,
                party.nonce_ciphertext.clone(),
                party.elgamal_nonce,
                elgamal_chi,
                nonce_point.multiply_by_scalar(&party.nonce_share),
            );
            let _ = public_parties.insert(party.config.id(), public);
            privates.push(PresignPrivate::new(
                party.nonce_share,
                *chi_share,
                party.elgamal_secret.clone(),
                party.elgamal_nonce_randomness.clone(),
                elgamal_chi_randomness,
                party.decryption_key.clone(),
            ));
        }
        let public = PresignPublic::new(public_key, nonce_point, public_parties, mta_ciphertexts);

        parties
            .iter()
            .zip(privates)
            .map(|(verifier, private)| {
                let mut nonce_proofs = HashMap::new();
                for prover in parties.iter().filter(|p| p.config.id() != verifier.config.id()) {
                    let input = PiEncInput::new(
                        verifier.pedersen.clone(),
                        prover.decryption_key.encryption_key(),
                        prover.nonce_ciphertext.clone(),
                    );
                    let secret = PiEncSecret::new(
                        scalar_to_bn(&prover.nonce_share),
                        prover.nonce_randomness.clone(),
                    );
                    let mut proof_transcript =
                        transcript.for_participant(prover.config.id(), NONCE_ENCRYPTION_DOMAIN);
                    let proof = PiEncProof::prove(&input, &secret, &mut proof_transcript, rng)?;
                    let _ = nonce_proofs.insert(prover.config.id(), proof);
                }
                PresignContext::new(
                    identifier,
                    verifier.config.clone(),
                    public.clone(),
                    nonce_proofs,
                    private,
                )
            })
            .collect()
    }

    /// Shamir-share a fresh key over the points `1..=n` and scale every share
    /// by its Lagrange coefficient, so that the shares add up to the key.
    fn share_key<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Vec<Scalar>> {
        let coefficients = (0..self.threshold)
            .map(|_| random_nonzero_scalar(rng))
            .collect::<Result<Vec<_>>>()?;
        let points: Vec<Scalar> = (1..=self.participant_count as u64)
            .map(Scalar::from)
            .collect();

        points
            .iter()
            .map(|x_i| {
                let share = coefficients
                    .iter()
                    .rev()
                    .fold(Scalar::ZERO, |acc, c| acc * x_i + c);
                let (numerator, denominator) = points
                    .iter()
                    .filter(|x_j| *x_j != x_i)
                    .fold((Scalar::ONE, Scalar::ONE), |(num, den), x_j| {
                        (num * x_j, den * (*x_j - x_i))
                    });
                let denominator_inverse = Option::<Scalar>::from(denominator.invert())
                    .ok_or(InternalError::CouldNotInvertScalar)?;
                Ok(share * numerator * denominator_inverse)
            })
            .collect()
    }
}

fn deal_party<R: RngCore + CryptoRng>(
    config: ParticipantConfig,
    key_share: Scalar,
    p: &BigNumber,
    q: &BigNumber,
    rng: &mut R,
) -> Result<Dealt> {
    if p == q {
        error!("Paillier modulus for {} would be a square", config.id());
        return arg_err!("repeated safe prime");
    }
    let decryption_key = DecryptionKey::from_primes(p, q)?;
    let (pedersen, _) = PedersenParameters::extract(&decryption_key, rng)?;
    let elgamal_secret = ElGamalSecret::random(rng)?;

    let nonce_share = random_nonzero_scalar(rng)?;
    let (nonce_ciphertext, nonce_randomness) = decryption_key
        .encryption_key()
        .encrypt(rng, &scalar_to_bn(&nonce_share))?;
    let (elgamal_nonce, elgamal_nonce_randomness) =
        ElGamalCiphertext::encrypt(rng, &elgamal_secret.public_point(), &nonce_share)?;

    Ok(Dealt {
        config,
        key_share,
        decryption_key,
        pedersen,
        elgamal_secret,
        nonce_share,
        nonce_ciphertext,
        nonce_randomness,
        elgamal_nonce,
        elgamal_nonce_randomness,
    })
}

#[cfg(not(test))]
fn sample_safe_primes<R: RngCore + CryptoRng>(
    count: usize,
    _rng: &mut R,
) -> Result<Vec<BigNumber>> {
    use crate::parameters::PRIME_BITS;
    info!("Sampling {} safe primes. This may take a while.", count);
    Ok((0..count).map(|_| BigNumber::safe_prime(PRIME_BITS)).collect())
}

#[cfg(test)]
fn sample_safe_primes<R: RngCore + CryptoRng>(
    count: usize,
    rng: &mut R,
) -> Result<Vec<BigNumber>> {
    use rand::seq::SliceRandom;
    let mut primes = crate::safe_primes_1024::get_safe_primes();
    if primes.len() < count {
        error!("Only {} precomputed safe primes, need {}", primes.len(), count);
        return Err(InternalError::InternalInvariantFailed);
    }
    primes.shuffle(rng);
    primes.truncate(count);
    Ok(primes)
}
