// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Security parameter definitions.
//!
//! Values are sourced from Figure 1 (page 5) and Table 2 (page 69) of
//! CGGMP'21 \[1\].
//!
//! ## References
//! 1. UC Non-Interactive, Proactive, Threshold ECDSA with Identifiable Aborts.
//!    Ran Canetti, Rosario Gennaro, Steven Goldfeder, Nikolaos Makriyannis, Udi
//!    Peled. EPrint version, Oct 2021.
//!    [PDF](https://eprint.iacr.org/2021/060.pdf)

/// Security parameter κ defines the message size of an elliptic curve group
/// element, and is also used to derive other parameter sizes.
const SECURITY_PARAM: usize = 256;

/// Range of the plaintext of a Paillier-encrypted nonce share, as checked by
/// [Π-enc](crate::zkp::pienc). The range value is `+/- 2^ELL`.
pub(crate) const ELL: usize = SECURITY_PARAM;

/// Range of the additive mask a responder adds while answering a
/// multiplicative-to-additive conversion. The range value is `[0, 2^ELL_PRIME)`.
pub(crate) const ELL_PRIME: usize = 5 * SECURITY_PARAM;

/// The flex space of a range check.
///
/// When a prover has a secret input `x` in the range `+/- 2^l`, the verifier
/// can check that the masked proof response corresponding to `x` is in the
/// range `+/- 2^(l + EPSILON)`.
pub(crate) const EPSILON: usize = 2 * SECURITY_PARAM;

/// Bit size of the (safe) prime factors of a Paillier modulus.
///
/// The product of two 1024-bit primes will produce 2048-bit Pallier moduli.
pub(crate) const PRIME_BITS: usize = 1024;
