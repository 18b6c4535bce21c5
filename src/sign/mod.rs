// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Turns a [`PreSignature`](crate::PreSignature) and a message digest into an
//! ECDSA signature in one round of communication.

pub(crate) mod round_one;
pub(crate) mod round_two;
