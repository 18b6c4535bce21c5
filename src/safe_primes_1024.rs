// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Precomputed 1024-bit safe primes, so that tests do not have to spend
//! minutes sampling Paillier moduli.

use libpaillier::unknown_order::BigNumber;

const SAFE_PRIMES: [&str; 10] = [
    "af5d60edb5089afdc18af0f72ecdad9fa2584950bb7f493dae576cdcaa42d95a3c855f3c957a0b9df556dd551fb2dca9e3a0672212c0456c002d06ae54fa15cafad182ff5729fac87170fe2b7b4811377442e40c8cad2d08e7556bd6cc6490094a487f457d6ef2b54d065882ce3a3271049f5f7a33a62a8b5a49dfebb6a4cc07",
    "b1ee452d9a5a68da448bd0e4aad548600b8214ddaca8fe82ccbfcf1a6c33bfac388c4947808ca9e0a5b5a5d9535413fdd62512a7c7088a4237bcfaaed5a4affc7586906dc6e6afcc4182ff39734509df1cebff622d820d612ecec05256ec8dd8b84e5eed5aac7080acf657eeaba983951187dc263f7ad0ade031767bdafa72a7",
    "a0ea8e51b34890dd371103ea6e3363b16f5fe0b598f940e0f98c621e610b699aaa5fccab7bc310b90d6c10ab291dfa657f88f9b164c4552949d00f144f7734ea7f0067601a0ce6ac98c3b8661a31db408ce37b8497d01dc36b7b4e7e5b4c0f729f95649c7e62d4a0144dfce8b915b198e6418b4b8d67a2cfe64def09f073586b",
    "84d2953829374ab36adfdcc3f944a3b0a71294c631c7789dc85678b5bec3612678bed2bcc70e4f7465047dfbfe2ee8ca7718639c85c8b415abc9abcd3343432105a2f0a78c066d6e4ee0c478b2628ecd1e6355112ca9301a36b1c32ab911d92800bfb21fc7f500151b09482024c656ea502382bdcee984b071a70c6648cf13c7",
    "f8eec64703549510bdb75a521bd7a61106077f304aa646a5ec2187a9455963a17e0fd49dcf885953416d1f235f956f8985f5f55e31ccc3faa058ab93d19b9aba5e5bbfc18364e9d5b6260cc4239d7e8375e8e49d31f4733f1331415fe7339fbece4aab6b8e0077232144db971dba7be769d7db6cd45645590fcb8216368ac3e7",
    "a0884b598b56180e45a7c4e8491b75cac10ef9885ce021bab8a24f3aec953b572d340afd404651a1d4db5c70b3b3b98b773134b010193b17a7b6f1ed2fa4bbe37501a7de4711091414ba1ad0a95220a1da7d17045da1798ef873ff7dc39f3cce444edc6babac201bda8d0c9e8937473b4927980f875a5d16a35c196974b8c70b",
    "b6931de6ca0c08c8e92493e1330628ea9f2e9cac785ff4b5abc3c1da8d5559dc4646523ef327e674f56270fd33a20d72533ae2e3a74400756d0051734332adfe02068f03f5f04fa614b65e6f08df903c66a8358a1dc5ad08fed909d522633bce9f5721ea262f11c81885c6df8fd367b1760c948937aff484b7050d6aafc0e433",
    "fee1a75a8e48f89b8e1d77eafe5176bdf525dd6563af13fdf0ad36ed66dc8b140ae2cd8756fa624b343ad261d5c209d8cc4d7afb00ee28a281ea1829c74bfb30907064e77890d8f1088c41dd7619164430f2ec5616b08a526ac3ffd6ef70038f261ad2ed6ae43b34067e0d6930bcd36e45bce1133ff1e3e0490933c7a656f91b",
    "da96ec1858b4ecfb247e3434465c147bc234e6687003b7ffcc6fc507b44c06a8e1acc170c541545b92e8e55e7fd12db08e2bec2e85f3b5a3d9022578b06aa5499038afa60229e2dcf4e1a05d3d30103c737883649e2f56991167ceb1a0546dd6c590b81b26d0a1ea17001495b1b0209e5f3f92ec9d49fbc81e8f5f00c2a381bb",
    "b964c29994d5254ffae590c5ca920cdcd67b409fa5b62b18769efb04d6ce2c7978e72f52c3b742eb79d95a4de4e88820d4052ea892c66651aed4a6e4c7c35d48f2e8923aa11e80ed8f31d74f1a60c53358584931f6b3e3d2e5d251eba6cfe0c52a8436c41434ea16f64bc0e3513612b89d45440e2e03db53b54e7f1db8e433c7",
];

/// Returns every precomputed safe prime. All entries are distinct.
pub(crate) fn get_safe_primes() -> Vec<BigNumber> {
    SAFE_PRIMES
        .iter()
        .map(|s| BigNumber::from_slice(hex::decode(s).unwrap()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::PRIME_BITS;

    #[test]
    fn precomputed_primes_are_safe_primes_of_the_right_size() {
        let primes = get_safe_primes();
        for p in &primes {
            assert_eq!(p.to_bytes().len() * 8, PRIME_BITS);
            assert!(p.is_prime());
            let q = &(p - &BigNumber::one()) / &BigNumber::from(2u64);
            assert!(q.is_prime());
        }
    }
}
