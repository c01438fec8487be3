// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! JWT Validator: verification, claim extraction, algorithm allowlisting.

pub mod jwt;

pub use jwt::{JwtError, JwtValidator};
