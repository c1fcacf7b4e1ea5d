// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Scangate core
//!
//! Provisions security scans for released applications, reconciles their
//! lifecycle against the scan provider and reports verdicts back to the
//! deployment platform.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Layers:** `domain` → `application` → `infrastructure` / `presentation`

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
