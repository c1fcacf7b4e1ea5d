// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`scangate-core`)
//!
//! HTTP surface that translates platform webhooks and API requests into
//! application service calls. No business logic lives here; all real work
//! is delegated to `crate::application`.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | Release webhook, ad-hoc scans, profile/report/error reads |

pub mod api;
