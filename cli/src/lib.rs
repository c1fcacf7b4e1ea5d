// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Scangate CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Process wiring and command implementations for the `scangate` binary

pub mod bootstrap;
pub mod commands;
