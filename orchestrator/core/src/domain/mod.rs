// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer (`scangate-core`)
//!
//! Aggregates, value objects and the ports the application layer drives.
//! Nothing here performs I/O; gateways and repositories are implemented in
//! `crate::infrastructure`.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`scan_profile`] | `ScanProfile` aggregate, `ScanStatus`, severity classification |
//! | [`release`] | Deployment context captured from the platform |
//! | [`scan_error`] | Write-once terminal failure records |
//! | [`scan_provider`] | `ScanProvider` port |
//! | [`platform`] | `DeploymentPlatform` port and release status payloads |
//! | [`storage`] | `ReportArchive` port |
//! | [`repository`] | Persistence ports |
//! | [`config`] | `ScangateConfig` |

pub mod scan_profile;
pub mod release;
pub mod scan_error;
pub mod scan_provider;
pub mod platform;
pub mod storage;
pub mod repository;
pub mod config;
