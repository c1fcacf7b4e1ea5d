// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the scangate CLI

pub mod config;
pub mod migrate;
pub mod serve;
pub mod sweep;
pub mod worker;

pub use self::config::ConfigCommand;
pub use self::migrate::MigrateCommand;
pub use self::serve::ServeCommand;
