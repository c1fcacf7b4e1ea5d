// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod repositories;
pub mod db;
pub mod detectify;
pub mod akkeris;
pub mod auth;
pub mod storage;
