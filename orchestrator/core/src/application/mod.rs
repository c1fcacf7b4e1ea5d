// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod errors;
pub mod context;
pub mod provisioner;
pub mod reconciler;
pub mod scheduler;
pub mod release_hook;

pub use context::{ScanContext, ScanSettings};
pub use errors::LifecycleError;
pub use provisioner::ScanProvisioner;
pub use reconciler::{LifecycleReconciler, SweepSummary};
pub use release_hook::{AdHocScanRequest, ReleaseHookService, ReleasedEvent};
pub use scheduler::SweepScheduler;
