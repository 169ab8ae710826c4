// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod evaluator;
pub mod notifier;
pub mod optimizer;
pub mod outcome;
pub mod scheduler;
pub mod stats;
