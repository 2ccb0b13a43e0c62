// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

pub mod cli;
pub mod config;
pub mod logging;
pub mod watch;

pub use config::Config;
