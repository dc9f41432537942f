//! Reconcile tracked time into worklogs and weekly submissions to a
//! form-driven legacy timesheet system.

pub mod account_update;
pub mod cache;
pub mod classify;
pub mod cli;
pub mod clients;
pub mod commands;
pub mod config;
pub mod entries;
pub mod error;
pub mod ext;
pub mod import;
pub mod legacy;
pub mod model;
pub mod prompt;
pub mod util;
pub mod week_processor;
pub mod window;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
