//! Invoice generation from nested entity billing chains: totals, splitting,
//! local persistence and PDF export.

pub mod api;
pub mod archive;
pub mod chain;
pub mod config;
pub mod dates;
pub mod entities;
pub mod error;
pub mod flatten;
pub mod model;
pub mod pdf;
pub mod report;
pub mod session;
pub mod split;
pub mod store;
pub mod totals;
pub mod validate;
pub mod workflow;

pub use error::{Error, Result};
