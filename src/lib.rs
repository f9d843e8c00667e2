//! bimcost - BIM cost estimation pipeline
//!
//! Uploads design models to Autodesk Forge, tracks their translation,
//! extracts construction elements and prices them against a rate table.
//! A multi-provider AI gateway adds cost prediction, image analysis and
//! report generation. Everything is exposed both as a CLI and an HTTP API.

#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod cli;
pub mod core;
pub mod error;
pub mod forge;
pub mod providers;
pub mod render;
pub mod storage;
pub mod util;

pub use error::{BimcostError, ExitCode, Result};
