//! Centralized constants for the certfleet project.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod deploy;
pub mod paths;
pub mod pki;
pub mod remote;
