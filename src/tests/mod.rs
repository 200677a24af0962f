//! End-to-end tests for the cpum crate.
//!
//! Unit tests live next to the code; these run whole flows from raw probe
//! data or the catalog down to what a guest observes.

mod host_init;
mod layout;
mod scenarios;
