//! Slashstep Server
//!
//! Access control and query compilation: the access policy store, deepest-scope
//! permission resolution, and the SlashstepQL filter compiler that every list
//! and count query runs through.

pub mod access_policies;
pub mod actions;
pub mod config;
pub mod db;
pub mod observability;
pub mod slashstepql;
