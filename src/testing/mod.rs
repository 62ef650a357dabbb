//! Test doubles for the text-generation collaborator and knowledge source

pub mod mocks;

pub use mocks::*;
