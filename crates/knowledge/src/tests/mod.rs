//! Crate-level scenario tests.

pub(crate) mod support;

mod conversation;
mod lifecycle;
