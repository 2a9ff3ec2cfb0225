//! Shared types for the batchwatch alerting workspace.
//!
//! Every crate in the workspace speaks in terms of [`types::EventRecord`]
//! (one observed unit of work) and [`types::Alert`] (one emitted
//! notification). Time is read through the injectable [`clock::Clock`].

pub mod clock;
pub mod types;
