//! Applies server-computed DOM patches to a live element tree.
//!
//! A producer elsewhere diffs its render output and sends [`Patch`]es (INSERT, REMOVE, UPDATE, MOVE, REPLACE),
//! each addressing an element by its `id`. [`PatchApplier`] applies them in order to a host [`Document`],
//! moving and updating existing elements in place so that focus, caret position and in-progress input survive.
//! Property deltas go through a [`PropertyReconciler`], a table of named per-property update policies.
//!
//! [`memory::MemoryDocument`] hosts a tree natively, [`web::WebDocument`] drives a browser DOM through `web-sys`.

#![doc(html_root_url = "https://docs.rs/patch-dom/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub mod apply;
pub mod config;
pub mod controller;
pub mod error;
pub mod host;
mod markup;
pub mod memory;
pub mod patch;
pub mod reconcile;
pub mod web;

pub use apply::{Diagnostics, PatchApplier};
pub use config::{ApplierConfig, DeferMode};
pub use controller::{ControllerFactory, ControllerHandle, ControllerRegistry};
pub use error::{ControllerError, HostError, PatchError};
pub use host::{Document, Element};
pub use patch::{Action, Patch, PropertyDelta};
pub use reconcile::{PropertyContext, PropertyHandler, PropertyReconciler};
