//! Extension subsystem for the Vexel vector-graphics editor.
//!
//! Extensions are pluggable modules (import/export filters, effects,
//! print backends) declared by `.vex` descriptor files. This crate owns
//! everything between the descriptor on disk and a live, parameterized
//! extension the editor can drive:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      Registry                        │
//! │  - id → extension table (explicitly passed, no       │
//! │    ambient globals)                                  │
//! │  - unload-before-remove unregistration               │
//! │  - idle-expiration sweep                             │
//! └──────────────────────────────────────────────────────┘
//!                          │
//!          ┌───────────────┼───────────────┐
//!          ▼               ▼               ▼
//!   ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!   │  Extension  │ │  Extension  │ │  Extension  │
//!   │ descriptor  │ │ parameters  │ │ lifecycle   │
//!   │ + strategy  │ │ + deps      │ │ + timer     │
//!   └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! The lifecycle is a three-state machine: `Unloaded` ⇄ `Loaded`, with
//! `Deactivated` as a one-way absorbing state that also swaps the
//! behavior strategy for an inert one. Validation (`Extension::check`)
//! accumulates every failure into a shared plain-text [`ErrorLog`]
//! instead of stopping at the first, and reduces to a boolean.
//!
//! # Usage
//!
//! ```rust,ignore
//! use vexel_extension::{loader, ErrorLog, Registry};
//!
//! let registry = Registry::new();
//! let ext = loader::build_from_file("effects/blur.vex", None, &registry)?;
//!
//! let log = ErrorLog::open(log_dir);
//! if ext.read().check(&log) {
//!     ext.write().set_state(State::Loaded);
//! }
//! ```

pub mod dependency;
pub mod error;
pub mod extension;
pub mod implementation;
pub mod inx;
pub mod loader;
pub mod log;
pub mod param;
pub mod registry;
pub mod timer;

pub use dependency::Dependency;
pub use error::{ExtensionError, Result};
pub use extension::{Descriptor, Extension, State};
pub use implementation::{DefaultImplementation, Implementation};
pub use inx::InxNode;
pub use log::ErrorLog;
pub use param::{ParamStore, ParamValue, Parameter};
pub use registry::{ExtensionInfo, Registry, SharedExtension};
pub use timer::ExpirationTimer;
