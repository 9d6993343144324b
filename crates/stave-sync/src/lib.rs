//! Source adapters, reconcilers and the change-notification pipeline for
//! stave.
//!
//! A [`Source`] exposes an external artist → album → track catalog. The
//! [`FullReconciler`] walks all of it; the [`IncrementalReconciler`]
//! applies single changes, fed in batches by the [`ChangeListener`].

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod mirror;
pub mod notify;
pub mod reconcile;
pub mod source;

pub use config::{Backend, Config};
pub use error::{SyncError, SyncResult};
pub use notify::{ChangeListener, ListenerConfig, ListenerEvent, ListenerStats};
pub use reconcile::{
    Change, ChangeState, FullReconciler, IncrementalOutcome, IncrementalReconciler,
    ReconcileOptions, ReconcileReport, SyncLock,
};
pub use source::{scan_library, PlexSettings, PlexSource, Source, SourceNode, TreeSource};
