//! Change notification pipeline.
//!
//! Sources that can push changes feed raw messages into a channel; the
//! [`ChangeListener`] parses them, queues the interesting ones and hands
//! each completed batch to the incremental reconciler.

pub mod listener;
pub mod notification;

pub use listener::{channel, ChangeListener, ListenerConfig, ListenerEvent, ListenerStats};
pub use notification::{parse_notification, Notification, TimelineEntry};
