//! # Concertina
//!
//! A collapsible content engine: normalize heterogeneous item sources into
//! an ordered list with stable slug ids, run each item's animated
//! open/close state machine under a single- or multiple-open policy, and
//! keep the open item and the page's URL fragment consistent in both
//! directions without feedback loops.
//!
//! The engine is headless: the page document is an owned node tree
//! ([`dom::Document`]), the browsing context is a [`hash::Navigator`]
//! implementation, and external collections arrive through a
//! [`source::CollectionSource`]. The bundled binary drives the same engine
//! from the command line: HTML rendering, an HTTP preview, and a terminal
//! preview.
//!
//! ```no_run
//! use concertina::instance::{mount_collection_file, MountOptions};
//! use concertina::hash::MemoryNavigator;
//! use std::time::Instant;
//!
//! let (mut doc, mut accordion) = mount_collection_file(
//!     std::path::Path::new("items.json"),
//!     &[("data-initial-open".into(), "first".into())],
//!     MountOptions::default(),
//! )?;
//! let mut nav = MemoryNavigator::new();
//! accordion.user_toggle(&mut doc, &mut nav, "shipping", Instant::now());
//! # anyhow::Ok(())
//! ```

pub mod build;
pub mod config;
pub mod dom;
pub mod hash;
pub mod init;
pub mod initial;
pub mod instance;
pub mod item;
pub mod serve;
pub mod slug;
pub mod source;
pub mod state;
pub mod tui;

// Re-export commonly used types at crate root
pub use config::{Config, ConfigOverlay, InitialOpen, ItemLimit, Mode};
pub use dom::{Document, NodeId};
pub use hash::{HashSync, MemoryNavigator, Navigator};
pub use instance::{mount, Accordion, InstanceEvent, MountError, MountOptions};
pub use item::{Item, ItemContent};
pub use slug::IdRegistry;
pub use source::{Collection, CollectionItem, CollectionSource, FsCollectionSource, SourceError};
pub use state::{ItemState, StateChange, StateMachine};
