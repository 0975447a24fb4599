//! archdex - lookup of document-archive folders by contract number, phone,
//! address, or partial name.
//!
//! The storage root holds one folder per contract. Each folder carries its
//! attachments plus an `info.csv` descriptor. [`FolderIndex`] is built from
//! a full scan at startup and kept current by a [`Detector`] that polls the
//! root and reports added and removed folders over a best-effort channel.
//!
//! # Quick start
//!
//! ```no_run
//! use archdex::{Detector, FolderIndex, SharedIndex, StopHandle};
//! use archdex::channel::event_channel;
//! use archdex::index::KeyKind;
//!
//! let root = std::path::Path::new("/srv/archive");
//! let index = SharedIndex::new(FolderIndex::build(root, false).unwrap());
//!
//! let (tx, mut rx) = event_channel(1024);
//! let stop = StopHandle::new();
//! let detector = Detector::new(root, 1.0, false);
//! let watcher = {
//!     let stop = stop.clone();
//!     std::thread::spawn(move || detector.run(&tx, Some(&stop)))
//! };
//!
//! // Normally `archdex::shared::consume_events` drains the channel.
//! while let Some(event) = rx.try_recv() {
//!     index.apply(&event);
//! }
//!
//! for hit in index.search_by_key("0991234567", KeyKind::Phone) {
//!     println!("{}\t{}", hit.id, hit.name);
//! }
//!
//! stop.stop();
//! watcher.join().unwrap().unwrap();
//! ```

pub mod channel;
pub mod config;
pub mod descriptor;
pub mod detector;
pub mod error;
pub mod event;
pub mod index;
pub mod shared;
pub mod slug;
pub mod walker;

pub use config::Settings;
pub use descriptor::Descriptor;
pub use detector::{Detector, StopHandle};
pub use error::{Error, Result};
pub use event::{ChangeEvent, EventKind};
pub use index::FolderIndex;
pub use shared::SharedIndex;
