//! Mount pipeline.
//!
//! ```text
//! latch(target, content)
//!   └─ resolve target (deferred while the document loads)
//!       └─ render content under a fresh root owner
//!           └─ sync effect: rendered nodes → target children
//! ```
//!
//! Teardown stops the sync effect, disposes the root owner (and with it
//! every descriptor rendered for this mount) and clears the target.

pub mod mount;

pub use mount::{latch, render_to_string, unlatch, MountHandle, Target};
