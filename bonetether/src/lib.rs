//! Bone-attachment core for VR pickups (host-agnostic).
//!
//! A held object searches the nearby humanoid skeletons for the bone it points
//! at, ranks (subject, bone) candidates incrementally, and on release freezes a
//! bone-relative offset into a replicated record that every participant uses
//! to keep the object on that bone. Rendering, rigging and networking belong
//! to the host, reached through [`Host`] and [`BoneReader`].

#![forbid(unsafe_code)]

mod attachment;
mod blocklist;
mod config;
mod error;
mod geometry;
mod heap;
mod host;
mod ids;
mod input;
mod pose;
mod reader;
mod registry;
mod scan;
mod search;
mod slots;
mod topology;

#[cfg(feature = "json")]
mod json;

pub use attachment::*;
pub use blocklist::*;
pub use config::*;
pub use error::*;
pub use geometry::*;
pub use heap::*;
pub use host::*;
pub use ids::*;
pub use input::*;
pub use pose::*;
pub use reader::*;
pub use registry::*;
pub use scan::*;
pub use search::*;
pub use slots::*;
pub use topology::*;

#[cfg(test)]
mod testing;



#[cfg(test)]
mod heap_tests;


#[cfg(test)]
mod search_tests;
