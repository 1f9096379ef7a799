//! Wire scene format: a JSON index tree over an offset-addressed blob.
//!
//! - [`Element`] - index tree node
//! - [`BlobWriter`] / [`BlobReader`] - companion binary file
//! - [`Encoder`] / [`write_scene`] - scene to index + blob
//! - [`SceneDecoder`] / [`load_scene`] - index + blob to scene
//! - [`apply_material`] / [`apply_volume`] - live edits

mod blob;
mod decode;
mod encode;
pub mod format;
mod index;
mod material;
mod text;

pub use blob::*;
pub use decode::*;
pub use encode::*;
pub use index::*;
pub use material::*;
pub use text::*;
