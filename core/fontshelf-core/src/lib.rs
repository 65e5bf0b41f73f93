//! fontshelf-core: a tidy shelf for fonts, and the fonts your subtitles ask for
//!
//! Two pipelines share one index file and otherwise never meet.
//!
//! ## Building the shelf
//!
//! - [`container`] splits `ttcf` collections into standalone faces and fixes
//!   each face's `head` checksum
//! - [`identity`] reads family, subfamily and version per locale from `name`
//! - [`version`] decides whether a new face replaces the one already stored
//! - [`store`] is the family → subfamily → path index, loaded once, saved once
//! - [`catalog`] drives all of the above over a source tree
//!
//! ## Dressing the subtitles
//!
//! - [`encoding`] turns subtitle bytes into text, BOM or not
//! - [`subtitle`] walks the script's sections and override tags and lists
//!   every `(font, bold, italic)` it meets
//! - [`resolve`] maps those onto stored faces through the style fallback chain
//! - [`link`] puts symlinks in place, leaving correct ones and real files alone
//! - [`install`] drives all of the above over a target tree
//!
//! [`validate`] cross-checks the index against storage; [`output`] writes the
//! JSON and missing-font reports.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use fontshelf_core::catalog::{build_catalog, BuildOptions};
//! use fontshelf_core::install::{install, InstallOptions};
//! use fontshelf_core::link::platform_links;
//!
//! let built = build_catalog(Path::new("source"), &BuildOptions::new("storage"))?;
//! println!("{} families on the shelf", built.families);
//!
//! let links = platform_links();
//! let report = install(Path::new("anime"), &InstallOptions::new("storage"), links.as_ref())?;
//! for key in report.missing.keys() {
//!     println!("missing: {key}");
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Crafted with care at FontLab https://www.fontlab.com/

pub mod catalog;
pub mod container;
pub mod discovery;
pub mod encoding;
pub mod error;
pub mod identity;
pub mod install;
pub mod link;
pub mod output;
pub mod resolve;
pub mod store;
pub mod subtitle;
pub mod validate;
pub mod version;

pub use error::{ShelfError, ShelfResult};
pub use identity::FontIdentity;
pub use store::IndexStore;
pub use subtitle::FontRequirement;
