//! Package metadata: the records the host's metadata layer supplies, an
//! in-memory catalog implementing the lookup contract, and readers for
//! JSON files and the `meta.json` embedded in each package archive.

mod catalog;
mod json;
mod record;
mod var_meta;

pub use catalog::MetadataCatalog;
pub use json::read_json;
pub use record::{MetadataLookup, PackageMetadata};
pub use var_meta::{read_dependencies, read_var_meta, VarMeta};
