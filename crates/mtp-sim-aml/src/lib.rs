// crates/mtp-sim-aml/src/lib.rs

#![doc = "Parses AutomationML module descriptors into the `mtp-sim` node model."]
#![doc = ""]
#![doc = "It supports:"]
#![doc = "- `parse`: a single descriptor document held in memory."]
#![doc = "- `parse_file`: a `.aml`/`.xml` document or a `.mtp`/`.amlx` archive on disk."]
#![doc = "- `parse_bytes`: the same dispatch for uploaded content."]
#![doc = ""]
#![doc = "Every variable found is appended as a leaf of one flat root folder."]

// --- Crate Modules ---

mod document;
mod error;
mod parser;

// --- Public API Re-exports ---

pub use error::AmlError;
pub use parser::{
    ARCHIVE_EXTENSIONS, DOCUMENT_EXTENSIONS, UA_ITEM_MARKER, parse, parse_bytes, parse_file,
};
