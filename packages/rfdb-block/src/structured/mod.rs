//! Hierarchical, path-addressed containers of regions.
//!
//! A structured container is a tree. Each node may hold a raw region payload
//! and named children at the same time; typed metadata for an entry `name`
//! lives in the child region `name/md`, encoded as JSON:
//!
//! ```text
//! root
//! ├── columns            (structure)
//! │   ├── ids            (region: raw u128 column)
//! │   │   └── md         (region: {"count":1000,"dtype":"u128"})
//! │   └── names          (region)
//! └── manifest
//!     └── md             (region: JSON)
//! ```
//!
//! Backings implement the object-safe `StructuredSerializer` /
//! `StructuredReconstituter` primitives; region copying, recursive lookups,
//! streams and JSON objects are built on top of them.

pub mod memory;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BlockError, Result};
use crate::path::{Path, PathElement};
use crate::region::FrozenMemoryRegion;
use crate::serializer::MappedSerializer;
use crate::stream::RegionReader;

pub use memory::{MemoryStructuredReconstituter, MemoryStructuredSerializer};

// ── Write side ─────────────────────────────────────────────────────

/// Write side of a structured container.
pub trait StructuredSerializer: Send + Sync {
    /// Single-region target for `name`. The region frozen through it becomes
    /// the payload of `name`.
    fn new_entry(&self, name: &PathElement) -> Result<Box<dyn MappedSerializer>>;

    /// Child structure `name`, created if it does not exist yet.
    fn new_structure(&self, name: &PathElement) -> Result<Arc<dyn StructuredSerializer>>;

    /// Finalize everything written so far.
    fn commit(&self) -> Result<()>;

    /// Copy `region` byte-for-byte into the entry `name`.
    fn add_region(&self, region: &FrozenMemoryRegion, name: &PathElement) -> Result<()> {
        self.new_entry(name)?.copy(region)?;
        Ok(())
    }

    /// Store already-encoded metadata under `name/md`.
    fn new_object_bytes(&self, name: &PathElement, encoded: &[u8]) -> Result<()> {
        let entry = self
            .new_structure(name)?
            .new_entry(&PathElement::metadata())?;
        let mut serialize_to = entry.allocate_writable(encoded.len() as u64, 1 /* alignment */)?;
        serialize_to.data_mut()[..encoded.len()].copy_from_slice(encoded);
        serialize_to.freeze()?;
        Ok(())
    }
}

/// Typed-object helpers for every `StructuredSerializer`.
pub trait StructuredSerializerExt: StructuredSerializer {
    /// Serialize `value` as JSON under `name/md`.
    fn new_object<T: Serialize + ?Sized>(&self, name: &PathElement, value: &T) -> Result<()> {
        let printed = serde_json::to_vec(value)?;
        self.new_object_bytes(name, &printed)
    }
}

impl<S: StructuredSerializer + ?Sized> StructuredSerializerExt for S {}

// ── Read side ──────────────────────────────────────────────────────

/// One child of a structure, as listed by `get_directory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: PathElement,
    /// A region payload is stored under this name.
    pub has_region: bool,
    /// The name has children of its own.
    pub has_structure: bool,
}

/// Read side of a structured container.
pub trait StructuredReconstituter: Send + Sync {
    /// Human-readable description of this node, used in errors.
    fn get_context(&self) -> String;

    /// Children of this node, sorted by name.
    fn get_directory(&self) -> Result<Vec<DirectoryEntry>>;

    /// Region payload stored under `name`.
    fn get_region(&self, name: &PathElement) -> Result<FrozenMemoryRegion>;

    /// Child structure `name`, shared with this node.
    fn get_structure(&self, name: &PathElement) -> Result<Arc<dyn StructuredReconstituter>>;

    fn get_region_recursive(&self, path: &Path) -> Result<FrozenMemoryRegion> {
        let head = require_head(path, "get_region_recursive")?;
        if path.len() == 1 {
            return self.get_region(head);
        }
        self.get_structure(head)?.get_region_recursive(&path.tail())
    }

    /// Seekable stream over the region `name`.
    fn get_stream(&self, name: &PathElement) -> Result<RegionReader> {
        Ok(RegionReader::named(self.get_region(name)?, name.as_str()))
    }

    fn get_stream_recursive(&self, path: &Path) -> Result<RegionReader> {
        let head = require_head(path, "get_stream_recursive")?;
        if path.len() == 1 {
            return self.get_stream(head);
        }
        self.get_structure(head)?.get_stream_recursive(&path.tail())
    }

    /// Walk `path` one structure at a time; intermediate nodes are dropped.
    fn get_structure_recursive(&self, path: &Path) -> Result<Arc<dyn StructuredReconstituter>> {
        let head = require_head(path, "get_structure_recursive")?;
        let mut current = self.get_structure(head)?;
        for element in path.iter().skip(1) {
            current = current.get_structure(element)?;
        }
        Ok(current)
    }
}

fn require_head<'a>(path: &'a Path, accessor: &str) -> Result<&'a PathElement> {
    path.head()
        .ok_or_else(|| BlockError::invalid_argument(format!("{} requires a non-empty path", accessor)))
}

/// Typed-object helpers for every `StructuredReconstituter`.
pub trait StructuredReconstituterExt: StructuredReconstituter {
    /// Parse the region `name` as JSON into `out`.
    fn get_object_helper<T: DeserializeOwned>(&self, name: &PathElement, out: &mut T) -> Result<()> {
        let entry = self.get_region(name)?;
        *out = serde_json::from_slice(entry.data())?;
        Ok(())
    }

    /// Parse the region `name` as JSON.
    fn get_object<T: DeserializeOwned>(&self, name: &PathElement) -> Result<T> {
        let entry = self.get_region(name)?;
        Ok(serde_json::from_slice(entry.data())?)
    }

    /// Parse the metadata written by `new_object(name, ..)`, i.e. `name/md`.
    fn get_metadata<T: DeserializeOwned>(&self, name: &PathElement) -> Result<T> {
        self.get_structure(name)?.get_object(&PathElement::metadata())
    }
}

impl<S: StructuredReconstituter + ?Sized> StructuredReconstituterExt for S {}
