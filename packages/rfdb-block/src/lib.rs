//! RFDB block layer.
//!
//! Raw bytes are allocated, memory-mapped, shared and organized into a
//! navigable hierarchy so in-memory structures can be frozen into a portable
//! binary form and reconstituted later without copying.
//!
//! ```text
//! MappedSerializer ──allocate_writable──► MutableMemoryRegion
//!        ▲                                       │ freeze()
//!        │ new_entry(name)                       ▼
//! StructuredSerializer ──add_region──► FrozenMemoryRegion ◄── map_file()
//!                                                │
//! StructuredReconstituter ──get_region/get_stream─┘ (RegionReader)
//! ```
//!
//! # Usage
//!
//! ```
//! use rfdb_block::{
//!     FrozenMemoryRegion, MemoryStructuredSerializer, Path, PathElement,
//!     StructuredReconstituter, StructuredReconstituterExt, StructuredSerializer,
//!     StructuredSerializerExt,
//! };
//!
//! let store = MemoryStructuredSerializer::new();
//! let ids = PathElement::new("ids").unwrap();
//! store.add_region(&FrozenMemoryRegion::from_vec(vec![1, 2, 3]), &ids).unwrap();
//! store.new_object(&ids, &vec!["u8"]).unwrap();
//!
//! let reader = store.reconstitute();
//! let region = reader.get_region_recursive(&Path::parse("ids").unwrap()).unwrap();
//! assert_eq!(region.data(), &[1, 2, 3]);
//! let dtype: Vec<String> = reader.get_metadata(&ids).unwrap();
//! assert_eq!(dtype, vec!["u8"]);
//! ```

pub mod error;
pub mod mapping;
pub mod path;
pub mod region;
pub mod serializer;
pub mod stream;
pub mod structured;

pub use error::{BlockError, Result};
pub use mapping::{map_file, map_file_with, page_size, AccessPattern, Location, MapConfig};
pub use path::{Path, PathElement, METADATA_ENTRY};
pub use region::{
    FrozenMemoryRegion, FrozenMemoryRegionT, MutableMemoryRegion, MutableMemoryRegionT,
    OwnershipHandle, PlainData,
};
pub use serializer::{MappedSerializer, MappedSerializerExt, MemorySerializer};
pub use stream::{RegionReader, SerializerStream};
pub use structured::{
    DirectoryEntry, MemoryStructuredReconstituter, MemoryStructuredSerializer,
    StructuredReconstituter, StructuredReconstituterExt, StructuredSerializer,
    StructuredSerializerExt,
};
