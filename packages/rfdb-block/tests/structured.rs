//! Integration test: structured containers and typed metadata.
//!
//! Validates that:
//! - A region and its metadata object can share one name and both read back
//! - Recursive accessors walk paths and reject the empty path
//! - Streams obtained from a container seek over the stored bytes
//! - Containers can be filled from mapped files without losing bytes

use std::io::{Read, Seek, SeekFrom, Write};

use rfdb_block::{
    map_file, BlockError, FrozenMemoryRegion, Location, MappedSerializer,
    MemoryStructuredSerializer, Path, PathElement, StructuredReconstituter,
    StructuredReconstituterExt, StructuredSerializer, StructuredSerializerExt,
};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ColumnInfo {
    dtype: String,
    count: u64,
}

fn el(name: &str) -> PathElement {
    PathElement::new(name).unwrap()
}

fn path(s: &str) -> Path {
    Path::parse(s).unwrap()
}

// ---------------------------------------------------------------------------
// Tests: round trip
// ---------------------------------------------------------------------------

#[test]
fn region_and_metadata_share_a_name() {
    let store = MemoryStructuredSerializer::new();
    let columns = store.new_structure(&el("a")).unwrap();
    columns
        .add_region(&FrozenMemoryRegion::from_static(b"0123456789"), &el("b"))
        .unwrap();
    let info = ColumnInfo { dtype: "u8".into(), count: 10 };
    columns.new_object(&el("b"), &info).unwrap();
    store.commit().unwrap();

    let reader = store.reconstitute();
    let region = reader.get_region_recursive(&path("a/b")).unwrap();
    assert_eq!(region.data(), b"0123456789");

    let a = reader.get_structure(&el("a")).unwrap();
    let read_back: ColumnInfo = a.get_metadata(&el("b")).unwrap();
    assert_eq!(read_back, info);

    let mut filled = ColumnInfo { dtype: String::new(), count: 0 };
    reader
        .get_structure_recursive(&path("a/b"))
        .unwrap()
        .get_object_helper(&el("md"), &mut filled)
        .unwrap();
    assert_eq!(filled, info);

    let raw = reader.get_region_recursive(&path("a/b/md")).unwrap();
    let decoded: serde_json::Value = serde_json::from_slice(raw.data()).unwrap();
    assert_eq!(decoded["dtype"], "u8");
}

#[test]
fn entry_written_through_stream() {
    let store = MemoryStructuredSerializer::new();
    let entry = store.new_entry(&el("log")).unwrap();
    {
        let mut stream = entry.get_stream();
        stream.write_all(b"line one\nline two\n").unwrap();
        let frozen = stream.close().unwrap();
        assert_eq!(frozen.len(), 18);
    }

    let mut reader = store.reconstitute().get_stream(&el("log")).unwrap();
    assert_eq!(reader.name(), "log");
    let mut text = String::new();
    reader.read_to_string(&mut text).unwrap();
    assert_eq!(text, "line one\nline two\n");
}

#[test]
fn mapped_file_copied_into_container() {
    let mut file = NamedTempFile::new().unwrap();
    let contents: Vec<u8> = (0..20_000u32).map(|i| (i % 97) as u8).collect();
    file.write_all(&contents).unwrap();
    file.flush().unwrap();

    let mapped = map_file(&Location::from(file.path()), 123, None).unwrap();
    let store = MemoryStructuredSerializer::new();
    store
        .new_structure(&el("segments"))
        .unwrap()
        .add_region(&mapped, &el("0"))
        .unwrap();
    drop(mapped);
    drop(file);

    let stored = store
        .reconstitute()
        .get_region_recursive(&path("segments/0"))
        .unwrap();
    assert_eq!(stored.data(), &contents[123..]);
}

// ---------------------------------------------------------------------------
// Tests: streams
// ---------------------------------------------------------------------------

#[test]
fn stream_seek_then_read_returns_suffix() {
    let bytes: Vec<u8> = (0..=255u8).collect();
    let store = MemoryStructuredSerializer::new();
    store
        .new_structure(&el("x"))
        .unwrap()
        .add_region(&FrozenMemoryRegion::from_vec(bytes.clone()), &el("y"))
        .unwrap();
    let reader = store.reconstitute();

    for p in [0u64, 1, 100, 255, 256] {
        let mut stream = reader.get_stream_recursive(&path("x/y")).unwrap();
        stream.seek(SeekFrom::Start(p)).unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, &bytes[p as usize..], "seek to {}", p);
    }
}

// ---------------------------------------------------------------------------
// Tests: errors
// ---------------------------------------------------------------------------

#[test]
fn empty_path_rejected_by_recursive_accessors() {
    let reader = MemoryStructuredSerializer::new().reconstitute();
    let empty = path("");
    assert!(empty.is_empty());

    assert!(matches!(
        reader.get_region_recursive(&empty),
        Err(BlockError::InvalidArgument(_))
    ));
    assert!(matches!(
        reader.get_stream_recursive(&empty),
        Err(BlockError::InvalidArgument(_))
    ));
    assert!(matches!(
        reader.get_structure_recursive(&empty),
        Err(BlockError::InvalidArgument(_))
    ));
}

#[test]
fn malformed_metadata_is_json_error() {
    let store = MemoryStructuredSerializer::new();
    store.new_object_bytes(&el("col"), b"{not json").unwrap();
    let err = store
        .reconstitute()
        .get_metadata::<ColumnInfo>(&el("col"))
        .unwrap_err();
    assert!(matches!(err, BlockError::Json(_)), "got {:?}", err);
}

#[test]
fn missing_structure_is_not_found() {
    let store = MemoryStructuredSerializer::new();
    store.new_structure(&el("a")).unwrap();
    let err = store
        .reconstitute()
        .get_structure_recursive(&path("a/b/c"))
        .err()
        .unwrap();
    assert!(matches!(err, BlockError::NotFound { ref name, .. } if name == "b"));
    assert_eq!(err.status(), 404);
}

#[test]
fn nested_structures_have_context() {
    let store = MemoryStructuredSerializer::new();
    store
        .new_structure(&el("a"))
        .unwrap()
        .new_structure(&el("b"))
        .unwrap()
        .add_region(&FrozenMemoryRegion::from_static(b"z"), &el("c"))
        .unwrap();

    let nested = store
        .reconstitute()
        .get_structure_recursive(&path("a/b"))
        .unwrap();
    assert_eq!(nested.get_context(), "memory:/a/b");
    let names: Vec<String> = nested
        .get_directory()
        .unwrap()
        .into_iter()
        .map(|e| e.name.to_string())
        .collect();
    assert_eq!(names, vec!["c"]);
}
