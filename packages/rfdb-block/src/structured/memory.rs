//! In-memory structured container.
//!
//! Nodes form a tree of `Arc<RwLock<MemoryNode>>`. Entries allocate through
//! the heap serializer and store the frozen region in their node at freeze
//! time, so nothing is copied between writing and reading back. A reader
//! built with `reconstitute` sees the same tree, including later writes.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{BlockError, Result};
use crate::path::PathElement;
use crate::region::{FrozenMemoryRegion, MutableMemoryRegion};
use crate::serializer::memory::allocate_aligned;
use crate::serializer::MappedSerializer;
use crate::structured::{DirectoryEntry, StructuredReconstituter, StructuredSerializer};

type NodeRef = Arc<RwLock<MemoryNode>>;

#[derive(Default)]
struct MemoryNode {
    region: Option<FrozenMemoryRegion>,
    children: BTreeMap<PathElement, NodeRef>,
}

fn read(node: &NodeRef) -> RwLockReadGuard<'_, MemoryNode> {
    node.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(node: &NodeRef) -> RwLockWriteGuard<'_, MemoryNode> {
    node.write().unwrap_or_else(PoisonError::into_inner)
}

fn child_context(context: &str, name: &PathElement) -> String {
    if context.ends_with('/') {
        format!("{}{}", context, name)
    } else {
        format!("{}/{}", context, name)
    }
}

fn get_or_create_child(node: &NodeRef, name: &PathElement) -> NodeRef {
    let mut guard = write(node);
    Arc::clone(guard.children.entry(name.clone()).or_default())
}

// ── Serializer ─────────────────────────────────────────────────────

/// Write side of an in-memory container.
#[derive(Clone)]
pub struct MemoryStructuredSerializer {
    node: NodeRef,
    context: String,
}

impl MemoryStructuredSerializer {
    /// Empty root node.
    pub fn new() -> Self {
        Self {
            node: NodeRef::default(),
            context: "memory:/".to_string(),
        }
    }

    /// Read view over the same tree.
    pub fn reconstitute(&self) -> MemoryStructuredReconstituter {
        MemoryStructuredReconstituter {
            node: Arc::clone(&self.node),
            context: self.context.clone(),
        }
    }
}

impl Default for MemoryStructuredSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuredSerializer for MemoryStructuredSerializer {
    fn new_entry(&self, name: &PathElement) -> Result<Box<dyn MappedSerializer>> {
        let context = child_context(&self.context, name);
        let child = get_or_create_child(&self.node, name);
        if read(&child).region.is_some() {
            return Err(BlockError::EntryExists(context));
        }
        Ok(Box::new(MemoryEntrySerializer {
            node: child,
            context,
        }))
    }

    fn new_structure(&self, name: &PathElement) -> Result<Arc<dyn StructuredSerializer>> {
        Ok(Arc::new(Self {
            node: get_or_create_child(&self.node, name),
            context: child_context(&self.context, name),
        }))
    }

    fn commit(&self) -> Result<()> {
        tracing::debug!(context = %self.context, "committing in-memory structure");
        Ok(())
    }
}

/// Single-region target that stores its frozen region in a node.
#[derive(Clone)]
struct MemoryEntrySerializer {
    node: NodeRef,
    context: String,
}

impl MappedSerializer for MemoryEntrySerializer {
    fn allocate_writable(
        &self,
        bytes_required: u64,
        alignment: usize,
    ) -> Result<MutableMemoryRegion> {
        allocate_aligned(bytes_required, alignment, Arc::new(self.clone()))
    }

    fn freeze(&self, region: MutableMemoryRegion) -> Result<FrozenMemoryRegion> {
        let frozen = region.into_shared_view();
        let mut node = write(&self.node);
        if node.region.is_some() {
            return Err(BlockError::EntryExists(self.context.clone()));
        }
        node.region = Some(frozen.clone());
        tracing::debug!(context = %self.context, length = frozen.len(), "stored region");
        Ok(frozen)
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }
}

// ── Reconstituter ──────────────────────────────────────────────────

/// Read side of an in-memory container.
#[derive(Clone)]
pub struct MemoryStructuredReconstituter {
    node: NodeRef,
    context: String,
}

impl MemoryStructuredReconstituter {
    fn child(&self, name: &PathElement) -> Result<NodeRef> {
        read(&self.node)
            .children
            .get(name)
            .cloned()
            .ok_or_else(|| BlockError::NotFound {
                context: self.context.clone(),
                name: name.to_string(),
            })
    }
}

impl From<&MemoryStructuredSerializer> for MemoryStructuredReconstituter {
    fn from(serializer: &MemoryStructuredSerializer) -> Self {
        serializer.reconstitute()
    }
}

impl StructuredReconstituter for MemoryStructuredReconstituter {
    fn get_context(&self) -> String {
        self.context.clone()
    }

    fn get_directory(&self) -> Result<Vec<DirectoryEntry>> {
        let node = read(&self.node);
        Ok(node
            .children
            .iter()
            .map(|(name, child)| {
                let child = read(child);
                DirectoryEntry {
                    name: name.clone(),
                    has_region: child.region.is_some(),
                    has_structure: !child.children.is_empty(),
                }
            })
            .collect())
    }

    fn get_region(&self, name: &PathElement) -> Result<FrozenMemoryRegion> {
        let child = self.child(name)?;
        let region = read(&child).region.clone();
        region.ok_or_else(|| BlockError::NotFound {
            context: self.context.clone(),
            name: name.to_string(),
        })
    }

    fn get_structure(&self, name: &PathElement) -> Result<Arc<dyn StructuredReconstituter>> {
        Ok(Arc::new(Self {
            node: self.child(name)?,
            context: child_context(&self.context, name),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use crate::structured::{StructuredReconstituterExt, StructuredSerializerExt};

    fn el(name: &str) -> PathElement {
        PathElement::new(name).unwrap()
    }

    #[test]
    fn test_region_stored_without_copy() {
        let store = MemoryStructuredSerializer::new();
        let entry = store.new_entry(&el("raw")).unwrap();
        let mut region = entry.allocate_writable(5, 1).unwrap();
        region.copy_from_slice(b"bytes");
        let frozen = region.freeze().unwrap();

        let stored = store.reconstitute().get_region(&el("raw")).unwrap();
        assert_eq!(stored.as_ptr(), frozen.as_ptr());
        assert_eq!(stored.data(), b"bytes");
    }

    #[test]
    fn test_second_region_under_same_name_rejected() {
        let store = MemoryStructuredSerializer::new();
        let region = FrozenMemoryRegion::from_vec(vec![1, 2, 3]);
        store.add_region(&region, &el("dup")).unwrap();
        assert!(matches!(
            store.add_region(&region, &el("dup")),
            Err(BlockError::EntryExists(ref ctx)) if ctx == "memory:/dup"
        ));
    }

    #[test]
    fn test_racing_entries_first_freeze_wins() {
        let store = MemoryStructuredSerializer::new();
        let first = store.new_entry(&el("slot")).unwrap();
        let second = store.new_entry(&el("slot")).unwrap();
        first.copy(&FrozenMemoryRegion::from_vec(vec![1])).unwrap();
        assert!(matches!(
            second.copy(&FrozenMemoryRegion::from_vec(vec![2])),
            Err(BlockError::EntryExists(_))
        ));
        let stored = store.reconstitute().get_region(&el("slot")).unwrap();
        assert_eq!(stored.data(), &[1]);
    }

    #[test]
    fn test_directory_listing() {
        let store = MemoryStructuredSerializer::new();
        store.add_region(&FrozenMemoryRegion::from_vec(vec![0]), &el("b")).unwrap();
        store.new_object(&el("b"), &42u32).unwrap();
        store
            .new_structure(&el("a"))
            .unwrap()
            .add_region(&FrozenMemoryRegion::from_vec(vec![1]), &el("x"))
            .unwrap();

        let dir = store.reconstitute().get_directory().unwrap();
        assert_eq!(
            dir,
            vec![
                DirectoryEntry { name: el("a"), has_region: false, has_structure: true },
                DirectoryEntry { name: el("b"), has_region: true, has_structure: true },
            ]
        );
    }

    #[test]
    fn test_missing_names_report_context() {
        let store = MemoryStructuredSerializer::new();
        store.new_structure(&el("a")).unwrap();
        let reader = store.reconstitute();
        let err = reader
            .get_region_recursive(&Path::parse("a/missing").unwrap())
            .unwrap_err();
        match err {
            BlockError::NotFound { context, name } => {
                assert_eq!(context, "memory:/a");
                assert_eq!(name, "missing");
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_reader_sees_later_writes() {
        let store = MemoryStructuredSerializer::new();
        let reader = MemoryStructuredReconstituter::from(&store);
        assert!(reader.get_region(&el("late")).is_err());
        store.add_region(&FrozenMemoryRegion::from_static(b"now"), &el("late")).unwrap();
        assert_eq!(reader.get_region(&el("late")).unwrap().data(), b"now");
        assert!(reader.get_metadata::<u32>(&el("late")).is_err());
        assert!(store.commit().is_ok());
    }
}
