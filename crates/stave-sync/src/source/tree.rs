//! An in-memory catalog tree.
//!
//! Used as the result of a local library scan and as a scriptable source
//! in tests: nodes can be added and removed through a shared reference
//! while reconcilers hold it.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use stave_core::model::{EntityKind, NativeKey};

use crate::error::{SyncError, SyncResult};
use crate::source::{NodeFields, NodeHandle, Source, SourceNode};

#[derive(Debug)]
struct Slot {
    kind: EntityKind,
    native_key: Option<NativeKey>,
    fields: NodeFields,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// A source backed by an in-memory tree.
#[derive(Debug)]
pub struct TreeSource {
    name: String,
    slots: RwLock<Vec<Option<Slot>>>,
}

impl TreeSource {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: RwLock::new(Vec::new()),
        }
    }

    fn handle_for(index: usize) -> NodeHandle {
        NodeHandle::new(format!("tree:{index}"))
    }

    fn index_of(&self, handle: &NodeHandle) -> SyncResult<usize> {
        handle
            .as_str()
            .strip_prefix("tree:")
            .and_then(|i| i.parse().ok())
            .ok_or_else(|| SyncError::InvalidResponse {
                source_name: self.name.clone(),
                message: format!("not a tree handle: {handle}"),
            })
    }

    fn not_found(kind: EntityKind, key: impl ToString) -> SyncError {
        SyncError::EntityNotFound {
            kind,
            key: key.to_string(),
        }
    }

    fn snapshot(slots: &[Option<Slot>], index: usize) -> Option<SourceNode> {
        let slot = slots.get(index)?.as_ref()?;
        let mut fields = slot.fields.clone();
        if slot.kind != EntityKind::Track {
            fields.child_count = Some(slot.children.len() as u32);
        }
        Some(SourceNode {
            kind: slot.kind,
            handle: Self::handle_for(index),
            native_key: slot.native_key,
            fields,
        })
    }

    /// Add an artist at the top level.
    pub fn add_artist(&self, fields: NodeFields, native_key: Option<NativeKey>) -> NodeHandle {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.push(Some(Slot {
            kind: EntityKind::Artist,
            native_key,
            fields,
            parent: None,
            children: Vec::new(),
        }));
        Self::handle_for(slots.len() - 1)
    }

    /// Add an album under an artist or a track under an album.
    pub fn add_child(
        &self,
        parent: &NodeHandle,
        fields: NodeFields,
        native_key: Option<NativeKey>,
    ) -> SyncResult<NodeHandle> {
        let parent_index = self.index_of(parent)?;
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);

        let parent_kind = match slots.get(parent_index) {
            Some(Some(slot)) => slot.kind,
            _ => return Err(Self::not_found(EntityKind::Artist, parent)),
        };
        let kind = parent_kind.child().ok_or_else(|| SyncError::InvalidResponse {
            source_name: self.name.clone(),
            message: format!("{parent_kind} nodes cannot have children"),
        })?;

        let index = slots.len();
        slots.push(Some(Slot {
            kind,
            native_key,
            fields,
            parent: Some(parent_index),
            children: Vec::new(),
        }));
        if let Some(Some(slot)) = slots.get_mut(parent_index) {
            slot.children.push(index);
        }
        Ok(Self::handle_for(index))
    }

    /// Remove a node and its whole subtree. Returns `false` if the handle
    /// was unknown.
    pub fn remove(&self, handle: &NodeHandle) -> bool {
        let Ok(index) = self.index_of(handle) else {
            return false;
        };
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let Some(Some(removed)) = slots.get_mut(index).map(Option::take) else {
            return false;
        };

        if let Some(Some(parent)) = removed.parent.and_then(|p| slots.get_mut(p)) {
            parent.children.retain(|&c| c != index);
        }
        let mut pending = removed.children;
        while let Some(child) = pending.pop() {
            if let Some(Some(slot)) = slots.get_mut(child).map(Option::take) {
                pending.extend(slot.children);
            }
        }
        true
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Source for TreeSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_top_level(&self) -> SyncResult<Vec<SourceNode>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let artists = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.as_ref().is_some_and(|s| s.parent.is_none()))
            .filter_map(|(i, _)| Self::snapshot(&slots, i))
            .collect();
        Ok(artists)
    }

    async fn list_children(&self, node: &SourceNode) -> SyncResult<Vec<SourceNode>> {
        let index = self.index_of(&node.handle)?;
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let slot = slots
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| Self::not_found(node.kind, &node.handle))?;
        Ok(slot
            .children
            .iter()
            .filter_map(|&c| Self::snapshot(&slots, c))
            .collect())
    }

    async fn get_parent(&self, node: &SourceNode) -> SyncResult<Option<SourceNode>> {
        let index = self.index_of(&node.handle)?;
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let slot = slots
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| Self::not_found(node.kind, &node.handle))?;
        Ok(slot.parent.and_then(|p| Self::snapshot(&slots, p)))
    }

    async fn get_by_native_key(&self, kind: EntityKind, key: NativeKey) -> SyncResult<SourceNode> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .iter()
            .position(|slot| {
                slot.as_ref()
                    .is_some_and(|s| s.kind == kind && s.native_key == Some(key))
            })
            .and_then(|i| Self::snapshot(&slots, i))
            .ok_or_else(|| Self::not_found(kind, key))
    }
}
