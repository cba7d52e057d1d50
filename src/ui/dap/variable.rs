//! `variablesReference` bookkeeping.
//!
//! DAP passes one 32-bit-safe integer around; the adapter needs it to name
//! `(scope kind, instance, stack index, logical path)`. A registry mints
//! small integers and remembers the tuple behind each one, plus the
//! parent link needed to rebuild a full dotted name for `setVariable`.

use std::collections::HashMap;

/// Which flat map a nested path lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubKind {
    Local,
    Generator,
}

/// Scope kind of a reference.
#[derive(Debug, Clone, PartialEq)]
pub enum VarKind {
    Local,
    Generator,
    /// Simulator-global values (`Time`).
    Global,
    /// A sub-object at `path` inside one of the flat maps.
    Nested { path: String, sub: SubKind },
}

impl VarKind {
    pub fn sub_kind(&self) -> SubKind {
        match self {
            VarKind::Local => SubKind::Local,
            VarKind::Generator => SubKind::Generator,
            VarKind::Global => SubKind::Local,
            VarKind::Nested { sub, .. } => *sub,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VarHandle {
    pub kind: VarKind,
    /// Composite instance id.
    pub instance_id: u64,
    pub stack_index: usize,
}

/// Mints `variablesReference` integers. References are only meaningful
/// until the next stop, but stale ones simply resolve to stale handles,
/// which DAP permits.
#[derive(Default)]
pub struct ReferenceRegistry {
    next: i64,
    handles: HashMap<i64, VarHandle>,
    /// `reference -> (parent reference, raw path segment)`.
    parents: HashMap<i64, (i64, String)>,
}

impl ReferenceRegistry {
    /// Mint a reference for a top-level scope of one frame.
    pub fn insert_scope(&mut self, kind: VarKind, instance_id: u64, stack_index: usize) -> i64 {
        self.insert(VarHandle {
            kind,
            instance_id,
            stack_index,
        })
    }

    /// Mint a reference for a compound child, remembering its parent.
    pub fn insert_child(&mut self, parent: i64, raw_segment: &str, path: String) -> Option<i64> {
        let parent_handle = self.get(parent)?.clone();
        let handle = VarHandle {
            kind: VarKind::Nested {
                path,
                sub: parent_handle.kind.sub_kind(),
            },
            instance_id: parent_handle.instance_id,
            stack_index: parent_handle.stack_index,
        };
        let reference = self.insert(handle);
        self.parents
            .insert(reference, (parent, raw_segment.to_string()));
        Some(reference)
    }

    pub fn get(&self, reference: i64) -> Option<&VarHandle> {
        self.handles.get(&reference)
    }

    /// Rebuild the full dotted name of `child_segment` under `reference`
    /// by walking the parent chain up to the scope root.
    pub fn full_name(&self, reference: i64, child_segment: &str) -> String {
        let mut segments = vec![child_segment.to_string()];
        let mut current = reference;
        while let Some((parent, segment)) = self.parents.get(&current) {
            segments.push(segment.clone());
            current = *parent;
        }
        segments.reverse();
        segments.join(".")
    }

    fn insert(&mut self, handle: VarHandle) -> i64 {
        // 0 is DAP's "not expandable" marker, never mint it.
        self.next += 1;
        let reference = self.next;
        self.handles.insert(reference, handle);
        reference
    }
}

/// DAP stack frame id: stack index in the lower 13 bits, the composite
/// instance id above. Frame counts never come close to 2^13 scopes, and
/// instance ids fit the remaining 53-bit-safe headroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameId {
    pub instance_id: u64,
    pub stack_index: usize,
}

impl FrameId {
    const STACK_BITS: u32 = 13;

    pub fn pack(self) -> i64 {
        ((self.instance_id << Self::STACK_BITS) | self.stack_index as u64) as i64
    }

    pub fn unpack(packed: i64) -> Self {
        let packed = packed as u64;
        Self {
            instance_id: packed >> Self::STACK_BITS,
            stack_index: (packed & ((1 << Self::STACK_BITS) - 1)) as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_round_trip() {
        for instance_id in [0u64, 1, 7, 0xFFFF, 1 << 39, (1 << 40) - 1] {
            for stack_index in [0usize, 1, 5, (1 << 13) - 1] {
                let id = FrameId {
                    instance_id,
                    stack_index,
                };
                assert_eq!(FrameId::unpack(id.pack()), id);
            }
        }
    }

    #[test]
    fn test_parent_chain_reconstruction() {
        let mut registry = ReferenceRegistry::default();
        let scope = registry.insert_scope(VarKind::Local, 1, 0);
        let a = registry
            .insert_child(scope, "a", "a".to_string())
            .unwrap();
        let a0 = registry
            .insert_child(a, "0", "a.0".to_string())
            .unwrap();

        assert_eq!(registry.full_name(a0, "b"), "a.0.b");
        assert_eq!(registry.full_name(scope, "x"), "x");
    }

    #[test]
    fn test_child_inherits_scope() {
        let mut registry = ReferenceRegistry::default();
        let scope = registry.insert_scope(VarKind::Generator, 42, 1);
        let child = registry
            .insert_child(scope, "cfg", "cfg".to_string())
            .unwrap();

        let handle = registry.get(child).unwrap();
        assert_eq!(handle.instance_id, 42);
        assert_eq!(handle.stack_index, 1);
        assert!(matches!(
            &handle.kind,
            VarKind::Nested {
                sub: SubKind::Generator,
                ..
            }
        ));
    }
}
