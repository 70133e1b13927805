//! Instance partitioning: N independent copies of one state shape, addressed
//! by canvas id, sharing one reducer.
//!
//! Instances are held behind `Arc` and written through `Arc::make_mut`, so a
//! dispatch that targets canvas A leaves every other instance pointer-equal
//! to what it was before. Consumers can compare with `Arc::ptr_eq` to skip
//! work.
//!
//! Two layouts exist because the persisted shapes differ:
//! - [`InstanceMap`]: object keyed by id (`{ "<id>": { ... } }`);
//! - [`InstanceList`]: array of records that carry their id (`[{ "canvasId": ... }]`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use studio_core::CanvasId;

/// A per-canvas record that knows its own id.
pub trait Keyed: Clone {
    fn key(&self) -> CanvasId;
    fn set_key(&mut self, id: CanvasId);
}

/// Lookup, insert, delete and rename over a keyed collection of instances.
pub trait InstanceTable<S: Keyed> {
    fn get_arc(&self, id: CanvasId) -> Option<&Arc<S>>;
    fn get_mut(&mut self, id: CanvasId) -> Option<&mut S>;
    /// Insert or replace the instance stored under `instance.key()`.
    fn insert(&mut self, instance: S);
    fn remove(&mut self, id: CanvasId) -> Option<Arc<S>>;
    fn ids(&self) -> Vec<CanvasId>;

    fn get(&self, id: CanvasId) -> Option<&S> {
        self.get_arc(id).map(Arc::as_ref)
    }

    fn contains(&self, id: CanvasId) -> bool {
        self.get_arc(id).is_some()
    }

    fn len(&self) -> usize {
        self.ids().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move the instance under `from` to `to`, keeping every other field.
    /// Refuses (returns `false`) when `from` is absent or `to` is taken.
    fn rekey(&mut self, from: CanvasId, to: CanvasId) -> bool {
        if from == to || !self.contains(from) || self.contains(to) {
            return false;
        }
        let Some(instance) = self.remove(from) else {
            return false;
        };
        let mut instance = Arc::unwrap_or_clone(instance);
        instance.set_key(to);
        self.insert(instance);
        true
    }
}

/// Apply `reduce` to the instance under `id`. An unknown id is a silent
/// no-op (the canvas may have been deleted while the action was in flight).
pub fn apply<S, T, F>(table: &mut T, id: CanvasId, reduce: F) -> bool
where
    S: Keyed,
    T: InstanceTable<S> + ?Sized,
    F: FnOnce(&mut S),
{
    match table.get_mut(id) {
        Some(instance) => {
            reduce(instance);
            true
        }
        None => {
            log::debug!("no instance for canvas {id}, dropping update");
            false
        }
    }
}

// ─── Map layout ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "S: Serialize", deserialize = "S: Deserialize<'de>"))]
#[serde(transparent)]
pub struct InstanceMap<S>(BTreeMap<CanvasId, Arc<S>>);

impl<S> Default for InstanceMap<S> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<S: Keyed> InstanceMap<S> {
    pub fn iter(&self) -> impl Iterator<Item = (&CanvasId, &S)> {
        self.0.iter().map(|(k, v)| (k, v.as_ref()))
    }
}

impl<S: Keyed> InstanceTable<S> for InstanceMap<S> {
    fn get_arc(&self, id: CanvasId) -> Option<&Arc<S>> {
        self.0.get(&id)
    }

    fn get_mut(&mut self, id: CanvasId) -> Option<&mut S> {
        self.0.get_mut(&id).map(Arc::make_mut)
    }

    fn insert(&mut self, instance: S) {
        self.0.insert(instance.key(), Arc::new(instance));
    }

    fn remove(&mut self, id: CanvasId) -> Option<Arc<S>> {
        self.0.remove(&id)
    }

    fn ids(&self) -> Vec<CanvasId> {
        self.0.keys().copied().collect()
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

// ─── List layout ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "S: Serialize", deserialize = "S: Deserialize<'de>"))]
#[serde(transparent)]
pub struct InstanceList<S>(Vec<Arc<S>>);

impl<S> Default for InstanceList<S> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<S: Keyed> InstanceList<S> {
    fn position(&self, id: CanvasId) -> Option<usize> {
        self.0.iter().position(|s| s.key() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.0.iter().map(Arc::as_ref)
    }
}

impl<S: Keyed> InstanceTable<S> for InstanceList<S> {
    fn get_arc(&self, id: CanvasId) -> Option<&Arc<S>> {
        self.0.iter().find(|s| s.key() == id)
    }

    fn get_mut(&mut self, id: CanvasId) -> Option<&mut S> {
        let idx = self.position(id)?;
        Some(Arc::make_mut(&mut self.0[idx]))
    }

    fn insert(&mut self, instance: S) {
        match self.position(instance.key()) {
            Some(idx) => self.0[idx] = Arc::new(instance),
            None => self.0.push(Arc::new(instance)),
        }
    }

    fn remove(&mut self, id: CanvasId) -> Option<Arc<S>> {
        let idx = self.position(id)?;
        Some(self.0.remove(idx))
    }

    fn ids(&self) -> Vec<CanvasId> {
        self.0.iter().map(|s| s.key()).collect()
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Brush {
        canvas_id: CanvasId,
        width: u32,
    }

    impl Keyed for Brush {
        fn key(&self) -> CanvasId {
            self.canvas_id
        }
        fn set_key(&mut self, id: CanvasId) {
            self.canvas_id = id;
        }
    }

    fn brush(id: &str, width: u32) -> Brush {
        Brush {
            canvas_id: CanvasId::intern(id),
            width,
        }
    }

    fn exercise<T: InstanceTable<Brush> + Default>() {
        let (a, b) = (CanvasId::intern("part_a"), CanvasId::intern("part_b"));
        let mut table = T::default();
        table.insert(brush("part_a", 1));
        table.insert(brush("part_b", 2));
        assert_eq!(table.len(), 2);

        let b_before = Arc::clone(table.get_arc(b).unwrap());
        assert!(apply(&mut table, a, |s: &mut Brush| s.width = 10));
        assert_eq!(table.get(a).unwrap().width, 10);
        assert!(Arc::ptr_eq(&b_before, table.get_arc(b).unwrap()));

        assert!(!apply(&mut table, CanvasId::intern("part_gone"), |s: &mut Brush| s.width = 0));

        let c = CanvasId::intern("part_c");
        assert!(table.rekey(a, c));
        assert!(!table.contains(a));
        assert_eq!(table.get(c), Some(&brush("part_c", 10)));
        assert!(!table.rekey(a, c), "second rekey is a no-op");
        assert!(!table.rekey(b, c), "target already taken");

        assert!(table.remove(b).is_some());
        assert_eq!(table.ids(), vec![c]);
    }

    #[test]
    fn map_layout() {
        exercise::<InstanceMap<Brush>>();
    }

    #[test]
    fn list_layout() {
        exercise::<InstanceList<Brush>>();
    }

    #[test]
    fn serialized_shapes() {
        let mut map = InstanceMap::default();
        map.insert(brush("ser_x", 3));
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json, serde_json::json!({ "ser_x": { "canvasId": "ser_x", "width": 3 } }));

        let mut list = InstanceList::default();
        list.insert(brush("ser_x", 3));
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json, serde_json::json!([{ "canvasId": "ser_x", "width": 3 }]));
        let back: InstanceList<Brush> = serde_json::from_value(json).unwrap();
        assert_eq!(back, list);
    }
}
