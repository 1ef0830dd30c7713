//! Live/retired registry for one kind of traced object.
//!
//! Objects live in an arena owned by the set and are referred to by
//! [`Handle`]s. The active map holds at most one handle per [`ObjectKey`];
//! anything displaced by reuse, destroy or end-of-trace lands in the
//! retired list with its history intact.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use tracing::debug;

use super::key::ObjectKey;
use super::session::{ObjectKind, Session};
use crate::tracer::event::{Event, EventId};

/// Behavior every object kind stored in a [`LiveSet`] provides.
pub trait TraceObject {
    const KIND: ObjectKind;
    /// Event that starts a fresh instance at its key. Kinds without one are
    /// only ever created on first reference.
    const CREATE_EVENT: Option<EventId>;
    /// Event that retires the instance at its key, if the kind has one.
    const DESTROY_EVENT: Option<EventId>;

    fn new(key: ObjectKey, id: u64) -> Self;

    /// Sequence id assigned at construction.
    fn id(&self) -> u64;
}

/// Index of an object inside the [`LiveSet`] that created it.
pub struct Handle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    pub fn index(self) -> usize {
        self.index
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

/// Registry of active and retired objects of one kind.
pub struct LiveSet<T> {
    objects: Vec<T>,
    active: HashMap<ObjectKey, Handle<T>>,
    retired: Vec<Handle<T>>,
}

impl<T: TraceObject> LiveSet<T> {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            active: HashMap::new(),
            retired: Vec::new(),
        }
    }

    fn create(&mut self, key: ObjectKey, session: &mut Session) -> Handle<T> {
        let handle = Handle::new(self.objects.len());
        self.objects.push(T::new(key, session.next_id(T::KIND)));
        self.active.insert(key, handle);
        handle
    }

    fn retire(&mut self, key: &ObjectKey) -> Option<Handle<T>> {
        let handle = self.active.remove(key)?;
        self.retired.push(handle);
        Some(handle)
    }

    /// Looks up the active object at `key` without mutating the set.
    pub fn find_active(&self, key: &ObjectKey) -> Option<&T> {
        self.active.get(key).map(|h| &self.objects[h.index()])
    }

    pub fn active_handle(&self, key: &ObjectKey) -> Option<Handle<T>> {
        self.active.get(key).copied()
    }

    /// Handles of every active object in creation order.
    pub fn active_handles(&self) -> Vec<Handle<T>> {
        let mut handles: Vec<Handle<T>> = self.active.values().copied().collect();
        handles.sort_by_key(|h| h.index);
        handles
    }

    /// Resolves the object an event is scoped to, honoring create and
    /// destroy semantics:
    ///
    /// - a create event always retires whatever is active at the key and
    ///   starts a fresh object;
    /// - a destroy event retires and returns the active object, or starts
    ///   a placeholder when none exists;
    /// - anything else returns the active object, creating it on first
    ///   reference.
    pub fn find_or_create_active(&mut self, evt: &Event, session: &mut Session) -> Handle<T> {
        let key = ObjectKey::of_event(evt);
        let id = evt.id();

        if id.is_some() && id == T::CREATE_EVENT {
            return self.create_fresh(key, session);
        }

        if id.is_some() && id == T::DESTROY_EVENT {
            if let Some(handle) = self.retire(&key) {
                return handle;
            }
            debug!(kind = T::KIND.as_str(), key = %key, "destroy without prior create");
            return self.create(key, session);
        }

        self.find_or_create(key, session)
    }

    /// Retires whatever is active at `key` and starts a new object there.
    pub fn create_fresh(&mut self, key: ObjectKey, session: &mut Session) -> Handle<T> {
        if self.retire(&key).is_some() {
            debug!(kind = T::KIND.as_str(), key = %key, "retiring reused address");
        }
        self.create(key, session)
    }

    /// Returns the active object at `key`, creating it if absent. Used when
    /// one object discovers another through a payload pointer.
    pub fn find_or_create(&mut self, key: ObjectKey, session: &mut Session) -> Handle<T> {
        match self.active.get(&key) {
            Some(handle) => *handle,
            None => self.create(key, session),
        }
    }

    /// Retires every active object and orders the retired list by sequence
    /// id. Leaves no active entries, so a second call is a no-op.
    pub fn finalize(&mut self) {
        let mut remaining: Vec<Handle<T>> = self.active.drain().map(|(_, h)| h).collect();
        self.retired.append(&mut remaining);
        let objects = &self.objects;
        self.retired.sort_by_key(|h| objects[h.index()].id());
    }

    /// Linear scan over every object ever created.
    pub fn find_by_sequence_id(&self, id: u64) -> Option<&T> {
        self.objects.iter().find(|obj| obj.id() == id)
    }

    /// Earliest-created active object matching `pred`.
    pub fn find_active_where(&self, pred: impl Fn(&T) -> bool) -> Option<Handle<T>> {
        self.active
            .values()
            .copied()
            .filter(|h| pred(&self.objects[h.index()]))
            .min_by_key(|h| h.index)
    }

    /// First retired object matching `pred`, in retirement order.
    pub fn find_retired_where(&self, pred: impl Fn(&T) -> bool) -> Option<Handle<T>> {
        self.retired
            .iter()
            .copied()
            .find(|h| pred(&self.objects[h.index()]))
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.objects.get(handle.index())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.objects.get_mut(handle.index())
    }

    /// Retired objects in their current order.
    pub fn retired(&self) -> impl Iterator<Item = &T> {
        self.retired.iter().map(|h| &self.objects[h.index()])
    }

    /// Every object, retired first and then still-active ones in creation
    /// order. After [`LiveSet::finalize`] this is the retired list alone.
    pub fn objects(&self) -> Vec<&T> {
        let active = self.active_handles();
        self.retired
            .iter()
            .chain(active.iter())
            .map(|h| &self.objects[h.index()])
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }
}

impl<T: TraceObject> Default for LiveSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<Handle<T>> for LiveSet<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        &self.objects[handle.index()]
    }
}

impl<T> IndexMut<Handle<T>> for LiveSet<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        &mut self.objects[handle.index()]
    }
}
