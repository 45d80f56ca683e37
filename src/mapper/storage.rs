use super::{Error, KeyRange, KeySpace, MapperEntry};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Stable handle into the association arena.
type Handle = usize;

/// One currently-active (id, index) pair.
#[derive(Clone, Copy)]
struct Association {
    id: u32,
    index: u32,
}

/// A bidirectional, range-checked mapping between management-assigned ids
/// and bounded table indices.
///
/// Associations live in an arena and both orderings reference them through
/// stable handles, so every mutation threads the two key spaces together and
/// removal can verify the bijection before touching either side.
pub struct Mapper<'a> {
    entry: &'a MapperEntry,
    arena: Vec<Option<Association>>,
    free: Vec<Handle>,
    by_id: BTreeMap<u32, Handle>,
    by_index: BTreeMap<u32, Handle>,
}

impl<'a> Mapper<'a> {
    /// Create an empty mapper bound to `entry`.
    pub fn new(entry: &'a MapperEntry) -> Self {
        debug!(
            name = entry.name,
            id_min = entry.id_range.min,
            id_max = entry.id_range.max,
            index_min = entry.index_range.min,
            index_max = entry.index_range.max,
            "created mapper"
        );
        Self {
            entry,
            arena: Vec::new(),
            free: Vec::new(),
            by_id: BTreeMap::new(),
            by_index: BTreeMap::new(),
        }
    }

    /// The descriptor this mapper was built from.
    pub fn entry(&self) -> &'a MapperEntry {
        self.entry
    }

    /// Number of current associations.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the mapper holds no associations.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Configured bounds for `space`.
    fn range(&self, space: KeySpace) -> KeyRange {
        match space {
            KeySpace::Id => self.entry.id_range,
            KeySpace::Index => self.entry.index_range,
        }
    }

    /// The sorted ordering for `space`.
    fn ordering(&self, space: KeySpace) -> &BTreeMap<u32, Handle> {
        match space {
            KeySpace::Id => &self.by_id,
            KeySpace::Index => &self.by_index,
        }
    }

    /// Reject keys outside the configured bounds for their space.
    fn check(&self, space: KeySpace, key: u32) -> Result<(), Error> {
        let range = self.range(space);
        if range.contains(key) {
            return Ok(());
        }
        debug!(
            %space,
            key,
            min = range.min,
            max = range.max,
            name = self.entry.name,
            "key out of range"
        );
        Err(Error::OutOfRange(space, key))
    }

    /// Resolve a handle to its association.
    fn resolve(&self, handle: Handle) -> Option<Association> {
        self.arena.get(handle).copied().flatten()
    }

    /// Store a new association and thread it through both orderings.
    fn attach(&mut self, id: u32, index: u32) {
        let association = Association { id, index };
        let handle = match self.free.pop() {
            Some(handle) => {
                self.arena[handle] = Some(association);
                handle
            }
            None => {
                self.arena.push(Some(association));
                self.arena.len() - 1
            }
        };
        self.by_id.insert(id, handle);
        self.by_index.insert(index, handle);
    }

    /// Unthread an association from both orderings, or from neither.
    fn detach(&mut self, handle: Handle, association: Association) -> Result<(), Error> {
        // Both orderings must reference the handle before either is touched.
        for (space, key) in [
            (KeySpace::Id, association.id),
            (KeySpace::Index, association.index),
        ] {
            if self.ordering(space).get(&key) != Some(&handle) {
                warn!(
                    %space,
                    key,
                    name = self.entry.name,
                    "ordering lost its mirrored entry"
                );
                return Err(Error::Inconsistent(space, key));
            }
        }
        self.by_id.remove(&association.id);
        self.by_index.remove(&association.index);
        self.arena[handle] = None;
        self.free.push(handle);
        Ok(())
    }

    /// Smallest unused key in `space`: the first gap in the sorted ordering,
    /// or the lower bound when the ordering is empty or starts above it.
    fn first_free(&self, space: KeySpace) -> Result<u32, Error> {
        let range = self.range(space);
        let mut candidate = range.min;
        for (&key, _) in self.ordering(space).iter() {
            if key > candidate {
                break;
            }
            candidate = match key.checked_add(1) {
                Some(next) => next,
                None => {
                    debug!(%space, name = self.entry.name, "no free key");
                    return Err(Error::Exhausted(space));
                }
            };
        }
        if candidate > range.max {
            debug!(%space, name = self.entry.name, "no free key");
            return Err(Error::Exhausted(space));
        }
        Ok(candidate)
    }

    /// Map `id` to `index` explicitly.
    ///
    /// The pair is rejected if either key is already used by any
    /// association, even one that does not involve the other key.
    pub fn insert(&mut self, id: u32, index: u32) -> Result<(), Error> {
        self.check(KeySpace::Id, id)?;
        self.check(KeySpace::Index, index)?;
        for (space, key) in [(KeySpace::Id, id), (KeySpace::Index, index)] {
            if self.ordering(space).contains_key(&key) {
                debug!(%space, key, name = self.entry.name, "key already mapped");
                return Err(Error::AlreadyMapped(space, key));
            }
        }
        self.attach(id, index);
        Ok(())
    }

    /// Map `id` to the smallest unused index and return it.
    pub fn assign_index(&mut self, id: u32) -> Result<u32, Error> {
        self.check(KeySpace::Id, id)?;
        if self.by_id.contains_key(&id) {
            debug!(id, name = self.entry.name, "id already mapped");
            return Err(Error::AlreadyMapped(KeySpace::Id, id));
        }
        let index = self.first_free(KeySpace::Index)?;
        self.attach(id, index);
        Ok(index)
    }

    /// Map `index` to the smallest unused id and return it.
    pub fn assign_id(&mut self, index: u32) -> Result<u32, Error> {
        self.check(KeySpace::Index, index)?;
        if self.by_index.contains_key(&index) {
            debug!(index, name = self.entry.name, "index already mapped");
            return Err(Error::AlreadyMapped(KeySpace::Index, index));
        }
        let id = self.first_free(KeySpace::Id)?;
        self.attach(id, index);
        Ok(id)
    }

    /// Look up the index mapped to `id`.
    pub fn index(&self, id: u32) -> Result<u32, Error> {
        self.check(KeySpace::Id, id)?;
        let handle = *self
            .by_id
            .get(&id)
            .ok_or(Error::NotFound(KeySpace::Id, id))?;
        let association = self
            .resolve(handle)
            .ok_or(Error::Inconsistent(KeySpace::Id, id))?;
        Ok(association.index)
    }

    /// Look up the id mapped to `index`.
    pub fn id(&self, index: u32) -> Result<u32, Error> {
        self.check(KeySpace::Index, index)?;
        let handle = *self
            .by_index
            .get(&index)
            .ok_or(Error::NotFound(KeySpace::Index, index))?;
        let association = self
            .resolve(handle)
            .ok_or(Error::Inconsistent(KeySpace::Index, index))?;
        Ok(association.id)
    }

    /// Look up the index mapped to `id`, mapping it first if absent.
    pub fn index_or_assign(&mut self, id: u32) -> Result<u32, Error> {
        match self.index(id) {
            Err(Error::NotFound(..)) => self.assign_index(id),
            result => result,
        }
    }

    /// Remove the association that maps `id`.
    pub fn remove_by_id(&mut self, id: u32) -> Result<(), Error> {
        self.check(KeySpace::Id, id)?;
        let handle = *self
            .by_id
            .get(&id)
            .ok_or(Error::NotFound(KeySpace::Id, id))?;
        let association = self
            .resolve(handle)
            .ok_or(Error::Inconsistent(KeySpace::Id, id))?;
        self.detach(handle, association)
    }

    /// Remove the association that maps `index`.
    pub fn remove_by_index(&mut self, index: u32) -> Result<(), Error> {
        self.check(KeySpace::Index, index)?;
        let handle = *self
            .by_index
            .get(&index)
            .ok_or(Error::NotFound(KeySpace::Index, index))?;
        let association = self
            .resolve(handle)
            .ok_or(Error::Inconsistent(KeySpace::Index, index))?;
        self.detach(handle, association)
    }

    /// Ascending snapshot of all mapped ids.
    pub fn ids(&self) -> Vec<u32> {
        self.by_id.keys().copied().collect()
    }

    /// Ascending snapshot of all mapped indices.
    pub fn indices(&self) -> Vec<u32> {
        self.by_index.keys().copied().collect()
    }

    /// Remove every association, leaving the mapper usable.
    ///
    /// Associations are unthreaded pairwise so a damaged mirror surfaces as
    /// [Error::Inconsistent] instead of being dropped silently.
    pub fn clear(&mut self) -> Result<(), Error> {
        while let Some((&id, &handle)) = self.by_id.first_key_value() {
            let association = self
                .resolve(handle)
                .ok_or(Error::Inconsistent(KeySpace::Id, id))?;
            self.detach(handle, association)?;
        }
        Ok(())
    }

    /// Drop the arena record and index-ordering entry for `id`, leaving the
    /// id ordering dangling. Used by tests to exercise the paths that detect
    /// a damaged record.
    #[cfg(test)]
    pub(crate) fn sever_record(&mut self, id: u32) {
        let handle = self.by_id[&id];
        if let Some(association) = self.resolve(handle) {
            self.by_index.remove(&association.index);
        }
        self.arena[handle] = None;
    }

    /// Drop only the index-ordering entry for `id`, keeping the arena record.
    /// Used by tests to exercise the both-or-neither removal check.
    #[cfg(test)]
    pub(crate) fn sever_mirror(&mut self, id: u32) {
        let handle = self.by_id[&id];
        if let Some(association) = self.resolve(handle) {
            self.by_index.remove(&association.index);
        }
    }
}
