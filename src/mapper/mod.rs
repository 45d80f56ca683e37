//! A bidirectional, range-checked mapping between two bounded integer key
//! spaces: long-lived identifiers assigned by a management plane ("ids") and
//! compact slot numbers consumed by a resource table ("indices").
//!
//! At any instant the associations held by a [Mapper] form a bijection over
//! the currently-used keys: no id appears twice, no index appears twice, and
//! both key spaces contain exactly one entry per association. Keys are
//! validated against the inclusive bounds configured in the [MapperEntry]
//! before any mutation.
//!
//! Associations are stored in an arena and referenced from two ordered
//! containers (one per key space) through stable handles, so insertion and
//! removal always touch both orderings together and lookups in either
//! direction cost O(log n).
//!
//! # Key Allocation
//!
//! [Mapper::assign_index] and [Mapper::assign_id] always pick the smallest
//! unused key in the target space, so freed slots are reclaimed before the
//! range grows upward. Explicit mapping via [Mapper::insert] rejects a pair
//! if *either* key is already used, even by an unrelated association.
//!
//! # Example
//!
//! ```rust
//! use resmap::mapper::{KeyRange, Mapper, MapperEntry};
//!
//! const FLOWS: MapperEntry = MapperEntry {
//!     tag: 0,
//!     name: "flow",
//!     id_range: KeyRange::new(0, 0xFFFF),
//!     index_range: KeyRange::new(0, 255),
//! };
//!
//! let mut mapper = Mapper::new(&FLOWS);
//!
//! // Let the mapper pick the first free slot for a management-assigned id.
//! let index = mapper.assign_index(1024).unwrap();
//! assert_eq!(index, 0);
//!
//! // The association answers lookups in both directions.
//! assert_eq!(mapper.index(1024).unwrap(), 0);
//! assert_eq!(mapper.id(0).unwrap(), 1024);
//!
//! // Freed slots are reused smallest-first.
//! mapper.remove_by_id(1024).unwrap();
//! assert_eq!(mapper.assign_index(2048).unwrap(), 0);
//! ```

use std::fmt;
use thiserror::Error;

mod storage;
pub use storage::Mapper;

/// The two key spaces a mapper translates between.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySpace {
    /// Externally assigned, long-lived identifier.
    Id,
    /// Compact, bounded slot number consumed by a resource table.
    Index,
}

impl fmt::Display for KeySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id => write!(f, "id"),
            Self::Index => write!(f, "index"),
        }
    }
}

/// Inclusive bounds for one key space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyRange {
    /// Smallest usable key.
    pub min: u32,
    /// Largest usable key.
    pub max: u32,
}

impl KeyRange {
    /// Create a new range over `[min, max]`.
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Whether `key` falls within the range.
    pub const fn contains(&self, key: u32) -> bool {
        key >= self.min && key <= self.max
    }
}

/// Immutable descriptor for one mapped resource type.
///
/// Created once at startup (typically as part of a `const` table) and
/// referenced by every [Mapper] built from it, so it must outlive them all.
#[derive(Clone, Copy, Debug)]
pub struct MapperEntry {
    /// Tag identifying the resource type this entry describes.
    pub tag: u32,
    /// Diagnostic name.
    pub name: &'static str,
    /// Bounds for the id key space.
    pub id_range: KeyRange,
    /// Bounds for the index key space.
    pub index_range: KeyRange,
}

/// Errors that can occur when interacting with a mapper.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The key is outside the configured bounds for its space.
    #[error("{0} key {1} is out of range")]
    OutOfRange(KeySpace, u32),
    /// The key is already used by an existing association.
    #[error("{0} key {1} is already mapped")]
    AlreadyMapped(KeySpace, u32),
    /// The key is in range but not currently associated.
    #[error("{0} key {1} is not mapped")]
    NotFound(KeySpace, u32),
    /// No unused key remains in the space for auto-allocation.
    #[error("no free {0} key remains")]
    Exhausted(KeySpace),
    /// A key present in one ordering has no mirrored entry in the other.
    /// This is an invariant violation, not a normal outcome; callers should
    /// treat the mapper as damaged rather than retry.
    #[error("{0} ordering lost the entry for key {1}")]
    Inconsistent(KeySpace, u32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use test_case::test_case;

    const FLOWS: MapperEntry = MapperEntry {
        tag: 0,
        name: "flow",
        id_range: KeyRange::new(0, 0xFFFF),
        index_range: KeyRange::new(0, 255),
    };

    // Ids deliberately start above zero to catch min/max mixups.
    const QUEUES: MapperEntry = MapperEntry {
        tag: 1,
        name: "queue",
        id_range: KeyRange::new(1, 64),
        index_range: KeyRange::new(0, 2),
    };

    const PORTS: MapperEntry = MapperEntry {
        tag: 2,
        name: "port",
        id_range: KeyRange::new(0, 31),
        index_range: KeyRange::new(0, 31),
    };

    #[test]
    fn test_round_trip() {
        let mut mapper = Mapper::new(&FLOWS);
        mapper.insert(1024, 7).unwrap();
        assert_eq!(mapper.index(1024), Ok(7));
        assert_eq!(mapper.id(7), Ok(1024));
        assert_eq!(mapper.len(), 1);
    }

    #[test]
    fn test_either_key_conflict() {
        let mut mapper = Mapper::new(&FLOWS);
        mapper.insert(1, 5).unwrap();

        // The id is taken, even though index 6 is unused.
        assert_eq!(
            mapper.insert(1, 6),
            Err(Error::AlreadyMapped(KeySpace::Id, 1))
        );

        // The index is taken, even though id 2 is unused.
        assert_eq!(
            mapper.insert(2, 5),
            Err(Error::AlreadyMapped(KeySpace::Index, 5))
        );

        // Rejected probes must not leave anything behind.
        assert_eq!(mapper.ids(), vec![1]);
        assert_eq!(mapper.indices(), vec![5]);
    }

    #[test_case(0 ; "below min")]
    #[test_case(65 ; "above max")]
    fn test_rejects_out_of_range_id(id: u32) {
        let mut mapper = Mapper::new(&QUEUES);
        assert_eq!(
            mapper.assign_index(id),
            Err(Error::OutOfRange(KeySpace::Id, id))
        );
    }

    #[test]
    fn test_out_of_range_checked_before_state() {
        let mut mapper = Mapper::new(&QUEUES);
        assert_eq!(mapper.insert(0, 0), Err(Error::OutOfRange(KeySpace::Id, 0)));
        assert_eq!(
            mapper.insert(1, 3),
            Err(Error::OutOfRange(KeySpace::Index, 3))
        );
        assert_eq!(mapper.index(0), Err(Error::OutOfRange(KeySpace::Id, 0)));
        assert_eq!(mapper.id(3), Err(Error::OutOfRange(KeySpace::Index, 3)));
        assert_eq!(
            mapper.remove_by_id(0),
            Err(Error::OutOfRange(KeySpace::Id, 0))
        );
        assert_eq!(
            mapper.remove_by_index(3),
            Err(Error::OutOfRange(KeySpace::Index, 3))
        );
        assert!(mapper.is_empty());
    }

    #[test]
    fn test_smallest_free_index() {
        let mut mapper = Mapper::new(&QUEUES);
        assert_eq!(mapper.assign_index(3), Ok(0));
        assert_eq!(mapper.assign_index(7), Ok(1));
        assert_eq!(mapper.assign_index(1), Ok(2));
        assert_eq!(
            mapper.assign_index(9),
            Err(Error::Exhausted(KeySpace::Index))
        );

        // Freeing the middle slot makes it the next pick.
        mapper.remove_by_id(7).unwrap();
        assert_eq!(mapper.assign_index(9), Ok(1));
    }

    #[test]
    fn test_smallest_free_id() {
        let mut mapper = Mapper::new(&QUEUES);
        assert_eq!(mapper.assign_id(2), Ok(1));
        assert_eq!(mapper.assign_id(0), Ok(2));
        mapper.remove_by_index(2).unwrap();
        assert_eq!(mapper.assign_id(1), Ok(1));
    }

    #[test]
    fn test_id_space_exhaustion() {
        const NARROW: MapperEntry = MapperEntry {
            tag: 3,
            name: "narrow",
            id_range: KeyRange::new(1, 2),
            index_range: KeyRange::new(0, 7),
        };
        let mut mapper = Mapper::new(&NARROW);
        mapper.assign_id(5).unwrap();
        mapper.assign_id(6).unwrap();
        assert_eq!(mapper.assign_id(7), Err(Error::Exhausted(KeySpace::Id)));
    }

    #[test]
    fn test_free_search_starts_at_min() {
        let mut mapper = Mapper::new(&QUEUES);
        mapper.insert(10, 2).unwrap();

        // The first free index is the lower bound, not a successor of the
        // highest used value.
        assert_eq!(mapper.assign_index(11), Ok(0));
    }

    #[test]
    fn test_index_or_assign() {
        let mut mapper = Mapper::new(&FLOWS);
        mapper.insert(5, 200).unwrap();
        assert_eq!(mapper.index_or_assign(5), Ok(200));
        assert_eq!(mapper.index_or_assign(6), Ok(0));
        assert_eq!(mapper.index_or_assign(6), Ok(0));
        assert_eq!(mapper.len(), 2);
    }

    #[test]
    fn test_removal() {
        let mut mapper = Mapper::new(&FLOWS);
        mapper.insert(3, 0).unwrap();
        mapper.remove_by_id(3).unwrap();

        assert_eq!(mapper.index(3), Err(Error::NotFound(KeySpace::Id, 3)));
        assert_eq!(mapper.id(0), Err(Error::NotFound(KeySpace::Index, 0)));
        assert_eq!(
            mapper.remove_by_id(3),
            Err(Error::NotFound(KeySpace::Id, 3))
        );

        // The freed index is immediately reusable.
        assert_eq!(mapper.assign_index(4), Ok(0));
    }

    #[test]
    fn test_exports_are_sorted_snapshots() {
        let mut mapper = Mapper::new(&FLOWS);
        mapper.insert(30, 2).unwrap();
        mapper.insert(10, 9).unwrap();
        mapper.insert(20, 4).unwrap();

        let ids = mapper.ids();
        let indices = mapper.indices();
        assert_eq!(ids, vec![10, 20, 30]);
        assert_eq!(indices, vec![2, 4, 9]);

        // Snapshots do not track later mutation.
        mapper.remove_by_id(20).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(mapper.ids(), vec![10, 30]);
    }

    #[test]
    fn test_clear_leaves_mapper_usable() {
        let mut mapper = Mapper::new(&FLOWS);
        for id in 0..10 {
            mapper.assign_index(id).unwrap();
        }
        mapper.clear().unwrap();
        assert!(mapper.is_empty());
        assert_eq!(mapper.assign_index(42), Ok(0));
    }

    #[test]
    fn test_damaged_mirror_is_fatal() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let mut mapper = Mapper::new(&FLOWS);
        mapper.insert(8, 1).unwrap();
        mapper.sever_record(8);

        assert_eq!(mapper.index(8), Err(Error::Inconsistent(KeySpace::Id, 8)));
        assert_eq!(
            mapper.remove_by_id(8),
            Err(Error::Inconsistent(KeySpace::Id, 8))
        );
        assert_eq!(mapper.clear(), Err(Error::Inconsistent(KeySpace::Id, 8)));
    }

    #[test]
    fn test_removal_requires_both_orderings() {
        let mut mapper = Mapper::new(&FLOWS);
        mapper.insert(8, 1).unwrap();
        mapper.sever_mirror(8);

        assert_eq!(
            mapper.remove_by_id(8),
            Err(Error::Inconsistent(KeySpace::Index, 1))
        );

        // The failed removal left the id ordering untouched.
        assert_eq!(mapper.ids(), vec![8]);
    }

    #[test]
    fn test_orderings_stay_aligned() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut mapper = Mapper::new(&PORTS);
        for _ in 0..1_000 {
            let key = rng.gen_range(0..32);
            match rng.gen_range(0..4) {
                0 => {
                    let _ = mapper.insert(key, rng.gen_range(0..32));
                }
                1 => {
                    let _ = mapper.assign_index(key);
                }
                2 => {
                    let _ = mapper.remove_by_id(key);
                }
                _ => {
                    let _ = mapper.remove_by_index(key);
                }
            }

            let ids = mapper.ids();
            let indices = mapper.indices();
            assert_eq!(ids.len(), indices.len());
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            assert!(indices.windows(2).all(|w| w[0] < w[1]));
            for id in ids {
                assert_eq!(mapper.id(mapper.index(id).unwrap()), Ok(id));
            }
        }
    }
}
