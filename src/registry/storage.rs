use super::Error;
use crate::mapper::{Mapper, MapperEntry};
use std::{collections::BTreeMap, io};
use tracing::{debug, warn};

/// Owns one [Mapper] per configured resource type, addressed by tag.
pub struct Registry<'a> {
    entries: &'a [MapperEntry],
    mappers: BTreeMap<u32, Mapper<'a>>,
}

impl<'a> Registry<'a> {
    /// Build one mapper per descriptor in `entries`.
    pub fn init(entries: &'a [MapperEntry]) -> Result<Self, Error> {
        let mut mappers = BTreeMap::new();
        for entry in entries {
            if mappers.insert(entry.tag, Mapper::new(entry)).is_some() {
                return Err(Error::DuplicateTag(entry.tag));
            }
        }
        debug!(types = entries.len(), "initialized registry");
        Ok(Self { entries, mappers })
    }

    /// The mapper for `tag`.
    pub fn mapper(&self, tag: u32) -> Result<&Mapper<'a>, Error> {
        self.mappers.get(&tag).ok_or(Error::UnknownTag(tag))
    }

    /// Mutable access to the mapper for `tag`.
    pub fn mapper_mut(&mut self, tag: u32) -> Result<&mut Mapper<'a>, Error> {
        self.mappers.get_mut(&tag).ok_or(Error::UnknownTag(tag))
    }

    /// Number of managed mappers.
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    /// Whether the registry manages no mappers.
    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    /// Tags of all managed mappers, ascending.
    pub fn tags(&self) -> Vec<u32> {
        self.mappers.keys().copied().collect()
    }

    /// Clear every mapper, leaving all of them usable.
    ///
    /// A mapper that fails to clear is logged and skipped.
    pub fn reset(&mut self) {
        for (&tag, mapper) in self.mappers.iter_mut() {
            if let Err(error) = mapper.clear() {
                warn!(tag, name = mapper.entry().name, %error, "failed to clear mapper");
            }
        }
    }

    /// Clear every mapper and release the registry.
    ///
    /// Continues through all mappers even if one fails, surfacing only the
    /// last error encountered.
    pub fn shutdown(mut self) -> Result<(), Error> {
        let mut result = Ok(());
        for (&tag, mapper) in self.mappers.iter_mut() {
            if let Err(error) = mapper.clear() {
                warn!(tag, name = mapper.entry().name, %error, "failed to clear mapper");
                result = Err(error.into());
            }
        }
        result
    }

    /// Render the current associations of every configured type to `out`.
    ///
    /// Types are visited in descriptor-table order; a type without
    /// associations is skipped. An id whose index lookup fails is skipped
    /// and dumping continues with the next id.
    pub fn dump<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        const RULE: &str =
            "+----------------------------------------------------+------------+------------";
        writeln!(out, "{RULE}")?;
        writeln!(
            out,
            "| Type                                               | Id         | Index"
        )?;
        writeln!(out, "{RULE}")?;

        for entry in self.entries {
            let Some(mapper) = self.mappers.get(&entry.tag) else {
                continue;
            };
            let ids = mapper.ids();
            if ids.is_empty() {
                continue;
            }
            for id in ids {
                let index = match mapper.index(id) {
                    Ok(index) => index,
                    Err(_) => continue, // ignore and try the next id
                };
                writeln!(
                    out,
                    "| 0x{:02x} {:<45} | 0x{:08x} | 0x{:08x}",
                    entry.tag, entry.name, id, index
                )?;
            }
            writeln!(out, "{RULE}")?;
        }

        Ok(())
    }
}
