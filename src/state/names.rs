use crate::codec::{rw_vec, Persist, Stream};
use crate::error::Result;

/// Index into the peep name table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, serde::Serialize)]
pub struct NameId(pub u32);

/// Name entries referenced by guests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeepNameTable {
    names: Vec<String>,
}

impl PeepNameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entry for `name`, adding it if it is not present yet.
    pub fn intern(&mut self, name: &str) -> NameId {
        if let Some(pos) = self.names.iter().position(|n| n == name) {
            return NameId(pos as u32);
        }
        self.names.push(name.to_string());
        NameId((self.names.len() - 1) as u32)
    }

    pub fn get(&self, id: NameId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Persist for PeepNameTable {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        rw_vec(s, &mut self.names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_reuses_entries() {
        let mut table = PeepNameTable::new();
        let a = table.intern("Alice T.");
        let b = table.intern("Bob K.");
        assert_eq!(table.intern("Alice T."), a);
        assert_ne!(a, b);
        assert_eq!(table.get(b), Some("Bob K."));
        assert_eq!(table.get(NameId(9)), None);
        assert_eq!(table.len(), 2);
    }
}
