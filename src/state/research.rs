use crate::codec::{rw_vec, Persist, Stream};
use crate::error::{Error, Result};
use crate::state::object::{ObjectIndex, ObjectKind, ObjectRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ResearchKind {
    #[default]
    Ride = 0,
    Scenery = 1,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResearchItem {
    pub kind: ResearchKind,
    pub object: ObjectIndex,
    pub category: u8,
}

impl ResearchItem {
    /// The object this item unlocks
    pub fn object_ref(&self) -> ObjectRef {
        let kind = match self.kind {
            ResearchKind::Ride => ObjectKind::Ride,
            ResearchKind::Scenery => ObjectKind::SmallScenery,
        };
        ObjectRef::new(kind, self.object)
    }
}

impl Persist for ResearchItem {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        let mut kind = self.kind as u8;
        s.rw_u8(&mut kind)?;
        self.kind = match kind {
            0 => ResearchKind::Ride,
            1 => ResearchKind::Scenery,
            _ => return Err(Error::InvalidData(format!("unknown research item kind {kind}"))),
        };
        self.object.persist(s)?;
        s.rw_u8(&mut self.category)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResearchState {
    pub funding_level: u8,
    pub progress: u16,
    pub invented: Vec<ResearchItem>,
    pub uninvented: Vec<ResearchItem>,
}

impl ResearchState {
    pub fn items(&self) -> impl Iterator<Item = &ResearchItem> {
        self.invented.iter().chain(self.uninvented.iter())
    }
}

impl Persist for ResearchState {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_u8(&mut self.funding_level)?;
        s.rw_u16(&mut self.progress)?;
        rw_vec(s, &mut self.invented)?;
        rw_vec(s, &mut self.uninvented)
    }
}
