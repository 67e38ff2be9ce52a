use std::fmt;

///
/// Identifier of a domain object. The low half is the slot index in the
/// entity index, the high half a generation bumped every time the slot is
/// recycled.
///
#[derive(Debug,Clone,Copy,PartialEq,Hash,PartialOrd,Ord,Eq)]
pub struct Entity(u32, u32);

impl Entity {
    pub fn new(index: u32, generation: u32) -> Self {
        Entity(index, generation)
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.1
    }

    #[inline]
    pub fn to_bits(&self) -> u64 {
        (self.1 as u64) << 32 | self.0 as u64
    }

    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        Entity(bits as u32, (bits >> 32) as u32)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.0, self.1)
    }
}
