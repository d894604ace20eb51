/// One bit per expected packet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresenceMask {
    words: Vec<u64>,
    len: u32,
    set: u32,
}

impl PresenceMask {
    pub fn new(len: u32) -> Self {
        let words = (len as usize).div_ceil(64);
        Self {
            words: vec![0; words],
            len,
            set: 0,
        }
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns whether the bit was newly set. Out-of-range indices are ignored.
    pub fn set(&mut self, index: u32) -> bool {
        if index >= self.len {
            return false;
        }
        let (word, bit) = Self::locate(index);
        let mask = 1u64 << bit;
        if self.words[word] & mask != 0 {
            return false;
        }
        self.words[word] |= mask;
        self.set += 1;
        true
    }

    pub fn is_set(&self, index: u32) -> bool {
        if index >= self.len {
            return false;
        }
        let (word, bit) = Self::locate(index);
        self.words[word] & (1u64 << bit) != 0
    }

    pub fn count_set(&self) -> u32 {
        self.set
    }

    pub fn count_missing(&self) -> u32 {
        self.len - self.set
    }

    pub fn is_complete(&self) -> bool {
        self.set == self.len
    }

    pub fn missing(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len).filter(|index| !self.is_set(*index))
    }

    fn locate(index: u32) -> (usize, u32) {
        ((index / 64) as usize, index % 64)
    }
}
