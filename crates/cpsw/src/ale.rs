//! Address lookup engine table.
//!
//! The table is storage only: software programs entries through the index register and the three
//! word registers, and nothing on the packet path consults it.

pub const ALE_ENTRY_COUNT: usize = 1024;

/// One table entry, three opaque words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AleEntry {
    pub words: [u32; 3],
}

#[derive(Debug, Clone)]
pub struct AleTable {
    entries: Box<[AleEntry; ALE_ENTRY_COUNT]>,
    index: u32,
}

impl Default for AleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AleTable {
    pub fn new() -> Self {
        Self {
            entries: Box::new([AleEntry::default(); ALE_ENTRY_COUNT]),
            index: 0,
        }
    }

    /// Selects the entry later word accesses go to.
    ///
    /// Indices past the end of the table select nothing: writes are dropped and reads return 0
    /// until a valid index is selected again.
    pub fn set_index(&mut self, index: u32) {
        self.index = index;
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    fn selected(&self) -> Option<usize> {
        let index = self.index as usize;
        (index < ALE_ENTRY_COUNT).then_some(index)
    }

    /// Writes word `slot` (0..=2) of the selected entry.
    pub fn write_word(&mut self, slot: usize, value: u32) {
        match (self.selected(), slot) {
            (Some(index), 0..=2) => self.entries[index].words[slot] = value,
            _ => tracing::trace!(index = self.index, slot, "ignoring ALE write"),
        }
    }

    /// Reads word `slot` (0..=2) of the selected entry.
    pub fn read_word(&self, slot: usize) -> u32 {
        match (self.selected(), slot) {
            (Some(index), 0..=2) => self.entries[index].words[slot],
            _ => 0,
        }
    }

    pub fn entry(&self, index: usize) -> Option<&AleEntry> {
        self.entries.get(index)
    }

    /// Zeroes every entry. The index register is left alone.
    pub fn clear_all(&mut self) {
        self.entries.fill(AleEntry::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_read_back_at_the_same_index() {
        let mut ale = AleTable::new();
        ale.set_index(17);
        ale.write_word(0, 0x1111_1111);
        ale.write_word(1, 0x2222_2222);
        ale.write_word(2, 0x3333_3333);

        assert_eq!(ale.read_word(0), 0x1111_1111);
        assert_eq!(ale.read_word(1), 0x2222_2222);
        assert_eq!(ale.read_word(2), 0x3333_3333);
        assert_eq!(ale.entry(17).unwrap().words, [0x1111_1111, 0x2222_2222, 0x3333_3333]);
        assert_eq!(ale.entry(16).unwrap().words, [0; 3]);
    }

    #[test]
    fn clear_zeroes_every_entry() {
        let mut ale = AleTable::new();
        for index in [0, 511, 1023] {
            ale.set_index(index);
            ale.write_word(1, index + 1);
        }
        ale.clear_all();

        for index in [0, 511, 1023] {
            ale.set_index(index);
            assert_eq!(ale.read_word(1), 0);
        }
    }

    #[test]
    fn out_of_range_indices_never_alias() {
        let mut ale = AleTable::new();
        for index in [1024, 1025, 2048, u32::MAX] {
            ale.set_index(index);
            ale.write_word(0, 0xdead_beef);
            assert_eq!(ale.read_word(0), 0);
        }
        assert!((0..ALE_ENTRY_COUNT).all(|i| ale.entry(i).unwrap().words == [0; 3]));
    }

    #[test]
    fn bad_slot_is_ignored() {
        let mut ale = AleTable::new();
        ale.write_word(3, 1);
        assert_eq!(ale.read_word(3), 0);
        assert_eq!(ale.entry(0).unwrap().words, [0; 3]);
    }
}
