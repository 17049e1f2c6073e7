/// Total addressable memory of the 6502.
pub const IMAGE_SIZE: usize = 0x10000;

const UNWRITTEN: i32 = -1;

/// Dense 64 KiB memory image. Cells hold the emitted byte value, or −1
/// where pass 2 never wrote; readers must skip the sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    cells: Vec<i32>,
}

impl Image {
    pub fn new() -> Self {
        Self {
            cells: vec![UNWRITTEN; IMAGE_SIZE],
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(UNWRITTEN);
    }

    pub fn set(&mut self, addr: u32, byte: u8) {
        self.cells[addr as usize] = i32::from(byte);
    }

    /// Raw cell value; −1 when unwritten.
    pub fn raw(&self, addr: u32) -> i32 {
        self.cells[addr as usize]
    }

    pub fn get(&self, addr: u32) -> Option<u8> {
        match self.cells[addr as usize] {
            UNWRITTEN => None,
            byte => Some(byte as u8),
        }
    }

    pub fn iter_written(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.cells.iter().enumerate().filter_map(|(addr, cell)| {
            if *cell == UNWRITTEN {
                None
            } else {
                Some((addr as u32, *cell as u8))
            }
        })
    }

    pub fn written_len(&self) -> usize {
        self.cells.iter().filter(|cell| **cell != UNWRITTEN).count()
    }
}

impl Default for Image {
    fn default() -> Self {
        Self::new()
    }
}
