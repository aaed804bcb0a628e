/// The PPU's internal scroll/VRAM address register ("loopy" v and t).
///
/// ```text
/// yyy NN YYYYY XXXXX
/// ||| || ||||| +++++-- coarse X scroll
/// ||| || +++++-------- coarse Y scroll
/// ||| ++-------------- nametable select
/// +++----------------- fine Y scroll
/// ```
/// https://wiki.nesdev.com/w/index.php/PPU_scrolling
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LoopyRegister(pub u16);

impl LoopyRegister {
    const COARSE_X: (u16, u16) = (5, 0);
    const COARSE_Y: (u16, u16) = (5, 5);
    const NAMETABLE_X: (u16, u16) = (1, 10);
    const NAMETABLE_Y: (u16, u16) = (1, 11);
    const FINE_Y: (u16, u16) = (3, 12);
    const UNUSED: (u16, u16) = (1, 15);

    #[inline(always)]
    fn get(&self, (len, offset): (u16, u16)) -> u16 {
        (self.0 >> offset) & ((1 << len) - 1)
    }

    #[inline(always)]
    fn set(&mut self, (len, offset): (u16, u16), val: u16) {
        let mask = ((1 << len) - 1) << offset;
        self.0 = (self.0 & !mask) | ((val << offset) & mask);
    }

    pub fn coarse_x(&self) -> u16 {
        self.get(Self::COARSE_X)
    }
    pub fn set_coarse_x(&mut self, val: u16) {
        self.set(Self::COARSE_X, val)
    }

    pub fn coarse_y(&self) -> u16 {
        self.get(Self::COARSE_Y)
    }
    pub fn set_coarse_y(&mut self, val: u16) {
        self.set(Self::COARSE_Y, val)
    }

    pub fn nametable_x(&self) -> u16 {
        self.get(Self::NAMETABLE_X)
    }
    pub fn set_nametable_x(&mut self, val: u16) {
        self.set(Self::NAMETABLE_X, val)
    }

    pub fn nametable_y(&self) -> u16 {
        self.get(Self::NAMETABLE_Y)
    }
    pub fn set_nametable_y(&mut self, val: u16) {
        self.set(Self::NAMETABLE_Y, val)
    }

    pub fn fine_y(&self) -> u16 {
        self.get(Self::FINE_Y)
    }
    pub fn set_fine_y(&mut self, val: u16) {
        self.set(Self::FINE_Y, val)
    }

    pub fn unused(&self) -> u16 {
        self.get(Self::UNUSED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(reg: &LoopyRegister) -> [u16; 5] {
        [reg.coarse_x(), reg.coarse_y(), reg.nametable_x(), reg.nametable_y(), reg.fine_y()]
    }

    #[test]
    fn every_field_round_trips_without_touching_neighbours() {
        let setters: [(fn(&mut LoopyRegister, u16), u16); 5] = [
            (LoopyRegister::set_coarse_x, 31),
            (LoopyRegister::set_coarse_y, 31),
            (LoopyRegister::set_nametable_x, 1),
            (LoopyRegister::set_nametable_y, 1),
            (LoopyRegister::set_fine_y, 7),
        ];
        for background in [0x0000u16, 0xffff].iter() {
            for (field, (setter, max)) in setters.iter().enumerate() {
                for val in 0..=*max {
                    let mut reg = LoopyRegister(*background);
                    let before = fields(&reg);
                    setter(&mut reg, val);
                    let after = fields(&reg);
                    for i in 0..5 {
                        if i == field {
                            assert_eq!(after[i], val);
                        } else {
                            assert_eq!(after[i], before[i], "field {} corrupted by field {}", i, field);
                        }
                    }
                    assert_eq!(reg.unused(), background >> 15);
                }
            }
        }
    }

    #[test]
    fn oversized_values_are_truncated_to_field_width() {
        let mut reg = LoopyRegister::default();
        reg.set_coarse_x(0x25);
        reg.set_fine_y(0x0f);
        assert_eq!(reg.coarse_x(), 0x05);
        assert_eq!(reg.fine_y(), 0x07);
        assert_eq!(reg.coarse_y(), 0);
        assert_eq!(reg.0, 0x7005);
    }

    #[test]
    fn packs_fields_at_hardware_offsets() {
        let mut reg = LoopyRegister::default();
        reg.set_coarse_x(1);
        reg.set_coarse_y(2);
        reg.set_nametable_x(1);
        reg.set_nametable_y(1);
        reg.set_fine_y(3);
        assert_eq!(reg.0, 0x3C41);
    }
}
