//! Addressable memory and its signal-gated ports.
//!
//! [`Memory`] is a flat array of `2^log_height` cells of a fixed width. Cells
//! start unwritten; reading one returns zero and logs a warning. The ports
//! connect a memory to the buses:
//! - [`MemoryReader`] copies `memory[address] -> value` while its signal is active
//! - [`MemoryWriter`] copies `value -> memory[address]` while its signal is active

use std::cell::RefCell;
use std::rc::Rc;
use crate::bits::BitInteger;
use crate::cpu::wire::WireRef;
use crate::sim::{Context, Signal, SignalSnapshot, SimError, Subscriber};

/// Shared memory handle.
pub type MemoryRef = Rc<RefCell<Memory>>;

/// Widest address a [`Memory`] or [`crate::cpu::FlagRegister`] accepts.
pub const MAX_INDEX_BITS: usize = 24;

/// `2^bits`, or [`SimError::CapacityTooLarge`] past [`MAX_INDEX_BITS`].
pub(crate) fn capacity(component: &'static str, bits: usize) -> Result<usize, SimError> {
    u32::try_from(bits)
        .ok()
        .filter(|_| bits <= MAX_INDEX_BITS)
        .and_then(|shift| 1usize.checked_shl(shift))
        .ok_or(SimError::CapacityTooLarge { component, bits })
}

pub struct Memory {
    cells: Vec<Option<BitInteger>>,
    width: usize,
    signed: bool,
    ctx: Context,
}

impl Memory {
    /// A memory of `2^log_height` unwritten cells. `log_height` is at most
    /// [`MAX_INDEX_BITS`].
    pub fn new(ctx: &Context, log_height: usize, width: usize, signed: bool) -> Result<Self, SimError> {
        Ok(Self {
            cells: vec![None; capacity("memory", log_height)?],
            width,
            signed,
            ctx: ctx.clone(),
        })
    }

    /// Number of cells.
    #[inline]
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    fn zero(&self) -> BitInteger {
        BitInteger::zero(self.width, self.signed)
    }

    fn index(&self, address: &BitInteger) -> Result<usize, SimError> {
        match address.to_index() {
            Some(i) if i < self.cells.len() => Ok(i),
            _ => {
                let err = SimError::AddressOutOfRange {
                    address: address.to_string(),
                    max: self.cells.len() - 1,
                };
                self.ctx.report(&err);
                Err(err)
            }
        }
    }

    /// Read a cell. Out-of-range addresses and unwritten cells are reported
    /// and read as zero.
    pub fn get_value(&self, address: &BitInteger) -> BitInteger {
        let Ok(index) = self.index(address) else {
            return self.zero();
        };
        match &self.cells[index] {
            Some(value) => value.clone(),
            None => {
                self.ctx.report(&SimError::UninitializedRead(index));
                self.zero()
            }
        }
    }

    /// Write a cell. Out-of-range addresses and values wider than a cell are
    /// reported and leave memory unchanged.
    pub fn set_value(&mut self, address: &BitInteger, value: &BitInteger) -> Result<(), SimError> {
        let index = self.index(address)?;
        if !value.fits(self.width, self.signed) {
            let err = SimError::MemoryOverflow { value: value.to_string(), width: self.width };
            self.ctx.report(&err);
            return Err(err);
        }
        self.cells[index] = Some(value.cast(self.width, self.signed));
        Ok(())
    }

    /// Read by native address.
    pub fn read(&self, address: usize) -> BitInteger {
        self.get_value(&BitInteger::uint(address as u128, usize::BITS as usize))
    }

    /// Write by native address.
    pub fn write(&mut self, address: usize, value: &BitInteger) -> Result<(), SimError> {
        self.set_value(&BitInteger::uint(address as u128, usize::BITS as usize), value)
    }

    /// Write consecutive cells starting at `start`.
    pub fn load(&mut self, start: usize, words: &[BitInteger]) -> Result<(), SimError> {
        for (offset, word) in words.iter().enumerate() {
            self.write(start + offset, word)?;
        }
        Ok(())
    }

    /// Written cells in address order.
    pub fn dump(&self) -> Vec<(usize, BitInteger)> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, cell)| cell.as_ref().map(|v| (i, v.clone())))
            .collect()
    }

    /// Forget every cell.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = None;
        }
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let written = self.cells.iter().filter(|c| c.is_some()).count();
        f.debug_struct("Memory")
            .field("written_cells", &written)
            .field("total_cells", &self.cells.len())
            .field("width", &self.width)
            .finish()
    }
}

// ============================================================================
// Ports
// ============================================================================

/// Copies the addressed cell onto a wire while its signal is active.
pub struct MemoryReader {
    memory: MemoryRef,
    signal: Signal,
    address: WireRef,
    output: WireRef,
}

impl MemoryReader {
    pub fn new(memory: &MemoryRef, signal: Signal, address: &WireRef, output: &WireRef) -> Self {
        Self {
            memory: memory.clone(),
            signal,
            address: address.clone(),
            output: output.clone(),
        }
    }
}

impl Subscriber for MemoryReader {
    fn on_tick(&mut self, _elapsed: u64, signals: &SignalSnapshot) {
        if !signals.is_active(self.signal) {
            return;
        }
        let address = self.address.borrow().value().clone();
        let value = self.memory.borrow().get_value(&address);
        let _ = self.output.borrow_mut().set_value(&value);
    }
}

/// Stores a wire's value into the addressed cell while its signal is active.
pub struct MemoryWriter {
    memory: MemoryRef,
    signal: Signal,
    address: WireRef,
    input: WireRef,
}

impl MemoryWriter {
    pub fn new(memory: &MemoryRef, signal: Signal, address: &WireRef, input: &WireRef) -> Self {
        Self {
            memory: memory.clone(),
            signal,
            address: address.clone(),
            input: input.clone(),
        }
    }
}

impl Subscriber for MemoryWriter {
    fn on_tick(&mut self, _elapsed: u64, signals: &SignalSnapshot) {
        if !signals.is_active(self.signal) {
            return;
        }
        let address = self.address.borrow().value().clone();
        let value = self.input.borrow().value().clone();
        let _ = self.memory.borrow_mut().set_value(&address, &value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Level, SimulationWorld};

    fn memory(world: &SimulationWorld) -> Memory {
        Memory::new(world.context(), 3, 10, false).unwrap()
    }

    #[test]
    fn test_height_beyond_bound_rejected() {
        let world = SimulationWorld::default();
        assert_eq!(Memory::new(world.context(), 12, 8, false).map(|m| m.size()).ok(), Some(4096));
        for bits in [MAX_INDEX_BITS + 1, 64, 200] {
            assert_eq!(
                Memory::new(world.context(), bits, 8, false).err(),
                Some(SimError::CapacityTooLarge { component: "memory", bits })
            );
        }
    }

    #[test]
    fn test_read_write() {
        let world = SimulationWorld::default();
        let mut mem = memory(&world);
        assert_eq!(mem.size(), 8);
        mem.write(3, &BitInteger::uint(1023, 10)).unwrap();
        assert_eq!(mem.read(3).to_i128(), 1023);
        assert_eq!(world.log().count_at_least(Level::Log), 0);
    }

    #[test]
    fn test_unwritten_cell_warns() {
        let world = SimulationWorld::default();
        let mem = memory(&world);
        assert!(mem.read(2).is_zero());
        assert_eq!(world.log().count(Level::Warn), 1);
    }

    #[test]
    fn test_out_of_range_address() {
        let world = SimulationWorld::default();
        let mut mem = memory(&world);
        assert!(mem.read(8).is_zero());
        assert!(mem.write(8, &BitInteger::uint(1, 10)).is_err());
        assert!(mem.get_value(&BitInteger::int(-1, 8)).is_zero());
        assert_eq!(world.log().count(Level::Crit), 3);
    }

    #[test]
    fn test_value_too_wide() {
        let world = SimulationWorld::default();
        let mut mem = memory(&world);
        mem.write(1, &BitInteger::uint(5, 10)).unwrap();
        assert!(mem.write(1, &BitInteger::uint(1050, 16)).is_err());
        assert_eq!(mem.read(1).to_i128(), 5);
        assert_eq!(world.log().count(Level::Crit), 1);
    }

    #[test]
    fn test_load_and_dump() {
        let world = SimulationWorld::default();
        let mut mem = memory(&world);
        let words: Vec<_> = [1u128, 2, 3].iter().map(|v| BitInteger::uint(*v, 10)).collect();
        mem.load(4, &words).unwrap();
        let dump = mem.dump();
        assert_eq!(dump.len(), 3);
        assert_eq!(dump[0].0, 4);
        assert_eq!(dump[2].1.to_i128(), 3);
        assert!(mem.load(7, &words).is_err());
        mem.clear();
        assert!(mem.dump().is_empty());
    }

    #[test]
    fn test_reader_and_writer_ports() {
        let mut world = SimulationWorld::default();
        let address = world.wire("addr", 3, false);
        let data_in = world.wire("in", 10, false);
        let data_out = world.wire("out", 10, false);
        let mem: MemoryRef = Rc::new(RefCell::new(memory(&world)));
        world.attach(MemoryWriter::new(&mem, Signal::EM, &address, &data_in));
        world.attach(MemoryReader::new(&mem, Signal::SM, &address, &data_out));

        address.borrow_mut().set_int(6).unwrap();
        data_in.borrow_mut().set_int(321).unwrap();
        world.wait_and_tick(1, 1);
        assert!(mem.borrow().dump().is_empty());

        world.emit(Signal::EM, 1);
        world.wait_and_tick(1, 1);
        assert_eq!(mem.borrow().read(6).to_i128(), 321);

        world.emit(Signal::SM, 1);
        world.wait_and_tick(1, 1);
        assert_eq!(data_out.borrow().value().to_i128(), 321);
    }
}
