//! Microprogrammed control unit.
//!
//! The sequencer walks the microprogram memory one microinstruction at a
//! time. Each microinstruction takes three externally driven steps:
//!
//! 1. [`CyclePhase::LoadAddressRegister`]: the phase multiplexer's address is
//!    clocked into RAMM
//! 2. [`CyclePhase::ReadMemoryIntoExchangeRegister`]: the addressed word is
//!    read from microprogram memory and clocked into REMM, which decodes it
//! 3. [`CyclePhase::EmitSignals`]: REMM sends its levels, then its pulses,
//!    then the register clock commits every architecture register
//!
//! The next address is chosen by three multiplexers: a condition multiplexer
//! (`current + 1` or the next-address field, by flag), a next-address
//! multiplexer (by `selMS`) and a phase multiplexer that forces the fetch
//! address on the first phase of every instruction.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use serde::{Serialize, Deserialize};
use crate::asm::microcode::{fetch_routine, MicroInstruction, MicrocodeError, ADDRESS_BITS, SELMS_BITS};
use crate::bits::BitInteger;
use crate::cpu::counter::PhaseCounter;
use crate::cpu::memory::{Memory, MemoryReader, MemoryRef};
use crate::cpu::mux::{Multiplexer, Plus1};
use crate::cpu::registers::{OutputSink, Register, RegisterInput, RegisterModel};
use crate::cpu::remm::{MicroprogramRegister, RemmOutputs};
use crate::cpu::wire::WireRef;
use crate::sim::{Signal, SimulationWorld};

/// Step of the microinstruction cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CyclePhase {
    LoadAddressRegister,
    ReadMemoryIntoExchangeRegister,
    EmitSignals,
}

impl CyclePhase {
    pub fn next(self) -> Self {
        match self {
            CyclePhase::LoadAddressRegister => CyclePhase::ReadMemoryIntoExchangeRegister,
            CyclePhase::ReadMemoryIntoExchangeRegister => CyclePhase::EmitSignals,
            CyclePhase::EmitSignals => CyclePhase::LoadAddressRegister,
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::LoadAddressRegister => "LOAD_ADDRESS_REGISTER",
            CyclePhase::ReadMemoryIntoExchangeRegister => "READ_MEMORY_INTO_EXCHANGE_REGISTER",
            CyclePhase::EmitSignals => "EMIT_SIGNALS",
        };
        f.write_str(name)
    }
}

/// Wires shared between the sequencer and the data path.
pub struct SequencerBuses {
    /// Opcode field of the instruction register.
    pub copma: WireRef,
    /// Condition index driven by REMM into the flag register.
    pub condition: WireRef,
    /// 1-bit flag register result.
    pub condition_flag: WireRef,
}

pub struct Sequencer {
    ramm: Rc<RefCell<Register>>,
    remm: Rc<RefCell<MicroprogramRegister>>,
    phase_counter: Rc<RefCell<PhaseCounter>>,
    memory: MemoryRef,
    phase: CyclePhase,
    cycles: u64,
}

impl Sequencer {
    /// Wire the sequencer into `world` and load the fetch routine at the
    /// configured fetch address.
    pub fn new(world: &mut SimulationWorld, buses: &SequencerBuses) -> Result<Self, MicrocodeError> {
        let ctx = world.context().clone();
        let config = ctx.config().clone();
        let word_bits = config.microprogram_word_bits;

        let sel_ms = world.wire("selMS", SELMS_BITS, false);
        let next_address = world.wire("next address", ADDRESS_BITS, false);
        let mm_address = world.wire("MM address", ADDRESS_BITS, false);
        let mm_output = world.wire("MM output", word_bits, false);
        let cond_mux_out = world.wire("condition mux", ADDRESS_BITS, false);
        let next_mux_out = world.wire("next address mux", ADDRESS_BITS, false);
        let phase_mux_out = world.wire("phase mux", ADDRESS_BITS, false);
        let copma_out = world.wire("COPMA address", ADDRESS_BITS, false);
        let fetch_out = world.wire("fetch address", ADDRESS_BITS, false);
        let first_phase = world.wire("first phase", 1, false);
        let plus1_out = world.wire("plus1", ADDRESS_BITS, false);

        let ramm = Register::new(&ctx, "RAMM", ADDRESS_BITS, false)
            .with_input(RegisterInput::gated(&phase_mux_out, Signal::ERamm))
            .with_output(OutputSink::wire(&mm_address))
            .with_clock(Signal::SwitchRamm);
        let ramm = world.attach(ramm);

        let remm = MicroprogramRegister::new(
            &ctx,
            &mm_output,
            Signal::ERemm,
            Signal::SwitchRemm,
            RemmOutputs {
                next_address: next_address.clone(),
                sel_ms: sel_ms.clone(),
                condition: buses.condition.clone(),
            },
        );
        let remm = world.attach(remm);

        world.attach(Plus1::new(&mm_address, &plus1_out));

        // Resampled every tick and committed when RAMM starts loading, so the
        // routine address reflects the instruction fetched in the last cycle.
        let copma = Register::new(&ctx, "COPMA", ADDRESS_BITS, false)
            .with_input(RegisterInput::always(&buses.copma))
            .with_output(OutputSink::wire(&copma_out))
            .with_clock(Signal::ERamm);
        world.attach(copma);

        let phase_counter = world.attach(PhaseCounter::new(&first_phase));

        let mut fetch = Register::new(&ctx, "Fetch", ADDRESS_BITS, false)
            .with_output(OutputSink::wire(&fetch_out));
        fetch.preset(&BitInteger::uint(config.fetch_address as u128, ADDRESS_BITS));
        world.attach(fetch);

        let memory: MemoryRef = Rc::new(RefCell::new(Memory::new(
            &ctx,
            config.microprogram_address_bits,
            word_bits,
            false,
        )?));
        world.attach(MemoryReader::new(&memory, Signal::ERemm, &mm_address, &mm_output));

        let cond_mux = Multiplexer::new(
            &ctx,
            "condition",
            &[plus1_out.clone(), next_address.clone()],
            &cond_mux_out,
            &buses.condition_flag,
        );
        world.attach(cond_mux);
        let next_mux = Multiplexer::new(
            &ctx,
            "next address",
            &[plus1_out, cond_mux_out, copma_out, next_address],
            &next_mux_out,
            &sel_ms,
        );
        world.attach(next_mux);
        let phase_mux = Multiplexer::new(&ctx, "phase", &[next_mux_out, fetch_out], &phase_mux_out, &first_phase);
        world.attach(phase_mux);

        let mut sequencer = Self {
            ramm,
            remm,
            phase_counter,
            memory,
            phase: CyclePhase::LoadAddressRegister,
            cycles: 0,
        };
        let routine: Vec<(u64, MicroInstruction)> = fetch_routine()
            .into_iter()
            .enumerate()
            .map(|(i, mi)| (config.fetch_address + i as u64, mi))
            .collect();
        sequencer.load_microprogram(&routine)?;
        Ok(sequencer)
    }

    /// Phase the next [`Sequencer::step`] will run.
    #[inline]
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Completed microinstruction cycles.
    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Microprogram address held by RAMM.
    pub fn micro_address(&self) -> u64 {
        self.ramm.borrow().current_value().to_u64()
    }

    /// Microinstruction held by REMM.
    pub fn instruction(&self) -> MicroInstruction {
        self.remm.borrow().instruction().clone()
    }

    /// Instruction phase counter (1 is the first fetch word).
    pub fn instruction_phase(&self) -> u32 {
        self.phase_counter.borrow().phase()
    }

    pub fn memory(&self) -> &MemoryRef {
        &self.memory
    }

    /// Store one microinstruction.
    pub fn load_word(&mut self, address: u64, instruction: &MicroInstruction) -> Result<(), MicrocodeError> {
        let mut memory = self.memory.borrow_mut();
        let word = instruction.encode(memory.width())?;
        let address = BitInteger::uint(address as u128, 64);
        memory.set_value(&address, &word)?;
        Ok(())
    }

    /// Store `(address, microinstruction)` pairs.
    pub fn load_microprogram(&mut self, words: &[(u64, MicroInstruction)]) -> Result<(), MicrocodeError> {
        for (address, instruction) in words {
            self.load_word(*address, instruction)?;
        }
        Ok(())
    }

    /// Run the current phase and move to the next one.
    pub fn step(&mut self, world: &mut SimulationWorld) -> CyclePhase {
        let phase = self.phase;
        let config = world.config().clone();
        let (level, pulse, bus) = (config.level_duration, config.pulse_duration, config.bus_power_time);

        match phase {
            CyclePhase::LoadAddressRegister => {
                world.emit(Signal::ERamm, level);
                world.wait_and_tick(2 * level, 1);
                world.emit(Signal::SwitchRamm, pulse);
                world.wait_and_tick(level, 1);
            }
            CyclePhase::ReadMemoryIntoExchangeRegister => {
                world.emit(Signal::ERemm, level);
                world.wait_and_tick(2 * level, 1);
                world.emit(Signal::SwitchRemm, pulse);
                world.wait_and_tick(level, 1);
            }
            CyclePhase::EmitSignals => {
                // Pulses start while the levels are still held.
                world.emit(Signal::SendLevels, pulse);
                world.wait_and_tick(level.saturating_sub(pulse).max(1), 1);
                world.emit(Signal::SendPulses, pulse);
                world.wait_and_tick(pulse + bus, 1);
                world.emit(Signal::RegClock, pulse);
                world.wait_and_tick(bus, 1);
                self.cycles += 1;
            }
        }

        log::debug!(
            "sequencer: {} done at {} ATU (micro address {})",
            phase,
            world.time_since_start(),
            self.micro_address()
        );
        self.phase = phase.next();
        phase
    }

    /// Finish the current microinstruction cycle.
    pub fn phase_by_phase(&mut self, world: &mut SimulationWorld) {
        loop {
            self.step(world);
            if self.phase == CyclePhase::LoadAddressRegister {
                break;
            }
        }
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("phase", &self.phase)
            .field("cycles", &self.cycles)
            .field("micro_address", &self.micro_address())
            .finish()
    }
}
