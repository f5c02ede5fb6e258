//! The complete von Neumann machine.
//!
//! Three 32-bit buses connect the registers to the ALU: registers drive
//! `bus 1` and `bus 2` through insulators, the ALU combines them onto
//! `bus 3`, and registers load from `bus 3`. The sequencer raises the
//! signals of one microinstruction per cycle and commits every register with
//! the register clock at the end of the cycle.
//!
//! Wiring order is the tick order:
//! 1. buses
//! 2. central memory reader (`sM`), so `RE` sees the word in the same tick
//! 3. registers `CO RI RE RX RA RB RC SP RAM`
//! 4. flag register
//! 5. sequencer
//! 6. ALU
//! 7. central memory writer (`eM`), after `RE` has driven `bus EM`

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::asm::microcode::{builtin_microprogram, MicroInstruction, MicrocodeError};
use crate::bits::BitInteger;
use crate::cpu::alu::Alu;
use crate::cpu::flags::FlagRegister;
use crate::cpu::instruction::InstructionRegister;
use crate::cpu::memory::{Memory, MemoryReader, MemoryRef, MemoryWriter};
use crate::cpu::registers::{ClockGated, Insulated, OutputSink, Register, RegisterInput, RegisterModel};
use crate::cpu::sequencer::{CyclePhase, Sequencer, SequencerBuses};
use crate::cpu::wire::WireRef;
use crate::sim::{ConfigError, DebugLog, SimError, SimulationConfig, SimulationWorld, Signal};

/// A general-purpose architecture register.
pub type ArchRegister = ClockGated<Insulated<Register>>;

type Shared<T> = Rc<RefCell<T>>;

/// Names of the architecture registers, in wiring order.
pub const REGISTER_NAMES: [&str; 9] = ["CO", "RI", "RE", "RX", "RA", "RB", "RC", "SP", "RAM"];

/// The architecture's buses.
pub struct Buses {
    pub bus1: WireRef,
    pub bus2: WireRef,
    pub bus3: WireRef,
    pub condition: WireRef,
    pub condition_flag: WireRef,
    pub copma: WireRef,
    pub memory_out: WireRef,
    pub memory_in: WireRef,
    pub memory_address: WireRef,
}

pub struct Architecture {
    world: SimulationWorld,
    buses: Buses,
    co: Shared<ArchRegister>,
    ri: Shared<ClockGated<Insulated<InstructionRegister>>>,
    re: Shared<ArchRegister>,
    rx: Shared<ArchRegister>,
    ra: Shared<ArchRegister>,
    rb: Shared<ArchRegister>,
    rc: Shared<ArchRegister>,
    sp: Shared<ArchRegister>,
    ram: Shared<ClockGated<Register>>,
    flags: Shared<FlagRegister>,
    alu: Shared<Alu>,
    memory: MemoryRef,
    sequencer: Sequencer,
}

/// Serializable view of the machine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureSnapshot {
    pub elapsed_atu: u64,
    pub cycles: u64,
    pub phase: CyclePhase,
    pub instruction_phase: u32,
    pub micro_address: u64,
    pub microinstruction: MicroInstruction,
    pub registers: BTreeMap<String, i64>,
    /// Written central memory cells.
    pub memory: Vec<(usize, i64)>,
}

/// Errors building or loading the machine.
#[derive(Debug, Clone, Error)]
pub enum ArchitectureError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("microprogram: {0}")]
    Microcode(#[from] MicrocodeError),

    #[error("simulation: {0}")]
    Simulation(#[from] SimError),
}

/// Bus-facing register with `B1`/`B2` outputs loading from `bus 3`.
fn general_register(world: &SimulationWorld, buses: &Buses, name: &str, load: Signal, out1: Signal, out2: Signal) -> ArchRegister {
    let config = world.config();
    let register = Register::new(world.context(), name, config.arch_bits, true)
        .with_input(RegisterInput::gated(&buses.bus3, load))
        .with_output(OutputSink::gated(&buses.bus1, out1))
        .with_output(OutputSink::gated(&buses.bus2, out2));
    ClockGated::new(Insulated::new(register))
}

impl Architecture {
    /// Build the machine with only the fetch routine in microprogram memory.
    pub fn new(config: SimulationConfig) -> Result<Self, ArchitectureError> {
        config.validate()?;
        let arch_bits = config.arch_bits;
        let mut world = SimulationWorld::new(config);
        let ctx = world.context().clone();
        let config = ctx.config();

        let buses = Buses {
            bus1: world.wire("bus 1", arch_bits, true),
            bus2: world.wire("bus 2", arch_bits, true),
            bus3: world.wire("bus 3", arch_bits, true),
            condition: world.wire("condition in", config.condition_bits, false),
            condition_flag: world.wire("condition out", 1, false),
            copma: world.wire("COPMA", config.copma_bits, false),
            memory_out: world.wire("memory out", arch_bits, true),
            memory_in: world.wire("memory in", arch_bits, true),
            memory_address: world.wire("RAM -> memory", config.memory_address_bits, false),
        };

        let memory: MemoryRef = Rc::new(RefCell::new(Memory::new(&ctx, config.memory_address_bits, arch_bits, true)?));
        world.attach(MemoryReader::new(&memory, Signal::SM, &buses.memory_address, &buses.memory_out));

        let co = general_register(&world, &buses, "CO", Signal::ECo, Signal::Cob1, Signal::Cob2);
        let co = world.attach(co);

        let ri = InstructionRegister::new(&ctx, "RI", &buses.copma)
            .with_input(RegisterInput::gated(&buses.bus3, Signal::ERi))
            .with_output(OutputSink::gated(&buses.bus1, Signal::Rib1))
            .with_output(OutputSink::gated(&buses.bus2, Signal::Rib2));
        let ri = world.attach(ClockGated::new(Insulated::new(ri)));

        let re = Register::new(&ctx, "RE", arch_bits, true)
            .with_input(RegisterInput::gated(&buses.bus3, Signal::ERe))
            .with_input(RegisterInput::gated(&buses.memory_out, Signal::SM))
            .with_output(OutputSink::gated(&buses.bus1, Signal::Reb1))
            .with_output(OutputSink::gated(&buses.bus2, Signal::Reb2))
            .with_output(OutputSink::gated(&buses.memory_in, Signal::EM));
        let re = world.attach(ClockGated::new(Insulated::new(re)));

        let rx = general_register(&world, &buses, "RX", Signal::ERx, Signal::Rxb1, Signal::Rxb2);
        let rx = world.attach(rx);
        let ra = general_register(&world, &buses, "RA", Signal::ERa, Signal::Rab1, Signal::Rab2);
        let ra = world.attach(ra);
        let rb = general_register(&world, &buses, "RB", Signal::ERb, Signal::Rbb1, Signal::Rbb2);
        let rb = world.attach(rb);
        let rc = general_register(&world, &buses, "RC", Signal::ERc, Signal::Rcb1, Signal::Rcb2);
        let rc = world.attach(rc);
        let sp = general_register(&world, &buses, "SP", Signal::ESp, Signal::Spb1, Signal::Spb2);
        let sp = world.attach(sp);

        let ram = Register::new(&ctx, "RAM", config.memory_address_bits, false)
            .with_input(RegisterInput::gated(&buses.bus3, Signal::ERam))
            .with_output(OutputSink::wire(&buses.memory_address));
        let ram = world.attach(ClockGated::new(ram));

        let mut flags = FlagRegister::new(&ctx, config.condition_bits, &buses.condition, &buses.condition_flag)?;
        install_conditions(&mut flags, &ra, &rb)?;
        let flags = world.attach(flags);

        let sequencer = Sequencer::new(
            &mut world,
            &SequencerBuses {
                copma: buses.copma.clone(),
                condition: buses.condition.clone(),
                condition_flag: buses.condition_flag.clone(),
            },
        )?;

        let alu = Alu::with_standard_operations(&ctx, &[buses.bus1.clone(), buses.bus2.clone()], &[buses.bus3.clone()]);
        let alu = world.attach(alu);

        world.attach(MemoryWriter::new(&memory, Signal::EM, &buses.memory_address, &buses.memory_in));

        log::info!(
            "architecture wired: {}-bit data path, {} central memory words",
            arch_bits,
            memory.borrow().size()
        );
        Ok(Self { world, buses, co, ri, re, rx, ra, rb, rc, sp, ram, flags, alu, memory, sequencer })
    }

    /// Build the machine and load the built-in microprogram.
    pub fn with_builtin_microprogram(config: SimulationConfig) -> Result<Self, ArchitectureError> {
        let mut arch = Self::new(config)?;
        let program = builtin_microprogram(arch.config().fetch_address);
        arch.load_microprogram(&program)?;
        Ok(arch)
    }

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------

    /// Run one phase of the microinstruction cycle.
    pub fn step(&mut self) -> CyclePhase {
        self.sequencer.step(&mut self.world)
    }

    /// Finish the current microinstruction cycle.
    pub fn phase_by_phase(&mut self) {
        self.sequencer.phase_by_phase(&mut self.world);
    }

    /// Run `cycles` complete microinstruction cycles.
    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.phase_by_phase();
        }
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Store central memory words from address 0.
    pub fn load_program(&mut self, words: &[BitInteger]) -> Result<(), ArchitectureError> {
        self.memory.borrow_mut().load(0, words)?;
        Ok(())
    }

    pub fn load_microprogram(&mut self, words: &[(u64, MicroInstruction)]) -> Result<(), ArchitectureError> {
        self.sequencer.load_microprogram(words)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn world(&self) -> &SimulationWorld {
        &self.world
    }

    /// Direct access for driving signals and time by hand.
    pub fn world_mut(&mut self) -> &mut SimulationWorld {
        &mut self.world
    }

    pub fn config(&self) -> &SimulationConfig {
        self.world.config()
    }

    pub fn log(&self) -> &DebugLog {
        self.world.log()
    }

    pub fn buses(&self) -> &Buses {
        &self.buses
    }

    pub fn memory(&self) -> &MemoryRef {
        &self.memory
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Result of the ALU's most recent operation.
    pub fn alu_output(&self) -> Option<BitInteger> {
        self.alu.borrow().last_output().cloned()
    }

    /// Evaluate flag condition `index` now.
    pub fn condition(&self, index: usize) -> bool {
        self.flags.borrow().condition(index)
    }

    /// Current value of a register by name (`CO`, `RI`, ..., `RAM`).
    pub fn register(&self, name: &str) -> Option<BitInteger> {
        let value = match name.to_ascii_uppercase().as_str() {
            "CO" => self.co.borrow().current_value().clone(),
            "RI" => self.ri.borrow().current_value().clone(),
            "RE" => self.re.borrow().current_value().clone(),
            "RX" => self.rx.borrow().current_value().clone(),
            "RA" => self.ra.borrow().current_value().clone(),
            "RB" => self.rb.borrow().current_value().clone(),
            "RC" => self.rc.borrow().current_value().clone(),
            "SP" => self.sp.borrow().current_value().clone(),
            "RAM" => self.ram.borrow().current_value().clone(),
            _ => return None,
        };
        Some(value)
    }

    /// Every register in wiring order.
    pub fn registers(&self) -> Vec<(&'static str, BitInteger)> {
        REGISTER_NAMES
            .iter()
            .filter_map(|name| self.register(name).map(|v| (*name, v)))
            .collect()
    }

    /// Load a register directly, bypassing buses and clock.
    pub fn preset_register(&mut self, name: &str, value: &BitInteger) -> bool {
        match name.to_ascii_uppercase().as_str() {
            "CO" => self.co.borrow_mut().inner_mut().inner_mut().preset(value),
            "RI" => self.ri.borrow_mut().inner_mut().inner_mut().preset(value),
            "RE" => self.re.borrow_mut().inner_mut().inner_mut().preset(value),
            "RX" => self.rx.borrow_mut().inner_mut().inner_mut().preset(value),
            "RA" => self.ra.borrow_mut().inner_mut().inner_mut().preset(value),
            "RB" => self.rb.borrow_mut().inner_mut().inner_mut().preset(value),
            "RC" => self.rc.borrow_mut().inner_mut().inner_mut().preset(value),
            "SP" => self.sp.borrow_mut().inner_mut().inner_mut().preset(value),
            "RAM" => self.ram.borrow_mut().inner_mut().preset(value),
            _ => return false,
        }
        true
    }

    pub fn snapshot(&self) -> ArchitectureSnapshot {
        ArchitectureSnapshot {
            elapsed_atu: self.world.time_since_start(),
            cycles: self.sequencer.cycles(),
            phase: self.sequencer.phase(),
            instruction_phase: self.sequencer.instruction_phase(),
            micro_address: self.sequencer.micro_address(),
            microinstruction: self.sequencer.instruction(),
            registers: self
                .registers()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_i64()))
                .collect(),
            memory: self
                .memory
                .borrow()
                .dump()
                .into_iter()
                .map(|(address, value)| (address, value.to_i64()))
                .collect(),
        }
    }
}

/// Flag conditions: 1 `RA == 0`, 2 `RB == 0`, 3 `RA > 0`, 4 `RB > 0`,
/// 5 `RA` even, 6 `RB` even.
fn install_conditions(
    flags: &mut FlagRegister,
    ra: &Shared<ArchRegister>,
    rb: &Shared<ArchRegister>,
) -> Result<(), SimError> {
    for (offset, reg) in [ra, rb].into_iter().enumerate() {
        let r = reg.clone();
        flags.set_condition(1 + offset, move || r.borrow().current_value().is_zero())?;
        let r = reg.clone();
        flags.set_condition(3 + offset, move || {
            let value = r.borrow().current_value().clone();
            !value.is_zero() && !value.is_negative()
        })?;
        let r = reg.clone();
        flags.set_condition(5 + offset, move || !r.borrow().current_value().bit(0))?;
    }
    Ok(())
}

impl std::fmt::Debug for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Architecture");
        for (name, value) in self.registers() {
            s.field(name, &value.to_i64());
        }
        s.field("sequencer", &self.sequencer).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::central;
    use crate::sim::{Level, SignalSnapshot};

    fn machine() -> Architecture {
        Architecture::with_builtin_microprogram(SimulationConfig::default()).unwrap()
    }

    /// Hold `levels`, strobe `pulses`, then commit with the register clock.
    fn drive(arch: &mut Architecture, levels: &[Signal], pulses: &[Signal]) {
        let world = arch.world_mut();
        for signal in levels {
            world.emit(*signal, 5);
        }
        world.wait_and_tick(5, 1);
        for signal in pulses {
            world.emit(*signal, 1);
        }
        world.wait_and_tick(1, 1);
        world.emit(Signal::RegClock, 1);
        world.wait_and_tick(1, 1);
    }

    fn value(arch: &Architecture, name: &str) -> i128 {
        arch.register(name).map(|v| v.to_i128()).unwrap_or(i128::MIN)
    }

    #[test]
    fn test_fetch_loads_first_instruction() {
        let mut arch = machine();
        let word = central::encode(1, 10).unwrap();
        arch.load_program(&[word.clone()]).unwrap();

        let signals = Rc::new(RefCell::new(Vec::new()));
        let sink = signals.clone();
        arch.world_mut().attach(move |_: u64, s: &SignalSnapshot| {
            for signal in s.active() {
                if !sink.borrow().contains(&signal) {
                    sink.borrow_mut().push(signal);
                }
            }
        });

        arch.step();
        assert_eq!(arch.sequencer().micro_address(), 1021);
        arch.step();
        arch.step();
        assert_eq!(
            *signals.borrow(),
            vec![
                Signal::ERamm,
                Signal::SwitchRamm,
                Signal::ERemm,
                Signal::SwitchRemm,
                Signal::SendLevels,
                Signal::Cob1,
                Signal::Xs,
                Signal::SendPulses,
                Signal::ERam,
                Signal::RegClock,
            ]
        );

        arch.run(2);
        assert_eq!(arch.register("RE"), Some(word.clone()));
        assert_eq!(arch.register("RI"), Some(word));
        assert_eq!(arch.buses().copma.borrow().value().to_u64(), 1);
    }

    #[test]
    fn test_alu_and_flags() {
        let mut arch = machine();
        assert_eq!(value(&arch, "RA"), 0);
        assert!(arch.condition(1));
        assert!(arch.condition(2));
        assert!(!arch.condition(3));
        assert!(!arch.condition(4));
        assert!(arch.condition(5));
        assert!(arch.condition(6));

        drive(&mut arch, &[Signal::Rab1, Signal::Xp1], &[Signal::ERa]);
        assert_eq!(value(&arch, "RA"), 1);
        assert!(!arch.condition(1));
        assert!(arch.condition(3));
        assert!(!arch.condition(5));

        drive(&mut arch, &[Signal::Rbb1, Signal::Xp1], &[Signal::ERb]);
        assert_eq!(value(&arch, "RB"), 1);

        drive(&mut arch, &[Signal::Rab1, Signal::Rbb2, Signal::Add], &[Signal::ERa]);
        assert_eq!(value(&arch, "RA"), 2);

        drive(&mut arch, &[Signal::Rab1, Signal::Rab2, Signal::Mul], &[Signal::ERa]);
        assert_eq!(value(&arch, "RA"), 4);

        drive(&mut arch, &[Signal::Rab1, Signal::Rbb2, Signal::Sub], &[Signal::ERb]);
        assert_eq!(value(&arch, "RB"), 3);

        drive(&mut arch, &[Signal::Rab1, Signal::Rbb2, Signal::Or], &[Signal::ERa]);
        assert_eq!(value(&arch, "RA"), 7);

        drive(&mut arch, &[Signal::Rab1, Signal::Rbb2, Signal::And], &[Signal::ERa]);
        assert_eq!(value(&arch, "RA"), 3);

        drive(&mut arch, &[Signal::Rab1, Signal::Rbb2, Signal::Xor], &[Signal::ERa]);
        assert_eq!(value(&arch, "RA"), 0);
        assert_eq!(arch.alu_output().map(|v| v.to_i128()), Some(0));
        assert_eq!(arch.log().count_at_least(Level::Warn), 0);
    }

    #[test]
    fn test_negative_is_not_positive() {
        let mut arch = machine();
        arch.preset_register("RA", &BitInteger::int(-4, 32));
        assert!(!arch.condition(1));
        assert!(!arch.condition(3));
        assert!(arch.condition(5));
    }

    #[test]
    fn test_memory_round_trip_through_re() {
        let mut arch = machine();
        arch.preset_register("RAM", &BitInteger::uint(7, 10));
        arch.preset_register("RE", &BitInteger::int(-99, 32));

        drive(&mut arch, &[], &[Signal::EM]);
        assert_eq!(arch.memory().borrow().read(7).to_i128(), -99);

        arch.preset_register("RE", &BitInteger::zero(32, true));
        drive(&mut arch, &[], &[Signal::SM]);
        assert_eq!(value(&arch, "RE"), -99);
    }

    #[test]
    fn test_address_too_wide_for_ram_is_rejected() {
        let mut arch = machine();
        arch.preset_register("RAM", &BitInteger::uint(3, 10));
        arch.preset_register("CO", &BitInteger::int(2000, 32));

        drive(&mut arch, &[Signal::Cob1, Signal::Xs], &[Signal::ERam]);
        assert_eq!(value(&arch, "RAM"), 3);
        assert!(arch.log().count(Level::Crit) >= 1);
        assert!(arch.log().messages(Level::Crit).iter().any(|m| m.contains("RAM")));

        arch.preset_register("CO", &BitInteger::int(-1, 32));
        drive(&mut arch, &[Signal::Cob1, Signal::Xs], &[Signal::ERam]);
        assert_eq!(value(&arch, "RAM"), 3);
    }

    #[test]
    fn test_demo_program() {
        let mut arch = machine();
        let program = [
            central::encode(1, 10).unwrap(),
            central::encode(11, 12).unwrap(),
            central::encode(103, 0).unwrap(),
        ];
        arch.load_program(&program).unwrap();

        arch.run(5);
        assert_eq!(value(&arch, "RA"), 10);
        assert_eq!(value(&arch, "CO"), 1);
        assert_eq!(arch.sequencer().instruction_phase(), 1);

        arch.run(10);
        assert_eq!(value(&arch, "RA"), 10);
        assert_eq!(value(&arch, "RB"), 12);
        assert_eq!(value(&arch, "RC"), 22);
        assert_eq!(value(&arch, "CO"), 3);
        assert_eq!(arch.log().count_at_least(Level::Warn), 0);

        let snapshot = arch.snapshot();
        assert_eq!(snapshot.cycles, 15);
        assert_eq!(snapshot.registers.get("RC"), Some(&22));
        assert_eq!(snapshot.memory.len(), 3);
        assert_eq!(snapshot.phase, CyclePhase::LoadAddressRegister);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimulationConfig { copma_bits: 40, ..SimulationConfig::default() };
        assert!(matches!(Architecture::new(config), Err(ArchitectureError::Config(_))));
    }

    #[test]
    fn test_register_lookup() {
        let arch = machine();
        assert_eq!(arch.registers().len(), 9);
        assert!(arch.register("ra").is_some());
        assert!(arch.register("XY").is_none());
    }
}
