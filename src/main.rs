//! vonsim - CLI Entry Point
//!
//! Commands:
//! - `vonsim run [program]` - Run a central-memory program on the machine
//! - `vonsim encode ADDR SELMS COND [SIGNALS..]` - Build a microword
//! - `vonsim decode WORD` - Show the fields of a microword
//! - `vonsim disasm <program>` - Translate a program with the instruction table
//! - `vonsim config` - Print the default configuration

use clap::{Parser, Subcommand};
use vonsim::asm::central::{self, WordLayout};
use vonsim::asm::{self, MicroInstruction};
use vonsim::{Architecture, BitInteger, Level, Signal, SimulationConfig};

#[derive(Parser)]
#[command(name = "vonsim")]
#[command(version = "0.1.0")]
#[command(about = "A signal-level simulator of a microprogrammed von Neumann computer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run microinstruction cycles on a program
    Run {
        /// Central-memory program file (default: built-in demo)
        program: Option<String>,
        /// Microprogram source file (default: built-in microprogram)
        #[arg(short, long)]
        microprogram: Option<String>,
        /// Number of microinstruction cycles to run
        #[arg(short, long, default_value = "15")]
        cycles: u64,
        /// Print the machine state after every cycle
        #[arg(short, long)]
        trace: bool,
        /// Configuration file (JSON)
        #[arg(long)]
        config: Option<String>,
        /// Print every debug log level, not only warnings and errors
        #[arg(short, long)]
        verbose: bool,
        /// Print the final state as a JSON snapshot
        #[arg(long)]
        json: bool,
    },
    /// Encode a microinstruction
    Encode {
        /// Next microprogram address
        next_address: u64,
        /// Next-address selector (0-3)
        sel_ms: u8,
        /// Condition index (0-15)
        condition: u8,
        /// Signal mnemonics (eRA, RAB1, ...)
        signals: Vec<String>,
    },
    /// Decode a microword given in binary (0b), hex (0x) or decimal
    Decode {
        word: String,
    },
    /// Translate a central-memory program file
    Disasm {
        program: String,
    },
    /// Print the default configuration as JSON
    Config,
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { program, microprogram, cycles, trace, config, verbose, json }) => {
            run_machine(program.as_deref(), microprogram.as_deref(), cycles, trace, config.as_deref(), verbose, json);
        }
        Some(Commands::Encode { next_address, sel_ms, condition, signals }) => {
            encode_word(next_address, sel_ms, condition, &signals);
        }
        Some(Commands::Decode { word }) => {
            decode_word(&word);
        }
        Some(Commands::Disasm { program }) => {
            disassemble_file(&program);
        }
        Some(Commands::Config) => match SimulationConfig::default().to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("❌ {}", e);
                std::process::exit(1);
            }
        },
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("vonsim v0.1.0");
            println!("A microprogrammed von Neumann machine simulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

fn run_machine(
    program: Option<&str>,
    microprogram: Option<&str>,
    cycles: u64,
    trace: bool,
    config_path: Option<&str>,
    verbose: bool,
    json: bool,
) {
    let config = match config_path {
        Some(path) => SimulationConfig::from_json_file(path).unwrap_or_else(|e| fail(e)),
        None => SimulationConfig::default(),
    };
    let layout = WordLayout::from(&config);

    let program = match program {
        Some(path) => asm::load_program(path, &layout).unwrap_or_else(|e| fail(e)),
        None => asm::demo_program(),
    };
    if program.is_empty() {
        fail("no words to load");
    }

    let mut arch = Architecture::new(config).unwrap_or_else(|e| fail(e));
    let words = match microprogram {
        Some(path) => {
            let source = std::fs::read_to_string(path).unwrap_or_else(|e| fail(format!("failed to read {}: {}", path, e)));
            asm::assemble_microprogram(&source).unwrap_or_else(|e| fail(e))
        }
        None => asm::builtin_microprogram(arch.config().fetch_address),
    };
    arch.load_microprogram(&words).unwrap_or_else(|e| fail(e));
    arch.load_program(&program.words).unwrap_or_else(|e| fail(e));

    if !json {
        println!("📂 Loaded {} words, {} microinstructions", program.len(), words.len());
        println!();
        println!("━━━ Execution ━━━");
    }

    for cycle in 0..cycles {
        arch.phase_by_phase();
        if trace && !json {
            println!(
                "{:4}: µ{:04} {:<40} {}",
                cycle + 1,
                arch.sequencer().micro_address(),
                arch.sequencer().instruction().to_string(),
                register_line(&arch)
            );
        }
    }

    if json {
        match serde_json::to_string_pretty(&arch.snapshot()) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(e),
        }
    } else {
        println!();
        println!("━━━ Result ━━━");
        println!("Cycles: {}  ({} ATU)", arch.sequencer().cycles(), arch.world().time_since_start());
        for (name, value) in arch.registers() {
            println!("{:<4} {:>12}  {}", name, value.to_i128(), value.to_binary());
        }
        if let Some(ri) = arch.register("RI") {
            println!("RI holds: {}", central::translate(&ri));
        }
    }

    let lowest = if verbose { Level::Log } else { Level::Warn };
    for level in Level::ALL.iter().filter(|l| **l >= lowest) {
        for message in arch.log().messages(*level) {
            eprintln!("[{}] {}", level, message);
        }
    }
}

fn register_line(arch: &Architecture) -> String {
    arch.registers()
        .iter()
        .map(|(name, value)| format!("{}={}", name, value.to_i128()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn encode_word(next_address: u64, sel_ms: u8, condition: u8, names: &[String]) {
    let signals: Vec<Signal> = names
        .iter()
        .map(|name| name.parse::<Signal>().unwrap_or_else(|e| fail(e)))
        .collect();
    let mi = MicroInstruction::new(next_address, sel_ms, condition, &signals);
    let word = mi.encode(SimulationConfig::default().microprogram_word_bits).unwrap_or_else(|e| fail(e));
    println!("{}", word.to_binary());
    println!("0x{:016X}", word.to_u128());
}

fn parse_word(text: &str, width: usize) -> Option<BitInteger> {
    let text = text.trim().replace('_', "");
    let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u128::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = text.strip_prefix("0b") {
        u128::from_str_radix(bin, 2).ok()?
    } else {
        text.parse::<u128>().ok()?
    };
    let word = BitInteger::uint(value, 128);
    word.fits(width, false).then(|| word.cast(width, false))
}

fn decode_word(text: &str) {
    let width = SimulationConfig::default().microprogram_word_bits;
    let word = parse_word(text, width).unwrap_or_else(|| fail(format!("not a {}-bit word: {}", width, text)));
    let mi = MicroInstruction::decode(&word).unwrap_or_else(|e| fail(e));
    println!("next address: {}", mi.next_address);
    println!("selMS:        {}", mi.sel_ms);
    println!("condition:    {}", mi.condition);
    let names: Vec<&str> = mi.signals.iter().map(|s| s.name()).collect();
    println!("signals:      {}", names.join(" "));
}

fn disassemble_file(path: &str) {
    let program = asm::load_program(path, &WordLayout::default()).unwrap_or_else(|e| fail(e));
    println!("📖 Disassembling: {}", path);
    println!();
    print!("{}", asm::disassemble(&program.words));
}

fn run_self_test() {
    println!("━━━ vonsim Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;
    let mut check = |name: &str, ok: bool| {
        if ok {
            println!("{}... ✓", name);
            passed += 1;
        } else {
            println!("{}... ✗", name);
            failed += 1;
        }
    };

    let a = BitInteger::int(-7, 32);
    let b = BitInteger::int(12, 32);
    check("Two's-complement addition", a.add(&b).to_i128() == 5);
    check("Multiplication wraps at width", BitInteger::int(1 << 30, 32).mult(&BitInteger::int(4, 32)).is_zero());

    let mi = MicroInstruction::new(512, 3, 0, &[Signal::Rib1, Signal::Xs, Signal::ERa]);
    let round_trip = mi.encode(64).and_then(|w| MicroInstruction::decode(&w));
    check("Microword round trip", matches!(round_trip, Ok(ref d) if *d == mi));

    let translated = central::encode(1, 10).map(|w| central::translate(&w));
    check("Instruction table", matches!(translated.as_deref(), Ok("LOAD A Immediate 10")));

    match Architecture::with_builtin_microprogram(SimulationConfig::default()) {
        Ok(mut arch) => {
            let loaded = arch.load_program(&asm::demo_program().words).is_ok();
            arch.run(15);
            let value = |name: &str| arch.register(name).map(|v| v.to_i128());
            check(
                "Demo program (RC = 10 + 12)",
                loaded && value("RA") == Some(10) && value("RB") == Some(12) && value("RC") == Some(22),
            );
            check("No warnings during run", arch.log().count_at_least(Level::Warn) == 0);
        }
        Err(e) => check(&format!("Architecture construction ({})", e), false),
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
