//! Microprogram assembler.
//!
//! Syntax:
//! ```text
//! ; Comment
//! @EPILOGUE = 512               ; Define a symbolic address
//! 1: @EPILOGUE JUMP 0 RIB1 XS eRA
//! @EPILOGUE: 0 NEXT 0 COB1 XP1 eCO FIN
//! ```
//!
//! Each instruction line is `ADDR: NEXT SELMS COND SIGNAL...`. Addresses and
//! the next-address field are integers or `@NAME` symbols; symbols may be
//! used before their definition. `SELMS` is `0`-`3` or one of `NEXT`,
//! `COND`, `COPMA`, `JUMP`. Signals use their mnemonics (`eRA`, `RAB1`, ...)
//! and must be storable in microcode.

use std::collections::HashMap;
use crate::asm::microcode::{sel_ms, MicroInstruction, MicrocodeError, ADDRESS_BITS, CONDITION_BITS};
use crate::sim::Signal;

/// Assemble microprogram source into `(address, microinstruction)` pairs, in
/// source order.
pub fn assemble_microprogram(source: &str) -> Result<Vec<(u64, MicroInstruction)>, MicrocodeError> {
    let mut asm = MicroAssembler::new();
    asm.assemble(source)
}

/// Listing that [`assemble_microprogram`] reads back.
pub fn format_microprogram(words: &[(u64, MicroInstruction)]) -> String {
    let mut output = String::new();
    for (address, mi) in words {
        output.push_str(&format!("{:4}: {}\n", address, mi));
    }
    output
}

struct MicroAssembler {
    /// Symbol table (name -> address).
    symbols: HashMap<String, u64>,
    output: Vec<(u64, MicroInstruction)>,
}

impl MicroAssembler {
    fn new() -> Self {
        Self { symbols: HashMap::new(), output: Vec::new() }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<(u64, MicroInstruction)>, MicrocodeError> {
        let lines: Vec<(usize, &str)> = source
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, strip_comment(line)))
            .filter(|(_, line)| !line.is_empty())
            .collect();

        // Pass 1: symbol definitions
        for (line_num, line) in &lines {
            if let Some((name, value)) = line.split_once('=') {
                self.define(name.trim(), value.trim(), *line_num)?;
            }
        }

        // Pass 2: instructions
        for (line_num, line) in &lines {
            if !line.contains('=') {
                self.process_instruction(line, *line_num)?;
            }
        }

        Ok(std::mem::take(&mut self.output))
    }

    fn define(&mut self, name: &str, value: &str, line_num: usize) -> Result<(), MicrocodeError> {
        let symbol = name.strip_prefix('@').filter(|s| is_identifier(s)).ok_or_else(|| {
            MicrocodeError::Syntax { line: line_num, message: format!("invalid symbol name '{}'", name) }
        })?;
        let address = value.parse::<u64>().map_err(|_| MicrocodeError::Syntax {
            line: line_num,
            message: format!("symbol value must be an address, found '{}'", value),
        })?;
        check_address(address, line_num)?;
        if self.symbols.insert(symbol.to_uppercase(), address).is_some() {
            return Err(MicrocodeError::Syntax {
                line: line_num,
                message: format!("symbol '{}' defined twice", symbol),
            });
        }
        Ok(())
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), MicrocodeError> {
        let (address, body) = line.split_once(':').ok_or_else(|| MicrocodeError::Syntax {
            line: line_num,
            message: "expected 'ADDR: NEXT SELMS COND SIGNALS'".into(),
        })?;
        let address = self.resolve(address.trim(), line_num)?;

        let parts: Vec<&str> = body.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(MicrocodeError::Syntax {
                line: line_num,
                message: format!("expected NEXT SELMS COND, found {} field(s)", parts.len()),
            });
        }

        let next_address = self.resolve(parts[0], line_num)?;
        let selector = parse_sel_ms(parts[1], line_num)?;
        let condition = parts[2]
            .parse::<u8>()
            .ok()
            .filter(|c| (*c as u64) < (1 << CONDITION_BITS))
            .ok_or_else(|| MicrocodeError::Syntax {
                line: line_num,
                message: format!("invalid condition '{}'", parts[2]),
            })?;

        let mut signals = Vec::with_capacity(parts.len() - 3);
        for name in &parts[3..] {
            let signal: Signal = name.parse().map_err(|_| MicrocodeError::UnknownSignal {
                line: line_num,
                name: name.to_string(),
            })?;
            if signal.microcode_bit().is_none() {
                return Err(MicrocodeError::Syntax {
                    line: line_num,
                    message: format!("signal {} cannot be stored in microcode", signal),
                });
            }
            signals.push(signal);
        }

        if self.output.iter().any(|(a, _)| *a == address) {
            return Err(MicrocodeError::DuplicateAddress { line: line_num, address });
        }
        self.output.push((address, MicroInstruction::new(next_address, selector, condition, &signals)));
        Ok(())
    }

    fn resolve(&self, token: &str, line_num: usize) -> Result<u64, MicrocodeError> {
        if let Some(name) = token.strip_prefix('@') {
            return self.symbols.get(&name.to_uppercase()).copied().ok_or_else(|| {
                MicrocodeError::UndefinedLabel { line: line_num, label: name.to_string() }
            });
        }
        let address = token.parse::<u64>().map_err(|_| MicrocodeError::Syntax {
            line: line_num,
            message: format!("invalid address '{}'", token),
        })?;
        check_address(address, line_num)?;
        Ok(address)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_address(address: u64, line_num: usize) -> Result<(), MicrocodeError> {
    if address >= 1 << ADDRESS_BITS {
        return Err(MicrocodeError::Syntax {
            line: line_num,
            message: format!("address {} outside microprogram memory", address),
        });
    }
    Ok(())
}

fn parse_sel_ms(token: &str, line_num: usize) -> Result<u8, MicrocodeError> {
    let value = match token.to_uppercase().as_str() {
        "NEXT" => Some(sel_ms::NEXT),
        "COND" | "CONDITIONAL" => Some(sel_ms::CONDITIONAL),
        "COPMA" => Some(sel_ms::COPMA),
        "JUMP" => Some(sel_ms::JUMP),
        other => other.parse::<u8>().ok().filter(|v| *v <= sel_ms::JUMP),
    };
    value.ok_or_else(|| MicrocodeError::Syntax {
        line: line_num,
        message: format!("invalid selMS '{}'", token),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::microcode::builtin_microprogram;

    #[test]
    fn test_assemble_with_symbols() {
        let source = r#"
            ; LOAD A Immediate
            1: @EPILOGUE JUMP 0 RIB1 XS eRA
            @EPILOGUE = 512
            @EPILOGUE: 0 NEXT 0 COB1 XP1 eCO FIN
        "#;
        let words = assemble_microprogram(source).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].0, 1);
        assert_eq!(words[0].1.next_address, 512);
        assert_eq!(words[0].1.sel_ms, sel_ms::JUMP);
        assert_eq!(words[0].1.signals, vec![Signal::ERa, Signal::Rib1, Signal::Xs]);
        assert_eq!(words[1].0, 512);
        assert!(words[1].1.signals.contains(&Signal::Fin));
    }

    #[test]
    fn test_listing_reassembles() {
        let builtin = builtin_microprogram(1021);
        let listing = format_microprogram(&builtin);
        assert_eq!(assemble_microprogram(&listing).unwrap(), builtin);
    }

    #[test]
    fn test_errors_carry_line() {
        assert!(matches!(
            assemble_microprogram("1: 0 NEXT 0 RAB1 FLY"),
            Err(MicrocodeError::UnknownSignal { line: 1, .. })
        ));
        assert!(matches!(
            assemble_microprogram("\n2: @NOWHERE JUMP 0"),
            Err(MicrocodeError::UndefinedLabel { line: 2, .. })
        ));
        assert!(matches!(
            assemble_microprogram("1: 0 0 0\n1: 0 0 0"),
            Err(MicrocodeError::DuplicateAddress { line: 2, address: 1 })
        ));
        assert!(matches!(assemble_microprogram("1: 0 5 0"), Err(MicrocodeError::Syntax { line: 1, .. })));
        assert!(matches!(assemble_microprogram("1: 0 0 16"), Err(MicrocodeError::Syntax { .. })));
        assert!(matches!(assemble_microprogram("1024: 0 0 0"), Err(MicrocodeError::Syntax { .. })));
        assert!(matches!(assemble_microprogram("1: 0 0 0 REGSIGCLOCK"), Err(MicrocodeError::Syntax { .. })));
        assert!(matches!(assemble_microprogram("1 0 0 0"), Err(MicrocodeError::Syntax { .. })));
    }
}
