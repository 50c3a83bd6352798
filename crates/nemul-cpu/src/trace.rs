//! Differential replay of instruction traces captured on real hardware.
//!
//! A trace is a JSON-lines file of [`TraceRecord`]s: the register file before
//! an instruction, the instruction word, and the register file the hardware
//! produced. Each record is replayed through [`crate::step_forced_unbacked`]
//! against a scratch memory image.
//!
//! The scratch image does not hold the memory contents the hardware saw, so
//! loads are allowed to diverge. Stores to addresses the image does not cover
//! are dropped. Every instruction other than a load, stores included, must
//! reproduce the captured registers and CPSR exactly.

use std::io::BufRead;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interp::step_forced_unbacked;
use crate::outcome::Outcome;
use crate::state::CpuState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub before: CpuState,
    pub insn: u32,
    pub after: CpuState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    /// A load produced different results; expected without the captured
    /// memory contents.
    LoadDiverged,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("instruction {insn:#010x} diverged (outcome {outcome:?})")]
pub struct Divergence {
    pub insn: u32,
    pub outcome: Outcome,
    pub expected: CpuState,
    pub actual: CpuState,
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("trace line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse a JSON-lines trace. Blank lines and lines starting with `#` are
/// skipped.
pub fn parse_records<R: BufRead>(reader: R) -> Result<Vec<TraceRecord>, TraceError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record = serde_json::from_str(trimmed).map_err(|source| TraceError::Parse {
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Replay one record and compare against the captured result.
pub fn replay(record: &TraceRecord, mem: &mut [u8]) -> Result<Verdict, Divergence> {
    let mut state = record.before;
    let outcome = step_forced_unbacked(&mut state, mem, record.insn);

    if outcome.is_ok() && state == record.after {
        return Ok(Verdict::Match);
    }
    if is_load(record.insn) && (outcome.is_ok() || outcome.is_memory_fault()) {
        return Ok(Verdict::LoadDiverged);
    }
    Err(Divergence {
        insn: record.insn,
        outcome,
        expected: record.after,
        actual: state,
    })
}

/// Whether `insn` reads data memory (LDR*, LDM, SWP).
pub fn is_load(insn: u32) -> bool {
    let load_bit = insn & (1 << 20) != 0;
    match (insn >> 25) & 7 {
        2 | 3 | 4 => load_bit,
        0 => {
            if insn & 0x0FB0_0FF0 == 0x0100_0090 {
                return true;
            }
            if insn & 0x90 != 0x90 || insn & 0x60 == 0 {
                return false;
            }
            // LDRH/LDRSB/LDRSH have L set; LDRD is the L-clear SH=10 form.
            load_bit || insn & 0x60 == 0x40
        }
        _ => false,
    }
}
