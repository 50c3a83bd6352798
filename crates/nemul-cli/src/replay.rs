use std::fs::File;
use std::io::BufReader;

use anyhow::{bail, Context, Result};
use nemul_cpu::trace::{parse_records, replay, Divergence, Verdict};
use tracing::info;

use crate::config::ReplayArgs;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub records: usize,
    pub matched: usize,
    pub load_diverged: usize,
    pub diverged: usize,
}

pub fn run(args: &ReplayArgs) -> Result<()> {
    let file = File::open(&args.trace)
        .with_context(|| format!("failed to open trace {}", args.trace.display()))?;
    let records = parse_records(BufReader::new(file))
        .with_context(|| format!("failed to parse trace {}", args.trace.display()))?;
    info!(records = records.len(), "replaying trace");

    let mut mem = vec![0u8; args.mem_size];
    let mut summary = Summary {
        records: records.len(),
        ..Summary::default()
    };
    for (idx, record) in records.iter().enumerate() {
        // Stores from earlier records must not leak into later ones.
        mem.fill(0);
        match replay(record, &mut mem) {
            Ok(Verdict::Match) => summary.matched += 1,
            Ok(Verdict::LoadDiverged) => summary.load_diverged += 1,
            Err(divergence) => {
                summary.diverged += 1;
                report(idx + 1, &divergence);
            }
        }
    }

    println!(
        "{} records: {} matched, {} loads diverged, {} failed",
        summary.records, summary.matched, summary.load_diverged, summary.diverged
    );
    if summary.diverged > 0 {
        bail!(
            "{} of {} records diverged",
            summary.diverged,
            summary.records
        );
    }
    Ok(())
}

fn report(record: usize, d: &Divergence) {
    eprintln!("record {record}: {d}");
    for (i, (want, got)) in d.expected.regs.iter().zip(&d.actual.regs).enumerate() {
        if want != got {
            eprintln!("  r{i:<2} expected {want:#010x} got {got:#010x}");
        }
    }
    if d.expected.cpsr != d.actual.cpsr {
        eprintln!(
            "  cpsr expected {:#010x} got {:#010x}",
            d.expected.cpsr, d.actual.cpsr
        );
    }
}
