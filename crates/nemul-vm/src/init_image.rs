//! The bootstrap program installed as pid 1.
//!
//! The image is a flat ARM binary loaded at offset 0 of the process memory.
//! The first page is reserved, so the code starts at [`ENTRY_POINT`]. The
//! program idles by issuing syscall 0 forever; the syscall layer decides what
//! that means.

use nemul_cpu::SYSCALL_INSN;

use crate::process::ENTRY_POINT;

/// Memory size of the init process.
pub const INIT_MEM_SIZE: usize = 1024 * 1024;

const INIT_CODE: [u32; 3] = [
    0xE3A0_0000, // mov r0, #0
    SYSCALL_INSN,
    0xEAFF_FFFC, // b ENTRY_POINT
];

/// Build the default init image, padded to [`INIT_MEM_SIZE`].
pub fn default_image() -> Vec<u8> {
    let mut image = vec![0u8; INIT_MEM_SIZE];
    for (i, word) in INIT_CODE.iter().enumerate() {
        let off = ENTRY_POINT as usize + i * 4;
        image[off..off + 4].copy_from_slice(&word.to_le_bytes());
    }
    image
}

/// Lay out a caller-supplied flat binary as an init image. The binary is
/// copied verbatim to offset 0 and padded with zeroes to at least
/// [`INIT_MEM_SIZE`].
pub fn from_flat_binary(binary: &[u8]) -> Vec<u8> {
    let mut image = vec![0u8; binary.len().max(INIT_MEM_SIZE)];
    image[..binary.len()].copy_from_slice(binary);
    image
}
