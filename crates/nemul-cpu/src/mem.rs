//! Guest memory access helpers.
//!
//! Every load and store issued by the interpreter goes through these
//! functions. Process images are flat little-endian byte buffers; the first
//! page is reserved so null and small pointers always fault.

/// Lowest address a guest may touch. Everything below is reserved.
pub const MIN_VALID_ADDR: u32 = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemFault {
    /// The address is not a multiple of the access size.
    Alignment,
    /// The access falls outside `[MIN_VALID_ADDR, mem.len())`.
    DataAbort,
}

/// Validate an access of `size` bytes at `addr` and return the buffer offset.
///
/// Alignment is checked before bounds.
#[inline]
pub fn check(mem: &[u8], addr: u32, size: u32) -> Result<usize, MemFault> {
    if addr % size != 0 {
        return Err(MemFault::Alignment);
    }
    let end = u64::from(addr) + u64::from(size);
    if addr < MIN_VALID_ADDR || end > mem.len() as u64 {
        return Err(MemFault::DataAbort);
    }
    Ok(addr as usize)
}

/// Like [`check`] for a byte range that has no alignment requirement.
pub fn check_range(mem: &[u8], addr: u32, len: usize) -> Result<usize, MemFault> {
    let end = u64::from(addr) + len as u64;
    if addr < MIN_VALID_ADDR || end > mem.len() as u64 {
        return Err(MemFault::DataAbort);
    }
    Ok(addr as usize)
}

pub fn read_u8(mem: &[u8], addr: u32) -> Result<u8, MemFault> {
    let off = check(mem, addr, 1)?;
    Ok(mem[off])
}

pub fn read_u16(mem: &[u8], addr: u32) -> Result<u16, MemFault> {
    let off = check(mem, addr, 2)?;
    Ok(u16::from_le_bytes([mem[off], mem[off + 1]]))
}

pub fn read_u32(mem: &[u8], addr: u32) -> Result<u32, MemFault> {
    let off = check(mem, addr, 4)?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&mem[off..off + 4]);
    Ok(u32::from_le_bytes(buf))
}

/// Doubleword read, returned as `(low word, high word)`.
pub fn read_u64(mem: &[u8], addr: u32) -> Result<(u32, u32), MemFault> {
    let off = check(mem, addr, 8)?;
    let mut lo = [0u8; 4];
    let mut hi = [0u8; 4];
    lo.copy_from_slice(&mem[off..off + 4]);
    hi.copy_from_slice(&mem[off + 4..off + 8]);
    Ok((u32::from_le_bytes(lo), u32::from_le_bytes(hi)))
}

pub fn write_u8(mem: &mut [u8], addr: u32, val: u8) -> Result<(), MemFault> {
    let off = check(mem, addr, 1)?;
    mem[off] = val;
    Ok(())
}

pub fn write_u16(mem: &mut [u8], addr: u32, val: u16) -> Result<(), MemFault> {
    let off = check(mem, addr, 2)?;
    mem[off..off + 2].copy_from_slice(&val.to_le_bytes());
    Ok(())
}

pub fn write_u32(mem: &mut [u8], addr: u32, val: u32) -> Result<(), MemFault> {
    let off = check(mem, addr, 4)?;
    mem[off..off + 4].copy_from_slice(&val.to_le_bytes());
    Ok(())
}

pub fn write_u64(mem: &mut [u8], addr: u32, lo: u32, hi: u32) -> Result<(), MemFault> {
    let off = check(mem, addr, 8)?;
    mem[off..off + 4].copy_from_slice(&lo.to_le_bytes());
    mem[off + 4..off + 8].copy_from_slice(&hi.to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_is_reported_before_bounds() {
        let mem = vec![0u8; 0x2000];
        assert_eq!(read_u32(&mem, 0x0002), Err(MemFault::Alignment));
        assert_eq!(read_u32(&mem, 0x0004), Err(MemFault::DataAbort));
        assert_eq!(read_u32(&mem, 0x2001), Err(MemFault::Alignment));
    }

    #[test]
    fn end_of_image_is_exclusive() {
        let mut mem = vec![0u8; 0x2000];
        assert!(write_u32(&mut mem, 0x1FFC, 0xAABB_CCDD).is_ok());
        assert_eq!(read_u8(&mem, 0x1FFF), Ok(0xAA));
        assert_eq!(read_u8(&mem, 0x2000), Err(MemFault::DataAbort));
        assert_eq!(read_u64(&mem, 0x1FF8), Ok((0, 0xAABB_CCDD)));
        assert_eq!(read_u32(&mem, 0xFFFF_FFFC), Err(MemFault::DataAbort));
    }
}
