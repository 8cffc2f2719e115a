/*!
 * Wire framing for the transaction protocol: commands, paths, status
 * messages, block lists, and delta instruction streams.
 *
 * All integers are network byte order (big-endian), per §6. Strong hashes
 * are encoded as raw fixed-width bytes rather than hex — see DESIGN.md
 * (Open Question 1) for the rationale.
 */

pub mod session;

use std::io::{Read, Write};

use crate::config::HashAlgorithm;
use crate::core::hash::strong_hash_len;
use crate::core::{BlockInfo, DeltaInstruction};
use crate::error::{BlockSyncError, Result};

/// Hard cap on a command line, to bound memory on a malformed/hostile peer.
const MAX_COMMAND_LEN: usize = 64;

/// Hard cap on any length-prefixed string, same rationale.
const MAX_STRING_LEN: u32 = 1024 * 1024;

/// A protocol command, sent as an ASCII line terminated by `\n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Push,
    Pull,
}

impl Command {
    fn as_str(self) -> &'static str {
        match self {
            Self::Push => "PUSH",
            Self::Pull => "PULL",
        }
    }
}

impl std::str::FromStr for Command {
    type Err = BlockSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "PUSH" => Ok(Self::Push),
            "PULL" => Ok(Self::Pull),
            other => Err(BlockSyncError::Protocol(format!("unexpected command: {:?}", other))),
        }
    }
}

/// `ok` + human-readable reason, sent after each protocol phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub ok: bool,
    pub msg: String,
}

impl StatusMessage {
    pub fn ok(msg: impl Into<String>) -> Self {
        Self { ok: true, msg: msg.into() }
    }

    pub fn fail(msg: impl Into<String>) -> Self {
        Self { ok: false, msg: msg.into() }
    }
}

// --- primitive readers/writers -------------------------------------------------

fn write_u8(w: &mut impl Write, v: u8) -> Result<()> {
    w.write_all(&[v]).map_err(Into::into)
}

fn read_u8(r: &mut impl Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(|_| BlockSyncError::Framing("short read (u8)".to_string()))?;
    Ok(buf[0])
}

fn write_u32(w: &mut impl Write, v: u32) -> Result<()> {
    w.write_all(&v.to_be_bytes()).map_err(Into::into)
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|_| BlockSyncError::Framing("short read (u32)".to_string()))?;
    Ok(u32::from_be_bytes(buf))
}

fn write_u64(w: &mut impl Write, v: u64) -> Result<()> {
    w.write_all(&v.to_be_bytes()).map_err(Into::into)
}

fn read_u64(r: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|_| BlockSyncError::Framing("short read (u64)".to_string()))?;
    Ok(u64::from_be_bytes(buf))
}

fn write_string(w: &mut impl Write, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    write_u32(w, bytes.len() as u32)?;
    w.write_all(bytes).map_err(Into::into)
}

fn read_string(r: &mut impl Read) -> Result<String> {
    let len = read_u32(r)?;
    if len > MAX_STRING_LEN {
        return Err(BlockSyncError::Framing(format!("string length {} exceeds max", len)));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf).map_err(|_| BlockSyncError::Framing("short read (string body)".to_string()))?;
    String::from_utf8(buf).map_err(|e| BlockSyncError::Framing(format!("invalid utf-8: {}", e)))
}

fn write_bytes(w: &mut impl Write, bytes: &[u8]) -> Result<()> {
    write_u32(w, bytes.len() as u32)?;
    w.write_all(bytes).map_err(Into::into)
}

fn read_bytes(r: &mut impl Read) -> Result<Vec<u8>> {
    let len = read_u32(r)?;
    if len > MAX_STRING_LEN {
        return Err(BlockSyncError::Framing(format!("byte length {} exceeds max", len)));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf).map_err(|_| BlockSyncError::Framing("short read (bytes body)".to_string()))?;
    Ok(buf)
}

// --- command -------------------------------------------------------------------

pub fn send_command(w: &mut impl Write, command: Command) -> Result<()> {
    let line = format!("{}\n", command.as_str());
    w.write_all(line.as_bytes()).map_err(Into::into)
}

/// Read a `\n`-terminated ASCII command line, one byte at a time.
pub fn recv_command(r: &mut impl Read) -> Result<Command> {
    let mut line = Vec::with_capacity(8);
    loop {
        let byte = read_u8(r)?;
        if byte == b'\n' {
            break;
        }
        line.push(byte);
        if line.len() > MAX_COMMAND_LEN {
            return Err(BlockSyncError::Framing("command line too long".to_string()));
        }
    }
    let text = String::from_utf8(line).map_err(|e| BlockSyncError::Framing(format!("invalid utf-8 in command: {}", e)))?;
    text.parse()
}

// --- path / status ---------------------------------------------------------------

pub fn send_path(w: &mut impl Write, path: &str) -> Result<()> {
    write_string(w, path)
}

pub fn recv_path(r: &mut impl Read) -> Result<String> {
    read_string(r)
}

pub fn send_status(w: &mut impl Write, status: &StatusMessage) -> Result<()> {
    write_u8(w, if status.ok { 1 } else { 0 })?;
    write_string(w, &status.msg)
}

pub fn recv_status(r: &mut impl Read) -> Result<StatusMessage> {
    let ok_byte = read_u8(r)?;
    let msg = read_string(r)?;
    Ok(StatusMessage { ok: ok_byte != 0, msg })
}

// --- blocks ------------------------------------------------------------------

fn encode_block(w: &mut impl Write, block: &BlockInfo) -> Result<()> {
    write_u64(w, block.offset)?;
    write_u32(w, block.weak_hash)?;
    w.write_all(&block.strong_hash).map_err(Into::into)
}

fn decode_block(r: &mut impl Read, strong_len: usize) -> Result<BlockInfo> {
    let offset = read_u64(r)?;
    let weak_hash = read_u32(r)?;
    let mut strong = vec![0u8; strong_len];
    r.read_exact(&mut strong).map_err(|_| BlockSyncError::Framing("short read (strong hash)".to_string()))?;
    // `length` is not carried on the wire (§3 model): every block but the
    // last has the agreed block size, and the receiver only needs `length`
    // to validate against its own scan, which it does not do across the
    // wire. We record the zero-sentinel length, filled by the caller where
    // it is actually needed (none of the PUSH/PULL paths require it).
    Ok(BlockInfo::new(offset, 0, weak_hash, strong))
}

pub fn send_blocks(w: &mut impl Write, blocks: &[BlockInfo]) -> Result<()> {
    write_u32(w, blocks.len() as u32)?;
    for block in blocks {
        encode_block(w, block)?;
    }
    Ok(())
}

pub fn recv_blocks(r: &mut impl Read, hash_algorithm: HashAlgorithm) -> Result<Vec<BlockInfo>> {
    let count = read_u32(r)?;
    let strong_len = strong_hash_len(hash_algorithm);
    let mut blocks = Vec::with_capacity(count as usize);
    for _ in 0..count {
        blocks.push(decode_block(r, strong_len)?);
    }
    Ok(blocks)
}

// --- deltas ------------------------------------------------------------------

const TAG_COPY: u8 = 0;
const TAG_INSERT: u8 = 1;

fn encode_instruction(w: &mut impl Write, instruction: &DeltaInstruction) -> Result<()> {
    match instruction {
        DeltaInstruction::Copy { offset, length } => {
            write_u8(w, TAG_COPY)?;
            write_u64(w, *offset)?;
            write_u64(w, *length)
        }
        DeltaInstruction::Insert { bytes } => {
            write_u8(w, TAG_INSERT)?;
            write_bytes(w, bytes)
        }
    }
}

fn decode_instruction(r: &mut impl Read) -> Result<DeltaInstruction> {
    match read_u8(r)? {
        TAG_COPY => {
            let offset = read_u64(r)?;
            let length = read_u64(r)?;
            Ok(DeltaInstruction::Copy { offset, length })
        }
        TAG_INSERT => {
            let bytes = read_bytes(r)?;
            Ok(DeltaInstruction::Insert { bytes })
        }
        other => Err(BlockSyncError::Framing(format!("unknown delta instruction tag: {}", other))),
    }
}

pub fn send_deltas(w: &mut impl Write, instructions: &[DeltaInstruction]) -> Result<()> {
    write_u32(w, instructions.len() as u32)?;
    for instruction in instructions {
        encode_instruction(w, instruction)?;
    }
    Ok(())
}

pub fn recv_deltas(r: &mut impl Read) -> Result<Vec<DeltaInstruction>> {
    let count = read_u32(r)?;
    let mut instructions = Vec::with_capacity(count as usize);
    for _ in 0..count {
        instructions.push(decode_instruction(r)?);
    }
    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_command_round_trip() {
        let mut buf = Vec::new();
        send_command(&mut buf, Command::Push).unwrap();
        assert_eq!(buf, b"PUSH\n");
        let mut cursor = Cursor::new(buf);
        assert_eq!(recv_command(&mut cursor).unwrap(), Command::Push);
    }

    #[test]
    fn test_unknown_command_is_protocol_error() {
        let mut cursor = Cursor::new(b"FOO\n".to_vec());
        let err = recv_command(&mut cursor).unwrap_err();
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_path_round_trip() {
        let mut buf = Vec::new();
        send_path(&mut buf, "/tmp/file.bin").unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(recv_path(&mut cursor).unwrap(), "/tmp/file.bin");
    }

    #[test]
    fn test_status_round_trip() {
        let mut buf = Vec::new();
        send_status(&mut buf, &StatusMessage::fail("bad path")).unwrap();
        let mut cursor = Cursor::new(buf);
        let status = recv_status(&mut cursor).unwrap();
        assert!(!status.ok);
        assert_eq!(status.msg, "bad path");
    }

    #[test]
    fn test_blocks_round_trip() {
        let blocks = vec![
            BlockInfo::new(0, 4, 123, vec![1, 2, 3, 4]),
            BlockInfo::new(4, 4, 456, vec![5, 6, 7, 8]),
        ];
        let mut buf = Vec::new();
        send_blocks(&mut buf, &blocks).unwrap();
        let mut cursor = Cursor::new(buf);
        let decoded = recv_blocks(&mut cursor, HashAlgorithm::Blake3).unwrap();
        // strong hash stubs above are 4 bytes, shorter than blake3's 32 --
        // exercised properly in the full-block test below.
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn test_blocks_round_trip_full_width_hash() {
        let strong = vec![0xAB; 32];
        let blocks = vec![BlockInfo::new(8, 4, 42, strong.clone())];
        let mut buf = Vec::new();
        send_blocks(&mut buf, &blocks).unwrap();
        let mut cursor = Cursor::new(buf);
        let decoded = recv_blocks(&mut cursor, HashAlgorithm::Blake3).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].offset, 8);
        assert_eq!(decoded[0].weak_hash, 42);
        assert_eq!(decoded[0].strong_hash, strong);
    }

    #[test]
    fn test_deltas_round_trip() {
        let instructions = vec![
            DeltaInstruction::Copy { offset: 0, length: 4 },
            DeltaInstruction::Insert { bytes: b"hi".to_vec() },
        ];
        let mut buf = Vec::new();
        send_deltas(&mut buf, &instructions).unwrap();
        let mut cursor = Cursor::new(buf);
        let decoded = recv_deltas(&mut cursor).unwrap();
        assert_eq!(decoded, instructions);
    }

    #[test]
    fn test_truncated_frame_is_framing_error() {
        let mut cursor = Cursor::new(vec![0u8; 2]); // too short for a u32 count + anything
        let err = recv_blocks(&mut cursor, HashAlgorithm::Blake3);
        assert!(err.is_err());
    }
}
