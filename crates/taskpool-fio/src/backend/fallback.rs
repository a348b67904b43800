//! Seek-then-transfer I/O for platforms without pread/pwrite
//!
//! Safe because every chunk owns its file handle.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{ChunkError, ChunkStage};

pub(super) fn write_all_at(file: &File, offset: u64, data: &[u8]) -> Result<(), ChunkError> {
    let mut file = file;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| ChunkError::io(ChunkStage::Seek, &e))?;
    file.write_all(data)
        .map_err(|e| ChunkError::io(ChunkStage::Write, &e))
}

pub(super) fn read_exact_at(file: &File, offset: u64, buf: &mut [u8]) -> Result<(), ChunkError> {
    let mut file = file;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| ChunkError::io(ChunkStage::Seek, &e))?;
    file.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ChunkError::new(ChunkStage::Read, e.kind(), "file ended short")
        } else {
            ChunkError::io(ChunkStage::Read, &e)
        }
    })
}
