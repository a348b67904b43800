//! pread/pwrite positioned I/O

use std::fs::File;
use std::io;

use nix::errno::Errno;
use nix::sys::uio::{pread, pwrite};

use crate::error::{ChunkError, ChunkStage};

fn to_off_t(offset: u64, stage: ChunkStage) -> Result<libc::off_t, ChunkError> {
    libc::off_t::try_from(offset).map_err(|_| {
        ChunkError::new(
            stage,
            io::ErrorKind::InvalidInput,
            format!("offset {} exceeds off_t", offset),
        )
    })
}

pub(super) fn write_all_at(file: &File, offset: u64, data: &[u8]) -> Result<(), ChunkError> {
    let mut done = 0usize;
    while done < data.len() {
        let pos = to_off_t(offset + done as u64, ChunkStage::Write)?;
        match pwrite(file, &data[done..], pos) {
            Ok(0) => {
                return Err(ChunkError::new(
                    ChunkStage::Write,
                    io::ErrorKind::WriteZero,
                    format!("wrote 0 of {} remaining bytes", data.len() - done),
                ))
            }
            Ok(n) => done += n,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(ChunkError::io(ChunkStage::Write, &io::Error::from(e))),
        }
    }
    Ok(())
}

pub(super) fn read_exact_at(file: &File, offset: u64, buf: &mut [u8]) -> Result<(), ChunkError> {
    let mut done = 0usize;
    while done < buf.len() {
        let pos = to_off_t(offset + done as u64, ChunkStage::Read)?;
        match pread(file, &mut buf[done..], pos) {
            Ok(0) => {
                return Err(ChunkError::new(
                    ChunkStage::Read,
                    io::ErrorKind::UnexpectedEof,
                    format!("file ended {} bytes short", buf.len() - done),
                ))
            }
            Ok(n) => done += n,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(ChunkError::io(ChunkStage::Read, &io::Error::from(e))),
        }
    }
    Ok(())
}
