//! Parallel file copy through the chunked scheduler
//!
//! Usage: `filecopy <src> <dst> [--append]`
//!
//! # Environment Variables
//!
//! - `TASKPOOL_CHUNK_SIZE` - Write chunk size (e.g. `32M`)
//! - `TASKPOOL_READ_PARALLELISM` - Starting chunk count for the read
//! - `TASKPOOL_THREADS` - Worker count

use std::process::ExitCode;

use taskpool::{
    kerror, kinfo, FileConfig, FileError, FileScheduler, PoolConfig, ProcessClock, WorkerPool,
    WriteMode,
};

fn copy(files: &FileScheduler<'_>, src: &str, dst: &str, mode: WriteMode) -> Result<usize, FileError> {
    let data = files.add_read(src, Vec::new())?.wait().into_result()?;
    let len = data.len();
    kinfo!("read {} bytes from {}", len, src);

    let report = files.add_write(dst, data, mode)?.wait();
    kinfo!(
        "wrote {} in {} chunks at offset {}",
        dst,
        report.chunks().len(),
        report.base_offset()
    );
    report.into_result()?;
    Ok(len)
}

fn main() -> ExitCode {
    let clock = ProcessClock::start();
    taskpool::init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: {} <src> <dst> [--append]", args[0]);
        return ExitCode::from(2);
    }
    let mode = if args.iter().skip(3).any(|a| a == "--append") {
        WriteMode::Append
    } else {
        WriteMode::Overwrite
    };

    let pool = match WorkerPool::with_config(PoolConfig::from_env()) {
        Ok(pool) => pool,
        Err(e) => {
            kerror!("failed to start pool: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let files = match FileScheduler::with_config(&pool, FileConfig::from_env()) {
        Ok(files) => files,
        Err(e) => {
            kerror!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = copy(&files, &args[1], &args[2], mode);
    drop(files);
    pool.wait();

    match result {
        Ok(len) => {
            println!("copied {} bytes in {}", len, clock.stamp());
            ExitCode::SUCCESS
        }
        Err(e) => {
            kerror!("{}", e);
            ExitCode::FAILURE
        }
    }
}
