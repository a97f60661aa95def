use std::{
    fs::File,
    io::{self, BufReader, BufWriter, ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::fletcher::{format_checksum, Checksummer, Fletcher4};

pub const DEFAULT_READ_SIZE: usize = 128 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumRecord {
    pub path: PathBuf,
    pub checksum: [u64; 4],
}

#[derive(Debug)]
pub struct Mismatch {
    // Position of the record in the table, paths may repeat
    pub index: usize,
    pub path: PathBuf,
    pub expected: [u64; 4],
    // Err holds the reason the file couldn't be read
    pub actual: Result<[u64; 4], String>,
}

// read_size doesn't need to be a multiple of the block size
pub fn checksum_reader(mut reader: impl Read, read_size: usize) -> io::Result<[u64; 4]> {
    let read_size = if read_size == 0 { DEFAULT_READ_SIZE } else { read_size };
    let mut buf = vec![0u8; read_size];
    let mut hasher = Fletcher4::new();
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        trace!(n, "read chunk");
        total += Checksummer::write(&mut hasher, &buf[..n]) as u64;
    }

    let checksum = hasher.checksum();
    debug!(total, checksum = %format_checksum(&checksum), "finished stream");
    Ok(checksum)
}

pub fn checksum_file(path: &Path, read_size: usize) -> io::Result<ChecksumRecord> {
    let file = File::open(path)?;
    Ok(ChecksumRecord {
        path: path.to_path_buf(),
        checksum: checksum_reader(file, read_size)?,
    })
}

// Every file gets its own accumulator, results come back in input order
pub fn checksum_files(paths: &[PathBuf], read_size: usize) -> Vec<(PathBuf, io::Result<[u64; 4]>)> {
    paths
        .par_iter()
        .map(|path| {
            let res = checksum_file(path, read_size).map(|record| record.checksum);
            (path.clone(), res)
        })
        .collect()
}

pub fn load_table(path: &Path) -> io::Result<Vec<ChecksumRecord>> {
    let records: Vec<ChecksumRecord> = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    debug!(records = records.len(), path = %path.display(), "loaded checksum table");
    Ok(records)
}

pub fn save_table(path: &Path, records: &[ChecksumRecord]) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, records)?;
    out.flush()
}

pub fn verify_table(records: &[ChecksumRecord], read_size: usize) -> Vec<Mismatch> {
    let paths: Vec<PathBuf> = records.iter().map(|record| record.path.clone()).collect();

    checksum_files(&paths, read_size)
        .into_iter()
        .zip(records)
        .enumerate()
        .filter_map(|(index, ((path, res), record))| match res {
            Ok(checksum) if checksum == record.checksum => None,
            Ok(checksum) => Some(Mismatch {
                index,
                path,
                expected: record.checksum,
                actual: Ok(checksum),
            }),
            Err(e) => Some(Mismatch {
                index,
                path,
                expected: record.checksum,
                actual: Err(e.to_string()),
            }),
        })
        .collect()
}
