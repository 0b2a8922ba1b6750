// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL (JSON Lines) file utilities.
//!
//! Each record is stored as a single JSON line. Rewrites go through a
//! temporary sibling file and a rename, so readers on other devices never
//! observe a half-written file.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

/// Reads all records from a JSONL file.
///
/// Skips empty lines and returns an empty vec if the file doesn't exist.
pub fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: T = serde_json::from_str(&line).map_err(|e| {
            Error::CorruptedData(format!("{}:{}: {e}", path.display(), lineno + 1))
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Writes all records to a JSONL file, atomically replacing existing content.
pub fn write_all<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp)?;
        for record in records {
            let json = serde_json::to_string(record)?;
            writeln!(file, "{json}")?;
        }
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;

    Ok(())
}

/// Reads a file, lets `f` edit the records, and writes them back.
///
/// Returns whatever `f` returns. The file is left untouched if reading fails.
pub fn update<T, R, F>(path: &Path, f: F) -> Result<R>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(&mut Vec<T>) -> R,
{
    let mut records = read_all(path)?;
    let result = f(&mut records);
    write_all(path, &records)?;
    Ok(result)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
