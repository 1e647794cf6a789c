//! Fixture loading
//!
//! A fixture directory holds one or more `input*` files with the recorded
//! source records and zero or more `output*` files with the expected records,
//! one record per line.

use std::fs;
use std::path::{Path, PathBuf};

use shared::TestCase;

use crate::error::{HarnessError, HarnessResult};

fn list_prefixed(dir: &Path, prefix: &str) -> HarnessResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| HarnessError::fixture(dir.display().to_string(), e.to_string()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(prefix));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Input files of a fixture, sorted by name
pub fn list_input_files(dir: &Path) -> HarnessResult<Vec<PathBuf>> {
    list_prefixed(dir, "input")
}

/// Expected output files of a fixture, sorted by name
pub fn list_expected_output_files(dir: &Path) -> HarnessResult<Vec<PathBuf>> {
    list_prefixed(dir, "output")
}

/// Non-blank lines of a fixture file
pub fn load_records(file: &Path) -> HarnessResult<Vec<String>> {
    let content = fs::read_to_string(file).map_err(|e| HarnessError::fixture(file.display().to_string(), e.to_string()))?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

pub struct FixtureLoader;

impl FixtureLoader {
    /// Load the test case stored in `dir`
    pub fn load(dir: &Path) -> HarnessResult<TestCase> {
        if !dir.is_dir() {
            return Err(HarnessError::fixture(dir.display().to_string(), "not a directory"));
        }

        let inputs = list_input_files(dir)?;
        if inputs.is_empty() {
            return Err(HarnessError::fixture(dir.display().to_string(), "no input file"));
        }

        let mut input = Vec::new();
        for file in &inputs {
            input.extend(load_records(file)?);
        }
        let mut expected = Vec::new();
        for file in list_expected_output_files(dir)? {
            expected.extend(load_records(&file)?);
        }

        let name = dir
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| dir.display().to_string());

        tracing::debug!(
            "📂 Loaded fixture '{}': {} input records from {} files, {} expected",
            name,
            input.len(),
            inputs.len(),
            expected.len()
        );
        Ok(TestCase::new(name, input, expected))
    }
}
