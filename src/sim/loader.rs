use std::{
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use thiserror::Error;

use super::job::Job;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read workload file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: expected `<arrival> P<name> <service> <memory>`, found {found:?}")]
    Malformed { line: usize, found: String },
    #[error("line {line}: invalid {field} {value:?}")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("line {line}: {field} must be positive")]
    NotPositive { line: usize, field: &'static str },
}

pub fn load_jobs(path: &Path) -> Result<Vec<Job>, LoadError> {
    let input = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_jobs(&input)
}

/// Parses one workload per line, e.g. `0 P4 96 100`. Blank lines are
/// skipped.
pub fn parse_jobs(input: &str) -> Result<Vec<Job>, LoadError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| parse_line(index + 1, line))
        .collect()
}

fn parse_line(line: usize, text: &str) -> Result<Job, LoadError> {
    let fields: Vec<&str> = text.split_ascii_whitespace().collect();
    let [arrival, name, service, memory] = fields.as_slice() else {
        return Err(LoadError::Malformed {
            line,
            found: text.to_string(),
        });
    };

    let Some(name) = name.strip_prefix('P') else {
        return Err(LoadError::Malformed {
            line,
            found: text.to_string(),
        });
    };

    let job = Job {
        arrival_time: field(line, "arrival time", arrival)?,
        name: positive(line, "name", field(line, "name", name)?)?,
        service_time: positive(line, "service time", field(line, "service time", service)?)?,
        memory_size: positive(line, "memory size", field(line, "memory size", memory)?)?,
    };
    Ok(job)
}

fn field<T: FromStr>(line: usize, field: &'static str, value: &str) -> Result<T, LoadError> {
    value.parse().map_err(|_| LoadError::InvalidField {
        line,
        field,
        value: value.to_string(),
    })
}

fn positive<T: Default + PartialEq>(
    line: usize,
    field: &'static str,
    value: T,
) -> Result<T, LoadError> {
    if value == T::default() {
        return Err(LoadError::NotPositive { line, field });
    }
    Ok(value)
}
