//! Job source
//!
//! A campaign file is plain text with one shell command per line, consumed
//! lazily and exactly once, top to bottom. Only the coordinator ever reads
//! it. Empty lines are jobs too (the empty command), and a final line with
//! no trailing newline still counts.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

/// Lazily yields one command per line of a job list.
#[derive(Debug)]
pub struct JobSource<R> {
    reader: R,
}

impl JobSource<BufReader<File>> {
    /// Open a campaign file. Failure here is fatal to the whole campaign
    /// and must happen before any message is exchanged.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("cannot open campaign file: {}", path.display()))?;
        Ok(Self { reader: BufReader::new(file) })
    }
}

impl<R: BufRead> JobSource<R> {
    /// Read jobs from any buffered reader (used by tests).
    pub fn from_reader(reader: R) -> Self {
        Self { reader }
    }

    /// Next command, trailing newline stripped, or `None` once exhausted.
    pub fn next_job(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).context("failed to read campaign file")?;
        if read == 0 {
            return Ok(None);
        }

        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;

    fn drain(input: &str) -> Vec<String> {
        let mut source = JobSource::from_reader(Cursor::new(input.to_string()));
        let mut jobs = Vec::new();
        while let Some(job) = source.next_job().unwrap() {
            jobs.push(job);
        }
        jobs
    }

    #[test]
    fn yields_lines_in_order_without_newlines() {
        assert_eq!(drain("echo a\necho b\necho c\n"), vec!["echo a", "echo b", "echo c"]);
    }

    #[test]
    fn empty_input_is_immediately_exhausted() {
        assert!(drain("").is_empty());
    }

    #[test]
    fn blank_lines_are_empty_commands() {
        assert_eq!(drain("echo a\n\necho b\n"), vec!["echo a", "", "echo b"]);
    }

    #[test]
    fn final_unterminated_line_is_a_job() {
        assert_eq!(drain("echo a\necho b"), vec!["echo a", "echo b"]);
    }

    #[test]
    fn carriage_returns_are_stripped() {
        assert_eq!(drain("echo a\r\necho b\r\n"), vec!["echo a", "echo b"]);
    }

    #[test]
    fn exhaustion_is_sticky() {
        let mut source = JobSource::from_reader(Cursor::new("echo a\n".to_string()));
        assert_eq!(source.next_job().unwrap().unwrap(), "echo a");
        assert!(source.next_job().unwrap().is_none());
        assert!(source.next_job().unwrap().is_none());
    }

    #[test]
    fn opens_a_real_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hostname").unwrap();
        writeln!(file, "uptime").unwrap();

        let mut source = JobSource::open(file.path()).unwrap();
        assert_eq!(source.next_job().unwrap().unwrap(), "hostname");
        assert_eq!(source.next_job().unwrap().unwrap(), "uptime");
        assert!(source.next_job().unwrap().is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = JobSource::open(Path::new("/nonexistent/campaign.txt")).unwrap_err();
        assert!(err.to_string().contains("cannot open campaign file"));
    }
}
