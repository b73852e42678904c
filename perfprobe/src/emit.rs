//! Column-stable CSV record emission.
//!
//! One header line, then one record per iteration. No quoting: the
//! framework never produces commas inside fields. Formatting is canonical
//! per field kind so that parsing an emitted file and re-serializing it
//! reproduces the bytes exactly.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// What to do when the output path already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Truncate and rewrite. The default for scenario-driven runs.
    Replace,
    /// Refuse with an error, leaving the caller to decide.
    Preserve,
}

/// One emitted value. The variant fixes the canonical text format:
/// counters and timestamps are plain decimal, CPU indices are signed, and
/// each derived column carries the precision its consumers expect.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Unsigned counter or timestamp.
    Count(u64),
    /// CPU index, -1 when unknown.
    Cpu(i32),
    /// Condition label or parameter; must not contain commas.
    Label(String),
    /// Instructions per cycle, 3 decimals.
    Ipc(f64),
    /// Dimensionless rate in [0,1], 6 decimals.
    Rate(f64),
    /// Derived per-op / per-access / bandwidth value, 2 decimals.
    Fixed2(f64),
    /// GFLOP/s-style throughput, 3 decimals.
    Fixed3(f64),
    /// Whole-number rate (ops per second), no decimals.
    Fixed0(f64),
}

impl Field {
    pub fn label(text: impl Into<String>) -> Self {
        let text = text.into();
        debug_assert!(!text.contains(','), "comma in field label {text:?}");
        Field::Label(text)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Count(v) => write!(f, "{v}"),
            Field::Cpu(v) => write!(f, "{v}"),
            Field::Label(v) => write!(f, "{v}"),
            Field::Ipc(v) => write!(f, "{v:.3}"),
            Field::Rate(v) => write!(f, "{v:.6}"),
            Field::Fixed2(v) => write!(f, "{v:.2}"),
            Field::Fixed3(v) => write!(f, "{v:.3}"),
            Field::Fixed0(v) => write!(f, "{v:.0}"),
        }
    }
}

/// Writer for one scenario's record stream.
pub struct RecordWriter {
    out: BufWriter<File>,
    path: PathBuf,
    columns: usize,
}

impl RecordWriter {
    /// Create `<dir>/<scenario>.csv`, honoring the overwrite policy, and
    /// write the header line.
    pub fn create(
        dir: &Path,
        scenario: &str,
        header: &[&str],
        policy: OverwritePolicy,
    ) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{scenario}.csv"));
        if policy == OverwritePolicy::Preserve && path.exists() {
            return Err(Error::OutputExists(path));
        }
        let file = File::create(&path)?;
        let mut writer = Self {
            out: BufWriter::new(file),
            path,
            columns: header.len(),
        };
        writeln!(writer.out, "{}", header.join(","))?;
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. The field count must match the header.
    pub fn write_record(&mut self, fields: &[Field]) -> Result<()> {
        if fields.len() != self.columns {
            return Err(Error::ColumnMismatch {
                got: fields.len(),
                want: self.columns,
            });
        }
        let mut first = true;
        for field in fields {
            if !first {
                self.out.write_all(b",")?;
            }
            write!(self.out, "{field}")?;
            first = false;
        }
        self.out.write_all(b"\n")?;
        Ok(())
    }

    /// Flush buffered records. Called on clean completion and on
    /// interrupt, so partially-written output always reaches disk.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Flush and consume the writer.
    pub fn finish(mut self) -> Result<()> {
        self.flush()
    }
}

impl Drop for RecordWriter {
    fn drop(&mut self) {
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_fields() -> Vec<Field> {
        vec![
            Field::Count(3),
            Field::label("8KB_L1"),
            Field::Count(123456789),
            Field::Cpu(-1),
            Field::Ipc(2.5),
            Field::Rate(0.0005),
            Field::Fixed2(17.357),
            Field::Fixed0(1234567.89),
        ]
    }

    #[test]
    fn field_formats() {
        let rendered: Vec<String> = sample_fields().iter().map(|f| f.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "3",
                "8KB_L1",
                "123456789",
                "-1",
                "2.500",
                "0.000500",
                "17.36",
                "1234568",
            ]
        );
    }

    #[test]
    fn zero_is_emitted_not_blank() {
        assert_eq!(Field::Count(0).to_string(), "0");
        assert_eq!(Field::Ipc(0.0).to_string(), "0.000");
        assert_eq!(Field::Rate(0.0).to_string(), "0.000000");
    }

    #[test]
    fn writer_emits_header_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let header = ["run", "label", "ts", "cpu", "ipc", "rate", "ns", "ops"];
        let mut writer =
            RecordWriter::create(dir.path(), "sample", &header, OverwritePolicy::Replace).unwrap();
        writer.write_record(&sample_fields()).unwrap();
        writer.write_record(&sample_fields()).unwrap();
        let path = writer.path().to_path_buf();
        writer.finish().unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "run,label,ts,cpu,ipc,rate,ns,ops");
        assert_eq!(lines[1], "3,8KB_L1,123456789,-1,2.500,0.000500,17.36,1234568");
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn column_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            RecordWriter::create(dir.path(), "narrow", &["a", "b"], OverwritePolicy::Replace)
                .unwrap();
        let err = writer.write_record(&[Field::Count(1)]).unwrap_err();
        assert!(matches!(err, Error::ColumnMismatch { got: 1, want: 2 }));
    }

    #[test]
    fn preserve_policy_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let header = ["a"];
        RecordWriter::create(dir.path(), "dup", &header, OverwritePolicy::Replace)
            .unwrap()
            .finish()
            .unwrap();
        assert!(matches!(
            RecordWriter::create(dir.path(), "dup", &header, OverwritePolicy::Preserve),
            Err(Error::OutputExists(_))
        ));
        // Replace still works.
        RecordWriter::create(dir.path(), "dup", &header, OverwritePolicy::Replace).unwrap();
    }

    #[test]
    fn emitted_file_round_trips_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let header = ["run", "label", "ts", "cpu", "ipc", "rate", "ns", "ops"];
        let mut writer =
            RecordWriter::create(dir.path(), "rt", &header, OverwritePolicy::Replace).unwrap();
        writer.write_record(&sample_fields()).unwrap();
        let path = writer.path().to_path_buf();
        writer.finish().unwrap();

        let original = std::fs::read_to_string(&path).unwrap();

        // Parse into header + string fields, then re-serialize.
        let mut lines = original.lines();
        let header_line = lines.next().unwrap();
        let mut rebuilt = String::new();
        rebuilt.push_str(header_line);
        rebuilt.push('\n');
        for line in lines {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), header.len());
            rebuilt.push_str(&fields.join(","));
            rebuilt.push('\n');
        }
        assert_eq!(original, rebuilt);
    }
}
