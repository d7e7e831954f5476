//! Shape-list files.
//!
//! One shape per line, `M N K LDA LDB LDC` separated by whitespace. Blank lines
//! are skipped; end of file ends the list. A malformed line is fatal.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::{Error, ProblemShape, Result};

/// Streaming reader over a shape list.
#[derive(Debug)]
pub struct ShapeList<R> {
    reader: R,
    source: PathBuf,
    line_no: usize,
    buf: String,
}

impl ShapeList<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file), path))
    }
}

impl<R: BufRead> ShapeList<R> {
    /// `source` names the input in error messages.
    pub fn from_reader(reader: R, source: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            source: source.into(),
            line_no: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for ShapeList<R> {
    type Item = Result<ProblemShape>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(source) => {
                    return Some(Err(Error::Io {
                        path: self.source.clone(),
                        source,
                    }));
                }
            }
            self.line_no += 1;
            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }
            return Some(line.parse::<ProblemShape>().map_err(|e| {
                Error::InvalidData(format!(
                    "{}:{}: {e}",
                    self.source.display(),
                    self.line_no
                ))
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn reads_shapes_and_skips_blank_lines() {
        let input = "16 16 16 16 16 16\n\n  32 8 4 32 4 32  \n";
        let shapes: Vec<_> = ShapeList::from_reader(Cursor::new(input), "mem")
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            shapes,
            vec![
                ProblemShape::square(16),
                ProblemShape::new(32, 8, 4, 32, 4, 32)
            ]
        );
    }

    #[test]
    fn malformed_line_reports_position() {
        let input = "16 16 16 16 16 16\n16 16 16\n";
        let err = ShapeList::from_reader(Cursor::new(input), "shapes.txt")
            .collect::<Result<Vec<_>>>()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("shapes.txt:2"), "{msg}");
    }

    #[test]
    fn opens_files_and_reports_missing_ones() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "8 8 8 8 8 8").unwrap();
        let shapes: Vec<_> = ShapeList::open(file.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(shapes, vec![ProblemShape::square(8)]);

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.txt");
        assert!(matches!(ShapeList::open(&missing), Err(Error::Io { .. })));
    }
}
