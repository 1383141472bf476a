//! Post-scriptum updater.
//!
//! A dvi/xdv to pdf filter changes magnification and offsets after the
//! engine wrote its synchronization data; the updater records those
//! changes by appending directives to the synctex file rather than
//! rewriting it. The parser applies appended directives as global
//! overrides, last write wins.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

pub struct Updater {
    path: PathBuf,
    compressed: bool,
    content: String,
    appended: usize,
}

impl Updater {
    /// Opens the synctex file to amend, via the same candidate discovery
    /// as the scanner (`.gz` flavors always admitted; the updater must
    /// amend whatever the engine produced).
    pub fn new_with_output_file(output: impl AsRef<Path>, directory: Option<&Path>) -> Result<Self> {
        let output = output.as_ref();
        let mut candidates = vec![
            output.with_extension("synctex"),
            output.with_extension("synctex.gz"),
        ];
        if let Some(directory) = directory {
            for candidate in candidates.clone() {
                if let Some(name) = candidate.file_name() {
                    candidates.push(directory.join(name));
                }
            }
        }
        let chosen = candidates
            .into_iter()
            .filter_map(|path| {
                let mtime = fs::metadata(&path).ok().and_then(|m| m.modified().ok())?;
                Some((path, mtime))
            })
            .max_by_key(|(_, mtime)| *mtime);
        let Some((path, _)) = chosen else {
            return Err(Error::NotFound {
                output: output.display().to_string(),
            });
        };
        let raw = fs::read(&path)?;
        let compressed = path.extension().is_some_and(|e| e == "gz");
        let content = if compressed {
            let mut decoder = GzDecoder::new(raw.as_slice());
            let mut decoded = String::new();
            decoder.read_to_string(&mut decoded)?;
            decoded
        } else {
            String::from_utf8_lossy(&raw).into_owned()
        };
        Ok(Self {
            path,
            compressed,
            content,
            appended: 0,
        })
    }

    fn append(&mut self, record: String) {
        if !self.content.ends_with('\n') && !self.content.is_empty() {
            self.content.push('\n');
            self.appended += 1;
        }
        self.appended += record.len() + 1;
        self.content.push_str(&record);
        self.content.push('\n');
    }

    /// Appends a `Magnification:` directive; empty values are ignored,
    /// matching the optional `-m` of the update workflow.
    pub fn append_magnification(&mut self, value: &str) {
        if !value.is_empty() {
            self.append(format!("Magnification:{value}"));
        }
    }

    pub fn append_x_offset(&mut self, value: &str) {
        if !value.is_empty() {
            self.append(format!("X Offset:{value}"));
        }
    }

    pub fn append_y_offset(&mut self, value: &str) {
        if !value.is_empty() {
            self.append(format!("Y Offset:{value}"));
        }
    }

    /// Writes the amended file back (re-encoding `.gz` flavors) and
    /// reports how many bytes of directives were appended. Nothing is
    /// touched when no directive was added.
    pub fn finish(self) -> Result<usize> {
        if self.appended == 0 {
            return Ok(0);
        }
        if self.compressed {
            let file = fs::File::create(&self.path)?;
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(self.content.as_bytes())?;
            encoder.finish()?;
        } else {
            fs::write(&self.path, self.content.as_bytes())?;
        }
        log::debug!(
            "appended {} byte(s) of directives to {}",
            self.appended,
            self.path.display()
        );
        Ok(self.appended)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    const SIMPLE: &str = "SyncTeX Version:1\nInput:1:./main.tex\nOutput:pdf\nMagnification:1000\nUnit:1\nX Offset:0\nY Offset:0\nContent:\n{1\n(1,5:10,20:100,10,2\n)\n}1\nPostamble:\nCount:1\nPost scriptum:\n";

    #[test]
    fn appended_directives_change_parsed_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.synctex");
        std::fs::write(&path, SIMPLE).unwrap();

        let mut updater =
            Updater::new_with_output_file(dir.path().join("main.pdf"), None).unwrap();
        updater.append_magnification("2000");
        updater.append_x_offset("5");
        let appended = updater.finish().unwrap();
        assert!(appended > 0);

        let mut scanner =
            Scanner::new_with_output_file(dir.path().join("main.pdf"), None, true).unwrap();
        assert_eq!(scanner.magnification(), 2000);
        assert_eq!(scanner.x_offset(), 5);
        assert!(scanner.edit_query(1, 25.0, 45.0));
        let id = scanner.next_result().unwrap();
        let node = scanner.node(id);
        // scale 2.0, page origin shifted by the new x offset.
        assert_eq!((node.visible_h(), node.visible_v()), (25.0, 40.0));
    }

    #[test]
    fn no_directives_appends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.synctex");
        std::fs::write(&path, SIMPLE).unwrap();
        let updater = Updater::new_with_output_file(dir.path().join("main.pdf"), None).unwrap();
        assert_eq!(updater.finish().unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SIMPLE);
    }
}
