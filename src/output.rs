//! Output files which only persist once they are complete.
//!
//! Both tools write a single output file. If anything fails after that file
//! was created (a simulation error, a failed write), the partial file is removed.
//! [`OutputFile`] is the guard that does this.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// A buffered output file that is deleted on drop unless it is [committed].
///
/// # Example
/// ```
/// use std::io::Write;
/// use sol_ensemble::output::OutputFile;
///
/// let path = std::env::temp_dir().join("sol_ensemble_output_doc.txt");
///
/// let mut out = OutputFile::create(&path).unwrap();
/// writeln!(out, "partial").unwrap();
/// drop(out);
/// assert!(!path.exists());
///
/// let mut out = OutputFile::create(&path).unwrap();
/// writeln!(out, "complete").unwrap();
/// out.commit().unwrap();
/// assert_eq!(std::fs::read_to_string(&path).unwrap(), "complete\n");
/// # std::fs::remove_file(&path).unwrap();
/// ```
///
/// [committed]: OutputFile::commit
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}
impl OutputFile {
    /// Creates (or truncates) the file at the given path.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;

        Ok(Self { path, writer: Some(BufWriter::new(file)) })
    }

    /// The path of this file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes the file and keeps it.
    pub fn commit(mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut w) => w.flush().map_err(|e| {
                // the guard is consumed, so the partial file has to go here
                let _ = std::fs::remove_file(&self.path);
                e
            }),
            None => Ok(()),
        }
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "output file already committed"))
    }
}
impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}
impl Drop for OutputFile {
    fn drop(&mut self) {
        if let Some(w) = self.writer.take() {
            // close before removing
            drop(w.into_parts());
            match std::fs::remove_file(&self.path) {
                Ok(()) => tracing::warn!(path = %self.path.display(), "discarded incomplete output file"),
                Err(e) => tracing::warn!(path = %self.path.display(), "could not remove incomplete output file: {e}"),
            }
        }
    }
}
