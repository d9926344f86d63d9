use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::ConversionError;

/// Ensure an output directory exists; create it if missing.
pub fn ensure_output_dir(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        if !fs::metadata(dir)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "path exists and is not a directory",
            ));
        }
    } else {
        fs::create_dir_all(dir)?;
    }
    // Writability probe
    NamedTempFile::new_in(dir)?;
    Ok(())
}

/// Produce `dest` by writing into a temp file beside it and renaming it into
/// place once `write` and the final flush succeed.
///
/// When anything fails the temp file is dropped, so `dest` is either left
/// untouched or fully replaced.
pub fn write_atomic<F>(dest: &Path, write: F) -> Result<(), ConversionError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), ConversionError>,
{
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|source| {
        ConversionError::DestinationUnwritable {
            path: dest.to_path_buf(),
            source,
        }
    })?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush().map_err(|e| partial_write(dest, e))?;
    }
    tmp.as_file_mut()
        .sync_all()
        .map_err(|e| partial_write(dest, e))?;

    tmp.persist(dest)
        .map_err(|e| ConversionError::DestinationUnwritable {
            path: dest.to_path_buf(),
            source: e.error,
        })?;
    Ok(())
}

pub(crate) fn partial_write(dest: &Path, source: io::Error) -> ConversionError {
    ConversionError::PartialWrite {
        path: dest.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_missing_output_dir() {
        let temp = TempDir::new().unwrap();
        let new_dir = temp.path().join("out").join("nested");
        assert!(!new_dir.exists());
        ensure_output_dir(&new_dir).unwrap();
        assert!(new_dir.is_dir());
    }

    #[test]
    fn output_dir_that_is_a_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("not_a_dir");
        fs::write(&file_path, "x").unwrap();
        assert!(ensure_output_dir(&file_path).is_err());
    }

    #[test]
    fn atomic_write_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("doc.txt");
        fs::write(&dest, "old").unwrap();

        write_atomic(&dest, |w| {
            w.write_all(b"new").map_err(|e| partial_write(&dest, e))
        })
        .unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn failed_write_leaves_no_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("doc.txt");

        let result = write_atomic(&dest, |w| {
            w.write_all(b"half").map_err(|e| partial_write(&dest, e))?;
            Err(ConversionError::codec(&dest, "boom"))
        });
        assert!(matches!(result, Err(ConversionError::Codec { .. })));
        assert!(!dest.exists());
        // temp file is cleaned up as well
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_write_keeps_previous_output() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("doc.txt");
        fs::write(&dest, "previous").unwrap();

        let result = write_atomic(&dest, |_| Err(ConversionError::codec(&dest, "bad")));
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "previous");
    }

    #[test]
    fn missing_parent_is_unwritable() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("missing").join("doc.txt");
        let result = write_atomic(&dest, |_| Ok(()));
        assert!(matches!(
            result,
            Err(ConversionError::DestinationUnwritable { .. })
        ));
    }
}
