use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Kind of input file, detected from its filename suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Text,
    Jpeg,
    Png,
}

impl SourceKind {
    /// Every kind the scanner recognizes
    pub const ALL: [SourceKind; 3] = [SourceKind::Text, SourceKind::Jpeg, SourceKind::Png];

    /// The extension (without the dot) this kind is recognized by
    pub fn extension(self) -> &'static str {
        match self {
            SourceKind::Text => "txt",
            SourceKind::Jpeg => "jpg",
            SourceKind::Png => "png",
        }
    }

    /// Detect the kind of `path` from its extension, ignoring ASCII case
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|kind| ext.eq_ignore_ascii_case(kind.extension()))
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Output format selected for a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Txt,
    Csv,
    Jpg,
    Png,
    Pdf,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 5] = [
        TargetFormat::Txt,
        TargetFormat::Csv,
        TargetFormat::Jpg,
        TargetFormat::Png,
        TargetFormat::Pdf,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Txt => "txt",
            TargetFormat::Csv => "csv",
            TargetFormat::Jpg => "jpg",
            TargetFormat::Png => "png",
            TargetFormat::Pdf => "pdf",
        }
    }

    /// Batch-mode output path: `<output_dir>/<original-name>.<format>`.
    ///
    /// The full original file name is kept, so `a.txt` becomes `a.txt.csv`.
    pub fn batch_output_path(self, source: &Path, output_dir: &Path) -> Option<PathBuf> {
        let name = source.file_name()?.to_str()?;
        Some(output_dir.join(format!("{}.{}", name, self.extension())))
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TargetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('.');
        match s.to_ascii_lowercase().as_str() {
            "txt" => Ok(TargetFormat::Txt),
            "csv" => Ok(TargetFormat::Csv),
            "jpg" | "jpeg" => Ok(TargetFormat::Jpg),
            "png" => Ok(TargetFormat::Png),
            "pdf" => Ok(TargetFormat::Pdf),
            other => Err(format!(
                "unknown target format '{}' (expected one of txt, csv, jpg, png, pdf)",
                other
            )),
        }
    }
}

/// Fixed output name used for drop-mode conversions, keyed on the source kind.
///
/// Returns the target format alongside the name; `None` when drop mode has
/// no conversion for that kind.
pub fn dropped_output(kind: SourceKind) -> Option<(TargetFormat, &'static str)> {
    match kind {
        SourceKind::Text => Some((TargetFormat::Pdf, "converted_output.pdf")),
        SourceKind::Png => Some((TargetFormat::Jpg, "converted_output.jpg")),
        SourceKind::Jpeg => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_kind_case_insensitively() {
        assert_eq!(SourceKind::from_path(Path::new("a.txt")), Some(SourceKind::Text));
        assert_eq!(SourceKind::from_path(Path::new("B.PNG")), Some(SourceKind::Png));
        assert_eq!(SourceKind::from_path(Path::new("c.Jpg")), Some(SourceKind::Jpeg));
        assert_eq!(SourceKind::from_path(Path::new("notes.md")), None);
        assert_eq!(SourceKind::from_path(Path::new("txt")), None);
    }

    #[test]
    fn parses_target_formats() {
        assert_eq!("csv".parse::<TargetFormat>().unwrap(), TargetFormat::Csv);
        assert_eq!(".PDF".parse::<TargetFormat>().unwrap(), TargetFormat::Pdf);
        assert_eq!("jpeg".parse::<TargetFormat>().unwrap(), TargetFormat::Jpg);
        assert!("docx".parse::<TargetFormat>().is_err());
    }

    #[test]
    fn batch_output_keeps_original_name() {
        let out = TargetFormat::Csv
            .batch_output_path(Path::new("/in/a.txt"), Path::new("/out"))
            .unwrap();
        assert_eq!(out, PathBuf::from("/out/a.txt.csv"));
    }

    #[test]
    fn dropped_output_names() {
        assert_eq!(
            dropped_output(SourceKind::Text),
            Some((TargetFormat::Pdf, "converted_output.pdf"))
        );
        assert_eq!(
            dropped_output(SourceKind::Png),
            Some((TargetFormat::Jpg, "converted_output.jpg"))
        );
        assert_eq!(dropped_output(SourceKind::Jpeg), None);
    }
}
