//! Lookup table from (source kind, target format) to a converter.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::codecs::{PngToJpeg, TextCopy, TextToCsv, TextToPdf};
use crate::config::AppConfig;
use crate::error::ConversionError;
use crate::format::{SourceKind, TargetFormat};

/// Turns one source file into one destination file.
///
/// Implementations create or overwrite `dest` and must not leave a partial
/// file behind when they fail.
pub trait Converter: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConversionError>;
}

#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<(SourceKind, TargetFormat), Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// An empty registry; every lookup fails with `NotSupported`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in converters, configured from `config`.
    pub fn with_defaults(config: &AppConfig) -> Self {
        let mut registry = Self::new();
        registry.register(SourceKind::Text, TargetFormat::Txt, TextCopy);
        registry.register(SourceKind::Text, TargetFormat::Csv, TextToCsv);
        registry.register(
            SourceKind::Text,
            TargetFormat::Pdf,
            TextToPdf::new(config.pdf.clone()),
        );
        registry.register(
            SourceKind::Png,
            TargetFormat::Jpg,
            PngToJpeg::new(config.jpeg_quality),
        );
        registry
    }

    /// Install `converter` for the pair, replacing any previous one.
    pub fn register<C>(&mut self, kind: SourceKind, target: TargetFormat, converter: C)
    where
        C: Converter + 'static,
    {
        self.converters
            .insert((kind, target), Arc::new(converter) as Arc<dyn Converter>);
    }

    pub fn lookup(
        &self,
        kind: SourceKind,
        target: TargetFormat,
    ) -> Result<Arc<dyn Converter>, ConversionError> {
        self.converters
            .get(&(kind, target))
            .cloned()
            .ok_or_else(|| ConversionError::not_supported(Some(kind), target))
    }

    pub fn supports(&self, kind: SourceKind, target: TargetFormat) -> bool {
        self.converters.contains_key(&(kind, target))
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pairs: Vec<String> = self
            .converters
            .iter()
            .map(|((kind, target), c)| format!("{}->{} ({})", kind, target, c.name()))
            .collect();
        pairs.sort();
        f.debug_struct("ConverterRegistry")
            .field("converters", &pairs)
            .finish()
    }
}
