use std::path::{Path, PathBuf};

use tracing::debug;

use aidesign_types::{Result, SettingsError};
use aidesign_xml::{parse, to_string_pretty, Document};

use crate::builder::{new_document, PipelineBuilder};
use crate::loader::{load_with_options, LoadOptions, LoadedSettings};

/// One settings document and the file it is saved to.
#[derive(Debug, Clone)]
pub struct Settings {
    document: Document,
    path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// Fresh document with no backing file.
    pub fn new() -> Self {
        Self::from_document(new_document())
    }

    pub fn from_document(document: Document) -> Self {
        Self {
            document,
            path: None,
        }
    }

    pub fn from_xml(source: &str) -> Result<Self> {
        Ok(Self::from_document(parse(source)?))
    }

    /// Read and parse `path`; later [`save`](Self::save) calls write back to it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let document = parse(&source)?;
        debug!(path = %path.display(), bytes = source.len(), "Opened settings file");
        Ok(Self {
            document,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn builder(&mut self) -> PipelineBuilder<'_> {
        PipelineBuilder::new(&mut self.document)
    }

    pub fn load(&mut self) -> Result<LoadedSettings> {
        self.load_with_options(&LoadOptions::default())
    }

    pub fn load_with_options(&mut self, options: &LoadOptions) -> Result<LoadedSettings> {
        load_with_options(&mut self.document, options)
    }

    pub fn to_xml_string(&self) -> String {
        to_string_pretty(&self.document)
    }

    /// Write to the file this session was opened from or last saved as.
    pub fn save(&self) -> Result<()> {
        let path = self.path.as_deref().ok_or(SettingsError::NoFilePath)?;
        let xml = self.to_xml_string();
        std::fs::write(path, &xml)?;
        debug!(path = %path.display(), bytes = xml.len(), "Saved settings file");
        Ok(())
    }

    pub fn save_as(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.path = Some(path.into());
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aidesign_types::LiteralValue;

    #[test]
    fn new_session_has_empty_sections() {
        let mut settings = Settings::new();
        assert!(settings.path().is_none());
        let loaded = settings.load().unwrap();
        assert!(loaded.pipeline.is_empty());
        assert!(loaded.data.is_empty());
    }

    #[test]
    fn save_without_path_fails() {
        let settings = Settings::new();
        assert!(matches!(settings.save(), Err(SettingsError::NoFilePath)));
    }

    #[test]
    fn save_as_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.xml");

        let mut settings = Settings::new();
        settings
            .builder()
            .append_data_schema_field("epochs", &LiteralValue::Int(10), None)
            .unwrap();
        settings.save_as(&path).unwrap();
        assert_eq!(settings.path(), Some(path.as_path()));

        let mut reopened = Settings::open(&path).unwrap();
        assert_eq!(reopened.to_xml_string(), settings.to_xml_string());
        let loaded = reopened.load().unwrap();
        assert_eq!(loaded.data["epochs"], LiteralValue::from("10"));
    }

    #[test]
    fn open_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::open(dir.path().join("absent.xml")).unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));
    }

    #[test]
    fn from_xml_reports_parse_errors() {
        assert!(matches!(
            Settings::from_xml("<Settings>"),
            Err(SettingsError::ParseError { .. })
        ));
    }
}
