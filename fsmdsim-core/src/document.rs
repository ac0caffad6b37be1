//! Loading descriptions and stimuli from files.

use crate::definition::{Definition, LoadOptions};
use crate::error::CoreError;
use crate::stimulus::Stimulus;
use std::path::Path;

/// Document encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Xml,
}

impl Format {
    /// Picks the format from the file extension. Unknown extensions are read
    /// as YAML, which also accepts JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Format::Json,
            Some("xml") => Format::Xml,
            _ => Format::Yaml,
        }
    }
}

fn read(path: &Path) -> Result<String, CoreError> {
    std::fs::read_to_string(path).map_err(|source| CoreError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Decodes a description. `name` labels it in logs and reports.
pub fn parse_description(
    name: &str,
    text: &str,
    format: Format,
    options: LoadOptions,
) -> Result<Definition, CoreError> {
    match format {
        Format::Json => Definition::from_json_str(name, text, options),
        Format::Yaml => Definition::from_yaml_str(name, text, options),
        Format::Xml => Definition::from_xml_str(name, text, options),
    }
}

pub fn parse_stimulus(text: &str, format: Format) -> Result<Stimulus, CoreError> {
    match format {
        Format::Json => Stimulus::from_json_str(text),
        Format::Yaml => Stimulus::from_yaml_str(text),
        Format::Xml => Stimulus::from_xml_str(text),
    }
}

/// Reads a description file. The description is named after the file stem.
pub fn load_description(path: impl AsRef<Path>, options: LoadOptions) -> Result<Definition, CoreError> {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fsmd".to_string());
    let text = read(path)?;
    let definition = parse_description(&name, &text, Format::from_path(path), options)?;

    tracing::debug!(
        "Loaded description {} from {} ({} states, {} transitions, checksum {})",
        definition.name,
        path.display(),
        definition.states.len(),
        definition.table().len(),
        definition.checksum
    );

    Ok(definition)
}

/// Reads a stimulus file.
pub fn load_stimulus(path: impl AsRef<Path>) -> Result<Stimulus, CoreError> {
    let path = path.as_ref();
    let text = read(path)?;
    let stimulus = parse_stimulus(&text, Format::from_path(path))?;

    tracing::debug!(
        "Loaded stimulus from {} ({} events)",
        path.display(),
        stimulus.events().len()
    );

    Ok(stimulus)
}
