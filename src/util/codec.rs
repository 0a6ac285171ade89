//! Document encoding selected by file extension.
//!
//! `.yaml` / `.yml` files use YAML; everything else is pretty-printed JSON.

use crate::util::{ShapeMatchError, ShapeMatchResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Encoding {
    Json,
    Yaml,
}

fn encoding_of(path: &Path) -> Encoding {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            Encoding::Yaml
        }
        _ => Encoding::Json,
    }
}

fn parse_error(path: &Path, reason: impl ToString) -> ShapeMatchError {
    ShapeMatchError::Parse {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Serializes `value` and writes it to `path`.
pub(crate) fn write_document<T: Serialize>(path: &Path, value: &T) -> ShapeMatchResult<()> {
    let text = match encoding_of(path) {
        Encoding::Yaml => serde_yaml::to_string(value).map_err(|err| parse_error(path, err))?,
        Encoding::Json => {
            serde_json::to_string_pretty(value).map_err(|err| parse_error(path, err))?
        }
    };
    fs::write(path, text).map_err(|err| ShapeMatchError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

/// Reads `path` and deserializes its content.
pub(crate) fn read_document<T: DeserializeOwned>(path: &Path) -> ShapeMatchResult<T> {
    let text = fs::read_to_string(path).map_err(|err| ShapeMatchError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    match encoding_of(path) {
        Encoding::Yaml => serde_yaml::from_str(&text).map_err(|err| parse_error(path, err)),
        Encoding::Json => serde_json::from_str(&text).map_err(|err| parse_error(path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::{encoding_of, read_document, write_document, Encoding};
    use crate::util::ShapeMatchError;
    use serde::{Deserialize, Serialize};
    use std::path::Path;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        values: Vec<i32>,
    }

    #[test]
    fn extension_selects_encoding() {
        assert_eq!(encoding_of(Path::new("a/b.yaml")), Encoding::Yaml);
        assert_eq!(encoding_of(Path::new("b.YML")), Encoding::Yaml);
        assert_eq!(encoding_of(Path::new("b.json")), Encoding::Json);
        assert_eq!(encoding_of(Path::new("noext")), Encoding::Json);
    }

    #[test]
    fn documents_survive_both_encodings() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Doc {
            name: "gear".into(),
            values: vec![1, -2, 3],
        };
        for file in ["doc.yaml", "doc.json"] {
            let path = dir.path().join(file);
            write_document(&path, &doc).unwrap();
            let back: Doc = read_document(&path).unwrap();
            assert_eq!(back, doc);
        }
    }

    #[test]
    fn missing_and_malformed_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = read_document::<Doc>(&missing).unwrap_err();
        assert!(matches!(err, ShapeMatchError::Io { .. }));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        let err = read_document::<Doc>(&bad).unwrap_err();
        assert!(matches!(err, ShapeMatchError::Parse { .. }));
    }
}
