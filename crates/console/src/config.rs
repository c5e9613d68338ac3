//! Options loading: an optional TOML file, then per-flag CLI overrides on
//! top.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ferroscope_inspect::InspectOptions;

/// Load options from a TOML file; missing keys fall back to defaults. No
/// file means all defaults.
pub fn load_options(path: Option<&Path>) -> Result<InspectOptions> {
    let Some(path) = path else {
        return Ok(InspectOptions::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading options file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing options file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_missing_path_yields_defaults() {
        let options = load_options(None).unwrap();
        assert!(options.public_fields);
        assert_eq!(options.max_depth, 32);
    }

    #[test]
    fn test_partial_file_overrides_only_named_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "show_duplicates = true").unwrap();
        writeln!(file, "max_depth = 4").unwrap();

        let options = load_options(Some(file.path())).unwrap();
        assert!(options.show_duplicates);
        assert_eq!(options.max_depth, 4);
        // Unnamed keys keep their defaults.
        assert!(options.public_fields);
        assert!(!options.text_internals);
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(load_options(Some(&missing)).is_err());
    }
}
