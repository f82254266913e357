//! Protocol metadata parsing.
//!
//! Each non-comment line is whitespace-delimited: somewhere on it sits the
//! utterance id (the first token carrying the id prefix) and the last token
//! is the class label.
//!
//! ```text
//! LA_0079 T_1138215 - - bonafide
//! LA_0079 T_1271820 - A01 spoof
//! # comment lines and blank lines are ignored
//! ```

use std::path::Path;

use crate::dataset::Label;

/// Prefix of the utterance-id token in the default protocol files.
pub const DEFAULT_ID_PREFIX: &str = "T_";

/// One parsed metadata line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub utt_id: String,
    /// Lower-cased trailing token, before vocabulary mapping.
    pub label_token: String,
}

impl MetadataEntry {
    /// Class of this entry, `None` for a token outside the vocabulary.
    pub fn label(&self) -> Option<Label> {
        map_label(&self.label_token)
    }
}

/// Map a lower-cased label token onto a class.
///
/// ```rust
/// use voice_spoof_trainer::dataset::Label;
/// use voice_spoof_trainer::staging::map_label;
///
/// assert_eq!(map_label("bonafide"), Some(Label::Real));
/// assert_eq!(map_label("spoof"), Some(Label::Fake));
/// assert_eq!(map_label("partial"), None);
/// ```
pub fn map_label(token: &str) -> Option<Label> {
    match token {
        "bonafide" | "genuine" | "real" => Some(Label::Real),
        "spoof" | "fake" => Some(Label::Fake),
        _ => None,
    }
}

/// Parse one line; `None` for blank and `#` lines.
pub fn parse_line(line: &str, id_prefix: &str) -> Option<MetadataEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let utt_id = tokens
        .iter()
        .find(|t| !id_prefix.is_empty() && t.starts_with(id_prefix))
        .or_else(|| tokens.first())?;
    let label_token = tokens.last()?;

    Some(MetadataEntry {
        utt_id: (*utt_id).to_string(),
        label_token: label_token.to_lowercase(),
    })
}

/// Parse every entry of a metadata file, in file order.
pub fn parse_metadata(path: &Path, id_prefix: &str) -> std::io::Result<Vec<MetadataEntry>> {
    let content = std::fs::read_to_string(path)?;
    let entries: Vec<_> = content
        .lines()
        .filter_map(|line| parse_line(line, id_prefix))
        .collect();
    log::debug!("stage: parsed {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn id_is_first_prefixed_token() {
        let e = parse_line("LA_0079 T_1138215 - - bonafide", "T_").unwrap();
        assert_eq!(e.utt_id, "T_1138215");
        assert_eq!(e.label(), Some(Label::Real));
    }

    #[test]
    fn id_falls_back_to_first_token() {
        let e = parse_line("  utt42\tSPOOF  ", "T_").unwrap();
        assert_eq!(e.utt_id, "utt42");
        assert_eq!(e.label_token, "spoof");
        assert_eq!(e.label(), Some(Label::Fake));
    }

    #[test]
    fn single_token_line_is_its_own_label() {
        let e = parse_line("genuine", "T_").unwrap();
        assert_eq!(e.utt_id, "genuine");
        assert_eq!(e.label(), Some(Label::Real));
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        assert!(parse_line("", "T_").is_none());
        assert!(parse_line("   ", "T_").is_none());
        assert!(parse_line("# LA_0079 T_1 bonafide", "T_").is_none());
    }

    #[test]
    fn unknown_token_has_no_label() {
        let e = parse_line("x T_9 unknown", "T_").unwrap();
        assert_eq!(e.label(), None);
    }

    #[test]
    fn parses_file_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("protocol.txt");
        std::fs::write(
            &path,
            "# header\nLA T_1 - - bonafide\n\nLA T_2 - A07 spoof\nLA T_3 - - Fake\n",
        )
        .unwrap();

        let entries = parse_metadata(&path, DEFAULT_ID_PREFIX).unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.utt_id.as_str()).collect();
        assert_eq!(ids, ["T_1", "T_2", "T_3"]);
        assert_eq!(entries[2].label(), Some(Label::Fake));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        assert!(parse_metadata(&dir.path().join("nope.txt"), "T_").is_err());
    }
}
