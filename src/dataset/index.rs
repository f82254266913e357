//! Directory scan: `<root>/{real,fake}/*.wav` → [`DatasetRecord`]s.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{DatasetError, Label};

/// One audio file paired with its class.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DatasetRecord {
    pub path: PathBuf,
    pub label: Label,
}

/// Per-class population of a record list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub real: usize,
    pub fake: usize,
}

impl ClassCounts {
    pub fn from_records(records: &[DatasetRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, r| {
            match r.label {
                Label::Real => acc.real += 1,
                Label::Fake => acc.fake += 1,
            }
            acc
        })
    }

    pub fn get(&self, label: Label) -> usize {
        match label {
            Label::Real => self.real,
            Label::Fake => self.fake,
        }
    }

    pub fn total(&self) -> usize {
        self.real + self.fake
    }
}

impl std::fmt::Display for ClassCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} real / {} fake", self.real, self.fake)
    }
}

/// Enumerate `<root>/real` and `<root>/fake` non-recursively.
///
/// Only regular files with a `.wav` extension (any case) are taken.  A
/// missing class directory contributes no records; a missing root is an
/// error.  The result is sorted by path within each class, real first, so
/// the index is identical across platforms and runs.
pub fn build(root: &Path) -> Result<Vec<DatasetRecord>, DatasetError> {
    if !root.is_dir() {
        return Err(DatasetError::MissingRoot(root.to_path_buf()));
    }

    let mut records = Vec::new();
    for label in Label::ALL {
        let dir = root.join(label.dir_name());
        if !dir.is_dir() {
            log::warn!("dataset: {} has no `{}` directory", root.display(), label);
            continue;
        }

        let mut paths = Vec::new();
        let entries = std::fs::read_dir(&dir).map_err(|source| DatasetError::Scan {
            path: dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| DatasetError::Scan {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && is_wav(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        log::debug!("dataset: {} {} clips in {}", paths.len(), label, dir.display());
        records.extend(paths.into_iter().map(|path| DatasetRecord { path, label }));
    }

    Ok(records)
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn pairs_files_with_their_directory_label() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("real/b.wav"));
        touch(&dir.path().join("real/a.WAV"));
        touch(&dir.path().join("fake/x.wav"));
        touch(&dir.path().join("fake/notes.txt"));
        touch(&dir.path().join("fake/nested/deep.wav"));

        let records = build(dir.path()).unwrap();
        let names: Vec<_> = records
            .iter()
            .map(|r| (r.path.file_name().unwrap().to_str().unwrap(), r.label))
            .collect();
        assert_eq!(
            names,
            vec![("a.WAV", Label::Real), ("b.wav", Label::Real), ("x.wav", Label::Fake)]
        );
    }

    #[test]
    fn missing_class_directory_is_empty() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("real/a.wav"));

        let records = build(dir.path()).unwrap();
        assert_eq!(ClassCounts::from_records(&records), ClassCounts { real: 1, fake: 0 });
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let err = build(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, DatasetError::MissingRoot(_)));
    }

    #[test]
    fn class_counts_tally() {
        let rec = |label| DatasetRecord {
            path: PathBuf::from("x.wav"),
            label,
        };
        let counts = ClassCounts::from_records(&[rec(Label::Fake), rec(Label::Real), rec(Label::Fake)]);
        assert_eq!(counts.get(Label::Fake), 2);
        assert_eq!(counts.get(Label::Real), 1);
        assert_eq!(counts.total(), 3);
    }
}
