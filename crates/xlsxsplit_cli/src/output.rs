//! Writing split artifacts to disk.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use xlsxsplit::{SpecArtifact, derive_unique_file_name, sanitize_file_name};

/// Write every artifact into `dir_out` and return the written paths.
///
/// Artifact names are reduced to a single file name inside `dir_out`;
/// duplicates get ` (2)`, ` (3)` suffixes. Nothing is written when some target
/// exists and `if_overwrite` is false.
pub fn write_artifacts(
    artifacts: &[SpecArtifact],
    dir_out: &Path,
    if_overwrite: bool,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir_out)
        .with_context(|| format!("Failed to create output directory {}", dir_out.display()))?;

    let mut set_names_used = BTreeSet::new();
    let mut l_paths: Vec<PathBuf> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let c_name_safe = derive_output_file_name(&artifact.name)?;
        let c_name = derive_unique_file_name(&c_name_safe, &mut set_names_used);
        if c_name != artifact.name {
            warn!("artifact name {:?} written as {c_name:?}", artifact.name);
        }
        l_paths.push(dir_out.join(c_name));
    }

    if !if_overwrite
        && let Some(path_existing) = l_paths.iter().find(|path| path.exists())
    {
        bail!(
            "Refusing to overwrite {}; pass --overwrite to replace existing files",
            path_existing.display()
        );
    }

    for (artifact, path_out) in artifacts.iter().zip(&l_paths) {
        fs::write(path_out, &artifact.bytes)
            .with_context(|| format!("Failed to write {}", path_out.display()))?;
        debug!("wrote {} ({} bytes)", path_out.display(), artifact.bytes.len());
    }

    Ok(l_paths)
}

/// Sanitize stem and extension separately so the result is one plain file name.
fn derive_output_file_name(name: &str) -> Result<String> {
    let (c_stem, c_ext) = match name.rfind('.') {
        Some(n_pos) if n_pos > 0 => name.split_at(n_pos),
        _ => (name, ""),
    };
    let c_name = format!("{}{}", sanitize_file_name(c_stem), sanitize_file_name(c_ext));

    let l_components: Vec<Component<'_>> = Path::new(&c_name).components().collect();
    if !matches!(l_components.as_slice(), [Component::Normal(_)]) {
        bail!("Artifact name {name:?} does not form a valid file name");
    }
    Ok(c_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str, bytes: &[u8]) -> SpecArtifact {
        SpecArtifact {
            name: name.to_string(),
            bytes: bytes.to_vec(),
            row_count: 1,
            group_label: name.trim_end_matches(".xlsx").to_string(),
            size_text: format!("{} Bytes", bytes.len()),
        }
    }

    #[test]
    fn test_write_artifacts_creates_directory_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let dir_out = dir.path().join("nested").join("out");

        let l_paths = write_artifacts(
            &[artifact("North.xlsx", b"n"), artifact("South.xlsx", b"s")],
            &dir_out,
            false,
        )
        .unwrap();

        assert_eq!(
            l_paths,
            vec![dir_out.join("North.xlsx"), dir_out.join("South.xlsx")]
        );
        assert_eq!(fs::read(&l_paths[0]).unwrap(), b"n");
        assert_eq!(fs::read(&l_paths[1]).unwrap(), b"s");
    }

    #[test]
    fn test_write_artifacts_suffixes_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();

        let l_paths = write_artifacts(
            &[artifact("a_b.xlsx", b"1"), artifact("a_b.xlsx", b"2")],
            dir.path(),
            false,
        )
        .unwrap();

        assert_eq!(l_paths[1], dir.path().join("a_b (2).xlsx"));
        assert_eq!(fs::read(&l_paths[1]).unwrap(), b"2");
    }

    #[test]
    fn test_write_artifacts_keeps_slashes_in_names_inside_output_dir() {
        let dir = tempfile::tempdir().unwrap();

        let l_paths =
            write_artifacts(&[artifact("Region/Area-sales.xlsx", b"r")], dir.path(), false)
                .unwrap();

        assert_eq!(l_paths, vec![dir.path().join("Region_Area-sales.xlsx")]);
        assert_eq!(fs::read(&l_paths[0]).unwrap(), b"r");
    }

    #[test]
    fn test_write_artifacts_never_escapes_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dir_out = dir.path().join("a").join("b");

        let l_paths = write_artifacts(
            &[artifact("../../escape-sales.xlsx", b"e")],
            &dir_out,
            false,
        )
        .unwrap();

        assert_eq!(l_paths[0].parent(), Some(dir_out.as_path()));
        assert!(l_paths[0].exists());
        assert!(!dir.path().join("escape-sales.xlsx").exists());
    }

    #[test]
    fn test_write_artifacts_rejects_names_without_a_file_component() {
        let dir = tempfile::tempdir().unwrap();

        let err = write_artifacts(&[artifact("..", b"x")], dir.path(), false).unwrap_err();
        assert!(err.to_string().contains("valid file name"));
    }

    #[test]
    fn test_write_artifacts_refuses_existing_files_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("South.xlsx"), b"old").unwrap();
        let l_artifacts = [artifact("North.xlsx", b"n"), artifact("South.xlsx", b"new")];

        let err = write_artifacts(&l_artifacts, dir.path(), false).unwrap_err();
        assert!(err.to_string().contains("--overwrite"));
        assert!(!dir.path().join("North.xlsx").exists());

        write_artifacts(&l_artifacts, dir.path(), true).unwrap();
        assert_eq!(fs::read(dir.path().join("South.xlsx")).unwrap(), b"new");
    }
}
