//! Requirements-file context and the repaired-file artifact.
//!
//! When the failed install referenced a requirements file (`-r <file>`),
//! two things change downstream: the safety filter suppresses
//! suggestions that replay the same file, and a successful repair
//! produces a sibling `<base>.fixed<ext>` file listing the specifiers
//! that actually installed.

use std::path::{Path, PathBuf};

/// Comment line written at the top of the repaired file.
pub const FIXED_FILE_HEADER: &str = "# Generated by pipfix based on successful fixes";

/// Find a `-r <filename>` pair in the original pip argument vector.
pub fn detect_requirements_file(pip_args: &[String]) -> Option<&str> {
    let idx = pip_args.iter().position(|arg| arg == "-r")?;
    pip_args.get(idx + 1).map(String::as_str)
}

/// Sibling path for the repaired file: `requirements.txt` becomes
/// `requirements.fixed.txt`; an extension-less name gets `.fixed`
/// appended.
pub fn fixed_path(original: &Path) -> PathBuf {
    match (original.file_stem(), original.extension()) {
        (Some(stem), Some(ext)) => original.with_file_name(format!(
            "{}.fixed.{}",
            stem.to_string_lossy(),
            ext.to_string_lossy()
        )),
        _ => {
            let mut name = original
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            name.push_str(".fixed");
            original.with_file_name(name)
        }
    }
}

/// Write the repaired file next to the original: the generated-by
/// comment, then one installed specifier per line.
///
/// IO failures (permissions, read-only filesystems) are returned for the
/// caller to report as a warning; they are never fatal to the run.
pub fn write_fixed_file(original: &Path, specifiers: &[String]) -> std::io::Result<PathBuf> {
    let path = fixed_path(original);

    let mut content = String::from(FIXED_FILE_HEADER);
    content.push('\n');
    for spec in specifiers {
        content.push_str(spec);
        content.push('\n');
    }

    tracing::debug!(path = %path.display(), "writing fixed requirements file");
    std::fs::write(&path, content)?;
    Ok(path)
}
