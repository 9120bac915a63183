use crate::error::{BumpError, Result};
use std::fs;
use std::io;
use std::path::Path;

/// Project display name from the level-1 heading on the README's first line
pub fn resolve_project_name(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => BumpError::DocumentNotFound(path.to_path_buf()),
        _ => BumpError::Io(e),
    })?;

    project_name(&content).ok_or_else(|| {
        BumpError::parse(format!(
            "project name not found in {}: expected '# <name>' on the first line",
            path.display()
        ))
    })
}

fn project_name(content: &str) -> Option<String> {
    let first_line = content.lines().next()?;
    let name = first_line.strip_prefix("# ")?.trim();

    (!name.is_empty()).then(|| name.to_string())
}
