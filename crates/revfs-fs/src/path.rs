//! Path helpers. Paths are absolute, `/`-separated, with no trailing slash
//! except for the root itself.

use crate::error::{FsError, FsResult};

/// Normalize a path: make it absolute, drop empty and `.` components and
/// apply `..`. Climbing above the root is an error.
pub fn normalize(path: &str) -> FsResult<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(FsError::InvalidPath(path.to_string()));
                }
            }
            other => parts.push(other),
        }
    }
    Ok(format!("/{}", parts.join("/")))
}

/// Components of a normalized path; empty for the root.
pub fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// Parent directory of a normalized path. The root is its own parent.
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Final component of a normalized path; empty for the root.
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

pub fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}
