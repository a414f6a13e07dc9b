//! # Rename Planner
//!
//! Derives a target filename/path for a written file from its canonical
//! metadata and a naming template, optionally relocating the file into an
//! `<library_root>/<Author>/<Series>/` hierarchy.
//!
//! Planning is pure - it computes a path and detects collisions without
//! touching the filesystem mutably. The actual move happens in
//! [`execute_rename`], and only the service layer calls it, after the
//! file's tag write has succeeded.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{LibraryError, Result};
use crate::models::BookMetadata;

/// Template placeholders recognized by [`render_template`].
const PLACEHOLDERS: [(&str, fn(&BookMetadata) -> Option<String>); 5] = [
    ("{author}", |m| m.author.clone()),
    ("{title}", |m| m.title.clone()),
    ("{series}", |m| m.series.clone()),
    ("{sequence}", |m| m.sequence.as_deref().map(pad_sequence)),
    ("{year}", |m| m.year.clone()),
];

/// Compute the target path for a file.
///
/// # Arguments
///
/// * `source` - current path of the file
/// * `metadata` - canonical metadata driving the new name
/// * `template` - filename template over `{author}`, `{title}`,
///   `{series}`, `{sequence}`, `{year}`
/// * `reorganize` - nest under `<library_root>/<Author>/<Series>/`
/// * `library_root` - required when `reorganize` is set
///
/// # Errors
///
/// Fails when the template renders to an empty name or `reorganize` is
/// requested without a library root.
pub fn plan_rename(
    source: &Path,
    metadata: &BookMetadata,
    template: &str,
    reorganize: bool,
    library_root: Option<&Path>,
) -> Result<PathBuf> {
    let stem = render_template(template, metadata)?;

    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    let filename = match extension {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    };

    let directory = if reorganize {
        let root = library_root.ok_or_else(|| {
            LibraryError::Template("Reorganize requested without a library root".to_string())
        })?;
        let mut dir = root.join(scrub_component(
            metadata.author.as_deref().unwrap_or("Unknown Author"),
        ));
        if let Some(series) = metadata.series.as_deref() {
            dir = dir.join(scrub_component(series));
        }
        dir
    } else {
        source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    };

    let target = directory.join(filename);
    debug!(source = %source.display(), target = %target.display(), "Planned rename");
    Ok(target)
}

/// Move a file to its planned target.
///
/// Refuses to overwrite: a target that already exists and is not the
/// source itself is a collision, reported per file and never resolved by
/// clobbering. A plan whose target equals the source is a no-op.
pub async fn execute_rename(source: &Path, target: &Path) -> Result<()> {
    if source == target {
        debug!(path = %source.display(), "Rename is a no-op");
        return Ok(());
    }

    if tokio::fs::try_exists(target).await? {
        return Err(LibraryError::RenameCollision {
            target: target.to_path_buf(),
        });
    }

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::rename(source, target).await?;
    info!(from = %source.display(), to = %target.display(), "Renamed file");
    Ok(())
}

/// Render the naming template, dropping separators left dangling by
/// absent fields.
fn render_template(template: &str, metadata: &BookMetadata) -> Result<String> {
    let mut rendered = template.to_string();
    for (token, getter) in PLACEHOLDERS {
        let value = getter(metadata).unwrap_or_default();
        rendered = rendered.replace(token, &value);
    }

    let cleaned = cleanup_separators(&scrub_component(&rendered));
    if cleaned.is_empty() {
        return Err(LibraryError::Template(format!(
            "Template '{}' rendered to an empty name",
            template
        )));
    }
    Ok(cleaned)
}

/// Replace filesystem-unsafe characters with `-` and collapse whitespace.
fn scrub_component(component: &str) -> String {
    let replaced: String = component
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse separator runs produced by empty placeholders:
/// `"A -  - B"` → `"A - B"`, then trim stray separators at the ends.
fn cleanup_separators(name: &str) -> String {
    let mut parts: Vec<&str> = name
        .split(" - ")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        parts = vec![name.trim()];
    }
    parts
        .join(" - ")
        .trim_matches([' ', '-', '.'])
        .to_string()
}

/// Zero-pad integer sequences to two digits so lexical order equals
/// series order; non-integer sequences ("2.5") pass through.
fn pad_sequence(sequence: &str) -> String {
    match sequence.trim().parse::<u32>() {
        Ok(n) if n < 10 => format!("0{}", n),
        _ => sequence.trim().to_string(),
    }
}
