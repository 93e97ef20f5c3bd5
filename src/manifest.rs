//! # Submodule Manifest
//!
//! Reads the declared submodules of a working tree. The manifest is a
//! `.gitmodules` file, which uses git's INI-like config syntax:
//!
//! ```text
//! [submodule "vendor/lib"]
//!     path = vendor/lib
//!     url = https://github.com/acme/lib.git
//!     branch = stable
//! ```
//!
//! Entries missing `path` or `url` are skipped with a warning, as are
//! repeated paths. A missing or unparsable file is
//! [`Error::ManifestUnreadable`].

use std::collections::HashSet;
use std::path::Path;

use ini::Ini;
use log::warn;

use crate::error::{Error, Result};

/// One submodule as declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleDecl {
    /// Section name (`[submodule "<name>"]`).
    pub name: String,
    /// Location relative to the working tree root.
    pub path: String,
    pub url: String,
    /// Branch to track; `None` tracks the remote's default branch.
    pub branch: Option<String>,
}

/// Source of declared submodules.
pub trait ManifestReader: Send + Sync {
    /// Returns the declared submodules in file order.
    fn read(&self, manifest: &Path) -> Result<Vec<SubmoduleDecl>>;
}

/// Reads `.gitmodules` files from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitmodulesReader;

impl ManifestReader for GitmodulesReader {
    fn read(&self, manifest: &Path) -> Result<Vec<SubmoduleDecl>> {
        let content =
            std::fs::read_to_string(manifest).map_err(|e| Error::ManifestUnreadable {
                path: manifest.to_path_buf(),
                message: e.to_string(),
            })?;
        parse(&content).map_err(|message| Error::ManifestUnreadable {
            path: manifest.to_path_buf(),
            message,
        })
    }
}

/// Parses `.gitmodules` content into declarations.
pub fn parse(content: &str) -> std::result::Result<Vec<SubmoduleDecl>, String> {
    let document = Ini::load_from_str(content).map_err(|e| e.to_string())?;

    let mut seen = HashSet::new();
    let mut declarations = Vec::new();

    for (section, properties) in document.iter() {
        let Some(name) = section.and_then(submodule_name) else {
            continue;
        };

        let mut path = None;
        let mut url = None;
        let mut branch = None;
        for (key, value) in properties.iter() {
            let value = value.trim();
            match key.to_ascii_lowercase().as_str() {
                "path" if !value.is_empty() => path = Some(value.to_string()),
                "url" if !value.is_empty() => url = Some(value.to_string()),
                // "." means "same name as the superproject branch"; the
                // remote's default branch is the closest thing we can track.
                "branch" if !value.is_empty() && value != "." => {
                    branch = Some(value.to_string())
                }
                _ => {}
            }
        }

        let (Some(path), Some(url)) = (path, url) else {
            warn!("Skipping submodule '{}': missing path or url", name);
            continue;
        };
        let path = path.trim_end_matches('/').to_string();
        if !seen.insert(path.clone()) {
            warn!("Skipping duplicate submodule path '{}'", path);
            continue;
        }

        declarations.push(SubmoduleDecl {
            name,
            path,
            url,
            branch,
        });
    }

    Ok(declarations)
}

fn submodule_name(section: &str) -> Option<String> {
    let rest = section.trim().strip_prefix("submodule")?;
    let name = rest.trim().trim_matches('"').trim();
    (!name.is_empty()).then(|| name.to_string())
}
