//! Filename resolution between the runtime's symbol table and the user.
//!
//! The runtime always speaks absolute paths. The console lets the user type
//! a bare basename when it is unambiguous across the server's file list,
//! and shortens paths the same way when printing. An optional prefix
//! mapping translates between the local checkout and the remote build tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Forward and reverse lookup over the server's file list.
#[derive(Debug, Default)]
pub struct FilenameIndex {
    /// `basename | full path -> full path`; ambiguous basenames are absent.
    forward: HashMap<String, String>,
    /// `full path -> shortest unique display name`.
    reverse: HashMap<String, String>,
}

impl FilenameIndex {
    pub fn new(files: impl IntoIterator<Item = String>) -> Self {
        let files: Vec<String> = files.into_iter().collect();

        let mut basename_count: HashMap<String, usize> = HashMap::new();
        for file in &files {
            if let Some(base) = basename(file) {
                *basename_count.entry(base.to_string()).or_default() += 1;
            }
        }

        let mut index = FilenameIndex::default();
        for file in files {
            if let Some(base) = basename(&file)
                && basename_count.get(base) == Some(&1)
            {
                index.forward.insert(base.to_string(), file.clone());
                index.reverse.insert(file.clone(), base.to_string());
            } else {
                index.reverse.insert(file.clone(), file.clone());
            }
            index.forward.insert(file.clone(), file);
        }
        index
    }

    /// Expand a user-typed name to the full server path, if known.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.forward.get(name).map(String::as_str)
    }

    /// The shortest unambiguous rendition of a server path.
    pub fn display<'a>(&'a self, full_path: &'a str) -> &'a str {
        self.reverse
            .get(full_path)
            .map(String::as_str)
            .unwrap_or(full_path)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.reverse.keys().map(String::as_str)
    }
}

fn basename(path: &str) -> Option<&str> {
    Path::new(path).file_name().and_then(|name| name.to_str())
}

/// Recursive search for a relative source file under the workspace root,
/// first match wins. Used by the console's `l` command when the index does
/// not know the file.
pub fn find_in_workspace(root: &Path, name: &str) -> Option<PathBuf> {
    let needle = Path::new(name);
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| entry.file_type().is_file() && entry.path().ends_with(needle))
        .map(|entry| entry.into_path())
}

/// Prefix rewrite between the local checkout and the remote build tree the
/// symbol table was produced in.
#[derive(Debug, Clone, Default)]
pub struct PathMapping {
    /// Local prefix (`srcPath` / the `LOCAL` half of `--map`).
    local: Option<String>,
    /// Remote prefix (`dstPath` / the `REMOTE` half of `--map`).
    remote: Option<String>,
}

impl PathMapping {
    pub fn new(local: Option<String>, remote: Option<String>) -> Self {
        Self { local, remote }
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_none() || self.remote.is_none()
    }

    /// Rewrite a local path for the wire.
    pub fn to_remote(&self, path: &str) -> String {
        rewrite(path, self.local.as_deref(), self.remote.as_deref())
    }

    /// Rewrite a wire path for display / disk access.
    pub fn to_local(&self, path: &str) -> String {
        rewrite(path, self.remote.as_deref(), self.local.as_deref())
    }

    /// The `{src: dst}` object of the `connection` request.
    pub fn as_wire(&self) -> Option<HashMap<String, String>> {
        match (&self.local, &self.remote) {
            (Some(local), Some(remote)) => {
                Some(HashMap::from([(local.clone(), remote.clone())]))
            }
            _ => None,
        }
    }
}

fn rewrite(path: &str, from: Option<&str>, to: Option<&str>) -> String {
    if let (Some(from), Some(to)) = (from, to)
        && let Some(rest) = path.strip_prefix(from)
    {
        let mut out = to.trim_end_matches('/').to_string();
        if !rest.starts_with('/') {
            out.push('/');
        }
        out.push_str(rest);
        return out;
    }
    path.to_string()
}
