//! JSON and filesystem helpers used by the result store

use crate::error::from_io;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Serialize `data` as JSON into `path`, optionally clearing the file first.
///
/// # Errors
///
/// Returns error if serialization or the write fails.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, data: &T, do_clear: bool) -> Result<()> {
    if do_clear {
        clear_file(path)?;
    }
    let bytes = serde_json::to_vec_pretty(data)?;
    fs::write(path, bytes).map_err(|e| from_io(e, path))
}

/// Read and decode the JSON file at `path`.
///
/// # Errors
///
/// Returns `NotFound` for a missing file, `Json` for undecodable content.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| from_io(e, path))?;
    Ok(serde_json::from_slice(&bytes)?)
}

type Condition = Box<dyn Fn(&Value) -> bool>;

/// Options for [`add_to_json`].
#[derive(Default)]
pub struct AddToJson {
    key: Option<String>,
    default: Option<Value>,
    append_value: bool,
    condition: Option<Condition>,
}

impl AddToJson {
    /// Add under `key` of a JSON object instead of pushing onto a JSON array.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Content to start from when the file does not exist.
    #[must_use]
    pub fn default_content(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Append to the list stored at `key` rather than replacing it.
    #[must_use]
    pub const fn append_value(mut self, append: bool) -> Self {
        self.append_value = append;
        self
    }

    /// Only write when `condition(original)` holds.
    #[must_use]
    pub fn condition(mut self, condition: impl Fn(&Value) -> bool + 'static) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }
}

/// Add `value` to the JSON content of `path` and save it.
///
/// Without a key the content must be an array and `value` is pushed. With a key the
/// content must be an object; `value` replaces the entry, or with `append_value` is pushed
/// onto the list at that key (created if absent).
///
/// # Errors
///
/// Returns `NotFound` when the file is missing and no default is given, and
/// `InvalidInput` when the content shape does not fit the options.
pub fn add_to_json(path: &Path, value: Value, options: &AddToJson) -> Result<()> {
    let mut original = match read_json::<Value>(path) {
        Ok(content) => content,
        Err(Error::NotFound { .. }) if options.default.is_some() => {
            options.default.clone().unwrap_or(Value::Null)
        }
        Err(e) => return Err(e),
    };

    if let Some(condition) = &options.condition {
        if !original.is_null() && !condition(&original) {
            return Ok(());
        }
    }

    match (&options.key, &mut original) {
        (None, Value::Array(items)) => items.push(value),
        (Some(key), Value::Object(map)) => {
            if options.append_value {
                match map.entry(key.clone()).or_insert_with(|| Value::Array(Vec::new())) {
                    Value::Array(items) => items.push(value),
                    other => {
                        return Err(Error::InvalidInput(format!(
                            "cannot append to non-list value {other} at key '{key}' in {}",
                            path.display()
                        )))
                    }
                }
            } else {
                map.insert(key.clone(), value);
            }
        }
        (key, content) => {
            return Err(Error::InvalidInput(format!(
                "cannot add to {} content with key {key:?} in {}",
                json_kind(content),
                path.display()
            )))
        }
    }

    write_json(path, &original, false)
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Create `path` and any missing parents.
///
/// # Errors
///
/// Returns an `AlreadyExists` I/O error when the directory exists and `exist_ok` is false.
pub fn make_dirs(path: &Path, exist_ok: bool) -> Result<()> {
    if path.exists() && !exist_ok {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("directory already exists: {}", path.display()),
        )));
    }
    fs::create_dir_all(path).map_err(|e| from_io(e, path))
}

/// Truncate the file at `path`, creating it if needed.
///
/// # Errors
///
/// Returns error if the file cannot be opened for writing.
pub fn clear_file(path: &Path) -> Result<()> {
    fs::File::create(path).map(drop).map_err(|e| from_io(e, path))
}

/// Render the directory tree under `root`.
///
/// `depth` limits how many directory levels below `root` are expanded (`None` for all).
/// Entries are sorted; files are listed before subdirectories; symlinks show their target.
///
/// ```text
/// root/
/// |-- file_0.txt
/// |-- sub_a/
/// |   |-- file_2.py
/// ```
///
/// # Errors
///
/// Returns error if a directory cannot be read.
pub fn render_tree(root: &Path, depth: Option<usize>) -> Result<String> {
    let mut out = String::new();
    render_dir(root, 0, depth, &mut out)?;
    Ok(out)
}

fn render_dir(dir: &Path, level: usize, depth: Option<usize>, out: &mut String) -> Result<()> {
    let indent = if level == 0 {
        String::new()
    } else {
        format!("{}|-- ", "|   ".repeat(level - 1))
    };
    let _ = writeln!(out, "{indent}{}/", display_name(dir));

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| from_io(e, dir))? {
        let path = entry?.path();
        let is_link = fs::symlink_metadata(&path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if path.is_dir() && !is_link {
            dirs.push(path);
        } else {
            files.push(path);
        }
    }
    files.sort();
    dirs.sort();

    let sub_indent = format!("{}|-- ", "|   ".repeat(level));
    for file in &files {
        let _ = writeln!(out, "{sub_indent}{}", display_name(file));
    }
    if depth.map_or(true, |max| level < max) {
        for sub in &dirs {
            render_dir(sub, level + 1, depth, out)?;
        }
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    match fs::read_link(path) {
        Ok(target) => format!("{name} -> {}", target.display()),
        Err(_) => name,
    }
}
