//! OOXML zip container: every part held in memory, unknown parts passed through untouched

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use super::styles::StyleSheet;
use crate::error::{MigrateError, MigrateResult};

pub const VBA_PROJECT_PART: &str = "xl/vbaProject.bin";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Largest single part accepted when reading a package, uncompressed
pub const MAX_PART_BYTES: u64 = 256 * 1024 * 1024;
/// Largest sum of all parts accepted when reading a package, uncompressed
pub const MAX_PACKAGE_BYTES: u64 = 512 * 1024 * 1024;

static NEXT_PACKAGE_ID: AtomicU64 = AtomicU64::new(1);

/// The parts of one loaded workbook package, plus what the writer needs to put it back together
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    id: u64,
    parts: BTreeMap<String, Vec<u8>>,
    pub(crate) workbook_part: String,
    pub(crate) styles_part: Option<String>,
    pub(crate) styles: StyleSheet,
}

impl Package {
    pub fn from_bytes(bytes: &[u8], label: &str) -> MigrateResult<Self> {
        Self::from_bytes_with_limits(bytes, label, MAX_PART_BYTES, MAX_PACKAGE_BYTES)
    }

    /// Read every part, refusing entries that inflate past `max_part` bytes or
    /// packages whose parts add up to more than `max_total`.
    ///
    /// Sizes declared in the zip directory are never trusted for allocation.
    pub(crate) fn from_bytes_with_limits(
        bytes: &[u8],
        label: &str,
        max_part: u64,
        max_total: u64,
    ) -> MigrateResult<Self> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| MigrateError::input_format(label, format!("not a workbook package: {}", e)))?;

        let mut parts = BTreeMap::new();
        let mut total: u64 = 0;
        for i in 0..zip.len() {
            let mut file = zip
                .by_index(i)
                .map_err(|e| MigrateError::input_format(label, e.to_string()))?;
            if !file.is_file() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut buf = Vec::new();
            (&mut file)
                .take(max_part.saturating_add(1))
                .read_to_end(&mut buf)
                .map_err(|e| MigrateError::input_format(label, format!("{}: {}", name, e)))?;
            let len = buf.len() as u64;
            if len > max_part {
                return Err(MigrateError::input_format(
                    label,
                    format!("{} exceeds {} bytes uncompressed", name, max_part),
                ));
            }
            total += len;
            if total > max_total {
                return Err(MigrateError::input_format(
                    label,
                    format!("package exceeds {} bytes uncompressed", max_total),
                ));
            }
            parts.insert(name, buf);
        }

        Ok(Self::from_parts(parts))
    }

    pub(crate) fn from_parts(parts: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            id: NEXT_PACKAGE_ID.fetch_add(1, Ordering::Relaxed),
            parts,
            workbook_part: "xl/workbook.xml".to_string(),
            styles_part: None,
            styles: StyleSheet::default(),
        }
    }

    /// Identifies layouts and style indices that belong to this package
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .get(name.trim_start_matches('/'))
            .map(Vec::as_slice)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name.trim_start_matches('/'))
    }

    /// UTF-8 text of an XML part, without a byte-order mark
    pub(crate) fn text(&self, name: &str, label: &str) -> MigrateResult<Option<String>> {
        let Some(bytes) = self.part(name) else {
            return Ok(None);
        };
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|_| MigrateError::input_format(label, format!("{} is not UTF-8", name)))
    }

    pub(crate) fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        self.parts.insert(name.trim_start_matches('/').to_string(), bytes);
    }

    pub(crate) fn remove_part(&mut self, name: &str) -> Option<Vec<u8>> {
        self.parts.remove(name.trim_start_matches('/'))
    }

    pub fn to_bytes(&self) -> MigrateResult<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);

        // `[Content_Types].xml` sorts first, which is where readers expect it
        for (name, bytes) in &self.parts {
            zip.start_file(name.as_str(), options).map_err(zip_write_error)?;
            zip.write_all(bytes)?;
        }

        let cursor = zip.finish().map_err(zip_write_error)?;
        Ok(cursor.into_inner())
    }
}

fn zip_write_error(err: zip::result::ZipError) -> MigrateError {
    MigrateError::Io(std::io::Error::other(err))
}

/// `xl/workbook.xml` → `xl/_rels/workbook.xml.rels`
pub(crate) fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the part that owns the relationship
pub(crate) fn resolve_target(owner_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match owner_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Inverse of [`resolve_target`] for parts living below the owner's directory
pub(crate) fn relative_target(owner_part: &str, part: &str) -> String {
    match owner_part.rsplit_once('/') {
        Some((dir, _)) => part
            .strip_prefix(dir)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
            .unwrap_or_else(|| format!("/{}", part)),
        None => part.to_string(),
    }
}
