//! Memory-mapped file loading.
//!
//! `map_file` produces a `FrozenMemoryRegion` over a window of a local file,
//! independent of any serializer. Mapping APIs only accept page-aligned
//! offsets, so the window is widened to whole pages and the returned region
//! points at the requested bytes inside it:
//!
//! ```text
//! file:     |....page....|....page....|....page....|
//! request:            [start ......... start+len)
//! mapping:  [map_offset ............................) map_length
//! region:             ^ base + start % page_size
//! ```
//!
//! The handle owns both the map and the open file. Dropping the last region,
//! sub-range or stream over the window unmaps it and closes the descriptor.

pub mod config;

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use memmap2::{Mmap, MmapOptions};

use crate::error::{BlockError, Result};
use crate::region::{FrozenMemoryRegion, OwnershipHandle};

pub use config::{AccessPattern, MapConfig};

// ── Location ───────────────────────────────────────────────────────

/// A `scheme://path` reference. Bare paths use the `file` scheme.
///
/// The path is kept as an OS path so locations built from a `Path` reach
/// the filesystem byte-for-byte, including names that are not UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    scheme: String,
    path: PathBuf,
}

impl Location {
    pub fn parse(s: &str) -> Result<Self> {
        let (scheme, path) = match s.split_once("://") {
            Some((scheme, path)) => (scheme, path),
            None => ("file", s),
        };
        let scheme_ok = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !scheme_ok {
            return Err(BlockError::invalid_argument(format!(
                "invalid scheme in location '{}'",
                s
            )));
        }
        if path.is_empty() {
            return Err(BlockError::invalid_argument(format!(
                "location '{}' has an empty path",
                s
            )));
        }
        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            path: PathBuf::from(path),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_local_file(&self) -> bool {
        self.scheme == "file"
    }
}

impl FromStr for Location {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        Self::from(path.to_path_buf())
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Self {
            scheme: "file".to_string(),
            path,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.path.display())
    }
}

// ── Page arithmetic ────────────────────────────────────────────────

/// System page size.
#[cfg(unix)]
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

#[cfg(not(unix))]
pub fn page_size() -> usize {
    4096
}

/// Page-aligned `(map_offset, map_length)` covering
/// `[start_offset, start_offset + length)`.
///
/// `None` when `page` is not a power of two or the window end, rounded up
/// to a whole page, does not fit in `u64`.
pub fn mapping_window(start_offset: u64, length: u64, page: u64) -> Option<(u64, u64)> {
    if !page.is_power_of_two() {
        return None;
    }
    let mask = page - 1;
    let map_offset = start_offset & !mask;
    let end = start_offset.checked_add(length)?;
    let map_length = (end - map_offset).checked_add(mask)? & !mask;
    map_offset.checked_add(map_length)?;
    Some((map_offset, map_length))
}

// ── map_file ───────────────────────────────────────────────────────

/// Owner of a mapped window: unmaps, then closes the descriptor, on drop.
struct MappedFile {
    mmap: Mmap,
    _file: File,
    path: PathBuf,
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        tracing::debug!(
            path = %self.path.display(),
            map_length = self.mmap.len(),
            "unmapping file window"
        );
    }
}

/// Map `length` bytes (`None` = to end of file) of a local file starting at
/// `start_offset`, read-only and shared.
pub fn map_file(
    location: &Location,
    start_offset: u64,
    length: Option<u64>,
) -> Result<FrozenMemoryRegion> {
    map_file_with(location, start_offset, length, &MapConfig::default())
}

/// `map_file` with explicit mapping options.
pub fn map_file_with(
    location: &Location,
    start_offset: u64,
    length: Option<u64>,
    config: &MapConfig,
) -> Result<FrozenMemoryRegion> {
    if !location.is_local_file() {
        return Err(BlockError::UnsupportedScheme(location.scheme().to_string()));
    }

    let path = location.path().to_path_buf();
    let file = File::open(&path).map_err(|e| BlockError::io(&path, e))?;
    let file_size = file.metadata().map_err(|e| BlockError::io(&path, e))?.len();

    if start_offset > file_size {
        return Err(BlockError::invalid_argument(format!(
            "start offset {} is past the end of {} ({} bytes)",
            start_offset,
            path.display(),
            file_size
        )));
    }
    let length = length.unwrap_or(file_size - start_offset);
    match start_offset.checked_add(length) {
        Some(end) if end <= file_size => {}
        _ => {
            return Err(BlockError::invalid_argument(format!(
                "window [{}, +{}) extends past the end of {} ({} bytes)",
                start_offset,
                length,
                path.display(),
                file_size
            )));
        }
    }

    tracing::debug!(path = %path.display(), file_size, start_offset, length, "mapping file");

    if length == 0 {
        return Ok(FrozenMemoryRegion::empty());
    }

    let page = page_size() as u64;
    let (map_offset, map_length) = mapping_window(start_offset, length, page).ok_or_else(|| {
        BlockError::invalid_argument(format!(
            "window [{}, +{}) cannot be rounded to {}-byte pages",
            start_offset, length, page
        ))
    })?;
    let map_length = usize::try_from(map_length).map_err(|_| {
        BlockError::invalid_argument(format!(
            "mapping of {} bytes cannot be addressed on this platform",
            map_length
        ))
    })?;
    tracing::debug!(map_offset, map_length, "mapping window");

    advise(&file, map_offset, map_length, config);

    let mut options = MmapOptions::new();
    options.offset(map_offset).len(map_length);
    if config.populate {
        options.populate();
    }
    // Safety: the map is read-only; concurrent modification of the file by
    // other processes is outside this layer's contract.
    let mmap = unsafe { options.map(&file) }.map_err(|e| BlockError::io(&path, e))?;

    let intra_page = (start_offset - map_offset) as usize;
    let data = unsafe { mmap.as_ptr().add(intra_page) };
    tracing::debug!(skipped = intra_page, length, "mapped region");

    let handle = OwnershipHandle::new(MappedFile {
        mmap,
        _file: file,
        path,
    });
    // The map's address does not change when it moves into the handle.
    Ok(unsafe { FrozenMemoryRegion::from_raw_parts(handle, data, length as usize) })
}

#[cfg(target_os = "linux")]
fn advise(file: &File, offset: u64, length: usize, config: &MapConfig) {
    use std::os::fd::AsRawFd;

    let Some(flag) = config.access.fadvise_flag() else {
        return;
    };
    let res = unsafe {
        libc::posix_fadvise(
            file.as_raw_fd(),
            offset as libc::off_t,
            length as libc::off_t,
            flag,
        )
    };
    if res != 0 {
        tracing::debug!(errno = res, "posix_fadvise hint ignored");
    }
}

#[cfg(not(target_os = "linux"))]
fn advise(_file: &File, _offset: u64, _length: usize, _config: &MapConfig) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file_with(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_location_parse() {
        let loc = Location::parse("file:///tmp/data.bin").unwrap();
        assert_eq!(loc.scheme(), "file");
        assert_eq!(loc.path(), Path::new("/tmp/data.bin"));
        assert!(loc.is_local_file());

        let bare: Location = "relative/data.bin".parse().unwrap();
        assert!(bare.is_local_file());
        assert_eq!(bare.path(), Path::new("relative/data.bin"));

        let remote = Location::parse("S3://bucket/key").unwrap();
        assert_eq!(remote.scheme(), "s3");
        assert!(!remote.is_local_file());
        assert_eq!(remote.to_string(), "s3://bucket/key");

        assert!(Location::parse("file://").is_err());
        assert!(Location::parse("://x").is_err());
    }

    #[test]
    fn test_mapping_window() {
        assert_eq!(mapping_window(0, 1, 4096), Some((0, 4096)));
        assert_eq!(mapping_window(0, 4096, 4096), Some((0, 4096)));
        assert_eq!(mapping_window(100, 10, 4096), Some((0, 4096)));
        assert_eq!(mapping_window(4095, 2, 4096), Some((0, 8192)));
        assert_eq!(mapping_window(5000, 100, 4096), Some((4096, 4096)));
        assert_eq!(mapping_window(8192, 4097, 4096), Some((8192, 8192)));
    }

    #[test]
    fn test_mapping_window_rejects_overflow_and_bad_page() {
        assert_eq!(mapping_window(u64::MAX - 10, 100, 4096), None);
        assert_eq!(mapping_window(u64::MAX - 10, 5, 4096), None);
        assert_eq!(mapping_window(0, 10, 0), None);
        assert_eq!(mapping_window(0, 10, 3000), None);
    }

    #[test]
    fn test_map_whole_file() {
        let contents: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let file = temp_file_with(&contents);
        let region = map_file(&Location::from(file.path()), 0, None).unwrap();
        assert_eq!(region.len(), contents.len());
        assert_eq!(region.data(), contents.as_slice());
    }

    #[test]
    fn test_map_unaligned_offset() {
        let contents: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let file = temp_file_with(&contents);
        let location = Location::from(file.path());
        for k in [1u64, 7, 4095, 4096, 4097, 9_999] {
            let region = map_file(&location, k, Some(10_000 - k)).unwrap();
            assert_eq!(region.data(), &contents[k as usize..], "offset {}", k);
        }
    }

    #[test]
    fn test_map_to_end_from_offset() {
        let file = temp_file_with(b"header|body");
        let region = map_file(&Location::from(file.path()), 7, None).unwrap();
        assert_eq!(region.data(), b"body");
    }

    #[test]
    fn test_map_empty_window() {
        let file = temp_file_with(b"");
        let region = map_file(&Location::from(file.path()), 0, None).unwrap();
        assert!(region.is_empty());
    }

    #[test]
    fn test_map_past_end_is_rejected() {
        let file = temp_file_with(b"short");
        let location = Location::from(file.path());
        assert!(matches!(
            map_file(&location, 2, Some(10)),
            Err(BlockError::InvalidArgument(_))
        ));
        assert!(matches!(
            map_file(&location, 6, None),
            Err(BlockError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unsupported_scheme() {
        let location = Location::parse("http://example.com/data.bin").unwrap();
        let err = map_file(&location, 0, None).unwrap_err();
        assert!(matches!(err, BlockError::UnsupportedScheme(ref s) if s == "http"));
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let location = Location::parse("file:///definitely/not/here.bin").unwrap();
        let err = map_file(&location, 0, None).unwrap_err();
        assert!(matches!(err, BlockError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.bin"));
    }

    #[test]
    fn test_populate_and_advice() {
        let file = temp_file_with(&[42u8; 20_000]);
        let config = MapConfig::default()
            .with_populate(true)
            .with_access(AccessPattern::Sequential);
        let region = map_file_with(&Location::from(file.path()), 123, Some(5_000), &config).unwrap();
        assert_eq!(region.len(), 5_000);
        assert!(region.data().iter().all(|&b| b == 42));
    }
}
