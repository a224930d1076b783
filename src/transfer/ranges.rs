//! Byte-range planning for parallel downloads, and reconciliation with part
//! files left on disk by an earlier session.

use std::path::Path;

/// Number of parallel workers a file is split across.
const RANGE_WORKERS: u64 = 4;

/// One planned byte range. `downloaded_size` is how much of it already sits
/// on disk; a range with `downloaded_size == len()` is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRange {
    pub from: u64,
    pub to: u64,
    pub downloaded_size: u64,
}

impl FileRange {
    pub fn len(&self) -> u64 {
        self.to - self.from + 1
    }

    pub fn is_complete(&self) -> bool {
        self.downloaded_size == self.len()
    }
}

/// Divides `[0, file_size)` into four contiguous ranges. Files smaller than
/// the worker count collapse into a single range. The last range absorbs the
/// division remainder.
pub fn plan_file_ranges(file_size: u64) -> Vec<FileRange> {
    let chunk = file_size / RANGE_WORKERS;
    if chunk == 0 {
        return vec![FileRange {
            from: 0,
            to: file_size.saturating_sub(1),
            downloaded_size: 0,
        }];
    }

    let mut ranges = Vec::with_capacity(RANGE_WORKERS as usize);
    for i in 0..RANGE_WORKERS {
        let from = i * chunk;
        let to = if i == RANGE_WORKERS - 1 {
            file_size - 1
        } else {
            from + chunk - 1
        };
        ranges.push(FileRange {
            from,
            to,
            downloaded_size: 0,
        });
    }
    ranges
}

/// Scans a contract's download directory for part files of one file hash,
/// named `<file_hash_hex>_part_<from>_<to>`, and returns their ranges with
/// on-disk sizes, ordered by range end.
pub async fn scan_downloaded_parts(
    dir: &Path,
    file_hash_hex: &str,
) -> std::io::Result<Vec<FileRange>> {
    let prefix = format!("{file_hash_hex}_part_");
    let mut ranges = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(bounds) = name.strip_prefix(&prefix) else {
            continue;
        };
        let Some((from, to)) = bounds.split_once('_') else {
            continue;
        };
        let (Ok(from), Ok(to)) = (from.parse::<u64>(), to.parse::<u64>()) else {
            continue;
        };
        let size = entry.metadata().await?.len();
        ranges.push(FileRange {
            from,
            to,
            downloaded_size: size,
        });
    }
    ranges.sort_by_key(|r| r.to);
    Ok(ranges)
}

/// Annotates a plan with the sizes of on-disk parts whose `{from,to}` tuple
/// matches a planned range exactly. Parts that match nothing are ignored; a
/// directory holding more parts than the plan has ranges belongs to a
/// different layout and disables reconciliation entirely (fresh download).
pub fn reconcile(plan: &mut [FileRange], existing: &[FileRange]) {
    if existing.len() > plan.len() {
        return;
    }
    for range in plan.iter_mut() {
        for part in existing {
            if range.from == part.from && range.to == part.to {
                range.downloaded_size = part.downloaded_size;
            }
        }
    }
}
