//! Buffer Pool Manager Tests
//!
//! Pin/unpin bookkeeping, clock eviction order, exhaustion, and write-back,
//! exercised through the public API with files opened by a `FileManager`.

use std::sync::Arc;

use heapstore::buffer::{FrameInfo, FrameState};
use heapstore::common::PageId;
use heapstore::storage::FileHandle;
use heapstore::{BufferPoolManager, Error, FileManager, PageHeader};
use proptest::prelude::*;
use tempfile::tempdir;

const FRAMES: usize = 10;

struct Fixture {
    files: FileManager,
    file: FileHandle,
    _dir: tempfile::TempDir,
}

impl Fixture {
    fn new(pool_size: usize) -> Self {
        let dir = tempdir().unwrap();
        let files = FileManager::new(dir.path(), Arc::new(BufferPoolManager::new(pool_size)));
        files.create_file("test.db").unwrap();
        let file = files.open_file("test.db").unwrap();
        Self {
            files,
            file,
            _dir: dir,
        }
    }

    fn bpm(&self) -> &BufferPoolManager {
        self.files.pool()
    }
}

/// Helper to write a string into the page body, after the page header.
fn copy_string(data: &mut [u8], s: &str) {
    let body = &mut data[PageHeader::SIZE..];
    let bytes = s.as_bytes();
    body[..bytes.len()].copy_from_slice(bytes);
    body[bytes.len()] = 0;
}

/// Helper to read a null-terminated string from the page body.
fn read_string(data: &[u8]) -> String {
    let body = &data[PageHeader::SIZE..];
    let end = body.iter().position(|&b| b == 0).unwrap_or(body.len());
    String::from_utf8_lossy(&body[..end]).to_string()
}

fn valid_frames(frames: &[FrameInfo]) -> usize {
    frames.iter().filter(|f| f.is_valid()).count()
}

// ============================================================================
// Basic pin / unpin
// ============================================================================

#[test]
fn test_very_basic() {
    let fx = Fixture::new(FRAMES);
    let bpm = fx.bpm();
    let str_data = "Hello, world!";

    let pinned = bpm.allocate_page(&fx.file).unwrap();
    copy_string(bpm.page_mut(&pinned).as_mut_slice(), str_data);
    assert_eq!(read_string(bpm.page(&pinned).as_slice()), str_data);
    bpm.unpin_page(&fx.file, pinned.page_no(), true).unwrap();

    let again = bpm.fetch_page(&fx.file, pinned.page_no()).unwrap();
    assert_eq!(read_string(bpm.page(&again).as_slice()), str_data);
    bpm.unpin_page(&fx.file, again.page_no(), false).unwrap();

    bpm.dispose_page(&fx.file, pinned.page_no()).unwrap();
    assert!(!bpm.is_resident(&fx.file, pinned.page_no()));
}

#[test]
fn test_pin_counts_accumulate() {
    let fx = Fixture::new(FRAMES);
    let bpm = fx.bpm();
    let page_no = bpm.allocate_page(&fx.file).unwrap().page_no();

    for expected in 2..=5 {
        bpm.fetch_page(&fx.file, page_no).unwrap();
        assert_eq!(bpm.pin_count(&fx.file, page_no), Some(expected));
    }
    for expected in (0..5).rev() {
        bpm.unpin_page(&fx.file, page_no, false).unwrap();
        assert_eq!(bpm.pin_count(&fx.file, page_no), Some(expected));
    }

    assert!(matches!(
        bpm.unpin_page(&fx.file, page_no, false),
        Err(Error::PageNotPinned(_))
    ));
    assert_eq!(bpm.pin_count(&fx.file, page_no), Some(0));
}

#[test]
fn test_unpin_nonresident_page() {
    let fx = Fixture::new(FRAMES);
    assert!(matches!(
        fx.bpm().unpin_page(&fx.file, PageId::new(3), true),
        Err(Error::PageNotPinned(_))
    ));
    assert_eq!(valid_frames(&fx.bpm().frame_snapshot()), 0);
}

// ============================================================================
// Exhaustion
// ============================================================================

#[test]
fn test_all_pinned_buffer_exceeded() {
    let fx = Fixture::new(3);
    let bpm = fx.bpm();

    let pages: Vec<_> = (0..3).map(|_| bpm.allocate_page(&fx.file).unwrap()).collect();
    let before = bpm.frame_snapshot();
    let hand = bpm.clock_hand();

    assert!(matches!(bpm.allocate_page(&fx.file), Err(Error::BufferExceeded)));
    assert_eq!(bpm.frame_snapshot(), before);
    assert_eq!(bpm.clock_hand(), hand);

    // Releasing one pin makes room again.
    bpm.unpin_page(&fx.file, pages[1].page_no(), false).unwrap();
    let fresh = bpm.allocate_page(&fx.file).unwrap();
    assert_eq!(fresh.frame_id(), pages[1].frame_id());
    assert!(!bpm.is_resident(&fx.file, pages[1].page_no()));
}

#[test]
fn test_fetch_with_all_pinned() {
    let fx = Fixture::new(2);
    let bpm = fx.bpm();
    let a = bpm.allocate_page(&fx.file).unwrap();
    bpm.unpin_page(&fx.file, a.page_no(), true).unwrap();

    // Push `a` out, then pin everything.
    bpm.allocate_page(&fx.file).unwrap();
    bpm.allocate_page(&fx.file).unwrap();
    assert!(!bpm.is_resident(&fx.file, a.page_no()));

    assert!(matches!(
        bpm.fetch_page(&fx.file, a.page_no()),
        Err(Error::BufferExceeded)
    ));
}

// ============================================================================
// Clock order
// ============================================================================

#[test]
fn test_clock_second_chance_order() {
    let fx = Fixture::new(3);
    let bpm = fx.bpm();

    // Pages 1, 2, 3 land in frames 0, 1, 2 and are all warm once unpinned.
    let pages: Vec<PageId> = (0..3)
        .map(|_| {
            let p = bpm.allocate_page(&fx.file).unwrap();
            bpm.unpin_page(&fx.file, p.page_no(), false).unwrap();
            p.page_no()
        })
        .collect();
    assert!(bpm
        .frame_snapshot()
        .iter()
        .all(|f| f.state == FrameState::Warm));

    // One full sweep clears every reference bit, then frame 0 goes.
    let p4 = bpm.allocate_page(&fx.file).unwrap();
    assert_eq!(p4.frame_id().0, 0);
    assert!(!bpm.is_resident(&fx.file, pages[0]));
    bpm.unpin_page(&fx.file, p4.page_no(), false).unwrap();

    // Touch page 2 (frame 1) so it gets a second chance; page 3 (frame 2)
    // is cold and goes next.
    bpm.fetch_page(&fx.file, pages[1]).unwrap();
    bpm.unpin_page(&fx.file, pages[1], false).unwrap();

    let p5 = bpm.allocate_page(&fx.file).unwrap();
    assert_eq!(p5.frame_id().0, 2);
    assert!(bpm.is_resident(&fx.file, pages[1]));
    assert!(!bpm.is_resident(&fx.file, pages[2]));
}

#[test]
fn test_pinned_frame_never_evicted() {
    let fx = Fixture::new(3);
    let bpm = fx.bpm();

    let held = bpm.allocate_page(&fx.file).unwrap();
    for _ in 0..10 {
        let p = bpm.allocate_page(&fx.file).unwrap();
        bpm.unpin_page(&fx.file, p.page_no(), false).unwrap();
    }
    assert!(bpm.is_resident(&fx.file, held.page_no()));
    assert_eq!(bpm.frame_snapshot()[held.frame_id().0].state, FrameState::Pinned);
}

// ============================================================================
// Write-back
// ============================================================================

#[test]
fn test_more_pages_than_frames_read_back() {
    let fx = Fixture::new(4);
    let bpm = fx.bpm();

    let pages: Vec<PageId> = (0..20u8)
        .map(|i| {
            let p = bpm.allocate_page(&fx.file).unwrap();
            copy_string(bpm.page_mut(&p).as_mut_slice(), &format!("page-{i}"));
            bpm.unpin_page(&fx.file, p.page_no(), true).unwrap();
            p.page_no()
        })
        .collect();

    assert!(bpm.stats().snapshot().evictions >= 16);

    for (i, &page_no) in pages.iter().enumerate().rev() {
        let p = bpm.fetch_page(&fx.file, page_no).unwrap();
        assert_eq!(read_string(bpm.page(&p).as_slice()), format!("page-{i}"));
        bpm.unpin_page(&fx.file, page_no, false).unwrap();
    }
}

#[test]
fn test_flush_and_reopen() {
    let dir = tempdir().unwrap();
    let page_no;
    {
        let files = FileManager::new(dir.path(), Arc::new(BufferPoolManager::new(FRAMES)));
        files.create_file("db").unwrap();
        let file = files.open_file("db").unwrap();

        let p = files.pool().allocate_page(&file).unwrap();
        copy_string(files.pool().page_mut(&p).as_mut_slice(), "persistent!");
        files.pool().unpin_page(&file, p.page_no(), true).unwrap();
        page_no = p.page_no();
        files.close_file(&file).unwrap();
    }
    {
        let files = FileManager::new(dir.path(), Arc::new(BufferPoolManager::new(FRAMES)));
        let file = files.open_file("db").unwrap();
        let p = files.pool().fetch_page(&file, page_no).unwrap();
        assert_eq!(read_string(files.pool().page(&p).as_slice()), "persistent!");
        files.pool().unpin_page(&file, page_no, false).unwrap();
        files.close_file(&file).unwrap();
    }
}

#[test]
fn test_two_files_share_pool() {
    let fx = Fixture::new(FRAMES);
    fx.files.create_file("other.db").unwrap();
    let other = fx.files.open_file("other.db").unwrap();
    let bpm = fx.bpm();

    // Both files allocate page 1; the directory keeps them apart.
    let a = bpm.allocate_page(&fx.file).unwrap();
    let b = bpm.allocate_page(&other).unwrap();
    assert_eq!(a.page_no(), b.page_no());
    assert_ne!(a.frame_id(), b.frame_id());

    copy_string(bpm.page_mut(&a).as_mut_slice(), "a");
    copy_string(bpm.page_mut(&b).as_mut_slice(), "b");
    bpm.unpin_page(&fx.file, a.page_no(), true).unwrap();
    bpm.unpin_page(&other, b.page_no(), true).unwrap();

    fx.files.close_file(&other).unwrap();
    assert!(bpm.is_resident(&fx.file, a.page_no()));
    assert_eq!(bpm.resident_count(), 1);
}

// ============================================================================
// Invariants under random workloads
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Allocate,
    Fetch(usize),
    Unpin(usize, bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Allocate),
        (0usize..32).prop_map(Op::Fetch),
        (0usize..32, any::<bool>()).prop_map(|(i, d)| Op::Unpin(i, d)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_directory_matches_frames(ops in prop::collection::vec(op(), 1..120)) {
        let fx = Fixture::new(4);
        let bpm = fx.bpm();
        let mut pages: Vec<PageId> = Vec::new();

        for op in ops {
            match op {
                Op::Allocate => {
                    if let Ok(p) = bpm.allocate_page(&fx.file) {
                        pages.push(p.page_no());
                    }
                }
                Op::Fetch(i) if !pages.is_empty() => {
                    let _ = bpm.fetch_page(&fx.file, pages[i % pages.len()]);
                }
                Op::Unpin(i, dirty) if !pages.is_empty() => {
                    let _ = bpm.unpin_page(&fx.file, pages[i % pages.len()], dirty);
                }
                _ => {}
            }

            let frames = bpm.frame_snapshot();
            let entries = bpm.directory_entries();
            prop_assert_eq!(entries.len(), valid_frames(&frames));
            for (key, frame_id) in entries {
                let info = frames[frame_id.0];
                prop_assert_eq!(info.file, Some(key.file));
                prop_assert_eq!(info.page_no, Some(key.page_no));
            }
            for info in &frames {
                if !info.is_valid() {
                    prop_assert_eq!(info.pin_count, 0);
                    prop_assert!(!info.dirty);
                }
            }
        }
    }
}
