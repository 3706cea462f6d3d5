#![no_main]

use glimpse::archive::{ArchiveReader, SCAN_WINDOW, ZipScanner};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let mut input = Cursor::new(data);
    let Ok(mut scanner) = ZipScanner::open(&mut input) else {
        return;
    };
    let limit = scanner.limit();
    let Ok(scan) = scanner.scan() else {
        return;
    };
    assert!(scan.images <= SCAN_WINDOW.min(scan.total));
    if let Some(entry) = scan.candidate {
        if let Ok(member) = scanner.extract(&entry) {
            let extracted = member.metadata().map(|m| m.len()).unwrap_or(0);
            assert!(extracted <= limit);
        }
    }
});
