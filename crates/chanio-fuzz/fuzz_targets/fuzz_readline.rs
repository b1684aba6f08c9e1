#![no_main]
use std::sync::atomic::{AtomicU64, Ordering};

use chanio_core::{BufferedChannel, ChannelConfig, LineAndBlockReader, LineSeparator, ModeDescriptor};
use libfuzzer_sys::fuzz_target;

static RUN: AtomicU64 = AtomicU64::new(0);

// Input layout: [capacity, sep_len, sep..., contents...]
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let capacity = usize::from(data[0]).max(1);
    let sep_len = usize::from(data[1] % 4).min(data.len() - 2);
    let (sep, contents) = data[2..].split_at(sep_len);

    let path = std::env::temp_dir().join(format!(
        "chanio-fuzz-readline-{}-{}",
        std::process::id(),
        RUN.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::write(&path, contents).unwrap();

    let mode = ModeDescriptor::parse("r").unwrap();
    let ch = BufferedChannel::open_with_config(&path, mode, ChannelConfig::with_capacity(capacity))
        .unwrap();
    let mut reader = LineAndBlockReader::new(ch);
    let separator = LineSeparator::from_bytes(Some(sep));

    // Concatenated lines reproduce the file, except in paragraph mode
    // where extra blank lines are dropped.
    let mut joined = Vec::new();
    while let Some(line) = reader.read_line(separator).unwrap() {
        assert!(!line.is_empty());
        joined.extend_from_slice(&line);
    }
    if !sep.is_empty() {
        assert_eq!(joined, contents);
    } else {
        assert!(joined.len() <= contents.len());
    }
    let _ = std::fs::remove_file(&path);
});
