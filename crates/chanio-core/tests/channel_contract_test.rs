use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use chanio_core::{
    BufferedChannel, ChannelConfig, ChannelError, DescriptorTable, LineAndBlockReader,
    LineSeparator, ModeDescriptor, ReopenPolicy, Whence,
};

const CAPACITY: usize = 64;

fn temp_path(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()))
}

fn mode(spec: &str) -> ModeDescriptor {
    ModeDescriptor::parse(spec).unwrap()
}

fn config() -> ChannelConfig {
    ChannelConfig::with_capacity(CAPACITY)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

#[test]
fn write_seek_read_round_trip_around_capacity() {
    for len in [CAPACITY / 2, CAPACITY, CAPACITY * 3 + 5] {
        let path = temp_path("chanio-roundtrip");
        let data = pattern(len);
        let mut ch = BufferedChannel::open_with_config(&path, mode("w+"), config()).unwrap();
        assert_eq!(ch.write_block(&data).unwrap(), len);
        assert_eq!(ch.current_position().unwrap(), len as u64);
        ch.seek(0, Whence::Start).unwrap();
        assert_eq!(ch.read_block(len).unwrap().unwrap(), data, "len {len}");
        assert_eq!(ch.read_block(1).unwrap(), None);
        ch.close().unwrap();
        fs::remove_file(&path).unwrap();
    }
}

#[test]
fn second_close_reports_closed_handle() {
    let path = temp_path("chanio-double-close");
    let mut ch = BufferedChannel::open(&path, mode("w")).unwrap();
    ch.close().unwrap();
    assert!(matches!(ch.close(), Err(ChannelError::ClosedHandle)));
    assert!(matches!(ch.read_byte(), Err(ChannelError::ClosedHandle)));
    fs::remove_file(&path).unwrap();
}

#[test]
fn switching_to_read_flushes_and_continues_after_written_bytes() {
    let path = temp_path("chanio-switch");
    fs::write(&path, b"0123456789TAIL").unwrap();
    let mut ch = BufferedChannel::open_with_config(&path, mode("r+"), config()).unwrap();
    ch.write_block(b"abcdefghij").unwrap();

    // Not visible through an independent handle until the switch.
    assert_eq!(fs::read(&path).unwrap(), b"0123456789TAIL");
    assert_eq!(ch.read_block(4).unwrap().unwrap(), b"TAIL");

    let mut other = BufferedChannel::open(&path, mode("r")).unwrap();
    assert_eq!(other.read_all().unwrap().unwrap(), b"abcdefghijTAIL");
    fs::remove_file(&path).unwrap();
}

#[test]
fn switching_to_write_lands_at_logical_position() {
    let path = temp_path("chanio-switch-write");
    fs::write(&path, pattern(CAPACITY * 2)).unwrap();
    let mut ch = BufferedChannel::open_with_config(&path, mode("r+"), config()).unwrap();
    ch.read_block(3).unwrap();
    ch.write_block(b"XYZ").unwrap();
    ch.close().unwrap();
    let contents = fs::read(&path).unwrap();
    assert_eq!(&contents[3..6], b"XYZ");
    assert_eq!(contents.len(), CAPACITY * 2);
    fs::remove_file(&path).unwrap();
}

#[test]
fn pushback_overwrites_pending_byte() {
    let path = temp_path("chanio-pushback");
    fs::write(&path, b"abc").unwrap();
    let ch = BufferedChannel::open(&path, mode("r")).unwrap();
    let mut reader = LineAndBlockReader::new(ch);
    reader.unget_char(i32::from(b'X'));
    assert_eq!(reader.get_char().unwrap(), Some(b'X'));
    reader.unget_char(i32::from(b'1'));
    reader.unget_char(i32::from(b'2'));
    assert_eq!(reader.get_char().unwrap(), Some(b'2'));
    assert_eq!(reader.get_char().unwrap(), Some(b'a'));
    fs::remove_file(&path).unwrap();
}

#[test]
fn read_exactly_at_short_and_empty_files() {
    let n = 10;
    let short = temp_path("chanio-exact-short");
    fs::write(&short, pattern(n - 1)).unwrap();
    let mut reader =
        LineAndBlockReader::new(BufferedChannel::open_with_config(&short, mode("r"), config()).unwrap());
    assert_eq!(reader.read_exactly(n).unwrap().unwrap(), pattern(n - 1));

    let empty = temp_path("chanio-exact-empty");
    fs::write(&empty, b"").unwrap();
    let mut reader = LineAndBlockReader::new(BufferedChannel::open(&empty, mode("r")).unwrap());
    assert_eq!(reader.read_exactly(n).unwrap(), None);

    fs::remove_file(&short).unwrap();
    fs::remove_file(&empty).unwrap();
}

#[test]
fn three_lines_then_end_of_file() {
    let path = temp_path("chanio-lines");
    fs::write(&path, b"foo\nbar\nbaz").unwrap();
    let mut reader = LineAndBlockReader::new(BufferedChannel::open(&path, mode("r")).unwrap());
    let sep = LineSeparator::Delimiter(b"\n");
    assert_eq!(reader.read_line(sep).unwrap().unwrap(), b"foo\n");
    assert_eq!(reader.read_line(sep).unwrap().unwrap(), b"bar\n");
    assert_eq!(reader.read_line(sep).unwrap().unwrap(), b"baz");
    assert_eq!(reader.read_line(sep).unwrap(), None);
    fs::remove_file(&path).unwrap();
}

#[test]
fn write_mode_truncates_on_open() {
    let path = temp_path("chanio-truncate-open");
    fs::write(&path, b"OLDDATA").unwrap();
    let _writer = BufferedChannel::open(&path, mode("w")).unwrap();
    let mut reader = BufferedChannel::open(&path, mode("r")).unwrap();
    assert_eq!(reader.read_byte().unwrap(), None);
    assert!(reader.is_at_end_of_file().unwrap());
    fs::remove_file(&path).unwrap();
}

#[test]
fn append_lands_at_end_regardless_of_seeks() {
    let path = temp_path("chanio-append");
    fs::write(&path, b"original").unwrap();
    let mut ch = BufferedChannel::open(&path, mode("a+")).unwrap();
    ch.seek(0, Whence::Start).unwrap();
    assert_eq!(ch.read_byte().unwrap(), Some(b'o'));
    ch.write_block(b"X").unwrap();
    ch.flush().unwrap();

    let mut other = BufferedChannel::open(&path, mode("r")).unwrap();
    assert_eq!(other.read_all().unwrap().unwrap(), b"originalX");
    fs::remove_file(&path).unwrap();
}

#[test]
fn clone_gets_independent_cursor() {
    let path = temp_path("chanio-clone");
    fs::write(&path, pattern(40)).unwrap();
    let mut original = BufferedChannel::open_with_config(&path, mode("r+"), config()).unwrap();
    original.seek(10, Whence::Start).unwrap();
    let mut clone = original.try_clone().unwrap();
    assert_eq!(clone.current_position().unwrap(), 10);

    original.write_block(b"ABCDE").unwrap();
    original.flush().unwrap();
    assert_eq!(original.current_position().unwrap(), 15);
    assert_eq!(clone.current_position().unwrap(), 10);

    clone.read_block(20).unwrap();
    assert_eq!(clone.current_position().unwrap(), 30);
    assert_eq!(original.current_position().unwrap(), 15);
    fs::remove_file(&path).unwrap();
}

#[test]
fn clone_does_not_truncate_again() {
    let path = temp_path("chanio-clone-trunc");
    let mut ch = BufferedChannel::open(&path, mode("w")).unwrap();
    ch.write_block(b"keep me").unwrap();
    let clone = ch.try_clone().unwrap();
    assert_eq!(clone.mode(), ch.mode());
    assert_eq!(fs::read(&path).unwrap(), b"keep me");
    fs::remove_file(&path).unwrap();
}

#[test]
fn rotated_file_is_reopened_before_whole_stream_read() {
    let path = temp_path("chanio-rotated");
    fs::write(&path, b"first generation\n").unwrap();
    let mut ch = BufferedChannel::open_with_config(&path, mode("r"), config()).unwrap();
    assert_eq!(ch.read_all().unwrap().unwrap(), b"first generation\n");

    // Truncate in place and write a shorter file.
    fs::write(&path, b"second\n").unwrap();
    ch.seek(0, Whence::Start).unwrap();
    assert_eq!(ch.read_all().unwrap().unwrap(), b"second\n");
    fs::remove_file(&path).unwrap();
}

#[test]
fn mtime_policy_catches_same_length_rewrite() {
    let path = temp_path("chanio-mtime");
    let replacement = temp_path("chanio-mtime-new");
    fs::write(&path, b"aaaa").unwrap();
    let config = ChannelConfig {
        reopen_policy: ReopenPolicy::LengthAndModified,
        ..config()
    };
    let mut ch = BufferedChannel::open_with_config(&path, mode("r"), config).unwrap();
    fs::write(&replacement, b"bbbb").unwrap();
    let old = fs::metadata(&path).unwrap().modified().unwrap();
    let file = fs::File::options().write(true).open(&replacement).unwrap();
    file.set_modified(old + std::time::Duration::from_secs(5)).unwrap();
    drop(file);
    fs::rename(&replacement, &path).unwrap();
    assert_eq!(ch.read_all().unwrap().unwrap(), b"bbbb");
    fs::remove_file(&path).unwrap();
}

#[test]
fn descriptor_table_end_to_end() {
    let path = temp_path("chanio-table");
    let table = DescriptorTable::with_config(config());
    let fd = table.open(&path, mode("w+")).unwrap();
    assert!(fd >= 3);
    let handler = table.get(fd).unwrap();
    {
        let mut h = handler.lock();
        h.write_block(b"line one\nline two\n").unwrap();
        h.rewind().unwrap();
        assert_eq!(
            h.read_line(LineSeparator::default()).unwrap().unwrap(),
            b"line one\n"
        );
        h.truncate(4).unwrap();
        assert!(h.is_at_end_of_file().unwrap());
    }
    table.close(fd).unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"line");
    fs::remove_file(&path).unwrap();
}
