//! Save/Load integration tests through real and in-memory storage.

use std::path::Path;

use cardlab_core::{CardContext, ClassicKind, Family, NfcAParams, Source, Technology, Uid};
use cardlab_dump::{DumpError, archive_path, load, save};
use cardlab_hardware::{FsStorage, mock::MemoryStorage};
use tempfile::TempDir;

const UID: [u8; 7] = [0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

fn ntag215() -> CardContext {
    let mut ctx = CardContext::new(4096);
    ctx.set_technology(Technology::A);
    ctx.set_family(Family::Ultralight);
    ctx.set_uid(Uid::new(&UID).unwrap());
    ctx.set_nfca(NfcAParams::new([0x44, 0x00], 0x00));
    ctx.set_version(Some([0x00, 0x04, 0x04, 0x02, 0x01, 0x00, 0x11, 0x03]));
    let dump = ctx.dump_mut();
    dump.configure(4, 135).unwrap();
    for page in 0..135u8 {
        dump.write_unit(page as usize, &[page, page ^ 0xFF, 0xA5, 0x5A])
            .unwrap();
    }
    dump.set_has_dump(true);
    ctx.refresh_summary();
    ctx
}

#[test]
fn test_ntag_roundtrip_through_filesystem() {
    let dir = TempDir::new().unwrap();
    let path = archive_path(dir.path(), &Uid::new(&UID).unwrap());
    let mut storage = FsStorage::new();
    let original = ntag215();

    save(&mut storage, &path, &original).unwrap();
    assert!(path.ends_with("04112233445566.nfc"));

    let mut loaded = CardContext::new(4096);
    load(&mut storage, &path, &mut loaded).unwrap();

    assert_eq!(loaded.technology(), original.technology());
    assert_eq!(loaded.family(), original.family());
    assert_eq!(loaded.uid(), original.uid());
    assert_eq!(loaded.nfca(), original.nfca());
    assert_eq!(loaded.version(), original.version());
    assert_eq!(loaded.dump(), original.dump());
    assert_eq!(loaded.summary(), original.summary());
    assert_eq!(loaded.source(), &Source::LoadFile { path: path.clone() });
}

#[test]
fn test_file_text_is_crlf() {
    let mut storage = MemoryStorage::new();
    let path = Path::new("/ext/nfc/tag.nfc");
    save(&mut storage, path, &ntag215()).unwrap();

    let text = storage.text(path).unwrap();
    assert!(text.starts_with("Filetype: M1 NFC device\r\nVersion: 4\r\n"));
    assert!(text.contains("Page 134: 86 79 A5 5A\r\n"));
    assert!(!text.replace("\r\n", "").contains('\n'));
}

#[test]
fn test_sparse_dump_roundtrips_as_gaps() {
    let mut original = ntag215();
    original.dump_mut().configure(4, 45).unwrap();
    original.dump_mut().write_unit(3, &[0xE1, 0x10, 0x12, 0x00]).unwrap();
    original.dump_mut().write_unit(40, &[0xFF; 4]).unwrap();
    original.dump_mut().set_has_dump(true);

    let mut storage = MemoryStorage::new();
    let path = Path::new("/sparse.nfc");
    save(&mut storage, path, &original).unwrap();

    let mut loaded = CardContext::new(4096);
    load(&mut storage, path, &mut loaded).unwrap();
    assert_eq!(loaded.page_count(), 45);
    assert_eq!(loaded.dump().valid_count(), 2);
    assert_eq!(loaded.dump().unit(4), None);
    assert_eq!(loaded.dump().unit(40), Some(&[0xFF; 4][..]));
}

#[test]
fn test_classic_roundtrip() {
    let mut original = CardContext::new(4096);
    original.set_uid(Uid::new(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap());
    original.set_family(Family::Classic(ClassicKind::FourK));
    original.set_nfca(NfcAParams::new([0x02, 0x00], 0x18));
    original.dump_mut().configure(16, 256).unwrap();
    original.dump_mut().write_unit(0, &[0xDE; 16]).unwrap();
    original.dump_mut().write_unit(255, &[0x07; 16]).unwrap();
    original.dump_mut().set_has_dump(true);

    let mut storage = MemoryStorage::new();
    let path = Path::new("/classic.nfc");
    save(&mut storage, path, &original).unwrap();

    let mut loaded = CardContext::new(4096);
    load(&mut storage, path, &mut loaded).unwrap();
    assert_eq!(loaded.family(), Family::Classic(ClassicKind::FourK));
    assert_eq!(loaded.dump(), original.dump());
}

#[test]
fn test_missing_file_is_io_error() {
    let mut storage = MemoryStorage::new();
    let mut ctx = ntag215();
    let err = load(&mut storage, Path::new("/nope.nfc"), &mut ctx).unwrap_err();
    assert!(matches!(err, DumpError::Io(_)));
    assert_eq!(err.user_message(), "Invalid file");
}

#[test]
fn test_stream_failure_is_io_error_and_resets_context() {
    let mut storage = MemoryStorage::new();
    storage.insert("/bad.nfc", b"Filetype: M1 NFC device\r\n".to_vec());
    storage.fail_reads("/bad.nfc");

    let mut ctx = ntag215();
    let err = load(&mut storage, Path::new("/bad.nfc"), &mut ctx).unwrap_err();
    assert!(matches!(err, DumpError::Io(_)));
    assert!(!ctx.is_loaded());
    assert_eq!(ctx.source(), &Source::None);
}

#[test]
fn test_write_failure_is_io_error() {
    let mut storage = MemoryStorage::new();
    storage.fail_writes("/out.nfc");
    let err = save(&mut storage, Path::new("/out.nfc"), &ntag215()).unwrap_err();
    assert!(matches!(err, DumpError::Io(_)));
}

#[test]
fn test_unsupported_device_message() {
    let mut storage = MemoryStorage::new();
    storage.insert(
        "/plus.nfc",
        b"Filetype: M1 NFC device\r\nVersion: 4\r\nDevice type: Mifare Plus\r\nUID: 04 01 02 03\r\n"
            .to_vec(),
    );
    let mut ctx = CardContext::new(1024);
    let err = load(&mut storage, Path::new("/plus.nfc"), &mut ctx).unwrap_err();
    assert_eq!(err.user_message(), "Card type not supported");
}
