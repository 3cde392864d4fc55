//! Read, archive, reload and emulate a card through one session.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cardlab_core::Family;
use cardlab_dump::DumpError;
use cardlab_hardware::mock::{MemoryStorage, MockRadio, MockRadioHandle, MockTag, RecordingNotifier};
use cardlab_session::{Session, SessionConfig, SessionError};
use tokio::sync::watch;
use tokio::time;

const UID: [u8; 7] = [0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
const ARCHIVE: &str = "/cards/04112233445566.nfc";

type MockSession = Session<MockRadio, MemoryStorage, RecordingNotifier>;

fn session(config: SessionConfig) -> (MockSession, MockRadioHandle) {
    let (radio, handle) = MockRadio::new();
    let session = Session::new(radio, MemoryStorage::new(), RecordingNotifier::new(), config)
        .unwrap();
    (session, handle)
}

fn archiving_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.poller.archive_dir = Some(PathBuf::from("/cards"));
    config
}

/// Stop signal that fires after `after`.
fn stop_after(after: Duration) -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        time::sleep(after).await;
        let _ = tx.send(true);
    });
    rx
}

#[tokio::test(start_paused = true)]
async fn test_read_mode_archives_card() {
    let (mut session, handle) = session(archiving_config());
    handle.present_tag(MockTag::ntag(UID.to_vec(), 45));

    let report = session
        .run_reader(stop_after(Duration::from_millis(55)))
        .await
        .unwrap();

    assert_eq!(report.ticks, 6);
    assert_eq!(report.events.len(), 1);
    let card = &report.events[0];
    assert_eq!(card.family, Family::Ultralight);
    assert_eq!(card.archived.as_deref(), Some(Path::new(ARCHIVE)));
    assert_eq!(card.acquisition.as_ref().map(|a| a.pages_read), Some(45));

    assert_eq!(session.context().page_count(), 45);
    assert!(session.storage().contents(Path::new(ARCHIVE)).is_some());
    assert_eq!(
        session.notifier().last(),
        Some(session.context().summary())
    );
}

#[tokio::test(start_paused = true)]
async fn test_archived_card_is_emulated() {
    let (mut session, handle) = session(archiving_config());
    handle.present_tag(MockTag::ntag(UID.to_vec(), 45));
    session
        .run_reader(stop_after(Duration::from_millis(50)))
        .await
        .unwrap();

    session.clear();
    assert!(!session.context().is_loaded());
    session.load_file(ARCHIVE).unwrap();
    assert!(session.context().is_loaded());
    assert_eq!(session.context().version().map(|v| v[6]), Some(0x0F));

    handle.remove_tag();
    handle.reader_enters_field();
    handle.reader_sends(vec![0x30, 0x00]);
    handle.reader_sends(vec![0x60]);
    session
        .run_emulator(stop_after(Duration::from_millis(100)))
        .await
        .unwrap();

    let mut page0 = UID.to_vec();
    page0.extend([0; 9]);
    assert_eq!(
        handle.transmitted(),
        vec![page0, vec![0x00, 0x04, 0x04, 0x02, 0x01, 0x00, 0x0F, 0x03]]
    );
    let params = handle.discovery_params().unwrap();
    assert_eq!(params.identity.map(|id| id.uid), Some(UID.to_vec()));
}

#[tokio::test(start_paused = true)]
async fn test_read_session_discards_loaded_card() {
    let (mut session, _handle) = session(SessionConfig::default());
    session.storage_mut().insert(
        "/ext/nfc/tag.nfc",
        "Filetype: M1 NFC device\r\nVersion: 4\r\nDevice type: Ultralight/NTAG\r\n\
         UID: 04 11 22 33 44 55 66\r\nATQA: 44 00\r\nSAK: 00\r\n\
         Pages: 45\r\nPage 0: 04 11 22 B7\r\n",
    );
    session.load_file("/ext/nfc/tag.nfc").unwrap();
    assert!(session.context().is_loaded());

    let report = session
        .run_reader(stop_after(Duration::from_millis(35)))
        .await
        .unwrap();

    assert!(report.events.is_empty());
    assert!(!session.context().is_loaded());
    assert_eq!(session.context().dump().valid_count(), 0);
    assert!(matches!(
        session.save_file("/ext/nfc/again.nfc"),
        Err(DumpError::NoCard)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stop_deactivates_radio() {
    let (mut session, handle) = session(SessionConfig::default());
    let (tx, rx) = watch::channel(true);

    let report = session.run_reader(rx).await.unwrap();
    drop(tx);

    assert_eq!(report.ticks, 0);
    assert!(report.events.is_empty());
    assert_eq!(
        handle.deactivations(),
        vec![cardlab_hardware::DeactivateMode::Idle]
    );
}

#[test]
fn test_load_failure_leaves_card_empty() {
    let (mut session, _handle) = session(SessionConfig::default());
    session
        .storage_mut()
        .insert("/ext/nfc/bad.nfc", "Filetype: Something else\r\n");

    let err = session.load_file("/ext/nfc/bad.nfc").unwrap_err();
    assert!(matches!(err, DumpError::Format { .. }));
    assert!(!session.context().is_loaded());
    assert!(session.notifier().updates().is_empty());
}

#[test]
fn test_save_without_card() {
    let (mut session, _handle) = session(SessionConfig::default());
    let err = session.save_file("/ext/nfc/empty.nfc").unwrap_err();
    assert!(matches!(err, DumpError::NoCard));
}

#[test]
fn test_invalid_config_rejected() {
    let (radio, _handle) = MockRadio::new();
    let config = SessionConfig {
        tick_interval_ms: 0,
        ..SessionConfig::default()
    };
    let result = Session::new(radio, MemoryStorage::new(), RecordingNotifier::new(), config);
    assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
}
