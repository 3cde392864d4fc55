//! Poller integration tests against the mock radio.

use cardlab_core::{CardContext, ClassicKind, Family, Source, constants::T2T_PAGE_SIZE};
use cardlab_dump::load;
use cardlab_hardware::{
    ActiveDevice, DeactivateMode, FsStorage, NfcaType, Storage,
    mock::{MemoryStorage, MockRadio, MockRadioHandle, MockTag, RecordingNotifier},
};
use cardlab_reader::{HandledCard, NfcaClass, Poller, PollerConfig};
use tempfile::TempDir;

const UID: [u8; 7] = [0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

fn fast_config() -> PollerConfig {
    PollerConfig {
        retry_delay_ms: 0,
        ..PollerConfig::default()
    }
}

/// Tag memory where no byte is zero.
fn patterned(pages: usize) -> Vec<u8> {
    (0..pages * T2T_PAGE_SIZE)
        .map(|i| (i % 255 + 1) as u8)
        .collect()
}

fn setup(tag: MockTag) -> (MockRadio, MockRadioHandle) {
    let (radio, handle) = MockRadio::new();
    handle.present_tag(tag);
    (radio, handle)
}

/// Tick until a card is handled, giving up after `max_ticks`.
fn tick_until_card(poller: &mut Poller<'_, MockRadio>, max_ticks: usize) -> Option<HandledCard> {
    (0..max_ticks).find_map(|_| poller.tick())
}

/// Initialize a poller and run it until the present tag is handled.
fn read_once(
    radio: &mut MockRadio,
    ctx: &mut CardContext,
    storage: &mut dyn Storage,
    config: PollerConfig,
) -> (Option<HandledCard>, RecordingNotifier) {
    let mut notifier = RecordingNotifier::new();
    let card = {
        let mut poller = Poller::new(radio, ctx, storage, &mut notifier, config);
        poller.initialize().unwrap();
        tick_until_card(&mut poller, 4)
    };
    (card, notifier)
}

#[test]
fn test_ntag_full_acquisition() {
    let memory = patterned(135);
    let (mut radio, handle) = setup(MockTag::ntag(UID.to_vec(), 135).with_memory(&memory));
    let mut ctx = CardContext::new(4096);
    let mut storage = MemoryStorage::new();

    let (card, notifier) = read_once(&mut radio, &mut ctx, &mut storage, fast_config());
    let card = card.expect("card handled");

    assert_eq!(card.family, Family::Ultralight);
    assert_eq!(card.class, Some(NfcaClass::Type2));
    assert!(card.archived.is_none());
    let report = card.acquisition.unwrap();
    assert_eq!(report.pages_total, 135);
    assert_eq!(report.pages_read, 135);
    assert_eq!(ctx.dump().as_bytes(), memory.as_slice());
    assert!(matches!(ctx.source(), Source::LiveCard { .. }));
    assert_eq!(notifier.updates().len(), 1);
    assert_eq!(handle.deactivations().last(), Some(&DeactivateMode::Sleep));
    assert!(storage.is_empty());
}

#[test]
fn test_third_block_exhausted_is_zero_filled() {
    let memory = patterned(45);
    // 45 pages = 12 READ blocks; block 3 starts at page 8.
    let tag = MockTag::ntag(UID.to_vec(), 45)
        .with_memory(&memory)
        .failing_read(8, 3);
    let (mut radio, handle) = setup(tag);
    let mut ctx = CardContext::new(4096);
    let mut storage = MemoryStorage::new();

    let (card, _) = read_once(&mut radio, &mut ctx, &mut storage, fast_config());
    let report = card.expect("card handled").acquisition.unwrap();

    assert_eq!(report.pages_total, 45);
    assert_eq!(report.pages_zero_filled, 4);
    assert_eq!(report.pages_read, 41);
    assert!(!report.aborted_on_link_loss);

    let dump = ctx.dump();
    assert_eq!(dump.valid_count(), 45);
    for page in 0..45 {
        let expected: &[u8] = if (8..12).contains(&page) {
            &[0; 4]
        } else {
            &memory[page * 4..page * 4 + 4]
        };
        assert_eq!(dump.unit(page), Some(expected), "page {page}");
    }

    let commands = handle.commands();
    let block_3_reads = commands.iter().filter(|c| c.as_slice() == [0x30, 8]).count();
    assert_eq!(block_3_reads, 3);
    assert_eq!(commands.last().map(Vec::as_slice), Some(&[0x30, 44][..]));
}

#[test]
fn test_link_loss_truncates_acquisition() {
    let memory = patterned(45);
    let tag = MockTag::ntag(UID.to_vec(), 45)
        .with_memory(&memory)
        .link_loss_at(20);
    let (mut radio, handle) = setup(tag);
    let mut ctx = CardContext::new(4096);
    let mut storage = MemoryStorage::new();

    let (card, notifier) = read_once(&mut radio, &mut ctx, &mut storage, fast_config());
    let report = card.expect("card handled").acquisition.unwrap();

    assert!(report.aborted_on_link_loss);
    assert_eq!(report.pages_read, 20);
    assert_eq!(ctx.dump().valid_count(), 20);
    assert_eq!(ctx.dump().unit(19), Some(&memory[76..80]));
    assert_eq!(ctx.dump().unit(20), None);
    assert!(ctx.dump().has_dump());
    assert_eq!(notifier.updates().len(), 1);
    // Nothing is read after the lost block.
    assert_eq!(handle.commands().last().map(Vec::as_slice), Some(&[0x30, 20][..]));
}

#[test]
fn test_classic_card_is_classified_without_acquisition() {
    let device = ActiveDevice::nfca(
        vec![0xDE, 0xAD, 0xBE, 0xEF],
        NfcaType::T2t,
        [0x44, 0x00],
        0x08,
    );
    let (mut radio, handle) = setup(MockTag::device(device));
    let mut ctx = CardContext::new(4096);
    let mut storage = MemoryStorage::new();

    let (card, notifier) = read_once(&mut radio, &mut ctx, &mut storage, fast_config());
    let card = card.expect("card handled");

    assert_eq!(card.family, Family::Classic(ClassicKind::OneK));
    assert_eq!(card.class, Some(NfcaClass::Classic(ClassicKind::OneK)));
    assert!(card.acquisition.is_none());
    assert_eq!(ctx.nfca().sak, Some(0x08));
    assert!(!ctx.dump().has_dump());
    assert_eq!(notifier.updates().len(), 1);
    assert!(handle.commands().is_empty());
}

#[test]
fn test_handled_card_is_not_reprocessed_until_represented() {
    let (mut radio, handle) = setup(MockTag::ntag(UID.to_vec(), 45));
    let mut ctx = CardContext::new(4096);
    let mut storage = MemoryStorage::new();
    let mut notifier = RecordingNotifier::new();

    let mut poller = Poller::new(
        &mut radio,
        &mut ctx,
        &mut storage,
        &mut notifier,
        fast_config(),
    );
    poller.initialize().unwrap();

    let first: Vec<_> = (0..10).filter_map(|_| poller.tick()).collect();
    assert_eq!(first.len(), 1);

    handle.present_tag(MockTag::ntag(UID.to_vec(), 45));
    let second: Vec<_> = (0..10).filter_map(|_| poller.tick()).collect();
    assert_eq!(second.len(), 1);
    assert_eq!(poller.cards_handled(), 2);
}

#[test]
fn test_unknown_size_code_falls_back_to_last_page_count() {
    let (mut radio, handle) = setup(MockTag::ntag(UID.to_vec(), 135));
    let mut ctx = CardContext::new(4096);
    let mut storage = MemoryStorage::new();
    let mut notifier = RecordingNotifier::new();

    let mut poller = Poller::new(
        &mut radio,
        &mut ctx,
        &mut storage,
        &mut notifier,
        fast_config(),
    );
    poller.initialize().unwrap();
    let first = tick_until_card(&mut poller, 4).expect("first card");
    assert_eq!(first.acquisition.unwrap().pages_total, 135);

    // 60 pages has no size code in the version table.
    handle.present_tag(MockTag::ntag(vec![0x04, 9, 9, 9, 9, 9, 9], 60));
    let second = tick_until_card(&mut poller, 4).expect("second card");
    let report = second.acquisition.unwrap();
    assert_eq!(report.pages_total, 135);
    assert_eq!(report.pages_read, 60);
    assert_eq!(report.pages_zero_filled, 75);
}

#[test]
fn test_halt_returns_to_not_initialized() {
    let (mut radio, handle) = setup(MockTag::ntag(UID.to_vec(), 45));
    let mut ctx = CardContext::new(4096);
    let mut storage = MemoryStorage::new();
    let mut notifier = RecordingNotifier::new();

    let mut poller = Poller::new(
        &mut radio,
        &mut ctx,
        &mut storage,
        &mut notifier,
        fast_config(),
    );
    poller.initialize().unwrap();
    poller.tick();
    poller.halt();

    assert_eq!(poller.tick(), None);
    assert_eq!(handle.deactivations().last(), Some(&DeactivateMode::Idle));
    assert_eq!(handle.discover_calls(), 1);
}

#[test]
fn test_archive_to_directory() {
    let dir = TempDir::new().unwrap();
    let (mut radio, _handle) =
        setup(MockTag::ntag(UID.to_vec(), 45).with_memory(&patterned(45)));
    let mut ctx = CardContext::new(4096);
    let mut storage = FsStorage::new();
    let config = PollerConfig {
        archive_dir: Some(dir.path().join("cards")),
        ..fast_config()
    };

    let (card, _) = read_once(&mut radio, &mut ctx, &mut storage, config);
    let path = card.expect("card handled").archived.expect("archived");
    assert_eq!(path, dir.path().join("cards").join("04112233445566.nfc"));

    let mut restored = CardContext::new(4096);
    load(&mut storage, &path, &mut restored).unwrap();
    assert_eq!(restored.uid(), ctx.uid());
    assert_eq!(restored.family(), Family::Ultralight);
    assert_eq!(restored.dump().as_bytes(), ctx.dump().as_bytes());
}

#[test]
fn test_archive_failure_is_not_fatal() {
    let (mut radio, _handle) = setup(MockTag::ntag(UID.to_vec(), 45));
    let mut ctx = CardContext::new(4096);
    let mut storage = MemoryStorage::new();
    storage.fail_writes("/cards/04112233445566.nfc");
    let config = PollerConfig {
        archive_dir: Some("/cards".into()),
        ..fast_config()
    };

    let (card, _) = read_once(&mut radio, &mut ctx, &mut storage, config);
    let card = card.expect("card handled");
    assert!(card.archived.is_none());
    assert_eq!(ctx.dump().valid_count(), 45);
}
