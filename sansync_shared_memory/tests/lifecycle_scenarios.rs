//! End-to-end lifecycle tests: producer and consumer over a real segment

use sansync::config::SegmentConfig;
use sansync::shm::consts::{COMMAND_CAPACITY, COMMAND_OFFSET, STATE_CAPACITY};
use sansync_shared_memory::channel::terminated_len;
use sansync_shared_memory::{
    CommandChannel, Lifecycle, LifecyclePhase, SegmentClient, ShmError, ShmResult,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn test_config(tag: &str, drain_interval_ms: u64) -> SegmentConfig {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    SegmentConfig {
        name: format!("sansync_it_{}_{}_{}", tag, std::process::id(), id),
        drain_interval_ms,
        ..SegmentConfig::default()
    }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[test]
fn test_ping_lands_in_command_region() -> ShmResult<()> {
    // Long interval so the drain loop does not consume the command first
    let lifecycle = Lifecycle::new(test_config("ping", 1000));
    lifecycle.initialize()?;

    lifecycle.write_command(b"PING")?;
    let region = lifecycle.with_layout(|layout| layout.command()[..5].to_vec())?;
    assert_eq!(region, vec![0x50, 0x49, 0x4E, 0x47, 0x00]);

    let raw = lifecycle.with_layout(|layout| layout.as_bytes()[COMMAND_OFFSET])?;
    assert_eq!(raw, b'P');
    Ok(())
}

#[test]
fn test_oversize_command_leaves_region_untouched() -> ShmResult<()> {
    let lifecycle = Lifecycle::new(test_config("oversize", 1000));
    lifecycle.initialize()?;

    let before = lifecycle.with_layout(|layout| layout.command().to_vec())?;
    let result = lifecycle.write_command(&vec![b'x'; COMMAND_CAPACITY]);
    assert!(matches!(result, Err(ShmError::PayloadTooLarge { .. })));
    let after = lifecycle.with_layout(|layout| layout.command().to_vec())?;
    assert_eq!(before, after);
    Ok(())
}

#[test]
fn test_fresh_segment_has_no_state() -> ShmResult<()> {
    let lifecycle = Lifecycle::new(test_config("fresh", 50));
    lifecycle.initialize()?;

    let mut buffer = [0xAAu8; 100];
    assert_eq!(lifecycle.read_state(&mut buffer)?, 0);
    Ok(())
}

#[test]
fn test_double_initialize_creates_one_segment() -> ShmResult<()> {
    let lifecycle = Lifecycle::new(test_config("double", 50));
    lifecycle.initialize()?;
    lifecycle.initialize()?;
    assert_eq!(lifecycle.segment_creations(), 1);
    assert_eq!(lifecycle.phase(), LifecyclePhase::Ready);
    Ok(())
}

#[test]
fn test_cleanup_is_repeatable() -> ShmResult<()> {
    let config = test_config("cleanup", 10);
    let name = config.name.clone();
    let lifecycle = Lifecycle::new(config);

    lifecycle.cleanup();
    lifecycle.initialize()?;
    lifecycle.cleanup();
    lifecycle.cleanup();

    assert_eq!(lifecycle.phase(), LifecyclePhase::Uninitialized);
    assert!(matches!(lifecycle.write_command(b"late"), Err(ShmError::NotReady)));
    assert!(matches!(
        SegmentClient::open(&name),
        Err(ShmError::NotFound { .. })
    ));
    Ok(())
}

#[test]
fn test_drain_loop_delivers_to_observer() -> ShmResult<()> {
    let received = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let sink = Arc::clone(&received);
    let lifecycle = Lifecycle::with_observer(
        test_config("observer", 5),
        Arc::new(move |command: &[u8]| sink.lock().unwrap().push(command.to_vec())),
    );
    lifecycle.initialize()?;

    lifecycle.write_command(b"SPAWN vehicle adder")?;
    assert!(wait_until(Duration::from_secs(2), || {
        !received.lock().unwrap().is_empty()
    }));

    assert_eq!(received.lock().unwrap()[0], b"SPAWN vehicle adder");
    assert_eq!(lifecycle.drain_stats().drained(), 1);
    let pending = lifecycle.with_layout(|layout| CommandChannel::is_pending(layout))?;
    assert!(!pending);
    Ok(())
}

fn failing_observer(_command: &[u8]) {
    panic!("observer failure");
}

#[test]
fn test_panicking_observer_keeps_drain_loop_alive() -> ShmResult<()> {
    let lifecycle = Lifecycle::with_observer(
        test_config("observer_panic", 5),
        Arc::new(failing_observer),
    );
    lifecycle.initialize()?;

    lifecycle.write_command(b"ONE")?;
    assert!(wait_until(Duration::from_secs(2), || {
        lifecycle.drain_stats().drained() >= 1
    }));

    lifecycle.write_command(b"TWO")?;
    assert!(wait_until(Duration::from_secs(2), || {
        lifecycle.drain_stats().drained() >= 2
    }));

    assert!(lifecycle.is_ready());
    let pending = lifecycle.with_layout(|layout| CommandChannel::is_pending(layout))?;
    assert!(!pending);
    Ok(())
}

#[test]
fn test_undrained_command_is_replaced() -> ShmResult<()> {
    let received = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let sink = Arc::clone(&received);
    let lifecycle = Lifecycle::with_observer(
        test_config("lost_update", 1000),
        Arc::new(move |command: &[u8]| sink.lock().unwrap().push(command.to_vec())),
    );
    lifecycle.initialize()?;

    lifecycle.write_command(b"first")?;
    lifecycle.write_command(b"second")?;
    lifecycle.cleanup();

    // Either nothing was drained yet or only the last write survived
    let received = received.lock().unwrap();
    assert!(received.iter().all(|c| c.as_slice() != b"first"));
    Ok(())
}

#[test]
fn test_concurrent_writers_never_expose_unterminated_command() -> ShmResult<()> {
    let observed = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let sink = Arc::clone(&observed);
    let lifecycle = Arc::new(Lifecycle::with_observer(
        test_config("concurrent", 1),
        Arc::new(move |command: &[u8]| sink.lock().unwrap().push(command.to_vec())),
    ));
    lifecycle.initialize()?;

    let writers: Vec<_> = (0..4u8)
        .map(|id| {
            let lifecycle = Arc::clone(&lifecycle);
            std::thread::spawn(move || {
                for len in 1..200usize {
                    let command = vec![b'a' + id; len];
                    lifecycle.write_command(&command).unwrap();
                    lifecycle
                        .with_layout(|layout| {
                            let region = layout.command();
                            if region.iter().all(|&b| b == 0) {
                                return;
                            }
                            let len = terminated_len(region);
                            assert!(len > 0 && len < COMMAND_CAPACITY, "unterminated command");
                            assert!(
                                region[..len].iter().all(|&b| b == region[0]),
                                "command mixes bytes from several writers"
                            );
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    lifecycle.cleanup();

    // Every drained command is a run of one writer's byte
    for command in observed.lock().unwrap().iter() {
        assert!(!command.is_empty() && command.len() < COMMAND_CAPACITY);
        assert!(command.iter().all(|&b| b == command[0]));
    }
    Ok(())
}

#[test]
fn test_client_interop_with_producer() -> ShmResult<()> {
    let config = test_config("interop", 1000);
    let name = config.name.clone();
    let lifecycle = Lifecycle::new(config);
    lifecycle.initialize()?;

    let mut client = SegmentClient::open(&name)?;
    client.publish_state(b"{\"session\":\"open\",\"players\":3}")?;

    let mut buffer = vec![0u8; STATE_CAPACITY];
    let len = lifecycle.read_state(&mut buffer)?;
    assert_eq!(&buffer[..len], b"{\"session\":\"open\",\"players\":3}");
    assert_eq!(buffer[len], 0);

    let mut small = [0xAAu8; 8];
    assert!(matches!(
        lifecycle.read_state(&mut small),
        Err(ShmError::BufferTooSmall { .. })
    ));
    assert_eq!(small, [0xAA; 8]);

    lifecycle.write_command(b"READY")?;
    assert!(client.command_pending()?);

    let header = client.publish_header()?;
    assert!(header.matches_layout());
    assert_eq!(client.read_header()?, Some(header));
    Ok(())
}
