// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_does_not_go_backwards() {
    let clock = SystemClock;
    let t1 = clock.now();
    std::thread::sleep(Duration::from_millis(1));
    let t2 = clock.now();
    assert!(t2 >= t1);
}

#[test]
fn fake_clock_can_be_advanced() {
    let clock = FakeClock::new();
    let t1 = clock.now();
    clock.advance(Duration::from_secs(60));
    let t2 = clock.now();
    assert_eq!((t2 - t1).num_seconds(), 60);
}

#[test]
fn fake_clock_is_cloneable_and_shared() {
    let clock1 = FakeClock::new();
    let clock2 = clock1.clone();
    let t1 = clock1.now();
    clock2.advance(Duration::from_secs(30));
    let t2 = clock1.now();
    assert_eq!((t2 - t1).num_seconds(), 30);
}

#[test]
fn fake_clock_starts_on_whole_seconds() {
    let clock = FakeClock::new();
    assert_eq!(clock.now().timestamp_subsec_nanos(), 0);
}

#[test]
fn epoch_conversion_clamps_out_of_range() {
    assert_eq!(from_epoch(0).timestamp(), 0);
    assert_eq!(from_epoch(1_700_000_000).timestamp(), 1_700_000_000);
    assert_eq!(from_epoch(i64::MAX), DateTime::<Utc>::MAX_UTC);
    assert_eq!(from_epoch(10_000_000_000_000), DateTime::<Utc>::MAX_UTC);
    assert_eq!(from_epoch(i64::MIN).timestamp(), 0);
}

#[test]
fn saturated_times_survive_a_record_round_trip() {
    let far = DateTime::<Utc>::MAX_UTC.timestamp();
    assert_eq!(from_epoch(far).timestamp(), far);
}

#[test]
fn later_saturates_instead_of_overflowing() {
    let now = from_epoch(1_700_000_000);
    assert_eq!(later(now, TimeDelta::seconds(60)).timestamp(), 1_700_000_060);
    assert_eq!(later(now, TimeDelta::MAX), DateTime::<Utc>::MAX_UTC);
    assert_eq!(later(now, delta(Duration::from_secs(u64::MAX))), DateTime::<Utc>::MAX_UTC);
}

#[test]
fn fake_clock_advance_saturates() {
    let clock = FakeClock::new();
    clock.advance(Duration::from_secs(u64::MAX));
    assert_eq!(clock.now(), DateTime::<Utc>::MAX_UTC);
}
