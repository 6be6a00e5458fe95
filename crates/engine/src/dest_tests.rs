// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fq_core::from_epoch;

fn id(s: &str) -> JobId {
    JobId::new(s)
}

#[test]
fn ready_is_priority_then_fifo() {
    let mut q = DestQueue::new();
    q.push_ready(id("a"), 127, 1);
    q.push_ready(id("b"), 100, 2);
    q.push_ready(id("c"), 127, 3);
    q.push_ready(id("d"), 100, 4);

    let order: Vec<_> = std::iter::once(q.head().unwrap().clone())
        .chain(q.ready_after_head().cloned())
        .collect();
    assert_eq!(order, vec![id("b"), id("d"), id("a"), id("c")]);
    assert_eq!(q.head_priority(), Some(100));
}

#[test]
fn sleeping_is_time_ordered() {
    let mut q = DestQueue::new();
    q.push_sleeping(id("late"), from_epoch(200));
    q.push_sleeping(id("early"), from_epoch(100));
    assert_eq!(q.sleeping_len(), 2);
    assert!(q.remove(&id("early")));
    assert!(!q.contains(&id("early")));
    assert!(q.contains(&id("late")));
}

#[test]
fn remove_finds_any_sub_queue() {
    let mut q = DestQueue::new();
    q.push_ready(id("r"), 1, 1);
    q.push_sleeping(id("s"), from_epoch(1));
    q.push_blocked(id("b"));
    assert!(q.remove(&id("b")));
    assert!(q.remove(&id("s")));
    assert!(q.remove(&id("r")));
    assert!(!q.remove(&id("r")));
    assert!(q.is_idle());
}

#[test]
fn active_calls_keep_a_destination_alive() {
    let mut q = DestQueue::new();
    q.active = 1;
    assert!(!q.is_idle());
}

#[test]
fn sleeping_jobs_count_against_concurrency() {
    let mut q = DestQueue::new();
    assert!(q.admits_call(1));
    q.push_sleeping(id("s"), from_epoch(1));
    assert!(!q.admits_call(1));
    assert!(q.admits_call(2));
    q.active = 1;
    assert!(!q.admits_call(2));
}

#[test]
fn take_blocked_empties_the_list() {
    let mut q = DestQueue::new();
    q.push_blocked(id("1"));
    q.push_blocked(id("2"));
    assert_eq!(q.take_blocked(), vec![id("1"), id("2")]);
    assert_eq!(q.blocked_len(), 0);
}

#[test]
fn run_queue_round_robins_equal_priorities() {
    let mut rq = RunQueue::new();
    rq.reposition("+1", Some(127));
    rq.reposition("+2", Some(127));
    rq.reposition("+3", Some(50));
    assert_eq!(rq.destinations(), vec!["+3", "+1", "+2"]);

    // +1 dispatched its head; next head has the same priority
    rq.reposition("+1", Some(127));
    assert_eq!(rq.destinations(), vec!["+3", "+2", "+1"]);

    rq.reposition("+3", None);
    assert!(!rq.contains("+3"));
    assert_eq!(rq.destinations(), vec!["+2", "+1"]);
}
