// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer arbitration on shared keys.

use std::thread;
use std::time::{Duration, Instant, SystemTime};

use keyflow::{ClearHistoryPolicy, ElementConfig, Key, PeerId, Sample, SampleEvent, Topic, WriterId};

#[test]
fn reader_only_accepts_top_priority_writer() {
    let topic = Topic::new("arbitration").expect("topic");
    let reader = topic.reader().key("k").build().expect("reader");
    let high = topic.writer().key("k").priority(10).build().expect("high");
    let low = topic.writer().key("k").priority(1).build().expect("low");
    let key = Key::from("k");

    for round in 0..20 {
        let value = format!("{}", round);
        if fastrand::bool() {
            low.update(&key, value.clone().into_bytes()).expect("low");
            high.update(&key, value.into_bytes()).expect("high");
        } else {
            high.update(&key, value.clone().into_bytes()).expect("high");
            low.update(&key, value.into_bytes()).expect("low");
        }
    }
    topic.flush();

    let accepted = reader.get_all_unread().expect("alive");
    assert_eq!(accepted.len(), 20);
    assert!(accepted.iter().all(|s| s.origin() == high.element().writer_id()));
}

#[test]
fn arbitration_is_per_key() {
    let topic = Topic::new("per-key").expect("topic");
    let reader = topic.reader().keys(["a", "b"]).build().expect("reader");
    let both = topic.writer().keys(["a", "b"]).priority(5).build().expect("both");
    let only_b = topic.writer().key("b").priority(9).build().expect("only b");

    both.update(&Key::from("a"), b"from-both".to_vec()).expect("a");
    both.update(&Key::from("b"), b"from-both".to_vec()).expect("b");
    only_b.update(&Key::from("b"), b"from-only-b".to_vec()).expect("b");
    topic.flush();

    let samples = reader.get_all_unread().expect("alive");
    let summary: Vec<_> = samples
        .iter()
        .map(|s| (s.key().to_string(), s.value_str().unwrap_or_default().to_owned()))
        .collect();
    assert_eq!(
        summary,
        [
            ("a".to_string(), "from-both".to_string()),
            ("b".to_string(), "from-only-b".to_string()),
        ]
    );
}

#[test]
fn destroying_top_writer_promotes_the_next() {
    let topic = Topic::new("failover").expect("topic");
    let reader = topic.reader().key("k").build().expect("reader");
    let primary = topic.writer().key("k").priority(10).build().expect("primary");
    let backup = topic.writer().key("k").priority(1).build().expect("backup");
    let key = Key::from("k");

    backup.update(&key, b"ignored".to_vec()).expect("backup");
    backup.flush();
    assert!(!reader.has_unread());

    primary.destroy();
    let deadline = Instant::now() + Duration::from_secs(1);
    while reader.element().listener_count() > 1 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    backup.update(&key, b"accepted".to_vec()).expect("backup");

    let sample = reader
        .get_next_unread_timeout(Duration::from_secs(1))
        .expect("backup sample");
    assert_eq!(sample.value_str(), Some("accepted"));
}

#[test]
fn equal_priorities_rank_by_writer_id() {
    let topic = Topic::new("ties").expect("topic");
    let reader = topic
        .reader()
        .key("k")
        .config(ElementConfig::default().clear_history(ClearHistoryPolicy::Never))
        .build()
        .expect("reader");
    let first = topic.writer().key("k").build().expect("first");
    let second = topic.writer().key("k").build().expect("second");
    let key = Key::from("k");

    second.update(&key, b"second".to_vec()).expect("second");
    first.update(&key, b"first".to_vec()).expect("first");
    topic.flush();

    let samples = reader.get_all_unread().expect("alive");
    assert_eq!(samples.len(), 1);
    assert!(first.element().writer_id() < second.element().writer_id());
    assert_eq!(samples[0].origin(), first.element().writer_id());
}

#[test]
fn unannounced_writers_are_accepted_until_one_attaches() {
    let topic = Topic::new("unranked").expect("topic");
    let reader = topic.reader().key("k").build().expect("reader");
    let stranger = WriterId {
        peer: PeerId(42),
        topic: 1,
        element: 1,
    };
    let sample = Sample::new(stranger, 1, Key::from("k"), SampleEvent::Add, b"x".to_vec(), SystemTime::now());
    assert!(reader.element().queue(sample, PeerId(42), SystemTime::now(), true));

    let _writer = topic.writer().key("k").build().expect("writer");
    let late = Sample::new(stranger, 2, Key::from("k"), SampleEvent::Update, b"y".to_vec(), SystemTime::now());
    assert!(!reader.element().queue(late, PeerId(42), SystemTime::now(), true));
}
