// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! History retention observed through writers and readers.
//!
//! Each policy is checked on both sides: the writer's retained window
//! (`get_all`) and the reader's unread queue after live delivery must hold
//! the same samples for the same input. Delivery runs on the writer's
//! outbound lanes, so reads follow a `flush`.

use std::thread;
use std::time::Duration;

use keyflow::{ClearHistoryPolicy, DataReader, DataWriter, ElementConfig, Key, Sample, SampleEvent, Topic};

const KEY: &str = "unit/7";

fn pair(topic: &Topic, config: ElementConfig) -> (DataWriter, DataReader) {
    let writer = topic.writer().key(KEY).config(config.clone()).build().expect("writer");
    let reader = topic.reader().key(KEY).config(config).build().expect("reader");
    (writer, reader)
}

/// Add v1, Update v2, Remove, Add v3, Update v4.
fn publish_lifecycle(writer: &DataWriter) {
    let key = Key::from(KEY);
    writer.add(&key, b"v1".to_vec()).expect("add");
    writer.update(&key, b"v2".to_vec()).expect("update");
    writer.remove(&key).expect("remove");
    writer.add(&key, b"v3".to_vec()).expect("add");
    writer.update(&key, b"v4".to_vec()).expect("update");
}

fn events(samples: &[Sample]) -> Vec<SampleEvent> {
    samples.iter().map(Sample::event).collect()
}

fn retained(policy: ClearHistoryPolicy, closing_remove: bool) -> (Vec<Sample>, Vec<Sample>) {
    let topic = Topic::new("retention").expect("topic");
    let (writer, reader) = pair(&topic, ElementConfig::default().clear_history(policy));
    publish_lifecycle(&writer);
    if closing_remove {
        writer.remove(&Key::from(KEY)).expect("remove");
    }
    writer.flush();
    (
        writer.get_all().expect("writer alive"),
        reader.get_all_unread().expect("reader alive"),
    )
}

#[test]
fn never_retains_every_sample() {
    let (written, read) = retained(ClearHistoryPolicy::Never, true);
    assert_eq!(written.len(), 6);
    assert_eq!(events(&written), events(&read));
}

#[test]
fn on_add_retains_last_instance() {
    let (written, read) = retained(ClearHistoryPolicy::OnAdd, false);
    assert_eq!(events(&written), [SampleEvent::Add, SampleEvent::Update]);
    assert_eq!(events(&written), events(&read));
}

#[test]
fn on_remove_retains_from_last_remove_on() {
    let (written, read) = retained(ClearHistoryPolicy::OnRemove, false);
    assert_eq!(written.len(), 3);
    assert_eq!(written[0].event(), SampleEvent::Remove);
    assert_eq!(events(&written), events(&read));
}

#[test]
fn on_all_retains_latest() {
    let (written, read) = retained(ClearHistoryPolicy::OnAll, false);
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].value_str(), Some("v4"));
    assert_eq!(events(&written), events(&read));
}

#[test]
fn partial_updates_survive_on_all_except_partial_update() {
    let topic = Topic::new("partial-retention").expect("topic");
    topic.set_updater("concat", |prev, delta| [prev, delta].concat());
    let (writer, reader) = pair(
        &topic,
        ElementConfig::default().clear_history(ClearHistoryPolicy::OnAllExceptPartialUpdate),
    );

    let key = Key::from(KEY);
    writer.add(&key, b"v1".to_vec()).expect("add");
    writer.update(&key, b"v2".to_vec()).expect("update");
    writer.partial_update(&key, "concat", b"1".to_vec()).expect("partial");
    writer.remove(&key).expect("remove");
    writer.add(&key, b"v3".to_vec()).expect("add");
    writer.update(&key, b"v".to_vec()).expect("update");
    for delta in ["1", "2", "3"] {
        writer.partial_update(&key, "concat", delta.as_bytes().to_vec()).expect("partial");
    }

    let written = writer.get_all().expect("writer alive");
    assert_eq!(written.len(), 4);
    assert_eq!(written[1].value_str(), Some("v1"));

    writer.flush();
    let read = reader.get_all_unread().expect("reader alive");
    let values: Vec<_> = read.iter().filter_map(Sample::value_str).collect();
    assert_eq!(values, ["v", "v1", "v12", "v123"]);
}

#[test]
fn count_cap_keeps_newest() {
    let topic = Topic::new("cap").expect("topic");
    let (writer, reader) = pair(
        &topic,
        ElementConfig::default().clear_history(ClearHistoryPolicy::Never).sample_count(2),
    );
    let key = Key::from(KEY);
    writer.add(&key, b"a".to_vec()).expect("add");
    for value in ["b", "c", "d"] {
        writer.update(&key, value.as_bytes().to_vec()).expect("update");
    }

    let written: Vec<_> = writer
        .get_all()
        .expect("alive")
        .iter()
        .filter_map(|s| s.value_str().map(str::to_owned))
        .collect();
    assert_eq!(written, ["c", "d"]);
    writer.flush();
    assert_eq!(reader.get_all_unread().expect("alive").len(), 2);
}

#[test]
fn expired_samples_disappear_from_reads() {
    let topic = Topic::new("lifetime").expect("topic");
    let (writer, reader) = pair(
        &topic,
        ElementConfig::default()
            .clear_history(ClearHistoryPolicy::Never)
            .sample_lifetime(Duration::from_millis(50)),
    );
    let key = Key::from(KEY);
    writer.add(&key, b"old".to_vec()).expect("add");
    thread::sleep(Duration::from_millis(120));
    writer.update(&key, b"fresh".to_vec()).expect("update");
    writer.flush();

    let written = writer.get_all().expect("alive");
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].value_str(), Some("fresh"));

    let read = reader.get_all_unread().expect("alive");
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].value_str(), Some("fresh"));

    thread::sleep(Duration::from_millis(120));
    assert!(writer.get_last().expect("alive").is_none());
}

#[test]
fn late_reader_backfill_respects_writer_window() {
    let topic = Topic::new("backfill-window").expect("topic");
    let writer = topic
        .writer()
        .key(KEY)
        .config(ElementConfig::default().clear_history(ClearHistoryPolicy::OnAdd))
        .build()
        .expect("writer");
    publish_lifecycle(&writer);

    let reader = topic.reader().key(KEY).build().expect("reader");
    writer.flush();
    let backfill = reader.get_all_unread().expect("alive");
    assert_eq!(events(&backfill), [SampleEvent::Add, SampleEvent::Update]);
}
