// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blocking waits: predicate wake-ups, timeouts and wake on destroy.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use keyflow::session::AttachRequest;
use keyflow::{Binding, DataReader, DataWriter, Error, ForwarderRegistry, Key, LocalSession, PeerId, Session, Topic};

const LONG: Duration = Duration::from_secs(5);

/// Poll `done` until it holds or a second has passed.
fn settle(done: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

/// A topic on its own node connected to `hub`'s node: the topic, the
/// session towards the hub, and the hub's session back.
fn remote_node(
    hub: &Topic,
    hub_registry: &Arc<ForwarderRegistry>,
    peer: PeerId,
) -> (Topic, Arc<LocalSession>, Arc<LocalSession>) {
    let registry = Arc::new(ForwarderRegistry::new());
    let topic = Topic::builder(hub.name())
        .node(peer)
        .forwarders(Arc::clone(&registry))
        .build()
        .expect("remote topic");
    let (hub_to_peer, peer_to_hub) = LocalSession::connect(hub.node(), Arc::clone(hub_registry), peer, registry);
    (topic, peer_to_hub, hub_to_peer)
}

fn attach_remote(writer: &DataWriter, reader: &DataReader, to_writer: &Arc<LocalSession>, key: &str) {
    let request = AttachRequest {
        from: reader.element().remote(),
        subscriber_id: reader.element().id(),
        binding: Binding::Key(Key::from(key)),
        sample_filter: None,
        priority: 0,
    };
    to_writer
        .invoke(&writer.element().facet(), keyflow::Envelope::AttachKey(request))
        .expect("attach over session");
}

#[test]
fn readers_on_one_node_count_as_one_peer() {
    let topic = Topic::new("wait-same-node").expect("topic");
    let writer = topic.writer().key("k").build().expect("writer");
    let _first = topic.reader().key("k").build().expect("first");
    let _second = topic.reader().key("k").build().expect("second");

    assert_eq!(writer.reader_peer_count(), 1);
    assert!(writer.wait_for_readers(1, Some(LONG)).is_ok());
    assert!(matches!(
        writer.wait_for_readers(2, Some(Duration::from_millis(30))),
        Err(Error::Timeout)
    ));
}

#[test]
fn wait_for_readers_unblocks_when_a_second_peer_attaches() {
    let registry = Arc::new(ForwarderRegistry::new());
    let hub = Topic::builder("wait-peers")
        .node(PeerId(1))
        .forwarders(Arc::clone(&registry))
        .build()
        .expect("hub topic");
    let writer = hub.writer().key("k").build().expect("writer");
    let (topic_b, b_to_hub, _hub_to_b) = remote_node(&hub, &registry, PeerId(2));
    let (topic_c, c_to_hub, _hub_to_c) = remote_node(&hub, &registry, PeerId(3));
    let reader_b = topic_b.reader().key("k").build().expect("reader on B");
    let reader_c = topic_c.reader().key("k").build().expect("reader on C");

    thread::scope(|scope| {
        let waiter = scope.spawn(|| writer.wait_for_readers(2, Some(LONG)));

        attach_remote(&writer, &reader_b, &b_to_hub, "k");
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        attach_remote(&writer, &reader_c, &c_to_hub, "k");
        assert!(waiter.join().expect("waiter thread").is_ok());
    });
    assert_eq!(writer.reader_peer_count(), 2);
}

#[test]
fn wait_for_writers_times_out() {
    let topic = Topic::new("wait-timeout").expect("topic");
    let reader = topic.reader().key("k").build().expect("reader");
    assert!(matches!(
        reader.wait_for_writers(1, Some(Duration::from_millis(30))),
        Err(Error::Timeout)
    ));
}

#[test]
fn wait_for_listeners_wakes_on_destroy() {
    let topic = Topic::new("wait-destroy").expect("topic");
    let writer = topic.writer().key("k").build().expect("writer");
    let element = Arc::clone(writer.element());

    let waiter = thread::spawn(move || element.wait_for_listeners(3, None));
    thread::sleep(Duration::from_millis(20));
    writer.destroy();

    assert!(matches!(waiter.join().expect("waiter thread"), Err(Error::ElementDestroyed)));
}

#[test]
fn get_next_unread_wakes_on_sample_and_on_destroy() {
    let topic = Topic::new("next-unread").expect("topic");
    let writer = topic.writer().key("k").build().expect("writer");
    let reader = topic.reader().key("k").build().expect("reader");

    thread::scope(|scope| {
        let next = scope.spawn(|| reader.get_next_unread());
        thread::sleep(Duration::from_millis(20));
        writer.add(&Key::from("k"), b"hello".to_vec()).expect("add");
        let sample = next.join().expect("reader thread").expect("sample");
        assert_eq!(sample.value_str(), Some("hello"));

        let blocked = scope.spawn(|| reader.get_next_unread());
        thread::sleep(Duration::from_millis(20));
        reader.destroy();
        assert!(matches!(blocked.join().expect("reader thread"), Err(Error::ElementDestroyed)));
    });
}

#[test]
fn wait_for_unread_counts_retained_samples() {
    let topic = Topic::new("wait-unread").expect("topic");
    let writer = topic.writer().key("k").build().expect("writer");
    let reader = topic.reader().key("k").build().expect("reader");
    let key = Key::from("k");

    thread::scope(|scope| {
        let waiter = scope.spawn(|| reader.wait_for_unread(3, Some(LONG)));
        writer.add(&key, b"1".to_vec()).expect("add");
        writer.update(&key, b"2".to_vec()).expect("update");
        writer.update(&key, b"3".to_vec()).expect("update");
        assert!(waiter.join().expect("waiter thread").is_ok());
    });
    assert_eq!(reader.get_all_unread().expect("alive").len(), 3);
}

#[test]
fn destroyed_reader_fails_reads_without_blocking() {
    let topic = Topic::new("destroyed-read").expect("topic");
    let reader = topic.reader().key("k").build().expect("reader");
    reader.destroy();
    reader.destroy();

    assert!(matches!(reader.get_next_unread(), Err(Error::ElementDestroyed)));
    assert!(matches!(reader.get_all_unread(), Err(Error::ElementDestroyed)));
}

#[test]
fn detach_wakes_listener_waiters() {
    let topic = Topic::new("detach-wake").expect("topic");
    let writer = topic.writer().key("k").build().expect("writer");
    let reader = topic.reader().key("k").build().expect("reader");
    assert!(writer.has_readers());

    drop(reader);
    assert!(settle(|| !writer.has_readers()));
    assert!(matches!(
        writer.wait_for_readers(1, Some(Duration::from_millis(20))),
        Err(Error::Timeout)
    ));
}
