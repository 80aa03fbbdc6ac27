/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

mod support;

use ac_client::{ClientError, NotificationConfig, Notifier, SubscribeParams, TaskWaiter};
use integration_test_utils::{fake_notification_server, init_logging, RecordingListener};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use support::{data_frame, make_notifier, NOTIFY_URL};

#[tokio::test(start_paused = true)]
async fn reconnect_resumes_after_last_seen_version() {
    init_logging();
    let (connector, mut server) = fake_notification_server();
    let notifier = make_notifier(connector);
    let listener = RecordingListener::new();

    notifier.connect("s1").await.unwrap();
    notifier
        .subscribe_all("feed", Arc::new(listener.clone()))
        .await
        .unwrap();

    let mut conn = server.accept().await;
    assert_eq!(conn.expect_lines(2).await, vec!["AUTH s1", "SUB feed ALL"]);
    conn.push("SUBSCRIBED feed 2");
    for version in [3, 5, 7] {
        conn.push(&data_frame("feed", version, "tick"));
    }
    listener.wait_for(3).await;
    conn.disconnect();

    let mut conn = server.accept().await;
    assert_eq!(
        conn.expect_lines(2).await,
        vec!["AUTH s1", "SUB feed FROM 8"]
    );
    assert_eq!(notifier.last_version("feed").await, Some(7));

    conn.push(&data_frame("feed", 8, "tock"));
    listener.wait_for(4).await;
    assert_eq!(listener.versions().await, vec![3, 5, 7, 8]);
    assert!(listener.errors().await.is_empty());

    notifier.shutdown().await;
    assert_eq!(listener.errors().await, vec![ClientError::ShuttingDown]);
}

#[tokio::test(start_paused = true)]
async fn channel_without_versions_replays_original_params() {
    init_logging();
    let (connector, mut server) = fake_notification_server();
    let notifier = make_notifier(connector);

    notifier.connect("s1").await.unwrap();
    notifier
        .subscribe(
            "quiet",
            Some(Arc::new(RecordingListener::new())),
            Some(SubscribeParams::Last),
            Some("tok".to_string()),
            false,
        )
        .await
        .unwrap();

    let mut conn = server.accept().await;
    assert_eq!(
        conn.expect_lines(2).await,
        vec!["AUTH s1", "AUTHSUB tok quiet LAST"]
    );
    conn.disconnect();

    let mut conn = server.accept().await;
    assert_eq!(
        conn.expect_lines(2).await,
        vec!["AUTH s1", "AUTHSUB tok quiet LAST"]
    );

    notifier.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn version_zero_ack_replays_original_params() {
    init_logging();
    let (connector, mut server) = fake_notification_server();
    let notifier = make_notifier(connector);
    let waiter = TaskWaiter::new(notifier.clone());

    let handle = waiter.await_task("t1", Some("s1")).await.unwrap();
    let mut conn = server.accept().await;
    assert_eq!(
        conn.expect_lines(2).await,
        vec!["AUTH s1", "AUTHSUB s1 tasks/t1 LAST"]
    );

    conn.push("SUBSCRIBED tasks/t1 0");
    while notifier.last_version("tasks/t1").await != Some(0) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    conn.disconnect();

    let mut conn = server.accept().await;
    assert_eq!(
        conn.expect_lines(2).await,
        vec!["AUTH s1", "AUTHSUB s1 tasks/t1 LAST"]
    );

    conn.push(&data_frame(
        "tasks/t1",
        1,
        r#"{"status":"COMPLETED","result":"done"}"#,
    ));
    assert_eq!(handle.wait().await, Ok(json!("done")));

    notifier.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn writes_while_offline_flush_in_order_on_open() {
    init_logging();
    let (connector, mut server) = fake_notification_server();
    let notifier = make_notifier(connector);

    for channel in ["A", "B", "C"] {
        notifier
            .subscribe(channel, None, None, None, false)
            .await
            .unwrap();
    }
    assert_eq!(notifier.pending_len().await, 3);

    notifier.connect("s1").await.unwrap();
    let mut conn = server.accept().await;
    assert_eq!(
        conn.expect_lines(4).await,
        vec!["AUTH s1", "SUB A", "SUB B", "SUB C"]
    );

    notifier.subscribe("D", None, None, None, false).await.unwrap();
    assert_eq!(conn.next_line().await, "SUB D");
    assert_eq!(notifier.pending_len().await, 0);

    notifier.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn queued_subscribe_is_not_replayed_twice() {
    init_logging();
    let (connector, mut server) = fake_notification_server();
    let notifier = make_notifier(connector);

    notifier.connect("s1").await.unwrap();
    let mut conn = server.accept().await;
    assert_eq!(conn.expect_lines(1).await, vec!["AUTH s1"]);
    conn.disconnect();

    server.refuse_next(1);
    notifier
        .subscribe_last("late", Arc::new(RecordingListener::new()))
        .await
        .unwrap();

    let mut conn = server.accept().await;
    assert_eq!(
        conn.expect_lines(2).await,
        vec!["AUTH s1", "SUB late LAST"]
    );
    notifier.subscribe_all("other", Arc::new(RecordingListener::new())).await.unwrap();
    assert_eq!(conn.next_line().await, "SUB other ALL");

    notifier.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn refused_connections_are_retried() {
    init_logging();
    let (connector, mut server) = fake_notification_server();
    let notifier = make_notifier(connector);
    server.refuse_next(2);

    notifier.connect("s1").await.unwrap();
    let mut conn = server.accept().await;

    assert_eq!(conn.next_line().await, "AUTH s1");
    let attempts = server.attempts().await;
    assert_eq!(attempts.len(), 3);
    assert!(attempts
        .iter()
        .all(|url| url == "ws://notify.test/p/websocket"));

    notifier.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn listeners_on_one_channel_are_isolated() {
    init_logging();
    let (connector, mut server) = fake_notification_server();
    let notifier = make_notifier(connector);
    let first = RecordingListener::new();
    let second = RecordingListener::new();

    notifier.connect("s1").await.unwrap();
    let first_id = notifier
        .subscribe_all("c", Arc::new(first.clone()))
        .await
        .unwrap();
    notifier
        .subscribe_all("c", Arc::new(second.clone()))
        .await
        .unwrap();
    let mut conn = server.accept().await;
    assert_eq!(conn.expect_lines(2).await, vec!["AUTH s1", "SUB c ALL"]);

    notifier.unsubscribe("c", Some(&first_id)).await;
    conn.push(&data_frame("c", 1, r#"{"n":1}"#));
    second.wait_for(1).await;
    assert!(first.messages().await.is_empty());

    notifier.unsubscribe("c", None).await;
    notifier.unsubscribe("c", None).await;
    assert_eq!(conn.next_line().await, "UNSUB c");
    notifier.subscribe_last("marker", Arc::new(RecordingListener::new())).await.unwrap();
    assert_eq!(conn.next_line().await, "SUB marker LAST");
    assert!(conn.written().is_empty());

    notifier.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn connect_restarts_a_driver_that_gave_up() {
    init_logging();
    let (connector, mut server) = fake_notification_server();
    let mut config = NotificationConfig::new(NOTIFY_URL);
    config.reconnect.max_retries = Some(0);
    let notifier = Notifier::new(config, connector);
    server.refuse_next(1);

    notifier.connect("s1").await.unwrap();
    while server.attempts().await.is_empty() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.attempts().await.len(), 1);

    notifier.connect("s1").await.unwrap();
    let mut conn = server.accept().await;
    assert_eq!(conn.next_line().await, "AUTH s1");
    assert_eq!(server.attempts().await.len(), 2);

    notifier.shutdown().await;
}
