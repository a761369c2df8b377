//! Backend absence and churn scenarios.

mod common;

use std::time::Duration;

use futures_util::StreamExt;

#[tokio::test(flavor = "multi_thread")]
async fn no_backend_times_out_with_504() {
    let hub = common::start_hub(Duration::from_secs(1)).await;

    let client = common::http_client();
    let started = std::time::Instant::now();
    let res = client
        .post(hub.queue_url("echo"))
        .body("hi")
        .send()
        .await
        .expect("hub unreachable");
    let elapsed = started.elapsed();

    assert_eq!(res.status(), 504);
    assert_eq!(res.text().await.unwrap(), "Request timed out");
    assert!(
        elapsed >= Duration::from_millis(900),
        "timed out early: {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_secs(4),
        "timed out late: {elapsed:?}"
    );

    hub.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn crash_before_ack_redelivers_to_surviving_backend() {
    // deadline 6s gives a 2s ack timeout
    let hub = common::start_hub(Duration::from_secs(6)).await;

    // a peer that takes one request frame and drops the connection without
    // acking: a crash between receipt and ack
    let (socket, _) = tokio_tungstenite::connect_async(hub.ws_url("flaky"))
        .await
        .expect("dial failed");
    let crash = tokio::spawn(async move {
        let (_sink, mut stream) = socket.split();
        while let Some(Ok(msg)) = stream.next().await {
            if msg.is_binary() {
                break;
            }
        }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = common::http_client();
    let url = hub.queue_url("flaky");
    let started = std::time::Instant::now();
    let call = tokio::spawn(async move { client.post(url).body("500,X").send().await });

    // the healthy backend attaches only after the crashing peer has
    // swallowed the first delivery
    tokio::time::sleep(Duration::from_millis(300)).await;
    let _healthy = common::start_backend(hub.ws_url("flaky"), 5, common::echo_handler()).await;

    let res = call.await.unwrap().expect("request failed");
    let elapsed = started.elapsed();

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "500,X");
    assert!(
        elapsed >= Duration::from_secs(1),
        "redelivery should wait out the ack timeout: {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_millis(5500),
        "reply should beat the deadline: {elapsed:?}"
    );

    crash.await.unwrap();
    hub.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn backend_arriving_late_still_serves() {
    let hub = common::start_hub(Duration::from_secs(10)).await;

    let client = common::http_client();
    let url = hub.queue_url("echo");
    let started = std::time::Instant::now();
    let call = tokio::spawn(async move { client.post(url).body("late").send().await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    let _backend = common::start_backend(hub.ws_url("echo"), 2, common::test_handler()).await;

    let res = call.await.unwrap().expect("request failed");
    let elapsed = started.elapsed();

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "late");
    assert!(
        elapsed < Duration::from_secs(3),
        "parked request should be served as soon as a backend attaches: {elapsed:?}"
    );

    hub.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn backend_stop_signal_detaches_cleanly() {
    let hub = common::start_hub(Duration::from_secs(2)).await;
    let backend = common::start_backend(hub.ws_url("echo"), 2, common::test_handler()).await;

    let client = common::http_client();
    let res = client
        .post(hub.queue_url("echo"))
        .body("first")
        .send()
        .await
        .expect("request failed");
    assert_eq!(res.status(), 200);

    backend.trigger();
    // the read pump notices the stop flag within the pong window
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let res = client
        .post(hub.queue_url("echo"))
        .body("second")
        .send()
        .await
        .expect("request failed");
    assert_eq!(res.status(), 504, "no backend left to serve the queue");

    hub.stop();
}
