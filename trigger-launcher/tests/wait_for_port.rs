use std::time::Duration;
use trigger_launcher::service::{wait_for_port, LaunchError};

#[tokio::test]
async fn open_port_is_found_immediately() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();

    wait_for_port("127.0.0.1", port, Duration::from_secs(2), Duration::from_millis(50))
        .await
        .expect("port should be reachable");
}

#[tokio::test]
async fn port_opened_later_is_picked_up() {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = probe.local_addr().expect("addr").port();
    drop(probe);

    let opener = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.expect("rebind");
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(listener);
    });

    wait_for_port("127.0.0.1", port, Duration::from_secs(3), Duration::from_millis(50))
        .await
        .expect("port should open");
    opener.abort();
}

#[tokio::test]
async fn closed_port_times_out() {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = probe.local_addr().expect("addr").port();
    drop(probe);

    let err = wait_for_port("127.0.0.1", port, Duration::from_millis(200), Duration::from_millis(50))
        .await
        .expect_err("nothing listens");
    assert!(matches!(err, LaunchError::PortTimeout { port: p, .. } if p == port));
}
