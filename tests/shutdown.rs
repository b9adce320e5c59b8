//! Drain behavior once the termination signal fires.

use std::time::{Duration, Instant};

use quotes::{Method, Outcome, Request, Response, Router};
use tokio::net::TcpStream;

mod common;

async fn slow(_: Request) -> Response {
    tokio::time::sleep(Duration::from_millis(400)).await;
    Response::text("done")
}

async fn stuck(_: Request) -> Response {
    std::future::pending::<()>().await;
    Response::text("unreachable")
}

fn router() -> Router {
    Router::new()
        .on(Method::Get, "/slow", slow)
        .on(Method::Get, "/stuck", stuck)
        .on(Method::Get, "/fast", |_: Request| async { Response::text("fast") })
}

#[tokio::test]
async fn in_flight_request_finishes_and_new_connections_are_refused() {
    let mut server = common::spawn(router(), Duration::from_secs(5)).await;
    let addr = server.addr;
    let url = server.url("/slow");

    let in_flight = tokio::spawn(async move { common::client().get(url).send().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    server.signal();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(TcpStream::connect(addr).await.is_err(), "listener still accepting");

    let res = in_flight.await.unwrap().expect("in-flight request should complete");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "done");

    assert_eq!(server.shutdown().await, Outcome::Terminated);
}

#[tokio::test]
async fn stuck_handler_cannot_hold_the_process_past_the_deadline() {
    let grace = Duration::from_millis(300);
    let mut server = common::spawn(router(), grace).await;
    let url = server.url("/stuck");

    let in_flight = tokio::spawn(async move { common::client().get(url).send().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    server.signal();
    let outcome = server.shutdown().await;

    assert_eq!(outcome, Outcome::ForcedExit);
    assert!(!outcome.is_clean());
    assert!(started.elapsed() < grace + Duration::from_secs(1));

    // The abandoned client sees the connection drop, not an error response.
    assert!(in_flight.await.unwrap().is_err());
}

#[tokio::test]
async fn idle_keep_alive_connections_do_not_delay_shutdown() {
    let server = common::spawn(router(), Duration::from_secs(10)).await;
    let client = common::client();

    let res = client.get(server.url("/fast")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "fast");

    // `client` keeps its pooled connection open across the shutdown.
    let started = Instant::now();
    assert_eq!(server.shutdown().await, Outcome::Terminated);
    assert!(started.elapsed() < Duration::from_secs(2));
    drop(client);
}

#[tokio::test]
async fn shutdown_with_no_traffic_is_clean() {
    let server = common::spawn(router(), Duration::from_secs(1)).await;
    assert_eq!(server.shutdown().await, Outcome::Terminated);
}
