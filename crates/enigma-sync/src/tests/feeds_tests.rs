use super::{feed, raw, STRANGER_KEY};
use crate::feeds::{FeedPollState, FeedPollers, InMemoryFeedServer};
use crate::inbox::CollectingPipeline;
use crate::report::UnitOutcome;
use std::sync::Arc;
use std::time::Duration;

fn pollers() -> (FeedPollers, InMemoryFeedServer, CollectingPipeline) {
    let server = InMemoryFeedServer::new();
    let pipeline = CollectingPipeline::new();
    let pollers = FeedPollers::new(Arc::new(server.clone()), Arc::new(pipeline.clone()));
    (pollers, server, pipeline)
}

#[tokio::test]
async fn stopping_an_idle_feed_is_harmless() {
    let (pollers, _, _) = pollers();
    let lobby = feed("lobby");
    pollers.stop(&lobby).await;
    pollers.stop(&lobby).await;
    assert_eq!(pollers.state(&lobby).await, FeedPollState::Idle);
    let stats = pollers.stats().await;
    assert_eq!(stats.stop_requests, 2);
    assert_eq!(stats.cancelled_in_flight, 0);
}

#[tokio::test]
async fn completed_poll_delivers_and_returns_to_idle() {
    let (pollers, server, pipeline) = pollers();
    let lobby = feed("lobby");
    server.post(&lobby, raw(1, STRANGER_KEY)).await;
    server.post(&lobby, raw(2, STRANGER_KEY)).await;
    let handle = pollers.poll_for_new_messages(&lobby).await.expect("start");
    let outcome = handle.await.expect("join");
    assert_eq!(outcome, UnitOutcome::Completed { messages: 2 });
    assert_eq!(pipeline.len().await, 2);
    assert_eq!(pollers.state(&lobby).await, FeedPollState::Idle);
    assert_eq!(pollers.last_outcome(&lobby).await, Some(outcome));
}

#[tokio::test]
async fn failed_poll_is_reported_and_slot_released() {
    let (pollers, server, pipeline) = pollers();
    let lobby = feed("lobby");
    server.set_failing(&lobby, true).await;
    let outcome = pollers
        .poll_for_new_messages(&lobby)
        .await
        .expect("start")
        .await
        .expect("join");
    assert!(outcome.is_failure());
    assert!(pipeline.is_empty().await);
    assert_eq!(pollers.state(&lobby).await, FeedPollState::Idle);
}

#[tokio::test(start_paused = true)]
async fn second_start_without_stop_is_rejected() {
    let (pollers, server, _) = pollers();
    let lobby = feed("lobby");
    server.set_latency(&lobby, Duration::from_secs(5)).await;
    let first = pollers.poll_for_new_messages(&lobby).await.expect("start");
    assert_eq!(pollers.state(&lobby).await, FeedPollState::Polling);
    assert!(pollers.poll_for_new_messages(&lobby).await.is_err());
    assert_eq!(
        first.await.expect("join"),
        UnitOutcome::Completed { messages: 0 }
    );
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_in_flight_poll() {
    let (pollers, server, pipeline) = pollers();
    let lobby = feed("lobby");
    server.post(&lobby, raw(1, STRANGER_KEY)).await;
    server.set_latency(&lobby, Duration::from_secs(60)).await;
    let handle = pollers.poll_for_new_messages(&lobby).await.expect("start");
    tokio::task::yield_now().await;
    pollers.stop(&lobby).await;
    assert_eq!(pollers.state(&lobby).await, FeedPollState::Idle);
    assert_eq!(handle.await.expect("join"), UnitOutcome::Cancelled);
    assert!(pipeline.is_empty().await);
    assert_eq!(pollers.stats().await.cancelled_in_flight, 1);
    assert_eq!(pollers.last_outcome(&lobby).await, Some(UnitOutcome::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn stale_run_never_overwrites_its_replacement() {
    let (pollers, server, _) = pollers();
    let lobby = feed("lobby");
    server.set_latency(&lobby, Duration::from_millis(200)).await;
    let stale = pollers.poll_for_new_messages(&lobby).await.expect("first");
    pollers.stop(&lobby).await;
    let fresh = pollers.poll_for_new_messages(&lobby).await.expect("second");
    assert_eq!(stale.await.expect("join stale"), UnitOutcome::Cancelled);
    assert_eq!(pollers.state(&lobby).await, FeedPollState::Polling);
    assert_eq!(
        fresh.await.expect("join fresh"),
        UnitOutcome::Completed { messages: 0 }
    );
    assert_eq!(pollers.state(&lobby).await, FeedPollState::Idle);
    let stats = pollers.stats().await;
    assert_eq!(stats.started, 2);
    assert_eq!(stats.completed, 1);
}
