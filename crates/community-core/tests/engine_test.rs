#![allow(clippy::unwrap_used)]
// Engine behaviour under paused tokio time.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use community_core::{
    ApplyOutcome, CoreError, Draft, EntityId, FailureCallback, FetchError, FetchErrorKind,
    Fetcher, Flag, Health, Mutation, Page, Payload, Poller, ResourceCache, ResourceKind, ReviewDraft,
    Session, SubscriptionKey, SyncEngine, SyncNotice, ViewState,
};

use common::{
    PERIOD, Reply, ScriptedSource, config, default_payload, employee_ids, employees, key, ms,
    reviews, service,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn engine(
    source: &Arc<ScriptedSource>,
    poll_interval: Duration,
) -> SyncEngine<Arc<ScriptedSource>> {
    SyncEngine::new(config(poll_interval), Session::anonymous(), Arc::clone(source))
}

fn drain(notices: &mut broadcast::Receiver<SyncNotice>) -> Vec<SyncNotice> {
    let mut out = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        out.push(notice);
    }
    out
}

fn fetch_failures(notices: &[SyncNotice]) -> Vec<FetchError> {
    notices
        .iter()
        .filter_map(|notice| match notice {
            SyncNotice::FetchFailed { error, .. } => Some(error.clone()),
            _ => None,
        })
        .collect()
}

fn following(engine: &SyncEngine<Arc<ScriptedSource>>, k: SubscriptionKey) -> Option<bool> {
    engine
        .read(k)?
        .view
        .as_deref()
        .and_then(Payload::as_service)
        .map(|s| s.is_following)
}

fn counting_callback(counter: &Arc<AtomicUsize>) -> FailureCallback {
    let counter = Arc::clone(counter);
    Arc::new(move |_, _: &FetchError| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

// ── Polling ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn alternating_server_errors_keep_last_success() {
    let source = Arc::new(ScriptedSource::new(|_, call| {
        if call % 2 == 0 {
            Reply::ok(reviews(call + 1))
        } else {
            Reply::err(FetchError::server(500, "internal error"))
        }
    }));
    let engine = engine(&source, PERIOD);
    let mut notices = engine.notices();
    let k = key(ResourceKind::Reviews, 12);

    let mut view = engine.view_of(&[ResourceKind::Reviews]);
    view.view(EntityId::new(12)).unwrap();

    // Fetches at 0, 5000, 10000 and 15000 ms.
    sleep(ms(15_100)).await;
    assert_eq!(source.calls(k), 4);

    let entry = engine.read(k).unwrap();
    assert_eq!(entry.view.as_deref().map(Payload::len), Some(3));
    assert!(entry.is_stale());
    assert_eq!(entry.health.consecutive_failures, 1);

    let failures = fetch_failures(&drain(&mut notices));
    assert_eq!(failures.len(), 2);
    assert!(
        failures
            .iter()
            .all(|e| e.kind == FetchErrorKind::ServerError && e.status == Some(500))
    );
}

#[tokio::test(start_paused = true)]
async fn ticks_are_skipped_while_a_fetch_is_in_flight() {
    let source = Arc::new(ScriptedSource::new(|key, _| {
        Reply::ok(default_payload(key)).after(ms(7000))
    }));
    let cache = Arc::new(ResourceCache::new());
    let k = key(ResourceKind::Employees, 3);
    cache.acquire(k);
    let poller = Poller::new(
        Fetcher::new(Arc::clone(&source)),
        Arc::clone(&cache),
        Arc::new(Session::anonymous()),
        CancellationToken::new(),
    );
    let _handle = poller.start(k, PERIOD, counting_callback(&Arc::new(AtomicUsize::new(0))));

    // Issued at 0 and 10000; the 5000 and 15000 ticks find a fetch in flight.
    sleep(ms(19_000)).await;
    assert_eq!(source.calls(k), 2);
    assert_eq!(cache.read(k).unwrap().last_sequence, 2);
}

#[tokio::test(start_paused = true)]
async fn zero_interval_fetches_once() {
    let source = Arc::new(ScriptedSource::new(|key, _| Reply::ok(default_payload(key))));
    let engine = engine(&source, Duration::ZERO);
    let mut view = engine.page(Page::ServiceDetail);
    view.view(EntityId::new(9)).unwrap();

    sleep(ms(60_000)).await;
    let k = key(ResourceKind::Service, 9);
    assert_eq!(source.calls(k), 1);
    assert!(engine.read(k).unwrap().is_loaded());
}

// ── Stopping ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn stop_discards_in_flight_response() {
    let source = Arc::new(ScriptedSource::new(|key, _| {
        Reply::ok(default_payload(key)).after(ms(1000))
    }));
    let cache = Arc::new(ResourceCache::new());
    let k = key(ResourceKind::Employees, 3);
    cache.acquire(k);
    let poller = Poller::new(
        Fetcher::new(Arc::clone(&source)),
        Arc::clone(&cache),
        Arc::new(Session::anonymous()),
        CancellationToken::new(),
    );
    let failures = Arc::new(AtomicUsize::new(0));
    let handle = poller.start(k, PERIOD, counting_callback(&failures));

    sleep(ms(100)).await;
    assert_eq!(source.calls(k), 1);
    assert!(handle.is_active());

    handle.stop();
    handle.stop();
    assert!(!handle.is_active());

    sleep(ms(20_000)).await;
    assert_eq!(source.calls(k), 1);
    let entry = cache.read(k).unwrap();
    assert!(!entry.is_loaded());
    assert_eq!(entry.last_sequence, 0);
    assert_eq!(entry.health, Health::default());
}

#[tokio::test(start_paused = true)]
async fn dropped_handle_reports_no_late_failure() {
    let source = Arc::new(ScriptedSource::new(|_, _| {
        Reply::err(FetchError::network("connection reset")).after(ms(1000))
    }));
    let cache = Arc::new(ResourceCache::new());
    let k = key(ResourceKind::Reviews, 3);
    cache.acquire(k);
    let poller = Poller::new(
        Fetcher::new(Arc::clone(&source)),
        Arc::clone(&cache),
        Arc::new(Session::anonymous()),
        CancellationToken::new(),
    );
    let failures = Arc::new(AtomicUsize::new(0));
    let handle = poller.start(k, PERIOD, counting_callback(&failures));

    sleep(ms(500)).await;
    drop(handle);
    sleep(ms(10_000)).await;

    assert_eq!(failures.load(Ordering::SeqCst), 0);
    assert!(!cache.read(k).unwrap().is_stale());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_blocks_late_applies_across_worker_threads() {
    for round in 0..100_u64 {
        let delay = Duration::from_micros(round % 7 * 150);
        let source = Arc::new(ScriptedSource::new(move |key, _| {
            Reply::ok(default_payload(key)).after(delay)
        }));
        let cache = Arc::new(ResourceCache::new());
        let k = key(ResourceKind::Employees, round);
        cache.acquire(k);
        let poller = Poller::new(
            Fetcher::new(Arc::clone(&source)),
            Arc::clone(&cache),
            Arc::new(Session::anonymous()),
            CancellationToken::new(),
        );
        let failures = Arc::new(AtomicUsize::new(0));
        let handle = poller.start(k, ms(1), counting_callback(&failures));

        sleep(Duration::from_micros(round % 5 * 200)).await;
        handle.stop();
        let frozen = cache.read(k).unwrap();

        sleep(ms(5)).await;
        let after = cache.read(k).unwrap();
        assert_eq!(after.last_sequence, frozen.last_sequence, "round {round}");
        assert_eq!(after.health, frozen.health, "round {round}");
    }
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn switching_entities_leaves_one_poller_per_kind() {
    let source = Arc::new(ScriptedSource::new(|key, _| {
        if key.entity.get() == 2 && key.kind == ResourceKind::Proposals {
            Reply::err(FetchError::server(503, "unavailable"))
        } else {
            Reply::ok(default_payload(key))
        }
    }));
    let engine = engine(&source, PERIOD);
    let mut notices = engine.notices();

    let mut page = engine.page(Page::Proposals);
    page.view(EntityId::new(1)).unwrap();
    sleep(ms(100)).await;
    assert!(engine.read(key(ResourceKind::Proposals, 1)).unwrap().is_loaded());

    page.view(EntityId::new(2)).unwrap();
    assert_eq!(page.state(), ViewState::Active(EntityId::new(2)));
    assert_eq!(
        engine.active_pollers(),
        vec![key(ResourceKind::Service, 2), key(ResourceKind::Proposals, 2)]
    );
    assert!(engine.read(key(ResourceKind::Service, 1)).is_none());
    assert!(engine.read(key(ResourceKind::Proposals, 1)).is_none());

    // The new pollers tick at 100, 5100 and 10100 ms.
    sleep(ms(10_100)).await;
    assert_eq!(source.calls(key(ResourceKind::Proposals, 1)), 1);
    assert_eq!(source.calls(key(ResourceKind::Proposals, 2)), 3);

    let failures: Vec<_> = drain(&mut notices)
        .into_iter()
        .filter(|n| matches!(n, SyncNotice::FetchFailed { .. }))
        .collect();
    assert_eq!(failures.len(), 3);
    assert!(failures.iter().all(|n| matches!(
        n,
        SyncNotice::FetchFailed { key: k, .. } if *k == key(ResourceKind::Proposals, 2)
    )));

    // Same entity again is a no-op.
    page.view(EntityId::new(2)).unwrap();
    sleep(ms(100)).await;
    assert_eq!(source.calls(key(ResourceKind::Proposals, 2)), 3);
}

#[tokio::test(start_paused = true)]
async fn views_of_one_key_share_a_poller() {
    let source = Arc::new(ScriptedSource::new(|key, _| Reply::ok(default_payload(key))));
    let engine = engine(&source, PERIOD);
    let k = key(ResourceKind::Employees, 5);

    let mut first = engine.page(Page::Employees);
    let mut second = engine.page(Page::Employees);
    first.view(EntityId::new(5)).unwrap();
    second.view(EntityId::new(5)).unwrap();
    sleep(ms(100)).await;

    assert_eq!(engine.active_pollers(), vec![k]);
    assert_eq!(source.calls(k), 1);
    assert_eq!(engine.cache().subscribers(k), 2);

    drop(first);
    assert_eq!(engine.active_pollers(), vec![k]);
    assert!(second.entry(ResourceKind::Employees).is_some());

    second.leave();
    assert_eq!(second.state(), ViewState::Idle);
    assert!(engine.active_pollers().is_empty());
    assert!(engine.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_everything() {
    let source = Arc::new(ScriptedSource::new(|key, _| Reply::ok(default_payload(key))));
    let engine = engine(&source, PERIOD);
    let mut page = engine.page(Page::Reviews);
    page.view(EntityId::new(1)).unwrap();
    sleep(ms(100)).await;

    engine.shutdown();
    assert!(engine.is_shut_down());
    assert!(engine.active_pollers().is_empty());
    assert!(engine.cache().is_empty());

    sleep(ms(20_000)).await;
    assert_eq!(source.calls(key(ResourceKind::Reviews, 1)), 1);

    let mut again = engine.page(Page::Reviews);
    assert!(matches!(again.view(EntityId::new(2)), Err(CoreError::ShutDown)));
    assert!(matches!(
        engine.propose(key(ResourceKind::Employees, 1), Mutation::Delete { id: 1 }),
        Err(CoreError::ShutDown)
    ));
    // Leaving after shutdown is harmless.
    page.leave();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_racing_new_views_leaves_nothing_registered() {
    for round in 0..50 {
        let source = Arc::new(ScriptedSource::new(|key, _| Reply::ok(default_payload(key))));
        let engine = engine(&source, PERIOD);

        let opener = {
            let engine = engine.clone();
            tokio::task::spawn_blocking(move || {
                (0..64)
                    .filter_map(|id| {
                        let mut view = engine.view_of(&[ResourceKind::Employees]);
                        view.view(EntityId::new(id)).ok().map(|()| view)
                    })
                    .collect::<Vec<_>>()
            })
        };
        engine.shutdown();
        let views = opener.await.unwrap();

        assert!(
            engine.cache().is_empty(),
            "round {round}: {} entries left",
            engine.cache().len()
        );
        assert!(engine.active_pollers().is_empty(), "round {round}");
        drop(views);
    }
}

// ── Sequencing ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn slow_older_response_never_overwrites_newer() {
    let source = Arc::new(ScriptedSource::new(|_, call| match call {
        0 => Reply::ok(reviews(1)),
        1 => Reply::ok(reviews(2)).after(ms(300)),
        _ => Reply::ok(reviews(3)).after(ms(10)),
    }));
    let engine = engine(&source, Duration::ZERO);
    let k = key(ResourceKind::Reviews, 4);
    let mut view = engine.view_of(&[ResourceKind::Reviews]);
    view.view(EntityId::new(4)).unwrap();
    sleep(ms(100)).await;

    let (slow, fast) = tokio::join!(engine.refresh_now(k), engine.refresh_now(k));
    assert_eq!(fast.unwrap(), ApplyOutcome::Accepted { confirmed: vec![] });
    assert_eq!(slow.unwrap(), ApplyOutcome::Stale);

    let entry = engine.read(k).unwrap();
    assert_eq!(entry.last_sequence, 3);
    assert_eq!(entry.view.as_deref().map(Payload::len), Some(3));
}

#[tokio::test(start_paused = true)]
async fn refresh_from_before_a_rejoin_is_discarded() {
    let source = Arc::new(ScriptedSource::new(|_, call| match call {
        0 => Reply::ok(reviews(1)),
        1 => Reply::ok(reviews(5)).after(ms(1000)),
        _ => Reply::ok(reviews(2)).after(ms(5000)),
    }));
    let engine = engine(&source, PERIOD);
    let k = key(ResourceKind::Reviews, 4);
    let mut view = engine.view_of(&[ResourceKind::Reviews]);
    view.view(EntityId::new(4)).unwrap();
    sleep(ms(100)).await;

    let (outcome, ()) = tokio::join!(engine.refresh_now(k), async {
        sleep(ms(10)).await;
        view.leave();
        view.view(EntityId::new(4)).unwrap();
    });
    assert_eq!(outcome.unwrap(), ApplyOutcome::Unknown);

    let entry = engine.read(k).unwrap();
    assert!(!entry.is_loaded());
    assert_eq!(entry.last_sequence, 0);

    // The new poller's own fetch lands at 5110 ms.
    sleep(ms(5000)).await;
    let entry = engine.read(k).unwrap();
    assert_eq!(entry.view.as_deref().map(Payload::len), Some(2));
}

#[tokio::test(start_paused = true)]
async fn refresh_now_requires_subscription() {
    let source = Arc::new(ScriptedSource::new(|key, _| Reply::ok(default_payload(key))));
    let engine = engine(&source, PERIOD);
    let result = engine.refresh_now(key(ResourceKind::Service, 1)).await;
    assert!(matches!(result, Err(CoreError::NotSubscribed { .. })));
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn delete_overrides_until_snapshot_confirms() {
    let source = Arc::new(ScriptedSource::new(|_, call| match call {
        0 | 1 => Reply::ok(employees(&[3, 7])),
        _ => Reply::ok(employees(&[3])),
    }));
    let engine = engine(&source, PERIOD);
    let mut notices = engine.notices();
    let k = key(ResourceKind::Employees, 12);
    let mut page = engine.page(Page::Employees);
    page.view(EntityId::new(12)).unwrap();
    sleep(ms(100)).await;

    let view_ids = || employee_ids(engine.read(k).unwrap().view.as_deref());
    assert_eq!(view_ids(), vec![3, 7]);

    let ticket = engine.propose(k, Mutation::Delete { id: 7 }).unwrap();
    assert_eq!(view_ids(), vec![3]);
    let id = ticket.outcome().await.unwrap();

    let entry = engine.read(k).unwrap();
    assert_eq!(entry.pending.len(), 1);
    assert!(entry.pending[0].acknowledged);

    // Server still lists 7 at 5000 ms: the override holds.
    sleep(ms(5000)).await;
    assert_eq!(view_ids(), vec![3]);
    assert_eq!(employee_ids(Some(&engine.read(k).unwrap().snapshot.unwrap().payload)), vec![3, 7]);

    // At 10000 ms the snapshot agrees and takes over.
    sleep(ms(5000)).await;
    let entry = engine.read(k).unwrap();
    assert!(entry.pending.is_empty());
    assert_eq!(view_ids(), vec![3]);

    let notices = drain(&mut notices);
    assert!(notices.contains(&SyncNotice::MutationConfirmed { key: k, id }));
    assert_eq!(source.mutations(), vec![(k, Mutation::Delete { id: 7 })]);
}

#[tokio::test(start_paused = true)]
async fn rejected_delete_restores_item() {
    let source = Arc::new(
        ScriptedSource::new(|_, _| Reply::ok(employees(&[3, 7]))).with_mutate(ms(50), |_, _| {
            Err(CoreError::Api {
                message: "Employee is not linked".into(),
                status: None,
            })
        }),
    );
    let engine = engine(&source, PERIOD);
    let mut notices = engine.notices();
    let k = key(ResourceKind::Employees, 12);
    let mut page = engine.page(Page::Employees);
    page.view(EntityId::new(12)).unwrap();
    sleep(ms(100)).await;

    let ticket = engine.propose(k, Mutation::Delete { id: 7 }).unwrap();
    let id = ticket.id();
    assert_eq!(employee_ids(engine.read(k).unwrap().view.as_deref()), vec![3]);

    match ticket.outcome().await {
        Err(CoreError::MutationRejected { key: rejected, message }) => {
            assert_eq!(rejected, k);
            assert!(message.contains("Employee is not linked"));
        }
        other => panic!("expected MutationRejected, got: {other:?}"),
    }

    let entry = engine.read(k).unwrap();
    assert!(entry.pending.is_empty());
    assert_eq!(employee_ids(entry.view.as_deref()), vec![3, 7]);
    assert!(drain(&mut notices).iter().any(|n| matches!(
        n,
        SyncNotice::MutationRejected { key: rejected, id: rejected_id, .. }
            if *rejected == k && *rejected_id == id
    )));
}

#[tokio::test(start_paused = true)]
async fn invalid_proposals_never_reach_the_source() {
    let source = Arc::new(ScriptedSource::new(|key, _| Reply::ok(default_payload(key))));
    let engine = engine(&source, PERIOD);
    let mut page = engine.page(Page::Reviews);
    page.view(EntityId::new(1)).unwrap();
    sleep(ms(100)).await;

    let result = engine.propose(key(ResourceKind::Employees, 1), Mutation::Delete { id: 1 });
    assert!(matches!(result, Err(CoreError::NotSubscribed { .. })));

    let result = engine.propose(key(ResourceKind::Reviews, 1), Mutation::Delete { id: 1 });
    assert!(matches!(result, Err(CoreError::KindMismatch { .. })));

    let bad_review = Mutation::Create(Draft::Review(ReviewDraft {
        name: "Great".into(),
        description: "Loved it".into(),
        rating: 9,
        written_by: None,
    }));
    let result = engine.propose(key(ResourceKind::Reviews, 1), bad_review);
    assert!(matches!(result, Err(CoreError::ValidationFailed { .. })));

    sleep(ms(100)).await;
    assert!(source.mutations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn created_review_is_confirmed_by_matching_item() {
    let source = Arc::new(ScriptedSource::new(|_, call| {
        if call == 0 {
            Reply::ok(reviews(0))
        } else {
            Reply::ok(Payload::Reviews(vec![community_core::Review {
                name: "Great".into(),
                description: "Loved it".into(),
                rating: 5.0,
                written_by: Some("Ana".into()),
            }]))
        }
    }));
    let engine = SyncEngine::new(
        config(PERIOD),
        Session::new(None, Some("Ana".into())),
        Arc::clone(&source),
    );
    let k = key(ResourceKind::Reviews, 2);
    let mut view = engine.view_of(&[ResourceKind::Reviews]);
    view.view(EntityId::new(2)).unwrap();
    sleep(ms(100)).await;

    let draft = ReviewDraft {
        name: "Great".into(),
        description: "Loved it".into(),
        rating: 5,
        written_by: None,
    };
    let ticket = engine.propose(k, Mutation::Create(Draft::Review(draft))).unwrap();
    ticket.outcome().await.unwrap();

    let entry = engine.read(k).unwrap();
    let optimistic = entry.view.as_deref().and_then(Payload::as_reviews).unwrap();
    assert_eq!(optimistic.len(), 1);
    assert_eq!(optimistic[0].written_by.as_deref(), Some("Ana"));

    sleep(ms(5000)).await;
    let entry = engine.read(k).unwrap();
    assert!(entry.pending.is_empty());
    assert_eq!(entry.view.as_deref().map(Payload::len), Some(1));
}

#[tokio::test(start_paused = true)]
async fn follow_overrides_until_snapshot_confirms() {
    let source = Arc::new(ScriptedSource::new(|key, call| {
        Reply::ok(service(key.entity.get(), call >= 2))
    }));
    let engine = engine(&source, PERIOD);
    let mut notices = engine.notices();
    let k = key(ResourceKind::Service, 12);
    let mut page = engine.page(Page::ServiceDetail);
    page.view(EntityId::new(12)).unwrap();
    sleep(ms(100)).await;
    assert_eq!(following(&engine, k), Some(false));

    let follow = Mutation::SetFlag {
        flag: Flag::Following,
        value: true,
    };
    let ticket = engine.propose(k, follow.clone()).unwrap();
    assert_eq!(following(&engine, k), Some(true));
    let id = ticket.outcome().await.unwrap();

    // 5000 ms: server still says false, the override holds.
    sleep(ms(5000)).await;
    let entry = engine.read(k).unwrap();
    assert_eq!(entry.pending.len(), 1);
    assert!(entry.pending[0].acknowledged);
    let snapshot = entry.snapshot.unwrap();
    assert_eq!(snapshot.payload.as_service().map(|s| s.is_following), Some(false));
    assert_eq!(following(&engine, k), Some(true));

    // 10000 ms: server agrees.
    sleep(ms(5000)).await;
    assert!(engine.read(k).unwrap().pending.is_empty());
    assert_eq!(following(&engine, k), Some(true));

    assert!(drain(&mut notices).contains(&SyncNotice::MutationConfirmed { key: k, id }));
    assert_eq!(source.mutations(), vec![(k, follow)]);
}

#[tokio::test(start_paused = true)]
async fn rejected_unfollow_restores_flag() {
    let source = Arc::new(
        ScriptedSource::new(|key, _| Reply::ok(service(key.entity.get(), true))).with_mutate(
            ms(50),
            |_, _| {
                Err(CoreError::Api {
                    message: "Not following this service".into(),
                    status: None,
                })
            },
        ),
    );
    let engine = engine(&source, PERIOD);
    let mut notices = engine.notices();
    let k = key(ResourceKind::Service, 12);
    let mut page = engine.page(Page::ServiceDetail);
    page.view(EntityId::new(12)).unwrap();
    sleep(ms(100)).await;

    let ticket = engine
        .propose(
            k,
            Mutation::SetFlag {
                flag: Flag::Following,
                value: false,
            },
        )
        .unwrap();
    assert_eq!(following(&engine, k), Some(false));

    let result = ticket.outcome().await;
    assert!(
        matches!(result, Err(CoreError::MutationRejected { key: rejected, .. }) if rejected == k),
        "got: {result:?}"
    );

    let entry = engine.read(k).unwrap();
    assert!(entry.pending.is_empty());
    assert_eq!(following(&engine, k), Some(true));
    assert!(drain(&mut notices)
        .iter()
        .any(|n| matches!(n, SyncNotice::MutationRejected { key: rejected, .. } if *rejected == k)));
}
