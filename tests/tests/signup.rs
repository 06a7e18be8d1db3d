mod utils;
#[allow(unused)]
use utils::*;

use mock_service::Behavior;
use stampede::core::ErrorTag;
use stampede::prelude::*;
use std::future::IntoFuture;
use std::net::TcpListener;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn healthy_service_passes() {
    let service = mock(Behavior::default()).await;

    let report = LoadTest::http(config(&service, &[(10, 5)]))
        .unwrap()
        .await
        .unwrap();

    let metrics = &report.metrics;
    assert!(report.verdict.passed, "{report}");
    assert_eq!(metrics.error_rate, 0.);
    assert!(metrics.requests > 0);
    assert_eq!(metrics.status_codes.keys().copied().collect::<Vec<_>>(), vec![201]);
    assert!(metrics.latency.percentile(95.).unwrap() < Duration::from_millis(500));
    assert_eq!(report.started_vus, report.completed_vus);

    // Every request created a distinct user; no email was ever reused.
    assert_eq!(service.requests(), metrics.requests);
    assert_eq!(service.users() as u64, metrics.requests);
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn failing_service_fails_the_run() {
    let service = mock(Behavior {
        fail_with: Some(500),
        ..Default::default()
    })
    .await;

    let report = LoadTest::http(config(&service, &[(3, 3)]))
        .unwrap()
        .await
        .unwrap();

    assert!(!report.verdict.passed);
    assert_eq!(report.metrics.error_rate, 1.);
    assert_eq!(report.metrics.http_req_failed, 1.);
    assert_eq!(
        report.metrics.error_tags.get(&ErrorTag::Status),
        Some(&report.metrics.requests)
    );

    let failed: Vec<_> = report
        .verdict
        .failures()
        .map(|r| r.threshold.to_string())
        .collect();
    assert_eq!(failed, vec!["errors:rate<0.05"]);
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn unhealthy_service_never_starts() {
    let service = mock(Behavior {
        health: 503,
        ..Default::default()
    })
    .await;

    let test = LoadTest::http(config(&service, &[(10, 5)])).unwrap();
    let status = test.subscribe();
    let err = test.await.unwrap_err();

    assert!(matches!(err, SetupError::Unhealthy { status: 503, .. }), "{err}");
    assert_eq!(status.borrow().state, RunState::SetupFailed);
    assert_eq!(status.borrow().started_vus, 0);
    assert_eq!(service.requests(), 0);
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn unreachable_service_never_starts() {
    let service = mock(Behavior::default()).await;
    let mut config = config(&service, &[(10, 5)]);

    // Grab a free port and release it again so nothing listens there.
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    config.base_url = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();

    let err = LoadTest::http(config).unwrap().await.unwrap_err();
    assert!(matches!(err, SetupError::Unreachable { .. }), "{err}");
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn wrong_echo_is_a_failed_outcome() {
    let service = mock(Behavior {
        wrong_echo: true,
        ..Default::default()
    })
    .await;

    let report = LoadTest::http(config(&service, &[(2, 2)]))
        .unwrap()
        .await
        .unwrap();

    assert!(!report.verdict.passed);
    assert_eq!(report.metrics.passed, 0);
    assert_eq!(
        report.metrics.error_tags.get(&ErrorTag::MalformedBody),
        Some(&report.metrics.requests)
    );
    let echoed = report.metrics.checks.get("response has user").unwrap();
    assert_eq!(echoed.passes, 0);
    let status = report.metrics.checks.get("status is 201").unwrap();
    assert_eq!(status.fails, 0);
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn ramps_down_to_zero() {
    let service = mock(Behavior::default()).await;

    let test = LoadTest::http(config(&service, &[(5, 10), (5, 0)])).unwrap();
    let mut status = test.subscribe();
    let run = tokio::spawn(test.into_future());

    let mut peak = 0;
    while status.changed().await.is_ok() {
        let current = status.borrow_and_update().clone();
        peak = peak.max(current.active_vus);
        if current.state.is_terminal() {
            assert_eq!(current.active_vus, 0);
            assert_eq!(current.started_vus, current.completed_vus);
            break;
        }
    }

    let report = run.await.unwrap().unwrap();
    assert!((8..=10).contains(&peak), "{peak}");
    assert!(report.metrics.elapsed >= Duration::from_secs(10));
    assert_eq!(report.started_vus, report.completed_vus);
    assert!(report.verdict.passed, "{report}");
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn summary_export() {
    let service = mock(Behavior::default()).await;
    let report = LoadTest::http(config(&service, &[(2, 2)]))
        .unwrap()
        .await
        .unwrap();

    let path = std::env::temp_dir().join(format!("stampede-it-{}.json", std::process::id()));
    JsonFileSink::new(&path).emit(&report).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(json["name"], "integration");
    assert_eq!(json["metrics"]["requests"], report.metrics.requests);
    assert_eq!(json["verdict"]["passed"], true);
}
