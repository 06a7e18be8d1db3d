use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::{Behavior, MockService};
use stampede::core::{RunConfig, Stage, Threshold};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::FmtSubscriber;
use url::Url;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        FmtSubscriber::builder()
            .with_env_filter("stampede=debug,mock_service=info")
            .init();

        if let Err(err) = PrometheusBuilder::new().install_recorder() {
            error!("Unable to install metrics recorder: {err}");
        }
    });
}

/// Start a mock signup service with the given behavior.
#[allow(unused)]
pub async fn mock(behavior: Behavior) -> MockService {
    init();
    mock_service::spawn(behavior)
        .await
        .expect("mock service failed to start")
}

/// A run against `service` with the given `(seconds, target)` stages and the usual
/// `p(95)<500` / `rate<0.05` thresholds.
#[allow(unused)]
pub fn config(service: &MockService, stages: &[(u64, u32)]) -> RunConfig {
    let base = Url::parse(&service.base_url()).expect("mock base url");
    let mut config = RunConfig::new("integration", base);
    config.stages = stages
        .iter()
        .map(|&(secs, target)| Stage::new(Duration::from_secs(secs), target))
        .collect();
    config.thresholds = ["http_req_duration:p(95)<500", "errors:rate<0.05"]
        .iter()
        .map(|t| t.parse::<Threshold>().expect("valid threshold"))
        .collect();
    config
}
