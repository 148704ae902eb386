// src/main.rs

use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter, Registry};
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;

use adsdk::config::adapters::FileConfigAdapter;
use adsdk::logging::{RuntimeLogger, SessionLog};
use adsdk::mock::{MockAdLoader, MockPresenter};
use adsdk::{
    AdSessionController, ChannelObserver, ConfigManager, HostContext, PlacementConfig,
    SdkConfiguration, SessionEvent, TestVariant,
};

#[derive(Parser, Debug)]
#[command(author = "whiteCcinn", version = "1.0", about = "Ad session lifecycle demo against a mock ad server")]
struct CliArgs {
    /// SDK 设置文件（JSON）
    #[arg(long, default_value = "static/sdk_config.json")]
    settings: String,
    /// 具名广告位文件（JSON）
    #[arg(long, default_value = "static/placements.json")]
    placements: String,
    /// 使用配置文件中的具名广告位
    #[arg(long)]
    placement: Option<String>,
    #[arg(long, num_args = 3, value_names = ["SITE", "PAGE", "FORMAT"])]
    ids: Option<Vec<i64>>,
    /// 测试广告位，如 banner_html、interstitial_video
    #[arg(long)]
    test_ad: Option<TestVariant>,
    #[arg(long, default_value_t = 0.8)]
    fill_rate: f64,
    #[arg(long, default_value_t = 2000)]
    display_ms: u64,
    #[arg(long, default_value_t = 1)]
    clicks: u32,
    #[arg(long, default_value = "logs")]
    log_dir: String,
}

impl CliArgs {
    fn resolve_placement(&self, config: Option<&ConfigManager>) -> Option<PlacementConfig> {
        if let Some(variant) = self.test_ad {
            return Some(PlacementConfig::test_ad(variant));
        }
        if let Some([site, page, format]) = self.ids.as_deref() {
            return Some(PlacementConfig::new(*site, *page, *format));
        }
        match (&self.placement, config) {
            (Some(name), Some(config)) => config.placement(name),
            (None, Some(config)) => config
                .placement_names()
                .first()
                .and_then(|name| config.placement(name)),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // 初始化全局 tracing 日志
    let log_file = rolling::hourly(&args.log_dir, "adsdk_log.json");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);
    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().json().with_writer(non_blocking));
    tracing::subscriber::set_global_default(subscriber)
        .expect("Unable to set global tracing subscriber");

    // 初始化运行日志记录器（用于记录会话结果、调试、错误等）
    let runtime_logger = RuntimeLogger::new(&args.log_dir, "runtime", 1000, 100, 1000, 72);
    runtime_logger.log("INFO", "ad sdk demo is starting...").await;

    // SDK 必须先配置，否则不会有任何广告返回
    let sdk = SdkConfiguration::shared();
    let adapter = FileConfigAdapter::new(&args.settings, &args.placements);
    let config = match ConfigManager::from_adapter(&adapter, sdk.clone()) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("running without config files: {}", e);
            runtime_logger.log("WARN", &format!("config not loaded: {}", e)).await;
            None
        }
    };
    sdk.configure();

    let placement = match args.resolve_placement(config.as_ref()) {
        Some(placement) => placement,
        None => {
            info!("no placement selected, falling back to the HTML banner test placement");
            PlacementConfig::test_ad(TestVariant::BannerHtml)
        }
    };

    let loader = Arc::new(MockAdLoader::new(args.fill_rate, 100, 300));
    let presenter = Arc::new(MockPresenter {
        display_duration: Duration::from_millis(args.display_ms),
        clicks: args.clicks,
    });
    let (tx, rx) = mpsc::unbounded_channel();
    let mut controller = AdSessionController::new(placement, sdk.clone(), loader, presenter)
        .with_observer(Arc::new(ChannelObserver::new(tx)));

    tokio::select! {
        session_log = run_session(&mut controller, rx) => {
            if let Some(session_log) = session_log {
                info!(status = %session_log.status, clicks = session_log.clicks(), "ad session finished");
                runtime_logger.log_session(&session_log).await;
            }
        }
        _ = signal::ctrl_c() => {
            runtime_logger.log("INFO", "Shutting down gracefully...").await;
        }
    }

    controller.dispose();
    runtime_logger.log("INFO", "ad sdk demo shut down.").await;
    runtime_logger.shutdown().await;
}

/// 加载 -> 展示 -> 关闭，返回本次会话日志
async fn run_session(
    controller: &mut AdSessionController,
    mut events: UnboundedReceiver<SessionEvent>,
) -> Option<SessionLog> {
    let cycle = match controller.load() {
        Ok(cycle) => cycle,
        Err(e) => {
            warn!("unable to start ad session: {}", e);
            return None;
        }
    };
    let mut session_log = SessionLog::new(
        &controller.session_id().to_string(),
        &controller.placement().identity().to_string(),
        cycle,
    );

    while let Some(event) = events.recv().await {
        session_log.record(&event, controller.last_load_duration());
        match event {
            SessionEvent::Loaded(info) => {
                info!(
                    insertion_id = info.insertion_id.as_deref().unwrap_or(""),
                    height_for_320 = info.height_for_width(320.0).unwrap_or(0.0),
                    "ad ready, showing it"
                );
                if let Err(e) = controller.show(HostContext::new("demo-root")) {
                    warn!("show rejected: {}", e);
                    break;
                }
            }
            SessionEvent::Failed(_) | SessionEvent::ShowFailed(_) | SessionEvent::Closed => break,
            SessionEvent::Shown | SessionEvent::Clicked => {}
        }
    }
    Some(session_log)
}
