// src/session/controller.rs

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::sdk_configuration::SdkConfiguration;
use crate::error::SessionError;
use crate::model::ad_info::{describe_timeout, duration_millis, AdError, AdInfo};
use crate::model::parallax::ParallaxMargins;
use crate::model::placement::{PlacementConfig, SellerDefinedAudience, SellerDefinedContent};
use crate::model::status::{AdStatus, FailureStage, SessionState};
use crate::session::backend::{AdLoader, AdPresenter, AdRequest, HostContext};
use crate::session::observer::{AdSessionObserver, SessionEvent};

/// 加载结果的来源：加载器或超时计时器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadSource {
    Loader,
    Timer,
}

/// 正在进行的加载：加载任务和超时任务，先到者胜出，另一方被中止
struct InFlight {
    load: AbortHandle,
    timer: AbortHandle,
}

impl InFlight {
    fn abort_all(self) {
        self.load.abort();
        self.timer.abort();
    }
}

struct SessionCore {
    state: SessionState,
    cycle: u64,
    ad_info: Option<AdInfo>,
    last_error: Option<AdError>,
    load_started: Option<Instant>,
    load_elapsed: Option<Duration>,
    in_flight: Option<InFlight>,
    shown_emitted: bool,
}

/// 观察者槽位，`active` 记录正在执行回调的线程
#[derive(Default)]
struct ObserverSlot {
    observer: Option<Arc<dyn AdSessionObserver>>,
    active: Vec<ThreadId>,
}

struct SessionInner {
    session_id: Uuid,
    label: String,
    config: SdkConfiguration,
    core: Mutex<SessionCore>,
    observer: Mutex<ObserverSlot>,
    observer_idle: Condvar,
}

/// 回调结束（包括 panic）时把当前线程从 `active` 中移除
struct ActiveDispatch<'a> {
    inner: &'a SessionInner,
    thread: ThreadId,
}

impl Drop for ActiveDispatch<'_> {
    fn drop(&mut self) {
        let mut slot = self.inner.lock_observer();
        if let Some(pos) = slot.active.iter().position(|id| *id == self.thread) {
            slot.active.swap_remove(pos);
        }
        self.inner.observer_idle.notify_all();
    }
}

impl SessionInner {
    fn lock_core(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observer(&self) -> MutexGuard<'_, ObserverSlot> {
        self.observer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 替换观察者，并等待其它线程上正在执行的回调结束。
    /// 当前线程自己的回调不等待，回调里可以调用 dispose / set_observer。
    fn replace_observer(&self, observer: Option<Arc<dyn AdSessionObserver>>) {
        let current = thread::current().id();
        let mut slot = self.lock_observer();
        slot.observer = observer;
        while slot.active.iter().any(|id| *id != current) {
            slot = self
                .observer_idle
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn verbose(&self) -> bool {
        self.config.logging_enabled()
    }

    /// 加载结果只写入一次：周期不匹配或已不在 Loading 的结果直接丢弃
    fn resolve_load(&self, cycle: u64, outcome: Result<AdInfo, AdError>, source: LoadSource) {
        let event = {
            let mut core = self.lock_core();
            if core.cycle != cycle || core.state != SessionState::Loading {
                debug!(
                    session_id = %self.session_id,
                    cycle,
                    source = ?source,
                    "discarding load result for a settled cycle"
                );
                return;
            }
            if let Some(in_flight) = core.in_flight.take() {
                match source {
                    LoadSource::Loader => in_flight.timer.abort(),
                    LoadSource::Timer => in_flight.load.abort(),
                }
            }
            core.load_elapsed = core.load_started.map(|started| started.elapsed());
            match outcome {
                Ok(info) => {
                    core.state = SessionState::Ready;
                    core.ad_info = Some(info.clone());
                    SessionEvent::Loaded(info)
                }
                Err(error) => {
                    core.state = SessionState::Failed(FailureStage::Load);
                    core.last_error = Some(error.clone());
                    SessionEvent::Failed(error)
                }
            }
        };

        if self.verbose() {
            match &event {
                SessionEvent::Loaded(info) => info!(
                    session_id = %self.session_id,
                    placement = %self.label,
                    cycle,
                    insertion_id = info.insertion_id.as_deref().unwrap_or(""),
                    "ad loaded"
                ),
                SessionEvent::Failed(error) => warn!(
                    session_id = %self.session_id,
                    placement = %self.label,
                    cycle,
                    timeout = error.is_timeout(),
                    "ad failed to load: {}",
                    error
                ),
                _ => {}
            }
        }
        self.dispatch(&event);
    }

    fn presentation_event(&self, cycle: u64, event: SessionEvent) {
        {
            let mut core = self.lock_core();
            if core.cycle != cycle || core.state != SessionState::Showing {
                debug!(
                    session_id = %self.session_id,
                    cycle,
                    event = event.name(),
                    "ignoring presentation event outside of showing state"
                );
                return;
            }
            match &event {
                SessionEvent::Shown => {
                    if core.shown_emitted {
                        return;
                    }
                    core.shown_emitted = true;
                }
                SessionEvent::Closed => {
                    core.state = SessionState::Idle;
                    core.ad_info = None;
                }
                SessionEvent::ShowFailed(error) => {
                    core.state = SessionState::Failed(FailureStage::Show);
                    core.ad_info = None;
                    core.last_error = Some(error.clone());
                }
                _ => {}
            }
        }
        if self.verbose() {
            info!(
                session_id = %self.session_id,
                placement = %self.label,
                cycle,
                event = event.name(),
                "presentation event"
            );
        }
        self.dispatch(&event);
    }

    /// 回调在锁外执行，回调内可以再调用 show / load。
    /// 取观察者和登记线程在同一把锁内完成，dispose 会等到登记的回调结束。
    fn dispatch(&self, event: &SessionEvent) {
        let current = thread::current().id();
        let observer = {
            let mut slot = self.lock_observer();
            let Some(observer) = slot.observer.clone() else {
                return;
            };
            slot.active.push(current);
            observer
        };
        let _active = ActiveDispatch { inner: self, thread: current };
        match event {
            SessionEvent::Loaded(info) => observer.on_loaded(info),
            SessionEvent::Failed(error) => observer.on_failed(error),
            SessionEvent::Shown => observer.on_shown(),
            SessionEvent::ShowFailed(error) => observer.on_show_failed(error),
            SessionEvent::Clicked => observer.on_clicked(),
            SessionEvent::Closed => observer.on_closed(),
        }
    }
}

/// **展示句柄**
///
/// 交给展示后端，用来上报展示、点击、关闭和展示失败。
/// 句柄绑定到创建它的加载周期，旧周期的句柄上报会被忽略。
#[derive(Clone)]
pub struct PresentationHandle {
    inner: Weak<SessionInner>,
    cycle: u64,
    parallax_margins: ParallaxMargins,
}

impl PresentationHandle {
    fn report(&self, event: SessionEvent) {
        if let Some(inner) = self.inner.upgrade() {
            inner.presentation_event(self.cycle, event);
        }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// 展示时生效的视差边距，非视差创意可以忽略
    pub fn parallax_margins(&self) -> ParallaxMargins {
        self.parallax_margins
    }

    pub fn shown(&self) {
        self.report(SessionEvent::Shown);
    }

    pub fn clicked(&self) {
        self.report(SessionEvent::Clicked);
    }

    pub fn closed(&self) {
        self.report(SessionEvent::Closed);
    }

    pub fn failed(&self, error: AdError) {
        self.report(SessionEvent::ShowFailed(error));
    }
}

/// **广告会话控制器**
///
/// 驱动单个广告位完成 load -> ready/failed -> show -> close。
/// 同一实例只允许一个调用方按顺序操作；`load` 需要在 tokio 运行时内调用。
pub struct AdSessionController {
    inner: Arc<SessionInner>,
    placement: PlacementConfig,
    parallax_margins: ParallaxMargins,
    loader: Arc<dyn AdLoader>,
    presenter: Arc<dyn AdPresenter>,
}

impl AdSessionController {
    pub fn new(
        placement: PlacementConfig,
        config: SdkConfiguration,
        loader: Arc<dyn AdLoader>,
        presenter: Arc<dyn AdPresenter>,
    ) -> Self {
        let inner = SessionInner {
            session_id: Uuid::new_v4(),
            label: placement.identity().to_string(),
            config,
            core: Mutex::new(SessionCore {
                state: SessionState::Idle,
                cycle: 0,
                ad_info: None,
                last_error: None,
                load_started: None,
                load_elapsed: None,
                in_flight: None,
                shown_emitted: false,
            }),
            observer: Mutex::new(ObserverSlot::default()),
            observer_idle: Condvar::new(),
        };
        Self {
            inner: Arc::new(inner),
            placement,
            parallax_margins: ParallaxMargins::zero(),
            loader,
            presenter,
        }
    }

    pub fn with_observer(self, observer: Arc<dyn AdSessionObserver>) -> Self {
        self.set_observer(Some(observer));
        self
    }

    /// 其它线程上正在执行的回调结束后才返回
    pub fn set_observer(&self, observer: Option<Arc<dyn AdSessionObserver>>) {
        self.inner.replace_observer(observer);
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock_core().state
    }

    pub fn ad_status(&self) -> AdStatus {
        AdStatus::from(self.state())
    }

    /// 当前加载周期编号，每次 load 递增；0 表示从未加载
    pub fn load_cycle(&self) -> u64 {
        self.inner.lock_core().cycle
    }

    /// 只在 Ready / Showing 状态下返回当前周期的广告信息
    pub fn ad_info(&self) -> Option<AdInfo> {
        let core = self.inner.lock_core();
        match core.state {
            SessionState::Ready | SessionState::Showing => core.ad_info.clone(),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<AdError> {
        self.inner.lock_core().last_error.clone()
    }

    /// 最近一次加载从开始到结果落定的耗时
    pub fn last_load_duration(&self) -> Option<Duration> {
        self.inner.lock_core().load_elapsed
    }

    pub fn placement(&self) -> &PlacementConfig {
        &self.placement
    }

    /// 第一次 load 之前可以补充受众、内容和 supply chain，之后广告位被冻结
    pub fn placement_mut(&mut self) -> &mut PlacementConfig {
        &mut self.placement
    }

    pub fn set_seller_defined_audiences(
        &mut self,
        audiences: Vec<SellerDefinedAudience>,
    ) -> Result<(), SessionError> {
        self.placement.set_seller_defined_audiences(audiences)?;
        Ok(())
    }

    pub fn set_seller_defined_contents(
        &mut self,
        contents: Vec<SellerDefinedContent>,
    ) -> Result<(), SessionError> {
        self.placement.set_seller_defined_contents(contents)?;
        Ok(())
    }

    pub fn set_supply_chain_object_string(&mut self, schain: &str) -> Result<(), SessionError> {
        self.placement.set_supply_chain_object_string(schain)?;
        Ok(())
    }

    pub fn parallax_margins(&self) -> ParallaxMargins {
        self.parallax_margins
    }

    /// 视差边距在每次 show 时交给展示层，可以随时修改
    pub fn set_parallax_margins(&mut self, margins: ParallaxMargins) {
        self.parallax_margins = margins;
    }

    pub fn config(&self) -> &SdkConfiguration {
        &self.inner.config
    }

    /// 开始加载广告，返回本次加载周期编号。
    /// 只能从 Idle 或 Failed 调用，且必须在 tokio 运行时内；结果通过观察者异步送达。
    pub fn load(&mut self) -> Result<u64, SessionError> {
        let config = &self.inner.config;
        if !config.is_configured() {
            error!(
                session_id = %self.inner.session_id,
                placement = %self.inner.label,
                "load called before SdkConfiguration::configure()"
            );
            return Err(SessionError::NotConfigured);
        }
        let Ok(runtime) = Handle::try_current() else {
            error!(
                session_id = %self.inner.session_id,
                placement = %self.inner.label,
                "load called outside of a tokio runtime"
            );
            return Err(SessionError::NoRuntime);
        };
        let timeout = config.ad_call_timeout();

        let cycle = {
            let mut core = self.inner.lock_core();
            if !core.state.can_load() {
                return Err(SessionError::InvalidState {
                    operation: "load",
                    state: core.state,
                });
            }
            core.cycle += 1;
            core.state = SessionState::Loading;
            core.ad_info = None;
            core.last_error = None;
            core.load_started = Some(Instant::now());
            core.load_elapsed = None;
            core.shown_emitted = false;
            core.cycle
        };

        self.placement.freeze();
        let request = AdRequest::new(
            self.inner.session_id,
            cycle,
            &self.placement,
            config.automatic_location_detection_allowed(),
            config.secondary_implementation_info(),
            timeout,
        );
        if self.inner.verbose() {
            info!(
                session_id = %self.inner.session_id,
                placement = %self.inner.label,
                cycle,
                timeout_ms = duration_millis(timeout),
                "loading ad"
            );
        }

        let load_future = self.loader.load(request);
        let load_task = runtime.spawn({
            let inner = Arc::clone(&self.inner);
            async move {
                let outcome = load_future.await;
                inner.resolve_load(cycle, outcome, LoadSource::Loader);
            }
        });
        let timer_task = runtime.spawn({
            let inner = Arc::clone(&self.inner);
            async move {
                tokio::time::sleep(timeout).await;
                debug!(session_id = %inner.session_id, cycle, "{}", describe_timeout(timeout));
                inner.resolve_load(cycle, Err(AdError::timeout()), LoadSource::Timer);
            }
        });

        let in_flight = InFlight {
            load: load_task.abort_handle(),
            timer: timer_task.abort_handle(),
        };
        let mut core = self.inner.lock_core();
        if core.cycle == cycle && core.state == SessionState::Loading {
            core.in_flight = Some(in_flight);
        } else {
            // 结果已经在登记之前落定
            in_flight.abort_all();
        }
        Ok(cycle)
    }

    /// 展示已加载的广告，只能从 Ready 调用。
    /// 展示失败通过 `on_show_failed` 送达，需要重新 load 才能再次展示。
    pub fn show(&self, host: HostContext) -> Result<(), SessionError> {
        let (cycle, info) = {
            let mut core = self.inner.lock_core();
            if !core.state.can_show() {
                return Err(SessionError::InvalidState {
                    operation: "show",
                    state: core.state,
                });
            }
            core.state = SessionState::Showing;
            core.shown_emitted = false;
            (core.cycle, core.ad_info.clone().unwrap_or_default())
        };
        if self.inner.verbose() {
            info!(
                session_id = %self.inner.session_id,
                placement = %self.inner.label,
                cycle,
                "showing ad"
            );
        }

        let handle = PresentationHandle {
            inner: Arc::downgrade(&self.inner),
            cycle,
            parallax_margins: self.parallax_margins,
        };
        if let Err(error) = self.presenter.present(host, &info, handle.clone()) {
            handle.failed(error);
        }
        Ok(())
    }

    /// 清除观察者并中止正在进行的加载。
    /// 返回时其它线程上的回调已经结束，之后不会再有任何回调。
    pub fn dispose(&self) {
        self.set_observer(None);
        let mut core = self.inner.lock_core();
        if let Some(in_flight) = core.in_flight.take() {
            in_flight.abort_all();
        }
        if core.state == SessionState::Loading {
            core.state = SessionState::Idle;
        }
    }
}

impl Drop for AdSessionController {
    fn drop(&mut self) {
        self.dispose();
    }
}
