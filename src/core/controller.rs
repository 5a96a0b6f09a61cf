//! Lifecycle controller - Creates, focuses and tears down the singleton instance

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::error::{CreationStep, LifecycleContext, LifecycleError};
use super::headers::with_isolation_headers;
use super::instance::{InstanceRecord, LifecycleState, PartialInstance};
use super::registry::InstanceRegistry;
use super::settings::Settings;
use crate::host::{
    AutoResize, Bounds, DevToolsMode, DevToolsOptions, HeaderInterception, Host, HostEvent,
    HostResult, RequestPhase, RuntimeService, SessionOptions, SessionService, TabOptions,
    TabService, TabUpdate, ViewOptions, ViewService, WindowService,
};

/// Permission namespace and name that authorize persistent session storage
const PERSISTENCE_GRANT: (&str, &str) = ("websessions", "create.persistent");

/// Outcome of an activation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// An instance was already live and has been brought to front
    Focused,
    /// A creation sequence was already running; the request was dropped
    Suppressed,
    /// A new instance was created
    Created(InstanceRecord),
    /// Creation failed and every resource obtained was released
    RolledBack,
}

/// Drives the singleton instance through Empty, Creating and Active.
///
/// Cloning is cheap; clones share the host, registry and settings.
#[derive(Clone)]
pub struct LifecycleController {
    host: Arc<dyn Host>,
    registry: Arc<RwLock<InstanceRegistry>>,
    settings: Arc<Settings>,
}

impl LifecycleController {
    pub fn new(host: Arc<dyn Host>, settings: Settings) -> Self {
        Self::with_registry(host, settings, Arc::new(RwLock::new(InstanceRegistry::new())))
    }

    /// Create a controller over an existing registry
    pub fn with_registry(
        host: Arc<dyn Host>,
        settings: Settings,
        registry: Arc<RwLock<InstanceRegistry>>,
    ) -> Self {
        Self {
            host,
            registry,
            settings: Arc::new(settings),
        }
    }

    fn registry(&self) -> RwLockReadGuard<'_, InstanceRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, InstanceRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> LifecycleState {
        self.registry().state()
    }

    /// Snapshot of the live instance, if any
    pub fn instance(&self) -> Option<InstanceRecord> {
        self.registry().get().cloned()
    }

    /// Focus the live instance, or create one if none exists
    pub async fn activate(&self) -> Activation {
        let begun = self.registry_mut().try_begin_creation();
        if let Err(state) = begun {
            debug!("Activation while {}, focusing instead", state);
            if let Err(e) = self.focus_instance().await {
                warn!("Failed to focus instance on activation: {}", e);
            }
            return match state {
                LifecycleState::Active => Activation::Focused,
                _ => Activation::Suppressed,
            };
        }

        info!("Creating '{}' instance", self.settings.title);
        let mut partial = PartialInstance::default();
        match self.create(&mut partial).await {
            Ok(record) => {
                self.registry_mut().complete_creation(record.clone());
                info!(
                    tab = %record.tab_id,
                    window = %record.window_id,
                    session = %record.session_id,
                    view = %record.view_id,
                    "Instance created"
                );
                Activation::Created(record)
            }
            Err(e) => {
                let event = HostEvent::ExtensionClick.name();
                error!(
                    event,
                    cause = %e.host_error(),
                    "{}",
                    e
                );
                self.roll_back(partial).await;
                self.settle_guard_after_failure();
                Activation::RolledBack
            }
        }
    }

    async fn create(&self, partial: &mut PartialInstance) -> Result<InstanceRecord, LifecycleError> {
        let settings = &self.settings;

        let tab = self
            .host
            .create_tab(TabOptions {
                text: settings.title.clone(),
                icon: settings.icon.clone(),
                mutable: true,
            })
            .await
            .at_step(CreationStep::CreateTab)?;
        partial.tab_id = Some(tab.id.clone());

        let geometry = settings.geometry();
        let window = self
            .host
            .create_window(geometry.window_options(&settings.title, &settings.icon))
            .await
            .at_step(CreationStep::CreateWindow)?;
        partial.window_id = Some(window.id.clone());

        // Chrome is only accounted for once the window exists
        let content_size = self
            .host
            .content_size(&window.id)
            .await
            .at_step(CreationStep::MeasureContent)?;

        let (namespace, permission) = PERSISTENCE_GRANT;
        let persistent = self
            .host
            .permissions()
            .await
            .at_step(CreationStep::ReadPermissions)?
            .is_granted(namespace, permission);

        let session = self
            .host
            .create_session(SessionOptions {
                partition: settings.partition().to_string(),
                persistent,
                global: false,
            })
            .await
            .at_step(CreationStep::CreateSession)?;
        partial.session_id = Some(session.id.clone());

        self.host
            .set_web_request_filter(&session.id, RequestPhase::BeforeReceiveHeaders)
            .await
            .at_step(CreationStep::InstallHeaderFilter)?;

        let view = self
            .host
            .create_view(ViewOptions {
                window: window.id.clone(),
                session: session.id.clone(),
                auto_resize: AutoResize {
                    horizontal: true,
                    vertical: true,
                },
                bounds: Bounds::filling(content_size),
            })
            .await
            .at_step(CreationStep::CreateView)?;
        partial.view_id = Some(view.id.clone());

        self.host
            .load_file(&view.id, &settings.document)
            .await
            .at_step(CreationStep::LoadDocument)?;

        if settings.open_dev_tools {
            self.host
                .open_dev_tools(
                    &view.id,
                    DevToolsOptions {
                        mode: DevToolsMode::Detach,
                        activate: true,
                    },
                )
                .await
                .at_step(CreationStep::OpenDevTools)?;
        }

        self.host
            .focus_window(&window.id)
            .await
            .at_step(CreationStep::FocusWindow)?;
        self.host
            .focus_view(&view.id)
            .await
            .at_step(CreationStep::FocusView)?;

        Ok(InstanceRecord::new(tab.id, window.id, session.id, view.id))
    }

    /// Release whatever a failed creation obtained. Each removal is independent.
    async fn roll_back(&self, partial: PartialInstance) {
        if partial.is_empty() {
            debug!("Nothing to roll back");
            return;
        }

        if let Some(id) = &partial.window_id {
            if let Err(e) = self.host.remove_window(id).await {
                warn!("Rollback failed to remove window {}: {}", id, e);
            }
        }
        if let Some(id) = &partial.tab_id {
            if let Err(e) = self.host.remove_tab(id).await {
                warn!("Rollback failed to remove tab {}: {}", id, e);
            }
        }
        if let Some(id) = &partial.session_id {
            if let Err(e) = self.host.remove_session(id).await {
                warn!("Rollback failed to remove session {}: {}", id, e);
            }
        }
        if let Some(id) = &partial.view_id {
            if let Err(e) = self.host.remove_view(id).await {
                warn!("Rollback failed to remove view {}: {}", id, e);
            }
        }
        info!("Rolled back failed instance creation");
    }

    fn settle_guard_after_failure(&self) {
        if self.settings.release_guard_on_failure {
            self.registry_mut().set_guarded(false);
            debug!("Creation guard released; a new activation may retry");
        } else {
            warn!("Creation guard left set; activation is blocked until restart");
        }
    }

    /// Restore and focus the live instance's window. No-op when absent.
    pub async fn focus_instance(&self) -> HostResult<()> {
        let window_id = self.registry().get().map(|record| record.window_id.clone());
        let Some(window_id) = window_id else {
            return Ok(());
        };

        self.host.restore_window(&window_id).await?;
        self.host.focus_window(&window_id).await
    }

    /// Remove the live instance's view, session, window and tab, in that order.
    ///
    /// The record is claimed before the first removal, so a concurrent or
    /// repeated call observes no instance. Returns whether anything was torn down.
    ///
    /// Unlike other handlers this does not stop at the first failed removal:
    /// the remaining resources are still released and the record stays cleared.
    pub async fn destroy_instance(&self) -> HostResult<bool> {
        let claimed = self.registry_mut().take();
        let Some(record) = claimed else {
            return Ok(false);
        };
        info!("Destroying instance (up {}s)", record.uptime().num_seconds());

        let mut first_error = None;
        let removals = [
            ("view", self.host.remove_view(&record.view_id).await),
            ("session", self.host.remove_session(&record.session_id).await),
            ("window", self.host.remove_window(&record.window_id).await),
            ("tab", self.host.remove_tab(&record.tab_id).await),
        ];
        for (kind, result) in removals {
            if let Err(e) = result {
                warn!("Failed to remove {} during teardown: {}", kind, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }

    /// Invert the view's audio mute and mirror it on the tab indicator.
    ///
    /// Returns the new mute state, or `None` when no instance is live.
    pub async fn toggle_mute(&self) -> HostResult<Option<bool>> {
        let ids = self
            .registry()
            .get()
            .map(|record| (record.tab_id.clone(), record.view_id.clone()));
        let Some((tab_id, view_id)) = ids else {
            return Ok(None);
        };

        let muted = self.host.is_audio_muted(&view_id).await?;
        self.host.set_audio_muted(&view_id, !muted).await?;

        let update = TabUpdate { muted: Some(!muted) };
        if let Err(e) = self.host.update_tab(&tab_id, update).await {
            if let Err(revert) = self.host.set_audio_muted(&view_id, muted).await {
                warn!("Failed to restore view mute state: {}", revert);
            }
            return Err(e);
        }

        debug!("Instance audio {}", if muted { "unmuted" } else { "muted" });
        Ok(Some(!muted))
    }

    /// Answer an intercepted response with the isolation headers merged in
    pub async fn respond_to_headers(&self, interception: &HeaderInterception) -> HostResult<()> {
        let headers = with_isolation_headers(&interception.response_headers);
        self.host
            .web_receive_headers_response(&interception.event_id, &interception.details_id, headers)
            .await
    }

    /// Run the handler bound to `event`. Failures are logged and discarded.
    pub async fn dispatch(&self, event: HostEvent) {
        let name = event.name();
        let quit = event.is_quit();
        trace!(event = name, "Dispatching host event");

        let result = match event {
            HostEvent::ExtensionClick => {
                self.activate().await;
                Ok(())
            }
            HostEvent::TabClicked => self.focus_instance().await,
            HostEvent::TabClickedMute => self.toggle_mute().await.map(|_| ()),
            HostEvent::TabClickedClose
            | HostEvent::TabRemoved
            | HostEvent::WindowClosed
            | HostEvent::WindowRemoved => self.destroy_instance().await.map(|_| ()),
            HostEvent::Message { .. } if quit => self.destroy_instance().await.map(|_| ()),
            HostEvent::Message { .. } => Ok(()),
            HostEvent::BeforeWebReceiveHeaders(interception) => {
                self.respond_to_headers(&interception).await
            }
        };

        if let Err(e) = result.in_handler(name) {
            warn!(event = name, cause = %e.host_error(), "{}", e);
        }
    }

    /// Consume host events until the stream closes, one task per event
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<HostEvent>) {
        info!("Listening for host events");
        while let Some(event) = events.recv().await {
            let controller = self.clone();
            tokio::spawn(async move { controller.dispatch(event).await });
        }
        info!("Host event stream closed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::host::{
        EventSource, HostCall, HostOp, MemoryHost, PermissionGrants, ResponseHeaders, Size,
    };

    const TEST_TIMEOUT: Duration = Duration::from_secs(2);

    const CREATION_OPS: [HostOp; 10] = [
        HostOp::CreateTab,
        HostOp::CreateWindow,
        HostOp::ContentSize,
        HostOp::Permissions,
        HostOp::CreateSession,
        HostOp::SetWebRequestFilter,
        HostOp::CreateView,
        HostOp::LoadFile,
        HostOp::FocusWindow,
        HostOp::FocusView,
    ];

    fn controller_with(settings: Settings) -> (Arc<MemoryHost>, LifecycleController) {
        let host = Arc::new(MemoryHost::new());
        let controller = LifecycleController::new(host.clone(), settings);
        (host, controller)
    }

    fn controller() -> (Arc<MemoryHost>, LifecycleController) {
        controller_with(Settings::default())
    }

    async fn active_controller() -> (Arc<MemoryHost>, LifecycleController, InstanceRecord) {
        let (host, controller) = controller();
        let Activation::Created(record) = controller.activate().await else {
            panic!("activation did not create an instance");
        };
        host.clear_calls();
        (host, controller, record)
    }

    fn ops(host: &MemoryHost) -> Vec<HostOp> {
        host.calls().iter().map(HostCall::op).collect()
    }

    fn teardown_calls(record: &InstanceRecord) -> Vec<HostCall> {
        vec![
            HostCall::RemoveView(record.view_id.clone()),
            HostCall::RemoveSession(record.session_id.clone()),
            HostCall::RemoveWindow(record.window_id.clone()),
            HostCall::RemoveTab(record.tab_id.clone()),
        ]
    }

    async fn wait_for_state(controller: &LifecycleController, state: LifecycleState) {
        timeout(TEST_TIMEOUT, async {
            while controller.state() != state {
                sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("controller reached expected state");
    }

    #[tokio::test]
    async fn activation_creates_instance_from_returned_ids() {
        let (host, controller) = controller();

        let Activation::Created(record) = controller.activate().await else {
            panic!("expected a new instance");
        };

        assert_eq!(ops(&host), CREATION_OPS.to_vec());
        let calls = host.calls();
        assert!(matches!(&calls[0], HostCall::CreateTab(_, id) if *id == record.tab_id));
        assert!(matches!(&calls[1], HostCall::CreateWindow(_, id) if *id == record.window_id));
        assert!(matches!(&calls[4], HostCall::CreateSession(_, id) if *id == record.session_id));
        assert!(matches!(&calls[6], HostCall::CreateView(_, id) if *id == record.view_id));
        assert_eq!(controller.instance(), Some(record));
        assert_eq!(controller.state(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn creation_requests_carry_fixed_options() {
        let (host, controller) = controller();
        host.set_content_size(Size {
            width: 1000,
            height: 560,
        });

        let Activation::Created(record) = controller.activate().await else {
            panic!("expected a new instance");
        };

        for call in host.calls() {
            match call {
                HostCall::CreateTab(options, _) => {
                    assert_eq!(options.text, "Shifty Dungeon");
                    assert_eq!(options.icon, "./assets/128.png");
                    assert!(options.mutable);
                }
                HostCall::CreateWindow(options, _) => {
                    assert_eq!((options.width, options.height), (1066, 600));
                    assert_eq!((options.min_width, options.min_height), (1066, 600));
                    assert!(!options.frame);
                }
                HostCall::CreateSession(options, _) => {
                    assert_eq!(options.partition, "Shifty Dungeon");
                    assert!(!options.persistent);
                    assert!(!options.global);
                }
                HostCall::SetWebRequestFilter(id, phase) => {
                    assert_eq!(id, record.session_id);
                    assert_eq!(phase, RequestPhase::BeforeReceiveHeaders);
                }
                HostCall::CreateView(options, _) => {
                    assert_eq!(options.window, record.window_id);
                    assert_eq!(options.session, record.session_id);
                    assert!(options.auto_resize.horizontal && options.auto_resize.vertical);
                    assert_eq!(
                        options.bounds,
                        Bounds {
                            x: 0,
                            y: 0,
                            width: 1000,
                            height: 560
                        }
                    );
                }
                HostCall::LoadFile(id, path) => {
                    assert_eq!(id, record.view_id);
                    assert_eq!(path, "index.html");
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn session_partition_defaults_to_configured_title() {
        let (host, controller) = controller_with(Settings {
            title: "Other".to_string(),
            ..Settings::default()
        });

        controller.activate().await;

        assert!(host.calls().iter().any(
            |call| matches!(call, HostCall::CreateSession(options, _) if options.partition == "Other")
        ));
    }

    #[tokio::test]
    async fn persistent_session_follows_permission_grant() {
        let (host, controller) = controller();
        host.set_permissions(PermissionGrants::default().grant("websessions", "create.persistent"));

        controller.activate().await;

        assert!(host.calls().iter().any(
            |call| matches!(call, HostCall::CreateSession(options, _) if options.persistent)
        ));
    }

    #[tokio::test]
    async fn dev_tools_open_after_document_loads_when_enabled() {
        let (host, controller) = controller_with(Settings {
            open_dev_tools: true,
            ..Settings::default()
        });

        let Activation::Created(record) = controller.activate().await else {
            panic!("expected a new instance");
        };

        let ops = ops(&host);
        let load = ops.iter().position(|op| *op == HostOp::LoadFile).unwrap();
        assert_eq!(ops[load + 1], HostOp::OpenDevTools);
        assert!(host.calls().contains(&HostCall::OpenDevTools(
            record.view_id,
            DevToolsOptions {
                mode: DevToolsMode::Detach,
                activate: true
            }
        )));
    }

    #[tokio::test]
    async fn activation_while_active_only_focuses() {
        let (host, controller, record) = active_controller().await;

        assert_eq!(controller.activate().await, Activation::Focused);

        assert_eq!(
            host.calls(),
            vec![
                HostCall::RestoreWindow(record.window_id.clone()),
                HostCall::FocusWindow(record.window_id.clone()),
            ]
        );
        assert_eq!(controller.instance(), Some(record));
    }

    #[tokio::test]
    async fn concurrent_activations_create_one_instance() {
        let (host, controller) = controller();

        let (first, second) = tokio::join!(controller.activate(), controller.activate());

        assert!(matches!(first, Activation::Created(_)));
        assert_eq!(second, Activation::Suppressed);
        assert_eq!(host.count(HostOp::CreateTab), 1);
        assert_eq!(host.count(HostOp::RestoreWindow), 0);
        assert_eq!(host.live_resources(), 4);
    }

    #[tokio::test]
    async fn window_failure_rolls_back_tab_only() {
        let (host, controller) = controller();
        host.fail_on(HostOp::CreateWindow);

        assert_eq!(controller.activate().await, Activation::RolledBack);

        let calls = host.calls();
        let HostCall::CreateTab(_, tab_id) = &calls[0] else {
            panic!("tab was not created first");
        };
        assert_eq!(
            calls[1..].to_vec(),
            vec![
                HostCall::Rejected(HostOp::CreateWindow),
                HostCall::RemoveTab(tab_id.clone()),
            ]
        );
        assert_eq!(controller.instance(), None);
        assert_eq!(host.live_resources(), 0);
    }

    #[tokio::test]
    async fn every_failing_step_releases_what_was_created() {
        for failing in CREATION_OPS {
            let (host, controller) = controller();
            host.fail_on(failing);

            assert_eq!(controller.activate().await, Activation::RolledBack);

            let calls = host.calls();
            let created = |op: HostOp| {
                calls
                    .iter()
                    .filter(|call| !matches!(call, HostCall::Rejected(_)) && call.op() == op)
                    .count()
            };
            for (create, remove) in [
                (HostOp::CreateTab, HostOp::RemoveTab),
                (HostOp::CreateWindow, HostOp::RemoveWindow),
                (HostOp::CreateSession, HostOp::RemoveSession),
                (HostOp::CreateView, HostOp::RemoveView),
            ] {
                assert_eq!(
                    created(create),
                    host.count(remove),
                    "{create} / {remove} mismatch when {failing} fails"
                );
            }
            assert_eq!(host.live_resources(), 0, "leak when {failing} fails");
            assert_eq!(controller.instance(), None);
            assert_eq!(controller.state(), LifecycleState::Empty);
        }
    }

    #[tokio::test]
    async fn late_failure_rolls_back_window_tab_session_then_view() {
        let (host, controller) = controller();
        host.fail_on(HostOp::FocusView);

        controller.activate().await;

        let removals: Vec<HostOp> = ops(&host)
            .into_iter()
            .filter(|op| {
                matches!(
                    op,
                    HostOp::RemoveTab
                        | HostOp::RemoveWindow
                        | HostOp::RemoveSession
                        | HostOp::RemoveView
                )
            })
            .collect();
        assert_eq!(
            removals,
            vec![
                HostOp::RemoveWindow,
                HostOp::RemoveTab,
                HostOp::RemoveSession,
                HostOp::RemoveView,
            ]
        );
    }

    #[tokio::test]
    async fn rollback_continues_past_failed_removal() {
        let (host, controller) = controller();
        host.fail_on(HostOp::CreateView);
        host.fail_on(HostOp::RemoveWindow);

        assert_eq!(controller.activate().await, Activation::RolledBack);

        assert_eq!(host.count(HostOp::RemoveWindow), 1);
        assert_eq!(host.count(HostOp::RemoveTab), 1);
        assert_eq!(host.count(HostOp::RemoveSession), 1);
        assert_eq!(host.count(HostOp::RemoveView), 0);
        assert_eq!(controller.state(), LifecycleState::Empty);
    }

    #[tokio::test]
    async fn released_guard_lets_next_activation_retry() {
        let (host, controller) = controller();
        host.fail_on(HostOp::CreateSession);
        assert_eq!(controller.activate().await, Activation::RolledBack);

        host.recover(HostOp::CreateSession);
        assert!(matches!(controller.activate().await, Activation::Created(_)));
        assert_eq!(host.live_resources(), 4);
    }

    #[tokio::test]
    async fn held_guard_blocks_activation_until_restart() {
        let (host, controller) = controller_with(Settings {
            release_guard_on_failure: false,
            ..Settings::default()
        });
        host.fail_on(HostOp::CreateSession);
        assert_eq!(controller.activate().await, Activation::RolledBack);
        assert_eq!(controller.state(), LifecycleState::Creating);

        host.recover(HostOp::CreateSession);
        host.clear_calls();
        assert_eq!(controller.activate().await, Activation::Suppressed);
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn window_removed_tears_down_in_order() {
        let (host, controller, record) = active_controller().await;

        controller.dispatch(HostEvent::WindowRemoved).await;

        assert_eq!(host.calls(), teardown_calls(&record));
        assert_eq!(controller.state(), LifecycleState::Empty);
        assert_eq!(host.live_resources(), 0);
    }

    #[tokio::test]
    async fn quit_message_tears_down_in_order() {
        let (host, controller, record) = active_controller().await;

        controller.dispatch(HostEvent::quit()).await;

        assert_eq!(host.calls(), teardown_calls(&record));
        assert_eq!(controller.instance(), None);
    }

    #[tokio::test]
    async fn every_close_event_destroys_instance() {
        for event in [
            HostEvent::TabClickedClose,
            HostEvent::TabRemoved,
            HostEvent::WindowClosed,
            HostEvent::WindowRemoved,
        ] {
            let (host, controller, record) = active_controller().await;
            controller.dispatch(event.clone()).await;
            assert_eq!(host.calls(), teardown_calls(&record), "{}", event.name());
        }
    }

    #[tokio::test]
    async fn other_messages_are_ignored() {
        let (host, controller, _) = active_controller().await;

        controller
            .dispatch(HostEvent::Message {
                payload: json!({"action": "quit"}),
            })
            .await;
        controller
            .dispatch(HostEvent::Message {
                payload: json!("Quit"),
            })
            .await;

        assert!(host.calls().is_empty());
        assert_eq!(controller.state(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let (host, controller, record) = active_controller().await;

        assert_eq!(controller.destroy_instance().await, Ok(true));
        assert_eq!(controller.destroy_instance().await, Ok(false));

        assert_eq!(host.calls(), teardown_calls(&record));
    }

    #[tokio::test]
    async fn concurrent_destroys_remove_once() {
        let (host, controller, record) = active_controller().await;

        tokio::join!(
            controller.dispatch(HostEvent::WindowClosed),
            controller.dispatch(HostEvent::TabRemoved),
        );

        assert_eq!(host.calls(), teardown_calls(&record));
    }

    #[tokio::test]
    async fn teardown_attempts_every_removal_and_clears_record() {
        let (host, controller, _) = active_controller().await;
        host.fail_on(HostOp::RemoveSession);

        assert!(controller.destroy_instance().await.is_err());

        assert_eq!(host.count(HostOp::RemoveView), 1);
        assert_eq!(host.count(HostOp::RemoveWindow), 1);
        assert_eq!(host.count(HostOp::RemoveTab), 1);
        assert_eq!(controller.state(), LifecycleState::Empty);
    }

    #[tokio::test]
    async fn focus_without_instance_makes_no_calls() {
        let (host, controller) = controller();

        controller.focus_instance().await.unwrap();
        controller.dispatch(HostEvent::TabClicked).await;

        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn tab_click_restores_then_focuses_window() {
        let (host, controller, record) = active_controller().await;

        controller.dispatch(HostEvent::TabClicked).await;

        assert_eq!(
            host.calls(),
            vec![
                HostCall::RestoreWindow(record.window_id.clone()),
                HostCall::FocusWindow(record.window_id),
            ]
        );
    }

    #[tokio::test]
    async fn handler_failure_leaves_state_untouched() {
        let (host, controller, _) = active_controller().await;
        host.fail_on(HostOp::RestoreWindow);

        controller.dispatch(HostEvent::TabClicked).await;

        assert_eq!(host.count(HostOp::FocusWindow), 0);
        assert_eq!(controller.state(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn mute_toggle_mirrors_view_state_on_tab() {
        let (host, controller, record) = active_controller().await;

        assert_eq!(controller.toggle_mute().await, Ok(Some(true)));
        assert_eq!(host.view_muted(&record.view_id), Some(true));
        assert_eq!(host.tab_muted(&record.tab_id), Some(true));

        controller.dispatch(HostEvent::TabClickedMute).await;
        assert_eq!(host.view_muted(&record.view_id), Some(false));
        assert_eq!(host.tab_muted(&record.tab_id), Some(false));
    }

    #[tokio::test]
    async fn mute_toggle_is_not_partially_applied() {
        let (host, controller, record) = active_controller().await;
        host.fail_on(HostOp::UpdateTab);

        assert!(controller.toggle_mute().await.is_err());

        assert_eq!(host.view_muted(&record.view_id), Some(false));
        assert_eq!(host.tab_muted(&record.tab_id), Some(false));
    }

    #[tokio::test]
    async fn mute_toggle_without_instance_is_noop() {
        let (host, controller) = controller();
        assert_eq!(controller.toggle_mute().await, Ok(None));
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn header_interception_adds_isolation_headers() {
        let (host, controller) = controller();

        controller
            .dispatch(HostEvent::BeforeWebReceiveHeaders(HeaderInterception {
                event_id: "event-1".into(),
                details_id: "details-1".into(),
                response_headers: ResponseHeaders::from([(
                    "X-Foo".to_string(),
                    vec!["1".to_string()],
                )]),
            }))
            .await;

        assert_eq!(
            host.calls(),
            vec![HostCall::HeadersResponse {
                event_id: "event-1".into(),
                details_id: "details-1".into(),
                response_headers: ResponseHeaders::from([
                    ("X-Foo".to_string(), vec!["1".to_string()]),
                    (
                        "Cross-Origin-Embedder-Policy".to_string(),
                        vec!["require-corp".to_string()]
                    ),
                    (
                        "Cross-Origin-Opener-Policy".to_string(),
                        vec!["same-origin".to_string()]
                    ),
                ]),
            }]
        );
    }

    #[tokio::test]
    async fn controllers_do_not_share_state() {
        let (_, first, _) = active_controller().await;
        let (_, second) = controller();

        assert_eq!(first.state(), LifecycleState::Active);
        assert_eq!(second.state(), LifecycleState::Empty);
    }

    #[tokio::test]
    async fn injected_registry_is_observed() {
        let host = Arc::new(MemoryHost::new());
        let registry = Arc::new(RwLock::new(InstanceRegistry::new()));
        registry.write().unwrap().set_guarded(true);
        let controller =
            LifecycleController::with_registry(host.clone(), Settings::default(), registry.clone());

        assert_eq!(controller.activate().await, Activation::Suppressed);
        registry.write().unwrap().set_guarded(false);
        assert!(matches!(controller.activate().await, Activation::Created(_)));
        assert!(registry.read().unwrap().get().is_some());
    }

    #[tokio::test]
    async fn run_dispatches_subscribed_events() {
        let (host, controller) = controller();
        let events = host.subscribe();
        let task = tokio::spawn(controller.clone().run(events));

        host.emit(HostEvent::ExtensionClick);
        host.emit(HostEvent::ExtensionClick);
        wait_for_state(&controller, LifecycleState::Active).await;

        host.emit(HostEvent::quit());
        wait_for_state(&controller, LifecycleState::Empty).await;

        assert_eq!(host.count(HostOp::CreateTab), 1);
        assert_eq!(host.live_resources(), 0);
        task.abort();
    }
}
