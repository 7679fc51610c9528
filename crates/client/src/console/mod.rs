pub mod command;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::Utc;
use parlor_api::{AdminBackend, ChatBackend};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

pub use command::{Command, CommandError, HELP_TEXT};

use crate::admin::{AdminConfig, AdminMount, AdminPanel};
use crate::chat::{ChatStore, SendOutcome};
use crate::error::ChatResult;
use crate::render::Renderer;
use crate::route::{Route, RouteDecision, RouteGuard};
use crate::session::{LoginForm, Session, SessionStore};

pub const LOGIN_PROMPT: &str =
    "Please /login <user> <password> or /register <user> <password> <password again>.";
pub const HOME_TEXT: &str = "Welcome to AI Chatbot! Type /chat to start a conversation.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The user asked to talk to another server at this base URL.
    Reconnect(String),
    Quit,
}

/// Something that happened outside of command handling and may need a redraw.
#[derive(Debug)]
pub enum ConsoleEvent {
    SendSettled(Result<ChatResult<SendOutcome>, JoinError>),
    Changed,
}

/// Drives the stores from console commands and renders the current route.
pub struct Console<R> {
    session: Arc<SessionStore>,
    chat: Arc<ChatStore>,
    admin: Arc<AdminPanel>,
    guard: RouteGuard,
    shown: Option<Route>,
    admin_mount: Option<AdminMount>,
    renderer: R,
    notice: Option<String>,
    sends: JoinSet<ChatResult<SendOutcome>>,
    chat_changes: watch::Receiver<u64>,
    admin_changes: watch::Receiver<u64>,
    session_changes: watch::Receiver<Session>,
}

impl<R: Renderer> Console<R> {
    pub fn new<B>(backend: Arc<B>, admin_config: AdminConfig, renderer: R) -> Self
    where
        B: ChatBackend + AdminBackend + 'static,
    {
        let chat_backend: Arc<dyn ChatBackend> = backend.clone();
        let admin_backend: Arc<dyn AdminBackend> = backend;

        let session = Arc::new(SessionStore::new(chat_backend.clone()));
        let chat = Arc::new(ChatStore::new(chat_backend, session.clone()));
        let admin = Arc::new(AdminPanel::new(admin_backend, session.clone(), admin_config));
        let guard = RouteGuard::new(Route::Chat, session.subscribe());
        let chat_changes = chat.subscribe();
        let admin_changes = admin.subscribe();
        let session_changes = session.subscribe();

        Self {
            session,
            chat,
            admin,
            guard,
            shown: None,
            admin_mount: None,
            renderer,
            notice: None,
            sends: JoinSet::new(),
            chat_changes,
            admin_changes,
            session_changes,
        }
    }

    pub fn route(&self) -> Route {
        self.guard.route()
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn chat(&self) -> &ChatStore {
        &self.chat
    }

    pub fn is_admin_mounted(&self) -> bool {
        self.admin_mount.is_some()
    }

    /// Shows `text` under the next frame.
    pub fn notify(&mut self, text: impl Into<String>) {
        self.notice = Some(text.into());
    }

    /// Probes the session and opens the chat, or the login prompt.
    pub async fn start(&mut self) {
        self.session.check_auth().await;
        self.sync_route().await;
    }

    pub async fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::Login { username, password } => {
                self.authenticate(LoginForm::login(username, password)).await;
            }
            Command::Register {
                username,
                password,
                confirm_password,
            } => {
                self.authenticate(LoginForm::register(username, password, confirm_password))
                    .await;
            }
            Command::Logout => {
                self.session.logout().await;
                self.notice = Some("Logged out.".to_string());
            }
            Command::List => {
                if self.show(Route::Chat).await {
                    // Failures land in the banner.
                    let _ = self.chat.load_conversations().await;
                }
            }
            Command::Open(conversation_id) => {
                if self.show(Route::Chat).await {
                    let _ = self.chat.load_conversation(&conversation_id).await;
                }
            }
            Command::New => {
                if self.show(Route::Chat).await {
                    self.chat.start_new();
                }
            }
            Command::Create(title) => {
                if self.show(Route::Chat).await {
                    let _ = self.chat.create_conversation(title.as_deref()).await;
                }
            }
            Command::Rename { id, title } => {
                if self.show(Route::Chat).await {
                    self.notice = Some(match self.chat.rename(&id, &title).await {
                        Ok(conversation) => format!("Renamed to \"{}\".", conversation.title),
                        Err(error) => error.to_string(),
                    });
                }
            }
            Command::Chat => {
                self.show(Route::Chat).await;
            }
            Command::Admin => {
                self.show(Route::Admin).await;
            }
            Command::Filter(level) => {
                if self.show(Route::Admin).await {
                    self.admin.set_log_filter(&level).await;
                }
            }
            Command::Dismiss => self.chat.dismiss_banner(),
            Command::Reload => self.reload().await,
            Command::Help => self.notice = Some(HELP_TEXT.to_string()),
            Command::Server(base_url) => return Flow::Reconnect(base_url),
            Command::Quit => {
                self.shutdown().await;
                return Flow::Quit;
            }
            Command::Send(text) => {
                if self.show(Route::Chat).await {
                    let chat = Arc::clone(&self.chat);
                    self.sends.spawn(async move { chat.send(&text).await });
                }
            }
        }

        self.sync_route().await;
        Flow::Continue
    }

    /// Waits for a send to settle or for any store to change.
    ///
    /// Cancel safe, so it can race against terminal input.
    pub async fn next_event(&mut self) -> ConsoleEvent {
        tokio::select! {
            biased;
            Some(settled) = self.sends.join_next() => ConsoleEvent::SendSettled(settled),
            Ok(()) = self.chat_changes.changed() => ConsoleEvent::Changed,
            Ok(()) = self.admin_changes.changed() => ConsoleEvent::Changed,
            Ok(()) = self.session_changes.changed() => ConsoleEvent::Changed,
        }
    }

    pub async fn apply(&mut self, event: ConsoleEvent) {
        if let ConsoleEvent::SendSettled(settled) = event {
            self.settle_send(settled);
        }
        self.sync_route().await;
    }

    /// Waits for every in-flight send to settle.
    pub async fn finish_sends(&mut self) {
        while let Some(settled) = self.sends.join_next().await {
            self.settle_send(settled);
        }
        self.sync_route().await;
    }

    /// Renders the current route plus any one-shot notice.
    pub fn render(&mut self) -> String {
        self.chat_changes.borrow_and_update();
        self.admin_changes.borrow_and_update();
        self.session_changes.borrow_and_update();
        let now = Utc::now();
        let header = match self.session.snapshot().username() {
            Some(username) => format!("Signed in as {username}"),
            None => "Not signed in".to_string(),
        };

        let body = match self.guard.route() {
            Route::Chat => self.renderer.chat(&self.chat.snapshot(), now),
            Route::Admin => self.renderer.admin(&self.admin.snapshot(), now),
            Route::Login => LOGIN_PROMPT.to_string(),
            Route::Home => HOME_TEXT.to_string(),
        };

        let mut output = format!("{header}\n{body}");
        if let Some(notice) = self.notice.take() {
            output.push('\n');
            output.push_str(&notice);
        }
        output
    }

    /// Renders, falling back to the crash panel if rendering panics.
    pub fn render_safely(&mut self) -> String {
        match catch_unwind(AssertUnwindSafe(|| self.render())) {
            Ok(output) => output,
            Err(payload) => {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|detail| detail.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned());
                tracing::error!(detail = detail.as_deref().unwrap_or(""), "rendering failed");
                self.renderer.crash(detail.as_deref())
            }
        }
    }

    pub async fn shutdown(&mut self) {
        self.sends.shutdown().await;
        if let Some(mount) = self.admin_mount.take() {
            mount.unmount().await;
        }
    }

    async fn authenticate(&mut self, form: LoginForm) {
        self.notice = Some(match self.session.login(&form).await {
            Ok(outcome) => outcome
                .message
                .unwrap_or_else(|| format!("Signed in as {}.", outcome.user.username)),
            Err(error) => error.to_string(),
        });
    }

    fn settle_send(&mut self, settled: Result<ChatResult<SendOutcome>, JoinError>) {
        match settled {
            Ok(Ok(SendOutcome::Delivered {
                warning: Some(warning),
                ..
            })) => self.notice = Some(warning),
            Ok(Ok(SendOutcome::Skipped)) => {
                self.notice = Some("Still waiting for the previous reply.".to_string());
            }
            Ok(Ok(_)) => {}
            Ok(Err(error)) => self.notice = Some(error.to_string()),
            Err(error) => tracing::warn!(error = %error, "send task ended abnormally"),
        }
    }

    async fn reload(&mut self) {
        self.session.check_auth().await;
        match self.guard.route() {
            Route::Chat => {
                let _ = self.chat.resync().await;
            }
            Route::Admin => self.admin.refresh_all().await,
            Route::Login | Route::Home => {}
        }
        self.notice = Some("Reloaded.".to_string());
    }

    /// Navigates and reports whether `route` actually rendered.
    async fn show(&mut self, route: Route) -> bool {
        self.guard.navigate(route);
        self.sync_route().await;
        if self.guard.route() == route {
            return true;
        }

        self.notice = Some(LOGIN_PROMPT.to_string());
        false
    }

    async fn sync_route(&mut self) {
        loop {
            if self.guard.decision() == RouteDecision::Pending {
                return;
            }
            let route = self.guard.route();
            self.enter(route).await;
            if !self.guard.is_stale() {
                return;
            }
        }
    }

    async fn enter(&mut self, route: Route) {
        if self.shown == Some(route) {
            return;
        }
        if let Some(mount) = self.admin_mount.take() {
            mount.unmount().await;
        }
        tracing::debug!(route = route.path(), "entering route");

        match route {
            Route::Chat => {
                if let Err(error) = self.chat.load_conversations().await {
                    tracing::debug!(error = %error, "conversation list unavailable on entry");
                }
            }
            Route::Admin => self.admin_mount = Some(self.admin.mount().await),
            Route::Login => self.chat.reset(),
            Route::Home => {}
        }
        self.shown = Some(route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::AdminSnapshot;
    use crate::chat::ChatSnapshot;
    use crate::render::{CRASH_TITLE, TYPING_TEXT, TerminalRenderer};
    use crate::testing::{Call, Failure, ScriptedBackend};
    use chrono::DateTime;

    fn console(backend: &Arc<ScriptedBackend>) -> Console<TerminalRenderer> {
        Console::new(backend.clone(), AdminConfig::default(), TerminalRenderer)
    }

    fn parse(line: &str) -> Command {
        Command::parse(line).unwrap().unwrap()
    }

    #[tokio::test]
    async fn anonymous_start_lands_on_login() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut console = console(&backend);

        console.start().await;

        assert_eq!(console.route(), Route::Login);
        assert!(console.render().contains(LOGIN_PROMPT));
        assert!(!backend.calls().contains(&Call::ListConversations));
    }

    #[tokio::test]
    async fn login_opens_chat_and_loads_the_list() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_conversations(vec![ScriptedBackend::conversation(4, "Trip")]);
        let mut console = console(&backend);
        console.start().await;

        console.handle(parse("/login ada secret")).await;

        assert_eq!(console.route(), Route::Chat);
        let output = console.render();
        assert!(output.starts_with("Signed in as ada"));
        assert!(output.contains("[4] Trip"));
        assert!(output.contains("Login successful"));
    }

    #[tokio::test]
    async fn expired_session_during_chat_returns_to_login() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_current_user(ScriptedBackend::user(1, "ada"));
        let mut console = console(&backend);
        console.start().await;
        assert_eq!(console.route(), Route::Chat);

        backend.fail_conversations(Failure::Unauthorized);
        console.handle(parse("/list")).await;

        assert_eq!(console.route(), Route::Login);
        assert!(console.chat().snapshot().conversations.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn admin_view_polls_only_while_shown() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_current_user(ScriptedBackend::user(1, "ada"));
        let mut console = console(&backend);
        console.start().await;

        console.handle(parse("/admin")).await;
        assert!(console.is_admin_mounted());

        console.handle(parse("/filter ERROR")).await;
        assert!(backend.calls().contains(&Call::Logs(parlor_api::LogQuery::new(
            Some("ERROR".to_string()),
            Some(100)
        ))));

        console.handle(parse("/chat")).await;
        assert!(!console.is_admin_mounted());
    }

    #[tokio::test]
    async fn plain_lines_are_sent_as_messages() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_current_user(ScriptedBackend::user(1, "ada"));
        let mut console = console(&backend);
        console.start().await;

        console.handle(parse("hello there")).await;
        console.finish_sends().await;

        let requests = backend.send_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message, "hello there");
        assert!(console.render().contains("AI: echo: hello there"));
    }

    #[tokio::test]
    async fn pending_send_is_drawn_before_the_reply_arrives() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_current_user(ScriptedBackend::user(1, "ada"));
        let mut console = console(&backend);
        console.start().await;
        console.render();

        let release = backend.hold_next_send();
        assert_eq!(console.handle(parse("hello")).await, Flow::Continue);
        while !console.chat().snapshot().pending {
            let event = console.next_event().await;
            console.apply(event).await;
        }

        let frame = console.render();
        assert!(frame.contains("You: hello"));
        assert!(frame.contains(TYPING_TEXT));

        console.handle(parse("again")).await;
        let event = console.next_event().await;
        assert!(matches!(
            event,
            ConsoleEvent::SendSettled(Ok(Ok(SendOutcome::Skipped)))
        ));
        console.apply(event).await;
        assert!(console.render().contains("Still waiting for the previous reply."));

        let _ = release.send(());
        console.finish_sends().await;
        let frame = console.render();
        assert!(frame.contains("AI: echo: hello"));
        assert!(!frame.contains(TYPING_TEXT));
        assert_eq!(backend.send_requests().len(), 1);
    }

    #[tokio::test]
    async fn server_command_asks_for_a_reconnect() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut console = console(&backend);
        console.start().await;

        let flow = console.handle(parse("/server http://10.0.0.5:5000")).await;

        assert_eq!(flow, Flow::Reconnect("http://10.0.0.5:5000".to_string()));
    }

    struct PanickingRenderer;

    impl Renderer for PanickingRenderer {
        fn chat(&self, _snapshot: &ChatSnapshot, _now: DateTime<Utc>) -> String {
            panic!("layout exploded")
        }

        fn admin(&self, _snapshot: &AdminSnapshot, _now: DateTime<Utc>) -> String {
            String::new()
        }

        fn crash(&self, detail: Option<&str>) -> String {
            format!("{CRASH_TITLE}: {}", detail.unwrap_or(""))
        }
    }

    #[tokio::test]
    async fn render_panic_falls_back_to_crash_panel() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_current_user(ScriptedBackend::user(1, "ada"));
        let mut console = Console::new(backend.clone(), AdminConfig::default(), PanickingRenderer);
        console.start().await;

        assert_eq!(
            console.render_safely(),
            "Something went wrong: layout exploded"
        );
    }
}
