// /app.rs
use crate::backend::{BackendClient, Credential, auth::SignUpOutcome, storage::Upload};
use crate::character::CharacterSheet;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::export::PdfExporter;
use crate::record::RosterEntry;
use crate::session::{Identity, Role};
use crate::settings::Settings;
use crate::store::{CharacterStore, LocalStore, RemoteStore, Repository};
use crate::tui::{Tui, TuiEvent};
use crate::ui::{
    AuthMenu, Component, ComponentEnum, Dashboard, MasterRoster, SheetEditor, SheetView,
    status::{Notice, render_status},
};

use log::{debug, error, info, warn};
use ratatui::{
    crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    layout::{Constraint, Layout},
};
use std::{future::Future, path::PathBuf, time::Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Auth,
    Dashboard,
    Edit,
    View,
    Master,
}

/// Where a navigation request actually lands. Signed-out users only ever see the auth screen
/// and the roster is reserved for masters.
pub fn guard(screen: Screen, identity: Option<&Identity>, has_sheet: bool) -> Screen {
    match (screen, identity) {
        (_, None) => Screen::Auth,
        (Screen::Auth, Some(_)) => Screen::Dashboard,
        (Screen::Master, Some(identity)) if !identity.is_master() => Screen::Dashboard,
        (Screen::Edit | Screen::View, Some(_)) if !has_sheet => Screen::Dashboard,
        (screen, Some(_)) => screen,
    }
}

// Requests raised synchronously by components.
#[derive(Debug)]
pub enum Action {
    Quit,
    Navigate(Screen),
    Back,
    SignIn { email: String, password: String },
    SignUp { email: String, password: String, role: Role },
    SignOut,
    CreateSheet,
    OpenSheet { owner_id: String, screen: Screen },
    UpdateSheet(CharacterSheet),
    SaveSheet,
    UploadAvatar(String),
    ExportPdf,
    RefreshRoster,
    Notify(Notice),
}

// Results of background work, delivered back to the event loop.
#[derive(Debug)]
pub enum TaskOutcome {
    Refreshed(Identity),
    SignedIn(Result<Identity>),
    SignedUp(Result<SignUpOutcome>),
    SheetLoaded {
        screen: Screen,
        result: Result<Option<CharacterSheet>>,
    },
    Saved {
        revision: u64,
        result: Result<CharacterSheet>,
    },
    RosterLoaded(Result<Vec<RosterEntry>>),
    AvatarUploaded(Result<String>),
    Exported(Result<PathBuf>),
}

#[derive(Debug, Clone)]
pub struct Services {
    pub backend: Option<BackendClient>,
    pub repository: Option<Repository>,
    pub exporter: PdfExporter,
}

impl Services {
    pub async fn connect(settings: &Settings) -> Self {
        let backend = match BackendClient::from_settings(settings) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("Backend unavailable: {}", e);
                None
            }
        };
        let cache = if settings.offline_cache {
            match LocalStore::open(settings.cache_path()).await {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!("Offline cache disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };
        let repository = backend
            .clone()
            .map(|client| Repository::new(RemoteStore::new(client), cache));
        Services {
            backend,
            repository,
            exporter: PdfExporter::from_settings(settings),
        }
    }

    pub fn backend(&self) -> Result<&BackendClient> {
        self.backend.as_ref().ok_or(Error::NotConfigured("backend URL"))
    }

    pub fn repository(&self) -> Result<&Repository> {
        self.repository
            .as_ref()
            .ok_or(Error::NotConfigured("backend URL"))
    }

    async fn fresh_identity(&self, identity: &Identity) -> Result<Identity> {
        self.backend()?.ensure_fresh(identity).await
    }
}

fn report(tx: &UnboundedSender<TaskOutcome>, outcome: TaskOutcome) {
    if let Err(e) = tx.send(outcome) {
        warn!("Dropped task outcome, event loop closed: {:?}", e.0);
    }
}

// Built from individual fields so the active component can be borrowed mutably alongside it.
macro_rules! context {
    ($app:expr) => {
        Context {
            settings: &$app.settings,
            identity: $app.identity.as_ref(),
            sheet: $app.sheet.as_ref(),
            roster: &$app.roster,
            busy: $app.busy > 0,
            unsaved: $app.revision != $app.saved_revision,
        }
    };
}

enum Step {
    Tui(TuiEvent),
    Outcome(TaskOutcome),
    Closed,
}

pub struct App {
    running: bool,
    component: ComponentEnum,
    screen: Screen,

    settings: Settings,
    services: Services,

    identity: Option<Identity>,
    sheet: Option<CharacterSheet>,
    revision: u64,
    saved_revision: u64,
    roster: Vec<RosterEntry>,

    notice: Option<Notice>,
    busy: usize,

    outcome_tx: UnboundedSender<TaskOutcome>,
    outcome_rx: UnboundedReceiver<TaskOutcome>,
}

impl App {
    pub async fn new(settings: Settings) -> Self {
        let services = Services::connect(&settings).await;
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let notice = (!settings.is_configured()).then(|| {
            Notice::error("Backend non configurato: imposta SUPABASE_URL e SUPABASE_ANON_KEY")
        });
        Self {
            running: true,
            component: ComponentEnum::from(AuthMenu::new()),
            screen: Screen::Auth,
            settings,
            services,
            identity: None,
            sheet: None,
            revision: 0,
            saved_revision: 0,
            roster: Vec::new(),
            notice,
            busy: 0,
            outcome_tx,
            outcome_rx,
        }
    }

    pub async fn run(&mut self) -> color_eyre::Result<()> {
        let mut tui = Tui::new()?
            .tick_rate(10.0) // fine enough for the edit debounce
            .frame_rate(30.0);

        tui.enter()?;

        while self.running {
            tui.draw(|frame| {
                let [main, status] =
                    Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(frame.area());
                let context = context!(self);
                self.component.render(main, frame.buffer_mut(), &context);
                render_status(frame.buffer_mut(), status, self.notice.as_ref(), &context);
            })?;

            let step = tokio::select! {
                Some(event) = tui.next() => Step::Tui(event),
                Some(outcome) = self.outcome_rx.recv() => Step::Outcome(outcome),
                else => Step::Closed,
            };
            match step {
                Step::Tui(event) => self.handle_tui_event(event),
                Step::Outcome(outcome) => self.handle_outcome(outcome),
                Step::Closed => self.running = false,
            }
        }

        tui.exit()?;
        Ok(())
    }

    fn handle_tui_event(&mut self, event: TuiEvent) {
        let action = match event {
            TuiEvent::Key(key) if key.kind == KeyEventKind::Press => self.on_key(key),
            TuiEvent::Paste(text) => {
                let context = context!(self);
                self.component.on_paste(&text, &context)
            }
            TuiEvent::Tick => self.component.on_tick(Instant::now()),
            TuiEvent::Error => {
                warn!("Terminal event stream reported an error");
                None
            }
            TuiEvent::Key(_)
            | TuiEvent::Init
            | TuiEvent::Render
            | TuiEvent::FocusGained
            | TuiEvent::FocusLost
            | TuiEvent::Mouse(_)
            | TuiEvent::Resize(_, _) => None,
        };
        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Action::Quit);
        }
        let context = context!(self);
        self.component.on_key(key, &context)
    }

    pub fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.running = false,
            Action::Navigate(screen) => self.navigate(screen),
            Action::Back => {
                if self.screen == Screen::Edit && self.revision != self.saved_revision {
                    self.save_sheet();
                }
                let screen = if self.holds_foreign_sheet() {
                    Screen::Master
                } else {
                    Screen::Dashboard
                };
                self.navigate(screen);
            }
            Action::SignIn { email, password } => self.sign_in(email, password),
            Action::SignUp {
                email,
                password,
                role,
            } => self.sign_up(email, password, role),
            Action::SignOut => self.sign_out(),
            Action::CreateSheet => {
                if let Some(identity) = &self.identity {
                    self.sheet = Some(CharacterSheet::new_for(identity.user_id()));
                    self.revision += 1;
                    self.navigate(Screen::Edit);
                }
            }
            Action::OpenSheet { owner_id, screen } => self.load_sheet(owner_id, screen),
            Action::UpdateSheet(mut sheet) => {
                debug!("Pending edit flushed for {}", sheet.display_name());
                // The editor may have started before the first save assigned an id.
                if let Some(current) = &self.sheet {
                    if sheet.id.is_none() {
                        sheet.id = current.id.clone();
                    }
                }
                self.sheet = Some(sheet);
                self.revision += 1;
            }
            Action::SaveSheet => self.save_sheet(),
            Action::UploadAvatar(source) => self.upload_avatar(source),
            Action::ExportPdf => self.export_pdf(),
            Action::RefreshRoster => self.refresh_roster(),
            Action::Notify(notice) => self.notice = Some(notice),
        }
    }

    // A master browsing someone else's sheet.
    fn holds_foreign_sheet(&self) -> bool {
        match (&self.sheet, &self.identity) {
            (Some(sheet), Some(identity)) => !sheet.is_owned_by(identity.user_id()),
            _ => false,
        }
    }

    fn navigate(&mut self, requested: Screen) {
        let screen = guard(requested, self.identity.as_ref(), self.sheet.is_some());
        if screen != requested {
            debug!("Navigation to {:?} redirected to {:?}", requested, screen);
        }
        self.screen = screen;
        if screen == Screen::Dashboard && self.holds_foreign_sheet() {
            self.sheet = None;
            self.load_own_sheet();
        }
        let duration = self.settings.debounce();
        self.component = match screen {
            Screen::Auth => ComponentEnum::from(AuthMenu::new()),
            Screen::Dashboard => ComponentEnum::from(Dashboard::new(self.identity.as_ref())),
            Screen::Edit => match &self.sheet {
                Some(sheet) => ComponentEnum::from(SheetEditor::new(sheet.clone(), duration)),
                None => ComponentEnum::from(Dashboard::new(self.identity.as_ref())),
            },
            Screen::View => ComponentEnum::from(SheetView::new()),
            Screen::Master => {
                self.refresh_roster();
                ComponentEnum::from(MasterRoster::new())
            }
        };
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = TaskOutcome> + Send + 'static,
    {
        self.busy += 1;
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let outcome = task.await;
            report(&tx, outcome);
        });
    }

    // Runs `task` with a fresh identity. A refreshed token is reported before the result.
    fn spawn_authed<T, F, Fut, W>(&mut self, task: F, wrap: W)
    where
        T: Send + 'static,
        F: FnOnce(Services, Identity) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        W: FnOnce(Result<T>) -> TaskOutcome + Send + 'static,
    {
        let Some(identity) = self.identity.clone() else {
            self.navigate(Screen::Auth);
            return;
        };
        let services = self.services.clone();
        let tx = self.outcome_tx.clone();
        self.busy += 1;
        tokio::spawn(async move {
            let fresh = match services.fresh_identity(&identity).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    report(&tx, wrap(Err(e)));
                    return;
                }
            };
            if fresh != identity {
                report(&tx, TaskOutcome::Refreshed(fresh.clone()));
            }
            let result = task(services, fresh).await;
            report(&tx, wrap(result));
        });
    }

    fn sign_in(&mut self, email: String, password: String) {
        let services = self.services.clone();
        self.notice = Some(Notice::info("Accesso in corso..."));
        self.spawn(async move {
            let result = async {
                let backend = services.backend()?;
                let mut identity = backend.sign_in_identity(&email, &password).await?;
                match services.repository()?.ensure_profile(&identity).await {
                    Ok(profile) => identity.profile = Some(profile),
                    Err(e) => warn!("Could not ensure profile, continuing as {}: {}", identity.role(), e),
                }
                Ok(identity)
            }
            .await;
            TaskOutcome::SignedIn(result)
        });
    }

    fn sign_up(&mut self, email: String, password: String, role: Role) {
        let services = self.services.clone();
        self.notice = Some(Notice::info("Registrazione in corso..."));
        self.spawn(async move {
            let result = match services.backend() {
                Ok(backend) => backend.sign_up(&email, &password, role).await,
                Err(e) => Err(e),
            };
            TaskOutcome::SignedUp(result)
        });
    }

    fn sign_out(&mut self) {
        if let (Some(identity), Some(backend)) = (self.identity.take(), self.services.backend.clone())
        {
            tokio::spawn(async move {
                if let Err(e) = backend.sign_out(identity.token()).await {
                    debug!("Remote sign-out failed: {}", e);
                }
            });
        }
        self.clear_session();
        self.notice = Some(Notice::info("Disconnesso"));
    }

    fn clear_session(&mut self) {
        self.identity = None;
        self.sheet = None;
        self.roster.clear();
        self.revision = 0;
        self.saved_revision = 0;
        self.navigate(Screen::Auth);
    }

    fn load_sheet(&mut self, owner_id: String, screen: Screen) {
        self.spawn_authed(
            move |services, identity| async move {
                services
                    .repository()?
                    .fetch_by_owner(&identity, &owner_id)
                    .await
            },
            move |result| TaskOutcome::SheetLoaded { screen, result },
        );
    }

    fn load_own_sheet(&mut self) {
        if let Some(identity) = &self.identity {
            let owner_id = identity.user_id().to_string();
            self.load_sheet(owner_id, Screen::Dashboard);
        }
    }

    fn save_sheet(&mut self) {
        let Some(sheet) = self.sheet.clone() else {
            return;
        };
        let revision = self.revision;
        self.notice = Some(Notice::info("Salvataggio..."));
        self.spawn_authed(
            move |services, identity| async move {
                services.repository()?.upsert(&identity, sheet).await
            },
            move |result| TaskOutcome::Saved { revision, result },
        );
    }

    fn refresh_roster(&mut self) {
        self.spawn_authed(
            |services, identity| async move { services.repository()?.list_all(&identity).await },
            TaskOutcome::RosterLoaded,
        );
    }

    fn upload_avatar(&mut self, source: String) {
        let Some(owner_id) = self.sheet.as_ref().and_then(|sheet| sheet.user_id.clone()) else {
            return;
        };
        self.notice = Some(Notice::info("Caricamento immagine..."));
        self.spawn_authed(
            move |services, identity| async move {
                let backend = services.backend()?;
                let (file_name, upload) = read_avatar_source(&source).await?;
                let path = backend
                    .upload_avatar(identity.token(), &owner_id, &file_name, &upload)
                    .await?;
                Ok(backend.public_url(&path))
            },
            TaskOutcome::AvatarUploaded,
        );
    }

    fn export_pdf(&mut self) {
        let Some(sheet) = self.sheet.clone() else {
            return;
        };
        self.notice = Some(Notice::info("Esportazione PDF..."));
        self.spawn_authed(
            move |services, identity| async move {
                let avatar = match (&sheet.image_url, services.backend()) {
                    (Some(url), Ok(backend)) => {
                        let bytes = async {
                            let resolved = backend
                                .resolve_avatar(Credential::User(identity.token()), url)
                                .await?;
                            backend.fetch_bytes(&resolved).await
                        }
                        .await;
                        match bytes {
                            Ok(bytes) => Some(bytes),
                            Err(e) => {
                                warn!("Exporting without avatar: {}", e);
                                None
                            }
                        }
                    }
                    _ => None,
                };
                services.exporter.export(&sheet, avatar).await
            },
            TaskOutcome::Exported,
        );
    }

    fn handle_outcome(&mut self, outcome: TaskOutcome) {
        if !matches!(outcome, TaskOutcome::Refreshed(_)) {
            self.busy = self.busy.saturating_sub(1);
        }
        match outcome {
            TaskOutcome::Refreshed(identity) => {
                debug!("Session refreshed for {}", identity.user_id());
                self.identity = Some(identity);
            }
            TaskOutcome::SignedIn(Ok(identity))
            | TaskOutcome::SignedUp(Ok(SignUpOutcome::SignedIn(identity))) => {
                self.signed_in(identity)
            }
            TaskOutcome::SignedIn(Err(e)) => self.report_error("Accesso non riuscito", e),
            TaskOutcome::SignedUp(Ok(SignUpOutcome::ConfirmationRequired { email })) => {
                self.notice = Some(Notice::info(format!(
                    "Controlla la posta di {} per confermare la registrazione",
                    email
                )));
            }
            TaskOutcome::SignedUp(Err(e)) => self.report_error("Registrazione non riuscita", e),
            TaskOutcome::SheetLoaded { screen, result } => match result {
                Ok(Some(sheet)) => {
                    self.set_canonical(sheet);
                    self.saved_revision = self.revision;
                    if screen != Screen::Dashboard {
                        self.navigate(screen);
                    }
                }
                Ok(None) => {
                    if screen == Screen::Dashboard {
                        self.sheet = None;
                    } else {
                        self.notice = Some(Notice::info("Nessuna scheda per questo giocatore"));
                    }
                }
                Err(e) => self.report_error("Caricamento scheda non riuscito", e),
            },
            TaskOutcome::Saved { revision, result } => match result {
                Ok(saved) => {
                    if revision == self.revision {
                        self.set_canonical(saved);
                        self.saved_revision = self.revision;
                    } else if let Some(sheet) = self.sheet.as_mut() {
                        // Newer edits arrived while saving; keep them and take the stored ids.
                        sheet.id = saved.id;
                        sheet.updated_at = saved.updated_at;
                    }
                    self.notice = Some(Notice::info("Scheda salvata"));
                }
                Err(e) => self.report_error("Salvataggio non riuscito", e),
            },
            TaskOutcome::RosterLoaded(result) => match result {
                Ok(roster) => {
                    self.notice = Some(Notice::info(format!("{} schede caricate", roster.len())));
                    self.roster = roster;
                }
                Err(e) => self.report_error("Elenco schede non disponibile", e),
            },
            TaskOutcome::AvatarUploaded(result) => match result {
                Ok(url) => {
                    if let Some(mut sheet) = self.sheet.clone() {
                        sheet.image_url = Some(url);
                        self.set_canonical(sheet);
                        self.revision += 1;
                        self.notice = Some(Notice::info("Immagine caricata, ricorda di salvare"));
                    }
                }
                Err(e) => self.report_error("Caricamento immagine non riuscito", e),
            },
            TaskOutcome::Exported(result) => match result {
                Ok(path) => {
                    self.notice = Some(Notice::info(format!("PDF salvato in {}", path.display())))
                }
                Err(e) => self.report_error("Esportazione non riuscita", e),
            },
        }
    }

    fn signed_in(&mut self, identity: Identity) {
        info!("Signed in as {} ({})", identity.user_id(), identity.role());
        self.notice = Some(Notice::info(format!(
            "Benvenuto, {} ({})",
            identity.email().unwrap_or("pirata"),
            identity.role().label()
        )));
        self.identity = Some(identity);
        self.navigate(Screen::Dashboard);
        self.load_own_sheet();
    }

    fn set_canonical(&mut self, sheet: CharacterSheet) {
        self.component.on_sheet(&sheet);
        self.sheet = Some(sheet);
    }

    fn report_error(&mut self, what: &str, e: Error) {
        error!("{}: {}", what, e);
        if e.requires_sign_in() && self.identity.is_some() {
            self.clear_session();
            self.notice = Some(Notice::error("Sessione scaduta, accedi di nuovo"));
            return;
        }
        self.notice = Some(Notice::error(format!("{}: {}", what, e)));
    }
}

// An avatar source is a path to an image file or a base64 payload / data URL.
async fn read_avatar_source(source: &str) -> Result<(String, Upload)> {
    let source = source.trim();
    let path = PathBuf::from(source);
    if source.starts_with("data:") || !path.exists() {
        let upload = Upload::from_base64(source, "image/png")?;
        let extension = upload.content_type.rsplit('/').next().unwrap_or("png").to_string();
        return Ok((format!("avatar.{}", extension), upload));
    }
    let bytes = tokio::fs::read(&path).await?;
    let content_type = image::ImageFormat::from_path(&path)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("avatar")
        .to_string();
    Ok((file_name, Upload::new(bytes, content_type)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Profile, Session};

    fn identity(role: Role) -> Identity {
        Identity::new(
            Session {
                access_token: "t".to_string(),
                refresh_token: "r".to_string(),
                user_id: "u1".to_string(),
                email: None,
                expires_at: None,
            },
            Some(Profile {
                id: "u1".to_string(),
                email: None,
                role,
                created_at: None,
            }),
        )
    }

    #[test]
    fn signed_out_users_only_see_auth() {
        for screen in [Screen::Dashboard, Screen::Edit, Screen::View, Screen::Master] {
            assert_eq!(guard(screen, None, true), Screen::Auth);
        }
    }

    #[test]
    fn master_screen_is_reserved() {
        let player = identity(Role::Player);
        let master = identity(Role::Master);
        assert_eq!(guard(Screen::Master, Some(&player), true), Screen::Dashboard);
        assert_eq!(guard(Screen::Master, Some(&master), false), Screen::Master);
        assert_eq!(guard(Screen::Auth, Some(&player), false), Screen::Dashboard);
    }

    #[test]
    fn sheet_screens_need_a_sheet() {
        let player = identity(Role::Player);
        assert_eq!(guard(Screen::Edit, Some(&player), false), Screen::Dashboard);
        assert_eq!(guard(Screen::View, Some(&player), true), Screen::View);
    }

    #[tokio::test]
    async fn base64_sources_become_uploads() {
        let (name, upload) = read_avatar_source("data:image/jpeg;base64,aGVsbG8=")
            .await
            .unwrap();
        assert_eq!(name, "avatar.jpeg");
        assert_eq!(upload.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn file_sources_keep_their_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        std::fs::write(&path, b"not really a png").unwrap();
        let (name, upload) = read_avatar_source(path.to_str().unwrap()).await.unwrap();
        assert_eq!(name, "face.png");
        assert_eq!(upload.content_type, "image/png");
        assert_eq!(upload.bytes, b"not really a png");
    }
}
