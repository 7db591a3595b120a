use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::sync::mpsc::Sender;

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{
    Block, Borders, Clear, List, ListItem, Paragraph, StatefulWidget, TableState, Widget,
};
use ratatui::{buffer::Buffer, layout::Rect};

pub mod api;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod columns;
pub mod config;
pub mod filter;
pub mod pager;
pub mod record;
pub mod sort;
pub mod widgets;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthClient, AuthSession};
pub use cache::CacheManager;
pub use cli::Args;
pub use config::{
    rgb_to_256_color, rgb_to_basic_ansi, AppConfig, ColorParser, ConfigManager, StoreLocation,
    Theme,
};
pub use pager::{FetchDecision, PageRequest, Pager};
pub use record::Record;

use columns::{ColumnSelection, ColumnsModal};
use filter::{FilterFocus, FilterModal, FilterState};
use sort::SortState;
use widgets::controls::Controls;
use widgets::datatable::{DataTable, DataTableColors, RiskBands, TableStats};
use widgets::debug::DebugState;
use widgets::form::{FormEvent, ItemForm, ItemFormColors, ItemFormWidget};
use widgets::store_map::{store_risks, StoreMap, StoreMapColors};
use widgets::text_input::{TextInput, TextInputEvent};

/// Application name used for cache directory and other app-specific paths
pub const APP_NAME: &str = "overstock";

/// Which paginated dataset an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataTarget {
    /// Stored sales records from /fetch-table-data
    Table,
    /// Bulk prediction output from /fetch-results
    Results,
}

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize(u16, u16),
    Exit,
    Crash(String),

    SignIn { email: String, password: String },
    SignUp { email: String, password: String },
    AuthFinished(Result<AuthSession, String>),

    /// Start a page fetch. `reset` refreshes from the top and supersedes
    /// any outstanding fetch for the same target.
    FetchPage { target: DataTarget, reset: bool },
    PageLoaded {
        target: DataTarget,
        request: PageRequest,
        rows: Vec<Record>,
    },
    PageFailed {
        target: DataTarget,
        request: PageRequest,
        message: String,
    },

    SubmitItem(Record),
    SubmitFinished(Result<(), String>),
    TrainModel,
    TrainFinished(Result<(), String>),
    RunPrediction,
    PredictionFinished(Result<usize, String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Dashboard,
    Database,
    Results,
    ItemEntry,
    StoreMap,
}

impl View {
    fn title(self) -> &'static str {
        match self {
            View::Login => "Sign In",
            View::Dashboard => "Dashboard",
            View::Database => "Database",
            View::Results => "Predictions",
            View::ItemEntry => "New Item",
            View::StoreMap => "Store Map",
        }
    }
}

#[derive(Default)]
pub struct ErrorModal {
    pub active: bool,
    pub message: String,
}

impl ErrorModal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, message: String) {
        self.active = true;
        self.message = message;
    }

    pub fn hide(&mut self) {
        self.active = false;
        self.message.clear();
    }
}

/// Everything one paginated table view owns: the page accumulator plus the
/// presentation pipeline (filter, sort, column selection) applied on top of
/// it, and the transient search-input state.
pub struct TableView {
    pub pager: Pager,
    pub filter: FilterState,
    pub sort: SortState,
    pub columns: ColumnSelection,
    pub table_state: TableState,
    pub column_cursor: usize,
    pub search: TextInput,
    pub searching: bool,
    search_backup: String,
}

impl TableView {
    fn new(page_size: usize, history_id: Option<&str>, history_limit: usize) -> Self {
        let mut search = TextInput::new().with_history_limit(history_limit);
        if let Some(id) = history_id {
            search = search.with_history(id.to_string());
        }
        Self {
            pager: Pager::new(page_size),
            filter: FilterState::default(),
            sort: SortState::default(),
            columns: ColumnSelection::default(),
            table_state: TableState::default(),
            column_cursor: 0,
            search,
            searching: false,
            search_backup: String::new(),
        }
    }

    /// Loaded rows through the filter and sort pipeline. Pure; the
    /// accumulated rows are never reordered or dropped.
    pub fn visible(&self) -> Vec<&Record> {
        let mut rows = self.filter.apply(self.pager.rows());
        self.sort.apply(&mut rows);
        rows
    }

    pub fn all_columns(&self) -> Vec<String> {
        record::columns(self.pager.rows())
    }

    fn clamp_cursor(&mut self, visible_len: usize, column_count: usize) {
        if column_count > 0 {
            self.column_cursor = self.column_cursor.min(column_count - 1);
        } else {
            self.column_cursor = 0;
        }
        match self.table_state.selected() {
            Some(_) if visible_len == 0 => {
                self.table_state.select(None);
            }
            Some(sel) if sel >= visible_len => {
                self.table_state.select(Some(visible_len - 1));
            }
            None if visible_len > 0 => self.table_state.select(Some(0)),
            _ => {}
        }
    }

    /// Move selection and report whether we are close enough to the end of
    /// the loaded rows that another page should be requested.
    fn select_offset(&mut self, delta: isize, visible_len: usize) -> bool {
        if visible_len == 0 {
            self.table_state.select(None);
            return !self.pager.exhausted();
        }
        let current = self.table_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, visible_len as isize - 1) as usize;
        self.table_state.select(Some(next));
        next + 10 >= visible_len && !self.pager.exhausted() && !self.pager.in_flight()
    }

    fn clear(&mut self) {
        self.pager.clear();
        self.filter.clear();
        self.sort.clear();
        self.columns.reset();
        self.table_state = TableState::default();
        self.column_cursor = 0;
    }
}

/// Login screen state. Focus cycles email, password, sign-in, sign-up.
pub struct LoginForm {
    pub email: TextInput,
    pub password: TextInput,
    pub focus: usize,
    pub error: Option<String>,
    pub busy: bool,
}

const LOGIN_FIELDS: usize = 4;
const LOGIN_SIGN_IN: usize = 2;
const LOGIN_SIGN_UP: usize = 3;

impl LoginForm {
    fn new() -> Self {
        let mut form = Self {
            email: TextInput::new(),
            password: TextInput::new().with_masking(),
            focus: 0,
            error: None,
            busy: false,
        };
        form.sync_focus();
        form
    }

    fn sync_focus(&mut self) {
        self.email.set_focused(self.focus == 0);
        self.password.set_focused(self.focus == 1);
    }

    fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % LOGIN_FIELDS;
        self.sync_focus();
    }

    fn focus_previous(&mut self) {
        self.focus = (self.focus + LOGIN_FIELDS - 1) % LOGIN_FIELDS;
        self.sync_focus();
    }

    fn validate(&self) -> Result<(), String> {
        if self.email.value().trim().is_empty() || !self.email.value().contains('@') {
            return Err("Enter a valid email address".to_string());
        }
        if self.password.value().is_empty() {
            return Err("Enter a password".to_string());
        }
        Ok(())
    }
}

pub struct App {
    events: Sender<AppEvent>,
    config: AppConfig,
    theme: Theme,
    cache: CacheManager,
    api: ApiClient,
    auth: Option<AuthClient>,
    pub session: Option<AuthSession>,

    pub view: View,
    pub login: LoginForm,
    pub table: TableView,
    pub results: TableView,
    pub item_form: ItemForm,
    pub filter_modal: FilterModal,
    pub columns_modal: ColumnsModal,
    /// Which table the open filter/columns modal is editing
    modal_target: DataTarget,
    error_modal: ErrorModal,

    pub map_selected: usize,
    status: Option<String>,
    pub training: bool,
    pub predicting: bool,
    show_help: bool,
    debug: DebugState,
}

impl App {
    pub fn new(events: Sender<AppEvent>) -> App {
        let theme = Theme::from_config(&AppConfig::default().theme).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to create default theme: {}. Using fallback.", e);
            Theme {
                colors: std::collections::HashMap::new(),
            }
        });
        Self::new_with_config(events, theme, AppConfig::default())
    }

    pub fn new_with_config(events: Sender<AppEvent>, theme: Theme, config: AppConfig) -> App {
        let cache = CacheManager::new(APP_NAME).unwrap_or_else(|e| {
            eprintln!("Warning: Could not initialize cache manager: {}", e);
            CacheManager {
                cache_dir: std::env::temp_dir().join(APP_NAME),
            }
        });

        let timeout = std::time::Duration::from_secs(config.backend.timeout_secs);
        let api = ApiClient::new(&config.backend.base_url, timeout);

        let auth = config.auth.api_key.as_ref().map(|key| {
            AuthClient::new(
                &config.auth.base_url,
                key,
                std::time::Duration::from_secs(config.auth.timeout_secs),
            )
        });

        // Without an identity provider configured the login screen has
        // nothing to talk to, so start on the dashboard.
        let view = if auth.is_some() {
            View::Login
        } else {
            View::Dashboard
        };

        let text = theme.get("text_primary");
        let history_limit = config.search.history_limit;
        let item_form = ItemForm::new(text);

        App {
            events,
            table: TableView::new(
                config.backend.table_page_size,
                config.search.enable_history.then_some("table_search"),
                history_limit,
            ),
            results: TableView::new(
                config.backend.results_page_size,
                config.search.enable_history.then_some("results_search"),
                history_limit,
            ),
            login: LoginForm::new(),
            item_form,
            filter_modal: FilterModal::new(),
            columns_modal: ColumnsModal::new(),
            modal_target: DataTarget::Table,
            error_modal: ErrorModal::new(),
            map_selected: 0,
            status: None,
            training: false,
            predicting: false,
            show_help: false,
            debug: DebugState::default(),
            session: None,
            view,
            cache,
            api,
            auth,
            theme,
            config,
        }
    }

    pub fn enable_debug(&mut self) {
        self.debug.enabled = true;
    }

    pub fn send_event(&mut self, event: AppEvent) -> Result<()> {
        self.events.send(event)?;
        Ok(())
    }

    fn color(&self, name: &str) -> ratatui::style::Color {
        self.theme.get(name)
    }

    fn bands(&self) -> RiskBands {
        RiskBands {
            high: self.config.display.high_risk_threshold,
            warn: self.config.display.warn_threshold,
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(format!(
            "[{}] {}",
            chrono::Local::now().format("%H:%M:%S"),
            message.into()
        ));
    }

    fn target_view_mut(&mut self, target: DataTarget) -> &mut TableView {
        match target {
            DataTarget::Table => &mut self.table,
            DataTarget::Results => &mut self.results,
        }
    }

    fn active_target(&self) -> Option<DataTarget> {
        match self.view {
            View::Database => Some(DataTarget::Table),
            View::Results => Some(DataTarget::Results),
            _ => None,
        }
    }

    /// Handle one application event. May return a follow-up event for the
    /// main loop to enqueue.
    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        self.debug.num_events += 1;

        match event {
            AppEvent::Key(key) => return self.key(key),
            AppEvent::Resize(_, _) => {}
            AppEvent::Exit | AppEvent::Crash(_) => {}

            AppEvent::SignIn { email, password } => {
                self.spawn_auth(email.clone(), password.clone(), false);
            }
            AppEvent::SignUp { email, password } => {
                self.spawn_auth(email.clone(), password.clone(), true);
            }
            AppEvent::AuthFinished(result) => match result {
                Ok(session) => {
                    self.login.busy = false;
                    self.login.error = None;
                    self.login.password.clear();
                    self.set_status(format!("Signed in as {}", session.email));
                    self.session = Some(session.clone());
                    self.view = View::Dashboard;
                }
                Err(message) => {
                    self.login.busy = false;
                    self.login.error = Some(message.clone());
                }
            },

            AppEvent::FetchPage { target, reset } => {
                let decision = self.target_view_mut(*target).pager.begin(*reset);
                if let FetchDecision::Start(request) = decision {
                    self.spawn_fetch(*target, request);
                }
            }
            AppEvent::PageLoaded {
                target,
                request,
                rows,
            } => {
                let applied = self
                    .target_view_mut(*target)
                    .pager
                    .complete(*request, rows.clone());
                if applied {
                    let view = self.target_view_mut(*target);
                    let visible_len = view.visible().len();
                    let all = view.all_columns();
                    let column_count = view.columns.effective(&all).len();
                    view.clamp_cursor(visible_len, column_count);
                }
            }
            AppEvent::PageFailed {
                target,
                request,
                message,
            } => {
                self.target_view_mut(*target).pager.fail(*request);
                self.error_modal.show(message.clone());
            }

            AppEvent::SubmitItem(record) => {
                self.item_form.submitting = true;
                self.spawn_submit(record.clone());
            }
            AppEvent::SubmitFinished(result) => {
                self.item_form.submitting = false;
                match result {
                    Ok(()) => {
                        self.item_form.clear();
                        self.set_status("Item stored");
                        // The stored rows changed; refresh on next visit.
                        return Some(AppEvent::FetchPage {
                            target: DataTarget::Table,
                            reset: true,
                        });
                    }
                    Err(message) => self.error_modal.show(message.clone()),
                }
            }

            AppEvent::TrainModel => {
                if !self.training {
                    self.training = true;
                    self.set_status("Training model...");
                    self.spawn_train();
                }
            }
            AppEvent::TrainFinished(result) => {
                self.training = false;
                match result {
                    Ok(()) => self.set_status("Model training complete"),
                    Err(message) => {
                        self.set_status("Model training failed");
                        self.error_modal.show(message.clone());
                    }
                }
            }

            AppEvent::RunPrediction => {
                if !self.predicting {
                    self.predicting = true;
                    self.set_status("Running bulk prediction...");
                    self.spawn_prediction();
                }
            }
            AppEvent::PredictionFinished(result) => {
                self.predicting = false;
                match result {
                    Ok(count) => {
                        self.set_status(format!("Prediction complete: {} rows", count));
                        self.view = View::Results;
                        return Some(AppEvent::FetchPage {
                            target: DataTarget::Results,
                            reset: true,
                        });
                    }
                    Err(message) => {
                        self.set_status("Prediction failed");
                        self.error_modal.show(message.clone());
                    }
                }
            }
        }
        None
    }

    fn spawn_fetch(&self, target: DataTarget, request: PageRequest) {
        let api = self.api.clone();
        let tx = self.events.clone();
        std::thread::spawn(move || {
            let result = match target {
                DataTarget::Table => api.fetch_table_data(request.skip),
                DataTarget::Results => api.fetch_results(request.skip),
            };
            let event = match result {
                Ok(rows) => AppEvent::PageLoaded {
                    target,
                    request,
                    rows,
                },
                Err(e) => AppEvent::PageFailed {
                    target,
                    request,
                    message: e.to_string(),
                },
            };
            let _ = tx.send(event);
        });
    }

    fn spawn_auth(&mut self, email: String, password: String, sign_up: bool) {
        let Some(auth) = self.auth.clone() else {
            self.login.error = Some("No identity provider configured".to_string());
            return;
        };
        self.login.busy = true;
        self.login.error = None;
        let tx = self.events.clone();
        std::thread::spawn(move || {
            let result = if sign_up {
                auth.sign_up(&email, &password)
            } else {
                auth.sign_in(&email, &password)
            };
            let _ = tx.send(AppEvent::AuthFinished(result.map_err(|e| e.to_string())));
        });
    }

    fn spawn_submit(&self, record: Record) {
        let api = self.api.clone();
        let tx = self.events.clone();
        std::thread::spawn(move || {
            let result = api.submit_input(&record).map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::SubmitFinished(result));
        });
    }

    fn spawn_train(&self) {
        let api = self.api.clone();
        let tx = self.events.clone();
        std::thread::spawn(move || {
            let result = api.train_model().map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::TrainFinished(result));
        });
    }

    fn spawn_prediction(&self) {
        let api = self.api.clone();
        let tx = self.events.clone();
        std::thread::spawn(move || {
            let result = api
                .run_prediction()
                .map(|rows| rows.len())
                .map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::PredictionFinished(result));
        });
    }

    fn sign_out(&mut self) {
        self.session = None;
        self.table.clear();
        self.results.clear();
        self.item_form.clear();
        self.set_status("Signed out");
        if self.auth.is_some() {
            self.view = View::Login;
        }
    }

    fn switch_view(&mut self, view: View) -> Option<AppEvent> {
        self.view = view;
        // Table views load on first entry
        let target = self.active_target()?;
        let pager = &self.target_view_mut(target).pager;
        if pager.is_empty() && !pager.in_flight() && !pager.exhausted() {
            return Some(AppEvent::FetchPage {
                target,
                reset: true,
            });
        }
        None
    }

    fn key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        self.debug.on_key(event);

        if self.error_modal.active {
            if matches!(event.code, KeyCode::Esc | KeyCode::Enter) {
                self.error_modal.hide();
            }
            return None;
        }

        if self.show_help {
            self.show_help = false;
            return None;
        }

        if self.filter_modal.active {
            self.filter_modal_key(event);
            return None;
        }
        if self.columns_modal.active {
            self.columns_modal_key(event);
            return None;
        }

        match self.view {
            View::Login => self.login_key(event),
            View::Dashboard => self.dashboard_key(event),
            View::Database => self.table_key(event, DataTarget::Table),
            View::Results => self.table_key(event, DataTarget::Results),
            View::ItemEntry => self.item_entry_key(event),
            View::StoreMap => self.store_map_key(event),
        }
    }

    fn login_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        if self.login.busy {
            return None;
        }
        match event.code {
            KeyCode::Tab | KeyCode::Down => {
                self.login.focus_next();
                return None;
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.login.focus_previous();
                return None;
            }
            KeyCode::Esc => return Some(AppEvent::Exit),
            _ => {}
        }

        let submit = |login: &LoginForm, sign_up: bool| -> Option<AppEvent> {
            let email = login.email.value().trim().to_string();
            let password = login.password.value().to_string();
            if sign_up {
                Some(AppEvent::SignUp { email, password })
            } else {
                Some(AppEvent::SignIn { email, password })
            }
        };

        match self.login.focus {
            0 => {
                if self.login.email.handle_key(event, None) == TextInputEvent::Submit {
                    self.login.focus_next();
                }
            }
            1 => {
                if self.login.password.handle_key(event, None) == TextInputEvent::Submit {
                    match self.login.validate() {
                        Ok(()) => return submit(&self.login, false),
                        Err(message) => self.login.error = Some(message),
                    }
                }
            }
            LOGIN_SIGN_IN | LOGIN_SIGN_UP => {
                if event.code == KeyCode::Enter {
                    match self.login.validate() {
                        Ok(()) => {
                            return submit(&self.login, self.login.focus == LOGIN_SIGN_UP)
                        }
                        Err(message) => self.login.error = Some(message),
                    }
                }
            }
            _ => {}
        }
        None
    }

    fn dashboard_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        match event.code {
            KeyCode::Char('q') => Some(AppEvent::Exit),
            KeyCode::Char('?') => {
                self.show_help = true;
                None
            }
            KeyCode::Char('d') => self.switch_view(View::Database),
            KeyCode::Char('p') => self.switch_view(View::Results),
            KeyCode::Char('n') => self.switch_view(View::ItemEntry),
            KeyCode::Char('m') => self.switch_view(View::StoreMap),
            KeyCode::Char('t') => Some(AppEvent::TrainModel),
            KeyCode::Char('r') => Some(AppEvent::RunPrediction),
            KeyCode::Char('o') => {
                self.sign_out();
                None
            }
            _ => None,
        }
    }

    fn table_key(&mut self, event: &KeyEvent, target: DataTarget) -> Option<AppEvent> {
        if self.target_view_mut(target).searching {
            return self.search_key(event, target);
        }

        let visible_len = self.target_view_mut(target).visible().len();

        match event.code {
            KeyCode::Char('q') => return Some(AppEvent::Exit),
            KeyCode::Esc => {
                self.view = View::Dashboard;
                return None;
            }
            KeyCode::Char('?') => {
                self.show_help = true;
                return None;
            }

            KeyCode::Down | KeyCode::Char('j') => {
                if self.target_view_mut(target).select_offset(1, visible_len) {
                    return Some(AppEvent::FetchPage {
                        target,
                        reset: false,
                    });
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.target_view_mut(target).select_offset(-1, visible_len);
            }
            KeyCode::PageDown => {
                if self.target_view_mut(target).select_offset(20, visible_len) {
                    return Some(AppEvent::FetchPage {
                        target,
                        reset: false,
                    });
                }
            }
            KeyCode::PageUp => {
                self.target_view_mut(target).select_offset(-20, visible_len);
            }
            KeyCode::Home => {
                if visible_len > 0 {
                    self.target_view_mut(target).table_state.select(Some(0));
                }
            }
            KeyCode::End => {
                if visible_len > 0 {
                    self.target_view_mut(target)
                        .table_state
                        .select(Some(visible_len - 1));
                }
            }

            KeyCode::Left => {
                let view = self.target_view_mut(target);
                view.column_cursor = view.column_cursor.saturating_sub(1);
            }
            KeyCode::Right => {
                let view = self.target_view_mut(target);
                let all = view.all_columns();
                let count = view.columns.effective(&all).len();
                if count > 0 {
                    view.column_cursor = (view.column_cursor + 1).min(count - 1);
                }
            }

            KeyCode::Char('s') => {
                let view = self.target_view_mut(target);
                let all = view.all_columns();
                let effective = view.columns.effective(&all);
                if let Some(column) = effective.get(view.column_cursor) {
                    let column = column.to_string();
                    view.sort.toggle(&column);
                }
            }
            KeyCode::Char('S') => {
                self.target_view_mut(target).sort.clear();
            }

            KeyCode::Char('/') => {
                let view = self.target_view_mut(target);
                view.searching = true;
                view.search_backup = view.filter.query.clone();
                view.search.set_value(view.filter.query.clone());
                view.search.set_focused(true);
            }
            KeyCode::Char('f') => {
                let view = self.target_view_mut(target);
                let columns = view.all_columns();
                let current = view.filter.fields.clone();
                self.modal_target = target;
                self.filter_modal.open(columns, &current);
            }
            KeyCode::Char('c') => {
                let columns = self.target_view_mut(target).all_columns();
                self.modal_target = target;
                self.columns_modal.open(columns);
            }
            KeyCode::Char('x') => {
                let view = self.target_view_mut(target);
                view.filter.clear();
                view.sort.clear();
                view.columns.reset();
            }

            KeyCode::Char('l') => {
                return Some(AppEvent::FetchPage {
                    target,
                    reset: false,
                });
            }
            KeyCode::Char('R') => {
                return Some(AppEvent::FetchPage {
                    target,
                    reset: true,
                });
            }

            _ => {}
        }
        None
    }

    /// Search mode: the free-text query applies live as typed. Esc restores
    /// the query that was active when search opened.
    fn search_key(&mut self, event: &KeyEvent, target: DataTarget) -> Option<AppEvent> {
        let cache = self.cache.clone();
        let view = self.target_view_mut(target);
        match view.search.handle_key(event, Some(&cache)) {
            TextInputEvent::Submit => {
                view.filter.query = view.search.value().to_string();
                view.searching = false;
                view.search.set_focused(false);
            }
            TextInputEvent::Cancel => {
                view.filter.query = std::mem::take(&mut view.search_backup);
                view.searching = false;
                view.search.set_focused(false);
            }
            _ => {
                view.filter.query = view.search.value().to_string();
            }
        }
        let visible_len = view.visible().len();
        let all = view.all_columns();
        let column_count = view.columns.effective(&all).len();
        view.clamp_cursor(visible_len, column_count);
        None
    }

    fn filter_modal_key(&mut self, event: &KeyEvent) {
        let modal = &mut self.filter_modal;
        match event.code {
            KeyCode::Esc => {
                modal.close();
                return;
            }
            KeyCode::Tab => {
                modal.focus = match modal.focus {
                    FilterFocus::Field => FilterFocus::Value,
                    FilterFocus::Value => FilterFocus::Add,
                    FilterFocus::Add => FilterFocus::Statements,
                    FilterFocus::Statements => FilterFocus::Clear,
                    FilterFocus::Clear => FilterFocus::Confirm,
                    FilterFocus::Confirm => FilterFocus::Field,
                };
                if modal.focus == FilterFocus::Statements && !modal.statements.is_empty() {
                    modal.list_state.select(Some(0));
                }
                return;
            }
            _ => {}
        }

        match modal.focus {
            FilterFocus::Field => match event.code {
                KeyCode::Up | KeyCode::Left => modal.previous_field(),
                KeyCode::Down | KeyCode::Right => modal.next_field(),
                KeyCode::Enter => modal.focus = FilterFocus::Value,
                _ => {}
            },
            FilterFocus::Value => match event.code {
                KeyCode::Char(c) => modal.new_value.push(c),
                KeyCode::Backspace => {
                    modal.new_value.pop();
                }
                KeyCode::Enter => modal.add_statement(),
                _ => {}
            },
            FilterFocus::Add => {
                if event.code == KeyCode::Enter {
                    modal.add_statement();
                }
            }
            FilterFocus::Statements => match event.code {
                KeyCode::Up => {
                    let len = modal.statements.len();
                    if len > 0 {
                        let idx = modal.list_state.selected().unwrap_or(0);
                        modal.list_state.select(Some(idx.saturating_sub(1)));
                    }
                }
                KeyCode::Down => {
                    let len = modal.statements.len();
                    if len > 0 {
                        let idx = modal.list_state.selected().unwrap_or(0);
                        modal.list_state.select(Some((idx + 1).min(len - 1)));
                    }
                }
                KeyCode::Char('d') | KeyCode::Delete => modal.remove_selected(),
                _ => {}
            },
            FilterFocus::Clear => {
                if event.code == KeyCode::Enter {
                    modal.clear_statements();
                }
            }
            FilterFocus::Confirm => {
                if event.code == KeyCode::Enter {
                    let statements = modal.statements.clone();
                    modal.close();
                    let target = self.modal_target;
                    let view = self.target_view_mut(target);
                    view.filter.fields = statements;
                    let visible_len = view.visible().len();
                    let all = view.all_columns();
                    let column_count = view.columns.effective(&all).len();
                    view.clamp_cursor(visible_len, column_count);
                }
            }
        }
    }

    fn columns_modal_key(&mut self, event: &KeyEvent) {
        match event.code {
            KeyCode::Esc | KeyCode::Enter => {
                self.columns_modal.close();
                let target = self.modal_target;
                let view = self.target_view_mut(target);
                let all = view.all_columns();
                let count = view.columns.effective(&all).len();
                view.clamp_cursor(view.visible().len(), count);
            }
            KeyCode::Up => self.columns_modal.previous(),
            KeyCode::Down => self.columns_modal.next(),
            KeyCode::Char(' ') => {
                if let Some(column) = self.columns_modal.current().map(str::to_string) {
                    let target = self.modal_target;
                    self.target_view_mut(target).columns.toggle(&column);
                }
            }
            KeyCode::Char('a') => {
                let target = self.modal_target;
                self.target_view_mut(target).columns.reset();
            }
            _ => {}
        }
    }

    fn item_entry_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        if event.code == KeyCode::Char('q') && event.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(AppEvent::Exit);
        }
        match self.item_form.handle_key(event) {
            FormEvent::Submit => Some(AppEvent::SubmitItem(self.item_form.to_record())),
            FormEvent::Cancel => {
                self.view = View::Dashboard;
                None
            }
            FormEvent::None => None,
        }
    }

    fn store_map_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        let store_count = self.config.stores.len();
        match event.code {
            KeyCode::Char('q') => return Some(AppEvent::Exit),
            KeyCode::Esc => self.view = View::Dashboard,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Down | KeyCode::Right => {
                if store_count > 0 {
                    self.map_selected = (self.map_selected + 1) % store_count;
                }
            }
            KeyCode::Up | KeyCode::Left => {
                if store_count > 0 {
                    self.map_selected = (self.map_selected + store_count - 1) % store_count;
                }
            }
            // The map reads from the results pager; allow refreshing it here
            KeyCode::Char('R') => {
                return Some(AppEvent::FetchPage {
                    target: DataTarget::Results,
                    reset: true,
                })
            }
            _ => {}
        }
        None
    }

    // Rendering

    fn render_header(&self, area: Rect, buf: &mut Buffer) {
        let account = match &self.session {
            Some(session) => session.email.clone(),
            None => "not signed in".to_string(),
        };
        let line = format!(
            " overstock | {} | {} | {}",
            self.view.title(),
            account,
            self.api.base_url()
        );
        Paragraph::new(line)
            .style(
                Style::default()
                    .fg(self.color("text_inverse"))
                    .bg(self.color("primary")),
            )
            .render(area, buf);
    }

    fn render_status(&self, area: Rect, buf: &mut Buffer) {
        let mut parts: Vec<String> = Vec::new();
        if self.training {
            parts.push("training".to_string());
        }
        if self.predicting {
            parts.push("predicting".to_string());
        }
        if let Some(ref status) = self.status {
            parts.push(status.clone());
        }
        Paragraph::new(parts.join(" | "))
            .style(Style::default().fg(self.color("text_secondary")))
            .render(area, buf);
    }

    fn render_login(&self, area: Rect, buf: &mut Buffer) {
        let modal = centered_rect(area, 50, 12);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.color("modal_border")))
            .title("Sign In");
        let inner = block.inner(modal);
        block.render(modal, buf);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // email
                Constraint::Length(1), // password
                Constraint::Length(1), // spacer
                Constraint::Length(1), // buttons
                Constraint::Length(1), // spacer
                Constraint::Length(1), // error
                Constraint::Fill(1),
            ])
            .split(inner);

        let label_style = |focused: bool| {
            if focused {
                Style::default()
                    .fg(self.color("primary"))
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.color("text_primary"))
            }
        };

        let email_row = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(11), Constraint::Fill(1)])
            .split(rows[0]);
        Paragraph::new("Email")
            .style(label_style(self.login.focus == 0))
            .render(email_row[0], buf);
        self.login.email.render(email_row[1], buf);

        let password_row = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(11), Constraint::Fill(1)])
            .split(rows[1]);
        Paragraph::new("Password")
            .style(label_style(self.login.focus == 1))
            .render(password_row[0], buf);
        self.login.password.render(password_row[1], buf);

        let buttons = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(14), Constraint::Length(14), Constraint::Fill(1)])
            .split(rows[3]);
        let sign_in = if self.login.busy {
            "[ ... ]"
        } else {
            "[ Sign In ]"
        };
        Paragraph::new(sign_in)
            .style(label_style(self.login.focus == LOGIN_SIGN_IN))
            .render(buttons[0], buf);
        Paragraph::new("[ Sign Up ]")
            .style(label_style(self.login.focus == LOGIN_SIGN_UP))
            .render(buttons[1], buf);

        if let Some(ref error) = self.login.error {
            Paragraph::new(error.as_str())
                .style(Style::default().fg(self.color("error")))
                .render(rows[5], buf);
        }
    }

    fn render_dashboard(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.color("table_border")))
            .title("AI Overstock Liquidation");
        let inner = block.inner(area);
        block.render(area, buf);

        let bands = self.bands();
        let table_rows = self.table.pager.len();
        let results_visible = self.results.visible();
        let stats = TableStats::compute(&results_visible, bands);

        let lines = vec![
            Line::from(""),
            Line::from(format!("  Stored records loaded:   {}", table_rows)),
            Line::from(format!("  Prediction rows loaded:  {}", stats.rows)),
            Line::from(match stats.mean_predicted {
                Some(mean) => format!("  Average predicted sales: {:.2}", mean),
                None => "  Average predicted sales: n/a".to_string(),
            }),
            Line::from(format!(
                "  High-risk items (> {:.0}): {}",
                self.config.display.high_risk_threshold, stats.high_risk
            )),
            Line::from(""),
            Line::from("  d Database   p Predictions   n New item   m Store map"),
            Line::from("  t Train model   r Run prediction   o Sign out   q Quit"),
        ];
        Paragraph::new(lines)
            .style(Style::default().fg(self.color("text_primary")))
            .render(inner, buf);
    }

    fn render_table_view(&mut self, target: DataTarget, area: Rect, buf: &mut Buffer) {
        let bands = self.bands();
        let colors = DataTableColors {
            header: self.color("table_header"),
            border: self.color("table_border"),
            risk_high: self.color("risk_high"),
            risk_moderate: self.color("risk_moderate"),
            text: self.color("text_primary"),
        };
        let title = match target {
            DataTarget::Table => "Stored Records",
            DataTarget::Results => "Predicted Sales",
        };

        let searching = match target {
            DataTarget::Table => self.table.searching,
            DataTarget::Results => self.results.searching,
        };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(if searching {
                vec![
                    Constraint::Length(1),
                    Constraint::Fill(1),
                    Constraint::Length(1),
                ]
            } else {
                vec![Constraint::Fill(1), Constraint::Length(1)]
            })
            .split(area);

        let view = match target {
            DataTarget::Table => &self.table,
            DataTarget::Results => &self.results,
        };

        let (search_area, table_area, stats_area) = if searching {
            (Some(chunks[0]), chunks[1], chunks[2])
        } else {
            (None, chunks[0], chunks[1])
        };

        if let Some(search_area) = search_area {
            let row = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(8), Constraint::Fill(1)])
                .split(search_area);
            Paragraph::new("Search:")
                .style(Style::default().fg(self.color("primary")))
                .render(row[0], buf);
            view.search.render(row[1], buf);
        }

        let all = view.all_columns();
        let effective = view.columns.effective(&all);
        let visible = view.visible();
        let stats = TableStats::compute(&visible, bands);

        let datatable = DataTable {
            title,
            columns: &effective,
            rows: &visible,
            sort: &view.sort,
            column_cursor: view.column_cursor,
            bands,
            colors,
            loading: view.pager.in_flight(),
        };
        let mut table_state = view.table_state.clone();
        datatable.render(table_area, buf, &mut table_state);

        let mut footer = stats.summary();
        if view.pager.exhausted() {
            footer.push_str(" | end of data");
        }
        if view.filter.is_active() {
            footer.push_str(" | filtered");
        }
        Paragraph::new(footer)
            .style(Style::default().fg(self.color("text_secondary")))
            .render(stats_area, buf);

        match target {
            DataTarget::Table => self.table.table_state = table_state,
            DataTarget::Results => self.results.table_state = table_state,
        }
    }

    fn render_store_map(&self, area: Rect, buf: &mut Buffer) {
        let risks = store_risks(&self.config.stores, self.results.pager.rows(), self.bands());
        let map = StoreMap {
            risks: &risks,
            selected: self.map_selected,
            colors: StoreMapColors {
                border: self.color("table_border"),
                land: self.color("dimmed"),
                dimmed: self.color("text_secondary"),
                risk_high: self.color("risk_high"),
                risk_moderate: self.color("risk_moderate"),
                risk_low: self.color("risk_low"),
                risk_none: self.color("risk_none"),
            },
        };
        map.render(area, buf);
    }

    fn render_filter_modal(&mut self, area: Rect, buf: &mut Buffer) {
        let modal_area = centered_rect(area, 60, 18);
        Clear.render(modal_area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.color("modal_border_active")))
            .title("Filter (Tab moves, Enter acts, Esc closes)");
        let inner = block.inner(modal_area);
        block.render(modal_area, buf);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // field
                Constraint::Length(1), // value
                Constraint::Length(1), // add
                Constraint::Fill(1),   // statements
                Constraint::Length(1), // clear / confirm
            ])
            .split(inner);

        let modal = &self.filter_modal;
        let focus_style = Style::default()
            .fg(self.color("primary"))
            .add_modifier(Modifier::BOLD);
        let normal_style = Style::default().fg(self.color("text_primary"));
        let style_for = |focus: FilterFocus| {
            if modal.focus == focus {
                focus_style
            } else {
                normal_style
            }
        };

        let field = modal
            .available_columns
            .get(modal.new_field_idx)
            .map(String::as_str)
            .unwrap_or("-");
        Paragraph::new(format!("Field:  < {} >", field))
            .style(style_for(FilterFocus::Field))
            .render(rows[0], buf);
        Paragraph::new(format!("Equals: {}", modal.new_value))
            .style(style_for(FilterFocus::Value))
            .render(rows[1], buf);
        Paragraph::new("[ Add constraint ]")
            .style(style_for(FilterFocus::Add))
            .render(rows[2], buf);

        let actions = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(12), Constraint::Length(12), Constraint::Fill(1)])
            .split(rows[4]);
        Paragraph::new("[ Clear ]")
            .style(style_for(FilterFocus::Clear))
            .render(actions[0], buf);
        Paragraph::new("[ Apply ]")
            .style(style_for(FilterFocus::Confirm))
            .render(actions[1], buf);

        let items: Vec<ListItem> = modal
            .statements
            .iter()
            .map(|s| ListItem::new(format!("{} == {}", s.field, s.value)))
            .collect();
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Constraints")
                    .border_style(style_for(FilterFocus::Statements)),
            )
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut list_state = modal.list_state.clone();
        StatefulWidget::render(list, rows[3], buf, &mut list_state);
        self.filter_modal.list_state = list_state;
    }

    fn render_columns_modal(&mut self, area: Rect, buf: &mut Buffer) {
        let modal_area = centered_rect(area, 44, 16);
        Clear.render(modal_area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.color("modal_border_active")))
            .title("Columns (Space toggles, a shows all)");
        let inner = block.inner(modal_area);
        block.render(modal_area, buf);

        let selection = match self.modal_target {
            DataTarget::Table => &self.table.columns,
            DataTarget::Results => &self.results.columns,
        };
        let items: Vec<ListItem> = self
            .columns_modal
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let mark = if selection.is_visible(column) { "x" } else { " " };
                let mut style = Style::default().fg(self.color("text_primary"));
                if idx == self.columns_modal.cursor {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                ListItem::new(format!("[{}] {}", mark, column)).style(style)
            })
            .collect();
        Widget::render(List::new(items), inner, buf);
    }

    fn render_error_modal(&self, area: Rect, buf: &mut Buffer) {
        let modal_area = centered_rect(area, 54, 8);
        Clear.render(modal_area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.color("modal_border_error")))
            .title("Error");
        let inner = block.inner(modal_area);
        block.render(modal_area, buf);
        Paragraph::new(self.error_modal.message.as_str())
            .wrap(ratatui::widgets::Wrap { trim: true })
            .style(Style::default().fg(self.color("text_primary")))
            .render(inner, buf);
    }

    fn render_help(&self, area: Rect, buf: &mut Buffer) {
        let modal_area = centered_rect(area, 58, 18);
        Clear.render(modal_area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.color("modal_border")))
            .title("Help (any key closes)");
        let inner = block.inner(modal_area);
        block.render(modal_area, buf);

        let lines = vec![
            Line::from("Dashboard"),
            Line::from("  d database  p predictions  n new item  m store map"),
            Line::from("  t train model  r run prediction  o sign out"),
            Line::from(""),
            Line::from("Tables"),
            Line::from("  Up/Down/PgUp/PgDn scroll, more rows load near the end"),
            Line::from("  Left/Right pick column  s sort (again flips)  S clear sort"),
            Line::from("  / search  f equality filters  c columns  x reset view"),
            Line::from("  l load more  R refresh from the top  Esc back"),
            Line::from(""),
            Line::from("  q quits from any table or the dashboard"),
        ];
        Paragraph::new(lines)
            .style(Style::default().fg(self.color("text_primary")))
            .render(inner, buf);
    }

    fn controls_entries(&self) -> &'static [(&'static str, &'static str)] {
        match self.view {
            View::Login => &[("Tab", "Next"), ("Enter", "Submit"), ("Esc", "Quit")],
            View::Dashboard => &[
                ("d", "Database"),
                ("p", "Predictions"),
                ("n", "New"),
                ("m", "Map"),
                ("t", "Train"),
                ("r", "Predict"),
                ("q", "Quit"),
            ],
            View::Database | View::Results => &[
                ("/", "Search"),
                ("f", "Filter"),
                ("s", "Sort"),
                ("c", "Columns"),
                ("R", "Refresh"),
                ("?", "Help"),
                ("q", "Quit"),
            ],
            View::ItemEntry => &[("Tab", "Next"), ("Enter", "Submit"), ("Esc", "Back")],
            View::StoreMap => &[("Up/Dn", "Store"), ("R", "Refresh"), ("Esc", "Back")],
        }
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.debug.num_frames += 1;
        if let Some(target) = self.active_target() {
            let view = match target {
                DataTarget::Table => &self.table,
                DataTarget::Results => &self.results,
            };
            self.debug.pager = Some((
                view.pager.skip(),
                view.pager.generation(),
                view.pager.in_flight(),
                view.pager.exhausted(),
            ));
        } else {
            self.debug.pager = None;
        }

        let mut constraints = vec![
            Constraint::Length(1), // header
            Constraint::Fill(1),   // content
            Constraint::Length(1), // status
            Constraint::Length(1), // controls
        ];
        if self.debug.enabled {
            constraints.push(Constraint::Length(1));
        }
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        self.render_header(layout[0], buf);

        match self.view {
            View::Login => self.render_login(layout[1], buf),
            View::Dashboard => self.render_dashboard(layout[1], buf),
            View::Database => self.render_table_view(DataTarget::Table, layout[1], buf),
            View::Results => self.render_table_view(DataTarget::Results, layout[1], buf),
            View::ItemEntry => {
                let widget = ItemFormWidget {
                    form: &self.item_form,
                    colors: ItemFormColors {
                        border: self.color("table_border"),
                        label: self.color("text_primary"),
                        focus: self.color("primary"),
                        error: self.color("error"),
                        dimmed: self.color("text_secondary"),
                    },
                };
                widget.render(layout[1], buf);
            }
            View::StoreMap => self.render_store_map(layout[1], buf),
        }

        self.render_status(layout[2], buf);

        let controls = {
            let mut controls =
                Controls::new(self.controls_entries()).with_bg(self.color("controls_bg"));
            if let Some(target) = self.active_target() {
                let view = match target {
                    DataTarget::Table => &self.table,
                    DataTarget::Results => &self.results,
                };
                controls = controls.with_row_count(view.visible().len(), view.pager.len());
            }
            controls.with_dimmed(self.error_modal.active)
        };
        (&controls).render(layout[3], buf);

        if self.debug.enabled {
            self.debug.render(layout[4], buf);
        }

        if self.filter_modal.active {
            self.render_filter_modal(layout[1], buf);
        }
        if self.columns_modal.active {
            self.render_columns_modal(layout[1], buf);
        }
        if self.show_help {
            self.render_help(layout[1], buf);
        }
        if self.error_modal.active {
            self.render_error_modal(layout[1], buf);
        }
    }
}

/// A centered rect of at most `width` x `height` within `area`
fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use serde_json::json;
    use std::sync::mpsc::channel;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn page(n: usize, offset: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                record(json!({
                    "item_id": format!("ITEM_{:04}", offset + i),
                    "store_id": if (offset + i) % 2 == 0 { "CA_3" } else { "TX_1" },
                    "predicted_sales": (offset + i) as f64,
                }))
            })
            .collect()
    }

    fn app() -> (App, std::sync::mpsc::Receiver<AppEvent>) {
        let (tx, rx) = channel();
        (App::new(tx), rx)
    }

    /// Feed a loaded page directly, as the worker thread would.
    fn load_page(app: &mut App, target: DataTarget, rows: Vec<Record>) {
        let request = PageRequest {
            skip: match target {
                DataTarget::Table => app.table.pager.skip(),
                DataTarget::Results => app.results.pager.skip(),
            },
            generation: match target {
                DataTarget::Table => app.table.pager.generation(),
                DataTarget::Results => app.results.pager.generation(),
            },
            reset: false,
        };
        app.event(&AppEvent::PageLoaded {
            target,
            request,
            rows,
        });
    }

    #[test]
    fn test_starts_on_dashboard_without_auth_config() {
        let (app, _rx) = app();
        assert_eq!(app.view, View::Dashboard);
        assert!(app.session.is_none());
    }

    #[test]
    fn test_starts_on_login_when_auth_configured() {
        let (tx, _rx) = channel();
        let mut config = AppConfig::default();
        config.auth.api_key = Some("test-key".to_string());
        let theme = Theme::from_config(&config.theme).unwrap();
        let app = App::new_with_config(tx, theme, config);
        assert_eq!(app.view, View::Login);
    }

    #[test]
    fn test_dashboard_navigation_triggers_initial_fetch() {
        let (mut app, _rx) = app();
        let follow_up = app.event(&key(KeyCode::Char('d')));
        assert_eq!(app.view, View::Database);
        match follow_up {
            Some(AppEvent::FetchPage {
                target: DataTarget::Table,
                reset: true,
            }) => {}
            other => panic!("expected reset fetch, got {:?}", other),
        }
    }

    #[test]
    fn test_no_refetch_when_rows_already_loaded() {
        let (mut app, _rx) = app();
        load_page(&mut app, DataTarget::Table, page(50, 0));
        let follow_up = app.event(&key(KeyCode::Char('d')));
        assert!(follow_up.is_none());
        assert_eq!(app.table.pager.len(), 50);
    }

    #[test]
    fn test_page_loaded_selects_first_row() {
        let (mut app, _rx) = app();
        load_page(&mut app, DataTarget::Table, page(3, 0));
        assert_eq!(app.table.table_state.selected(), Some(0));
    }

    #[test]
    fn test_page_failed_shows_error_and_keeps_rows() {
        let (mut app, _rx) = app();
        load_page(&mut app, DataTarget::Table, page(50, 0));

        let request = PageRequest {
            skip: app.table.pager.skip(),
            generation: app.table.pager.generation(),
            reset: false,
        };
        app.event(&AppEvent::PageFailed {
            target: DataTarget::Table,
            request,
            message: "Server not reachable: connection refused".to_string(),
        });
        assert!(app.error_modal.active);
        assert_eq!(app.table.pager.len(), 50);
        assert_eq!(app.table.pager.skip(), 50);

        // Esc dismisses the modal without losing anything.
        app.event(&key(KeyCode::Esc));
        assert!(!app.error_modal.active);
        assert_eq!(app.table.pager.len(), 50);
    }

    #[test]
    fn test_stale_page_after_clear_is_discarded() {
        let (mut app, _rx) = app();
        let request = PageRequest {
            skip: 0,
            generation: app.table.pager.generation(),
            reset: false,
        };
        app.table.pager.clear(); // bumps the generation
        app.event(&AppEvent::PageLoaded {
            target: DataTarget::Table,
            request,
            rows: page(50, 0),
        });
        assert!(app.table.pager.is_empty());
    }

    #[test]
    fn test_scrolling_near_end_requests_next_page() {
        let (mut app, _rx) = app();
        app.view = View::Database;
        load_page(&mut app, DataTarget::Table, page(50, 0));

        let follow_up = app.event(&key(KeyCode::End));
        assert!(follow_up.is_none());
        let follow_up = app.event(&key(KeyCode::Down));
        match follow_up {
            Some(AppEvent::FetchPage {
                target: DataTarget::Table,
                reset: false,
            }) => {}
            other => panic!("expected load-more, got {:?}", other),
        }
    }

    #[test]
    fn test_exhausted_stream_stops_requesting() {
        let (mut app, _rx) = app();
        app.view = View::Database;
        load_page(&mut app, DataTarget::Table, page(10, 0)); // short page
        assert!(app.table.pager.exhausted());

        app.event(&key(KeyCode::End));
        let follow_up = app.event(&key(KeyCode::Down));
        assert!(follow_up.is_none());
    }

    #[test]
    fn test_sort_key_toggles_on_cursor_column() {
        let (mut app, _rx) = app();
        app.view = View::Database;
        load_page(&mut app, DataTarget::Table, page(10, 0));

        app.event(&key(KeyCode::Right)); // cursor to store_id
        app.event(&key(KeyCode::Char('s')));
        assert_eq!(
            app.table.sort.direction_for("store_id"),
            Some(sort::SortDirection::Ascending)
        );
        app.event(&key(KeyCode::Char('s')));
        assert_eq!(
            app.table.sort.direction_for("store_id"),
            Some(sort::SortDirection::Descending)
        );
        app.event(&key(KeyCode::Char('S')));
        assert_eq!(app.table.sort.direction_for("store_id"), None);
    }

    #[test]
    fn test_search_filters_live_and_esc_restores() {
        let (mut app, _rx) = app();
        app.view = View::Database;
        load_page(&mut app, DataTarget::Table, page(10, 0));

        app.event(&key(KeyCode::Char('/')));
        assert!(app.table.searching);
        app.event(&key(KeyCode::Char('t')));
        app.event(&key(KeyCode::Char('x')));
        assert_eq!(app.table.filter.query, "tx");
        assert_eq!(app.table.visible().len(), 5);

        app.event(&key(KeyCode::Esc));
        assert!(!app.table.searching);
        assert_eq!(app.table.filter.query, "");
        assert_eq!(app.table.visible().len(), 10);
    }

    #[test]
    fn test_filter_modal_applies_on_confirm() {
        let (mut app, _rx) = app();
        app.view = View::Database;
        load_page(&mut app, DataTarget::Table, page(10, 0));

        app.event(&key(KeyCode::Char('f')));
        assert!(app.filter_modal.active);
        // field cursor starts on item_id; move to store_id
        app.event(&key(KeyCode::Down));
        app.event(&key(KeyCode::Tab)); // to value
        app.event(&key(KeyCode::Char('C')));
        app.event(&key(KeyCode::Char('A')));
        app.event(&key(KeyCode::Char('_')));
        app.event(&key(KeyCode::Char('3')));
        app.event(&key(KeyCode::Enter)); // add, focus returns to the field picker
        for _ in 0..5 {
            app.event(&key(KeyCode::Tab)); // value -> add -> statements -> clear -> confirm
        }
        app.event(&key(KeyCode::Enter));

        assert!(!app.filter_modal.active);
        assert_eq!(app.table.filter.fields.len(), 1);
        assert_eq!(app.table.visible().len(), 5);
    }

    #[test]
    fn test_columns_modal_narrows_and_restores() {
        let (mut app, _rx) = app();
        app.view = View::Database;
        load_page(&mut app, DataTarget::Table, page(5, 0));

        app.event(&key(KeyCode::Char('c')));
        app.event(&key(KeyCode::Char(' '))); // keep only item_id
        app.event(&key(KeyCode::Esc));
        let all = app.table.all_columns();
        assert_eq!(app.table.columns.effective(&all), vec!["item_id"]);

        app.event(&key(KeyCode::Char('c')));
        app.event(&key(KeyCode::Char('a')));
        app.event(&key(KeyCode::Esc));
        assert_eq!(app.table.columns.effective(&all).len(), 3);
    }

    #[test]
    fn test_column_cursor_clamps_to_visible_columns() {
        let (mut app, _rx) = app();
        app.view = View::Database;
        load_page(&mut app, DataTarget::Table, page(10, 0));

        app.event(&key(KeyCode::Right));
        app.event(&key(KeyCode::Right)); // cursor on predicted_sales
        app.table.columns.toggle("item_id"); // narrow to a single column

        // The next page arrival re-clamps against the visible columns, so
        // the sort key lands on a column that is actually rendered.
        load_page(&mut app, DataTarget::Table, page(10, 10));
        assert_eq!(app.table.column_cursor, 0);
        app.event(&key(KeyCode::Char('s')));
        assert_eq!(
            app.table.sort.direction_for("item_id"),
            Some(sort::SortDirection::Ascending)
        );
    }

    #[test]
    fn test_auth_success_moves_to_dashboard() {
        let (tx, _rx) = channel();
        let mut config = AppConfig::default();
        config.auth.api_key = Some("test-key".to_string());
        let theme = Theme::from_config(&config.theme).unwrap();
        let mut app = App::new_with_config(tx, theme, config);

        let session = AuthSession {
            email: "a@example.com".to_string(),
            user_id: "u1".to_string(),
            id_token: "tok".to_string(),
            refresh_token: "ref".to_string(),
            expires_at: chrono::Utc::now(),
        };
        app.event(&AppEvent::AuthFinished(Ok(session)));
        assert_eq!(app.view, View::Dashboard);
        assert!(app.session.is_some());

        app.event(&key(KeyCode::Char('o')));
        assert_eq!(app.view, View::Login);
        assert!(app.session.is_none());
        assert!(app.table.pager.is_empty());
    }

    #[test]
    fn test_auth_failure_stays_on_login_with_message() {
        let (tx, _rx) = channel();
        let mut config = AppConfig::default();
        config.auth.api_key = Some("test-key".to_string());
        let theme = Theme::from_config(&config.theme).unwrap();
        let mut app = App::new_with_config(tx, theme, config);

        app.event(&AppEvent::AuthFinished(Err(
            "Incorrect email or password".to_string()
        )));
        assert_eq!(app.view, View::Login);
        assert_eq!(app.login.error.as_deref(), Some("Incorrect email or password"));
        assert!(!app.login.busy);
    }

    #[test]
    fn test_submit_success_refreshes_table() {
        let (mut app, _rx) = app();
        app.view = View::ItemEntry;
        app.item_form.submitting = true;
        let follow_up = app.event(&AppEvent::SubmitFinished(Ok(())));
        assert!(!app.item_form.submitting);
        match follow_up {
            Some(AppEvent::FetchPage {
                target: DataTarget::Table,
                reset: true,
            }) => {}
            other => panic!("expected table refresh, got {:?}", other),
        }
    }

    #[test]
    fn test_prediction_finished_switches_to_results() {
        let (mut app, _rx) = app();
        app.predicting = true;
        let follow_up = app.event(&AppEvent::PredictionFinished(Ok(123)));
        assert!(!app.predicting);
        assert_eq!(app.view, View::Results);
        match follow_up {
            Some(AppEvent::FetchPage {
                target: DataTarget::Results,
                reset: true,
            }) => {}
            other => panic!("expected results refresh, got {:?}", other),
        }
    }

    #[test]
    fn test_train_finished_failure_shows_error() {
        let (mut app, _rx) = app();
        app.training = true;
        app.event(&AppEvent::TrainFinished(Err("No data found".to_string())));
        assert!(!app.training);
        assert!(app.error_modal.active);
        assert_eq!(app.error_modal.message, "No data found");
    }

    #[test]
    fn test_quit_from_dashboard() {
        let (mut app, _rx) = app();
        let follow_up = app.event(&key(KeyCode::Char('q')));
        assert!(matches!(follow_up, Some(AppEvent::Exit)));
    }
}
