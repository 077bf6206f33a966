mod runtime;
mod settings_view;

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local, Utc};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use qwatch_core::auto_reload::PollTab;
use qwatch_core::commands::Command;
use qwatch_core::gateway::{DataGateway, FetchRequest, Resource};
use qwatch_core::local_store::FileLocalStore;
use qwatch_core::records::QueryRecord;
use qwatch_core::session::{ApplyOutcome, DashboardSession};
use qwatch_core::tabs::TopTab;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Row, Table, TableState, Tabs};
use ratatui::{Frame, Terminal};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub use runtime::{FetchDispatcher, RuntimeEvent, TokioReloadTimer, EVENT_CHANNEL_CAPACITY};
use settings_view::{datasource_fields, display_value, parse_input, set_field, SettingField};

const TICK_RATE: Duration = Duration::from_millis(120);
const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug)]
pub struct RunOptions<G: ?Sized> {
    pub gateway: Arc<G>,
    pub store: FileLocalStore,
    pub servers: String,
    pub reload_period: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectionKey {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Msg {
    Quit,
    Escape,
    ToggleHelp,
    Key(char),
    CycleSubTab { forward: bool },
    Navigate(DirectionKey),
    Submit,
    SaveSettings,
    EditServers,
    Input(char),
    Backspace,
    Tick,
}

#[derive(Debug, Clone, PartialEq)]
enum Mode {
    Normal,
    EditServers {
        buffer: String,
    },
    EditSetting {
        datasource: String,
        field: SettingField,
        buffer: String,
    },
}

impl Mode {
    fn is_editing(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

#[derive(Debug)]
struct TuiApp {
    session: DashboardSession<TokioReloadTimer>,
    store: FileLocalStore,
    mode: Mode,
    show_help: bool,
    should_quit: bool,
    status_line: String,
    record_cursor: usize,
    setting_cursor: usize,
    spinner: usize,
}

impl TuiApp {
    fn new(session: DashboardSession<TokioReloadTimer>, store: FileLocalStore) -> Self {
        Self {
            session,
            store,
            mode: Mode::Normal,
            show_help: false,
            should_quit: false,
            status_line: "Loading...".to_string(),
            record_cursor: 0,
            setting_cursor: 0,
            spinner: 0,
        }
    }

    fn start(&mut self) -> Vec<FetchRequest> {
        self.session.initial_requests()
    }

    fn handle(&mut self, msg: Msg) -> Vec<FetchRequest> {
        match msg {
            Msg::Quit => {
                self.should_quit = true;
                Vec::new()
            }
            Msg::Escape => {
                if self.mode.is_editing() {
                    self.mode = Mode::Normal;
                    self.status_line = "Edit cancelled".to_string();
                } else if self.show_help {
                    self.show_help = false;
                } else {
                    self.should_quit = true;
                }
                Vec::new()
            }
            Msg::ToggleHelp => {
                self.show_help = !self.show_help;
                Vec::new()
            }
            Msg::Key(key) => self.run_command_key(key),
            Msg::CycleSubTab { forward } => {
                if let Some(name) = self.session.cycle_sub_tab(forward) {
                    self.status_line = format!("Datasource `{name}`");
                }
                self.reset_cursors();
                Vec::new()
            }
            Msg::Navigate(direction) => {
                self.navigate(direction);
                Vec::new()
            }
            Msg::Submit => self.submit(),
            Msg::SaveSettings => self.save_settings(),
            Msg::EditServers => {
                self.mode = Mode::EditServers {
                    buffer: self.session.servers().to_string(),
                };
                self.status_line = "Edit servers, Enter to apply".to_string();
                Vec::new()
            }
            Msg::Input(ch) => {
                if let Some(buffer) = self.edit_buffer() {
                    buffer.push(ch);
                }
                Vec::new()
            }
            Msg::Backspace => {
                if let Some(buffer) = self.edit_buffer() {
                    buffer.pop();
                }
                Vec::new()
            }
            Msg::Tick => {
                if self.session.is_busy() {
                    self.spinner = self.spinner.wrapping_add(1);
                }
                Vec::new()
            }
        }
    }

    fn on_runtime_event(&mut self, event: RuntimeEvent) -> Vec<FetchRequest> {
        match event {
            RuntimeEvent::Fetched(completion) => {
                let resource = completion.resource;
                match self.session.complete(completion) {
                    ApplyOutcome::Applied => {
                        self.status_line = format!("Loaded {resource}");
                        self.clamp_cursors();
                    }
                    ApplyOutcome::Stale => {}
                    ApplyOutcome::Failed(error) => {
                        self.status_line = format!("Loading {resource} failed: {error}");
                    }
                }
                Vec::new()
            }
            RuntimeEvent::ReloadDue(tab) => self.session.on_reload_due(tab).into_iter().collect(),
        }
    }

    fn run_command_key(&mut self, key: char) -> Vec<FetchRequest> {
        let Some(command) = self.session.commands().resolve(key).cloned() else {
            return Vec::new();
        };

        let request = self.session.dispatch(&command);
        match &command {
            Command::SelectTopTab(_) | Command::SelectDatasource(_) => self.reset_cursors(),
            Command::ToggleAutoReload => {
                let active = self.session.tabs().active_top_tab();
                self.status_line = match PollTab::from_top_tab(active) {
                    Some(tab) if self.session.is_auto_reloading(tab) => {
                        format!("Auto reload on for {}", active.title())
                    }
                    Some(_) => format!("Auto reload off for {}", active.title()),
                    None => "Auto reload is not available here".to_string(),
                };
            }
            Command::ReloadActiveTab => {}
        }
        request.into_iter().collect()
    }

    fn submit(&mut self) -> Vec<FetchRequest> {
        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Normal => {
                self.begin_setting_edit();
                Vec::new()
            }
            Mode::EditServers { buffer } => self.apply_servers(&buffer),
            Mode::EditSetting {
                datasource,
                field,
                buffer,
            } => {
                let value = parse_input(&buffer);
                if set_field(
                    self.session.settings_mut(),
                    &field.host,
                    &datasource,
                    &field.name,
                    value,
                ) {
                    self.status_line = format!("Edited {}, press s to save", field.name);
                } else {
                    self.status_line = format!("Setting {} no longer exists", field.name);
                }
                Vec::new()
            }
        }
    }

    fn begin_setting_edit(&mut self) {
        if self.session.tabs().active_top_tab() != TopTab::Setting {
            return;
        }
        let Some(datasource) = self.session.tabs().active_sub_tab().map(str::to_string) else {
            return;
        };
        let Some(field) = self.setting_fields().into_iter().nth(self.setting_cursor) else {
            return;
        };

        self.status_line = format!("Edit {} on {}, Enter to apply", field.name, field.host);
        self.mode = Mode::EditSetting {
            buffer: display_value(&field.value),
            datasource,
            field,
        };
    }

    fn apply_servers(&mut self, buffer: &str) -> Vec<FetchRequest> {
        let servers = buffer.trim();
        if let Err(error) = self.session.set_servers(Some(servers), &mut self.store) {
            warn!(%error, "failed to persist servers");
            self.status_line = format!("Servers applied (save failed: {error})");
        } else {
            info!(servers, "servers updated");
            self.status_line = if servers.is_empty() {
                "Servers cleared".to_string()
            } else {
                format!("Servers: {servers}")
            };
        }
        vec![self.session.reload_active_tab()]
    }

    fn save_settings(&mut self) -> Vec<FetchRequest> {
        if self.session.tabs().active_top_tab() != TopTab::Setting {
            self.status_line = "Open the settings tab to save".to_string();
            return Vec::new();
        }
        self.status_line = "Saving settings...".to_string();
        vec![self.session.save_settings()]
    }

    fn navigate(&mut self, direction: DirectionKey) {
        let (cursor, len) = match self.session.tabs().active_top_tab() {
            TopTab::Setting => {
                let len = self.setting_fields().len();
                (&mut self.setting_cursor, len)
            }
            TopTab::History | TopTab::Running => {
                let len = self.session.active_records().map_or(0, <[QueryRecord]>::len);
                (&mut self.record_cursor, len)
            }
        };
        if len == 0 {
            return;
        }

        *cursor = match direction {
            DirectionKey::Up => cursor.saturating_sub(1),
            DirectionKey::Down => (*cursor + 1).min(len - 1),
        };
    }

    fn edit_buffer(&mut self) -> Option<&mut String> {
        match &mut self.mode {
            Mode::Normal => None,
            Mode::EditServers { buffer } | Mode::EditSetting { buffer, .. } => Some(buffer),
        }
    }

    fn setting_fields(&self) -> Vec<SettingField> {
        self.session
            .tabs()
            .sub_tabs(TopTab::Setting)
            .active()
            .map(|datasource| datasource_fields(self.session.settings(), datasource))
            .unwrap_or_default()
    }

    fn reset_cursors(&mut self) {
        self.record_cursor = 0;
        self.setting_cursor = 0;
    }

    fn clamp_cursors(&mut self) {
        let records = self.session.active_records().map_or(0, <[QueryRecord]>::len);
        self.record_cursor = self.record_cursor.min(records.saturating_sub(1));
        let fields = self.setting_fields().len();
        self.setting_cursor = self.setting_cursor.min(fields.saturating_sub(1));
    }

    fn is_editing(&self) -> bool {
        self.mode.is_editing()
    }
}

pub async fn run<G>(options: RunOptions<G>) -> Result<(), TuiError>
where
    G: DataGateway + ?Sized + 'static,
{
    let mut terminal = setup_terminal()?;
    let run_result = run_loop(&mut terminal, options).await;
    let restore_result = restore_terminal(&mut terminal);

    if let Err(error) = run_result {
        restore_result?;
        return Err(error);
    }

    restore_result?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), TuiError> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_loop<G>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    options: RunOptions<G>,
) -> Result<(), TuiError>
where
    G: DataGateway + ?Sized + 'static,
{
    let (events, mut incoming) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let dispatcher = FetchDispatcher::new(options.gateway, events.clone());
    let session = DashboardSession::new(
        TokioReloadTimer::new(events),
        options.reload_period,
        options.servers,
    );
    let mut app = TuiApp::new(session, options.store);
    dispatcher.dispatch_all(app.start());

    let mut ticker = tokio::time::interval(TICK_RATE);
    loop {
        terminal.draw(|frame| render(frame, &app))?;

        tokio::select! {
            _ = ticker.tick() => {
                dispatcher.dispatch_all(app.handle(Msg::Tick));
            }
            Some(event) = incoming.recv() => {
                dispatcher.dispatch_all(app.on_runtime_event(event));
            }
        }

        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(message) = map_key_event(key, app.is_editing()) {
                        dispatcher.dispatch_all(app.handle(message));
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn render(frame: &mut Frame<'_>, app: &TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(4),
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_sub_tabs(frame, app, chunks[1]);
    match app.session.tabs().active_top_tab() {
        TopTab::History | TopTab::Running => render_records(frame, app, chunks[2]),
        TopTab::Setting => render_settings(frame, app, chunks[2]),
    }
    render_footer(frame, app, chunks[3]);

    if app.show_help {
        render_help_popup(frame, app);
    }
}

fn render_header(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let session = &app.session;
    let titles = TopTab::ALL.iter().map(|tab| {
        match session.commands().key_for(&Command::SelectTopTab(*tab)) {
            Some(key) => format!("{} ({key})", tab.title()),
            None => tab.title().to_string(),
        }
    });
    let selected = TopTab::ALL
        .iter()
        .position(|tab| *tab == session.tabs().active_top_tab())
        .unwrap_or_default();

    let busy = if session.is_busy() {
        SPINNER_FRAMES[app.spinner % SPINNER_FRAMES.len()]
    } else {
        " "
    };
    let servers = if session.servers().is_empty() {
        "all servers"
    } else {
        session.servers()
    };
    let title = Line::from(vec![
        Span::styled(
            " qwatch ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("{busy} | {servers} ")),
    ]);

    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(tabs, area);
}

fn render_sub_tabs(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let session = &app.session;
    let sub_tabs = session.tabs().sub_tabs(session.tabs().active_top_tab());
    let titles = sub_tabs
        .names()
        .map(|name| {
            match session
                .commands()
                .key_for(&Command::SelectDatasource(name.to_string()))
            {
                Some(key) => format!("{key}:{name}"),
                None => name.to_string(),
            }
        })
        .collect::<Vec<_>>();
    let selected = sub_tabs
        .names()
        .position(|name| sub_tabs.is_active(name))
        .unwrap_or_default();

    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .block(Block::default().borders(Borders::ALL).title("Datasources"));
    frame.render_widget(tabs, area);
}

fn render_records(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(app.session.tabs().active_top_tab().title());

    let records = app.session.active_records().unwrap_or_default();
    if records.is_empty() {
        let text = if app.session.tabs().is_initialized() {
            "No queries recorded"
        } else {
            "Waiting for the first load"
        };
        frame.render_widget(Paragraph::new(text).block(block), area);
        return;
    }

    let rows = records.iter().map(|record| {
        let style = if record.is_error() {
            Style::default().fg(Color::Red)
        } else {
            Style::default()
        };
        let sql = match (record.sql(), record.error_message()) {
            (Some(sql), Some(message)) => format!("{sql}  [{message}]"),
            (Some(sql), None) => sql.to_string(),
            (None, message) => message.unwrap_or_default().to_string(),
        };
        Row::new(vec![
            format_record_time(record.time),
            record
                .elapsed_ms()
                .map(|elapsed| format!("{elapsed} ms"))
                .unwrap_or_default(),
            record.host().unwrap_or_default().to_string(),
            sql,
        ])
        .style(style)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(23),
            Constraint::Length(10),
            Constraint::Length(18),
            Constraint::Min(20),
        ],
    )
    .header(
        Row::new(vec!["Time", "Elapsed", "Host", "SQL"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
    .block(block);

    let mut state = TableState::default().with_selected(Some(app.record_cursor));
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_settings(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let fields = app.setting_fields();
    let mut lines = Vec::with_capacity(fields.len().max(1));

    for (index, field) in fields.iter().enumerate() {
        let marker = if index == app.setting_cursor { ">" } else { " " };
        let value = match &app.mode {
            Mode::EditSetting {
                field: editing,
                buffer,
                ..
            } if editing == field => format!("{buffer}_"),
            _ => display_value(&field.value),
        };
        lines.push(Line::from(format!(
            "{marker} {} {} = {value}",
            field.host, field.name
        )));
    }

    if lines.is_empty() {
        lines.push(Line::from("No settings for this datasource"));
    }

    let settings = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Settings (Enter: edit, s: save)"),
    );
    frame.render_widget(settings, area);
}

fn render_footer(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let session = &app.session;
    let active = session.tabs().active_top_tab();
    let updated = session
        .last_updated(Resource::for_tab(active))
        .map_or_else(|| "never".to_string(), format_system_time);
    let auto_reload = match PollTab::from_top_tab(active) {
        Some(tab) if session.is_auto_reloading(tab) => "on",
        Some(_) => "off",
        None => "-",
    };

    let second_line = match &app.mode {
        Mode::EditServers { buffer } => format!("Servers: {buffer}_"),
        Mode::Normal | Mode::EditSetting { .. } => format!("Status: {}", app.status_line),
    };

    let footer = Paragraph::new(vec![
        Line::from(format!(
            "Last updated: {updated} | Auto reload: {auto_reload} | ?: help"
        )),
        Line::from(second_line),
    ])
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, area);
}

fn render_help_popup(frame: &mut Frame<'_>, app: &TuiApp) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from("Commands")];
    lines.extend(
        app.session
            .commands()
            .bindings()
            .iter()
            .map(|binding| Line::from(format!("{}: {}", binding.key, binding.description))),
    );
    lines.extend([
        Line::from(""),
        Line::from("Left/Right: previous or next datasource"),
        Line::from("Up/Down: move cursor"),
        Line::from("Enter: edit setting"),
        Line::from("s: save settings"),
        Line::from("S: edit servers"),
        Line::from("?: toggle help"),
        Line::from("Esc or Ctrl+C: quit"),
    ]);

    let help = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(help, area);
}

fn centered_rect(width_percent: u16, height_percent: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100_u16 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100_u16 - height_percent) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100_u16 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100_u16 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

fn format_record_time(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |time| time.with_timezone(&Local).format(TIME_FORMAT).to_string(),
    )
}

fn format_system_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format("%H:%M:%S").to_string()
}

fn map_key_event(key: KeyEvent, editing: bool) -> Option<Msg> {
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => Some(Msg::Quit),
        (_, KeyCode::Esc) => Some(Msg::Escape),
        (_, KeyCode::Enter) => Some(Msg::Submit),
        (_, KeyCode::Backspace) if editing => Some(Msg::Backspace),
        (_, KeyCode::Char(ch)) if editing => Some(Msg::Input(ch)),
        _ if editing => None,
        (_, KeyCode::Char('?')) => Some(Msg::ToggleHelp),
        (_, KeyCode::Char('s')) => Some(Msg::SaveSettings),
        (_, KeyCode::Char('S')) => Some(Msg::EditServers),
        (_, KeyCode::Left) => Some(Msg::CycleSubTab { forward: false }),
        (_, KeyCode::Right) => Some(Msg::CycleSubTab { forward: true }),
        (_, KeyCode::Up) => Some(Msg::Navigate(DirectionKey::Up)),
        (_, KeyCode::Down) => Some(Msg::Navigate(DirectionKey::Down)),
        (_, KeyCode::Char(ch)) => Some(Msg::Key(ch)),
        _ => None,
    }
}
