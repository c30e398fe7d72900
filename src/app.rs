use std::io;
use std::process::Child;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    DefaultTerminal, Frame,
    layout::{Constraint, Direction, Layout},
    style::Color,
    widgets::ListState,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::analysis::{AiAnalysis, AnalysisProvider, GeminiClient};
use crate::catalog::{ApexClient, CatalogProvider, Episode, EpisodePage, Mirror, SearchResult};
use crate::config::Config;
use crate::error::Result;
use crate::player::ExternalPlayer;
use crate::ui::{render_detail_view, render_search_view, widgets};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Search,
    Detail,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailTab {
    Analysis,
    Episodes,
}

#[derive(Debug)]
pub enum AnalysisState {
    Loading,
    Ready(AiAnalysis),
    Unavailable,
}

#[derive(Debug)]
pub enum MirrorState {
    Loading,
    Ready(Vec<Mirror>),
    Failed,
}

/// Episode panel sub-state, independent of the tab and analysis state.
#[derive(Debug)]
pub struct EpisodePanel {
    pub episode: Episode,
    pub mirrors: MirrorState,
}

#[derive(Debug)]
pub struct StreamOverlay {
    pub name: String,
    pub url: String,
    pub launched: bool,
}

/// All transient state for one selected title. Dropped wholesale when the
/// detail view closes or another title is selected.
pub struct DetailState {
    pub anime: SearchResult,
    pub tab: DetailTab,
    pub analysis: AnalysisState,
    pub page: u32,
    pub total_pages: u32,
    pub episodes_loading: bool,
    pub episodes: Option<EpisodePage>,
    pub episode_state: ListState,
    pub panel: Option<EpisodePanel>,
    pub stream: Option<StreamOverlay>,
}

impl DetailState {
    pub fn new(anime: SearchResult, analysis: AnalysisState) -> Self {
        Self {
            anime,
            tab: DetailTab::Analysis,
            analysis,
            page: 1,
            total_pages: 1,
            episodes_loading: false,
            episodes: None,
            episode_state: ListState::default(),
            panel: None,
            stream: None,
        }
    }
}

/// Results of spawned fetch tasks. Detail-scoped messages carry the
/// generation of the selection that initiated them so responses arriving
/// after the user has moved on are discarded.
pub enum AppMessage {
    SearchResults(Vec<SearchResult>),
    SearchError(String),
    AnalysisReady(u64, AiAnalysis),
    AnalysisError(u64, String),
    EpisodesLoaded(u64, u32, EpisodePage),
    EpisodesError(u64, u32, String),
    MirrorsLoaded(u64, String, Vec<Mirror>),
    MirrorsError(u64, String, String),
}

pub struct App {
    pub config: Config,
    pub running: bool,
    pub view: View,
    pub previous_view: View,
    pub accent: Color,

    pub search_query: String,
    pub search_results: Vec<SearchResult>,
    pub search_state: ListState,
    pub search_loading: bool,
    pub search_message: Option<&'static str>,
    pub has_searched: bool,

    pub detail: Option<DetailState>,
    pub detail_generation: u64,

    pub msg_tx: mpsc::UnboundedSender<AppMessage>,
    pub msg_rx: mpsc::UnboundedReceiver<AppMessage>,

    pub catalog: Arc<dyn CatalogProvider + Send + Sync>,
    pub analysis_provider: Option<Arc<dyn AnalysisProvider + Send + Sync>>,
    pub player_child: Option<Child>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let catalog: Arc<dyn CatalogProvider + Send + Sync> = Arc::new(ApexClient::new());

        let analysis_provider: Option<Arc<dyn AnalysisProvider + Send + Sync>> =
            if !config.analysis.gemini_api_key.is_empty() {
                Some(Arc::new(GeminiClient::new(
                    config.analysis.gemini_api_key.clone(),
                    config.analysis.model.clone(),
                )))
            } else {
                None
            };

        Self::with_providers(config, catalog, analysis_provider)
    }

    pub fn with_providers(
        config: Config,
        catalog: Arc<dyn CatalogProvider + Send + Sync>,
        analysis_provider: Option<Arc<dyn AnalysisProvider + Send + Sync>>,
    ) -> Self {
        let accent = widgets::parse_accent_color(&config.ui.accent_color);
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();

        Self {
            config,
            running: true,
            view: View::Search,
            previous_view: View::Search,
            accent,

            search_query: String::new(),
            search_results: Vec::new(),
            search_state: ListState::default(),
            search_loading: false,
            search_message: None,
            has_searched: false,

            detail: None,
            detail_generation: 0,

            msg_tx,
            msg_rx,

            catalog,
            analysis_provider,
            player_child: None,
        }
    }

    pub async fn run(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        while self.running {
            terminal.draw(|frame| self.render(frame))?;
            self.handle_events().await?;
            self.process_messages();
            self.reap_player();
        }
        Ok(())
    }

    fn process_messages(&mut self) {
        while let Ok(msg) = self.msg_rx.try_recv() {
            match msg {
                AppMessage::SearchResults(results) => {
                    self.search_loading = false;
                    self.search_results = results;
                    if self.search_results.is_empty() {
                        self.search_message = Some("No results found.");
                        self.search_state.select(None);
                    } else {
                        self.search_message = None;
                        self.search_state.select(Some(0));
                    }
                }
                AppMessage::SearchError(err) => {
                    self.search_loading = false;
                    self.search_results.clear();
                    self.search_state.select(None);
                    self.search_message = Some("Connection error.");
                    error!(error = %err, "Search failed");
                }
                AppMessage::AnalysisReady(generation, analysis) => {
                    if generation != self.detail_generation {
                        debug!("Discarding analysis for a stale selection");
                        continue;
                    }
                    if let Some(detail) = &mut self.detail {
                        detail.analysis = if analysis.is_empty() {
                            AnalysisState::Unavailable
                        } else {
                            AnalysisState::Ready(analysis)
                        };
                    }
                }
                AppMessage::AnalysisError(generation, err) => {
                    error!(error = %err, "Analysis failed");
                    if generation != self.detail_generation {
                        continue;
                    }
                    if let Some(detail) = &mut self.detail {
                        detail.analysis = AnalysisState::Unavailable;
                    }
                }
                AppMessage::EpisodesLoaded(generation, page, data) => {
                    if generation != self.detail_generation {
                        debug!("Discarding episode page for a stale selection");
                        continue;
                    }
                    if let Some(detail) = &mut self.detail {
                        if detail.page != page {
                            debug!(page, current = detail.page, "Discarding superseded episode page");
                            continue;
                        }
                        detail.episodes_loading = false;
                        detail.total_pages = data.total_pages.max(1);
                        if data.episodes.is_empty() {
                            detail.episode_state.select(None);
                        } else {
                            detail.episode_state.select(Some(0));
                        }
                        detail.episodes = Some(data);
                    }
                }
                AppMessage::EpisodesError(generation, page, err) => {
                    error!(error = %err, page, "Episode fetch failed");
                    if generation != self.detail_generation {
                        continue;
                    }
                    if let Some(detail) = &mut self.detail {
                        if detail.page == page {
                            detail.episodes_loading = false;
                        }
                    }
                }
                AppMessage::MirrorsLoaded(generation, episode_session, mirrors) => {
                    if generation != self.detail_generation {
                        debug!("Discarding mirrors for a stale selection");
                        continue;
                    }
                    if let Some(detail) = &mut self.detail {
                        if let Some(panel) = &mut detail.panel {
                            if panel.episode.session == episode_session {
                                panel.mirrors = MirrorState::Ready(mirrors);
                            }
                        }
                    }
                }
                AppMessage::MirrorsError(generation, episode_session, err) => {
                    error!(error = %err, "Mirror resolution failed");
                    if generation != self.detail_generation {
                        continue;
                    }
                    if let Some(detail) = &mut self.detail {
                        if let Some(panel) = &mut detail.panel {
                            if panel.episode.session == episode_session {
                                panel.mirrors = MirrorState::Failed;
                            }
                        }
                    }
                }
            }
        }
    }

    fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(frame.area());

        let main_area = chunks[0];
        let help_area = chunks[1];

        match self.view {
            View::Search => {
                render_search_view(
                    frame,
                    main_area,
                    &self.search_query,
                    &self.search_results,
                    &mut self.search_state,
                    self.search_loading,
                    self.search_message,
                    self.has_searched,
                    self.accent,
                );

                let help = widgets::help_bar(&[
                    ("Enter", "search/open"),
                    ("↑/↓", "navigate"),
                    ("?", "help"),
                    ("Ctrl+q", "quit"),
                ]);
                frame.render_widget(help, help_area);
            }
            View::Detail => {
                let accent = self.accent;
                if let Some(detail) = &mut self.detail {
                    render_detail_view(frame, main_area, detail, accent);

                    let hints: &[(&str, &str)] = if detail.stream.is_some() {
                        &[("o", "reopen player"), ("Esc", "close")]
                    } else if detail.tab == DetailTab::Episodes {
                        &[
                            ("Tab", "tab"),
                            ("j/k", "episode"),
                            ("h/l", "page"),
                            ("Enter", "mirrors"),
                            ("1-9", "play"),
                            ("Esc", "back"),
                        ]
                    } else {
                        &[("Tab", "tab"), ("Esc", "back"), ("?", "help")]
                    };
                    let help = widgets::help_bar(hints);
                    frame.render_widget(help, help_area);
                }
            }
            View::Help => {
                match self.previous_view {
                    View::Search => render_search_view(
                        frame,
                        main_area,
                        &self.search_query,
                        &self.search_results,
                        &mut self.search_state,
                        self.search_loading,
                        self.search_message,
                        self.has_searched,
                        self.accent,
                    ),
                    View::Detail => {
                        let accent = self.accent;
                        if let Some(detail) = &mut self.detail {
                            render_detail_view(frame, main_area, detail, accent);
                        }
                    }
                    _ => {}
                }
                self.render_help(frame);

                let help = widgets::help_bar(&[("Esc", "close help")]);
                frame.render_widget(help, help_area);
            }
        }
    }

    fn render_help(&self, frame: &mut Frame) {
        use ratatui::{
            style::{Modifier, Style},
            text::{Line, Span},
            widgets::{Clear, Paragraph},
        };

        let area = widgets::centered_rect(frame.area(), 46, 16);
        frame.render_widget(Clear, area);

        let key = |k: &'static str, action: &'static str| {
            Line::from(vec![
                Span::styled(format!("  {:<8}", k), Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(action),
            ])
        };

        let lines = vec![
            Line::from(""),
            key("Enter", "search / open result / episode"),
            key("↑/↓ j/k", "move selection"),
            key("Tab a e", "switch detail tab"),
            key("h/l ←/→", "previous / next episode page"),
            key("1-9", "play mirror"),
            key("o", "reopen player from overlay"),
            key("Esc", "close overlay / panel / view"),
            key("?", "toggle this help"),
            key("Ctrl+q", "quit"),
        ];

        let help = Paragraph::new(lines).block(widgets::titled_block("Help", self.accent));
        frame.render_widget(help, area);
    }

    async fn handle_events(&mut self) -> Result<()> {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    return Ok(());
                }
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                    self.running = false;
                    return Ok(());
                }

                match self.view {
                    View::Search => self.handle_search_input(key),
                    View::Detail => self.handle_detail_input(key),
                    View::Help => self.handle_help_input(key.code),
                }
            }
        }
        Ok(())
    }

    fn handle_search_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.running = false;
            }
            KeyCode::Esc => {
                self.search_results.clear();
                self.search_state.select(None);
                self.search_message = None;
            }
            KeyCode::Tab | KeyCode::Down => {
                self.move_search_selection(1);
            }
            KeyCode::Up => {
                self.move_search_selection(-1);
            }
            KeyCode::Backspace => {
                self.search_query.pop();
            }
            KeyCode::Enter => {
                if self.search_results.is_empty() {
                    self.perform_search();
                } else {
                    self.open_selected_result();
                }
            }
            KeyCode::Char('?') => {
                self.toggle_help();
            }
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    self.search_query.push(c);
                }
            }
            _ => {}
        }
    }

    fn handle_detail_input(&mut self, key: KeyEvent) {
        let Some(detail) = &self.detail else {
            self.view = View::Search;
            return;
        };

        // The stream overlay captures input while open
        if detail.stream.is_some() {
            match key.code {
                KeyCode::Esc => self.close_stream_overlay(),
                KeyCode::Char('o') => self.relaunch_player(),
                KeyCode::Char('q') => self.running = false,
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => {
                self.running = false;
            }
            KeyCode::Esc => {
                if self.detail.as_ref().is_some_and(|d| d.panel.is_some()) {
                    if let Some(detail) = &mut self.detail {
                        detail.panel = None;
                    }
                } else {
                    self.close_detail();
                }
            }
            KeyCode::Tab => {
                let next = match detail.tab {
                    DetailTab::Analysis => DetailTab::Episodes,
                    DetailTab::Episodes => DetailTab::Analysis,
                };
                self.set_detail_tab(next);
            }
            KeyCode::Char('a') => self.set_detail_tab(DetailTab::Analysis),
            KeyCode::Char('e') => self.set_detail_tab(DetailTab::Episodes),
            KeyCode::Char('j') | KeyCode::Down => self.move_episode_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_episode_selection(-1),
            KeyCode::Char('h') | KeyCode::Left => self.change_page(-1),
            KeyCode::Char('l') | KeyCode::Right => self.change_page(1),
            KeyCode::Enter => self.toggle_selected_episode(),
            KeyCode::Char(c @ '1'..='9') => {
                self.select_mirror((c as u8 - b'1') as usize);
            }
            KeyCode::Char('?') => self.toggle_help(),
            _ => {}
        }
    }

    fn handle_help_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::Char('?') => {
                self.view = self.previous_view;
            }
            _ => {}
        }
    }

    fn toggle_help(&mut self) {
        if self.view == View::Help {
            self.view = self.previous_view;
        } else {
            self.previous_view = self.view;
            self.view = View::Help;
        }
    }

    fn move_search_selection(&mut self, delta: i64) {
        let len = self.search_results.len();
        if len == 0 {
            return;
        }
        let current = self.search_state.selected().unwrap_or(0) as i64;
        let next = (current + delta).clamp(0, len as i64 - 1) as usize;
        self.search_state.select(Some(next));
    }

    fn move_episode_selection(&mut self, delta: i64) {
        let Some(detail) = &mut self.detail else {
            return;
        };
        if detail.tab != DetailTab::Episodes {
            return;
        }
        let len = detail
            .episodes
            .as_ref()
            .map(|d| d.episodes.len())
            .unwrap_or(0);
        if len == 0 {
            return;
        }
        let current = detail.episode_state.selected().unwrap_or(0) as i64;
        let next = (current + delta).clamp(0, len as i64 - 1) as usize;
        detail.episode_state.select(Some(next));
    }

    fn perform_search(&mut self) {
        if self.search_query.trim().is_empty() || self.search_loading {
            return;
        }

        self.search_loading = true;
        self.search_message = None;
        self.has_searched = true;
        self.search_results.clear();
        self.search_state.select(None);

        let query = self.search_query.clone();
        let client = Arc::clone(&self.catalog);
        let tx = self.msg_tx.clone();

        info!(query = %query, "Searching");

        tokio::spawn(async move {
            match client.search(&query).await {
                Ok(results) => {
                    let _ = tx.send(AppMessage::SearchResults(results));
                }
                Err(e) => {
                    let _ = tx.send(AppMessage::SearchError(e.to_string()));
                }
            }
        });
    }

    fn open_selected_result(&mut self) {
        let Some(idx) = self.search_state.selected() else {
            return;
        };
        let Some(result) = self.search_results.get(idx).cloned() else {
            return;
        };
        self.open_detail(result);
    }

    /// Select a title: drop every piece of transient detail state, bump the
    /// request generation, and fire the analysis request.
    fn open_detail(&mut self, anime: SearchResult) {
        self.detail_generation += 1;
        let generation = self.detail_generation;

        info!(title = %anime.title, "Opening detail view");

        let analysis = match &self.analysis_provider {
            Some(provider) => {
                let provider = Arc::clone(provider);
                let title = anime.title.clone();
                let tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    match provider.analyze(&title).await {
                        Ok(analysis) => {
                            let _ = tx.send(AppMessage::AnalysisReady(generation, analysis));
                        }
                        Err(e) => {
                            let _ = tx.send(AppMessage::AnalysisError(generation, e.to_string()));
                        }
                    }
                });
                AnalysisState::Loading
            }
            None => {
                warn!("No analysis provider configured (check gemini_api_key)");
                AnalysisState::Unavailable
            }
        };

        self.detail = Some(DetailState::new(anime, analysis));
        self.view = View::Detail;
    }

    fn close_detail(&mut self) {
        // Bump the generation so in-flight responses for this selection
        // are discarded when they land.
        self.detail_generation += 1;
        self.detail = None;
        self.view = View::Search;
    }

    fn set_detail_tab(&mut self, tab: DetailTab) {
        let Some(detail) = &mut self.detail else {
            return;
        };
        detail.tab = tab;
        if tab == DetailTab::Episodes {
            self.fetch_episodes_if_needed();
        }
    }

    /// Fetch the current page unless it is already loaded or in flight.
    fn fetch_episodes_if_needed(&mut self) {
        let Some(detail) = &self.detail else {
            return;
        };
        if detail.episodes_loading {
            return;
        }
        if detail.episodes.as_ref().map(|d| d.page) == Some(detail.page) {
            return;
        }
        self.fetch_episodes();
    }

    fn fetch_episodes(&mut self) {
        let generation = self.detail_generation;
        let Some(detail) = &mut self.detail else {
            return;
        };

        detail.episodes_loading = true;
        detail.episodes = None;
        detail.episode_state.select(None);

        let session = detail.anime.session.clone();
        let page = detail.page;
        let client = Arc::clone(&self.catalog);
        let tx = self.msg_tx.clone();

        tokio::spawn(async move {
            match client.episodes(&session, page).await {
                Ok(data) => {
                    let _ = tx.send(AppMessage::EpisodesLoaded(generation, page, data));
                }
                Err(e) => {
                    let _ = tx.send(AppMessage::EpisodesError(generation, page, e.to_string()));
                }
            }
        });
    }

    /// Page navigation is server-driven: bounds come from the last
    /// response, and revisiting a page always re-fetches it.
    fn change_page(&mut self, delta: i64) {
        let Some(detail) = &mut self.detail else {
            return;
        };
        if detail.tab != DetailTab::Episodes || detail.episodes_loading {
            return;
        }
        let next = detail.page as i64 + delta;
        if next < 1 || next > detail.total_pages as i64 {
            return;
        }
        detail.page = next as u32;
        self.fetch_episodes();
    }

    /// Toggle the episode panel: re-selecting the open episode closes it
    /// without a request, any other episode opens it and resolves mirrors.
    fn toggle_selected_episode(&mut self) {
        let generation = self.detail_generation;
        let Some(detail) = &mut self.detail else {
            return;
        };
        if detail.tab != DetailTab::Episodes {
            return;
        }
        let Some(idx) = detail.episode_state.selected() else {
            return;
        };
        let Some(episode) = detail
            .episodes
            .as_ref()
            .and_then(|d| d.episodes.get(idx))
            .cloned()
        else {
            return;
        };

        if detail
            .panel
            .as_ref()
            .is_some_and(|p| p.episode.session == episode.session)
        {
            detail.panel = None;
            return;
        }

        let series = detail.anime.session.clone();
        let episode_session = episode.session.clone();
        detail.panel = Some(EpisodePanel {
            episode,
            mirrors: MirrorState::Loading,
        });

        let client = Arc::clone(&self.catalog);
        let tx = self.msg_tx.clone();

        tokio::spawn(async move {
            match client.mirrors(&series, &episode_session).await {
                Ok(mirrors) => {
                    let _ = tx.send(AppMessage::MirrorsLoaded(generation, episode_session, mirrors));
                }
                Err(e) => {
                    let _ = tx.send(AppMessage::MirrorsError(
                        generation,
                        episode_session,
                        e.to_string(),
                    ));
                }
            }
        });
    }

    fn select_mirror(&mut self, idx: usize) {
        let Some(detail) = &mut self.detail else {
            return;
        };
        let Some(panel) = &detail.panel else {
            return;
        };
        let MirrorState::Ready(mirrors) = &panel.mirrors else {
            return;
        };
        let Some(mirror) = mirrors.get(idx) else {
            return;
        };

        let player = ExternalPlayer::new(
            self.config.general.player.clone(),
            self.config.player_args(),
        );

        let launched = match player.play(&mirror.url) {
            Ok(child) => {
                self.player_child = Some(child);
                true
            }
            Err(e) => {
                error!("Failed to launch player: {}", e);
                false
            }
        };

        detail.stream = Some(StreamOverlay {
            name: mirror.name.clone(),
            url: mirror.url.clone(),
            launched,
        });
    }

    fn relaunch_player(&mut self) {
        let Some(detail) = &mut self.detail else {
            return;
        };
        let Some(stream) = &mut detail.stream else {
            return;
        };

        let player = ExternalPlayer::new(
            self.config.general.player.clone(),
            self.config.player_args(),
        );

        match player.play(&stream.url) {
            Ok(child) => {
                self.player_child = Some(child);
                stream.launched = true;
            }
            Err(e) => {
                error!("Failed to launch player: {}", e);
                stream.launched = false;
            }
        }
    }

    /// Closing the overlay clears only the overlay; the episode panel and
    /// its mirror list stay put.
    fn close_stream_overlay(&mut self) {
        if let Some(detail) = &mut self.detail {
            detail.stream = None;
        }
    }

    fn reap_player(&mut self) {
        if let Some(child) = &mut self.player_child {
            if let Ok(Some(_)) = child.try_wait() {
                self.player_child = None;
            }
        }
    }
}

pub fn init_terminal() -> io::Result<DefaultTerminal> {
    crossterm::terminal::enable_raw_mode()?;
    crossterm::execute!(io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    Ok(ratatui::init())
}

pub fn restore_terminal() -> io::Result<()> {
    ratatui::restore();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MirrorEntry, NextPage};
    use crate::error::Error;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn sample_result(session: &str) -> SearchResult {
        SearchResult {
            id: 1,
            title: format!("Title {}", session),
            kind: "TV".to_string(),
            episodes: 12,
            status: "Airing".to_string(),
            season: "Fall".to_string(),
            year: 2024,
            score: 8.1,
            poster: String::new(),
            session: session.to_string(),
        }
    }

    fn sample_page(page: u32) -> EpisodePage {
        EpisodePage {
            title: "Title one".to_string(),
            total: 6,
            page,
            total_pages: 3,
            next: NextPage::Available(page < 3),
            episodes: (0..2)
                .map(|i| Episode {
                    episode: format!("{}", (page - 1) * 2 + i + 1),
                    session: format!("p{}e{}", page, i),
                    snapshot: String::new(),
                })
                .collect(),
        }
    }

    #[derive(Default)]
    struct MockCatalog {
        search_calls: AtomicUsize,
        episode_calls: AtomicUsize,
        mirror_calls: AtomicUsize,
        fail_mirrors: AtomicBool,
    }

    #[async_trait::async_trait]
    impl CatalogProvider for MockCatalog {
        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![sample_result("one"), sample_result("two")])
        }

        async fn episodes(&self, _session: &str, page: u32) -> Result<EpisodePage> {
            self.episode_calls.fetch_add(1, Ordering::SeqCst);
            Ok(sample_page(page))
        }

        async fn mirrors(
            &self,
            _series_session: &str,
            _episode_session: &str,
        ) -> Result<Vec<Mirror>> {
            self.mirror_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_mirrors.load(Ordering::SeqCst) {
                return Err(Error::Catalog("HTTP error: 502".to_string()));
            }
            Ok(Mirror::from_entries(
                (0..6)
                    .map(|i| MirrorEntry {
                        link: format!("https://mirrors.example/{}", i),
                        name: format!("Mirror {}", i),
                    })
                    .collect(),
            ))
        }
    }

    #[derive(Default)]
    struct MockAnalysis {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AnalysisProvider for MockAnalysis {
        async fn analyze(&self, _title: &str) -> Result<AiAnalysis> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AiAnalysis {
                summary: "Plot.".to_string(),
                why_watch: "- Reasons".to_string(),
                rating: "9/10".to_string(),
            })
        }
    }

    fn test_app(catalog: Arc<MockCatalog>, analysis: Arc<MockAnalysis>) -> App {
        let mut config = Config::default();
        // A binary that never exists, so tests exercise the failed-launch path
        config.general.player = "zenith-test-no-such-player".to_string();
        App::with_providers(config, catalog, Some(analysis))
    }

    /// Let spawned fetch tasks finish, then drain their messages.
    async fn settle(app: &mut App) {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
        app.process_messages();
    }

    #[test]
    fn empty_query_issues_no_search() {
        let catalog = Arc::new(MockCatalog::default());
        let mut app = test_app(Arc::clone(&catalog), Arc::new(MockAnalysis::default()));

        for query in ["", "   ", " \t "] {
            app.search_query = query.to_string();
            app.perform_search();
            assert!(!app.search_loading);
        }
        assert_eq!(catalog.search_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn search_outcomes_show_exactly_one_message() {
        let mut app = test_app(
            Arc::new(MockCatalog::default()),
            Arc::new(MockAnalysis::default()),
        );

        app.search_loading = true;
        app.msg_tx
            .send(AppMessage::SearchError("boom".to_string()))
            .unwrap();
        app.process_messages();
        assert_eq!(app.search_message, Some("Connection error."));
        assert!(app.search_results.is_empty());

        app.search_loading = true;
        app.msg_tx.send(AppMessage::SearchResults(Vec::new())).unwrap();
        app.process_messages();
        assert_eq!(app.search_message, Some("No results found."));

        app.search_loading = true;
        app.msg_tx
            .send(AppMessage::SearchResults(vec![sample_result("one")]))
            .unwrap();
        app.process_messages();
        assert_eq!(app.search_message, None);
        assert_eq!(app.search_state.selected(), Some(0));
    }

    #[tokio::test]
    async fn selection_resets_state_and_requests_analysis_once() {
        let catalog = Arc::new(MockCatalog::default());
        let analysis = Arc::new(MockAnalysis::default());
        let mut app = test_app(Arc::clone(&catalog), Arc::clone(&analysis));

        app.open_detail(sample_result("one"));
        settle(&mut app).await;

        assert_eq!(analysis.calls.load(Ordering::SeqCst), 1);
        let detail = app.detail.as_ref().unwrap();
        assert_eq!(detail.tab, DetailTab::Analysis);
        assert!(matches!(detail.analysis, AnalysisState::Ready(_)));
        assert!(detail.episodes.is_none());
        assert!(detail.panel.is_none());
        assert!(detail.stream.is_none());

        // A different selection starts from scratch with one more request
        app.open_detail(sample_result("two"));
        let detail = app.detail.as_ref().unwrap();
        assert!(matches!(detail.analysis, AnalysisState::Loading));
        assert!(detail.episodes.is_none());
        settle(&mut app).await;
        assert_eq!(analysis.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn episode_pages_fetch_once_and_refetch_on_revisit() {
        let catalog = Arc::new(MockCatalog::default());
        let mut app = test_app(Arc::clone(&catalog), Arc::new(MockAnalysis::default()));

        app.open_detail(sample_result("one"));
        settle(&mut app).await;

        app.set_detail_tab(DetailTab::Episodes);
        assert!(app.detail.as_ref().unwrap().episodes_loading);
        settle(&mut app).await;
        assert_eq!(catalog.episode_calls.load(Ordering::SeqCst), 1);
        let detail = app.detail.as_ref().unwrap();
        assert_eq!(detail.episodes.as_ref().unwrap().page, 1);
        assert_eq!(detail.total_pages, 3);

        // Leaving and returning to a loaded page does not refetch
        app.set_detail_tab(DetailTab::Analysis);
        app.set_detail_tab(DetailTab::Episodes);
        settle(&mut app).await;
        assert_eq!(catalog.episode_calls.load(Ordering::SeqCst), 1);

        // Advancing discards the loaded page and fetches the next
        app.change_page(1);
        let detail = app.detail.as_ref().unwrap();
        assert_eq!(detail.page, 2);
        assert!(detail.episodes.is_none());
        settle(&mut app).await;
        assert_eq!(catalog.episode_calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            app.detail.as_ref().unwrap().episodes.as_ref().unwrap().page,
            2
        );

        // Revisiting a previously viewed page re-fetches it
        app.change_page(-1);
        settle(&mut app).await;
        assert_eq!(catalog.episode_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn page_bounds_and_inflight_guard() {
        let catalog = Arc::new(MockCatalog::default());
        let mut app = test_app(Arc::clone(&catalog), Arc::new(MockAnalysis::default()));

        app.open_detail(sample_result("one"));
        app.set_detail_tab(DetailTab::Episodes);

        // While the first fetch is in flight, paging is a no-op
        app.change_page(1);
        settle(&mut app).await;
        assert_eq!(catalog.episode_calls.load(Ordering::SeqCst), 1);
        assert_eq!(app.detail.as_ref().unwrap().page, 1);

        app.change_page(-1);
        settle(&mut app).await;
        assert_eq!(app.detail.as_ref().unwrap().page, 1);
        assert_eq!(catalog.episode_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn episode_toggle_drives_mirror_calls() {
        let catalog = Arc::new(MockCatalog::default());
        let mut app = test_app(Arc::clone(&catalog), Arc::new(MockAnalysis::default()));

        app.open_detail(sample_result("one"));
        app.set_detail_tab(DetailTab::Episodes);
        settle(&mut app).await;

        app.toggle_selected_episode();
        {
            let detail = app.detail.as_ref().unwrap();
            let panel = detail.panel.as_ref().unwrap();
            assert!(matches!(panel.mirrors, MirrorState::Loading));
        }
        settle(&mut app).await;
        assert_eq!(catalog.mirror_calls.load(Ordering::SeqCst), 1);
        {
            let detail = app.detail.as_ref().unwrap();
            let panel = detail.panel.as_ref().unwrap();
            match &panel.mirrors {
                MirrorState::Ready(mirrors) => assert_eq!(mirrors.len(), 6),
                other => panic!("expected mirrors, got {:?}", other),
            }
        }

        // Re-selecting the open episode closes the panel with no new call
        app.toggle_selected_episode();
        assert!(app.detail.as_ref().unwrap().panel.is_none());
        settle(&mut app).await;
        assert_eq!(catalog.mirror_calls.load(Ordering::SeqCst), 1);

        // A different episode issues exactly one fresh call
        app.move_episode_selection(1);
        app.toggle_selected_episode();
        settle(&mut app).await;
        assert_eq!(catalog.mirror_calls.load(Ordering::SeqCst), 2);
        let detail = app.detail.as_ref().unwrap();
        assert_eq!(detail.panel.as_ref().unwrap().episode.session, "p1e1");
    }

    #[tokio::test]
    async fn failed_mirror_fetch_marks_panel_failed() {
        let catalog = Arc::new(MockCatalog::default());
        catalog.fail_mirrors.store(true, Ordering::SeqCst);
        let mut app = test_app(Arc::clone(&catalog), Arc::new(MockAnalysis::default()));

        app.open_detail(sample_result("one"));
        app.set_detail_tab(DetailTab::Episodes);
        settle(&mut app).await;

        app.toggle_selected_episode();
        settle(&mut app).await;

        let detail = app.detail.as_ref().unwrap();
        assert!(matches!(
            detail.panel.as_ref().unwrap().mirrors,
            MirrorState::Failed
        ));
    }

    #[test]
    fn stale_generation_responses_are_discarded() {
        let mut app = test_app(
            Arc::new(MockCatalog::default()),
            Arc::new(MockAnalysis::default()),
        );

        app.detail = Some(DetailState::new(
            sample_result("one"),
            AnalysisState::Loading,
        ));
        app.detail_generation = 2;

        app.msg_tx
            .send(AppMessage::EpisodesLoaded(1, 1, sample_page(1)))
            .unwrap();
        app.msg_tx
            .send(AppMessage::AnalysisReady(1, AiAnalysis::default()))
            .unwrap();
        app.msg_tx
            .send(AppMessage::MirrorsLoaded(1, "p1e0".to_string(), Vec::new()))
            .unwrap();
        app.process_messages();

        let detail = app.detail.as_ref().unwrap();
        assert!(detail.episodes.is_none());
        assert!(matches!(detail.analysis, AnalysisState::Loading));
        assert!(detail.panel.is_none());
    }

    #[test]
    fn superseded_page_response_is_discarded() {
        let mut app = test_app(
            Arc::new(MockCatalog::default()),
            Arc::new(MockAnalysis::default()),
        );

        app.detail = Some(DetailState::new(
            sample_result("one"),
            AnalysisState::Loading,
        ));
        app.detail_generation = 1;
        if let Some(detail) = &mut app.detail {
            detail.page = 2;
            detail.episodes_loading = true;
        }

        // A slow page-1 response lands after the user moved to page 2
        app.msg_tx
            .send(AppMessage::EpisodesLoaded(1, 1, sample_page(1)))
            .unwrap();
        app.process_messages();

        let detail = app.detail.as_ref().unwrap();
        assert!(detail.episodes.is_none());
        assert!(detail.episodes_loading);
    }

    #[tokio::test]
    async fn closing_stream_overlay_keeps_panel() {
        let catalog = Arc::new(MockCatalog::default());
        let mut app = test_app(Arc::clone(&catalog), Arc::new(MockAnalysis::default()));

        app.open_detail(sample_result("one"));
        app.set_detail_tab(DetailTab::Episodes);
        settle(&mut app).await;
        app.toggle_selected_episode();
        settle(&mut app).await;

        app.select_mirror(0);
        {
            let detail = app.detail.as_ref().unwrap();
            let stream = detail.stream.as_ref().unwrap();
            assert_eq!(stream.url, "https://mirrors.example/0");
            // The test player binary does not exist
            assert!(!stream.launched);
        }

        app.close_stream_overlay();
        let detail = app.detail.as_ref().unwrap();
        assert!(detail.stream.is_none());
        assert!(detail.panel.is_some());
    }

    #[tokio::test]
    async fn analysis_runs_without_episode_tab() {
        // The analysis request is independent of the active tab
        let catalog = Arc::new(MockCatalog::default());
        let analysis = Arc::new(MockAnalysis::default());
        let mut app = test_app(Arc::clone(&catalog), Arc::clone(&analysis));

        app.open_detail(sample_result("one"));
        settle(&mut app).await;

        assert_eq!(analysis.calls.load(Ordering::SeqCst), 1);
        assert_eq!(catalog.episode_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_provider_marks_analysis_unavailable() {
        let mut app = App::with_providers(
            Config::default(),
            Arc::new(MockCatalog::default()),
            None,
        );

        app.open_detail(sample_result("one"));
        let detail = app.detail.as_ref().unwrap();
        assert!(matches!(detail.analysis, AnalysisState::Unavailable));
    }
}
