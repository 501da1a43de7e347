use image::DynamicImage;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use ratatui_image::{picker::Picker, protocol::StatefulProtocol, Resize, StatefulImage};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::text::{shimmer_levels, strip_vowels, truncate_text};
use crate::backend::picsum::ImageRecord;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Loading,
    Ready,
}

pub struct App {
    pub state: AppState,
    pub loading_message: String,
    pub status: String,
    pub page: u32,
    /// Page being fetched, while a foreground update is in flight.
    pub fetching: Option<u32>,
    pub records: Vec<ImageRecord>,
    pub author_labels: HashMap<String, String>,
    pub selected: usize,
    pub columns: usize,
    pub row_offset: usize,
    pub shimmering: Option<String>,
    pub picker: Option<Picker>,
    pub image_states: HashMap<String, StatefulProtocol>,
    pub missing_images: HashSet<String>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self::with_picker(Picker::from_query_stdio().ok())
    }

    pub fn with_picker(picker: Option<Picker>) -> Self {
        Self {
            state: AppState::Loading,
            loading_message: "Initializing...".to_string(),
            status: String::new(),
            page: 0,
            fetching: None,
            records: Vec::new(),
            author_labels: HashMap::new(),
            selected: 0,
            columns: 1,
            row_offset: 0,
            shimmering: None,
            picker,
            image_states: HashMap::new(),
            missing_images: HashSet::new(),
        }
    }

    pub fn set_loading(&mut self, message: &str) {
        self.state = AppState::Loading;
        self.loading_message = message.to_string();
    }

    pub fn set_ready(&mut self) {
        self.state = AppState::Ready;
    }

    /// Swaps in a freshly fetched page. Label edits and rendered thumbnails
    /// belong to the previous page and are dropped.
    pub fn set_records(&mut self, records: Vec<ImageRecord>, page: u32) {
        self.records = records;
        self.page = page;
        self.selected = 0;
        self.row_offset = 0;
        self.shimmering = None;
        self.author_labels.clear();
        self.image_states.clear();
        self.missing_images.clear();
        self.set_ready();
    }

    pub fn add_image(&mut self, id: &str, image: Arc<DynamicImage>) {
        self.missing_images.remove(id);
        if let Some(ref picker) = self.picker {
            let protocol = picker.new_resize_protocol((*image).clone());
            self.image_states.insert(id.to_string(), protocol);
        }
    }

    pub fn mark_missing(&mut self, id: &str) {
        self.missing_images.insert(id.to_string());
    }

    /// Id of the record at `index`, if `page` is still the one on screen.
    pub fn record_id(&self, page: u32, index: usize) -> Option<String> {
        if page != self.page {
            return None;
        }
        self.records.get(index).map(|r| r.id.clone())
    }

    pub fn selected_record(&self) -> Option<&ImageRecord> {
        self.records.get(self.selected)
    }

    pub fn author_label<'a>(&'a self, record: &'a ImageRecord) -> &'a str {
        self.author_labels
            .get(&record.id)
            .map(String::as_str)
            .unwrap_or(&record.author)
    }

    pub fn move_selection(&mut self, dx: isize, dy: isize) {
        if self.records.is_empty() {
            return;
        }
        let columns = self.columns.max(1) as isize;
        let last = self.records.len() as isize - 1;
        let target = self.selected as isize + dx + dy * columns;
        self.selected = target.clamp(0, last) as usize;
        self.shimmering = None;
    }

    pub fn strip_selected_author(&mut self) {
        let Some(record) = self.selected_record() else {
            return;
        };
        let stripped = strip_vowels(self.author_label(record));
        let id = record.id.clone();
        self.author_labels.insert(id, stripped);
    }

    pub fn toggle_shimmer(&mut self) {
        let Some(id) = self.selected_record().map(|r| r.id.clone()) else {
            return;
        };
        if self.shimmering.as_deref() == Some(id.as_str()) {
            self.shimmering = None;
        } else {
            log::debug!("Shimmering author label of image id '{}'", id);
            self.shimmering = Some(id);
        }
    }
}

const CARD_WIDTH: u16 = 26;
const CARD_HEIGHT: u16 = 12;

pub fn ui(f: &mut Frame, app: &mut App) {
    match app.state {
        AppState::Loading => draw_loading_screen(f, app),
        AppState::Ready => draw_main_ui(f, app),
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

fn draw_loading_screen(f: &mut Frame, app: &App) {
    let area = f.area();

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Picsum Gallery")
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let center_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Percentage(40),
        ])
        .split(inner);

    let spinner_frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
    let frame_idx = (now_millis() / 100) as usize % spinner_frames.len();

    let loading_text = Line::from(vec![
        Span::styled(
            format!(" {} ", spinner_frames[frame_idx]),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "Loading...",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ]);

    let loading_paragraph = Paragraph::new(loading_text).alignment(Alignment::Center);
    f.render_widget(loading_paragraph, center_layout[1]);

    let message = Paragraph::new(vec![
        Line::from(app.loading_message.as_str()),
        Line::from("u: retry  q: quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .alignment(Alignment::Center);
    f.render_widget(message, center_layout[2]);
}

fn draw_main_ui(f: &mut Frame, app: &mut App) {
    let area = f.area();

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(10),   // grid
            Constraint::Length(3), // footer
        ])
        .split(area);

    draw_header(f, root[0], app);
    draw_grid(f, root[1], app);
    draw_footer(f, root[2]);
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![
        Span::styled(
            format!("Page {}", app.page),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  {} images", app.records.len())),
    ];
    if let Some(next) = app.fetching {
        spans.push(Span::styled(
            format!("  fetching page {}...", next),
            Style::default().fg(Color::Cyan),
        ));
    }
    if !app.status.is_empty() {
        spans.push(Span::styled(
            format!("  {}", app.status),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Picsum Gallery")
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(header, area);
}

fn draw_grid(f: &mut Frame, area: Rect, app: &mut App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));
    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.records.is_empty() {
        let empty = Paragraph::new("No images available")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, inner);
        return;
    }

    let columns = (inner.width / CARD_WIDTH).max(1) as usize;
    let visible_rows = (inner.height / CARD_HEIGHT).max(1) as usize;
    app.columns = columns;

    // Keep the selected row on screen
    let selected_row = app.selected / columns;
    if selected_row < app.row_offset {
        app.row_offset = selected_row;
    } else if selected_row >= app.row_offset + visible_rows {
        app.row_offset = selected_row + 1 - visible_rows;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints((0..visible_rows).map(|_| Constraint::Length(CARD_HEIGHT)))
        .split(inner);

    let tick = (now_millis() / 80) as u64;

    for (row_idx, row_area) in rows.iter().enumerate() {
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints((0..columns).map(|_| Constraint::Length(CARD_WIDTH)))
            .split(*row_area);

        for (col_idx, cell) in cells.iter().enumerate() {
            let index = (app.row_offset + row_idx) * columns + col_idx;
            let Some(record) = app.records.get(index) else {
                return;
            };

            let label = app.author_label(record).to_string();
            let shimmer = app.shimmering.as_deref() == Some(record.id.as_str());
            let missing = app.missing_images.contains(&record.id);
            let selected = index == app.selected;
            let id = record.id.clone();

            draw_image_card(
                f,
                *cell,
                &label,
                selected,
                shimmer.then_some(tick),
                missing,
                app.image_states.get_mut(&id),
            );
        }
    }
}

fn draw_image_card(
    f: &mut Frame,
    area: Rect,
    label: &str,
    selected: bool,
    shimmer_tick: Option<u64>,
    missing: bool,
    image_state: Option<&mut StatefulProtocol>,
) {
    let border_style = if selected {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);

    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.height < 3 || inner.width < 5 {
        return;
    }

    let card_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(2),    // thumbnail
            Constraint::Length(1), // author
        ])
        .split(inner);

    if let Some(state) = image_state {
        let image_widget = StatefulImage::new().resize(Resize::Scale(None));
        f.render_stateful_widget(image_widget, card_layout[0], state);
    } else {
        let (glyph, text) = if missing {
            ("✕", "No image")
        } else {
            ("🖼", "Loading...")
        };
        let placeholder = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(glyph, Style::default().fg(Color::Magenta))),
            Line::from(Span::styled(text, Style::default().fg(Color::DarkGray))),
        ])
        .alignment(Alignment::Center);
        f.render_widget(placeholder, card_layout[0]);
    }

    let label = truncate_text(label, inner.width as usize);
    let line = match shimmer_tick {
        Some(tick) => shimmer_line(&label, tick),
        None => Line::from(Span::styled(
            label,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
    };
    f.render_widget(Paragraph::new(line), card_layout[1]);
}

fn shimmer_line(label: &str, tick: u64) -> Line<'static> {
    let chars: Vec<char> = label.chars().collect();
    let levels = shimmer_levels(chars.len(), tick);

    let spans: Vec<Span> = chars
        .into_iter()
        .zip(levels)
        .map(|(c, level)| {
            let style = match level {
                2 => Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
                1 => Style::default().fg(Color::Gray),
                _ => Style::default().fg(Color::DarkGray),
            };
            Span::styled(c.to_string(), style)
        })
        .collect();

    Line::from(spans)
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let text = Line::from(vec![
        Span::styled("u", Style::default().fg(Color::Yellow)),
        Span::raw(": get images  "),
        Span::styled("←/→/↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(": select  "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(": strip vowels  "),
        Span::styled("s", Style::default().fg(Color::Yellow)),
        Span::raw(": shimmer  "),
        Span::styled("c", Style::default().fg(Color::Yellow)),
        Span::raw(": clear cache  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(": quit"),
    ]);

    let p = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .alignment(Alignment::Center);
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing;

    fn app_with_page() -> App {
        let mut app = App::with_picker(None);
        app.set_records(testing::page_records(1), 1);
        app.columns = 5;
        app
    }

    #[test]
    fn set_records_replaces_page_and_resets_view_state() {
        let mut app = app_with_page();
        app.selected = 7;
        app.strip_selected_author();
        app.mark_missing("3");

        app.set_records(testing::page_records(2), 2);

        assert!(app.state == AppState::Ready);
        assert_eq!(app.page, 2);
        assert_eq!(app.records.len(), 25);
        assert_eq!(app.records[0].id, "25");
        assert_eq!(app.selected, 0);
        assert!(app.author_labels.is_empty());
        assert!(app.missing_images.is_empty());
    }

    #[test]
    fn selection_moves_through_grid_and_clamps() {
        let mut app = app_with_page();

        app.move_selection(1, 0);
        assert_eq!(app.selected, 1);
        app.move_selection(0, 1);
        assert_eq!(app.selected, 6);
        app.move_selection(-10, 0);
        assert_eq!(app.selected, 0);
        app.move_selection(0, 100);
        assert_eq!(app.selected, 24);
    }

    #[test]
    fn strip_changes_only_the_label() {
        let mut app = app_with_page();
        app.selected = 2;

        app.strip_selected_author();

        let record = &app.records[2];
        assert_eq!(record.author, "Author 2");
        assert_eq!(app.author_label(record), "thr 2");
        assert_eq!(app.author_label(&app.records[3]), "Author 3");
    }

    #[test]
    fn shimmer_toggles_and_stops_on_move() {
        let mut app = app_with_page();

        app.toggle_shimmer();
        assert_eq!(app.shimmering.as_deref(), Some("0"));
        app.toggle_shimmer();
        assert!(app.shimmering.is_none());

        app.toggle_shimmer();
        app.move_selection(1, 0);
        assert!(app.shimmering.is_none());
    }

    #[test]
    fn record_id_ignores_replaced_pages() {
        let mut app = app_with_page();
        assert_eq!(app.record_id(1, 3).as_deref(), Some("3"));

        app.set_records(testing::page_records(2), 2);

        assert_eq!(app.record_id(1, 3), None);
        assert_eq!(app.record_id(2, 3).as_deref(), Some("28"));
        assert_eq!(app.record_id(2, 99), None);
    }

    #[test]
    fn add_image_clears_missing_marker() {
        let mut app = app_with_page();
        app.mark_missing("4");

        app.add_image("4", Arc::new(DynamicImage::new_rgb8(1, 1)));

        assert!(!app.missing_images.contains("4"));
    }

    #[test]
    fn empty_gallery_ignores_selection_keys() {
        let mut app = App::with_picker(None);
        app.move_selection(1, 1);
        app.strip_selected_author();
        app.toggle_shimmer();
        assert_eq!(app.selected, 0);
        assert!(app.shimmering.is_none());
    }
}
