use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use crate::catalog::SearchResult;

use super::widgets::titled_block;

fn truncate_title(title: &str, max_width: usize) -> String {
    if title.is_empty() {
        return "Unknown".to_string();
    }

    if max_width <= 3 {
        return "...".to_string();
    }

    if title.chars().count() <= max_width {
        return title.to_string();
    }

    let prefix: String = title.chars().take(max_width - 3).collect();
    format!("{}...", prefix.trim_end())
}

pub fn render_search_view(
    frame: &mut Frame,
    area: Rect,
    query: &str,
    results: &[SearchResult],
    list_state: &mut ListState,
    is_loading: bool,
    message: Option<&str>,
    has_searched: bool,
    accent: Color,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    render_search_input(frame, chunks[0], query, is_loading, accent);

    if !has_searched {
        render_hero(frame, chunks[1], accent);
    } else if let Some(message) = message {
        render_message(frame, chunks[1], message, accent);
    } else {
        render_search_results(frame, chunks[1], results, list_state, accent);
    }
}

fn render_search_input(
    frame: &mut Frame,
    area: Rect,
    query: &str,
    is_loading: bool,
    accent: Color,
) {
    let title = if is_loading {
        " Search series (loading...) "
    } else {
        " Search series "
    };

    let input = Paragraph::new(query)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent))
                .title(title)
                .title_style(Style::default().fg(accent).add_modifier(Modifier::BOLD)),
        )
        .style(Style::default().fg(Color::White));

    frame.render_widget(input, area);

    frame.set_cursor_position((area.x + query.len() as u16 + 1, area.y + 1));
}

fn render_hero(frame: &mut Frame, area: Rect, accent: Color) {
    let y_offset = area.height / 3;
    let lines = vec![
        Line::styled(
            "ZENITH",
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        ),
        Line::from(""),
        Line::styled(
            "A minimalist gateway to the anime multiverse.",
            Style::default().fg(Color::DarkGray),
        ),
        Line::styled(
            "Type a series name and press Enter.",
            Style::default().fg(Color::DarkGray),
        ),
    ];

    let hero_area = Rect {
        x: area.x,
        y: area.y + y_offset,
        width: area.width,
        height: area.height.saturating_sub(y_offset),
    };

    let hero = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(hero, hero_area);
}

fn render_message(frame: &mut Frame, area: Rect, message: &str, accent: Color) {
    let para = Paragraph::new(message.to_string())
        .block(titled_block("Results", accent))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(para, area);
}

fn render_search_results(
    frame: &mut Frame,
    area: Rect,
    results: &[SearchResult],
    list_state: &mut ListState,
    accent: Color,
) {
    if results.is_empty() {
        let empty = Paragraph::new("No results. Type to search, Enter to submit.")
            .block(titled_block("Results", accent))
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    }

    let title_width = area.width.saturating_sub(34) as usize;

    let items: Vec<ListItem> = results
        .iter()
        .map(|r| {
            let score_color = if r.score >= 8.0 {
                Color::Green
            } else if r.score >= 6.0 {
                Color::Yellow
            } else if r.score > 0.0 {
                Color::Red
            } else {
                Color::DarkGray
            };

            let year = if r.year > 0 {
                format!("{}", r.year)
            } else {
                "----".to_string()
            };

            let line = Line::from(vec![
                Span::styled(
                    format!("{:>4.1}", r.score),
                    Style::default().fg(score_color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(" │ "),
                Span::styled(year, Style::default().fg(Color::Cyan)),
                Span::raw(" │ "),
                Span::styled(format!("{:<5}", r.kind), Style::default().fg(Color::Gray)),
                Span::raw(" │ "),
                Span::styled(
                    format!("{:>3} eps", r.episodes),
                    Style::default().fg(Color::Gray),
                ),
                Span::raw(" │ "),
                Span::styled(
                    truncate_title(&r.title, title_width),
                    Style::default().fg(Color::White),
                ),
            ]);

            ListItem::new(line)
        })
        .collect();

    let results_title = format!("Results ({})", results.len());
    let list = List::new(items)
        .block(titled_block(&results_title, accent))
        .highlight_style(
            Style::default()
                .bg(accent)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");

    frame.render_stateful_widget(list, area, list_state);
}
