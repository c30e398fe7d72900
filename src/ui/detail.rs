use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, List, ListItem, Paragraph, Wrap},
};

use crate::app::{AnalysisState, DetailState, DetailTab, MirrorState, StreamOverlay};
use crate::catalog::{Mirror, TrackKind};

use super::widgets::{centered_rect, titled_block};

pub fn render_detail_view(frame: &mut Frame, area: Rect, detail: &mut DetailState, accent: Color) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Min(3),
        ])
        .split(area);

    render_header(frame, chunks[0], detail, accent);
    render_tab_bar(frame, chunks[1], detail, accent);

    match detail.tab {
        DetailTab::Analysis => render_analysis_tab(frame, chunks[2], detail, accent),
        DetailTab::Episodes => render_episodes_tab(frame, chunks[2], detail, accent),
    }

    if let Some(stream) = &detail.stream {
        render_stream_overlay(frame, area, stream, accent);
    }
}

fn render_header(frame: &mut Frame, area: Rect, detail: &DetailState, accent: Color) {
    let anime = &detail.anime;

    let score = if anime.score > 0.0 {
        format!("★ {:.1}", anime.score)
    } else {
        "★ -".to_string()
    };
    let year = if anime.year > 0 {
        format!("{}", anime.year)
    } else {
        "----".to_string()
    };

    let meta = Line::from(vec![
        Span::styled(score, Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(year, Style::default().fg(Color::Gray)),
        Span::raw("  "),
        Span::styled(&anime.status, Style::default().fg(accent)),
        Span::raw("  "),
        Span::styled(&anime.kind, Style::default().fg(Color::Gray)),
        Span::raw("  "),
        Span::styled(
            format!("{} episodes", anime.episodes),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(vec![Line::raw(""), meta]).block(
        titled_block(&anime.title, accent)
            .title_style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
    );

    frame.render_widget(header, area);
}

fn render_tab_bar(frame: &mut Frame, area: Rect, detail: &DetailState, accent: Color) {
    let tab = |label: String, active: bool| {
        if active {
            Span::styled(
                label,
                Style::default().fg(accent).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(label, Style::default().fg(Color::DarkGray))
        }
    };

    let line = Line::from(vec![
        Span::raw(" "),
        tab(
            "[a] AI Analysis".to_string(),
            detail.tab == DetailTab::Analysis,
        ),
        Span::raw("   "),
        tab(
            format!("[e] Episodes ({})", detail.anime.episodes),
            detail.tab == DetailTab::Episodes,
        ),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

fn render_analysis_tab(frame: &mut Frame, area: Rect, detail: &DetailState, accent: Color) {
    let content = match &detail.analysis {
        AnalysisState::Loading => Paragraph::new("Analysing with Gemini...")
            .style(Style::default().fg(accent)),
        AnalysisState::Unavailable => Paragraph::new("Analysis unavailable.")
            .style(Style::default().fg(Color::DarkGray)),
        AnalysisState::Ready(analysis) => {
            let mut lines = vec![
                Line::styled(
                    "SYNOPSIS",
                    Style::default().fg(accent).add_modifier(Modifier::BOLD),
                ),
                Line::raw(""),
            ];
            lines.extend(analysis.summary.lines().map(Line::raw));
            lines.push(Line::raw(""));
            lines.push(Line::styled(
                "HIGHLIGHTS",
                Style::default().fg(accent).add_modifier(Modifier::BOLD),
            ));
            lines.push(Line::raw(""));
            lines.extend(analysis.why_watch.lines().map(Line::raw));
            lines.push(Line::raw(""));
            lines.push(Line::from(vec![
                Span::styled("Expert rating: ", Style::default().fg(Color::Gray)),
                Span::styled(
                    analysis.rating.clone(),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
            ]));

            Paragraph::new(lines).wrap(Wrap { trim: false })
        }
    };

    frame.render_widget(content.block(titled_block("AI Analysis", accent)), area);
}

fn render_episodes_tab(frame: &mut Frame, area: Rect, detail: &mut DetailState, accent: Color) {
    let panel_height = detail
        .panel
        .as_ref()
        .map(|panel| match &panel.mirrors {
            MirrorState::Ready(mirrors) if !mirrors.is_empty() => mirrors.len() as u16 + 4,
            _ => 3,
        })
        .unwrap_or(0);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(panel_height),
            Constraint::Min(3),
        ])
        .split(area);

    render_pager(frame, chunks[0], detail);

    if detail.panel.is_some() {
        render_episode_panel(frame, chunks[1], detail, accent);
    }

    render_episode_list(frame, chunks[2], detail, accent);
}

fn render_pager(frame: &mut Frame, area: Rect, detail: &DetailState) {
    let mut spans = vec![
        Span::raw(" "),
        Span::styled("h/l", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(":Page "),
        Span::styled(
            format!("[{}/{}]", detail.page, detail.total_pages),
            Style::default().fg(Color::Cyan),
        ),
    ];

    if detail.episodes_loading {
        spans.push(Span::styled(
            "  loading...",
            Style::default().fg(Color::DarkGray),
        ));
    } else if detail
        .episodes
        .as_ref()
        .is_some_and(|d| d.next.available())
    {
        spans.push(Span::styled("  ▸", Style::default().fg(Color::DarkGray)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn mirror_line<'a>(idx: usize, mirror: &'a Mirror) -> Line<'a> {
    let color = match mirror.track {
        TrackKind::Sub => Color::Cyan,
        TrackKind::Dub => Color::Magenta,
    };
    Line::from(vec![
        Span::styled(
            format!("  [{}] ", idx + 1),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(&mirror.name, Style::default().fg(Color::White)),
    ])
}

fn render_episode_panel(frame: &mut Frame, area: Rect, detail: &DetailState, accent: Color) {
    let Some(panel) = &detail.panel else {
        return;
    };

    let title = format!("Episode {}", panel.episode.episode);

    let content: Vec<Line> = match &panel.mirrors {
        MirrorState::Loading => vec![Line::styled(
            "Fetching mirrors...",
            Style::default().fg(accent),
        )],
        MirrorState::Failed => vec![Line::styled(
            "Connection failed.",
            Style::default().fg(Color::Red),
        )],
        MirrorState::Ready(mirrors) if mirrors.is_empty() => vec![Line::styled(
            "No mirrors found.",
            Style::default().fg(Color::Red),
        )],
        MirrorState::Ready(mirrors) => {
            let mut lines = Vec::new();
            for kind in [TrackKind::Sub, TrackKind::Dub] {
                let group: Vec<(usize, &Mirror)> = mirrors
                    .iter()
                    .enumerate()
                    .filter(|(_, m)| m.track == kind)
                    .collect();
                if group.is_empty() {
                    continue;
                }
                lines.push(Line::styled(
                    kind.as_display(),
                    Style::default()
                        .fg(Color::Gray)
                        .add_modifier(Modifier::BOLD),
                ));
                for (idx, mirror) in group {
                    lines.push(mirror_line(idx, mirror));
                }
            }
            lines
        }
    };

    let panel_widget = Paragraph::new(content).block(titled_block(&title, accent));
    frame.render_widget(panel_widget, area);
}

fn render_episode_list(frame: &mut Frame, area: Rect, detail: &mut DetailState, accent: Color) {
    let Some(data) = &detail.episodes else {
        let text = if detail.episodes_loading {
            "Loading episodes..."
        } else {
            "No episodes found."
        };
        let empty = Paragraph::new(text)
            .block(titled_block("Episodes", accent))
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    };

    if data.episodes.is_empty() {
        let empty = Paragraph::new("No episodes found.")
            .block(titled_block("Episodes", accent))
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    }

    let open_session = detail.panel.as_ref().map(|p| p.episode.session.as_str());

    let items: Vec<ListItem> = data
        .episodes
        .iter()
        .map(|ep| {
            let marker = if open_session == Some(ep.session.as_str()) {
                Span::styled("● ", Style::default().fg(accent))
            } else {
                Span::raw("  ")
            };
            let line = Line::from(vec![
                marker,
                Span::styled(
                    format!("EP {}", ep.episode),
                    Style::default().fg(Color::White),
                ),
            ]);
            ListItem::new(line)
        })
        .collect();

    let title = format!("Episodes · {} total", data.total);
    let list = List::new(items)
        .block(titled_block(&title, accent))
        .highlight_style(
            Style::default()
                .bg(accent)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");

    frame.render_stateful_widget(list, area, &mut detail.episode_state);
}

fn render_stream_overlay(frame: &mut Frame, area: Rect, stream: &StreamOverlay, accent: Color) {
    let overlay = centered_rect(area, area.width.saturating_sub(8).min(72), 8);
    frame.render_widget(Clear, overlay);

    let status = if stream.launched {
        Line::styled(
            "Streaming in external player.",
            Style::default().fg(Color::Green),
        )
    } else {
        Line::styled(
            "Could not launch player. Open the URL manually.",
            Style::default().fg(Color::Red),
        )
    };

    let lines = vec![
        Line::raw(""),
        Line::from(vec![
            Span::styled("Mirror: ", Style::default().fg(Color::Gray)),
            Span::styled(&stream.name, Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::styled("URL: ", Style::default().fg(Color::Gray)),
            Span::styled(&stream.url, Style::default().fg(Color::Cyan)),
        ]),
        Line::raw(""),
        status,
    ];

    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(titled_block("Stream", accent));
    frame.render_widget(widget, overlay);
}
