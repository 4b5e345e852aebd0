use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::summary::{GroupSummary, SummaryError};
use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;
/// Width of one box-plot body in cells (odd, so it centers on the whisker).
const BOX_WIDTH: u16 = 7;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::BoxPlot => render_box_plot(self, area, buf),
            AppState::Replay => render_replay(self, area, buf),
        }
    }
}

/// Shared y-domain across all groups: lowest lower whisker to highest upper
/// whisker, so the columns stay positionally comparable. None when no group
/// has data.
pub fn chart_domain(summaries: &[Result<GroupSummary, SummaryError>]) -> Option<(f64, f64)> {
    let mut domain: Option<(f64, f64)> = None;
    for summary in summaries.iter().flatten() {
        domain = Some(match domain {
            None => (summary.min, summary.max),
            Some((lo, hi)) => (lo.min(summary.min), hi.max(summary.max)),
        });
    }
    domain
}

/// Map a value onto a row index, row 0 being the top of the chart (the
/// domain maximum). Values outside the domain clamp to the edge rows.
pub fn value_to_row(value: f64, domain: (f64, f64), height: u16) -> u16 {
    let (lo, hi) = domain;
    if height <= 1 || hi <= lo {
        return height.saturating_sub(1) / 2;
    }
    let frac = ((value.clamp(lo, hi)) - lo) / (hi - lo);
    ((1.0 - frac) * (height - 1) as f64).round() as u16
}

/// Tooltip-style readout for the selected group.
pub fn format_stats_line(summary: &GroupSummary) -> String {
    let dropped = if summary.excluded > 0 {
        format!("   dropped={}", summary.excluded)
    } else {
        String::new()
    };
    format!(
        "Min {:.1}   Q1 {:.1}   Med {:.1}   Q3 {:.1}   Max {:.1}   n={}{}",
        summary.min, summary.q1, summary.median, summary.q3, summary.max, summary.count, dropped
    )
}

fn render_box_plot(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // title
            Constraint::Min(5),    // chart + group labels
            Constraint::Length(1), // selected group stats
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    let title = Paragraph::new(Span::styled(
        format!("{} (ms) by medication group", app.metric),
        bold_style,
    ))
    .alignment(Alignment::Center);
    title.render(chunks[0], buf);

    let legend = Paragraph::new(Span::styled(
        "(m)etric / ←→ or 1-5 group / (enter) replay / (esc)ape",
        italic_style,
    ))
    .alignment(Alignment::Center);
    legend.render(chunks[4], buf);

    let chart = chunks[1];
    let group_count = app.summaries.len() as u16;
    if chart.height < 4 || group_count == 0 || chart.width < group_count * BOX_WIDTH {
        return;
    }

    let Some(domain) = chart_domain(&app.summaries) else {
        let empty = Paragraph::new("no data in any group")
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        empty.render(chart, buf);
        return;
    };

    // Bottom chart row is reserved for the group labels.
    let plot_height = chart.height - 1;
    let col_width = chart.width / group_count;

    for (i, result) in app.summaries.iter().enumerate() {
        let center = chart.x + i as u16 * col_width + col_width / 2;
        let selected = i == app.selected;
        let style = if selected {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        match result {
            Ok(summary) => {
                draw_box_column(summary, domain, center, chart.y, plot_height, style, buf)
            }
            Err(_) => {
                let label = "no data";
                let x = center.saturating_sub(label.width() as u16 / 2);
                buf.set_string(
                    x,
                    chart.y + plot_height / 2,
                    label,
                    Style::default().add_modifier(Modifier::DIM),
                );
            }
        }

        let name = &app.store.groups()[i].name;
        let label_style = if selected {
            bold_style.fg(Color::Cyan)
        } else {
            Style::default()
        };
        let x = center.saturating_sub(name.width() as u16 / 2);
        buf.set_string(x, chart.y + plot_height, name, label_style);
    }

    let stats_text = match &app.summaries[app.selected] {
        Ok(summary) => format_stats_line(summary),
        Err(err) => err.to_string(),
    };
    let stats = Paragraph::new(Span::styled(stats_text, bold_style)).alignment(Alignment::Center);
    stats.render(chunks[2], buf);
}

fn draw_box_column(
    summary: &GroupSummary,
    domain: (f64, f64),
    center: u16,
    top: u16,
    height: u16,
    style: Style,
    buf: &mut Buffer,
) {
    let half = BOX_WIDTH / 2;
    let row_max = top + value_to_row(summary.max, domain, height);
    let row_q3 = top + value_to_row(summary.q3, domain, height);
    let row_med = top + value_to_row(summary.median, domain, height);
    let row_q1 = top + value_to_row(summary.q1, domain, height);
    let row_min = top + value_to_row(summary.min, domain, height);

    let mut put = |x: u16, y: u16, symbol: &str| {
        if let Some(cell) = buf.cell_mut((x, y)) {
            cell.set_symbol(symbol);
            cell.set_style(style);
        }
    };

    // Whisker caps and stems.
    for x in center.saturating_sub(half)..=center + half {
        put(x, row_max, "─");
        put(x, row_min, "─");
    }
    for y in row_max + 1..row_q3 {
        put(center, y, "│");
    }
    for y in row_q1 + 1..row_min {
        put(center, y, "│");
    }

    // Box body between the quartiles, median drawn solid on top.
    for y in row_q3..=row_q1 {
        for x in center.saturating_sub(half)..=center + half {
            put(x, y, "▓");
        }
    }
    for x in center.saturating_sub(half)..=center + half {
        put(x, row_med, "█");
    }
}

fn render_replay(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // title
            Constraint::Min(7),    // key widget
            Constraint::Length(1), // event info
            Constraint::Length(1), // progress + tempo
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    let group = &app.store.groups()[app.selected];

    let title = Paragraph::new(Span::styled(
        format!("{} keystroke rhythm", group.name),
        bold_style,
    ))
    .alignment(Alignment::Center);
    title.render(chunks[0], buf);

    // One big key, pressed while a hold interval is replaying.
    let key_area = chunks[1];
    let key_width = 21.min(key_area.width);
    let key_height = 7.min(key_area.height);
    let key_rect = Rect::new(
        key_area.x + (key_area.width - key_width) / 2,
        key_area.y + (key_area.height - key_height) / 2,
        key_width,
        key_height,
    );

    let key_style = if app.replay.pressed {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(key_style)
        .render(key_rect, buf);
    if app.replay.pressed {
        for y in key_rect.y + 1..key_rect.y + key_rect.height.saturating_sub(1) {
            for x in key_rect.x + 1..key_rect.x + key_rect.width.saturating_sub(1) {
                if let Some(cell) = buf.cell_mut((x, y)) {
                    cell.set_symbol("█");
                    cell.set_style(key_style);
                }
            }
        }
    }

    let info_text = match app.replay.last_info {
        Some((hold, flight)) => format!("Hold: {:.1} ms   Flight: {:.1} ms", hold, flight),
        None => String::from("waiting for first keystroke"),
    };
    Paragraph::new(Span::styled(info_text, bold_style))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    let progress_text = if app.replay.ended {
        format!(
            "finished {} events   tempo {:.2}×",
            group.events.len(),
            app.scheduler.tempo()
        )
    } else {
        let position = app
            .scheduler
            .current_index()
            .map(|i| i + 1)
            .unwrap_or(0);
        format!(
            "event {}/{}   tempo {:.2}×",
            position,
            group.events.len(),
            app.scheduler.tempo()
        )
    };
    Paragraph::new(progress_text)
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    let legend = Paragraph::new(Span::styled(
        "(space) restart / 1-5 group / (+/-) tempo / (b)ack / (esc)ape",
        italic_style,
    ))
    .alignment(Alignment::Center);
    legend.render(chunks[5], buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventStore, GroupEvents, Metric, TypingEvent};
    use crate::App;
    use ratatui::{buffer::Buffer, layout::Rect};

    fn event(hold: f64, flight: f64) -> TypingEvent {
        TypingEvent {
            hand: "L".into(),
            hold,
            direction: "LL".into(),
            latency: hold + flight,
            flight,
        }
    }

    fn test_app() -> App {
        let store = EventStore::from_groups(vec![
            GroupEvents {
                name: "Levadopa".into(),
                events: vec![event(100.0, 50.0), event(80.0, 0.0)],
            },
            GroupEvents {
                name: "No Med".into(),
                events: vec![],
            },
        ]);
        App::new(store, Metric::Hold, 1.0).unwrap()
    }

    fn rendered_text(app: &App, area: Rect) -> String {
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_chart_domain_spans_all_groups() {
        let a = GroupSummary {
            group: "a".into(),
            metric: Metric::Hold,
            count: 3,
            excluded: 0,
            q1: 2.0,
            median: 3.0,
            q3: 4.0,
            iqr: 2.0,
            min: 1.0,
            max: 5.0,
        };
        let mut b = a.clone();
        b.min = 0.5;
        b.max = 9.0;

        let summaries = vec![Ok(a), Ok(b)];
        assert_eq!(chart_domain(&summaries), Some((0.5, 9.0)));
    }

    #[test]
    fn test_chart_domain_empty() {
        let summaries: Vec<Result<GroupSummary, SummaryError>> =
            vec![Err(SummaryError::EmptySample {
                group: "g".into(),
                metric: Metric::Hold,
            })];
        assert_eq!(chart_domain(&summaries), None);
    }

    #[test]
    fn test_value_to_row_endpoints() {
        assert_eq!(value_to_row(10.0, (0.0, 10.0), 11), 0);
        assert_eq!(value_to_row(0.0, (0.0, 10.0), 11), 10);
        assert_eq!(value_to_row(5.0, (0.0, 10.0), 11), 5);
    }

    #[test]
    fn test_value_to_row_clamps_and_degenerates() {
        assert_eq!(value_to_row(99.0, (0.0, 10.0), 11), 0);
        assert_eq!(value_to_row(-5.0, (0.0, 10.0), 11), 10);
        // Degenerate domain lands in the middle.
        assert_eq!(value_to_row(3.0, (3.0, 3.0), 11), 5);
    }

    #[test]
    fn test_format_stats_line() {
        let summary = GroupSummary {
            group: "g".into(),
            metric: Metric::Hold,
            count: 10,
            excluded: 0,
            q1: 3.25,
            median: 5.5,
            q3: 7.75,
            iqr: 4.5,
            min: 1.0,
            max: 10.0,
        };
        assert_eq!(
            format_stats_line(&summary),
            "Min 1.0   Q1 3.3   Med 5.5   Q3 7.8   Max 10.0   n=10"
        );
    }

    #[test]
    fn test_format_stats_line_with_dropped() {
        let summary = GroupSummary {
            group: "g".into(),
            metric: Metric::Hold,
            count: 2,
            excluded: 3,
            q1: 1.0,
            median: 1.5,
            q3: 2.0,
            iqr: 1.0,
            min: 1.0,
            max: 2.0,
        };
        assert!(format_stats_line(&summary).ends_with("dropped=3"));
    }

    #[test]
    fn test_box_plot_renders_groups_and_no_data() {
        let app = test_app();
        let rendered = rendered_text(&app, Rect::new(0, 0, 100, 30));

        assert!(rendered.contains("Hold (ms) by medication group"));
        assert!(rendered.contains("Levadopa"));
        assert!(rendered.contains("no data"));
    }

    #[test]
    fn test_replay_screen_renders() {
        let mut app = test_app();
        app.state = AppState::Replay;
        let rendered = rendered_text(&app, Rect::new(0, 0, 100, 30));

        assert!(rendered.contains("Levadopa keystroke rhythm"));
        assert!(rendered.contains("waiting for first keystroke"));
        assert!(rendered.contains("tempo 1.00"));
    }

    #[test]
    fn test_render_small_area_does_not_panic() {
        let app = test_app();
        for (w, h) in [(10u16, 4u16), (200, 5), (20, 50), (80, 24)] {
            let area = Rect::new(0, 0, w, h);
            let mut buffer = Buffer::empty(area);
            (&app).render(area, &mut buffer);
            assert_eq!(*buffer.area(), area);
        }
    }
}
