use super::app_logic::TuiApp;
use crate::store::SelectionState;
use crate::tree_builder::build_tree_labels;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use std::path::PathBuf;

fn draw_help_block(f: &mut Frame, app: &TuiApp, area: Rect) {
    let help_text_lines_content = vec![
        Line::from("Arrows/jk: Nav | Space/Enter: Sel | Tab/o: Fold | -: Collapse All | q/Esc: Quit"),
        Line::from("y: Copy | w: Write selected_files.txt | r: Reset | c: Clear | R/F5: Refresh"),
    ];
    let title = format!("LLM Context – {}", app.store.root().display());
    let help_paragraph = Paragraph::new(help_text_lines_content)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(help_paragraph, area);
}

fn draw_main_list_block(f: &mut Frame, app: &mut TuiApp, area: Rect) {
    app.list_viewport_height = area.height.saturating_sub(2) as usize;
    app.ensure_selection_is_visible_in_viewport();

    let visible_item_indices = app.get_visible_item_indices();
    let tree_input: Vec<(PathBuf, bool)> = visible_item_indices
        .iter()
        .map(|&idx| (app.rows[idx].path.clone(), app.rows[idx].is_dir))
        .collect();
    let labels = build_tree_labels(&tree_input);

    let window_end = (app.scroll_offset + app.list_viewport_height).min(visible_item_indices.len());
    let window = app.scroll_offset.min(window_end)..window_end;

    let list_items: Vec<ListItem> = window
        .clone()
        .map(|pos| {
            let idx = visible_item_indices[pos];
            let selection_prefix = match app.row_state(idx) {
                SelectionState::NotSelected => "[ ] ",
                SelectionState::PartiallySelected => "[-] ",
                SelectionState::FullySelected => "[x] ",
            };
            let row = &app.rows[idx];
            let expansion_prefix = if row.is_dir {
                if row.is_expanded { "[-] " } else { "[+] " }
            } else {
                "    "
            };
            let (is_dir, excluded) = (row.is_dir, row.excluded);
            let mut text = format!("{}{}{}", expansion_prefix, selection_prefix, labels[pos]);
            if is_dir {
                let count = app.selected_count(idx);
                if count > 0 {
                    text.push_str(&format!("  ({} selected)", count));
                }
            }
            let style = if excluded {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            ListItem::new(text).style(style)
        })
        .collect();

    let list_title = format!(
        "Files ({} selected)",
        app.selected_count_total()
    );
    let list_widget = List::new(list_items)
        .block(Block::default().borders(Borders::ALL).title(list_title))
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        )
        .highlight_symbol("❯ ");

    let mut list_state_for_view = ListState::default();
    if let Some(pos) = visible_item_indices
        .iter()
        .position(|&idx| idx == app.current_selection_idx)
    {
        if window.contains(&pos) {
            list_state_for_view.select(Some(pos - window.start));
        }
    }
    f.render_stateful_widget(list_widget, area, &mut list_state_for_view);
}

fn draw_status_line(f: &mut Frame, app: &TuiApp, area: Rect) {
    let line = match &app.status {
        Some(outcome) if outcome.success => {
            Line::from(outcome.message.as_str()).style(Style::default().fg(Color::Green))
        }
        Some(outcome) => Line::from(outcome.message.as_str()).style(Style::default().fg(Color::Red)),
        None => Line::from(""),
    };
    f.render_widget(Paragraph::new(line), area);
}

pub(super) fn ui_frame(frame: &mut Frame, app: &mut TuiApp) {
    let help_lines = 2;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(help_lines + 2),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_help_block(frame, app, chunks[0]);
    draw_main_list_block(frame, app, chunks[1]);
    draw_status_line(frame, app, chunks[2]);
}
