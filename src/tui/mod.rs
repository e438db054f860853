mod app_logic;
mod app_state;
mod event_handler;
mod ui_renderer;

pub use app_state::TreeRow;

pub use self::run_tui::run_tui;

// Terminal setup/teardown and the main loop
mod run_tui {
    use super::app_logic::TuiApp;
    use super::event_handler::handle_events;
    use super::ui_renderer::ui_frame;
    use crate::clipboard::ClipboardSink;
    use crate::store::SelectionStore;
    use anyhow::Result;
    use crossterm::{
        event::{DisableMouseCapture, EnableMouseCapture},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    };
    use ratatui::prelude::{CrosstermBackend, Terminal};
    use std::io::{self, Stdout};

    /// Runs the interactive tree view until the user quits. Every toggle is
    /// applied to (and persisted by) `store` immediately.
    pub fn run_tui(store: &mut SelectionStore, clipboard: &mut dyn ClipboardSink) -> Result<()> {
        let mut app = TuiApp::new(store, clipboard);
        let mut terminal = init_terminal()?;

        let mut result = Ok(());
        while !app.quit {
            if let Err(err) = terminal.draw(|frame| ui_frame(frame, &mut app)) {
                result = Err(err.into());
                break;
            }
            if let Err(err) = handle_events(&mut app) {
                result = Err(err);
                break;
            }
        }

        restore_terminal(terminal)?;
        result
    }

    fn init_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend).map_err(Into::into)
    }

    fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor().map_err(Into::into)
    }
}
