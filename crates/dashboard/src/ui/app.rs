//! UI control loop

use super::surface::{Surface, TerminalSurface};
use crate::dashboard::Dashboard;
use crate::signals::SignalHandler;
use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use obd_telemetry::TelemetrySource;
use std::io::{self, Stdout};
use std::time::Duration;
use tracing::info;

/// Run the dashboard UI until the user exits (q/Ctrl-C/Esc) or a signal arrives.
///
/// The terminal is restored on every exit path. Stopping the dashboard is
/// left to the caller.
pub fn run<S: TelemetrySource>(
    dashboard: &mut Dashboard<S>,
    tick: Duration,
    signals: &SignalHandler,
) -> io::Result<()> {
    let mut stdout = io::stdout();

    terminal::enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, Hide)?;

    let result = run_inner(&mut stdout, dashboard, tick, signals);

    // Always restore terminal state.
    let _ = execute!(stdout, Show, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();

    result
}

fn run_inner<S: TelemetrySource>(
    stdout: &mut Stdout,
    dashboard: &mut Dashboard<S>,
    tick: Duration,
    signals: &SignalHandler,
) -> io::Result<()> {
    let title = format!("OBD-II Dashboard v{}", env!("CARGO_PKG_VERSION"));
    let mut surface = TerminalSurface::new(stdout, title, terminal::size()?);

    loop {
        if signals.should_shutdown() {
            info!("Shutdown signal received");
            return Ok(());
        }

        dashboard.pump();
        surface.draw(dashboard.gauges())?;

        if !event::poll(tick)? {
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    info!("Quit requested");
                    return Ok(());
                }
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    info!("Quit requested");
                    return Ok(());
                }
                _ => {}
            },
            Event::Resize(cols, rows) => surface.resize((cols, rows)),
            _ => {}
        }
    }
}
