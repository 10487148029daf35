use std::io;
use std::time::Duration;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::config::DEFAULT_INTERVAL_SECS;
use crate::domain::{Preset, SourceKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    Preset(Preset),
    Monitor {
        sources: Vec<SourceKey>,
        interval: Duration,
    },
    CreateDaemon,
    Exit,
}

const ITEMS: &[&str] = &[
    "Download multi-wavelength comparison set",
    "Download active region / flare observation set",
    "Quick space weather check",
    "Download prominence monitoring set",
    "Start continuous monitoring (Ctrl+C to stop)",
    "Create monitoring daemon script",
    "Exit",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    List,
    Sources,
    Interval,
}

#[derive(Debug)]
pub struct MenuState {
    screen: Screen,
    selected: usize,
    input: String,
    sources: Vec<SourceKey>,
    default_sources: Vec<SourceKey>,
    error: Option<String>,
}

impl MenuState {
    pub fn new(default_sources: Vec<SourceKey>) -> Self {
        Self {
            screen: Screen::List,
            selected: 0,
            input: String::new(),
            sources: Vec::new(),
            default_sources,
            error: None,
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<MenuChoice> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        match self.screen {
            Screen::List => self.handle_list_key(key.code),
            Screen::Sources | Screen::Interval => self.handle_prompt_key(key.code),
        }
    }

    fn handle_list_key(&mut self, code: KeyCode) -> Option<MenuChoice> {
        match code {
            KeyCode::Up => {
                self.selected = self.selected.checked_sub(1).unwrap_or(ITEMS.len() - 1);
                None
            }
            KeyCode::Down => {
                self.selected = (self.selected + 1) % ITEMS.len();
                None
            }
            KeyCode::Char(ch) if ch.is_ascii_digit() => {
                let index = ch.to_digit(10).unwrap_or(0) as usize;
                if (1..=ITEMS.len()).contains(&index) {
                    self.selected = index - 1;
                    return self.choose();
                }
                None
            }
            KeyCode::Enter => self.choose(),
            KeyCode::Esc | KeyCode::Char('q') => Some(MenuChoice::Exit),
            _ => None,
        }
    }

    fn choose(&mut self) -> Option<MenuChoice> {
        match self.selected {
            0 => Some(MenuChoice::Preset(Preset::Comparison)),
            1 => Some(MenuChoice::Preset(Preset::ActiveRegion)),
            2 => Some(MenuChoice::Preset(Preset::SpaceWeather)),
            3 => Some(MenuChoice::Preset(Preset::Prominence)),
            4 => {
                self.screen = Screen::Sources;
                self.input.clear();
                self.error = None;
                None
            }
            5 => Some(MenuChoice::CreateDaemon),
            _ => Some(MenuChoice::Exit),
        }
    }

    fn handle_prompt_key(&mut self, code: KeyCode) -> Option<MenuChoice> {
        match code {
            KeyCode::Char(ch) => {
                self.input.push(ch);
                None
            }
            KeyCode::Backspace => {
                self.input.pop();
                None
            }
            KeyCode::Esc => {
                self.screen = Screen::List;
                self.input.clear();
                self.error = None;
                None
            }
            KeyCode::Enter => self.submit_prompt(),
            _ => None,
        }
    }

    fn submit_prompt(&mut self) -> Option<MenuChoice> {
        let value = self.input.trim().to_string();
        match self.screen {
            Screen::Sources => {
                let parsed = if value.is_empty() {
                    Ok(self.default_sources.clone())
                } else {
                    let names = value
                        .split(',')
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(str::to_string)
                        .collect::<Vec<_>>();
                    SourceKey::parse_list(&names)
                };
                match parsed {
                    Ok(sources) if !sources.is_empty() => {
                        self.sources = sources;
                        self.screen = Screen::Interval;
                        self.input.clear();
                        self.error = None;
                    }
                    Ok(_) => self.error = Some("at least one source is required".to_string()),
                    Err(err) => self.error = Some(err.to_string()),
                }
                None
            }
            Screen::Interval => {
                let parsed = if value.is_empty() {
                    Ok(DEFAULT_INTERVAL_SECS)
                } else {
                    value.parse::<u64>()
                };
                match parsed {
                    Ok(secs) if secs > 0 => Some(MenuChoice::Monitor {
                        sources: std::mem::take(&mut self.sources),
                        interval: Duration::from_secs(secs),
                    }),
                    _ => {
                        self.error = Some(format!("invalid interval: {value}"));
                        None
                    }
                }
            }
            Screen::List => None,
        }
    }

    fn prompt_label(&self) -> String {
        match self.screen {
            Screen::Sources => {
                let defaults = self
                    .default_sources
                    .iter()
                    .map(SourceKey::as_str)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("Enter sources (comma-separated, Enter for {defaults}): ")
            }
            Screen::Interval => {
                format!("Enter interval in seconds (default {DEFAULT_INTERVAL_SECS}): ")
            }
            Screen::List => String::new(),
        }
    }
}

/// Restores the terminal even when drawing fails midway.
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = io::stdout().execute(LeaveAlternateScreen);
    }
}

pub struct Menu {
    state: MenuState,
}

impl Menu {
    pub fn new(default_sources: Vec<SourceKey>) -> Self {
        Self {
            state: MenuState::new(default_sources),
        }
    }

    pub fn run(&mut self) -> miette::Result<MenuChoice> {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;
        let _guard = TerminalGuard;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        loop {
            terminal
                .draw(|frame| draw_menu(frame, &self.state))
                .into_diagnostic()?;

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if let Some(choice) = self.state.handle_key(key) {
                        return Ok(choice);
                    }
                }
            }
        }
    }
}

fn draw_menu(frame: &mut ratatui::Frame, state: &MenuState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(ITEMS.len() as u16 + 2),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "SDO fetch",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  latest Solar Dynamics Observatory imagery"),
    ]))
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, chunks[0]);

    let items = ITEMS
        .iter()
        .enumerate()
        .map(|(index, label)| ListItem::new(format!("{}. {label}", index + 1)))
        .collect::<Vec<_>>();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Options"))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    let mut list_state = ListState::default();
    list_state.select(Some(state.selected));
    frame.render_stateful_widget(list, chunks[1], &mut list_state);

    let footer = match state.screen {
        Screen::List => vec![Line::from(
            "Up/Down or 1-7 to select, Enter to confirm, q to quit",
        )],
        Screen::Sources | Screen::Interval => {
            let mut lines = vec![Line::from(vec![
                Span::raw(state.prompt_label()),
                Span::styled(state.input.clone(), Style::default().fg(Color::Green)),
            ])];
            if let Some(error) = &state.error {
                lines.push(Line::from(Span::styled(
                    error.clone(),
                    Style::default().fg(Color::Red),
                )));
            }
            lines
        }
    };
    let footer = Paragraph::new(footer)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[2]);
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyModifiers;

    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(state: &mut MenuState, text: &str) {
        for ch in text.chars() {
            assert_eq!(state.handle_key(press(KeyCode::Char(ch))), None);
        }
    }

    fn defaults() -> Vec<SourceKey> {
        vec!["AIA_171".parse().unwrap()]
    }

    #[test]
    fn digits_pick_presets() {
        let mut state = MenuState::new(defaults());
        assert_eq!(
            state.handle_key(press(KeyCode::Char('3'))),
            Some(MenuChoice::Preset(Preset::SpaceWeather))
        );
    }

    #[test]
    fn arrows_wrap_around() {
        let mut state = MenuState::new(defaults());
        state.handle_key(press(KeyCode::Up));
        assert_eq!(state.selected(), ITEMS.len() - 1);
        assert_eq!(state.handle_key(press(KeyCode::Enter)), Some(MenuChoice::Exit));
    }

    #[test]
    fn monitor_prompts_use_defaults() {
        let mut state = MenuState::new(defaults());
        assert_eq!(state.handle_key(press(KeyCode::Char('5'))), None);
        assert_eq!(state.handle_key(press(KeyCode::Enter)), None);
        assert_eq!(
            state.handle_key(press(KeyCode::Enter)),
            Some(MenuChoice::Monitor {
                sources: defaults(),
                interval: Duration::from_secs(300),
            })
        );
    }

    #[test]
    fn monitor_prompts_reject_bad_input() {
        let mut state = MenuState::new(defaults());
        state.handle_key(press(KeyCode::Char('5')));
        type_text(&mut state, "AIA_171, NOPE");
        assert_eq!(state.handle_key(press(KeyCode::Enter)), None);
        assert!(state.error.is_some());

        for _ in 0.."AIA_171, NOPE".len() {
            state.handle_key(press(KeyCode::Backspace));
        }
        type_text(&mut state, "aia_304,HMI_Continuum");
        assert_eq!(state.handle_key(press(KeyCode::Enter)), None);
        type_text(&mut state, "0");
        assert_eq!(state.handle_key(press(KeyCode::Enter)), None);
        state.handle_key(press(KeyCode::Backspace));
        type_text(&mut state, "60");

        let choice = state.handle_key(press(KeyCode::Enter)).unwrap();
        let MenuChoice::Monitor { sources, interval } = choice else {
            panic!("expected monitor choice");
        };
        assert_eq!(
            sources.iter().map(SourceKey::as_str).collect::<Vec<_>>(),
            vec!["AIA_304", "HMI_Continuum"]
        );
        assert_eq!(interval, Duration::from_secs(60));
    }
}
