use color_eyre::eyre::Result;
use crossterm::{
    event::{
        Event,
        KeyCode,
        KeyEventKind,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use crypto_roulette::{
    asset::{
        ALL_ASSETS,
        Asset,
    },
    controller::{
        AppSnapshot,
        Page,
    },
    view,
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;

const WHEEL_CELL_WIDTH: usize = 8;
const HELP_BINDINGS: [(&str, &str); 7] = [
    ("←/→", "asset"),
    ("1-5", "pick"),
    ("Enter", "spin"),
    ("Tab", "page"),
    ("r", "refresh"),
    ("R", "reload events"),
    ("q/Esc", "quit"),
];

pub enum UserEvent {
    Quit,
    Redraw,
    NextAsset,
    PrevAsset,
    PickAsset(Asset),
    Spin,
    TogglePage,
    Refresh,
    ReloadEvents,
}

#[derive(Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    QuitModal,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    state.terminal = Some(Terminal::new(backend)?);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        let res = term.draw(|f| ui(f, state, snap)).map(|_| ());
        state.terminal = Some(term);
        res?;
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let key = match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => key,
        Event::Resize(_, _) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if state.mode == Mode::QuitModal {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        };
    }
    Some(match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            UserEvent::Redraw
        }
        KeyCode::Right | KeyCode::Char('l') => UserEvent::NextAsset,
        KeyCode::Left | KeyCode::Char('h') => UserEvent::PrevAsset,
        KeyCode::Char(c @ '1'..='5') => {
            let index = c as u8 - b'1';
            UserEvent::PickAsset(Asset::from_index(index)?)
        }
        KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('s') => UserEvent::Spin,
        KeyCode::Tab | KeyCode::BackTab => UserEvent::TogglePage,
        KeyCode::Char('r') => UserEvent::Refresh,
        KeyCode::Char('R') => UserEvent::ReloadEvents,
        _ => return None,
    })
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header + tabs
            Constraint::Min(18),   // page
            Constraint::Length(5), // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    match snap.page {
        Page::Roulette => draw_roulette_page(f, chunks[1], snap),
        Page::Lottery => draw_lottery_page(f, chunks[1], snap),
    }
    draw_status(f, chunks[2], snap);
    let help = Paragraph::new(view::help_line(&HELP_BINDINGS))
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, chunks[3]);
    draw_modals(f, state);
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(20)])
        .split(area);
    let selected = match snap.page {
        Page::Roulette => 0,
        Page::Lottery => 1,
    };
    let tabs = Tabs::new(vec!["🎰 Roulette", "🎟 Lottery"])
        .select(selected)
        .highlight_style(Style::default().fg(Color::Yellow).bold())
        .block(Block::default().borders(Borders::ALL).title("Crypto Roulette"));
    f.render_widget(tabs, cols[0]);

    let wallet = snap
        .player_short
        .as_deref()
        .unwrap_or("Not connected");
    let text = format!("Network: {} | Wallet: {}", snap.network, wallet);
    let widget =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(widget, cols[1]);
}

fn draw_cards(f: &mut Frame, area: Rect, cards: &[(&str, String, Option<&str>)]) {
    let constraints: Vec<Constraint> = cards
        .iter()
        .map(|_| Constraint::Ratio(1, cards.len() as u32))
        .collect();
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);
    for ((title, value, note), rect) in cards.iter().zip(cols.iter()) {
        let mut lines = vec![Line::from(value.clone()).bold()];
        if let Some(note) = note {
            lines.push(Line::styled(*note, Style::default().fg(Color::DarkGray)));
        }
        let card = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(*title));
        f.render_widget(card, *rect);
    }
}

fn draw_roulette_page(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // cards
            Constraint::Length(9), // picker + wheel
            Constraint::Min(6),    // recent spins
        ])
        .split(area);

    draw_cards(
        f,
        rows[0],
        &[
            ("Current Day", snap.current_day.clone(), None),
            ("Spin Cost", snap.spin_cost.clone(), None),
            ("Ticket Price", snap.ticket_price.clone(), None),
        ],
    );

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(28), Constraint::Min(30)])
        .split(rows[1]);
    draw_asset_picker(f, cols[0], snap);
    draw_wheel(f, cols[1], snap);
    draw_recent_spins(f, rows[2], snap);
}

fn draw_asset_picker(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines: Vec<Line> = ALL_ASSETS
        .iter()
        .enumerate()
        .map(|(i, asset)| {
            let chosen = snap.selected_asset == Some(*asset);
            let marker = if chosen { ">" } else { " " };
            let mut style = Style::default().fg(asset.color());
            if chosen {
                style = style.bold().reversed();
            }
            Line::from(vec![
                Span::raw(format!("{} {} ", marker, i + 1)),
                Span::styled(format!("{:<5}", asset.ticker()), style),
            ])
        })
        .collect();
    lines.push(Line::from(""));
    let button_style = if snap.spinning {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Black).bg(Color::Green).bold()
    };
    lines.push(Line::styled(format!("[ {} ]", snap.spin_label), button_style));
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Choose Your Crypto"));
    f.render_widget(widget, area);
}

fn draw_wheel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let wheel_line: Line = ALL_ASSETS
        .iter()
        .map(|asset| {
            let label = view::center_label(asset.ticker(), WHEEL_CELL_WIDTH);
            if snap.wheel == Some(*asset) {
                Span::styled(label, Style::default().fg(Color::Black).bg(asset.color()).bold())
            } else {
                Span::styled(label, Style::default().fg(asset.color()))
            }
        })
        .collect::<Vec<_>>()
        .into();

    let mut lines = vec![wheel_line, Line::from("")];
    match &snap.banner {
        Some(banner) => {
            let color = if banner.won { Color::Green } else { Color::Red };
            let headline = if banner.won {
                format!("🎉 {}", banner.headline)
            } else {
                format!("😢 {}", banner.headline)
            };
            lines.push(Line::styled(headline, Style::default().fg(color).bold()));
            lines.push(Line::from(banner.detail.clone()));
            if let Some(note) = banner.lottery_note {
                lines.push(Line::styled(note, Style::default().fg(Color::Yellow)));
            }
        }
        None if snap.spinning => {
            lines.push(Line::styled(
                "Waiting for the oracle...",
                Style::default().fg(Color::Yellow),
            ));
        }
        None => {}
    }
    let widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Wheel"));
    f.render_widget(widget, area);
}

fn draw_recent_spins(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Your Recent Spins");
    if snap.recent_spins.is_empty() {
        let empty = Paragraph::new(Line::styled("No spins yet", Style::default().fg(Color::DarkGray)))
            .block(block);
        f.render_widget(empty, area);
        return;
    }
    let rows = snap.recent_spins.iter().map(|spin| {
        let status_color = if spin.won { Color::Green } else { Color::Red };
        Row::new(vec![
            Cell::from(spin.sequence.clone()),
            Cell::from(spin.result.clone()),
            Cell::from(spin.status).style(Style::default().fg(status_color)),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(8),
        ],
    )
    .header(Row::new(vec!["Sequence #", "Result", "Status"]).bold())
    .block(block);
    f.render_widget(table, area);
}

fn draw_lottery_page(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // cards
            Constraint::Length(4), // eligibility
            Constraint::Length(6), // how it works
            Constraint::Min(6),    // recent winners
        ])
        .split(area);

    draw_cards(
        f,
        rows[0],
        &[
            ("Prize Pool", snap.pool.clone(), None),
            ("Total Entries", snap.total_entries.clone(), None),
            (
                "Your Entries",
                snap.your_entries.to_string(),
                Some(snap.entries_hint),
            ),
        ],
    );

    let eligible_color = if snap.your_entries > 0 {
        Color::Green
    } else {
        Color::Red
    };
    let mut status_lines = vec![Line::from(vec![
        Span::raw("Status: "),
        Span::styled(snap.eligibility, Style::default().fg(eligible_color).bold()),
    ])];
    if let Some(address) = &snap.player {
        status_lines.push(Line::from(format!("Address: {}", address)));
    }
    if let Some(winner) = &snap.today_winner {
        status_lines.push(Line::styled(
            format!("Today's winner: {}", winner),
            Style::default().fg(Color::Yellow),
        ));
    }
    let status = Paragraph::new(status_lines)
        .block(Block::default().borders(Borders::ALL).title("Your Status"));
    f.render_widget(status, rows[1]);

    let how = Paragraph::new(vec![
        Line::from("1. Spin the roulette and guess the winning crypto"),
        Line::from("2. Every win adds one entry to today's lottery"),
        Line::from("3. One entry is drawn each day and takes the whole pool"),
    ])
    .wrap(Wrap { trim: false })
    .block(Block::default().borders(Borders::ALL).title("How It Works"));
    f.render_widget(how, rows[2]);

    draw_recent_winners(f, rows[3], snap);
}

fn draw_recent_winners(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let block = Block::default().borders(Borders::ALL).title("Recent Winners");
    if snap.recent_winners.is_empty() {
        let empty = Paragraph::new(Line::styled(
            "No winners yet",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        f.render_widget(empty, area);
        return;
    }
    let rows = snap.recent_winners.iter().map(|w| {
        Row::new(vec![
            Cell::from(w.day.clone()),
            Cell::from(w.winner.clone()),
            Cell::from(w.prize.clone()).style(Style::default().fg(Color::Green)),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(16),
            Constraint::Min(10),
        ],
    )
    .header(Row::new(vec!["Day", "Winner", "Prize"]).bold())
    .block(block);
    f.render_widget(table, area);
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let status_widget = if snap.errors.is_empty() {
        let mut lines: Vec<Line> = Vec::new();
        if snap.status.trim().is_empty() {
            lines.push(Line::from("Ready"));
        } else {
            lines.push(Line::from(snap.status.clone()));
        }
        if let Some(warning) = &snap.read_warning {
            lines.push(Line::styled(
                format!("Retrying: {}", warning),
                Style::default().fg(Color::Yellow),
            ));
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let mut lines = vec![Line::from(snap.status.clone())];
        for e in snap.errors.iter().rev() {
            lines.push(Line::styled(e.clone(), Style::default().fg(Color::Red)));
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(status_widget, area);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    match &state.mode {
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit crypto roulette? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}
