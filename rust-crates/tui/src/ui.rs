use crate::{
    app::{
        AppSnapshot,
        Tab,
    },
    format::{
        format_duration,
        format_round_id,
        format_strk,
        format_timestamp,
        short_address,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEventKind,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use luck3_client::{
    HistoryRound,
    RoundId,
    RoundStatus,
    TxStatus,
    ViewerTicket,
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use tokio::sync::mpsc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Redraw,
    SwitchTab(Tab),
    Refresh,
    LoadMore,
    OpenBuyModal,
    BuyTicket { guess: u8 },
    Claim { round_id: RoundId },
    OpenAdminModal,
    Admin { action: AdminAction, input: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminAction {
    CreateRound,
    DrawWinner,
    DrawRoundsUpTo,
    TriggerDraw,
    Withdraw,
}

impl AdminAction {
    pub const ALL: [AdminAction; 5] = [
        AdminAction::CreateRound,
        AdminAction::DrawWinner,
        AdminAction::DrawRoundsUpTo,
        AdminAction::TriggerDraw,
        AdminAction::Withdraw,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AdminAction::CreateRound => "Create round",
            AdminAction::DrawWinner => "Draw winner",
            AdminAction::DrawRoundsUpTo => "Draw rounds up to",
            AdminAction::TriggerDraw => "Trigger draw if expired",
            AdminAction::Withdraw => "Withdraw accumulated pool",
        }
    }

    /// What the text field holds, `None` when the action takes no input.
    pub fn input_hint(&self) -> Option<&'static str> {
        match self {
            AdminAction::CreateRound => Some("duration in seconds"),
            AdminAction::DrawWinner | AdminAction::DrawRoundsUpTo => Some("round id"),
            AdminAction::TriggerDraw => None,
            AdminAction::Withdraw => Some("amount in STRK"),
        }
    }
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    tab: Tab,
    selected: usize,
    /// Rows of the active tab as of the last draw, for key handling.
    rows: Vec<HistoryRound>,
    is_owner: bool,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    BuyModal(BuyState),
    AdminModal(AdminState),
    QuitModal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct BuyState {
    guess: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct AdminState {
    idx: usize,
    input: String,
}

impl AdminState {
    fn action(&self) -> AdminAction {
        AdminAction::ALL[self.idx.min(AdminAction::ALL.len() - 1)]
    }
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<std::io::Result<Event>>;

/// Reads terminal events on a dedicated thread so the async loop can
/// select over them.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let event = event::read();
            let failed = event.is_err();
            if tx.send(event).is_err() || failed {
                break;
            }
        }
    });
    rx
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    let event = events
        .recv()
        .await
        .ok_or_else(|| eyre!("terminal input stream closed"))??;
    Ok(event)
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
    sync_rows(state, snap);
    if let Some(mut term) = state.terminal.take() {
        let res = term.draw(|f| ui(f, state, snap)).map(|_| ());
        state.terminal = Some(term);
        res?;
    }
    Ok(())
}

fn sync_rows(state: &mut UiState, snap: &AppSnapshot) {
    if state.tab != snap.tab {
        state.selected = 0;
    }
    state.tab = snap.tab;
    state.is_owner = snap.is_owner;
    state.rows = match snap.tab {
        Tab::Home => Vec::new(),
        Tab::Lottery => snap.lottery.tickets.clone(),
        Tab::History => snap.history.rounds.clone(),
    };
    state.selected = state.selected.min(state.rows.len().saturating_sub(1));
}

fn claimable_round(row: &HistoryRound) -> Option<RoundId> {
    row.viewer_ticket
        .ticket()
        .filter(|ticket| ticket.is_claimable())
        .map(|_| row.round.id)
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let Event::Key(k) = event else {
        return matches!(event, Event::Resize(..)).then_some(UserEvent::Redraw);
    };
    if k.kind != KeyEventKind::Press {
        return None;
    }
    match &mut state.mode {
        Mode::BuyModal(bs) => {
            return match k.code {
                KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                KeyCode::Enter => {
                    let guess = bs.guess.parse::<u8>().ok()?;
                    state.mode = Mode::Normal;
                    Some(UserEvent::BuyTicket { guess })
                }
                KeyCode::Backspace => {
                    bs.guess.pop();
                    Some(UserEvent::Redraw)
                }
                KeyCode::Char(c) if c.is_ascii_digit() && bs.guess.len() < 3 => {
                    bs.guess.push(c);
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::AdminModal(admin) => {
            return match k.code {
                KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                KeyCode::Up => {
                    admin.idx = admin.idx.saturating_sub(1);
                    admin.input.clear();
                    Some(UserEvent::Redraw)
                }
                KeyCode::Down => {
                    admin.idx = (admin.idx + 1).min(AdminAction::ALL.len() - 1);
                    admin.input.clear();
                    Some(UserEvent::Redraw)
                }
                KeyCode::Backspace => {
                    admin.input.pop();
                    Some(UserEvent::Redraw)
                }
                KeyCode::Char(c)
                    if (c.is_ascii_digit() || c == '.')
                        && admin.action().input_hint().is_some() =>
                {
                    admin.input.push(c);
                    Some(UserEvent::Redraw)
                }
                KeyCode::Enter => {
                    let action = admin.action();
                    let input = std::mem::take(&mut admin.input);
                    state.mode = Mode::Normal;
                    Some(UserEvent::Admin { action, input })
                }
                _ => None,
            };
        }
        Mode::QuitModal => {
            return match k.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::Normal => {}
    }
    match k.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            Some(UserEvent::Redraw)
        }
        KeyCode::Char('1') => Some(UserEvent::SwitchTab(Tab::Home)),
        KeyCode::Char('2') => Some(UserEvent::SwitchTab(Tab::Lottery)),
        KeyCode::Char('3') => Some(UserEvent::SwitchTab(Tab::History)),
        KeyCode::Tab => Some(UserEvent::SwitchTab(state.tab.next())),
        KeyCode::Char('r') => Some(UserEvent::Refresh),
        KeyCode::Up | KeyCode::Char('k') => {
            state.selected = state.selected.saturating_sub(1);
            Some(UserEvent::Redraw)
        }
        KeyCode::Down | KeyCode::Char('j') => {
            let last = state.rows.len().saturating_sub(1);
            if state.tab == Tab::History && state.selected == last {
                return Some(UserEvent::LoadMore);
            }
            state.selected = (state.selected + 1).min(last);
            Some(UserEvent::Redraw)
        }
        KeyCode::Char('n') if state.tab == Tab::History => Some(UserEvent::LoadMore),
        KeyCode::Char('b') => {
            state.mode = Mode::BuyModal(BuyState::default());
            Some(UserEvent::OpenBuyModal)
        }
        KeyCode::Char('c') => state
            .rows
            .get(state.selected)
            .and_then(claimable_round)
            .map(|round_id| UserEvent::Claim { round_id }),
        KeyCode::Char('a') if state.is_owner => {
            state.mode = Mode::AdminModal(AdminState::default());
            Some(UserEvent::OpenAdminModal)
        }
        _ => None,
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // tabs + wallet
            Constraint::Min(10),   // active view
            Constraint::Length(7), // status/errors + transactions
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    match snap.tab {
        Tab::Home => draw_home(f, chunks[1], snap),
        Tab::Lottery => draw_lottery(f, chunks[1], state, snap),
        Tab::History => draw_history(f, chunks[1], state, snap),
    }
    draw_bottom(f, chunks[2], snap);
    draw_help(f, chunks[3], snap);
    draw_modals(f, state, snap);
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let selected = match snap.tab {
        Tab::Home => 0,
        Tab::Lottery => 1,
        Tab::History => 2,
    };
    let tabs = Tabs::new(["1 Home", "2 Lottery", "3 History"])
        .select(selected)
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL).title("Luck3"));
    f.render_widget(tabs, cols[0]);

    let who = match snap.viewer {
        Some(address) if snap.wallet_connected => format!("Wallet {}", short_address(address)),
        Some(address) => format!("Viewing {} (read-only)", short_address(address)),
        None => String::from("No wallet"),
    };
    let owner = if snap.is_owner { " | owner" } else { "" };
    let wallet = Paragraph::new(format!("{who} | {}{owner}", snap.network))
        .block(Block::default().borders(Borders::ALL).title("Account"));
    f.render_widget(wallet, cols[1]);
}

fn status_style(status: RoundStatus) -> Style {
    match status {
        RoundStatus::Active => Style::default().fg(Color::Green),
        RoundStatus::Drawing => Style::default().fg(Color::Yellow),
        RoundStatus::Expired => Style::default().fg(Color::DarkGray),
        RoundStatus::Completed => Style::default().fg(Color::Cyan),
    }
}

fn loading_title(title: &str, loading: bool) -> String {
    if loading {
        format!("{title} (loading...)")
    } else {
        title.to_string()
    }
}

fn draw_home(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let overview = &snap.overview;
    let mut lines = Vec::new();
    match &overview.data {
        None => lines.push(Line::styled("No data yet", Style::default().fg(Color::DarkGray))),
        Some(data) => {
            match &data.current_round {
                Some(round) => {
                    let status = round.status_at(snap.now);
                    lines.push(Line::from(vec![
                        Span::raw(format!("Round {} ", format_round_id(round.id))),
                        Span::styled(status.label(), status_style(status)),
                    ]));
                    lines.push(Line::from(format!(
                        "Ends: {} | Time remaining: {}",
                        format_timestamp(round.end_time),
                        format_duration(round.end_time.saturating_sub(snap.now))
                    )));
                    lines.push(Line::from(format!(
                        "Prize pool: {} | Tickets: {}",
                        format_strk(round.prize_pool),
                        round.total_tickets
                    )));
                }
                None => lines.push(Line::from("No round has been created yet")),
            }
            lines.push(Line::from(""));
            lines.push(Line::from(format!(
                "Accumulated prize pool: {}",
                format_strk(data.info.accumulated_prize_pool)
            )));
            lines.push(Line::from(format!(
                "All time: {} rounds | {} tickets | {} paid in",
                data.statistics.total_rounds,
                data.statistics.total_tickets,
                format_strk(data.statistics.total_prize_pool)
            )));
            lines.push(Line::from(format!(
                "Ticket price: {} | Guess between {} and {}",
                format_strk(snap.ticket_cost),
                snap.min_guess,
                snap.max_guess
            )));
            lines.push(Line::styled(
                format!("Owner: {}", data.info.owner),
                Style::default().fg(Color::DarkGray),
            ));
        }
    }
    let widget = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .title(loading_title("Overview", overview.loading)),
    );
    f.render_widget(widget, area);
}

fn ticket_text(row: &HistoryRound) -> (String, Style) {
    match &row.viewer_ticket {
        ViewerTicket::NotFetched => (String::new(), Style::default()),
        ViewerTicket::NoTicket => (
            String::from("no ticket"),
            Style::default().fg(Color::DarkGray),
        ),
        ViewerTicket::Ticket(ticket) if ticket.is_winner && ticket.claimed => (
            format!("guess {} WON {} (claimed)", ticket.guess, format_strk(ticket.reward)),
            Style::default().fg(Color::Green),
        ),
        ViewerTicket::Ticket(ticket) if ticket.is_winner => (
            format!("guess {} WON {} - c to claim", ticket.guess, format_strk(ticket.reward)),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        ViewerTicket::Ticket(ticket) => (format!("guess {}", ticket.guess), Style::default()),
    }
}

fn round_line(row: &HistoryRound, selected: bool) -> Line<'static> {
    let cursor = if selected { ">" } else { " " };
    let winning = match (row.round.is_drawn, row.round.winning_number) {
        (true, Some(n)) => format!("winning {n:>2}"),
        _ => String::from("winning --"),
    };
    let (ticket, ticket_style) = ticket_text(row);
    Line::from(vec![
        Span::raw(format!("{cursor} {} ", format_round_id(row.round.id))),
        Span::styled(format!("{:<9}", row.status.label()), status_style(row.status)),
        Span::raw(format!(
            " {} | {} tickets | {} ",
            format_strk(row.round.prize_pool),
            row.round.total_tickets,
            winning
        )),
        Span::styled(ticket, ticket_style),
    ])
}

fn scroll_offset(selected: usize, area: Rect) -> u16 {
    let visible = usize::from(area.height.saturating_sub(3)).max(1);
    u16::try_from(selected.saturating_sub(visible - 1)).unwrap_or(u16::MAX)
}

fn draw_lottery(f: &mut Frame, area: Rect, state: &UiState, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);
    let lottery = &snap.lottery;

    let mut round_lines = Vec::new();
    match &lottery.current_round {
        Some(round) => {
            round_lines.push(Line::from(format!("Round {}", format_round_id(round.round_id))));
            round_lines.push(Line::from(format!(
                "Time remaining: {}",
                format_duration(round.end_time.saturating_sub(snap.now))
            )));
            round_lines.push(Line::from(format!("Prize pool: {}", format_strk(round.prize_pool))));
            round_lines.push(Line::from(format!("Tickets sold: {}", round.total_tickets)));
            round_lines.push(Line::from(""));
            round_lines.push(Line::from(format!(
                "b to buy a ticket for {}",
                format_strk(snap.ticket_cost)
            )));
        }
        None => round_lines.push(Line::from("No active round")),
    }
    if let Some(err) = &lottery.error {
        round_lines.push(Line::styled(err.clone(), Style::default().fg(Color::Red)));
    }
    let current = Paragraph::new(round_lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .title(loading_title("Current Round", lottery.loading)),
    );
    f.render_widget(current, cols[0]);

    let mut ticket_lines = Vec::new();
    if lottery.viewer.is_none() {
        ticket_lines.push(Line::from("Connect a wallet to see your tickets"));
    } else if lottery.tickets.is_empty() {
        ticket_lines.push(Line::from("No tickets in recent rounds"));
    } else {
        let summary = &lottery.summary;
        ticket_lines.push(Line::from(format!(
            "{} tickets | {} wins | pending {} | won {}",
            summary.tickets,
            summary.wins,
            format_strk(summary.pending_rewards),
            format_strk(summary.total_winnings)
        )));
        for (i, row) in lottery.tickets.iter().enumerate() {
            ticket_lines.push(round_line(row, i == state.selected));
        }
    }
    let tickets = Paragraph::new(ticket_lines)
        .scroll((scroll_offset(state.selected + 1, cols[1]), 0))
        .block(Block::default().borders(Borders::ALL).title("My Tickets"));
    f.render_widget(tickets, cols[1]);
}

fn draw_history(f: &mut Frame, area: Rect, state: &UiState, snap: &AppSnapshot) {
    let history = &snap.history;
    let mut lines = Vec::new();
    if history.rounds.is_empty() && !history.loading {
        lines.push(Line::from("No rounds yet"));
    }
    for (i, row) in history.rounds.iter().enumerate() {
        lines.push(round_line(row, i == state.selected));
    }
    if history.has_more {
        lines.push(Line::styled(
            "n or scroll past the end to load older rounds",
            Style::default().fg(Color::DarkGray),
        ));
    } else if !history.rounds.is_empty() {
        lines.push(Line::styled("End of history", Style::default().fg(Color::DarkGray)));
    }
    let summary = &history.summary;
    let title = if history.viewer.is_some() {
        format!(
            "History | {} tickets, {} wins, pending {}",
            summary.tickets,
            summary.wins,
            format_strk(summary.pending_rewards)
        )
    } else {
        String::from("History")
    };
    let widget = Paragraph::new(lines)
        .scroll((scroll_offset(state.selected, area), 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(loading_title(&title, history.loading)),
        );
    f.render_widget(widget, area);
}

fn draw_bottom(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let status_widget = if snap.errors.is_empty() {
        let status = if snap.status.trim().is_empty() {
            "Ready"
        } else {
            snap.status.as_str()
        };
        Paragraph::new(status)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let lines: Vec<Line> = snap.errors.iter().map(|e| Line::from(e.clone())).collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(status_widget, cols[0]);

    let tx_lines: Vec<Line> = snap
        .transactions
        .iter()
        .rev()
        .take(5)
        .map(|tx| {
            let (mark, style) = match tx.status {
                TxStatus::Pending => ("…", Style::default().fg(Color::Yellow)),
                TxStatus::Success => ("✓", Style::default().fg(Color::Green)),
                TxStatus::Failed => ("✗", Style::default().fg(Color::Red)),
            };
            let hash = tx.hash.map(short_address).unwrap_or_else(|| String::from("signing"));
            Line::styled(format!("{mark} {} {hash}", tx.action.label()), style)
        })
        .collect();
    let txs = Paragraph::new(tx_lines)
        .block(Block::default().borders(Borders::ALL).title("Transactions"));
    f.render_widget(txs, cols[1]);
}

fn draw_help(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut help = String::from("1/2/3/Tab views | ↑/↓ select | b buy | c claim | r refresh");
    if snap.tab == Tab::History {
        help.push_str(" | n older");
    }
    if snap.is_owner {
        help.push_str(" | a admin");
    }
    help.push_str(" | q/Esc quit");
    let widget =
        Paragraph::new(help).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(widget, area);
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    match &state.mode {
        Mode::BuyModal(bs) => {
            let area = centered_rect(40, 30, f.area());
            let block = Block::default().borders(Borders::ALL).title("Buy Ticket");
            let round = snap
                .lottery
                .current_round
                .as_ref()
                .map(|r| format_round_id(r.round_id))
                .unwrap_or_else(|| String::from("--"));
            let p = Paragraph::new(format!(
                "Round: {round}\nPrice: {}\nGuess ({}-{}): {}\n\nEnter=confirm Esc=cancel digits to edit",
                format_strk(snap.ticket_cost),
                snap.min_guess,
                snap.max_guess,
                bs.guess
            ));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::AdminModal(admin) => {
            let area = centered_rect(50, 50, f.area());
            let block = Block::default().borders(Borders::ALL).title("Admin");
            let mut lines = Vec::new();
            for (i, action) in AdminAction::ALL.iter().enumerate() {
                let cur = if i == admin.idx { ">" } else { " " };
                lines.push(Line::from(format!("{cur} {}", action.label())));
            }
            lines.push(Line::from(""));
            match admin.action().input_hint() {
                Some(hint) => lines.push(Line::from(format!("{hint}: {}", admin.input))),
                None => lines.push(Line::from("no input needed")),
            }
            lines.push(Line::from("↑/↓ choose  Enter=submit  Esc=cancel"));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(Paragraph::new(lines), block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(30, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Quit");
            let p = Paragraph::new("Quit Luck3? (y/n)");
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

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}
