//! Terminal stand-in for a WhatsApp chat
//!
//! Lines typed at the prompt reach the engine as the correspondent's
//! messages. Slash commands act as the operator or move the clock.

use anyhow::{bail, Result};
use chrono::Duration;
use console::style;
use dialoguer::Input;
use josephine_core::session::{CorrespondentId, Session, SessionStore};
use josephine_dialogue::{EngineSettings, Event, ManualClock, SessionEngine};
use std::sync::Arc;

const HELP: &str = "\
  <text>          send text as the correspondent
  /op <text>      send text from the operator's account
  /takeover       operator takes the thread over without typing
  /later <mins>   move the clock forward
  /state          show the session
  /quit           leave";

/// One line of simulator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Operator(String),
    Takeover,
    Later(i64),
    State,
    Help,
    Quit,
}

/// Parse a prompt line, `None` for a blank line
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('/') {
        return Ok(Some(Command::Say(line.to_string())));
    }

    let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let command = match name {
        "/op" if !rest.is_empty() => Command::Operator(rest.to_string()),
        "/op" => bail!("usage: /op <text>"),
        "/takeover" => Command::Takeover,
        "/later" => match rest.parse::<i64>() {
            Ok(minutes) if minutes > 0 => Command::Later(minutes),
            _ => bail!("usage: /later <minutes>"),
        },
        "/state" => Command::State,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => bail!("unknown command {}, try /help", other),
    };
    Ok(Some(command))
}

/// Engine bound to a single simulated correspondent and a manual clock
pub struct Simulator {
    engine: SessionEngine,
    clock: Arc<ManualClock>,
    correspondent: CorrespondentId,
}

impl Simulator {
    pub fn new(settings: EngineSettings, correspondent: CorrespondentId) -> Result<Self> {
        let clock = Arc::new(ManualClock::starting_now());
        let engine = SessionEngine::new(SessionStore::new(), settings)?.with_clock(clock.clone());
        Ok(Self {
            engine,
            clock,
            correspondent,
        })
    }

    /// Run a message command and return what Josephine sends back
    pub async fn send(&self, command: &Command) -> Result<Vec<String>> {
        let event = match command {
            Command::Say(text) => Event::text(text.as_str()),
            Command::Operator(text) => Event::operator(text.as_str()),
            Command::Takeover => Event::OperatorInterrupt,
            _ => return Ok(Vec::new()),
        };
        Ok(self.engine.handle_event(&self.correspondent, event).await?)
    }

    pub fn advance(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }

    pub async fn session(&self) -> Session {
        self.engine.store().get(&self.correspondent).await
    }
}

/// Describe a session on one line
pub fn describe(session: &Session) -> String {
    let cooldown = match session.cooldown_until {
        Some(until) => until.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "none".to_string(),
    };
    format!(
        "step {} | track {} | strikes {} | operator {} | awaiting {} | cooldown {}",
        session.step,
        session.branch,
        session.invalid_reply_count,
        if session.operator_override_active { "on" } else { "off" },
        session.awaiting_reply,
        cooldown
    )
}

/// Interactive loop on the terminal
pub async fn run(settings: EngineSettings, correspondent: CorrespondentId) -> Result<()> {
    let simulator = Simulator::new(settings, correspondent.clone())?;

    println!("{}", style("Josephine simulator").bold().cyan());
    println!("Chatting as {}. Type /help for commands.\n", correspondent);

    loop {
        let line: String = Input::new()
            .with_prompt(style("you").green().to_string())
            .allow_empty(true)
            .interact_text()?;

        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", style(e).red());
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::State => println!("{}", style(describe(&simulator.session().await)).dim()),
            Command::Later(minutes) => {
                simulator.advance(minutes);
                println!("{}", style(format!("({} minutes later)", minutes)).dim());
            }
            _ => {
                let replies = simulator.send(&command).await?;
                if replies.is_empty() {
                    println!("{}", style("(no reply)").dim());
                }
                for reply in replies {
                    println!("{} {}\n", style("josephine>").magenta().bold(), reply);
                }
            }
        }
    }

    Ok(())
}
