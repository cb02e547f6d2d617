use crate::error::AppError;
use crate::render::{view_for, ViewKind};
use dispatch_offer::{Offer, OfferKey, OfferStore};
use dispatch_shared::events::Decision;
use std::str::FromStr;
use tokio::sync::watch;
use tracing::debug;

pub const HELP: &str = "\
commands:
  accept <key|n>    accept an offer by key (J1:0) or list position (1)
  reject <key|n>    reject an offer
  view <cards|carousel|tiles>
  next / prev       move the carousel
  list              show offers with their countdown
  help
  quit";

/// Which offer an `accept` / `reject` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Key(OfferKey),
    /// 1-based position in the visible list.
    Position(usize),
}

impl FromStr for Target {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(position) = s.parse::<usize>() {
            if position == 0 {
                return Err(AppError::InvalidCommand("positions start at 1".into()));
            }
            return Ok(Target::Position(position));
        }
        s.parse::<OfferKey>().map(Target::Key).map_err(AppError::InvalidCommand)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Decide(Decision, Target),
    View(ViewKind),
    Next,
    Prev,
    List,
    Help,
    Quit,
}

impl Command {
    /// `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Command>, AppError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        if words.next().is_some() {
            return Err(AppError::InvalidCommand(format!("too many arguments to {}", verb)));
        }

        let command = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("accept" | "a", Some(target)) => Command::Decide(Decision::Accept, target.parse::<Target>()?),
            ("reject" | "r", Some(target)) => Command::Decide(Decision::Reject, target.parse::<Target>()?),
            ("accept" | "a" | "reject" | "r", None) => {
                return Err(AppError::InvalidCommand(format!("usage: {} <key|n>", verb)))
            }
            ("view", Some(kind)) => Command::View(kind.parse::<ViewKind>().map_err(AppError::InvalidCommand)?),
            ("view", None) => return Err(AppError::InvalidCommand("usage: view <cards|carousel|tiles>".into())),
            ("next" | "n", None) => Command::Next,
            ("prev" | "p", None) => Command::Prev,
            ("list" | "ls", None) => Command::List,
            ("help" | "?", None) => Command::Help,
            ("quit" | "exit" | "q", None) => Command::Quit,
            _ => return Err(AppError::InvalidCommand(format!("unknown command: {} (try help)", line.trim()))),
        };
        Ok(Some(command))
    }
}

/// What the screen task needs to redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    pub kind: ViewKind,
    pub position: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            kind: ViewKind::Cards,
            position: 0,
        }
    }
}

/// Applies mechanic commands to the store and the current view.
pub struct Console {
    store: OfferStore,
    snapshot: watch::Receiver<Vec<Offer>>,
    view_tx: watch::Sender<ViewState>,
}

impl Console {
    pub fn new(store: OfferStore, view_tx: watch::Sender<ViewState>) -> Self {
        let snapshot = store.subscribe();
        Self {
            store,
            snapshot,
            view_tx,
        }
    }

    /// Offers as last published by the store, the same list the screen shows.
    fn visible(&self) -> Vec<Offer> {
        self.snapshot.borrow().clone()
    }

    pub fn view(&self) -> ViewState {
        *self.view_tx.borrow()
    }

    /// Returns the text to print, if any. `Quit` is left to the caller.
    pub async fn execute(&mut self, command: Command) -> Result<Option<String>, AppError> {
        match command {
            Command::Decide(decision, target) => {
                let offers = self.visible();
                let key = resolve(&offers, &target)?;
                let store = self.store.clone();
                let pending = key.clone();
                // Acks can take seconds; the prompt stays usable meanwhile.
                tokio::spawn(async move {
                    let outcome = store.decide(&pending, decision).await;
                    debug!(key = %pending, ?outcome, "Decision finished");
                });
                Ok(Some(format!("Sending {} for job {}...", decision, key.job_id)))
            }
            Command::View(kind) => {
                self.view_tx.send_modify(|view| {
                    view.kind = kind;
                    view.position = 0;
                });
                Ok(Some(format!("Showing {} view", view_for(kind, 0).name())))
            }
            Command::Next | Command::Prev => {
                if self.view().kind != ViewKind::Carousel {
                    return Err(AppError::InvalidCommand("next/prev only apply to the carousel view".into()));
                }
                let count = self.visible().len();
                if count == 0 {
                    return Ok(Some("No pending job offers.".to_string()));
                }
                let step = if command == Command::Next { 1 } else { count - 1 };
                self.view_tx.send_modify(|view| {
                    view.position = (view.position % count + step) % count;
                });
                Ok(None)
            }
            Command::List => {
                let view = self.view();
                let offers = self.visible();
                Ok(Some(view_for(view.kind, view.position).render(&offers)))
            }
            Command::Help => Ok(Some(HELP.to_string())),
            Command::Quit => Ok(None),
        }
    }
}

fn resolve(offers: &[Offer], target: &Target) -> Result<OfferKey, AppError> {
    match target {
        Target::Key(key) => offers
            .iter()
            .find(|o| o.matches(key))
            .map(Offer::key)
            .ok_or_else(|| AppError::UnknownOffer(key.to_string())),
        Target::Position(n) => offers
            .get(n - 1)
            .map(Offer::key)
            .ok_or_else(|| AppError::UnknownOffer(format!("#{}", n))),
    }
}
