use crate::{Classifier, Dispatcher, Transport};

/// One exchange in a conversation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Turn {
    /// What the user typed.
    pub user: String,
    /// The JSON text shown in reply.
    pub response: String,
}

/// The turns of a conversation, kept for display only.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// An empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The turns so far, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Whether nothing has been said yet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl std::fmt::Display for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (idx, turn) in self.turns.iter().enumerate() {
            writeln!(f, "[{}] > {}", idx + 1, turn.user)?;
            writeln!(f, "{}", turn.response)?;
        }
        Ok(())
    }
}

/// What the front end should do after a line of input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reply {
    /// Show this text.
    Show(String),
    /// Nothing to show.
    Nothing,
    /// End the session.
    Quit,
}

/// A conversational front end over a [`Dispatcher`].
///
/// The session keeps a transcript for display, but no state from earlier turns reaches the
/// classifier.
pub struct ChatSession<C: Classifier, T: Transport> {
    dispatcher: Dispatcher<C, T>,
    transcript: Transcript,
}

impl<C: Classifier, T: Transport> ChatSession<C, T> {
    /// Start a session.
    pub fn new(dispatcher: Dispatcher<C, T>) -> Self {
        Self {
            dispatcher,
            transcript: Transcript::new(),
        }
    }

    /// The dispatcher behind this session.
    pub fn dispatcher(&self) -> &Dispatcher<C, T> {
        &self.dispatcher
    }

    /// The conversation so far.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Answer one line of user text.
    ///
    /// `history` is supplied by the caller per call and is only used for logging.
    pub async fn respond(&self, line: &str, history: &[Turn]) -> String {
        tracing::debug!(prior_turns = history.len(), "handling turn");
        self.dispatcher.handle(line).await
    }

    /// Interpret one line of input, handling session commands, and record the exchange.
    pub async fn process_line(&mut self, line: &str) -> Reply {
        let line = line.trim();
        match line {
            "" => Reply::Nothing,
            "/quit" | "/exit" => Reply::Quit,
            "/history" => {
                if self.transcript.is_empty() {
                    Reply::Show("(no history)".to_string())
                } else {
                    Reply::Show(self.transcript.to_string().trim_end().to_string())
                }
            }
            _ => {
                let response = self.respond(line, self.transcript.turns()).await;
                self.transcript.push(Turn {
                    user: line.to_string(),
                    response: response.clone(),
                });
                Reply::Show(response)
            }
        }
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
