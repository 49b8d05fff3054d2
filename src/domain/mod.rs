use std::fmt;

use serde::{Deserialize, Serialize};

pub const STATUS_OPEN: &str = "open";
pub const STATUS_FINISHED: &str = "finished";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    MissingField { field: &'static str },
    InvalidId { value: String },
    InvalidStatus { status: String },
    DuplicateId { id: RaffleId },
    NotFound { id: RaffleId },
}

impl DomainError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField { .. } | Self::InvalidId { .. } | Self::InvalidStatus { .. } => {
                "invalid_request"
            }
            Self::DuplicateId { .. } => "conflict",
            Self::NotFound { .. } => "not_found",
        }
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "{field} is required"),
            Self::InvalidId { value } => write!(f, "invalid raffle id: {value}"),
            Self::InvalidStatus { status } => {
                write!(f, "raffle cannot be created with status {status}")
            }
            Self::DuplicateId { id } => write!(f, "raffle already exists: {id}"),
            Self::NotFound { id } => write!(f, "raffle not found: {id}"),
        }
    }
}

impl std::error::Error for DomainError {}

/// Canonical raffle identifier. Every id coming from outside is parsed into
/// this before any comparison against stored raffles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaffleId(pub i64);

impl RaffleId {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        raw.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| DomainError::InvalidId {
                value: raw.to_string(),
            })
    }
}

impl fmt::Display for RaffleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An id as it arrives in a request body: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IdInput {
    Number(i64),
    Text(String),
    Other(serde_json::Value),
}

impl IdInput {
    pub fn normalize(self, field: &'static str) -> Result<RaffleId, DomainError> {
        match self {
            Self::Number(n) => Ok(RaffleId(n)),
            Self::Text(s) if s.trim().is_empty() => Err(DomainError::MissingField { field }),
            Self::Text(s) => RaffleId::parse(&s),
            Self::Other(v) => Err(DomainError::InvalidId {
                value: v.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub nickname: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Raffle {
    pub id: RaffleId,
    pub title: String,
    pub prize: serde_json::Number,
    pub status: String,
    #[serde(default)]
    pub winner: String,
    #[serde(rename = "dateTime")]
    pub date_time: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

impl Raffle {
    pub fn is_finished(&self) -> bool {
        self.status == STATUS_FINISHED
    }

    fn has_entrant(&self, nickname: &str, email: &str) -> bool {
        self.participants
            .iter()
            .any(|p| p.email == email || p.nickname == nickname)
    }
}

/// The whole persisted collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub raffles: Vec<Raffle>,
}

impl Document {
    pub fn empty() -> Self {
        Self::default()
    }

    fn position(&self, id: RaffleId) -> Option<usize> {
        self.raffles.iter().position(|r| r.id == id)
    }
}

/// Validated input for [`create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRaffle {
    pub id: RaffleId,
    pub title: String,
    pub prize: serde_json::Number,
    pub status: String,
    pub date_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStatus {
    Joined,
    AlreadyJoined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JoinOutcome {
    pub status: JoinStatus,
    pub total: usize,
}

/// Treats absent and blank text the same way.
pub fn required_text(value: Option<String>, field: &'static str) -> Result<String, DomainError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(DomainError::MissingField { field }),
    }
}

pub fn list(doc: &Document) -> Vec<Raffle> {
    doc.raffles.clone()
}

pub fn get(doc: &Document, id: RaffleId) -> Result<Raffle, DomainError> {
    doc.raffles
        .iter()
        .find(|r| r.id == id)
        .cloned()
        .ok_or(DomainError::NotFound { id })
}

pub fn create(doc: &mut Document, new: NewRaffle) -> Result<Raffle, DomainError> {
    if new.status == STATUS_FINISHED {
        return Err(DomainError::InvalidStatus { status: new.status });
    }
    if doc.position(new.id).is_some() {
        return Err(DomainError::DuplicateId { id: new.id });
    }

    let raffle = Raffle {
        id: new.id,
        title: new.title,
        prize: new.prize,
        status: new.status,
        winner: String::new(),
        date_time: new.date_time,
        participants: Vec::new(),
    };
    doc.raffles.push(raffle.clone());
    Ok(raffle)
}

/// Appends an entrant unless the email or nickname is already taken, in which
/// case the document is left untouched.
pub fn join(
    doc: &mut Document,
    id: RaffleId,
    nickname: String,
    email: String,
) -> Result<JoinOutcome, DomainError> {
    let idx = doc.position(id).ok_or(DomainError::NotFound { id })?;
    let raffle = &mut doc.raffles[idx];

    if raffle.has_entrant(&nickname, &email) {
        return Ok(JoinOutcome {
            status: JoinStatus::AlreadyJoined,
            total: raffle.participants.len(),
        });
    }

    raffle.participants.push(Participant { nickname, email });
    Ok(JoinOutcome {
        status: JoinStatus::Joined,
        total: raffle.participants.len(),
    })
}

pub fn finish(doc: &mut Document, id: RaffleId, winner: String) -> Result<Raffle, DomainError> {
    if winner.trim().is_empty() {
        return Err(DomainError::MissingField { field: "winner" });
    }
    let idx = doc.position(id).ok_or(DomainError::NotFound { id })?;
    let raffle = &mut doc.raffles[idx];
    raffle.winner = winner;
    raffle.status = STATUS_FINISHED.to_string();
    Ok(raffle.clone())
}

pub fn remove(doc: &mut Document, id: RaffleId) -> Result<Raffle, DomainError> {
    let idx = doc.position(id).ok_or(DomainError::NotFound { id })?;
    Ok(doc.raffles.remove(idx))
}
