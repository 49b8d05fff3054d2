use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::{
    admin_token::AdminGate,
    domain::{
        self, DomainError, IdInput, JoinOutcome, JoinStatus, NewRaffle, Raffle, RaffleId,
        required_text,
    },
    state::{Commit, RaffleStore, StoreError},
};

#[derive(Debug)]
pub enum ServiceError {
    Forbidden,
    Domain(DomainError),
    Store(StoreError),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden => write!(f, "missing or invalid admin key"),
            Self::Domain(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Forbidden => None,
            Self::Domain(e) => Some(e),
            Self::Store(e) => Some(e),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        Self::Domain(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRaffleRequest {
    pub id: Option<IdInput>,
    pub title: Option<String>,
    pub prize: Option<serde_json::Number>,
    pub status: Option<String>,
    #[serde(rename = "dateTime")]
    pub date_time: Option<String>,
}

impl CreateRaffleRequest {
    fn validate(self) -> Result<NewRaffle, DomainError> {
        let id = self
            .id
            .ok_or(DomainError::MissingField { field: "id" })?
            .normalize("id")?;
        Ok(NewRaffle {
            id,
            title: required_text(self.title, "title")?,
            prize: self.prize.ok_or(DomainError::MissingField { field: "prize" })?,
            status: required_text(self.status, "status")?,
            date_time: required_text(self.date_time, "dateTime")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinRequest {
    #[serde(rename = "raffleId")]
    pub raffle_id: Option<IdInput>,
    pub nickname: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FinishRequest {
    pub winner: Option<String>,
}

/// The externally callable raffle operations. Admin operations check the
/// gate before the store is touched.
#[derive(Clone)]
pub struct RaffleService {
    store: Arc<RaffleStore>,
    gate: Arc<AdminGate>,
}

impl RaffleService {
    pub fn new(store: Arc<RaffleStore>, gate: AdminGate) -> Self {
        Self {
            store,
            gate: Arc::new(gate),
        }
    }

    fn require_admin(&self, admin_key: Option<&str>) -> Result<(), ServiceError> {
        if self.gate.authorize(admin_key) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden)
        }
    }

    pub async fn list(&self) -> Result<Vec<Raffle>, ServiceError> {
        let doc = self.store.load().await?;
        Ok(domain::list(&doc))
    }

    pub async fn get(&self, id: RaffleId) -> Result<Raffle, ServiceError> {
        let doc = self.store.load().await?;
        Ok(domain::get(&doc, id)?)
    }

    pub async fn create(
        &self,
        admin_key: Option<&str>,
        req: CreateRaffleRequest,
    ) -> Result<Raffle, ServiceError> {
        self.require_admin(admin_key)?;
        let new = req.validate()?;
        let raffle = self
            .store
            .mutate(|doc| Ok::<_, ServiceError>(Commit::Save(domain::create(doc, new)?)))
            .await?;
        info!(raffle_id = %raffle.id, title = %raffle.title, "raffle created");
        Ok(raffle)
    }

    pub async fn join(&self, req: JoinRequest) -> Result<JoinOutcome, ServiceError> {
        let id = req
            .raffle_id
            .ok_or(DomainError::MissingField { field: "raffleId" })?
            .normalize("raffleId")?;
        let nickname = required_text(req.nickname, "nickname")?;
        let email = required_text(req.email, "email")?;

        let outcome = self
            .store
            .mutate(|doc| {
                let outcome = domain::join(doc, id, nickname, email)?;
                Ok::<_, ServiceError>(match outcome.status {
                    JoinStatus::Joined => Commit::Save(outcome),
                    JoinStatus::AlreadyJoined => Commit::Keep(outcome),
                })
            })
            .await?;
        if outcome.status == JoinStatus::Joined {
            info!(raffle_id = %id, total = outcome.total, "participant joined");
        }
        Ok(outcome)
    }

    pub async fn finish(
        &self,
        admin_key: Option<&str>,
        id: RaffleId,
        req: FinishRequest,
    ) -> Result<Raffle, ServiceError> {
        self.require_admin(admin_key)?;
        let winner = required_text(req.winner, "winner")?;
        let raffle = self
            .store
            .mutate(|doc| Ok::<_, ServiceError>(Commit::Save(domain::finish(doc, id, winner)?)))
            .await?;
        info!(raffle_id = %id, winner = %raffle.winner, "raffle finished");
        Ok(raffle)
    }

    pub async fn delete(
        &self,
        admin_key: Option<&str>,
        id: RaffleId,
    ) -> Result<Raffle, ServiceError> {
        self.require_admin(admin_key)?;
        let raffle = self
            .store
            .mutate(|doc| Ok::<_, ServiceError>(Commit::Save(domain::remove(doc, id)?)))
            .await?;
        info!(raffle_id = %id, "raffle deleted");
        Ok(raffle)
    }
}
