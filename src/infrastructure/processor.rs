use crate::domain::authorization::{AuthorizationId, CurrencyCode};
use crate::domain::card::CreditCard;
use crate::domain::money::Amount;
use crate::domain::ports::{PaymentProcessor, ProcessorOutcome};
use crate::error::ProcessorError;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// A one-shot answer consumed by the next processor call, whatever its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedResponse {
    Decline,
    Fail(ProcessorError),
}

#[derive(Default)]
struct Behaviour {
    declined_cards: HashSet<u64>,
    latency: Duration,
    scripted: VecDeque<ScriptedResponse>,
}

/// In-process stand-in for an acquiring bank.
///
/// Approves everything by default and assigns random UUIDs to new authorizations. Declines,
/// failures and latency can be configured to exercise the service's error paths. Clones share
/// configuration and the call counter.
#[derive(Clone, Default)]
pub struct SimulatedProcessor {
    behaviour: Arc<Mutex<Behaviour>>,
    calls: Arc<AtomicUsize>,
}

impl SimulatedProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        self.behaviour().latency = latency;
    }

    /// Every authorization attempt with this card number is declined.
    pub fn decline_card(&self, number: u64) {
        self.behaviour().declined_cards.insert(number);
    }

    /// Queues `response` for the next call. Queued responses are consumed in order.
    pub fn respond_next(&self, response: ScriptedResponse) {
        self.behaviour().scripted.push_back(response);
    }

    /// Number of requests received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn behaviour(&self) -> MutexGuard<'_, Behaviour> {
        self.behaviour.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts the call, waits out the latency and returns the scripted response, if any.
    async fn receive(&self, operation: &str) -> Option<ScriptedResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (latency, scripted) = {
            let mut behaviour = self.behaviour();
            (behaviour.latency, behaviour.scripted.pop_front())
        };
        debug!(operation, ?scripted, "simulated processor received request");
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        scripted
    }

    async fn settle(&self, operation: &str) -> Result<ProcessorOutcome<()>, ProcessorError> {
        match self.receive(operation).await {
            None => Ok(ProcessorOutcome::Approved(())),
            Some(ScriptedResponse::Decline) => Ok(ProcessorOutcome::Declined),
            Some(ScriptedResponse::Fail(err)) => Err(err),
        }
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedProcessor {
    async fn authorize(
        &self,
        _currency: &CurrencyCode,
        _amount: Amount,
        card: &CreditCard,
    ) -> Result<ProcessorOutcome<AuthorizationId>, ProcessorError> {
        match self.receive("authorize").await {
            Some(ScriptedResponse::Decline) => return Ok(ProcessorOutcome::Declined),
            Some(ScriptedResponse::Fail(err)) => return Err(err),
            None => {}
        }
        if self.behaviour().declined_cards.contains(&card.number) {
            return Ok(ProcessorOutcome::Declined);
        }
        Ok(ProcessorOutcome::Approved(AuthorizationId::new(
            Uuid::new_v4().to_string(),
        )))
    }

    async fn capture(
        &self,
        _id: &AuthorizationId,
        _amount: Amount,
    ) -> Result<ProcessorOutcome<()>, ProcessorError> {
        self.settle("capture").await
    }

    async fn refund(
        &self,
        _id: &AuthorizationId,
        _amount: Amount,
    ) -> Result<ProcessorOutcome<()>, ProcessorError> {
        self.settle("refund").await
    }

    async fn void(&self, _id: &AuthorizationId) -> Result<ProcessorOutcome<()>, ProcessorError> {
        self.settle("void").await
    }
}
