use crate::{
    asset::Asset,
    contracts::{
        SpinReceipt,
        WriteFailure,
    },
    model::{
        SequenceNumber,
        SpinRequest,
        SpinResult,
    },
};
use fuels::types::Identity;
use std::{
    collections::HashSet,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time,
};
use tracing::{
    debug,
    info,
    warn,
};

pub const DEFAULT_SPIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Identifies one local spin attempt. Monotonic per correlator.
pub type Ticket = u64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpinRejected {
    #[error("a spin is already in progress")]
    AlreadyPending,
    #[error("connect a wallet to spin")]
    NotConnected,
    #[error("select an asset first")]
    NoAssetSelected,
    #[error("spin cost is not known yet")]
    CostUnknown,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SpinPhase {
    #[default]
    Idle,
    Submitting {
        ticket: Ticket,
        guess: Asset,
    },
    AwaitingSequence {
        ticket: Ticket,
        guess: Asset,
    },
    Pending {
        ticket: Ticket,
        guess: Asset,
        sequence: SequenceNumber,
    },
    Resolved {
        guess: Asset,
        result: SpinResult,
    },
    TimedOut {
        guess: Asset,
        sequence: Option<SequenceNumber>,
    },
    Failed {
        guess: Asset,
        failure: WriteFailure,
    },
}

impl SpinPhase {
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SpinPhase::Submitting { .. }
                | SpinPhase::AwaitingSequence { .. }
                | SpinPhase::Pending { .. }
        )
    }

    pub fn ticket(&self) -> Option<Ticket> {
        match self {
            SpinPhase::Submitting { ticket, .. }
            | SpinPhase::AwaitingSequence { ticket, .. }
            | SpinPhase::Pending { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }

    pub fn sequence(&self) -> Option<SequenceNumber> {
        match self {
            SpinPhase::Pending { sequence, .. } => Some(*sequence),
            SpinPhase::Resolved { result, .. } => Some(result.sequence_number),
            SpinPhase::TimedOut { sequence, .. } => *sequence,
            _ => None,
        }
    }

    fn guess(&self) -> Option<Asset> {
        match self {
            SpinPhase::Idle => None,
            SpinPhase::Submitting { guess, .. }
            | SpinPhase::AwaitingSequence { guess, .. }
            | SpinPhase::Pending { guess, .. }
            | SpinPhase::Resolved { guess, .. }
            | SpinPhase::TimedOut { guess, .. }
            | SpinPhase::Failed { guess, .. } => Some(*guess),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CorrelationUpdate {
    Unchanged,
    AwaitingSequence,
    SequenceAssigned(SequenceNumber),
    Resolved(SpinResult),
    TimedOut { sequence: Option<SequenceNumber> },
    Failed(WriteFailure),
}

/// Tracks the one local spin in flight and matches it to its on-chain
/// completion by sequence number.
#[derive(Debug, Default)]
pub struct SpinCorrelator {
    phase: SpinPhase,
    next_ticket: Ticket,
    player: Option<Identity>,
    // sequences of this player that existed before the current spin began
    known_before: HashSet<SequenceNumber>,
}

impl SpinCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &SpinPhase {
        &self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase.is_busy()
    }

    pub fn pending_sequence(&self) -> Option<SequenceNumber> {
        match self.phase {
            SpinPhase::Pending { sequence, .. } => Some(sequence),
            _ => None,
        }
    }

    pub fn current_ticket(&self) -> Option<Ticket> {
        self.phase.ticket()
    }

    pub fn begin<'a>(
        &mut self,
        guess: Asset,
        player: Identity,
        observed_requests: impl IntoIterator<Item = &'a SpinRequest>,
    ) -> Result<Ticket, SpinRejected> {
        if self.is_busy() {
            return Err(SpinRejected::AlreadyPending);
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.known_before = observed_requests
            .into_iter()
            .filter(|r| r.player == player)
            .map(|r| r.sequence_number)
            .collect();
        self.player = Some(player);
        self.phase = SpinPhase::Submitting { ticket, guess };
        info!(ticket, %guess, "spin started");
        Ok(ticket)
    }

    pub fn submission_failed(
        &mut self,
        ticket: Ticket,
        failure: WriteFailure,
    ) -> CorrelationUpdate {
        match &self.phase {
            SpinPhase::Submitting { ticket: current, guess } if *current == ticket => {
                let guess = *guess;
                self.phase = SpinPhase::Failed {
                    guess,
                    failure: failure.clone(),
                };
                CorrelationUpdate::Failed(failure)
            }
            _ => {
                debug!(ticket, "ignoring failure for stale spin");
                CorrelationUpdate::Unchanged
            }
        }
    }

    /// Takes the sequence number from the submission's own request log,
    /// falling back to the newest request of this player observed since the
    /// spin began. Completions already observed are checked immediately.
    pub fn submission_succeeded<'a, 'b>(
        &mut self,
        ticket: Ticket,
        receipt: &SpinReceipt,
        observed_requests: impl IntoIterator<Item = &'a SpinRequest>,
        observed_completions: impl IntoIterator<Item = &'b SpinResult>,
    ) -> CorrelationUpdate {
        let (SpinPhase::Submitting { ticket: current, guess }, Some(player)) =
            (&self.phase, self.player)
        else {
            return CorrelationUpdate::Unchanged;
        };
        if *current != ticket {
            debug!(ticket, "ignoring receipt for stale spin");
            return CorrelationUpdate::Unchanged;
        }
        let guess = *guess;

        let from_receipt = receipt.request_for(&player).map(|r| r.sequence_number);
        let sequence = from_receipt.or_else(|| {
            observed_requests
                .into_iter()
                .filter(|r| self.is_new_request_of_player(r))
                .map(|r| r.sequence_number)
                .last()
        });

        match sequence {
            Some(sequence) => {
                self.enter_pending(ticket, guess, sequence, observed_completions)
            }
            None => {
                info!(ticket, "spin submitted; waiting for its request event");
                self.phase = SpinPhase::AwaitingSequence { ticket, guess };
                CorrelationUpdate::AwaitingSequence
            }
        }
    }

    pub fn observe_request<'a>(
        &mut self,
        request: &SpinRequest,
        observed_completions: impl IntoIterator<Item = &'a SpinResult>,
    ) -> CorrelationUpdate {
        let SpinPhase::AwaitingSequence { ticket, guess } = self.phase else {
            return CorrelationUpdate::Unchanged;
        };
        if !self.is_new_request_of_player(request) {
            return CorrelationUpdate::Unchanged;
        }
        self.enter_pending(ticket, guess, request.sequence_number, observed_completions)
    }

    pub fn observe_completion(&mut self, result: &SpinResult) -> CorrelationUpdate {
        match self.phase {
            SpinPhase::Pending {
                sequence, guess, ..
            } if sequence == result.sequence_number => {
                info!(
                    sequence,
                    result = result.result_index,
                    won = result.won,
                    "spin resolved"
                );
                self.phase = SpinPhase::Resolved {
                    guess,
                    result: result.clone(),
                };
                CorrelationUpdate::Resolved(result.clone())
            }
            _ => CorrelationUpdate::Unchanged,
        }
    }

    /// Deadline for `ticket` passed. Stale tickets are ignored.
    pub fn expire(&mut self, ticket: Ticket) -> CorrelationUpdate {
        if self.current_ticket() != Some(ticket) {
            debug!(ticket, "ignoring stale spin deadline");
            return CorrelationUpdate::Unchanged;
        }
        let sequence = self.pending_sequence();
        let Some(guess) = self.phase.guess() else {
            return CorrelationUpdate::Unchanged;
        };
        warn!(ticket, ?sequence, "spin timed out");
        self.phase = SpinPhase::TimedOut { guess, sequence };
        CorrelationUpdate::TimedOut { sequence }
    }

    fn is_new_request_of_player(&self, request: &SpinRequest) -> bool {
        Some(request.player) == self.player
            && !self.known_before.contains(&request.sequence_number)
    }

    fn enter_pending<'a>(
        &mut self,
        ticket: Ticket,
        guess: Asset,
        sequence: SequenceNumber,
        observed_completions: impl IntoIterator<Item = &'a SpinResult>,
    ) -> CorrelationUpdate {
        debug!(ticket, sequence, "spin sequence assigned");
        self.phase = SpinPhase::Pending {
            ticket,
            guess,
            sequence,
        };
        let early = observed_completions
            .into_iter()
            .find(|c| c.sequence_number == sequence)
            .cloned();
        match early {
            Some(result) => self.observe_completion(&result),
            None => CorrelationUpdate::SequenceAssigned(sequence),
        }
    }
}

/// Wall-clock timeout for one spin. Sends its ticket on `expired_tx` once
/// the timeout elapses. Dropping the deadline cancels it.
#[derive(Debug)]
pub struct SpinDeadline {
    ticket: Ticket,
    handle: JoinHandle<()>,
}

impl SpinDeadline {
    pub fn arm(
        ticket: Ticket,
        timeout: Duration,
        expired_tx: mpsc::UnboundedSender<Ticket>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            time::sleep(timeout).await;
            let _ = expired_tx.send(ticket);
        });
        Self { ticket, handle }
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }
}

impl Drop for SpinDeadline {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
