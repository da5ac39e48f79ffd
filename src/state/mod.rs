pub mod store;

pub use store::*;

use crate::error::Result;
use crate::models::{EscalationLevel, Priority, Ticket, TicketStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Decision over the current stored value of a ticket. `Ok(None)` leaves
/// the ticket untouched.
pub type TicketMutation<'a> = Box<dyn FnOnce(&Ticket) -> Result<Option<Ticket>> + Send + 'a>;

/// Trait for ticket storage operations.
///
/// The store owns the canonical ticket list. Writers that derive the new
/// value from the old one go through [`TicketStore::modify_ticket`] so that
/// concurrent decisions never overwrite each other.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Save a new ticket
    async fn save_ticket(&self, ticket: &Ticket) -> Result<()>;

    /// Get a ticket by ID
    async fn get_ticket(&self, id: &Uuid) -> Result<Option<Ticket>>;

    /// Replace an existing ticket
    async fn update_ticket(&self, ticket: &Ticket) -> Result<()>;

    /// Atomically read, decide and write one ticket.
    ///
    /// No other write to the same ticket interleaves with `mutate`. Returns
    /// the committed value, or `None` when `mutate` declined. A missing
    /// ticket is `NotFound`.
    async fn modify_ticket<'a>(&self, id: &Uuid, mutate: TicketMutation<'a>) -> Result<Option<Ticket>>;

    /// Every ticket matching filter, newest first, without paging
    async fn list_all(&self, filter: &TicketFilter) -> Result<Vec<Ticket>>;

    /// List tickets with filtering, newest first
    async fn list_tickets(
        &self,
        filter: &TicketFilter,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Ticket>>;

    /// Count tickets matching filter
    async fn count_tickets(&self, filter: &TicketFilter) -> Result<u64>;

    /// Every ticket not in a terminal status
    async fn active_tickets(&self) -> Result<Vec<Ticket>> {
        self.list_all(&TicketFilter::active()).await
    }
}

/// Notified with every ticket value committed by an escalation decision
#[async_trait]
pub trait TicketUpdateHandler: Send + Sync {
    async fn on_update_ticket(&self, ticket: Ticket) -> Result<()>;
}

/// Filter for listing tickets. Empty vectors match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketFilter {
    pub statuses: Vec<TicketStatus>,
    pub priorities: Vec<Priority>,
    pub levels: Vec<EscalationLevel>,
    pub categories: Vec<String>,
    pub active_only: bool,
}

impl TicketFilter {
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Default::default()
        }
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        let status_match = self.statuses.is_empty() || self.statuses.contains(&ticket.status);

        let priority_match =
            self.priorities.is_empty() || self.priorities.contains(&ticket.priority);

        let level_match = self.levels.is_empty() || self.levels.contains(&ticket.assigned_level);

        let category_match = self.categories.is_empty()
            || self
                .categories
                .iter()
                .any(|c| c.trim() == ticket.category.trim());

        let active_match = !self.active_only || !ticket.is_terminal();

        status_match && priority_match && level_match && category_match && active_match
    }
}
