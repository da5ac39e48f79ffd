use crate::error::{AppError, Result};
use crate::models::Ticket;
use crate::state::{TicketFilter, TicketMutation, TicketStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::cmp::Reverse;
use std::sync::Arc;
use uuid::Uuid;

/// In-memory ticket store
#[derive(Clone)]
pub struct InMemoryStore {
    tickets: Arc<DashMap<Uuid, Ticket>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tickets: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketStore for InMemoryStore {
    async fn save_ticket(&self, ticket: &Ticket) -> Result<()> {
        self.tickets.insert(ticket.id, ticket.clone());
        tracing::debug!(ticket_id = %ticket.id, "Ticket saved");
        Ok(())
    }

    async fn get_ticket(&self, id: &Uuid) -> Result<Option<Ticket>> {
        Ok(self.tickets.get(id).map(|entry| entry.clone()))
    }

    async fn update_ticket(&self, ticket: &Ticket) -> Result<()> {
        match self.tickets.get_mut(&ticket.id) {
            Some(mut entry) => {
                *entry = ticket.clone();
                tracing::debug!(ticket_id = %ticket.id, "Ticket updated");
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Ticket {} not found", ticket.id))),
        }
    }

    async fn modify_ticket<'a>(&self, id: &Uuid, mutate: TicketMutation<'a>) -> Result<Option<Ticket>> {
        // the entry guard is held until the new value is written
        let mut entry = self
            .tickets
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", id)))?;

        let Some(updated) = mutate(entry.value())? else {
            return Ok(None);
        };

        if updated.id != *id {
            return Err(AppError::Internal(format!(
                "mutation of ticket {} produced ticket {}",
                id, updated.id
            )));
        }

        *entry = updated.clone();
        tracing::debug!(ticket_id = %id, "Ticket modified");
        Ok(Some(updated))
    }

    async fn list_all(&self, filter: &TicketFilter) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        // newest first, unknown creation time last
        tickets.sort_by_key(|t| Reverse(t.created_at));
        Ok(tickets)
    }

    async fn list_tickets(
        &self,
        filter: &TicketFilter,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Ticket>> {
        let tickets = self.list_all(filter).await?;
        let start = (page as usize).saturating_mul(page_size as usize);

        Ok(tickets
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect())
    }

    async fn count_tickets(&self, filter: &TicketFilter) -> Result<u64> {
        let count = self
            .tickets
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .count();

        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, TicketStatus};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_save_and_get_ticket() {
        let store = InMemoryStore::new();
        let ticket = Ticket::new("Technical", "HVAC", "AC not cooling", Priority::P1);

        store.save_ticket(&ticket).await.unwrap();

        let retrieved = store.get_ticket(&ticket.id).await.unwrap();
        assert_eq!(retrieved.unwrap().id, ticket.id);
        assert!(store.get_ticket(&Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_ticket_fails() {
        let store = InMemoryStore::new();
        let ticket = Ticket::new("Technical", "HVAC", "AC not cooling", Priority::P1);

        let result = store.update_ticket(&ticket).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_modify_ticket_commits_or_declines() {
        let store = InMemoryStore::new();
        let ticket = Ticket::new("Civil", "Plumbing", "Leak", Priority::P3);
        store.save_ticket(&ticket).await.unwrap();
        let now = Utc::now();

        let committed = store
            .modify_ticket(
                &ticket.id,
                Box::new(move |current: &Ticket| current.with_status(TicketStatus::Wip, now).map(Some)),
            )
            .await
            .unwrap();
        assert_eq!(committed.unwrap().status, TicketStatus::Wip);

        let declined = store
            .modify_ticket(&ticket.id, Box::new(|_: &Ticket| -> Result<Option<Ticket>> { Ok(None) }))
            .await
            .unwrap();
        assert!(declined.is_none());

        let rejected = store
            .modify_ticket(
                &ticket.id,
                Box::new(move |current: &Ticket| current.with_status(TicketStatus::Open, now).map(Some)),
            )
            .await;
        assert!(matches!(rejected, Err(AppError::InvalidStateTransition(_))));

        let stored = store.get_ticket(&ticket.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TicketStatus::Wip);

        let missing = store
            .modify_ticket(&Uuid::new_v4(), Box::new(|_: &Ticket| -> Result<Option<Ticket>> { Ok(None) }))
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_modify_ticket_rejects_id_change() {
        let store = InMemoryStore::new();
        let ticket = Ticket::new("Civil", "Plumbing", "Leak", Priority::P3);
        store.save_ticket(&ticket).await.unwrap();

        let result = store
            .modify_ticket(
                &ticket.id,
                Box::new(|_: &Ticket| -> Result<Option<Ticket>> {
                    Ok(Some(Ticket::new("Civil", "Plumbing", "Leak", Priority::P1)))
                }),
            )
            .await;
        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_list_with_filter_and_pagination() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        for i in 0..5 {
            let priority = if i % 2 == 0 { Priority::P1 } else { Priority::P3 };
            let ticket = Ticket::new("Technical", "Lift", format!("Issue {}", i), priority)
                .with_created_at(now - Duration::minutes(i));
            store.save_ticket(&ticket).await.unwrap();
        }

        let filter = TicketFilter {
            priorities: vec![Priority::P1],
            ..Default::default()
        };
        let p1 = store.list_tickets(&filter, 0, 10).await.unwrap();
        assert_eq!(p1.len(), 3);
        assert_eq!(p1[0].description, "Issue 0");
        assert_eq!(store.count_tickets(&filter).await.unwrap(), 3);

        let second_page = store
            .list_tickets(&TicketFilter::default(), 1, 2)
            .await
            .unwrap();
        assert_eq!(second_page.len(), 2);
        assert_eq!(second_page[0].description, "Issue 2");

        let beyond = store
            .list_tickets(&TicketFilter::default(), u32::MAX, u32::MAX)
            .await
            .unwrap();
        assert!(beyond.is_empty());
    }

    #[tokio::test]
    async fn test_active_tickets_exclude_terminal() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        let open = Ticket::new("Technical", "HVAC", "Noise", Priority::P2);
        let resolved = Ticket::new("Technical", "HVAC", "Leak", Priority::P2)
            .with_status(TicketStatus::Wip, now)
            .and_then(|t| t.with_status(TicketStatus::Resolved, now))
            .unwrap();
        store.save_ticket(&open).await.unwrap();
        store.save_ticket(&resolved).await.unwrap();

        let active = store.active_tickets().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, open.id);

        // no page limit on the full listing
        for _ in 0..150 {
            store
                .save_ticket(&Ticket::new("Technical", "HVAC", "Noise", Priority::P4))
                .await
                .unwrap();
        }
        assert_eq!(store.active_tickets().await.unwrap().len(), 151);
    }
}
