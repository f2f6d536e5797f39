use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::subscription::{SubscriptionId, SubscriptionRecord};
use crate::util::Never;

use super::Storage;

/// A [`Storage`] keeping records in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<SubscriptionId, SubscriptionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriptionId, SubscriptionRecord>> {
        // A panic while holding the lock cannot leave a record half-written.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStore {
    type Error = Never;

    fn has_subscription(&self, id: &SubscriptionId) -> Result<bool, Never> {
        Ok(self.lock().contains_key(id))
    }

    fn get_subscription(&self, id: &SubscriptionId) -> Result<Option<SubscriptionRecord>, Never> {
        Ok(self.lock().get(id).cloned())
    }

    fn set_subscription(&self, record: &SubscriptionRecord) -> Result<(), Never> {
        self.lock().insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn delete_subscription(&self, id: &SubscriptionId) -> Result<bool, Never> {
        Ok(self.lock().remove(id).is_some())
    }

    fn transition_subscription(
        &self,
        prior: &SubscriptionRecord,
        next: Option<&SubscriptionRecord>,
    ) -> Result<bool, Never> {
        let mut records = self.lock();
        match records.get(&prior.id) {
            Some(current)
                if current.subscription_state == prior.subscription_state
                    && current.verify_token == prior.verify_token => {}
            _ => return Ok(false),
        }
        match next {
            Some(next) => {
                records.insert(prior.id.clone(), next.clone());
            }
            None => {
                records.remove(&prior.id);
            }
        }
        Ok(true)
    }
}
