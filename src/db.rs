//! Storage of subscription records.

#[cfg(feature = "diesel2")]
pub mod diesel2;
pub mod memory;

pub use self::memory::MemoryStore;

use crate::subscription::{SubscriptionId, SubscriptionRecord};

/// A store of [`SubscriptionRecord`]s keyed by their [`SubscriptionId`].
///
/// Implementations must make each method atomic with respect to a single id, since hubs may
/// retry a callback concurrently with the original one.
pub trait Storage {
    type Error;

    fn has_subscription(&self, id: &SubscriptionId) -> Result<bool, Self::Error> {
        self.get_subscription(id).map(|record| record.is_some())
    }

    fn get_subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<SubscriptionRecord>, Self::Error>;

    /// Inserts `record`, replacing any record with the same id.
    fn set_subscription(&self, record: &SubscriptionRecord) -> Result<(), Self::Error>;

    /// Returns `false` if there was no such record.
    fn delete_subscription(&self, id: &SubscriptionId) -> Result<bool, Self::Error>;

    /// Replaces the record of `prior.id` with `next`, or deletes it if `next` is `None`, on
    /// condition that the stored record still has the state and the verify token of `prior`.
    ///
    /// Returns whether the condition held. The check and the write must be a single atomic
    /// operation.
    fn transition_subscription(
        &self,
        prior: &SubscriptionRecord,
        next: Option<&SubscriptionRecord>,
    ) -> Result<bool, Self::Error>;
}

impl<S: Storage + ?Sized> Storage for &S {
    type Error = S::Error;

    fn has_subscription(&self, id: &SubscriptionId) -> Result<bool, S::Error> {
        (**self).has_subscription(id)
    }

    fn get_subscription(&self, id: &SubscriptionId) -> Result<Option<SubscriptionRecord>, S::Error> {
        (**self).get_subscription(id)
    }

    fn set_subscription(&self, record: &SubscriptionRecord) -> Result<(), S::Error> {
        (**self).set_subscription(record)
    }

    fn delete_subscription(&self, id: &SubscriptionId) -> Result<bool, S::Error> {
        (**self).delete_subscription(id)
    }

    fn transition_subscription(
        &self,
        prior: &SubscriptionRecord,
        next: Option<&SubscriptionRecord>,
    ) -> Result<bool, S::Error> {
        (**self).transition_subscription(prior, next)
    }
}

impl<S: Storage + ?Sized> Storage for std::sync::Arc<S> {
    type Error = S::Error;

    fn has_subscription(&self, id: &SubscriptionId) -> Result<bool, S::Error> {
        (**self).has_subscription(id)
    }

    fn get_subscription(&self, id: &SubscriptionId) -> Result<Option<SubscriptionRecord>, S::Error> {
        (**self).get_subscription(id)
    }

    fn set_subscription(&self, record: &SubscriptionRecord) -> Result<(), S::Error> {
        (**self).set_subscription(record)
    }

    fn delete_subscription(&self, id: &SubscriptionId) -> Result<bool, S::Error> {
        (**self).delete_subscription(id)
    }

    fn transition_subscription(
        &self,
        prior: &SubscriptionRecord,
        next: Option<&SubscriptionRecord>,
    ) -> Result<bool, S::Error> {
        (**self).transition_subscription(prior, next)
    }
}
