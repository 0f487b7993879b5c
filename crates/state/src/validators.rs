use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use stakewatch_types::{Validator, ValidatorId};

/// Validators by id. Later observations of an id replace the stored record.
#[derive(Debug, Default)]
pub struct ValidatorRegistry {
    validators: RwLock<HashMap<ValidatorId, Validator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, validator: Validator) {
        let mut validators = self.validators.write().unwrap_or_else(PoisonError::into_inner);
        validators.insert(validator.id, validator);
    }

    pub fn add_batch(&self, batch: Vec<Validator>) {
        let mut validators = self.validators.write().unwrap_or_else(PoisonError::into_inner);
        for validator in batch {
            validators.insert(validator.id, validator);
        }
    }

    pub fn get_by_id(&self, id: ValidatorId) -> Option<Validator> {
        let validators = self.validators.read().unwrap_or_else(PoisonError::into_inner);
        validators.get(&id).cloned()
    }

    /// Copy of the whole registry; later writes are not visible through it.
    pub fn snapshot(&self) -> HashMap<ValidatorId, Validator> {
        let validators = self.validators.read().unwrap_or_else(PoisonError::into_inner);
        validators.clone()
    }

    pub fn len(&self) -> usize {
        self.validators.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
