//! Storable data objects.

use uuid::Uuid;

/// Identifies a data object; globally unique across the system.
pub type DataId = Uuid;

/// A storable blob with identity.
///
/// Tasks reference data by id instead of carrying the bytes inline. Every
/// stored data object is tied to at least one driver or task reference,
/// which the garbage collector uses to decide its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub id: DataId,
    pub value: Vec<u8>,
    /// Addresses of nodes holding a copy of the value.
    pub localities: Vec<String>,
    /// Whether the scheduler must place consumers at a listed locality.
    pub hard_locality: bool,
    pub persisted: bool,
}

impl Data {
    pub fn new(id: DataId, value: Vec<u8>) -> Self {
        Data {
            id,
            value,
            localities: Vec::new(),
            hard_locality: false,
            persisted: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_data_has_no_localities() {
        let data = Data::new(Uuid::new_v4(), b"payload".to_vec());
        assert!(data.localities.is_empty());
        assert!(!data.hard_locality);
        assert!(!data.persisted);
    }
}
