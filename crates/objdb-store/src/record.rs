use serde::{Deserialize, Serialize};

use objdb_types::{ClassOid, Position, TypeId};

use crate::error::{StoreError, StoreResult};

/// A stored class definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    /// Canonical type name.
    pub name: String,
    pub type_id: TypeId,
}

/// A stored object instance. The store never interprets `data`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub class: ClassOid,
    pub type_id: TypeId,
    pub data: Vec<u8>,
}

/// Payload of one frame on the record channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum StoredRecord {
    Class(ClassRecord),
    Object(ObjectRecord),
}

impl StoredRecord {
    pub(crate) fn encode(&self) -> StoreResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub(crate) fn decode(bytes: &[u8], position: Position) -> StoreResult<Self> {
        bincode::deserialize(bytes).map_err(|e| StoreError::CorruptRecord {
            position,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undecodable_payload_is_corrupt() {
        let err = StoredRecord::decode(&[0xFF; 3], Position::new(42)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::CorruptRecord { position, .. } if position == Position::new(42)
        ));
    }

    #[test]
    fn object_record_encodes() {
        let record = StoredRecord::Object(ObjectRecord {
            class: ClassOid::new(1),
            type_id: TypeId::new(1000),
            data: b"payload".to_vec(),
        });
        let bytes = record.encode().unwrap();
        assert_eq!(StoredRecord::decode(&bytes, Position::new(0)).unwrap(), record);
    }
}
