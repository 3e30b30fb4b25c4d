use serde::Deserialize;

use crate::errors::Error;
use crate::types::{u64_from_str_or_num, ObjectId, OwnedObject};
use crate::Result;

/// A `spam::UserCounter` object: one account's activity in one epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter {
    pub id: ObjectId,
    pub tx_count: u64,
    pub epoch: u64,
    pub registered: bool,
}

#[derive(Deserialize)]
struct Uid {
    id: ObjectId,
}

#[derive(Deserialize)]
struct CounterFields {
    id: Uid,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    tx_count: u64,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    epoch: u64,
    registered: bool,
}

impl TryFrom<&OwnedObject> for Counter {
    type Error = Error;

    fn try_from(object: &OwnedObject) -> Result<Self> {
        let fields = CounterFields::deserialize(&object.fields)?;
        if fields.id.id != object.object_ref.object_id {
            return Err(Error::Validation(format!(
                "counter fields name {} but object is {}",
                fields.id.id, object.object_ref.object_id
            )));
        }
        Ok(Self {
            id: fields.id.id,
            tx_count: fields.tx_count,
            epoch: fields.epoch,
            registered: fields.registered,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{ObjectDigest, ObjectRef};

    fn owned(id: &str, fields: serde_json::Value) -> OwnedObject {
        OwnedObject {
            object_ref: ObjectRef {
                object_id: id.parse().unwrap(),
                version: 1,
                digest: ObjectDigest::new([0; 32]),
            },
            type_: "0x1::spam::UserCounter".to_owned(),
            fields,
        }
    }

    #[test]
    fn parses_string_encoded_move_fields() {
        let object = owned(
            "0xabc",
            json!({
                "id": { "id": "0xabc" },
                "tx_count": "42",
                "epoch": "310",
                "registered": true
            }),
        );
        let counter = Counter::try_from(&object).unwrap();
        assert_eq!(counter.tx_count, 42);
        assert_eq!(counter.epoch, 310);
        assert!(counter.registered);
    }

    #[test]
    fn rejects_fields_of_another_object() {
        let object = owned(
            "0xabc",
            json!({
                "id": { "id": "0xdef" },
                "tx_count": 1,
                "epoch": 1,
                "registered": false
            }),
        );
        assert!(matches!(Counter::try_from(&object), Err(Error::Validation(_))));
    }

    #[test]
    fn missing_fields_are_a_serde_error() {
        let object = owned("0xabc", json!({ "id": { "id": "0xabc" } }));
        assert!(matches!(Counter::try_from(&object), Err(Error::Serde(_))));
    }
}
