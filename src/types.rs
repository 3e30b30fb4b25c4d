use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::errors::Error;

/// Index into the key-derivation sequence. Index 0 is the funding account.
pub type AccountIndex = u32;

pub const FUNDING_ACCOUNT: AccountIndex = 0;

pub const SUI_COIN_TYPE: &str = "0x2::sui::SUI";

const ID_LENGTH: usize = 32;

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; ID_LENGTH]);

        impl $name {
            #[must_use]
            pub const fn new(bytes: [u8; ID_LENGTH]) -> Self {
                Self(bytes)
            }

            #[must_use]
            pub fn as_bytes(&self) -> &[u8; ID_LENGTH] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            /// Accepts `0x`-prefixed or bare hex, left-padding short forms like `0x2`.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                if digits.is_empty() || digits.len() > ID_LENGTH * 2 {
                    return Err(Error::Validation(format!(
                        "{} must be 1 to {} hex digits, got {s:?}",
                        stringify!($name),
                        ID_LENGTH * 2
                    )));
                }
                let padded = format!("{digits:0>width$}", width = ID_LENGTH * 2);
                let mut bytes = [0_u8; ID_LENGTH];
                hex::decode_to_slice(padded, &mut bytes)?;
                Ok(Self(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({self})", stringify!($name))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_string())
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    s.parse().map_err(de::Error::custom)
                } else {
                    <[u8; ID_LENGTH]>::deserialize(deserializer).map(Self)
                }
            }
        }
    };
}

hex_id!(
    /// 32-byte account address.
    SuiAddress
);

hex_id!(
    /// 32-byte on-chain object identifier.
    ObjectId
);

/// Object digest. Base58 in JSON, length-prefixed bytes in BCS.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectDigest([u8; 32]);

impl ObjectDigest {
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for ObjectDigest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = bs58::decode(s).into_vec()?;
        let bytes: [u8; 32] = decoded.try_into().map_err(|v: Vec<u8>| {
            Error::Validation(format!("object digest must be 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ObjectDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for ObjectDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectDigest({self})")
    }
}

impl Serialize for ObjectDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for ObjectDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// `(id, version, digest)` triple identifying one version of an owned object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ObjectRef {
    pub object_id: ObjectId,
    pub version: u64,
    pub digest: ObjectDigest,
}

/// The node encodes u64 values as JSON strings; older responses use numbers.
pub fn u64_from_str_or_num<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s.parse().map_err(de::Error::custom),
        Raw::Num(n) => Ok(n),
    }
}

/// One page of a cursor-paginated query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T, C = String> {
    pub data: Vec<T>,
    pub next_cursor: Option<C>,
    #[serde(default)]
    pub has_next_page: bool,
}

impl<T, C> Page<T, C> {
    /// The cursor to request next, or `None` once the listing is exhausted.
    ///
    /// An absent cursor ends paging even if the node claims another page exists.
    pub fn continuation(&self) -> Option<&C> {
        if self.has_next_page {
            self.next_cursor.as_ref()
        } else {
            None
        }
    }
}

/// An owned object as returned by an owned-objects query.
#[derive(Debug, Clone)]
pub struct OwnedObject {
    pub object_ref: ObjectRef,
    pub type_: String,
    /// Move struct fields as JSON.
    pub fields: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coin {
    pub coin_object_id: ObjectId,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub version: u64,
    pub digest: ObjectDigest,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub balance: u64,
}

impl Coin {
    #[must_use]
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef {
            object_id: self.coin_object_id,
            version: self.version,
            digest: self.digest,
        }
    }
}

/// Digest of a submitted transaction, as reported by the node.
pub type TransactionDigest = String;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hex_ids_are_left_padded() {
        let id: ObjectId = "0x2".parse().unwrap();
        let mut expected = [0_u8; 32];
        expected[31] = 2;
        assert_eq!(id.as_bytes(), &expected);
        assert_eq!(
            id.to_string(),
            "0x0000000000000000000000000000000000000000000000000000000000000002"
        );
    }

    #[test]
    fn oversized_ids_are_rejected() {
        let too_long = format!("0x{}", "a".repeat(65));
        assert!(too_long.parse::<SuiAddress>().is_err());
        assert!("0x".parse::<SuiAddress>().is_err());
    }

    #[test]
    fn ids_are_strings_in_json_and_raw_bytes_in_bcs() {
        let id: ObjectId = "0x2".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));

        let bytes = bcs::to_bytes(&id).unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[31], 2);
    }

    #[test]
    fn digests_carry_a_length_prefix_in_bcs() {
        let digest = ObjectDigest::new([7; 32]);
        let bytes = bcs::to_bytes(&digest).unwrap();
        assert_eq!(bytes[0], 32);
        assert_eq!(bytes.len(), 33);

        let round: ObjectDigest = digest.to_string().parse().unwrap();
        assert_eq!(round, digest);
    }

    #[test]
    fn page_stops_without_next_flag_or_cursor() {
        let last: Page<u8> = serde_json::from_value(serde_json::json!({
            "data": [1],
            "nextCursor": "0xabc",
            "hasNextPage": false
        }))
        .unwrap();
        assert!(last.continuation().is_none());

        let dangling: Page<u8> = serde_json::from_value(serde_json::json!({
            "data": [],
            "nextCursor": null,
            "hasNextPage": true
        }))
        .unwrap();
        assert!(dangling.continuation().is_none());
    }
}
