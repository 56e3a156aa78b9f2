//! Typed payloads and the embedded type registry.
//!
//! A core document carries its payload as opaque bytes plus a type
//! identifier. [`EmbeddedModel`] is the capability a typed document
//! implements to be packed into an envelope; [`TypeRegistry`] maps type
//! identifiers to decoders so a receiver can check payloads it has never
//! seen before. Unknown types fail closed.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::error::{CoreError, Result};

/// A business payload that can be embedded in a core document.
pub trait EmbeddedModel: Sized + Send + 'static {
    /// Type identifier written into `embedded_type`.
    const TYPE_ID: &'static str;

    /// Names of all salted payload fields, in a stable order.
    fn field_names() -> &'static [&'static str];

    /// Canonical bytes of one field, used to detect per-field changes.
    fn field_value(&self, field: &str) -> Option<Vec<u8>>;

    /// Canonical payload bytes.
    fn to_payload(&self) -> Vec<u8>;

    /// Parse payload bytes. Identity fields of the wrong width are errors.
    fn from_payload(bytes: &[u8]) -> Result<Self>;

    /// Fields whose value differs between `self` and `other`.
    fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        Self::field_names()
            .iter()
            .copied()
            .filter(|f| self.field_value(f) != other.field_value(f))
            .collect()
    }
}

/// A decoded payload of some registered type.
pub type DecodedModel = Box<dyn Any + Send>;

type DecodeFn = fn(&[u8]) -> Result<DecodedModel>;

fn decode_boxed<M: EmbeddedModel>(bytes: &[u8]) -> Result<DecodedModel> {
    Ok(Box::new(M::from_payload(bytes)?))
}

/// Explicit registry of embedded payload types.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    decoders: HashMap<&'static str, DecodeFn>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payload type. Re-registering the same type is a no-op.
    pub fn register<M: EmbeddedModel>(&mut self) -> &mut Self {
        self.decoders.insert(M::TYPE_ID, decode_boxed::<M>);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<M: EmbeddedModel>(mut self) -> Self {
        self.register::<M>();
        self
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.decoders.contains_key(type_id)
    }

    /// Registered type identifiers.
    pub fn type_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.decoders.keys().copied()
    }

    /// Decode a payload of a registered type.
    pub fn decode(&self, type_id: &str, bytes: &[u8]) -> Result<DecodedModel> {
        let decode = self
            .decoders
            .get(type_id)
            .ok_or_else(|| CoreError::UnrecognizedType(type_id.to_string()))?;
        decode(bytes)
    }

    /// Check that a payload decodes, discarding the result.
    pub fn check(&self, type_id: &str, bytes: &[u8]) -> Result<()> {
        self.decode(type_id, bytes).map(|_| ())
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.decoders.keys()).finish()
    }
}

#[cfg(test)]
pub(crate) mod test_model {
    //! A minimal payload type for envelope tests.

    use ciborium::value::Value;

    use super::EmbeddedModel;
    use crate::canonical::{decode_value, encode_canonical, key, MapReader};
    use crate::error::Result;
    use crate::identity::CentId;

    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct Note {
        pub title: String,
        pub amount: i64,
        pub owner: Option<CentId>,
    }

    impl EmbeddedModel for Note {
        const TYPE_ID: &'static str = "docanchor.test.Note";

        fn field_names() -> &'static [&'static str] {
            &["title", "amount", "owner"]
        }

        fn field_value(&self, field: &str) -> Option<Vec<u8>> {
            match field {
                "title" => Some(self.title.as_bytes().to_vec()),
                "amount" => Some(self.amount.to_be_bytes().to_vec()),
                "owner" => Some(self.owner.map(|o| o.0.to_vec()).unwrap_or_default()),
                _ => None,
            }
        }

        fn to_payload(&self) -> Vec<u8> {
            let mut entries = vec![
                (key(1), Value::Text(self.title.clone())),
                (key(2), Value::Integer(self.amount.into())),
            ];
            if let Some(owner) = self.owner {
                entries.push((key(3), Value::Bytes(owner.0.to_vec())));
            }
            encode_canonical(&Value::Map(entries))
        }

        fn from_payload(bytes: &[u8]) -> Result<Self> {
            let value = decode_value(bytes)?;
            let map = MapReader::new(&value, "note")?;
            Ok(Note {
                title: map.text_or_empty(1, "title")?.to_string(),
                amount: map.int_or_zero(2, "amount")?,
                owner: map.opt_bytes(3, "owner")?.map(CentId::from_slice).transpose()?,
            })
        }
    }
}
