//! The invoice typed document.
//!
//! [`InvoiceData`] is the payload embedded in a core document. [`Invoice`]
//! pairs it with the collaborator list and the envelope it was last packed
//! into, and converts to and from the client representation, where
//! identities and opaque bytes are hex strings.

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use docanchor_core::canonical::{decode_value, encode_canonical, key, MapReader};
use docanchor_core::{
    new_version, pack_core_document, unpack_core_document, CentId, CoreDocument, CoreError,
    EmbeddedModel,
};

use crate::error::{NodeError, Result};

/// Embedded type identifier of invoices.
pub const INVOICE_TYPE_ID: &str = "docanchor.invoice.InvoiceData";

/// Payload field names. The wire key of a field is its position plus one.
const FIELD_NAMES: [&str; 16] = [
    "invoice_number",
    "invoice_status",
    "sender_name",
    "recipient_name",
    "currency",
    "gross_amount",
    "net_amount",
    "tax_amount",
    "tax_rate",
    "recipient",
    "sender",
    "payee",
    "comment",
    "due_date",
    "date_created",
    "extra_data",
];

/// Invoice payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvoiceData {
    pub invoice_number: String,
    pub invoice_status: String,
    pub sender_name: String,
    pub recipient_name: String,
    pub currency: String,
    /// Amounts are in the currency's minor unit.
    pub gross_amount: i64,
    pub net_amount: i64,
    pub tax_amount: i64,
    /// Basis points.
    pub tax_rate: i64,
    pub recipient: Option<CentId>,
    pub sender: Option<CentId>,
    pub payee: Option<CentId>,
    pub comment: String,
    /// Unix ms.
    pub due_date: i64,
    /// Unix ms.
    pub date_created: i64,
    pub extra_data: Vec<u8>,
}

impl InvoiceData {
    /// CBOR value of one field; absent identities are null.
    fn field_cbor(&self, field: &str) -> Option<Value> {
        let text = |s: &String| Value::Text(s.clone());
        let int = |n: i64| Value::Integer(n.into());
        let identity = |id: &Option<CentId>| match id {
            Some(id) => Value::Bytes(id.0.to_vec()),
            None => Value::Null,
        };

        let value = match field {
            "invoice_number" => text(&self.invoice_number),
            "invoice_status" => text(&self.invoice_status),
            "sender_name" => text(&self.sender_name),
            "recipient_name" => text(&self.recipient_name),
            "currency" => text(&self.currency),
            "gross_amount" => int(self.gross_amount),
            "net_amount" => int(self.net_amount),
            "tax_amount" => int(self.tax_amount),
            "tax_rate" => int(self.tax_rate),
            "recipient" => identity(&self.recipient),
            "sender" => identity(&self.sender),
            "payee" => identity(&self.payee),
            "comment" => text(&self.comment),
            "due_date" => int(self.due_date),
            "date_created" => int(self.date_created),
            "extra_data" => Value::Bytes(self.extra_data.clone()),
            _ => return None,
        };
        Some(value)
    }
}

impl EmbeddedModel for InvoiceData {
    const TYPE_ID: &'static str = INVOICE_TYPE_ID;

    fn field_names() -> &'static [&'static str] {
        &FIELD_NAMES
    }

    fn field_value(&self, field: &str) -> Option<Vec<u8>> {
        self.field_cbor(field).map(|v| encode_canonical(&v))
    }

    fn to_payload(&self) -> Vec<u8> {
        let entries = FIELD_NAMES
            .iter()
            .enumerate()
            .filter_map(|(i, name)| match self.field_cbor(name) {
                Some(Value::Null) | None => None,
                Some(value) => Some((key(i as u64 + 1), value)),
            })
            .collect();
        encode_canonical(&Value::Map(entries))
    }

    fn from_payload(bytes: &[u8]) -> docanchor_core::Result<Self> {
        let value = decode_value(bytes)?;
        let map = MapReader::new(&value, "invoice")?;

        let text = |k: u64, name: &str| map.text_or_empty(k, name).map(str::to_string);
        let identity = |k: u64, name: &str| -> docanchor_core::Result<Option<CentId>> {
            map.opt_bytes(k, name)?.map(CentId::from_slice).transpose()
        };

        Ok(InvoiceData {
            invoice_number: text(1, "invoice_number")?,
            invoice_status: text(2, "invoice_status")?,
            sender_name: text(3, "sender_name")?,
            recipient_name: text(4, "recipient_name")?,
            currency: text(5, "currency")?,
            gross_amount: map.int_or_zero(6, "gross_amount")?,
            net_amount: map.int_or_zero(7, "net_amount")?,
            tax_amount: map.int_or_zero(8, "tax_amount")?,
            tax_rate: map.int_or_zero(9, "tax_rate")?,
            recipient: identity(10, "recipient")?,
            sender: identity(11, "sender")?,
            payee: identity(12, "payee")?,
            comment: text(13, "comment")?,
            due_date: map.int_or_zero(14, "due_date")?,
            date_created: map.int_or_zero(15, "date_created")?,
            extra_data: map.bytes_or_empty(16, "extra_data")?.to_vec(),
        })
    }
}

/// Client-facing invoice fields. Identities and extra data are hex strings;
/// an empty identity string means the identity is absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceClientData {
    pub invoice_number: String,
    pub invoice_status: String,
    pub sender_name: String,
    pub recipient_name: String,
    pub currency: String,
    pub gross_amount: i64,
    pub net_amount: i64,
    pub tax_amount: i64,
    pub tax_rate: i64,
    pub recipient: String,
    pub sender: String,
    pub payee: String,
    pub comment: String,
    pub due_date: i64,
    pub date_created: i64,
    pub extra_data: String,
}

/// Client request to create or update an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceCreatePayload {
    pub data: InvoiceClientData,
    /// Hex identities, in order. Duplicates are kept.
    pub collaborators: Vec<String>,
}

/// An invoice and the envelope it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invoice {
    pub data: InvoiceData,
    pub collaborators: Vec<CentId>,
    core: Option<CoreDocument>,
}

impl Invoice {
    pub fn new(data: InvoiceData, collaborators: Vec<CentId>) -> Self {
        Self {
            data,
            collaborators,
            core: None,
        }
    }

    /// The envelope this invoice was last packed into or unpacked from.
    pub fn core_document(&self) -> Option<&CoreDocument> {
        self.core.as_ref()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Envelope
    // ─────────────────────────────────────────────────────────────────────────

    /// Pack into the current envelope, minting one on first use.
    ///
    /// Changing a salted field or the collaborators of an already packed
    /// invoice fails; use [`new_version`](Self::new_version).
    pub fn pack_core_document(&mut self) -> Result<CoreDocument> {
        let doc = pack_core_document(&self.data, &self.collaborators, self.core.as_ref())?;
        self.core = Some(doc.clone());
        Ok(doc)
    }

    /// Rebuild an invoice from an envelope.
    pub fn unpack_core_document(doc: &CoreDocument) -> Result<Self> {
        let data = unpack_core_document::<InvoiceData>(Some(doc))?;
        Ok(Self {
            data,
            collaborators: doc.collaborators.clone(),
            core: Some(doc.clone()),
        })
    }

    /// Pack the current contents as the next version of the envelope.
    pub fn new_version(&mut self) -> Result<CoreDocument> {
        let previous = self.core.as_ref().ok_or(CoreError::NilDocument)?;
        let doc = new_version(&self.data, &self.collaborators, previous)?;
        self.core = Some(doc.clone());
        Ok(doc)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Client representation
    // ─────────────────────────────────────────────────────────────────────────

    /// The client representation of the payload.
    pub fn to_client_data(&self) -> InvoiceClientData {
        let identity = |id: &Option<CentId>| id.map(|id| id.to_hex()).unwrap_or_default();
        let d = &self.data;

        InvoiceClientData {
            invoice_number: d.invoice_number.clone(),
            invoice_status: d.invoice_status.clone(),
            sender_name: d.sender_name.clone(),
            recipient_name: d.recipient_name.clone(),
            currency: d.currency.clone(),
            gross_amount: d.gross_amount,
            net_amount: d.net_amount,
            tax_amount: d.tax_amount,
            tax_rate: d.tax_rate,
            recipient: identity(&d.recipient),
            sender: identity(&d.sender),
            payee: identity(&d.payee),
            comment: d.comment.clone(),
            due_date: d.due_date,
            date_created: d.date_created,
            extra_data: hex::encode(&d.extra_data),
        }
    }

    /// The client payload that recreates this invoice.
    pub fn to_client_payload(&self) -> InvoiceCreatePayload {
        InvoiceCreatePayload {
            data: self.to_client_data(),
            collaborators: self.collaborators.iter().map(CentId::to_hex).collect(),
        }
    }

    /// Build an invoice from a client payload.
    ///
    /// Decodes recipient, sender, payee, extra data, then each collaborator
    /// in order, and reports the first field that fails.
    pub fn from_client_payload(payload: &InvoiceCreatePayload) -> Result<Self> {
        let c = &payload.data;

        let recipient = decode_identity(&c.recipient).map_err(field_error("recipient"))?;
        let sender = decode_identity(&c.sender).map_err(field_error("sender"))?;
        let payee = decode_identity(&c.payee).map_err(field_error("payee"))?;
        let extra_data = decode_hex(&c.extra_data).map_err(field_error("extra data"))?;

        let collaborators = payload
            .collaborators
            .iter()
            .map(|s| CentId::from_hex(s).map_err(field_error("collaborator")))
            .collect::<Result<Vec<_>>>()?;

        let data = InvoiceData {
            invoice_number: c.invoice_number.clone(),
            invoice_status: c.invoice_status.clone(),
            sender_name: c.sender_name.clone(),
            recipient_name: c.recipient_name.clone(),
            currency: c.currency.clone(),
            gross_amount: c.gross_amount,
            net_amount: c.net_amount,
            tax_amount: c.tax_amount,
            tax_rate: c.tax_rate,
            recipient,
            sender,
            payee,
            comment: c.comment.clone(),
            due_date: c.due_date,
            date_created: c.date_created,
            extra_data,
        };
        Ok(Self::new(data, collaborators))
    }

    /// JSON of the client payload.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_client_payload())?)
    }

    /// Parse JSON produced by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self> {
        let payload: InvoiceCreatePayload = serde_json::from_str(json)?;
        Self::from_client_payload(&payload)
    }
}

fn field_error(field: &'static str) -> impl Fn(CoreError) -> NodeError {
    move |source| NodeError::FieldDecode { field, source }
}

fn decode_identity(s: &str) -> docanchor_core::Result<Option<CentId>> {
    if s.is_empty() {
        return Ok(None);
    }
    CentId::from_hex(s).map(Some)
}

fn decode_hex(s: &str) -> docanchor_core::Result<Vec<u8>> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| CoreError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InvoiceData {
        InvoiceData {
            invoice_number: "INV-2042".into(),
            invoice_status: "unpaid".into(),
            sender_name: "Acme".into(),
            recipient_name: "Globex".into(),
            currency: "EUR".into(),
            gross_amount: 42_00,
            net_amount: 35_29,
            tax_amount: 6_71,
            tax_rate: 1900,
            recipient: Some(CentId::from_bytes([1, 2, 3, 4, 5, 6])),
            sender: Some(CentId::from_bytes([1, 2, 3, 6, 5, 6])),
            payee: None,
            comment: "net 30".into(),
            due_date: 1_700_000_000_000,
            date_created: 1_690_000_000_000,
            extra_data: vec![1, 2, 3, 2, 3, 1],
        }
    }

    fn bad_payload() -> InvoiceCreatePayload {
        InvoiceCreatePayload {
            data: InvoiceClientData {
                recipient: "some recipient".into(),
                sender: "some number".into(),
                payee: "some payee".into(),
                extra_data: "some data".into(),
                ..Default::default()
            },
            collaborators: vec!["010102040506".into(), "some id".into()],
        }
    }

    fn failed_field(result: Result<Invoice>) -> &'static str {
        match result {
            Err(NodeError::FieldDecode { field, .. }) => field,
            other => panic!("expected field decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_roundtrip() {
        let data = sample();
        assert_eq!(InvoiceData::from_payload(&data.to_payload()).unwrap(), data);
        assert_eq!(
            InvoiceData::from_payload(&InvoiceData::default().to_payload()).unwrap(),
            InvoiceData::default()
        );
    }

    #[test]
    fn test_wrong_width_identity_rejected() {
        let payload = encode_canonical(&Value::Map(vec![(
            key(10),
            Value::Bytes(vec![1, 2, 3, 4, 5, 6, 7]),
        )]));
        assert!(matches!(
            InvoiceData::from_payload(&payload),
            Err(CoreError::InvalidLength { expected: 6, actual: 7 })
        ));
    }

    #[test]
    fn test_pack_unpack_preserves_payload_and_salts() {
        let mut invoice = Invoice::new(sample(), vec![CentId::random()]);
        let doc = invoice.pack_core_document().unwrap();
        assert_eq!(doc.embedded_type, INVOICE_TYPE_ID);
        assert_eq!(doc.field_salts.len(), FIELD_NAMES.len());

        let mut unpacked = Invoice::unpack_core_document(&doc).unwrap();
        assert_eq!(unpacked, invoice);

        let repacked = unpacked.pack_core_document().unwrap();
        assert_eq!(repacked.embedded_data, doc.embedded_data);
        assert_eq!(repacked.field_salts, doc.field_salts);
    }

    #[test]
    fn test_mutation_requires_new_version() {
        let mut invoice = Invoice::new(sample(), vec![]);
        let v1 = invoice.pack_core_document().unwrap();

        invoice.data.gross_amount += 1;
        assert!(matches!(
            invoice.pack_core_document(),
            Err(NodeError::Core(CoreError::UnversionedMutation(field))) if field == "gross_amount"
        ));

        let v2 = invoice.new_version().unwrap();
        assert_eq!(v2.document_id, v1.document_id);
        assert_eq!(v2.previous_version, Some(v1.current_version));
        assert_ne!(
            v2.field_salts.get("gross_amount"),
            v1.field_salts.get("gross_amount")
        );
        assert_eq!(v2.field_salts.get("currency"), v1.field_salts.get("currency"));
    }

    #[test]
    fn test_new_version_requires_envelope() {
        let mut invoice = Invoice::new(sample(), vec![]);
        assert!(matches!(
            invoice.new_version(),
            Err(NodeError::Core(CoreError::NilDocument))
        ));
    }

    #[test]
    fn test_unpack_rejects_other_types() {
        let mut invoice = Invoice::new(sample(), vec![]);
        let mut doc = invoice.pack_core_document().unwrap();
        doc.embedded_type = "docanchor.purchase_order.Data".into();
        assert!(matches!(
            Invoice::unpack_core_document(&doc),
            Err(NodeError::Core(CoreError::UnrecognizedType(_)))
        ));

        doc.embedded_type = String::new();
        assert!(matches!(
            Invoice::unpack_core_document(&doc),
            Err(NodeError::Core(CoreError::MissingData(_)))
        ));
    }

    #[test]
    fn test_client_data_hex_encodes() {
        let invoice = Invoice::new(sample(), vec![]);
        let client = invoice.to_client_data();
        assert_eq!(client.recipient, "010203040506");
        assert_eq!(client.sender, "010203060506");
        assert_eq!(client.payee, "");
        assert_eq!(client.extra_data, "010203020301");
        assert_eq!(client.gross_amount, 42_00);
    }

    #[test]
    fn test_client_roundtrip() {
        let invoice = Invoice::new(
            sample(),
            vec![CentId::from_bytes([9; 6]), CentId::from_bytes([9; 6])],
        );
        let back = Invoice::from_client_payload(&invoice.to_client_payload()).unwrap();
        assert_eq!(back, invoice);

        let back = Invoice::from_json(&invoice.to_json().unwrap()).unwrap();
        assert_eq!(back, invoice);
    }

    #[test]
    fn test_decode_errors_follow_field_order() {
        let mut payload = bad_payload();
        assert_eq!(failed_field(Invoice::from_client_payload(&payload)), "recipient");

        payload.data.recipient = "010203040506".into();
        assert_eq!(failed_field(Invoice::from_client_payload(&payload)), "sender");

        payload.data.sender = "010203060506".into();
        assert_eq!(failed_field(Invoice::from_client_payload(&payload)), "payee");

        payload.data.payee = "010203030405".into();
        assert_eq!(failed_field(Invoice::from_client_payload(&payload)), "extra data");

        payload.data.extra_data = "010203020301".into();
        assert_eq!(failed_field(Invoice::from_client_payload(&payload)), "collaborator");

        payload.collaborators = vec!["010102040506".into(), "010203020302".into()];
        let invoice = Invoice::from_client_payload(&payload).unwrap();
        assert_eq!(invoice.data.sender, Some(CentId::from_bytes([1, 2, 3, 6, 5, 6])));
        assert_eq!(invoice.data.payee, Some(CentId::from_bytes([1, 2, 3, 3, 4, 5])));
        assert_eq!(invoice.data.recipient, Some(CentId::from_bytes([1, 2, 3, 4, 5, 6])));
        assert_eq!(invoice.data.extra_data, vec![1, 2, 3, 2, 3, 1]);
        assert_eq!(
            invoice.collaborators,
            vec![
                CentId::from_bytes([1, 1, 2, 4, 5, 6]),
                CentId::from_bytes([1, 2, 3, 2, 3, 2])
            ]
        );
    }

    #[test]
    fn test_decode_error_message_names_field() {
        let err = Invoice::from_client_payload(&bad_payload()).unwrap_err();
        assert!(err.to_string().starts_with("failed to decode recipient"));
    }

    #[test]
    fn test_short_identity_is_length_error() {
        let mut payload = InvoiceCreatePayload::default();
        payload.data.payee = "0102030405".into();
        assert!(matches!(
            Invoice::from_client_payload(&payload),
            Err(NodeError::FieldDecode {
                field: "payee",
                source: CoreError::InvalidLength { .. }
            })
        ));
    }
}
