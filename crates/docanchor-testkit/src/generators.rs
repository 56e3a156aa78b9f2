//! Proptest generators for property-based testing.

use proptest::prelude::*;

use docanchor::InvoiceData;
use docanchor_core::{CentId, Curve, DocumentId, Keypair, CENT_ID_LENGTH};

/// Generate a random CentId.
pub fn cent_id() -> impl Strategy<Value = CentId> {
    any::<[u8; CENT_ID_LENGTH]>().prop_map(CentId::from_bytes)
}

/// Generate a random DocumentId.
pub fn document_id() -> impl Strategy<Value = DocumentId> {
    any::<[u8; 32]>().prop_map(DocumentId::from_bytes)
}

/// Generate a keypair on `curve`. Seeds that are not valid scalars are skipped.
pub fn keypair(curve: Curve) -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_filter_map("invalid private key", move |seed| {
        Keypair::from_private_bytes(curve, &seed).ok()
    })
}

/// Generate a collaborator list. Duplicates are possible.
pub fn collaborators(max_len: usize) -> impl Strategy<Value = Vec<CentId>> {
    prop::collection::vec(cent_id(), 0..=max_len)
}

/// Generate payload bytes of specified max length.
pub fn bytes(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

fn text() -> impl Strategy<Value = String> {
    "[ -~]{0,24}".prop_map(String::from)
}

fn amount() -> impl Strategy<Value = i64> {
    -1_000_000_000i64..=1_000_000_000i64
}

/// Generate an arbitrary invoice payload.
pub fn invoice_data() -> impl Strategy<Value = InvoiceData> {
    let names = (text(), text(), text(), text(), text(), text());
    let amounts = (amount(), amount(), amount(), 0i64..=10_000i64);
    let identities = (
        proptest::option::of(cent_id()),
        proptest::option::of(cent_id()),
        proptest::option::of(cent_id()),
    );
    let dates = (0i64..=4_102_444_800_000i64, 0i64..=4_102_444_800_000i64);

    (names, amounts, identities, dates, bytes(64)).prop_map(
        |(
            (invoice_number, invoice_status, sender_name, recipient_name, currency, comment),
            (gross_amount, net_amount, tax_amount, tax_rate),
            (recipient, sender, payee),
            (due_date, date_created),
            extra_data,
        )| InvoiceData {
            invoice_number,
            invoice_status,
            sender_name,
            recipient_name,
            currency,
            gross_amount,
            net_amount,
            tax_amount,
            tax_rate,
            recipient,
            sender,
            payee,
            comment,
            due_date,
            date_created,
            extra_data,
        },
    )
}
