//! Billing participant.

mod model;
mod participant;
mod store;

pub use model::{Invoice, InvoiceStatus, NewInvoice};
pub use participant::{BillingParticipant, InvoiceNumberSource, random_invoice_number};
pub use store::{InMemoryInvoiceStore, InvoiceInsert, InvoiceStore};
