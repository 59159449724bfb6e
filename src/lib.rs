//! Document composition and form introspection for a veterinary clinic
//! system, built on lopdf
//!
//! Two directions of data flow. Outbound: a structured invoice record
//! graph is laid out into a paginated PDF, and a blank intake form is
//! emitted with named interactive widgets. Inbound: a document of unknown
//! provenance has its widgets probed into a typed name/value map, values
//! are written back by name, and the result can be flattened to static
//! content.
//!
//! Widget kinds are discovered by capability probing — attempting
//! kind-specific operations in a fixed order — rather than by trusting
//! any type tag stored in the document. Every call loads a fresh
//! document from bytes and discards it on return; nothing is shared
//! between calls.

pub mod canvas;
pub mod constants;
pub mod error;
mod fields;
mod fill;
pub mod invoice;
mod probe;
pub mod template;
pub mod text;

pub use error::{DocError, Result};
pub use fields::{FieldKind, FieldValue, ProbedField};
pub use fill::{fill, flatten};
pub use invoice::{
    AnimalInfo, AnimalSection, BillTo, Invoice, InvoiceStatus, LineItem, PaymentInfo,
    render_invoice,
};
pub use probe::probe;
pub use template::build_intake_form;
pub use text::wrap;

/// Install a fmt subscriber honoring `RUST_LOG` for the calling test.
/// Safe to call from every test; only the first installation wins.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
