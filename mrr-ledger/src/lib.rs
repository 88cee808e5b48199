//! # mrr-ledger
//!
//! Music royalty report ledger: ingests distributor usage reports (CSV/XLS/XLSX),
//! normalizes their columns, stores usage records without duplicates, applies
//! per-track share and royalty overrides and exports payout reports.
//!
//! Pipeline:
//! 1. [`encoding`] and [`reader`] turn uploaded bytes into a header + rows table
//! 2. [`normalizer`] maps headers to canonical fields and coerces cells
//! 3. [`store`] persists records and overrides behind two storage ports
//! 4. [`calculation`] and [`aggregate`] compute payouts and totals
//! 5. [`export`] renders CSV and XLSX downloads
//!
//! [`ledger::RoyaltyLedger`] wires the stages together.

pub mod aggregate;
pub mod calculation;
pub mod encoding;
pub mod export;
pub mod ledger;
pub mod normalizer;
pub mod overrides;
pub mod reader;
pub mod store;

pub use calculation::{Calculator, TaxRate};
pub use export::{ExportFile, ExportFormat};
pub use ledger::{ImportOutcome, ReportFilter, ReportView, RoyaltyLedger, SettingsInput};
pub use store::{MemoryStore, PeriodFilter, SqliteStore};
