//! Company Unify - CRM / Installed-Base Reconciliation
//!
//! Reconciles two independently sourced extracts that describe the same
//! companies under differently written names (a relationship-management
//! extract and an equipment installed-base extract) into one queryable
//! unified company view.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Consumers: reporting, export, HTTP layer (not in this crate)   │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │               ReconciliationService                              │
//! │   load_sources · rebuild · filtered reads · enrichment          │
//! └─────────────────────────────────────────────────────────────────┘
//!          │                    │                      │
//!          ▼                    ▼                      ▼
//! ┌────────────────┐  ┌──────────────────┐  ┌──────────────────────┐
//! │  Query Cache   │  │ UnifiedView      │  │ Entity Resolver      │
//! │  + Filter      │  │ Builder          │  │ exact → fuzzy →      │
//! │  Engine        │  │ (fingerprinted)  │  │ verifier → threshold │
//! └────────────────┘  └──────────────────┘  └──────────────────────┘
//!          │                    │                      │
//!          ▼                    ▼                      ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Store (embedded SQLite)                          │
//! │   sources · company_mappings · _meta · unified_companies        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use company_unify::{CompanyFilter, ReconcileConfig, ReconciliationService};
//!
//! let config = ReconcileConfig::from_file("config/unify.yaml")?;
//! let service = ReconciliationService::open(config).await?;
//!
//! service.load_sources(crm_rows, equipment_rows).await?;
//! service.rebuild_unified_view().await?;
//!
//! let german = service
//!     .get_unified_companies(CompanyFilter::all().with_country("Germany"))
//!     .await;
//! ```

pub mod config;
pub mod enrich;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod matching;
pub mod model;
pub mod oplog;
pub mod query;
pub mod service;
pub mod store;
pub mod view;

pub use config::ReconcileConfig;
pub use error::{ReconcileError, Result};
pub use model::{
    CompanyDetail, CompanyFilter, CompanyMapping, CrmRecord, EquipmentRecord, MatchQualityStats,
    UnifiedCompany,
};
pub use oplog::OperationalLog;
pub use service::ReconciliationService;
pub use store::Store;
pub use view::RebuildOutcome;
