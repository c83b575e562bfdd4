//! Company name matching
//!
//! Normalization, token-sort fuzzy scoring, the optional verifier and the
//! resolver that chains them.

pub mod fuzzy;
pub mod normalize;
pub mod resolver;
pub mod verifier;

pub use fuzzy::{similarity, top_k, FuzzyCandidate, FuzzyPool};
pub use normalize::{comparison_key, normalize_company_name, title_case_country};
pub use resolver::{EntityResolver, MatchMethod, Resolution, TargetPool};
pub use verifier::{LlmMatchVerifier, MatchVerifier, VerificationDecision};
