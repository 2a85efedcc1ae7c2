pub mod guardrails;
pub mod normalize;
pub mod schema;

pub use guardrails::{check_guardrails, passes_guardrails, GuardrailViolation};
pub use normalize::{normalize, slugify, RawCandidate};
pub use schema::{validate, validate_recipe, ValidationReport};
