//! Typed wrappers over the dispatcher for individual upstream services.

pub mod organisation;

pub use organisation::{Agency, CreateOrganisationRequest, Organisation, OrganisationClient};
