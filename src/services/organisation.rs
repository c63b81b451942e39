//! Organisation service calls.

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;
use uuid::Uuid;

use crate::client::RequestDispatcher;
use crate::envelope::ResponseEnvelope;
use crate::error::GatewayError;
use crate::normalizer::ExpectedShape;

pub const ORGANISATIONS_PATH: &str = "/organization-service/organizations";

const DEFAULT_ORGANISATION_TYPE: &str = "SOLE_PROPRIETORSHIP";
const DEFAULT_BUSINESS_DOMAIN: Uuid = Uuid::from_u128(0x3fa85f64_5717_4562_b3fc_2c963f66afa6);

fn default_organisation_type() -> String {
    DEFAULT_ORGANISATION_TYPE.to_string()
}

fn default_business_domains() -> Vec<Uuid> {
    vec![DEFAULT_BUSINESS_DOMAIN]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrganisationRequest {
    pub long_name: String,
    pub short_name: String,
    #[serde(default)]
    pub legal_form: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_business_domains")]
    pub business_domains: Vec<Uuid>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(rename = "type", default = "default_organisation_type")]
    pub organisation_type: String,
    #[serde(default)]
    pub web_site_url: Option<String>,
    #[serde(default)]
    pub social_network: Option<String>,
    #[serde(default)]
    pub business_registration_number: Option<String>,
    #[serde(default)]
    pub tax_number: Option<String>,
    #[serde(default)]
    pub capital_share: Option<i64>,
    #[serde(default)]
    pub registration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ceo_name: Option<String>,
    #[serde(default)]
    pub year_founded: Option<DateTime<Utc>>,
}

impl CreateOrganisationRequest {
    pub fn new(long_name: impl Into<String>, short_name: impl Into<String>) -> Self {
        Self {
            long_name: long_name.into(),
            short_name: short_name.into(),
            legal_form: None,
            email: None,
            description: None,
            business_domains: default_business_domains(),
            logo_url: None,
            organisation_type: default_organisation_type(),
            web_site_url: None,
            social_network: None,
            business_registration_number: None,
            tax_number: None,
            capital_share: None,
            registration_date: None,
            ceo_name: None,
            year_founded: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Organisation {
    pub organization_id: Option<String>,
    pub business_actor_id: Option<String>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub legal_form: Option<String>,
    pub website_url: Option<String>,
    pub business_domains: Vec<String>,
    pub keywords: Vec<String>,
    pub is_individual_business: bool,
    pub is_active: bool,
    pub capital_share: Option<i64>,
    pub ceo_name: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Agency {
    pub agency_id: Option<String>,
    pub organization_id: Option<String>,
    pub owner_id: Option<String>,
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub manager_name: Option<String>,
    pub is_active: bool,
    pub is_headquarter: bool,
    pub is_public: bool,
    pub keywords: Vec<String>,
    pub operation_time_plan: BTreeMap<String, String>,
    pub total_affiliated_customers: i64,
    pub created_at: Option<DateTime<Utc>>,
}

/// Client for `organization-service`, backed by the shared dispatcher so the
/// caller's bearer token is forwarded.
#[derive(Clone)]
pub struct OrganisationClient {
    dispatcher: RequestDispatcher,
}

impl OrganisationClient {
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self { dispatcher }
    }

    pub async fn create_organisation(&self, request: &CreateOrganisationRequest) -> ResponseEnvelope {
        self.dispatcher
            .send_json(Method::POST, ORGANISATIONS_PATH, request, ExpectedShape::Empty)
            .await
    }

    pub async fn list_organisations(&self) -> ResponseEnvelope {
        self.dispatcher
            .send(Method::GET, ORGANISATIONS_PATH, None, ExpectedShape::Sequence)
            .await
    }

    pub async fn list_agencies(&self, organisation_id: &str) -> ResponseEnvelope {
        let path = check_segment("organisation id", organisation_id)
            .and_then(|_| organisation_path(&[organisation_id, "agencies"]));
        match path {
            Ok(path) => {
                self.dispatcher
                    .send(Method::GET, &path, None, ExpectedShape::Sequence)
                    .await
            }
            Err(err) => ResponseEnvelope::from_failure(&err, 1),
        }
    }

    pub async fn organisation_info(&self, organisation_id: &str, info_id: &str) -> ResponseEnvelope {
        let path = check_segment("organisation id", organisation_id)
            .and_then(|_| check_segment("info id", info_id))
            .and_then(|_| organisation_path(&[organisation_id, "practical-infos", info_id]));
        match path {
            Ok(path) => {
                self.dispatcher
                    .send(Method::GET, &path, None, ExpectedShape::Scalar)
                    .await
            }
            Err(err) => ResponseEnvelope::from_failure(&err, 1),
        }
    }
}

/// Ids are single path segments; `.` and `..` would be resolved away upstream.
fn check_segment(what: &str, value: &str) -> Result<(), GatewayError> {
    if value.trim().is_empty() || value.contains('/') || value == "." || value == ".." {
        return Err(GatewayError::ValidationFailure(format!(
            "invalid {}: {:?}",
            what, value
        )));
    }
    Ok(())
}

/// [`ORGANISATIONS_PATH`] followed by `segments`, each percent-encoded so
/// `?`, `#` and `%` stay inside their segment.
fn organisation_path(segments: &[&str]) -> Result<String, GatewayError> {
    let invalid = |e: String| GatewayError::ValidationFailure(format!("invalid path: {}", e));
    let mut url = Url::parse("http://organisations.invalid").map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("base cannot hold path segments".to_string()))?
        .clear()
        .extend(ORGANISATIONS_PATH.split('/').filter(|s| !s.is_empty()))
        .extend(segments.iter().copied());
    Ok(url.path().to_string())
}
