//! Admin CRUD endpoints.
//!
//! The screens themselves are thin: list with filters, fetch one, create,
//! update, delete. These helpers give them a typed surface over
//! `ApiClient::request` so every call still goes through the gateway.

use std::fmt::Display;

use serde_json::Value;

use crate::navigation::Route;

use super::request::{Method, Payload, RequestConfig};
use super::{ApiClient, ApiError};

/// Prefix shared by every admin endpoint
pub const ADMIN_API_PREFIX: &str = "/api/admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminResource {
    PetTypes,
    Breeds,
    Colors,
    PetFoods,
    UserTypes,
    PetOwners,
    BusinessProfiles,
    StoriesSummary,
}

impl AdminResource {
    pub const ALL: [AdminResource; 8] = [
        AdminResource::PetTypes,
        AdminResource::Breeds,
        AdminResource::Colors,
        AdminResource::PetFoods,
        AdminResource::UserTypes,
        AdminResource::PetOwners,
        AdminResource::BusinessProfiles,
        AdminResource::StoriesSummary,
    ];

    /// Short name used on the command line, e.g. `pet-types`
    pub fn name(&self) -> &'static str {
        match self {
            Self::PetTypes => "pet-types",
            Self::Breeds => "breeds",
            Self::Colors => "colors",
            Self::PetFoods => "pet-foods",
            Self::UserTypes => "user-types",
            Self::PetOwners => "pet-owners",
            Self::BusinessProfiles => "business-profiles",
            Self::StoriesSummary => "stories",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().trim_matches('/').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|r| r.name() == name)
            .or_else(|| (name == "stories/summary").then_some(Self::StoriesSummary))
    }

    /// Collection path, e.g. `/api/admin/pet-types`
    pub fn path(&self) -> String {
        let segment = match self {
            Self::StoriesSummary => "stories/summary",
            other => other.name(),
        };
        format!("{}/{}", ADMIN_API_PREFIX, segment)
    }

    /// Item path. The id is percent-encoded as a single path segment, so
    /// `a/b` or `7?x=1` cannot reach a different endpoint.
    pub fn item_path(&self, id: impl Display) -> String {
        format!("{}/{}", self.path(), urlencoding::encode(&id.to_string()))
    }

    /// The stories summary is a report; it cannot be written to
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::StoriesSummary)
    }

    /// Screen that displays this resource
    pub fn route(&self) -> Route {
        match self {
            Self::PetTypes => Route::PetTypes,
            Self::Breeds => Route::Breeds,
            Self::Colors => Route::Colors,
            Self::PetFoods => Route::PetFoods,
            Self::UserTypes => Route::UserTypes,
            Self::PetOwners => Route::PetOwners,
            Self::BusinessProfiles => Route::BusinessProfiles,
            Self::StoriesSummary => Route::Stories,
        }
    }

    /// Resource shown on a screen, if the screen lists one
    pub fn for_route(route: Route) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.route() == route)
    }
}

/// Optional list filters. Only set, non-blank values are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub country_code: Option<String>,
    pub pet_type_id: Option<String>,
    pub verified: bool,
    pub gold_paw: bool,
    /// Reporting window for the stories summary
    pub days: Option<u32>,
}

impl ListQuery {
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        let mut push_text = |key: &str, value: &Option<String>| {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                params.push((key.to_string(), value.to_string()));
            }
        };
        push_text("petTypeId", &self.pet_type_id);
        push_text("search", &self.search);
        push_text("countryCode", &self.country_code);

        if self.verified {
            params.push(("verified".to_string(), "true".to_string()));
        }
        if self.gold_paw {
            params.push(("goldPaw".to_string(), "true".to_string()));
        }
        if let Some(days) = self.days {
            params.push(("days".to_string(), days.to_string()));
        }
        params
    }

    fn to_config(&self) -> RequestConfig {
        RequestConfig {
            query: self.to_params(),
            ..RequestConfig::default()
        }
    }
}

impl ApiClient {
    pub async fn list(&self, resource: AdminResource, query: &ListQuery) -> Result<Value, ApiError> {
        self.request(Method::Get, &resource.path(), None, Some(&query.to_config()))
            .await
    }

    pub async fn get_item(&self, resource: AdminResource, id: impl Display) -> Result<Value, ApiError> {
        self.request(Method::Get, &resource.item_path(id), None, None)
            .await
    }

    pub async fn create(
        &self,
        resource: AdminResource,
        payload: impl Into<Payload>,
    ) -> Result<Value, ApiError> {
        Self::ensure_writable(resource)?;
        self.request(Method::Post, &resource.path(), Some(payload.into()), None)
            .await
    }

    pub async fn update(
        &self,
        resource: AdminResource,
        id: impl Display,
        payload: impl Into<Payload>,
    ) -> Result<Value, ApiError> {
        Self::ensure_writable(resource)?;
        self.request(Method::Put, &resource.item_path(id), Some(payload.into()), None)
            .await
    }

    pub async fn delete_item(&self, resource: AdminResource, id: impl Display) -> Result<Value, ApiError> {
        Self::ensure_writable(resource)?;
        self.request(Method::Delete, &resource.item_path(id), None, None)
            .await
    }

    fn ensure_writable(resource: AdminResource) -> Result<(), ApiError> {
        if resource.is_read_only() {
            return Err(ApiError::InvalidRequest(format!(
                "{} is read-only",
                resource.name()
            )));
        }
        Ok(())
    }
}
