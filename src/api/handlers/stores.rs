//! Storefront directory endpoints.
//!
//! Listing is public; creating a storefront requires an authenticated
//! account resolved through the session guard.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use super::auth::{
    session::authenticate_session,
    store::{DynAccountStore, InsertStoreOutcome, NewStoreListing, StoreListing},
};

const LOGIN_REQUIRED_NOTICE: &str = "Oops you must be logged in to do that!";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateStoreRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct StoreResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<StoreListing> for StoreResponse {
    fn from(listing: StoreListing) -> Self {
        Self {
            id: listing.id.to_string(),
            name: listing.name,
            slug: listing.slug,
            description: listing.description,
            tags: listing.tags,
            created_at: listing.created_at,
        }
    }
}

/// Derive a URL slug from a storefront name.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[utoipa::path(
    get,
    path = "/v1/stores",
    responses(
        (status = 200, description = "All storefronts, newest first", body = [StoreResponse])
    ),
    tag = "stores"
)]
pub async fn list_stores(store: Extension<DynAccountStore>) -> impl IntoResponse {
    match store.list_stores().await {
        Ok(listings) => {
            let response: Vec<StoreResponse> =
                listings.into_iter().map(StoreResponse::from).collect();
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            error!("Failed to list stores: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/stores",
    request_body = CreateStoreRequest,
    responses(
        (status = 201, description = "Storefront created", body = StoreResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Login required"),
        (status = 409, description = "A storefront with that name already exists")
    ),
    tag = "stores"
)]
pub async fn create_store(
    headers: HeaderMap,
    store: Extension<DynAccountStore>,
    payload: Option<Json<CreateStoreRequest>>,
) -> impl IntoResponse {
    let session = match authenticate_session(&headers, store.as_ref(), Utc::now()).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            return (StatusCode::UNAUTHORIZED, LOGIN_REQUIRED_NOTICE.to_string()).into_response();
        }
        Err(status) => return status.into_response(),
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let slug = slugify(&request.name);
    if slug.is_empty() {
        return (StatusCode::BAD_REQUEST, "Store name is required".to_string()).into_response();
    }

    let listing = NewStoreListing {
        name: request.name.trim().to_string(),
        slug,
        description: request.description.trim().to_string(),
        tags: request.tags,
    };

    match store.insert_store(session.account_id, &listing).await {
        Ok(InsertStoreOutcome::Created(id)) => {
            let response = StoreResponse {
                id: id.to_string(),
                name: listing.name,
                slug: listing.slug,
                description: listing.description,
                tags: listing.tags,
                created_at: Utc::now(),
            };
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Ok(InsertStoreOutcome::SlugConflict) => (
            StatusCode::CONFLICT,
            "A storefront with that name already exists".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to create store: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_dashes() {
        assert_eq!(slugify("Betty's Bagels"), "betty-s-bagels");
        assert_eq!(slugify("  CAFÉ  Nine "), "caf-nine");
        assert_eq!(slugify("---"), "");
    }
}
