//! Borrower account stage.

use tracing::info;

use super::{SeedContext, SeedError, tolerate_http};
use crate::api::models::{AppUserResponse, Registration};
use crate::api::{ApiClient, ApiError};
use crate::state::IdMap;

/// The register handler answers with an empty 200.
const REGISTER_EXPECTED: &[u16] = &[200, 201, 204];

/// Registers up to `target` new borrowers, then re-lists users to learn ids.
///
/// The returned map covers every account the service lists, not only the
/// ones created here.
pub async fn ensure_users(
    ctx: &mut SeedContext<'_>,
    target: usize,
    password: &str,
) -> Result<IdMap, SeedError> {
    let existing = fetch_users(ctx.client).await?;

    let mut created = 0;
    for _ in 0..target {
        let user = ctx.user_gen.generate(&mut ctx.rng);
        if existing.contains_key(&user.username) {
            continue;
        }

        let body = Registration {
            username: &user.username,
            firstname: &user.firstname,
            lastname: &user.lastname,
            email: &user.email,
            password,
        };
        let result = ctx
            .client
            .post_unit("/auth/register", None, Some(&body), REGISTER_EXPECTED)
            .await;
        if tolerate_http(result, "Register user")?.is_some() {
            created += 1;
        }
    }

    let users = fetch_users(ctx.client).await?;
    info!("Users: {} (created {})", users.len(), created);
    Ok(users)
}

async fn fetch_users(client: &ApiClient) -> Result<IdMap, ApiError> {
    let users: Vec<AppUserResponse> = client.get_list("/appusers").await?;
    Ok(users.into_iter().map(|u| (u.username, u.id)).collect())
}
