//! Circulation stages: borrows, returns, reviews, hold queues.
//!
//! These loops pick random (user, book) pairings and expect many of them to
//! be rejected, so each gives up after a fixed number of attempts even when
//! its target isn't reached.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use super::{SeedContext, SeedError, tolerate_http};
use crate::api::BasicAuth;
use crate::api::models::{
    BORROW_DURATIONS_DAYS, BookResponse, BorrowResponse, NewBorrow, NewReview,
    SCENARIO_BORROW_DAYS, borrow_duration,
};
use crate::state::IdMap;

/// Queue entries a user may hold, which caps each scenario's queue.
pub const MAX_QUEUE_PER_SCENARIO: usize = 3;

fn return_path(borrow_id: i64) -> String {
    format!("/borrows/{borrow_id}/return")
}

fn queue_join_path(book_id: i64) -> String {
    format!("/books/{book_id}/queue/join")
}

/// Borrows random books for random users until `target` borrows succeed.
pub async fn create_borrows(
    ctx: &mut SeedContext<'_>,
    users: &IdMap,
    book_ids: &[i64],
    target: usize,
) -> Result<Vec<BorrowResponse>, SeedError> {
    if users.is_empty() || book_ids.is_empty() {
        return Ok(Vec::new());
    }

    let user_ids: Vec<i64> = users.values().copied().collect();
    let max_attempts = ctx.caps.for_target(target);
    let mut created = Vec::new();
    let mut attempts = 0;

    while created.len() < target && attempts < max_attempts {
        attempts += 1;
        let user_id = user_ids[ctx.rng.gen_range(0..user_ids.len())];
        let book_id = book_ids[ctx.rng.gen_range(0..book_ids.len())];
        let days = BORROW_DURATIONS_DAYS[ctx.rng.gen_range(0..BORROW_DURATIONS_DAYS.len())];

        let body = NewBorrow {
            borrow_duration: borrow_duration(days),
            book_id,
            app_user_id: user_id,
        };
        let result = ctx
            .client
            .post::<_, BorrowResponse>("/borrows", None, Some(&body), &[201])
            .await;
        if let Some(borrow) = tolerate_http(result, "Create borrow")?.flatten() {
            created.push(borrow);
        }
    }

    info!("Borrows: created {} (attempts {})", created.len(), attempts);
    Ok(created)
}

/// Shuffles `borrows` and returns the first `target` of them.
pub async fn return_some(
    ctx: &mut SeedContext<'_>,
    borrows: &mut [BorrowResponse],
    target: usize,
) -> Result<usize, SeedError> {
    if borrows.is_empty() {
        return Ok(0);
    }
    borrows.shuffle(&mut ctx.rng);

    let mut returned = 0;
    for borrow in borrows.iter().take(target) {
        let result = ctx
            .client
            .post_unit::<()>(&return_path(borrow.id), None, None, &[200])
            .await;
        if tolerate_http(result, "Return borrow")?.is_some() {
            returned += 1;
        }
    }

    info!("Borrows: returned {}", returned);
    Ok(returned)
}

/// Books each user actually borrowed, from the service's borrow responses.
pub fn borrowed_books_by_user(borrows: &[BorrowResponse]) -> BTreeMap<i64, Vec<i64>> {
    let mut by_user: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for (user_id, book_id) in borrows.iter().filter_map(BorrowResponse::pairing) {
        by_user.entry(user_id).or_default().insert(book_id);
    }
    by_user
        .into_iter()
        .map(|(user_id, books)| (user_id, books.into_iter().collect()))
        .collect()
}

/// Reviews books users have borrowed, since the service rejects others.
pub async fn create_reviews(
    ctx: &mut SeedContext<'_>,
    borrows: &[BorrowResponse],
    target: usize,
) -> Result<usize, SeedError> {
    let borrowed = borrowed_books_by_user(borrows);
    let reviewers: Vec<(i64, &Vec<i64>)> = borrowed
        .iter()
        .filter(|(_, books)| !books.is_empty())
        .map(|(user_id, books)| (*user_id, books))
        .collect();
    if reviewers.is_empty() {
        return Ok(0);
    }

    let max_attempts = ctx.caps.for_target(target);
    let mut created = 0;
    let mut attempts = 0;

    while created < target && attempts < max_attempts {
        attempts += 1;
        let (user_id, books) = reviewers[ctx.rng.gen_range(0..reviewers.len())];
        let book_id = books[ctx.rng.gen_range(0..books.len())];
        let review = ctx.review_gen.generate(&mut ctx.rng);

        let body = NewReview {
            rating: review.rating,
            comment: &review.comment,
            app_user_id: user_id,
            book_id,
        };
        let result = ctx
            .client
            .post_unit("/review", None, Some(&body), &[201])
            .await;
        if tolerate_http(result, "Create review")?.is_some() {
            created += 1;
        }
    }

    info!("Reviews: created {} (attempts {})", created, attempts);
    Ok(created)
}

/// Joins hold queues as regular users, authenticating as each of them.
pub async fn create_queue_joins(
    ctx: &mut SeedContext<'_>,
    users: &IdMap,
    password: &str,
    book_ids: &[i64],
    target: usize,
) -> Result<usize, SeedError> {
    if users.is_empty() || book_ids.is_empty() {
        return Ok(0);
    }

    let mut usernames: Vec<&str> = users.keys().map(String::as_str).collect();
    usernames.shuffle(&mut ctx.rng);

    let max_attempts = ctx.caps.for_target(target);
    let mut created = 0;
    let mut attempts = 0;

    while created < target && attempts < max_attempts {
        attempts += 1;
        let username = usernames[ctx.rng.gen_range(0..usernames.len())];
        let book_id = book_ids[ctx.rng.gen_range(0..book_ids.len())];

        let auth = BasicAuth::new(username, password);
        let result = ctx
            .client
            .post_unit::<()>(&queue_join_path(book_id), Some(&auth), None, &[201])
            .await;
        if tolerate_http(result, "Queue join")?.is_some() {
            created += 1;
        }
    }

    info!("Queue joins: created {} (attempts {})", created, attempts);
    Ok(created)
}

/// Borrows a book out, queues other users on it, then returns it.
///
/// The return should notify the head of the queue. Single-copy books are
/// preferred because one borrow makes them unavailable.
pub async fn create_notification_scenarios(
    ctx: &mut SeedContext<'_>,
    users: &IdMap,
    password: &str,
    book_ids: &[i64],
    target: usize,
) -> Result<usize, SeedError> {
    if users.is_empty() || book_ids.is_empty() {
        return Ok(0);
    }

    let candidates = match ctx.client.get_list::<BookResponse>("/books").await {
        Ok(all) => {
            let single_copy: Vec<i64> = all
                .iter()
                .filter(|b| b.count == 1)
                .map(|b| b.id)
                .collect();
            if single_copy.is_empty() {
                book_ids.to_vec()
            } else {
                single_copy
            }
        }
        Err(e) => {
            debug!(
                "Couldn't list books for scenarios, using seeded ones: {}",
                e
            );
            book_ids.to_vec()
        }
    };

    let members: Vec<(&str, i64)> = users
        .iter()
        .map(|(name, id)| (name.as_str(), *id))
        .collect();
    let max_attempts = ctx.caps.for_scenarios(target);
    let mut scenarios = 0;
    let mut attempts = 0;

    while scenarios < target && attempts < max_attempts {
        attempts += 1;
        let book_id = candidates[ctx.rng.gen_range(0..candidates.len())];
        let (_, borrower_id) = members[ctx.rng.gen_range(0..members.len())];

        let body = NewBorrow {
            borrow_duration: borrow_duration(SCENARIO_BORROW_DAYS),
            book_id,
            app_user_id: borrower_id,
        };
        let borrow = match ctx
            .client
            .post::<_, BorrowResponse>("/borrows", None, Some(&body), &[201])
            .await
        {
            Ok(Some(borrow)) => borrow,
            Ok(None) => continue,
            Err(e) if e.is_http() => continue,
            Err(e) => return Err(e.into()),
        };

        let others: Vec<&str> = members
            .iter()
            .filter(|(_, id)| *id != borrower_id)
            .map(|(name, _)| *name)
            .collect();
        let queued: Vec<&str> = others
            .choose_multiple(&mut ctx.rng, MAX_QUEUE_PER_SCENARIO)
            .copied()
            .collect();
        for username in queued {
            let auth = BasicAuth::new(username, password);
            let result = ctx
                .client
                .post_unit::<()>(&queue_join_path(book_id), Some(&auth), None, &[201])
                .await;
            match result {
                Ok(()) => {}
                Err(e) if e.is_http() => {
                    debug!(
                        "Scenario queue join by {} on book {} failed: {}",
                        username, book_id, e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        match ctx
            .client
            .post_unit::<()>(&return_path(borrow.id), None, None, &[200])
            .await
        {
            Ok(()) => scenarios += 1,
            Err(e) if e.is_http() => continue,
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        "Queue scenarios: created {} (attempts {})",
        scenarios, attempts
    );
    Ok(scenarios)
}
