//! Catalog stages: categories, authors and books.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::info;

use super::{SeedContext, SeedError, tolerate_http};
use crate::api::models::{
    AuthorResponse, BookResponse, CategoryResponse, NewAuthor, NewBook, NewCategory,
};
use crate::dataset::DatasetBook;
use crate::state::IdMap;

/// Copies per new book, inclusive.
const COPIES: (u32, u32) = (1, 3);

/// Most categories attached to a new book.
const MAX_BOOK_CATEGORIES: usize = 2;

/// Lists existing categories and adds up to `extra` new ones.
pub async fn ensure_categories(
    ctx: &mut SeedContext<'_>,
    extra: usize,
) -> Result<IdMap, SeedError> {
    let existing: Vec<CategoryResponse> = ctx.client.get_list("/categories").await?;
    let mut categories: IdMap = existing.into_iter().map(|c| (c.name, c.id)).collect();

    let mut created = 0;
    for _ in 0..extra {
        let name = ctx.category_names.generate(&mut ctx.rng);
        if categories.contains_key(&name) {
            continue;
        }

        let body = NewCategory { name: &name };
        let result = ctx
            .client
            .post::<_, CategoryResponse>("/categories", None, Some(&body), &[201])
            .await;
        if let Some(category) = tolerate_http(result, "Create category")?.flatten() {
            categories.insert(category.name, category.id);
            created += 1;
        }
    }

    info!("Categories: {} (created {})", categories.len(), created);
    Ok(categories)
}

/// Creates authors from the dataset until `target` distinct authors exist.
pub async fn ensure_authors(
    ctx: &mut SeedContext<'_>,
    dataset_books: &[DatasetBook],
    target: usize,
) -> Result<IdMap, SeedError> {
    let existing: Vec<AuthorResponse> = ctx.client.get_list("/authors").await?;
    let mut authors: IdMap = existing.into_iter().map(|a| (a.name, a.id)).collect();

    let mut created = 0;
    for book in dataset_books {
        if authors.len() >= target {
            break;
        }
        if authors.contains_key(&book.author) {
            continue;
        }

        let body = NewAuthor { name: &book.author };
        let result = ctx
            .client
            .post::<_, AuthorResponse>("/authors", None, Some(&body), &[201])
            .await;
        if let Some(author) = tolerate_http(result, "Create author")?.flatten() {
            authors.insert(author.name, author.id);
            created += 1;
        }
    }

    info!("Authors: {} (created {})", authors.len(), created);
    Ok(authors)
}

/// Creates dataset books whose author exists until `target` books exist.
///
/// Each new book gets 1-3 copies and up to two random categories.
pub async fn ensure_books(
    ctx: &mut SeedContext<'_>,
    dataset_books: &[DatasetBook],
    authors: &IdMap,
    category_ids: &[i64],
    target: usize,
) -> Result<IdMap, SeedError> {
    let existing: Vec<BookResponse> = ctx.client.get_list("/books").await?;
    let mut books: IdMap = existing.into_iter().map(|b| (b.title, b.id)).collect();

    let mut created = 0;
    for book in dataset_books {
        if books.len() >= target {
            break;
        }
        if books.contains_key(&book.title) {
            continue;
        }
        // Authors stop being created once their target is hit.
        let Some(&author_id) = authors.get(&book.author) else {
            continue;
        };

        let count = ctx.rng.gen_range(COPIES.0..=COPIES.1);
        let categories = pick_categories(&mut ctx.rng, category_ids);
        let body = NewBook {
            title: &book.title,
            count,
            author_id,
            category_ids: categories,
        };

        let result = ctx
            .client
            .post::<_, BookResponse>("/books", None, Some(&body), &[201])
            .await;
        if let Some(saved) = tolerate_http(result, "Create book")?.flatten() {
            books.insert(saved.title, saved.id);
            created += 1;
        }
    }

    info!("Books: {} (created {})", books.len(), created);
    Ok(books)
}

/// Zero to two distinct category ids.
fn pick_categories(rng: &mut impl Rng, category_ids: &[i64]) -> Vec<i64> {
    if category_ids.is_empty() {
        return Vec::new();
    }
    let k = rng.gen_range(0..=MAX_BOOK_CATEGORIES).min(category_ids.len());
    category_ids.choose_multiple(rng, k).copied().collect()
}
