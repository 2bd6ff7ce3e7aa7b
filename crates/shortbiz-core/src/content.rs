//! Link-in-bio pages: owner editing, public view, and visit analytics.

use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::error::{ServiceError, ServiceResult};
use crate::store::{
    Block, BlockChanges, BlockClicks, BlockDraft, Page, PageDraft, Store, VisitMeta,
    is_unique_violation,
};

const NO_PAGE: &str = "You don't have a page yet. Create one with `page save`.";

/// A page as visitors see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicPage {
    /// The page.
    pub page: Page,
    /// Active blocks, in display order.
    pub blocks: Vec<Block>,
}

/// Visit totals for a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStats {
    /// Page id.
    pub page_id: i64,
    /// Page slug.
    pub slug: String,
    /// Recorded views.
    pub total_views: i64,
    /// Recorded clicks across all blocks.
    pub total_clicks: i64,
    /// Clicks per block.
    pub blocks: Vec<BlockClicks>,
}

fn require_page(store: &Store, owner_id: &str) -> ServiceResult<Page> {
    store
        .page_by_owner(owner_id)?
        .ok_or_else(|| ServiceError::not_found(NO_PAGE))
}

fn public_page_by_slug(store: &Store, slug: &str) -> ServiceResult<Page> {
    store
        .page_by_slug(slug)?
        .ok_or_else(|| ServiceError::not_found("Page not found."))
}

/// The owner's page.
pub fn get_my_page(store: &Store, owner_id: &str) -> ServiceResult<Page> {
    require_page(store, owner_id)
}

/// Create or replace the owner's page.
#[tracing::instrument(skip(store, draft), fields(slug = %draft.slug))]
pub fn upsert_my_page(store: &Store, owner_id: &str, draft: &PageDraft) -> ServiceResult<Page> {
    draft.validate()?;
    let page = store.upsert_page(owner_id, draft).map_err(|e| {
        if is_unique_violation(&e) {
            ServiceError::Conflict("That slug is already taken.".into())
        } else {
            e.into()
        }
    })?;
    info!(page_id = page.id, "page saved");
    Ok(page)
}

/// The owner's blocks, in display order.
pub fn list_my_blocks(store: &Store, owner_id: &str) -> ServiceResult<Vec<Block>> {
    let page = require_page(store, owner_id)?;
    Ok(store.blocks_for_page(page.id, false)?)
}

/// Add a block to the owner's page.
#[tracing::instrument(skip(store, draft), fields(label = %draft.label))]
pub fn create_block(store: &Store, owner_id: &str, draft: &BlockDraft) -> ServiceResult<Block> {
    let page = require_page(store, owner_id)?;
    draft.validate()?;
    let block = store.insert_block(&page, draft)?;
    info!(block_id = block.id, sort_order = ?block.sort_order, "block created");
    Ok(block)
}

/// Change fields of one of the owner's blocks.
#[tracing::instrument(skip(store, changes))]
pub fn update_block(
    store: &Store,
    owner_id: &str,
    block_id: i64,
    changes: &BlockChanges,
) -> ServiceResult<Block> {
    changes.validate()?;
    store
        .update_block(owner_id, block_id, changes)?
        .ok_or_else(|| ServiceError::not_found("Block not found."))
}

/// Remove one of the owner's blocks.
#[tracing::instrument(skip(store))]
pub fn delete_block(store: &Store, owner_id: &str, block_id: i64) -> ServiceResult<()> {
    if store.delete_block(owner_id, block_id)? {
        info!("block deleted");
        Ok(())
    } else {
        Err(ServiceError::not_found("Block not found."))
    }
}

/// The page published under `slug`, with its active blocks.
pub fn public_page(store: &Store, slug: &str) -> ServiceResult<PublicPage> {
    let page = public_page_by_slug(store, slug)?;
    let blocks = store.blocks_for_page(page.id, true)?;
    Ok(PublicPage { page, blocks })
}

/// Record a visit to the page published under `slug`.
#[tracing::instrument(skip(store, meta))]
pub fn track_view(store: &Store, slug: &str, meta: &VisitMeta) -> ServiceResult<()> {
    let page = public_page_by_slug(store, slug)?;
    store.record_view(page.id, meta)?;
    Ok(())
}

/// Record a click on a block of the page published under `slug`.
#[tracing::instrument(skip(store, meta))]
pub fn track_click(
    store: &Store,
    slug: &str,
    block_id: i64,
    meta: &VisitMeta,
) -> ServiceResult<()> {
    let page = public_page_by_slug(store, slug)?;
    if store.block_on_page(page.id, block_id)?.is_none() {
        return Err(ServiceError::not_found("Block not found for this page."));
    }
    store.record_click(page.id, block_id, meta)?;
    Ok(())
}

/// Visit totals for the owner's page.
pub fn page_stats(store: &Store, owner_id: &str) -> ServiceResult<PageStats> {
    let page = require_page(store, owner_id)?;
    let (total_views, total_clicks, blocks) = store.page_counts(page.id)?;
    Ok(PageStats {
        page_id: page.id,
        slug: page.slug,
        total_views,
        total_clicks,
        blocks,
    })
}
