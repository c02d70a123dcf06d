//! congress.gov API client
//!
//! Builds authenticated, paginated requests and runs each one through the
//! retry manager. Every attempt takes its own token from the shared bucket.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::{debug, warn};

use super::types::{
    parse_list, parse_object, RawAction, RawBill, RawBillDetail, RawCommittee, RawCommitteeRef,
    RawMember, RawMemberDetail, Validate,
};
use super::{BillFilter, CommitteeFilter, CongressApi, MemberFilter, Page, PageRequest};
use crate::config::Config;
use crate::error::SyncError;
use crate::models::BillType;
use crate::sync::http_client::RateLimitedHttpClient;
use crate::sync::rate_limiter::TokenBucket;
use crate::sync::retry::RetryManager;

type Query = Vec<(&'static str, String)>;

/// Client for the congress.gov v3 API
#[derive(Debug, Clone)]
pub struct CongressClient {
    http: RateLimitedHttpClient,
    retry: RetryManager,
    base_url: String,
    page_size: u32,
}

fn format_date_time(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

impl CongressClient {
    /// Create a client from its collaborators
    pub fn new(
        http: RateLimitedHttpClient,
        retry: RetryManager,
        base_url: impl Into<String>,
        page_size: u32,
    ) -> Self {
        Self {
            http,
            retry,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size: page_size.max(1),
        }
    }

    /// Create a client with its own token bucket from configuration
    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        let limiter = TokenBucket::from_config(&config.rate_limit);
        Self::with_limiter(config, limiter)
    }

    /// Create a client that shares `limiter` with other callers of the same host
    pub fn with_limiter(config: &Config, limiter: TokenBucket) -> Result<Self, SyncError> {
        let http = RateLimitedHttpClient::new(&config.upstream, &config.rate_limit, limiter)?;
        Ok(Self::new(
            http,
            RetryManager::new(&config.retry),
            config.upstream.base_url.clone(),
            config.upstream.page_size,
        ))
    }

    /// Page size used by the `list_all_*` streams
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    async fn fetch(&self, path: &str, mut query: Query) -> Result<Bytes, SyncError> {
        let url = format!("{}{}", self.base_url, path);
        query.push(("format", "json".to_string()));

        self.retry
            .execute(|| self.http.get(&url, &query))
            .await
            .map_err(SyncError::from)
    }

    async fn fetch_page<T>(
        &self,
        path: &str,
        mut query: Query,
        page: PageRequest,
        key: &str,
    ) -> Result<Page<T>, SyncError>
    where
        T: DeserializeOwned + Validate,
    {
        query.push(("offset", page.offset.to_string()));
        query.push(("limit", page.limit.to_string()));

        let body = self.fetch(path, query).await?;
        let parsed = parse_list::<T>(&body, key)?;

        for rejected in &parsed.rejected {
            warn!(
                endpoint = path,
                offset = page.offset,
                index = rejected.index,
                reason = %rejected.reason,
                "Dropped invalid record"
            );
        }

        let next_offset = parsed
            .pagination
            .as_ref()
            .and_then(|p| p.next.as_ref())
            .map(|_| page.next().offset);

        debug!(
            endpoint = path,
            offset = page.offset,
            items = parsed.items.len(),
            has_next = next_offset.is_some(),
            "Fetched page"
        );

        Ok(Page {
            items: parsed.items,
            next_offset,
            total_count: parsed.pagination.and_then(|p| p.count),
            rejected: parsed.rejected,
        })
    }

    fn bill_path(congress: u32, bill_type: BillType, number: u32) -> String {
        format!("/bill/{}/{}/{}", congress, bill_type.code(), number)
    }

    /// Every bill matching `filter`, fetched lazily page by page
    pub fn list_all_bills(
        &self,
        filter: BillFilter,
    ) -> impl Stream<Item = Result<RawBill, SyncError>> + '_ {
        paginate(self.page_size, move |page| {
            let filter = filter.clone();
            async move { self.list_bills(&filter, page).await }
        })
    }

    /// Every member matching `filter`, fetched lazily page by page
    pub fn list_all_members(
        &self,
        filter: MemberFilter,
    ) -> impl Stream<Item = Result<RawMember, SyncError>> + '_ {
        paginate(self.page_size, move |page| {
            let filter = filter.clone();
            async move { self.list_members(&filter, page).await }
        })
    }

    /// Every committee matching `filter`, fetched lazily page by page
    pub fn list_all_committees(
        &self,
        filter: CommitteeFilter,
    ) -> impl Stream<Item = Result<RawCommittee, SyncError>> + '_ {
        paginate(self.page_size, move |page| {
            let filter = filter.clone();
            async move { self.list_committees(&filter, page).await }
        })
    }
}

/// Flatten successive pages into a stream of items
///
/// A 404 ends the stream cleanly; any other error is yielded once and ends it.
fn paginate<'a, T, F, Fut>(
    limit: u32,
    fetch: F,
) -> impl Stream<Item = Result<T, SyncError>> + 'a
where
    T: 'a,
    F: Fn(PageRequest) -> Fut + 'a,
    Fut: Future<Output = Result<Page<T>, SyncError>> + 'a,
{
    stream::try_unfold(Some(PageRequest::first(limit)), move |cursor| {
        let pending = cursor.map(|page| (page, fetch(page)));
        async move {
            let Some((page, request)) = pending else {
                return Ok(None);
            };
            match request.await {
                Ok(result) => {
                    let next = result
                        .next_offset
                        .map(|offset| PageRequest { offset, limit });
                    Ok(Some((result.items, next)))
                }
                Err(err) if err.is_not_found() => {
                    debug!(offset = page.offset, "End of data (404)");
                    Ok(None)
                }
                Err(err) => Err(err),
            }
        }
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, SyncError>)))
    .try_flatten()
}

#[async_trait]
impl CongressApi for CongressClient {
    async fn list_bills(
        &self,
        filter: &BillFilter,
        page: PageRequest,
    ) -> Result<Page<RawBill>, SyncError> {
        let path = match (filter.congress, filter.bill_type) {
            (Some(congress), Some(bill_type)) => format!("/bill/{}/{}", congress, bill_type.code()),
            (Some(congress), None) => format!("/bill/{}", congress),
            (None, _) => "/bill".to_string(),
        };

        let mut query: Query = vec![("sort", "updateDate asc".to_string())];
        if let Some(from) = &filter.from_date_time {
            query.push(("fromDateTime", format_date_time(from)));
        }
        if let Some(to) = &filter.to_date_time {
            query.push(("toDateTime", format_date_time(to)));
        }

        self.fetch_page(&path, query, page, "bills").await
    }

    async fn list_members(
        &self,
        filter: &MemberFilter,
        page: PageRequest,
    ) -> Result<Page<RawMember>, SyncError> {
        let path = match filter.congress {
            Some(congress) => format!("/member/congress/{}", congress),
            None => "/member".to_string(),
        };

        let mut query: Query = Vec::new();
        if let Some(current) = filter.current_member {
            query.push(("currentMember", current.to_string()));
        }
        if let Some(from) = &filter.from_date_time {
            query.push(("fromDateTime", format_date_time(from)));
        }

        self.fetch_page(&path, query, page, "members").await
    }

    async fn list_committees(
        &self,
        filter: &CommitteeFilter,
        page: PageRequest,
    ) -> Result<Page<RawCommittee>, SyncError> {
        let path = match (filter.congress, filter.chamber) {
            (Some(congress), Some(chamber)) => format!("/committee/{}/{}", congress, chamber),
            (Some(congress), None) => format!("/committee/{}", congress),
            (None, Some(chamber)) => format!("/committee/{}", chamber),
            (None, None) => "/committee".to_string(),
        };

        self.fetch_page(&path, Vec::new(), page, "committees").await
    }

    async fn get_bill(
        &self,
        congress: u32,
        bill_type: BillType,
        number: u32,
    ) -> Result<RawBillDetail, SyncError> {
        let path = Self::bill_path(congress, bill_type, number);
        let body = self.fetch(&path, Vec::new()).await?;
        parse_object(&body, "bill")
    }

    async fn get_bill_committees(
        &self,
        congress: u32,
        bill_type: BillType,
        number: u32,
    ) -> Result<Vec<RawCommitteeRef>, SyncError> {
        let path = format!("{}/committees", Self::bill_path(congress, bill_type, number));
        let page: Page<RawCommitteeRef> = self
            .fetch_page(&path, Vec::new(), PageRequest::first(self.page_size), "committees")
            .await?;
        Ok(page.items)
    }

    async fn get_bill_actions(
        &self,
        congress: u32,
        bill_type: BillType,
        number: u32,
    ) -> Result<Vec<RawAction>, SyncError> {
        let path = format!("{}/actions", Self::bill_path(congress, bill_type, number));
        let page: Page<RawAction> = self
            .fetch_page(&path, Vec::new(), PageRequest::first(self.page_size), "actions")
            .await?;
        Ok(page.items)
    }

    async fn get_member(&self, bioguide_id: &str) -> Result<RawMemberDetail, SyncError> {
        let path = format!("/member/{}", bioguide_id.trim());
        let body = self.fetch(&path, Vec::new()).await?;
        parse_object(&body, "member")
    }
}
