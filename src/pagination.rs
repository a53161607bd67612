// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Paginated fetching of inventory and directory endpoints.
//!
//! Pages of one endpoint are requested strictly in sequence: page N+1 is only
//! requested once page N has told us where to continue. Every request goes
//! through [`retry_with_backoff`], so the fetcher itself never sleeps.
//!
//! Three continuation schemes are supported:
//!
//! * [`PageScheme::PageNumber`]: `?page=N&size=S`, bounded by
//!   `meta.page.totalPages`.
//! * [`PageScheme::StartIndex`]: `?startIndex=N&count=S`, advancing by the
//!   number of records returned and bounded by `totalResults`.
//! * [`PageScheme::Cursor`]: an opaque token echoed back by the server.
//!
//! Any page that comes back empty ends the walk.

use serde_json::Value;
use tracing::{debug, info};

use crate::{
    error::Error,
    model::lookup,
    retry::{RetryConfig, retry_with_backoff},
    transport::{ApiRequest, Transport},
};

/// How an endpoint encodes its continuation marker.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub enum PageScheme
{
    /// Zero- or one-based page numbers with a total page count.
    PageNumber {
        /// Index of the first page.
        first: u64,
    },
    /// SCIM-style start index with a total result count.
    StartIndex {
        /// Index of the first record.
        first: u64,
    },
    /// Opaque cursor tokens.
    Cursor {
        /// Query parameter carrying the cursor.
        param:          String,
        /// Dotted path of the next cursor in the response.
        next_field:     String,
        /// Dotted path of an optional `hasMore` flag.
        has_more_field: Option<String,>,
    },
}

/// Paged endpoint descriptor.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct Endpoint
{
    /// Short name used in logs.
    pub name:          String,
    pub path:          String,
    /// Dotted path of the record array in each page.
    pub records_field: String,
    pub scheme:        PageScheme,
    pub page_size:     u32,
}

impl Endpoint
{
    /// Vendor inventory listing.
    pub fn vendors(api_version: &str, page_size: u32,) -> Self
    {
        Self {
            name:          "vendors".to_owned(),
            path:          format!("/inventory/{api_version}/inventories/vendors"),
            records_field: "data".to_owned(),
            scheme:        PageScheme::PageNumber {
                first: 0,
            },
            page_size,
        }
    }

    /// SCIM user directory listing.
    pub fn users(api_version: &str, page_size: u32,) -> Self
    {
        Self {
            name:          "users".to_owned(),
            path:          format!("/scim/{api_version}/Users"),
            records_field: "Resources".to_owned(),
            scheme:        PageScheme::StartIndex {
                first: 1,
            },
            page_size,
        }
    }

    fn start(&self,) -> Position
    {
        match &self.scheme {
            PageScheme::PageNumber {
                first,
            }
            | PageScheme::StartIndex {
                first,
            } => Position::Index(*first,),
            PageScheme::Cursor {
                ..
            } => Position::Cursor(None,),
        }
    }

    fn request(&self, position: &Position,) -> ApiRequest
    {
        let request = ApiRequest::new(self.path.as_str(),);
        match (&self.scheme, position,) {
            (PageScheme::PageNumber { .. }, Position::Index(index,),) => {
                request.query("page", index,).query("size", self.page_size,)
            }
            (PageScheme::StartIndex { .. }, Position::Index(index,),) => {
                request.query("startIndex", index,).query("count", self.page_size,)
            }
            (PageScheme::Cursor { param, .. }, Position::Cursor(Some(cursor,),),) => {
                request.query("size", self.page_size,).query(param.as_str(), cursor,)
            }
            _ => request.query("size", self.page_size,),
        }
    }

    /// Splits a response body into records and the next position.
    fn parse_page(&self, body: &Value, position: &Position,) -> Result<Page, Error,>
    {
        let records = match lookup(body, &self.records_field,) {
            Some(Value::Array(items,),) => items.clone(),
            Some(Value::Null,) => Vec::new(),
            None if body.is_null() => Vec::new(),
            Some(other,) => {
                return Err(Error::decode(
                    self.path.as_str(),
                    format!("'{}' is not an array: {other}", self.records_field),
                ),);
            }
            None => {
                return Err(Error::decode(
                    self.path.as_str(),
                    format!("page without '{}'", self.records_field),
                ),);
            }
        };

        if records.is_empty() {
            return Ok(Page {
                records,
                next: None,
            },);
        }

        let fetched = records.len() as u64;
        let next = match (&self.scheme, position,) {
            (
                PageScheme::PageNumber {
                    first,
                },
                Position::Index(index,),
            ) => {
                let next = index + 1;
                let more = match count_field(self, body, &["meta.page.totalPages", "page.totalPages",],)? {
                    Some(total_pages,) => next - first < total_pages,
                    None => fetched >= u64::from(self.page_size,),
                };
                more.then_some(Position::Index(next,),)
            }
            (
                PageScheme::StartIndex {
                    first,
                },
                Position::Index(index,),
            ) => {
                let next = index + fetched;
                let more = match count_field(self, body, &["totalResults"],)? {
                    Some(total,) => next - first < total,
                    None => fetched >= u64::from(self.page_size,),
                };
                more.then_some(Position::Index(next,),)
            }
            (
                PageScheme::Cursor {
                    next_field,
                    has_more_field,
                    ..
                },
                Position::Cursor(current,),
            ) => {
                let has_more = match has_more_field.as_deref().and_then(|field| lookup(body, field,),) {
                    None | Some(Value::Null,) => true,
                    Some(Value::Bool(flag,),) => *flag,
                    Some(other,) => {
                        return Err(Error::configuration(format!(
                            "{}: malformed hasMore flag {other}",
                            self.path
                        ),),);
                    }
                };
                match lookup(body, next_field,) {
                    _ if !has_more => None,
                    None | Some(Value::Null,) => None,
                    Some(Value::String(cursor,),) if cursor.is_empty() => None,
                    Some(Value::String(cursor,),) => {
                        if current.as_deref() == Some(cursor.as_str(),) {
                            return Err(Error::configuration(format!(
                                "{}: continuation token '{cursor}' did not advance",
                                self.path
                            ),),);
                        }
                        Some(Position::Cursor(Some(cursor.clone(),),),)
                    }
                    Some(other,) => {
                        return Err(Error::configuration(format!(
                            "{}: malformed continuation token {other}",
                            self.path
                        ),),);
                    }
                }
            }
            _ => None,
        };

        Ok(Page {
            records,
            next,
        },)
    }
}

/// Reads the first present non-negative integer among `paths`.
fn count_field(endpoint: &Endpoint, body: &Value, paths: &[&str],) -> Result<Option<u64,>, Error,>
{
    for path in paths {
        match lookup(body, path,) {
            None | Some(Value::Null,) => continue,
            Some(value,) => {
                return value.as_u64().map(Some,).ok_or_else(|| {
                    Error::configuration(format!(
                        "{}: malformed page count '{path}' = {value}",
                        endpoint.path
                    ),)
                },);
            }
        }
    }
    Ok(None,)
}

/// Continuation marker for the next request.
#[derive(Debug, Clone, PartialEq, Eq,)]
enum Position
{
    Index(u64,),
    Cursor(Option<String,>,),
}

/// One batch of raw records and where to continue.
#[derive(Debug,)]
struct Page
{
    records: Vec<Value,>,
    next:    Option<Position,>,
}

/// Walks paged endpoints through the retry policy.
#[derive(Clone, Copy,)]
pub struct PageFetcher<'a,>
{
    transport: &'a dyn Transport,
    retry:     &'a RetryConfig,
}

impl<'a,> PageFetcher<'a,>
{
    pub fn new(transport: &'a dyn Transport, retry: &'a RetryConfig,) -> Self
    {
        Self {
            transport,
            retry,
        }
    }

    /// Fetches every page of `endpoint` and concatenates the records in
    /// fetch order.
    ///
    /// # Errors
    ///
    /// * [`Error::Configuration`] for a zero page size or a malformed
    ///   continuation marker.
    /// * [`Error::Decode`] when a page lacks its record array.
    /// * Any error surfaced by the retry policy.
    pub async fn fetch_all(&self, endpoint: &Endpoint,) -> Result<Vec<Value,>, Error,>
    {
        if endpoint.page_size == 0 {
            return Err(Error::configuration(format!(
                "page size for {} must be positive",
                endpoint.name
            ),),);
        }

        let mut position = endpoint.start();
        let mut records = Vec::new();
        let mut pages = 0u32;

        loop {
            let request = endpoint.request(&position,);
            let description = request.describe();
            let response = retry_with_backoff(self.retry, &description, || {
                self.transport.get(&request,)
            },)
            .await?;

            let page = endpoint.parse_page(&response.body, &position,)?;
            pages += 1;
            debug!(
                endpoint = %description,
                fetched = page.records.len(),
                total = records.len() + page.records.len(),
                "fetched page"
            );
            records.extend(page.records,);

            match page.next {
                Some(next,) => position = next,
                None => break,
            }
        }

        info!(endpoint = %endpoint.name, pages, records = records.len(), "pagination complete");
        Ok(records,)
    }
}

#[cfg(test)]
mod tests
{
    use proptest::prelude::*;
    use serde_json::{Value, json};

    use super::*;
    use crate::transport::testing::{Reply, ScriptedTransport};

    fn retry() -> RetryConfig
    {
        RetryConfig {
            max_attempts:     2,
            initial_delay_ms: 0,
            backoff_factor:   1.0,
            max_delay_ms:     0,
        }
    }

    fn inventory_page(ids: &[u64], total_pages: u64,) -> Value
    {
        let data: Vec<Value,> = ids.iter().map(|id| json!({"id": id}),).collect();
        json!({"data": data, "meta": {"page": {"totalPages": total_pages}}})
    }

    fn ids(records: &[Value],) -> Vec<u64,>
    {
        records.iter().filter_map(|record| record["id"].as_u64(),).collect()
    }

    fn cursor_endpoint() -> Endpoint
    {
        Endpoint {
            name:          "events".to_owned(),
            path:          "/events".to_owned(),
            records_field: "items".to_owned(),
            scheme:        PageScheme::Cursor {
                param:          "cursor".to_owned(),
                next_field:     "next".to_owned(),
                has_more_field: Some("hasMore".to_owned(),),
            },
            page_size:     2,
        }
    }

    #[tokio::test]
    async fn page_number_walk_stops_at_total_pages()
    {
        let transport = ScriptedTransport::new()
            .json("/inventory/v2/inventories/vendors?page=0&size=2", inventory_page(&[1, 2,], 2,),)
            .json("/inventory/v2/inventories/vendors?page=1&size=2", inventory_page(&[3], 2,),);
        let retry = retry();
        let records = PageFetcher::new(&transport, &retry,)
            .fetch_all(&Endpoint::vendors("v2", 2,),)
            .await
            .expect("fetch should succeed",);

        assert_eq!(ids(&records,), vec![1, 2, 3,]);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn empty_page_ends_walk_without_total()
    {
        let transport = ScriptedTransport::new()
            .json("/inventory/v2/inventories/vendors?page=0&size=1", json!({"data": [{"id": 1}]}),)
            .json("/inventory/v2/inventories/vendors?page=1&size=1", json!({"data": [{"id": 2}]}),)
            .json("/inventory/v2/inventories/vendors?page=2&size=1", json!({"data": []}),);
        let retry = retry();
        let records = PageFetcher::new(&transport, &retry,)
            .fetch_all(&Endpoint::vendors("v2", 1,),)
            .await
            .expect("fetch should succeed",);

        assert_eq!(ids(&records,), vec![1, 2,]);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn empty_first_page_is_not_an_error()
    {
        let transport = ScriptedTransport::new()
            .json("/inventory/v2/inventories/vendors?page=0&size=50", json!({"data": []}),);
        let retry = retry();
        let records = PageFetcher::new(&transport, &retry,)
            .fetch_all(&Endpoint::vendors("v2", 50,),)
            .await
            .expect("empty page is fine",);
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn start_index_walk_advances_by_records_returned()
    {
        let transport = ScriptedTransport::new()
            .json(
                "/scim/v2/Users?startIndex=1&count=2",
                json!({"Resources": [{"id": 1}, {"id": 2}], "itemsPerPage": 2, "totalResults": 3}),
            )
            .json(
                "/scim/v2/Users?startIndex=3&count=2",
                json!({"Resources": [{"id": 3}], "itemsPerPage": 1, "totalResults": 3}),
            );
        let retry = retry();
        let records = PageFetcher::new(&transport, &retry,)
            .fetch_all(&Endpoint::users("v2", 2,),)
            .await
            .expect("fetch should succeed",);

        assert_eq!(ids(&records,), vec![1, 2, 3,]);
    }

    #[tokio::test]
    async fn cursor_walk_honours_has_more_flag()
    {
        let transport = ScriptedTransport::new()
            .json("/events?size=2", json!({"items": [{"id": 1}], "next": "c1", "hasMore": true}),)
            .json(
                "/events?size=2&cursor=c1",
                json!({"items": [{"id": 2}], "next": "c2", "hasMore": false}),
            );
        let retry = retry();
        let records = PageFetcher::new(&transport, &retry,)
            .fetch_all(&cursor_endpoint(),)
            .await
            .expect("fetch should succeed",);

        assert_eq!(ids(&records,), vec![1, 2,]);
        assert_eq!(transport.count("/events?size=2&cursor=c2",), 0);
    }

    #[tokio::test]
    async fn repeated_cursor_is_a_configuration_error()
    {
        let transport = ScriptedTransport::new()
            .json("/events?size=2", json!({"items": [{"id": 1}], "next": "same"}),)
            .json("/events?size=2&cursor=same", json!({"items": [{"id": 2}], "next": "same"}),);
        let retry = retry();
        let error = PageFetcher::new(&transport, &retry,)
            .fetch_all(&cursor_endpoint(),)
            .await
            .expect_err("stuck cursor must fail",);
        assert!(matches!(error, Error::Configuration { .. }), "{error:?}");
    }

    #[tokio::test]
    async fn non_string_cursor_is_a_configuration_error()
    {
        let transport = ScriptedTransport::new()
            .json("/events?size=2", json!({"items": [{"id": 1}], "next": {"token": 5}}),);
        let retry = retry();
        let error = PageFetcher::new(&transport, &retry,)
            .fetch_all(&cursor_endpoint(),)
            .await
            .expect_err("object cursor must fail",);
        assert!(matches!(error, Error::Configuration { .. }), "{error:?}");
    }

    #[tokio::test]
    async fn malformed_page_count_is_a_configuration_error()
    {
        let transport = ScriptedTransport::new().json(
            "/inventory/v2/inventories/vendors?page=0&size=2",
            json!({"data": [{"id": 1}], "meta": {"page": {"totalPages": "many"}}}),
        );
        let retry = retry();
        let error = PageFetcher::new(&transport, &retry,)
            .fetch_all(&Endpoint::vendors("v2", 2,),)
            .await
            .expect_err("string page count must fail",);
        assert!(matches!(error, Error::Configuration { .. }), "{error:?}");
    }

    #[tokio::test]
    async fn zero_page_size_fails_before_any_request()
    {
        let transport = ScriptedTransport::new();
        let retry = retry();
        let error = PageFetcher::new(&transport, &retry,)
            .fetch_all(&Endpoint::vendors("v2", 0,),)
            .await
            .expect_err("zero page size must fail",);
        assert!(matches!(error, Error::Configuration { .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn page_without_records_field_is_a_decode_error()
    {
        let transport = ScriptedTransport::new()
            .json("/inventory/v2/inventories/vendors?page=0&size=2", json!({"items": []}),);
        let retry = retry();
        let error = PageFetcher::new(&transport, &retry,)
            .fetch_all(&Endpoint::vendors("v2", 2,),)
            .await
            .expect_err("missing data must fail",);
        assert!(matches!(error, Error::Decode { .. }));
    }

    #[tokio::test]
    async fn transient_page_failures_are_retried()
    {
        let key = "/inventory/v2/inventories/vendors?page=0&size=2";
        let transport = ScriptedTransport::new()
            .on(key, Reply::Timeout,)
            .json(key, inventory_page(&[1], 1,),);
        let retry = retry();
        let records = PageFetcher::new(&transport, &retry,)
            .fetch_all(&Endpoint::vendors("v2", 2,),)
            .await
            .expect("retry should recover",);
        assert_eq!(ids(&records,), vec![1]);
        assert_eq!(transport.count(key,), 2);
    }

    proptest! {
        #[test]
        fn aggregated_records_preserve_page_order(
            sizes in proptest::collection::vec(1usize..5, 0..6)
        ) {
            let page_size = 4u32;
            let mut transport = ScriptedTransport::new();
            let mut next_id = 0u64;
            let mut expected = Vec::new();
            for (page, size) in sizes.iter().enumerate() {
                let page_ids: Vec<u64> = (next_id..next_id + *size as u64).collect();
                next_id += *size as u64;
                expected.extend(page_ids.iter().copied());
                let data: Vec<Value> = page_ids.iter().map(|id| json!({"id": id})).collect();
                transport = transport.json(
                    &format!("/inventory/v2/inventories/vendors?page={page}&size={page_size}"),
                    json!({"data": data, "meta": {"page": {"totalPages": sizes.len() + 1}}})
                );
            }
            transport = transport.json(
                &format!("/inventory/v2/inventories/vendors?page={}&size={page_size}", sizes.len()),
                json!({"data": []})
            );

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .expect("runtime");
            let retry = retry();
            let records = runtime
                .block_on(PageFetcher::new(&transport, &retry).fetch_all(&Endpoint::vendors("v2", page_size)))
                .expect("fetch should succeed");

            prop_assert_eq!(records.len(), sizes.iter().sum::<usize>());
            prop_assert_eq!(ids(&records), expected);
        }
    }
}
