// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! End-to-end fetch, resolve and merge.
//!
//! Vendor fetch failures abort the run. User resolution failures degrade to
//! an empty directory so the report is still produced with blank owner
//! columns. The targeted strategy needs the filtered vendors before it can
//! issue lookups and therefore runs after the vendor fetch; the exhaustive
//! strategy runs concurrently with it.

use tracing::{info, warn};

use crate::{
    config::AppConfig,
    error::Error,
    merge::{LifecycleFilter, MergedTable, merge},
    model::VendorRecord,
    pagination::{Endpoint, PageFetcher},
    transport::{HttpTransport, Transport},
    users::{ExhaustiveResolver, UserDirectory, UserResolver},
};

/// Configured report run.
pub struct Pipeline
{
    transport: Box<dyn Transport,>,
    config:    AppConfig,
    resolver:  UserResolver,
    filter:    LifecycleFilter,
}

impl Pipeline
{
    /// Builds a pipeline over an arbitrary transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the configuration is invalid.
    pub fn new(config: AppConfig, transport: Box<dyn Transport,>,) -> Result<Self, Error,>
    {
        config.validate()?;
        let resolver = UserResolver::from_config(&config,)?;
        let filter = config.lifecycle_filter()?;
        Ok(Self {
            transport,
            config,
            resolver,
            filter,
        },)
    }

    /// Builds a pipeline talking to the configured API over HTTPS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn from_config(config: AppConfig,) -> Result<Self, Error,>
    {
        let transport = HttpTransport::new(&config.api,)?;
        Self::new(config, Box::new(transport,),)
    }

    pub fn config(&self,) -> &AppConfig
    {
        &self.config
    }

    /// Fetches and decodes every vendor.
    ///
    /// Records that cannot be decoded are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Propagates pagination and retry failures.
    pub async fn fetch_vendors(&self,) -> Result<Vec<VendorRecord,>, Error,>
    {
        let endpoint =
            Endpoint::vendors(&self.config.api.api_version, self.config.pagination.vendor_page_size,);
        let raw = PageFetcher::new(self.transport.as_ref(), &self.config.retry,)
            .fetch_all(&endpoint,)
            .await?;

        let default_owner = self.config.default_owner_id.as_deref();
        let vendors: Vec<VendorRecord,> = raw
            .iter()
            .filter_map(|record| match VendorRecord::from_json(record, default_owner,) {
                Ok(vendor,) => Some(vendor,),
                Err(error,) => {
                    warn!(%error, "skipping vendor record");
                    None
                }
            },)
            .collect();

        info!(vendors = vendors.len(), "fetched vendor inventory");
        Ok(vendors,)
    }

    /// Runs the whole pipeline and returns the merged table.
    ///
    /// # Errors
    ///
    /// Returns the vendor fetch error when the inventory cannot be read.
    /// User resolution never fails the run.
    pub async fn run(&self,) -> Result<MergedTable, Error,>
    {
        let (vendors, users,) = match &self.resolver {
            UserResolver::Targeted(resolver,) => {
                let vendors = self.fetch_vendors().await?;
                let accepted = vendors.iter().filter(|vendor| self.filter.accepts(vendor,),);
                let users = degrade(
                    resolver
                        .resolve(self.transport.as_ref(), &self.config.retry, accepted,)
                        .await,
                );
                (vendors, users,)
            }
            UserResolver::Exhaustive(resolver,) => self.fetch_concurrently(resolver,).await?,
        };

        let table = merge(&vendors, &users, &self.filter,);
        info!(
            rows = table.len(),
            vendors = vendors.len(),
            users = users.len(),
            strategy = %self.resolver.strategy(),
            "merged vendor report"
        );
        Ok(table,)
    }

    async fn fetch_concurrently(
        &self,
        resolver: &ExhaustiveResolver,
    ) -> Result<(Vec<VendorRecord,>, UserDirectory,), Error,>
    {
        let users = async {
            Ok::<_, Error,>(degrade(
                resolver.resolve(self.transport.as_ref(), &self.config.retry,).await,
            ),)
        };

        if self.config.fail_fast {
            tokio::try_join!(self.fetch_vendors(), users)
        } else {
            let (vendors, users,) = tokio::join!(self.fetch_vendors(), users);
            Ok((vendors?, users?,),)
        }
    }
}

fn degrade(result: Result<UserDirectory, Error,>,) -> UserDirectory
{
    result.unwrap_or_else(|error| {
        warn!(%error, "user resolution failed, owner columns will be empty");
        UserDirectory::new()
    },)
}
