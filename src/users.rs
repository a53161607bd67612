// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Resolution of business-owner identities.
//!
//! Two strategies produce the same [`UserDirectory`]:
//!
//! * [`TargetedResolver`] looks up only the owners referenced by the vendors
//!   that survived the lifecycle filter, one request per distinct id, with a
//!   bounded number of requests in flight.
//! * [`ExhaustiveResolver`] pages through the whole directory once.
//!
//! The strategy is chosen once from configuration through
//! [`UserResolver::from_config`].

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    str::FromStr,
};

use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    error::Error,
    model::{UserRecord, VendorRecord},
    pagination::{Endpoint, PageFetcher},
    retry::{RetryConfig, retry_with_backoff},
    transport::{ApiRequest, Transport},
};

/// Selects how owner identities are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,)]
#[serde(rename_all = "snake_case")]
pub enum UserStrategy
{
    /// One lookup per referenced owner.
    Targeted,
    /// One paged walk over the full directory.
    Exhaustive,
}

impl UserStrategy
{
    pub fn as_str(self,) -> &'static str
    {
        match self {
            Self::Targeted => "targeted",
            Self::Exhaustive => "exhaustive",
        }
    }
}

impl fmt::Display for UserStrategy
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.write_str(self.as_str(),)
    }
}

impl FromStr for UserStrategy
{
    type Err = Error;

    fn from_str(value: &str,) -> Result<Self, Self::Err,>
    {
        match value.trim().to_ascii_lowercase().as_str() {
            "targeted" => Ok(Self::Targeted,),
            "exhaustive" => Ok(Self::Exhaustive,),
            other => Err(Error::configuration(format!(
                "unknown user strategy '{other}', expected 'targeted' or 'exhaustive'"
            ),),),
        }
    }
}

/// Identifier → user map handed to the merge engine.
///
/// Duplicate identifiers keep the first record inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq,)]
pub struct UserDirectory
{
    users: BTreeMap<String, UserRecord,>,
}

impl UserDirectory
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Builds a directory, keeping the first occurrence of each id.
    pub fn from_records<I,>(records: I,) -> Self
    where
        I: IntoIterator<Item = UserRecord,>,
    {
        let mut directory = Self::new();
        for record in records {
            let id = record.id.clone();
            if !directory.insert(record,) {
                warn!(user_id = %id, "duplicate user id in directory, keeping first occurrence");
            }
        }
        directory
    }

    /// Inserts `record` unless its id is already present.
    ///
    /// Returns `false` when the id was taken.
    pub fn insert(&mut self, record: UserRecord,) -> bool
    {
        if self.users.contains_key(&record.id,) {
            return false;
        }
        self.users.insert(record.id.clone(), record,);
        true
    }

    pub fn get(&self, id: &str,) -> Option<&UserRecord,>
    {
        self.users.get(id,)
    }

    pub fn len(&self,) -> usize
    {
        self.users.len()
    }

    pub fn is_empty(&self,) -> bool
    {
        self.users.is_empty()
    }
}

/// Strategy-selected resolver.
#[derive(Debug, Clone,)]
pub enum UserResolver
{
    Targeted(TargetedResolver,),
    Exhaustive(ExhaustiveResolver,),
}

impl UserResolver
{
    /// Builds the resolver named by `config.users.strategy`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unknown strategy names.
    pub fn from_config(config: &AppConfig,) -> Result<Self, Error,>
    {
        Ok(match config.user_strategy()? {
            UserStrategy::Targeted => Self::Targeted(TargetedResolver {
                api_version:      config.api.api_version.clone(),
                max_in_flight:    config.users.max_in_flight,
                fail_fast:        config.fail_fast,
                default_owner_id: config.default_owner_id.clone(),
            },),
            UserStrategy::Exhaustive => Self::Exhaustive(ExhaustiveResolver {
                endpoint: Endpoint::users(&config.api.api_version, config.pagination.user_page_size,),
            },),
        },)
    }

    pub fn strategy(&self,) -> UserStrategy
    {
        match self {
            Self::Targeted(_,) => UserStrategy::Targeted,
            Self::Exhaustive(_,) => UserStrategy::Exhaustive,
        }
    }
}

/// Resolves only referenced owners.
#[derive(Debug, Clone,)]
pub struct TargetedResolver
{
    pub api_version:      String,
    /// Maximum concurrent lookups.
    pub max_in_flight:    usize,
    /// Abort remaining lookups on the first failure.
    pub fail_fast:        bool,
    /// Placeholder owner that is never looked up.
    pub default_owner_id: Option<String,>,
}

impl TargetedResolver
{
    /// Distinct owner ids in first-seen order, without the placeholder owner.
    pub fn referenced_ids<'v, I,>(&self, vendors: I,) -> Vec<String,>
    where
        I: IntoIterator<Item = &'v VendorRecord,>,
    {
        let mut seen = HashSet::new();
        vendors
            .into_iter()
            .filter_map(|vendor| vendor.owner_id.as_deref(),)
            .filter(|id| self.default_owner_id.as_deref() != Some(*id,),)
            .filter(|id| seen.insert(*id,),)
            .map(str::to_owned,)
            .collect()
    }

    /// Looks up every referenced owner.
    ///
    /// Missing users (`404`) and unusable resources (no `id` or no
    /// `userName`) are left out of the directory with a warning.
    ///
    /// # Errors
    ///
    /// With `fail_fast`, the first other failure cancels the outstanding
    /// lookups and is returned. Without it, failed ids are logged and left
    /// out.
    pub async fn resolve<'v, I,>(
        &self,
        transport: &dyn Transport,
        retry: &RetryConfig,
        vendors: I,
    ) -> Result<UserDirectory, Error,>
    where
        I: IntoIterator<Item = &'v VendorRecord,>,
    {
        let ids = self.referenced_ids(vendors,);
        info!(owners = ids.len(), max_in_flight = self.max_in_flight, "resolving referenced owners");

        let mut lookups = stream::iter(ids.iter().cloned(),)
            .map(|id| async move {
                let result = self.lookup(transport, retry, &id,).await;
                (id, result,)
            },)
            .buffer_unordered(self.max_in_flight.max(1,),);

        let mut resolved = HashMap::with_capacity(ids.len(),);
        while let Some((id, result,),) = lookups.next().await {
            match result {
                Ok(Some(user,),) => {
                    resolved.insert(id, user,);
                }
                Ok(None,) => {}
                Err(error,) if self.fail_fast => {
                    warn!(user_id = %id, %error, "owner lookup failed, cancelling remaining lookups");
                    return Err(error,);
                }
                Err(error,) => {
                    warn!(user_id = %id, %error, "owner lookup failed, leaving owner unresolved");
                }
            }
        }

        Ok(UserDirectory::from_records(ids.iter().filter_map(|id| resolved.remove(id,),),),)
    }

    async fn lookup(
        &self,
        transport: &dyn Transport,
        retry: &RetryConfig,
        id: &str,
    ) -> Result<Option<UserRecord,>, Error,>
    {
        let request = ApiRequest::new(format!("/scim/{}/Users/{id}", self.api_version),);
        let endpoint = request.describe();
        let response =
            match retry_with_backoff(retry, &endpoint, || transport.get(&request,),).await {
                Ok(response,) => response,
                Err(Error::Client {
                    code: 404, ..
                },) => {
                    warn!(user_id = id, "user not found");
                    return Ok(None,);
                }
                Err(error,) => return Err(error,),
            };

        let user = match UserRecord::from_json(&response.body,) {
            Ok(user,) => user,
            Err(error,) => {
                warn!(user_id = id, %error, "user payload could not be decoded");
                return Ok(None,);
            }
        };
        if user.user_name.is_none() {
            warn!(user_id = id, "userName not found for user");
            return Ok(None,);
        }
        Ok(Some(user,),)
    }
}

/// Indexes the entire user directory.
#[derive(Debug, Clone,)]
pub struct ExhaustiveResolver
{
    pub endpoint: Endpoint,
}

impl ExhaustiveResolver
{
    /// Pages through the directory and indexes every decodable user.
    ///
    /// # Errors
    ///
    /// Propagates pagination and retry failures.
    pub async fn resolve(
        &self,
        transport: &dyn Transport,
        retry: &RetryConfig,
    ) -> Result<UserDirectory, Error,>
    {
        let raw = PageFetcher::new(transport, retry,).fetch_all(&self.endpoint,).await?;
        let users = raw.iter().filter_map(|resource| match UserRecord::from_json(resource,) {
            Ok(user,) => Some(user,),
            Err(error,) => {
                warn!(%error, "skipping directory entry");
                None
            }
        },);
        let directory = UserDirectory::from_records(users,);
        info!(users = directory.len(), "indexed user directory");
        Ok(directory,)
    }
}
