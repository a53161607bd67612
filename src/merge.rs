// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Joins vendors with resolved owners into report rows.
//!
//! The merge is a pure function of its inputs: rows follow vendor fetch
//! order, vendors rejected by the [`LifecycleFilter`] produce no row, and a
//! vendor id seen twice keeps its first row. Owners missing from the
//! [`UserDirectory`] leave the owner columns empty.

use std::{collections::HashSet, fmt, str::FromStr};

use serde::Serialize;
use tracing::{debug, warn};

use crate::{error::Error, model::VendorRecord, users::UserDirectory};

/// Column headers in output order.
pub const COLUMNS: [&str; 12] = [
    "ID",
    "Vendor Name",
    "Business Owner",
    "Owner Name",
    "Organization",
    "Description",
    "Vendor Category",
    "Website",
    "Jira Ticket",
    "Created Date",
    "Last Updated",
    "Lifecycle Stage",
];

/// Named lifecycle filters used by the recurring reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize,)]
#[serde(rename_all = "snake_case")]
pub enum FilterPreset
{
    /// Active vendors in the `Live` stage.
    Approved,
    /// Vendors under evaluation or review.
    InProgress,
    /// Rejected or terminated vendors.
    RejectedTerminated,
}

impl FilterPreset
{
    pub fn as_str(self,) -> &'static str
    {
        match self {
            Self::Approved => "approved",
            Self::InProgress => "in_progress",
            Self::RejectedTerminated => "rejected_terminated",
        }
    }

    /// Human-readable report title.
    pub fn title(self,) -> &'static str
    {
        match self {
            Self::Approved => "Approved Vendors",
            Self::InProgress => "Vendor Assessments in Progress",
            Self::RejectedTerminated => "Rejected or Terminated Vendors",
        }
    }

    /// Title-cased prefix used in report filenames.
    pub fn file_prefix(self,) -> &'static str
    {
        match self {
            Self::Approved => "Approved",
            Self::InProgress => "In_Progress",
            Self::RejectedTerminated => "Rejected_Terminated",
        }
    }

    pub fn filter(self,) -> LifecycleFilter
    {
        match self {
            Self::Approved => LifecycleFilter::new(vec!["Live".into()], vec!["active".into()],),
            Self::InProgress => {
                LifecycleFilter::new(vec!["Under Evaluation".into(), "In Review".into(),], Vec::new(),)
            }
            Self::RejectedTerminated => {
                LifecycleFilter::new(vec!["Rejected".into(), "Terminated".into(),], Vec::new(),)
            }
        }
    }
}

impl fmt::Display for FilterPreset
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.write_str(self.as_str(),)
    }
}

impl FromStr for FilterPreset
{
    type Err = Error;

    fn from_str(value: &str,) -> Result<Self, Self::Err,>
    {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-',], "_",);
        match normalized.as_str() {
            "approved" => Ok(Self::Approved,),
            "in_progress" => Ok(Self::InProgress,),
            "rejected_terminated" => Ok(Self::RejectedTerminated,),
            _ => Err(Error::configuration(format!(
                "unknown filter preset '{}', expected approved, in_progress or rejected_terminated",
                value.trim()
            ),),),
        }
    }
}

/// Stage/status predicate applied before merging.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct LifecycleFilter
{
    stages:   Vec<String,>,
    /// Empty means any status.
    statuses: Vec<String,>,
}

impl LifecycleFilter
{
    pub fn new(stages: Vec<String,>, statuses: Vec<String,>,) -> Self
    {
        Self {
            stages,
            statuses,
        }
    }

    pub fn accepts(&self, vendor: &VendorRecord,) -> bool
    {
        self.stages.iter().any(|stage| *stage == vendor.stage,)
            && (self.statuses.is_empty() || self.statuses.iter().any(|s| *s == vendor.status,))
    }
}

/// Report-ready row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct MergedRow
{
    pub vendor_id:          String,
    /// Sequence number, or the vendor id when none is assigned.
    pub display_id:         String,
    pub name:               String,
    /// Owner login; empty when unresolved.
    pub business_owner:     String,
    pub owner_display_name: String,
    pub organization:       String,
    pub description:        String,
    pub category:           String,
    pub website:            String,
    pub ticket:             String,
    pub created_date:       String,
    pub updated_date:       String,
    pub stage:              String,
}

impl MergedRow
{
    /// Cell values aligned with [`COLUMNS`].
    pub fn cells(&self,) -> [&str; 12]
    {
        [
            &self.display_id,
            &self.name,
            &self.business_owner,
            &self.owner_display_name,
            &self.organization,
            &self.description,
            &self.category,
            &self.website,
            &self.ticket,
            &self.created_date,
            &self.updated_date,
            &self.stage,
        ]
    }
}

/// Ordered rows plus their column headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct MergedTable
{
    pub columns: Vec<&'static str,>,
    pub rows:    Vec<MergedRow,>,
}

impl MergedTable
{
    pub fn len(&self,) -> usize
    {
        self.rows.len()
    }

    pub fn is_empty(&self,) -> bool
    {
        self.rows.is_empty()
    }
}

/// Filters, flattens and joins vendors with their owners.
///
/// # Examples
///
/// ```
/// use vendor_report::{FilterPreset, UserDirectory, VendorRecord, merge};
///
/// let raw = serde_json::json!({
///     "id": "v1",
///     "name": "Acme",
///     "workflowStage": {"stage": {"value": "Live"}},
///     "status": {"key": "active"}
/// });
/// let vendor = VendorRecord::from_json(&raw, None,).expect("valid vendor",);
/// let table = merge(&[vendor], &UserDirectory::new(), &FilterPreset::Approved.filter(),);
/// assert_eq!(table.rows[0].name, "Acme");
/// assert!(table.rows[0].business_owner.is_empty());
/// ```
pub fn merge(
    vendors: &[VendorRecord],
    users: &UserDirectory,
    filter: &LifecycleFilter,
) -> MergedTable
{
    let mut seen = HashSet::with_capacity(vendors.len(),);
    let mut rows = Vec::new();

    for vendor in vendors {
        if !filter.accepts(vendor,) {
            continue;
        }
        if !seen.insert(vendor.id.as_str(),) {
            warn!(vendor_id = %vendor.id, "duplicate vendor id, keeping first occurrence");
            continue;
        }

        let owner = vendor.owner_id.as_deref().and_then(|id| users.get(id,),);
        if owner.is_none() {
            debug!(vendor_id = %vendor.id, owner_id = ?vendor.owner_id, "owner unresolved");
        }

        rows.push(MergedRow {
            vendor_id:          vendor.id.clone(),
            display_id:         vendor.number.clone().unwrap_or_else(|| vendor.id.clone(),),
            name:               vendor.name.clone(),
            business_owner:     owner.and_then(|u| u.user_name.clone(),).unwrap_or_default(),
            owner_display_name: owner.and_then(|u| u.display_name.clone(),).unwrap_or_default(),
            organization:       vendor.organization.clone(),
            description:        vendor.description.clone(),
            category:           vendor.category.clone(),
            website:            vendor.website.clone(),
            ticket:             vendor.ticket.clone(),
            created_date:       format_date(vendor.created_date,),
            updated_date:       format_date(vendor.updated_date,),
            stage:              vendor.stage.clone(),
        },);
    }

    MergedTable {
        columns: COLUMNS.to_vec(),
        rows,
    }
}

fn format_date(date: Option<chrono::NaiveDate,>,) -> String
{
    date.map(|d| d.format("%Y-%m-%d",).to_string(),).unwrap_or_default()
}
