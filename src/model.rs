// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Typed vendor and user records decoded from raw API payloads.
//!
//! Inventory records nest most attributes inside objects and single-element
//! arrays (`owner[0].id`, `customField1000[0].value`). Decoding first flattens
//! the record into dotted keys, then reads each attribute through
//! [`text_of`], which unwraps those single-element shapes. Missing optional
//! attributes never fail decoding; they fall back to the same placeholder
//! values the reports have always shown.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

const CATEGORY_NOT_SET: &str = "vendor_category_not_set";
const TICKET_NOT_SET: &str = "Vendor ID Not Set";

/// Vendor inventory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct VendorRecord
{
    /// Unique inventory identifier.
    pub id:           String,
    /// Human-facing sequence number, when assigned.
    pub number:       Option<String,>,
    pub name:         String,
    /// Business owner user id.
    pub owner_id:     Option<String,>,
    pub organization: String,
    pub description:  String,
    pub category:     String,
    pub website:      String,
    /// Ticket reference stored in the `vendorId` attribute.
    pub ticket:       String,
    /// Workflow stage, e.g. `Live`.
    pub stage:        String,
    /// Status key, e.g. `active`.
    pub status:       String,
    pub created_date: Option<NaiveDate,>,
    pub updated_date: Option<NaiveDate,>,
}

impl VendorRecord
{
    /// Decodes one inventory record.
    ///
    /// `default_owner` is substituted when the record has no owner.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when the record is not an object or lacks an
    /// `id`.
    pub fn from_json(raw: &Value, default_owner: Option<&str,>,) -> Result<Self, Error,>
    {
        let flat = flatten(raw,);
        if !raw.is_object() {
            return Err(Error::decode("vendor", format!("expected an object, got {raw}"),),);
        }
        let id = flat
            .get("id",)
            .and_then(text_of,)
            .ok_or_else(|| Error::decode("vendor", "record without id",),)?;

        let owner_id = flat
            .get("owner",)
            .and_then(|owner| first_item(owner,).and_then(|item| item.get("id",),).and_then(text_of,),)
            .or_else(|| flat.get("owner.id",).and_then(text_of,),)
            .or_else(|| default_owner.map(str::to_owned,),);

        Ok(Self {
            id,
            number:       flat.get("number",).and_then(text_of,),
            name:         field(&flat, "name",).unwrap_or_default(),
            owner_id,
            organization: field(&flat, "organization.value",).unwrap_or_default(),
            description:  field(&flat, "description",).unwrap_or_default(),
            category:     field(&flat, "customField1000",)
                .unwrap_or_else(|| CATEGORY_NOT_SET.to_owned(),),
            website:      field(&flat, "customField1001",).unwrap_or_default(),
            ticket:       field(&flat, "vendorId",).unwrap_or_else(|| TICKET_NOT_SET.to_owned(),),
            stage:        field(&flat, "workflowStage.stage.value",).unwrap_or_default(),
            status:       field(&flat, "status.key",).unwrap_or_default(),
            created_date: flat.get("createdDate",).and_then(date_of,),
            updated_date: flat.get("updatedDate",).and_then(date_of,),
        },)
    }
}

/// Directory user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct UserRecord
{
    pub id:           String,
    /// Login name, lower-cased; usually the user's email address.
    pub user_name:    Option<String,>,
    pub display_name: Option<String,>,
    /// Primary email, or the first one listed.
    pub email:        Option<String,>,
    pub active:       Option<bool,>,
}

impl UserRecord
{
    /// Decodes a SCIM user resource.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when the resource lacks an `id`.
    pub fn from_json(raw: &Value,) -> Result<Self, Error,>
    {
        let id = raw
            .get("id",)
            .and_then(text_of,)
            .ok_or_else(|| Error::decode("user", "resource without id",),)?;

        let display_name = raw.get("displayName",).and_then(text_of,).or_else(|| {
            raw.get("name",).and_then(|name| name.get("formatted",),).and_then(text_of,)
        },);

        let email = raw.get("emails",).and_then(Value::as_array,).and_then(|emails| {
            emails
                .iter()
                .find(|email| email.get("primary",).and_then(Value::as_bool,) == Some(true,),)
                .or_else(|| emails.first(),)
                .and_then(|email| email.get("value",),)
                .and_then(text_of,)
        },);

        Ok(Self {
            id,
            user_name: raw.get("userName",).and_then(text_of,).map(|name| name.to_lowercase(),),
            display_name,
            email,
            active:    raw.get("active",).and_then(Value::as_bool,),
        },)
    }
}

/// Flattens nested objects into dotted keys.
///
/// Arrays and scalars are kept as leaf values, so `{"a": {"b": [1]}}`
/// becomes `{"a.b": [1]}`. Non-object inputs produce an empty map.
pub fn flatten(value: &Value,) -> BTreeMap<String, Value,>
{
    let mut flat = BTreeMap::new();
    if let Value::Object(map,) = value {
        flatten_into(&mut flat, None, map,);
    }
    flat
}

fn flatten_into(flat: &mut BTreeMap<String, Value,>, prefix: Option<&str,>, map: &Map<String, Value,>,)
{
    for (key, value,) in map {
        let path = match prefix {
            Some(prefix,) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(inner,) if !inner.is_empty() => flatten_into(flat, Some(&path,), inner,),
            other => {
                flat.insert(path, other.clone(),);
            }
        }
    }
}

/// Reads a dotted path from a nested value without flattening it.
pub fn lookup<'a,>(value: &'a Value, path: &str,) -> Option<&'a Value,>
{
    path.split('.',).try_fold(value, |current, segment| current.get(segment,),)
}

fn field(flat: &BTreeMap<String, Value,>, key: &str,) -> Option<String,>
{
    flat.get(key,).and_then(text_of,).filter(|text| !text.is_empty(),)
}

fn first_item(value: &Value,) -> Option<&Value,>
{
    match value {
        Value::Array(items,) => items.first(),
        Value::Object(_,) => Some(value,),
        _ => None,
    }
}

/// Renders a scalar, a `{value: ..}` object, or the first element of an
/// array of either, as text.
pub fn text_of(value: &Value,) -> Option<String,>
{
    match value {
        Value::String(text,) => Some(text.clone(),),
        Value::Number(number,) => Some(number.to_string(),),
        Value::Bool(flag,) => Some(flag.to_string(),),
        Value::Array(items,) => items.first().and_then(text_of,),
        Value::Object(map,) => map.get("value",).and_then(text_of,),
        Value::Null => None,
    }
}

/// Parses RFC 3339 timestamps or plain `YYYY-MM-DD` prefixes into a date.
fn date_of(value: &Value,) -> Option<NaiveDate,>
{
    let text = value.as_str()?.trim();
    if let Ok(timestamp,) = DateTime::parse_from_rfc3339(text,) {
        return Some(timestamp.date_naive(),);
    }
    text.get(..10).and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d",).ok(),)
}

#[cfg(test)]
mod tests
{
    use serde_json::json;

    use super::*;

    fn inventory_vendor() -> Value
    {
        json!({
            "id": "a1b2",
            "number": 17,
            "name": "Acme Analytics",
            "owner": [{"id": "u1", "name": "ignored"}],
            "organization": {"id": "o1", "value": "Engineering"},
            "description": "Telemetry pipeline",
            "customField1000": [{"id": "c1", "value": "SaaS"}],
            "customField1001": "https://acme.example",
            "vendorId": "SEC-42",
            "workflowStage": {"stage": {"value": "Live"}},
            "status": {"key": "active"},
            "createdDate": "2024-03-05T10:11:12.000Z",
            "updatedDate": "2024-06-01"
        })
    }

    #[test]
    fn decodes_nested_inventory_fields()
    {
        let vendor = VendorRecord::from_json(&inventory_vendor(), None,).expect("valid vendor",);
        assert_eq!(vendor.id, "a1b2");
        assert_eq!(vendor.number.as_deref(), Some("17",));
        assert_eq!(vendor.owner_id.as_deref(), Some("u1",));
        assert_eq!(vendor.organization, "Engineering");
        assert_eq!(vendor.category, "SaaS");
        assert_eq!(vendor.website, "https://acme.example");
        assert_eq!(vendor.ticket, "SEC-42");
        assert_eq!(vendor.stage, "Live");
        assert_eq!(vendor.status, "active");
        assert_eq!(vendor.created_date, NaiveDate::from_ymd_opt(2024, 3, 5,));
        assert_eq!(vendor.updated_date, NaiveDate::from_ymd_opt(2024, 6, 1,));
    }

    #[test]
    fn missing_attributes_fall_back_to_placeholders()
    {
        let vendor =
            VendorRecord::from_json(&json!({"id": 9, "name": "Bare"}), Some("default-owner",),)
                .expect("valid vendor",);
        assert_eq!(vendor.id, "9");
        assert_eq!(vendor.owner_id.as_deref(), Some("default-owner",));
        assert_eq!(vendor.category, "vendor_category_not_set");
        assert_eq!(vendor.ticket, "Vendor ID Not Set");
        assert_eq!(vendor.created_date, None);
        assert!(vendor.stage.is_empty());
    }

    #[test]
    fn null_owner_uses_default()
    {
        let vendor = VendorRecord::from_json(&json!({"id": "v", "owner": null}), Some("fallback",),)
            .expect("valid vendor",);
        assert_eq!(vendor.owner_id.as_deref(), Some("fallback",));
    }

    #[test]
    fn vendor_without_id_is_rejected()
    {
        let error = VendorRecord::from_json(&json!({"name": "nameless"}), None,).unwrap_err();
        assert!(matches!(error, Error::Decode { .. }));
        assert!(VendorRecord::from_json(&json!([1, 2]), None,).is_err());
    }

    #[test]
    fn unparseable_dates_become_none()
    {
        let vendor = VendorRecord::from_json(&json!({"id": "v", "createdDate": "yesterday"}), None,)
            .expect("valid vendor",);
        assert_eq!(vendor.created_date, None);
    }

    #[test]
    fn decodes_scim_user()
    {
        let user = UserRecord::from_json(&json!({
            "id": "u1",
            "userName": "Alice@Example.com",
            "displayName": "Alice",
            "active": true,
            "emails": [
                {"value": "alice.alt@example.com"},
                {"value": "alice@example.com", "primary": true}
            ]
        }),)
        .expect("valid user",);
        assert_eq!(user.user_name.as_deref(), Some("alice@example.com",));
        assert_eq!(user.display_name.as_deref(), Some("Alice",));
        assert_eq!(user.email.as_deref(), Some("alice@example.com",));
        assert_eq!(user.active, Some(true,));
    }

    #[test]
    fn user_display_name_falls_back_to_formatted_name()
    {
        let user = UserRecord::from_json(&json!({"id": "u2", "name": {"formatted": "Bob B"}}),)
            .expect("valid user",);
        assert_eq!(user.display_name.as_deref(), Some("Bob B",));
        assert_eq!(user.user_name, None);
    }

    #[test]
    fn flatten_produces_dotted_keys_and_keeps_arrays()
    {
        let flat = flatten(&json!({"a": {"b": {"c": 1}, "d": [1, 2]}, "e": {}}),);
        assert_eq!(flat.get("a.b.c",), Some(&json!(1),));
        assert_eq!(flat.get("a.d",), Some(&json!([1, 2]),));
        assert_eq!(flat.get("e",), Some(&json!({}),));
        assert!(flatten(&json!("scalar"),).is_empty());
    }

    #[test]
    fn lookup_walks_dotted_paths()
    {
        let value = json!({"meta": {"page": {"totalPages": 3}}});
        assert_eq!(lookup(&value, "meta.page.totalPages",), Some(&json!(3),));
        assert_eq!(lookup(&value, "meta.page.missing",), None);
    }

    #[test]
    fn text_of_unwraps_value_wrappers()
    {
        assert_eq!(text_of(&json!([{"value": "x"}]),).as_deref(), Some("x",));
        assert_eq!(text_of(&json!({"value": 3}),).as_deref(), Some("3",));
        assert_eq!(text_of(&json!([]),), None);
        assert_eq!(text_of(&Value::Null,), None);
    }
}
