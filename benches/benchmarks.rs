// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::{Value, json};
use vendor_report::{
    AppConfig, FilterPreset, MergedTable, UserDirectory, UserRecord, VendorRecord, flatten,
    merge, render_html,
};

fn raw_vendor(i: usize,) -> Value
{
    let stage = if i % 3 == 0 { "In Review" } else { "Live" };
    json!({
        "id": format!("vendor-{i}"),
        "number": i,
        "name": format!("Vendor {i}"),
        "owner": [{"id": format!("user-{}", i % 50), "name": "ignored"}],
        "organization": {"id": "org", "value": "Engineering"},
        "description": "Hosted service",
        "customField1000": [{"id": "c", "value": "SaaS"}],
        "customField1001": format!("https://vendor{i}.example"),
        "vendorId": format!("SEC-{i}"),
        "workflowStage": {"stage": {"value": stage}},
        "status": {"key": "active"},
        "createdDate": "2024-03-05T10:11:12.000Z",
        "updatedDate": "2024-06-01T00:00:00.000Z"
    })
}

fn vendors(count: usize,) -> Vec<VendorRecord,>
{
    (0..count)
        .map(|i| VendorRecord::from_json(&raw_vendor(i,), None,).expect("valid vendor",),)
        .collect()
}

fn directory() -> UserDirectory
{
    UserDirectory::from_records((0..50).map(|i| {
        UserRecord::from_json(&json!({
            "id": format!("user-{i}"),
            "userName": format!("User{i}@Example.com"),
            "displayName": format!("User {i}")
        }),)
        .expect("valid user",)
    },),)
}

fn benchmark_flatten(c: &mut Criterion,)
{
    let raw = raw_vendor(7,);

    c.bench_function("flatten_vendor_record", |b| b.iter(|| flatten(black_box(&raw,),),),);
}

fn benchmark_decode_vendors(c: &mut Criterion,)
{
    let page: Vec<Value,> = (0..500).map(raw_vendor,).collect();

    c.bench_function("decode_500_vendors", |b| {
        b.iter(|| {
            let decoded: usize = black_box(&page,)
                .iter()
                .filter_map(|raw| VendorRecord::from_json(raw, Some("default-owner",),).ok(),)
                .count();
            black_box(decoded,)
        },)
    },);
}

fn benchmark_merge(c: &mut Criterion,)
{
    let vendors = vendors(1_000,);
    let users = directory();
    let filter = FilterPreset::Approved.filter();

    c.bench_function("merge_1000_vendors", |b| {
        b.iter(|| merge(black_box(&vendors,), black_box(&users,), &filter,),)
    },);
}

fn benchmark_render_html(c: &mut Criterion,)
{
    let table: MergedTable = merge(&vendors(500,), &directory(), &FilterPreset::Approved.filter(),);

    c.bench_function("render_html_500_rows", |b| {
        b.iter(|| render_html(black_box(&table,), "Approved Vendors",),)
    },);
}

fn benchmark_config_parse(c: &mut Criterion,)
{
    let yaml = r"
api:
  base_url: https://tenant.example.com
  token: secret
users:
  strategy: exhaustive
filter:
  preset: in_progress
retry:
  max_attempts: 5
";

    c.bench_function("parse_config", |b| {
        b.iter(|| AppConfig::from_yaml(black_box(yaml,),).expect("parse failed",),)
    },);
}

criterion_group!(
    benches,
    benchmark_flatten,
    benchmark_decode_vendors,
    benchmark_merge,
    benchmark_render_html,
    benchmark_config_parse
);
criterion_main!(benches);
