// SPDX-License-Identifier: MIT

use booqable_helper::api::BooqableClient;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Client pointed at a mock server.
#[allow(dead_code)]
pub fn test_client(server: &MockServer) -> BooqableClient {
    BooqableClient::with_base_url(server.uri(), "test-key")
}

/// A minimal order stub with a creation timestamp.
#[allow(dead_code)]
pub fn order_stub(id: &str, created_at: &str) -> Value {
    json!({"id": id, "created_at": created_at, "status": "reserved"})
}

/// Sequentially numbered order stubs `o{start}` through `o{start+count-1}`.
#[allow(dead_code)]
pub fn order_stubs(start: usize, count: usize) -> Vec<Value> {
    (start..start + count)
        .map(|n| {
            order_stub(
                &format!("o{n}"),
                &format!("2026-08-{:02}T00:00:00Z", (n % 27) + 1),
            )
        })
        .collect()
}

/// A page body in the `data`-array shape, optionally with a total.
#[allow(dead_code)]
pub fn data_page(items: Vec<Value>, total: Option<u64>) -> Value {
    match total {
        Some(total) => json!({"data": items, "meta": {"total": total}}),
        None => json!({"data": items}),
    }
}

/// Mount a legacy-dialect page mock for `resource` at `page`.
#[allow(dead_code)]
pub async fn mount_legacy_page(server: &MockServer, resource: &str, page: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/1/{resource}")))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mount a structured-dialect page mock for `resource` at `page`.
#[allow(dead_code)]
pub async fn mount_structured_page(server: &MockServer, resource: &str, page: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/4/{resource}")))
        .and(query_param("page[number]", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
