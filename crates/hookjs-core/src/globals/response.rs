// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! `response` capability: a read-only view of an HTTP response

use super::{Capability, json_to_js};
use rquickjs::convert::Coerced;
use rquickjs::{Ctx, Function, Object, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Parsed `Content-Type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentType {
    /// Media type, e.g. `application/json`
    pub mime_type: String,
    /// Charset parameter
    #[serde(default)]
    pub charset: Option<String>,
}

impl ContentType {
    /// Parse a `Content-Type` header value
    pub fn parse(header: &str) -> Self {
        let mut parts = header.split(';');
        let mime_type = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        let charset = parts.find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches('"').to_string())
        });
        Self { mime_type, charset }
    }
}

/// Snapshot of the response a handler script inspects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSnapshot {
    /// Status code
    pub status: u16,
    /// Header values by name, in received order
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
    /// Content type; derived from the headers when absent
    #[serde(default)]
    pub content_type: Option<ContentType>,
    /// Parsed body, or the raw text when it did not parse
    #[serde(default)]
    pub body: serde_json::Value,
}

impl ResponseSnapshot {
    /// Create a response with the given status and no headers or body
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Append a header value
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Set the body from raw text, parsing it as JSON when possible
    pub fn with_body(mut self, text: &str) -> Self {
        self.body = serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()));
        self
    }

    /// First value of a header, case-insensitively
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.values_of(name).and_then(|values| values.into_iter().next())
    }

    /// All values of a header, case-insensitively
    pub fn values_of(&self, name: &str) -> Option<Vec<&str>> {
        let values: Vec<&str> = self
            .headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .flat_map(|(_, values)| values.iter().map(String::as_str))
            .collect();
        (!values.is_empty()).then_some(values)
    }

    /// Explicit content type, else the parsed `Content-Type` header
    pub fn content_type(&self) -> Option<ContentType> {
        self.content_type
            .clone()
            .or_else(|| self.value_of("content-type").map(ContentType::parse))
    }
}

impl Capability for ResponseSnapshot {
    fn install<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        let response = Object::new(ctx.clone())?;
        let snapshot = Arc::new(self.clone());

        response.set("status", self.status)?;
        response.set("body", json_to_js(ctx, &self.body)?)?;

        if let Some(content_type) = self.content_type() {
            let object = Object::new(ctx.clone())?;
            object.set("mimeType", content_type.mime_type)?;
            object.set("charset", content_type.charset)?;
            response.set("contentType", object)?;
        }

        let headers = Object::new(ctx.clone())?;

        let this = snapshot.clone();
        let value_of = Function::new(ctx.clone(), move |name: Coerced<String>| {
            this.value_of(&name.0).map(str::to_string)
        })?
        .with_name("valueOf")?;
        headers.set("valueOf", value_of)?;

        let this = snapshot;
        let values_of = Function::new(ctx.clone(), move |name: Coerced<String>| {
            this.values_of(&name.0)
                .map(|values| values.into_iter().map(str::to_string).collect::<Vec<_>>())
        })?
        .with_name("valuesOf")?;
        headers.set("valuesOf", values_of)?;

        response.set("headers", headers)?;

        Ok(response.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ResponseSnapshot {
        ResponseSnapshot::new(200)
            .with_header("Content-Type", "application/json; charset=UTF-8")
            .with_header("Set-Cookie", "a=1")
            .with_header("set-cookie", "b=2")
            .with_body(r#"{"ok": true}"#)
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = sample();
        assert_eq!(
            response.value_of("content-type"),
            Some("application/json; charset=UTF-8")
        );
        assert_eq!(response.values_of("SET-COOKIE").unwrap().len(), 2);
        assert!(response.value_of("x-missing").is_none());
        assert!(response.values_of("x-missing").is_none());
    }

    #[test]
    fn test_content_type_from_header() {
        let content_type = sample().content_type().unwrap();
        assert_eq!(content_type.mime_type, "application/json");
        assert_eq!(content_type.charset.as_deref(), Some("UTF-8"));

        assert!(ResponseSnapshot::new(204).content_type().is_none());
    }

    #[test]
    fn test_body_parsing() {
        assert_eq!(sample().body, json!({"ok": true}));
        assert_eq!(ResponseSnapshot::new(200).with_body("plain").body, json!("plain"));
    }

    #[test]
    fn test_deserialize_snapshot() {
        let snapshot: ResponseSnapshot = serde_json::from_value(json!({
            "status": 404,
            "headers": {"X-Trace": ["1"]},
            "contentType": {"mimeType": "text/plain"},
            "body": "missing"
        }))
        .unwrap();
        assert_eq!(snapshot.status, 404);
        assert_eq!(snapshot.value_of("x-trace"), Some("1"));
        assert_eq!(snapshot.content_type().unwrap().charset, None);
    }
}
