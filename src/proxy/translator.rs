//! Header and body translation for the outbound leg
//!
//! Translation is pure: it takes the inbound method, headers and body plus
//! the resolved target and produces the outbound request. No I/O happens here.

use crate::proxy::headers::{
    content_types, strip_request_hop_by_hop, BODY_METHODS, CONTENT_LENGTH, CONTENT_TYPE, HOST,
};
use crate::proxy::types::*;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use std::collections::HashSet;
use std::fmt;

/// Inbound body as handed to the translator
#[derive(Clone, Debug, PartialEq)]
pub enum InboundBody {
    Empty,
    /// Bytes forwarded exactly as received
    Raw(Bytes),
    /// Parsed payload that must be re-serialized
    Structured(serde_json::Value),
}

impl InboundBody {
    /// Classify collected inbound bytes.
    ///
    /// Only a body without a declared content type that parses as JSON is
    /// treated as structured; declared payloads are never rewritten. A
    /// document with a repeated object key stays raw, since re-serializing
    /// it would drop all but one of the values.
    pub fn classify(headers: &HeaderMap, bytes: Bytes) -> Self {
        if bytes.is_empty() {
            return Self::Empty;
        }
        if !headers.contains_key(CONTENT_TYPE) && has_unique_keys(&bytes) {
            if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) {
                return Self::Structured(value);
            }
        }
        Self::Raw(bytes)
    }
}

/// Whether `bytes` is a JSON document whose objects never repeat a key
fn has_unique_keys(bytes: &[u8]) -> bool {
    serde_json::from_slice::<UniqueKeys>(bytes).is_ok()
}

/// Validating sink that walks a JSON document without keeping it
struct UniqueKeys;

impl<'de> Deserialize<'de> for UniqueKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(UniqueKeysVisitor)
    }
}

struct UniqueKeysVisitor;

impl<'de> Visitor<'de> for UniqueKeysVisitor {
    type Value = UniqueKeys;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E>(self, _: bool) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_i64<E>(self, _: i64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_u64<E>(self, _: u64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_f64<E>(self, _: f64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_str<E>(self, _: &str) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_unit<E>(self) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<UniqueKeys, A::Error> {
        while seq.next_element::<UniqueKeys>()?.is_some() {}
        Ok(UniqueKeys)
    }

    // Arbitrary-precision numbers also arrive here, as a one-entry map
    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<UniqueKeys, A::Error> {
        let mut seen = HashSet::new();
        while let Some(key) = map.next_key::<String>()? {
            if !seen.insert(key) {
                return Err(de::Error::custom("duplicate object key"));
            }
            map.next_value::<UniqueKeys>()?;
        }
        Ok(UniqueKeys)
    }
}

/// Request ready to be issued against the target
#[derive(Clone, Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub target: TargetDescriptor,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Whether a method's body is forwarded
pub fn carries_body(method: &Method) -> bool {
    BODY_METHODS.contains(&method.as_str())
}

/// Derive the outbound request from the inbound parts and resolved target.
pub fn translate(
    method: &Method,
    inbound_headers: &HeaderMap,
    body: InboundBody,
    target: &TargetDescriptor,
) -> ProxyResult<OutboundRequest> {
    let mut headers = inbound_headers.clone();
    strip_request_hop_by_hop(&mut headers);
    headers.remove(CONTENT_LENGTH);

    let host = HeaderValue::from_str(&target.authority())
        .map_err(|e| ProxyError::Internal(format!("Invalid host header value: {e}")))?;
    headers.insert(HOST, host);

    let body = if carries_body(method) {
        match body {
            InboundBody::Empty => Bytes::new(),
            InboundBody::Raw(bytes) => bytes,
            InboundBody::Structured(value) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static(content_types::APPLICATION_JSON),
                    );
                }
                Bytes::from(serde_json::to_vec(&value)?)
            }
        }
    } else {
        Bytes::new()
    };

    if !body.is_empty() {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    }

    Ok(OutboundRequest {
        method: method.clone(),
        target: target.clone(),
        headers,
        body,
    })
}
