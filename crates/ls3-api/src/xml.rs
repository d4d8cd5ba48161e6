// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! S3 XML response emission.
//!
//! Responses are serialized into a buffer first, so a serialization
//! failure can still be turned into a well-formed error response.

use axum::body::Body;
use axum::response::Response;
use http::{header::CONTENT_TYPE, StatusCode};
use ls3_core::{Error, S3ErrorCode};
use serde::Serialize;
use uuid::Uuid;

const XML_PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// The standard Amazon S3 XML error body.
#[derive(Debug, Serialize)]
#[serde(rename = "Error")]
struct ErrorPayload<'a> {
    #[serde(rename = "Code")]
    code: &'a str,
    #[serde(rename = "Message")]
    message: &'a str,
    #[serde(rename = "Resource")]
    resource: &'a str,
    #[serde(rename = "RequestId")]
    request_id: String,
}

/// Serializes a payload to an XML document with the standard prolog.
pub fn to_xml<T: Serialize>(payload: &T) -> Result<String, Error> {
    let mut body = String::from(XML_PROLOG);

    let mut serializer = quick_xml::se::Serializer::new(&mut body);
    serializer.indent(' ', 2);

    payload.serialize(serializer).map_err(|err| {
        Error::new(
            S3ErrorCode::MalformedXML,
            format!("The server was unable to XML encode the response: {err}"),
        )
    })?;

    Ok(body)
}

/// Builds an XML response with the given status.
pub fn xml_response<T: Serialize>(status: StatusCode, payload: &T) -> Result<Response, Error> {
    let body = to_xml(payload)?;

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/xml")
        .body(Body::from(body))
        .map_err(|err| Error::new(S3ErrorCode::InternalError, err.to_string()))
}

/// Builds the S3 XML error response for `err`.
///
/// If the error itself fails to serialize, one attempt is made to send
/// a `MalformedXML` error through the same path; failing that too, the
/// response degrades to a bare status code.
pub fn error_response(request_id: Uuid, resource: &str, err: &Error) -> Response {
    let payload = ErrorPayload {
        code: err.code.as_str(),
        message: &err.message,
        resource,
        request_id: request_id.to_string(),
    };

    match xml_response(err.code.status_code(), &payload) {
        Ok(response) => response,
        Err(encode_err) => {
            tracing::error!(error = %encode_err, "failed to encode an error response");

            let fallback = ErrorPayload {
                code: S3ErrorCode::MalformedXML.as_str(),
                message: "The server was unable to XML encode the response.",
                resource,
                request_id: request_id.to_string(),
            };

            xml_response(S3ErrorCode::MalformedXML.status_code(), &fallback).unwrap_or_else(|_| {
                // Refuse to try again; reply with the status alone
                Response::builder()
                    .status(err.code.status_code())
                    .body(Body::empty())
                    .expect("a bare status response always builds")
            })
        }
    }
}

/// Builds a bodyless response carrying only a status code, as used by
/// failing HEAD requests.
pub fn status_response(status: StatusCode) -> Response {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .expect("a bare status response always builds")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn error_body_shape() {
        let id = Uuid::parse_str("123e4567-e89b-12d3-a456-426614174000").unwrap();
        let err = Error::new(
            S3ErrorCode::MethodNotAllowed,
            "The specified method is not allowed against this resource.",
        );

        let response = error_response(id, "/Path/to/Resource", &err);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/xml");

        let body = body_text(response).await;
        assert_eq!(
            body,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <Error>\n  \
               <Code>MethodNotAllowed</Code>\n  \
               <Message>The specified method is not allowed against this resource.</Message>\n  \
               <Resource>/Path/to/Resource</Resource>\n  \
               <RequestId>123e4567-e89b-12d3-a456-426614174000</RequestId>\n\
             </Error>"
        );
    }

    #[tokio::test]
    async fn xml_escapes_content() {
        let id = Uuid::new_v4();
        let err = Error::new(S3ErrorCode::InvalidArgument, "bad <value> & worse");

        let body = body_text(error_response(id, "/", &err)).await;
        assert!(body.contains("bad &lt;value&gt; &amp; worse"));
    }
}
