// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-request state and the access check every handler goes through.

use std::net::IpAddr;
use std::sync::Arc;

use ls3_core::policy::{evaluate_policy, JoinContext, PolicyContext, S3Action, Statement};
use ls3_core::{Error, Identity, Result, S3ErrorCode};
use ls3_fs::FsView;
use uuid::Uuid;

use crate::metrics;

/// State threaded through one HTTP request.
///
/// Built by the dispatcher after verification and dropped when the
/// response completes.
pub struct RequestContext {
    /// Request id, also sent as `x-amz-request-id`.
    pub id: Uuid,
    /// The addressed bucket; empty for service-level requests.
    pub bucket: String,
    /// Filesystem view of the addressed bucket, when one was opened.
    pub view: Option<FsView>,
    /// The verified (or unauthenticated) identity.
    pub identity: Arc<Identity>,
    /// Client IP address, per the configured strategy.
    pub remote_ip: IpAddr,
    /// Whether the client connection is secure.
    pub secure: bool,
    /// Server-wide policy checked before the identity policy.
    pub global_policy: Arc<Vec<Statement>>,
}

impl PolicyContext for RequestContext {
    fn get(&self, key: &str) -> Option<String> {
        match key {
            "aws:SourceIp" => Some(self.remote_ip.to_string()),
            "aws:SecureTransport" => Some(self.secure.to_string()),
            "aws:username" => Some(self.identity.name.clone()),
            "ls3:authenticated" => Some(self.identity.is_authenticated().to_string()),
            _ => None,
        }
    }
}

impl RequestContext {
    /// The bucket view, which the dispatcher opens for every bucket
    /// request before routing.
    pub fn view(&self) -> Result<&FsView> {
        self.view.as_ref().ok_or_else(|| {
            Error::new(S3ErrorCode::InternalError, "no filesystem view for this request")
        })
    }

    /// Verifies that the current identity may perform `action` on
    /// `resource`.
    ///
    /// The global policy is evaluated first; only if it allows is the
    /// identity policy consulted. `vars` supplies extra context keys
    /// for condition evaluation and overrides the request's own.
    pub fn check_access(
        &self,
        action: S3Action,
        resource: &str,
        vars: &dyn PolicyContext,
    ) -> Result<()> {
        let policy_context = JoinContext::new(self, vars);

        if let Err(err) =
            evaluate_policy(action.as_str(), resource, &self.global_policy, &policy_context)
        {
            metrics::record_policy_denial(action.as_str(), &self.identity.name);
            tracing::warn!(
                action = %action,
                resource = %resource,
                identity = %self.identity.name,
                remote_ip = %self.remote_ip,
                "access to resource is denied by global policy"
            );
            return Err(err);
        }

        if let Err(err) =
            evaluate_policy(action.as_str(), resource, &self.identity.policy, &policy_context)
        {
            metrics::record_policy_denial(action.as_str(), &self.identity.name);
            tracing::warn!(
                action = %action,
                resource = %resource,
                identity = %self.identity.name,
                remote_ip = %self.remote_ip,
                "access to resource is denied by identity policy"
            );
            return Err(err);
        }

        metrics::record_operation(action.as_str(), &self.identity.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ls3_core::policy::{MapContext, NullContext};

    fn context(global: Vec<Statement>, identity_policy: Vec<Statement>) -> RequestContext {
        RequestContext {
            id: Uuid::new_v4(),
            bucket: "bucket".to_string(),
            view: None,
            identity: Arc::new(Identity {
                name: "tester".to_string(),
                access_key_id: "AKID".to_string(),
                secret_access_key: "secret".to_string(),
                policy: identity_policy,
            }),
            remote_ip: "10.0.0.1".parse().unwrap(),
            secure: true,
            global_policy: Arc::new(global),
        }
    }

    fn statement(json: &str) -> Statement {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn request_context_policy_keys() {
        let ctx = context(vec![], vec![]);

        assert_eq!(ctx.get("aws:SourceIp").as_deref(), Some("10.0.0.1"));
        assert_eq!(ctx.get("aws:SecureTransport").as_deref(), Some("true"));
        assert_eq!(ctx.get("aws:username").as_deref(), Some("tester"));
        assert_eq!(ctx.get("ls3:authenticated").as_deref(), Some("true"));
        assert_eq!(ctx.get("s3:prefix"), None);
    }

    #[test]
    fn global_policy_is_checked_first() {
        let ctx = context(
            vec![statement(r#"{"Deny": true, "Action": "*", "Resource": "*"}"#)],
            vec![Statement::allow_all()],
        );

        let err = ctx.check_access(S3Action::GetObject, "bucket/key", &NullContext).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::AccessDenied);
    }

    #[test]
    fn identity_policy_is_checked_second() {
        let ctx = context(
            vec![Statement::allow_all()],
            vec![statement(r#"{"Action": "s3:GetObject", "Resource": "bucket/*"}"#)],
        );

        assert!(ctx.check_access(S3Action::GetObject, "bucket/key", &NullContext).is_ok());
        assert!(ctx.check_access(S3Action::ListBucket, "bucket", &NullContext).is_err());
    }

    #[test]
    fn vars_override_request_context() {
        let ctx = context(
            vec![Statement::allow_all()],
            vec![statement(
                r#"{"Action": "*", "Resource": "*",
                    "Condition": {"StringEquals": {"s3:prefix": "public/"}}}"#,
            )],
        );

        let listing = MapContext::new([("s3:prefix", "public/")]);
        assert!(ctx.check_access(S3Action::ListBucket, "bucket", &listing).is_ok());

        let listing = MapContext::new([("s3:prefix", "private/")]);
        assert!(ctx.check_access(S3Action::ListBucket, "bucket", &listing).is_err());

        // Without the key the condition cannot hold
        assert!(ctx.check_access(S3Action::ListBucket, "bucket", &NullContext).is_err());
    }
}
