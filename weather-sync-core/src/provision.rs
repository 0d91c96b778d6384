//! Bucket provisioning: create the bucket and open it for anonymous reads.
//!
//! The five resources form a chain; S3 rejects an ACL grant before ownership
//! controls allow ACLs, and a public policy while the public-access block is
//! still on. Steps are therefore applied strictly in [`ProvisionStep::ORDER`]
//! and the sequence stops at the first rejection.

use async_trait::async_trait;
use serde_json::json;
use std::fmt::{self, Debug};

use crate::error::{BoxError, ProvisionError};

pub mod s3;

pub use s3::S3BucketAdmin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisionStep {
    Bucket,
    OwnershipControls,
    PublicAccessBlock,
    Acl,
    Policy,
}

impl ProvisionStep {
    /// Topological apply order.
    pub const ORDER: [ProvisionStep; 5] = [
        ProvisionStep::Bucket,
        ProvisionStep::OwnershipControls,
        ProvisionStep::PublicAccessBlock,
        ProvisionStep::Acl,
        ProvisionStep::Policy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionStep::Bucket => "bucket",
            ProvisionStep::OwnershipControls => "ownership-controls",
            ProvisionStep::PublicAccessBlock => "public-access-block",
            ProvisionStep::Acl => "acl",
            ProvisionStep::Policy => "policy",
        }
    }

    /// The step that must be in place before this one.
    pub fn depends_on(&self) -> Option<ProvisionStep> {
        match self {
            ProvisionStep::Bucket => None,
            ProvisionStep::OwnershipControls => Some(ProvisionStep::Bucket),
            ProvisionStep::PublicAccessBlock => Some(ProvisionStep::OwnershipControls),
            ProvisionStep::Acl => Some(ProvisionStep::PublicAccessBlock),
            ProvisionStep::Policy => Some(ProvisionStep::Acl),
        }
    }

    pub fn describe(&self, bucket: &str) -> String {
        match self {
            ProvisionStep::Bucket => format!("create bucket '{bucket}'"),
            ProvisionStep::OwnershipControls => {
                "set object ownership to BucketOwnerPreferred (allows ACL grants)".to_string()
            }
            ProvisionStep::PublicAccessBlock => {
                "disable all four public-access block settings".to_string()
            }
            ProvisionStep::Acl => "grant canned ACL public-read".to_string(),
            ProvisionStep::Policy => {
                format!("attach policy allowing anonymous s3:GetObject on arn:aws:s3:::{bucket}/*")
            }
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket policy document granting anonymous read on every object.
pub fn public_read_policy(bucket: &str) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "PublicReadGetObject",
            "Effect": "Allow",
            "Principal": "*",
            "Action": "s3:GetObject",
            "Resource": format!("arn:aws:s3:::{bucket}/*"),
        }]
    })
    .to_string()
}

/// Human-readable plan, one line per step.
pub fn plan(bucket: &str) -> Vec<String> {
    ProvisionStep::ORDER
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {step}: {}", i + 1, step.describe(bucket)))
        .collect()
}

/// Applies a single provisioning step against a storage platform.
#[async_trait]
pub trait BucketAdmin: Send + Sync + Debug {
    async fn apply(&self, bucket: &str, step: ProvisionStep) -> Result<(), BoxError>;
}

/// Applies [`ProvisionStep::ORDER`] to one bucket.
#[derive(Debug)]
pub struct Provisioner<A> {
    admin: A,
}

impl<A: BucketAdmin> Provisioner<A> {
    pub fn new(admin: A) -> Self {
        Self { admin }
    }

    /// Apply every step in order, stopping at the first failure.
    ///
    /// Returns the steps that were applied.
    pub async fn apply(&self, bucket: &str) -> Result<Vec<ProvisionStep>, ProvisionError> {
        let mut applied = Vec::with_capacity(ProvisionStep::ORDER.len());

        for step in ProvisionStep::ORDER {
            tracing::info!(%bucket, %step, "applying");
            self.admin.apply(bucket, step).await.map_err(|source| {
                tracing::error!(%bucket, %step, error = %source, "provisioning stopped");
                ProvisionError { step, bucket: bucket.to_string(), source }
            })?;
            applied.push(step);
        }

        Ok(applied)
    }
}
