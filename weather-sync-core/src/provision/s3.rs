use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    error::DisplayErrorContext,
    types::{
        BucketCannedAcl, BucketLocationConstraint, CreateBucketConfiguration, ObjectOwnership,
        OwnershipControls, OwnershipControlsRule, PublicAccessBlockConfiguration,
    },
};

use crate::{error::BoxError, storage::s3::s3_client};

use super::{BucketAdmin, ProvisionStep, public_read_policy};

/// Region where S3 rejects an explicit location constraint.
const DEFAULT_S3_REGION: &str = "us-east-1";

#[derive(Debug, Clone)]
pub struct S3BucketAdmin {
    client: Client,
    region: String,
}

impl S3BucketAdmin {
    pub fn new(client: Client, region: String) -> Self {
        Self { client, region }
    }

    pub async fn connect(region: &str) -> Self {
        Self::new(s3_client(region).await, region.to_string())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), BoxError> {
        let mut req = self.client.create_bucket().bucket(bucket);
        if self.region != DEFAULT_S3_REGION {
            req = req.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match req.send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_bucket_already_owned_by_you()) =>
            {
                tracing::info!(%bucket, "bucket already exists and is owned by this account");
                Ok(())
            }
            Err(err) => Err(DisplayErrorContext(err).to_string().into()),
        }
    }

    async fn put_ownership_controls(&self, bucket: &str) -> Result<(), BoxError> {
        let rule = OwnershipControlsRule::builder()
            .object_ownership(ObjectOwnership::BucketOwnerPreferred)
            .build()?;
        let controls = OwnershipControls::builder().rules(rule).build()?;

        self.client
            .put_bucket_ownership_controls()
            .bucket(bucket)
            .ownership_controls(controls)
            .send()
            .await
            .map_err(|e| DisplayErrorContext(e).to_string())?;
        Ok(())
    }

    async fn put_public_access_block(&self, bucket: &str) -> Result<(), BoxError> {
        let config = PublicAccessBlockConfiguration::builder()
            .block_public_acls(false)
            .ignore_public_acls(false)
            .block_public_policy(false)
            .restrict_public_buckets(false)
            .build();

        self.client
            .put_public_access_block()
            .bucket(bucket)
            .public_access_block_configuration(config)
            .send()
            .await
            .map_err(|e| DisplayErrorContext(e).to_string())?;
        Ok(())
    }

    async fn put_acl(&self, bucket: &str) -> Result<(), BoxError> {
        self.client
            .put_bucket_acl()
            .bucket(bucket)
            .acl(BucketCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| DisplayErrorContext(e).to_string())?;
        Ok(())
    }

    async fn put_policy(&self, bucket: &str) -> Result<(), BoxError> {
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(public_read_policy(bucket))
            .send()
            .await
            .map_err(|e| DisplayErrorContext(e).to_string())?;
        Ok(())
    }
}

#[async_trait]
impl BucketAdmin for S3BucketAdmin {
    async fn apply(&self, bucket: &str, step: ProvisionStep) -> Result<(), BoxError> {
        match step {
            ProvisionStep::Bucket => self.create_bucket(bucket).await,
            ProvisionStep::OwnershipControls => self.put_ownership_controls(bucket).await,
            ProvisionStep::PublicAccessBlock => self.put_public_access_block(bucket).await,
            ProvisionStep::Acl => self.put_acl(bucket).await,
            ProvisionStep::Policy => self.put_policy(bucket).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::s3::tests::mock_client;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    fn admin(server: &MockServer) -> S3BucketAdmin {
        S3BucketAdmin::new(mock_client(&server.uri()), DEFAULT_S3_REGION.to_string())
    }

    #[tokio::test]
    async fn existing_bucket_owned_by_us_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/wx"))
            .respond_with(ResponseTemplate::new(409).set_body_string(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                 <Error><Code>BucketAlreadyOwnedByYou</Code>\
                 <Message>Your previous request to create the named bucket succeeded.</Message>\
                 <BucketName>wx</BucketName></Error>",
            ))
            .expect(1)
            .mount(&server)
            .await;

        admin(&server)
            .apply("wx", ProvisionStep::Bucket)
            .await
            .expect("already-owned bucket counts as created");
    }

    #[tokio::test]
    async fn acl_step_sends_public_read_grant() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/wx"))
            .and(header("x-amz-acl", "public-read"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        admin(&server).apply("wx", ProvisionStep::Acl).await.expect("acl accepted");
    }

    #[tokio::test]
    async fn rejected_step_reports_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                 <Error><Code>AccessControlListNotSupported</Code>\
                 <Message>The bucket does not allow ACLs</Message></Error>",
            ))
            .mount(&server)
            .await;

        let err = admin(&server).apply("wx", ProvisionStep::Acl).await.unwrap_err();
        assert!(err.to_string().contains("AccessControlListNotSupported"), "got: {err}");
    }
}
