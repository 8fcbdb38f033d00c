//! Pivotal Network 风格的软件目录 HTTP 客户端

use std::time::Duration;

use async_trait::async_trait;
use provisioner_config::CatalogConfig;
use provisioner_domain::{
    CatalogClient, FileGroup, ProductFile, ProvisionError, ProvisionResult, Release,
    ReleaseCatalogEntry,
};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

#[derive(Debug, Deserialize)]
struct ProductLinks {
    releases: Link,
}

#[derive(Debug, Deserialize)]
struct ProductDto {
    id: i64,
    slug: String,
    #[serde(rename = "_links")]
    links: ProductLinks,
}

#[derive(Debug, Deserialize)]
struct ProductsResponse {
    products: Vec<ProductDto>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDto {
    id: i64,
    version: String,
}

#[derive(Debug, Deserialize)]
struct ReleasesResponse {
    releases: Vec<ReleaseDto>,
}

#[derive(Debug, Deserialize)]
struct FileLinks {
    download: Link,
}

#[derive(Debug, Deserialize)]
struct ProductFileDto {
    name: String,
    aws_object_key: String,
    #[serde(rename = "_links")]
    links: FileLinks,
}

#[derive(Debug, Deserialize)]
struct FileGroupDto {
    name: String,
    #[serde(default)]
    product_files: Vec<ProductFileDto>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDetailResponse {
    #[serde(default)]
    file_groups: Vec<FileGroupDto>,
}

pub struct HttpCatalogClient {
    base_url: String,
    api_key: SecretString,
    http_client: reqwest::Client,
}

impl HttpCatalogClient {
    pub fn new(config: &CatalogConfig) -> ProvisionResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| ProvisionError::config_error(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http_client,
        })
    }

    fn release_url(&self, product: &ReleaseCatalogEntry, release: &Release) -> String {
        format!(
            "{}/api/v2/products/{}/releases/{}",
            self.base_url, product.slug, release.id
        )
    }

    fn authorization(&self) -> String {
        format!("Token {}", self.api_key.expose_secret())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, authenticated: bool) -> ProvisionResult<T> {
        debug!("GET {}", url);
        let mut request = self.http_client.get(url);
        if authenticated {
            request = request.header(reqwest::header::AUTHORIZATION, self.authorization());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProvisionError::catalog_unavailable(format!("请求失败 {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::catalog_unavailable(format!(
                "HTTP {status} - {url}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProvisionError::catalog_unavailable(format!("响应格式错误 {url}: {e}")))
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn list_products(&self) -> ProvisionResult<Vec<ReleaseCatalogEntry>> {
        let url = format!("{}/api/v2/products", self.base_url);
        let response: ProductsResponse = self.get_json(&url, false).await?;

        Ok(response
            .products
            .into_iter()
            .map(|p| ReleaseCatalogEntry {
                product_id: p.id,
                slug: p.slug,
                releases_url: p.links.releases.href,
            })
            .collect())
    }

    async fn list_releases(&self, product: &ReleaseCatalogEntry) -> ProvisionResult<Vec<Release>> {
        let response: ReleasesResponse = self.get_json(&product.releases_url, false).await?;

        Ok(response
            .releases
            .into_iter()
            .map(|r| Release::new(r.id, r.version))
            .collect())
    }

    async fn release_files(
        &self,
        product: &ReleaseCatalogEntry,
        release: &Release,
    ) -> ProvisionResult<Vec<FileGroup>> {
        let url = self.release_url(product, release);
        let response: ReleaseDetailResponse = self.get_json(&url, true).await?;

        Ok(response
            .file_groups
            .into_iter()
            .map(|group| FileGroup {
                name: group.name,
                files: group
                    .product_files
                    .into_iter()
                    .map(|file| ProductFile {
                        name: file.name,
                        object_key: file.aws_object_key,
                        download_url: file.links.download.href,
                    })
                    .collect(),
            })
            .collect())
    }

    async fn accept_eula(&self, product: &ReleaseCatalogEntry, release: &Release) -> ProvisionResult<()> {
        let url = format!("{}/eula_acceptance", self.release_url(product, release));

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .send()
            .await
            .map_err(|e| ProvisionError::catalog_unavailable(format!("EULA请求失败: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::catalog_unavailable(format!(
                "EULA接受失败: HTTP {status} - {body}"
            )));
        }

        info!("已接受 {} {} 的EULA", product.slug, release.version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> HttpCatalogClient {
        let config = CatalogConfig {
            base_url: server.base_url(),
            api_key: SecretString::new("test-token".to_string().into_boxed_str()),
            ..CatalogConfig::default()
        };
        HttpCatalogClient::new(&config).unwrap()
    }

    fn gpdb_product(server: &MockServer) -> ReleaseCatalogEntry {
        ReleaseCatalogEntry {
            product_id: 42,
            slug: "pivotal-gpdb".to_string(),
            releases_url: server.url("/api/v2/products/pivotal-gpdb/releases"),
        }
    }

    #[tokio::test]
    async fn test_list_products() {
        let server = MockServer::start_async().await;
        let releases_href = server.url("/api/v2/products/pivotal-gpdb/releases");
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/products");
                then.status(200).json_body(json!({
                    "products": [
                        {"id": 42, "slug": "pivotal-gpdb", "_links": {"releases": {"href": releases_href}}},
                        {"id": 43, "slug": "pivotal-hdb", "_links": {"releases": {"href": "http://x/releases"}}}
                    ]
                }));
            })
            .await;

        let products = client_for(&server).list_products().await.unwrap();

        mock.assert_async().await;
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].product_id, 42);
        assert_eq!(products[0].slug, "pivotal-gpdb");
        assert!(products[0].releases_url.ends_with("/api/v2/products/pivotal-gpdb/releases"));
    }

    #[tokio::test]
    async fn test_list_releases() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/products/pivotal-gpdb/releases");
                then.status(200).json_body(json!({
                    "releases": [
                        {"id": 1, "version": "4.3.7.1"},
                        {"id": 2, "version": "4.3.8.1"}
                    ]
                }));
            })
            .await;

        let releases = client_for(&server)
            .list_releases(&gpdb_product(&server))
            .await
            .unwrap();

        assert_eq!(releases, vec![Release::new(1, "4.3.7.1"), Release::new(2, "4.3.8.1")]);
    }

    #[tokio::test]
    async fn test_release_files_sends_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v2/products/pivotal-gpdb/releases/2")
                    .header("Authorization", "Token test-token");
                then.status(200).json_body(json!({
                    "file_groups": [{
                        "name": "Database Server",
                        "product_files": [{
                            "name": "Red Hat Enterprise Linux 5, 6",
                            "aws_object_key": "product-files/gpdb/greenplum-db.zip",
                            "_links": {"download": {"href": "https://x/product_files/7/download"}}
                        }]
                    }]
                }));
            })
            .await;

        let groups = client_for(&server)
            .release_files(&gpdb_product(&server), &Release::new(2, "4.3.8.1"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "Database Server");
        assert_eq!(groups[0].files[0].canonical_name(), Some("greenplum-db.zip"));
        assert_eq!(groups[0].files[0].download_url, "https://x/product_files/7/download");
    }

    #[tokio::test]
    async fn test_accept_eula_posts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v2/products/pivotal-gpdb/releases/2/eula_acceptance")
                    .header("Authorization", "Token test-token");
                then.status(200).json_body(json!({"accepted_at": "2016-01-01"}));
            })
            .await;

        client_for(&server)
            .accept_eula(&gpdb_product(&server), &Release::new(2, "4.3.8.1"))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_is_catalog_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/products");
                then.status(503);
            })
            .await;

        let result = client_for(&server).list_products().await;
        assert!(matches!(result, Err(ProvisionError::CatalogUnavailable(_))));
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_catalog_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/products");
                then.status(200).json_body(json!({"items": []}));
            })
            .await;

        let result = client_for(&server).list_products().await;
        assert!(matches!(result, Err(ProvisionError::CatalogUnavailable(_))));
    }
}
