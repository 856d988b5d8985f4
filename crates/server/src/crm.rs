//! HTTP client for the CRM lookup API. One endpoint: resolve a customer by
//! email or id into the summary the engine composes replies from.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};

use palaver_core::collab::{CrmConnector, CrmError};
use palaver_core::config::CrmConfig;
use palaver_core::domain::customer::{CustomerIdentifier, CustomerSummary};

pub struct HttpCrmConnector {
    client: Client,
    base_url: String,
    api_token: Option<SecretString>,
}

impl HttpCrmConnector {
    pub fn from_config(config: &CrmConfig) -> Result<Self, String> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| "crm.base_url is required".to_string())?;

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|error| error.to_string())?;

        Ok(Self { client, base_url, api_token: config.api_token.clone() })
    }
}

#[async_trait]
impl CrmConnector for HttpCrmConnector {
    async fn fetch_customer(
        &self,
        identifier: &CustomerIdentifier,
    ) -> Result<Option<CustomerSummary>, CrmError> {
        let (param, value) = match identifier {
            CustomerIdentifier::Email(email) => ("email", email.as_str()),
            CustomerIdentifier::CustomerId(id) => ("customer_id", id.as_str()),
        };

        let mut request = self
            .client
            .get(format!("{}/api/customers/summary", self.base_url))
            .query(&[(param, value)]);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| CrmError::Request(error.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let summary: CustomerSummary = response
                    .json()
                    .await
                    .map_err(|error| CrmError::Payload(error.to_string()))?;
                Ok(Some(summary))
            }
            status => Err(CrmError::Request(format!("crm responded with status {status}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use palaver_core::config::CrmConfig;

    use super::HttpCrmConnector;

    #[test]
    fn connector_requires_a_base_url() {
        let config = CrmConfig { enabled: true, base_url: None, api_token: None };
        assert!(HttpCrmConnector::from_config(&config).is_err());
    }

    #[test]
    fn trailing_slash_is_normalized_away() {
        let config = CrmConfig {
            enabled: true,
            base_url: Some("https://crm.example.com/".to_string()),
            api_token: None,
        };
        let connector = HttpCrmConnector::from_config(&config).expect("connector");
        assert_eq!(connector.base_url, "https://crm.example.com");
    }
}
