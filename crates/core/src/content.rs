//! Site content client
//!
//! Read-side client for the marketing site's content collections
//! (services, portfolio, published blog posts) plus the contact-form
//! submission path. All reads go through the same PostgREST-style row
//! API the event store uses.

use crate::error::SitepulseError;
use crate::store::RestStoreConfig;
use crate::Result;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d\s\-+()]{8,}$").expect("phone regex"));

/// Row in the `services` collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: String,
    pub caption: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Row in the `portfolio` collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row in the `blogs` collection; only published rows are listed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    pub status: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// A contact-form submission, validated before it leaves the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub message: String,
}

impl ContactForm {
    /// Check required fields and formats, collecting every violation
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("name is required".to_string());
        }
        if self.email.trim().is_empty() {
            errors.push("email is required".to_string());
        } else if !EMAIL_RE.is_match(self.email.trim()) {
            errors.push("email is not a valid address".to_string());
        }
        if !self.phone.trim().is_empty() && !PHONE_RE.is_match(self.phone.trim()) {
            errors.push("phone is not a valid number".to_string());
        }
        if self.message.trim().is_empty() {
            errors.push("message is required".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Client for the content collections
#[derive(Debug, Clone)]
pub struct ContentClient {
    config: RestStoreConfig,
    client: reqwest::Client,
}

impl ContentClient {
    pub fn new(config: RestStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SitepulseError::network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            collection
        )
    }

    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        collection: &str,
        order: &str,
    ) -> Result<Vec<T>> {
        self.list_filtered(collection, order, &[]).await
    }

    async fn list_filtered<T: serde::de::DeserializeOwned>(
        &self,
        collection: &str,
        order: &str,
        filters: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut request = self
            .client
            .get(self.collection_url(collection))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .query(&[("select", "*"), ("order", order)]);
        for (column, filter) in filters {
            request = request.query(&[(*column, *filter)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SitepulseError::network(format!("{} fetch failed: {}", collection, e)))?;
        if !response.status().is_success() {
            return Err(SitepulseError::store(format!(
                "{} fetch returned {}",
                collection,
                response.status()
            )));
        }

        let rows: Vec<T> = response.json().await.map_err(|e| {
            SitepulseError::store(format!("invalid {} response: {}", collection, e))
        })?;
        debug!(collection, rows = rows.len(), "fetched content rows");
        Ok(rows)
    }

    /// Services, alphabetized by caption
    pub async fn list_services(&self) -> Result<Vec<Service>> {
        self.list("services", "caption.asc").await
    }

    /// Portfolio items, newest first
    pub async fn list_portfolio(&self) -> Result<Vec<PortfolioItem>> {
        self.list("portfolio", "created_at.desc").await
    }

    /// Published blog posts, newest first
    pub async fn list_blogs(&self) -> Result<Vec<BlogPost>> {
        self.list_filtered("blogs", "published_at.desc", &[("status", "eq.published")])
            .await
    }

    /// Validate and submit a contact-form entry
    pub async fn submit_contact(&self, form: &ContactForm) -> Result<()> {
        form.validate()
            .map_err(|errors| SitepulseError::validation(errors.join("; ")))?;

        let response = self
            .client
            .post(self.collection_url("contacts"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .header("Prefer", "return=minimal")
            .json(&json!([{
                "name": form.name.trim(),
                "email": form.email.trim(),
                "phone": form.phone.trim(),
                "message": form.message.trim(),
            }]))
            .send()
            .await
            .map_err(|e| SitepulseError::network(format!("contact submission failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(SitepulseError::store(format!(
                "contact submission returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> ContactForm {
        ContactForm {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: "+1 (555) 123-4567".to_string(),
            message: "Hello".to_string(),
        }
    }

    #[test]
    fn test_valid_form_passes() {
        assert!(valid_form().validate().is_ok());
    }

    #[test]
    fn test_phone_is_optional() {
        let form = ContactForm {
            phone: String::new(),
            ..valid_form()
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_missing_required_fields_collected() {
        let form = ContactForm::default();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("name")));
        assert!(errors.iter().any(|e| e.contains("email")));
        assert!(errors.iter().any(|e| e.contains("message")));
    }

    #[test]
    fn test_bad_email_rejected() {
        for email in ["not-an-email", "a b@example.com", "a@b", "@example.com"] {
            let form = ContactForm {
                email: email.to_string(),
                ..valid_form()
            };
            assert!(form.validate().is_err(), "accepted {:?}", email);
        }
    }

    #[test]
    fn test_bad_phone_rejected() {
        for phone in ["123", "555-CALL-NOW", "12345x678"] {
            let form = ContactForm {
                phone: phone.to_string(),
                ..valid_form()
            };
            assert!(form.validate().is_err(), "accepted {:?}", phone);
        }
    }

    #[test]
    fn test_collection_urls() {
        let client = ContentClient::new(RestStoreConfig::new(
            "https://backend.example/".to_string(),
            "key".to_string(),
        ))
        .unwrap();
        assert_eq!(
            client.collection_url("services"),
            "https://backend.example/rest/v1/services"
        );
    }

    #[test]
    fn test_blog_post_deserializes_without_optional_fields() {
        let post: BlogPost = serde_json::from_str(
            r#"{"id": "b1", "title": "Launch", "status": "published"}"#,
        )
        .unwrap();
        assert_eq!(post.status, "published");
        assert!(post.published_at.is_none());
    }
}
