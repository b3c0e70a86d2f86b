use std::sync::Arc;

use sitesnap_core::models::{NewSite, Site};
use sitesnap_core::AppError;
use sitesnap_db::SiteStore;
use uuid::Uuid;
use validator::Validate;

/// Case-insensitive substring match over name, address, project code and status.
///
/// A blank query matches every site.
pub fn search_sites(sites: &[Site], query: &str) -> Vec<Site> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return sites.to_vec();
    }

    let contains = |field: Option<&str>| {
        field
            .map(|value| value.to_lowercase().contains(&needle))
            .unwrap_or(false)
    };

    sites
        .iter()
        .filter(|site| {
            contains(Some(&site.name))
                || contains(site.address.as_deref())
                || contains(site.project_code.as_deref())
                || contains(Some(site.status.as_str()))
        })
        .cloned()
        .collect()
}

#[derive(Clone)]
pub struct SiteDirectory {
    sites: Arc<dyn SiteStore>,
}

impl SiteDirectory {
    pub fn new(sites: Arc<dyn SiteStore>) -> Self {
        Self { sites }
    }

    pub async fn list_sites(&self) -> Result<Vec<Site>, AppError> {
        Ok(self.sites.list_sites().await?)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Site>, AppError> {
        let sites = self.list_sites().await?;
        Ok(search_sites(&sites, query))
    }

    pub async fn add_site(&self, site: NewSite) -> Result<Site, AppError> {
        let site = NewSite {
            name: site.name.trim().to_string(),
            address: site.address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
            project_code: site
                .project_code
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            ..site
        };
        if site.name.is_empty() {
            return Err(AppError::InvalidInput("Site name is required".to_string()));
        }
        site.validate()?;

        let created = self.sites.add_site(&site).await?;
        tracing::info!(site_id = %created.id, name = %created.name, "Site created");
        Ok(created)
    }

    pub async fn get_site(&self, id: Uuid) -> Result<Site, AppError> {
        self.sites
            .get_site(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("site {}", id)))
    }
}
