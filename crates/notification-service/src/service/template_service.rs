//! 模板管理服务

use std::sync::Arc;
use std::time::Duration;

use movie_shared::deadline::with_deadline;
use tracing::{info, instrument};
use validator::Validate;

use crate::error::{Result, ServiceError};
use crate::models::{CreateTemplateRequest, Template, UpdateTemplateRequest};
use crate::repository::TemplateRepositoryTrait;

use super::DEFAULT_STORE_TIMEOUT;

/// 模板服务
pub struct TemplateService<TR>
where
    TR: TemplateRepositoryTrait,
{
    repo: Arc<TR>,
    store_timeout: Duration,
}

impl<TR> TemplateService<TR>
where
    TR: TemplateRepositoryTrait,
{
    pub fn new(repo: Arc<TR>) -> Self {
        Self {
            repo,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub async fn list_templates(&self) -> Result<Vec<Template>> {
        with_deadline(self.store_timeout, "templates.list", self.repo.list()).await
    }

    pub async fn get_template(&self, id: i64) -> Result<Template> {
        with_deadline(self.store_timeout, "templates.get", self.repo.get(id))
            .await?
            .ok_or_else(|| ServiceError::not_found("Template", id))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_template(&self, request: CreateTemplateRequest) -> Result<Template> {
        request.validate()?;

        let template =
            with_deadline(self.store_timeout, "templates.create", self.repo.create(&request))
                .await?;

        info!(template_id = template.id, "Template created");
        Ok(template)
    }

    #[instrument(skip(self, request))]
    pub async fn update_template(&self, id: i64, request: UpdateTemplateRequest) -> Result<Template> {
        request.validate()?;
        let existing = self.get_template(id).await?;
        let updated = request.apply(existing);

        let saved = with_deadline(self.store_timeout, "templates.update", self.repo.update(&updated))
            .await?
            .ok_or_else(|| ServiceError::not_found("Template", id))?;

        info!(template_id = id, "Template updated");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete_template(&self, id: i64) -> Result<()> {
        let deleted =
            with_deadline(self.store_timeout, "templates.delete", self.repo.delete(id)).await?;
        if !deleted {
            return Err(ServiceError::not_found("Template", id));
        }

        info!(template_id = id, "Template deleted");
        Ok(())
    }
}
