//! 模板仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::TemplateRepositoryTrait;
use crate::error::{Result, ServiceError};
use crate::models::{CreateTemplateRequest, Template};

const TEMPLATE_COLUMNS: &str = "id, name, type, subject, content, created_at, updated_at";

/// 模板仓储
///
/// (name, type) 唯一约束由数据库保证，冲突映射为 Conflict
pub struct TemplateRepository {
    pool: PgPool,
}

impl TemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn duplicate_detail(name: &str, template_type: &str) -> String {
    format!("name={}, type={}", name, template_type)
}

#[async_trait]
impl TemplateRepositoryTrait for TemplateRepository {
    async fn list(&self) -> Result<Vec<Template>> {
        let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates ORDER BY name, type");

        let templates = sqlx::query_as::<_, Template>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(templates)
    }

    async fn get(&self, id: i64) -> Result<Option<Template>> {
        let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = $1");

        let template = sqlx::query_as::<_, Template>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(template)
    }

    async fn find_by_name(&self, name: &str, template_type: &str) -> Result<Option<Template>> {
        let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE name = $1 AND type = $2");

        let template = sqlx::query_as::<_, Template>(&sql)
            .bind(name)
            .bind(template_type)
            .fetch_optional(&self.pool)
            .await?;

        Ok(template)
    }

    async fn create(&self, request: &CreateTemplateRequest) -> Result<Template> {
        let sql = format!(
            r#"
            INSERT INTO templates (name, type, subject, content)
            VALUES ($1, $2, $3, $4)
            RETURNING {TEMPLATE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Template>(&sql)
            .bind(&request.name)
            .bind(&request.template_type)
            .bind(&request.subject)
            .bind(&request.content)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                ServiceError::from_insert(
                    e,
                    "Template",
                    duplicate_detail(&request.name, &request.template_type),
                )
            })
    }

    async fn update(&self, template: &Template) -> Result<Option<Template>> {
        let sql = format!(
            r#"
            UPDATE templates
            SET name = $2, type = $3, subject = $4, content = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {TEMPLATE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Template>(&sql)
            .bind(template.id)
            .bind(&template.name)
            .bind(&template.template_type)
            .bind(&template.subject)
            .bind(&template.content)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                ServiceError::from_insert(
                    e,
                    "Template",
                    duplicate_detail(&template.name, &template.template_type),
                )
            })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
