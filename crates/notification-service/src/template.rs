//! 通知模板引擎
//!
//! 提供模板变量替换功能，支持 `{{variable}}` 语法，变量两侧允许空白，
//! 并接受可选的前导 `.`（`{{.username}}` 与 `{{username}}` 等价）。
//! 数据中找不到原名时再按 snake_case 查找，`{{.MovieTitle}}` 取 `movie_title` 的值。
//!
//! 渲染是严格的：模板中出现的变量必须全部在数据中提供，否则返回渲染错误，
//! 不会输出留空或保留原样的内容。
//!
//! ## 使用示例
//!
//! ```ignore
//! let engine = TemplateEngine::new();
//!
//! let mut data = TemplateData::new();
//! data.insert("username".to_string(), "alice".to_string());
//! data.insert("movie_title".to_string(), "Dune".to_string());
//!
//! let rendered = engine.render("Hi {{username}}, watch {{ movie_title }}", &data)?;
//! // 输出: "Hi alice, watch Dune"
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::{Result, ServiceError};
use crate::models::Template;

/// 模板变量数据
pub type TemplateData = HashMap<String, String>;

// 匹配 {{ name }} / {{.name}}，变量名支持字母、数字、下划线
static VARIABLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\.?(\w+)\s*\}\}").expect("variable regex is valid")
});

/// 渲染结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// 模板引擎
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    /// 渲染单个模板字符串
    pub fn render(&self, template: &str, data: &TemplateData) -> Result<String> {
        let missing = self.missing_variables(template, data);
        if !missing.is_empty() {
            return Err(ServiceError::Render(format!(
                "缺少模板变量: {}",
                missing.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }

        let rendered = VARIABLE_REGEX.replace_all(template, |caps: &Captures| {
            // 缺失变量已在上面检查过
            lookup(data, &caps[1]).cloned().unwrap_or_default()
        });

        Ok(rendered.into_owned())
    }

    /// 渲染模板的主题和正文
    ///
    /// 渲染基于调用时的模板快照，之后对模板的修改不影响本次结果
    pub fn render_template(&self, template: &Template, data: &TemplateData) -> Result<RenderedMessage> {
        let subject = self
            .render(&template.subject, data)
            .map_err(|e| with_context(&template.name, "主题", e))?;
        let body = self
            .render(&template.content, data)
            .map_err(|e| with_context(&template.name, "正文", e))?;

        Ok(RenderedMessage { subject, body })
    }

    /// 提取模板中的所有变量名（去重、排序）
    pub fn extract_variables(&self, template: &str) -> BTreeSet<String> {
        VARIABLE_REGEX
            .captures_iter(template)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// 数据中缺失的变量
    pub fn missing_variables(&self, template: &str, data: &TemplateData) -> BTreeSet<String> {
        self.extract_variables(template)
            .into_iter()
            .filter(|name| lookup(data, name).is_none())
            .collect()
    }
}

fn lookup<'a>(data: &'a TemplateData, name: &str) -> Option<&'a String> {
    data.get(name).or_else(|| data.get(&to_snake_case(name)))
}

/// `MovieTitle` -> `movie_title`，`userID` -> `user_id`
fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// 给渲染错误加上模板名和部位，不重复外层前缀
fn with_context(template_name: &str, part: &str, err: ServiceError) -> ServiceError {
    match err {
        ServiceError::Render(msg) => {
            ServiceError::Render(format!("模板 {} {}渲染失败: {}", template_name, part, msg))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn data(pairs: &[(&str, &str)]) -> TemplateData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_variables() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render(
                "Hi {{username}}, we have a new movie recommendation for you: {{movie_title}}",
                &data(&[("username", "alice"), ("movie_title", "Dune")]),
            )
            .unwrap();
        assert_eq!(
            rendered,
            "Hi alice, we have a new movie recommendation for you: Dune"
        );
    }

    #[test]
    fn test_render_tolerates_whitespace_and_leading_dot() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render("{{ username }} / {{.username}}", &data(&[("username", "bob")]))
            .unwrap();
        assert_eq!(rendered, "bob / bob");
    }

    #[test]
    fn test_missing_variable_is_render_error() {
        let engine = TemplateEngine::new();
        let err = engine
            .render("Hi {{username}}, {{count}} movies", &data(&[("username", "a")]))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Render(ref msg) if msg.contains("count")));
    }

    #[test]
    fn test_values_are_not_re_expanded() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render("{{a}}", &data(&[("a", "{{b}}")]))
            .unwrap();
        assert_eq!(rendered, "{{b}}");
    }

    #[test]
    fn test_plain_text_passes_through() {
        let engine = TemplateEngine::new();
        assert_eq!(engine.render("no vars", &TemplateData::new()).unwrap(), "no vars");
    }

    #[test]
    fn test_extract_variables() {
        let engine = TemplateEngine::new();
        let vars = engine.extract_variables("{{b}} {{a}} {{ b }}");
        assert_eq!(vars.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_render_template_subject_and_body() {
        let template = Template {
            id: 1,
            name: "watchlist_reminder".to_string(),
            template_type: "email".to_string(),
            subject: "Movies in Your Watchlist".to_string(),
            content: "Hi {{username}}, you have {{count}} movies in your watchlist.".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let rendered = TemplateEngine::new()
            .render_template(&template, &data(&[("username", "carol"), ("count", "4")]))
            .unwrap();

        assert_eq!(rendered.subject, "Movies in Your Watchlist");
        assert_eq!(rendered.body, "Hi carol, you have 4 movies in your watchlist.");
    }

    #[test]
    fn test_snake_case_conversion() {
        assert_eq!(to_snake_case("Username"), "username");
        assert_eq!(to_snake_case("MovieTitle"), "movie_title");
        assert_eq!(to_snake_case("userID"), "user_id");
        assert_eq!(to_snake_case("HTMLBody"), "html_body");
        assert_eq!(to_snake_case("movie_title"), "movie_title");
    }

    #[test]
    fn test_go_style_seed_templates_render() {
        let engine = TemplateEngine::new();
        let values = data(&[
            ("username", "alice"),
            ("movie_title", "Dune"),
            ("count", "3"),
        ]);

        let cases = [
            (
                "Hi {{.Username}}, we have a new movie recommendation for you: {{.MovieTitle}}",
                "Hi alice, we have a new movie recommendation for you: Dune",
            ),
            (
                "Hi {{.Username}}, you have {{.Count}} movies in your watchlist. Why not watch one tonight?",
                "Hi alice, you have 3 movies in your watchlist. Why not watch one tonight?",
            ),
            (
                "Hi {{.Username}}, a new movie \"{{.MovieTitle}}\" has been released that you might like.",
                "Hi alice, a new movie \"Dune\" has been released that you might like.",
            ),
            (
                "Hi {{.Username}}, you recently watched \"{{.MovieTitle}}\". Would you like to rate it?",
                "Hi alice, you recently watched \"Dune\". Would you like to rate it?",
            ),
        ];
        for (template, expected) in cases {
            assert_eq!(engine.render(template, &values).unwrap(), expected);
        }
    }

    #[test]
    fn test_exact_key_wins_over_snake_case() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render(
                "{{MovieTitle}}",
                &data(&[("MovieTitle", "exact"), ("movie_title", "snake")]),
            )
            .unwrap();
        assert_eq!(rendered, "exact");
    }

    #[test]
    fn test_render_template_error_has_single_prefix() {
        let template = Template {
            id: 1,
            name: "rating_reminder".to_string(),
            template_type: "email".to_string(),
            subject: "Rate Your Watched Movies".to_string(),
            content: "Hi {{.Username}}, rate {{.MovieTitle}}".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let err = TemplateEngine::new()
            .render_template(&template, &data(&[("username", "dave")]))
            .unwrap_err();

        match err {
            ServiceError::Render(msg) => {
                assert_eq!(msg, "模板 rating_reminder 正文渲染失败: 缺少模板变量: MovieTitle");
            }
            other => panic!("expected Render, got {:?}", other),
        }
    }
}
