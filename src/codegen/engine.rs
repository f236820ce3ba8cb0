//! Tera-based template engine.
//!
//! Every template is compiled into one [`Tera`] instance whose callable
//! extensions come from the active [`LanguageProfile`]:
//!
//! | function            | filter    | result                           |
//! |---------------------|-----------|----------------------------------|
//! | `mapper(name)`      | `mapper`  | type identifier for a table      |
//! | `field(name)`       | `field`   | field identifier for a column    |
//! | `type_of(column)`   |           | target type of a column          |
//! | `tag(table, column)`|           | tag/annotation string            |
//! | `snake(name)` etc.  | `snake`   | plain case conversions           |
//!
//! Templates see `tables`, `imports` and `package` in their context.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tera::{Context, Tera, Value};

use super::templates::TemplateSet;
use super::utils::{to_camel_case, to_pascal_case, to_snake_case, untitle};
use crate::config::TagConfig;
use crate::error::{error_chain, ReverseError, Result, UnitError};
use crate::lang::LanguageProfile;
use crate::schema::{Column, Index, Table};

/// Data bound to one template execution
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    pub tables: Vec<Table>,
    pub imports: BTreeSet<String>,
    pub package: String,
}

impl RenderContext {
    /// Context for `tables` with the imports the profile computes for them
    pub fn new(profile: &dyn LanguageProfile, tables: Vec<Table>, package: impl Into<String>) -> Self {
        let imports = profile.compute_imports(&tables);
        Self {
            tables,
            imports,
            package: package.into(),
        }
    }

    fn to_tera(&self) -> std::result::Result<Context, tera::Error> {
        let view = ContextView {
            tables: self.tables.iter().map(TableView::from).collect(),
            imports: self.imports.iter().map(String::as_str).collect(),
            package: &self.package,
        };
        Context::from_serialize(view)
    }
}

#[derive(Serialize)]
struct ContextView<'a> {
    tables: Vec<TableView<'a>>,
    imports: Vec<&'a str>,
    package: &'a str,
}

/// Table as templates see it. Field names line up with [`Table`]'s serde
/// form so `tag(table=...)` can read it back.
#[derive(Serialize)]
struct TableView<'a> {
    name: &'a str,
    comment: Option<&'a str>,
    columns: IndexMap<&'a str, &'a Column>,
    columns_seq: Vec<&'a str>,
    indexes: IndexMap<&'a str, &'a Index>,
    primary_keys: Vec<&'a str>,
}

impl<'a> From<&'a Table> for TableView<'a> {
    fn from(table: &'a Table) -> Self {
        Self {
            name: &table.name,
            comment: table.comment.as_deref(),
            columns: table.columns().map(|c| (c.name.as_str(), c)).collect(),
            columns_seq: table.columns_seq(),
            indexes: table.indexes().map(|i| (i.name.as_str(), i)).collect(),
            primary_keys: table.primary_keys(),
        }
    }
}

/// Compiled templates bound to one language profile
pub struct TemplateEngine {
    tera: Tera,
    names: Vec<String>,
}

impl TemplateEngine {
    /// Engine with the profile's functions registered and no templates
    pub fn new(profile: Arc<dyn LanguageProfile>, tags: Arc<TagConfig>) -> Self {
        let mut tera = Tera::default();
        // Generated code is not HTML
        tera.autoescape_on(vec![]);
        register_profile(&mut tera, profile, tags);
        Self {
            tera,
            names: Vec::new(),
        }
    }

    /// Compile every template in `templates`, failing on the first syntax error
    pub fn compile(
        profile: Arc<dyn LanguageProfile>,
        tags: Arc<TagConfig>,
        templates: &TemplateSet,
    ) -> Result<Self> {
        let mut engine = Self::new(profile, tags);
        for (name, body) in templates.iter() {
            engine.add_template(name, body)?;
        }
        Ok(engine)
    }

    pub fn add_template(&mut self, name: &str, body: &str) -> Result<()> {
        self.tera
            .add_raw_template(name, body)
            .map_err(|e| ReverseError::TemplateSyntax {
                name: name.to_string(),
                message: error_chain(&e),
            })?;
        tracing::debug!("Compiled template {}", name);
        self.names.push(name.to_string());
        Ok(())
    }

    /// Template names in compilation order
    pub fn template_names(&self) -> &[String] {
        &self.names
    }

    /// Execute one template against one context
    pub fn render(&self, name: &str, context: &RenderContext) -> std::result::Result<String, UnitError> {
        let ctx = context
            .to_tera()
            .map_err(|e| UnitError::Render(error_chain(&e)))?;
        self.tera
            .render(name, &ctx)
            .map_err(|e| UnitError::Render(error_chain(&e)))
    }
}

fn register_profile(tera: &mut Tera, profile: Arc<dyn LanguageProfile>, tags: Arc<TagConfig>) {
    {
        let profile = Arc::clone(&profile);
        tera.register_function("mapper", move |args: &HashMap<String, Value>| -> tera::Result<Value> {
            let name: String = required_arg(args, "name", "mapper")?;
            Ok(Value::String(profile.map_identifier(&name)))
        });
    }
    {
        let profile = Arc::clone(&profile);
        tera.register_function("field", move |args: &HashMap<String, Value>| -> tera::Result<Value> {
            let name: String = required_arg(args, "name", "field")?;
            Ok(Value::String(profile.map_field(&name)))
        });
    }
    {
        let profile = Arc::clone(&profile);
        tera.register_function("type_of", move |args: &HashMap<String, Value>| -> tera::Result<Value> {
            let column: Column = required_arg(args, "column", "type_of")?;
            Ok(Value::String(profile.map_type(&column)))
        });
    }
    {
        let profile = Arc::clone(&profile);
        tera.register_function("tag", move |args: &HashMap<String, Value>| -> tera::Result<Value> {
            let table: Table = required_arg(args, "table", "tag")?;
            let column: Column = required_arg(args, "column", "tag")?;
            Ok(Value::String(profile.generate_tag(&table, &column, &tags)))
        });
    }

    for (name, convert) in case_helpers() {
        tera.register_function(name, move |args: &HashMap<String, Value>| -> tera::Result<Value> {
            let value: String = required_arg(args, "name", name)?;
            Ok(Value::String(convert(&value)))
        });
        tera.register_filter(name, move |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
            Ok(Value::String(convert(string_value(value, name)?)))
        });
    }

    {
        let profile = Arc::clone(&profile);
        tera.register_filter("mapper", move |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
            Ok(Value::String(profile.map_identifier(string_value(value, "mapper")?)))
        });
    }
    tera.register_filter("lines", |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
        let lines = string_value(value, "lines")?
            .lines()
            .map(|line| Value::String(line.trim_end().to_string()))
            .collect();
        Ok(Value::Array(lines))
    });
    tera.register_filter("field", move |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
        Ok(Value::String(profile.map_field(string_value(value, "field")?)))
    });
}

fn case_helpers() -> [(&'static str, fn(&str) -> String); 4] {
    [
        ("snake", to_snake_case),
        ("camel", to_camel_case),
        ("pascal", to_pascal_case),
        ("untitle", untitle),
    ]
}

fn required_arg<T: DeserializeOwned>(
    args: &HashMap<String, Value>,
    key: &str,
    function: &str,
) -> tera::Result<T> {
    let value = args
        .get(key)
        .ok_or_else(|| tera::Error::msg(format!("{}() requires a `{}` argument", function, key)))?;
    serde_json::from_value(value.clone())
        .map_err(|e| tera::Error::msg(format!("{}(): invalid `{}` argument: {}", function, key, e)))
}

fn string_value<'v>(value: &'v Value, filter: &str) -> tera::Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| tera::Error::msg(format!("filter `{}` expects a string, got {}", filter, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::templates::{GOXORM_TEMPLATE, RUST_TEMPLATE};
    use crate::lang::format::{RustFormatter, SourceFormatter};
    use crate::lang::{CppProfile, GoProfile, RustProfile};
    use crate::schema::SqlType;

    fn users() -> Table {
        Table::new("users")
            .with_column(Column::new("id", SqlType::new("bigint")).primary_key().auto_increment())
            .with_column(Column::new("user_name", SqlType::new("varchar").with_length(64)))
            .with_column(Column::new("create_at", SqlType::new("datetime")))
    }

    fn engine_for(profile: Arc<dyn LanguageProfile>, name: &str, body: &str) -> TemplateEngine {
        let mut engine = TemplateEngine::new(profile, Arc::new(TagConfig::default()));
        engine.add_template(name, body).unwrap();
        engine
    }

    #[test]
    fn test_goxorm_renders_struct() {
        let go: Arc<dyn LanguageProfile> = Arc::new(GoProfile::new());
        let engine = engine_for(Arc::clone(&go), "goxorm", GOXORM_TEMPLATE);
        let context = RenderContext::new(go.as_ref(), vec![users()], "models");

        let text = engine.render("goxorm", &context).unwrap();
        assert!(text.starts_with("package models"));
        assert!(text.contains("\"time\""));
        assert!(text.contains("type Users struct {"));
        assert!(text.contains("UserName\tstring"));
        assert!(text.contains("CreateAt\ttime.Time"));
        assert!(text.contains("created"));

        let id = text.find("Id\t").unwrap();
        let create_at = text.find("CreateAt").unwrap();
        assert!(id < create_at);
    }

    #[test]
    fn test_filters_and_case_helpers() {
        let rust: Arc<dyn LanguageProfile> = Arc::new(RustProfile::default());
        let engine = engine_for(
            rust,
            "helpers",
            "{{ package | pascal }} {{ snake(name=\"OrderItem\") }} {{ \"type\" | field }} {{ camel(name=\"order_item\") }}",
        );
        let context = RenderContext {
            tables: Vec::new(),
            imports: BTreeSet::new(),
            package: "shop_models".to_string(),
        };
        let text = engine.render("helpers", &context).unwrap();
        assert_eq!(text, "ShopModels order_item r#type orderItem");
    }

    #[test]
    fn test_multiline_table_comment_becomes_doc_lines() {
        let rust: Arc<dyn LanguageProfile> = Arc::new(RustProfile::default());
        let engine = engine_for(Arc::clone(&rust), "rust", RUST_TEMPLATE);
        let mut table = Table::new("notes").with_column(Column::new("id", SqlType::new("int")).primary_key());
        table.comment = Some("Free-form notes\r\nkept per user".to_string());
        let context = RenderContext::new(rust.as_ref(), vec![table], "models");

        let text = engine.render("rust", &context).unwrap();
        assert!(text.contains("/// Free-form notes\n/// kept per user\n#[derive("));
        assert!(RustFormatter.format(&text).is_ok());
    }

    #[test]
    fn test_generics_are_not_escaped() {
        let rust: Arc<dyn LanguageProfile> = Arc::new(RustProfile::default());
        let engine = engine_for(
            Arc::clone(&rust),
            "types",
            "{% for t in tables %}{% for n in t.columns_seq %}{{ type_of(column=t.columns[n]) }};{% endfor %}{% endfor %}",
        );
        let table = Table::new("notes").with_column(Column::new("body", SqlType::new("text")).nullable());
        let context = RenderContext::new(rust.as_ref(), vec![table], "models");
        assert_eq!(engine.render("types", &context).unwrap(), "Option<String>;");
    }

    #[test]
    fn test_syntax_error_names_template() {
        let mut engine = TemplateEngine::new(Arc::new(CppProfile), Arc::new(TagConfig::default()));
        let err = engine.add_template("broken.h", "{% for t in %}").unwrap_err();
        match err {
            ReverseError::TemplateSyntax { name, .. } => assert_eq!(name, "broken.h"),
            other => panic!("unexpected error: {}", other),
        }
        assert!(engine.template_names().is_empty());
    }

    #[test]
    fn test_runtime_error_is_unit_scoped() {
        let cpp: Arc<dyn LanguageProfile> = Arc::new(CppProfile);
        let engine = engine_for(Arc::clone(&cpp), "bad", "{{ missing.field }}");
        let context = RenderContext::new(cpp.as_ref(), vec![users()], "models");
        assert!(matches!(engine.render("bad", &context), Err(UnitError::Render(_))));
    }

    #[test]
    fn test_tag_function_requires_arguments() {
        let go: Arc<dyn LanguageProfile> = Arc::new(GoProfile::new());
        let engine = engine_for(Arc::clone(&go), "tag", "{{ tag(table=tables.0) }}");
        let context = RenderContext::new(go.as_ref(), vec![users()], "models");
        match engine.render("tag", &context) {
            Err(UnitError::Render(message)) => assert!(message.contains("column")),
            other => panic!("expected render error, got {:?}", other),
        }
    }
}
