//! SlashstepQL filter compiler.
//!
//! Compiles a client-supplied filter query such as
//! `action_id = "…" and (permission_level >= "Editor" or principal_type = "Role") limit 20`
//! into a parameterized SQL `WHERE` clause.
//!
//! Two rules keep user input out of the SQL text:
//! - keys are checked against the table's allow-list in a [`TableKeyRegistry`]
//! - values are always emitted as positional parameters (`$1`, `$2`, …)

mod lexer;
mod parser;
mod registry;

use serde::Serialize;

pub use lexer::{tokenize, ComparisonOperator, Lexeme, Token};
pub use registry::TableKeyRegistry;

pub use parser::MAXIMUM_NESTING_DEPTH;

use parser::Parser;

/// Filter compilation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlashstepQLError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("No query keys are registered for table \"{0}\"")]
    UnknownTable(String),

    #[error("Limit must be a non-negative integer, got {0}")]
    InvalidLimit(String),

    #[error("Offset must be a non-negative integer, got {0}")]
    InvalidOffset(String),

    #[error("Limit {limit} exceeds the maximum of {maximum}")]
    LimitExceedsMaximum { limit: i64, maximum: i64 },
}

/// A literal value taken from the filter query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

/// A bound parameter and the key it was compared against.
///
/// The key lets the caller pick a database type for the value (for example,
/// parsing a string into a UUID for an ID column).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterParameter {
    pub key: String,
    pub value: FilterValue,
}

/// Options for a single compile call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Limit used when the query has no `limit` token.
    pub default_limit: Option<i64>,

    /// Largest `limit` a query may request.
    pub maximum_limit: Option<i64>,

    /// Parse but drop any `limit` token (and skip the default).
    pub ignore_limit: bool,

    /// Parse but drop any `offset` token.
    pub ignore_offset: bool,
}

/// Result of compiling a filter query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    /// Clause without the leading `where`; `None` when the query had no filter.
    pub where_clause: Option<String>,

    /// Values for `$1`, `$2`, … in order.
    pub parameters: Vec<FilterParameter>,

    pub limit: Option<i64>,

    pub offset: Option<i64>,
}

impl CompiledFilter {
    /// ` where <clause>`, or an empty string.
    #[must_use]
    pub fn where_sql(&self) -> String {
        self.where_clause
            .as_ref()
            .map(|clause| format!(" where {clause}"))
            .unwrap_or_default()
    }

    /// ` limit N offset M`, with either part omitted when unset.
    #[must_use]
    pub fn pagination_sql(&self) -> String {
        let mut sql = String::new();
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" limit {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" offset {offset}"));
        }
        sql
    }
}

/// Compile `filter_query` for `table_name`.
///
/// Fails with [`SlashstepQLError::InvalidQuery`] when the input matches no
/// production and [`SlashstepQLError::InvalidKey`] when a key is not on the
/// table's allow-list.
pub fn compile(
    registry: &TableKeyRegistry,
    table_name: &str,
    filter_query: &str,
    options: &CompileOptions,
) -> Result<CompiledFilter, SlashstepQLError> {
    let allowed_keys = registry
        .allowed_keys(table_name)
        .ok_or_else(|| SlashstepQLError::UnknownTable(table_name.to_string()))?;

    let lexemes = tokenize(filter_query)?;
    let parsed = Parser::new(&lexemes, allowed_keys).parse()?;

    let limit = if options.ignore_limit {
        None
    } else {
        if let (Some(limit), Some(maximum)) = (parsed.limit, options.maximum_limit) {
            if limit > maximum {
                return Err(SlashstepQLError::LimitExceedsMaximum { limit, maximum });
            }
        }
        parsed.limit.or(options.default_limit)
    };

    let offset = if options.ignore_offset {
        None
    } else {
        parsed.offset
    };

    tracing::trace!(
        table = table_name,
        parameters = parsed.parameters.len(),
        ?limit,
        ?offset,
        "Compiled filter query"
    );

    Ok(CompiledFilter {
        where_clause: (!parsed.clause.is_empty()).then_some(parsed.clause),
        parameters: parsed.parameters,
        limit,
        offset,
    })
}

/// Quote a string as a SlashstepQL string literal.
///
/// Used when server code builds filter queries from trusted IDs.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TableKeyRegistry {
        let mut registry = TableKeyRegistry::new();
        registry.register("widgets", ["id", "name", "size", "enabled"]);
        registry.register("gadgets", ["name"]);
        registry
    }

    fn compile_widgets(query: &str) -> Result<CompiledFilter, SlashstepQLError> {
        compile(&registry(), "widgets", query, &CompileOptions::default())
    }

    #[test]
    fn test_empty_query_yields_default_limit_only() {
        let options = CompileOptions {
            default_limit: Some(1000),
            ..CompileOptions::default()
        };
        let compiled = compile(&registry(), "widgets", "", &options).expect("compile failed");

        assert_eq!(compiled.where_clause, None);
        assert!(compiled.parameters.is_empty());
        assert_eq!(compiled.limit, Some(1000));
        assert_eq!(compiled.offset, None);
        assert_eq!(compiled.where_sql(), "");
        assert_eq!(compiled.pagination_sql(), " limit 1000");
    }

    #[test]
    fn test_no_default_limit_when_unconfigured() {
        let compiled = compile_widgets("   ").expect("compile failed");
        assert_eq!(compiled.limit, None);
    }

    #[test]
    fn test_single_assignment_binds_value() {
        let compiled = compile_widgets(r#"id = "X""#).expect("compile failed");

        assert_eq!(compiled.where_clause.as_deref(), Some("id = $1"));
        assert_eq!(
            compiled.parameters,
            vec![FilterParameter {
                key: "id".into(),
                value: FilterValue::String("X".into()),
            }]
        );
    }

    #[test]
    fn test_value_text_never_appears_in_clause() {
        let queries = [
            r#"name = "robert'); drop table widgets; --""#,
            r"name ~* '^evil$'",
            "size >= 12345",
            "enabled = true",
        ];

        for query in queries {
            let compiled = compile_widgets(query).expect("compile failed");
            let clause = compiled.where_clause.expect("clause missing");
            for parameter in &compiled.parameters {
                let text = match &parameter.value {
                    FilterValue::String(value) => value.clone(),
                    FilterValue::Number(value) => value.to_string(),
                    FilterValue::Boolean(value) => value.to_string(),
                };
                assert!(
                    !clause.contains(&text),
                    "clause {clause:?} leaked value {text:?}"
                );
            }
            assert!(clause.ends_with("$1"));
        }
    }

    #[test]
    fn test_key_allow_list_is_per_table() {
        assert!(compile(&registry(), "widgets", r#"id = "X""#, &CompileOptions::default()).is_ok());
        assert_eq!(
            compile(&registry(), "gadgets", r#"id = "X""#, &CompileOptions::default()),
            Err(SlashstepQLError::InvalidKey("id".into()))
        );
    }

    #[test]
    fn test_unknown_table() {
        assert_eq!(
            compile(&registry(), "sprockets", "", &CompileOptions::default()),
            Err(SlashstepQLError::UnknownTable("sprockets".into()))
        );
    }

    #[test]
    fn test_bare_literal_is_invalid() {
        for query in [r#""1""#, "1", "true", "'abc'"] {
            assert!(
                matches!(compile_widgets(query), Err(SlashstepQLError::InvalidQuery(_))),
                "{query} should be rejected"
            );
        }
    }

    #[test]
    fn test_malformed_syntax_is_invalid() {
        let queries = [
            "name",
            "name =",
            "name = name",
            r#"name "x""#,
            r#"name = "a" and"#,
            r#"name = "a" name = "b""#,
            r#"and name = "a""#,
            "()",
            "limit",
        ];

        for query in queries {
            assert!(
                matches!(compile_widgets(query), Err(SlashstepQLError::InvalidQuery(_))),
                "{query} should be rejected"
            );
        }
    }

    #[test]
    fn test_unbalanced_parentheses_are_invalid() {
        for query in [r#"(name = "a""#, r#"name = "a")"#, r#"((name = "a")"#] {
            assert!(
                matches!(compile_widgets(query), Err(SlashstepQLError::InvalidQuery(_))),
                "{query} should be rejected"
            );
        }
    }

    #[test]
    fn test_nesting_up_to_maximum_depth_compiles() {
        let depth = MAXIMUM_NESTING_DEPTH;
        let query = format!(r#"{}name = "a"{}"#, "(".repeat(depth), ")".repeat(depth));

        let compiled = compile_widgets(&query).expect("compile failed");
        assert_eq!(
            compiled.where_clause,
            Some(format!("{}name = $1{}", "(".repeat(depth), ")".repeat(depth)))
        );
    }

    #[test]
    fn test_pathological_nesting_is_invalid() {
        for depth in [MAXIMUM_NESTING_DEPTH + 1, 20_000] {
            let query = format!(r#"{}name = "a"{}"#, "(".repeat(depth), ")".repeat(depth));
            assert!(
                matches!(compile_widgets(&query), Err(SlashstepQLError::InvalidQuery(_))),
                "depth {depth} should be rejected"
            );
        }

        let unclosed = "(".repeat(200_000);
        assert!(matches!(
            compile_widgets(&unclosed),
            Err(SlashstepQLError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_connectives_are_flattened_in_order() {
        let compiled = compile_widgets(
            r#"NOT name = "a" Or (size > 3 AND not enabled = false) and id ~ "^x""#,
        )
        .expect("compile failed");

        assert_eq!(
            compiled.where_clause.as_deref(),
            Some("not name = $1 or (size > $2 and not enabled = $3) and id ~ $4")
        );
        assert_eq!(compiled.parameters.len(), 4);
        assert_eq!(compiled.parameters[1].value, FilterValue::Number(3.0));
        assert_eq!(compiled.parameters[2].value, FilterValue::Boolean(false));
    }

    #[test]
    fn test_all_operators_are_emitted() {
        for operator in ["=", ">", "<", ">=", "<=", "~", "~*", "!~", "!~*"] {
            let compiled =
                compile_widgets(&format!("name {operator} 'a'")).expect("compile failed");
            assert_eq!(
                compiled.where_clause,
                Some(format!("name {operator} $1"))
            );
        }
    }

    #[test]
    fn test_limit_and_offset() {
        let options = CompileOptions {
            default_limit: Some(1000),
            ..CompileOptions::default()
        };
        let compiled = compile(
            &registry(),
            "widgets",
            r#"name = "a" limit 25 offset 50"#,
            &options,
        )
        .expect("compile failed");

        assert_eq!(compiled.limit, Some(25));
        assert_eq!(compiled.offset, Some(50));
        assert_eq!(compiled.pagination_sql(), " limit 25 offset 50");

        let compiled = compile(&registry(), "widgets", "offset 5 limit 0", &options)
            .expect("compile failed");
        assert_eq!(compiled.where_clause, None);
        assert_eq!(compiled.limit, Some(0));
        assert_eq!(compiled.offset, Some(5));
    }

    #[test]
    fn test_limit_rejects_negative_and_fractional() {
        assert_eq!(
            compile_widgets("limit -1"),
            Err(SlashstepQLError::InvalidLimit("-1".into()))
        );
        assert_eq!(
            compile_widgets("limit 2.5"),
            Err(SlashstepQLError::InvalidLimit("2.5".into()))
        );
        assert!(matches!(
            compile_widgets("limit '10'"),
            Err(SlashstepQLError::InvalidLimit(_))
        ));
        assert_eq!(
            compile_widgets("offset -3"),
            Err(SlashstepQLError::InvalidOffset("-3".into()))
        );
        assert_eq!(
            compile_widgets("offset 0.5"),
            Err(SlashstepQLError::InvalidOffset("0.5".into()))
        );
    }

    #[test]
    fn test_maximum_limit_is_enforced() {
        let options = CompileOptions {
            default_limit: Some(10),
            maximum_limit: Some(100),
            ..CompileOptions::default()
        };

        assert_eq!(
            compile(&registry(), "widgets", "limit 101", &options),
            Err(SlashstepQLError::LimitExceedsMaximum {
                limit: 101,
                maximum: 100
            })
        );

        let compiled =
            compile(&registry(), "widgets", "limit 100", &options).expect("compile failed");
        assert_eq!(compiled.limit, Some(100));
    }

    #[test]
    fn test_ignored_limit_and_offset_are_dropped() {
        let options = CompileOptions {
            default_limit: Some(10),
            maximum_limit: Some(5),
            ignore_limit: true,
            ignore_offset: true,
        };
        let compiled = compile(
            &registry(),
            "widgets",
            r#"name = "a" limit 50 offset 20"#,
            &options,
        )
        .expect("compile failed");

        assert_eq!(compiled.where_clause.as_deref(), Some("name = $1"));
        assert_eq!(compiled.limit, None);
        assert_eq!(compiled.offset, None);
        assert_eq!(compiled.pagination_sql(), "");
    }

    #[test]
    fn test_quote_round_trips_through_lexer() {
        let raw = r#"he said "hi" \ bye"#;
        let compiled = compile_widgets(&format!("name = {}", quote(raw))).expect("compile failed");
        assert_eq!(
            compiled.parameters[0].value,
            FilterValue::String(raw.to_string())
        );
    }
}
