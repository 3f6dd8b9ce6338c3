use crate::error::QueryError;
use crate::state::{
    Binding, Direction, JoinType, Operation, OrderSpec, Predicate, QueryState, Scalar, SelectColumn, TrashMode,
    validate_identifier,
};

/// A compiled statement ready to hand to an executor: the SQL text plus
/// its bindings in the order the dialect's placeholders expect.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub sql: String,
    pub bindings: Vec<Binding>,
}

/// Dialect-specific compiler translating a [`QueryState`] into SQL text.
/// Identifier quoting, placeholder style, the random-ordering function,
/// and the upsert clause are all dialect-defined; everything else
/// (clause order, predicate structure) is shared in the default method
/// bodies below so each dialect only overrides what actually differs.
pub trait Grammar: Send + Sync {
    fn dialect_name(&self) -> &'static str;
    fn quote_identifier(&self, ident: &str) -> String;
    fn placeholder(&self, index: usize) -> String;
    fn random_function(&self) -> &'static str;

    /// `ON DUPLICATE KEY UPDATE col = VALUES(col), ...` (MySQL) vs
    /// `ON CONFLICT (...) DO UPDATE SET col = EXCLUDED.col, ...`
    /// (Postgres/SQLite).
    fn upsert_clause(&self, conflict_columns: &[String], update_columns: &[String]) -> String;

    /// SQLite has no server-level database to create/drop/switch; only
    /// MySQL and Postgres support the database-level schema ops.
    fn supports_database_ddl(&self) -> bool {
        true
    }

    fn table_exists_query(&self) -> &'static str {
        "SELECT 1 FROM information_schema.tables WHERE table_name = ?"
    }

    fn database_exists_query(&self) -> &'static str {
        "SELECT 1 FROM information_schema.schemata WHERE schema_name = ?"
    }

    fn create_database(&self, name: &str) -> Result<Compiled, QueryError> {
        validate_identifier(name, "database")?;
        if !self.supports_database_ddl() {
            return Err(QueryError::UnsupportedDialectFeature { feature: "CREATE DATABASE", dialect: self.dialect_name() });
        }
        Ok(Compiled { sql: format!("CREATE DATABASE IF NOT EXISTS {}", self.quote_identifier(name)), bindings: vec![] })
    }

    fn drop_database(&self, name: &str) -> Result<Compiled, QueryError> {
        validate_identifier(name, "database")?;
        if !self.supports_database_ddl() {
            return Err(QueryError::UnsupportedDialectFeature { feature: "DROP DATABASE", dialect: self.dialect_name() });
        }
        Ok(Compiled { sql: format!("DROP DATABASE IF EXISTS {}", self.quote_identifier(name)), bindings: vec![] })
    }

    fn use_database(&self, name: &str) -> Result<Compiled, QueryError> {
        validate_identifier(name, "database")?;
        if !self.supports_database_ddl() {
            return Err(QueryError::UnsupportedDialectFeature { feature: "USE DATABASE", dialect: self.dialect_name() });
        }
        Ok(Compiled { sql: format!("USE {}", self.quote_identifier(name)), bindings: vec![] })
    }

    fn rename_table(&self, from: &str, to: &str) -> Result<Compiled, QueryError> {
        validate_identifier(from, "table")?;
        validate_identifier(to, "table")?;
        Ok(Compiled {
            sql: format!("ALTER TABLE {} RENAME TO {}", self.quote_identifier(from), self.quote_identifier(to)),
            bindings: vec![],
        })
    }

    fn drop_table(&self, table: &str) -> Result<Compiled, QueryError> {
        validate_identifier(table, "table")?;
        Ok(Compiled { sql: format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table)), bindings: vec![] })
    }

    fn table_exists(&self, table: &str) -> Result<Compiled, QueryError> {
        validate_identifier(table, "table")?;
        Ok(Compiled {
            sql: self.table_exists_query().to_string(),
            bindings: vec![Binding { key: "table".to_string(), value: Scalar::Str(table.to_string()) }],
        })
    }

    fn database_exists(&self, name: &str) -> Result<Compiled, QueryError> {
        validate_identifier(name, "database")?;
        if !self.supports_database_ddl() {
            return Err(QueryError::UnsupportedDialectFeature { feature: "database_exists", dialect: self.dialect_name() });
        }
        Ok(Compiled {
            sql: self.database_exists_query().to_string(),
            bindings: vec![Binding { key: "database".to_string(), value: Scalar::Str(name.to_string()) }],
        })
    }

    fn compile_select(&self, state: &QueryState) -> Result<Compiled, QueryError> {
        let table = state.from.as_deref().ok_or(QueryError::MissingFrom)?;
        validate_identifier(table, "table")?;

        let mut sql = String::from("SELECT ");
        if state.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&self.compile_columns(state)?);
        sql.push_str(" FROM ");
        sql.push_str(&self.quote_identifier(table));

        for join in &state.joins {
            sql.push(' ');
            sql.push_str(&self.compile_join(join)?);
        }

        let mut bindings = Vec::new();
        let mut idx = 1usize;
        self.append_where(state, &mut sql, &mut bindings, &mut idx)?;

        if !state.groups.is_empty() {
            for g in &state.groups {
                validate_identifier(g, "column")?;
            }
            sql.push_str(" GROUP BY ");
            sql.push_str(
                &state.groups.iter().map(|c| self.quote_identifier(c)).collect::<Vec<_>>().join(", "),
            );
        }

        if !state.havings.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&self.compile_predicates(&state.havings, &mut bindings, &mut idx)?);
        }

        if !state.orders.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.compile_orders(state)?);
        }

        if let Some(limit) = state.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = state.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Ok(Compiled { sql, bindings })
    }

    fn compile_insert(&self, state: &QueryState) -> Result<Compiled, QueryError> {
        let table = state.from.as_deref().ok_or(QueryError::MissingFrom)?;
        validate_identifier(table, "table")?;
        let values = state.values.as_ref().filter(|v| !v.is_empty()).ok_or(QueryError::NoColumnsToInsert)?;

        let mut bindings = Vec::new();
        let mut columns = Vec::new();
        let mut placeholders = Vec::new();
        let mut idx = 1usize;
        for (col, val) in values {
            validate_identifier(col, "column")?;
            columns.push(self.quote_identifier(col));
            placeholders.push(self.placeholder(idx));
            idx += 1;
            bindings.push(Binding { key: format!("{col}_insert"), value: val.clone() });
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_identifier(table),
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok(Compiled { sql, bindings })
    }

    fn compile_update(&self, state: &QueryState) -> Result<Compiled, QueryError> {
        let table = state.from.as_deref().ok_or(QueryError::MissingFrom)?;
        validate_identifier(table, "table")?;
        let values = state.values.as_ref().filter(|v| !v.is_empty()).ok_or(QueryError::NoValuesToUpdate)?;

        let mut bindings = Vec::new();
        let mut assignments = Vec::new();
        let mut idx = 1usize;
        for (col, val) in values {
            validate_identifier(col, "column")?;
            assignments.push(format!("{} = {}", self.quote_identifier(col), self.placeholder(idx)));
            idx += 1;
            bindings.push(Binding { key: format!("{col}_update"), value: val.clone() });
        }

        let mut sql = format!("UPDATE {} SET {}", self.quote_identifier(table), assignments.join(", "));
        self.append_where(state, &mut sql, &mut bindings, &mut idx)?;
        Ok(Compiled { sql, bindings })
    }

    fn compile_delete(&self, state: &QueryState) -> Result<Compiled, QueryError> {
        let table = state.from.as_deref().ok_or(QueryError::MissingFrom)?;
        validate_identifier(table, "table")?;
        let mut sql = format!("DELETE FROM {}", self.quote_identifier(table));
        let mut bindings = Vec::new();
        let mut idx = 1usize;
        self.append_where(state, &mut sql, &mut bindings, &mut idx)?;
        Ok(Compiled { sql, bindings })
    }

    fn compile_columns(&self, state: &QueryState) -> Result<String, QueryError> {
        if state.columns.is_empty() {
            return Ok("*".to_string());
        }
        let mut parts = Vec::with_capacity(state.columns.len());
        for col in &state.columns {
            match col {
                SelectColumn::Column(c) => {
                    if c == "*" {
                        parts.push("*".to_string());
                    } else {
                        validate_identifier(c, "column")?;
                        parts.push(self.quote_identifier(c));
                    }
                }
                SelectColumn::Raw(expr) => parts.push(expr.as_str().to_string()),
            }
        }
        Ok(parts.join(", "))
    }

    fn compile_join(&self, join: &crate::state::JoinClause) -> Result<String, QueryError> {
        validate_identifier(&join.table, "table")?;
        let kind = match join.join_type {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::FullOuter => "FULL OUTER JOIN",
            JoinType::Cross => "CROSS JOIN",
            JoinType::Natural => "NATURAL JOIN",
        };
        let table_sql = match &join.alias {
            Some(alias) => {
                validate_identifier(alias, "alias")?;
                format!("{} AS {}", self.quote_identifier(&join.table), self.quote_identifier(alias))
            }
            None => self.quote_identifier(&join.table),
        };

        if join.conditions.is_empty() || matches!(join.join_type, JoinType::Cross | JoinType::Natural) {
            return Ok(format!("{kind} {table_sql}"));
        }

        let mut on = String::new();
        for (i, cond) in join.conditions.iter().enumerate() {
            validate_identifier(&cond.left, "column")?;
            validate_identifier(&cond.right, "column")?;
            if i > 0 {
                on.push_str(match cond.boolean {
                    crate::state::Boolean::And => " AND ",
                    crate::state::Boolean::Or => " OR ",
                });
            }
            on.push_str(&format!(
                "{} {} {}",
                self.quote_identifier(&cond.left),
                cond.operator.as_sql(),
                self.quote_identifier(&cond.right)
            ));
        }
        Ok(format!("{kind} {table_sql} ON {on}"))
    }

    fn append_where(
        &self,
        state: &QueryState,
        sql: &mut String,
        bindings: &mut Vec<Binding>,
        idx: &mut usize,
    ) -> Result<(), QueryError> {
        let mut conditions = state.conditions.clone();
        if state.soft_delete.enabled {
            if let Some(p) = self.soft_delete_predicate(state) {
                conditions.push(p);
            }
        }
        if conditions.is_empty() {
            return Ok(());
        }
        sql.push_str(" WHERE ");
        sql.push_str(&self.compile_predicates(&conditions, bindings, idx)?);
        Ok(())
    }

    fn soft_delete_predicate(&self, state: &QueryState) -> Option<Predicate> {
        match state.soft_delete.mode {
            TrashMode::Exclude => Some(Predicate::Null {
                column: state.soft_delete.column.clone(),
                negate: false,
                boolean: crate::state::Boolean::And,
            }),
            TrashMode::WithTrashed => None,
            TrashMode::OnlyTrashed => Some(Predicate::Null {
                column: state.soft_delete.column.clone(),
                negate: true,
                boolean: crate::state::Boolean::And,
            }),
        }
    }

    fn compile_predicates(
        &self,
        predicates: &[Predicate],
        bindings: &mut Vec<Binding>,
        idx: &mut usize,
    ) -> Result<String, QueryError> {
        let mut sql = String::new();
        for (i, pred) in predicates.iter().enumerate() {
            if i > 0 {
                sql.push_str(match pred.boolean() {
                    crate::state::Boolean::And => " AND ",
                    crate::state::Boolean::Or => " OR ",
                });
            }
            sql.push_str(&self.compile_predicate(pred, bindings, idx)?);
        }
        Ok(sql)
    }

    fn compile_predicate(
        &self,
        pred: &Predicate,
        bindings: &mut Vec<Binding>,
        idx: &mut usize,
    ) -> Result<String, QueryError> {
        match pred {
            Predicate::Comparison { column, operator, value, .. } => {
                validate_identifier(column, "column")?;
                let placeholder = self.placeholder(*idx);
                *idx += 1;
                bindings.push(value.clone());
                Ok(format!("{} {} {}", self.quote_identifier(column), operator.as_sql(), placeholder))
            }
            Predicate::ColumnComparison { left, operator, right, .. } => {
                validate_identifier(left, "column")?;
                validate_identifier(right, "column")?;
                Ok(format!(
                    "{} {} {}",
                    self.quote_identifier(left),
                    operator.as_sql(),
                    self.quote_identifier(right)
                ))
            }
            Predicate::In { column, values, negate, .. } => {
                validate_identifier(column, "column")?;
                if values.is_empty() {
                    return Err(QueryError::EmptyWhereIn { column: column.clone() });
                }
                let mut placeholders = Vec::with_capacity(values.len());
                for v in values {
                    placeholders.push(self.placeholder(*idx));
                    *idx += 1;
                    bindings.push(v.clone());
                }
                let op = if *negate { "NOT IN" } else { "IN" };
                Ok(format!("{} {} ({})", self.quote_identifier(column), op, placeholders.join(", ")))
            }
            Predicate::Null { column, negate, .. } => {
                validate_identifier(column, "column")?;
                let op = if *negate { "IS NOT NULL" } else { "IS NULL" };
                Ok(format!("{} {}", self.quote_identifier(column), op))
            }
            Predicate::Between { column, low, high, negate, .. } => {
                validate_identifier(column, "column")?;
                let p1 = self.placeholder(*idx);
                *idx += 1;
                bindings.push(low.clone());
                let p2 = self.placeholder(*idx);
                *idx += 1;
                bindings.push(high.clone());
                let op = if *negate { "NOT BETWEEN" } else { "BETWEEN" };
                Ok(format!("{} {} {} AND {}", self.quote_identifier(column), op, p1, p2))
            }
            Predicate::Raw { expression, bindings: raw_bindings, .. } => {
                bindings.extend(raw_bindings.clone());
                *idx += raw_bindings.len();
                Ok(expression.as_str().to_string())
            }
            Predicate::JsonContains { column, path, value, .. } => {
                validate_identifier(column, "column")?;
                let placeholder = self.placeholder(*idx);
                *idx += 1;
                bindings.push(value.clone());
                Ok(self.json_contains_sql(column, path.as_deref(), &placeholder))
            }
            Predicate::FullText { columns, query, .. } => {
                for c in columns {
                    validate_identifier(c, "column")?;
                }
                let placeholder = self.placeholder(*idx);
                *idx += 1;
                bindings.push(Binding { key: "fulltext".to_string(), value: Scalar::Str(query.clone()) });
                Ok(self.full_text_sql(columns, &placeholder))
            }
            Predicate::Today { column, .. } => {
                validate_identifier(column, "column")?;
                Ok(self.date_compare_sql(column, "= CURRENT_DATE"))
            }
            Predicate::Past { column, .. } => {
                validate_identifier(column, "column")?;
                Ok(self.date_compare_sql(column, "< CURRENT_TIMESTAMP"))
            }
            Predicate::Future { column, .. } => {
                validate_identifier(column, "column")?;
                Ok(self.date_compare_sql(column, "> CURRENT_TIMESTAMP"))
            }
        }
    }

    fn date_compare_sql(&self, column: &str, comparison: &str) -> String {
        format!("{} {}", self.quote_identifier(column), comparison)
    }

    /// Dialects disagree sharply here (`JSON_CONTAINS` vs `@>` vs
    /// `json_each`), so each one overrides this; the default covers the
    /// MySQL-style function form.
    fn json_contains_sql(&self, column: &str, path: Option<&str>, placeholder: &str) -> String {
        match path {
            Some(p) => format!("JSON_CONTAINS({}, {}, '{}')", self.quote_identifier(column), placeholder, p),
            None => format!("JSON_CONTAINS({}, {})", self.quote_identifier(column), placeholder),
        }
    }

    fn full_text_sql(&self, columns: &[String], placeholder: &str) -> String {
        let cols = columns.iter().map(|c| self.quote_identifier(c)).collect::<Vec<_>>().join(", ");
        format!("MATCH({cols}) AGAINST({placeholder})")
    }

    fn compile_orders(&self, state: &QueryState) -> Result<String, QueryError> {
        let mut parts = Vec::with_capacity(state.orders.len());
        for order in &state.orders {
            match order {
                OrderSpec::Column { column, direction } => {
                    validate_identifier(column, "column")?;
                    let dir = match direction {
                        Direction::Asc => "ASC",
                        Direction::Desc => "DESC",
                    };
                    parts.push(format!("{} {}", self.quote_identifier(column), dir));
                }
                OrderSpec::Field { column, values } => {
                    validate_identifier(column, "column")?;
                    parts.push(self.order_by_field_sql(column, values));
                }
                OrderSpec::Random => parts.push(self.random_function().to_string()),
            }
        }
        Ok(parts.join(", "))
    }

    /// `FIELD(col, v1, v2, ...)` (MySQL) vs a `CASE` expression
    /// (Postgres/SQLite, which have no `FIELD()` builtin).
    fn order_by_field_sql(&self, column: &str, values: &[Scalar]) -> String {
        let mut case = format!("CASE {}", self.quote_identifier(column));
        for (i, v) in values.iter().enumerate() {
            case.push_str(&format!(" WHEN {} THEN {}", scalar_literal(v), i));
        }
        case.push_str(" ELSE ");
        case.push_str(&values.len().to_string());
        case.push_str(" END");
        case
    }
}

/// Literal rendering used only for the small, closed set of values that
/// `ORDER BY FIELD`/`CASE` needs inline (never user-controlled free
/// text — values here come from the same typed `Scalar` binds the rest
/// of the builder uses).
fn scalar_literal(v: &Scalar) -> String {
    match v {
        Scalar::Str(s) => format!("'{}'", s.replace('\'', "''")),
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Null => "NULL".to_string(),
    }
}

pub struct MySqlGrammar;

impl Grammar for MySqlGrammar {
    fn dialect_name(&self) -> &'static str {
        "mysql"
    }
    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{ident}`")
    }
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }
    fn random_function(&self) -> &'static str {
        "RAND()"
    }
    fn upsert_clause(&self, _conflict_columns: &[String], update_columns: &[String]) -> String {
        let assignments = update_columns
            .iter()
            .map(|c| format!("{} = VALUES({})", self.quote_identifier(c), self.quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("ON DUPLICATE KEY UPDATE {assignments}")
    }
    fn table_exists_query(&self) -> &'static str {
        "SELECT 1 FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = ?"
    }
}

pub struct PostgresGrammar;

impl Grammar for PostgresGrammar {
    fn dialect_name(&self) -> &'static str {
        "postgres"
    }
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{ident}\"")
    }
    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }
    fn random_function(&self) -> &'static str {
        "RANDOM()"
    }
    fn upsert_clause(&self, conflict_columns: &[String], update_columns: &[String]) -> String {
        let conflict = conflict_columns.iter().map(|c| self.quote_identifier(c)).collect::<Vec<_>>().join(", ");
        let assignments = update_columns
            .iter()
            .map(|c| format!("{} = EXCLUDED.{}", self.quote_identifier(c), self.quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("ON CONFLICT ({conflict}) DO UPDATE SET {assignments}")
    }
    fn json_contains_sql(&self, column: &str, _path: Option<&str>, placeholder: &str) -> String {
        format!("{} @> {}", self.quote_identifier(column), placeholder)
    }
    fn full_text_sql(&self, columns: &[String], placeholder: &str) -> String {
        let cols = columns.iter().map(|c| self.quote_identifier(c)).collect::<Vec<_>>().join(" || ' ' || ");
        format!("to_tsvector({cols}) @@ plainto_tsquery({placeholder})")
    }
    fn table_exists_query(&self) -> &'static str {
        "SELECT 1 FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = $1"
    }
    fn database_exists_query(&self) -> &'static str {
        "SELECT 1 FROM pg_database WHERE datname = $1"
    }
}

pub struct SqliteGrammar;

impl Grammar for SqliteGrammar {
    fn dialect_name(&self) -> &'static str {
        "sqlite"
    }
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{ident}\"")
    }
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }
    fn random_function(&self) -> &'static str {
        "RANDOM()"
    }
    fn upsert_clause(&self, conflict_columns: &[String], update_columns: &[String]) -> String {
        let conflict = conflict_columns.iter().map(|c| self.quote_identifier(c)).collect::<Vec<_>>().join(", ");
        let assignments = update_columns
            .iter()
            .map(|c| format!("{} = EXCLUDED.{}", self.quote_identifier(c), self.quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("ON CONFLICT ({conflict}) DO UPDATE SET {assignments}")
    }
    fn json_contains_sql(&self, column: &str, path: Option<&str>, placeholder: &str) -> String {
        let path = path.unwrap_or("$");
        format!("EXISTS (SELECT 1 FROM json_each({}, '{}') WHERE value = {})", self.quote_identifier(column), path, placeholder)
    }
    fn supports_database_ddl(&self) -> bool {
        false
    }
    fn table_exists_query(&self) -> &'static str {
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?"
    }
}

pub fn grammar_for(dialect: &str) -> Option<Box<dyn Grammar>> {
    match dialect {
        "mysql" => Some(Box::new(MySqlGrammar)),
        "postgres" | "postgresql" => Some(Box::new(PostgresGrammar)),
        "sqlite" => Some(Box::new(SqliteGrammar)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Binding, Operator, Boolean};

    fn base_state() -> QueryState {
        QueryState { from: Some("users".into()), operation: Operation::Select, ..Default::default() }
    }

    #[test]
    fn mysql_uses_backtick_quoting_and_question_placeholders() {
        let mut state = base_state();
        state.conditions.push(Predicate::Comparison {
            column: "email".into(),
            operator: Operator::Eq,
            value: Binding { key: "e".into(), value: Scalar::Str("a@b.com".into()) },
            boolean: Boolean::And,
        });
        let compiled = MySqlGrammar.compile_select(&state).unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM `users` WHERE `email` = ?");
    }

    #[test]
    fn postgres_uses_numbered_placeholders() {
        let mut state = base_state();
        state.conditions.push(Predicate::Comparison {
            column: "status".into(),
            operator: Operator::Eq,
            value: Binding { key: "s".into(), value: Scalar::Str("active".into()) },
            boolean: Boolean::And,
        });
        state.conditions.push(Predicate::In {
            column: "role".into(),
            values: vec![
                Binding { key: "r1".into(), value: Scalar::Str("admin".into()) },
                Binding { key: "r2".into(), value: Scalar::Str("user".into()) },
            ],
            negate: false,
            boolean: Boolean::And,
        });
        let compiled = PostgresGrammar.compile_select(&state).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"users\" WHERE \"status\" = $1 AND \"role\" IN ($2, $3)"
        );
    }

    #[test]
    fn missing_from_is_rejected() {
        let state = QueryState::default();
        assert!(matches!(SqliteGrammar.compile_select(&state), Err(QueryError::MissingFrom)));
    }

    #[test]
    fn soft_delete_exclude_adds_is_null_predicate() {
        let mut state = base_state();
        state.soft_delete.enabled = true;
        let compiled = SqliteGrammar.compile_select(&state).unwrap();
        assert!(compiled.sql.contains("\"deleted_at\" IS NULL"));
    }

    #[test]
    fn only_trashed_negates_soft_delete_predicate() {
        let mut state = base_state();
        state.soft_delete.enabled = true;
        state.soft_delete.mode = TrashMode::OnlyTrashed;
        let compiled = SqliteGrammar.compile_select(&state).unwrap();
        assert!(compiled.sql.contains("IS NOT NULL"));
    }

    #[test]
    fn upsert_clause_differs_by_dialect() {
        let cols = vec!["name".to_string()];
        let mysql = MySqlGrammar.upsert_clause(&[], &cols);
        assert!(mysql.starts_with("ON DUPLICATE KEY UPDATE"));
        let pg = PostgresGrammar.upsert_clause(&["id".to_string()], &cols);
        assert!(pg.starts_with("ON CONFLICT"));
    }

    #[test]
    fn grammar_for_unknown_dialect_is_none() {
        assert!(grammar_for("oracle").is_none());
    }

    #[test]
    fn sqlite_rejects_database_level_ddl() {
        assert!(matches!(
            SqliteGrammar.create_database("appdb"),
            Err(QueryError::UnsupportedDialectFeature { .. })
        ));
    }

    #[test]
    fn mysql_supports_create_database() {
        let compiled = MySqlGrammar.create_database("appdb").unwrap();
        assert_eq!(compiled.sql, "CREATE DATABASE IF NOT EXISTS `appdb`");
    }

    #[test]
    fn drop_table_is_idempotent_by_construction() {
        let compiled = SqliteGrammar.drop_table("widgets").unwrap();
        assert_eq!(compiled.sql, "DROP TABLE IF EXISTS \"widgets\"");
    }

    #[test]
    fn table_exists_rejects_invalid_identifier() {
        assert!(matches!(
            SqliteGrammar.table_exists("widgets; DROP TABLE x"),
            Err(QueryError::InvalidIdentifier { .. })
        ));
    }
}
