//! Query options and SQL composition for inventory reads.
//!
//! Callers hand in raw, possibly out-of-range options. They are normalized
//! here, and every identifier that ends up in SQL text (sort column, table,
//! direction) comes from a fixed per-source whitelist. Caller strings only
//! ever reach the database as bound parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LibraryError;
use crate::repositories::PageRequest;

/// Which inventory a read targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Files reported by the torrent client
    Remote,
    /// Files found on the local tree
    Local,
    /// Local files with no remote file sharing their normalized key
    Orphan,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Remote => "remote",
            Source::Local => "local",
            Source::Orphan => "orphan",
        }
    }

    /// Table expression, aliased where needed.
    pub(crate) fn from_clause(&self) -> &'static str {
        match self {
            Source::Remote => "remote_files",
            Source::Local => "local_files",
            Source::Orphan => "local_files l",
        }
    }

    /// Column qualifier for this source.
    pub(crate) fn column_prefix(&self) -> &'static str {
        match self {
            Source::Orphan => "l.",
            _ => "",
        }
    }

    /// Condition every row of this source satisfies.
    pub(crate) fn base_condition(&self) -> Option<&'static str> {
        match self {
            Source::Orphan => Some(
                "NOT EXISTS (SELECT 1 FROM remote_files r WHERE r.normalized_key = l.normalized_key)",
            ),
            _ => None,
        }
    }

    /// Selected columns, in the order the row types expect.
    pub(crate) fn select_columns(&self) -> &'static str {
        match self {
            Source::Remote => {
                "id, collection_id, collection_name, file_name, file_path, normalized_key, size, created_at"
            }
            Source::Local => "id, file_path, file_name, normalized_key, size, category, created_at",
            Source::Orphan => {
                "l.id, l.file_path, l.file_name, l.normalized_key, l.size, l.category, l.created_at"
            }
        }
    }

    /// Map a caller-facing sort key to a whitelisted column.
    pub fn sort_column(&self, key: &str) -> Option<&'static str> {
        match self {
            Source::Remote => match key {
                "torrent_hash" | "collection_id" => Some("collection_id"),
                "torrent_name" | "collection_name" => Some("collection_name"),
                "file_name" => Some("file_name"),
                "file_path" => Some("file_path"),
                "size" => Some("size"),
                _ => None,
            },
            Source::Local => match key {
                "file_path" => Some("file_path"),
                "file_name" => Some("file_name"),
                "size" => Some("size"),
                "category" => Some("category"),
                _ => None,
            },
            Source::Orphan => match key {
                "file_path" => Some("l.file_path"),
                "file_name" => Some("l.file_name"),
                "size" => Some("l.size"),
                "category" => Some("l.category"),
                _ => None,
            },
        }
    }

    /// Ordering used when no (valid) sort column is given.
    fn default_order(&self) -> &'static str {
        match self {
            Source::Remote | Source::Local => "id ASC",
            Source::Orphan => "l.size DESC, l.id ASC",
        }
    }

    fn supports_category(&self) -> bool {
        !matches!(self, Source::Remote)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "remote" | "torrent" | "torrents" => Ok(Source::Remote),
            "local" => Ok(Source::Local),
            "orphan" | "orphans" => Ok(Source::Orphan),
            other => Err(LibraryError::invalid_input(
                "source",
                format!("unknown source '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// `asc`/`desc` in any case; anything else is ascending.
    pub fn parse_lenient(value: &str) -> Self {
        if value.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Raw read options as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    pub page: i64,
    pub per_page: i64,
    pub sort: Option<String>,
    pub order: Option<String>,
    /// Case-insensitive substring matched against file name or path
    pub search: Option<String>,
    /// Exact category label; ignored for the remote source
    pub category: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = page;
        self
    }

    pub fn per_page(mut self, per_page: i64) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn sort(mut self, column: impl Into<String>) -> Self {
        self.sort = Some(column.into());
        self
    }

    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }

    pub fn direction(&self) -> SortDirection {
        self.order
            .as_deref()
            .map(SortDirection::parse_lenient)
            .unwrap_or_default()
    }

    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn category_filter(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Prepared SQL for one paginated read.
#[derive(Debug, Clone)]
pub(crate) struct QuerySpec {
    pub select_sql: String,
    pub count_sql: String,
    /// Parameters shared by both statements, in placeholder order
    pub binds: Vec<String>,
    pub page: PageRequest,
}

/// Escape LIKE wildcards so the term matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn where_clause(source: Source, options: &QueryOptions, binds: &mut Vec<String>) -> String {
    let prefix = source.column_prefix();
    let mut conditions: Vec<String> = Vec::new();

    if let Some(base) = source.base_condition() {
        conditions.push(base.to_string());
    }

    if let Some(term) = options.search_term() {
        conditions.push(format!("{}search_text LIKE ? ESCAPE '\\'", prefix));
        binds.push(like_pattern(&term.to_lowercase()));
    }

    if source.supports_category() {
        if let Some(category) = options.category_filter() {
            conditions.push(format!("{}category = ?", prefix));
            binds.push(category.to_string());
        }
    }

    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

fn order_clause(source: Source, options: &QueryOptions) -> String {
    let column = options
        .sort
        .as_deref()
        .and_then(|key| source.sort_column(key.trim()));

    match column {
        Some(column) => format!(
            " ORDER BY {} {}, {}id ASC",
            column,
            options.direction().as_sql(),
            source.column_prefix()
        ),
        None => format!(" ORDER BY {}", source.default_order()),
    }
}

pub(crate) fn build_query_spec(source: Source, options: &QueryOptions) -> QuerySpec {
    let mut binds = Vec::new();
    let where_sql = where_clause(source, options, &mut binds);

    let select_sql = format!(
        "SELECT {} FROM {}{}{} LIMIT ? OFFSET ?",
        source.select_columns(),
        source.from_clause(),
        where_sql,
        order_clause(source, options)
    );

    let count_sql = format!("SELECT COUNT(*) FROM {}{}", source.from_clause(), where_sql);

    QuerySpec {
        select_sql,
        count_sql,
        binds,
        page: options.page_request(),
    }
}

/// Group rows by first path segment (leading separators ignored).
pub(crate) fn build_folder_stats_sql(source: Source) -> String {
    let prefix = source.column_prefix();
    let where_sql = source
        .base_condition()
        .map(|c| format!(" WHERE {}", c))
        .unwrap_or_default();

    format!(
        "SELECT \
            CASE WHEN instr(p, '/') > 0 THEN substr(p, 1, instr(p, '/') - 1) ELSE p END AS folder, \
            COUNT(*) AS file_count, \
            COALESCE(SUM(size), 0) AS total_size \
         FROM (SELECT ltrim({prefix}file_path, '/') AS p, {prefix}size AS size FROM {from}{where_sql}) \
         GROUP BY folder \
         ORDER BY total_size DESC, folder ASC",
        prefix = prefix,
        from = source.from_clause(),
        where_sql = where_sql,
    )
}

/// Per-category counts for the local or orphan source.
pub(crate) fn build_category_stats_sql(source: Source) -> String {
    let prefix = source.column_prefix();
    let where_sql = source
        .base_condition()
        .map(|c| format!(" WHERE {}", c))
        .unwrap_or_default();

    format!(
        "SELECT {p}category AS category, COUNT(*) AS file_count, COALESCE(SUM({p}size), 0) AS total_size \
         FROM {from}{where_sql} \
         GROUP BY {p}category \
         ORDER BY {p}category ASC",
        p = prefix,
        from = source.from_clause(),
        where_sql = where_sql,
    )
}
