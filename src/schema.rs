/*
    PlatterDB
    https://github.com/dbalsom/platterdb

    Copyright 2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    Routines for reading table schemas from a small CREATE TABLE subset.

    A schema names the table, designates a primary key, and lists the ordered
    fields whose on-disk sizes sum to the fixed record size. The parser strips
    SQL comments, splits column definitions with respect to nested
    parentheses, and ignores table-level constraint clauses other than
    PRIMARY KEY (col).
*/

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use regex::Regex;

use crate::StoreError;

/// The column types understood by the schema reader, with their fixed on-disk
/// widths. CHAR and VARCHAR take their width from the declared length; all
/// other parenthesized type arguments (e.g. `INTEGER(10)`, `DECIMAL(10, 2)`)
/// are accepted and ignored.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, strum::Display, strum::EnumIter, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum FieldType {
    #[strum(to_string = "TINYINT")]
    TinyInt,
    #[strum(to_string = "SMALLINT")]
    SmallInt,
    #[strum(serialize = "INT", to_string = "INTEGER")]
    Integer,
    #[strum(to_string = "BIGINT")]
    BigInt,
    #[strum(to_string = "DECIMAL")]
    Decimal,
    #[strum(to_string = "FLOAT")]
    Float,
    #[strum(to_string = "DOUBLE")]
    Double,
    #[strum(to_string = "CHAR")]
    Char,
    #[strum(to_string = "VARCHAR")]
    VarChar,
    #[strum(to_string = "TEXT")]
    Text,
    #[strum(to_string = "DATE")]
    Date,
    #[strum(to_string = "DATETIME")]
    DateTime,
    #[strum(serialize = "BOOL", to_string = "BOOLEAN")]
    Boolean,
}

impl FieldType {
    /// Return the base on-disk size of this type in bytes. For CHAR and
    /// VARCHAR this is the per-character size (1); the declared length
    /// multiplies it.
    pub fn base_size(&self) -> usize {
        match self {
            FieldType::TinyInt | FieldType::Boolean => 1,
            FieldType::SmallInt => 2,
            FieldType::Integer | FieldType::Float => 4,
            FieldType::BigInt | FieldType::Decimal | FieldType::Double => 8,
            FieldType::Char | FieldType::VarChar => 1,
            FieldType::Text => 255,
            FieldType::Date | FieldType::DateTime => 8,
        }
    }

    /// Return the on-disk size of a field of this type with an optional
    /// declared length.
    pub fn sized(&self, declared: Option<usize>) -> usize {
        match (self, declared) {
            (FieldType::Char | FieldType::VarChar, Some(n)) => n * self.base_size(),
            _ => self.base_size(),
        }
    }

    /// CHAR, VARCHAR, TEXT, DATE and DATETIME are all stored as space-padded
    /// UTF-8 strings.
    pub fn is_string_family(&self) -> bool {
        matches!(
            self,
            FieldType::Char | FieldType::VarChar | FieldType::Text | FieldType::Date | FieldType::DateTime
        )
    }

    pub fn is_integer_family(&self) -> bool {
        matches!(
            self,
            FieldType::TinyInt | FieldType::SmallInt | FieldType::Integer | FieldType::BigInt
        )
    }

    pub fn is_decimal_family(&self) -> bool {
        matches!(self, FieldType::Decimal | FieldType::Float | FieldType::Double)
    }
}

/// One column of a table schema.
#[derive(Clone, Debug)]
pub struct FieldDef {
    name: String,
    ftype: FieldType,
    size: usize,
    nullable: bool,
    constraints: String,
}

impl FieldDef {
    pub fn new(name: &str, ftype: FieldType, declared: Option<usize>, nullable: bool) -> FieldDef {
        FieldDef {
            name: name.to_string(),
            ftype,
            size: ftype.sized(declared),
            nullable,
            constraints: String::new(),
        }
    }

    /// Attach the raw (uppercased) constraint text following the type in the
    /// column definition.
    pub fn with_constraints(mut self, constraints: &str) -> FieldDef {
        self.constraints = constraints.to_uppercase();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn ftype(&self) -> FieldType {
        self.ftype
    }
    /// The on-disk width of this field, in bytes.
    pub fn size(&self) -> usize {
        self.size
    }
    pub fn nullable(&self) -> bool {
        self.nullable
    }
    pub fn constraints(&self) -> &str {
        &self.constraints
    }
}

impl Display for FieldDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({} bytes)", self.name, self.ftype, self.size)
    }
}

/// A parsed table schema: name, primary key, ordered fields, and the fixed
/// record size (sum of field sizes).
#[derive(Clone, Debug)]
pub struct Schema {
    table_name: String,
    primary_key: String,
    pk_index: usize,
    fields: Vec<FieldDef>,
    record_size: usize,
}

impl Schema {
    pub fn new(table_name: &str, primary_key: &str, fields: Vec<FieldDef>) -> Result<Schema, StoreError> {
        if fields.is_empty() {
            return Err(StoreError::SchemaParseError("schema has no fields".to_string()));
        }
        let pk_index = fields
            .iter()
            .position(|f| f.name().eq_ignore_ascii_case(primary_key))
            .ok_or_else(|| {
                StoreError::SchemaParseError(format!("primary key '{}' is not a declared field", primary_key))
            })?;
        let record_size = fields.iter().map(|f| f.size()).sum();
        Ok(Schema {
            table_name: table_name.to_string(),
            primary_key: primary_key.to_string(),
            pk_index,
            fields,
            record_size,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }
    /// The fixed per-row byte width of this table.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn primary_key_field(&self) -> &FieldDef {
        &self.fields[self.pk_index]
    }

    /// Look up a field by name, case-insensitively.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Parse a schema from CREATE TABLE text.
    pub fn parse(ddl: &str) -> Result<Schema, StoreError> {
        let sql = normalize_sql(ddl);

        let table_re = Regex::new(r"(?i)CREATE\s+TABLE\s+(\w+)").expect("Invalid regex");
        let table_name = table_re
            .captures(&sql)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| StoreError::SchemaParseError("no CREATE TABLE statement found".to_string()))?
            .as_str()
            .to_string();

        let columns_re = Regex::new(r"(?s)\((.*)\)").expect("Invalid regex");
        let columns_def = columns_re
            .captures(&sql)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| StoreError::SchemaParseError("no column definitions found".to_string()))?
            .as_str()
            .to_string();

        let fields = parse_columns(&columns_def)?;
        let primary_key = find_primary_key(&columns_def, &fields)?;

        Schema::new(&table_name, &primary_key, fields)
    }

    /// Parse a schema from a CREATE TABLE text file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Schema, StoreError> {
        let content = std::fs::read_to_string(path)?;
        Schema::parse(&content)
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} fields, {} byte records, primary key '{}')",
            self.table_name,
            self.fields.len(),
            self.record_size,
            self.primary_key
        )
    }
}

/// Strip SQL comments and collapse all whitespace runs to single spaces.
fn normalize_sql(sql: &str) -> String {
    let line_comments = Regex::new(r"(?m)--.*$").expect("Invalid regex");
    let block_comments = Regex::new(r"(?s)/\*.*?\*/").expect("Invalid regex");
    let whitespace = Regex::new(r"\s+").expect("Invalid regex");

    let sql = line_comments.replace_all(sql, "");
    let sql = block_comments.replace_all(&sql, "");
    let sql = whitespace.replace_all(&sql, " ");
    sql.trim().to_string()
}

/// Split the column-definition list on commas, respecting parentheses.
fn split_column_definitions(columns_def: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut paren_depth = 0usize;

    for ch in columns_def.chars() {
        match ch {
            '(' => paren_depth += 1,
            ')' => paren_depth = paren_depth.saturating_sub(1),
            ',' if paren_depth == 0 => {
                result.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    if !current.trim().is_empty() {
        result.push(current.trim().to_string());
    }

    result
}

/// Table-level constraint clauses are not column definitions.
fn is_table_constraint(col_def: &str) -> bool {
    let upper = col_def.to_uppercase();
    ["PRIMARY", "FOREIGN", "UNIQUE", "INDEX", "KEY"]
        .iter()
        .any(|kw| upper.starts_with(kw))
}

fn parse_columns(columns_def: &str) -> Result<Vec<FieldDef>, StoreError> {
    let column_re = Regex::new(r"(?i)^(\w+)\s+(\w+)(?:\(([^)]*)\))?\s*(.*)$").expect("Invalid regex");
    let mut fields = Vec::new();

    for col_def in split_column_definitions(columns_def) {
        if col_def.is_empty() || is_table_constraint(&col_def) {
            continue;
        }

        let caps = match column_re.captures(&col_def) {
            Some(caps) => caps,
            None => {
                log::warn!("parse_columns(): Skipping unparseable column definition '{}'", col_def);
                continue;
            }
        };

        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let type_str = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let size_str = caps.get(3).map(|m| m.as_str());
        let constraints = caps.get(4).map(|m| m.as_str()).unwrap_or_default();

        let ftype = FieldType::from_str(type_str)
            .map_err(|_| StoreError::SchemaParseError(format!("unknown column type '{}'", type_str)))?;

        // Only CHAR and VARCHAR take their size from the declared length;
        // arguments like DECIMAL(10, 2) are ignored.
        let declared = size_str
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<usize>().ok());

        let nullable = !constraints.to_uppercase().contains("NOT NULL");
        fields.push(FieldDef::new(name, ftype, declared, nullable).with_constraints(constraints));
    }

    Ok(fields)
}

/// The primary key is a table-level PRIMARY KEY (col) clause, else the first
/// column with an inline PRIMARY KEY constraint, else the first column.
fn find_primary_key(columns_def: &str, fields: &[FieldDef]) -> Result<String, StoreError> {
    let pk_re = Regex::new(r"(?i)PRIMARY\s+KEY\s*\(([^)]+)\)").expect("Invalid regex");
    if let Some(caps) = pk_re.captures(columns_def) {
        if let Some(m) = caps.get(1) {
            return Ok(m.as_str().trim().to_string());
        }
    }

    if let Some(field) = fields.iter().find(|f| f.constraints().contains("PRIMARY KEY")) {
        return Ok(field.name().to_string());
    }

    fields
        .first()
        .map(|f| f.name().to_string())
        .ok_or_else(|| StoreError::SchemaParseError("could not determine a primary key".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    const PRODUCTO_DDL: &str = "
        CREATE TABLE PRODUCTO(
            index INTEGER(10) PRIMARY KEY,
            item VARCHAR(40) NOT NULL,
            cost DECIMAL(10, 2) NOT NULL,
            tax DECIMAL(10, 2) NOT NULL,
            total DECIMAL(10, 2) NOT NULL
        );
    ";

    #[test]
    fn field_type_parses_aliases_case_insensitively() {
        assert_eq!(FieldType::from_str("int").unwrap(), FieldType::Integer);
        assert_eq!(FieldType::from_str("INTEGER").unwrap(), FieldType::Integer);
        assert_eq!(FieldType::from_str("bool").unwrap(), FieldType::Boolean);
        assert_eq!(FieldType::from_str("Varchar").unwrap(), FieldType::VarChar);
        assert!(FieldType::from_str("BLOB").is_err());
    }

    #[test]
    fn field_type_sizes_match_the_type_table() {
        for ftype in FieldType::iter() {
            let expected = match ftype {
                FieldType::TinyInt | FieldType::Boolean | FieldType::Char | FieldType::VarChar => 1,
                FieldType::SmallInt => 2,
                FieldType::Integer | FieldType::Float => 4,
                FieldType::Text => 255,
                _ => 8,
            };
            assert_eq!(ftype.base_size(), expected, "size mismatch for {}", ftype);
        }
        assert_eq!(FieldType::VarChar.sized(Some(40)), 40);
        assert_eq!(FieldType::Integer.sized(Some(10)), 4);
    }

    #[test]
    fn parses_the_producto_table() {
        let schema = Schema::parse(PRODUCTO_DDL).unwrap();
        assert_eq!(schema.table_name(), "PRODUCTO");
        assert_eq!(schema.primary_key(), "index");
        assert_eq!(schema.fields().len(), 5);
        assert_eq!(schema.record_size(), 4 + 40 + 8 + 8 + 8);
        assert!(!schema.field("item").unwrap().nullable());
        assert!(schema.field("index").unwrap().nullable());
    }

    #[test]
    fn strips_comments_before_parsing() {
        let ddl = "
            -- the inventory table
            CREATE TABLE inv( /* columns */
                id INT NOT NULL, -- key
                qty SMALLINT
            );
        ";
        let schema = Schema::parse(ddl).unwrap();
        assert_eq!(schema.table_name(), "inv");
        assert_eq!(schema.primary_key(), "id");
        assert_eq!(schema.record_size(), 6);
        assert!(schema.field("qty").unwrap().nullable());
    }

    #[test]
    fn table_level_primary_key_clause_wins() {
        let ddl = "CREATE TABLE t(a INT, b VARCHAR(8), PRIMARY KEY(b));";
        let schema = Schema::parse(ddl).unwrap();
        assert_eq!(schema.primary_key(), "b");
        assert_eq!(schema.fields().len(), 2);
    }

    #[test]
    fn falls_back_to_first_column_without_a_key_clause() {
        let schema = Schema::parse("CREATE TABLE t(a INT, b INT);").unwrap();
        assert_eq!(schema.primary_key(), "a");
    }

    #[test]
    fn unknown_type_is_a_parse_error() {
        assert!(matches!(
            Schema::parse("CREATE TABLE t(a BLOB);"),
            Err(StoreError::SchemaParseError(_))
        ));
    }

    #[test]
    fn field_lookup_is_case_insensitive() {
        let schema = Schema::parse(PRODUCTO_DDL).unwrap();
        assert!(schema.field("ITEM").is_some());
        assert!(schema.field("missing").is_none());
    }
}
