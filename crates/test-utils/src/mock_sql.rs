// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! SQL front end of the mock engine
//!
//! Tokenizes, parses and evaluates the small SQL subset the mock engine
//! understands. Error messages follow PostgreSQL wording so fixtures recorded
//! against PostgreSQL can be replayed against the mock.

use sql_regress_engine::{EngineError, EngineResult};

/// Default values of the settings the mock engine knows about
pub(crate) const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("application_name", ""),
    ("client_min_messages", "notice"),
    ("datestyle", "ISO, MDY"),
    ("enable_hashjoin", "on"),
    ("enable_indexscan", "on"),
    ("enable_seqscan", "on"),
    ("enable_sort", "on"),
    ("extra_float_digits", "1"),
    ("intervalstyle", "postgres"),
    ("search_path", "\"$user\", public"),
    ("statement_timeout", "0"),
    ("timezone", "UTC"),
    ("work_mem", "4MB"),
];

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Identifier or keyword; unquoted identifiers are lowercased
    Ident(String),
    Number(String),
    Str(String),
    Symbol(&'static str),
}

impl Token {
    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(s) if s == keyword)
    }

    fn text(&self) -> String {
        match self {
            Token::Ident(s) | Token::Number(s) => s.clone(),
            Token::Str(s) => format!("'{}'", s),
            Token::Symbol(s) => s.to_string(),
        }
    }
}

const SYMBOLS: &[&str] = &[
    "::", "||", "(", ")", ",", ";", "*", "=", ".", "/", "+", "-", "%", "<", ">",
];

pub(crate) fn tokenize(sql: &str) -> EngineResult<Vec<Token>> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '-' && chars.get(i + 1) == Some(&'-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(Token::Ident(word.to_lowercase()));
        } else if c == '"' {
            let (text, end) = read_quoted(&chars, i, '"')?;
            tokens.push(Token::Ident(text));
            i = end;
        } else if c == '\'' {
            let (text, end) = read_quoted(&chars, i, '\'')?;
            tokens.push(Token::Str(text));
            i = end;
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j], '+' | '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Number(chars[start..i].iter().collect()));
        } else {
            let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
            let Some(symbol) = SYMBOLS.iter().find(|s| rest.starts_with(**s)) else {
                return Err(EngineError::statement(format!(
                    "syntax error at or near \"{}\"",
                    c
                )));
            };
            tokens.push(Token::Symbol(*symbol));
            i += symbol.len();
        }
    }

    Ok(tokens)
}

fn read_quoted(chars: &[char], start: usize, quote: char) -> EngineResult<(String, usize)> {
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                text.push(quote);
                i += 2;
                continue;
            }
            return Ok((text, i + 1));
        }
        text.push(chars[i]);
        i += 1;
    }
    let rest: String = chars[start..].iter().collect();
    Err(EngineError::statement(format!(
        "unterminated quoted string at or near \"{}\"",
        rest
    )))
}

/// Column type, reduced to what the mock engine distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnType {
    Int,
    Float,
    Numeric,
    Bool,
    Text,
}

impl ColumnType {
    fn from_name(name: &str) -> Self {
        match name {
            "int" | "integer" | "int2" | "int4" | "int8" | "smallint" | "bigint" | "serial"
            | "bigserial" => ColumnType::Int,
            "float" | "float4" | "float8" | "real" | "double" => ColumnType::Float,
            "numeric" | "decimal" => ColumnType::Numeric,
            "bool" | "boolean" => ColumnType::Bool,
            _ => ColumnType::Text,
        }
    }

    /// Name PostgreSQL gives a column produced by a cast to this type
    fn column_name(&self) -> &'static str {
        match self {
            ColumnType::Int => "int4",
            ColumnType::Float => "float8",
            ColumnType::Numeric => "numeric",
            ColumnType::Bool => "bool",
            ColumnType::Text => "text",
        }
    }

    fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Int => "integer",
            ColumnType::Float => "double precision",
            ColumnType::Numeric => "numeric",
            ColumnType::Bool => "boolean",
            ColumnType::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
}

/// A value inside the mock engine
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Datum {
    Null,
    Int(i64),
    Float(f64),
    /// Numeric text, kept as written
    Numeric(String),
    Bool(bool),
    Text(String),
}

impl Datum {
    /// Text output form; `None` for NULL
    pub(crate) fn render(&self) -> Option<String> {
        match self {
            Datum::Null => None,
            Datum::Int(i) => Some(i.to_string()),
            Datum::Float(f) => Some(render_float(*f)),
            Datum::Numeric(n) => Some(n.clone()),
            Datum::Bool(true) => Some("t".to_string()),
            Datum::Bool(false) => Some("f".to_string()),
            Datum::Text(t) => Some(t.clone()),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Datum::Null => "unknown",
            Datum::Int(_) => "integer",
            Datum::Float(_) => "double precision",
            Datum::Numeric(_) => "numeric",
            Datum::Bool(_) => "boolean",
            Datum::Text(_) => "text",
        }
    }
}

fn render_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "Infinity".to_string()
    } else if f == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        f.to_string()
    }
}

fn parse_float(text: &str) -> Option<f64> {
    match text.trim().to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        "infinity" | "+infinity" | "inf" => Some(f64::INFINITY),
        "-infinity" | "-inf" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

/// Convert a value to a column type, with PostgreSQL's input errors
pub(crate) fn coerce(value: Datum, ty: ColumnType) -> EngineResult<Datum> {
    let invalid = |text: &str| {
        EngineError::statement(format!(
            "invalid input syntax for type {}: \"{}\"",
            ty.sql_name(),
            text
        ))
    };
    let cannot_cast = |from: &Datum| {
        EngineError::statement(format!(
            "cannot cast type {} to {}",
            from.type_name(),
            ty.sql_name()
        ))
    };

    Ok(match (ty, value) {
        (_, Datum::Null) => Datum::Null,

        (ColumnType::Int, Datum::Int(i)) => Datum::Int(i),
        (ColumnType::Int, Datum::Float(f)) => float_to_int(f)?,
        (ColumnType::Int, Datum::Numeric(n)) => match n.parse::<f64>() {
            Ok(f) => float_to_int(f)?,
            Err(_) => return Err(invalid(&n)),
        },
        (ColumnType::Int, Datum::Text(t)) => {
            Datum::Int(t.trim().parse().map_err(|_| invalid(&t))?)
        }

        (ColumnType::Float, Datum::Int(i)) => Datum::Float(i as f64),
        (ColumnType::Float, Datum::Float(f)) => Datum::Float(f),
        (ColumnType::Float, Datum::Numeric(n) | Datum::Text(n)) => {
            Datum::Float(parse_float(&n).ok_or_else(|| invalid(&n))?)
        }

        (ColumnType::Numeric, Datum::Int(i)) => Datum::Numeric(i.to_string()),
        (ColumnType::Numeric, Datum::Float(f)) => Datum::Numeric(render_float(f)),
        (ColumnType::Numeric, Datum::Numeric(n)) => Datum::Numeric(n),
        (ColumnType::Numeric, Datum::Text(t)) => {
            let trimmed = t.trim();
            if trimmed.eq_ignore_ascii_case("nan") {
                Datum::Numeric("NaN".to_string())
            } else if trimmed.parse::<f64>().is_ok_and(f64::is_finite) {
                Datum::Numeric(trimmed.to_string())
            } else {
                return Err(invalid(&t));
            }
        }

        (ColumnType::Bool, Datum::Bool(b)) => Datum::Bool(b),
        (ColumnType::Bool, Datum::Int(i)) => Datum::Bool(i != 0),
        (ColumnType::Bool, Datum::Text(t)) => match t.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "yes" | "on" | "1" => Datum::Bool(true),
            "f" | "false" | "no" | "off" | "0" => Datum::Bool(false),
            _ => return Err(invalid(&t)),
        },

        (ColumnType::Text, value) => match value.render() {
            Some(text) => Datum::Text(text),
            None => Datum::Null,
        },

        (_, value) => return Err(cannot_cast(&value)),
    })
}

fn float_to_int(f: f64) -> EngineResult<Datum> {
    if f.is_finite() && f.abs() < 9.2e18 {
        Ok(Datum::Int(f.round() as i64))
    } else {
        Err(EngineError::statement("integer out of range"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Datum),
    Column(String),
    Neg(Box<Expr>),
    Binary {
        op: &'static str,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Cast(Box<Expr>, ColumnType),
    CountStar,
}

impl Expr {
    /// Output column name when no alias is given
    fn default_name(&self) -> String {
        match self {
            Expr::Column(name) => name.clone(),
            Expr::Cast(_, ty) => ty.column_name().to_string(),
            Expr::CountStar => "count".to_string(),
            _ => "?column?".to_string(),
        }
    }
}

/// Row an expression is evaluated against
pub(crate) type RowContext<'a> = Option<(&'a [ColumnDef], &'a [Datum])>;

pub(crate) fn eval(expr: &Expr, row: RowContext<'_>) -> EngineResult<Datum> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Column(name) => {
            let found = row.and_then(|(columns, values)| {
                columns
                    .iter()
                    .position(|c| &c.name == name)
                    .map(|i| values[i].clone())
            });
            found.ok_or_else(|| {
                EngineError::statement(format!("column \"{}\" does not exist", name))
            })
        }
        Expr::Neg(inner) => match eval(inner, row)? {
            Datum::Null => Ok(Datum::Null),
            Datum::Int(i) => i
                .checked_neg()
                .map(Datum::Int)
                .ok_or_else(|| EngineError::statement("integer out of range")),
            Datum::Float(f) => Ok(Datum::Float(-f)),
            Datum::Numeric(n) => Ok(Datum::Numeric(match n.strip_prefix('-') {
                Some(positive) => positive.to_string(),
                None => format!("-{}", n),
            })),
            other => Err(EngineError::statement(format!(
                "operator does not exist: - {}",
                other.type_name()
            ))),
        },
        Expr::Binary { op, left, right } => {
            let left = eval(left, row)?;
            let right = eval(right, row)?;
            binary(op, left, right)
        }
        Expr::Cast(inner, ty) => coerce(eval(inner, row)?, *ty),
        Expr::CountStar => Err(EngineError::statement(
            "aggregate functions are not allowed here",
        )),
    }
}

fn binary(op: &str, left: Datum, right: Datum) -> EngineResult<Datum> {
    if left == Datum::Null || right == Datum::Null {
        return Ok(Datum::Null);
    }
    if op == "||" {
        let (Some(l), Some(r)) = (left.render(), right.render()) else {
            return Ok(Datum::Null);
        };
        return Ok(Datum::Text(l + &r));
    }

    let division_by_zero = || EngineError::statement("division by zero");
    let out_of_range = || EngineError::statement("integer out of range");

    match (&left, &right) {
        (Datum::Int(l), Datum::Int(r)) => {
            let (l, r) = (*l, *r);
            let result = match op {
                "+" => l.checked_add(r),
                "-" => l.checked_sub(r),
                "*" => l.checked_mul(r),
                "/" if r == 0 => return Err(division_by_zero()),
                "/" => l.checked_div(r),
                "%" if r == 0 => return Err(division_by_zero()),
                "%" => l.checked_rem(r),
                _ => return Err(no_operator(op, &left, &right)),
            };
            result.map(Datum::Int).ok_or_else(out_of_range)
        }
        (Datum::Int(_) | Datum::Float(_) | Datum::Numeric(_), Datum::Int(_) | Datum::Float(_) | Datum::Numeric(_)) => {
            let as_float = |d: &Datum| match d {
                Datum::Int(i) => Some(*i as f64),
                Datum::Float(f) => Some(*f),
                Datum::Numeric(n) => parse_float(n),
                _ => None,
            };
            let (Some(l), Some(r)) = (as_float(&left), as_float(&right)) else {
                return Err(no_operator(op, &left, &right));
            };
            let result = match op {
                "+" => l + r,
                "-" => l - r,
                "*" => l * r,
                "/" if r == 0.0 => return Err(division_by_zero()),
                "/" => l / r,
                _ => return Err(no_operator(op, &left, &right)),
            };
            if matches!(left, Datum::Float(_)) || matches!(right, Datum::Float(_)) {
                Ok(Datum::Float(result))
            } else {
                Ok(Datum::Numeric(render_float(result)))
            }
        }
        _ => Err(no_operator(op, &left, &right)),
    }
}

fn no_operator(op: &str, left: &Datum, right: &Datum) -> EngineError {
    EngineError::statement(format!(
        "operator does not exist: {} {} {}",
        left.type_name(),
        op,
        right.type_name()
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SelectItem {
    Wildcard,
    Expr { expr: Expr, alias: Option<String> },
}

impl SelectItem {
    pub(crate) fn name(&self) -> String {
        match self {
            SelectItem::Wildcard => "*".to_string(),
            SelectItem::Expr { expr, alias } => {
                alias.clone().unwrap_or_else(|| expr.default_name())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    Empty,
    CreateTable {
        name: String,
        temporary: bool,
        columns: Vec<ColumnDef>,
    },
    DropTable {
        names: Vec<String>,
        if_exists: bool,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        rows: Vec<Vec<Expr>>,
    },
    Select {
        items: Vec<SelectItem>,
        from: Option<String>,
    },
    Begin,
    Commit,
    Rollback,
    Savepoint(String),
    RollbackTo(String),
    Release(String),
    SetTransaction,
    Set {
        name: String,
        /// `None` means DEFAULT
        value: Option<String>,
        local: bool,
    },
    /// `None` means RESET ALL
    Reset(Option<String>),
    Show(String),
}

impl Statement {
    /// Statements accepted inside an aborted transaction
    pub(crate) fn ends_transaction(&self) -> bool {
        matches!(
            self,
            Statement::Commit | Statement::Rollback | Statement::RollbackTo(_)
        )
    }
}

pub(crate) fn parse(sql: &str) -> EngineResult<Statement> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser { tokens, pos: 0 };
    let statement = parser.statement()?;
    parser.finish()?;
    Ok(statement)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Symbol(";")))
    }

    fn syntax_error(&self) -> EngineError {
        match self.peek() {
            Some(token) => EngineError::statement(format!(
                "syntax error at or near \"{}\"",
                token.text()
            )),
            None => EngineError::statement("syntax error at end of input"),
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_keyword(keyword)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> EngineResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.syntax_error())
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> EngineResult<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.syntax_error())
        }
    }

    fn ident(&mut self) -> EngineResult<String> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.syntax_error()),
        }
    }

    /// Possibly dotted name, such as a custom setting
    fn dotted_ident(&mut self) -> EngineResult<String> {
        let mut name = self.ident()?;
        while self.eat_symbol(".") {
            name.push('.');
            name.push_str(&self.ident()?);
        }
        Ok(name)
    }

    fn skip_rest(&mut self) {
        while !self.at_end() {
            self.pos += 1;
        }
    }

    fn finish(&mut self) -> EngineResult<()> {
        self.eat_symbol(";");
        if self.peek().is_some() {
            return Err(self.syntax_error());
        }
        Ok(())
    }

    fn statement(&mut self) -> EngineResult<Statement> {
        if self.at_end() {
            return Ok(Statement::Empty);
        }
        let Some(Token::Ident(keyword)) = self.next() else {
            self.pos -= 1;
            return Err(self.syntax_error());
        };

        match keyword.as_str() {
            "create" => self.create_table(),
            "drop" => {
                self.expect_keyword("table")?;
                let if_exists = self.eat_keyword("if");
                if if_exists {
                    self.expect_keyword("exists")?;
                }
                let mut names = vec![self.ident()?];
                while self.eat_symbol(",") {
                    names.push(self.ident()?);
                }
                Ok(Statement::DropTable { names, if_exists })
            }
            "insert" => self.insert(),
            "select" => self.select(),
            "begin" | "start" => {
                if keyword == "start" {
                    self.expect_keyword("transaction")?;
                }
                self.skip_rest();
                Ok(Statement::Begin)
            }
            "commit" | "end" => {
                let _ = self.eat_keyword("transaction") || self.eat_keyword("work");
                Ok(Statement::Commit)
            }
            "rollback" | "abort" => {
                if self.eat_keyword("to") {
                    self.eat_keyword("savepoint");
                    return Ok(Statement::RollbackTo(self.ident()?));
                }
                let _ = self.eat_keyword("transaction") || self.eat_keyword("work");
                Ok(Statement::Rollback)
            }
            "savepoint" => Ok(Statement::Savepoint(self.ident()?)),
            "release" => {
                self.eat_keyword("savepoint");
                Ok(Statement::Release(self.ident()?))
            }
            "set" => self.set(),
            "reset" => {
                if self.eat_keyword("all") {
                    Ok(Statement::Reset(None))
                } else {
                    Ok(Statement::Reset(Some(self.setting_name()?)))
                }
            }
            "show" => Ok(Statement::Show(self.setting_name()?)),
            _ => {
                self.pos -= 1;
                Err(self.syntax_error())
            }
        }
    }

    fn setting_name(&mut self) -> EngineResult<String> {
        if self.eat_keyword("time") {
            self.expect_keyword("zone")?;
            return Ok("timezone".to_string());
        }
        self.dotted_ident()
    }

    fn create_table(&mut self) -> EngineResult<Statement> {
        let temporary = self.eat_keyword("temp") || self.eat_keyword("temporary");
        self.expect_keyword("table")?;
        let name = self.ident()?;
        self.expect_symbol("(")?;

        let mut columns = Vec::new();
        loop {
            let column = self.ident()?;
            let type_name = self.ident()?;
            let mut depth = 0usize;
            // Skip type modifiers and column constraints
            while let Some(token) = self.peek() {
                match token {
                    Token::Symbol("(") => depth += 1,
                    Token::Symbol(")") if depth == 0 => break,
                    Token::Symbol(")") => depth -= 1,
                    Token::Symbol(",") if depth == 0 => break,
                    _ => {}
                }
                self.pos += 1;
            }
            columns.push(ColumnDef {
                name: column,
                ty: ColumnType::from_name(&type_name),
            });
            if !self.eat_symbol(",") {
                break;
            }
        }
        self.expect_symbol(")")?;

        Ok(Statement::CreateTable {
            name,
            temporary,
            columns,
        })
    }

    fn insert(&mut self) -> EngineResult<Statement> {
        self.expect_keyword("into")?;
        let table = self.ident()?;

        let columns = if self.eat_symbol("(") {
            let mut names = vec![self.ident()?];
            while self.eat_symbol(",") {
                names.push(self.ident()?);
            }
            self.expect_symbol(")")?;
            Some(names)
        } else {
            None
        };

        self.expect_keyword("values")?;
        let mut rows = Vec::new();
        loop {
            self.expect_symbol("(")?;
            let mut row = vec![self.expr()?];
            while self.eat_symbol(",") {
                row.push(self.expr()?);
            }
            self.expect_symbol(")")?;
            rows.push(row);
            if !self.eat_symbol(",") {
                break;
            }
        }

        Ok(Statement::Insert {
            table,
            columns,
            rows,
        })
    }

    fn select(&mut self) -> EngineResult<Statement> {
        let mut items = Vec::new();
        loop {
            if self.eat_symbol("*") {
                items.push(SelectItem::Wildcard);
            } else {
                let expr = self.expr()?;
                let alias = if self.eat_keyword("as") {
                    Some(self.ident()?)
                } else {
                    match self.peek() {
                        Some(Token::Ident(name)) if name != "from" => {
                            let name = name.clone();
                            self.pos += 1;
                            Some(name)
                        }
                        _ => None,
                    }
                };
                items.push(SelectItem::Expr { expr, alias });
            }
            if !self.eat_symbol(",") {
                break;
            }
        }

        let from = if self.eat_keyword("from") {
            Some(self.ident()?)
        } else {
            None
        };

        Ok(Statement::Select { items, from })
    }

    fn set(&mut self) -> EngineResult<Statement> {
        if self.eat_keyword("transaction") {
            self.skip_rest();
            return Ok(Statement::SetTransaction);
        }
        let local = self.eat_keyword("local");
        if !local {
            self.eat_keyword("session");
        }

        let (name, value) = if self.eat_keyword("time") {
            self.expect_keyword("zone")?;
            ("timezone".to_string(), self.setting_value()?)
        } else {
            let name = self.dotted_ident()?;
            if !(self.eat_keyword("to") || self.eat_symbol("=")) {
                return Err(self.syntax_error());
            }
            (name, self.setting_value()?)
        };

        Ok(Statement::Set { name, value, local })
    }

    fn setting_value(&mut self) -> EngineResult<Option<String>> {
        if self.eat_keyword("default") {
            return Ok(None);
        }
        let mut parts = Vec::new();
        loop {
            let negative = self.eat_symbol("-");
            let part = match self.peek().cloned() {
                Some(Token::Ident(s)) | Some(Token::Str(s)) => s,
                Some(Token::Number(n)) if negative => format!("-{}", n),
                Some(Token::Number(n)) => n,
                _ => return Err(self.syntax_error()),
            };
            self.pos += 1;
            parts.push(part);
            if !self.eat_symbol(",") {
                break;
            }
        }
        Ok(Some(parts.join(", ")))
    }

    fn expr(&mut self) -> EngineResult<Expr> {
        let mut left = self.additive()?;
        while self.eat_symbol("||") {
            let right = self.additive()?;
            left = Expr::Binary {
                op: "||",
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn additive(&mut self) -> EngineResult<Expr> {
        let mut left = self.term()?;
        loop {
            let op = if self.eat_symbol("+") {
                "+"
            } else if self.eat_symbol("-") {
                "-"
            } else {
                return Ok(left);
            };
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn term(&mut self) -> EngineResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat_symbol("*") {
                "*"
            } else if self.eat_symbol("/") {
                "/"
            } else if self.eat_symbol("%") {
                "%"
            } else {
                return Ok(left);
            };
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn unary(&mut self) -> EngineResult<Expr> {
        if self.eat_symbol("-") {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        let mut expr = self.primary()?;
        while self.eat_symbol("::") {
            let mut type_name = self.ident()?;
            if type_name == "double" {
                self.expect_keyword("precision")?;
                type_name = "float8".to_string();
            }
            expr = Expr::Cast(Box::new(expr), ColumnType::from_name(&type_name));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> EngineResult<Expr> {
        let Some(token) = self.next() else {
            return Err(self.syntax_error());
        };
        match token {
            Token::Number(n) => {
                let literal = if n.contains(['.', 'e', 'E']) {
                    Datum::Numeric(n)
                } else {
                    match n.parse::<i64>() {
                        Ok(i) => Datum::Int(i),
                        Err(_) => Datum::Numeric(n),
                    }
                };
                Ok(Expr::Literal(literal))
            }
            Token::Str(s) => Ok(Expr::Literal(Datum::Text(s))),
            Token::Symbol("(") => {
                let expr = self.expr()?;
                self.expect_symbol(")")?;
                Ok(expr)
            }
            Token::Ident(word) => match word.as_str() {
                "null" => Ok(Expr::Literal(Datum::Null)),
                "true" => Ok(Expr::Literal(Datum::Bool(true))),
                "false" => Ok(Expr::Literal(Datum::Bool(false))),
                "count" if self.eat_symbol("(") => {
                    self.expect_symbol("*")?;
                    self.expect_symbol(")")?;
                    Ok(Expr::CountStar)
                }
                _ => {
                    // Qualified references resolve by column name only
                    if self.eat_symbol(".") {
                        return Ok(Expr::Column(self.ident()?));
                    }
                    Ok(Expr::Column(word))
                }
            },
            Token::Symbol(_) => {
                self.pos -= 1;
                Err(self.syntax_error())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_sql(sql: &str) -> EngineResult<Vec<Option<String>>> {
        let Statement::Select { items, from: None } = parse(sql)? else {
            panic!("expected a SELECT without FROM");
        };
        items
            .iter()
            .map(|item| match item {
                SelectItem::Expr { expr, .. } => eval(expr, None).map(|d| d.render()),
                SelectItem::Wildcard => panic!("unexpected wildcard"),
            })
            .collect()
    }

    #[test]
    fn test_tokenize() {
        let tokens = tokenize("SELECT 'it''s', \"Mixed\"::text -- comment\n, 1.5e3;").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("select".to_string()),
                Token::Str("it's".to_string()),
                Token::Symbol(","),
                Token::Ident("Mixed".to_string()),
                Token::Symbol("::"),
                Token::Ident("text".to_string()),
                Token::Symbol(","),
                Token::Number("1.5e3".to_string()),
                Token::Symbol(";"),
            ]
        );
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval_sql("SELECT 1 + 2 * 3").unwrap(), vec![Some("7".to_string())]);
        assert_eq!(eval_sql("SELECT -(7 / 2)").unwrap(), vec![Some("-3".to_string())]);
        assert_eq!(
            eval_sql("SELECT 1/0").unwrap_err().message,
            "division by zero"
        );
        assert_eq!(eval_sql("SELECT NULL + 1").unwrap(), vec![None]);
    }

    #[test]
    fn test_casts() {
        assert_eq!(
            eval_sql("SELECT 'NaN'::float8, '-infinity'::float8, '42'::int, 't'::boolean").unwrap(),
            vec![
                Some("NaN".to_string()),
                Some("-Infinity".to_string()),
                Some("42".to_string()),
                Some("t".to_string())
            ]
        );
        assert_eq!(
            eval_sql("SELECT 'abc'::int").unwrap_err().message,
            "invalid input syntax for type integer: \"abc\""
        );
    }

    #[test]
    fn test_parse_statements() {
        assert_eq!(
            parse("CREATE TEMP TABLE t (a int NOT NULL, b varchar(10), c numeric(10, 2));").unwrap(),
            Statement::CreateTable {
                name: "t".to_string(),
                temporary: true,
                columns: vec![
                    ColumnDef { name: "a".to_string(), ty: ColumnType::Int },
                    ColumnDef { name: "b".to_string(), ty: ColumnType::Text },
                    ColumnDef { name: "c".to_string(), ty: ColumnType::Numeric },
                ],
            }
        );
        assert_eq!(
            parse("SET LOCAL enable_seqscan = off;").unwrap(),
            Statement::Set {
                name: "enable_seqscan".to_string(),
                value: Some("off".to_string()),
                local: true
            }
        );
        assert_eq!(
            parse("rollback to savepoint sp1").unwrap(),
            Statement::RollbackTo("sp1".to_string())
        );
        assert_eq!(parse("  ").unwrap(), Statement::Empty);
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(
            parse("SELEC 1").unwrap_err().message,
            "syntax error at or near \"selec\""
        );
        assert_eq!(
            parse("INSERT INTO t VALUES (1").unwrap_err().message,
            "syntax error at end of input"
        );
    }
}
