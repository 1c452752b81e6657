//! Tokenizer and parser for stored `CREATE TABLE` / `CREATE INDEX` text.
//!
//! The engine keeps no structured catalog for constraint names, collations,
//! generated-column expressions or foreign keys beyond what `PRAGMA`s expose,
//! so those are recovered from the DDL kept in `sqlite_master`. Column
//! definitions contain parenthesized type arguments, default expressions and
//! quoted identifiers with commas in them, so the text is tokenized first and
//! parsed with balanced-paren awareness.

use memchr::memchr;
use sqlbridge_core::{Error, Result, SchemaError, SchemaErrorKind};

use crate::descriptors::{
    CheckConstraintDescriptor, Deferrable, ForeignKeyDescriptor, GeneratedKind,
    ReferentialAction,
};

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    /// Bare identifier or keyword.
    Word(String),
    /// `"..."`, `` `...` `` or `[...]` identifier, unescaped.
    Quoted(String),
    /// `'...'` literal, unescaped.
    Str(String),
    Blob,
    Number,
    LParen,
    RParen,
    Comma,
    Symbol(u8),
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn tokenize(sql: &'a str) -> Result<Vec<Token>> {
        let mut lexer = Lexer {
            src: sql.as_bytes(),
            pos: 0,
        };
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace_and_comments();
        let Some(&byte) = self.src.get(self.pos) else {
            return Ok(None);
        };
        let start = self.pos;
        let kind = match byte {
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b',' => self.single(TokenKind::Comma),
            b'\'' => TokenKind::Str(self.quoted(b'\'')?),
            b'"' | b'`' => TokenKind::Quoted(self.quoted(byte)?),
            b'[' => TokenKind::Quoted(self.bracketed()?),
            b'x' | b'X' if self.src.get(self.pos + 1) == Some(&b'\'') => {
                self.pos += 1;
                self.quoted(b'\'')?;
                TokenKind::Blob
            }
            b'0'..=b'9' => {
                self.number();
                TokenKind::Number
            }
            b'.' if self.src.get(self.pos + 1).is_some_and(u8::is_ascii_digit) => {
                self.number();
                TokenKind::Number
            }
            b if is_word_start(b) => TokenKind::Word(self.word()),
            other => self.single(TokenKind::Symbol(other)),
        };
        Ok(Some(Token {
            kind,
            start,
            end: self.pos,
        }))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.src.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
                self.pos += 1;
            }
            let rest = &self.src[self.pos..];
            if rest.starts_with(b"--") {
                self.pos = match memchr(b'\n', rest) {
                    Some(offset) => self.pos + offset + 1,
                    None => self.src.len(),
                };
            } else if rest.starts_with(b"/*") {
                // Block comments do not nest; an unterminated one runs to the end.
                self.pos = match memchr::memmem::find(&rest[2..], b"*/") {
                    Some(offset) => self.pos + 2 + offset + 2,
                    None => self.src.len(),
                };
            } else {
                break;
            }
        }
    }

    /// Quoted literal or identifier; a doubled quote stands for one quote.
    fn quoted(&mut self, quote: u8) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        let mut value = Vec::new();
        loop {
            let remaining = &self.src[self.pos..];
            match memchr(quote, remaining) {
                Some(offset) => {
                    value.extend_from_slice(&remaining[..offset]);
                    self.pos += offset + 1;
                    if self.src.get(self.pos) == Some(&quote) {
                        value.push(quote);
                        self.pos += 1;
                    } else {
                        return Ok(String::from_utf8_lossy(&value).into_owned());
                    }
                }
                None => {
                    return Err(parse_error(format!(
                        "unterminated quoted text starting at byte {}",
                        start
                    )));
                }
            }
        }
    }

    fn bracketed(&mut self) -> Result<String> {
        let start = self.pos;
        let remaining = &self.src[self.pos + 1..];
        match memchr(b']', remaining) {
            Some(offset) => {
                let value = String::from_utf8_lossy(&remaining[..offset]).into_owned();
                self.pos += offset + 2;
                Ok(value)
            }
            None => Err(parse_error(format!(
                "unterminated bracketed identifier starting at byte {}",
                start
            ))),
        }
    }

    fn number(&mut self) {
        while let Some(&b) = self.src.get(self.pos) {
            let exponent_sign =
                (b == b'+' || b == b'-') && matches!(self.src[self.pos - 1], b'e' | b'E');
            if b.is_ascii_alphanumeric() || b == b'.' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while self.src.get(self.pos).is_some_and(|&b| is_word_continue(b)) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }
}

fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_word_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn parse_error(message: impl Into<String>) -> Error {
    Error::Schema(SchemaError {
        kind: SchemaErrorKind::Parse,
        message: message.into(),
    })
}

/// Keywords that end a column's type name.
const COLUMN_CONSTRAINT_KEYWORDS: &[&str] = &[
    "CONSTRAINT",
    "PRIMARY",
    "NOT",
    "NULL",
    "UNIQUE",
    "CHECK",
    "DEFAULT",
    "COLLATE",
    "REFERENCES",
    "GENERATED",
    "AS",
];

/// A column as declared in `CREATE TABLE`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub sql_type: String,
    pub collation: Option<String>,
    pub generated: Option<GeneratedKind>,
    pub generated_expression: Option<String>,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub not_null: bool,
}

/// Everything recovered from one `CREATE TABLE` statement.
///
/// Foreign keys keep the referenced columns exactly as written: an implicit
/// target leaves `to_columns` empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    pub check_constraints: Vec<CheckConstraintDescriptor>,
}

impl TableDefinition {
    /// Look up a column by name, ignoring ASCII case like the engine does.
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }
}

/// Key and predicate text of a `CREATE INDEX` statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDefinition {
    pub unique: bool,
    /// Text between the parentheses after `ON table`.
    pub key: String,
    pub where_clause: Option<String>,
}

/// Parse a `CREATE TABLE` statement.
///
/// Statements without a column list (`CREATE TABLE ... AS SELECT`, virtual
/// tables) yield a definition with no columns.
///
/// # Errors
///
/// [`SchemaErrorKind::Parse`] for unbalanced parentheses, unterminated quotes
/// and malformed constraints.
pub fn parse_create_table(sql: &str) -> Result<TableDefinition> {
    let mut parser = Parser::new(sql)?;
    parser.expect_keyword("CREATE")?;
    let _ = parser.eat_keyword("TEMP") || parser.eat_keyword("TEMPORARY");
    if !parser.eat_keyword("TABLE") {
        return Ok(TableDefinition::default());
    }
    parser.if_not_exists()?;

    let mut table = TableDefinition {
        name: parser.qualified_name()?,
        ..TableDefinition::default()
    };
    if !parser.eat(&TokenKind::LParen) {
        return Ok(table);
    }

    loop {
        if parser.at_table_constraint() {
            parser.table_constraint(&mut table)?;
        } else {
            parser.column_definition(&mut table)?;
        }
        if parser.eat(&TokenKind::Comma) {
            continue;
        }
        if parser.eat(&TokenKind::RParen) {
            break;
        }
        return Err(parser.error("expected ',' or ')' in column list"));
    }
    Ok(table)
}

/// Parse a `CREATE INDEX` statement.
pub fn parse_create_index(sql: &str) -> Result<IndexDefinition> {
    let mut parser = Parser::new(sql)?;
    parser.expect_keyword("CREATE")?;
    let unique = parser.eat_keyword("UNIQUE");
    parser.expect_keyword("INDEX")?;
    parser.if_not_exists()?;
    parser.qualified_name()?;
    parser.expect_keyword("ON")?;
    parser.name()?;
    let key = parser.group_text()?;
    let where_clause = if parser.eat_keyword("WHERE") {
        parser.rest_text()
    } else {
        None
    };
    Ok(IndexDefinition {
        unique,
        key,
        where_clause,
    })
}

struct Parser<'a> {
    sql: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(sql: &'a str) -> Result<Self> {
        Ok(Self {
            sql,
            tokens: Lexer::tokenize(sql)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|token| &token.kind)
    }

    fn keyword_at(&self, offset: usize, keyword: &str) -> bool {
        matches!(
            self.tokens.get(self.pos + offset).map(|token| &token.kind),
            Some(TokenKind::Word(word)) if word.eq_ignore_ascii_case(keyword)
        )
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.keyword_at(0, keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {}", keyword)))
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_item_end(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(TokenKind::Comma | TokenKind::RParen)
        )
    }

    fn error(&self, message: &str) -> Error {
        let position = self
            .tokens
            .get(self.pos)
            .map_or(self.sql.len(), |token| token.start);
        parse_error(format!("{} at byte {} of: {}", message, position, self.sql))
    }

    fn if_not_exists(&mut self) -> Result<()> {
        if self.eat_keyword("IF") {
            self.expect_keyword("NOT")?;
            self.expect_keyword("EXISTS")?;
        }
        Ok(())
    }

    fn name(&mut self) -> Result<String> {
        match self.peek() {
            Some(TokenKind::Word(name) | TokenKind::Quoted(name) | TokenKind::Str(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error("expected a name")),
        }
    }

    /// `[schema.]name`, returning the unqualified name.
    fn qualified_name(&mut self) -> Result<String> {
        let mut name = self.name()?;
        if self.eat(&TokenKind::Symbol(b'.')) {
            name = self.name()?;
        }
        Ok(name)
    }

    /// Consume a balanced `( ... )` group and return the byte span of its
    /// contents.
    fn group(&mut self) -> Result<(usize, usize)> {
        let Some(open) = self.tokens.get(self.pos).filter(|t| t.kind == TokenKind::LParen) else {
            return Err(self.error("expected '('"));
        };
        let inner_start = open.end;
        let mut depth = 0usize;
        while let Some(token) = self.tokens.get(self.pos) {
            self.pos += 1;
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok((inner_start, token.start));
                    }
                }
                _ => {}
            }
        }
        Err(parse_error(format!("unbalanced parentheses in: {}", self.sql)))
    }

    fn group_text(&mut self) -> Result<String> {
        let (start, end) = self.group()?;
        Ok(self.sql[start..end].trim().to_string())
    }

    /// Text from the current token to the end, without a trailing `;`.
    fn rest_text(&mut self) -> Option<String> {
        let start = self.tokens.get(self.pos)?.start;
        self.pos = self.tokens.len();
        let text = self.sql[start..].trim().trim_end_matches(';').trim_end();
        (!text.is_empty()).then(|| text.to_string())
    }

    fn skip_token(&mut self) -> Result<()> {
        if self.peek() == Some(&TokenKind::LParen) {
            self.group()?;
        } else {
            self.pos += 1;
        }
        Ok(())
    }

    fn skip_to_item_end(&mut self) -> Result<()> {
        while !self.at_item_end() {
            self.skip_token()?;
        }
        Ok(())
    }

    /// `( name [COLLATE x] [ASC|DESC], ... )`
    fn name_list(&mut self) -> Result<Vec<String>> {
        if !self.eat(&TokenKind::LParen) {
            return Err(self.error("expected '('"));
        }
        let mut names = Vec::new();
        loop {
            if matches!(
                self.peek(),
                Some(TokenKind::Word(_) | TokenKind::Quoted(_) | TokenKind::Str(_))
            ) {
                names.push(self.name()?);
            }
            self.skip_to_item_end()?;
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            if self.eat(&TokenKind::RParen) {
                return Ok(names);
            }
            return Err(self.error("unterminated column list"));
        }
    }

    fn conflict_clause(&mut self) {
        if self.at_keyword("ON") && self.keyword_at(1, "CONFLICT") {
            self.pos += 3;
        }
    }

    fn at_table_constraint(&self) -> bool {
        ["CONSTRAINT", "PRIMARY", "UNIQUE", "CHECK", "FOREIGN"]
            .iter()
            .any(|keyword| self.at_keyword(keyword))
    }

    fn type_name(&mut self) -> Result<String> {
        let Some(start) = self.tokens.get(self.pos).map(|token| token.start) else {
            return Ok(String::new());
        };
        let mut end = start;
        while let Some(TokenKind::Word(word)) = self.peek() {
            if COLUMN_CONSTRAINT_KEYWORDS
                .iter()
                .any(|keyword| keyword.eq_ignore_ascii_case(word))
            {
                break;
            }
            end = self.tokens[self.pos].end;
            self.pos += 1;
        }
        if end > start && self.peek() == Some(&TokenKind::LParen) {
            self.group()?;
            end = self.tokens[self.pos - 1].end;
        }
        Ok(self.sql[start..end].trim().to_string())
    }

    fn column_definition(&mut self, table: &mut TableDefinition) -> Result<()> {
        let name = self.name()?;
        let sql_type = self.type_name()?;
        let mut column = ColumnDefinition {
            name,
            sql_type,
            ..ColumnDefinition::default()
        };

        let mut constraint_name = None;
        while !self.at_item_end() {
            if self.eat_keyword("CONSTRAINT") {
                constraint_name = Some(self.name()?);
                continue;
            }
            let name = constraint_name.take();

            if self.eat_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                column.primary_key = true;
                let _ = self.eat_keyword("ASC") || self.eat_keyword("DESC");
                self.conflict_clause();
                column.autoincrement = self.eat_keyword("AUTOINCREMENT");
                table.primary_key = vec![column.name.clone()];
            } else if self.eat_keyword("NOT") {
                self.expect_keyword("NULL")?;
                column.not_null = true;
                self.conflict_clause();
            } else if self.eat_keyword("NULL") || self.eat_keyword("UNIQUE") {
                self.conflict_clause();
            } else if self.eat_keyword("CHECK") {
                let expression = self.group_text()?;
                table
                    .check_constraints
                    .push(CheckConstraintDescriptor { name, expression });
            } else if self.eat_keyword("DEFAULT") {
                self.skip_default()?;
            } else if self.eat_keyword("COLLATE") {
                column.collation = Some(self.name()?);
            } else if self.eat_keyword("REFERENCES") {
                let fk = self.references(name, vec![column.name.clone()], &table.name)?;
                table.foreign_keys.push(fk);
            } else if self.eat_keyword("GENERATED") {
                self.expect_keyword("ALWAYS")?;
                self.expect_keyword("AS")?;
                self.generated(&mut column)?;
            } else if self.eat_keyword("AS") {
                self.generated(&mut column)?;
            } else {
                self.skip_token()?;
            }
        }

        table.columns.push(column);
        Ok(())
    }

    fn skip_default(&mut self) -> Result<()> {
        match self.peek() {
            Some(TokenKind::LParen) => {
                self.group()?;
            }
            Some(TokenKind::Symbol(b'+' | b'-')) => self.pos += 2,
            Some(_) => self.pos += 1,
            None => {}
        }
        Ok(())
    }

    fn generated(&mut self, column: &mut ColumnDefinition) -> Result<()> {
        column.generated_expression = Some(self.group_text()?);
        column.generated = Some(if self.eat_keyword("STORED") {
            GeneratedKind::Stored
        } else {
            let _ = self.eat_keyword("VIRTUAL");
            GeneratedKind::Virtual
        });
        Ok(())
    }

    fn table_constraint(&mut self, table: &mut TableDefinition) -> Result<()> {
        let name = if self.eat_keyword("CONSTRAINT") {
            Some(self.name()?)
        } else {
            None
        };

        if self.eat_keyword("PRIMARY") {
            self.expect_keyword("KEY")?;
            table.primary_key = self.name_list()?;
        } else if self.eat_keyword("UNIQUE") {
            self.name_list()?;
        } else if self.eat_keyword("CHECK") {
            let expression = self.group_text()?;
            table
                .check_constraints
                .push(CheckConstraintDescriptor { name, expression });
        } else if self.eat_keyword("FOREIGN") {
            self.expect_keyword("KEY")?;
            let columns = self.name_list()?;
            self.expect_keyword("REFERENCES")?;
            let fk = self.references(name, columns, &table.name)?;
            table.foreign_keys.push(fk);
        } else {
            return Err(self.error("expected a table constraint"));
        }
        self.skip_to_item_end()
    }

    /// Everything after `REFERENCES`.
    fn references(
        &mut self,
        name: Option<String>,
        columns: Vec<String>,
        from_table: &str,
    ) -> Result<ForeignKeyDescriptor> {
        let to_table = self.qualified_name()?;
        let to_columns = if self.peek() == Some(&TokenKind::LParen) {
            self.name_list()?
        } else {
            Vec::new()
        };
        let mut fk = ForeignKeyDescriptor {
            name,
            from_table: from_table.to_string(),
            columns,
            to_table,
            to_columns,
            on_delete: None,
            on_update: None,
            deferrable: None,
        };

        loop {
            if self.at_keyword("ON") && !self.keyword_at(1, "CONFLICT") {
                self.pos += 1;
                let on_delete = if self.eat_keyword("DELETE") {
                    true
                } else if self.eat_keyword("UPDATE") {
                    false
                } else {
                    return Err(self.error("expected DELETE or UPDATE"));
                };
                let action = self.referential_action()?;
                if on_delete {
                    fk.on_delete = Some(action);
                } else {
                    fk.on_update = Some(action);
                }
            } else if self.eat_keyword("MATCH") {
                self.name()?;
            } else if self.at_keyword("NOT") && self.keyword_at(1, "DEFERRABLE") {
                self.pos += 2;
                if self.eat_keyword("INITIALLY") {
                    self.pos += 1;
                }
            } else if self.eat_keyword("DEFERRABLE") {
                let deferred = self.eat_keyword("INITIALLY") && self.eat_keyword("DEFERRED");
                let _ = self.eat_keyword("IMMEDIATE");
                fk.deferrable = Some(if deferred {
                    Deferrable::Deferred
                } else {
                    Deferrable::Immediate
                });
            } else {
                return Ok(fk);
            }
        }
    }

    fn referential_action(&mut self) -> Result<ReferentialAction> {
        let action = if self.eat_keyword("SET") {
            if self.eat_keyword("NULL") {
                ReferentialAction::SetNull
            } else {
                self.expect_keyword("DEFAULT")?;
                ReferentialAction::SetDefault
            }
        } else if self.eat_keyword("CASCADE") {
            ReferentialAction::Cascade
        } else if self.eat_keyword("RESTRICT") {
            ReferentialAction::Restrict
        } else {
            self.expect_keyword("NO")?;
            self.expect_keyword("ACTION")?;
            ReferentialAction::NoAction
        };
        Ok(action)
    }
}
