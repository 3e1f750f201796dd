//! Abstract Syntax Tree (AST) Types for the shell
//!
//! The parser produces a tree of owned nodes. Every sub-list is owned by its
//! parent; function bodies are cloned into the function table when the
//! definition executes, so the tree itself never needs shared ownership.
//!
//! Words keep their raw source text (quotes included). Quote removal and all
//! substitutions happen later, at execution time, on a copy of the word.

use std::fmt;

// =============================================================================
// WORDS
// =============================================================================

/// A single shell word as it appeared in the source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Word {
    /// Raw text, quoting characters preserved
    pub text: String,
    /// Any quoting (`'`, `"`, `\`) appears in the word
    pub quoted: bool,
    /// The word contains an expansion trigger (`$`, backtick, leading `~`, `<(`)
    pub expand: bool,
}

impl Word {
    pub fn new(text: impl Into<String>, quoted: bool, expand: bool) -> Self {
        Self {
            text: text.into(),
            quoted,
            expand,
        }
    }

    /// Build a word from raw text, deriving the quoting flags by inspection.
    pub fn from_raw(text: impl Into<String>) -> Self {
        let text = text.into();
        let quoted = text.contains(['\'', '"', '\\']);
        let expand = text.contains(['$', '`'])
            || text.starts_with('~')
            || text.starts_with("<(")
            || text.starts_with(">(");
        Self { text, quoted, expand }
    }

    /// A word made of plain characters only.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::new(text, false, false)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// =============================================================================
// COMMAND LISTS
// =============================================================================

/// How a list entry connects to the entry that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOperator {
    /// Last entry of the list
    #[default]
    None,
    /// `;`, `&` or newline
    Seq,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl ListOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListOperator::None => "",
            ListOperator::Seq => ";",
            ListOperator::And => "&&",
            ListOperator::Or => "||",
        }
    }
}

/// One statement in a command list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    pub command: Command,
    pub op: ListOperator,
    /// Leading `!`
    pub negated: bool,
    /// Trailing `&`
    pub background: bool,
    /// Leading `time`
    pub timed: bool,
    /// Original text of the statement, shown by `jobs`
    pub source_text: String,
    pub line: usize,
}

impl ListEntry {
    pub fn new(command: Command, line: usize) -> Self {
        Self {
            command,
            op: ListOperator::None,
            negated: false,
            background: false,
            timed: false,
            source_text: String::new(),
            line,
        }
    }
}

/// A sequence of statements linked by list operators.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandList {
    pub entries: Vec<ListEntry>,
}

impl CommandList {
    pub fn new(entries: Vec<ListEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Every statement form the parser can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Pipeline(Pipeline),
    FunctionDef(FunctionDef),
    If(IfCommand),
    While(LoopCommand),
    Until(LoopCommand),
    For(ForCommand),
    ForArith(ForArithCommand),
    Select(ForCommand),
    Case(CaseCommand),
    Subshell(CommandList),
    Group(CommandList),
    Conditional(CondExpr),
    Arithmetic(ArithCommand),
}

/// One or more segments joined by `|`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    pub segments: Vec<PipelineSegment>,
}

/// One stage of a pipeline.
///
/// A stage is either a simple command (words, assignments, redirections) or
/// a compound command with optional trailing redirections.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineSegment {
    pub words: Vec<Word>,
    pub assignments: Vec<Assignment>,
    pub redirections: Vec<Redirection>,
    pub compound: Option<Box<Command>>,
    pub line: usize,
}

/// `NAME=value`, `NAME+=value`, `NAME[i]=value` or `NAME=(a b c)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub index: Option<String>,
    pub value: AssignmentValue,
    pub append: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentValue {
    Scalar(Word),
    Array(Vec<Word>),
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectionOp {
    /// `<`
    Input,
    /// `>`
    Output,
    /// `>>`
    Append,
    /// `>|`
    Clobber,
    /// `<>`
    ReadWrite,
    /// `&>`
    OutputAll,
    /// `&>>`
    AppendAll,
    /// `<&`
    DupInput,
    /// `>&`
    DupOutput,
    /// `<<` and `<<-`
    HereDoc,
    /// `<<<`
    HereString,
}

impl RedirectionOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectionOp::Input => "<",
            RedirectionOp::Output => ">",
            RedirectionOp::Append => ">>",
            RedirectionOp::Clobber => ">|",
            RedirectionOp::ReadWrite => "<>",
            RedirectionOp::OutputAll => "&>",
            RedirectionOp::AppendAll => "&>>",
            RedirectionOp::DupInput => "<&",
            RedirectionOp::DupOutput => ">&",
            RedirectionOp::HereDoc => "<<",
            RedirectionOp::HereString => "<<<",
        }
    }

    /// File descriptor the operator applies to when no number prefixes it.
    pub fn default_fd(&self) -> i32 {
        match self {
            RedirectionOp::Input
            | RedirectionOp::ReadWrite
            | RedirectionOp::DupInput
            | RedirectionOp::HereDoc
            | RedirectionOp::HereString => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for RedirectionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Redirection {
    /// Explicit fd prefix (`2>`)
    pub fd: Option<i32>,
    pub op: RedirectionOp,
    /// Target file, fd number, `-`, here-string text or here-doc delimiter
    pub target: Word,
    pub heredoc: Option<HereDoc>,
}

impl Redirection {
    pub fn new(fd: Option<i32>, op: RedirectionOp, target: Word) -> Self {
        Self {
            fd,
            op,
            target,
            heredoc: None,
        }
    }

    pub fn effective_fd(&self) -> i32 {
        self.fd.unwrap_or_else(|| self.op.default_fd())
    }
}

/// Body of a here-document, stored as a template and expanded per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HereDoc {
    pub body: String,
    /// False when the delimiter was quoted
    pub expand: bool,
}

// =============================================================================
// COMPOUND COMMANDS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct IfClause {
    pub condition: CommandList,
    pub body: CommandList,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfCommand {
    /// `if` followed by every `elif`
    pub clauses: Vec<IfClause>,
    pub else_body: Option<CommandList>,
}

/// Shared shape of `while` and `until`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopCommand {
    pub condition: CommandList,
    pub body: CommandList,
}

/// Shared shape of `for` and `select`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForCommand {
    pub variable: String,
    /// `None` means iterate over `"$@"`
    pub words: Option<Vec<Word>>,
    pub body: CommandList,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForArithCommand {
    pub init: String,
    pub condition: String,
    pub update: String,
    pub body: CommandList,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseCommand {
    pub subject: Word,
    pub items: Vec<CaseItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseItem {
    pub patterns: Vec<Word>,
    pub body: CommandList,
    pub terminator: CaseTerminator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseTerminator {
    /// `;;`
    #[default]
    Break,
    /// `;&`
    FallThrough,
    /// `;;&`
    ContinueMatching,
}

impl CaseTerminator {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseTerminator::Break => ";;",
            CaseTerminator::FallThrough => ";&",
            CaseTerminator::ContinueMatching => ";;&",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            ";;" => Some(CaseTerminator::Break),
            ";&" => Some(CaseTerminator::FallThrough),
            ";;&" => Some(CaseTerminator::ContinueMatching),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub body: Box<Command>,
    pub source_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArithCommand {
    pub expression: String,
    pub line: usize,
}

// =============================================================================
// CONDITIONAL EXPRESSIONS ([[ ]])
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum CondExpr {
    /// `-f file`, `-z str`, ...
    Unary { op: String, operand: Word },
    /// `a == b`, `a -lt b`, ...
    Binary { op: CondBinaryOp, left: Word, right: Word },
    /// `a =~ regex`; the regex is kept as raw source text
    Regex { left: Word, pattern: String },
    /// Bare word: true when non-empty
    Word(Word),
    Not(Box<CondExpr>),
    And(Box<CondExpr>, Box<CondExpr>),
    Or(Box<CondExpr>, Box<CondExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondBinaryOp {
    PatternEq,
    PatternNe,
    StrLess,
    StrGreater,
    NumEq,
    NumNe,
    NumLt,
    NumLe,
    NumGt,
    NumGe,
    NewerThan,
    OlderThan,
    SameFile,
}

impl CondBinaryOp {
    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "==" | "=" => CondBinaryOp::PatternEq,
            "!=" => CondBinaryOp::PatternNe,
            "<" => CondBinaryOp::StrLess,
            ">" => CondBinaryOp::StrGreater,
            "-eq" => CondBinaryOp::NumEq,
            "-ne" => CondBinaryOp::NumNe,
            "-lt" => CondBinaryOp::NumLt,
            "-le" => CondBinaryOp::NumLe,
            "-gt" => CondBinaryOp::NumGt,
            "-ge" => CondBinaryOp::NumGe,
            "-nt" => CondBinaryOp::NewerThan,
            "-ot" => CondBinaryOp::OlderThan,
            "-ef" => CondBinaryOp::SameFile,
            _ => return None,
        })
    }
}

// =============================================================================
// ARITHMETIC EXPRESSIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithUnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogicalAnd,
    LogicalOr,
}

/// Assignment operators; `op` is `None` for plain `=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArithAssignOp {
    pub op: Option<ArithBinaryOp>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArithExpr {
    Number(i64),
    /// Variable reference, optionally subscripted
    Variable {
        name: String,
        index: Option<Box<ArithExpr>>,
    },
    Unary(ArithUnaryOp, Box<ArithExpr>),
    Binary(ArithBinaryOp, Box<ArithExpr>, Box<ArithExpr>),
    Ternary(Box<ArithExpr>, Box<ArithExpr>, Box<ArithExpr>),
    Assign {
        op: ArithAssignOp,
        name: String,
        index: Option<Box<ArithExpr>>,
        value: Box<ArithExpr>,
    },
    /// `++x`, `x--`, ...
    Update {
        name: String,
        index: Option<Box<ArithExpr>>,
        delta: i64,
        prefix: bool,
    },
    Comma(Box<ArithExpr>, Box<ArithExpr>),
}
