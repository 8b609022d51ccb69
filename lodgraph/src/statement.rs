use uuid::Uuid;

/// A node in the RDF term space: IRI, blank node, or literal.
///
/// Blank node labels are process-local and scoped to one synchronization
/// transaction; they are never compared across transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal {
        value: String,
        datatype: Option<String>,
    },
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    /// Mints a blank node with a fresh random label, unique within the
    /// current transaction.
    pub fn fresh_blank() -> Self {
        Term::Blank(format!("b{}", Uuid::new_v4().simple()))
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
        }
    }

    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Term::Blank(_))
    }

    /// Renders the term in N-Triples syntax.
    pub fn to_ntriples(&self) -> String {
        match self {
            Term::Iri(value) => format!("<{value}>"),
            Term::Blank(label) => format!("_:{label}"),
            Term::Literal { value, datatype } => match datatype {
                Some(dt) => format!("\"{}\"^^<{dt}>", escape_literal(value)),
                None => format!("\"{}\"", escape_literal(value)),
            },
        }
    }
}

fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// One subject-predicate-object assertion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Statement {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    pub fn to_ntriples(&self) -> String {
        format!(
            "{} {} {} .",
            self.subject.to_ntriples(),
            self.predicate.to_ntriples(),
            self.object.to_ntriples()
        )
    }
}

/// An ordered, duplicate-tolerant statement set accumulated during one
/// synchronization transaction. Committed as a whole or discarded, never
/// partially persisted.
#[derive(Debug, Clone, Default)]
pub struct GraphBuffer {
    statements: Vec<Statement>,
}

impl GraphBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, subject: Term, predicate: Term, object: Term) {
        self.statements
            .push(Statement::new(subject, predicate, object));
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter()
    }

    /// Statements matching the given fixed positions (`None` matches any
    /// term in that position).
    pub fn matching<'a>(
        &'a self,
        subject: Option<&'a Term>,
        predicate: Option<&'a Term>,
        object: Option<&'a Term>,
    ) -> impl Iterator<Item = &'a Statement> {
        self.statements.iter().filter(move |st| {
            subject.map_or(true, |s| &st.subject == s)
                && predicate.map_or(true, |p| &st.predicate == p)
                && object.map_or(true, |o| &st.object == o)
        })
    }

    /// Objects of all statements with the given subject and predicate.
    pub fn objects_of<'a>(&'a self, subject: &Term, predicate: &Term) -> Vec<&'a Term> {
        self.statements
            .iter()
            .filter(|st| &st.subject == subject && &st.predicate == predicate)
            .map(|st| &st.object)
            .collect()
    }

    /// The buffer under set semantics: first occurrence of each statement,
    /// in insertion order. Statement content, not accumulation, determines
    /// equality.
    pub fn distinct(&self) -> Vec<Statement> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for st in &self.statements {
            if seen.insert(st.clone()) {
                out.push(st.clone());
            }
        }
        out
    }
}
