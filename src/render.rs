//! Reference Renderer
//!
//! Executes a compiled [`Program`] against variable bindings. Each loop
//! iterates the collection named after its block; each element is pushed as
//! a scope for the loop body.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::ir::{Node, Program};

pub type Scope = Map<String, Value>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Block {0} must be bound to an array of objects")]
    NotACollection(String),

    #[error("Unbalanced loop markers for block {0}")]
    UnbalancedLoop(String),

    #[error("Invalid bindings: {0}")]
    InvalidBindings(#[from] serde_json::Error),
}

/// Values for placeholders plus per-block iteration scopes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bindings {
    #[serde(default)]
    pub values: Scope,
    #[serde(default)]
    pub blocks: BTreeMap<String, Vec<Scope>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, RenderError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn extend_values(&mut self, values: Scope) -> &mut Self {
        self.values.extend(values);
        self
    }

    /// Add one iteration to a block.
    pub fn push_iteration(&mut self, block: impl Into<String>, scope: Scope) -> &mut Self {
        self.blocks.entry(block.into()).or_default().push(scope);
        self
    }
}

struct Run<'p, 'b> {
    nodes: &'p [Node],
    partners: Vec<usize>,
    bindings: &'b Bindings,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer {
    strict: bool,
}

impl Renderer {
    /// In strict mode an unbound placeholder is an error; otherwise it renders empty.
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn render(&self, program: &Program, bindings: &Bindings) -> Result<String, RenderError> {
        let nodes = program.nodes();
        let run = Run {
            nodes,
            partners: loop_partners(nodes)?,
            bindings,
        };
        let mut scopes = vec![&bindings.values];
        let mut out = String::new();
        self.render_range(&run, 0..nodes.len(), &mut scopes, &mut out)?;
        Ok(out)
    }

    fn render_range<'b>(
        &self,
        run: &Run<'_, 'b>,
        range: Range<usize>,
        scopes: &mut Vec<&'b Scope>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let mut i = range.start;
        while i < range.end {
            match &run.nodes[i] {
                Node::Literal { text } => out.push_str(text),
                Node::VarRef { name, .. } => out.push_str(&self.lookup(name, scopes)?),
                Node::LoopOpen { block } => {
                    let close = run.partners[i];
                    for scope in collection(block, scopes, run.bindings)? {
                        scopes.push(scope);
                        let result = self.render_range(run, i + 1..close, scopes, out);
                        scopes.pop();
                        result?;
                    }
                    i = close;
                }
                Node::LoopClose { block } => {
                    return Err(RenderError::UnbalancedLoop(block.clone()));
                }
            }
            i += 1;
        }
        Ok(())
    }

    fn lookup(&self, name: &str, scopes: &[&Scope]) -> Result<String, RenderError> {
        match scopes.iter().rev().find_map(|scope| scope.get(name)) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Null) => Ok(String::new()),
            Some(other) => Ok(other.to_string()),
            None if self.strict => Err(RenderError::UndefinedVariable(name.to_string())),
            None => Ok(String::new()),
        }
    }
}

/// Iteration scopes for `block`: the innermost scope binding it as an array
/// wins, then the top-level block collections. Unbound means zero iterations.
fn collection<'b>(
    block: &str,
    scopes: &[&'b Scope],
    bindings: &'b Bindings,
) -> Result<Vec<&'b Scope>, RenderError> {
    if let Some(value) = scopes.iter().rev().find_map(|scope| scope.get(block)) {
        let Value::Array(items) = value else {
            return Err(RenderError::NotACollection(block.to_string()));
        };
        return items
            .iter()
            .map(|item| item.as_object().ok_or_else(|| RenderError::NotACollection(block.to_string())))
            .collect();
    }

    Ok(bindings.blocks.get(block).map(|scopes| scopes.iter().collect()).unwrap_or_default())
}

/// For every `LoopOpen` index, the index of its `LoopClose`.
fn loop_partners(nodes: &[Node]) -> Result<Vec<usize>, RenderError> {
    let mut partners = vec![0; nodes.len()];
    let mut open: Vec<(usize, &str)> = Vec::new();

    for (i, node) in nodes.iter().enumerate() {
        match node {
            Node::LoopOpen { block } => open.push((i, block.as_str())),
            Node::LoopClose { block } => match open.pop() {
                Some((start, name)) if name == block.as_str() => partners[start] = i,
                _ => return Err(RenderError::UnbalancedLoop(block.clone())),
            },
            _ => {}
        }
    }

    if let Some((_, name)) = open.pop() {
        return Err(RenderError::UnbalancedLoop(name.to_string()));
    }
    Ok(partners)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use serde_json::json;

    fn scope(value: Value) -> Scope {
        value.as_object().cloned().unwrap()
    }

    fn compile(text: &str) -> Program {
        Compiler::default().compile(text).unwrap()
    }

    #[test]
    fn test_render_placeholders() {
        let mut bindings = Bindings::new();
        bindings.set("NAME", "World").set("COUNT", 3);
        let out = Renderer::default().render(&compile("Hello {NAME} x{COUNT}"), &bindings).unwrap();
        assert_eq!(out, "Hello World x3");
    }

    #[test]
    fn test_render_block_iterations() {
        let mut bindings = Bindings::new();
        bindings
            .push_iteration("ROW", scope(json!({"N": "a"})))
            .push_iteration("ROW", scope(json!({"N": "b"})));
        let program = compile("<!-- BEGIN ROW -->[{N}]<!-- END ROW -->");
        assert_eq!(Renderer::default().render(&program, &bindings).unwrap(), "[a][b]");
    }

    #[test]
    fn test_unbound_block_renders_nothing() {
        let program = compile("x<!-- BEGIN ROW -->[{N}]<!-- END ROW -->y");
        assert_eq!(Renderer::default().render(&program, &Bindings::new()).unwrap(), "xy");
    }

    #[test]
    fn test_nested_collection_from_iteration_scope() {
        let mut bindings = Bindings::new();
        bindings.push_iteration("OUTER", scope(json!({"T": "o", "INNER": [{"V": 1}, {"V": 2}]})));
        let program = compile(
            "<!-- BEGIN OUTER -->{T}:<!-- BEGIN INNER -->{V}{T}<!-- END INNER -->;<!-- END OUTER -->",
        );
        assert_eq!(Renderer::default().render(&program, &bindings).unwrap(), "o:1o2o;");
    }

    #[test]
    fn test_strict_undefined_variable() {
        let err = Renderer::new(true).render(&compile("{MISSING}"), &Bindings::new()).unwrap_err();
        assert!(matches!(err, RenderError::UndefinedVariable(ref n) if n == "MISSING"));
    }

    #[test]
    fn test_scalar_bound_to_block_is_rejected() {
        let mut bindings = Bindings::new();
        bindings.set("ROW", "oops");
        let program = compile("<!-- BEGIN ROW -->r<!-- END ROW -->");
        let err = Renderer::default().render(&program, &bindings).unwrap_err();
        assert!(matches!(err, RenderError::NotACollection(_)));
    }

    #[test]
    fn test_unbalanced_program_is_rejected() {
        let program = Program::new(vec![Node::LoopOpen { block: "A".into() }]);
        assert!(Renderer::default().render(&program, &Bindings::new()).is_err());
    }

    #[test]
    fn test_bindings_from_json() {
        let bindings =
            Bindings::from_json(r#"{"values": {"A": "1"}, "blocks": {"B": [{"C": "2"}]}}"#).unwrap();
        assert_eq!(bindings.values["A"], "1");
        assert_eq!(bindings.blocks["B"].len(), 1);
    }
}
