//! Step compilation
//!
//! Normalizes raw declarations into operations, then pairs every
//! `*.start` with its `*.end` in one left-to-right stack scan. The result
//! is all-or-nothing: a list with any unmatched bracket never executes.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use super::error::CompileError;
use crate::workflow::{normalize_steps, BlockKind, Bracket, Operation};

/// Bidirectional start ↔ end index for every block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockMap {
    start_to_end: HashMap<usize, usize>,
    end_to_start: HashMap<usize, usize>,
}

impl BlockMap {
    pub fn end_of(&self, start: usize) -> Option<usize> {
        self.start_to_end.get(&start).copied()
    }

    pub fn start_of(&self, end: usize) -> Option<usize> {
        self.end_to_start.get(&end).copied()
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.start_to_end.len()
    }

    pub fn is_empty(&self) -> bool {
        self.start_to_end.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledWorkflow {
    pub operations: Vec<Operation>,
    pub blocks: BlockMap,
}

impl CompiledWorkflow {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Normalize and bracket-check a raw step list.
pub fn compile(steps: &[Value]) -> Result<CompiledWorkflow, CompileError> {
    let operations = normalize_steps(steps)?;
    let blocks = compile_blocks(&operations)?;
    debug!(
        operations = operations.len(),
        blocks = blocks.len(),
        "Compiled workflow steps"
    );
    Ok(CompiledWorkflow { operations, blocks })
}

pub fn compile_blocks(operations: &[Operation]) -> Result<BlockMap, CompileError> {
    let mut stack: Vec<(BlockKind, usize)> = Vec::new();
    let mut blocks = BlockMap::default();

    for (index, op) in operations.iter().enumerate() {
        match op.bracket() {
            Some(Bracket::Start(kind)) => stack.push((kind, index)),
            Some(Bracket::End(kind)) => match stack.pop() {
                Some((open, start)) if open == kind => {
                    blocks.start_to_end.insert(start, index);
                    blocks.end_to_start.insert(index, start);
                }
                _ => return Err(CompileError::UnmatchedEnd { kind, index }),
            },
            None => {}
        }
    }

    if let Some(&(kind, index)) = stack.last() {
        return Err(CompileError::UnclosedStart { kind, index });
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn start(action: &str) -> Value {
        json!({"action": action, "key": "k", "condition": "eq", "value": 1})
    }

    fn end(action: &str) -> Value {
        json!({"action": action})
    }

    #[test]
    fn test_nested_blocks() {
        let compiled = compile(&[
            start("while.start"),
            start("if.start"),
            end("if.end"),
            end("while.end"),
        ])
        .unwrap();
        assert_eq!(compiled.blocks.len(), 2);
        assert_eq!(compiled.blocks.end_of(0), Some(3));
        assert_eq!(compiled.blocks.end_of(1), Some(2));
        assert_eq!(compiled.blocks.start_of(3), Some(0));
        assert_eq!(compiled.blocks.start_of(2), Some(1));
    }

    #[test]
    fn test_end_without_start() {
        let err = compile(&[start("if.start"), end("if.end"), end("while.end")]).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnmatchedEnd {
                kind: BlockKind::While,
                index: 2
            }
        );
    }

    #[test]
    fn test_unclosed_start() {
        let err = compile(&[start("if.start")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid workflow: if.start must have a later matching if.end"
        );
    }

    #[test]
    fn test_mismatched_kinds() {
        let err = compile(&[start("if.start"), end("while.end")]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnmatchedEnd {
                kind: BlockKind::While,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_step_surfaces() {
        let err = compile(&[json!({"action": "nope"})]).unwrap_err();
        assert!(matches!(err, CompileError::InvalidStep(_)));
    }
}
