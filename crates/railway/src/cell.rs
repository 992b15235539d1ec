//! Variable cells: owning, indexable storage shared between scopes

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::EvalError;
use crate::value::Value;

/// A handle to a cell, shareable between scopes and parallel lanes.
///
/// Borrowed parameters and the lanes of a parallel call hold clones of the
/// same handle; ownership transfer (steal, push, pop, return) moves the
/// handle between scope maps without copying the payload.
pub type CellRef = Arc<RwLock<Cell>>;

/// The storage behind one variable.
///
/// A cell owns a value. Conceptually it is a fixed-length indexable
/// container: length 1 for a scalar, the element sequence for an array.
/// Nested arrays live inside the elements as ordinary [`Value`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    memory: Vec<Value>,
    is_array: bool,
}

fn index_repr(name: &str, indices: &[usize]) -> String {
    let mut out = String::from(name);
    for i in indices {
        out.push_str(&format!("[{}]", i));
    }
    out
}

impl Cell {
    /// Wrap a value in a fresh cell.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Number(_) => Cell {
                memory: vec![value],
                is_array: false,
            },
            Value::Array(items) => Cell {
                memory: items,
                is_array: true,
            },
        }
    }

    /// Wrap a value in a fresh shared handle.
    pub fn shared(value: Value) -> CellRef {
        Arc::new(RwLock::new(Cell::from_value(value)))
    }

    /// Whether this cell holds an array.
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// The number of elements (1 for a scalar).
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Whether the cell holds an empty array.
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// The whole value held by this cell.
    pub fn value(&self) -> Value {
        if self.is_array {
            Value::Array(self.memory.clone())
        } else {
            self.memory[0].clone()
        }
    }

    /// Replace the whole value held by this cell.
    pub fn set_value(&mut self, value: Value) {
        *self = Cell::from_value(value);
    }

    /// Read the value at an index path. An empty path reads the whole
    /// value; indexing past `length`, or into a number, is a
    /// memory-access error.
    pub fn get(&self, indices: &[usize], name: &str) -> Result<Value, EvalError> {
        if !self.is_array {
            if indices.is_empty() {
                return Ok(self.memory[0].clone());
            }
            return Err(EvalError::MemAccess {
                message: format!("indexing into `{}` which is a number", name),
            });
        }
        if indices.is_empty() {
            return Ok(Value::Array(self.memory.clone()));
        }
        let mut current = self.memory.get(indices[0]).ok_or_else(|| {
            EvalError::MemAccess {
                message: format!("out of bounds accessing {}", index_repr(name, indices)),
            }
        })?;
        for &idx in &indices[1..] {
            match current {
                Value::Array(items) => {
                    current = items.get(idx).ok_or_else(|| EvalError::MemAccess {
                        message: format!(
                            "out of bounds accessing {}",
                            index_repr(name, indices)
                        ),
                    })?;
                }
                Value::Number(_) => {
                    return Err(EvalError::MemAccess {
                        message: format!(
                            "indexing into a number during lookup of {}",
                            index_repr(name, indices)
                        ),
                    });
                }
            }
        }
        Ok(current.clone())
    }

    /// Write the value at an index path. An empty path replaces the whole
    /// value.
    pub fn set(&mut self, indices: &[usize], value: Value, name: &str) -> Result<(), EvalError> {
        if indices.is_empty() {
            self.set_value(value);
            return Ok(());
        }
        if !self.is_array {
            return Err(EvalError::MemAccess {
                message: format!("indexing into `{}` which is a number", name),
            });
        }
        let slot = self.slot_mut(indices, name)?;
        *slot = value;
        Ok(())
    }

    /// Append a value to the array at an index path (the tail is the only
    /// growth point).
    pub fn push(&mut self, indices: &[usize], value: Value, name: &str) -> Result<(), EvalError> {
        if !self.is_array {
            return Err(EvalError::Type {
                message: format!("pushing onto `{}` which is a number, not an array", name),
            });
        }
        if indices.is_empty() {
            self.memory.push(value);
            return Ok(());
        }
        let slot = self.slot_mut(indices, name)?;
        match slot {
            Value::Array(items) => {
                items.push(value);
                Ok(())
            }
            Value::Number(_) => Err(EvalError::Type {
                message: format!(
                    "pushing onto a location in `{}` which is a number, not an array",
                    name
                ),
            }),
        }
    }

    /// Remove and return the last element of the array at an index path.
    pub fn pop(&mut self, indices: &[usize], name: &str) -> Result<Value, EvalError> {
        if !self.is_array {
            return Err(EvalError::Type {
                message: format!("popping from `{}` which is a number, not an array", name),
            });
        }
        let items = if indices.is_empty() {
            &mut self.memory
        } else {
            match self.slot_mut(indices, name)? {
                Value::Array(items) => items,
                Value::Number(_) => {
                    return Err(EvalError::Type {
                        message: format!(
                            "popping from a location in `{}` which is a number, not an array",
                            name
                        ),
                    });
                }
            }
        };
        items.pop().ok_or_else(|| EvalError::MemAccess {
            message: format!(
                "popping from empty array `{}` (or an element therein)",
                name
            ),
        })
    }

    fn slot_mut(&mut self, indices: &[usize], name: &str) -> Result<&mut Value, EvalError> {
        let out_of_bounds = || EvalError::MemAccess {
            message: format!("out of bounds accessing {}", index_repr(name, indices)),
        };
        let mut current = self.memory.get_mut(indices[0]).ok_or_else(out_of_bounds)?;
        for &idx in &indices[1..] {
            match current {
                Value::Array(items) => {
                    current = items.get_mut(idx).ok_or_else(out_of_bounds)?;
                }
                Value::Number(_) => {
                    return Err(EvalError::MemAccess {
                        message: format!(
                            "indexing into a number during lookup of {}",
                            index_repr(name, indices)
                        ),
                    });
                }
            }
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_cells_have_length_one() {
        let cell = Cell::from_value(Value::integer(6));
        assert_eq!(cell.len(), 1);
        assert!(!cell.is_array());
        assert_eq!(cell.get(&[], "x").unwrap(), Value::integer(6));
        assert!(matches!(
            cell.get(&[0], "x"),
            Err(EvalError::MemAccess { .. })
        ));
    }

    #[test]
    fn nested_index_paths() {
        let inner = Value::Array(vec![Value::integer(1), Value::integer(2)]);
        let mut cell = Cell::from_value(Value::Array(vec![inner, Value::integer(9)]));
        assert_eq!(cell.get(&[0, 1], "a").unwrap(), Value::integer(2));
        assert_eq!(cell.get(&[1], "a").unwrap(), Value::integer(9));
        assert!(matches!(
            cell.get(&[1, 0], "a"),
            Err(EvalError::MemAccess { .. })
        ));
        assert!(matches!(
            cell.get(&[0, 5], "a"),
            Err(EvalError::MemAccess { .. })
        ));

        cell.set(&[0, 0], Value::integer(7), "a").unwrap();
        assert_eq!(cell.get(&[0, 0], "a").unwrap(), Value::integer(7));
    }

    #[test]
    fn push_and_pop_are_tail_operations() {
        let mut cell = Cell::from_value(Value::Array(vec![Value::integer(1)]));
        cell.push(&[], Value::integer(2), "a").unwrap();
        assert_eq!(cell.len(), 2);
        assert_eq!(cell.pop(&[], "a").unwrap(), Value::integer(2));
        assert_eq!(cell.pop(&[], "a").unwrap(), Value::integer(1));
        assert!(matches!(
            cell.pop(&[], "a"),
            Err(EvalError::MemAccess { .. })
        ));
    }
}
