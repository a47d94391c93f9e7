//! Typed entries bound to keys
//!
//! Every key is bound to exactly one [`Entry`], whose [`Value`] variant is fixed
//! when the entry is created. All reads and writes of the value go through the
//! entry's own lock.

use crate::error::{PolyVaultError, Result};
use serde_json::{json, Value as Json};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use tokio::sync::{Mutex, MutexGuard};

/// The value shapes a key can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    String,
    Hash,
    List,
    Set,
    SortedSet,
}

impl Kind {
    /// Registration priority used to build the default router.
    pub const PRIORITY: [Kind; 5] = [
        Kind::String,
        Kind::Hash,
        Kind::List,
        Kind::Set,
        Kind::SortedSet,
    ];

    /// Operation names implemented by this variant.
    pub fn operations(self) -> &'static [&'static str] {
        match self {
            Kind::String => &["set", "append", "get"],
            Kind::Hash => &["hset", "hget"],
            Kind::List => &["lpush", "lpop", "rpush", "rpop"],
            Kind::Set => &["sadd", "srem", "scard", "sismember"],
            Kind::SortedSet => &["zadd", "zget", "zrem", "zcard", "zrange"],
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::String => "String",
            Kind::Hash => "Hash",
            Kind::List => "List",
            Kind::Set => "Set",
            Kind::SortedSet => "SortedSet",
        };
        f.write_str(name)
    }
}

/// Payload of an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
    Set(HashSet<String>),
    SortedSet(BTreeMap<String, String>),
}

impl Value {
    /// Empty payload for a freshly created entry of `kind`.
    pub fn empty(kind: Kind) -> Self {
        match kind {
            Kind::String => Value::String(String::new()),
            Kind::Hash => Value::Hash(HashMap::new()),
            Kind::List => Value::List(VecDeque::new()),
            Kind::Set => Value::Set(HashSet::new()),
            Kind::SortedSet => Value::SortedSet(BTreeMap::new()),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::String(_) => Kind::String,
            Value::Hash(_) => Kind::Hash,
            Value::List(_) => Kind::List,
            Value::Set(_) => Kind::Set,
            Value::SortedSet(_) => Kind::SortedSet,
        }
    }

    /// Run `op` with positional `args` against this payload.
    ///
    /// Operations never cross variants: asking a String for `lpush` fails with
    /// [`PolyVaultError::UnsupportedOperation`] and leaves the payload untouched.
    pub fn apply(&mut self, op: &str, args: &[String]) -> Result<Json> {
        match self {
            Value::String(s) => match op {
                "set" => {
                    let [value] = arity::<1>(op, args)?;
                    *s = value.clone();
                    Ok(json!(s))
                }
                "append" => {
                    let [value] = arity::<1>(op, args)?;
                    s.push_str(value);
                    Ok(json!(s))
                }
                "get" => {
                    let [] = arity::<0>(op, args)?;
                    Ok(json!(s))
                }
                _ => Err(unsupported(op, Kind::String)),
            },
            Value::Hash(map) => match op {
                "hset" => {
                    let [field, value] = arity::<2>(op, args)?;
                    map.insert(field.clone(), value.clone());
                    Ok(json!(value))
                }
                "hget" => {
                    let [field] = arity::<1>(op, args)?;
                    Ok(json!(map.get(field)))
                }
                _ => Err(unsupported(op, Kind::Hash)),
            },
            Value::List(list) => match op {
                "lpush" => {
                    let [value] = arity::<1>(op, args)?;
                    list.push_front(value.clone());
                    Ok(json!(list))
                }
                "rpush" => {
                    let [value] = arity::<1>(op, args)?;
                    list.push_back(value.clone());
                    Ok(json!(list))
                }
                "lpop" => {
                    let [] = arity::<0>(op, args)?;
                    Ok(json!(list.pop_front()))
                }
                "rpop" => {
                    let [] = arity::<0>(op, args)?;
                    Ok(json!(list.pop_back()))
                }
                _ => Err(unsupported(op, Kind::List)),
            },
            Value::Set(set) => match op {
                "sadd" => {
                    let [member] = arity::<1>(op, args)?;
                    Ok(json!(set.insert(member.clone())))
                }
                "srem" => {
                    let [member] = arity::<1>(op, args)?;
                    Ok(json!(set.remove(member)))
                }
                "scard" => {
                    let [] = arity::<0>(op, args)?;
                    Ok(json!(set.len()))
                }
                "sismember" => {
                    let [member] = arity::<1>(op, args)?;
                    Ok(json!(set.contains(member)))
                }
                _ => Err(unsupported(op, Kind::Set)),
            },
            Value::SortedSet(tree) => match op {
                "zadd" => {
                    let [field, value] = arity::<2>(op, args)?;
                    Ok(json!(tree.insert(field.clone(), value.clone()).is_none()))
                }
                "zget" => {
                    let [field] = arity::<1>(op, args)?;
                    Ok(json!(tree.get(field)))
                }
                "zrem" => {
                    let [field] = arity::<1>(op, args)?;
                    Ok(json!(tree.remove(field).is_some()))
                }
                "zcard" => {
                    let [] = arity::<0>(op, args)?;
                    Ok(json!(tree.len()))
                }
                "zrange" => {
                    let [start, stop] = arity::<2>(op, args)?;
                    let len = tree.len();
                    let start = resolve_index(op, start, len)?.unwrap_or(0);
                    let stop = resolve_index(op, stop, len)?;
                    let fields: Vec<&String> = match stop {
                        Some(stop) if start <= stop && start < len => tree
                            .keys()
                            .skip(start)
                            .take(stop.min(len - 1) - start + 1)
                            .collect(),
                        _ => Vec::new(),
                    };
                    Ok(json!(fields))
                }
                _ => Err(unsupported(op, Kind::SortedSet)),
            },
        }
    }
}

/// Borrow exactly `N` arguments or fail with a wrong-arity error.
fn arity<'a, const N: usize>(op: &str, args: &'a [String]) -> Result<&'a [String; N]> {
    args.try_into().map_err(|_| PolyVaultError::WrongArity {
        op: op.to_string(),
        given: args.len(),
        expected: N,
    })
}

fn unsupported(op: &str, kind: Kind) -> PolyVaultError {
    PolyVaultError::UnsupportedOperation {
        op: op.to_string(),
        kind,
    }
}

/// Parse an inclusive range index, counting negatives from the end.
/// `None` means the index falls before the first element.
fn resolve_index(op: &str, raw: &str, len: usize) -> Result<Option<usize>> {
    let index: i64 = raw.parse().map_err(|_| {
        PolyVaultError::InvalidArgument(format!("'{}' is not an integer index for '{}'", raw, op))
    })?;
    if index >= 0 {
        return Ok(Some(index as usize));
    }
    let from_end = index.unsigned_abs() as usize;
    Ok(len.checked_sub(from_end))
}

/// A key's bound value plus the lock guarding it.
#[derive(Debug)]
pub struct Entry {
    key: String,
    kind: Kind,
    value: Mutex<Value>,
}

impl Entry {
    pub fn new(key: String, kind: Kind) -> Self {
        Self {
            key,
            kind,
            value: Mutex::new(Value::empty(kind)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Variant fixed at creation; readable without taking the lock.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Acquire the entry's exclusive lock.
    pub async fn lock(&self) -> MutexGuard<'_, Value> {
        self.value.lock().await
    }
}
