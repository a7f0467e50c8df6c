//! # Combinator chains.
//!
//! A [`Chain`] is an immutable tree of occurrences joined with `or` / `and`:
//!
//! ```text
//!   eventual("a").or("b").and("c")
//!
//!            And
//!           /   \
//!         Or     c
//!        /  \
//!       a    b
//! ```
//!
//! Joining with the same operator extends the current node; switching operator
//! wraps it. Awaiting walks the tree once:
//! - `Or` settles with the first branch to settle (value or error).
//! - `And` settles when every branch resolved, or with the first error.
//!
//! "First" follows emit order: when several branches are already settled by the
//! time the chain is polled, the one emitted earliest wins. The result is a
//! [`Merged`] keyed by branch name, in settle order.

use std::fmt;
use std::future::IntoFuture;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::{BoxFuture, select_all};
use futures::stream::{FuturesUnordered, StreamExt};

use crate::error::EventError;
use crate::registry::Value;
use crate::registry::eventual::Eventual;
use crate::registry::namespace::{Inner, Registry};
use crate::registry::timed::TimeoutBuilder;

enum Node<T: Value> {
    Leaf(Eventual<T>),
    Or(Vec<Node<T>>),
    And(Vec<Node<T>>),
}

impl<T: Value> Clone for Node<T> {
    fn clone(&self) -> Self {
        match self {
            Node::Leaf(e) => Node::Leaf(e.clone()),
            Node::Or(nodes) => Node::Or(nodes.clone()),
            Node::And(nodes) => Node::And(nodes.clone()),
        }
    }
}

/// A settled branch: its settle stamp and the entries it contributes.
struct Branch<T> {
    stamp: u64,
    outcome: Result<Vec<(u64, Arc<str>, T)>, EventError>,
}

impl<T: Value> Node<T> {
    fn evaluate(self) -> BoxFuture<'static, Branch<T>> {
        match self {
            Node::Leaf(eventual) => {
                let name = eventual.name_arc();
                let stamp = eventual.stamp().clone();
                eventual
                    .into_future()
                    .map(move |res| {
                        let at = stamp.mark();
                        Branch {
                            stamp: at,
                            outcome: res.map(|value| vec![(at, name, value)]),
                        }
                    })
                    .boxed()
            }
            Node::Or(nodes) => {
                let branches: Vec<_> = nodes.into_iter().map(Node::evaluate).collect();
                async move {
                    let (first, _, rest) = select_all(branches).await;
                    // Branches that were already settled compete by stamp.
                    rest.into_iter()
                        .filter_map(FutureExt::now_or_never)
                        .fold(first, |best, other| {
                            if other.stamp < best.stamp { other } else { best }
                        })
                }
                .boxed()
            }
            Node::And(nodes) => {
                let mut pending: FuturesUnordered<_> =
                    nodes.into_iter().map(Node::evaluate).collect();
                async move {
                    let mut stamp = 0;
                    let mut entries = Vec::new();
                    while let Some(branch) = pending.next().await {
                        stamp = stamp.max(branch.stamp);
                        match branch.outcome {
                            Ok(more) => entries.extend(more),
                            Err(err) => {
                                return Branch {
                                    stamp: branch.stamp,
                                    outcome: Err(err),
                                };
                            }
                        }
                    }
                    entries.sort_by_key(|(at, _, _)| *at);
                    Branch {
                        stamp,
                        outcome: Ok(entries),
                    }
                }
                .boxed()
            }
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, nested: bool) -> fmt::Result {
        let (nodes, op) = match self {
            Node::Leaf(e) => return f.write_str(e.name()),
            Node::Or(nodes) => (nodes, " | "),
            Node::And(nodes) => (nodes, " & "),
        };
        if nested {
            f.write_str("(")?;
        }
        for (i, node) in nodes.iter().enumerate() {
            if i > 0 {
                f.write_str(op)?;
            }
            node.fmt_nested(f, true)?;
        }
        if nested {
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Composed future over several occurrences.
///
/// # Example
/// ```
/// use seqflow::{Registry, RegistryConfig};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = Registry::<&'static str>::new(RegistryConfig::default(), CancellationToken::new());
/// let both = registry.eventual("user").and("settings");
/// assert_eq!(both.to_string(), "user & settings");
///
/// registry.on("settings").emit("dark");
/// registry.on("user").emit("ada");
///
/// let merged = both.await.unwrap();
/// assert_eq!(merged.get("user"), Some(&"ada"));
/// assert_eq!(merged.get("settings"), Some(&"dark"));
/// # }
/// ```
pub struct Chain<T: Value> {
    node: Node<T>,
    registry: Weak<Inner<T>>,
}

impl<T: Value> Chain<T> {
    /// Settles with whichever of the chain and `name` settles first.
    pub fn or(self, name: &str) -> Self {
        let next = Registry::eventual_in(&self.registry, name);
        self.or_eventual(next)
    }

    /// Settles once both the chain and `name` have resolved.
    pub fn and(self, name: &str) -> Self {
        let next = Registry::eventual_in(&self.registry, name);
        self.and_eventual(next)
    }

    pub fn or_eventual(self, other: Eventual<T>) -> Self {
        let node = match self.node {
            Node::Or(mut nodes) => {
                nodes.push(Node::Leaf(other));
                Node::Or(nodes)
            }
            node => Node::Or(vec![node, Node::Leaf(other)]),
        };
        Self {
            node,
            registry: self.registry,
        }
    }

    pub fn and_eventual(self, other: Eventual<T>) -> Self {
        let node = match self.node {
            Node::And(mut nodes) => {
                nodes.push(Node::Leaf(other));
                Node::And(nodes)
            }
            node => Node::And(vec![node, Node::Leaf(other)]),
        };
        Self {
            node,
            registry: self.registry,
        }
    }

    /// Starts attaching a timeout; finish it by picking a unit.
    pub fn within(self, amount: impl Into<f64>) -> TimeoutBuilder<Self> {
        TimeoutBuilder::new(self, amount)
    }
}

impl<T: Value> From<Eventual<T>> for Chain<T> {
    fn from(eventual: Eventual<T>) -> Self {
        let registry = eventual.registry();
        Self {
            node: Node::Leaf(eventual),
            registry,
        }
    }
}

impl<T: Value> Clone for Chain<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            registry: Weak::clone(&self.registry),
        }
    }
}

impl<T: Value> fmt::Display for Chain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node.fmt_nested(f, false)
    }
}

impl<T: Value> fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Chain").field(&self.to_string()).finish()
    }
}

impl<T: Value> IntoFuture for Chain<T> {
    type Output = Result<Merged<T>, EventError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.node
            .evaluate()
            .map(|branch| {
                branch.outcome.map(|entries| Merged {
                    entries: entries.into_iter().map(|(_, name, v)| (name, v)).collect(),
                })
            })
            .boxed()
    }
}

/// Result of a settled chain: one entry per contributing branch, in settle order.
#[derive(Clone, Debug, PartialEq)]
pub struct Merged<T> {
    entries: Vec<(Arc<str>, T)>,
}

impl<T> Default for Merged<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Merged<T> {
    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Branch names in settle order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| &**n).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(n, v)| (&**n, v))
    }

    pub fn into_entries(self) -> Vec<(Arc<str>, T)> {
        self.entries
    }
}
